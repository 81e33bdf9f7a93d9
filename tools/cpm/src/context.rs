///
/// # Project Context
///
/// Every cpm operation works against an explicit `ProjectContext` instead of
/// paths relative to the process working directory. The context fixes where
/// the manifest, the package cache, the generated Makefile and the ignore
/// file live for one project.
///
/// ## Cache Directory Structure
///
/// The cache is a hidden directory at the project root:
///
/// ```text
/// .cpm/<pkg-name>/                  extracted package contents
/// .cpm/<pkg-name>-<version>.tar.gz  downloaded archive, kept after extraction
/// ```
///
/// Package directories are not versioned. Fetching a different version of
/// the same package extracts on top of the existing directory.
///
/// ## Project Root Discovery
///
/// `find_project_root()` walks up the directory tree from a starting point
/// looking for `cpmfile`, so cpm can be run from any subdirectory.
///

use std::path::{Component, Path, PathBuf};
use crate::errors::CpmError;

pub const CACHE_DIR: &str = ".cpm";
pub const MANIFEST_FILE: &str = "cpmfile";
pub const MAKEFILE: &str = "Makefile";
pub const GITIGNORE: &str = ".gitignore";
pub const CONFIG_FILE: &str = "cpm.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectContext {
    pub root: PathBuf,
    pub cache_dir: PathBuf,
    pub manifest_path: PathBuf,
}

impl ProjectContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            cache_dir: root.join(CACHE_DIR),
            manifest_path: root.join(MANIFEST_FILE),
            root,
        }
    }

    pub fn makefile_path(&self) -> PathBuf {
        self.root.join(MAKEFILE)
    }

    pub fn gitignore_path(&self) -> PathBuf {
        self.root.join(GITIGNORE)
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.cache_dir.join(name)
    }

    /// `package_dir` for names that resolve to a direct child of the cache.
    /// Names such as `..` or `a/b` would escape or nest, and are refused.
    pub fn checked_package_dir(&self, name: &str) -> Result<PathBuf, CpmError> {
        if !is_single_component(name) {
            return Err(CpmError::Usage(format!(
                "Invalid package name '{}': must be a single directory name inside {}",
                name, CACHE_DIR
            )));
        }
        Ok(self.package_dir(name))
    }

    /// The archive sits next to the package directory, not inside it.
    pub fn archive_path(&self, name: &str, version: &str) -> PathBuf {
        self.cache_dir.join(archive_file_name(name, version))
    }

    pub fn checked_archive_path(&self, name: &str, version: &str) -> Result<PathBuf, CpmError> {
        self.checked_package_dir(name)?;
        if !is_single_component(&archive_file_name(name, version)) {
            return Err(CpmError::Usage(format!(
                "Invalid version '{}' for package '{}': must not contain path separators",
                version, name
            )));
        }
        Ok(self.archive_path(name, version))
    }

    pub fn ensure_cache_dir(&self) -> Result<(), CpmError> {
        ensure_directory(&self.cache_dir)
    }
}

pub fn ensure_directory(path: &Path) -> Result<(), CpmError> {
    if path.is_dir() {
        return Ok(());
    }

    std::fs::create_dir_all(path).map_err(|source| CpmError::DirectoryCreate {
        path: path.to_path_buf(),
        source,
    })
}

fn archive_file_name(name: &str, version: &str) -> String {
    format!("{}-{}.tar.gz", name, version)
}

/// True when `name` is one plain path component: no separators, not `.`
/// or `..`, not empty.
pub fn is_single_component(name: &str) -> bool {
    if name.contains(['/', '\\']) {
        return false;
    }

    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start;

    loop {
        let manifest_path = current.join(MANIFEST_FILE);
        if manifest_path.is_file() {
            return Some(current.to_path_buf());
        }

        current = current.parent()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_context_paths() {
        let ctx = ProjectContext::new("/work/demo");

        assert_eq!(ctx.cache_dir, PathBuf::from("/work/demo/.cpm"));
        assert_eq!(ctx.manifest_path, PathBuf::from("/work/demo/cpmfile"));
        assert_eq!(ctx.makefile_path(), PathBuf::from("/work/demo/Makefile"));
        assert_eq!(ctx.gitignore_path(), PathBuf::from("/work/demo/.gitignore"));
        assert_eq!(ctx.package_dir("zlib"), PathBuf::from("/work/demo/.cpm/zlib"));
    }

    #[test]
    fn test_archive_path_is_in_cache_root() {
        let ctx = ProjectContext::new("/work/demo");
        let archive = ctx.archive_path("zlib", "1.3");

        assert_eq!(archive, PathBuf::from("/work/demo/.cpm/zlib-1.3.tar.gz"));
        assert_eq!(archive.parent(), Some(ctx.cache_dir.as_path()));
    }

    #[test]
    fn test_checked_package_dir_stays_in_cache() {
        let ctx = ProjectContext::new("/work/demo");

        assert_eq!(
            ctx.checked_package_dir("zlib").unwrap(),
            PathBuf::from("/work/demo/.cpm/zlib")
        );
        for name in ["..", ".", "../src", "a/b", "a\\b", "/etc", ""] {
            assert!(
                matches!(ctx.checked_package_dir(name), Err(CpmError::Usage(_))),
                "{:?} should be refused",
                name
            );
        }
    }

    #[test]
    fn test_checked_archive_path_refuses_separators_in_version() {
        let ctx = ProjectContext::new("/work/demo");

        assert_eq!(
            ctx.checked_archive_path("zlib", "1.3").unwrap(),
            PathBuf::from("/work/demo/.cpm/zlib-1.3.tar.gz")
        );
        assert!(matches!(
            ctx.checked_archive_path("zlib", "1.3/../../../x"),
            Err(CpmError::Usage(_))
        ));
        assert!(matches!(
            ctx.checked_archive_path("..", "1.3"),
            Err(CpmError::Usage(_))
        ));
    }

    #[test]
    fn test_ensure_directory_creates_and_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(".cpm").join("zlib");

        ensure_directory(&dir).unwrap();
        assert!(dir.is_dir());

        ensure_directory(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn test_ensure_directory_fails_on_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let result = ensure_directory(&blocker.join("child"));
        assert!(matches!(result, Err(CpmError::DirectoryCreate { .. })));
    }

    #[test]
    fn test_find_project_root_no_manifest() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b").join("c");
        fs::create_dir_all(&nested).unwrap();

        assert!(find_project_root(&nested).is_none());
    }

    #[test]
    fn test_find_project_root_finds_manifest() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(MANIFEST_FILE), "name: demo\n").unwrap();

        let nested = temp_dir.path().join("src").join("nested");
        fs::create_dir_all(&nested).unwrap();

        let root = find_project_root(&nested);
        assert_eq!(root, Some(temp_dir.path().to_path_buf()));
    }
}
