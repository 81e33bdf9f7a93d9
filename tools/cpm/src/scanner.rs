///
/// # Source Tree Scanner
///
/// Recursively collects `.c` files below a root directory.
///
/// - `.git` directories are never entered.
/// - The `.cpm` cache directory is skipped when scanning the project tree and
///   entered when scanning a package, so packages vendored inside a package
///   are still compiled.
/// - Unreadable directories are treated as empty.
/// - Symlinks are followed; a link that points back at one of its own
///   ancestors is detected by walkdir and skipped instead of recursing forever.
///
/// Entries are visited depth first in file name order, so the same tree
/// always produces the same list regardless of platform directory order.
///

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::context::CACHE_DIR;

pub const SOURCE_SUFFIX: &str = ".c";
const VCS_DIR: &str = ".git";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFileSet {
    files: Vec<PathBuf>,
}

impl SourceFileSet {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn extend(&mut self, other: SourceFileSet) {
        self.files.extend(other.files);
    }

    /// Paths relative to `base`, `/` separated, in discovery order.
    pub fn relative_to(&self, base: &Path) -> Vec<String> {
        self.files
            .iter()
            .map(|path| to_slash(path.strip_prefix(base).unwrap_or(path)))
            .collect()
    }
}

pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn is_source_file(name: &str) -> bool {
    name.len() > SOURCE_SUFFIX.len() && name.ends_with(SOURCE_SUFFIX)
}

pub fn scan(root: &Path, exclude_cache_dir: bool) -> SourceFileSet {
    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_skipped_dir(entry, exclude_cache_dir));

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        if entry.file_type().is_file() && is_source_file(&entry.file_name().to_string_lossy()) {
            files.push(entry.into_path());
        }
    }

    debug!(root = %root.display(), count = files.len(), "scanned source tree");
    SourceFileSet { files }
}

fn is_skipped_dir(entry: &DirEntry, exclude_cache_dir: bool) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }

    let name = entry.file_name();
    name == VCS_DIR || (exclude_cache_dir && name == CACHE_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    fn scan_relative(root: &Path, exclude_cache_dir: bool) -> Vec<String> {
        scan(root, exclude_cache_dir).relative_to(root)
    }

    #[test]
    fn test_is_source_file() {
        assert!(is_source_file("main.c"));
        assert!(is_source_file("a.c"));
        assert!(!is_source_file(".c"));
        assert!(!is_source_file("main.h"));
        assert!(!is_source_file("main.cpp"));
        assert!(!is_source_file("main.c.orig"));
    }

    #[test]
    fn test_scan_collects_nested_sources_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("main.c"));
        touch(&root.join("src").join("util.c"));
        touch(&root.join("src").join("util.h"));
        touch(&root.join("src").join("net").join("socket.c"));
        touch(&root.join("README.md"));

        assert_eq!(
            scan_relative(root, true),
            vec!["main.c", "src/net/socket.c", "src/util.c"]
        );
    }

    #[test]
    fn test_scan_skips_git_always() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("main.c"));
        touch(&root.join(".git").join("hooks").join("hook.c"));

        assert_eq!(scan_relative(root, true), vec!["main.c"]);
        assert_eq!(scan_relative(root, false), vec!["main.c"]);
    }

    #[test]
    fn test_scan_cache_dir_exclusion() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("main.c"));
        touch(&root.join(".cpm").join("zlib").join("zlib.c"));

        assert_eq!(scan_relative(root, true), vec!["main.c"]);
        assert_eq!(scan_relative(root, false), vec![".cpm/zlib/zlib.c", "main.c"]);
    }

    #[test]
    fn test_scan_skips_directories_named_like_sources() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("weird.c")).unwrap();
        touch(&root.join("weird.c").join("inner.c"));

        assert_eq!(scan_relative(root, true), vec!["weird.c/inner.c"]);
    }

    #[test]
    fn test_scan_missing_root_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        assert!(scan(&temp_dir.path().join("absent"), true).is_empty());
    }

    #[test]
    fn test_scan_is_stable() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for name in ["zeta.c", "alpha.c", "mid/beta.c", "mid/alpha.c"] {
            touch(&root.join(name));
        }

        assert_eq!(scan(root, true), scan(root, true));
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_survives_symlink_cycle() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("src").join("main.c"));
        std::os::unix::fs::symlink(root.join("src"), root.join("src").join("loop")).unwrap();

        assert_eq!(scan_relative(root, true), vec!["src/main.c"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_skips_unreadable_directory() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        touch(&root.join("main.c"));
        touch(&root.join("locked").join("secret.c"));
        fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o000)).unwrap();

        let found = scan_relative(root, true);
        fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o755)).unwrap();

        assert!(found.contains(&"main.c".to_string()));
    }
}
