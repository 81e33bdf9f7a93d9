///
/// Keeps `.cpm/` out of version control.
///

use std::io::Write;

use tracing::debug;

use crate::context::{ProjectContext, CACHE_DIR};
use crate::errors::CpmError;

/// Adds the cache directory to `.gitignore` unless a line already mentions it.
/// Returns whether the file was written.
pub fn ensure_ignored(ctx: &ProjectContext) -> Result<bool, CpmError> {
    let path = ctx.gitignore_path();

    let existing = match std::fs::read(&path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(CpmError::Io(e)),
    };

    if let Some(content) = &existing {
        if String::from_utf8_lossy(content).contains(CACHE_DIR) {
            debug!(path = %path.display(), "cache directory already ignored");
            return Ok(false);
        }
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| CpmError::write(&path, e))?;

    let entry = match existing {
        Some(_) => format!("\n{}/\n", CACHE_DIR),
        None => format!("{}/\n", CACHE_DIR),
    };
    file.write_all(entry.as_bytes())
        .map_err(|e| CpmError::write(&path, e))?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_creates_gitignore() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = ProjectContext::new(temp_dir.path());

        assert!(ensure_ignored(&ctx).unwrap());
        assert_eq!(fs::read_to_string(ctx.gitignore_path()).unwrap(), ".cpm/\n");
    }

    #[test]
    fn test_appends_to_existing_gitignore() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = ProjectContext::new(temp_dir.path());
        fs::write(ctx.gitignore_path(), "*.o\nprogram\n").unwrap();

        assert!(ensure_ignored(&ctx).unwrap());
        assert_eq!(
            fs::read_to_string(ctx.gitignore_path()).unwrap(),
            "*.o\nprogram\n\n.cpm/\n"
        );
    }

    #[test]
    fn test_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = ProjectContext::new(temp_dir.path());

        assert!(ensure_ignored(&ctx).unwrap());
        assert!(!ensure_ignored(&ctx).unwrap());
        assert_eq!(fs::read_to_string(ctx.gitignore_path()).unwrap(), ".cpm/\n");
    }

    #[test]
    fn test_existing_pattern_variants_are_respected() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = ProjectContext::new(temp_dir.path());
        fs::write(ctx.gitignore_path(), "/.cpm\n").unwrap();

        assert!(!ensure_ignored(&ctx).unwrap());
        assert_eq!(fs::read_to_string(ctx.gitignore_path()).unwrap(), "/.cpm\n");
    }

    #[test]
    fn test_non_utf8_gitignore() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = ProjectContext::new(temp_dir.path());
        fs::write(ctx.gitignore_path(), b"caf\xe9.o\n").unwrap();

        assert!(ensure_ignored(&ctx).unwrap());
        assert!(!ensure_ignored(&ctx).unwrap());
        assert_eq!(fs::read(ctx.gitignore_path()).unwrap(), b"caf\xe9.o\n\n.cpm/\n");
    }
}
