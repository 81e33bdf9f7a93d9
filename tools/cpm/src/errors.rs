///
/// Package manager error types.
///
/// All errors that can occur while editing the manifest, fetching and
/// extracting archives, and writing the generated Makefile.
///

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CpmError {
    #[error("Manifest not found at {path}. Run `cpm init` first.")]
    ManifestNotFound { path: PathBuf },

    #[error("Package '{name}' not found in cpmfile")]
    PackageNotFound { name: String },

    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to download {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("Failed to extract package '{package}': {reason}")]
    Extraction { package: String, reason: String },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    Usage(String),

    #[error("Invalid configuration in {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl CpmError {
    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CpmError::Write {
            path: path.into(),
            source,
        }
    }
}
