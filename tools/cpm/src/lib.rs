///
/// # cpm - C package manager and Makefile generator
///
/// cpm downloads package archives from a remote repository into a hidden
/// `.cpm/` directory, records them in a flat `cpmfile` manifest, and writes
/// a Makefile that compiles the project together with every fetched library.
///
/// ## Library Usage
///
/// ```rust,ignore
/// use cpm::{PackageManager, ProjectContext};
///
/// let pm = PackageManager::new(ProjectContext::new(project_root))?;
/// pm.add("zlib", "1.3")?;
/// pm.install(Some("zlib"))?;
/// pm.generate_makefile()?;
/// ```
///
/// ## CLI
///
/// ```sh
/// cpm init [name]            # Create cpmfile, .cpm/ and a Makefile
/// cpm add <package> <ver>    # Record a dependency
/// cpm install [package]      # Fetch dependencies and regenerate the Makefile
/// cpm remove <package>       # Drop a dependency and its cache directory
/// ```
///

pub mod config;
pub mod context;
pub mod errors;
pub mod fetcher;
pub mod gitignore;
pub mod init;
pub mod makefile;
pub mod manifest;
pub mod manager;
pub mod scanner;

pub use config::Settings;
pub use context::{find_project_root, ProjectContext};
pub use errors::CpmError;
pub use fetcher::{ArchiveExtractor, Fetcher, RecursiveDeleter, Transport};
pub use init::init_project;
pub use makefile::{synthesize, BuildDescriptor};
pub use manager::{format_list, InstallReport, PackageManager};
pub use manifest::{EditOutcome, Manifest, ManifestStore, PackageEntry};
pub use scanner::{scan, SourceFileSet};
