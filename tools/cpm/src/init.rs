///
/// # Project Initialization Module
///
/// Turns the project root into a cpm project:
///
/// - `.cpm/` - package cache, added to `.gitignore`
/// - `cpmfile` - manifest with the project name and version header
/// - `Makefile` - generated from whatever sources already exist
///
/// Running `init` on an existing project rewrites the manifest header and
/// drops its package list, matching a fresh start.
///

use tracing::warn;

use crate::config::Settings;
use crate::context::ProjectContext;
use crate::errors::CpmError;
use crate::gitignore::ensure_ignored;
use crate::makefile::synthesize;
use crate::manifest::{validate_entry, ManifestStore, DEFAULT_PROJECT_NAME, DEFAULT_PROJECT_VERSION};

/// Returns the project name that was written.
pub fn init_project(
    ctx: &ProjectContext,
    settings: &Settings,
    name: Option<&str>,
) -> Result<String, CpmError> {
    let name = name.unwrap_or(DEFAULT_PROJECT_NAME);
    validate_entry(name, DEFAULT_PROJECT_VERSION)?;

    ctx.ensure_cache_dir()?;
    if let Err(e) = ensure_ignored(ctx) {
        warn!(error = %e, "failed to update .gitignore");
    }

    ManifestStore::new(&ctx.manifest_path).create(name)?;
    synthesize(ctx, settings)?;

    Ok(name.to_string())
}
