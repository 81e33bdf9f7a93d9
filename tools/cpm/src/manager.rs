///
/// # Package Manager Orchestrator
///
/// `PackageManager` ties the manifest store, the fetcher and the Makefile
/// generator together for one project. The CLI builds one per invocation
/// with `PackageManager::new()`; tests use `with_backends()` to swap the
/// network client, the extraction tool and the directory remover for fakes.
///
/// ## Batch Installs
///
/// `install(None)` fetches every manifest entry and keeps going when one of
/// them fails; the failures are collected in the returned `InstallReport`.
/// `install(Some(name))` is all-or-nothing: an unknown name or a failed
/// fetch is an error.
///

use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::Settings;
use crate::context::ProjectContext;
use crate::errors::CpmError;
use crate::fetcher::{
    ArchiveExtractor, Fetcher, FsDeleter, HttpTransport, RecursiveDeleter, TarExtractor, Transport,
};
use crate::gitignore::ensure_ignored;
use crate::init::init_project;
use crate::makefile::synthesize;
use crate::manifest::{validate_entry, EditOutcome, ManifestStore, PackageEntry};

#[derive(Debug, Default)]
pub struct InstallReport {
    pub installed: Vec<PackageEntry>,
    pub failed: Vec<(PackageEntry, CpmError)>,
}

impl InstallReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Text printed by `cpm list`.
pub fn format_list(entries: &[PackageEntry]) -> String {
    let mut out = String::from("Installed packages:\n");
    if entries.is_empty() {
        out.push_str("  No packages installed\n");
    }
    for entry in entries {
        out.push_str(&format!("  {} - {}\n", entry.name, entry.version));
    }
    out
}

pub struct PackageManager {
    ctx: ProjectContext,
    settings: Settings,
    store: ManifestStore,
    transport: Box<dyn Transport>,
    extractor: Box<dyn ArchiveExtractor>,
    deleter: Box<dyn RecursiveDeleter>,
}

impl PackageManager {
    pub fn new(ctx: ProjectContext) -> Result<Self, CpmError> {
        let settings = Settings::load(&ctx)?;
        let transport = HttpTransport::new()?;

        Ok(Self::with_backends(
            ctx,
            settings,
            Box::new(transport),
            Box::new(TarExtractor),
            Box::new(FsDeleter),
        ))
    }

    pub fn with_backends(
        ctx: ProjectContext,
        settings: Settings,
        transport: Box<dyn Transport>,
        extractor: Box<dyn ArchiveExtractor>,
        deleter: Box<dyn RecursiveDeleter>,
    ) -> Self {
        let store = ManifestStore::new(&ctx.manifest_path);
        Self {
            ctx,
            settings,
            store,
            transport,
            extractor,
            deleter,
        }
    }

    pub fn context(&self) -> &ProjectContext {
        &self.ctx
    }

    pub fn init(&self, name: Option<&str>) -> Result<String, CpmError> {
        init_project(&self.ctx, &self.settings, name)
    }

    /// Records `name version` in the manifest, creating a default manifest
    /// when the project has none. Nothing is downloaded.
    pub fn add(&self, name: &str, version: &str) -> Result<EditOutcome, CpmError> {
        validate_entry(name, version)?;
        self.store.load_or_default()?;
        let outcome = self.store.upsert(name, version)?;
        info!(package = name, version, ?outcome, "updated manifest");
        Ok(outcome)
    }

    /// Drops `name` from the manifest and deletes its cache directory.
    ///
    /// A hand-edited entry whose name does not resolve to a directory
    /// directly inside the cache is dropped from the manifest, but nothing
    /// on disk is deleted for it.
    pub fn remove(&self, name: &str) -> Result<PackageEntry, CpmError> {
        let entry = self
            .store
            .delete(name)?
            .ok_or_else(|| CpmError::PackageNotFound {
                name: name.to_string(),
            })?;

        let package_dir = match self.ctx.checked_package_dir(name) {
            Ok(dir) => dir,
            Err(e) => {
                warn!(package = name, error = %e, "not deleting anything outside the cache");
                return Ok(entry);
            }
        };
        if let Err(e) = self.deleter.remove_all(&package_dir) {
            warn!(dir = %package_dir.display(), error = %e, "failed to remove package directory");
        }

        Ok(entry)
    }

    pub fn install(&self, name: Option<&str>) -> Result<InstallReport, CpmError> {
        self.ctx.ensure_cache_dir()?;
        self.ignore_cache_dir();

        let manifest = self.store.load()?;
        let fetcher = Fetcher::new(
            &self.ctx,
            &self.settings,
            self.transport.as_ref(),
            self.extractor.as_ref(),
        );
        let mut report = InstallReport::default();

        if let Some(name) = name {
            let entry = manifest.get(name).ok_or_else(|| CpmError::PackageNotFound {
                name: name.to_string(),
            })?;
            fetcher.fetch(&entry.name, &entry.version)?;
            report.installed.push(entry);
            return Ok(report);
        }

        for entry in manifest.entries() {
            match fetcher.fetch(&entry.name, &entry.version) {
                Ok(()) => report.installed.push(entry),
                Err(e) => {
                    warn!(package = %entry.name, version = %entry.version, error = %e, "install failed");
                    report.failed.push((entry, e));
                }
            }
        }

        Ok(report)
    }

    /// Fetches every manifest entry again at its recorded version.
    pub fn update(&self) -> Result<InstallReport, CpmError> {
        info!("updating all packages");
        self.install(None)
    }

    pub fn list(&self) -> Result<Vec<PackageEntry>, CpmError> {
        self.store.list()
    }

    pub fn generate_makefile(&self) -> Result<PathBuf, CpmError> {
        synthesize(&self.ctx, &self.settings)
    }

    fn ignore_cache_dir(&self) {
        if let Err(e) = ensure_ignored(&self.ctx) {
            warn!(error = %e, "failed to update .gitignore");
        }
    }
}
