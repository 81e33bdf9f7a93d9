///
/// # Makefile Generation
///
/// Builds a `BuildDescriptor` from the current state of the project
/// directory and renders it as a Makefile.
///
/// Every immediate subdirectory of `.cpm/` is treated as an installed
/// library named after the directory. Each one contributes:
///
/// - `-I.cpm/<lib>/include -I.cpm/<lib>` to `CFLAGS`
/// - `-L.cpm/<lib>/lib` to `LDFLAGS`
/// - `-l<lib>` to `LDLIBS`
/// - every `.c` file below it (nested `.cpm/` included) to `LIB_SRC`
///
/// Project sources are every `.c` file below the root outside `.cpm/`.
/// The descriptor is never stored; it is recomputed on every run, so the
/// Makefile always reflects what is on disk.
///

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::Settings;
use crate::context::{ProjectContext, CACHE_DIR};
use crate::errors::CpmError;
use crate::manifest::{write_atomic, ManifestStore};
use crate::scanner::{scan, SourceFileSet};

pub const DEFAULT_TARGET: &str = "program";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildDescriptor {
    pub compiler: String,
    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,
    pub ldlibs: Vec<String>,
    pub sources: Vec<String>,
    pub lib_sources: Vec<String>,
    pub target: String,
}

impl BuildDescriptor {
    pub fn collect(ctx: &ProjectContext, settings: &Settings) -> Result<Self, CpmError> {
        let sources = scan(&ctx.root, true).relative_to(&ctx.root);

        let mut cflags: Vec<String> = settings
            .build
            .cflags
            .split_whitespace()
            .map(String::from)
            .collect();
        cflags.push("-I.".to_string());
        cflags.push(format!("-I{}/include", CACHE_DIR));

        let mut ldflags = Vec::new();
        let mut ldlibs = Vec::new();
        let mut lib_files = SourceFileSet::default();

        for lib in installed_libraries(&ctx.cache_dir) {
            cflags.push(format!("-I{}/{}/include", CACHE_DIR, lib));
            cflags.push(format!("-I{}/{}", CACHE_DIR, lib));
            ldflags.push(format!("-L{}/{}/lib", CACHE_DIR, lib));
            ldlibs.push(format!("-l{}", lib));
            lib_files.extend(scan(&ctx.cache_dir.join(&lib), false));
        }

        let target = project_name(ctx)?;

        Ok(Self {
            compiler: settings.build.compiler.clone(),
            cflags,
            ldflags,
            ldlibs,
            sources,
            lib_sources: lib_files.relative_to(&ctx.root),
            target,
        })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!("CC = {}\n", self.compiler));
        out.push_str(&variable("CFLAGS", &self.cflags));
        out.push_str(&variable("LDFLAGS", &self.ldflags));
        out.push_str(&variable("LDLIBS", &self.ldlibs));
        out.push('\n');
        out.push_str(&variable("SRC", &self.sources));
        out.push_str(&variable("LIB_SRC", &self.lib_sources));
        out.push_str("OBJ = $(SRC:.c=.o)\n");
        out.push_str("LIB_OBJ = $(LIB_SRC:.c=.o)\n");
        out.push_str(&format!("TARGET = {}\n\n", self.target));

        out.push_str("all: libs $(TARGET)\n\n");
        out.push_str("libs: $(LIB_OBJ)\n\n");
        out.push_str("$(TARGET): $(OBJ) $(LIB_OBJ)\n");
        out.push_str("\t$(CC) $(CFLAGS) -o $@ $(OBJ) $(LIB_OBJ) $(LDFLAGS) $(LDLIBS)\n\n");
        out.push_str("%.o: %.c\n");
        out.push_str("\t$(CC) $(CFLAGS) -c $< -o $@\n\n");
        out.push_str("clean:\n");
        out.push_str("\trm -f $(OBJ) $(LIB_OBJ) $(TARGET)\n\n");
        out.push_str(".PHONY: all libs clean\n");

        out
    }
}

fn variable(name: &str, values: &[String]) -> String {
    if values.is_empty() {
        format!("{} =\n", name)
    } else {
        format!("{} = {}\n", name, values.join(" "))
    }
}

/// Immediate subdirectories of the cache, sorted by name.
pub fn installed_libraries(cache_dir: &Path) -> Vec<String> {
    let entries = match std::fs::read_dir(cache_dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %cache_dir.display(), error = %e, "no package cache");
            return Vec::new();
        }
    };

    let mut libs: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    libs.sort();
    libs
}

fn project_name(ctx: &ProjectContext) -> Result<String, CpmError> {
    let store = ManifestStore::new(&ctx.manifest_path);
    match store.load() {
        Ok(manifest) => Ok(manifest
            .project_name()
            .unwrap_or_else(|| DEFAULT_TARGET.to_string())),
        Err(CpmError::ManifestNotFound { .. }) => Ok(DEFAULT_TARGET.to_string()),
        Err(e) => Err(e),
    }
}

/// Regenerates the project Makefile and returns its path.
pub fn synthesize(ctx: &ProjectContext, settings: &Settings) -> Result<PathBuf, CpmError> {
    let descriptor = BuildDescriptor::collect(ctx, settings)?;
    if descriptor.sources.is_empty() {
        warn!(root = %ctx.root.display(), "no project sources found");
    }

    let path = ctx.makefile_path();
    write_atomic(&path, descriptor.render())?;
    debug!(
        sources = descriptor.sources.len(),
        lib_sources = descriptor.lib_sources.len(),
        libraries = descriptor.ldlibs.len(),
        "wrote Makefile"
    );
    Ok(path)
}
