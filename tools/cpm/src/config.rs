///
/// # Project Settings
///
/// Optional per-project configuration read from `cpm.toml` at the project
/// root. Every key has a default, so a project without the file behaves
/// exactly like one with an empty file.
///
/// ```toml
/// registry = "https://example.com/cpm-repo"
///
/// [build]
/// compiler = "clang"
/// cflags = "-O2 -std=c11"
/// ```
///
/// The `CPM_REGISTRY` environment variable takes precedence over `registry`.
///

use serde::Deserialize;
use std::path::Path;

use crate::context::ProjectContext;
use crate::errors::CpmError;

pub const DEFAULT_REGISTRY: &str =
    "https://raw.githubusercontent.com/neoapps-dev/cpm-repo/refs/heads/main";
pub const REGISTRY_ENV: &str = "CPM_REGISTRY";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub registry: String,
    pub build: BuildSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildSettings {
    pub compiler: String,
    pub cflags: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            registry: DEFAULT_REGISTRY.to_string(),
            build: BuildSettings::default(),
        }
    }
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            compiler: "gcc".to_string(),
            cflags: "-Wall -Wextra -std=c99".to_string(),
        }
    }
}

impl Settings {
    pub fn load(ctx: &ProjectContext) -> Result<Self, CpmError> {
        let mut settings = Self::from_file(&ctx.config_path())?;

        if let Ok(registry) = std::env::var(REGISTRY_ENV) {
            if !registry.trim().is_empty() {
                settings.registry = registry.trim().to_string();
            }
        }

        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, CpmError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse_str(&content).map_err(|reason| CpmError::Config {
                path: path.to_path_buf(),
                reason,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(CpmError::Io(e)),
        }
    }

    pub fn parse_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e: toml::de::Error| e.message().to_string())
    }

    /// `<registry>/<name>/<version>.tar.gz`
    pub fn package_url(&self, name: &str, version: &str) -> String {
        format!(
            "{}/{}/{}.tar.gz",
            self.registry.trim_end_matches('/'),
            name,
            version
        )
    }
}
