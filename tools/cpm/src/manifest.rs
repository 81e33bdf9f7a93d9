///
/// # Manifest
///
/// This module reads and rewrites `cpmfile`, the flat text manifest that
/// records which packages a project depends on.
///
/// ## Example cpmfile
///
/// ```text
/// name: demo
/// version: 0.1.0
///
/// zlib 1.3
/// cjson 1.7.18
/// ```
///
/// ## Line Classification
///
/// A line is a package entry when it splits into exactly two whitespace
/// separated tokens and the first token is not a header key (`name:`) or a
/// comment (`#`). Every other line is opaque and survives rewrites verbatim.
///
/// Lines are kept as raw bytes. They are classified through a lossy UTF-8
/// view, so a comment in Latin-1 neither breaks loading nor gets rewritten.
///
/// ## Rewriting
///
/// Edits are computed by the pure function `apply_edit()` over the current
/// lines, then persisted by `ManifestStore` through a temporary file in the
/// same directory that is atomically renamed over `cpmfile`. A crash half
/// way through a rewrite leaves the old manifest in place.
///

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::context::is_single_component;
use crate::errors::CpmError;

pub const DEFAULT_PROJECT_NAME: &str = "myproject";
pub const DEFAULT_PROJECT_VERSION: &str = "0.1.0";
pub const MAX_NAME_LEN: usize = 255;
pub const MAX_VERSION_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageEntry {
    pub name: String,
    pub version: String,
}

impl PackageEntry {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    pub fn parse(line: &str) -> Option<Self> {
        let mut tokens = line.split_whitespace();
        let name = tokens.next()?;
        let version = tokens.next()?;

        if tokens.next().is_some() || is_header_token(name) {
            return None;
        }

        Some(Self::new(name, version))
    }

    pub fn to_line(&self) -> String {
        format!("{} {}", self.name, self.version)
    }
}

fn is_header_token(token: &str) -> bool {
    token.ends_with(':') || token.starts_with('#')
}

/// Rejects names and versions that could not be read back as a single entry.
pub fn validate_entry(name: &str, version: &str) -> Result<(), CpmError> {
    check_token("package name", name, MAX_NAME_LEN)?;
    check_token("version", version, MAX_VERSION_LEN)?;

    if is_header_token(name) {
        return Err(CpmError::Usage(format!(
            "Invalid package name '{}': must not start with '#' or end with ':'",
            name
        )));
    }
    if !is_single_component(name) {
        return Err(CpmError::Usage(format!(
            "Invalid package name '{}': must not contain '/' or '\\' or be '.' or '..'",
            name
        )));
    }
    if version.contains(['/', '\\']) {
        return Err(CpmError::Usage(format!(
            "Invalid version '{}': must not contain '/' or '\\'",
            version
        )));
    }

    Ok(())
}

fn check_token(what: &str, value: &str, max_len: usize) -> Result<(), CpmError> {
    if value.is_empty() {
        return Err(CpmError::Usage(format!("The {} must not be empty", what)));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(CpmError::Usage(format!(
            "Invalid {} '{}': must not contain whitespace",
            what, value
        )));
    }
    if value.len() > max_len {
        return Err(CpmError::Usage(format!(
            "Invalid {} '{}': longer than {} bytes",
            what, value, max_len
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestEdit {
    Upsert { name: String, version: String },
    Remove { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Inserted,
    Replaced { previous: String },
    Removed(PackageEntry),
    NotFound,
}

/// Applies one edit to the manifest lines without touching the filesystem.
///
/// Upsert replaces the first entry carrying the name in place and appends
/// when there is none. Later entries with the same name are dropped so a
/// name never appears twice. Remove drops every entry carrying the name.
pub fn apply_edit(lines: &[Vec<u8>], edit: &ManifestEdit) -> (Vec<Vec<u8>>, EditOutcome) {
    let target = match edit {
        ManifestEdit::Upsert { name, .. } | ManifestEdit::Remove { name } => name.as_str(),
    };

    let mut out = Vec::with_capacity(lines.len() + 1);
    let mut outcome = EditOutcome::NotFound;

    for line in lines {
        let entry = match parse_entry(line) {
            Some(entry) if entry.name == target => entry,
            _ => {
                out.push(line.clone());
                continue;
            }
        };

        if outcome != EditOutcome::NotFound {
            continue;
        }

        outcome = match edit {
            ManifestEdit::Upsert { name, version } => {
                out.push(PackageEntry::new(name.as_str(), version.as_str()).to_line().into_bytes());
                EditOutcome::Replaced {
                    previous: entry.version,
                }
            }
            ManifestEdit::Remove { .. } => EditOutcome::Removed(entry),
        };
    }

    if let ManifestEdit::Upsert { name, version } = edit {
        if outcome == EditOutcome::NotFound {
            out.push(PackageEntry::new(name.as_str(), version.as_str()).to_line().into_bytes());
            outcome = EditOutcome::Inserted;
        }
    }

    (out, outcome)
}

pub fn default_manifest(name: &str) -> String {
    format!("name: {}\nversion: {}\n\n", name, DEFAULT_PROJECT_VERSION)
}

fn parse_entry(line: &[u8]) -> Option<PackageEntry> {
    PackageEntry::parse(&String::from_utf8_lossy(line))
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    lines: Vec<Vec<u8>>,
}

impl Manifest {
    /// Splits on `\n` only; a `\r` before it stays part of the line.
    pub fn parse(content: &[u8]) -> Self {
        let mut lines: Vec<Vec<u8>> = content.split(|&b| b == b'\n').map(<[u8]>::to_vec).collect();
        if lines.last().is_some_and(Vec::is_empty) {
            lines.pop();
        }
        Self { lines }
    }

    pub fn lines(&self) -> &[Vec<u8>] {
        &self.lines
    }

    pub fn entries(&self) -> impl Iterator<Item = PackageEntry> + '_ {
        self.lines.iter().filter_map(|line| parse_entry(line))
    }

    pub fn get(&self, name: &str) -> Option<PackageEntry> {
        self.entries().find(|entry| entry.name == name)
    }

    /// Project name from a well-formed `name: <token>` first line.
    pub fn project_name(&self) -> Option<String> {
        header_value(self.lines.first()?, "name:")
    }

    pub fn project_version(&self) -> Option<String> {
        self.lines
            .iter()
            .find_map(|line| header_value(line, "version:"))
    }
}

fn header_value(line: &[u8], key: &str) -> Option<String> {
    let text = String::from_utf8_lossy(line);
    let value = text.strip_prefix(key)?.split_whitespace().next()?;
    Some(value.to_string())
}

fn render_lines(lines: &[Vec<u8>]) -> Vec<u8> {
    let mut out = Vec::with_capacity(lines.iter().map(|line| line.len() + 1).sum());
    for line in lines {
        out.extend_from_slice(line);
        out.push(b'\n');
    }
    out
}

pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<Manifest, CpmError> {
        match std::fs::read(&self.path) {
            Ok(content) => Ok(Manifest::parse(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CpmError::ManifestNotFound {
                    path: self.path.clone(),
                })
            }
            Err(e) => Err(CpmError::Io(e)),
        }
    }

    /// Writes a fresh header-only manifest, replacing any existing one.
    pub fn create(&self, project_name: &str) -> Result<(), CpmError> {
        self.persist(default_manifest(project_name).as_bytes())
    }

    pub fn load_or_default(&self) -> Result<Manifest, CpmError> {
        if !self.exists() {
            debug!(path = %self.path.display(), "creating default manifest");
            self.create(DEFAULT_PROJECT_NAME)?;
        }
        self.load()
    }

    pub fn list(&self) -> Result<Vec<PackageEntry>, CpmError> {
        Ok(self.load()?.entries().collect())
    }

    pub fn upsert(&self, name: &str, version: &str) -> Result<EditOutcome, CpmError> {
        let manifest = self.load()?;
        let edit = ManifestEdit::Upsert {
            name: name.to_string(),
            version: version.to_string(),
        };
        let (lines, outcome) = apply_edit(manifest.lines(), &edit);
        self.persist(&render_lines(&lines))?;
        Ok(outcome)
    }

    /// Removes `name`; the file is left untouched when it has no such entry.
    pub fn delete(&self, name: &str) -> Result<Option<PackageEntry>, CpmError> {
        let manifest = self.load()?;
        let edit = ManifestEdit::Remove {
            name: name.to_string(),
        };
        let (lines, outcome) = apply_edit(manifest.lines(), &edit);

        match outcome {
            EditOutcome::Removed(entry) => {
                self.persist(&render_lines(&lines))?;
                Ok(Some(entry))
            }
            _ => Ok(None),
        }
    }

    fn persist(&self, content: &[u8]) -> Result<(), CpmError> {
        write_atomic(&self.path, content)
    }
}

/// Writes `content` to a temporary sibling of `path` and renames it over
/// `path`. The temporary file is deleted if any step fails.
pub fn write_atomic(path: &Path, content: impl AsRef<[u8]>) -> Result<(), CpmError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| CpmError::write(path, e))?;
    temp.write_all(content.as_ref())
        .and_then(|_| temp.flush())
        .map_err(|e| CpmError::write(path, e))?;
    temp.persist(path).map_err(|e| CpmError::write(path, e.error))?;

    Ok(())
}
