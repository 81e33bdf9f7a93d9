///
/// Package archive fetcher.
///
/// Downloads `<registry>/<name>/<version>.tar.gz`, stores it as
/// `.cpm/<name>-<version>.tar.gz` and extracts it into `.cpm/<name>/`.
///
/// The network client, the extraction tool and recursive directory removal
/// sit behind the `Transport`, `ArchiveExtractor` and `RecursiveDeleter`
/// traits so the orchestration can run against fakes in tests.
///
/// The whole response body is buffered in memory before it is written.
/// A failed extraction is not rolled back; whatever `tar` left behind stays.
///

use std::error::Error as StdError;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use http_body_util::{BodyExt, Empty};
use hyper::body::Bytes;
use hyper::header::{ACCEPT, LOCATION, USER_AGENT};
use hyper::{Method, Request, Uri};
use hyper_rustls::HttpsConnectorBuilder;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use rustls::{ClientConfig, RootCertStore};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::config::Settings;
use crate::context::{ensure_directory, ProjectContext};
use crate::errors::CpmError;

pub const MAX_REDIRECTS: usize = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub fn user_agent() -> String {
    format!("cpm/{}", env!("CARGO_PKG_VERSION"))
}

pub trait Transport {
    /// Returns the complete body of a successful response.
    fn get(&self, url: &str) -> Result<Vec<u8>, CpmError>;
}

pub trait ArchiveExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), CpmError>;
}

pub trait RecursiveDeleter {
    /// Removing a path that does not exist succeeds.
    fn remove_all(&self, path: &Path) -> Result<(), CpmError>;
}

pub struct HttpTransport {
    runtime: Runtime,
    user_agent: String,
}

impl HttpTransport {
    pub fn new() -> Result<Self, CpmError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            runtime,
            user_agent: user_agent(),
        })
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, String> {
        let tls = tls_config()?;
        let https = HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .build();
        let client: Client<_, Empty<Bytes>> = Client::builder(TokioExecutor::new()).build(https);

        let mut uri: Uri = url
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| format!("invalid URL: {}", e))?;

        for _ in 0..=MAX_REDIRECTS {
            let request = Request::builder()
                .method(Method::GET)
                .uri(uri.clone())
                .header(USER_AGENT, self.user_agent.as_str())
                .header(ACCEPT, "*/*")
                .body(Empty::<Bytes>::new())
                .map_err(|e| e.to_string())?;

            let response = tokio::time::timeout(REQUEST_TIMEOUT, client.request(request))
                .await
                .map_err(|_| format!("request timed out after {}s", REQUEST_TIMEOUT.as_secs()))?
                .map_err(|e| describe(&e))?;

            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| format!("HTTP {} without a Location header", status))?;
                let next = resolve_redirect(&uri, location)?;
                debug!(from = %uri, to = %next, "following redirect");
                uri = next;
                continue;
            }

            if !status.is_success() {
                return Err(format!("HTTP {}", status));
            }

            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| describe(&e))?
                .to_bytes();
            return Ok(body.to_vec());
        }

        Err(format!("more than {} redirects", MAX_REDIRECTS))
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, CpmError> {
        self.runtime
            .block_on(self.fetch(url))
            .map_err(|reason| CpmError::Transport {
                url: url.to_string(),
                reason,
            })
    }
}

fn tls_config() -> Result<ClientConfig, String> {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| format!("TLS setup failed: {}", e))?
    .with_root_certificates(root_store)
    .with_no_client_auth();

    Ok(config)
}

fn describe(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Resolves a `Location` header value against the URI that produced it.
pub fn resolve_redirect(base: &Uri, location: &str) -> Result<Uri, String> {
    let invalid = |e: &dyn std::fmt::Display| format!("invalid redirect '{}': {}", location, e);

    if let Ok(uri) = location.parse::<Uri>() {
        if uri.scheme().is_some() && uri.authority().is_some() {
            return Ok(uri);
        }
    }

    let path = if let Some(rest) = location.strip_prefix("//") {
        let scheme = base.scheme_str().unwrap_or("https");
        return format!("{}://{}", scheme, rest)
            .parse::<Uri>()
            .map_err(|e| invalid(&e));
    } else if location.starts_with('/') {
        location.to_string()
    } else {
        let base_path = base.path();
        let dir = &base_path[..base_path.rfind('/').map(|i| i + 1).unwrap_or(0)];
        format!("{}{}", if dir.is_empty() { "/" } else { dir }, location)
    };

    let mut builder = Uri::builder().path_and_query(path.as_str());
    if let Some(scheme) = base.scheme() {
        builder = builder.scheme(scheme.clone());
    }
    if let Some(authority) = base.authority() {
        builder = builder.authority(authority.clone());
    }
    builder.build().map_err(|e| invalid(&e))
}

pub struct TarExtractor;

impl ArchiveExtractor for TarExtractor {
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), CpmError> {
        let package = dest
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| dest.display().to_string());

        let output = Command::new("tar")
            .arg("-xzf")
            .arg(archive)
            .arg("-C")
            .arg(dest)
            .output()
            .map_err(|e| CpmError::Extraction {
                package: package.clone(),
                reason: format!("failed to run tar: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CpmError::Extraction {
                package,
                reason: format!("tar exited with {}: {}", output.status, stderr.trim()),
            });
        }

        Ok(())
    }
}

pub struct FsDeleter;

impl RecursiveDeleter for FsDeleter {
    fn remove_all(&self, path: &Path) -> Result<(), CpmError> {
        match std::fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CpmError::Io(e)),
        }
    }
}

pub struct Fetcher<'a> {
    ctx: &'a ProjectContext,
    settings: &'a Settings,
    transport: &'a dyn Transport,
    extractor: &'a dyn ArchiveExtractor,
}

impl<'a> Fetcher<'a> {
    pub fn new(
        ctx: &'a ProjectContext,
        settings: &'a Settings,
        transport: &'a dyn Transport,
        extractor: &'a dyn ArchiveExtractor,
    ) -> Self {
        Self {
            ctx,
            settings,
            transport,
            extractor,
        }
    }

    pub fn fetch(&self, name: &str, version: &str) -> Result<(), CpmError> {
        let url = self.settings.package_url(name, version);
        let package_dir = self.ctx.checked_package_dir(name)?;
        let archive = self.ctx.checked_archive_path(name, version)?;

        ensure_directory(&package_dir)?;

        debug!(%url, "downloading package");
        let body = self.transport.get(&url)?;
        debug!(bytes = body.len(), archive = %archive.display(), "writing archive");

        std::fs::write(&archive, &body).map_err(|e| CpmError::write(&archive, e))?;
        self.extractor.extract(&archive, &package_dir)?;

        info!(package = name, version, "installed package");
        Ok(())
    }
}
