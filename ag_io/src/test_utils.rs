//! Test utilities for ag
//!
//! Shared infrastructure for unit and integration tests:
//!
//! - `TestContext` - TempDir, MockServer and a wired [`Client`]
//! - Body helpers - chunked and failing response streams for mock transports
//! - `ProgressLog` - records every progress update of a transfer
//! - Network and filesystem failure helpers
//!
//! # Example
//!
//! ```ignore
//! use ag_io::test_utils::{TestContext, mock_installer_bytes};
//!
//! #[tokio::test]
//! async fn test_download() {
//!     let ctx = TestContext::new().await;
//!     ctx.mount_download("/files/setup.exe", mock_installer_bytes(1024)).await;
//!
//!     let path = ctx.client().dispatcher
//!         .download_to_dir(&ctx.url("/files/setup.exe"), &ctx.download_dir(), None, &Default::default())
//!         .await
//!         .unwrap();
//!     assert!(path.exists());
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::stream;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ag_core::{Config, Error, ProgressState};

use crate::progress::ProgressCallback;
use crate::setup::{Client, create_client};
use crate::traits::BodyStream;

// ============================================================================
// Fixtures
// ============================================================================

/// Deterministic binary payload that starts like a PE executable.
pub fn mock_installer_bytes(len: usize) -> Vec<u8> {
    let mut data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    for (slot, byte) in data.iter_mut().zip(b"MZ") {
        *slot = *byte;
    }
    data
}

/// Catalog record as served by `packages/<id>/latest`.
pub fn mock_package_json(id: &str, version: &str, name: &str) -> String {
    format!(
        r#"{{
            "id": "{id}",
            "version": "{version}",
            "name": "{name}",
            "manifestPath": "manifests/{id}/{id}.yaml",
            "tags": ["test"],
            "publisher": "Test Publisher"
        }}"#
    )
}

// ============================================================================
// Body streams
// ============================================================================

/// Body that yields `data` in pieces of `piece` bytes.
pub fn chunked_body(data: &[u8], piece: usize) -> BodyStream {
    let chunks: Vec<Result<Bytes, Error>> = data
        .chunks(piece.max(1))
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    Box::pin(stream::iter(chunks))
}

/// Body that yields `data` in pieces and then fails as a dropped connection would.
pub fn failing_body(data: &[u8], piece: usize) -> BodyStream {
    let mut chunks: Vec<Result<Bytes, Error>> = data
        .chunks(piece.max(1))
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    chunks.push(Err(Error::NetworkFailure {
        message: "connection reset by peer".to_string(),
    }));
    Box::pin(stream::iter(chunks))
}

// ============================================================================
// Progress recording
// ============================================================================

/// Collects every [`ProgressState`] a transfer reports.
#[derive(Clone, Default)]
pub struct ProgressLog {
    updates: Arc<Mutex<Vec<ProgressState>>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> ProgressCallback {
        let updates = self.updates.clone();
        Arc::new(move |state: &ProgressState| {
            updates.lock().unwrap().push(state.clone());
        })
    }

    pub fn updates(&self) -> Vec<ProgressState> {
        self.updates.lock().unwrap().clone()
    }

    pub fn completed(&self) -> usize {
        self.updates().iter().filter(|s| s.is_completed).count()
    }
}

// ============================================================================
// Network failure helpers
// ============================================================================

/// Response that waits `delay` before answering.
pub fn mock_timeout_response(delay: Duration, body: Option<Vec<u8>>) -> ResponseTemplate {
    let mut response = ResponseTemplate::new(200).set_delay(delay);
    if let Some(bytes) = body {
        response = response.set_body_bytes(bytes);
    }
    response
}

pub fn mock_500_error(message: Option<&str>) -> ResponseTemplate {
    let mut response = ResponseTemplate::new(500);
    if let Some(msg) = message {
        response = response.set_body_string(msg);
    }
    response
}

pub fn mock_404_error() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_string("Not Found")
}

/// HTML page served where an installer was expected.
pub fn mock_html_page() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        "<html><body>Please log in to download</body></html>",
        "text/html; charset=utf-8",
    )
}

// ============================================================================
// Filesystem failure helpers
// ============================================================================

/// Create a directory with read-only permissions.
///
/// # Note
/// Root may still be able to write to it; tests relying on this should
/// skip when running as root.
pub fn create_readonly_dir(parent: &Path, name: &str) -> std::io::Result<PathBuf> {
    let dir = parent.join(name);
    fs::create_dir_all(&dir)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o555))?;
    }

    #[cfg(not(unix))]
    {
        let mut perms = fs::metadata(&dir)?.permissions();
        perms.set_readonly(true);
        fs::set_permissions(&dir, perms)?;
    }

    Ok(dir)
}

/// Restore write permissions to a directory (cleanup helper).
pub fn restore_write_permissions(path: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }

    #[cfg(not(unix))]
    {
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_readonly(false);
        fs::set_permissions(path, perms)?;
    }

    Ok(())
}

// ============================================================================
// TestContext - Main test infrastructure
// ============================================================================

/// Temp directory, mock server and a client pointed at it.
///
/// The catalog lives under `/api/v1/` on the mock server; downloads can be
/// mounted at any other path.
pub struct TestContext {
    pub tmp: TempDir,
    pub mock_server: MockServer,
    client: Client,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::build(false).await
    }

    /// Same as [`new`](Self::new) with a metadata cache under the temp dir.
    pub async fn with_cache() -> Self {
        Self::build(true).await
    }

    async fn build(cache: bool) -> Self {
        let mock_server = MockServer::start().await;
        let tmp = TempDir::new().expect("failed to create temp dir");
        fs::create_dir_all(tmp.path().join("downloads")).expect("failed to create downloads dir");

        let config = test_config(&mock_server);
        let cache_path = tmp.path().join("cache/ag.sqlite3");
        let client = create_client(&config, cache.then_some(cache_path.as_path()));

        Self {
            tmp,
            mock_server,
            client,
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn config(&self) -> Config {
        test_config(&self.mock_server)
    }

    pub fn download_dir(&self) -> PathBuf {
        self.tmp.path().join("downloads")
    }

    /// Absolute URL on the mock server.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.mock_server.uri(), path)
    }

    pub fn catalog_url(&self) -> String {
        self.url("/api/v1/")
    }

    /// Serve `data` as a binary download at `url_path`.
    pub async fn mount_download(&self, url_path: &str, data: Vec<u8>) {
        self.mount_download_response(
            url_path,
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/octet-stream")
                .set_body_bytes(data),
        )
        .await;
    }

    pub async fn mount_download_response(&self, url_path: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(url_path))
            .respond_with(response)
            .mount(&self.mock_server)
            .await;
    }

    /// Answer `from` with a 302 to `to` on the same server.
    pub async fn mount_redirect(&self, from: &str, to: &str) {
        Mock::given(method("GET"))
            .and(path(from))
            .respond_with(ResponseTemplate::new(302).insert_header("Location", self.url(to).as_str()))
            .mount(&self.mock_server)
            .await;
    }

    pub async fn mount_package(&self, id: &str, version: &str, name: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/packages/{id}/latest")))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_package_json(id, version, name)))
            .mount(&self.mock_server)
            .await;
    }

    pub async fn mount_package_error(&self, id: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/packages/{id}/latest")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.mock_server)
            .await;
    }
}

fn test_config(server: &MockServer) -> Config {
    Config::default().with_catalog_url(format!("{}/api/v1/", server.uri()))
}

// ============================================================================
// Module tests
// ============================================================================
