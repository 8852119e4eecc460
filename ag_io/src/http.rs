//! HTTP(S) transfer handler.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use ag_core::{
    Config, Error, ProgressState, has_installer_extension, is_http_source, partial_path,
    url_file_name,
};

use crate::progress::{ProgressCallback, report};
use crate::protocol::TransferProtocolHandler;
use crate::traits::{FileSystem, HttpRequest, Transport};

pub struct HttpTransferClient {
    transport: Arc<dyn Transport>,
    fs: Arc<dyn FileSystem>,
    chunk_size: usize,
    max_redirects: usize,
    keep_partial_on_failure: bool,
}

impl HttpTransferClient {
    pub fn new(transport: Arc<dyn Transport>, fs: Arc<dyn FileSystem>) -> Self {
        Self::with_config(transport, fs, &Config::default())
    }

    pub fn with_config(
        transport: Arc<dyn Transport>,
        fs: Arc<dyn FileSystem>,
        config: &Config,
    ) -> Self {
        Self {
            transport,
            fs,
            chunk_size: config.chunk_size.max(1),
            max_redirects: config.max_redirects,
            keep_partial_on_failure: config.keep_partial_on_failure,
        }
    }
}

#[async_trait]
impl TransferProtocolHandler for HttpTransferClient {
    fn name(&self) -> &'static str {
        "http"
    }

    fn can_handle(&self, source: &str) -> bool {
        is_http_source(source)
    }

    async fn resolve_file_name(&self, source: &str) -> Result<String, Error> {
        let mut current = source.to_string();

        // Redirects are followed iteratively; each hop re-checks the URL path first.
        for hop in 0..=self.max_redirects {
            if let Some(name) = url_file_name(&current)
                && has_installer_extension(&name)
            {
                return Ok(name);
            }

            let response = self.transport.get(HttpRequest::get(current.as_str())).await?;

            if !same_url(&response.url, &current) {
                debug!(from = %current, to = %response.url, hop, "following redirect");
                current = response.url.clone();
                continue;
            }

            if let Some(name) = response.content_disposition_file_name() {
                return Ok(name);
            }

            return Err(Error::InvalidDownloadUrl {
                source: source.to_string(),
                detail: None,
            });
        }

        Err(Error::TooManyRedirects {
            source: source.to_string(),
            hops: self.max_redirects,
        })
    }

    async fn transfer(
        &self,
        source: &str,
        destination: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<(), Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let response = self.transport.get(HttpRequest::get(source)).await?;

        if let Some(content_type) = response.content_type()
            && content_type.contains("text")
        {
            return Err(Error::InvalidDownloadUrl {
                source: source.to_string(),
                detail: Some(format!("[ContentType={content_type}]")),
            });
        }

        let mut state = ProgressState::new(response.content_length());
        debug!(
            source,
            destination = %destination.display(),
            total = ?state.max_value,
            "starting transfer"
        );

        let mut partial = PartialFile::create(
            self.fs.as_ref(),
            partial_path(destination),
            self.keep_partial_on_failure,
        )?;
        let mut body = response.into_body();
        let mut pending = BytesMut::with_capacity(self.chunk_size);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                next = body.next() => next,
            };
            let Some(chunk) = next else {
                break;
            };

            pending.extend_from_slice(&chunk?);
            while pending.len() >= self.chunk_size {
                let chunk = pending.split_to(self.chunk_size);
                write_chunk(&mut partial, &chunk, &mut state, progress.as_ref(), cancel)?;
            }
        }
        if !pending.is_empty() {
            write_chunk(&mut partial, &pending, &mut state, progress.as_ref(), cancel)?;
        }

        partial.commit(destination)?;

        state.is_completed = true;
        report(progress.as_ref(), &state);

        debug!(source, bytes = state.value, "transfer complete");
        Ok(())
    }

    async fn read_string(&self, source: &str) -> Result<String, Error> {
        let request = HttpRequest::get(cache_busting_url(source)?)
            .header("Cache-Control", "no-cache, no-store")
            .header("Pragma", "no-cache");

        self.transport.get(request).await?.text().await
    }
}

fn write_chunk(
    partial: &mut PartialFile<'_>,
    chunk: &[u8],
    state: &mut ProgressState,
    progress: Option<&ProgressCallback>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    partial.write_all(chunk)?;
    state.advance(chunk.len() as u64);
    report(progress, state);
    Ok(())
}

fn same_url(a: &str, b: &str) -> bool {
    match (reqwest::Url::parse(a), reqwest::Url::parse(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Append a `cache=<timestamp>` query parameter, keeping any existing query.
fn cache_busting_url(source: &str) -> Result<String, Error> {
    let mut url = reqwest::Url::parse(source).map_err(|e| Error::InvalidDownloadUrl {
        source: source.to_string(),
        detail: Some(format!("[{e}]")),
    })?;
    let ticks = chrono::Utc::now().timestamp_micros();
    url.query_pairs_mut()
        .append_pair("cache", &ticks.to_string());
    Ok(url.to_string())
}

/// `<destination>.PARTIAL` while it is being written.
///
/// Dropping it without [`commit`](Self::commit) removes the file unless the
/// caller asked to keep partial downloads.
struct PartialFile<'a> {
    fs: &'a dyn FileSystem,
    path: PathBuf,
    writer: Option<Box<dyn Write + Send>>,
    keep_on_failure: bool,
    committed: bool,
}

impl<'a> PartialFile<'a> {
    fn create(fs: &'a dyn FileSystem, path: PathBuf, keep_on_failure: bool) -> Result<Self, Error> {
        let writer = fs.create(&path)?;
        Ok(Self {
            fs,
            path,
            writer: Some(writer),
            keep_on_failure,
            committed: false,
        })
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<(), Error> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| Error::filesystem(&self.path, "partial file already closed"))?;
        writer
            .write_all(buf)
            .map_err(|e| Error::filesystem(&self.path, format!("failed to write: {e}")))
    }

    fn commit(mut self, destination: &Path) -> Result<(), Error> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .map_err(|e| Error::filesystem(&self.path, format!("failed to flush: {e}")))?;
        }

        self.fs.rename(&self.path, destination)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialFile<'_> {
    fn drop(&mut self) {
        // Close the handle before removing the file.
        self.writer.take();

        if self.committed || self.keep_on_failure {
            return;
        }
        if self.fs.exists(&self.path)
            && let Err(e) = self.fs.remove_file(&self.path)
        {
            warn!(path = %self.path.display(), error = %e, "failed to remove partial download");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ProgressLog, chunked_body, failing_body, mock_installer_bytes};
    use crate::traits::{HttpResponse, MockFileSystem, MockTransport, ReqwestTransport, StdFileSystem};
    use std::fs;
    use std::io;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_with(transport: MockTransport) -> HttpTransferClient {
        HttpTransferClient::new(Arc::new(transport), Arc::new(StdFileSystem::new()))
    }

    fn binary_response(url: &str, data: &[u8], piece: usize) -> HttpResponse {
        HttpResponse::new(url, 200)
            .with_header("Content-Type", "application/octet-stream")
            .with_header("Content-Length", data.len().to_string())
            .with_body_stream(chunked_body(data, piece))
    }

    // ========================================================================
    // can_handle
    // ========================================================================

    #[test]
    fn handles_http_and_https_only() {
        let client = client_with(MockTransport::new());
        assert!(client.can_handle("http://example.com/a.exe"));
        assert!(client.can_handle("HTTPS://EXAMPLE.COM/a.exe"));
        assert!(!client.can_handle("ftp://example.com/a.exe"));
        assert!(!client.can_handle("/local/path/a.exe"));
    }

    // ========================================================================
    // resolve_file_name
    // ========================================================================

    #[tokio::test]
    async fn installer_extension_resolves_without_network() {
        let mut transport = MockTransport::new();
        transport.expect_get().never();

        let client = client_with(transport);
        let name = client
            .resolve_file_name("https://example.com/tools/setup.msi")
            .await
            .unwrap();

        assert_eq!(name, "setup.msi");
    }

    #[tokio::test]
    async fn redirect_to_installer_url_resolves_from_final_url() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .withf(|req| req.url == "https://example.com/download?id=42")
            .times(1)
            .returning(|_| Ok(HttpResponse::new("https://cdn.example.com/app-v2.exe", 200)));

        let client = client_with(transport);
        let name = client
            .resolve_file_name("https://example.com/download?id=42")
            .await
            .unwrap();

        assert_eq!(name, "app-v2.exe");
    }

    #[tokio::test]
    async fn encoded_separators_in_url_resolve_to_bare_name() {
        let mut transport = MockTransport::new();
        transport.expect_get().never();

        let name = client_with(transport)
            .resolve_file_name("https://evil.example/dl/..%2F..%2Fpwned.exe")
            .await
            .unwrap();

        assert_eq!(name, "pwned.exe");
    }

    #[tokio::test]
    async fn redirect_to_encoded_separators_resolves_to_bare_name() {
        let mut transport = MockTransport::new();
        transport.expect_get().times(1).returning(|_| {
            Ok(HttpResponse::new("https://cdn.example.com/dl/..%2F..%2Fpwned.zip", 200))
        });

        let name = client_with(transport)
            .resolve_file_name("https://example.com/latest")
            .await
            .unwrap();

        assert_eq!(name, "pwned.zip");
    }

    #[tokio::test]
    async fn content_disposition_names_the_file() {
        let mut transport = MockTransport::new();
        transport.expect_get().times(1).returning(|req| {
            Ok(HttpResponse::new(req.url, 200)
                .with_header("Content-Disposition", "attachment; filename=\" Tool Setup.exe \""))
        });

        let client = client_with(transport);
        let name = client
            .resolve_file_name("https://example.com/latest")
            .await
            .unwrap();

        assert_eq!(name, "Tool Setup.exe");
    }

    #[tokio::test]
    async fn unresolvable_name_reports_original_source() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .times(1)
            .returning(|req| Ok(HttpResponse::new(req.url, 200)));

        let client = client_with(transport);
        let err = client
            .resolve_file_name("https://example.com/latest")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            Error::InvalidDownloadUrl {
                source: "https://example.com/latest".to_string(),
                detail: None,
            }
        );
    }

    #[tokio::test]
    async fn unresolvable_name_after_redirect_still_reports_original_source() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .withf(|req| req.url == "https://example.com/go")
            .times(1)
            .returning(|_| Ok(HttpResponse::new("https://cdn.example.com/blob", 200)));
        transport
            .expect_get()
            .withf(|req| req.url == "https://cdn.example.com/blob")
            .times(1)
            .returning(|req| Ok(HttpResponse::new(req.url, 200)));

        let client = client_with(transport);
        let err = client.resolve_file_name("https://example.com/go").await.unwrap_err();

        assert!(matches!(
            err,
            Error::InvalidDownloadUrl { source, .. } if source == "https://example.com/go"
        ));
    }

    #[tokio::test]
    async fn redirect_loop_is_bounded() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .times(3)
            .returning(|req| Ok(HttpResponse::new(format!("{}/next", req.url), 200)));

        let config = Config {
            max_redirects: 2,
            ..Config::default()
        };
        let client = HttpTransferClient::with_config(
            Arc::new(transport),
            Arc::new(StdFileSystem::new()),
            &config,
        );
        let err = client
            .resolve_file_name("https://example.com/loop")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            Error::TooManyRedirects {
                source: "https://example.com/loop".to_string(),
                hops: 2,
            }
        );
    }

    #[tokio::test]
    async fn real_redirect_chain_longer_than_limit_fails() {
        let server = MockServer::start().await;
        for (from, to) in [("/go", "/h1"), ("/h1", "/h2"), ("/h2", "/h3"), ("/h3", "/deep.bin")] {
            Mock::given(method("GET"))
                .and(path(from))
                .respond_with(
                    ResponseTemplate::new(302)
                        .insert_header("Location", format!("{}{}", server.uri(), to).as_str()),
                )
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/deep.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 8]))
            .mount(&server)
            .await;

        let config = Config {
            max_redirects: 1,
            ..Config::default()
        };
        let client = HttpTransferClient::with_config(
            Arc::new(ReqwestTransport::from_config(&config)),
            Arc::new(StdFileSystem::new()),
            &config,
        );
        let source = format!("{}/go", server.uri());
        let err = client.resolve_file_name(&source).await.unwrap_err();

        assert_eq!(err, Error::TooManyRedirects { source, hops: 1 });
    }

    #[tokio::test]
    async fn resolve_propagates_transport_errors() {
        let mut transport = MockTransport::new();
        transport.expect_get().returning(|req| {
            Err(Error::HttpStatus {
                url: req.url,
                status: 500,
            })
        });

        let err = client_with(transport)
            .resolve_file_name("https://example.com/latest")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::HttpStatus { status: 500, .. }));
    }

    #[tokio::test]
    async fn resolve_follows_real_redirect_to_content_disposition() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/download"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/files/latest", server.uri()).as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/files/latest"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Disposition", "attachment; filename=\"tool-1.2.zip\"")
                    .set_body_bytes(vec![0u8; 16]),
            )
            .mount(&server)
            .await;

        let client = HttpTransferClient::new(
            Arc::new(ReqwestTransport::new()),
            Arc::new(StdFileSystem::new()),
        );
        let name = client
            .resolve_file_name(&format!("{}/download", server.uri()))
            .await
            .unwrap();

        assert_eq!(name, "tool-1.2.zip");
    }

    // ========================================================================
    // transfer
    // ========================================================================

    #[tokio::test]
    async fn text_content_is_rejected_before_touching_disk() {
        let mut transport = MockTransport::new();
        transport.expect_get().returning(|req| {
            Ok(HttpResponse::new(req.url, 200)
                .with_header("Content-Type", "text/html; charset=utf-8")
                .with_body("<html>error</html>"))
        });
        // No expectations: any filesystem call panics.
        let fs = MockFileSystem::new();

        let client = HttpTransferClient::new(Arc::new(transport), Arc::new(fs));
        let err = client
            .transfer(
                "https://example.com/setup",
                Path::new("/downloads/setup.exe"),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match err {
            Error::InvalidDownloadUrl { source, detail } => {
                assert_eq!(source, "https://example.com/setup");
                assert_eq!(detail.as_deref(), Some("[ContentType=text/html]"));
            }
            other => panic!("expected InvalidDownloadUrl, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn progress_is_reported_per_fixed_chunk() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("setup.exe");
        let data = mock_installer_bytes(3 * 8192 + 100);

        let body = data.clone();
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .returning(move |req| Ok(binary_response(&req.url, &body, 5000)));

        let log = ProgressLog::new();
        client_with(transport)
            .transfer(
                "https://example.com/setup.exe",
                &dest,
                Some(log.callback()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let updates = log.updates();
        let (last, rest) = updates.split_last().unwrap();
        assert_eq!(rest.len(), data.len().div_ceil(8192));
        assert!(rest.iter().all(|s| !s.is_completed));
        assert!(rest.iter().all(|s| s.max_value == Some(data.len() as u64)));
        assert!(updates.windows(2).all(|w| w[0].value <= w[1].value));
        assert_eq!(rest[0].value, 8192);
        assert_eq!(last.value, data.len() as u64);
        assert!(last.is_completed);

        assert_eq!(fs::read(&dest).unwrap(), data);
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn exact_multiple_of_chunk_size() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("a.zip");
        let data = mock_installer_bytes(2 * 8192);

        let body = data.clone();
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .returning(move |req| Ok(binary_response(&req.url, &body, 3000)));

        let log = ProgressLog::new();
        client_with(transport)
            .transfer("https://example.com/a.zip", &dest, Some(log.callback()), &CancellationToken::new())
            .await
            .unwrap();

        let values: Vec<u64> = log.updates().iter().map(|s| s.value).collect();
        assert_eq!(values, vec![8192, 16384, 16384]);
    }

    #[tokio::test]
    async fn empty_body_only_reports_completion() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("empty.msi");

        let mut transport = MockTransport::new();
        transport.expect_get().returning(|req| {
            Ok(HttpResponse::new(req.url, 200).with_header("Content-Length", "0"))
        });

        let log = ProgressLog::new();
        client_with(transport)
            .transfer("https://example.com/empty.msi", &dest, Some(log.callback()), &CancellationToken::new())
            .await
            .unwrap();

        let updates = log.updates();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].is_completed);
        assert_eq!(updates[0].value, 0);
        assert!(dest.exists());
    }

    #[tokio::test]
    async fn missing_content_length_leaves_total_unknown() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("a.exe");

        let mut transport = MockTransport::new();
        transport.expect_get().returning(|req| {
            Ok(HttpResponse::new(req.url, 200).with_body_stream(chunked_body(&[1u8; 100], 10)))
        });

        let log = ProgressLog::new();
        client_with(transport)
            .transfer("https://example.com/a.exe", &dest, Some(log.callback()), &CancellationToken::new())
            .await
            .unwrap();

        assert!(log.updates().iter().all(|s| s.max_value.is_none()));
    }

    #[tokio::test]
    async fn mid_stream_failure_leaves_destination_absent() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("setup.exe");

        let mut transport = MockTransport::new();
        transport.expect_get().returning(|req| {
            Ok(HttpResponse::new(req.url, 200)
                .with_header("Content-Length", "50000")
                .with_body_stream(failing_body(&mock_installer_bytes(20_000), 4096)))
        });

        let log = ProgressLog::new();
        let err = client_with(transport)
            .transfer("https://example.com/setup.exe", &dest, Some(log.callback()), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NetworkFailure { .. }));
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
        assert!(log.updates().iter().all(|s| !s.is_completed));
    }

    #[tokio::test]
    async fn mid_stream_failure_keeps_previous_destination() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("setup.exe");
        fs::write(&dest, b"previous complete installer").unwrap();

        let mut transport = MockTransport::new();
        transport.expect_get().returning(|req| {
            Ok(HttpResponse::new(req.url, 200)
                .with_body_stream(failing_body(&mock_installer_bytes(30_000), 8192)))
        });

        let result = client_with(transport)
            .transfer("https://example.com/setup.exe", &dest, None, &CancellationToken::new())
            .await;

        assert!(result.is_err());
        assert_eq!(fs::read(&dest).unwrap(), b"previous complete installer");
    }

    #[tokio::test]
    async fn partial_file_is_kept_when_configured() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("setup.exe");

        let mut transport = MockTransport::new();
        transport.expect_get().returning(|req| {
            Ok(HttpResponse::new(req.url, 200)
                .with_body_stream(failing_body(&mock_installer_bytes(10_000), 10_000)))
        });

        let config = Config {
            keep_partial_on_failure: true,
            ..Config::default()
        };
        let client = HttpTransferClient::with_config(
            Arc::new(transport),
            Arc::new(StdFileSystem::new()),
            &config,
        );
        let result = client
            .transfer("https://example.com/setup.exe", &dest, None, &CancellationToken::new())
            .await;

        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn successful_transfer_replaces_existing_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("setup.exe");
        fs::write(&dest, b"old").unwrap();
        let data = mock_installer_bytes(12_345);

        let body = data.clone();
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .returning(move |req| Ok(binary_response(&req.url, &body, 4096)));

        client_with(transport)
            .transfer("https://example.com/setup.exe", &dest, None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(fs::read(&dest).unwrap(), data);
    }

    #[tokio::test]
    async fn cancellation_discards_partial_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("big.zip");

        let mut transport = MockTransport::new();
        transport.expect_get().returning(|req| {
            Ok(binary_response(&req.url, &mock_installer_bytes(10 * 8192), 8192))
        });

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let log = ProgressLog::new();
        let inner = log.callback();
        let progress: ProgressCallback = Arc::new(move |state: &ProgressState| {
            inner(state);
            if state.value >= 2 * 8192 {
                trigger.cancel();
            }
        });

        let err = client_with(transport)
            .transfer("https://example.com/big.zip", &dest, Some(progress), &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, Error::Cancelled);
        assert_eq!(log.updates().len(), 2);
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[tokio::test]
    async fn disk_write_failure_is_propagated_without_rename() {
        struct FullDisk;

        impl Write for FullDisk {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::other("no space left on device"))
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut transport = MockTransport::new();
        transport.expect_get().returning(|req| {
            Ok(binary_response(&req.url, &mock_installer_bytes(9000), 9000))
        });

        let mut fs = MockFileSystem::new();
        fs.expect_create()
            .withf(|p| p == Path::new("/downloads/setup.exe.PARTIAL"))
            .times(1)
            .returning(|_| Ok(Box::new(FullDisk) as Box<dyn Write + Send>));
        fs.expect_rename().never();
        fs.expect_exists().returning(|_| true);
        fs.expect_remove_file()
            .withf(|p| p == Path::new("/downloads/setup.exe.PARTIAL"))
            .times(1)
            .returning(|_| Ok(()));

        let client = HttpTransferClient::new(Arc::new(transport), Arc::new(fs));
        let err = client
            .transfer(
                "https://example.com/setup.exe",
                Path::new("/downloads/setup.exe"),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match err {
            Error::FileSystem { message, .. } => assert!(message.contains("no space left")),
            other => panic!("expected FileSystem error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn transfer_streams_from_real_server() {
        let server = MockServer::start().await;
        let data = mock_installer_bytes(100_000);
        Mock::given(method("GET"))
            .and(path("/releases/tool.zip"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Type", "application/zip")
                    .set_body_bytes(data.clone()),
            )
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("tool.zip");
        let log = ProgressLog::new();
        let client = HttpTransferClient::new(
            Arc::new(ReqwestTransport::new()),
            Arc::new(StdFileSystem::new()),
        );
        client
            .transfer(
                &format!("{}/releases/tool.zip", server.uri()),
                &dest,
                Some(log.callback()),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(fs::read(&dest).unwrap(), data);
        let updates = log.updates();
        assert_eq!(updates.len(), data.len().div_ceil(8192) + 1);
        assert_eq!(updates.last().unwrap().value, 100_000);
    }

    #[tokio::test]
    async fn transfer_http_error_creates_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("gone.exe");
        let client = HttpTransferClient::new(
            Arc::new(ReqwestTransport::new()),
            Arc::new(StdFileSystem::new()),
        );
        let err = client
            .transfer(&format!("{}/gone.exe", server.uri()), &dest, None, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    // ========================================================================
    // read_string
    // ========================================================================

    #[tokio::test]
    async fn read_string_defeats_caches() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .withf(|req| {
                req.url.starts_with("https://example.com/latest.json?v=2&cache=")
                    && req.header_value("Cache-Control") == Some("no-cache, no-store")
                    && req.header_value("Pragma") == Some("no-cache")
            })
            .times(1)
            .returning(|req| Ok(HttpResponse::new(req.url, 200).with_body("{\"version\":\"1.0\"}")));

        let text = client_with(transport)
            .read_string("https://example.com/latest.json?v=2")
            .await
            .unwrap();

        assert_eq!(text, "{\"version\":\"1.0\"}");
    }

    #[tokio::test]
    async fn read_string_hits_origin_with_cache_parameter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/version.txt"))
            .and(|req: &wiremock::Request| req.url.query_pairs().any(|(k, _)| k == "cache"))
            .respond_with(ResponseTemplate::new(200).set_body_string("2.1.0\n"))
            .expect(2)
            .mount(&server)
            .await;

        let client = HttpTransferClient::new(
            Arc::new(ReqwestTransport::new()),
            Arc::new(StdFileSystem::new()),
        );
        let url = format!("{}/version.txt", server.uri());
        assert_eq!(client.read_string(&url).await.unwrap(), "2.1.0\n");
        assert_eq!(client.read_string(&url).await.unwrap(), "2.1.0\n");
    }

    #[tokio::test]
    async fn read_string_rejects_unparseable_source() {
        let mut transport = MockTransport::new();
        transport.expect_get().never();

        let err = client_with(transport).read_string("not a url").await.unwrap_err();
        assert!(matches!(err, Error::InvalidDownloadUrl { .. }));
    }
}
