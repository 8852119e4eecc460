//! Trait abstractions for network and filesystem access.
//!
//! The transfer handlers and the catalog client only talk to the outside
//! world through these traits, so tests can inject mocks that fail
//! mid-stream, report redirects or refuse disk writes.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
#[cfg(test)]
use mockall::automock;
use tracing::warn;

use ag_core::{Config, Error, content_disposition_file_name};

/// Response body as a stream of byte chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, Error>> + Send>>;

/// A GET request with optional extra headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response whose headers have been read but whose body has not.
pub struct HttpResponse {
    /// URL of the final request, after any redirects.
    pub url: String,
    pub status: u16,
    headers: BTreeMap<String, String>,
    body: BodyStream,
}

impl HttpResponse {
    pub fn new(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            status,
            headers: BTreeMap::new(),
            body: Box::pin(stream::empty::<Result<Bytes, Error>>()),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.with_body_stream(Box::pin(stream::once(async move { Ok::<_, Error>(body) })))
    }

    pub fn with_body_stream(mut self, body: BodyStream) -> Self {
        self.body = body;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Media type without parameters, lowercased (`text/html; charset=utf-8` -> `text/html`).
    pub fn content_type(&self) -> Option<String> {
        self.header("content-type")
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_ascii_lowercase())
            .filter(|v| !v.is_empty())
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length")
            .and_then(|v| v.trim().parse().ok())
    }

    pub fn content_disposition_file_name(&self) -> Option<String> {
        self.header("content-disposition")
            .and_then(content_disposition_file_name)
    }

    pub fn into_body(self) -> BodyStream {
        self.body
    }

    /// Read the remaining body into memory.
    pub async fn bytes(self) -> Result<Vec<u8>, Error> {
        let mut body = self.body;
        let mut buf = Vec::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf)
    }

    pub async fn text(self) -> Result<String, Error> {
        let url = self.url.clone();
        let bytes = self.bytes().await?;
        String::from_utf8(bytes).map_err(|e| Error::InvalidResponse {
            message: format!("body of {url} is not valid UTF-8: {e}"),
        })
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("url", &self.url)
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// HTTP transport used by the transfer handlers and the catalog client.
///
/// `get` resolves once the response headers are in; the body is streamed
/// afterwards. Redirects are followed by the transport and the final URL is
/// reported in [`HttpResponse::url`]. Statuses of 400 and above come back as
/// [`Error::HttpStatus`].
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, Error>;
}

/// Filesystem operations needed for atomic file placement.
#[cfg_attr(test, automock)]
pub trait FileSystem: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    fn remove_file(&self, path: &Path) -> Result<(), Error>;

    /// Move `from` onto `to`, replacing any existing file.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), Error>;

    /// Open a file for writing, creating or truncating it.
    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>, Error>;
}

/// Real transport implementation using reqwest.
///
/// reqwest follows at most `max_redirects` redirects per request; longer
/// chains fail with [`Error::TooManyRedirects`].
pub struct ReqwestTransport {
    client: reqwest::Client,
    max_redirects: usize,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::from_config(&Config::default())
    }

    pub fn from_config(config: &Config) -> Self {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout())
            .pool_max_idle_per_host(10)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects));
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "failed to build configured HTTP client, using reqwest defaults");
            reqwest::Client::new()
        });

        Self {
            client,
            max_redirects: config.max_redirects,
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_redirect() {
                Error::TooManyRedirects {
                    source: request.url.clone(),
                    hops: self.max_redirects,
                }
            } else {
                Error::NetworkFailure {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let url = response.url().to_string();
        if status.is_client_error() || status.is_server_error() {
            return Err(Error::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        let mut out = HttpResponse::new(url, status.as_u16());
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                out = out.with_header(name.as_str(), value);
            }
        }

        let body = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| Error::NetworkFailure {
                message: format!("failed to read response body: {e}"),
            })
        });

        Ok(out.with_body_stream(Box::pin(body)))
    }
}

/// Real filesystem implementation using std::fs.
pub struct StdFileSystem;

impl StdFileSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StdFileSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for StdFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn remove_file(&self, path: &Path) -> Result<(), Error> {
        fs::remove_file(path).map_err(|e| Error::filesystem(path, format!("failed to remove: {e}")))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), Error> {
        fs::rename(from, to).map_err(|e| {
            Error::filesystem(to, format!("failed to move {} into place: {e}", from.display()))
        })
    }

    fn create(&self, path: &Path) -> Result<Box<dyn Write + Send>, Error> {
        let file = fs::File::create(path)
            .map_err(|e| Error::filesystem(path, format!("failed to create: {e}")))?;
        Ok(Box::new(file))
    }
}
