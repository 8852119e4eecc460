use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use ag_core::{Config, Error};

use crate::http::HttpTransferClient;
use crate::progress::ProgressCallback;
use crate::protocol::TransferProtocolHandler;
use crate::traits::{FileSystem, Transport};

/// Ordered registry of transfer handlers.
///
/// Handlers are consulted in registration order; the first one whose
/// [`can_handle`](TransferProtocolHandler::can_handle) accepts the source wins.
#[derive(Default)]
pub struct TransferDispatcher {
    handlers: Vec<Arc<dyn TransferProtocolHandler>>,
}

impl TransferDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatcher holding the HTTP(S) handler.
    pub fn with_defaults(
        transport: Arc<dyn Transport>,
        fs: Arc<dyn FileSystem>,
        config: &Config,
    ) -> Self {
        Self::new().with_handler(Arc::new(HttpTransferClient::with_config(
            transport, fs, config,
        )))
    }

    pub fn with_handler(mut self, handler: Arc<dyn TransferProtocolHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn register(&mut self, handler: Arc<dyn TransferProtocolHandler>) {
        self.handlers.push(handler);
    }

    pub fn handlers(&self) -> &[Arc<dyn TransferProtocolHandler>] {
        &self.handlers
    }

    pub fn dispatch(&self, source: &str) -> Result<Arc<dyn TransferProtocolHandler>, Error> {
        self.handlers
            .iter()
            .find(|h| h.can_handle(source))
            .cloned()
            .ok_or_else(|| Error::UnsupportedProtocol {
                source: source.to_string(),
            })
    }

    /// Pick the handler for `source` and work out where it will be saved.
    ///
    /// `name` overrides the file name the handler would resolve.
    pub async fn prepare(
        &self,
        source: &str,
        dir: &Path,
        name: Option<&str>,
    ) -> Result<PreparedDownload, Error> {
        let handler = self.dispatch(source)?;
        let file_name = match name {
            Some(name) => name.to_string(),
            None => handler.resolve_file_name(source).await?,
        };
        let destination = dir.join(&file_name);

        Ok(PreparedDownload {
            handler,
            source: source.to_string(),
            file_name,
            destination,
        })
    }

    /// Resolve the file name for `source` and transfer it into `dir`.
    ///
    /// Returns the path of the completed file.
    pub async fn download_to_dir(
        &self,
        source: &str,
        dir: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, Error> {
        self.prepare(source, dir, None)
            .await?
            .run(progress, cancel)
            .await
    }
}

/// A download whose handler and destination are known but which has not
/// started yet.
pub struct PreparedDownload {
    handler: Arc<dyn TransferProtocolHandler>,
    source: String,
    file_name: String,
    destination: PathBuf,
}

impl PreparedDownload {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub async fn run(
        self,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, Error> {
        debug!(
            source = %self.source,
            handler = self.handler.name(),
            file = %self.file_name,
            "downloading"
        );
        self.handler
            .transfer(&self.source, &self.destination, progress, cancel)
            .await?;

        Ok(self.destination)
    }
}
