use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use ag_core::Error;

use crate::progress::ProgressCallback;

/// A handler for one family of source identifiers (e.g. `http(s)://` URLs).
///
/// Handlers are registered with a [`crate::TransferDispatcher`], which picks
/// the first one whose [`can_handle`](Self::can_handle) accepts a source.
#[async_trait]
pub trait TransferProtocolHandler: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn can_handle(&self, source: &str) -> bool;

    /// File name to save the source under when the caller has not chosen one.
    async fn resolve_file_name(&self, source: &str) -> Result<String, Error>;

    /// Download `source` to `destination`.
    ///
    /// Content is written to `<destination>.PARTIAL` and moved into place only
    /// once complete. `destination` is left untouched on failure.
    async fn transfer(
        &self,
        source: &str,
        destination: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Result<(), Error>;

    /// Fetch a small text resource, bypassing caches.
    async fn read_string(&self, source: &str) -> Result<String, Error>;
}
