//! Download command implementation.

use std::path::{Path, PathBuf};

use console::style;
use tokio_util::sync::CancellationToken;

use ag_core::Error;
use ag_io::TransferDispatcher;

use crate::display::{ProgressStyles, create_transfer_progress, format_bytes};

/// Run the download command.
///
/// Saves `source` into `output` (the current directory by default) under
/// `name`, or under the name the handler resolves when none is given.
pub async fn run(
    dispatcher: &TransferDispatcher,
    source: &str,
    output: Option<PathBuf>,
    name: Option<String>,
    cancel: &CancellationToken,
) -> Result<PathBuf, Error> {
    let dir = match output {
        Some(dir) => dir,
        None => std::env::current_dir().map_err(|e| Error::filesystem(".", e))?,
    };

    let prepared = dispatcher.prepare(source, &dir, name.as_deref()).await?;

    println!(
        "{} Downloading {}",
        style("==>").cyan().bold(),
        style(prepared.file_name()).bold()
    );

    ensure_dir(&dir)?;

    let (callback, pb) = create_transfer_progress(prepared.file_name(), ProgressStyles::default());
    let result = prepared.run(Some(callback), cancel).await;
    if !pb.is_finished() {
        pb.abandon();
    }
    let destination = result?;

    let size = std::fs::metadata(&destination).map(|m| m.len()).unwrap_or(0);
    println!(
        "{} Saved {} ({})",
        style("==>").cyan().bold(),
        destination.display(),
        format_bytes(size)
    );

    Ok(destination)
}

fn ensure_dir(dir: &Path) -> Result<(), Error> {
    std::fs::create_dir_all(dir)
        .map_err(|e| Error::filesystem(dir, format!("failed to create directory: {e}")))
}
