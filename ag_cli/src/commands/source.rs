//! Resolve and fetch command implementations.

use ag_core::Error;
use ag_io::TransferDispatcher;

/// Print the file name a download of `source` would be saved under.
pub async fn run_resolve(dispatcher: &TransferDispatcher, source: &str) -> Result<(), Error> {
    let name = dispatcher.dispatch(source)?.resolve_file_name(source).await?;
    println!("{}", name);
    Ok(())
}

/// Print a small text resource, bypassing caches.
pub async fn run_fetch(dispatcher: &TransferDispatcher, source: &str) -> Result<(), Error> {
    let text = dispatcher.dispatch(source)?.read_string(source).await?;
    print!("{}", text);
    if !text.ends_with('\n') {
        println!();
    }
    Ok(())
}
