//! Cleanup command: prunes the catalog response cache.

use std::path::Path;

use console::style;

use ag_core::Error;
use ag_io::MetadataCache;

/// Remove cached catalog responses older than `prune` days, or all of them.
///
/// Returns the number of entries removed.
pub fn run_cleanup(cache_path: Option<&Path>, prune: Option<u32>) -> Result<usize, Error> {
    let Some(path) = cache_path.filter(|p| p.exists()) else {
        println!("No metadata cache to clean (pass --cache <FILE>).");
        return Ok(0);
    };

    println!(
        "{} Cleaning metadata cache {}",
        style("==>").cyan().bold(),
        path.display()
    );

    let cache = MetadataCache::open(path).map_err(|e| Error::filesystem(path, e))?;
    let removed = match prune {
        Some(days) => cache.cleanup_older_than(days),
        None => cache.clear(),
    }
    .map_err(|e| Error::filesystem(path, e))?;
    let kept = cache.count().map_err(|e| Error::filesystem(path, e))?;

    if removed == 0 {
        println!("No cached responses to remove.");
    } else {
        println!(
            "{} Removed {} cached responses ({} kept)",
            style("==>").cyan().bold(),
            style(removed).green().bold(),
            kept
        );
    }
    Ok(removed)
}
