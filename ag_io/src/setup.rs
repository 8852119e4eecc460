//! Composition root: builds the dispatcher and catalog client from a [`Config`].

use std::path::Path;
use std::sync::Arc;

use tracing::warn;

use ag_core::{Config, Error};

use crate::cache::MetadataCache;
use crate::catalog::CatalogClient;
use crate::dispatcher::TransferDispatcher;
use crate::traits::{ReqwestTransport, StdFileSystem, Transport};

/// Dispatcher and catalog client sharing one transport.
pub struct Client {
    pub dispatcher: TransferDispatcher,
    pub catalog: CatalogClient,
}

pub fn create_transport(config: &Config) -> Arc<dyn Transport> {
    Arc::new(ReqwestTransport::from_config(config))
}

pub fn create_dispatcher(config: &Config, transport: Arc<dyn Transport>) -> TransferDispatcher {
    TransferDispatcher::with_defaults(transport, Arc::new(StdFileSystem::new()), config)
}

/// Catalog client for `config.catalog_url`, with a response cache at
/// `cache_path` when one is given.
///
/// A cache that cannot be opened is skipped with a warning.
pub fn create_catalog_client(
    config: &Config,
    transport: Arc<dyn Transport>,
    cache_path: Option<&Path>,
) -> CatalogClient {
    let client = CatalogClient::with_base_url(config.catalog_url.clone(), transport);

    match cache_path.map(open_cache) {
        Some(Ok(cache)) => client.with_cache(cache),
        Some(Err(e)) => {
            warn!(error = %e, "metadata cache unavailable, continuing without it");
            client
        }
        None => client,
    }
}

pub fn create_client(config: &Config, cache_path: Option<&Path>) -> Client {
    let transport = create_transport(config);
    Client {
        dispatcher: create_dispatcher(config, transport.clone()),
        catalog: create_catalog_client(config, transport, cache_path),
    }
}

fn open_cache(path: &Path) -> Result<MetadataCache, Error> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::filesystem(parent, e))?;
    }
    MetadataCache::open(path).map_err(|e| Error::filesystem(path, e))
}
