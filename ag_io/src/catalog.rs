use std::sync::Arc;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::{debug, info, warn};

use ag_core::config::DEFAULT_CATALOG_URL;
use ag_core::{Error, PackageInfo};

use crate::cache::{CacheEntry, MetadataCache};
use crate::traits::{HttpRequest, Transport};

/// Characters left as-is in a path segment (RFC 3986 unreserved).
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Looks up package metadata in the remote catalog.
pub struct CatalogClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    cache: Option<MetadataCache>,
}

impl CatalogClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_base_url(DEFAULT_CATALOG_URL, transport)
    }

    pub fn with_base_url(base_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: MetadataCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cache(&self) -> Option<&MetadataCache> {
        self.cache.as_ref()
    }

    /// `<base>/packages/<name>/latest`
    pub fn package_url(&self, name: &str) -> String {
        format!(
            "{}/packages/{}/latest",
            self.base_url.trim_end_matches('/'),
            utf8_percent_encode(name, PATH_SEGMENT)
        )
    }

    /// Latest catalog record for `name`, or `None` when the catalog answers 404.
    pub async fn find_package(&self, name: &str) -> Result<Option<PackageInfo>, Error> {
        let url = self.package_url(name);
        info!(package = name, %url, "finding package");

        let cached_entry = self.cache.as_ref().and_then(|c| c.get(&url));

        let mut request = HttpRequest::get(url.as_str());
        if let Some(ref entry) = cached_entry {
            if let Some(ref etag) = entry.etag {
                request = request.header("If-None-Match", etag.as_str());
            }
            if let Some(ref last_modified) = entry.last_modified {
                request = request.header("If-Modified-Since", last_modified.as_str());
            }
        }

        let response = match self.transport.get(request).await {
            Ok(response) => response,
            Err(e) if e.is_not_found() => {
                debug!(package = name, "package not in catalog");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if response.status == 304 {
            let entry = cached_entry.ok_or_else(|| Error::InvalidResponse {
                message: format!("{url} answered 304 Not Modified to an unconditional request"),
            })?;
            debug!(package = name, "catalog entry not modified, using cache");
            return parse_package(&entry.body).map(Some);
        }

        let etag = response.header("etag").map(str::to_string);
        let last_modified = response.header("last-modified").map(str::to_string);
        let body = response.text().await?;
        let package = parse_package(&body)?;

        if let Some(ref cache) = self.cache {
            let entry = CacheEntry {
                etag,
                last_modified,
                ..CacheEntry::new(body)
            };
            if let Err(e) = cache.put(&url, &entry) {
                warn!(%url, error = %e, "failed to cache catalog response");
            }
        }

        Ok(Some(package))
    }
}

fn parse_package(body: &str) -> Result<PackageInfo, Error> {
    serde_json::from_str(body).map_err(|e| Error::InvalidResponse {
        message: format!("failed to parse package JSON: {e}"),
    })
}
