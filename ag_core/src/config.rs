use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::Error;

pub const DEFAULT_CATALOG_URL: &str = "http://appget.azurewebsites.net/api/v1/";
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Client settings shared by the transport, the transfer handlers and the
/// catalog client.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog_url: String,
    pub user_agent: String,
    pub max_redirects: usize,
    pub chunk_size: usize,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: Option<u64>,
    /// Leave `<destination>.PARTIAL` behind when a transfer fails.
    pub keep_partial_on_failure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_url: DEFAULT_CATALOG_URL.to_string(),
            user_agent: format!("ag/{}", env!("CARGO_PKG_VERSION")),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_timeout_secs: 30,
            request_timeout_secs: None,
            keep_partial_on_failure: false,
        }
    }
}

impl Config {
    /// Load settings from a JSON file; missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, Error> {
        let body = std::fs::read_to_string(path).map_err(|e| Error::filesystem(path, e))?;
        let config: Config = serde_json::from_str(&body).map_err(|e| Error::InvalidConfig {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.validate(path)?;
        Ok(config)
    }

    pub fn with_catalog_url(mut self, url: impl Into<String>) -> Self {
        self.catalog_url = url.into();
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    fn validate(&self, path: &Path) -> Result<(), Error> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig {
                path: path.to_path_buf(),
                message: "chunk_size must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
