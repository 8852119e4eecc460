use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Package record returned by the remote catalog.
///
/// Only the fields this client reads are typed; everything else the catalog
/// sends is preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PackageInfo {
    pub id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "manifestPath", alias = "manifest_path")]
    pub manifest_path: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PackageInfo {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}
