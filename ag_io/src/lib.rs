pub mod cache;
pub mod catalog;
pub mod dispatcher;
pub mod http;
pub mod progress;
pub mod protocol;
pub mod setup;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use cache::{CacheEntry, MetadataCache};
pub use catalog::CatalogClient;
pub use dispatcher::{PreparedDownload, TransferDispatcher};
pub use http::HttpTransferClient;
pub use progress::ProgressCallback;
pub use protocol::TransferProtocolHandler;
pub use setup::{Client, create_catalog_client, create_client, create_dispatcher, create_transport};
pub use traits::{
    BodyStream, FileSystem, HttpRequest, HttpResponse, ReqwestTransport, StdFileSystem, Transport,
};
