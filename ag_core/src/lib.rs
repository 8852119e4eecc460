pub mod config;
pub mod errors;
pub mod filename;
pub mod package;
pub mod progress;

pub use config::Config;
pub use errors::Error;
pub use filename::{
    content_disposition_file_name, has_installer_extension, is_http_source, partial_path,
    url_file_name,
};
pub use package::PackageInfo;
pub use progress::ProgressState;
