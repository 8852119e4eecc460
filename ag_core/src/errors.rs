use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    UnsupportedProtocol {
        source: String,
    },
    InvalidDownloadUrl {
        source: String,
        detail: Option<String>,
    },
    TooManyRedirects {
        source: String,
        hops: usize,
    },
    HttpStatus {
        url: String,
        status: u16,
    },
    NetworkFailure {
        message: String,
    },
    FileSystem {
        path: PathBuf,
        message: String,
    },
    InvalidResponse {
        message: String,
    },
    InvalidConfig {
        path: PathBuf,
        message: String,
    },
    Cancelled,
}

impl Error {
    /// True for an HTTP 404 answer.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::HttpStatus { status: 404, .. })
    }

    /// True for failures raised by the transport (status or connection errors).
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::HttpStatus { .. } | Error::NetworkFailure { .. }
        )
    }

    pub fn filesystem(path: impl Into<PathBuf>, err: impl fmt::Display) -> Self {
        Error::FileSystem {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedProtocol { source } => {
                write!(
                    f,
                    "no transfer handler supports '{}'\n  hint: only http:// and https:// sources are supported",
                    source
                )
            }
            Error::InvalidDownloadUrl { source, detail } => {
                write!(f, "invalid download url '{}'", source)?;
                if let Some(detail) = detail {
                    write!(f, " {}", detail)?;
                }
                write!(
                    f,
                    "\n  hint: the url must point directly at an installer or archive"
                )
            }
            Error::TooManyRedirects { source, hops } => {
                write!(
                    f,
                    "too many redirects while resolving '{}' (gave up after {} hops)",
                    source, hops
                )
            }
            Error::HttpStatus { url, status } => {
                write!(f, "HTTP {} from {}", status, url)
            }
            Error::NetworkFailure { message } => {
                write!(
                    f,
                    "network error: {}\n  hint: check your internet connection and try again",
                    message
                )
            }
            Error::FileSystem { path, message } => {
                write!(f, "filesystem error at '{}': {}", path.display(), message)
            }
            Error::InvalidResponse { message } => {
                write!(f, "invalid response: {}", message)
            }
            Error::InvalidConfig { path, message } => {
                write!(
                    f,
                    "invalid config file '{}': {}\n  hint: fix or remove the file to use defaults",
                    path.display(),
                    message
                )
            }
            Error::Cancelled => write!(f, "transfer cancelled"),
        }
    }
}

impl std::error::Error for Error {}
