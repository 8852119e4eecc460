//! Pure helpers for turning URLs and response headers into file names.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use url::Url;

/// Suffix appended to a destination path while its content is being written.
pub const PARTIAL_SUFFIX: &str = ".PARTIAL";

fn http_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^https?://").expect("valid regex"))
}

fn installer_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\.(zip|7zip|7z|rar|msi|exe)$").expect("valid regex"))
}

/// Whether the source uses the `http` or `https` scheme (any case).
pub fn is_http_source(source: &str) -> bool {
    http_regex().is_match(source)
}

/// Whether the name ends in a known installer or archive extension.
pub fn has_installer_extension(name: &str) -> bool {
    installer_regex().is_match(name)
}

/// Trailing segment of the URL path, percent-decoded and reduced to a bare
/// file name.
///
/// Query and fragment are ignored. Returns `None` when the URL does not parse,
/// the path ends with a slash, or the segment decodes to `.`, `..` or nothing
/// after directory parts are dropped.
pub fn url_file_name(source: &str) -> Option<String> {
    let url = Url::parse(source).ok()?;
    let segment = url.path_segments()?.next_back()?;
    let decoded = percent_decode_str(segment).decode_utf8_lossy();
    safe_file_name(&decoded)
}

/// File name suggested by a `Content-Disposition` header value.
///
/// `filename*` (RFC 5987) wins over `filename`. Surrounding quotes and spaces
/// are trimmed and any directory part is dropped.
pub fn content_disposition_file_name(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for param in split_params(header) {
        let Some((key, value)) = param.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename" => plain = Some(value.to_string()),
            "filename*" => {
                let value = value.trim().trim_matches('"');
                // charset'language'encoded-value
                let encoded = value.splitn(3, '\'').nth(2).unwrap_or(value);
                extended = Some(percent_decode_str(encoded).decode_utf8_lossy().into_owned());
            }
            _ => {}
        }
    }

    extended.or(plain).and_then(|name| {
        safe_file_name(name.trim_matches(|c| c == '"' || c == '\'' || c == ' '))
    })
}

/// Last path component of `name`, rejecting names that would not stay inside
/// the destination directory.
fn safe_file_name(name: &str) -> Option<String> {
    let name = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    match name {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

/// Split header parameters on `;`, ignoring separators inside quotes.
fn split_params(header: &str) -> Vec<&str> {
    let mut params = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (idx, ch) in header.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                params.push(&header[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    params.push(&header[start..]);
    params
}

/// `<destination>.PARTIAL`
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_os_string();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}
