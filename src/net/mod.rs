//! Shared networking infrastructure.

pub mod client;

pub use client::{HttpClient, HttpClientBuilder};

use url::Url;

/// Append `path` to `base`, keeping the base path.
///
/// `Url::join` would drop the base path for paths starting with `/`
/// (`http://h/api` + `/login` -> `http://h/login`); endpoint paths here are
/// always relative to the API root.
pub fn join_url(base: &str, path: &str) -> Result<Url, url::ParseError> {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        Url::parse(base)
    } else {
        Url::parse(&format!("{base}/{path}"))
    }
}

/// Normalized path used to compare request targets against endpoints.
pub(crate) fn normalize_path(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    path.trim_matches('/')
}
