//! HTTP client shared by the identity backend and the API pipeline.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use tracing::warn;
use url::Url;

use crate::config::ApiConfig;

pub const USER_AGENT: &str = concat!("recruit-session/", env!("CARGO_PKG_VERSION"));
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A `reqwest` client bound to one cookie jar.
///
/// The login endpoint sets the renewal credential as an HTTP-only cookie and
/// the renewal endpoint reads it back, so every component of a session must
/// go through clones of the same `HttpClient`. Clones share both the
/// connection pool and the jar.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    jar: Arc<Jar>,
}

impl HttpClient {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Client configured from the `[api]` section.
    pub fn from_config(config: &ApiConfig) -> Self {
        Self::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .request_timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
    }

    pub fn inner(&self) -> &Client {
        &self.inner
    }

    /// The `Cookie` header this client would send to `url`, if any.
    pub fn cookie_header(&self, url: &Url) -> Option<HeaderValue> {
        self.jar.cookies(url)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Cookie values are renewal credentials; keep them out of logs.
        f.debug_struct("HttpClient").finish_non_exhaustive()
    }
}

/// Settings collected before the underlying `reqwest` client is built.
#[derive(Clone)]
pub struct HttpClientBuilder {
    user_agent: String,
    connect_timeout: Duration,
    request_timeout: Duration,
    jar: Option<Arc<Jar>>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENT.to_string(),
            connect_timeout: CONNECT_TIMEOUT,
            request_timeout: REQUEST_TIMEOUT,
            jar: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Use an existing cookie jar instead of a fresh one.
    pub fn cookie_jar(mut self, jar: Arc<Jar>) -> Self {
        self.jar = Some(jar);
        self
    }

    pub fn build(self) -> HttpClient {
        let jar = self.jar.unwrap_or_default();
        let configured = Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .cookie_provider(Arc::clone(&jar))
            .build();

        let inner = match configured {
            Ok(client) => client,
            Err(e) => {
                // Usually an unusable user agent string.
                warn!(
                    error = %e,
                    user_agent = %self.user_agent,
                    "Invalid HTTP client settings, using defaults"
                );
                Client::builder()
                    .cookie_provider(Arc::clone(&jar))
                    .build()
                    .unwrap_or_default()
            }
        };
        HttpClient { inner, jar }
    }
}
