//! Boundary to the remote identity backend.
//!
//! The session client only needs four operations from the backend:
//! - `login` - exchange user credentials for an access credential
//! - `refresh` - obtain a new access credential using the side-channel
//!   renewal credential (an HTTP-only cookie for [`HttpIdentityBackend`])
//! - `logout` - invalidate the session server-side
//! - `recover` - resume a previous session at startup without logging in
//!
//! [`IdentityBackend`] abstracts these so tests and alternative transports
//! can stand in for the HTTP implementation.

pub mod http;

pub use http::HttpIdentityBackend;

use serde::{Deserialize, Serialize};

/// Errors from the identity backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The backend answered with a non-success status.
    #[error("Backend rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The request did not complete in time.
    #[error("Backend request timed out")]
    Timeout,

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered 2xx with an unusable body.
    #[error("Invalid backend response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Whether the backend refused the request itself (4xx), as opposed to
    /// failing to answer.
    pub fn is_client_rejection(&self) -> bool {
        matches!(self, Self::Rejected { status, .. } if (400..500).contains(status))
    }
}

/// User credentials sent to the login endpoint.
#[derive(Clone, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Body returned by the login and refresh endpoints.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(rename = "accessToken", alias = "access_token", alias = "token")]
    pub access_token: String,
}

impl TokenResponse {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Operations the session client consumes from the identity backend.
#[async_trait::async_trait]
pub trait IdentityBackend: Send + Sync {
    /// Exchange user credentials for an access credential.
    async fn login(&self, request: &LoginRequest) -> Result<TokenResponse, BackendError>;

    /// Obtain a new access credential via the side-channel renewal credential.
    async fn refresh(&self) -> Result<TokenResponse, BackendError>;

    /// Invalidate the session on the server.
    async fn logout(&self) -> Result<(), BackendError>;

    /// Recover a previously issued credential at startup.
    ///
    /// Returns `Ok(None)` when there is no session to resume. The default
    /// asks the renewal endpoint and treats a 4xx answer as "no session".
    async fn recover(&self) -> Result<Option<TokenResponse>, BackendError> {
        match self.refresh().await {
            Ok(token) => Ok(Some(token)),
            Err(e) if e.is_client_rejection() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Name of this backend, for logs.
    fn name(&self) -> &str;
}
