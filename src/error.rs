use crate::backend::BackendError;

/// Message shown to users whenever a session ends because renewal failed.
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

/// Why a renewal attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalFailureKind {
    /// The backend refused the renewal credential.
    Rejected { status: u16 },
    /// Renewal succeeded but the API refused the renewed credential too.
    RejectedAfterRenewal { status: u16 },
    /// The renewal call did not complete within the renewal timeout.
    Timeout,
    /// The renewal call failed at the network layer.
    Network,
    /// The backend answered with a credential that could not be decoded.
    MalformedCredential,
    /// Recovery found no previous session to resume.
    NoSession,
    /// A queued caller gave up waiting for the in-flight renewal.
    WaiterTimedOut,
    /// The renewal task went away without reporting an outcome.
    Interrupted,
}

/// Terminal failure of a renewal attempt.
///
/// One value is cloned to every caller queued on the same attempt. The
/// `Display` form is the user-facing message; [`RenewalFailure::detail`]
/// carries the technical cause for logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", SESSION_EXPIRED_MESSAGE)]
pub struct RenewalFailure {
    kind: RenewalFailureKind,
    detail: String,
}

impl RenewalFailure {
    pub fn new(kind: RenewalFailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> &RenewalFailureKind {
        &self.kind
    }

    /// Technical description of the failure. Not meant for end users.
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<BackendError> for RenewalFailure {
    fn from(err: BackendError) -> Self {
        let kind = match &err {
            BackendError::Rejected { status, .. } => RenewalFailureKind::Rejected { status: *status },
            BackendError::Timeout => RenewalFailureKind::Timeout,
            BackendError::Http(e) if e.is_timeout() => RenewalFailureKind::Timeout,
            BackendError::Http(_) | BackendError::InvalidResponse(_) => RenewalFailureKind::Network,
        };
        Self::new(kind, err.to_string())
    }
}

/// Errors returned by the session client.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A call that bypasses renewal was rejected; the session is over.
    #[error("{}", SESSION_EXPIRED_MESSAGE)]
    SessionEnded { status: u16 },

    /// Renewal failed; the session has ended.
    #[error(transparent)]
    Renewal(#[from] RenewalFailure),

    /// Any other non-success API status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Network-level failure talking to the API.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Login was refused or returned an unusable credential.
    #[error("Login failed: {0}")]
    Login(String),

    /// A response body could not be parsed.
    #[error("Invalid response body: {0}")]
    InvalidBody(String),

    /// A request path could not be joined onto the base URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl SessionError {
    /// Whether the user should be treated as logged out.
    pub fn is_session_ended(&self) -> bool {
        matches!(self, Self::SessionEnded { .. } | Self::Renewal(_))
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self {
            Self::SessionEnded { .. } | Self::Renewal(_) => SESSION_EXPIRED_MESSAGE.to_string(),
            Self::Transport(_) => "Could not reach the server. Please try again.".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidBody(err.to_string())
    }
}
