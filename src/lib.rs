//! Authenticated-session client for the recruitment platform API.
//!
//! A [`SessionManager`] keeps a short-lived access credential alive: it
//! resumes a previous session on start, renews the credential shortly before
//! it expires, and publishes [`SessionEvent::SessionEnded`] when renewal is
//! no longer possible. [`ApiClient`] sends calls with the credential attached
//! and transparently renews and retries once when the server rejects it.
//!
//! ```no_run
//! use std::sync::Arc;
//! use recruit_session::{ApiClient, Config, SessionManager};
//!
//! # async fn run() -> Result<(), recruit_session::SessionError> {
//! let session = Arc::new(SessionManager::from_config(Config::default()));
//! session.init().await;
//!
//! let api = ApiClient::new(Arc::clone(&session));
//! let user = api.current_user().await?;
//! println!("signed in as {}", user.id);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod backend;
pub mod config;
pub mod credential;
pub mod error;
pub mod net;
pub mod session;

pub use api::{ApiClient, ApiRequest, ApiResponse, CurrentUser};
pub use backend::{BackendError, HttpIdentityBackend, IdentityBackend, LoginRequest, TokenResponse};
pub use config::Config;
pub use credential::{AccessCredential, Claims, DecodeError};
pub use error::{RenewalFailure, RenewalFailureKind, SESSION_EXPIRED_MESSAGE, SessionError};
pub use session::{SessionEvent, SessionEventBus, SessionManager, Subscription};
