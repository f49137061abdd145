//! Session lifecycle.
//!
//! [`SessionManager`] wires the pieces together:
//!
//! - [`TokenStore`] holds the current access credential
//! - [`RefreshScheduler`] renews it shortly before expiry
//! - [`RefreshCoordinator`] makes sure only one renewal is in flight
//! - [`SessionEventBus`] tells the rest of the process when the session ends
//!
//! Scheduler and liveness triggers are funneled through a driver task that
//! drops any trigger armed for a credential that has since been replaced.

pub mod coordinator;
pub mod events;
pub mod scheduler;
pub mod store;

pub use coordinator::{RefreshCoordinator, RefreshOutcome, RefreshState};
pub use events::{SessionEvent, SessionEventBus, Subscription};
pub use scheduler::{RefreshScheduler, RenewalTrigger, TriggerReason, spawn_liveness_check};
pub use store::TokenStore;

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{HttpIdentityBackend, IdentityBackend, LoginRequest};
use crate::config::Config;
use crate::credential::AccessCredential;
use crate::error::{RenewalFailureKind, SessionError};
use crate::net::HttpClient;

/// Owner of one authenticated session.
///
/// Construct it once, share it as `Arc<SessionManager>`, call
/// [`SessionManager::init`] from within the runtime, and
/// [`SessionManager::dispose`] on shutdown.
pub struct SessionManager {
    config: Config,
    http: HttpClient,
    backend: Arc<dyn IdentityBackend>,
    store: Arc<TokenStore>,
    coordinator: Arc<RefreshCoordinator>,
    events: SessionEventBus,
    trigger_tx: mpsc::UnboundedSender<RenewalTrigger>,
    trigger_rx: Mutex<Option<mpsc::UnboundedReceiver<RenewalTrigger>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SessionManager {
    /// Build a session around an existing backend.
    ///
    /// `http` must be the client the backend uses when the renewal credential
    /// lives in its cookie jar.
    pub fn new(config: Config, backend: Arc<dyn IdentityBackend>, http: HttpClient) -> Self {
        let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();
        let scheduler = Arc::new(RefreshScheduler::new(
            config.session.safety_margin(),
            trigger_tx.clone(),
        ));
        let store = Arc::new(TokenStore::new(scheduler));
        let events = SessionEventBus::new();
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&backend),
            events.clone(),
            config.session.renewal_timeout(),
            config.session.waiter_timeout(),
        ));

        Self {
            config,
            http,
            backend,
            store,
            coordinator,
            events,
            trigger_tx,
            trigger_rx: Mutex::new(Some(trigger_rx)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Build a session talking HTTP to `config.api.base_url`.
    pub fn from_config(config: Config) -> Self {
        let http = HttpClient::from_config(&config.api);
        let backend = Arc::new(HttpIdentityBackend::new(
            http.clone(),
            config.api.base_url.clone(),
            config.endpoints.clone(),
        ));
        Self::new(config, backend, http)
    }

    /// Start background work and try to resume a previous session.
    ///
    /// Spawns the trigger driver and the liveness check (once per manager),
    /// then asks the backend to recover a credential. Returns the recovered
    /// credential, or `None` when there was nothing to resume.
    pub async fn init(&self) -> Option<Arc<AccessCredential>> {
        self.spawn_background();

        match self.coordinator.recover().await {
            Ok(credential) => {
                info!(subject = credential.subject(), "Resumed previous session");
                Some(credential)
            }
            Err(failure) if failure.kind() == &RenewalFailureKind::NoSession => {
                debug!("No previous session to resume");
                None
            }
            Err(failure) => {
                warn!(
                    kind = ?failure.kind(),
                    detail = failure.detail(),
                    "Session recovery failed"
                );
                None
            }
        }
    }

    fn spawn_background(&self) {
        let Some(rx) = self.trigger_rx.lock().expect("lock poisoned").take() else {
            debug!("Session background tasks already started");
            return;
        };

        let driver = tokio::spawn(drive_triggers(
            rx,
            Arc::clone(&self.store),
            Arc::clone(&self.coordinator),
        ));
        let liveness = spawn_liveness_check(
            Arc::clone(&self.store),
            self.config.session.liveness_interval(),
            self.trigger_tx.clone(),
        );

        let mut tasks = self.tasks.lock().expect("lock poisoned");
        tasks.push(driver);
        tasks.push(liveness);
        debug!(
            liveness_secs = self.config.session.liveness_interval_secs,
            "Session background tasks started"
        );
    }

    /// Stop background work and cancel the renewal timer.
    ///
    /// The current credential is left in place. Background work does not
    /// restart after a dispose.
    pub fn dispose(&self) {
        let tasks: Vec<_> = self.tasks.lock().expect("lock poisoned").drain(..).collect();
        for task in &tasks {
            task.abort();
        }
        self.store.scheduler().cancel();
        debug!(stopped = tasks.len(), "Session disposed");
    }

    /// Sign in and install the returned credential.
    pub async fn login(&self, request: LoginRequest) -> Result<Arc<AccessCredential>, SessionError> {
        let token = self
            .backend
            .login(&request)
            .await
            .map_err(|e| SessionError::Login(e.to_string()))?;

        let credential = self
            .store
            .set(&token.access_token)
            .map_err(|e| SessionError::Login(format!("unusable credential: {e}")))?;

        info!(
            subject = credential.subject(),
            role = credential.role(),
            "Signed in"
        );
        Ok(credential)
    }

    /// Sign out. The local credential is cleared even if the backend call
    /// fails.
    pub async fn logout(&self) {
        if let Err(e) = self.backend.logout().await {
            warn!(error = %e, "Backend logout failed, clearing local session anyway");
        }
        self.store.clear();
        info!("Signed out");
    }

    /// Snapshot of the current credential.
    pub fn current_credential(&self) -> Option<Arc<AccessCredential>> {
        self.store.get()
    }

    /// Whether an unexpired credential is installed.
    pub fn is_authenticated(&self) -> bool {
        self.store.is_valid()
    }

    pub fn events(&self) -> &SessionEventBus {
        &self.events
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Ok(tasks) = self.tasks.get_mut() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("backend", &self.backend.name())
            .field("store", &self.store)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}

/// Hand scheduler and liveness triggers to the coordinator, one at a time.
async fn drive_triggers(
    mut rx: mpsc::UnboundedReceiver<RenewalTrigger>,
    store: Arc<TokenStore>,
    coordinator: Arc<RefreshCoordinator>,
) {
    while let Some(trigger) = rx.recv().await {
        let current = store.generation();
        if trigger.generation != current {
            debug!(
                reason = ?trigger.reason,
                armed_for = trigger.generation,
                current,
                "Dropping stale renewal trigger"
            );
            continue;
        }

        debug!(reason = ?trigger.reason, "Renewal triggered");
        let outcome = match trigger.reason {
            TriggerReason::Recover => coordinator.recover().await,
            _ => coordinator.request_refresh().await,
        };
        if let Err(failure) = outcome {
            debug!(kind = ?failure.kind(), "Triggered renewal failed");
        }
    }
}
