//! Holder of the current access credential.

use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use crate::credential::{AccessCredential, DecodeError};
use crate::session::scheduler::RefreshScheduler;

#[derive(Default)]
struct StoreState {
    credential: Option<Arc<AccessCredential>>,
    generation: u64,
}

/// Thread-safe store for the session's access credential.
///
/// Every install re-arms the [`RefreshScheduler`]; every clear cancels it.
/// Each mutation bumps a generation counter that renewal triggers are
/// checked against.
pub struct TokenStore {
    state: RwLock<StoreState>,
    scheduler: Arc<RefreshScheduler>,
}

impl TokenStore {
    pub fn new(scheduler: Arc<RefreshScheduler>) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            scheduler,
        }
    }

    /// The current credential, if any.
    pub fn get(&self) -> Option<Arc<AccessCredential>> {
        self.state.read().expect("lock poisoned").credential.clone()
    }

    /// The current credential together with the store generation.
    pub fn snapshot(&self) -> (Option<Arc<AccessCredential>>, u64) {
        let state = self.state.read().expect("lock poisoned");
        (state.credential.clone(), state.generation)
    }

    pub fn generation(&self) -> u64 {
        self.state.read().expect("lock poisoned").generation
    }

    /// Decode and install `raw`, then re-arm the scheduler.
    ///
    /// On a decode failure the previous credential (or its absence) is kept
    /// and the error is logged and returned.
    pub fn set(&self, raw: &str) -> Result<Arc<AccessCredential>, DecodeError> {
        let credential = match AccessCredential::parse(raw) {
            Ok(c) => Arc::new(c),
            Err(e) => {
                warn!(error = %e, "Rejected undecodable credential, keeping current one");
                return Err(e);
            }
        };

        let mut state = self.state.write().expect("lock poisoned");
        state.generation += 1;
        state.credential = Some(Arc::clone(&credential));
        self.scheduler.rearm(&credential, state.generation);
        debug!(
            subject = credential.subject(),
            generation = state.generation,
            "Installed access credential"
        );
        Ok(credential)
    }

    /// Remove the credential and cancel the renewal timer.
    pub fn clear(&self) {
        let mut state = self.state.write().expect("lock poisoned");
        state.generation += 1;
        if state.credential.take().is_some() {
            debug!(generation = state.generation, "Cleared access credential");
        }
        self.scheduler.cancel();
    }

    /// Clear the store only if it still holds `credential`.
    ///
    /// Returns false when another install or clear got there first.
    pub fn clear_if_current(&self, credential: &Arc<AccessCredential>) -> bool {
        let mut state = self.state.write().expect("lock poisoned");
        if !state
            .credential
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, credential))
        {
            return false;
        }
        state.credential = None;
        state.generation += 1;
        self.scheduler.cancel();
        debug!(generation = state.generation, "Cleared refused access credential");
        true
    }

    /// True iff a credential is present and has not yet expired.
    pub fn is_valid(&self) -> bool {
        self.get().is_some_and(|c| !c.is_expired())
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (credential, generation) = self.snapshot();
        f.debug_struct("TokenStore")
            .field("credential", &credential)
            .field("generation", &generation)
            .finish()
    }
}
