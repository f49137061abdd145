//! Single-flight credential renewal.
//!
//! ```text
//!            request_refresh()                 renewal settles
//!   Idle ---------------------> Refreshing ---------------------> Idle
//!                                 |  ^        (install or clear,
//!          request_refresh()      |  |         drain every waiter)
//!          (enqueue, no call)     +--+
//! ```
//!
//! The Idle -> Refreshing check and the enqueue happen under one short
//! mutex section that is never held across an await. The renewal call runs
//! in a detached task so a caller dropping its future cannot strand the
//! queue.
//!
//! Every attempt has an id. Whoever settles an attempt first (the renewal
//! task, or a caller that gave up waiting) drains the queue; later outcomes
//! for the same attempt are discarded.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::backend::IdentityBackend;
use crate::credential::AccessCredential;
use crate::error::{RenewalFailure, RenewalFailureKind};
use crate::session::events::{SessionEvent, SessionEventBus};
use crate::session::store::TokenStore;

/// Outcome delivered to every caller of one renewal attempt.
pub type RefreshOutcome = Result<Arc<AccessCredential>, RenewalFailure>;

/// Which backend operation a renewal attempt uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RenewalCall {
    Refresh,
    Recover,
}

/// Observable coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

enum State {
    Idle,
    Refreshing {
        attempt: u64,
        waiters: Vec<oneshot::Sender<RefreshOutcome>>,
        /// True while only recovery callers are waiting; a failed silent
        /// attempt does not publish `SessionEnded`.
        silent: bool,
    },
}

/// Ensures at most one renewal call is in flight.
pub struct RefreshCoordinator {
    state: Mutex<State>,
    attempts: AtomicU64,
    store: Arc<TokenStore>,
    backend: Arc<dyn IdentityBackend>,
    events: SessionEventBus,
    renewal_timeout: Duration,
    waiter_timeout: Duration,
}

impl RefreshCoordinator {
    /// `waiter_timeout` is used as given; [`SessionConfig::waiter_timeout`]
    /// keeps it at or above `renewal_timeout`.
    ///
    /// [`SessionConfig::waiter_timeout`]: crate::config::SessionConfig::waiter_timeout
    pub fn new(
        store: Arc<TokenStore>,
        backend: Arc<dyn IdentityBackend>,
        events: SessionEventBus,
        renewal_timeout: Duration,
        waiter_timeout: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(State::Idle),
            attempts: AtomicU64::new(0),
            store,
            backend,
            events,
            renewal_timeout,
            waiter_timeout,
        }
    }

    pub fn state(&self) -> RefreshState {
        match *self.state.lock().expect("lock poisoned") {
            State::Idle => RefreshState::Idle,
            State::Refreshing { .. } => RefreshState::Refreshing,
        }
    }

    /// Number of callers waiting on the in-flight renewal.
    pub fn pending_callers(&self) -> usize {
        match &*self.state.lock().expect("lock poisoned") {
            State::Idle => 0,
            State::Refreshing { waiters, .. } => waiters.len(),
        }
    }

    /// Renew the access credential, or join the renewal already in flight.
    ///
    /// Every caller of the same attempt receives the same outcome. A failure
    /// clears the store and publishes [`SessionEvent::SessionEnded`] once.
    pub async fn request_refresh(self: &Arc<Self>) -> RefreshOutcome {
        self.join(RenewalCall::Refresh).await
    }

    /// Resume a previous session through the backend's recovery operation.
    ///
    /// Shares the single-flight path with [`Self::request_refresh`]. If no
    /// other caller joins, a failed recovery ends quietly.
    pub async fn recover(self: &Arc<Self>) -> RefreshOutcome {
        self.join(RenewalCall::Recover).await
    }

    /// End the session after the API refused a credential that renewal just
    /// produced.
    ///
    /// The store is cleared and `SessionEnded` published only if `credential`
    /// is still the installed one, so concurrent callers refused with the
    /// same credential end the session once.
    pub fn reject_renewed(
        &self,
        credential: &Arc<AccessCredential>,
        status: u16,
    ) -> RenewalFailure {
        let failure = RenewalFailure::new(
            RenewalFailureKind::RejectedAfterRenewal { status },
            format!("renewed credential refused with status {status}"),
        );

        let cleared = {
            let _state = self.state.lock().expect("lock poisoned");
            self.store.clear_if_current(credential)
        };
        if cleared {
            warn!(status, "Renewed credential refused, ending session");
            self.events.publish(SessionEvent::SessionEnded {
                reason: failure.detail().to_string(),
            });
        }
        failure
    }

    async fn join(self: &Arc<Self>, call: RenewalCall) -> RefreshOutcome {
        let (tx, rx) = oneshot::channel();
        let silent_caller = call == RenewalCall::Recover;

        let (attempt, leader) = {
            let mut state = self.state.lock().expect("lock poisoned");
            match &mut *state {
                State::Idle => {
                    let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
                    *state = State::Refreshing {
                        attempt,
                        waiters: vec![tx],
                        silent: silent_caller,
                    };
                    (attempt, true)
                }
                State::Refreshing {
                    attempt,
                    waiters,
                    silent,
                } => {
                    waiters.push(tx);
                    *silent &= silent_caller;
                    debug!(
                        attempt = *attempt,
                        queued = waiters.len(),
                        "Renewal in flight, queued caller"
                    );
                    (*attempt, false)
                }
            }
        };

        if leader {
            let this = Arc::clone(self);
            tokio::spawn(async move { this.run(call, attempt).await });
        }

        match tokio::time::timeout(self.waiter_timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(RenewalFailure::new(
                RenewalFailureKind::Interrupted,
                "renewal task ended without an outcome",
            )),
            Err(_) => {
                warn!(
                    attempt,
                    waited_secs = self.waiter_timeout.as_secs(),
                    "Gave up waiting for in-flight renewal"
                );
                let failure = RenewalFailure::new(
                    RenewalFailureKind::WaiterTimedOut,
                    format!("no renewal outcome after {:?}", self.waiter_timeout),
                );
                self.settle_failure(attempt, failure.clone());
                Err(failure)
            }
        }
    }

    async fn run(&self, call: RenewalCall, attempt: u64) {
        let mut guard = AttemptGuard {
            coordinator: self,
            attempt,
            settled: false,
        };
        debug!(?call, attempt, backend = self.backend.name(), "Starting renewal call");
        let result = tokio::time::timeout(self.renewal_timeout, self.call_backend(call)).await;
        guard.settled = true;

        let raw = match result {
            Ok(Ok(raw)) => raw,
            Ok(Err(failure)) => return self.settle_failure(attempt, failure),
            Err(_) => {
                return self.settle_failure(
                    attempt,
                    RenewalFailure::new(
                        RenewalFailureKind::Timeout,
                        format!("renewal did not complete within {:?}", self.renewal_timeout),
                    ),
                );
            }
        };

        // Install and drain in one critical section so no caller can see
        // the new credential before the queue is released.
        let installed = {
            let mut state = self.state.lock().expect("lock poisoned");
            if !is_current(&state, attempt) {
                debug!(attempt, "Renewal finished after its attempt was settled, discarding");
                return;
            }
            match self.store.set(&raw) {
                Ok(credential) => Ok((take_waiters(&mut state), credential)),
                Err(e) => Err(RenewalFailure::new(
                    RenewalFailureKind::MalformedCredential,
                    e.to_string(),
                )),
            }
        };

        match installed {
            Ok((waiters, credential)) => {
                info!(
                    callers = waiters.len(),
                    subject = credential.subject(),
                    "Access credential renewed"
                );
                release(waiters, &Ok(credential));
            }
            Err(failure) => self.settle_failure(attempt, failure),
        }
    }

    async fn call_backend(&self, call: RenewalCall) -> Result<String, RenewalFailure> {
        match call {
            RenewalCall::Refresh => Ok(self.backend.refresh().await?.access_token),
            RenewalCall::Recover => match self.backend.recover().await? {
                Some(token) => Ok(token.access_token),
                None => Err(RenewalFailure::new(
                    RenewalFailureKind::NoSession,
                    "no previous session to recover",
                )),
            },
        }
    }

    /// Fail `attempt`: clear the store, publish unless silent, and release
    /// every queued caller. A no-op if the attempt was already settled.
    fn settle_failure(&self, attempt: u64, failure: RenewalFailure) {
        let (waiters, silent) = {
            let mut state = self.state.lock().expect("lock poisoned");
            if !is_current(&state, attempt) {
                debug!(attempt, kind = ?failure.kind(), "Attempt already settled");
                return;
            }
            let silent = matches!(*state, State::Refreshing { silent: true, .. });
            self.store.clear();
            (take_waiters(&mut state), silent)
        };

        if silent {
            debug!(detail = failure.detail(), "Session recovery found nothing to resume");
        } else {
            warn!(
                kind = ?failure.kind(),
                detail = failure.detail(),
                callers = waiters.len(),
                "Renewal failed, ending session"
            );
            self.events.publish(SessionEvent::SessionEnded {
                reason: failure.detail().to_string(),
            });
        }

        release(waiters, &Err(failure));
    }
}

/// Settles the attempt as interrupted if the renewal task unwinds or is
/// dropped before the backend call returns.
struct AttemptGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    attempt: u64,
    settled: bool,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator.settle_failure(
                self.attempt,
                RenewalFailure::new(
                    RenewalFailureKind::Interrupted,
                    "renewal task ended without an outcome",
                ),
            );
        }
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("state", &self.state())
            .field("backend", &self.backend.name())
            .field("renewal_timeout", &self.renewal_timeout)
            .finish()
    }
}

fn is_current(state: &State, attempt: u64) -> bool {
    matches!(state, State::Refreshing { attempt: current, .. } if *current == attempt)
}

/// Move to Idle and hand back the queued callers in arrival order.
fn take_waiters(state: &mut State) -> Vec<oneshot::Sender<RefreshOutcome>> {
    match std::mem::replace(state, State::Idle) {
        State::Refreshing { waiters, .. } => waiters,
        State::Idle => Vec::new(),
    }
}

fn release(waiters: Vec<oneshot::Sender<RefreshOutcome>>, outcome: &RefreshOutcome) {
    for waiter in waiters {
        // A waiter that already timed out has dropped its receiver.
        let _ = waiter.send(outcome.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, LoginRequest, TokenResponse};
    use crate::credential::token_expiring_in;
    use crate::session::scheduler::RefreshScheduler;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{Notify, mpsc};

    /// Backend whose refresh blocks until released and answers from a script.
    struct ScriptedBackend {
        calls: AtomicUsize,
        gate: Notify,
        gated: bool,
        answer: Mutex<Box<dyn FnMut() -> Result<TokenResponse, BackendError> + Send>>,
    }

    impl ScriptedBackend {
        fn new<F>(gated: bool, answer: F) -> Arc<Self>
        where
            F: FnMut() -> Result<TokenResponse, BackendError> + Send + 'static,
        {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Notify::new(),
                gated,
                answer: Mutex::new(Box::new(answer)),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl IdentityBackend for ScriptedBackend {
        async fn login(&self, _request: &LoginRequest) -> Result<TokenResponse, BackendError> {
            unreachable!("login is not used by the coordinator")
        }

        async fn refresh(&self) -> Result<TokenResponse, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.gated {
                self.gate.notified().await;
            }
            (*self.answer.lock().unwrap())()
        }

        async fn logout(&self) -> Result<(), BackendError> {
            Ok(())
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct Harness {
        coordinator: Arc<RefreshCoordinator>,
        store: Arc<TokenStore>,
        events: SessionEventBus,
        _triggers: mpsc::UnboundedReceiver<crate::session::scheduler::RenewalTrigger>,
    }

    fn harness(backend: Arc<dyn IdentityBackend>, renewal_timeout: Duration) -> Harness {
        harness_with(backend, renewal_timeout, renewal_timeout * 2)
    }

    fn harness_with(
        backend: Arc<dyn IdentityBackend>,
        renewal_timeout: Duration,
        waiter_timeout: Duration,
    ) -> Harness {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Arc::new(TokenStore::new(Arc::new(RefreshScheduler::new(
            Duration::from_secs(120),
            tx,
        ))));
        let events = SessionEventBus::new();
        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            backend,
            events.clone(),
            renewal_timeout,
            waiter_timeout,
        ));
        Harness {
            coordinator,
            store,
            events,
            _triggers: rx,
        }
    }

    async fn wait_for_callers(coordinator: &RefreshCoordinator, n: usize) {
        while coordinator.pending_callers() < n {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_single_caller_success() {
        let fresh = token_expiring_in("user-1", 900);
        let backend = {
            let fresh = fresh.clone();
            ScriptedBackend::new(false, move || Ok(TokenResponse::new(fresh.clone())))
        };
        let h = harness(backend.clone(), Duration::from_secs(5));

        let cred = h.coordinator.request_refresh().await.unwrap();
        assert_eq!(cred.token(), fresh);
        assert_eq!(h.store.get().unwrap().token(), fresh);
        assert_eq!(h.coordinator.state(), RefreshState::Idle);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_renewal() {
        let fresh = token_expiring_in("user-1", 900);
        let backend = {
            let fresh = fresh.clone();
            ScriptedBackend::new(true, move || Ok(TokenResponse::new(fresh.clone())))
        };
        let h = harness(backend.clone(), Duration::from_secs(5));

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let c = h.coordinator.clone();
                tokio::spawn(async move { c.request_refresh().await })
            })
            .collect();

        wait_for_callers(&h.coordinator, 5).await;
        assert_eq!(h.coordinator.state(), RefreshState::Refreshing);
        while backend.calls() == 0 {
            tokio::task::yield_now().await;
        }
        backend.gate.notify_one();

        let mut tokens = Vec::new();
        for handle in handles {
            tokens.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(backend.calls(), 1);
        assert!(tokens.iter().all(|c| Arc::ptr_eq(c, &tokens[0])));
        assert_eq!(tokens[0].token(), fresh);
        assert_eq!(h.coordinator.state(), RefreshState::Idle);
    }

    #[tokio::test]
    async fn test_failure_is_uniform_and_published_once() {
        let backend = ScriptedBackend::new(true, || {
            Err(BackendError::Rejected {
                status: 401,
                message: "refresh cookie expired".into(),
            })
        });
        let h = harness(backend.clone(), Duration::from_secs(5));
        h.store.set(&token_expiring_in("user-1", 30)).unwrap();

        let mut events = h.events.subscribe_channel();
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let c = h.coordinator.clone();
                tokio::spawn(async move { c.request_refresh().await })
            })
            .collect();
        wait_for_callers(&h.coordinator, 3).await;
        while backend.calls() == 0 {
            tokio::task::yield_now().await;
        }
        backend.gate.notify_one();

        let mut failures = Vec::new();
        for handle in handles {
            failures.push(handle.await.unwrap().unwrap_err());
        }

        assert_eq!(backend.calls(), 1);
        assert!(failures.iter().all(|f| f == &failures[0]));
        assert_eq!(failures[0].kind(), &RenewalFailureKind::Rejected { status: 401 });
        assert!(h.store.get().is_none());

        assert!(matches!(events.recv().await, Some(SessionEvent::SessionEnded { .. })));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_renewal_timeout_is_terminal() {
        let backend = ScriptedBackend::new(true, || Ok(TokenResponse::new("never.used.token")));
        let h = harness(backend.clone(), Duration::from_secs(15));
        let mut events = h.events.subscribe_channel();

        let c = h.coordinator.clone();
        let first = tokio::spawn(async move { c.request_refresh().await });
        wait_for_callers(&h.coordinator, 1).await;
        let c = h.coordinator.clone();
        let second = tokio::spawn(async move { c.request_refresh().await });
        wait_for_callers(&h.coordinator, 2).await;

        // Nobody opens the gate; the paused clock auto-advances to the timeout.
        let a = first.await.unwrap().unwrap_err();
        let b = second.await.unwrap().unwrap_err();

        assert_eq!(a.kind(), &RenewalFailureKind::Timeout);
        assert_eq!(a, b);
        assert_eq!(a.to_string(), crate::error::SESSION_EXPIRED_MESSAGE);
        assert_eq!(backend.calls(), 1);
        assert!(matches!(events.recv().await, Some(SessionEvent::SessionEnded { .. })));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_timeout_settles_attempt_once() {
        let fresh = token_expiring_in("user-1", 900);
        let backend = {
            let fresh = fresh.clone();
            ScriptedBackend::new(true, move || Ok(TokenResponse::new(fresh.clone())))
        };
        let h = harness_with(backend.clone(), Duration::from_secs(60), Duration::from_secs(5));
        h.store.set(&token_expiring_in("user-1", 600)).unwrap();
        let mut events = h.events.subscribe_channel();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let c = h.coordinator.clone();
                tokio::spawn(async move { c.request_refresh().await })
            })
            .collect();
        wait_for_callers(&h.coordinator, 2).await;

        for handle in handles {
            let failure = handle.await.unwrap().unwrap_err();
            assert_eq!(failure.kind(), &RenewalFailureKind::WaiterTimedOut);
            assert_eq!(failure.to_string(), crate::error::SESSION_EXPIRED_MESSAGE);
        }
        assert!(h.store.get().is_none());
        assert_eq!(h.coordinator.state(), RefreshState::Idle);
        assert!(matches!(events.recv().await, Some(SessionEvent::SessionEnded { .. })));

        // The renewal finishing late is discarded.
        backend.gate.notify_one();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(h.store.get().is_none());
        assert!(events.try_recv().is_err());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_renewal_task_panic_interrupts_callers() {
        let backend = ScriptedBackend::new(false, || panic!("backend exploded"));
        let h = harness(backend, Duration::from_secs(5));
        h.store.set(&token_expiring_in("user-1", 600)).unwrap();
        let mut events = h.events.subscribe_channel();

        let failure = h.coordinator.request_refresh().await.unwrap_err();
        assert_eq!(failure.kind(), &RenewalFailureKind::Interrupted);
        assert!(h.store.get().is_none());
        assert_eq!(h.coordinator.state(), RefreshState::Idle);
        assert!(matches!(events.recv().await, Some(SessionEvent::SessionEnded { .. })));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_renewal_response_fails_and_clears() {
        let backend = ScriptedBackend::new(false, || Ok(TokenResponse::new("not-a-valid-token")));
        let h = harness(backend, Duration::from_secs(5));
        let mut events = h.events.subscribe_channel();
        h.store.set(&token_expiring_in("user-1", 30)).unwrap();

        let failure = h.coordinator.request_refresh().await.unwrap_err();
        assert_eq!(failure.kind(), &RenewalFailureKind::MalformedCredential);
        assert!(h.store.get().is_none());
        assert!(events.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_sequential_refreshes_each_call_backend() {
        let backend = ScriptedBackend::new(false, || {
            Ok(TokenResponse::new(token_expiring_in("user-1", 900)))
        });
        let h = harness(backend.clone(), Duration::from_secs(5));

        h.coordinator.request_refresh().await.unwrap();
        h.coordinator.request_refresh().await.unwrap();
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_recovery_is_silent() {
        let backend = ScriptedBackend::new(false, || {
            Err(BackendError::Rejected {
                status: 401,
                message: String::new(),
            })
        });
        let h = harness(backend, Duration::from_secs(5));
        let mut events = h.events.subscribe_channel();

        let failure = h.coordinator.recover().await.unwrap_err();
        assert_eq!(failure.kind(), &RenewalFailureKind::NoSession);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_recovery_joined_by_refresh_publishes() {
        let backend = ScriptedBackend::new(true, || {
            Err(BackendError::Rejected {
                status: 500,
                message: "down".into(),
            })
        });
        let h = harness(backend.clone(), Duration::from_secs(5));
        let mut events = h.events.subscribe_channel();

        let c = h.coordinator.clone();
        let recovering = tokio::spawn(async move { c.recover().await });
        wait_for_callers(&h.coordinator, 1).await;
        let c = h.coordinator.clone();
        let refreshing = tokio::spawn(async move { c.request_refresh().await });
        wait_for_callers(&h.coordinator, 2).await;
        while backend.calls() == 0 {
            tokio::task::yield_now().await;
        }
        backend.gate.notify_one();

        assert!(recovering.await.unwrap().is_err());
        assert!(refreshing.await.unwrap().is_err());
        assert_eq!(backend.calls(), 1);
        assert!(events.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_refused_renewed_credential_ends_session_once() {
        let backend = ScriptedBackend::new(false, || {
            Ok(TokenResponse::new(token_expiring_in("user-1", 900)))
        });
        let h = harness(backend, Duration::from_secs(5));
        let mut events = h.events.subscribe_channel();

        let renewed = h.coordinator.request_refresh().await.unwrap();
        let first = h.coordinator.reject_renewed(&renewed, 401);
        let second = h.coordinator.reject_renewed(&renewed, 401);

        assert_eq!(first.kind(), &RenewalFailureKind::RejectedAfterRenewal { status: 401 });
        assert_eq!(first, second);
        assert!(h.store.get().is_none());
        assert!(matches!(events.recv().await, Some(SessionEvent::SessionEnded { .. })));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_strand_queue() {
        let fresh = token_expiring_in("user-1", 900);
        let backend = {
            let fresh = fresh.clone();
            ScriptedBackend::new(true, move || Ok(TokenResponse::new(fresh.clone())))
        };
        let h = harness(backend.clone(), Duration::from_secs(5));

        let c = h.coordinator.clone();
        let leader = tokio::spawn(async move { c.request_refresh().await });
        wait_for_callers(&h.coordinator, 1).await;
        let c = h.coordinator.clone();
        let follower = tokio::spawn(async move { c.request_refresh().await });
        wait_for_callers(&h.coordinator, 2).await;

        leader.abort();
        while backend.calls() == 0 {
            tokio::task::yield_now().await;
        }
        backend.gate.notify_one();

        assert_eq!(follower.await.unwrap().unwrap().token(), fresh);
        assert_eq!(h.store.get().unwrap().token(), fresh);
    }
}
