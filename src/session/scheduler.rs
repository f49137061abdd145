//! Proactive credential renewal.
//!
//! The scheduler never calls the backend itself. When a renewal is due it
//! sends a [`RenewalTrigger`] to the session driver task, which hands it to
//! the refresh coordinator. Triggers carry the store generation they were
//! armed for so the driver can drop stale ones.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::credential::{AccessCredential, now_ms};
use crate::session::store::TokenStore;

/// Why a renewal was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// The proactive timer fired.
    Scheduled,
    /// The credential was installed already inside the safety margin.
    ExpiringNow,
    /// The periodic liveness check found an invalid credential.
    Liveness,
    /// The periodic liveness check found no credential at all. Handled
    /// through the quiet recovery path.
    Recover,
}

/// Request sent to the session driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalTrigger {
    pub reason: TriggerReason,
    pub generation: u64,
}

struct ArmedTimer {
    handle: JoinHandle<()>,
    deadline: Instant,
}

#[derive(Default)]
struct SchedulerState {
    timer: Option<ArmedTimer>,
    arms: u64,
    /// Set when the last install triggered an immediate renewal.
    immediate_streak: bool,
}

/// One-shot renewal timer, re-armed on every credential install.
pub struct RefreshScheduler {
    safety_margin: Duration,
    trigger_tx: mpsc::UnboundedSender<RenewalTrigger>,
    state: Mutex<SchedulerState>,
}

impl RefreshScheduler {
    pub fn new(safety_margin: Duration, trigger_tx: mpsc::UnboundedSender<RenewalTrigger>) -> Self {
        Self {
            safety_margin,
            trigger_tx,
            state: Mutex::new(SchedulerState::default()),
        }
    }

    pub fn safety_margin(&self) -> Duration {
        self.safety_margin
    }

    /// Cancel any armed timer, then schedule renewal for `credential`.
    ///
    /// A credential with more than the safety margin left gets a timer for
    /// `expiry - margin`. One installed inside the margin is renewed right
    /// away, unless the previous install was also inside the margin: in that
    /// case the backend is issuing credentials shorter than the margin, and
    /// the timer is armed for half the remaining lifetime instead. Each
    /// renewal still happens before expiry, at most twice per lifetime.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn rearm(&self, credential: &AccessCredential, generation: u64) {
        let mut state = self.state.lock().expect("lock poisoned");
        Self::cancel_locked(&mut state);

        let margin_ms = self.safety_margin.as_millis() as i64;
        let remaining_ms = credential.expires_at_ms().saturating_sub(now_ms());
        let delay_ms = remaining_ms.saturating_sub(margin_ms);

        if delay_ms > 0 {
            state.immediate_streak = false;
            self.arm_locked(&mut state, Duration::from_millis(delay_ms as u64), generation);
            return;
        }

        if !state.immediate_streak {
            state.immediate_streak = true;
            info!(remaining_ms, "Credential installed inside the safety margin, renewing now");
            self.send(RenewalTrigger {
                reason: TriggerReason::ExpiringNow,
                generation,
            });
            return;
        }

        let deferred_ms = remaining_ms / 2;
        warn!(
            remaining_ms,
            deferred_ms,
            "Renewed credential is shorter than the safety margin, deferring renewal"
        );
        if deferred_ms > 0 {
            self.arm_locked(&mut state, Duration::from_millis(deferred_ms as u64), generation);
        }
    }

    /// Cancel the armed timer, if any.
    pub fn cancel(&self) {
        let mut state = self.state.lock().expect("lock poisoned");
        Self::cancel_locked(&mut state);
        state.immediate_streak = false;
    }

    /// Whether a timer is armed and has not fired yet.
    pub fn is_armed(&self) -> bool {
        let state = self.state.lock().expect("lock poisoned");
        state
            .timer
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Time until the armed timer fires.
    pub fn time_until_fire(&self) -> Option<Duration> {
        let state = self.state.lock().expect("lock poisoned");
        state
            .timer
            .as_ref()
            .filter(|t| !t.handle.is_finished())
            .map(|t| t.deadline.saturating_duration_since(Instant::now()))
    }

    /// Total number of timers armed since construction.
    pub fn arm_count(&self) -> u64 {
        self.state.lock().expect("lock poisoned").arms
    }

    fn cancel_locked(state: &mut SchedulerState) {
        if let Some(timer) = state.timer.take() {
            timer.handle.abort();
            debug!("Cancelled renewal timer");
        }
    }

    fn arm_locked(&self, state: &mut SchedulerState, delay: Duration, generation: u64) {
        let deadline = Instant::now() + delay;
        let tx = self.trigger_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            debug!(generation, "Renewal timer fired");
            let _ = tx.send(RenewalTrigger {
                reason: TriggerReason::Scheduled,
                generation,
            });
        });
        state.timer = Some(ArmedTimer { handle, deadline });
        state.arms += 1;
        debug!(delay_secs = delay.as_secs(), generation, "Armed renewal timer");
    }

    fn send(&self, trigger: RenewalTrigger) {
        if self.trigger_tx.send(trigger).is_err() {
            debug!(?trigger, "Session driver gone, dropping renewal trigger");
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            Self::cancel_locked(&mut state);
        }
    }
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("safety_margin", &self.safety_margin)
            .field("armed", &self.is_armed())
            .finish()
    }
}

/// Spawn the periodic liveness check.
///
/// Every `period` it looks at the store and, when it does not hold a valid
/// credential, asks for one: a renewal if an expired credential is present,
/// a recovery if the store is empty. The first check happens one full
/// period after spawning.
pub fn spawn_liveness_check(
    store: Arc<TokenStore>,
    period: Duration,
    trigger_tx: mpsc::UnboundedSender<RenewalTrigger>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let (credential, generation) = store.snapshot();
            let reason = match credential {
                Some(credential) if !credential.is_expired() => continue,
                Some(_) => {
                    warn!("Liveness check found an expired credential, requesting renewal");
                    TriggerReason::Liveness
                }
                None => {
                    debug!("Liveness check found no credential, attempting recovery");
                    TriggerReason::Recover
                }
            };
            if trigger_tx.send(RenewalTrigger { reason, generation }).is_err() {
                debug!("Session driver gone, stopping liveness check");
                break;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::token_expiring_in;

    fn scheduler(margin_secs: u64) -> (RefreshScheduler, mpsc::UnboundedReceiver<RenewalTrigger>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RefreshScheduler::new(Duration::from_secs(margin_secs), tx), rx)
    }

    fn cred(secs: i64) -> AccessCredential {
        AccessCredential::parse(token_expiring_in("user", secs)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_armed_before_expiry_by_margin() {
        let (scheduler, mut rx) = scheduler(120);
        scheduler.rearm(&cred(600), 1);

        assert!(scheduler.is_armed());
        assert_eq!(scheduler.arm_count(), 1);
        let until = scheduler.time_until_fire().unwrap();
        assert!(until <= Duration::from_secs(480));
        assert!(until > Duration::from_secs(475));

        tokio::time::advance(Duration::from_secs(470)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(15)).await;
        let trigger = rx.recv().await.unwrap();
        assert_eq!(
            trigger,
            RenewalTrigger {
                reason: TriggerReason::Scheduled,
                generation: 1
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_cancels_previous_timer() {
        let (scheduler, mut rx) = scheduler(120);
        scheduler.rearm(&cred(300), 1);
        scheduler.rearm(&cred(3600), 2);
        assert_eq!(scheduler.arm_count(), 2);

        // The first timer would have fired at ~180s.
        tokio::time::advance(Duration::from_secs(600)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
        assert!(scheduler.is_armed());

        tokio::time::advance(Duration::from_secs(3000)).await;
        let trigger = rx.recv().await.unwrap();
        assert_eq!(trigger.generation, 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_inside_margin_triggers_immediately() {
        let (scheduler, mut rx) = scheduler(120);
        scheduler.rearm(&cred(60), 7);

        assert!(!scheduler.is_armed());
        assert_eq!(scheduler.arm_count(), 0);
        let trigger = rx.try_recv().unwrap();
        assert_eq!(trigger.reason, TriggerReason::ExpiringNow);
        assert_eq!(trigger.generation, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_short_credentials_defer_to_half_lifetime() {
        let (scheduler, mut rx) = scheduler(120);
        scheduler.rearm(&cred(60), 1);
        assert_eq!(rx.try_recv().unwrap().reason, TriggerReason::ExpiringNow);

        scheduler.rearm(&cred(90), 2);
        assert!(rx.try_recv().is_err());
        assert!(scheduler.is_armed());
        let until = scheduler.time_until_fire().unwrap();
        assert!(until <= Duration::from_secs(45));
        assert!(until > Duration::from_secs(40));

        tokio::time::advance(Duration::from_secs(46)).await;
        let trigger = rx.recv().await.unwrap();
        assert_eq!(trigger.reason, TriggerReason::Scheduled);
        assert_eq!(trigger.generation, 2);

        // A healthy credential resets the streak.
        scheduler.rearm(&cred(3600), 3);
        scheduler.rearm(&cred(30), 4);
        assert_eq!(rx.try_recv().unwrap().reason, TriggerReason::ExpiringNow);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_disarms() {
        let (scheduler, mut rx) = scheduler(120);
        scheduler.rearm(&cred(600), 1);
        scheduler.cancel();
        assert!(!scheduler.is_armed());
        assert!(scheduler.time_until_fire().is_none());

        tokio::time::advance(Duration::from_secs(900)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_check_only_acts_on_invalid_credential() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let store = Arc::new(TokenStore::new(Arc::new(RefreshScheduler::new(
            Duration::from_secs(0),
            tx.clone(),
        ))));
        let handle = spawn_liveness_check(store.clone(), Duration::from_secs(300), tx);

        // Empty store: ask for a quiet recovery.
        tokio::time::advance(Duration::from_secs(301)).await;
        let trigger = rx.recv().await.unwrap();
        assert_eq!(
            trigger,
            RenewalTrigger {
                reason: TriggerReason::Recover,
                generation: 0
            }
        );

        // Valid credential: nothing to do.
        store.set(&token_expiring_in("user", 3600)).unwrap();
        tokio::time::advance(Duration::from_secs(300)).await;
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());

        // Credential already expired: the install itself asks for renewal,
        // and the liveness tick asks again.
        store.set(&token_expiring_in("user", -5)).unwrap();
        assert_eq!(rx.try_recv().unwrap().reason, TriggerReason::ExpiringNow);

        tokio::time::advance(Duration::from_secs(300)).await;
        let trigger = rx.recv().await.unwrap();
        assert_eq!(trigger.reason, TriggerReason::Liveness);
        assert_eq!(trigger.generation, store.generation());

        handle.abort();
    }
}
