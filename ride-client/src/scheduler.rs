//! Background renewal scheduler.
//!
//! Ticks on a fixed period independent of user activity. On each tick, if a
//! credential is held and expires within the lookahead, it asks the shared
//! coordinator for a renewal. Because it goes through the same coordinator as
//! the gateway, a proactive renewal and a request-triggered one never run
//! side by side.
//!
//! Tick failures are counted and logged, never fatal: the scheduler keeps
//! running and tries again on the next tick.

use ride_store::CredentialStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::RefreshCoordinator;
use crate::token::{self, DEFAULT_LOOKAHEAD};

/// Default tick period: four minutes, inside the five-minute lookahead.
pub const DEFAULT_RENEWAL_INTERVAL: Duration = Duration::from_secs(240);

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Periodic proactive credential renewal.
pub struct RenewalScheduler {
    store: Arc<dyn CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    period: Duration,
    lookahead: Duration,
    failures: Arc<AtomicU64>,
    running: Mutex<Option<Running>>,
}

impl RenewalScheduler {
    /// Create a stopped scheduler with default period and lookahead.
    pub fn new(store: Arc<dyn CredentialStore>, coordinator: Arc<RefreshCoordinator>) -> Self {
        Self {
            store,
            coordinator,
            period: DEFAULT_RENEWAL_INTERVAL,
            lookahead: DEFAULT_LOOKAHEAD,
            failures: Arc::new(AtomicU64::new(0)),
            running: Mutex::new(None),
        }
    }

    /// Override the tick period (clamped to at least one millisecond).
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period.max(Duration::from_millis(1));
        self
    }

    /// Override the expiry lookahead.
    pub fn with_lookahead(mut self, lookahead: Duration) -> Self {
        self.lookahead = lookahead;
        self
    }

    /// Start ticking. The first tick fires one period from now.
    ///
    /// Returns `false` if the scheduler was already running.
    pub fn start(&self) -> bool {
        let mut running = self.lock();
        if running.is_some() {
            debug!("Renewal scheduler already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(
            self.store.clone(),
            self.coordinator.clone(),
            self.period,
            self.lookahead,
            self.failures.clone(),
            cancel.clone(),
        ));

        *running = Some(Running { cancel, task });
        info!(period_secs = self.period.as_secs(), "Renewal scheduler started");
        true
    }

    /// Stop ticking and wait for the tick task to finish. Idempotent.
    pub async fn stop(&self) {
        let running = self.lock().take();
        if let Some(running) = running {
            running.cancel.cancel();
            let _ = running.task.await;
            info!("Renewal scheduler stopped");
        }
    }

    /// Check if the scheduler is ticking.
    pub fn is_running(&self) -> bool {
        self.lock().is_some()
    }

    /// Number of ticks whose renewal attempt failed.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn run(
    store: Arc<dyn CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    period: Duration,
    lookahead: Duration,
    failures: Arc<AtomicU64>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                tick(store.as_ref(), &coordinator, lookahead, &failures).await;
            }
        }
    }
}

async fn tick(
    store: &dyn CredentialStore,
    coordinator: &RefreshCoordinator,
    lookahead: Duration,
    failures: &AtomicU64,
) {
    let pair = match store.get().await {
        Ok(Some(pair)) => pair,
        Ok(None) => {
            debug!("No credentials held; renewal tick skipped");
            return;
        },
        Err(e) => {
            failures.fetch_add(1, Ordering::SeqCst);
            warn!(error = %e, "Renewal tick could not read credentials");
            return;
        },
    };

    if !token::is_expired(pair.access_token(), lookahead) {
        debug!("Access token still fresh; renewal tick idle");
        return;
    }

    match coordinator.refresh().await {
        Ok(_) => info!("Proactive credential renewal succeeded"),
        Err(reason) => {
            failures.fetch_add(1, Ordering::SeqCst);
            warn!(reason = %reason, "Proactive credential renewal failed; will retry next tick");
        },
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{SessionEvent, SessionEvents};
    use crate::stub::{unsigned_token, StubRenewal};
    use chrono::Utc;
    use ride_domain::CredentialPair;
    use ride_store::MemoryCredentialStore;

    const PERIOD: Duration = Duration::from_secs(240);

    fn expiring_pair() -> CredentialPair {
        CredentialPair::new(unsigned_token(Utc::now() + chrono::Duration::seconds(60)), "r1")
    }

    fn fresh_pair() -> CredentialPair {
        CredentialPair::new(unsigned_token(Utc::now() + chrono::Duration::hours(2)), "r2")
    }

    fn setup(
        pair: Option<CredentialPair>,
        renewal: Arc<StubRenewal>,
    ) -> (RenewalScheduler, Arc<MemoryCredentialStore>, Arc<SessionEvents>) {
        let store = Arc::new(match pair {
            Some(pair) => MemoryCredentialStore::with_pair(pair),
            None => MemoryCredentialStore::new(),
        });
        let events = Arc::new(SessionEvents::default());
        let coordinator = Arc::new(RefreshCoordinator::new(store.clone(), renewal, events.clone()));
        let scheduler = RenewalScheduler::new(store.clone(), coordinator).with_period(PERIOD);
        (scheduler, store, events)
    }

    async fn settle_tasks() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_renews_expiring_token() {
        let renewal = Arc::new(StubRenewal::issuing(fresh_pair()));
        let (scheduler, store, events) = setup(Some(expiring_pair()), renewal.clone());
        let mut receiver = events.subscribe();

        assert!(scheduler.start());
        let event = receiver.recv().await.unwrap().unwrap();

        assert!(matches!(event, SessionEvent::Refreshed { .. }));
        assert_eq!(renewal.calls(), 1);
        assert_eq!(store.get().await.unwrap().unwrap().refresh_token(), "r2");
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_renewal_before_first_period() {
        let renewal = Arc::new(StubRenewal::issuing(fresh_pair()));
        let (scheduler, _store, _events) = setup(Some(expiring_pair()), renewal.clone());

        scheduler.start();
        tokio::time::advance(PERIOD - Duration::from_secs(1)).await;
        settle_tasks().await;

        assert_eq!(renewal.calls(), 0);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_token_is_left_alone() {
        let renewal = Arc::new(StubRenewal::issuing(fresh_pair()));
        let (scheduler, _store, _events) = setup(Some(fresh_pair()), renewal.clone());

        scheduler.start();
        tokio::time::advance(PERIOD * 3).await;
        settle_tasks().await;

        assert_eq!(renewal.calls(), 0);
        assert_eq!(scheduler.failure_count(), 0);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_tick_is_not_fatal() {
        let renewal = Arc::new(StubRenewal::rejecting(401));
        let (scheduler, store, events) = setup(Some(expiring_pair()), renewal.clone());
        let mut receiver = events.subscribe();

        scheduler.start();
        let first = receiver.recv().await.unwrap().unwrap();
        assert!(matches!(first, SessionEvent::AuthenticationFailed { .. }));
        settle_tasks().await;
        assert_eq!(scheduler.failure_count(), 1);
        assert!(scheduler.is_running());

        // Host logs in again; the next tick renews normally.
        renewal.set_outcome(Ok(fresh_pair()));
        store.set(expiring_pair()).await.unwrap();

        let second = receiver.recv().await.unwrap().unwrap();
        assert!(matches!(second, SessionEvent::Refreshed { .. }));
        assert_eq!(renewal.calls(), 2);
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent_and_stop_is_final() {
        let renewal = Arc::new(StubRenewal::issuing(fresh_pair()));
        let (scheduler, _store, _events) = setup(Some(expiring_pair()), renewal.clone());

        assert!(scheduler.start());
        assert!(!scheduler.start());

        scheduler.stop().await;
        scheduler.stop().await;
        assert!(!scheduler.is_running());

        tokio::time::advance(PERIOD * 2).await;
        settle_tasks().await;
        assert_eq!(renewal.calls(), 0);
    }
}
