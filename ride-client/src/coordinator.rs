//! Session refresh coordinator: single-flight credential renewal.
//!
//! # State Machine
//!
//! ```text
//!          refresh()                    exchange settles
//!   Idle ────────────► Refreshing(shared) ───────────────► Idle
//!                         ▲        │
//!                         └────────┘ refresh() joins the same future
//! ```
//!
//! The transition into `Refreshing` happens under a mutex, so concurrent
//! callers on any thread either start the episode or join it. The exchange
//! itself runs on a spawned task; it completes even if every waiter is
//! dropped, and it is the only writer of the credential store during
//! renewal.

use chrono::Utc;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use ride_store::CredentialStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::AuthFailure;
use crate::events::{SessionEvent, SessionEvents};
use crate::ports::RenewalPort;
use crate::token;

/// Outcome of a renewal episode: the new access token, or why it failed.
pub type RefreshOutcome = Result<String, AuthFailure>;

/// Renewal future shared by every waiter of one episode.
pub type SharedRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

enum RefreshState {
    Idle,
    Refreshing { episode: u64, future: SharedRefresh },
}

/// Coordinates credential renewal so at most one exchange is in flight.
pub struct RefreshCoordinator {
    store: Arc<dyn CredentialStore>,
    renewal: Arc<dyn RenewalPort>,
    events: Arc<SessionEvents>,
    state: Arc<Mutex<RefreshState>>,
    episodes: AtomicU64,
}

impl RefreshCoordinator {
    /// Create a coordinator over a store and renewal endpoint.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        renewal: Arc<dyn RenewalPort>,
        events: Arc<SessionEvents>,
    ) -> Self {
        Self {
            store,
            renewal,
            events,
            state: Arc::new(Mutex::new(RefreshState::Idle)),
            episodes: AtomicU64::new(0),
        }
    }

    /// Renew the credential pair, joining an in-flight renewal if any.
    ///
    /// Every caller that joins an episode observes the identical outcome.
    /// Must be called from within a tokio runtime.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.join_or_start().await
    }

    /// Forced renewal after the server rejected `rejected_token`.
    ///
    /// If the store already holds a different access token that is still
    /// valid under `lookahead`, someone renewed in the meantime and that
    /// token is returned without a new exchange.
    pub async fn refresh_stale(&self, rejected_token: &str, lookahead: Duration) -> RefreshOutcome {
        if let Ok(Some(pair)) = self.store.get().await {
            if pair.access_token() != rejected_token && !token::is_expired(pair.access_token(), lookahead) {
                debug!("Rejected token already replaced; reusing current token");
                return Ok(pair.access_token().to_string());
            }
        }
        self.refresh().await
    }

    /// Wait for the in-flight renewal, if any, without starting one.
    pub async fn settled(&self) {
        let pending = match &*lock(&self.state) {
            RefreshState::Refreshing { future, .. } => Some(future.clone()),
            RefreshState::Idle => None,
        };
        if let Some(pending) = pending {
            let _ = pending.await;
        }
    }

    /// Check if a renewal episode is in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(*lock(&self.state), RefreshState::Refreshing { .. })
    }

    /// Number of renewal episodes started so far.
    pub fn episodes_started(&self) -> u64 {
        self.episodes.load(Ordering::SeqCst)
    }

    fn join_or_start(&self) -> SharedRefresh {
        let mut state = lock(&self.state);

        if let RefreshState::Refreshing { episode, future } = &*state {
            debug!(episode, "Joining in-flight credential renewal");
            return future.clone();
        }

        let episode = self.episodes.fetch_add(1, Ordering::SeqCst) + 1;
        let task = tokio::spawn(run_episode(
            episode,
            self.store.clone(),
            self.renewal.clone(),
            self.events.clone(),
            self.state.clone(),
        ));

        let future = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => Err(AuthFailure::Aborted(e.to_string())),
            }
        }
        .boxed()
        .shared();

        *state = RefreshState::Refreshing {
            episode,
            future: future.clone(),
        };

        future
    }
}

/// One renewal episode: read, exchange, settle.
async fn run_episode(
    episode: u64,
    store: Arc<dyn CredentialStore>,
    renewal: Arc<dyn RenewalPort>,
    events: Arc<SessionEvents>,
    state: Arc<Mutex<RefreshState>>,
) -> RefreshOutcome {
    let refresh_token = match store.get().await {
        Ok(Some(pair)) => pair.refresh_token().to_string(),
        Ok(None) => {
            // Already unauthenticated; nothing new to announce.
            debug!(episode, "No refresh token; renewal skipped");
            settle(&state, episode);
            return Err(AuthFailure::NoRefreshToken);
        },
        Err(e) => {
            let reason = AuthFailure::Store(e.to_string());
            terminate(episode, &store, &events, &state, reason.clone()).await;
            return Err(reason);
        },
    };

    info!(episode, "Starting credential renewal");

    let pair = match renewal.renew(&refresh_token).await {
        Ok(pair) => pair,
        Err(reason) => {
            terminate(episode, &store, &events, &state, reason.clone()).await;
            return Err(reason);
        },
    };

    let access_token = pair.access_token().to_string();
    if let Err(e) = store.set(pair).await {
        let reason = AuthFailure::Store(e.to_string());
        terminate(episode, &store, &events, &state, reason.clone()).await;
        return Err(reason);
    }

    settle(&state, episode);
    info!(episode, outcome = "renewed", "Credential renewal succeeded");
    events.publish(SessionEvent::Refreshed { episode, at: Utc::now() });

    Ok(access_token)
}

/// Failure settle step: clear credentials, leave `Refreshing`, announce once.
async fn terminate(
    episode: u64,
    store: &Arc<dyn CredentialStore>,
    events: &SessionEvents,
    state: &Mutex<RefreshState>,
    reason: AuthFailure,
) {
    if let Err(e) = store.clear().await {
        error!(episode, error = %e, "Failed to clear credentials after renewal failure");
    }

    settle(state, episode);
    warn!(episode, outcome = "failed", reason = %reason, "Credential renewal failed; session terminated");
    events.publish(SessionEvent::AuthenticationFailed { reason, at: Utc::now() });
}

/// Return to `Idle` if `episode` is still the pending one.
fn settle(state: &Mutex<RefreshState>, episode: u64) {
    let mut state = lock(state);
    if matches!(&*state, RefreshState::Refreshing { episode: pending, .. } if *pending == episode) {
        *state = RefreshState::Idle;
    }
}

fn lock(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Tests
// =============================================================================
