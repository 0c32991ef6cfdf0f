//! Session facade.
//!
//! One `Session` per process owns the shared pieces: the credential store,
//! the single refresh coordinator, the gateway and the renewal scheduler.
//! Everything that needs credentials goes through it.

use chrono::Utc;
use ride_domain::{CredentialPair, SessionState};
use ride_store::CredentialStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::coordinator::RefreshCoordinator;
use crate::error::SessionResult;
use crate::events::{SessionEvent, SessionEventReceiver, SessionEvents};
use crate::gateway::Gateway;
use crate::ports::{ApiRequest, ApiResponse, HttpPort, RenewalPort};
use crate::scheduler::{RenewalScheduler, DEFAULT_RENEWAL_INTERVAL};
use crate::token::DEFAULT_LOOKAHEAD;

/// Session tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Tokens expiring within this window count as expired
    pub lookahead: Duration,
    /// Background renewal tick period
    pub renewal_interval: Duration,
    /// Session event bus capacity (at least 1)
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lookahead: DEFAULT_LOOKAHEAD,
            renewal_interval: DEFAULT_RENEWAL_INTERVAL,
            event_capacity: 64,
        }
    }
}

/// Authenticated client session.
pub struct Session {
    store: Arc<dyn CredentialStore>,
    events: Arc<SessionEvents>,
    coordinator: Arc<RefreshCoordinator>,
    gateway: Arc<Gateway>,
    scheduler: RenewalScheduler,
}

impl Session {
    /// Wire a session over a store and transports.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        renewal: Arc<dyn RenewalPort>,
        http: Arc<dyn HttpPort>,
        config: SessionConfig,
    ) -> Self {
        let events = Arc::new(SessionEvents::new(config.event_capacity));
        let coordinator = Arc::new(RefreshCoordinator::new(store.clone(), renewal, events.clone()));
        let gateway = Arc::new(
            Gateway::new(store.clone(), coordinator.clone(), http).with_lookahead(config.lookahead),
        );
        let scheduler = RenewalScheduler::new(store.clone(), coordinator.clone())
            .with_period(config.renewal_interval)
            .with_lookahead(config.lookahead);

        Self {
            store,
            events,
            coordinator,
            gateway,
            scheduler,
        }
    }

    /// Install credentials obtained from a login.
    pub async fn login(&self, pair: CredentialPair) -> SessionResult<()> {
        self.coordinator.settled().await;
        self.store.set(pair).await?;
        info!("Session authenticated");
        self.events.publish(SessionEvent::LoggedIn { at: Utc::now() });
        Ok(())
    }

    /// End the session: stop background renewal and forget credentials.
    ///
    /// An in-flight renewal is allowed to settle first so it cannot
    /// re-install credentials after the logout.
    pub async fn logout(&self) -> SessionResult<()> {
        self.scheduler.stop().await;
        self.coordinator.settled().await;
        self.store.clear().await?;
        info!("Session logged out");
        self.events.publish(SessionEvent::LoggedOut { at: Utc::now() });
        Ok(())
    }

    /// Current authentication state.
    pub async fn state(&self) -> SessionResult<SessionState> {
        Ok(SessionState::from(self.store.get().await?))
    }

    /// Execute an authenticated call through the gateway.
    pub async fn execute(&self, request: ApiRequest) -> SessionResult<ApiResponse> {
        self.gateway.execute(request).await
    }

    /// Renew now (joining any in-flight renewal).
    pub async fn refresh(&self) -> SessionResult<String> {
        Ok(self.coordinator.refresh().await?)
    }

    /// Start background renewal. Returns `false` if already running.
    pub fn start_renewal(&self) -> bool {
        self.scheduler.start()
    }

    /// Stop background renewal.
    pub async fn stop_renewal(&self) {
        self.scheduler.stop().await;
    }

    /// Background renewal ticks that failed.
    pub fn renewal_failures(&self) -> u64 {
        self.scheduler.failure_count()
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> SessionEventReceiver {
        self.events.subscribe()
    }

    /// Shared gateway (also the simulator's position sink).
    pub fn gateway(&self) -> Arc<Gateway> {
        self.gateway.clone()
    }

    /// Shared refresh coordinator.
    pub fn coordinator(&self) -> Arc<RefreshCoordinator> {
        self.coordinator.clone()
    }
}

// =============================================================================
// Tests
// =============================================================================
