//! Daemon: Main runtime orchestrator.
//!
//! The Daemon ties together all components:
//! - Session (credential store, refresh coordinator, gateway, scheduler)
//! - Position simulator (writes through the gateway)
//! - Live position channel (logs fixes for a watched subject)
//!
//! # Lifecycle
//!
//! 1. Load configuration
//! 2. Initialize components
//! 3. Log in from configured credentials
//! 4. Start background renewal, simulator and watcher
//! 5. Main event loop (session events)
//! 6. Graceful shutdown on SIGINT, or exit when the session is terminated

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use ride_client::{
    LivePositionChannel, PositionFeedPort, PositionSubscription, Session, SessionConfig, SessionEvent,
};
use ride_connectors::{RestClient, WsPositionFeed};
use ride_domain::{Route, SessionState};
use ride_sim::{demo_route, load_route, PositionSimulator};
use ride_store::{CredentialStore, FileCredentialStore, MemoryCredentialStore};

use crate::config::Config;
use crate::error::{DaemonError, DaemonResult};

// =============================================================================
// Daemon
// =============================================================================

/// The main ride daemon.
pub struct Daemon {
    /// Configuration
    config: Config,
    /// Authenticated session
    session: Arc<Session>,
    /// Position simulator, when a subject is configured
    simulator: Option<PositionSimulator>,
    /// Live position channel
    channel: LivePositionChannel,
}

impl Daemon {
    /// Create a daemon over the real REST and WebSocket adapters.
    pub async fn from_config(config: Config) -> DaemonResult<Self> {
        let store: Arc<dyn CredentialStore> = match &config.session.credentials_path {
            Some(path) => {
                info!(path = %path.display(), "Using file credential store");
                Arc::new(FileCredentialStore::new(path.clone()))
            },
            None => Arc::new(MemoryCredentialStore::new()),
        };

        let rest = Arc::new(RestClient::new(config.api.base_url.clone()));
        let session = Arc::new(Session::new(store, rest.clone(), rest, session_config(&config)));
        let feed = Arc::new(WsPositionFeed::new(config.api.ws_url.clone()));

        let route = match &config.simulator.route_path {
            Some(path) => load_route(path).await?,
            None => demo_route()?,
        };

        Ok(Self::new(config, session, feed, route))
    }

    /// Create a daemon with provided components.
    pub fn new(config: Config, session: Arc<Session>, feed: Arc<dyn PositionFeedPort>, route: Route) -> Self {
        let simulator = config.simulator.subject.clone().map(|subject| {
            PositionSimulator::new(subject, route, session.gateway()).with_interval(config.simulator.interval)
        });

        Self {
            config,
            session,
            simulator,
            channel: LivePositionChannel::new(feed),
        }
    }

    /// Shared session.
    pub fn session(&self) -> Arc<Session> {
        self.session.clone()
    }

    /// Run the daemon.
    ///
    /// This method blocks until shutdown is requested (SIGINT) or the
    /// session is terminated.
    pub async fn run(self) -> DaemonResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `shutdown` resolves or the session is terminated.
    ///
    /// # Errors
    ///
    /// `DaemonError::SessionTerminated` if credential renewal failed; the
    /// host must log in again.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) -> DaemonResult<()> {
        info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %self.config.environment,
            api_url = %self.config.api.base_url,
            "Starting ride daemon"
        );

        // 1. Subscribe before anything can publish
        let mut events = self.session.subscribe();

        // 2. Log in
        if let Some(pair) = self.config.session.initial_credentials.clone() {
            self.session.login(pair).await?;
        }
        match self.session.state().await? {
            SessionState::Authenticated(_) => info!("Session ready"),
            SessionState::Unauthenticated => warn!("No credentials; authenticated calls will fail"),
        }

        // 3. Start background work
        self.session.start_renewal();
        if let Some(simulator) = &self.simulator {
            simulator.start();
        }
        let watcher = self.start_watcher().await;

        // 4. Main event loop
        info!("Entering main event loop");
        tokio::pin!(shutdown);
        let outcome = loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Some(Ok(SessionEvent::AuthenticationFailed { reason, .. })) => {
                            error!(reason = %reason, "Session terminated; login required");
                            break Err(DaemonError::SessionTerminated(reason));
                        }
                        Some(Ok(event)) => log_event(&event),
                        Some(Err(lag_msg)) => warn!(%lag_msg, "Session event receiver lagged"),
                        None => break Ok(()),
                    }
                }

                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break Ok(());
                }
            }
        };

        // 5. Graceful shutdown
        self.shutdown(watcher).await;

        outcome
    }

    /// Subscribe the live channel for the watched subject and log its fixes.
    async fn start_watcher(&self) -> Option<JoinHandle<()>> {
        let subject = self.config.watch_subject.clone()?;

        match self.channel.subscribe(subject.clone()).await {
            Ok(subscription) => Some(tokio::spawn(watch(subscription))),
            Err(e) => {
                warn!(subject = %subject, error = %e, "Live channel unavailable; watcher not started");
                None
            },
        }
    }

    /// Graceful shutdown.
    async fn shutdown(&self, watcher: Option<JoinHandle<()>>) {
        info!("Initiating graceful shutdown");

        if let Some(simulator) = &self.simulator {
            simulator.stop().await;
        }
        self.session.stop_renewal().await;
        self.channel.unsubscribe().await;
        if let Some(watcher) = watcher {
            let _ = watcher.await;
        }

        info!("Shutdown complete");
    }
}

fn session_config(config: &Config) -> SessionConfig {
    SessionConfig {
        lookahead: config.session.lookahead,
        renewal_interval: config.session.renewal_interval,
        ..SessionConfig::default()
    }
}

fn log_event(event: &SessionEvent) {
    match event {
        SessionEvent::LoggedIn { .. } => info!("Logged in"),
        SessionEvent::Refreshed { episode, .. } => info!(episode, "Credentials renewed"),
        SessionEvent::LoggedOut { .. } => info!("Logged out"),
        SessionEvent::AuthenticationFailed { reason, .. } => warn!(reason = %reason, "Authentication failed"),
    }
}

async fn watch(mut subscription: PositionSubscription) {
    let subject = subscription.subject().clone();
    info!(subject = %subject, "Watching live positions");

    while let Some(position) = subscription.recv().await {
        info!(
            subject = %position.subject,
            latitude = position.latitude(),
            longitude = position.longitude(),
            "Live position"
        );
    }

    info!(subject = %subject, "Live position watch ended");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// =============================================================================
// Tests
// =============================================================================
