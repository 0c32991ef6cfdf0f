//! Stub implementations for testing.
//!
//! These implementations simulate the renewal endpoint, the REST API and
//! the live channel transport without any network.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use ride_domain::{CredentialPair, PositionEvent, Subject};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::error::{AuthFailure, ChannelError, SessionError};
use crate::ports::{ApiRequest, ApiResponse, FeedConnection, HttpPort, PositionFeedPort, RenewalPort};

static TOKEN_SERIAL: AtomicU64 = AtomicU64::new(0);

/// Build an unsigned JWT whose `exp` claim is `expires_at`.
///
/// Every call yields a distinct token, even for the same expiry.
pub fn unsigned_token(expires_at: DateTime<Utc>) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let claims = json!({
        "sub": "stub",
        "exp": expires_at.timestamp(),
        "jti": TOKEN_SERIAL.fetch_add(1, Ordering::SeqCst),
    });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.stub", header, payload)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Stub Renewal
// =============================================================================

/// Stub renewal endpoint.
///
/// Returns a configured outcome, counts exchanges, and can hold exchanges
/// in flight until released.
pub struct StubRenewal {
    outcome: Mutex<Result<CredentialPair, AuthFailure>>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    seen: Mutex<Vec<String>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl StubRenewal {
    fn with_outcome(outcome: Result<CredentialPair, AuthFailure>) -> Self {
        Self {
            outcome: Mutex::new(outcome),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
        }
    }

    /// Renewal that always issues `pair`.
    pub fn issuing(pair: CredentialPair) -> Self {
        Self::with_outcome(Ok(pair))
    }

    /// Renewal that always rejects with HTTP `status`.
    pub fn rejecting(status: u16) -> Self {
        Self::with_outcome(Err(AuthFailure::RefreshRejected {
            status,
            message: "refresh token expired".to_string(),
        }))
    }

    /// Renewal that always fails with `reason`.
    pub fn failing_with(reason: AuthFailure) -> Self {
        Self::with_outcome(Err(reason))
    }

    /// Change the outcome of subsequent exchanges.
    pub fn set_outcome(&self, outcome: Result<CredentialPair, AuthFailure>) {
        *lock(&self.outcome) = outcome;
    }

    /// Hold subsequent exchanges in flight until [`StubRenewal::release`].
    pub fn hold(&self) {
        *lock(&self.gate) = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let held exchanges complete.
    pub fn release(&self) {
        if let Some(gate) = lock(&self.gate).take() {
            gate.add_permits(1024);
        }
    }

    /// Number of exchanges started.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of exchanges currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of exchanges ever in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Refresh tokens presented, in order.
    pub fn seen_refresh_tokens(&self) -> Vec<String> {
        lock(&self.seen).clone()
    }
}

#[async_trait]
impl RenewalPort for StubRenewal {
    async fn renew(&self, refresh_token: &str) -> Result<CredentialPair, AuthFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.seen).push(refresh_token.to_string());

        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        let gate = lock(&self.gate).clone();
        if let Some(gate) = gate {
            let _ = gate.acquire().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        lock(&self.outcome).clone()
    }
}

// =============================================================================
// Stub HTTP
// =============================================================================

/// Stub REST API.
///
/// Answers 200 unless told otherwise, and records every request it sees
/// (including the bearer it carried).
pub struct StubHttp {
    statuses: Mutex<HashMap<String, u16>>,
    failing: Mutex<HashSet<String>>,
    rejected_bearers: Mutex<HashSet<String>>,
    reject_all: AtomicBool,
    latency: Mutex<Option<Duration>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl StubHttp {
    /// Create a stub answering 200 to everything.
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            rejected_bearers: Mutex::new(HashSet::new()),
            reject_all: AtomicBool::new(false),
            latency: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer `status` for requests to `path`.
    pub fn respond_with(&self, path: &str, status: u16) {
        lock(&self.statuses).insert(path.to_string(), status);
    }

    /// Fail requests to `path` with a network error.
    pub fn fail_path(&self, path: &str) {
        lock(&self.failing).insert(path.to_string());
    }

    /// Answer 401 to requests carrying `token`.
    pub fn reject_bearer(&self, token: &str) {
        lock(&self.rejected_bearers).insert(token.to_string());
    }

    /// Answer 401 to every request.
    pub fn reject_all(&self, reject: bool) {
        self.reject_all.store(reject, Ordering::SeqCst);
    }

    /// Delay every response by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = Some(latency);
    }

    /// Requests seen so far, in dispatch order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        lock(&self.requests).clone()
    }

    /// Requests seen so far for `path`.
    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }
}

impl Default for StubHttp {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpPort for StubHttp {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, SessionError> {
        lock(&self.requests).push(request.clone());

        let latency = *lock(&self.latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if lock(&self.failing).contains(&request.path) {
            return Err(SessionError::Network(format!("Simulated failure for {}", request.path)));
        }

        let rejected = self.reject_all.load(Ordering::SeqCst)
            || request
                .bearer
                .as_ref()
                .map(|token| lock(&self.rejected_bearers).contains(token))
                .unwrap_or(true);
        if rejected {
            return Ok(ApiResponse::new(401));
        }

        let status = lock(&self.statuses).get(&request.path).copied().unwrap_or(200);
        Ok(ApiResponse::new(status))
    }
}

// =============================================================================
// Stub Feed
// =============================================================================

struct StubConnection {
    subject: Subject,
    sender: mpsc::Sender<PositionEvent>,
    shutdown: CancellationToken,
}

/// Stub live channel transport.
///
/// Each `open` creates a numbered connection that tests push events into.
/// Pushing still works after a connection is closed, which is exactly the
/// late-delivery race the channel must defend against.
pub struct StubFeed {
    connections: Mutex<Vec<StubConnection>>,
    fail_next: AtomicBool,
}

impl StubFeed {
    /// Create a stub feed with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(Vec::new()),
            fail_next: AtomicBool::new(false),
        }
    }

    /// Make the next `open` fail.
    pub fn set_fail_next(&self, fail: bool) {
        self.fail_next.store(fail, Ordering::SeqCst);
    }

    /// Subjects opened so far, in order.
    pub fn opened(&self) -> Vec<Subject> {
        lock(&self.connections).iter().map(|c| c.subject.clone()).collect()
    }

    /// Push an event into connection number `index`.
    ///
    /// Returns `false` if nobody is reading that connection anymore.
    pub async fn push(&self, index: usize, event: PositionEvent) -> bool {
        let sender = match lock(&self.connections).get(index) {
            Some(connection) => connection.sender.clone(),
            None => return false,
        };
        sender.send(event).await.is_ok()
    }

    /// Check if connection number `index` was closed by the client.
    pub fn is_closed(&self, index: usize) -> bool {
        lock(&self.connections)
            .get(index)
            .map(|c| c.shutdown.is_cancelled())
            .unwrap_or(false)
    }
}

impl Default for StubFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PositionFeedPort for StubFeed {
    async fn open(&self, subject: &Subject) -> Result<FeedConnection, ChannelError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(ChannelError::ConnectionFailed("Simulated connect failure".to_string()));
        }

        let (sender, events) = mpsc::channel(64);
        let shutdown = CancellationToken::new();
        lock(&self.connections).push(StubConnection {
            subject: subject.clone(),
            sender,
            shutdown: shutdown.clone(),
        });

        Ok(FeedConnection { events, shutdown })
    }
}
