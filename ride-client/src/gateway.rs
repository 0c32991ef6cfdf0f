//! Authenticated request gateway.
//!
//! Wraps every outbound API call:
//!
//! 1. Renew first if the stored access token is missing or expiring
//! 2. Dispatch with `Authorization: Bearer <token>`
//! 3. On 401, force one renewal and retry once
//! 4. On a second 401, fail with `AuthenticationFailed`
//!
//! Any other status is returned untouched.

use async_trait::async_trait;
use ride_domain::{Coordinate, Subject};
use ride_store::CredentialStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::coordinator::RefreshCoordinator;
use crate::error::{AuthFailure, SessionError, SessionResult};
use crate::ports::{ApiRequest, ApiResponse, HttpPort, PositionSink};
use crate::token::{self, DEFAULT_LOOKAHEAD};

/// Outbound call wrapper enforcing the session's credential policy.
pub struct Gateway {
    store: Arc<dyn CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    http: Arc<dyn HttpPort>,
    lookahead: Duration,
}

impl Gateway {
    /// Create a gateway with the default five-minute lookahead.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        coordinator: Arc<RefreshCoordinator>,
        http: Arc<dyn HttpPort>,
    ) -> Self {
        Self {
            store,
            coordinator,
            http,
            lookahead: DEFAULT_LOOKAHEAD,
        }
    }

    /// Override the expiry lookahead.
    pub fn with_lookahead(mut self, lookahead: Duration) -> Self {
        self.lookahead = lookahead;
        self
    }

    /// Expiry lookahead in use.
    pub fn lookahead(&self) -> Duration {
        self.lookahead
    }

    /// Check `token` against this gateway's lookahead.
    pub fn is_expired(&self, token: &str) -> bool {
        token::is_expired(token, self.lookahead)
    }

    /// Execute an authenticated call.
    ///
    /// # Errors
    ///
    /// - `SessionError::AuthenticationFailed` if no usable credential could
    ///   be obtained, or the call was still unauthorized after one retry
    /// - `SessionError::Network` for transport failures (not retried)
    pub async fn execute(&self, request: ApiRequest) -> SessionResult<ApiResponse> {
        let token = self.current_token().await?;
        let response = self.dispatch(&request, &token).await?;

        if !response.is_unauthorized() {
            return Ok(response);
        }

        info!(
            method = %request.method,
            path = %request.path,
            "Request unauthorized; forcing one credential renewal"
        );

        let renewed = self.coordinator.refresh_stale(&token, self.lookahead).await?;
        let renewed = sendable(renewed)?;
        let retried = self.dispatch(&request, &renewed).await?;

        if retried.is_unauthorized() {
            warn!(
                method = %request.method,
                path = %request.path,
                "Request unauthorized after retry"
            );
            return Err(AuthFailure::UnauthorizedAfterRetry.into());
        }

        Ok(retried)
    }

    /// Stored access token if still valid, otherwise a renewed one.
    async fn current_token(&self) -> SessionResult<String> {
        let stored = self
            .store
            .get()
            .await?
            .map(|pair| pair.access_token().to_string());

        match stored {
            Some(token) if !self.is_expired(&token) => Ok(token),
            _ => {
                debug!("Access token missing or expiring; renewing before dispatch");
                let renewed = self.coordinator.refresh().await?;
                Ok(sendable(renewed)?)
            },
        }
    }

    async fn dispatch(&self, request: &ApiRequest, token: &str) -> SessionResult<ApiResponse> {
        let response = self.http.send(request.with_bearer(token)).await?;

        debug!(
            method = %request.method,
            path = %request.path,
            status = response.status,
            "Dispatched authenticated request"
        );

        Ok(response)
    }
}

/// Refuse to send a freshly issued token that is undecodable or already past
/// its expiry; such a token cannot authenticate anything.
fn sendable(token: String) -> Result<String, AuthFailure> {
    if token::is_expired(&token, Duration::ZERO) {
        return Err(AuthFailure::MalformedCredential(
            "renewed access token is undecodable or already expired".to_string(),
        ));
    }
    Ok(token)
}

#[async_trait]
impl PositionSink for Gateway {
    async fn write_position(&self, subject: &Subject, coordinate: Coordinate) -> Result<(), SessionError> {
        let response = self.execute(ApiRequest::write_position(subject, coordinate)).await?;
        if !response.is_success() {
            return Err(SessionError::UnexpectedStatus(response.status));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::SessionEvents;
    use crate::stub::{unsigned_token, StubHttp, StubRenewal};
    use chrono::Utc;
    use ride_domain::CredentialPair;
    use ride_store::MemoryCredentialStore;

    fn token_valid_for(secs: i64) -> String {
        unsigned_token(Utc::now() + chrono::Duration::seconds(secs))
    }

    fn gateway(
        access: &str,
        renewal: Arc<StubRenewal>,
        http: Arc<StubHttp>,
    ) -> (Gateway, Arc<MemoryCredentialStore>) {
        let store = Arc::new(MemoryCredentialStore::with_pair(CredentialPair::new(access, "r1")));
        let coordinator = Arc::new(RefreshCoordinator::new(
            store.clone(),
            renewal,
            Arc::new(SessionEvents::default()),
        ));
        (Gateway::new(store.clone(), coordinator, http), store)
    }

    #[tokio::test]
    async fn test_valid_token_is_sent_without_renewal() {
        let access = token_valid_for(3600);
        let renewal = Arc::new(StubRenewal::issuing(CredentialPair::new("unused", "r2")));
        let http = Arc::new(StubHttp::new());
        let (gateway, _store) = gateway(&access, renewal.clone(), http.clone());

        let response = gateway.execute(ApiRequest::get("/rides")).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(renewal.calls(), 0);
        assert_eq!(http.requests()[0].bearer.as_deref(), Some(access.as_str()));
    }

    #[tokio::test]
    async fn test_expiring_token_is_renewed_before_send() {
        let stale = token_valid_for(60);
        let fresh = token_valid_for(3600);
        let renewal = Arc::new(StubRenewal::issuing(CredentialPair::new(fresh.clone(), "r2")));
        let http = Arc::new(StubHttp::new());
        let (gateway, _store) = gateway(&stale, renewal.clone(), http.clone());

        gateway.execute(ApiRequest::get("/rides")).await.unwrap();

        assert_eq!(renewal.calls(), 1);
        let sent = http.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].bearer.as_deref(), Some(fresh.as_str()));
    }

    #[tokio::test]
    async fn test_failed_renewal_sends_nothing() {
        let renewal = Arc::new(StubRenewal::rejecting(400));
        let http = Arc::new(StubHttp::new());
        let (gateway, store) = gateway("not-a-jwt", renewal, http.clone());

        let err = gateway.execute(ApiRequest::get("/rides")).await.unwrap_err();

        assert!(err.is_authentication_failure());
        assert!(http.requests().is_empty());
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_other_statuses_pass_through() {
        let http = Arc::new(StubHttp::new());
        http.respond_with("/rides/9", 404);
        let renewal = Arc::new(StubRenewal::issuing(CredentialPair::new("unused", "r2")));
        let (gateway, _store) = gateway(&token_valid_for(3600), renewal.clone(), http);

        let response = gateway.execute(ApiRequest::get("/rides/9")).await.unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(renewal.calls(), 0);
    }

    #[tokio::test]
    async fn test_network_failure_is_returned_to_caller() {
        let http = Arc::new(StubHttp::new());
        http.fail_path("/rides");
        let renewal = Arc::new(StubRenewal::issuing(CredentialPair::new("unused", "r2")));
        let (gateway, _store) = gateway(&token_valid_for(3600), renewal, http);

        let err = gateway.execute(ApiRequest::get("/rides")).await.unwrap_err();

        assert!(matches!(err, SessionError::Network(_)));
        assert!(!err.is_authentication_failure());
    }

    #[tokio::test]
    async fn test_renewed_token_already_expired_is_not_sent() {
        let past = unsigned_token(Utc::now() - chrono::Duration::seconds(10));
        let renewal = Arc::new(StubRenewal::issuing(CredentialPair::new(past, "r2")));
        let http = Arc::new(StubHttp::new());
        let (gateway, _store) = gateway("not-a-jwt", renewal, http.clone());

        let err = gateway.execute(ApiRequest::get("/rides")).await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::AuthenticationFailed(AuthFailure::MalformedCredential(_))
        ));
        assert!(http.requests().is_empty());
    }

    #[tokio::test]
    async fn test_position_sink_requires_success() {
        let http = Arc::new(StubHttp::new());
        http.respond_with(crate::ports::POSITION_WRITE_PATH, 500);
        let renewal = Arc::new(StubRenewal::issuing(CredentialPair::new("unused", "r2")));
        let (gateway, _store) = gateway(&token_valid_for(3600), renewal, http);

        let subject = Subject::new("d1").unwrap();
        let err = gateway
            .write_position(&subject, Coordinate::new(1.0, 2.0).unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, SessionError::UnexpectedStatus(500)));
    }
}
