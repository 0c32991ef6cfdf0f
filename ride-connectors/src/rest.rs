//! Ride REST API Client
//!
//! Provides the HTTP side of the session core:
//! - Dispatching authenticated API calls (`HttpPort`)
//! - Exchanging a refresh token for a new credential pair (`RenewalPort`)
//!
//! # Authentication
//!
//! The gateway decides which token to send; this client only attaches it as
//! `Authorization: Bearer <token>`. The renewal call itself is unauthenticated
//! and carries the refresh token in its JSON body.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

use ride_client::{ApiRequest, ApiResponse, AuthFailure, HttpPort, Method, RenewalPort, SessionError};
use ride_domain::CredentialPair;

// =============================================================================
// Constants
// =============================================================================

/// Renewal endpoint path.
pub const RENEWAL_PATH: &str = "/auth/refresh";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur in the REST client.
#[derive(Debug, Clone, Error)]
pub enum RestError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// Failed to read or parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,
}

impl From<RestError> for SessionError {
    fn from(e: RestError) -> Self {
        SessionError::Network(e.to_string())
    }
}

// =============================================================================
// REST Client
// =============================================================================

/// REST client for the ride backend.
pub struct RestClient {
    /// HTTP client
    client: Client,
    /// Base URL without trailing slash
    base_url: String,
}

impl RestClient {
    /// Create a client for `base_url` (e.g. `http://127.0.0.1:8080`).
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
        }
    }

    /// Base URL in use.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn builder(&self, request: &ApiRequest) -> RequestBuilder {
        let url = self.url(&request.path);
        let builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Patch => self.client.patch(&url),
            Method::Delete => self.client.delete(&url),
        };

        let builder = match &request.bearer {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };

        match &request.body {
            Some(body) => builder.json(body),
            None => builder,
        }
    }

    /// Send a prepared request and read the full body.
    async fn exchange(&self, builder: RequestBuilder) -> Result<(StatusCode, String), RestError> {
        let response = timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS), builder.send())
            .await
            .map_err(|_| RestError::Timeout)?
            .map_err(|e| RestError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| RestError::ParseError(e.to_string()))?;

        Ok((status, body))
    }
}

#[async_trait]
impl HttpPort for RestClient {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, SessionError> {
        let (status, body) = self.exchange(self.builder(&request)).await?;

        debug!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            "REST call completed"
        );

        let response = ApiResponse::new(status.as_u16());
        Ok(match parse_body(&body) {
            Some(value) => response.with_body(value),
            None => response,
        })
    }
}

#[async_trait]
impl RenewalPort for RestClient {
    async fn renew(&self, refresh_token: &str) -> Result<CredentialPair, AuthFailure> {
        let builder = self
            .client
            .post(self.url(RENEWAL_PATH))
            .json(&RenewalRequest { refresh_token });

        let (status, body) = self.exchange(builder).await.map_err(|e| match e {
            RestError::ParseError(msg) => AuthFailure::MalformedResponse(msg),
            other => AuthFailure::RenewalNetwork(other.to_string()),
        })?;

        if !status.is_success() {
            return Err(AuthFailure::RefreshRejected {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        parse_renewal(&body)
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// Renewal request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenewalRequest<'a> {
    refresh_token: &'a str,
}

/// Renewal response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenewalResponse {
    access_token: String,
    refresh_token: String,
}

/// Error body returned by the backend.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

fn parse_body(body: &str) -> Option<Value> {
    if body.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "Response body is not JSON; dropped");
            None
        },
    }
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) => err.message,
        Err(_) => body.chars().take(200).collect(),
    }
}

fn parse_renewal(body: &str) -> Result<CredentialPair, AuthFailure> {
    let response: RenewalResponse =
        serde_json::from_str(body).map_err(|e| AuthFailure::MalformedResponse(e.to_string()))?;

    if response.access_token.is_empty() || response.refresh_token.is_empty() {
        return Err(AuthFailure::MalformedResponse("empty token in renewal response".to_string()));
    }

    Ok(CredentialPair::new(response.access_token, response.refresh_token))
}

// =============================================================================
// Tests
// =============================================================================
