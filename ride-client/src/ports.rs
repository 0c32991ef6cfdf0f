//! Session core port definitions.
//!
//! Ports define the interfaces for external services (REST API, renewal
//! endpoint, live channel transport). Adapters implement these ports for
//! specific transports (reqwest, WebSocket, stub, etc.).

use async_trait::async_trait;
use ride_domain::{Coordinate, CredentialPair, PositionEvent, Subject};
use serde_json::{json, Value};
use std::fmt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::{AuthFailure, ChannelError, SessionError};

/// Path of the position write endpoint.
pub const POSITION_WRITE_PATH: &str = "/drivers/location";

/// HTTP status the gateway treats as "credential rejected".
pub const STATUS_UNAUTHORIZED: u16 = 401;

// =============================================================================
// Requests and Responses
// =============================================================================

/// HTTP method of an outbound API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl Method {
    /// Get the method name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound API call, transport-neutral.
///
/// The gateway fills in `bearer`; callers build the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Path relative to the API base URL
    pub path: String,
    /// Optional JSON body
    pub body: Option<Value>,
    /// Bearer credential, attached by the gateway at dispatch time
    pub bearer: Option<String>,
}

impl ApiRequest {
    /// Create a request without a body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            bearer: None,
        }
    }

    /// GET `path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// POST `path`.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Copy of this request carrying `token` as its bearer credential.
    pub fn with_bearer(&self, token: &str) -> Self {
        let mut request = self.clone();
        request.bearer = Some(token.to_string());
        request
    }

    /// Position write request for a subject at a coordinate.
    pub fn write_position(subject: &Subject, coordinate: Coordinate) -> Self {
        Self::post(POSITION_WRITE_PATH).with_body(json!({
            "subject": subject.as_str(),
            "latitude": coordinate.latitude(),
            "longitude": coordinate.longitude(),
        }))
    }
}

/// Response to an API call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Parsed JSON body, if any
    pub body: Option<Value>,
}

impl ApiResponse {
    /// Create a response with a status and no body.
    pub fn new(status: u16) -> Self {
        Self { status, body: None }
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Check if the server rejected the credential.
    pub fn is_unauthorized(&self) -> bool {
        self.status == STATUS_UNAUTHORIZED
    }

    /// Check for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// =============================================================================
// HTTP Port
// =============================================================================

/// Port for dispatching API calls.
///
/// Implementations:
/// - `StubHttp` - For testing (scripted responses, records requests)
/// - `RestClient` - reqwest over HTTP (ride-connectors)
#[async_trait]
pub trait HttpPort: Send + Sync {
    /// Dispatch a request.
    ///
    /// Non-2xx statuses are returned as responses, not errors; only
    /// transport failures are errors (`SessionError::Network`).
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, SessionError>;
}

// =============================================================================
// Renewal Port
// =============================================================================

/// Port for exchanging a refresh token for a new credential pair.
#[async_trait]
pub trait RenewalPort: Send + Sync {
    /// Perform one renewal exchange.
    ///
    /// Non-success statuses, transport errors and malformed bodies are all
    /// renewal failures.
    async fn renew(&self, refresh_token: &str) -> Result<CredentialPair, AuthFailure>;
}

// =============================================================================
// Live Channel Port
// =============================================================================

/// An open live-channel transport connection for one subject.
pub struct FeedConnection {
    /// Push events as relayed by the server
    pub events: mpsc::Receiver<PositionEvent>,
    /// Cancelling closes the transport
    pub shutdown: CancellationToken,
}

/// Port for opening live position connections.
#[async_trait]
pub trait PositionFeedPort: Send + Sync {
    /// Open a connection correlated by `subject`.
    async fn open(&self, subject: &Subject) -> Result<FeedConnection, ChannelError>;
}

// =============================================================================
// Position Sink
// =============================================================================

/// Where the simulator writes positions.
///
/// Implemented by the gateway; tests may substitute their own sink.
#[async_trait]
pub trait PositionSink: Send + Sync {
    /// Write one position for `subject`.
    async fn write_position(&self, subject: &Subject, coordinate: Coordinate) -> Result<(), SessionError>;
}
