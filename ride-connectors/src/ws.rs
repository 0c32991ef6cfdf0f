//! Live Position WebSocket Client
//!
//! Opens one WebSocket per subject binding and relays the server's push
//! events as raw `PositionEvent`s. Filtering by subject and generation is the
//! channel's job; this adapter only decodes frames.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message as WebSocketMessage, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use ride_client::{ChannelError, FeedConnection, PositionFeedPort};
use ride_domain::{PositionEvent, Subject};

/// Type alias for the WebSocket stream (with auto TLS).
type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connect timeout (in seconds).
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Buffer between the socket reader and the channel pump.
const EVENT_BUFFER: usize = 64;

/// Errors that can occur in the WebSocket client.
#[derive(Debug, Error)]
pub enum WsError {
    /// Configured URL is not a valid WebSocket URL.
    #[error("Invalid WebSocket URL: {0}")]
    InvalidUrl(String),

    /// Failed to connect to WebSocket.
    #[error("Failed to connect to WebSocket: {0}")]
    ConnectionFailed(String),

    /// Invalid message format.
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    /// Timed out while connecting.
    #[error("Timed out connecting to WebSocket")]
    Timeout,
}

impl From<WsError> for ChannelError {
    fn from(e: WsError) -> Self {
        match e {
            WsError::InvalidMessage(msg) => ChannelError::InvalidMessage(msg),
            other => ChannelError::ConnectionFailed(other.to_string()),
        }
    }
}

/// WebSocket transport for the live position channel.
pub struct WsPositionFeed {
    /// Base channel URL, e.g. `ws://host/ws/positions`
    ws_url: String,
}

impl WsPositionFeed {
    /// Create a feed for `ws_url`.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self { ws_url: ws_url.into() }
    }

    /// Connection URL for a subject: `<ws_url>?subject=<id>`.
    pub fn subject_url(&self, subject: &Subject) -> Result<Url, WsError> {
        let mut url = Url::parse(&self.ws_url).map_err(|e| WsError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(WsError::InvalidUrl(format!("unsupported scheme {}", url.scheme())));
        }
        url.query_pairs_mut().append_pair("subject", subject.as_str());
        Ok(url)
    }
}

#[async_trait]
impl PositionFeedPort for WsPositionFeed {
    async fn open(&self, subject: &Subject) -> Result<FeedConnection, ChannelError> {
        let url = self.subject_url(subject)?;

        info!(%url, "Connecting live position channel");

        let (ws_stream, _) = timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS), connect_async(url.as_str()))
            .await
            .map_err(|_| WsError::Timeout)?
            .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

        info!(subject = %subject, "Live position channel connected");

        let (sender, events) = mpsc::channel(EVENT_BUFFER);
        let shutdown = CancellationToken::new();
        tokio::spawn(read_loop(ws_stream, subject.clone(), sender, shutdown.clone()));

        Ok(FeedConnection { events, shutdown })
    }
}

/// Relay frames until shutdown, close, or the reader side goes away.
async fn read_loop(
    ws_stream: WsStream,
    subject: Subject,
    events: mpsc::Sender<PositionEvent>,
    shutdown: CancellationToken,
) {
    let (mut write, mut read) = ws_stream.split();

    loop {
        let message = tokio::select! {
            _ = shutdown.cancelled() => {
                if let Err(e) = write.send(WebSocketMessage::Close(None)).await {
                    debug!(subject = %subject, error = %e, "Close frame not sent");
                }
                break;
            }
            message = read.next() => message,
        };

        match message {
            Some(Ok(WebSocketMessage::Text(text))) => match parse_event(&text) {
                Ok(event) => {
                    if events.send(event).await.is_err() {
                        debug!(subject = %subject, "Channel reader gone; closing socket");
                        let _ = write.send(WebSocketMessage::Close(None)).await;
                        break;
                    }
                },
                Err(e) => debug!(subject = %subject, error = %e, "Ignoring undecodable frame"),
            },
            Some(Ok(WebSocketMessage::Close(_))) => {
                info!(subject = %subject, "Live position channel closed by server");
                break;
            },
            Some(Ok(_)) => {
                // Ping, pong and binary frames carry no positions
            },
            Some(Err(e)) => {
                warn!(subject = %subject, error = %e, "Live position channel error");
                break;
            },
            None => {
                debug!(subject = %subject, "Live position stream ended");
                break;
            },
        }
    }
}

/// Decode a text frame `{subject, latitude, longitude}`.
fn parse_event(text: &str) -> Result<PositionEvent, WsError> {
    serde_json::from_str(text).map_err(|e| WsError::InvalidMessage(e.to_string()))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_event() {
        let event = parse_event(r#"{"subject":"d1","latitude":10.5,"longitude":106.7}"#).unwrap();

        assert_eq!(event.subject, "d1");
        assert_eq!(event.latitude, 10.5);
        assert_eq!(event.longitude, 106.7);
        assert!(matches!(parse_event(r#"{"type":"hello"}"#), Err(WsError::InvalidMessage(_))));
    }

    #[test]
    fn test_subject_url_encodes_subject() {
        let feed = WsPositionFeed::new("ws://127.0.0.1:8080/ws/positions");
        let url = feed.subject_url(&Subject::new("driver 7").unwrap()).unwrap();

        assert_eq!(url.as_str(), "ws://127.0.0.1:8080/ws/positions?subject=driver+7");
    }

    #[test]
    fn test_subject_url_rejects_http_scheme() {
        let feed = WsPositionFeed::new("http://127.0.0.1:8080/ws/positions");
        assert!(matches!(
            feed.subject_url(&Subject::new("d1").unwrap()),
            Err(WsError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_open_relays_text_frames_and_closes_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ws_url = format!("ws://{}/ws/positions", listener.local_addr().unwrap());

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(socket).await.unwrap();
            ws.send(WebSocketMessage::Text(r#"{"subject":"d1","latitude":1.0,"longitude":2.0}"#.into()))
                .await
                .unwrap();
            ws.send(WebSocketMessage::Ping(vec![1])).await.unwrap();
            ws.send(WebSocketMessage::Text("not json".into())).await.unwrap();
            ws.send(WebSocketMessage::Text(r#"{"subject":"d1","latitude":3.0,"longitude":4.0}"#.into()))
                .await
                .unwrap();

            // Wait for the client's close frame.
            while let Some(Ok(message)) = ws.next().await {
                if let WebSocketMessage::Close(_) = message {
                    return true;
                }
            }
            false
        });

        let feed = WsPositionFeed::new(ws_url);
        let mut connection = feed.open(&Subject::new("d1").unwrap()).await.unwrap();

        assert_eq!(connection.events.recv().await.unwrap().latitude, 1.0);
        assert_eq!(connection.events.recv().await.unwrap().latitude, 3.0);

        connection.shutdown.cancel();
        assert!(server.await.unwrap());
    }

    #[tokio::test]
    async fn test_open_fails_when_nothing_listens() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let ws_url = format!("ws://{}/ws/positions", listener.local_addr().unwrap());
        drop(listener);

        let result = WsPositionFeed::new(ws_url).open(&Subject::new("d1").unwrap()).await;

        assert!(matches!(result, Err(ChannelError::ConnectionFailed(_))));
    }
}
