//! Live position channel.
//!
//! Binds to one subject at a time and streams its positions:
//!
//! ```text
//! PositionFeedPort ──events──► pump (filter by subject + generation) ──► PositionSubscription
//!                                      │
//!                                      └──► latest()
//! ```
//!
//! Rebinding tears the previous connection down before opening the next.
//! Every binding gets a generation number; anything carrying an older
//! generation is dropped, so a slow teardown racing a fast rebind can never
//! deliver the previous subject's positions.

use futures_util::Stream;
use ride_domain::{Position, PositionEvent, Subject};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::ChannelError;
use crate::ports::PositionFeedPort;

/// Default per-subscription buffer.
const SUBSCRIPTION_BUFFER: usize = 32;

/// Generation value meaning "nothing bound".
const UNBOUND: u64 = 0;

type LatestSlot = Arc<RwLock<Option<(u64, Position)>>>;

struct Binding {
    subject: Subject,
    generation: u64,
    shutdown: CancellationToken,
    pump: JoinHandle<()>,
}

/// Single-subject push subscription over a live transport.
pub struct LivePositionChannel {
    feed: Arc<dyn PositionFeedPort>,
    binding: Mutex<Option<Binding>>,
    live: Arc<AtomicU64>,
    generations: AtomicU64,
    latest: LatestSlot,
}

impl LivePositionChannel {
    /// Create an unbound channel over a transport.
    pub fn new(feed: Arc<dyn PositionFeedPort>) -> Self {
        Self {
            feed,
            binding: Mutex::new(None),
            live: Arc::new(AtomicU64::new(UNBOUND)),
            generations: AtomicU64::new(UNBOUND),
            latest: Arc::new(RwLock::new(None)),
        }
    }

    /// Bind to `subject`, replacing any current binding.
    ///
    /// The previous connection is closed and its subscription ends before
    /// the new connection is opened.
    pub async fn subscribe(&self, subject: Subject) -> Result<PositionSubscription, ChannelError> {
        let mut binding = self.binding.lock().await;
        if let Some(previous) = binding.take() {
            self.teardown(previous);
        }

        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;
        let connection = self.feed.open(&subject).await?;
        self.live.store(generation, Ordering::SeqCst);

        let (sender, receiver) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let pump = tokio::spawn(pump(
            connection.events,
            subject.clone(),
            generation,
            self.live.clone(),
            self.latest.clone(),
            sender,
            connection.shutdown.clone(),
        ));

        info!(subject = %subject, generation, "Live channel bound");

        *binding = Some(Binding {
            subject: subject.clone(),
            generation,
            shutdown: connection.shutdown,
            pump,
        });

        Ok(PositionSubscription {
            subject,
            generation,
            live: self.live.clone(),
            events: receiver,
        })
    }

    /// Drop the current binding, if any, and close its transport.
    pub async fn unsubscribe(&self) {
        let mut binding = self.binding.lock().await;
        if let Some(previous) = binding.take() {
            self.teardown(previous);
        }
    }

    /// Subject of the live binding.
    pub async fn bound_subject(&self) -> Option<Subject> {
        self.binding.lock().await.as_ref().map(|b| b.subject.clone())
    }

    /// Most recent position of the live binding.
    pub fn latest(&self) -> Option<Position> {
        let live = self.live.load(Ordering::SeqCst);
        let latest = self.latest.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        match &*latest {
            Some((generation, position)) if *generation == live && live != UNBOUND => Some(position.clone()),
            _ => None,
        }
    }

    fn teardown(&self, previous: Binding) {
        // Suppress first, then close: nothing from `previous` passes the
        // generation check from here on.
        self.live.store(UNBOUND, Ordering::SeqCst);
        previous.shutdown.cancel();
        previous.pump.abort();

        let mut latest = self.latest.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *latest = None;

        info!(subject = %previous.subject, generation = previous.generation, "Live channel unbound");
    }
}

/// Forward transport events for one binding.
async fn pump(
    mut events: mpsc::Receiver<PositionEvent>,
    subject: Subject,
    generation: u64,
    live: Arc<AtomicU64>,
    latest: LatestSlot,
    subscriber: mpsc::Sender<Position>,
    shutdown: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => event,
        };

        let Some(event) = event else {
            debug!(subject = %subject, generation, "Live transport closed");
            break;
        };

        if live.load(Ordering::SeqCst) != generation {
            debug!(subject = %subject, generation, "Discarding event for stale binding");
            break;
        }

        let position = match event.into_position() {
            Ok(position) => position,
            Err(e) => {
                debug!(subject = %subject, error = %e, "Discarding invalid position event");
                continue;
            },
        };

        if position.subject != subject {
            debug!(expected = %subject, got = %position.subject, "Discarding event for another subject");
            continue;
        }

        {
            let mut slot = latest.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            *slot = Some((generation, position.clone()));
        }

        // Last value wins: a full buffer just drops this fix for the stream.
        if let Err(mpsc::error::TrySendError::Full(_)) = subscriber.try_send(position) {
            debug!(subject = %subject, "Subscriber lagging; fix dropped from stream");
        }
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// Stream of positions for one binding.
///
/// Ends (yields `None`) as soon as the binding is replaced or removed, even
/// if positions are still buffered.
pub struct PositionSubscription {
    subject: Subject,
    generation: u64,
    live: Arc<AtomicU64>,
    events: mpsc::Receiver<Position>,
}

impl PositionSubscription {
    /// Subject this subscription is bound to.
    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    /// Check if this subscription's binding is still live.
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst) == self.generation
    }

    /// Receive the next position, or `None` once the binding has ended.
    pub async fn recv(&mut self) -> Option<Position> {
        futures_util::future::poll_fn(|cx| self.poll_position(cx)).await
    }

    fn poll_position(&mut self, cx: &mut Context<'_>) -> Poll<Option<Position>> {
        if !self.is_live() {
            return Poll::Ready(None);
        }

        match self.events.poll_recv(cx) {
            Poll::Ready(Some(position)) if self.is_live() => Poll::Ready(Some(position)),
            Poll::Ready(_) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Stream for PositionSubscription {
    type Item = Position;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().poll_position(cx)
    }
}

// =============================================================================
// Tests
// =============================================================================
