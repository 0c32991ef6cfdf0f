//! Position simulator.
//!
//! Walks a route there-and-back on a fixed interval and writes each
//! waypoint through a [`PositionSink`] (normally the session gateway).
//!
//! # State Machine
//!
//! ```text
//!            start()                 stop()
//!   Stopped ─────────► Running ─────────────► Stopped
//!      │  ▲                │
//!      └──┘ run_once()     └── tick: advance cursor, spawn write
//! ```
//!
//! Writes are fire-and-forget relative to the ticker: a slow write never
//! delays the next tick, so two writes may be in flight at once. Consumers
//! treat positions as last-value-wins.

use ride_client::PositionSink;
use ride_domain::{Coordinate, Route, Subject};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::SimResult;

/// Default tick interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

/// Simulator lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatorState {
    /// Not ticking
    Stopped,
    /// Ticking on the configured interval
    Running,
}

impl fmt::Display for SimulatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulatorState::Stopped => write!(f, "stopped"),
            SimulatorState::Running => write!(f, "running"),
        }
    }
}

/// Route, cursor and sink shared by the simulator and its tasks.
struct Traversal {
    subject: Subject,
    route: Route,
    cursor: Mutex<usize>,
    sink: Arc<dyn PositionSink>,
}

impl Traversal {
    fn cursor(&self) -> MutexGuard<'_, usize> {
        self.cursor.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn current(&self) -> Coordinate {
        self.route.waypoint_at(*self.cursor())
    }

    /// Step the cursor and return the new waypoint.
    fn advance(&self) -> Coordinate {
        let mut cursor = self.cursor();
        *cursor = self.route.next_index(*cursor);
        self.route.waypoint_at(*cursor)
    }

    async fn write(&self, coordinate: Coordinate) -> SimResult<()> {
        self.sink.write_position(&self.subject, coordinate).await?;
        debug!(subject = %self.subject, position = %coordinate, "Position written");
        Ok(())
    }
}

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Route-walking position producer for one subject.
pub struct PositionSimulator {
    traversal: Arc<Traversal>,
    interval: Duration,
    running: Mutex<Option<Running>>,
}

impl PositionSimulator {
    /// Create a stopped simulator positioned at the route's first waypoint.
    pub fn new(subject: Subject, route: Route, sink: Arc<dyn PositionSink>) -> Self {
        Self {
            traversal: Arc::new(Traversal {
                subject,
                route,
                cursor: Mutex::new(0),
                sink,
            }),
            interval: DEFAULT_INTERVAL,
            running: Mutex::new(None),
        }
    }

    /// Override the tick interval (clamped to at least one millisecond).
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Subject whose positions are written.
    pub fn subject(&self) -> &Subject {
        &self.traversal.subject
    }

    /// Tick interval in use.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking.
    ///
    /// Emits the current waypoint immediately, then advances and emits on
    /// every interval. Returns `false` (and does nothing) if already running.
    pub fn start(&self) -> bool {
        let mut running = self.lock();
        if running.is_some() {
            debug!(subject = %self.traversal.subject, "Simulator already running");
            return false;
        }

        let cancel = CancellationToken::new();
        spawn_write(self.traversal.clone(), self.traversal.current());

        let task = tokio::spawn(run(self.traversal.clone(), self.interval, cancel.clone()));
        *running = Some(Running { cancel, task });

        info!(
            subject = %self.traversal.subject,
            interval_ms = self.interval.as_millis() as u64,
            "Simulator started"
        );
        true
    }

    /// Stop ticking. Idempotent.
    ///
    /// Once this returns no new tick dispatches a write. Writes already
    /// dispatched, including the one emitted by `start()`, are left to
    /// complete.
    pub async fn stop(&self) {
        let running = self.lock().take();
        if let Some(running) = running {
            running.cancel.cancel();
            let _ = running.task.await;
            info!(subject = %self.traversal.subject, "Simulator stopped");
        }
    }

    /// Advance one step and write the new waypoint, awaiting the write.
    ///
    /// Works whether or not the simulator is running.
    pub async fn run_once(&self) -> SimResult<Coordinate> {
        let coordinate = self.traversal.advance();
        self.traversal.write(coordinate).await?;
        Ok(coordinate)
    }

    /// Waypoint most recently dispatched (not necessarily delivered).
    pub fn current_location(&self) -> Coordinate {
        self.traversal.current()
    }

    /// Current lifecycle state.
    pub fn status(&self) -> SimulatorState {
        if self.lock().is_some() {
            SimulatorState::Running
        } else {
            SimulatorState::Stopped
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn run(traversal: Arc<Traversal>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let coordinate = traversal.advance();
                spawn_write(traversal.clone(), coordinate);
            }
        }
    }
}

/// Fire-and-forget write; the ticker never waits for it.
fn spawn_write(traversal: Arc<Traversal>, coordinate: Coordinate) {
    tokio::spawn(async move {
        if let Err(e) = traversal.write(coordinate).await {
            warn!(subject = %traversal.subject, position = %coordinate, error = %e, "Position write failed");
        }
    });
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ride_client::SessionError;

    const INTERVAL: Duration = Duration::from_secs(2);

    /// Records every write; optionally fails them all.
    struct RecordingSink {
        writes: Mutex<Vec<Coordinate>>,
        fail: bool,
    }

    impl RecordingSink {
        fn new(fail: bool) -> Self {
            Self {
                writes: Mutex::new(Vec::new()),
                fail,
            }
        }

        fn writes(&self) -> Vec<Coordinate> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PositionSink for RecordingSink {
        async fn write_position(&self, _subject: &Subject, coordinate: Coordinate) -> Result<(), SessionError> {
            self.writes.lock().unwrap().push(coordinate);
            if self.fail {
                return Err(SessionError::Network("down".to_string()));
            }
            Ok(())
        }
    }

    fn c(lat: f64) -> Coordinate {
        Coordinate::new(lat, 106.7).unwrap()
    }

    fn route() -> Route {
        Route::new(vec![c(1.0), c(2.0), c(3.0)]).unwrap()
    }

    fn simulator(sink: Arc<RecordingSink>) -> PositionSimulator {
        PositionSimulator::new(Subject::new("driver-1").unwrap(), route(), sink).with_interval(INTERVAL)
    }

    async fn let_tasks_run() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn tick() {
        tokio::time::advance(INTERVAL).await;
        let_tasks_run().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_emits_immediately() {
        let sink = Arc::new(RecordingSink::new(false));
        let sim = simulator(sink.clone());

        assert!(sim.start());
        let_tasks_run().await;

        assert_eq!(sink.writes(), vec![c(1.0)]);
        assert_eq!(sim.status(), SimulatorState::Running);
        sim.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cycle_returns_to_start() {
        let sink = Arc::new(RecordingSink::new(false));
        let sim = simulator(sink.clone());

        sim.start();
        let_tasks_run().await;
        for _ in 0..route().doubled_len() {
            tick().await;
        }

        assert_eq!(sim.current_location(), route().start());
        assert_eq!(
            sink.writes(),
            vec![c(1.0), c(2.0), c(3.0), c(3.0), c(2.0), c(1.0), c(1.0)]
        );
        sim.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_interval_is_final() {
        let sink = Arc::new(RecordingSink::new(false));
        let sim = simulator(sink.clone());

        sim.start();
        let_tasks_run().await;
        tokio::time::advance(INTERVAL / 2).await;
        sim.stop().await;

        for _ in 0..5 {
            tick().await;
        }

        assert_eq!(sink.writes().len(), 1);
        assert_eq!(sim.status(), SimulatorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_right_after_start_keeps_initial_write() {
        let sink = Arc::new(RecordingSink::new(false));
        let sim = simulator(sink.clone());

        sim.start();
        sim.stop().await;
        let_tasks_run().await;
        tick().await;

        assert_eq!(sink.writes(), vec![c(1.0)]);
        assert_eq!(sim.current_location(), c(1.0));
        assert_eq!(sim.status(), SimulatorState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_is_noop() {
        let sink = Arc::new(RecordingSink::new(false));
        let sim = simulator(sink.clone());

        assert!(sim.start());
        assert!(!sim.start());
        let_tasks_run().await;

        assert_eq!(sink.writes().len(), 1);
        sim.stop().await;
        sim.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_writes_do_not_stop_ticking() {
        let sink = Arc::new(RecordingSink::new(true));
        let sim = simulator(sink.clone());

        sim.start();
        let_tasks_run().await;
        tick().await;
        tick().await;

        assert_eq!(sink.writes().len(), 3);
        assert_eq!(sim.status(), SimulatorState::Running);
        sim.stop().await;
    }

    #[tokio::test]
    async fn test_run_once_while_stopped() {
        let sink = Arc::new(RecordingSink::new(false));
        let sim = simulator(sink.clone());

        let first = sim.run_once().await.unwrap();
        let second = sim.run_once().await.unwrap();

        assert_eq!(first, c(2.0));
        assert_eq!(second, c(3.0));
        assert_eq!(sim.current_location(), c(3.0));
        assert_eq!(sim.status(), SimulatorState::Stopped);
    }

    #[tokio::test]
    async fn test_run_once_reports_write_failure() {
        let sim = simulator(Arc::new(RecordingSink::new(true)));

        let result = sim.run_once().await;

        assert!(matches!(result, Err(crate::SimError::Session(SessionError::Network(_)))));
        assert_eq!(sim.current_location(), c(2.0));
    }
}
