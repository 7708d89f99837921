//! Keep-alive scheduler for Lodestone.
//!
//! Every logged-in session gets one background task that probes the peer
//! at a fixed interval (2 s by default). Each probe doubles as a latency
//! measurement: the session handler matches the reply's id against the
//! probe recorded in [`PingState`](lodestone_session::PingState).
//!
//! # Loop
//!
//! ```text
//! while connected and not stopped:
//!     id = wall-clock millis truncated to i32
//!     ping = { id, now }            (overwrites any unanswered probe)
//!     send KeepAliveRequest { id }
//!     sleep(interval)  or  stop signal → exit
//! ```
//!
//! The task exits silently. A missed reply is not an error; the latency
//! just stays stale until the next match.
//!
//! # Cancellation
//!
//! [`KeepAliveHandle::stop`] flips a `watch` channel the task selects on,
//! so a stop wakes the sleep immediately. A disconnect that doesn't go
//! through the handle is noticed at the next wake-up, within one interval.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use lodestone_protocol::ServerMessage;
use lodestone_session::{PingState, SharedState};
use lodestone_transport::Session;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the keep-alive task.
#[derive(Debug, Clone)]
pub struct KeepAliveConfig {
    /// Time between probes. Default: 2 seconds.
    pub interval: Duration,
}

impl Default for KeepAliveConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
        }
    }
}

impl KeepAliveConfig {
    /// Interval the vanilla server uses.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(2);

    /// Create a config with a specific interval.
    pub fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }

    /// Fix out-of-range values so the config is safe to use.
    ///
    /// A zero interval would spin; it falls back to the default.
    pub fn validated(mut self) -> Self {
        if self.interval.is_zero() {
            warn!(
                default_ms = Self::DEFAULT_INTERVAL.as_millis() as u64,
                "keep-alive interval is zero, using default"
            );
            self.interval = Self::DEFAULT_INTERVAL;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Owner's handle to a running keep-alive task.
///
/// Dropping the handle also stops the task: the task treats a closed stop
/// channel like a stop signal.
#[derive(Debug)]
pub struct KeepAliveHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
    probes_sent: Arc<AtomicU64>,
}

impl KeepAliveHandle {
    /// Signals the task to exit. Idempotent.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Number of probes sent so far.
    pub fn probes_sent(&self) -> u64 {
        self.probes_sent.load(Ordering::Relaxed)
    }

    /// Stops the task and waits for it to exit.
    pub async fn shutdown(self) {
        self.stop();
        // A panicked probe loop has nothing left to clean up.
        let _ = self.task.await;
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// Spawns the keep-alive task for one session.
///
/// Must be called inside a Tokio runtime. The first probe goes out
/// immediately.
pub fn spawn<S: Session>(
    session: Arc<S>,
    state: SharedState,
    config: KeepAliveConfig,
) -> KeepAliveHandle {
    let config = config.validated();
    let (stop, stop_rx) = watch::channel(false);
    let probes_sent = Arc::new(AtomicU64::new(0));

    debug!(
        conn_id = %session.id(),
        interval_ms = config.interval.as_millis() as u64,
        "keep-alive started"
    );

    let task = tokio::spawn(run(
        session,
        state,
        config.interval,
        stop_rx,
        Arc::clone(&probes_sent),
    ));

    KeepAliveHandle {
        stop,
        task,
        probes_sent,
    }
}

async fn run<S: Session>(
    session: Arc<S>,
    state: SharedState,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
    probes_sent: Arc<AtomicU64>,
) {
    let conn_id = session.id();

    while session.is_connected() && !*stop.borrow() {
        let id = PingState::id_from_millis(wall_clock_millis());

        // Record before sending so a fast reply always finds its probe.
        state.lock().ping.issue(id, Instant::now());

        if let Err(e) = session.send(ServerMessage::KeepAliveRequest { id }) {
            debug!(%conn_id, error = %e, "keep-alive send failed");
            break;
        }
        probes_sent.fetch_add(1, Ordering::Relaxed);
        trace!(%conn_id, id, "keep-alive sent");

        tokio::select! {
            _ = time::sleep(interval) => {}
            _ = stop.changed() => break,
        }
    }

    debug!(
        %conn_id,
        probes = probes_sent.load(Ordering::Relaxed),
        "keep-alive stopped"
    );
}

fn wall_clock_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
