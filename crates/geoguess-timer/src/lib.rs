//! Cancellable phase deadlines for Geoguess.
//!
//! A room is always in at most one timed phase: a round's guess window,
//! the results display, or the idle wait of a finished room. The
//! [`PhaseTimer`] holds that single deadline, tagged with whatever the
//! caller uses to name the phase.
//!
//! # Idle mode
//!
//! When nothing is armed, [`PhaseTimer::expired`] pends forever. That is
//! the correct behaviour inside a `select!` loop: the command branch keeps
//! running and the timer branch simply never wins.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         expiry = timer.expired() => {
//!             // The phase tag says which deadline this was. Compare it
//!             // against live state before acting: a deadline can lose the
//!             // race against a command that already moved the room on.
//!         }
//!     }
//! }
//! ```

use std::fmt::Debug;
use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for a [`PhaseTimer`].
#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// A deadline observed more than this late emits a warning. A late
    /// deadline means the owning actor was busy (or starved) when it
    /// should have fired.
    pub late_warn_threshold: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            late_warn_threshold: Duration::from_millis(250),
        }
    }
}

// ---------------------------------------------------------------------------
// Expiry
// ---------------------------------------------------------------------------

/// A deadline that fired, returned by [`PhaseTimer::expired`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expiry<P> {
    /// The phase tag given to [`PhaseTimer::arm`].
    pub phase: P,
    /// How long after the deadline the owner got to observe it.
    pub late_by: Duration,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Counters kept by every timer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerMetrics {
    /// Deadlines armed (re-arming counts again).
    pub armed: u64,
    /// Deadlines that fired.
    pub fired: u64,
    /// Deadlines cancelled or replaced before firing.
    pub cancelled: u64,
    /// Worst lateness observed.
    pub max_late_by: Duration,
}

// ---------------------------------------------------------------------------
// PhaseTimer
// ---------------------------------------------------------------------------

/// One pending deadline, tagged with a phase `P`.
///
/// One `PhaseTimer` per room actor.
pub struct PhaseTimer<P> {
    config: TimerConfig,
    pending: Option<(Instant, P)>,
    metrics: TimerMetrics,
}

impl<P: Clone + Debug> PhaseTimer<P> {
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            pending: None,
            metrics: TimerMetrics::default(),
        }
    }

    /// Arms the timer to fire `after` from now. Any pending deadline is
    /// replaced.
    pub fn arm(&mut self, phase: P, after: Duration) {
        self.arm_at(phase, Instant::now() + after);
    }

    /// Arms the timer to fire at an absolute instant. Any pending deadline
    /// is replaced.
    pub fn arm_at(&mut self, phase: P, at: Instant) {
        if let Some((_, old)) = self.pending.take() {
            self.metrics.cancelled += 1;
            trace!(?old, "pending deadline replaced");
        }
        debug!(
            ?phase,
            in_ms = at.saturating_duration_since(Instant::now()).as_millis()
                as u64,
            "deadline armed"
        );
        self.metrics.armed += 1;
        self.pending = Some((at, phase));
    }

    /// Disarms the timer, returning the phase that was pending.
    ///
    /// Safe to call when nothing is armed.
    pub fn cancel(&mut self) -> Option<P> {
        let (_, phase) = self.pending.take()?;
        self.metrics.cancelled += 1;
        debug!(?phase, "deadline cancelled");
        Some(phase)
    }

    /// Waits for the pending deadline and disarms the timer.
    ///
    /// Pends forever when nothing is armed. Cancel-safe: dropping the
    /// future before it completes leaves the deadline armed.
    pub async fn expired(&mut self) -> Expiry<P> {
        let at = match &self.pending {
            Some((at, _)) => *at,
            None => std::future::pending::<Instant>().await,
        };

        time::sleep_until(at).await;

        let late_by = Instant::now().saturating_duration_since(at);
        // Only `&mut self` can change `pending`, and we hold it.
        let phase = match self.pending.take() {
            Some((_, phase)) => phase,
            None => std::future::pending::<P>().await,
        };

        self.metrics.fired += 1;
        if late_by > self.metrics.max_late_by {
            self.metrics.max_late_by = late_by;
        }
        if late_by > self.config.late_warn_threshold {
            warn!(
                ?phase,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "deadline observed late"
            );
        } else {
            trace!(?phase, "deadline fired");
        }

        Expiry { phase, late_by }
    }

    /// `true` while a deadline is pending.
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// The pending phase, if any.
    pub fn phase(&self) -> Option<&P> {
        self.pending.as_ref().map(|(_, phase)| phase)
    }

    /// The pending deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(at, _)| *at)
    }

    /// Time left until the pending deadline (zero if already past).
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn metrics(&self) -> &TimerMetrics {
        &self.metrics
    }
}

impl<P: Clone + Debug> Default for PhaseTimer<P> {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}
