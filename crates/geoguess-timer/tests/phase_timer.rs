//! Integration tests for the phase timer.
//!
//! Uses paused Tokio time: sleeps resolve as soon as the runtime has
//! nothing else to do, so these run instantly and deterministically.

use std::time::Duration;

use geoguess_timer::{PhaseTimer, TimerConfig};
use tokio::time::{self, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Guessing(u32),
    Results(u32),
}

// =========================================================================
// Arming and cancelling
// =========================================================================

#[test]
fn test_new_timer_is_idle() {
    let timer = PhaseTimer::<Phase>::new(TimerConfig::default());
    assert!(!timer.is_armed());
    assert_eq!(timer.phase(), None);
    assert_eq!(timer.remaining(), None);
    assert_eq!(timer.metrics().armed, 0);
}

#[tokio::test(start_paused = true)]
async fn test_arm_then_cancel() {
    let mut timer = PhaseTimer::default();
    timer.arm(Phase::Guessing(1), Duration::from_secs(30));
    assert!(timer.is_armed());
    assert_eq!(timer.phase(), Some(&Phase::Guessing(1)));
    assert_eq!(timer.remaining(), Some(Duration::from_secs(30)));

    assert_eq!(timer.cancel(), Some(Phase::Guessing(1)));
    assert!(!timer.is_armed());
    assert_eq!(timer.cancel(), None);
    assert_eq!(timer.metrics().cancelled, 1);
}

#[tokio::test(start_paused = true)]
async fn test_rearm_replaces_pending_deadline() {
    let mut timer = PhaseTimer::default();
    timer.arm(Phase::Guessing(1), Duration::from_secs(30));
    timer.arm(Phase::Results(1), Duration::from_secs(5));

    let start = Instant::now();
    let expiry = timer.expired().await;
    assert_eq!(expiry.phase, Phase::Results(1));
    assert_eq!(start.elapsed(), Duration::from_secs(5));
    assert_eq!(timer.metrics().armed, 2);
    assert_eq!(timer.metrics().cancelled, 1);
}

// =========================================================================
// Firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_expired_fires_at_deadline_and_disarms() {
    let mut timer = PhaseTimer::default();
    let start = Instant::now();
    timer.arm(Phase::Guessing(3), Duration::from_secs(30));

    let expiry = timer.expired().await;
    assert_eq!(expiry.phase, Phase::Guessing(3));
    assert_eq!(start.elapsed(), Duration::from_secs(30));
    assert!(!timer.is_armed());
    assert_eq!(timer.metrics().fired, 1);
}

#[tokio::test(start_paused = true)]
async fn test_arm_at_absolute_instant() {
    let mut timer = PhaseTimer::default();
    let at = Instant::now() + Duration::from_secs(12);
    timer.arm_at(Phase::Guessing(1), at);
    assert_eq!(timer.deadline(), Some(at));

    timer.expired().await;
    assert_eq!(Instant::now(), at);
}

#[tokio::test(start_paused = true)]
async fn test_idle_timer_never_fires() {
    let mut timer = PhaseTimer::<Phase>::default();
    let result =
        time::timeout(Duration::from_secs(3600), timer.expired()).await;
    assert!(result.is_err(), "idle timer must pend forever");
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_timer_never_fires() {
    let mut timer = PhaseTimer::default();
    timer.arm(Phase::Guessing(1), Duration::from_secs(1));
    timer.cancel();
    let result =
        time::timeout(Duration::from_secs(10), timer.expired()).await;
    assert!(result.is_err());
}

#[tokio::test(start_paused = true)]
async fn test_dropped_wait_keeps_deadline_armed() {
    let mut timer = PhaseTimer::default();
    timer.arm(Phase::Guessing(1), Duration::from_secs(10));

    // Lose a select! race against a shorter sleep.
    tokio::select! {
        _ = timer.expired() => panic!("timer should not have fired yet"),
        _ = time::sleep(Duration::from_secs(2)) => {}
    }
    assert!(timer.is_armed());
    assert_eq!(timer.remaining(), Some(Duration::from_secs(8)));

    let expiry = timer.expired().await;
    assert_eq!(expiry.phase, Phase::Guessing(1));
}

#[tokio::test(start_paused = true)]
async fn test_late_observation_is_measured() {
    let mut timer = PhaseTimer::default();
    timer.arm(Phase::Results(2), Duration::from_secs(1));

    // Block past the deadline before polling.
    time::advance(Duration::from_secs(3)).await;

    let expiry = timer.expired().await;
    assert_eq!(expiry.late_by, Duration::from_secs(2));
    assert_eq!(timer.metrics().max_late_by, Duration::from_secs(2));
}
