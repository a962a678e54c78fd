//! Integration tests for the round timer.
//!
//! Every async test runs with `start_paused = true`: Tokio's clock only
//! moves when we call `advance` (or when every task is idle and the
//! runtime auto-advances to the next timer), so deadlines are exact.

use std::time::Duration;

use duelroom_timer::{RoundTimer, deadline_after};
use tokio::time::{self, Instant};

// =========================================================================
// Helpers
// =========================================================================

/// Returns `true` if `expired()` resolves within `window` of virtual time.
async fn fires_within(timer: &mut RoundTimer, window: Duration) -> bool {
    tokio::select! {
        _ = timer.expired() => true,
        _ = time::sleep(window) => false,
    }
}

// =========================================================================
// Arming and cancelling
// =========================================================================

#[test]
fn test_new_timer_is_disarmed() {
    let timer = RoundTimer::new();
    assert!(!timer.is_armed());
    assert_eq!(timer.generation(), 0);
    assert_eq!(timer.deadline(), None);
}

#[tokio::test(start_paused = true)]
async fn test_arm_returns_increasing_generations() {
    let mut timer = RoundTimer::new();
    let g1 = timer.arm(Duration::from_secs(60));
    let g2 = timer.arm(Duration::from_secs(60));
    assert!(g2 > g1);
    assert_eq!(timer.generation(), g2);
}

#[tokio::test(start_paused = true)]
async fn test_arm_sets_deadline_and_remaining() {
    let mut timer = RoundTimer::new();
    let before = Instant::now();
    timer.arm(Duration::from_secs(60));

    assert!(timer.is_armed());
    assert_eq!(timer.deadline(), Some(before + Duration::from_secs(60)));

    time::advance(Duration::from_secs(15)).await;
    assert_eq!(timer.remaining(), Some(Duration::from_secs(45)));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_reports_whether_armed() {
    let mut timer = RoundTimer::new();
    assert!(!timer.cancel(), "cancelling a disarmed timer is a no-op");

    timer.arm(Duration::from_secs(1));
    assert!(timer.cancel());
    assert!(!timer.is_armed());
    assert!(!timer.cancel());
}

// =========================================================================
// Firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_expired_fires_at_deadline() {
    let mut timer = RoundTimer::new();
    let start = Instant::now();
    let generation = timer.arm(Duration::from_secs(60));

    let expiry = timer.expired().await;

    assert_eq!(Instant::now() - start, Duration::from_secs(60));
    assert_eq!(expiry.generation, generation);
    assert_eq!(expiry.duration, Duration::from_secs(60));
    assert_eq!(expiry.late_by, Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_expired_does_not_fire_early() {
    let mut timer = RoundTimer::new();
    timer.arm(Duration::from_secs(60));
    assert!(!fires_within(&mut timer, Duration::from_secs(59)).await);
    assert!(timer.is_armed(), "losing the select must not disarm");
    assert!(fires_within(&mut timer, Duration::from_secs(2)).await);
}

#[tokio::test(start_paused = true)]
async fn test_expired_fires_only_once_per_arm() {
    let mut timer = RoundTimer::new();
    timer.arm(Duration::from_millis(100));
    timer.expired().await;

    assert!(!timer.is_armed());
    assert!(
        !fires_within(&mut timer, Duration::from_secs(3600)).await,
        "a fired timer must stay quiet until re-armed"
    );
}

#[tokio::test(start_paused = true)]
async fn test_disarmed_timer_never_fires() {
    let mut timer = RoundTimer::new();
    assert!(!fires_within(&mut timer, Duration::from_secs(3600)).await);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_timer_never_fires() {
    let mut timer = RoundTimer::new();
    timer.arm(Duration::from_secs(5));
    timer.cancel();
    assert!(!fires_within(&mut timer, Duration::from_secs(10)).await);
}

#[tokio::test(start_paused = true)]
async fn test_rearm_replaces_old_deadline() {
    let mut timer = RoundTimer::new();
    let start = Instant::now();
    timer.arm(Duration::from_secs(5));
    let g2 = timer.arm(Duration::from_secs(10));

    let expiry = timer.expired().await;

    assert_eq!(expiry.generation, g2);
    assert_eq!(Instant::now() - start, Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_late_poll_reports_late_by() {
    let mut timer = RoundTimer::new();
    timer.arm(Duration::from_secs(1));

    // Nobody polls the timer until well after the deadline.
    time::advance(Duration::from_secs(3)).await;
    assert_eq!(timer.remaining(), Some(Duration::ZERO));

    let expiry = timer.expired().await;
    assert_eq!(expiry.late_by, Duration::from_secs(2));
}

// =========================================================================
// Oversized durations
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_arm_with_huge_duration_saturates() {
    let mut timer = RoundTimer::new();
    let before = Instant::now();

    timer.arm(Duration::MAX);

    assert!(timer.is_armed());
    assert!(timer.deadline().unwrap() > before + Duration::from_secs(86_400 * 365));
    assert!(!fires_within(&mut timer, Duration::from_secs(3600)).await);
}

#[test]
fn test_deadline_after_adds_normal_durations_exactly() {
    let now = Instant::now();
    assert_eq!(
        deadline_after(now, Duration::from_secs(60)),
        now + Duration::from_secs(60)
    );
}
