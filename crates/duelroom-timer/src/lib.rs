//! Round deadline timer for Duelroom.
//!
//! A round lasts a fixed wall-clock duration. When it runs out the room
//! must finish with a timeout, unless something else finished it first.
//! [`RoundTimer`] is that deadline: a single-shot timer that can be armed,
//! cancelled, and awaited.
//!
//! # Integration
//!
//! The timer is meant to sit inside a room actor's `tokio::select!` loop,
//! next to the command queue, so that expiry and client commands are
//! handled one at a time by the same task:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         expiry = timer.expired() => {
//!             room.finish(Outcome::Timeout, EndReason::Timeout);
//!         }
//!     }
//! }
//! ```
//!
//! While the timer is disarmed, [`RoundTimer::expired`] pends forever, so
//! the select only ever wakes for commands.

use std::time::Duration;

use tokio::time::{self, Instant};
use tracing::{debug, warn};

/// Stand-in for "never" when a duration would overflow the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + duration`, saturating at a deadline decades away instead of
/// panicking on overflow.
pub fn deadline_after(now: Instant, duration: Duration) -> Instant {
    now.checked_add(duration)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

/// Information about a deadline that fired, returned by
/// [`RoundTimer::expired`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expiry {
    /// Which arming fired. Each call to [`RoundTimer::arm`] bumps it.
    pub generation: u64,
    /// The duration the timer was armed with.
    pub duration: Duration,
    /// How far past the deadline the task actually woke up.
    /// Zero on an idle runtime.
    pub late_by: Duration,
}

/// Single-shot deadline for one room's round.
///
/// One `RoundTimer` per room actor. Not shared, not `Clone`: the actor
/// owns it and is the only one who arms, cancels or awaits it.
#[derive(Debug, Default)]
pub struct RoundTimer {
    /// When the armed deadline falls (Tokio instant for `sleep_until`).
    deadline: Option<Instant>,
    /// The duration passed to the latest `arm`.
    duration: Duration,
    generation: u64,
}

impl RoundTimer {
    /// A fresh, disarmed timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer to fire `duration` from now and returns the new
    /// generation.
    ///
    /// Re-arming an armed timer replaces the old deadline; the old one
    /// will never fire.
    pub fn arm(&mut self, duration: Duration) -> u64 {
        if self.deadline.is_some() {
            debug!(generation = self.generation, "re-arming round timer");
        }
        self.generation += 1;
        self.duration = duration;
        self.deadline = Some(deadline_after(Instant::now(), duration));
        debug!(
            generation = self.generation,
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "round timer armed"
        );
        self.generation
    }

    /// Disarms the timer. Returns `true` if it was armed.
    ///
    /// Cancelling a disarmed (or already fired) timer is a no-op.
    pub fn cancel(&mut self) -> bool {
        let was_armed = self.deadline.take().is_some();
        if was_armed {
            debug!(generation = self.generation, "round timer cancelled");
        }
        was_armed
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// The armed deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left until the deadline. `None` when disarmed, zero when the
    /// deadline has passed but `expired()` hasn't been polled yet.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Waits for the armed deadline, then disarms and reports it.
    ///
    /// When disarmed this future pends forever. It never resolves on its
    /// own, but `tokio::select!` still processes the other branches.
    ///
    /// Cancel-safe: dropping the future before it resolves (as `select!`
    /// does when another branch wins) leaves the timer armed and
    /// unchanged. Once it resolves, the timer is disarmed, so each arming
    /// fires at most once.
    pub async fn expired(&mut self) -> Expiry {
        let Some(deadline) = self.deadline else {
            return std::future::pending().await;
        };

        time::sleep_until(deadline).await;

        // No await between here and the return, so the deadline is
        // consumed exactly when the future completes.
        self.deadline = None;
        let late_by = Instant::now().saturating_duration_since(deadline);
        if late_by > self.duration / 10 {
            warn!(
                generation = self.generation,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "round timer fired late"
            );
        }

        Expiry {
            generation: self.generation,
            duration: self.duration,
            late_by,
        }
    }
}
