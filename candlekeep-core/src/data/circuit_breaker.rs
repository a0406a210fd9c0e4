//! Circuit breaker for exchange rate limiting and IP bans.
//!
//! HTTP 403 trips the breaker at once; repeated failures trip it after a
//! threshold. While open, every request is refused until the cooldown expires.

use std::cell::Cell;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Requests are allowed.
    Closed,
    /// All requests are refused until cooldown expires.
    Open { tripped_at: Instant },
}

/// Single-threaded breaker; the update run owns one for its whole lifetime.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Cell<BreakerState>,
    consecutive_failures: Cell<u32>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl CircuitBreaker {
    pub fn new(cooldown: Duration, failure_threshold: u32) -> Self {
        Self {
            state: Cell::new(BreakerState::Closed),
            consecutive_failures: Cell::new(0),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// 30-minute cooldown, trips after 3 consecutive failures.
    pub fn for_exchange() -> Self {
        Self::new(Duration::from_secs(30 * 60), 3)
    }

    pub fn is_allowed(&self) -> bool {
        match self.state.get() {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } if tripped_at.elapsed() >= self.cooldown => {
                self.state.set(BreakerState::Closed);
                self.consecutive_failures.set(0);
                true
            }
            BreakerState::Open { .. } => false,
        }
    }

    pub fn record_success(&self) {
        self.consecutive_failures.set(0);
    }

    pub fn record_failure(&self) {
        let failures = self.consecutive_failures.get() + 1;
        self.consecutive_failures.set(failures);
        if failures >= self.failure_threshold {
            self.trip();
        }
    }

    pub fn trip(&self) {
        tracing::warn!(cooldown_secs = self.cooldown.as_secs(), "circuit breaker tripped");
        self.state.set(BreakerState::Open {
            tripped_at: Instant::now(),
        });
    }

    /// Zero unless tripped.
    pub fn remaining_cooldown(&self) -> Duration {
        match self.state.get() {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { tripped_at } => self.cooldown.saturating_sub(tripped_at.elapsed()),
        }
    }
}
