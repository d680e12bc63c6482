//! Failure-rate circuit breaker with three states and time-based
//! recovery.
//!
//! CLOSED records outcomes in a rolling window; once the window is
//! sampled enough and the failure rate crosses the threshold the breaker
//! OPENs and fails fast. After the cooldown the next admitted call probes
//! the downstream (HALF_OPEN); a run of consecutive successes closes the
//! circuit again, any failure reopens it immediately.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use crate::prelude::*;

/// Rolling window entries are bounded regardless of traffic
const WINDOW_CAP: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
	Closed,
	Open,
	HalfOpen,
}

impl BreakerState {
	pub fn as_str(self) -> &'static str {
		match self {
			BreakerState::Closed => "closed",
			BreakerState::Open => "open",
			BreakerState::HalfOpen => "half_open",
		}
	}
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
	/// Failure percentage that opens the circuit
	pub failure_threshold: u32,
	/// Minimum sampled requests in the window before the rate counts
	pub minimum_requests: u32,
	/// Rolling window size in milliseconds
	pub window_ms: i64,
	/// How long an open circuit rejects before probing
	pub cooldown_ms: i64,
	/// Consecutive half-open successes required to close
	pub success_threshold: u32,
}

impl Default for BreakerConfig {
	fn default() -> Self {
		Self {
			failure_threshold: 50,
			minimum_requests: 5,
			window_ms: 60_000,
			cooldown_ms: 30_000,
			success_threshold: 3,
		}
	}
}

#[derive(Debug)]
struct Inner {
	state: BreakerState,
	/// `(recorded_at, failed)` outcomes inside the window
	window: VecDeque<(Timestamp, bool)>,
	opened_at: Timestamp,
	consecutive_successes: u32,
}

#[derive(Debug)]
pub struct CircuitBreaker {
	config: BreakerConfig,
	clock: Arc<dyn Clock>,
	inner: Mutex<Inner>,
}

impl CircuitBreaker {
	pub fn new(config: BreakerConfig) -> Self {
		Self::with_clock(config, Arc::new(SystemClock))
	}

	pub fn with_clock(config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
		Self {
			config,
			clock,
			inner: Mutex::new(Inner {
				state: BreakerState::Closed,
				window: VecDeque::new(),
				opened_at: Timestamp(0),
				consecutive_successes: 0,
			}),
		}
	}

	pub fn state(&self) -> BreakerState {
		self.inner.lock().state
	}

	/// Gate a call. While OPEN every call is rejected until the cooldown
	/// elapses; the first call after that transitions to HALF_OPEN and is
	/// admitted as the probe.
	pub fn admit(&self) -> WdResult<()> {
		let mut inner = self.inner.lock();
		if inner.state == BreakerState::Open {
			let elapsed = self.clock.now().since(inner.opened_at);
			if elapsed < self.config.cooldown_ms {
				return Err(Error::CircuitOpen { state: BreakerState::Open.as_str() });
			}
			info!("Circuit breaker half-open, probing downstream");
			inner.state = BreakerState::HalfOpen;
			inner.consecutive_successes = 0;
		}
		Ok(())
	}

	/// Record the outcome of an admitted call. Only transient errors
	/// count as failures; domain errors prove the downstream is healthy.
	pub fn record<T>(&self, result: &WdResult<T>) {
		let failed = matches!(result, Err(err) if err.is_retryable());
		let now = self.clock.now();
		let mut inner = self.inner.lock();

		match inner.state {
			BreakerState::Closed => {
				inner.window.push_back((now, failed));
				if inner.window.len() > WINDOW_CAP {
					inner.window.pop_front();
				}
				let cutoff = now.add_millis(-self.config.window_ms);
				while inner.window.front().is_some_and(|(at, _)| *at < cutoff) {
					inner.window.pop_front();
				}

				if failed {
					let total = inner.window.len() as u32;
					let failures =
						inner.window.iter().filter(|(_, failed)| *failed).count() as u32;
					if total >= self.config.minimum_requests
						&& failures * 100 >= self.config.failure_threshold * total
					{
						warn!(
							failures,
							total, "Circuit breaker opening: failure rate over threshold"
						);
						inner.state = BreakerState::Open;
						inner.opened_at = now;
					}
				}
			}
			BreakerState::HalfOpen => {
				if failed {
					warn!("Circuit breaker reopening: probe failed");
					inner.state = BreakerState::Open;
					inner.opened_at = now;
				} else {
					inner.consecutive_successes += 1;
					if inner.consecutive_successes >= self.config.success_threshold {
						info!("Circuit breaker closing after successful probes");
						inner.state = BreakerState::Closed;
						inner.window.clear();
						inner.consecutive_successes = 0;
					}
				}
			}
			// A racing caller may record after another already reopened
			BreakerState::Open => {}
		}
	}
}


// vim: ts=4
