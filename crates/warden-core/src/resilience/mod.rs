//! Resilience primitives around downstream stores: retry with
//! exponential backoff, and a three-state circuit breaker. The breaker
//! wraps the retry loop, so an open circuit fails fast without burning
//! attempts.

pub mod breaker;
pub mod retry;

pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use retry::RetryPolicy;

use std::future::Future;
use std::sync::Arc;

use crate::prelude::*;

/// Breaker-outermost composition of the two primitives.
///
/// Shared by reference: one `Resilient` instance per downstream adapter
/// carries that adapter's rolling failure window.
#[derive(Debug, Clone)]
pub struct Resilient {
	breaker: Arc<CircuitBreaker>,
	retry: RetryPolicy,
}

impl Resilient {
	pub fn new(breaker: CircuitBreaker, retry: RetryPolicy) -> Self {
		Self { breaker: Arc::new(breaker), retry }
	}

	pub fn breaker(&self) -> &CircuitBreaker {
		&self.breaker
	}

	pub async fn run<T, F, Fut>(&self, op: F) -> WdResult<T>
	where
		F: Fn() -> Fut,
		Fut: Future<Output = WdResult<T>>,
	{
		self.breaker.admit()?;
		let result = self.retry.run(&op).await;
		self.breaker.record(&result);
		result
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};
	use warden_types::types::ManualClock;

	#[tokio::test]
	async fn test_breaker_short_circuits_before_retry() {
		let clock = Arc::new(ManualClock::new(Timestamp(0)));
		let resilient = Resilient::new(
			CircuitBreaker::with_clock(
				BreakerConfig { minimum_requests: 2, ..Default::default() },
				clock.clone(),
			),
			RetryPolicy { max_attempts: 3, base_delay_ms: 0, ..Default::default() },
		);

		let calls = AtomicU32::new(0);
		for _ in 0..2 {
			let _ignore = resilient
				.run(|| async {
					calls.fetch_add(1, Ordering::SeqCst);
					Err::<(), _>(Error::DbError)
				})
				.await;
		}
		// 2 logical calls x 3 attempts
		assert_eq!(calls.load(Ordering::SeqCst), 6);
		assert_eq!(resilient.breaker().state(), BreakerState::Open);

		// Open circuit: the operation is not invoked at all
		let err = resilient
			.run(|| async {
				calls.fetch_add(1, Ordering::SeqCst);
				Ok::<(), _>(())
			})
			.await
			.unwrap_err();
		assert!(matches!(err, Error::CircuitOpen { .. }));
		assert_eq!(calls.load(Ordering::SeqCst), 6);
	}
}

// vim: ts=4
