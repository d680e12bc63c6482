//! Retry with exponential backoff and jitter.

use rand::RngExt;
use std::future::Future;
use std::time::Duration;

use crate::prelude::*;

/// Only errors in the transient allow-list (`Error::is_retryable`) are
/// re-attempted; domain errors pass through unchanged on the first try.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
	pub max_attempts: u32,
	pub base_delay_ms: u64,
	pub backoff_factor: f64,
	pub jitter: bool,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self { max_attempts: 3, base_delay_ms: 50, backoff_factor: 2.0, jitter: true }
	}
}

impl RetryPolicy {
	pub async fn run<T, F, Fut>(&self, op: F) -> WdResult<T>
	where
		F: Fn() -> Fut,
		Fut: Future<Output = WdResult<T>>,
	{
		let attempts = self.max_attempts.max(1);
		let mut attempt = 1;
		loop {
			match op().await {
				Ok(value) => return Ok(value),
				Err(err) if err.is_retryable() && attempt < attempts => {
					let delay = self.delay_for(attempt);
					debug!(
						attempt,
						delay_ms = delay.as_millis() as u64,
						error = ?err,
						"Transient error, retrying"
					);
					tokio::time::sleep(delay).await;
					attempt += 1;
				}
				Err(err) => return Err(err),
			}
		}
	}

	fn delay_for(&self, attempt: u32) -> Duration {
		let exp = self.base_delay_ms as f64 * self.backoff_factor.powi(attempt as i32 - 1);
		let mut millis = exp as u64;
		if self.jitter && millis > 0 {
			// Full jitter on the upper half keeps retries spread out
			let half = millis / 2;
			millis = half + rand::rng().random_range(0..=half.max(1));
		}
		Duration::from_millis(millis)
	}
}


// vim: ts=4
