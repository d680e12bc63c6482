//! Background maintenance scheduler.
//!
//! Feature crates register periodic tasks (session cleanup, key
//! rotation checks) against the shared app state; the scheduler drives
//! them on fixed intervals from one tokio task per registration. A
//! failing run is logged and retried on the next tick, never fatal.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::prelude::*;

/// A periodic maintenance task
#[async_trait]
pub trait MaintenanceTask<S: Send + Sync + 'static>: Send + Sync + Debug {
	/// Stable name for logging
	fn name(&self) -> &'static str;

	/// Interval between runs
	fn interval(&self) -> Duration;

	async fn run(&self, state: &S) -> WdResult<()>;
}

/// Registry of maintenance tasks, spawned together once the state is
/// fully built
pub struct Scheduler<S: Send + Sync + 'static> {
	tasks: Vec<Arc<dyn MaintenanceTask<S>>>,
}

impl<S: Send + Sync + 'static> Default for Scheduler<S> {
	fn default() -> Self {
		Self::new()
	}
}

impl<S: Send + Sync + 'static> Scheduler<S> {
	pub fn new() -> Self {
		Self { tasks: Vec::new() }
	}

	pub fn register(&mut self, task: Arc<dyn MaintenanceTask<S>>) {
		info!(task = task.name(), interval = ?task.interval(), "Maintenance task registered");
		self.tasks.push(task);
	}

	pub fn len(&self) -> usize {
		self.tasks.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tasks.is_empty()
	}

	/// Spawn one driver per task. The first tick fires after one full
	/// interval, not at startup, so boot stays fast.
	pub fn start(self, state: Arc<S>) {
		for task in self.tasks {
			let state = Arc::clone(&state);
			tokio::spawn(async move {
				let mut ticker = tokio::time::interval(task.interval());
				ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
				// interval fires immediately; swallow the first tick
				ticker.tick().await;
				loop {
					ticker.tick().await;
					debug!(task = task.name(), "Maintenance task running");
					if let Err(err) = task.run(&state).await {
						warn!(task = task.name(), error = ?err, "Maintenance task failed");
					}
				}
			});
		}
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	#[derive(Debug)]
	struct CountingTask {
		interval: Duration,
	}

	#[derive(Default)]
	struct Counter {
		runs: AtomicU32,
	}

	#[async_trait]
	impl MaintenanceTask<Counter> for CountingTask {
		fn name(&self) -> &'static str {
			"counting"
		}

		fn interval(&self) -> Duration {
			self.interval
		}

		async fn run(&self, state: &Counter) -> WdResult<()> {
			state.runs.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_tasks_run_on_interval() {
		let mut scheduler = Scheduler::new();
		scheduler.register(Arc::new(CountingTask { interval: Duration::from_secs(60) }));
		assert_eq!(scheduler.len(), 1);

		let state = Arc::new(Counter::default());
		scheduler.start(state.clone());

		// Nothing runs at startup
		tokio::time::advance(Duration::from_secs(1)).await;
		tokio::task::yield_now().await;
		assert_eq!(state.runs.load(Ordering::SeqCst), 0);

		tokio::time::advance(Duration::from_secs(60)).await;
		tokio::task::yield_now().await;
		assert_eq!(state.runs.load(Ordering::SeqCst), 1);

		tokio::time::advance(Duration::from_secs(120)).await;
		tokio::task::yield_now().await;
		assert!(state.runs.load(Ordering::SeqCst) >= 2);
	}

	#[derive(Debug)]
	struct FailingTask;

	#[async_trait]
	impl MaintenanceTask<Counter> for FailingTask {
		fn name(&self) -> &'static str {
			"failing"
		}

		fn interval(&self) -> Duration {
			Duration::from_secs(10)
		}

		async fn run(&self, state: &Counter) -> WdResult<()> {
			state.runs.fetch_add(1, Ordering::SeqCst);
			Err(Error::DbError)
		}
	}

	#[tokio::test(start_paused = true)]
	async fn test_failures_do_not_stop_the_schedule() {
		let mut scheduler = Scheduler::new();
		scheduler.register(Arc::new(FailingTask));

		let state = Arc::new(Counter::default());
		scheduler.start(state.clone());

		tokio::time::advance(Duration::from_secs(35)).await;
		tokio::task::yield_now().await;
		assert!(state.runs.load(Ordering::SeqCst) >= 3);
	}
}

// vim: ts=4
