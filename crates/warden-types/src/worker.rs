//! Worker pool for synchronous CPU-bound work (password hashing, key
//! generation) with two priority levels and configurable worker threads.

use flume::{Receiver, Sender};
use futures::channel::oneshot;
use std::{sync::Arc, thread};

use crate::prelude::*;

type Job = Box<dyn FnOnce() + Send>;

/// Interactive work (credential verification on a login path) goes to the
/// urgent queue; background work (key generation, rehashing) to the slow
/// queue. Urgent-only workers guarantee login latency is not starved by
/// background churn.
#[derive(Debug)]
pub struct WorkerPool {
	urgent: Sender<Job>,
	background: Sender<Job>,
}

impl WorkerPool {
	/// `n_urgent` threads serve only the urgent queue, `n_shared` threads
	/// serve both (urgent first).
	pub fn new(n_urgent: usize, n_shared: usize) -> Self {
		let (urgent, rx_urgent) = flume::unbounded();
		let (background, rx_background) = flume::unbounded();

		let rx_urgent = Arc::new(rx_urgent);
		let rx_background = Arc::new(rx_background);

		for _ in 0..n_urgent.max(1) {
			let rx_urgent = Arc::clone(&rx_urgent);
			thread::spawn(move || worker_loop(&[rx_urgent]));
		}

		for _ in 0..n_shared {
			let rx_urgent = Arc::clone(&rx_urgent);
			let rx_background = Arc::clone(&rx_background);
			thread::spawn(move || worker_loop(&[rx_urgent, rx_background]));
		}

		Self { urgent, background }
	}

	/// Submit an interactive closure; returns a future for its result
	pub fn run_urgent<F, T>(&self, f: F) -> impl std::future::Future<Output = WdResult<T>>
	where
		F: FnOnce() -> T + Send + 'static,
		T: Send + 'static,
	{
		Self::submit(&self.urgent, f)
	}

	/// Submit a background closure; returns a future for its result
	pub fn run_background<F, T>(&self, f: F) -> impl std::future::Future<Output = WdResult<T>>
	where
		F: FnOnce() -> T + Send + 'static,
		T: Send + 'static,
	{
		Self::submit(&self.background, f)
	}

	/// Like `run_urgent`, flattening `WdResult<WdResult<T>>`
	pub fn try_run_urgent<F, T>(&self, f: F) -> impl std::future::Future<Output = WdResult<T>>
	where
		F: FnOnce() -> WdResult<T> + Send + 'static,
		T: Send + 'static,
	{
		let fut = self.run_urgent(f);
		async move { fut.await? }
	}

	/// Like `run_background`, flattening `WdResult<WdResult<T>>`
	pub fn try_run_background<F, T>(&self, f: F) -> impl std::future::Future<Output = WdResult<T>>
	where
		F: FnOnce() -> WdResult<T> + Send + 'static,
		T: Send + 'static,
	{
		let fut = self.run_background(f);
		async move { fut.await? }
	}

	fn submit<F, T>(queue: &Sender<Job>, f: F) -> impl std::future::Future<Output = WdResult<T>>
	where
		F: FnOnce() -> T + Send + 'static,
		T: Send + 'static,
	{
		let (res_tx, res_rx) = oneshot::channel();

		let job: Job = Box::new(move || {
			let result = f();
			let _ignore = res_tx.send(result);
		});

		if queue.send(job).is_err() {
			error!("Failed to send job to worker queue");
		}

		async move {
			res_rx.await.map_err(|_| {
				error!("Worker dropped result channel (task may have panicked)");
				Error::Internal("worker task failed".into())
			})
		}
	}
}

type JobQueue = Arc<Receiver<Job>>;

fn worker_loop(queues: &[JobQueue]) {
	loop {
		// Drain higher-priority queues first (non-blocking)
		let mut job = None;
		for rx in queues {
			if let Ok(j) = rx.try_recv() {
				job = Some(j);
				break;
			}
		}

		if let Some(job) = job {
			if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
				error!("Worker thread caught panic: {:?}", e);
			}
			continue;
		}

		// Wait for the next job on any queue
		let mut selector = flume::Selector::new();
		for rx in queues {
			selector = selector.recv(rx, |res| res);
		}

		let job: Result<Job, flume::RecvError> = selector.wait();
		if let Ok(job) = job {
			if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(job)) {
				error!("Worker thread caught panic: {:?}", e);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::panic)]

	use super::*;

	#[tokio::test]
	async fn test_run_urgent_returns_result() {
		let pool = WorkerPool::new(1, 1);
		let out = pool.run_urgent(|| 2 + 2).await;
		assert_eq!(out.ok(), Some(4));
	}

	#[tokio::test]
	async fn test_try_run_flattens_errors() {
		let pool = WorkerPool::new(1, 0);
		let out: WdResult<u32> =
			pool.try_run_urgent(|| Err(Error::Internal("boom".into()))).await;
		assert!(out.is_err());
	}

	#[tokio::test]
	async fn test_pool_survives_panicking_job() {
		let pool = WorkerPool::new(1, 0);
		let _ignore: WdResult<()> = pool.run_urgent(|| panic!("deliberate")).await;
		// The worker thread caught the panic and keeps serving
		let out = pool.run_urgent(|| 7).await;
		assert_eq!(out.ok(), Some(7));
	}
}

// vim: ts=4
