//! Periodic session maintenance.
//!
//! KV rows expire by TTL on their own; this task keeps the relational
//! mirror from accumulating rows for sessions whose hard lifetime ended.

use async_trait::async_trait;
use std::time::Duration;

use crate::SessionModule;
use crate::prelude::*;
use warden_core::app::AppState;
use warden_core::scheduler::MaintenanceTask;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Debug)]
pub struct SessionCleanupTask {
	interval: Duration,
}

impl SessionCleanupTask {
	pub fn new(interval: Duration) -> Self {
		Self { interval }
	}
}

impl Default for SessionCleanupTask {
	fn default() -> Self {
		Self::new(DEFAULT_INTERVAL)
	}
}

#[async_trait]
impl MaintenanceTask<AppState> for SessionCleanupTask {
	fn name(&self) -> &'static str {
		"session-cleanup"
	}

	fn interval(&self) -> Duration {
		self.interval
	}

	async fn run(&self, app: &AppState) -> WdResult<()> {
		if app.store.is_none() {
			// Nothing to clean; KV rows expire by TTL
			return Ok(());
		}
		let module = app.ext::<SessionModule>()?;
		let removed = module.store.admin_cleanup_expired().await?;
		if removed > 0 {
			info!(removed, "Expired session mirror rows removed");
		}
		Ok(())
	}
}

// vim: ts=4
