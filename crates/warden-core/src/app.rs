//! App state type

use std::sync::Arc;

use crate::extensions::Extensions;
use crate::prelude::*;
use crate::resolver::TenantResolver;
use crate::tenant::registry::TenantRegistry;

use warden_types::kv_adapter::KvAdapter;
use warden_types::store_adapter::StoreAdapter;
use warden_types::worker::WorkerPool;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Process-wide options that do not belong to any one subsystem
#[derive(Debug, Clone)]
pub struct AppOpts {
	/// Issuer URL stamped into tokens and the discovery document
	pub issuer: Box<str>,
	/// Default theme applied when a tenant has no branding override
	pub default_theme: Option<Box<str>>,
}

pub struct AppState {
	pub kv: Arc<dyn KvAdapter>,
	pub store: Option<Arc<dyn StoreAdapter>>,
	pub worker: Arc<WorkerPool>,
	pub clock: Arc<dyn Clock>,

	pub tenants: Arc<TenantRegistry>,
	pub resolver: Arc<TenantResolver>,

	pub opts: AppOpts,

	// Type-erased extension map for feature-specific state
	pub extensions: Extensions,
}

impl AppState {
	/// Get a registered extension by type. Returns an error if not found.
	pub fn ext<T: Send + Sync + 'static>(&self) -> WdResult<&T> {
		self.extensions.get::<T>().ok_or_else(|| {
			Error::Internal(format!("Extension {} not registered", std::any::type_name::<T>()))
		})
	}
}

impl std::fmt::Debug for AppState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AppState").field("opts", &self.opts).finish()
	}
}

pub type App = Arc<AppState>;

// vim: ts=4
