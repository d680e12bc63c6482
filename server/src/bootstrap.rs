//! App construction and the serve loop.

use std::sync::Arc;

use warden_clients::ClientRegistry;
use warden_core::app::{App, AppOpts, AppState};
use warden_core::extensions::Extensions;
use warden_core::resilience::{BreakerConfig, CircuitBreaker, Resilient, RetryPolicy};
use warden_core::resolver::TenantResolver;
use warden_core::scheduler::Scheduler;
use warden_core::tenant::TenantRegistry;
use warden_keys::KeyManager;
use warden_kv_adapter_memory::MemoryKvAdapter;
use warden_oidc::issuer::TokenIssuer;
use warden_oidc::{OidcConfig, OidcModule};
use warden_rbac::RbacModule;
use warden_rbac::engine::RbacEngine;
use warden_session::SessionModule;
use warden_session::cleanup::SessionCleanupTask;
use warden_session::cookie::{self, CookieConfig, CookieCrypto};
use warden_session::store::SessionStore;
use warden_store_adapter_sqlite::StoreAdapterSqlite;
use warden_types::kv_adapter::KvAdapter;
use warden_types::store_adapter::StoreAdapter;
use warden_types::worker::WorkerPool;

use crate::config::Config;
use crate::prelude::*;
use crate::routes;

/// Build the fully wired app state from a configuration.
///
/// The KV store is authoritative; the relational store backs listing,
/// RBAC source data, the client registry, and session admin queries.
/// Without `WARDEN_DB` those surfaces are simply not registered.
pub async fn build_app(config: &Config) -> WdResult<App> {
	let clock: Arc<dyn Clock> = Arc::new(SystemClock);
	let worker = Arc::new(WorkerPool::new(2, 2));

	let kv: Arc<dyn KvAdapter> = Arc::new(MemoryKvAdapter::with_clock(clock.clone()));
	let store: Option<Arc<dyn StoreAdapter>> = match config.db_path {
		Some(ref path) => {
			info!(path, "Opening relational store");
			let adapter = StoreAdapterSqlite::new(path).await?;
			if !adapter.has_migration_history().await? {
				info!("No migration history found: first run, schema bootstrapped");
			}
			Some(Arc::new(adapter))
		}
		None => {
			warn!("WARDEN_DB not set: running without a relational store");
			None
		}
	};

	let tenants = Arc::new(TenantRegistry::new(kv.clone(), store.clone(), clock.clone()));
	let resolver = Arc::new(TenantResolver::new(tenants.clone(), config.resolver.clone()));

	let keys = Arc::new(KeyManager::new(kv.clone(), worker.clone(), clock.clone()));
	let issuer = TokenIssuer::new(keys.clone(), &config.issuer, clock.clone());

	let cookie_config = CookieConfig {
		max_age_seconds: config.session.session_lifetime_seconds,
		..config.cookie.clone()
	};
	let crypto = CookieCrypto::new(cookie::parse_secret(&config.session_secret)?);

	let mut extensions = Extensions::new();
	extensions.insert(SessionModule {
		store: SessionStore::new(
			kv.clone(),
			store.clone(),
			clock.clone(),
			config.session.clone(),
		),
		crypto,
		cookie: cookie_config,
	});
	if let Some(ref store) = store {
		extensions.insert(RbacModule {
			engine: RbacEngine::new(
				kv.clone(),
				store.clone(),
				clock.clone(),
				config.rbac.clone(),
			),
		});
		extensions.insert(ClientRegistry::new(
			store.clone(),
			Resilient::new(CircuitBreaker::new(BreakerConfig::default()), RetryPolicy::default()),
			worker.clone(),
			clock.clone(),
		));
	}
	extensions.insert(OidcModule { keys, issuer, config: OidcConfig::default() });

	Ok(Arc::new(AppState {
		kv,
		store,
		worker,
		clock,
		tenants,
		resolver,
		opts: AppOpts {
			issuer: config.issuer.clone().into_boxed_str(),
			default_theme: config.default_theme.clone().map(String::into_boxed_str),
		},
		extensions,
	}))
}

pub async fn run() -> WdResult<()> {
	let config = Config::from_env()?;
	let app = build_app(&config).await?;

	let mut scheduler = Scheduler::new();
	if app.store.is_some() {
		scheduler.register(Arc::new(SessionCleanupTask::default()));
	}
	scheduler.start(app.clone());

	let router = routes::build_router(app);

	info!(listen = %config.listen, issuer = %config.issuer, "Warden listening");
	let listener = tokio::net::TcpListener::bind(&config.listen).await?;
	axum::serve(listener, router)
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	Ok(())
}

async fn shutdown_signal() {
	if tokio::signal::ctrl_c().await.is_err() {
		warn!("Failed to install shutdown signal handler");
	}
}

// vim: ts=4
