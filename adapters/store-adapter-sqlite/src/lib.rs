//! SQLite implementation of the Warden relational store adapter.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

use async_trait::async_trait;
use sqlx::{Row, sqlite};
use std::{fmt::Debug, path::Path, sync::Arc};

use warden_types::client::{ListClientsOptions, OAuthClient, UpdateClientData};
use warden_types::prelude::*;
use warden_types::rbac::{Permission, Role, UserRole};
use warden_types::session::{AccountSession, BrowserSession};
use warden_types::store_adapter::{
	CreatePermissionData, CreateRoleData, ListSessionsOptions, StoreAdapter,
};
use warden_types::tenant::{ListTenantsOptions, Tenant};

mod client;
mod rbac;
mod schema;
mod session;
mod tenant;
mod utils;

use utils::inspect;

pub struct StoreAdapterSqlite {
	db: sqlite::SqlitePool,
	clock: Arc<dyn Clock>,
}

impl Debug for StoreAdapterSqlite {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StoreAdapterSqlite").finish()
	}
}

impl StoreAdapterSqlite {
	pub async fn new(path: impl AsRef<Path>) -> WdResult<Self> {
		let opts = sqlite::SqliteConnectOptions::new()
			.filename(path.as_ref())
			.create_if_missing(true)
			.journal_mode(sqlite::SqliteJournalMode::Wal);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(5)
			.connect_with(opts)
			.await
			.inspect_err(inspect)
			.or(Err(Error::DbError))?;

		schema::init_db(&db).await.inspect_err(inspect).or(Err(Error::DbError))?;

		Ok(Self { db, clock: Arc::new(SystemClock) })
	}

	/// In-memory database for tests
	pub async fn new_in_memory() -> WdResult<Self> {
		let opts = sqlite::SqliteConnectOptions::new().in_memory(true);
		let db = sqlite::SqlitePoolOptions::new()
			.max_connections(1)
			.connect_with(opts)
			.await
			.inspect_err(inspect)
			.or(Err(Error::DbError))?;

		schema::init_db(&db).await.inspect_err(inspect).or(Err(Error::DbError))?;

		Ok(Self { db, clock: Arc::new(SystemClock) })
	}

	/// Replace the time source (tests drive expiry with a manual clock)
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;
		self
	}
}

#[async_trait]
impl StoreAdapter for StoreAdapterSqlite {
	async fn has_migration_history(&self) -> WdResult<bool> {
		let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM _warden_migrations) AS present")
			.fetch_one(&self.db)
			.await
			.inspect_err(inspect)
			.or(Err(Error::DbError))?;
		row.try_get::<bool, _>("present").inspect_err(inspect).or(Err(Error::DbError))
	}

	async fn upsert_tenant(&self, t: &Tenant) -> WdResult<()> {
		tenant::upsert_tenant(&self.db, t).await
	}

	async fn list_tenants(&self, opts: &ListTenantsOptions) -> WdResult<Vec<Tenant>> {
		tenant::list_tenants(&self.db, opts).await
	}

	async fn insert_client(&self, c: &OAuthClient) -> WdResult<()> {
		client::insert_client(&self.db, c).await
	}

	async fn read_client(&self, client_id: &str, tenant_id: &str) -> WdResult<OAuthClient> {
		client::read_client(&self.db, client_id, tenant_id).await
	}

	async fn read_client_by_id(&self, client_id: &str) -> WdResult<OAuthClient> {
		client::read_client_by_id(&self.db, client_id).await
	}

	async fn read_client_by_name(&self, tenant_id: &str, name: &str) -> WdResult<OAuthClient> {
		client::read_client_by_name(&self.db, tenant_id, name).await
	}

	async fn list_clients(
		&self,
		tenant_id: &str,
		opts: &ListClientsOptions<'_>,
	) -> WdResult<Vec<OAuthClient>> {
		client::list_clients(&self.db, tenant_id, opts).await
	}

	async fn update_client(
		&self,
		client_id: &str,
		tenant_id: &str,
		data: &UpdateClientData<'_>,
	) -> WdResult<()> {
		client::update_client(&self.db, client_id, tenant_id, data, self.clock.now()).await
	}

	async fn update_client_secret(
		&self,
		client_id: &str,
		tenant_id: &str,
		secret_hash: &str,
		previous_hash: Option<&str>,
		previous_expires_at: Option<Timestamp>,
		rotated_at: Option<Timestamp>,
	) -> WdResult<()> {
		client::update_client_secret(
			&self.db,
			client_id,
			tenant_id,
			secret_hash,
			previous_hash,
			previous_expires_at,
			rotated_at,
			self.clock.now(),
		)
		.await
	}

	async fn delete_client(&self, client_id: &str, tenant_id: &str) -> WdResult<()> {
		client::delete_client(&self.db, client_id, tenant_id).await
	}

	async fn create_role(&self, data: &CreateRoleData<'_>) -> WdResult<Role> {
		rbac::create_role(&self.db, data, self.clock.now()).await
	}

	async fn read_role(&self, role_id: &str, tenant_id: &str) -> WdResult<Role> {
		rbac::read_role(&self.db, role_id, tenant_id).await
	}

	async fn list_roles(&self, tenant_id: &str) -> WdResult<Vec<Role>> {
		rbac::list_roles(&self.db, tenant_id).await
	}

	async fn update_role(
		&self,
		role_id: &str,
		tenant_id: &str,
		name: Option<&str>,
		description: Option<&str>,
	) -> WdResult<Role> {
		rbac::update_role(&self.db, role_id, tenant_id, name, description, self.clock.now()).await
	}

	async fn delete_role(&self, role_id: &str, tenant_id: &str) -> WdResult<()> {
		rbac::delete_role(&self.db, role_id, tenant_id).await
	}

	async fn create_permission(&self, data: &CreatePermissionData<'_>) -> WdResult<Permission> {
		rbac::create_permission(&self.db, data, self.clock.now()).await
	}

	async fn read_permission(&self, permission_id: &str) -> WdResult<Permission> {
		rbac::read_permission(&self.db, permission_id).await
	}

	async fn list_permissions(&self, client_id: &str) -> WdResult<Vec<Permission>> {
		rbac::list_permissions(&self.db, client_id).await
	}

	async fn delete_permission(&self, permission_id: &str) -> WdResult<()> {
		rbac::delete_permission(&self.db, permission_id).await
	}

	async fn assign_permission_to_role(
		&self,
		role_id: &str,
		permission_id: &str,
	) -> WdResult<()> {
		rbac::assign_permission_to_role(&self.db, role_id, permission_id).await
	}

	async fn remove_permission_from_role(
		&self,
		role_id: &str,
		permission_id: &str,
	) -> WdResult<()> {
		rbac::remove_permission_from_role(&self.db, role_id, permission_id).await
	}

	async fn list_role_permissions(&self, role_id: &str) -> WdResult<Vec<Permission>> {
		rbac::list_role_permissions(&self.db, role_id).await
	}

	async fn assign_role_to_user(
		&self,
		user_id: &str,
		role_id: &str,
		tenant_id: &str,
		expires_at: Option<Timestamp>,
	) -> WdResult<UserRole> {
		rbac::assign_role_to_user(&self.db, user_id, role_id, tenant_id, expires_at, self.clock.now())
			.await
	}

	async fn remove_role_from_user(
		&self,
		user_id: &str,
		role_id: &str,
		tenant_id: &str,
	) -> WdResult<()> {
		rbac::remove_role_from_user(&self.db, user_id, role_id, tenant_id).await
	}

	async fn list_user_roles(&self, user_id: &str, tenant_id: &str) -> WdResult<Vec<Role>> {
		rbac::list_user_roles(&self.db, user_id, tenant_id, self.clock.now()).await
	}

	async fn list_user_ids_with_role(
		&self,
		role_id: &str,
	) -> WdResult<Vec<(Box<str>, Box<str>)>> {
		rbac::list_user_ids_with_role(&self.db, role_id).await
	}

	async fn list_user_permissions(
		&self,
		user_id: &str,
		tenant_id: &str,
		client_id: &str,
	) -> WdResult<Vec<Box<str>>> {
		rbac::list_user_permissions(&self.db, user_id, tenant_id, client_id, self.clock.now()).await
	}

	async fn upsert_browser_session(&self, s: &BrowserSession) -> WdResult<()> {
		session::upsert_browser_session(&self.db, s).await
	}

	async fn upsert_account_session(&self, s: &AccountSession) -> WdResult<()> {
		session::upsert_account_session(&self.db, s).await
	}

	async fn delete_browser_session(&self, session_id: &str) -> WdResult<()> {
		session::delete_browser_session(&self.db, session_id).await
	}

	async fn delete_account_session(
		&self,
		browser_session_id: &str,
		user_id: &str,
	) -> WdResult<()> {
		session::delete_account_session(&self.db, browser_session_id, user_id).await
	}

	async fn list_sessions_by_user(
		&self,
		tenant_id: &str,
		user_id: &str,
	) -> WdResult<Vec<BrowserSession>> {
		session::list_sessions_by_user(&self.db, tenant_id, user_id).await
	}

	async fn list_sessions_by_tenant(
		&self,
		tenant_id: &str,
		opts: &ListSessionsOptions,
	) -> WdResult<Vec<BrowserSession>> {
		session::list_sessions_by_tenant(&self.db, tenant_id, opts).await
	}

	async fn cleanup_expired_sessions(&self, created_before: Timestamp) -> WdResult<u32> {
		session::cleanup_expired_sessions(&self.db, created_before).await
	}
}

// vim: ts=4
