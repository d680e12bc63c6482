//! Adapter over the relational store.
//!
//! The KV store is authoritative for tenants and sessions; the relational
//! store backs indexed listing, RBAC source data, the OAuth client
//! registry, and admin queries. Every `StoreAdapter` implementation is
//! required to implement this trait.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::client::{CreateClientData, ListClientsOptions, OAuthClient, UpdateClientData};
use crate::prelude::*;
use crate::rbac::{Permission, Role, UserRole};
use crate::session::{AccountSession, BrowserSession};
use crate::tenant::{ListTenantsOptions, Tenant};

/// Data needed to create a role
#[derive(Debug)]
pub struct CreateRoleData<'a> {
	pub tenant_id: &'a str,
	pub name: &'a str,
	pub description: Option<&'a str>,
	pub is_system_role: bool,
}

/// Data needed to create a permission
#[derive(Debug)]
pub struct CreatePermissionData<'a> {
	pub client_id: &'a str,
	pub name: &'a str,
	pub description: Option<&'a str>,
}

/// Options for listing browser sessions through the relational store
#[derive(Debug, Default, Clone, Copy)]
pub struct ListSessionsOptions {
	pub limit: u32,
	pub offset: u32,
}

/// A Warden relational store adapter
#[async_trait]
pub trait StoreAdapter: Debug + Send + Sync {
	/// # Deployment
	/// Whether any migration history exists. Absence is the detectable
	/// first-run condition; the migration tool itself lives outside the
	/// core.
	async fn has_migration_history(&self) -> WdResult<bool>;

	/// # Tenants
	/// Insert-or-replace mirror of the authoritative KV row
	async fn upsert_tenant(&self, tenant: &Tenant) -> WdResult<()>;
	async fn list_tenants(&self, opts: &ListTenantsOptions) -> WdResult<Vec<Tenant>>;

	/// # OAuth clients (authoritative here)
	async fn insert_client(&self, client: &OAuthClient) -> WdResult<()>;
	async fn read_client(&self, client_id: &str, tenant_id: &str) -> WdResult<OAuthClient>;
	/// Cross-tenant lookup, used only by token-exchange authentication
	async fn read_client_by_id(&self, client_id: &str) -> WdResult<OAuthClient>;
	async fn read_client_by_name(&self, tenant_id: &str, name: &str) -> WdResult<OAuthClient>;
	/// Fetches `limit + 1` rows ordered `created_at DESC, id DESC`
	async fn list_clients(
		&self,
		tenant_id: &str,
		opts: &ListClientsOptions<'_>,
	) -> WdResult<Vec<OAuthClient>>;
	async fn update_client(
		&self,
		client_id: &str,
		tenant_id: &str,
		data: &UpdateClientData<'_>,
	) -> WdResult<()>;
	/// Secret rotation column update
	async fn update_client_secret(
		&self,
		client_id: &str,
		tenant_id: &str,
		secret_hash: &str,
		previous_hash: Option<&str>,
		previous_expires_at: Option<Timestamp>,
		rotated_at: Option<Timestamp>,
	) -> WdResult<()>;
	async fn delete_client(&self, client_id: &str, tenant_id: &str) -> WdResult<()>;

	/// # Roles and permissions (authoritative here)
	async fn create_role(&self, data: &CreateRoleData<'_>) -> WdResult<Role>;
	async fn read_role(&self, role_id: &str, tenant_id: &str) -> WdResult<Role>;
	async fn list_roles(&self, tenant_id: &str) -> WdResult<Vec<Role>>;
	async fn update_role(
		&self,
		role_id: &str,
		tenant_id: &str,
		name: Option<&str>,
		description: Option<&str>,
	) -> WdResult<Role>;
	/// Deletes the role and its assignment rows
	async fn delete_role(&self, role_id: &str, tenant_id: &str) -> WdResult<()>;

	async fn create_permission(&self, data: &CreatePermissionData<'_>) -> WdResult<Permission>;
	async fn read_permission(&self, permission_id: &str) -> WdResult<Permission>;
	async fn list_permissions(&self, client_id: &str) -> WdResult<Vec<Permission>>;
	/// Deletes the permission; role-permission rows cascade at the
	/// storage layer
	async fn delete_permission(&self, permission_id: &str) -> WdResult<()>;

	async fn assign_permission_to_role(
		&self,
		role_id: &str,
		permission_id: &str,
	) -> WdResult<()>;
	async fn remove_permission_from_role(
		&self,
		role_id: &str,
		permission_id: &str,
	) -> WdResult<()>;
	async fn list_role_permissions(&self, role_id: &str) -> WdResult<Vec<Permission>>;

	async fn assign_role_to_user(
		&self,
		user_id: &str,
		role_id: &str,
		tenant_id: &str,
		expires_at: Option<Timestamp>,
	) -> WdResult<UserRole>;
	async fn remove_role_from_user(
		&self,
		user_id: &str,
		role_id: &str,
		tenant_id: &str,
	) -> WdResult<()>;
	async fn list_user_roles(&self, user_id: &str, tenant_id: &str) -> WdResult<Vec<Role>>;
	/// Every `(tenant_id, user_id)` holding the role, across tenants.
	/// Used for targeted cache invalidation when a role's permission set
	/// changes.
	async fn list_user_ids_with_role(
		&self,
		role_id: &str,
	) -> WdResult<Vec<(Box<str>, Box<str>)>>;
	/// Effective permission names of a user for one client: the union
	/// over the user's unexpired roles of each role's permissions,
	/// filtered to `client_id`.
	async fn list_user_permissions(
		&self,
		user_id: &str,
		tenant_id: &str,
		client_id: &str,
	) -> WdResult<Vec<Box<str>>>;

	/// # Session mirror (dual-write target, admin queries)
	async fn upsert_browser_session(&self, session: &BrowserSession) -> WdResult<()>;
	async fn upsert_account_session(&self, session: &AccountSession) -> WdResult<()>;
	async fn delete_browser_session(&self, session_id: &str) -> WdResult<()>;
	async fn delete_account_session(
		&self,
		browser_session_id: &str,
		user_id: &str,
	) -> WdResult<()>;
	async fn list_sessions_by_user(
		&self,
		tenant_id: &str,
		user_id: &str,
	) -> WdResult<Vec<BrowserSession>>;
	async fn list_sessions_by_tenant(
		&self,
		tenant_id: &str,
		opts: &ListSessionsOptions,
	) -> WdResult<Vec<BrowserSession>>;
	/// Removes browser sessions created before `created_before` (their
	/// hard lifetime has ended) together with their account rows; returns
	/// the number of browser sessions removed
	async fn cleanup_expired_sessions(&self, created_before: Timestamp) -> WdResult<u32>;
}

// vim: ts=4
