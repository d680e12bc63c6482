//! Permission evaluation with a KV-backed cache.
//!
//! Roles and permissions live in the relational store; the computed
//! permission set of a `(tenant, user, client)` triple is cached at
//! `rbac/permissions/{tenant}/{user}/{client}` with a short TTL.
//! Assignment changes invalidate exactly the affected prefixes; a failed
//! invalidation enumeration degrades to natural TTL expiry.

use std::collections::HashMap;
use std::sync::Arc;

use crate::prelude::*;
use warden_types::kv_adapter::{self, KvAdapter};
use warden_types::kv_key::KvKey;
use warden_types::rbac::{CachedPermissions, Permission, RbacClaims, Role, UserRole};
use warden_types::store_adapter::{CreatePermissionData, CreateRoleData, StoreAdapter};

const KEY_ROOT: &str = "rbac";
const KEY_PERMISSIONS: &str = "permissions";

#[derive(Debug, Clone)]
pub struct RbacConfig {
	pub permission_cache_ttl_seconds: u32,
	pub max_permissions_in_token: usize,
}

impl Default for RbacConfig {
	fn default() -> Self {
		Self { permission_cache_ttl_seconds: 60, max_permissions_in_token: 50 }
	}
}

fn cache_key(tenant_id: &str, user_id: &str, client_id: &str) -> KvKey {
	KvKey::from([KEY_ROOT, KEY_PERMISSIONS, tenant_id, user_id, client_id])
}

fn user_prefix(tenant_id: &str, user_id: &str) -> KvKey {
	KvKey::from([KEY_ROOT, KEY_PERMISSIONS, tenant_id, user_id])
}

/// A single permission check request
#[derive(Debug)]
pub struct PermissionQuery<'a> {
	pub user_id: &'a str,
	pub client_id: &'a str,
	pub tenant_id: &'a str,
	pub permission: &'a str,
}

#[derive(Debug)]
pub struct RbacEngine {
	kv: Arc<dyn KvAdapter>,
	store: Arc<dyn StoreAdapter>,
	clock: Arc<dyn Clock>,
	config: RbacConfig,
}

impl RbacEngine {
	pub fn new(
		kv: Arc<dyn KvAdapter>,
		store: Arc<dyn StoreAdapter>,
		clock: Arc<dyn Clock>,
		config: RbacConfig,
	) -> Self {
		Self { kv, store, clock, config }
	}

	pub fn config(&self) -> &RbacConfig {
		&self.config
	}

	// Evaluation //
	//************//

	pub async fn check_permission(&self, query: &PermissionQuery<'_>) -> WdResult<bool> {
		let permissions = self
			.cached_permissions(query.tenant_id, query.user_id, query.client_id)
			.await?;
		Ok(permissions.iter().any(|p| p.as_ref() == query.permission))
	}

	/// Batch check: one cache load, then set membership per item
	pub async fn check_permissions(
		&self,
		tenant_id: &str,
		user_id: &str,
		client_id: &str,
		permissions: &[&str],
	) -> WdResult<HashMap<Box<str>, bool>> {
		let held = self.cached_permissions(tenant_id, user_id, client_id).await?;
		Ok(permissions
			.iter()
			.map(|wanted| {
				(Box::from(*wanted), held.iter().any(|p| p.as_ref() == *wanted))
			})
			.collect())
	}

	pub async fn get_user_permissions(
		&self,
		tenant_id: &str,
		user_id: &str,
		client_id: &str,
	) -> WdResult<Vec<Box<str>>> {
		self.cached_permissions(tenant_id, user_id, client_id).await
	}

	/// Roles read through to the store, uncached
	pub async fn get_user_roles(&self, tenant_id: &str, user_id: &str) -> WdResult<Vec<Role>> {
		self.store.list_user_roles(user_id, tenant_id).await
	}

	/// Roles and permissions for token claims, fetched concurrently. An
	/// oversized permission set is truncated with a warning rather than
	/// growing the token without bound.
	pub async fn enrich_token_claims(
		&self,
		tenant_id: &str,
		user_id: &str,
		client_id: &str,
	) -> WdResult<RbacClaims> {
		let (roles, permissions) = tokio::join!(
			self.store.list_user_roles(user_id, tenant_id),
			self.cached_permissions(tenant_id, user_id, client_id),
		);
		let roles = roles?;
		let mut permissions = permissions?;

		if permissions.len() > self.config.max_permissions_in_token {
			warn!(
				tenant = tenant_id,
				user = user_id,
				count = permissions.len(),
				limit = self.config.max_permissions_in_token,
				"Truncating permission claims"
			);
			permissions.truncate(self.config.max_permissions_in_token);
		}

		Ok(RbacClaims {
			roles: roles.into_iter().map(|r| r.name).collect(),
			permissions,
		})
	}

	// Assignments //
	//*************//

	pub async fn assign_role_to_user(
		&self,
		user_id: &str,
		role_id: &str,
		tenant_id: &str,
		expires_at: Option<Timestamp>,
	) -> WdResult<UserRole> {
		let assignment =
			self.store.assign_role_to_user(user_id, role_id, tenant_id, expires_at).await?;
		self.invalidate_user(tenant_id, user_id).await;
		Ok(assignment)
	}

	pub async fn remove_role_from_user(
		&self,
		user_id: &str,
		role_id: &str,
		tenant_id: &str,
	) -> WdResult<()> {
		self.store.remove_role_from_user(user_id, role_id, tenant_id).await?;
		self.invalidate_user(tenant_id, user_id).await;
		Ok(())
	}

	// Roles //
	//*******//

	pub async fn create_role(
		&self,
		tenant_id: &str,
		name: &str,
		description: Option<&str>,
	) -> WdResult<Role> {
		let name = name.trim();
		if name.is_empty() {
			return Err(Error::validation("invalid_request", "Role name must not be empty"));
		}
		self.store
			.create_role(&CreateRoleData {
				tenant_id,
				name,
				description,
				is_system_role: false,
			})
			.await
	}

	pub async fn get_role(&self, role_id: &str, tenant_id: &str) -> WdResult<Role> {
		self.store.read_role(role_id, tenant_id).await
	}

	pub async fn list_roles(&self, tenant_id: &str) -> WdResult<Vec<Role>> {
		self.store.list_roles(tenant_id).await
	}

	pub async fn update_role(
		&self,
		role_id: &str,
		tenant_id: &str,
		name: Option<&str>,
		description: Option<&str>,
	) -> WdResult<Role> {
		let role = self.store.read_role(role_id, tenant_id).await?;
		if role.is_system_role {
			return Err(Error::forbidden(
				"cannot_modify_system_role",
				"System roles cannot be modified",
			));
		}
		self.store.update_role(role_id, tenant_id, name, description).await
	}

	/// Delete a role and invalidate every user that held it
	pub async fn delete_role(&self, role_id: &str, tenant_id: &str) -> WdResult<()> {
		let role = self.store.read_role(role_id, tenant_id).await?;
		if role.is_system_role {
			return Err(Error::forbidden(
				"cannot_delete_system_role",
				"System roles cannot be deleted",
			));
		}

		let holders = self.store.list_user_ids_with_role(role_id).await;
		self.store.delete_role(role_id, tenant_id).await?;
		self.invalidate_role_holders(role_id, holders).await;
		Ok(())
	}

	// Permissions //
	//*************//

	pub async fn create_permission(
		&self,
		client_id: &str,
		name: &str,
		description: Option<&str>,
	) -> WdResult<Permission> {
		let name = name.trim();
		if name.is_empty() {
			return Err(Error::validation(
				"invalid_request",
				"Permission name must not be empty",
			));
		}
		self.store
			.create_permission(&CreatePermissionData { client_id, name, description })
			.await
	}

	pub async fn list_permissions(&self, client_id: &str) -> WdResult<Vec<Permission>> {
		self.store.list_permissions(client_id).await
	}

	/// Deletion cascades over role-permission rows at the storage layer;
	/// caches converge within the TTL, there is no direct hook.
	pub async fn delete_permission(&self, permission_id: &str) -> WdResult<()> {
		self.store.delete_permission(permission_id).await
	}

	pub async fn assign_permission_to_role(
		&self,
		role_id: &str,
		permission_id: &str,
	) -> WdResult<()> {
		self.store.assign_permission_to_role(role_id, permission_id).await?;
		let holders = self.store.list_user_ids_with_role(role_id).await;
		self.invalidate_role_holders(role_id, holders).await;
		Ok(())
	}

	pub async fn remove_permission_from_role(
		&self,
		role_id: &str,
		permission_id: &str,
	) -> WdResult<()> {
		self.store.remove_permission_from_role(role_id, permission_id).await?;
		let holders = self.store.list_user_ids_with_role(role_id).await;
		self.invalidate_role_holders(role_id, holders).await;
		Ok(())
	}

	pub async fn list_role_permissions(&self, role_id: &str) -> WdResult<Vec<Permission>> {
		self.store.list_role_permissions(role_id).await
	}

	// Cache //
	//*******//

	async fn cached_permissions(
		&self,
		tenant_id: &str,
		user_id: &str,
		client_id: &str,
	) -> WdResult<Vec<Box<str>>> {
		let key = cache_key(tenant_id, user_id, client_id);
		if let Some(cached) =
			kv_adapter::get_json::<CachedPermissions>(self.kv.as_ref(), &key).await?
		{
			return Ok(cached.permissions);
		}

		let permissions =
			self.store.list_user_permissions(user_id, tenant_id, client_id).await?;
		kv_adapter::set_json(
			self.kv.as_ref(),
			&key,
			&CachedPermissions { permissions: permissions.clone(), cached_at: self.clock.now() },
			Some(self.config.permission_cache_ttl_seconds),
		)
		.await?;
		Ok(permissions)
	}

	/// Drop every cached set of one user in one tenant (all clients)
	async fn invalidate_user(&self, tenant_id: &str, user_id: &str) {
		let prefix = user_prefix(tenant_id, user_id);
		match self.kv.scan(&prefix).await {
			Ok(entries) => {
				for (key, _) in entries {
					if let Err(err) = self.kv.remove(&key).await {
						warn!(error = ?err, "Permission cache invalidation write failed");
					}
				}
			}
			Err(err) => {
				// TTL expiry will converge
				warn!(error = ?err, "Permission cache invalidation scan failed");
			}
		}
	}

	/// Invalidate every holder of a role. If enumeration failed, log and
	/// fall back to TTL expiry.
	async fn invalidate_role_holders(
		&self,
		role_id: &str,
		holders: WdResult<Vec<(Box<str>, Box<str>)>>,
	) {
		match holders {
			Ok(holders) => {
				for (tenant_id, user_id) in holders {
					self.invalidate_user(&tenant_id, &user_id).await;
				}
			}
			Err(err) => {
				warn!(
					role = role_id,
					error = ?err,
					"Role holder enumeration failed; caches expire by TTL"
				);
			}
		}
	}
}

// vim: ts=4
