//! RBAC domain types. Roles are tenant-scoped, permissions client-scoped.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::types::Timestamp;

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
	pub id: Box<str>,
	pub tenant_id: Box<str>,
	pub name: Box<str>,
	pub description: Option<Box<str>>,
	/// System roles cannot be modified or deleted
	pub is_system_role: bool,
	pub created_at: Timestamp,
	pub updated_at: Timestamp,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
	pub id: Box<str>,
	pub client_id: Box<str>,
	pub name: Box<str>,
	pub description: Option<Box<str>>,
	pub created_at: Timestamp,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRole {
	pub user_id: Box<str>,
	pub role_id: Box<str>,
	pub tenant_id: Box<str>,
	pub expires_at: Option<Timestamp>,
	pub created_at: Timestamp,
}

/// Cached permission set for `(tenant, user, client)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedPermissions {
	pub permissions: Vec<Box<str>>,
	pub cached_at: Timestamp,
}

/// Claims enrichment result, truncated to the configured maximum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RbacClaims {
	pub roles: Vec<Box<str>>,
	pub permissions: Vec<Box<str>>,
}

// vim: ts=4
