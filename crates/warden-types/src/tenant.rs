//! Tenant domain types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::types::Timestamp;

/// Lifecycle status of a tenant.
///
/// `Suspended` and `Deleted` tenants never issue tokens; deletion is soft
/// so the row survives for audit while the domain becomes reusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
	Active,
	Suspended,
	Pending,
	Deleted,
}

impl TenantStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			TenantStatus::Active => "active",
			TenantStatus::Suspended => "suspended",
			TenantStatus::Pending => "pending",
			TenantStatus::Deleted => "deleted",
		}
	}

	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"active" => Some(TenantStatus::Active),
			"suspended" => Some(TenantStatus::Suspended),
			"pending" => Some(TenantStatus::Pending),
			"deleted" => Some(TenantStatus::Deleted),
			_ => None,
		}
	}
}

impl std::fmt::Display for TenantStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Per-tenant branding. Opaque to the core; the typed fields are the ones
/// the theme middleware projects, everything else rides along in `extra`.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantBranding {
	pub theme: Option<Box<str>>,
	pub logo_light: Option<Box<str>>,
	pub logo_dark: Option<Box<str>>,
	pub favicon: Option<Box<str>>,
	pub custom_css: Option<Box<str>>,
	pub email_template: Option<Box<str>>,
	#[serde(flatten)]
	pub extra: serde_json::Map<String, Value>,
}

/// Per-tenant behavior flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TenantSettings {
	pub allow_public_registration: bool,
	pub require_email_verification: bool,
	pub mfa_required: bool,
	pub max_accounts_per_session: Option<u32>,
	#[serde(flatten)]
	pub extra: serde_json::Map<String, Value>,
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
	pub id: Box<str>,
	pub name: Box<str>,
	pub domain: Option<Box<str>>,
	pub status: TenantStatus,
	#[serde(default)]
	pub branding: TenantBranding,
	#[serde(default)]
	pub settings: TenantSettings,
	pub created_at: Timestamp,
	pub updated_at: Timestamp,
}

/// Data needed to create a new tenant
#[derive(Debug, Default)]
pub struct CreateTenantData<'a> {
	pub id: &'a str,
	pub name: &'a str,
	pub domain: Option<&'a str>,
	pub branding: Option<TenantBranding>,
	pub settings: Option<TenantSettings>,
}

/// Options for listing tenants
#[derive(Debug, Default, Clone, Copy)]
pub struct ListTenantsOptions {
	pub status: Option<TenantStatus>,
	pub limit: u32,
	pub offset: u32,
}

impl ListTenantsOptions {
	pub fn limit_or_default(&self) -> u32 {
		if self.limit == 0 { 100 } else { self.limit }
	}
}

// vim: ts=4
