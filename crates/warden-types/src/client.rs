//! OAuth client domain types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::types::Timestamp;

/// A registered OAuth client. Secrets are stored hashed only; the
/// `previous_*` pair exists exactly while a rotation grace window is open.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthClient {
	pub id: Box<str>,
	pub tenant_id: Box<str>,
	pub name: Box<str>,
	#[serde(skip_serializing)]
	pub client_secret_hash: Box<str>,
	#[serde(skip_serializing)]
	pub previous_secret_hash: Option<Box<str>>,
	pub previous_secret_expires_at: Option<Timestamp>,
	pub rotated_at: Option<Timestamp>,
	pub grant_types: Vec<Box<str>>,
	pub scopes: Vec<Box<str>>,
	pub redirect_uris: Vec<Box<str>>,
	#[serde(default)]
	pub metadata: Value,
	pub enabled: bool,
	pub created_at: Timestamp,
	pub updated_at: Timestamp,
}

/// Result of creating or rotating a client: the plaintext secret is
/// returned exactly once and never again.
#[derive(Debug)]
pub struct CreatedClient {
	pub client: OAuthClient,
	pub secret: Box<str>,
}

/// Request data for creating a client
#[derive(Debug)]
pub struct CreateClientData<'a> {
	pub name: &'a str,
	pub grant_types: &'a [&'a str],
	pub scopes: &'a [&'a str],
	pub redirect_uris: &'a [&'a str],
	pub metadata: Option<Value>,
}

/// Partial update of a client; `None` fields are left unchanged
#[derive(Debug, Default)]
pub struct UpdateClientData<'a> {
	pub name: Option<&'a str>,
	pub grant_types: Option<&'a [&'a str]>,
	pub scopes: Option<&'a [&'a str]>,
	pub redirect_uris: Option<&'a [&'a str]>,
	pub metadata: Option<Value>,
	pub enabled: Option<bool>,
}

/// Options for cursor-paginated client listing
#[derive(Debug, Default)]
pub struct ListClientsOptions<'a> {
	/// Page size, clamped to 100
	pub limit: u32,
	/// Opaque cursor from a previous page
	pub cursor: Option<&'a str>,
	pub enabled: Option<bool>,
}

/// One page of clients ordered `created_at DESC, id DESC`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientPage {
	pub clients: Vec<OAuthClient>,
	pub has_more: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub next_cursor: Option<Box<str>>,
}

// vim: ts=4
