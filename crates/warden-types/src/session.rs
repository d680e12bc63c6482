//! Browser and account session domain types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::skip_serializing_none;

use crate::types::Timestamp;

/// A cookie-identified long-lived session holding up to N account logins.
///
/// `version` strictly increases on every mutation; it is advisory (stale
/// cookie detection), not a compare-and-swap token.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserSession {
	pub id: Box<str>,
	pub tenant_id: Box<str>,
	pub created_at: Timestamp,
	pub last_activity: Timestamp,
	pub user_agent: Option<Box<str>>,
	pub ip_address: Option<Box<str>>,
	pub version: u64,
	pub active_user_id: Option<Box<str>>,
	pub account_user_ids: Vec<Box<str>>,
}

/// A single account logged into a browser session
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSession {
	pub id: Box<str>,
	pub browser_session_id: Box<str>,
	pub user_id: Box<str>,
	pub is_active: bool,
	pub authenticated_at: Timestamp,
	pub expires_at: Timestamp,
	pub subject_type: Box<str>,
	#[serde(default)]
	pub subject_properties: Value,
	pub refresh_token: Option<Box<str>>,
	pub client_id: Option<Box<str>>,
}

/// Reverse-index row: `session/user/{tenant}/{user}/{browser_session}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSessionRef {
	pub session_id: Box<str>,
	pub tenant_id: Box<str>,
}

/// Encrypted cookie payload. `v` mirrors the browser session's version at
/// issuance; a stale `v` indicates out-of-date client state, it does not
/// invalidate the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCookiePayload {
	pub sid: Box<str>,
	pub tid: Box<str>,
	pub v: u64,
	pub iat: Timestamp,
}

/// Parameters for adding (or re-authenticating) an account in a session
#[derive(Debug)]
pub struct AddAccountData<'a> {
	pub browser_session_id: &'a str,
	pub user_id: &'a str,
	pub subject_type: &'a str,
	pub subject_properties: Value,
	pub refresh_token: Option<&'a str>,
	pub client_id: Option<&'a str>,
	/// Account-session lifetime in seconds
	pub ttl_seconds: i64,
}

// vim: ts=4
