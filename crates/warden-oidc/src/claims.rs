//! JWT claim sets. Standard compact JWS only; `exp`/`iat` are seconds
//! per RFC 7519 while the rest of the system carries milliseconds.

use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Claims of an issued access or id token
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
	pub sub: Box<str>,
	pub iss: Box<str>,
	pub aud: Box<str>,
	pub exp: i64,
	pub iat: i64,
	pub tenant_id: Box<str>,
	/// `"user"` for browser logins, `"m2m"` for client-credential tokens
	pub mode: Option<Box<str>>,
	/// Present on m2m tokens
	pub client_id: Option<Box<str>>,
	/// Space-separated scope of m2m tokens
	pub scope: Option<Box<str>>,
	pub email: Option<Box<str>>,
	/// RBAC enrichment, truncated to the configured maximum
	pub roles: Option<Vec<Box<str>>>,
	pub permissions: Option<Vec<Box<str>>>,
}

/// The subject a success hook produces before signing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
	pub id: Box<str>,
	pub email: Option<Box<str>>,
	pub tenant_id: Box<str>,
	pub roles: Vec<Box<str>>,
	pub permissions: Vec<Box<str>>,
}

// vim: ts=4
