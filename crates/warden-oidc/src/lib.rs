//! Token issuance subsystem: OIDC claims, ES256 signing via the key
//! manager, JWKS and discovery documents, and the authentication-success
//! hook that turns a provider login into tokens and a session.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod claims;
pub mod handler;
pub mod hook;
pub mod issuer;

mod prelude;

use std::sync::Arc;

use issuer::TokenIssuer;
use warden_keys::KeyManager;

#[derive(Debug, Clone)]
pub struct OidcConfig {
	pub access_token_ttl_seconds: i64,
	pub id_token_ttl_seconds: i64,
}

impl Default for OidcConfig {
	fn default() -> Self {
		Self { access_token_ttl_seconds: 3600, id_token_ttl_seconds: 3600 }
	}
}

/// Feature state registered in the app extension map
#[derive(Debug)]
pub struct OidcModule {
	pub keys: Arc<KeyManager>,
	pub issuer: TokenIssuer,
	pub config: OidcConfig,
}

// vim: ts=4
