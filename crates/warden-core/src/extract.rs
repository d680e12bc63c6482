//! Custom extractors for Warden-specific request data.
//!
//! Authentication and tenant resolution run as middleware in the server
//! crate; these extractors read what the middleware stored in the request
//! extensions.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::prelude::*;
use warden_types::tenant::Tenant;

/// Context of an authenticated principal
#[derive(Debug, Clone)]
pub struct AuthCtx {
	pub user_id: Box<str>,
	pub tenant_id: Box<str>,
	pub roles: Box<[Box<str>]>,
	pub scope: Option<Box<str>>,
	/// Set for m2m tokens
	pub client_id: Option<Box<str>>,
}

// Auth //
//******//
#[derive(Debug, Clone)]
pub struct Auth(pub AuthCtx);

impl<S> FromRequestParts<S> for Auth
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		if let Some(auth) = parts.extensions.get::<Auth>().cloned() {
			Ok(auth)
		} else {
			Err(Error::unauthorized("missing_token"))
		}
	}
}

// OptionalAuth //
//**************//
/// Optional auth extractor that doesn't fail if auth is missing
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<AuthCtx>);

impl<S> FromRequestParts<S> for OptionalAuth
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		let auth = parts.extensions.get::<Auth>().cloned().map(|a| a.0);
		Ok(OptionalAuth(auth))
	}
}

// ResolvedTenant //
//****************//
/// Tenant selected by the resolver middleware for this request
#[derive(Debug, Clone)]
pub struct ResolvedTenant(pub Tenant);

impl<S> FromRequestParts<S> for ResolvedTenant
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		parts
			.extensions
			.get::<ResolvedTenant>()
			.cloned()
			.ok_or(Error::not_found("tenant_not_found"))
	}
}

// RequestId //
//***********//
/// Request ID for tracing and debugging
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Optional Request ID extractor - always succeeds, returns None if not available
#[derive(Clone, Debug)]
pub struct OptionalRequestId(pub Option<String>);

impl<S> FromRequestParts<S> for OptionalRequestId
where
	S: Send + Sync,
{
	type Rejection = Error;

	async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
		let req_id = parts.extensions.get::<RequestId>().map(|r| r.0.clone());
		Ok(OptionalRequestId(req_id))
	}
}

// vim: ts=4
