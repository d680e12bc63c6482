//! OIDC discovery, JWKS, and userinfo endpoints.

use axum::{Json, extract::State};
use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::OidcModule;
use crate::prelude::*;
use warden_core::extract::Auth;
use warden_keys::KeyRole;
use warden_keys::jwk::{JwkSet, jwk_set};

// GET /.well-known/jwks.json //
//****************************//
/// Public signing keys, current family and the retired one, so old
/// signatures keep verifying
pub async fn get_jwks(State(app): State<App>) -> WdResult<Json<JwkSet>> {
	let oidc = app.ext::<OidcModule>()?;

	let mut records = oidc.keys.get_keys(KeyRole::Signing).await?;
	records.extend(oidc.keys.load_legacy_signing_keys().await?);

	Ok(Json(jwk_set(&records)))
}

// GET /.well-known/openid-configuration //
//***************************************//
#[skip_serializing_none]
#[derive(Debug, Serialize)]
pub struct DiscoveryDocument {
	pub issuer: Box<str>,
	pub authorization_endpoint: Box<str>,
	pub token_endpoint: Box<str>,
	pub userinfo_endpoint: Box<str>,
	pub jwks_uri: Box<str>,
	pub response_types_supported: Vec<Box<str>>,
	pub subject_types_supported: Vec<Box<str>>,
	pub id_token_signing_alg_values_supported: Vec<Box<str>>,
	pub grant_types_supported: Vec<Box<str>>,
	pub token_endpoint_auth_methods_supported: Vec<Box<str>>,
}

pub async fn get_discovery(State(app): State<App>) -> WdResult<Json<DiscoveryDocument>> {
	let oidc = app.ext::<OidcModule>()?;
	let issuer = oidc.issuer.issuer_url();

	Ok(Json(DiscoveryDocument {
		issuer: Box::from(issuer),
		authorization_endpoint: format!("{issuer}/authorize").into_boxed_str(),
		token_endpoint: format!("{issuer}/token").into_boxed_str(),
		userinfo_endpoint: format!("{issuer}/userinfo").into_boxed_str(),
		jwks_uri: format!("{issuer}/.well-known/jwks.json").into_boxed_str(),
		response_types_supported: vec!["code".into()],
		subject_types_supported: vec!["public".into()],
		id_token_signing_alg_values_supported: vec!["ES256".into(), "ES384".into()],
		grant_types_supported: vec![
			"authorization_code".into(),
			"refresh_token".into(),
			"client_credentials".into(),
		],
		token_endpoint_auth_methods_supported: vec!["client_secret_post".into()],
	}))
}

// GET /userinfo //
//***************//
#[skip_serializing_none]
#[derive(Debug, Serialize)]
pub struct UserInfo {
	pub sub: Box<str>,
	pub tenant_id: Box<str>,
	pub roles: Option<Vec<Box<str>>>,
	pub scope: Option<Box<str>>,
}

pub async fn get_userinfo(Auth(auth): Auth) -> WdResult<Json<UserInfo>> {
	Ok(Json(UserInfo {
		sub: auth.user_id,
		tenant_id: auth.tenant_id,
		roles: if auth.roles.is_empty() { None } else { Some(auth.roles.into_vec()) },
		scope: auth.scope,
	}))
}

// vim: ts=4
