//! Token endpoint.
//!
//! Browser logins go through provider callbacks and the success hook;
//! this endpoint serves confidential clients exchanging credentials for
//! an m2m access token.

use axum::{Form, Json, extract::State};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use warden_clients::ClientRegistry;
use warden_oidc::OidcModule;
use warden_oidc::hook::issue_client_token;

use crate::prelude::*;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
	pub grant_type: String,
	pub client_id: String,
	pub client_secret: String,
	pub scope: Option<String>,
}

#[skip_serializing_none]
#[derive(Debug, Serialize)]
pub struct TokenResponse {
	pub access_token: Box<str>,
	pub token_type: &'static str,
	pub expires_in: i64,
	pub scope: Option<String>,
}

pub async fn post_token(
	State(app): State<App>,
	Form(req): Form<TokenRequest>,
) -> WdResult<Json<TokenResponse>> {
	if req.grant_type != "client_credentials" {
		return Err(Error::validation(
			"invalid_request",
			format!("Unsupported grant type: {}", req.grant_type),
		));
	}

	let clients = app.ext::<ClientRegistry>()?;
	let client = clients
		.verify_credentials(&req.client_id, &req.client_secret)
		.await?
		.ok_or(Error::unauthorized("invalid_client"))?;

	let tenant = app
		.tenants
		.get(&client.tenant_id)
		.await?
		.ok_or(Error::not_found("tenant_not_found"))?;

	// Requested scope must be a subset of what the client registered
	if let Some(ref scope) = req.scope {
		for wanted in scope.split_whitespace() {
			if !client.scopes.iter().any(|s| s.as_ref() == wanted) {
				return Err(Error::validation(
					"invalid_scope_format",
					format!("Scope not granted to this client: {wanted}"),
				));
			}
		}
	}

	let oidc = app.ext::<OidcModule>()?;
	let token =
		issue_client_token(&app, &tenant, &client, req.scope.as_deref(), &oidc.config).await?;

	Ok(Json(TokenResponse {
		access_token: token,
		token_type: "Bearer",
		expires_in: oidc.config.access_token_ttl_seconds,
		scope: req.scope,
	}))
}

// vim: ts=4
