//! Session REST endpoints.

use axum::{
	Json,
	extract::{Path, State},
	http::{HeaderMap, StatusCode},
};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::SessionModule;
use crate::cookie::cookie_value;
use crate::prelude::*;
use warden_types::session::{AccountSession, BrowserSession};

/// Public view of an account session; tokens and subject internals never
/// leave the server
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
	pub user_id: Box<str>,
	pub is_active: bool,
	pub authenticated_at: Timestamp,
	pub expires_at: Timestamp,
	pub subject_type: Box<str>,
}

impl From<AccountSession> for AccountView {
	fn from(account: AccountSession) -> Self {
		Self {
			user_id: account.user_id,
			is_active: account.is_active,
			authenticated_at: account.authenticated_at,
			expires_at: account.expires_at,
			subject_type: account.subject_type,
		}
	}
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
	pub session_id: Box<str>,
	pub tenant_id: Box<str>,
	pub active_user_id: Option<Box<str>>,
	pub account_user_ids: Vec<Box<str>>,
	pub version: u64,
}

impl From<BrowserSession> for SessionView {
	fn from(session: BrowserSession) -> Self {
		Self {
			session_id: session.id,
			tenant_id: session.tenant_id,
			active_user_id: session.active_user_id,
			account_user_ids: session.account_user_ids,
			version: session.version,
		}
	}
}

/// Resolve the caller's browser session from the session cookie.
/// A missing cookie, an undecryptable cookie, and a dead session are
/// deliberately indistinguishable.
async fn session_from_cookie(
	app: &App,
	headers: &HeaderMap,
) -> WdResult<Option<BrowserSession>> {
	let module = app.ext::<SessionModule>()?;
	let Some(raw) = cookie_value(headers, &module.cookie.name) else {
		return Ok(None);
	};
	let Some(payload) = module.crypto.decrypt(raw) else {
		return Ok(None);
	};
	module.store.get_browser_session(&payload.sid, &payload.tid).await
}

async fn require_session(app: &App, headers: &HeaderMap) -> WdResult<BrowserSession> {
	session_from_cookie(app, headers)
		.await?
		.ok_or(Error::unauthorized("missing_token"))
}

// GET /session/accounts //
//***********************//
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountsResponse {
	pub accounts: Vec<AccountView>,
	pub active_user_id: Option<Box<str>>,
}

pub async fn get_accounts(
	State(app): State<App>,
	headers: HeaderMap,
) -> WdResult<Json<AccountsResponse>> {
	let session = require_session(&app, &headers).await?;
	let module = app.ext::<SessionModule>()?;

	let accounts = module.store.list_account_sessions(&session.id).await?;
	Ok(Json(AccountsResponse {
		accounts: accounts.into_iter().map(AccountView::from).collect(),
		active_user_id: session.active_user_id,
	}))
}

// POST /session/switch //
//**********************//
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchRequest {
	pub user_id: String,
}

pub async fn post_switch(
	State(app): State<App>,
	headers: HeaderMap,
	Json(req): Json<SwitchRequest>,
) -> WdResult<Json<SessionView>> {
	let session = require_session(&app, &headers).await?;
	let module = app.ext::<SessionModule>()?;

	let session = module.store.switch_active_account(&session.id, &req.user_id).await?;
	Ok(Json(SessionView::from(session)))
}

// DELETE /session/accounts/{user_id} //
//************************************//
pub async fn delete_account(
	State(app): State<App>,
	headers: HeaderMap,
	Path(user_id): Path<String>,
) -> WdResult<Json<SessionView>> {
	let session = require_session(&app, &headers).await?;
	let module = app.ext::<SessionModule>()?;

	let session = module.store.remove_account(&session.id, &user_id).await?;
	Ok(Json(SessionView::from(session)))
}

// DELETE /session/all //
//*********************//
pub async fn delete_all_accounts(
	State(app): State<App>,
	headers: HeaderMap,
) -> WdResult<StatusCode> {
	let session = require_session(&app, &headers).await?;
	let module = app.ext::<SessionModule>()?;

	module.store.remove_all_accounts(&session.id).await?;
	Ok(StatusCode::NO_CONTENT)
}

// GET /session/check //
//********************//
/// CORS-permissive probe used by embedding applications
#[skip_serializing_none]
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
	pub active: bool,
	pub session_id: Option<Box<str>>,
	pub tenant_id: Option<Box<str>>,
	pub active_user_id: Option<Box<str>>,
	pub account_count: Option<u32>,
}

pub async fn get_check(
	State(app): State<App>,
	headers: HeaderMap,
) -> WdResult<Json<CheckResponse>> {
	match session_from_cookie(&app, &headers).await? {
		Some(session) => Ok(Json(CheckResponse {
			active: true,
			session_id: Some(session.id),
			tenant_id: Some(session.tenant_id),
			active_user_id: session.active_user_id,
			account_count: Some(session.account_user_ids.len() as u32),
		})),
		None => Ok(Json(CheckResponse {
			active: false,
			session_id: None,
			tenant_id: None,
			active_user_id: None,
			account_count: None,
		})),
	}
}

// Admin //
//*******//
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeUserRequest {
	pub tenant_id: String,
	pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct RevokeUserResponse {
	pub revoked: u32,
}

pub async fn post_revoke_user(
	State(app): State<App>,
	Json(req): Json<RevokeUserRequest>,
) -> WdResult<Json<RevokeUserResponse>> {
	let module = app.ext::<SessionModule>()?;
	let revoked = module.store.revoke_user_sessions(&req.tenant_id, &req.user_id).await?;
	Ok(Json(RevokeUserResponse { revoked }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsQuery {
	pub tenant_id: String,
	pub user_id: Option<String>,
	pub limit: Option<u32>,
	pub offset: Option<u32>,
}

/// Admin listing backed by the relational mirror
pub async fn get_admin_sessions(
	State(app): State<App>,
	axum::extract::Query(query): axum::extract::Query<ListSessionsQuery>,
) -> WdResult<Json<Vec<SessionView>>> {
	let module = app.ext::<SessionModule>()?;
	let sessions = match query.user_id {
		Some(ref user_id) => {
			module.store.admin_list_by_user(&query.tenant_id, user_id).await?
		}
		None => {
			module
				.store
				.admin_list_by_tenant(
					&query.tenant_id,
					&warden_types::store_adapter::ListSessionsOptions {
						limit: query.limit.unwrap_or(0),
						offset: query.offset.unwrap_or(0),
					},
				)
				.await?
		}
	};
	Ok(Json(sessions.into_iter().map(SessionView::from).collect()))
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
	pub removed: u32,
}

/// Drop mirror rows whose hard lifetime has ended
pub async fn post_admin_cleanup(State(app): State<App>) -> WdResult<Json<CleanupResponse>> {
	let module = app.ext::<SessionModule>()?;
	let removed = module.store.admin_cleanup_expired().await?;
	Ok(Json(CleanupResponse { removed }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeSessionRequest {
	pub session_id: String,
	pub tenant_id: String,
}

#[derive(Debug, Serialize)]
pub struct RevokeSessionResponse {
	pub revoked: bool,
}

pub async fn post_revoke_session(
	State(app): State<App>,
	Json(req): Json<RevokeSessionRequest>,
) -> WdResult<Json<RevokeSessionResponse>> {
	let module = app.ext::<SessionModule>()?;
	let revoked =
		module.store.revoke_specific_session(&req.session_id, &req.tenant_id).await?;
	Ok(Json(RevokeSessionResponse { revoked }))
}

// vim: ts=4
