//! API routes

use axum::{
	Json,
	extract::State,
	middleware,
	routing::{delete, get, post, put},
	Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use warden_core::tenant::handler as tenants;
use warden_oidc::handler as oidc;
use warden_rbac::handler as rbac;
use warden_session::handler as session;

use crate::middleware::{optional_auth, request_id_middleware, resolve_tenant};
use crate::prelude::*;

#[derive(Debug, Serialize)]
struct Health {
	status: &'static str,
	version: &'static str,
}

async fn get_health(State(_app): State<App>) -> Json<Health> {
	Json(Health { status: "ok", version: warden_core::app::VERSION })
}

pub fn build_router(app: App) -> Router {
	// Session check is CORS-permissive so embedding applications can
	// probe login state
	let session_check = Router::new()
		.route("/session/check", get(session::get_check))
		.layer(CorsLayer::permissive());

	let session_router = Router::new()
		.route("/session/accounts", get(session::get_accounts))
		.route("/session/switch", post(session::post_switch))
		.route("/session/accounts/{user_id}", delete(session::delete_account))
		.route("/session/all", delete(session::delete_all_accounts));

	let rbac_router = Router::new()
		.route("/rbac/check", post(rbac::post_check))
		.route("/rbac/check/batch", post(rbac::post_check_batch))
		.route("/rbac/permissions", get(rbac::get_permissions))
		.route("/rbac/roles", get(rbac::get_roles));

	let rbac_admin_router = Router::new()
		.route("/admin/rbac/roles", post(rbac::post_role).get(rbac::get_admin_roles))
		.route(
			"/admin/rbac/roles/{id}",
			get(rbac::get_admin_role)
				.patch(rbac::patch_admin_role)
				.delete(rbac::delete_admin_role),
		)
		.route(
			"/admin/rbac/roles/{id}/permissions",
			post(rbac::post_role_permission)
				.get(rbac::get_role_permissions)
				.delete(rbac::delete_role_permission),
		)
		.route(
			"/admin/rbac/clients/{client_id}/permissions",
			post(rbac::post_client_permission)
				.get(rbac::get_client_permissions)
				.delete(rbac::delete_client_permission),
		)
		.route(
			"/admin/rbac/users/{user_id}/roles",
			post(rbac::post_user_role)
				.get(rbac::get_user_roles)
				.delete(rbac::delete_user_role),
		);

	let tenants_router = Router::new()
		.route("/tenants", post(tenants::post_tenant).get(tenants::get_tenants))
		.route(
			"/tenants/{id}",
			get(tenants::get_tenant)
				.put(tenants::put_tenant)
				.delete(tenants::delete_tenant),
		)
		.route("/tenants/{id}/branding", put(tenants::put_tenant_branding))
		.route("/tenants/{id}/settings", put(tenants::put_tenant_settings));

	let sessions_admin_router = Router::new()
		.route("/admin/sessions", get(session::get_admin_sessions))
		.route("/admin/sessions/cleanup", post(session::post_admin_cleanup))
		.route("/admin/sessions/revoke-user", post(session::post_revoke_user))
		.route("/admin/sessions/revoke", post(session::post_revoke_session));

	let well_known_router = Router::new()
		.route("/.well-known/jwks.json", get(oidc::get_jwks))
		.route("/.well-known/openid-configuration", get(oidc::get_discovery))
		.route("/userinfo", get(oidc::get_userinfo))
		.route("/token", post(crate::token::post_token));

	Router::new()
		.route("/health", get(get_health))
		.merge(session_check)
		.merge(session_router)
		.merge(rbac_router)
		.merge(rbac_admin_router)
		.merge(tenants_router)
		.merge(sessions_admin_router)
		.merge(well_known_router)
		.layer(middleware::from_fn_with_state(app.clone(), resolve_tenant))
		.layer(middleware::from_fn_with_state(app.clone(), optional_auth))
		.layer(middleware::from_fn(request_id_middleware))
		.with_state(app)
}

// vim: ts=4
