//! RBAC REST endpoints: authenticated checks and the admin surface.

use axum::{
	Json,
	extract::{Path, Query, State},
	http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::RbacModule;
use crate::engine::PermissionQuery;
use crate::prelude::*;
use warden_core::extract::{Auth, ResolvedTenant};
use warden_types::rbac::{Permission, Role, UserRole};

const MAX_BATCH: usize = 100;

// POST /rbac/check //
//******************//
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
	pub client_id: String,
	pub permission: String,
	/// Defaults to the authenticated user
	pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
	pub allowed: bool,
}

pub async fn post_check(
	State(app): State<App>,
	Auth(auth): Auth,
	Json(req): Json<CheckRequest>,
) -> WdResult<Json<CheckResponse>> {
	let rbac = app.ext::<RbacModule>()?;
	let user_id = req.user_id.as_deref().unwrap_or(&auth.user_id);

	let allowed = rbac
		.engine
		.check_permission(&PermissionQuery {
			user_id,
			client_id: &req.client_id,
			tenant_id: &auth.tenant_id,
			permission: &req.permission,
		})
		.await?;
	Ok(Json(CheckResponse { allowed }))
}

// POST /rbac/check/batch //
//************************//
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchCheckRequest {
	pub client_id: String,
	pub permissions: Vec<String>,
	pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchCheckResponse {
	pub results: HashMap<Box<str>, bool>,
}

pub async fn post_check_batch(
	State(app): State<App>,
	Auth(auth): Auth,
	Json(req): Json<BatchCheckRequest>,
) -> WdResult<Json<BatchCheckResponse>> {
	if req.permissions.len() > MAX_BATCH {
		return Err(Error::validation(
			"invalid_request",
			format!("At most {MAX_BATCH} permissions per batch"),
		));
	}

	let rbac = app.ext::<RbacModule>()?;
	let user_id = req.user_id.as_deref().unwrap_or(&auth.user_id);
	let wanted: Vec<&str> = req.permissions.iter().map(String::as_str).collect();

	let results = rbac
		.engine
		.check_permissions(&auth.tenant_id, user_id, &req.client_id, &wanted)
		.await?;
	Ok(Json(BatchCheckResponse { results }))
}

// GET /rbac/permissions?clientId= //
//*********************************//
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionsQuery {
	pub client_id: String,
}

#[derive(Debug, Serialize)]
pub struct PermissionsResponse {
	pub permissions: Vec<Box<str>>,
}

pub async fn get_permissions(
	State(app): State<App>,
	Auth(auth): Auth,
	Query(query): Query<PermissionsQuery>,
) -> WdResult<Json<PermissionsResponse>> {
	let rbac = app.ext::<RbacModule>()?;
	let permissions = rbac
		.engine
		.get_user_permissions(&auth.tenant_id, &auth.user_id, &query.client_id)
		.await?;
	Ok(Json(PermissionsResponse { permissions }))
}

// GET /rbac/roles //
//*****************//
pub async fn get_roles(State(app): State<App>, Auth(auth): Auth) -> WdResult<Json<Vec<Role>>> {
	let rbac = app.ext::<RbacModule>()?;
	let roles = rbac.engine.get_user_roles(&auth.tenant_id, &auth.user_id).await?;
	Ok(Json(roles))
}

// Admin: roles //
//**************//
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
	pub name: String,
	pub description: Option<String>,
}

pub async fn post_role(
	State(app): State<App>,
	ResolvedTenant(tenant): ResolvedTenant,
	Json(req): Json<CreateRoleRequest>,
) -> WdResult<(StatusCode, Json<Role>)> {
	let rbac = app.ext::<RbacModule>()?;
	let role =
		rbac.engine.create_role(&tenant.id, &req.name, req.description.as_deref()).await?;
	Ok((StatusCode::CREATED, Json(role)))
}

pub async fn get_admin_roles(
	State(app): State<App>,
	ResolvedTenant(tenant): ResolvedTenant,
) -> WdResult<Json<Vec<Role>>> {
	let rbac = app.ext::<RbacModule>()?;
	Ok(Json(rbac.engine.list_roles(&tenant.id).await?))
}

pub async fn get_admin_role(
	State(app): State<App>,
	ResolvedTenant(tenant): ResolvedTenant,
	Path(role_id): Path<String>,
) -> WdResult<Json<Role>> {
	let rbac = app.ext::<RbacModule>()?;
	Ok(Json(rbac.engine.get_role(&role_id, &tenant.id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleRequest {
	pub name: Option<String>,
	pub description: Option<String>,
}

pub async fn patch_admin_role(
	State(app): State<App>,
	ResolvedTenant(tenant): ResolvedTenant,
	Path(role_id): Path<String>,
	Json(req): Json<UpdateRoleRequest>,
) -> WdResult<Json<Role>> {
	let rbac = app.ext::<RbacModule>()?;
	let role = rbac
		.engine
		.update_role(&role_id, &tenant.id, req.name.as_deref(), req.description.as_deref())
		.await?;
	Ok(Json(role))
}

pub async fn delete_admin_role(
	State(app): State<App>,
	ResolvedTenant(tenant): ResolvedTenant,
	Path(role_id): Path<String>,
) -> WdResult<StatusCode> {
	let rbac = app.ext::<RbacModule>()?;
	rbac.engine.delete_role(&role_id, &tenant.id).await?;
	Ok(StatusCode::NO_CONTENT)
}

// Admin: role permissions //
//*************************//
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolePermissionRequest {
	pub permission_id: String,
}

pub async fn post_role_permission(
	State(app): State<App>,
	Path(role_id): Path<String>,
	Json(req): Json<RolePermissionRequest>,
) -> WdResult<StatusCode> {
	let rbac = app.ext::<RbacModule>()?;
	rbac.engine.assign_permission_to_role(&role_id, &req.permission_id).await?;
	Ok(StatusCode::CREATED)
}

pub async fn get_role_permissions(
	State(app): State<App>,
	Path(role_id): Path<String>,
) -> WdResult<Json<Vec<Permission>>> {
	let rbac = app.ext::<RbacModule>()?;
	Ok(Json(rbac.engine.list_role_permissions(&role_id).await?))
}

pub async fn delete_role_permission(
	State(app): State<App>,
	Path(role_id): Path<String>,
	Json(req): Json<RolePermissionRequest>,
) -> WdResult<StatusCode> {
	let rbac = app.ext::<RbacModule>()?;
	rbac.engine.remove_permission_from_role(&role_id, &req.permission_id).await?;
	Ok(StatusCode::NO_CONTENT)
}

// Admin: client permissions //
//***************************//
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermissionRequest {
	pub name: String,
	pub description: Option<String>,
}

pub async fn post_client_permission(
	State(app): State<App>,
	Path(client_id): Path<String>,
	Json(req): Json<CreatePermissionRequest>,
) -> WdResult<(StatusCode, Json<Permission>)> {
	let rbac = app.ext::<RbacModule>()?;
	let permission = rbac
		.engine
		.create_permission(&client_id, &req.name, req.description.as_deref())
		.await?;
	Ok((StatusCode::CREATED, Json(permission)))
}

pub async fn get_client_permissions(
	State(app): State<App>,
	Path(client_id): Path<String>,
) -> WdResult<Json<Vec<Permission>>> {
	let rbac = app.ext::<RbacModule>()?;
	Ok(Json(rbac.engine.list_permissions(&client_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePermissionRequest {
	pub permission_id: String,
}

pub async fn delete_client_permission(
	State(app): State<App>,
	Path(_client_id): Path<String>,
	Json(req): Json<DeletePermissionRequest>,
) -> WdResult<StatusCode> {
	let rbac = app.ext::<RbacModule>()?;
	rbac.engine.delete_permission(&req.permission_id).await?;
	Ok(StatusCode::NO_CONTENT)
}

// Admin: user roles //
//*******************//
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
	pub role_id: String,
	pub expires_at: Option<Timestamp>,
}

pub async fn post_user_role(
	State(app): State<App>,
	ResolvedTenant(tenant): ResolvedTenant,
	Path(user_id): Path<String>,
	Json(req): Json<AssignRoleRequest>,
) -> WdResult<(StatusCode, Json<UserRole>)> {
	let rbac = app.ext::<RbacModule>()?;
	let assignment = rbac
		.engine
		.assign_role_to_user(&user_id, &req.role_id, &tenant.id, req.expires_at)
		.await?;
	Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn get_user_roles(
	State(app): State<App>,
	ResolvedTenant(tenant): ResolvedTenant,
	Path(user_id): Path<String>,
) -> WdResult<Json<Vec<Role>>> {
	let rbac = app.ext::<RbacModule>()?;
	Ok(Json(rbac.engine.get_user_roles(&tenant.id, &user_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveRoleRequest {
	pub role_id: String,
}

pub async fn delete_user_role(
	State(app): State<App>,
	ResolvedTenant(tenant): ResolvedTenant,
	Path(user_id): Path<String>,
	Json(req): Json<RemoveRoleRequest>,
) -> WdResult<StatusCode> {
	let rbac = app.ext::<RbacModule>()?;
	rbac.engine.remove_role_from_user(&user_id, &req.role_id, &tenant.id).await?;
	Ok(StatusCode::NO_CONTENT)
}

// vim: ts=4
