//! Tenants admin REST endpoints.

use axum::{
	Json,
	extract::{Path, Query, State},
	http::StatusCode,
};
use serde::Deserialize;

use crate::prelude::*;
use crate::tenant::registry::UpdateTenantData;
use warden_types::tenant::{
	CreateTenantData, ListTenantsOptions, Tenant, TenantBranding, TenantSettings, TenantStatus,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTenantRequest {
	pub id: String,
	pub name: String,
	pub domain: Option<String>,
	pub branding: Option<TenantBranding>,
	pub settings: Option<TenantSettings>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTenantRequest {
	pub name: Option<String>,
	#[serde(default)]
	pub domain: Patch<String>,
	pub status: Option<TenantStatus>,
	pub branding: Option<TenantBranding>,
	pub settings: Option<TenantSettings>,
}

#[derive(Debug, Deserialize)]
pub struct ListTenantsQuery {
	pub status: Option<String>,
	pub limit: Option<u32>,
	pub offset: Option<u32>,
}

pub async fn post_tenant(
	State(app): State<App>,
	Json(req): Json<CreateTenantRequest>,
) -> WdResult<(StatusCode, Json<Tenant>)> {
	let tenant = app
		.tenants
		.create(CreateTenantData {
			id: &req.id,
			name: &req.name,
			domain: req.domain.as_deref(),
			branding: req.branding,
			settings: req.settings,
		})
		.await?;

	Ok((StatusCode::CREATED, Json(tenant)))
}

pub async fn get_tenants(
	State(app): State<App>,
	Query(query): Query<ListTenantsQuery>,
) -> WdResult<Json<Vec<Tenant>>> {
	let status = match query.status.as_deref() {
		Some(s) => Some(
			TenantStatus::parse(s)
				.ok_or_else(|| Error::validation("invalid_request", "Unknown status filter"))?,
		),
		None => None,
	};

	let tenants = app
		.tenants
		.list(&ListTenantsOptions {
			status,
			limit: query.limit.unwrap_or(0),
			offset: query.offset.unwrap_or(0),
		})
		.await?;

	Ok(Json(tenants))
}

pub async fn get_tenant(
	State(app): State<App>,
	Path(id): Path<String>,
) -> WdResult<Json<Tenant>> {
	let tenant = app.tenants.get(&id).await?.ok_or(Error::not_found("tenant_not_found"))?;
	Ok(Json(tenant))
}

pub async fn put_tenant(
	State(app): State<App>,
	Path(id): Path<String>,
	Json(req): Json<UpdateTenantRequest>,
) -> WdResult<Json<Tenant>> {
	let tenant = app
		.tenants
		.update(
			&id,
			UpdateTenantData {
				name: req.name.as_deref(),
				domain: match &req.domain {
					Patch::Missing => Patch::Missing,
					Patch::Null => Patch::Null,
					Patch::Value(d) => Patch::Value(d.as_str()),
				},
				status: req.status,
				branding: req.branding,
				settings: req.settings,
			},
		)
		.await?;

	Ok(Json(tenant))
}

pub async fn delete_tenant(
	State(app): State<App>,
	Path(id): Path<String>,
) -> WdResult<StatusCode> {
	app.tenants.delete(&id).await?;
	Ok(StatusCode::NO_CONTENT)
}

pub async fn put_tenant_branding(
	State(app): State<App>,
	Path(id): Path<String>,
	Json(branding): Json<TenantBranding>,
) -> WdResult<Json<Tenant>> {
	let tenant = app
		.tenants
		.update(&id, UpdateTenantData { branding: Some(branding), ..Default::default() })
		.await?;
	Ok(Json(tenant))
}

pub async fn put_tenant_settings(
	State(app): State<App>,
	Path(id): Path<String>,
	Json(settings): Json<TenantSettings>,
) -> WdResult<Json<Tenant>> {
	let tenant = app
		.tenants
		.update(&id, UpdateTenantData { settings: Some(settings), ..Default::default() })
		.await?;
	Ok(Json(tenant))
}

// vim: ts=4
