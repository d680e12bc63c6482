//! Tenant mirror operations.

use sqlx::{Row, SqlitePool};

use crate::utils::*;
use warden_types::prelude::*;
use warden_types::tenant::{ListTenantsOptions, Tenant, TenantStatus};

pub(crate) async fn upsert_tenant(db: &SqlitePool, tenant: &Tenant) -> WdResult<()> {
	sqlx::query(
		"INSERT OR REPLACE INTO tenants
		(id, name, domain, status, branding, settings, created_at, updated_at)
		VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
	)
	.bind(tenant.id.as_ref())
	.bind(tenant.name.as_ref())
	.bind(tenant.domain.as_deref())
	.bind(tenant.status.as_str())
	.bind(to_json_text(&tenant.branding)?)
	.bind(to_json_text(&tenant.settings)?)
	.bind(tenant.created_at.0)
	.bind(tenant.updated_at.0)
	.execute(db)
	.await
	.inspect_err(inspect)
	.or(Err(Error::DbError))?;

	Ok(())
}

pub(crate) async fn list_tenants(
	db: &SqlitePool,
	opts: &ListTenantsOptions,
) -> WdResult<Vec<Tenant>> {
	let limit = opts.limit_or_default();

	let rows = match opts.status {
		Some(status) => {
			sqlx::query(
				"SELECT id, name, domain, status, branding, settings, created_at, updated_at
				FROM tenants WHERE status = ?1 ORDER BY id LIMIT ?2 OFFSET ?3",
			)
			.bind(status.as_str())
			.bind(i64::from(limit))
			.bind(i64::from(opts.offset))
			.fetch_all(db)
			.await
		}
		None => {
			sqlx::query(
				"SELECT id, name, domain, status, branding, settings, created_at, updated_at
				FROM tenants ORDER BY id LIMIT ?1 OFFSET ?2",
			)
			.bind(i64::from(limit))
			.bind(i64::from(opts.offset))
			.fetch_all(db)
			.await
		}
	}
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	collect_res(rows.iter().map(row_to_tenant))
}

fn row_to_tenant(row: &sqlx::sqlite::SqliteRow) -> Result<Tenant, sqlx::Error> {
	let status: String = row.try_get("status")?;
	Ok(Tenant {
		id: row.try_get::<String, _>("id")?.into_boxed_str(),
		name: row.try_get::<String, _>("name")?.into_boxed_str(),
		domain: row.try_get::<Option<String>, _>("domain")?.map(String::into_boxed_str),
		status: TenantStatus::parse(&status).unwrap_or(TenantStatus::Suspended),
		branding: from_json_text(row.try_get("branding")?),
		settings: from_json_text(row.try_get("settings")?),
		created_at: Timestamp(row.try_get("created_at")?),
		updated_at: Timestamp(row.try_get("updated_at")?),
	})
}

// vim: ts=4
