//! OAuth client rows (authoritative in the relational store).

use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, sqlite::SqliteRow};

use crate::utils::*;
use warden_types::client::{ListClientsOptions, OAuthClient, UpdateClientData};
use warden_types::prelude::*;

const COLUMNS: &str = "id, tenant_id, name, client_secret_hash, previous_secret_hash,
	previous_secret_expires_at, rotated_at, grant_types, scopes, redirect_uris,
	metadata, enabled, created_at, updated_at";

pub(crate) async fn insert_client(db: &SqlitePool, client: &OAuthClient) -> WdResult<()> {
	sqlx::query(
		"INSERT INTO oauth_clients
		(id, tenant_id, name, client_secret_hash, previous_secret_hash,
		previous_secret_expires_at, rotated_at, grant_types, scopes, redirect_uris,
		metadata, enabled, created_at, updated_at)
		VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
	)
	.bind(client.id.as_ref())
	.bind(client.tenant_id.as_ref())
	.bind(client.name.as_ref())
	.bind(client.client_secret_hash.as_ref())
	.bind(client.previous_secret_hash.as_deref())
	.bind(client.previous_secret_expires_at.map(|t| t.0))
	.bind(client.rotated_at.map(|t| t.0))
	.bind(to_json_text(&client.grant_types)?)
	.bind(to_json_text(&client.scopes)?)
	.bind(to_json_text(&client.redirect_uris)?)
	.bind(to_json_text(&client.metadata)?)
	.bind(client.enabled)
	.bind(client.created_at.0)
	.bind(client.updated_at.0)
	.execute(db)
	.await
	.map_err(|err| map_insert_err(err, "client_name_conflict"))?;

	Ok(())
}

pub(crate) async fn read_client(
	db: &SqlitePool,
	client_id: &str,
	tenant_id: &str,
) -> WdResult<OAuthClient> {
	let res = sqlx::query(&format!(
		"SELECT {COLUMNS} FROM oauth_clients WHERE id = ?1 AND tenant_id = ?2"
	))
	.bind(client_id)
	.bind(tenant_id)
	.fetch_one(db)
	.await;

	map_res(res, "client_not_found", |row| row_to_client(&row))
}

pub(crate) async fn read_client_by_id(
	db: &SqlitePool,
	client_id: &str,
) -> WdResult<OAuthClient> {
	let res = sqlx::query(&format!("SELECT {COLUMNS} FROM oauth_clients WHERE id = ?1"))
		.bind(client_id)
		.fetch_one(db)
		.await;

	map_res(res, "client_not_found", |row| row_to_client(&row))
}

pub(crate) async fn read_client_by_name(
	db: &SqlitePool,
	tenant_id: &str,
	name: &str,
) -> WdResult<OAuthClient> {
	let res = sqlx::query(&format!(
		"SELECT {COLUMNS} FROM oauth_clients WHERE tenant_id = ?1 AND name = ?2"
	))
	.bind(tenant_id)
	.bind(name)
	.fetch_one(db)
	.await;

	map_res(res, "client_not_found", |row| row_to_client(&row))
}

/// Keyset pagination over `created_at DESC, id DESC`; fetches one row
/// beyond the limit so the caller can answer `has_more`. The cursor is
/// the decoded `"{created_at_ms}:{id}"` form.
pub(crate) async fn list_clients(
	db: &SqlitePool,
	tenant_id: &str,
	opts: &ListClientsOptions<'_>,
) -> WdResult<Vec<OAuthClient>> {
	let mut builder: QueryBuilder<Sqlite> =
		QueryBuilder::new(format!("SELECT {COLUMNS} FROM oauth_clients WHERE tenant_id = "));
	builder.push_bind(tenant_id);

	if let Some(enabled) = opts.enabled {
		builder.push(" AND enabled = ").push_bind(enabled);
	}
	if let Some(cursor) = opts.cursor {
		let Some((ts, id)) = cursor.split_once(':') else {
			return Err(Error::validation("invalid_request", "Malformed pagination cursor"));
		};
		let ts: i64 = ts
			.parse()
			.map_err(|_| Error::validation("invalid_request", "Malformed pagination cursor"))?;
		builder
			.push(" AND (created_at, id) < (")
			.push_bind(ts)
			.push(", ")
			.push_bind(id.to_owned())
			.push(")");
	}
	builder
		.push(" ORDER BY created_at DESC, id DESC LIMIT ")
		.push_bind(i64::from(opts.limit) + 1);

	let rows = builder
		.build()
		.fetch_all(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	collect_res(rows.iter().map(|row| row_to_client(row)))
}

pub(crate) async fn update_client(
	db: &SqlitePool,
	client_id: &str,
	tenant_id: &str,
	data: &UpdateClientData<'_>,
	now: Timestamp,
) -> WdResult<()> {
	let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE oauth_clients SET ");
	let first = std::sync::atomic::AtomicBool::new(true);
	let set = |builder: &mut QueryBuilder<Sqlite>, column: &str| {
		if !first.load(std::sync::atomic::Ordering::Relaxed) {
			builder.push(", ");
		}
		first.store(false, std::sync::atomic::Ordering::Relaxed);
		builder.push(column).push(" = ");
	};

	if let Some(name) = data.name {
		set(&mut builder, "name");
		builder.push_bind(name.to_owned());
	}
	if let Some(grant_types) = data.grant_types {
		set(&mut builder, "grant_types");
		builder.push_bind(to_json_text(&grant_types)?);
	}
	if let Some(scopes) = data.scopes {
		set(&mut builder, "scopes");
		builder.push_bind(to_json_text(&scopes)?);
	}
	if let Some(redirect_uris) = data.redirect_uris {
		set(&mut builder, "redirect_uris");
		builder.push_bind(to_json_text(&redirect_uris)?);
	}
	if let Some(ref metadata) = data.metadata {
		set(&mut builder, "metadata");
		builder.push_bind(to_json_text(metadata)?);
	}
	if let Some(enabled) = data.enabled {
		set(&mut builder, "enabled");
		builder.push_bind(enabled);
	}
	if first.load(std::sync::atomic::Ordering::Relaxed) {
		// Nothing to update
		return Ok(());
	}

	set(&mut builder, "updated_at");
	builder.push_bind(now.0);

	builder.push(" WHERE id = ").push_bind(client_id.to_owned());
	builder.push(" AND tenant_id = ").push_bind(tenant_id.to_owned());

	let result = builder
		.build()
		.execute(db)
		.await
		.map_err(|err| map_insert_err(err, "client_name_conflict"))?;

	if result.rows_affected() == 0 {
		return Err(Error::not_found("client_not_found"));
	}
	Ok(())
}

pub(crate) async fn update_client_secret(
	db: &SqlitePool,
	client_id: &str,
	tenant_id: &str,
	secret_hash: &str,
	previous_hash: Option<&str>,
	previous_expires_at: Option<Timestamp>,
	rotated_at: Option<Timestamp>,
	now: Timestamp,
) -> WdResult<()> {
	let result = sqlx::query(
		"UPDATE oauth_clients SET
		client_secret_hash = ?1,
		previous_secret_hash = ?2,
		previous_secret_expires_at = ?3,
		rotated_at = ?4,
		updated_at = ?5
		WHERE id = ?6 AND tenant_id = ?7",
	)
	.bind(secret_hash)
	.bind(previous_hash)
	.bind(previous_expires_at.map(|t| t.0))
	.bind(rotated_at.map(|t| t.0))
	.bind(now.0)
	.bind(client_id)
	.bind(tenant_id)
	.execute(db)
	.await
	.inspect_err(inspect)
	.or(Err(Error::DbError))?;

	if result.rows_affected() == 0 {
		return Err(Error::not_found("client_not_found"));
	}
	Ok(())
}

pub(crate) async fn delete_client(
	db: &SqlitePool,
	client_id: &str,
	tenant_id: &str,
) -> WdResult<()> {
	let result = sqlx::query("DELETE FROM oauth_clients WHERE id = ?1 AND tenant_id = ?2")
		.bind(client_id)
		.bind(tenant_id)
		.execute(db)
		.await
		.inspect_err(inspect)
		.or(Err(Error::DbError))?;

	if result.rows_affected() == 0 {
		return Err(Error::not_found("client_not_found"));
	}
	Ok(())
}

fn row_to_client(row: &SqliteRow) -> Result<OAuthClient, sqlx::Error> {
	Ok(OAuthClient {
		id: row.try_get::<String, _>("id")?.into_boxed_str(),
		tenant_id: row.try_get::<String, _>("tenant_id")?.into_boxed_str(),
		name: row.try_get::<String, _>("name")?.into_boxed_str(),
		client_secret_hash: row
			.try_get::<String, _>("client_secret_hash")?
			.into_boxed_str(),
		previous_secret_hash: row
			.try_get::<Option<String>, _>("previous_secret_hash")?
			.map(String::into_boxed_str),
		previous_secret_expires_at: row
			.try_get::<Option<i64>, _>("previous_secret_expires_at")?
			.map(Timestamp),
		rotated_at: row.try_get::<Option<i64>, _>("rotated_at")?.map(Timestamp),
		grant_types: from_json_text(row.try_get("grant_types")?),
		scopes: from_json_text(row.try_get("scopes")?),
		redirect_uris: from_json_text(row.try_get("redirect_uris")?),
		metadata: from_json_text(row.try_get("metadata")?),
		enabled: row.try_get("enabled")?,
		created_at: Timestamp(row.try_get("created_at")?),
		updated_at: Timestamp(row.try_get("updated_at")?),
	})
}

// vim: ts=4
