//! Session mirror rows (dual-write target; admin queries only).

use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::utils::*;
use warden_types::prelude::*;
use warden_types::session::{AccountSession, BrowserSession};
use warden_types::store_adapter::ListSessionsOptions;

pub(crate) async fn upsert_browser_session(
	db: &SqlitePool,
	session: &BrowserSession,
) -> WdResult<()> {
	sqlx::query(
		"INSERT OR REPLACE INTO browser_sessions
		(id, tenant_id, created_at, last_activity, user_agent, ip_address,
		version, active_user_id, account_user_ids)
		VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
	)
	.bind(session.id.as_ref())
	.bind(session.tenant_id.as_ref())
	.bind(session.created_at.0)
	.bind(session.last_activity.0)
	.bind(session.user_agent.as_deref())
	.bind(session.ip_address.as_deref())
	.bind(session.version as i64)
	.bind(session.active_user_id.as_deref())
	.bind(to_json_text(&session.account_user_ids)?)
	.execute(db)
	.await
	.inspect_err(inspect)
	.or(Err(Error::DbError))?;

	Ok(())
}

pub(crate) async fn upsert_account_session(
	db: &SqlitePool,
	session: &AccountSession,
) -> WdResult<()> {
	sqlx::query(
		"INSERT OR REPLACE INTO account_sessions
		(id, browser_session_id, user_id, is_active, authenticated_at, expires_at,
		subject_type, subject_properties, refresh_token, client_id)
		VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
	)
	.bind(session.id.as_ref())
	.bind(session.browser_session_id.as_ref())
	.bind(session.user_id.as_ref())
	.bind(session.is_active)
	.bind(session.authenticated_at.0)
	.bind(session.expires_at.0)
	.bind(session.subject_type.as_ref())
	.bind(to_json_text(&session.subject_properties)?)
	.bind(session.refresh_token.as_deref())
	.bind(session.client_id.as_deref())
	.execute(db)
	.await
	.inspect_err(inspect)
	.or(Err(Error::DbError))?;

	Ok(())
}

pub(crate) async fn delete_browser_session(db: &SqlitePool, session_id: &str) -> WdResult<()> {
	let mut tx = db.begin().await.inspect_err(inspect).or(Err(Error::DbError))?;

	sqlx::query("DELETE FROM account_sessions WHERE browser_session_id = ?1")
		.bind(session_id)
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.or(Err(Error::DbError))?;
	sqlx::query("DELETE FROM browser_sessions WHERE id = ?1")
		.bind(session_id)
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.or(Err(Error::DbError))?;

	tx.commit().await.inspect_err(inspect).or(Err(Error::DbError))?;
	Ok(())
}

pub(crate) async fn delete_account_session(
	db: &SqlitePool,
	browser_session_id: &str,
	user_id: &str,
) -> WdResult<()> {
	sqlx::query(
		"DELETE FROM account_sessions WHERE browser_session_id = ?1 AND user_id = ?2",
	)
	.bind(browser_session_id)
	.bind(user_id)
	.execute(db)
	.await
	.inspect_err(inspect)
	.or(Err(Error::DbError))?;

	Ok(())
}

pub(crate) async fn list_sessions_by_user(
	db: &SqlitePool,
	tenant_id: &str,
	user_id: &str,
) -> WdResult<Vec<BrowserSession>> {
	let rows = sqlx::query(
		"SELECT DISTINCT bs.id, bs.tenant_id, bs.created_at, bs.last_activity,
			bs.user_agent, bs.ip_address, bs.version, bs.active_user_id, bs.account_user_ids
		FROM browser_sessions bs
		JOIN account_sessions acc ON acc.browser_session_id = bs.id
		WHERE bs.tenant_id = ?1 AND acc.user_id = ?2
		ORDER BY bs.last_activity DESC",
	)
	.bind(tenant_id)
	.bind(user_id)
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	collect_res(rows.iter().map(|row| row_to_browser_session(row)))
}

pub(crate) async fn list_sessions_by_tenant(
	db: &SqlitePool,
	tenant_id: &str,
	opts: &ListSessionsOptions,
) -> WdResult<Vec<BrowserSession>> {
	let limit = if opts.limit == 0 { 100 } else { opts.limit };
	let rows = sqlx::query(
		"SELECT id, tenant_id, created_at, last_activity, user_agent, ip_address,
			version, active_user_id, account_user_ids
		FROM browser_sessions WHERE tenant_id = ?1
		ORDER BY last_activity DESC LIMIT ?2 OFFSET ?3",
	)
	.bind(tenant_id)
	.bind(i64::from(limit))
	.bind(i64::from(opts.offset))
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	collect_res(rows.iter().map(|row| row_to_browser_session(row)))
}

pub(crate) async fn cleanup_expired_sessions(
	db: &SqlitePool,
	created_before: Timestamp,
) -> WdResult<u32> {
	let mut tx = db.begin().await.inspect_err(inspect).or(Err(Error::DbError))?;

	sqlx::query(
		"DELETE FROM account_sessions WHERE browser_session_id IN
		(SELECT id FROM browser_sessions WHERE created_at < ?1)",
	)
	.bind(created_before.0)
	.execute(&mut *tx)
	.await
	.inspect_err(inspect)
	.or(Err(Error::DbError))?;

	let result = sqlx::query("DELETE FROM browser_sessions WHERE created_at < ?1")
		.bind(created_before.0)
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.or(Err(Error::DbError))?;

	tx.commit().await.inspect_err(inspect).or(Err(Error::DbError))?;
	Ok(result.rows_affected() as u32)
}

fn row_to_browser_session(row: &SqliteRow) -> Result<BrowserSession, sqlx::Error> {
	Ok(BrowserSession {
		id: row.try_get::<String, _>("id")?.into_boxed_str(),
		tenant_id: row.try_get::<String, _>("tenant_id")?.into_boxed_str(),
		created_at: Timestamp(row.try_get("created_at")?),
		last_activity: Timestamp(row.try_get("last_activity")?),
		user_agent: row
			.try_get::<Option<String>, _>("user_agent")?
			.map(String::into_boxed_str),
		ip_address: row
			.try_get::<Option<String>, _>("ip_address")?
			.map(String::into_boxed_str),
		version: row.try_get::<i64, _>("version")? as u64,
		active_user_id: row
			.try_get::<Option<String>, _>("active_user_id")?
			.map(String::into_boxed_str),
		account_user_ids: from_json_text(row.try_get("account_user_ids")?),
	})
}

// vim: ts=4
