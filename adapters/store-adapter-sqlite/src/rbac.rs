//! Roles, permissions, and assignment rows (authoritative in the
//! relational store).

use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use crate::utils::*;
use warden_types::prelude::*;
use warden_types::rbac::{Permission, Role, UserRole};
use warden_types::store_adapter::{CreatePermissionData, CreateRoleData};

// Roles //
//*******//

pub(crate) async fn create_role(
	db: &SqlitePool,
	data: &CreateRoleData<'_>,
	now: Timestamp,
) -> WdResult<Role> {
	let id = uuid::Uuid::new_v4().to_string();

	sqlx::query(
		"INSERT INTO roles (id, tenant_id, name, description, is_system_role, created_at, updated_at)
		VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
	)
	.bind(&id)
	.bind(data.tenant_id)
	.bind(data.name)
	.bind(data.description)
	.bind(data.is_system_role)
	.bind(now.0)
	.bind(now.0)
	.execute(db)
	.await
	.map_err(|err| map_insert_err(err, "role_name_conflict"))?;

	read_role(db, &id, data.tenant_id).await
}

pub(crate) async fn read_role(
	db: &SqlitePool,
	role_id: &str,
	tenant_id: &str,
) -> WdResult<Role> {
	let res = sqlx::query(
		"SELECT id, tenant_id, name, description, is_system_role, created_at, updated_at
		FROM roles WHERE id = ?1 AND tenant_id = ?2",
	)
	.bind(role_id)
	.bind(tenant_id)
	.fetch_one(db)
	.await;

	map_res(res, "role_not_found", |row| row_to_role(&row))
}

pub(crate) async fn list_roles(db: &SqlitePool, tenant_id: &str) -> WdResult<Vec<Role>> {
	let rows = sqlx::query(
		"SELECT id, tenant_id, name, description, is_system_role, created_at, updated_at
		FROM roles WHERE tenant_id = ?1 ORDER BY name",
	)
	.bind(tenant_id)
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	collect_res(rows.iter().map(|row| row_to_role(row)))
}

pub(crate) async fn update_role(
	db: &SqlitePool,
	role_id: &str,
	tenant_id: &str,
	name: Option<&str>,
	description: Option<&str>,
	now: Timestamp,
) -> WdResult<Role> {
	let result = sqlx::query(
		"UPDATE roles SET
		name = COALESCE(?1, name),
		description = COALESCE(?2, description),
		updated_at = ?3
		WHERE id = ?4 AND tenant_id = ?5",
	)
	.bind(name)
	.bind(description)
	.bind(now.0)
	.bind(role_id)
	.bind(tenant_id)
	.execute(db)
	.await
	.map_err(|err| map_insert_err(err, "role_name_conflict"))?;

	if result.rows_affected() == 0 {
		return Err(Error::not_found("role_not_found"));
	}
	read_role(db, role_id, tenant_id).await
}

/// Deletes the role together with its assignment rows
pub(crate) async fn delete_role(
	db: &SqlitePool,
	role_id: &str,
	tenant_id: &str,
) -> WdResult<()> {
	let mut tx = db.begin().await.inspect_err(inspect).or(Err(Error::DbError))?;

	let result = sqlx::query("DELETE FROM roles WHERE id = ?1 AND tenant_id = ?2")
		.bind(role_id)
		.bind(tenant_id)
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.or(Err(Error::DbError))?;
	if result.rows_affected() == 0 {
		return Err(Error::not_found("role_not_found"));
	}

	sqlx::query("DELETE FROM role_permissions WHERE role_id = ?1")
		.bind(role_id)
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.or(Err(Error::DbError))?;
	sqlx::query("DELETE FROM user_roles WHERE role_id = ?1")
		.bind(role_id)
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.or(Err(Error::DbError))?;

	tx.commit().await.inspect_err(inspect).or(Err(Error::DbError))?;
	info!(role = role_id, "Role deleted");
	Ok(())
}

// Permissions //
//*************//

pub(crate) async fn create_permission(
	db: &SqlitePool,
	data: &CreatePermissionData<'_>,
	now: Timestamp,
) -> WdResult<Permission> {
	let id = uuid::Uuid::new_v4().to_string();

	sqlx::query(
		"INSERT INTO permissions (id, client_id, name, description, created_at)
		VALUES (?1, ?2, ?3, ?4, ?5)",
	)
	.bind(&id)
	.bind(data.client_id)
	.bind(data.name)
	.bind(data.description)
	.bind(now.0)
	.execute(db)
	.await
	.map_err(|err| map_insert_err(err, "permission_name_conflict"))?;

	read_permission(db, &id).await
}

pub(crate) async fn read_permission(db: &SqlitePool, permission_id: &str) -> WdResult<Permission> {
	let res = sqlx::query(
		"SELECT id, client_id, name, description, created_at FROM permissions WHERE id = ?1",
	)
	.bind(permission_id)
	.fetch_one(db)
	.await;

	map_res(res, "permission_not_found", |row| row_to_permission(&row))
}

pub(crate) async fn list_permissions(
	db: &SqlitePool,
	client_id: &str,
) -> WdResult<Vec<Permission>> {
	let rows = sqlx::query(
		"SELECT id, client_id, name, description, created_at
		FROM permissions WHERE client_id = ?1 ORDER BY name",
	)
	.bind(client_id)
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	collect_res(rows.iter().map(|row| row_to_permission(row)))
}

/// Role-permission rows cascade here, at the storage layer
pub(crate) async fn delete_permission(db: &SqlitePool, permission_id: &str) -> WdResult<()> {
	let mut tx = db.begin().await.inspect_err(inspect).or(Err(Error::DbError))?;

	let result = sqlx::query("DELETE FROM permissions WHERE id = ?1")
		.bind(permission_id)
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.or(Err(Error::DbError))?;
	if result.rows_affected() == 0 {
		return Err(Error::not_found("permission_not_found"));
	}

	sqlx::query("DELETE FROM role_permissions WHERE permission_id = ?1")
		.bind(permission_id)
		.execute(&mut *tx)
		.await
		.inspect_err(inspect)
		.or(Err(Error::DbError))?;

	tx.commit().await.inspect_err(inspect).or(Err(Error::DbError))?;
	Ok(())
}

// Role-permission links //
//***********************//

pub(crate) async fn assign_permission_to_role(
	db: &SqlitePool,
	role_id: &str,
	permission_id: &str,
) -> WdResult<()> {
	// Both endpoints must exist; the link itself is idempotent
	let role_exists = sqlx::query("SELECT 1 FROM roles WHERE id = ?1")
		.bind(role_id)
		.fetch_optional(db)
		.await
		.inspect_err(inspect)
		.or(Err(Error::DbError))?;
	if role_exists.is_none() {
		return Err(Error::not_found("role_not_found"));
	}
	read_permission(db, permission_id).await?;

	sqlx::query(
		"INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?1, ?2)",
	)
	.bind(role_id)
	.bind(permission_id)
	.execute(db)
	.await
	.inspect_err(inspect)
	.or(Err(Error::DbError))?;

	Ok(())
}

pub(crate) async fn remove_permission_from_role(
	db: &SqlitePool,
	role_id: &str,
	permission_id: &str,
) -> WdResult<()> {
	sqlx::query("DELETE FROM role_permissions WHERE role_id = ?1 AND permission_id = ?2")
		.bind(role_id)
		.bind(permission_id)
		.execute(db)
		.await
		.inspect_err(inspect)
		.or(Err(Error::DbError))?;

	Ok(())
}

pub(crate) async fn list_role_permissions(
	db: &SqlitePool,
	role_id: &str,
) -> WdResult<Vec<Permission>> {
	let rows = sqlx::query(
		"SELECT p.id, p.client_id, p.name, p.description, p.created_at
		FROM role_permissions rp
		JOIN permissions p ON p.id = rp.permission_id
		WHERE rp.role_id = ?1
		ORDER BY p.name",
	)
	.bind(role_id)
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	collect_res(rows.iter().map(|row| row_to_permission(row)))
}

// User-role links //
//*****************//

pub(crate) async fn assign_role_to_user(
	db: &SqlitePool,
	user_id: &str,
	role_id: &str,
	tenant_id: &str,
	expires_at: Option<Timestamp>,
	now: Timestamp,
) -> WdResult<UserRole> {
	read_role(db, role_id, tenant_id).await?;

	sqlx::query(
		"INSERT INTO user_roles (user_id, role_id, tenant_id, expires_at, created_at)
		VALUES (?1, ?2, ?3, ?4, ?5)",
	)
	.bind(user_id)
	.bind(role_id)
	.bind(tenant_id)
	.bind(expires_at.map(|t| t.0))
	.bind(now.0)
	.execute(db)
	.await
	.map_err(|err| map_insert_err(err, "role_already_assigned"))?;

	Ok(UserRole {
		user_id: Box::from(user_id),
		role_id: Box::from(role_id),
		tenant_id: Box::from(tenant_id),
		expires_at,
		created_at: now,
	})
}

pub(crate) async fn remove_role_from_user(
	db: &SqlitePool,
	user_id: &str,
	role_id: &str,
	tenant_id: &str,
) -> WdResult<()> {
	let result = sqlx::query(
		"DELETE FROM user_roles WHERE user_id = ?1 AND role_id = ?2 AND tenant_id = ?3",
	)
	.bind(user_id)
	.bind(role_id)
	.bind(tenant_id)
	.execute(db)
	.await
	.inspect_err(inspect)
	.or(Err(Error::DbError))?;

	if result.rows_affected() == 0 {
		return Err(Error::not_found("role_not_found"));
	}
	Ok(())
}

pub(crate) async fn list_user_roles(
	db: &SqlitePool,
	user_id: &str,
	tenant_id: &str,
	now: Timestamp,
) -> WdResult<Vec<Role>> {
	let rows = sqlx::query(
		"SELECT r.id, r.tenant_id, r.name, r.description, r.is_system_role,
			r.created_at, r.updated_at
		FROM user_roles ur
		JOIN roles r ON r.id = ur.role_id
		WHERE ur.user_id = ?1 AND ur.tenant_id = ?2
			AND (ur.expires_at IS NULL OR ur.expires_at > ?3)
		ORDER BY r.name",
	)
	.bind(user_id)
	.bind(tenant_id)
	.bind(now.0)
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	collect_res(rows.iter().map(|row| row_to_role(row)))
}

/// Holders of a role across tenants, for targeted cache invalidation
pub(crate) async fn list_user_ids_with_role(
	db: &SqlitePool,
	role_id: &str,
) -> WdResult<Vec<(Box<str>, Box<str>)>> {
	let rows = sqlx::query("SELECT tenant_id, user_id FROM user_roles WHERE role_id = ?1")
		.bind(role_id)
		.fetch_all(db)
		.await
		.inspect_err(inspect)
		.map_err(|_| Error::DbError)?;

	collect_res(rows.iter().map(|row| {
		Ok((
			row.try_get::<String, _>("tenant_id")?.into_boxed_str(),
			row.try_get::<String, _>("user_id")?.into_boxed_str(),
		))
	}))
}

/// Effective permission names of a user for one client: union over the
/// user's unexpired roles, filtered to the client
pub(crate) async fn list_user_permissions(
	db: &SqlitePool,
	user_id: &str,
	tenant_id: &str,
	client_id: &str,
	now: Timestamp,
) -> WdResult<Vec<Box<str>>> {
	let rows = sqlx::query(
		"SELECT DISTINCT p.name
		FROM user_roles ur
		JOIN role_permissions rp ON rp.role_id = ur.role_id
		JOIN permissions p ON p.id = rp.permission_id
		WHERE ur.user_id = ?1 AND ur.tenant_id = ?2 AND p.client_id = ?3
			AND (ur.expires_at IS NULL OR ur.expires_at > ?4)
		ORDER BY p.name",
	)
	.bind(user_id)
	.bind(tenant_id)
	.bind(client_id)
	.bind(now.0)
	.fetch_all(db)
	.await
	.inspect_err(inspect)
	.map_err(|_| Error::DbError)?;

	collect_res(
		rows.iter().map(|row| Ok(row.try_get::<String, _>("name")?.into_boxed_str())),
	)
}

// Row mapping //
//*************//

fn row_to_role(row: &SqliteRow) -> Result<Role, sqlx::Error> {
	Ok(Role {
		id: row.try_get::<String, _>("id")?.into_boxed_str(),
		tenant_id: row.try_get::<String, _>("tenant_id")?.into_boxed_str(),
		name: row.try_get::<String, _>("name")?.into_boxed_str(),
		description: row
			.try_get::<Option<String>, _>("description")?
			.map(String::into_boxed_str),
		is_system_role: row.try_get("is_system_role")?,
		created_at: Timestamp(row.try_get("created_at")?),
		updated_at: Timestamp(row.try_get("updated_at")?),
	})
}

fn row_to_permission(row: &SqliteRow) -> Result<Permission, sqlx::Error> {
	Ok(Permission {
		id: row.try_get::<String, _>("id")?.into_boxed_str(),
		client_id: row.try_get::<String, _>("client_id")?.into_boxed_str(),
		name: row.try_get::<String, _>("name")?.into_boxed_str(),
		description: row
			.try_get::<Option<String>, _>("description")?
			.map(String::into_boxed_str),
		created_at: Timestamp(row.try_get("created_at")?),
	})
}

// vim: ts=4
