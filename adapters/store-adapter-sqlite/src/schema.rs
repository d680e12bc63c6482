//! Idempotent schema bootstrap.
//!
//! The migration CLI owns `_warden_migrations`; the adapter only creates
//! what it needs when pointed at an empty database so single-node
//! deployments work out of the box.

use sqlx::SqlitePool;

pub(crate) async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS tenants (
		id text NOT NULL,
		name text NOT NULL,
		domain text,
		status text NOT NULL,
		branding text,
		settings text,
		created_at integer NOT NULL,
		updated_at integer NOT NULL,
		PRIMARY KEY(id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_tenants_domain ON tenants (domain)")
		.execute(&mut *tx)
		.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_tenants_status ON tenants (status)")
		.execute(&mut *tx)
		.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS oauth_clients (
		id text NOT NULL,
		tenant_id text NOT NULL,
		name text NOT NULL,
		client_secret_hash text NOT NULL,
		previous_secret_hash text,
		previous_secret_expires_at integer,
		rotated_at integer,
		grant_types text NOT NULL,
		scopes text NOT NULL,
		redirect_uris text NOT NULL,
		metadata text,
		enabled integer NOT NULL DEFAULT 1,
		created_at integer NOT NULL,
		updated_at integer NOT NULL,
		PRIMARY KEY(id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE UNIQUE INDEX IF NOT EXISTS idx_clients_tenant_name
		ON oauth_clients (tenant_id, name)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_clients_tenant_created
		ON oauth_clients (tenant_id, created_at DESC, id DESC)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS roles (
		id text NOT NULL,
		tenant_id text NOT NULL,
		name text NOT NULL,
		description text,
		is_system_role integer NOT NULL DEFAULT 0,
		created_at integer NOT NULL,
		updated_at integer NOT NULL,
		PRIMARY KEY(id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE UNIQUE INDEX IF NOT EXISTS idx_roles_tenant_name ON roles (tenant_id, name)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS permissions (
		id text NOT NULL,
		client_id text NOT NULL,
		name text NOT NULL,
		description text,
		created_at integer NOT NULL,
		PRIMARY KEY(id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE UNIQUE INDEX IF NOT EXISTS idx_permissions_client_name
		ON permissions (client_id, name)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS role_permissions (
		role_id text NOT NULL,
		permission_id text NOT NULL,
		PRIMARY KEY(role_id, permission_id)
	)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS user_roles (
		user_id text NOT NULL,
		role_id text NOT NULL,
		tenant_id text NOT NULL,
		expires_at integer,
		created_at integer NOT NULL,
		PRIMARY KEY(user_id, role_id, tenant_id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_user_roles_role ON user_roles (role_id)")
		.execute(&mut *tx)
		.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS browser_sessions (
		id text NOT NULL,
		tenant_id text NOT NULL,
		created_at integer NOT NULL,
		last_activity integer NOT NULL,
		user_agent text,
		ip_address text,
		version integer NOT NULL,
		active_user_id text,
		account_user_ids text NOT NULL,
		PRIMARY KEY(id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_browser_sessions_tenant
		ON browser_sessions (tenant_id, last_activity DESC)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS account_sessions (
		id text NOT NULL,
		browser_session_id text NOT NULL,
		user_id text NOT NULL,
		is_active integer NOT NULL DEFAULT 0,
		authenticated_at integer NOT NULL,
		expires_at integer NOT NULL,
		subject_type text NOT NULL,
		subject_properties text,
		refresh_token text,
		client_id text,
		PRIMARY KEY(browser_session_id, user_id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE INDEX IF NOT EXISTS idx_account_sessions_user ON account_sessions (user_id)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS _warden_migrations (
		name text NOT NULL,
		applied_at integer NOT NULL,
		checksum text NOT NULL,
		PRIMARY KEY(name)
	)",
	)
	.execute(&mut *tx)
	.await?;

	tx.commit().await?;
	Ok(())
}

// vim: ts=4
