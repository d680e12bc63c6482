//! SQLite adapter integration tests: schema bootstrap, client rows,
//! RBAC source data, and session mirror queries.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use serde_json::json;
use tempfile::TempDir;

use warden_store_adapter_sqlite::StoreAdapterSqlite;
use warden_types::client::{ListClientsOptions, OAuthClient, UpdateClientData};
use warden_types::error::Error;
use warden_types::session::{AccountSession, BrowserSession};
use warden_types::store_adapter::{
	CreatePermissionData, CreateRoleData, ListSessionsOptions, StoreAdapter,
};
use warden_types::types::Timestamp;

async fn adapter() -> (StoreAdapterSqlite, TempDir) {
	let tmp = TempDir::new().unwrap();
	let adapter = StoreAdapterSqlite::new(tmp.path().join("warden.db")).await.unwrap();
	(adapter, tmp)
}

fn client(id: &str, tenant: &str, name: &str, created_at: i64) -> OAuthClient {
	OAuthClient {
		id: id.into(),
		tenant_id: tenant.into(),
		name: name.into(),
		client_secret_hash: "$argon2id$stub".into(),
		previous_secret_hash: None,
		previous_secret_expires_at: None,
		rotated_at: None,
		grant_types: vec!["authorization_code".into()],
		scopes: vec!["openid".into()],
		redirect_uris: vec!["https://app.example.com/cb".into()],
		metadata: json!({"env": "test"}),
		enabled: true,
		created_at: Timestamp(created_at),
		updated_at: Timestamp(created_at),
	}
}

#[tokio::test]
async fn test_first_run_is_detectable() {
	let (adapter, _tmp) = adapter().await;
	assert!(!adapter.has_migration_history().await.unwrap());
}

#[tokio::test]
async fn test_client_round_trip_and_unique_name() {
	let (adapter, _tmp) = adapter().await;

	adapter.insert_client(&client("c1", "t1", "app", 1000)).await.unwrap();

	let read = adapter.read_client("c1", "t1").await.unwrap();
	assert_eq!(read.name.as_ref(), "app");
	assert_eq!(read.metadata, json!({"env": "test"}));
	assert_eq!(read.grant_types, vec![Box::<str>::from("authorization_code")]);

	// Tenant scoping
	let err = adapter.read_client("c1", "t2").await.unwrap_err();
	assert_eq!(err.code(), Some("client_not_found"));
	// Cross-tenant lookup bypasses scoping
	assert!(adapter.read_client_by_id("c1").await.is_ok());

	// (tenant, name) unique
	let err = adapter.insert_client(&client("c2", "t1", "app", 2000)).await.unwrap_err();
	assert_eq!(err.code(), Some("client_name_conflict"));
	// Same name in another tenant is fine
	adapter.insert_client(&client("c3", "t2", "app", 2000)).await.unwrap();
}

#[tokio::test]
async fn test_client_pagination_order_and_overfetch() {
	let (adapter, _tmp) = adapter().await;
	for i in 0..5 {
		adapter
			.insert_client(&client(&format!("c{i}"), "t1", &format!("app-{i}"), 1000 + i))
			.await
			.unwrap();
	}

	let rows = adapter
		.list_clients("t1", &ListClientsOptions { limit: 2, cursor: None, enabled: None })
		.await
		.unwrap();
	// limit + 1 overfetch, newest first
	assert_eq!(rows.len(), 3);
	assert_eq!(rows[0].id.as_ref(), "c4");
	assert_eq!(rows[1].id.as_ref(), "c3");

	let cursor = format!("{}:{}", rows[1].created_at.0, rows[1].id);
	let rows = adapter
		.list_clients(
			"t1",
			&ListClientsOptions { limit: 2, cursor: Some(&cursor), enabled: None },
		)
		.await
		.unwrap();
	assert_eq!(rows[0].id.as_ref(), "c2");
}

#[tokio::test]
async fn test_partial_update() {
	let (adapter, _tmp) = adapter().await;
	adapter.insert_client(&client("c1", "t1", "app", 1000)).await.unwrap();

	adapter
		.update_client(
			"c1",
			"t1",
			&UpdateClientData { enabled: Some(false), ..Default::default() },
		)
		.await
		.unwrap();

	let read = adapter.read_client("c1", "t1").await.unwrap();
	assert!(!read.enabled);
	// Untouched columns survive
	assert_eq!(read.name.as_ref(), "app");
	assert_eq!(read.scopes, vec![Box::<str>::from("openid")]);

	let err = adapter
		.update_client("ghost", "t1", &UpdateClientData { enabled: Some(true), ..Default::default() })
		.await
		.unwrap_err();
	assert_eq!(err.code(), Some("client_not_found"));
}

#[tokio::test]
async fn test_secret_rotation_columns() {
	let (adapter, _tmp) = adapter().await;
	adapter.insert_client(&client("c1", "t1", "app", 1000)).await.unwrap();

	adapter
		.update_client_secret(
			"c1",
			"t1",
			"$argon2id$new",
			Some("$argon2id$stub"),
			Some(Timestamp(5000)),
			Some(Timestamp(4000)),
		)
		.await
		.unwrap();

	let read = adapter.read_client("c1", "t1").await.unwrap();
	assert_eq!(read.client_secret_hash.as_ref(), "$argon2id$new");
	assert_eq!(read.previous_secret_hash.as_deref(), Some("$argon2id$stub"));
	assert_eq!(read.previous_secret_expires_at, Some(Timestamp(5000)));
	assert_eq!(read.rotated_at, Some(Timestamp(4000)));
}

#[tokio::test]
async fn test_rbac_source_data() {
	let (adapter, _tmp) = adapter().await;

	let viewer = adapter
		.create_role(&CreateRoleData {
			tenant_id: "t1",
			name: "viewer",
			description: Some("read only"),
			is_system_role: false,
		})
		.await
		.unwrap();
	let editor = adapter
		.create_role(&CreateRoleData {
			tenant_id: "t1",
			name: "editor",
			description: None,
			is_system_role: false,
		})
		.await
		.unwrap();

	let read = adapter
		.create_permission(&CreatePermissionData {
			client_id: "app",
			name: "posts:read",
			description: None,
		})
		.await
		.unwrap();
	let write = adapter
		.create_permission(&CreatePermissionData {
			client_id: "app",
			name: "posts:write",
			description: None,
		})
		.await
		.unwrap();
	let other_client = adapter
		.create_permission(&CreatePermissionData {
			client_id: "other",
			name: "admin:all",
			description: None,
		})
		.await
		.unwrap();

	adapter.assign_permission_to_role(&viewer.id, &read.id).await.unwrap();
	adapter.assign_permission_to_role(&editor.id, &read.id).await.unwrap();
	adapter.assign_permission_to_role(&editor.id, &write.id).await.unwrap();
	adapter.assign_permission_to_role(&editor.id, &other_client.id).await.unwrap();

	adapter.assign_role_to_user("alice", &viewer.id, "t1", None).await.unwrap();
	let dup = adapter.assign_role_to_user("alice", &viewer.id, "t1", None).await;
	assert_eq!(dup.unwrap_err().code(), Some("role_already_assigned"));

	// Union over roles, filtered by client
	let perms = adapter.list_user_permissions("alice", "t1", "app").await.unwrap();
	assert_eq!(perms, vec![Box::<str>::from("posts:read")]);

	adapter.assign_role_to_user("alice", &editor.id, "t1", None).await.unwrap();
	let perms = adapter.list_user_permissions("alice", "t1", "app").await.unwrap();
	assert_eq!(perms.len(), 2);
	// The other client's permission stays out
	assert!(!perms.iter().any(|p| p.as_ref() == "admin:all"));

	// Expired assignments are filtered
	adapter.assign_role_to_user("bob", &editor.id, "t1", Some(Timestamp(1))).await.unwrap();
	assert!(adapter.list_user_permissions("bob", "t1", "app").await.unwrap().is_empty());
	assert!(adapter.list_user_roles("bob", "t1").await.unwrap().is_empty());

	// Holder enumeration spans tenants
	adapter
		.create_role(&CreateRoleData {
			tenant_id: "t2",
			name: "editor",
			description: None,
			is_system_role: false,
		})
		.await
		.unwrap();
	let holders = adapter.list_user_ids_with_role(&editor.id).await.unwrap();
	assert_eq!(holders.len(), 2); // alice (t1) and bob (t1)

	// Permission delete cascades over role links
	adapter.delete_permission(&write.id).await.unwrap();
	let perms = adapter.list_user_permissions("alice", "t1", "app").await.unwrap();
	assert_eq!(perms, vec![Box::<str>::from("posts:read")]);

	// Role delete removes assignments
	adapter.delete_role(&editor.id, "t1").await.unwrap();
	assert!(adapter.list_user_ids_with_role(&editor.id).await.unwrap().is_empty());
	let err = adapter.read_role(&editor.id, "t1").await.unwrap_err();
	assert_eq!(err.code(), Some("role_not_found"));
}

#[tokio::test]
async fn test_session_mirror_queries() {
	let (adapter, _tmp) = adapter().await;

	let session = |id: &str, tenant: &str, created: i64| BrowserSession {
		id: id.into(),
		tenant_id: tenant.into(),
		created_at: Timestamp(created),
		last_activity: Timestamp(created),
		user_agent: None,
		ip_address: None,
		version: 1,
		active_user_id: Some("alice".into()),
		account_user_ids: vec!["alice".into()],
	};
	let account = |sid: &str, user: &str| AccountSession {
		id: format!("{sid}-{user}").into_boxed_str(),
		browser_session_id: sid.into(),
		user_id: user.into(),
		is_active: true,
		authenticated_at: Timestamp(1000),
		expires_at: Timestamp(100_000),
		subject_type: "user".into(),
		subject_properties: json!({}),
		refresh_token: None,
		client_id: None,
	};

	adapter.upsert_browser_session(&session("s1", "t1", 1000)).await.unwrap();
	adapter.upsert_browser_session(&session("s2", "t1", 2000)).await.unwrap();
	adapter.upsert_browser_session(&session("s3", "t2", 3000)).await.unwrap();
	adapter.upsert_account_session(&account("s1", "alice")).await.unwrap();
	adapter.upsert_account_session(&account("s2", "bob")).await.unwrap();
	adapter.upsert_account_session(&account("s3", "alice")).await.unwrap();

	let alice_t1 = adapter.list_sessions_by_user("t1", "alice").await.unwrap();
	assert_eq!(alice_t1.len(), 1);
	assert_eq!(alice_t1[0].id.as_ref(), "s1");

	let t1 = adapter
		.list_sessions_by_tenant("t1", &ListSessionsOptions::default())
		.await
		.unwrap();
	assert_eq!(t1.len(), 2);
	assert_eq!(t1[0].id.as_ref(), "s2"); // most recent activity first

	// Cleanup drops old sessions and their accounts
	let removed = adapter.cleanup_expired_sessions(Timestamp(2500)).await.unwrap();
	assert_eq!(removed, 2);
	assert!(adapter.list_sessions_by_user("t1", "alice").await.unwrap().is_empty());
	let t2 = adapter
		.list_sessions_by_tenant("t2", &ListSessionsOptions::default())
		.await
		.unwrap();
	assert_eq!(t2.len(), 1);

	adapter.delete_browser_session("s3").await.unwrap();
	assert!(adapter.list_sessions_by_user("t2", "alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_error_mapping() {
	let (adapter, _tmp) = adapter().await;
	let err = adapter.read_client_by_id("ghost").await.unwrap_err();
	assert!(matches!(err, Error::NotFound { .. }));
	let err = adapter.read_permission("ghost").await.unwrap_err();
	assert_eq!(err.code(), Some("permission_not_found"));
	let err = adapter.delete_client("ghost", "t1").await.unwrap_err();
	assert_eq!(err.code(), Some("client_not_found"));
}

// vim: ts=4
