//! Client registry integration tests over an in-memory store stub:
//! secret lifecycle, rotation grace, name conflicts, pagination, and
//! degraded reads under an open circuit.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use warden_clients::ClientRegistry;
use warden_core::resilience::{BreakerConfig, BreakerState, CircuitBreaker, Resilient, RetryPolicy};
use warden_types::client::{CreateClientData, ListClientsOptions, OAuthClient, UpdateClientData};
use warden_types::error::{Error, WdResult};
use warden_types::rbac::{Permission, Role, UserRole};
use warden_types::session::{AccountSession, BrowserSession};
use warden_types::store_adapter::{
	CreatePermissionData, CreateRoleData, ListSessionsOptions, StoreAdapter,
};
use warden_types::tenant::{ListTenantsOptions, Tenant};
use warden_types::types::{ManualClock, Timestamp};
use warden_types::worker::WorkerPool;

/// Store stub backing only the client surface; everything else is unused
/// by these tests
#[derive(Debug, Default)]
struct StubStore {
	clients: parking_lot::Mutex<Vec<OAuthClient>>,
	fail_reads: AtomicBool,
	read_calls: AtomicU32,
}

impl StubStore {
	fn read_gate(&self) -> WdResult<()> {
		self.read_calls.fetch_add(1, Ordering::SeqCst);
		if self.fail_reads.load(Ordering::SeqCst) {
			Err(Error::DbError)
		} else {
			Ok(())
		}
	}
}

fn unused<T>() -> WdResult<T> {
	Err(Error::Internal("not exercised by this test".into()))
}

#[async_trait]
impl StoreAdapter for StubStore {
	async fn has_migration_history(&self) -> WdResult<bool> {
		Ok(true)
	}

	async fn upsert_tenant(&self, _tenant: &Tenant) -> WdResult<()> {
		unused()
	}
	async fn list_tenants(&self, _opts: &ListTenantsOptions) -> WdResult<Vec<Tenant>> {
		unused()
	}

	async fn insert_client(&self, client: &OAuthClient) -> WdResult<()> {
		self.clients.lock().push(client.clone());
		Ok(())
	}

	async fn read_client(&self, client_id: &str, tenant_id: &str) -> WdResult<OAuthClient> {
		self.read_gate()?;
		self.clients
			.lock()
			.iter()
			.find(|c| c.id.as_ref() == client_id && c.tenant_id.as_ref() == tenant_id)
			.cloned()
			.ok_or(Error::not_found("client_not_found"))
	}

	async fn read_client_by_id(&self, client_id: &str) -> WdResult<OAuthClient> {
		self.read_gate()?;
		self.clients
			.lock()
			.iter()
			.find(|c| c.id.as_ref() == client_id)
			.cloned()
			.ok_or(Error::not_found("client_not_found"))
	}

	async fn read_client_by_name(&self, tenant_id: &str, name: &str) -> WdResult<OAuthClient> {
		self.clients
			.lock()
			.iter()
			.find(|c| c.tenant_id.as_ref() == tenant_id && c.name.as_ref() == name)
			.cloned()
			.ok_or(Error::not_found("client_not_found"))
	}

	async fn list_clients(
		&self,
		tenant_id: &str,
		opts: &ListClientsOptions<'_>,
	) -> WdResult<Vec<OAuthClient>> {
		let mut rows: Vec<OAuthClient> = self
			.clients
			.lock()
			.iter()
			.filter(|c| c.tenant_id.as_ref() == tenant_id)
			.filter(|c| opts.enabled.is_none_or(|e| c.enabled == e))
			.cloned()
			.collect();
		rows.sort_by(|a, b| {
			b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id))
		});
		if let Some(cursor) = opts.cursor {
			let (ts, id) = cursor.split_once(':').ok_or(Error::Parse)?;
			let ts: i64 = ts.parse().map_err(|_| Error::Parse)?;
			rows.retain(|c| (c.created_at.0, c.id.as_ref()) < (ts, id));
		}
		rows.truncate(opts.limit as usize + 1);
		Ok(rows)
	}

	async fn update_client(
		&self,
		client_id: &str,
		tenant_id: &str,
		data: &UpdateClientData<'_>,
	) -> WdResult<()> {
		let mut clients = self.clients.lock();
		let client = clients
			.iter_mut()
			.find(|c| c.id.as_ref() == client_id && c.tenant_id.as_ref() == tenant_id)
			.ok_or(Error::not_found("client_not_found"))?;
		if let Some(name) = data.name {
			client.name = Box::from(name);
		}
		if let Some(enabled) = data.enabled {
			client.enabled = enabled;
		}
		Ok(())
	}

	async fn update_client_secret(
		&self,
		client_id: &str,
		tenant_id: &str,
		secret_hash: &str,
		previous_hash: Option<&str>,
		previous_expires_at: Option<Timestamp>,
		rotated_at: Option<Timestamp>,
	) -> WdResult<()> {
		let mut clients = self.clients.lock();
		let client = clients
			.iter_mut()
			.find(|c| c.id.as_ref() == client_id && c.tenant_id.as_ref() == tenant_id)
			.ok_or(Error::not_found("client_not_found"))?;
		client.client_secret_hash = Box::from(secret_hash);
		client.previous_secret_hash = previous_hash.map(Box::from);
		client.previous_secret_expires_at = previous_expires_at;
		client.rotated_at = rotated_at;
		Ok(())
	}

	async fn delete_client(&self, client_id: &str, tenant_id: &str) -> WdResult<()> {
		let mut clients = self.clients.lock();
		let before = clients.len();
		clients.retain(|c| !(c.id.as_ref() == client_id && c.tenant_id.as_ref() == tenant_id));
		if clients.len() == before {
			return Err(Error::not_found("client_not_found"));
		}
		Ok(())
	}

	async fn create_role(&self, _data: &CreateRoleData<'_>) -> WdResult<Role> {
		unused()
	}
	async fn read_role(&self, _role_id: &str, _tenant_id: &str) -> WdResult<Role> {
		unused()
	}
	async fn list_roles(&self, _tenant_id: &str) -> WdResult<Vec<Role>> {
		unused()
	}
	async fn update_role(
		&self,
		_role_id: &str,
		_tenant_id: &str,
		_name: Option<&str>,
		_description: Option<&str>,
	) -> WdResult<Role> {
		unused()
	}
	async fn delete_role(&self, _role_id: &str, _tenant_id: &str) -> WdResult<()> {
		unused()
	}
	async fn create_permission(
		&self,
		_data: &CreatePermissionData<'_>,
	) -> WdResult<Permission> {
		unused()
	}
	async fn read_permission(&self, _permission_id: &str) -> WdResult<Permission> {
		unused()
	}
	async fn list_permissions(&self, _client_id: &str) -> WdResult<Vec<Permission>> {
		unused()
	}
	async fn delete_permission(&self, _permission_id: &str) -> WdResult<()> {
		unused()
	}
	async fn assign_permission_to_role(
		&self,
		_role_id: &str,
		_permission_id: &str,
	) -> WdResult<()> {
		unused()
	}
	async fn remove_permission_from_role(
		&self,
		_role_id: &str,
		_permission_id: &str,
	) -> WdResult<()> {
		unused()
	}
	async fn list_role_permissions(&self, _role_id: &str) -> WdResult<Vec<Permission>> {
		unused()
	}
	async fn assign_role_to_user(
		&self,
		_user_id: &str,
		_role_id: &str,
		_tenant_id: &str,
		_expires_at: Option<Timestamp>,
	) -> WdResult<UserRole> {
		unused()
	}
	async fn remove_role_from_user(
		&self,
		_user_id: &str,
		_role_id: &str,
		_tenant_id: &str,
	) -> WdResult<()> {
		unused()
	}
	async fn list_user_roles(&self, _user_id: &str, _tenant_id: &str) -> WdResult<Vec<Role>> {
		unused()
	}
	async fn list_user_ids_with_role(
		&self,
		_role_id: &str,
	) -> WdResult<Vec<(Box<str>, Box<str>)>> {
		unused()
	}
	async fn list_user_permissions(
		&self,
		_user_id: &str,
		_tenant_id: &str,
		_client_id: &str,
	) -> WdResult<Vec<Box<str>>> {
		unused()
	}
	async fn upsert_browser_session(&self, _session: &BrowserSession) -> WdResult<()> {
		unused()
	}
	async fn upsert_account_session(&self, _session: &AccountSession) -> WdResult<()> {
		unused()
	}
	async fn delete_browser_session(&self, _session_id: &str) -> WdResult<()> {
		unused()
	}
	async fn delete_account_session(
		&self,
		_browser_session_id: &str,
		_user_id: &str,
	) -> WdResult<()> {
		unused()
	}
	async fn list_sessions_by_user(
		&self,
		_tenant_id: &str,
		_user_id: &str,
	) -> WdResult<Vec<BrowserSession>> {
		unused()
	}
	async fn list_sessions_by_tenant(
		&self,
		_tenant_id: &str,
		_opts: &ListSessionsOptions,
	) -> WdResult<Vec<BrowserSession>> {
		unused()
	}
	async fn cleanup_expired_sessions(&self, _created_before: Timestamp) -> WdResult<u32> {
		unused()
	}
}

struct Fixture {
	store: Arc<StubStore>,
	clock: Arc<ManualClock>,
	registry: ClientRegistry,
}

fn fixture() -> Fixture {
	fixture_with_breaker(BreakerConfig::default())
}

fn fixture_with_breaker(config: BreakerConfig) -> Fixture {
	let store = Arc::new(StubStore::default());
	let clock = Arc::new(ManualClock::new(Timestamp(1_700_000_000_000)));
	let registry = ClientRegistry::new(
		store.clone(),
		Resilient::new(
			CircuitBreaker::with_clock(config, clock.clone()),
			RetryPolicy { max_attempts: 1, base_delay_ms: 0, ..Default::default() },
		),
		Arc::new(WorkerPool::new(2, 1)),
		clock.clone(),
	);
	Fixture { store, clock, registry }
}

fn create_data(name: &str) -> CreateClientData<'_> {
	CreateClientData {
		name,
		grant_types: &["authorization_code", "refresh_token"],
		scopes: &["openid", "posts:read"],
		redirect_uris: &["https://app.example.com/cb"],
		metadata: None,
	}
}

#[tokio::test]
async fn test_create_returns_secret_exactly_once() {
	let f = fixture();
	let created = f.registry.create_client("t1", create_data("app")).await.unwrap();

	assert!(!created.secret.is_empty());
	assert!(created.client.client_secret_hash.starts_with("$argon2"));
	assert_ne!(created.client.client_secret_hash.as_ref(), created.secret.as_ref());

	// No read path ever returns the plaintext, and the hash never
	// serializes
	let fetched = f.registry.get_client(&created.client.id, "t1").await.unwrap().unwrap();
	let json = serde_json::to_value(&fetched).unwrap();
	assert!(json.get("clientSecretHash").is_none());
	assert!(json.get("previousSecretHash").is_none());
}

#[tokio::test]
async fn test_verify_credentials() {
	let f = fixture();
	let created = f.registry.create_client("t1", create_data("app")).await.unwrap();

	let ok = f
		.registry
		.verify_credentials(&created.client.id, &created.secret)
		.await
		.unwrap();
	assert!(ok.is_some());

	let bad = f.registry.verify_credentials(&created.client.id, "wrong").await.unwrap();
	assert!(bad.is_none());

	let ghost = f.registry.verify_credentials("nope", "x").await.unwrap();
	assert!(ghost.is_none());
}

#[tokio::test]
async fn test_rotation_grace_window() {
	let f = fixture();
	let created = f.registry.create_client("t1", create_data("app")).await.unwrap();
	let id = created.client.id.clone();
	let old_secret = created.secret;

	let rotated = f.registry.rotate_secret(&id, "t1", 60).await.unwrap();
	let new_secret = rotated.secret;
	assert!(rotated.client.rotated_at.is_some());

	// 30s in: both secrets verify
	f.clock.advance_seconds(30);
	assert!(f.registry.verify_credentials(&id, &old_secret).await.unwrap().is_some());
	assert!(f.registry.verify_credentials(&id, &new_secret).await.unwrap().is_some());

	// 61s in: only the new one
	f.clock.advance_seconds(31);
	assert!(f.registry.verify_credentials(&id, &old_secret).await.unwrap().is_none());
	assert!(f.registry.verify_credentials(&id, &new_secret).await.unwrap().is_some());
}

#[tokio::test]
async fn test_name_conflict_and_self_exclusion() {
	let f = fixture();
	let first = f.registry.create_client("t1", create_data("app")).await.unwrap();
	f.registry.create_client("t1", create_data("other")).await.unwrap();

	let clash = f.registry.create_client("t1", create_data("app")).await;
	assert_eq!(clash.unwrap_err().code(), Some("client_name_conflict"));

	// Same name in another tenant is fine
	f.registry.create_client("t2", create_data("app")).await.unwrap();

	// Renaming to its own name is not a conflict
	let update = UpdateClientData { name: Some("app"), ..Default::default() };
	f.registry.update_client(&first.client.id, "t1", update).await.unwrap();

	// Renaming onto another client's name is
	let update = UpdateClientData { name: Some("other"), ..Default::default() };
	let clash = f.registry.update_client(&first.client.id, "t1", update).await;
	assert_eq!(clash.unwrap_err().code(), Some("client_name_conflict"));
}

#[tokio::test]
async fn test_cursor_pagination() {
	let f = fixture();
	for i in 0..5 {
		f.clock.advance_seconds(1);
		f.registry
			.create_client("t1", create_data(&format!("app-{i}")))
			.await
			.unwrap();
	}

	let page1 = f.registry.list_clients("t1", 2, None, None).await.unwrap();
	assert_eq!(page1.clients.len(), 2);
	assert!(page1.has_more);
	// Newest first
	assert_eq!(page1.clients[0].name.as_ref(), "app-4");

	let cursor = page1.next_cursor.unwrap();
	let page2 = f.registry.list_clients("t1", 2, Some(&cursor), None).await.unwrap();
	assert_eq!(page2.clients.len(), 2);
	assert_eq!(page2.clients[0].name.as_ref(), "app-2");

	let cursor = page2.next_cursor.unwrap();
	let page3 = f.registry.list_clients("t1", 2, Some(&cursor), None).await.unwrap();
	assert_eq!(page3.clients.len(), 1);
	assert!(!page3.has_more);
	assert!(page3.next_cursor.is_none());
}

#[tokio::test]
async fn test_breaker_degrades_reads_and_recovers() {
	let f = fixture_with_breaker(BreakerConfig {
		failure_threshold: 50,
		minimum_requests: 5,
		cooldown_ms: 30_000,
		success_threshold: 3,
		..Default::default()
	});
	let created = f.registry.create_client("t1", create_data("app")).await.unwrap();
	let id = created.client.id.clone();

	// 5 consecutive store failures open the circuit
	f.store.fail_reads.store(true, Ordering::SeqCst);
	for _ in 0..5 {
		let err = f.registry.get_client(&id, "t1").await;
		// DbError propagates (write-class semantics do not apply: this
		// is a transient infra error, not an open circuit)
		assert!(err.is_err());
	}
	assert_eq!(f.registry.breaker_state(), BreakerState::Open);

	// 6th call: degraded null without touching the store
	let calls_before = f.store.read_calls.load(Ordering::SeqCst);
	let degraded = f.registry.get_client(&id, "t1").await.unwrap();
	assert!(degraded.is_none());
	assert_eq!(f.store.read_calls.load(Ordering::SeqCst), calls_before);

	// After the cooldown the probe goes through again
	f.store.fail_reads.store(false, Ordering::SeqCst);
	f.clock.advance_millis(30_000);
	for _ in 0..3 {
		assert!(f.registry.get_client(&id, "t1").await.unwrap().is_some());
	}
	assert_eq!(f.registry.breaker_state(), BreakerState::Closed);
}

// vim: ts=4
