//! Tenant-scoped view over a KV adapter.
//!
//! Transparently prepends `["t", tenant_id]` to every key, so a view
//! scoped to one tenant can neither observe nor mutate another tenant's
//! data through these operations.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::prelude::*;
use warden_types::kv_adapter::KvAdapter;
use warden_types::kv_key::KvKey;

/// Discriminator segment shared by every scoped key
const SCOPE_SEGMENT: &str = "t";

#[derive(Debug, Clone)]
pub struct ScopedKv {
	inner: Arc<dyn KvAdapter>,
	tenant_id: Box<str>,
	prefix: KvKey,
}

impl ScopedKv {
	pub fn new(inner: Arc<dyn KvAdapter>, tenant_id: &str) -> Self {
		let prefix = KvKey::from([SCOPE_SEGMENT, tenant_id]);
		Self { inner, tenant_id: Box::from(tenant_id), prefix }
	}

	pub fn tenant_id(&self) -> &str {
		&self.tenant_id
	}

	fn scope(&self, key: &KvKey) -> KvKey {
		let mut scoped = self.prefix.clone();
		scoped.0.extend(key.0.iter().cloned());
		scoped
	}
}

#[async_trait]
impl KvAdapter for ScopedKv {
	async fn get(&self, key: &KvKey) -> WdResult<Option<Value>> {
		self.inner.get(&self.scope(key)).await
	}

	async fn set(&self, key: &KvKey, value: Value, ttl_seconds: Option<u32>) -> WdResult<()> {
		self.inner.set(&self.scope(key), value, ttl_seconds).await
	}

	async fn remove(&self, key: &KvKey) -> WdResult<()> {
		self.inner.remove(&self.scope(key)).await
	}

	async fn scan(&self, prefix: &KvKey) -> WdResult<Vec<(KvKey, Value)>> {
		let scoped_prefix = self.scope(prefix);
		let entries = self.inner.scan(&scoped_prefix).await?;
		// Strip the tenant discriminator; anything that doesn't carry it
		// was not written through a scoped view and is not ours to return
		Ok(entries
			.into_iter()
			.filter_map(|(key, value)| key.strip_prefix(&self.prefix).map(|k| (k, value)))
			.collect())
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use super::*;
	use serde_json::json;
	use warden_kv_adapter_memory::MemoryKvAdapter;

	fn setup() -> (Arc<MemoryKvAdapter>, ScopedKv, ScopedKv) {
		let base = Arc::new(MemoryKvAdapter::new());
		let t1 = ScopedKv::new(base.clone(), "acme");
		let t2 = ScopedKv::new(base.clone(), "globex");
		(base, t1, t2)
	}

	#[tokio::test]
	async fn test_prefix_is_transparent() {
		let (base, t1, _t2) = setup();
		let key = KvKey::from(["tenant", "settings"]);

		t1.set(&key, json!(1), None).await.unwrap();
		assert_eq!(t1.get(&key).await.unwrap(), Some(json!(1)));

		// The underlying row carries the discriminator
		let raw = base.get(&KvKey::from(["t", "acme", "tenant", "settings"])).await.unwrap();
		assert_eq!(raw, Some(json!(1)));
	}

	#[tokio::test]
	async fn test_cross_tenant_isolation() {
		let (_base, t1, t2) = setup();
		let key = KvKey::from(["session", "browser", "s1"]);

		t1.set(&key, json!("one"), None).await.unwrap();
		t2.set(&key, json!("two"), None).await.unwrap();

		assert_eq!(t1.get(&key).await.unwrap(), Some(json!("one")));
		assert_eq!(t2.get(&key).await.unwrap(), Some(json!("two")));

		t2.remove(&key).await.unwrap();
		assert_eq!(t1.get(&key).await.unwrap(), Some(json!("one")));
	}

	#[tokio::test]
	async fn test_interleaved_writes_stay_isolated() {
		let (_base, t1, t2) = setup();

		for i in 0..10 {
			let key = KvKey::from(["k", &i.to_string()]);
			if i % 2 == 0 {
				t1.set(&key, json!(i), None).await.unwrap();
			} else {
				t2.set(&key, json!(i), None).await.unwrap();
			}
		}

		let seen1 = t1.scan(&KvKey::from(["k"])).await.unwrap();
		let seen2 = t2.scan(&KvKey::from(["k"])).await.unwrap();
		assert_eq!(seen1.len(), 5);
		assert_eq!(seen2.len(), 5);
		assert!(seen1.iter().all(|(_, v)| v.as_i64().unwrap() % 2 == 0));
		assert!(seen2.iter().all(|(_, v)| v.as_i64().unwrap() % 2 == 1));
		// Scanned keys come back without the discriminator
		assert!(seen1.iter().all(|(k, _)| k.segment(0) == Some("k")));
	}
}

// vim: ts=4
