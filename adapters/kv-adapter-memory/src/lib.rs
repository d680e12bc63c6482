//! In-memory KV adapter.
//!
//! Reference implementation of the KV contract: ordered keys, lazy TTL
//! expiry, prefix scan over both key encodings. Production deployments
//! plug in a persistent adapter; this one backs tests and single-node
//! development.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use warden_types::kv_adapter::KvAdapter;
use warden_types::kv_key::{KvKey, LEGACY_SEPARATOR};
use warden_types::prelude::*;

#[derive(Debug, Clone)]
struct Entry {
	value: Value,
	expires_at: Option<Timestamp>,
}

/// BTreeMap over encoded keys, guarded by a RwLock. Ordering of the
/// encoded form is the reference ordering for the KV contract.
pub struct MemoryKvAdapter {
	entries: RwLock<BTreeMap<Box<str>, Entry>>,
	clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for MemoryKvAdapter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("MemoryKvAdapter").field("len", &self.entries.read().len()).finish()
	}
}

impl Default for MemoryKvAdapter {
	fn default() -> Self {
		Self::new()
	}
}

impl MemoryKvAdapter {
	pub fn new() -> Self {
		Self::with_clock(Arc::new(SystemClock))
	}

	pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
		Self { entries: RwLock::new(BTreeMap::new()), clock }
	}

	/// Write an entry under the legacy encoding. Exists so tests can
	/// exercise the backward-compatible read path.
	pub fn insert_legacy(&self, key: &KvKey, value: Value, ttl_seconds: Option<u32>) {
		let expires_at = ttl_seconds.map(|t| self.clock.now().add_seconds(i64::from(t)));
		self.entries
			.write()
			.insert(encode_legacy(key), Entry { value, expires_at });
	}

	fn is_expired(&self, entry: &Entry) -> bool {
		entry.expires_at.is_some_and(|at| self.clock.now() >= at)
	}
}

fn encode_legacy(key: &KvKey) -> Box<str> {
	key.0
		.iter()
		.map(|seg| seg.replace(LEGACY_SEPARATOR, "").replace("::", ""))
		.collect::<Vec<_>>()
		.join(&LEGACY_SEPARATOR.to_string())
		.into_boxed_str()
}

#[async_trait]
impl KvAdapter for MemoryKvAdapter {
	async fn get(&self, key: &KvKey) -> WdResult<Option<Value>> {
		let mut entries = self.entries.write();
		// Probe the current encoding first, then the legacy one
		for encoded in [key.encode(), encode_legacy(key)] {
			let expired = match entries.get(&encoded) {
				Some(entry) if self.is_expired(entry) => true,
				Some(entry) => return Ok(Some(entry.value.clone())),
				None => false,
			};
			if expired {
				entries.remove(&encoded);
			}
		}
		Ok(None)
	}

	async fn set(&self, key: &KvKey, value: Value, ttl_seconds: Option<u32>) -> WdResult<()> {
		let expires_at = ttl_seconds.map(|t| self.clock.now().add_seconds(i64::from(t)));
		let mut entries = self.entries.write();
		// Writers emit only the current encoding; a legacy twin would
		// otherwise surface as a duplicate in scans
		entries.remove(&encode_legacy(key));
		entries.insert(key.encode(), Entry { value, expires_at });
		Ok(())
	}

	async fn remove(&self, key: &KvKey) -> WdResult<()> {
		let mut entries = self.entries.write();
		entries.remove(&key.encode());
		entries.remove(&encode_legacy(key));
		Ok(())
	}

	async fn scan(&self, prefix: &KvKey) -> WdResult<Vec<(KvKey, Value)>> {
		let mut entries = self.entries.write();
		let mut expired = Vec::new();
		let mut found = Vec::new();

		for (encoded, entry) in entries.iter() {
			if self.is_expired(entry) {
				expired.push(encoded.clone());
				continue;
			}
			let key = KvKey::decode(encoded);
			if key.starts_with(prefix) {
				found.push((key, entry.value.clone()));
			}
		}

		for encoded in expired {
			entries.remove(&encoded);
		}

		Ok(found)
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use super::*;
	use serde_json::json;
	use warden_types::types::ManualClock;

	#[tokio::test]
	async fn test_set_get_remove() {
		let kv = MemoryKvAdapter::new();
		let key = KvKey::from(["tenant", "acme"]);

		kv.set(&key, json!({"name": "Acme"}), None).await.unwrap();
		assert_eq!(kv.get(&key).await.unwrap(), Some(json!({"name": "Acme"})));

		kv.remove(&key).await.unwrap();
		assert_eq!(kv.get(&key).await.unwrap(), None);
		// Removal is idempotent
		kv.remove(&key).await.unwrap();
	}

	#[tokio::test]
	async fn test_ttl_expiry_is_lazy() {
		let clock = Arc::new(ManualClock::new(Timestamp(0)));
		let kv = MemoryKvAdapter::with_clock(clock.clone());
		let key = KvKey::from(["session", "browser", "t1", "s1"]);

		kv.set(&key, json!(1), Some(60)).await.unwrap();
		assert!(kv.get(&key).await.unwrap().is_some());

		clock.advance_seconds(59);
		assert!(kv.get(&key).await.unwrap().is_some());

		clock.advance_seconds(2);
		assert!(kv.get(&key).await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_scan_prefix_and_expiry() {
		let clock = Arc::new(ManualClock::new(Timestamp(0)));
		let kv = MemoryKvAdapter::with_clock(clock.clone());

		kv.set(&KvKey::from(["tenant", "a"]), json!("a"), None).await.unwrap();
		kv.set(&KvKey::from(["tenant", "b"]), json!("b"), Some(10)).await.unwrap();
		kv.set(&KvKey::from(["tenant", "domain", "x.com"]), json!("a"), None).await.unwrap();
		kv.set(&KvKey::from(["other", "z"]), json!("z"), None).await.unwrap();

		let all = kv.scan(&KvKey::from(["tenant"])).await.unwrap();
		assert_eq!(all.len(), 3);

		clock.advance_seconds(11);
		let after = kv.scan(&KvKey::from(["tenant"])).await.unwrap();
		assert_eq!(after.len(), 2);
	}

	#[tokio::test]
	async fn test_legacy_encoding_read() {
		let kv = MemoryKvAdapter::new();
		let key = KvKey::from(["tenant", "legacy-co"]);

		kv.insert_legacy(&key, json!({"old": true}), None);

		// get finds the legacy-encoded row
		assert_eq!(kv.get(&key).await.unwrap(), Some(json!({"old": true})));

		// scan finds it too
		let found = kv.scan(&KvKey::from(["tenant"])).await.unwrap();
		assert_eq!(found.len(), 1);
		assert_eq!(found[0].0, key);

		// rewriting migrates to the current encoding without duplicating
		kv.set(&key, json!({"old": false}), None).await.unwrap();
		let found = kv.scan(&KvKey::from(["tenant"])).await.unwrap();
		assert_eq!(found.len(), 1);
		assert_eq!(found[0].1, json!({"old": false}));
	}
}

// vim: ts=4
