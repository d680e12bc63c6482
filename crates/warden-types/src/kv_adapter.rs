//! Adapter over an ordered key-value store with TTL and prefix scan.

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::fmt::Debug;

use crate::kv_key::KvKey;
use crate::prelude::*;

/// A Warden KV adapter
///
/// Keys are ordered sequences of string segments; values are opaque JSON
/// records. `set` and `remove` are idempotent. `scan` yields every entry
/// whose key starts with `prefix`, regardless of which key encoding the
/// entry was written under.
#[async_trait]
pub trait KvAdapter: Debug + Send + Sync {
	async fn get(&self, key: &KvKey) -> WdResult<Option<Value>>;
	async fn set(&self, key: &KvKey, value: Value, ttl_seconds: Option<u32>) -> WdResult<()>;
	async fn remove(&self, key: &KvKey) -> WdResult<()>;
	async fn scan(&self, prefix: &KvKey) -> WdResult<Vec<(KvKey, Value)>>;
}

/// Read a key and deserialize the value into `T`
pub async fn get_json<T: DeserializeOwned>(
	kv: &dyn KvAdapter,
	key: &KvKey,
) -> WdResult<Option<T>> {
	match kv.get(key).await? {
		Some(value) => Ok(Some(serde_json::from_value(value)?)),
		None => Ok(None),
	}
}

/// Serialize `value` and write it under `key`
pub async fn set_json<T: Serialize>(
	kv: &dyn KvAdapter,
	key: &KvKey,
	value: &T,
	ttl_seconds: Option<u32>,
) -> WdResult<()> {
	kv.set(key, serde_json::to_value(value)?, ttl_seconds).await
}

// vim: ts=4
