//! Key discovery and generation with single-flight coordination.
//!
//! Both roles store key pairs at `{prefix}/{key_id}` in the (unscoped)
//! KV store. The reserved id `"primary"` denotes the active key and is
//! the cross-process convergence point: racing nodes may each write it
//! once, subsequent readers all see the last writer's key, and both keys
//! remain verifiable through the JWKS set.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::sync::Arc;

use crate::keygen;
use crate::prelude::*;
use warden_types::kv_adapter::{self, KvAdapter};
use warden_types::kv_key::KvKey;
use warden_types::worker::WorkerPool;

/// Reserved id of the active key per role; bounds churn under concurrent
/// generation
pub const PRIMARY_KEY_ID: &str = "primary";

/// Storage prefix of the retired ES384 key family
const LEGACY_SIGNING_PREFIX: &str = "legacy:signing:key";

/// Fixed past timestamp stamped on legacy keys: usable for verification,
/// never selected for signing
const LEGACY_EXPIRED_AT: Timestamp = Timestamp(946_684_800_000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyRole {
	Signing,
	Encryption,
}

impl KeyRole {
	pub fn prefix(self) -> &'static str {
		match self {
			KeyRole::Signing => "signing:key",
			KeyRole::Encryption => "encryption:key",
		}
	}

	pub fn alg(self) -> &'static str {
		match self {
			KeyRole::Signing => "ES256",
			KeyRole::Encryption => "RSA-OAEP-512",
		}
	}
}

/// A stored key pair. The JWK form is derived on export, not persisted.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPairRecord {
	pub id: Box<str>,
	pub alg: Box<str>,
	pub public_pem: Box<str>,
	#[serde(skip_serializing_if = "str::is_empty", default)]
	pub private_pem: Box<str>,
	pub created: Timestamp,
	pub expired: Option<Timestamp>,
}

impl KeyPairRecord {
	pub fn is_expired(&self, now: Timestamp) -> bool {
		self.expired.is_some_and(|at| now >= at)
	}
}

type FlightKey = (usize, KeyRole);

#[derive(Debug)]
pub struct KeyManager {
	kv: Arc<dyn KvAdapter>,
	worker: Arc<WorkerPool>,
	clock: Arc<dyn Clock>,
	/// Process-local single-flight guards per (storage identity, role)
	inflight: DashMap<FlightKey, Arc<tokio::sync::Mutex<()>>>,
}

fn key_for(role: KeyRole, key_id: &str) -> KvKey {
	KvKey::from([role.prefix(), key_id])
}

impl KeyManager {
	pub fn new(kv: Arc<dyn KvAdapter>, worker: Arc<WorkerPool>, clock: Arc<dyn Clock>) -> Self {
		Self { kv, worker, clock, inflight: DashMap::new() }
	}

	/// All usable key pairs for a role, newest first; generates the first
	/// pair when none exists.
	///
	/// Fast path: an unexpired `"primary"`. Slow path: scan the role
	/// prefix (individually corrupt rows are logged and skipped). Only
	/// when nothing unexpired exists is a new pair generated.
	pub async fn get_keys(&self, role: KeyRole) -> WdResult<Vec<KeyPairRecord>> {
		if let Some(primary) = self.read_primary(role).await? {
			return Ok(vec![primary]);
		}

		let mut known = self.scan_role(role).await?;
		if known.iter().any(|k| !k.is_expired(self.clock.now())) {
			return Ok(known);
		}

		let generated = self.generate_coalesced(role).await?;
		// The write went to the primary slot; drop the stale row it
		// replaced from the result
		known.retain(|k| k.id != generated.id);
		known.insert(0, generated);
		Ok(known)
	}

	/// The key used for new signatures/encryptions
	pub async fn get_active_key(&self, role: KeyRole) -> WdResult<KeyPairRecord> {
		let now = self.clock.now();
		self.get_keys(role)
			.await?
			.into_iter()
			.find(|k| !k.is_expired(now))
			.ok_or_else(|| Error::Crypto("no usable key available".into()))
	}

	/// Keys of the retired ES384 family. Every pair comes back expired at
	/// a fixed past timestamp so it can verify old signatures but is
	/// never picked for signing.
	pub async fn load_legacy_signing_keys(&self) -> WdResult<Vec<KeyPairRecord>> {
		let entries = self.kv.scan(&KvKey::from([LEGACY_SIGNING_PREFIX])).await?;
		let mut keys = Vec::with_capacity(entries.len());
		for (key, value) in entries {
			match serde_json::from_value::<KeyPairRecord>(value) {
				Ok(mut record) => {
					record.alg = "ES384".into();
					record.expired = Some(LEGACY_EXPIRED_AT);
					keys.push(record);
				}
				Err(err) => {
					warn!(key = %key, error = %err, "Skipping undecodable legacy key");
				}
			}
		}
		Ok(keys)
	}

	async fn read_primary(&self, role: KeyRole) -> WdResult<Option<KeyPairRecord>> {
		let record = kv_adapter::get_json::<KeyPairRecord>(
			self.kv.as_ref(),
			&key_for(role, PRIMARY_KEY_ID),
		)
		.await?;
		Ok(record.filter(|r| !r.is_expired(self.clock.now())))
	}

	/// Scan a role prefix, newest first, skipping rows that fail to
	/// deserialize
	async fn scan_role(&self, role: KeyRole) -> WdResult<Vec<KeyPairRecord>> {
		let entries = self.kv.scan(&KvKey::from([role.prefix()])).await?;
		let mut keys = Vec::with_capacity(entries.len());
		for (key, value) in entries {
			match serde_json::from_value::<KeyPairRecord>(value) {
				Ok(record) => keys.push(record),
				Err(err) => {
					warn!(key = %key, error = %err, "Skipping undecodable key pair");
				}
			}
		}
		keys.sort_by(|a, b| b.created.cmp(&a.created));
		Ok(keys)
	}

	/// Generate the primary key for a role, coalescing concurrent callers
	/// within this process. Exactly one caller generates; the rest
	/// re-read what it wrote. The guard entry is removed on settle.
	async fn generate_coalesced(&self, role: KeyRole) -> WdResult<KeyPairRecord> {
		let flight: FlightKey = (Arc::as_ptr(&self.kv).cast::<()>() as usize, role);
		let guard = self
			.inflight
			.entry(flight)
			.or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
			.clone();

		let result = {
			let _held = guard.lock().await;

			// A coalesced caller finds the winner's key already persisted
			match self.read_primary(role).await? {
				Some(primary) => Ok(primary),
				None => self.generate_and_persist(role).await,
			}
		};

		self.inflight.remove(&flight);
		result
	}

	async fn generate_and_persist(&self, role: KeyRole) -> WdResult<KeyPairRecord> {
		info!(role = role.prefix(), "Generating new {} key pair", role.alg());

		let pair = match role {
			KeyRole::Signing => {
				self.worker.try_run_urgent(keygen::generate_signing_key_sync).await?
			}
			KeyRole::Encryption => {
				self.worker.try_run_background(keygen::generate_encryption_key_sync).await?
			}
		};

		let record = KeyPairRecord {
			id: PRIMARY_KEY_ID.into(),
			alg: role.alg().into(),
			public_pem: pair.public_pem,
			private_pem: pair.private_pem,
			created: self.clock.now(),
			expired: None,
		};

		kv_adapter::set_json(self.kv.as_ref(), &key_for(role, PRIMARY_KEY_ID), &record, None)
			.await?;

		// Re-read: under a cross-process race the last writer wins and
		// everyone converges on its key
		match self.read_primary(role).await {
			Ok(Some(persisted)) => Ok(persisted),
			Ok(None) | Err(_) => {
				warn!(
					role = role.prefix(),
					"Re-read of freshly written primary key failed; using local copy"
				);
				Ok(record)
			}
		}
	}
}


// vim: ts=4
