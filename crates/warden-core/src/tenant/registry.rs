//! Tenant registry: CRUD, domain secondary index, soft delete.
//!
//! The KV store is authoritative. Rows live at `tenant/{id}`; the domain
//! index at `tenant/domain/{domain}` maps a lowercased hostname to the
//! owning tenant id. When a relational store is configured every mutation
//! is mirrored there after the KV write (fire and forget) so admin
//! listing can use a single indexed query.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::prelude::*;
use warden_types::kv_adapter::{self, KvAdapter};
use warden_types::kv_key::KvKey;
use warden_types::store_adapter::StoreAdapter;
use warden_types::tenant::{
	CreateTenantData, ListTenantsOptions, Tenant, TenantBranding, TenantSettings, TenantStatus,
};

const TENANT_ID_MAX_LEN: usize = 50;
const KEY_ROOT: &str = "tenant";
const KEY_DOMAIN: &str = "domain";

/// Value stored under a domain index entry
#[derive(Debug, Serialize, Deserialize)]
struct DomainIndexEntry {
	#[serde(rename = "tenantId")]
	tenant_id: Box<str>,
}

/// Partial update of a tenant
#[derive(Debug, Default)]
pub struct UpdateTenantData<'a> {
	pub name: Option<&'a str>,
	/// `Missing` leaves the domain alone, `Null` clears it
	pub domain: Patch<&'a str>,
	pub status: Option<TenantStatus>,
	pub branding: Option<TenantBranding>,
	pub settings: Option<TenantSettings>,
}

#[derive(Debug)]
pub struct TenantRegistry {
	kv: Arc<dyn KvAdapter>,
	store: Option<Arc<dyn StoreAdapter>>,
	clock: Arc<dyn Clock>,
}

fn key_tenant(id: &str) -> KvKey {
	KvKey::from([KEY_ROOT, id])
}

fn key_domain(domain: &str) -> KvKey {
	KvKey::from([KEY_ROOT, KEY_DOMAIN, domain])
}

/// Tenant ids are opaque but bounded: `[A-Za-z0-9_-]+`, at most 50 chars
pub fn validate_tenant_id(id: &str) -> WdResult<()> {
	if id.is_empty() || id.len() > TENANT_ID_MAX_LEN {
		return Err(Error::validation("invalid_tenant_id", "Tenant id must be 1-50 characters"));
	}
	if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
		return Err(Error::validation(
			"invalid_tenant_id",
			"Tenant id may only contain letters, digits, '_' and '-'",
		));
	}
	Ok(())
}

fn normalize_domain(domain: &str) -> Box<str> {
	domain.trim().to_lowercase().into_boxed_str()
}

impl TenantRegistry {
	pub fn new(
		kv: Arc<dyn KvAdapter>,
		store: Option<Arc<dyn StoreAdapter>>,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self { kv, store, clock }
	}

	pub async fn create(&self, data: CreateTenantData<'_>) -> WdResult<Tenant> {
		validate_tenant_id(data.id)?;

		let name = data.name.trim();
		if name.is_empty() {
			return Err(Error::validation("invalid_tenant_id", "Tenant name must not be empty"));
		}

		if self.kv.get(&key_tenant(data.id)).await?.is_some() {
			return Err(Error::validation("invalid_tenant_id", "Tenant id already exists"));
		}

		let domain = data.domain.map(normalize_domain);
		if let Some(ref domain) = domain {
			if self.kv.get(&key_domain(domain)).await?.is_some() {
				return Err(Error::conflict("domain_already_exists", "Domain already in use"));
			}
		}

		let now = self.clock.now();
		let tenant = Tenant {
			id: Box::from(data.id),
			name: Box::from(name),
			domain: domain.clone(),
			status: TenantStatus::Active,
			branding: data.branding.unwrap_or_default(),
			settings: data.settings.unwrap_or_default(),
			created_at: now,
			updated_at: now,
		};

		kv_adapter::set_json(self.kv.as_ref(), &key_tenant(&tenant.id), &tenant, None).await?;
		if let Some(ref domain) = domain {
			kv_adapter::set_json(
				self.kv.as_ref(),
				&key_domain(domain),
				&DomainIndexEntry { tenant_id: tenant.id.clone() },
				None,
			)
			.await?;
		}

		self.mirror(&tenant);
		info!(tenant = %tenant.id, "Tenant created");
		Ok(tenant)
	}

	pub async fn get(&self, id: &str) -> WdResult<Option<Tenant>> {
		kv_adapter::get_json(self.kv.as_ref(), &key_tenant(id)).await
	}

	pub async fn get_by_domain(&self, domain: &str) -> WdResult<Option<Tenant>> {
		let domain = normalize_domain(domain);
		let Some(entry) =
			kv_adapter::get_json::<DomainIndexEntry>(self.kv.as_ref(), &key_domain(&domain))
				.await?
		else {
			return Ok(None);
		};

		match self.get(&entry.tenant_id).await? {
			Some(tenant) => Ok(Some(tenant)),
			None => {
				// Index row survived a crashed mutation; self-heal
				debug!(domain = %domain, "Dropping stale domain index entry");
				self.kv.remove(&key_domain(&domain)).await?;
				Ok(None)
			}
		}
	}

	pub async fn update(&self, id: &str, data: UpdateTenantData<'_>) -> WdResult<Tenant> {
		let mut tenant =
			self.get(id).await?.ok_or(Error::not_found("tenant_not_found"))?;

		if let Some(name) = data.name {
			let name = name.trim();
			if name.is_empty() {
				return Err(Error::validation(
					"invalid_request",
					"Tenant name must not be empty",
				));
			}
			tenant.name = Box::from(name);
		}

		if let Some(new_domain) = data.domain.into_change() {
			let new_domain = new_domain.map(normalize_domain);
			if new_domain != tenant.domain {
				// Uniqueness is validated only when the domain changes
				if let Some(ref domain) = new_domain {
					let holder = kv_adapter::get_json::<DomainIndexEntry>(
						self.kv.as_ref(),
						&key_domain(domain),
					)
					.await?;
					if holder.is_some_and(|e| e.tenant_id.as_ref() != id) {
						return Err(Error::conflict(
							"domain_already_exists",
							"Domain already in use",
						));
					}
				}
				// Rewrite the index: delete-then-set
				if let Some(ref old) = tenant.domain {
					self.kv.remove(&key_domain(old)).await?;
				}
				if let Some(ref domain) = new_domain {
					kv_adapter::set_json(
						self.kv.as_ref(),
						&key_domain(domain),
						&DomainIndexEntry { tenant_id: tenant.id.clone() },
						None,
					)
					.await?;
				}
				tenant.domain = new_domain;
			}
		}

		if let Some(status) = data.status {
			tenant.status = status;
		}
		if let Some(branding) = data.branding {
			tenant.branding = branding;
		}
		if let Some(settings) = data.settings {
			tenant.settings = settings;
		}

		tenant.updated_at = self.clock.now();
		kv_adapter::set_json(self.kv.as_ref(), &key_tenant(id), &tenant, None).await?;

		self.mirror(&tenant);
		Ok(tenant)
	}

	/// Soft delete: the row survives with `status=deleted`, the domain
	/// index entry is dropped so the domain becomes reusable.
	pub async fn delete(&self, id: &str) -> WdResult<()> {
		let mut tenant =
			self.get(id).await?.ok_or(Error::not_found("tenant_not_found"))?;

		if let Some(ref domain) = tenant.domain {
			self.kv.remove(&key_domain(domain)).await?;
		}

		tenant.status = TenantStatus::Deleted;
		tenant.updated_at = self.clock.now();
		kv_adapter::set_json(self.kv.as_ref(), &key_tenant(id), &tenant, None).await?;

		self.mirror(&tenant);
		info!(tenant = %id, "Tenant deleted");
		Ok(())
	}

	pub async fn list(&self, opts: &ListTenantsOptions) -> WdResult<Vec<Tenant>> {
		if let Some(ref store) = self.store {
			return store.list_tenants(opts).await;
		}

		// KV fallback: scan the tenant root and drop index rows, which
		// are recognizable by their key length (tenant/domain/{domain}
		// has three segments, a tenant row two)
		let entries = self.kv.scan(&KvKey::from([KEY_ROOT])).await?;
		let mut tenants: Vec<Tenant> = entries
			.into_iter()
			.filter(|(key, _)| key.len() == 2)
			.filter_map(|(_, value)| serde_json::from_value(value).ok())
			.filter(|t: &Tenant| opts.status.is_none_or(|s| t.status == s))
			.collect();
		tenants.sort_by(|a, b| a.id.cmp(&b.id));

		let offset = opts.offset as usize;
		let limit = opts.limit_or_default() as usize;
		Ok(tenants.into_iter().skip(offset).take(limit).collect())
	}

	/// Mirror a mutation into the relational store. The KV write is
	/// canonical; relational failures are logged and swallowed.
	fn mirror(&self, tenant: &Tenant) {
		if let Some(store) = self.store.clone() {
			let tenant = tenant.clone();
			tokio::spawn(async move {
				if let Err(err) = store.upsert_tenant(&tenant).await {
					warn!(tenant = %tenant.id, error = ?err, "Tenant mirror write failed");
				}
			});
		}
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use super::*;
	use warden_kv_adapter_memory::MemoryKvAdapter;

	fn registry() -> TenantRegistry {
		TenantRegistry::new(Arc::new(MemoryKvAdapter::new()), None, Arc::new(SystemClock))
	}

	#[tokio::test]
	async fn test_create_and_get_by_domain_case_insensitive() {
		let reg = registry();
		let tenant = reg
			.create(CreateTenantData {
				id: "acme",
				name: "Acme",
				domain: Some("AUTH.ACME.COM"),
				..Default::default()
			})
			.await
			.unwrap();

		assert_eq!(tenant.domain.as_deref(), Some("auth.acme.com"));
		assert_eq!(tenant.status, TenantStatus::Active);

		let by_domain = reg.get_by_domain("auth.acme.com").await.unwrap().unwrap();
		assert_eq!(by_domain.id.as_ref(), "acme");
		let by_upper = reg.get_by_domain("AUTH.ACME.COM").await.unwrap().unwrap();
		assert_eq!(by_upper.id.as_ref(), "acme");
	}

	#[tokio::test]
	async fn test_create_validations() {
		let reg = registry();

		let bad_id = reg
			.create(CreateTenantData { id: "no spaces", name: "X", ..Default::default() })
			.await;
		assert_eq!(bad_id.unwrap_err().code(), Some("invalid_tenant_id"));

		let empty_name = reg
			.create(CreateTenantData { id: "ok", name: "  ", ..Default::default() })
			.await;
		assert_eq!(empty_name.unwrap_err().code(), Some("invalid_tenant_id"));

		reg.create(CreateTenantData { id: "dup", name: "A", ..Default::default() })
			.await
			.unwrap();
		let dup = reg
			.create(CreateTenantData { id: "dup", name: "B", ..Default::default() })
			.await;
		assert_eq!(dup.unwrap_err().code(), Some("invalid_tenant_id"));
	}

	#[tokio::test]
	async fn test_domain_conflict() {
		let reg = registry();
		reg.create(CreateTenantData {
			id: "a",
			name: "A",
			domain: Some("x.example.com"),
			..Default::default()
		})
		.await
		.unwrap();

		let clash = reg
			.create(CreateTenantData {
				id: "b",
				name: "B",
				domain: Some("X.EXAMPLE.COM"),
				..Default::default()
			})
			.await;
		assert_eq!(clash.unwrap_err().code(), Some("domain_already_exists"));
	}

	#[tokio::test]
	async fn test_update_domain_rewrites_index() {
		let reg = registry();
		reg.create(CreateTenantData {
			id: "a",
			name: "A",
			domain: Some("old.example.com"),
			..Default::default()
		})
		.await
		.unwrap();

		reg.update(
			"a",
			UpdateTenantData { domain: Patch::Value("new.example.com"), ..Default::default() },
		)
		.await
		.unwrap();

		assert!(reg.get_by_domain("old.example.com").await.unwrap().is_none());
		assert_eq!(
			reg.get_by_domain("new.example.com").await.unwrap().unwrap().id.as_ref(),
			"a"
		);

		// The freed domain is reusable
		reg.create(CreateTenantData {
			id: "b",
			name: "B",
			domain: Some("old.example.com"),
			..Default::default()
		})
		.await
		.unwrap();
	}

	#[tokio::test]
	async fn test_soft_delete_frees_domain() {
		let reg = registry();
		reg.create(CreateTenantData {
			id: "a",
			name: "A",
			domain: Some("a.example.com"),
			..Default::default()
		})
		.await
		.unwrap();

		reg.delete("a").await.unwrap();

		let tenant = reg.get("a").await.unwrap().unwrap();
		assert_eq!(tenant.status, TenantStatus::Deleted);
		assert!(reg.get_by_domain("a.example.com").await.unwrap().is_none());

		// Domain can be claimed again
		reg.create(CreateTenantData {
			id: "b",
			name: "B",
			domain: Some("a.example.com"),
			..Default::default()
		})
		.await
		.unwrap();
	}

	#[tokio::test]
	async fn test_list_filters_out_index_rows() {
		let reg = registry();
		for i in 0..3 {
			let id = format!("t{i}");
			let domain = format!("t{i}.example.com");
			reg.create(CreateTenantData {
				id: &id,
				name: "T",
				domain: Some(&domain),
				..Default::default()
			})
			.await
			.unwrap();
		}
		reg.delete("t1").await.unwrap();

		let all = reg.list(&ListTenantsOptions::default()).await.unwrap();
		assert_eq!(all.len(), 3);

		let active = reg
			.list(&ListTenantsOptions {
				status: Some(TenantStatus::Active),
				..Default::default()
			})
			.await
			.unwrap();
		assert_eq!(active.len(), 2);
	}
}

// vim: ts=4
