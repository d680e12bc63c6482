//! Tenant resolution from request surface.
//!
//! Strategies run in strict priority order: custom domain, subdomain,
//! path prefix, header, query parameter. The first strategy producing a
//! tentative id wins; the registry is then consulted exactly once. A
//! suspended or deleted tenant fails the resolution outright, it never
//! falls through to a lower-priority strategy.

use axum::http::HeaderMap;
use std::sync::Arc;

use crate::prelude::*;
use crate::tenant::registry::TenantRegistry;
use warden_types::tenant::{Tenant, TenantStatus};

#[derive(Debug, Clone)]
pub struct ResolverConfig {
	/// Base domain of the deployment; enables subdomain resolution and
	/// excludes itself from custom-domain matching
	pub base_domain: Option<Box<str>>,
	/// Path prefix for path-based resolution
	pub path_prefix: Box<str>,
	/// Header carrying an explicit tenant id
	pub header_name: Box<str>,
	/// Query parameter carrying an explicit tenant id
	pub query_param: Box<str>,
	/// In optional mode the absence of any match is not an error
	pub required: bool,
}

impl Default for ResolverConfig {
	fn default() -> Self {
		Self {
			base_domain: None,
			path_prefix: "/tenants".into(),
			header_name: "X-Tenant-ID".into(),
			query_param: "tenant".into(),
			required: false,
		}
	}
}

/// The request data tenant resolution looks at
#[derive(Debug)]
pub struct RequestSurface<'a> {
	pub host: Option<&'a str>,
	pub path: &'a str,
	pub headers: &'a HeaderMap,
	pub query: Option<&'a str>,
}

#[derive(Debug)]
pub struct TenantResolver {
	registry: Arc<TenantRegistry>,
	config: ResolverConfig,
}

impl TenantResolver {
	pub fn new(registry: Arc<TenantRegistry>, config: ResolverConfig) -> Self {
		Self { registry, config }
	}

	pub async fn resolve(&self, surface: &RequestSurface<'_>) -> WdResult<Option<Tenant>> {
		let host = surface.host.map(normalize_host);

		// 1. Custom domain: the Host equals a registered tenant domain.
		// The base domain and anything under it never match here.
		if let Some(ref host) = host {
			if !self.is_base_or_subdomain(host) {
				if let Some(tenant) = self.registry.get_by_domain(host).await? {
					return Self::gate(tenant).map(Some);
				}
			}
		}

		// 2-5. Strategies producing a tentative id
		let candidate = self
			.subdomain_candidate(host.as_deref())
			.or_else(|| self.path_candidate(surface.path))
			.or_else(|| self.header_candidate(surface.headers))
			.or_else(|| self.query_candidate(surface.query));

		let Some(candidate) = candidate else {
			if self.config.required {
				return Err(Error::validation(
					"invalid_request",
					"No tenant could be resolved from the request",
				));
			}
			return Ok(None);
		};

		let tenant = self
			.registry
			.get(&candidate)
			.await?
			.ok_or(Error::not_found("tenant_not_found"))?;
		Self::gate(tenant).map(Some)
	}

	/// Suspended and deleted tenants fail resolution; active and pending
	/// proceed
	fn gate(tenant: Tenant) -> WdResult<Tenant> {
		match tenant.status {
			TenantStatus::Suspended => {
				Err(Error::forbidden("tenant_suspended", "Tenant is suspended"))
			}
			TenantStatus::Deleted => Err(Error::forbidden("tenant_deleted", "Tenant is deleted")),
			TenantStatus::Active | TenantStatus::Pending => Ok(tenant),
		}
	}

	fn is_base_or_subdomain(&self, host: &str) -> bool {
		match self.config.base_domain.as_deref() {
			Some(base) => host == base || host.ends_with(&format!(".{base}")),
			None => false,
		}
	}

	/// `{label}.{base_domain}` where the label itself contains no dot
	fn subdomain_candidate(&self, host: Option<&str>) -> Option<String> {
		let host = host?;
		let base = self.config.base_domain.as_deref()?;
		let label = host.strip_suffix(&format!(".{base}"))?;
		if label.is_empty() || label.contains('.') {
			return None;
		}
		Some(label.to_string())
	}

	/// `{prefix}/{id}` or `{prefix}/{id}/…`
	fn path_candidate(&self, path: &str) -> Option<String> {
		let rest = path.strip_prefix(self.config.path_prefix.as_ref())?;
		let rest = rest.strip_prefix('/')?;
		let id = rest.split('/').next()?;
		if id.is_empty() { None } else { Some(id.to_string()) }
	}

	fn header_candidate(&self, headers: &HeaderMap) -> Option<String> {
		headers
			.get(self.config.header_name.as_ref())
			.and_then(|v| v.to_str().ok())
			.map(str::trim)
			.filter(|v| !v.is_empty())
			.map(ToString::to_string)
	}

	fn query_candidate(&self, query: Option<&str>) -> Option<String> {
		let query = query?;
		for pair in query.split('&') {
			let mut parts = pair.splitn(2, '=');
			let key = parts.next()?;
			if key == self.config.query_param.as_ref() {
				let value = parts.next().unwrap_or_default();
				if !value.is_empty() {
					return Some(value.to_string());
				}
			}
		}
		None
	}
}

/// Lowercase and strip the port from a Host header value
fn normalize_host(host: &str) -> String {
	let host = host.trim().to_lowercase();
	match host.rsplit_once(':') {
		Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name.to_string(),
		_ => host,
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use super::*;
	use warden_kv_adapter_memory::MemoryKvAdapter;
	use warden_types::tenant::CreateTenantData;

	async fn setup(required: bool) -> TenantResolver {
		let kv = Arc::new(MemoryKvAdapter::new());
		let registry = Arc::new(TenantRegistry::new(kv, None, Arc::new(SystemClock)));

		registry
			.create(CreateTenantData {
				id: "acme",
				name: "Acme",
				domain: Some("auth.acme.com"),
				..Default::default()
			})
			.await
			.unwrap();
		registry
			.create(CreateTenantData { id: "globex", name: "Globex", ..Default::default() })
			.await
			.unwrap();

		TenantResolver::new(
			registry,
			ResolverConfig {
				base_domain: Some("id.example.com".into()),
				required,
				..Default::default()
			},
		)
	}

	fn surface<'a>(
		host: Option<&'a str>,
		path: &'a str,
		headers: &'a HeaderMap,
		query: Option<&'a str>,
	) -> RequestSurface<'a> {
		RequestSurface { host, path, headers, query }
	}

	#[tokio::test]
	async fn test_custom_domain_wins() {
		let resolver = setup(false).await;
		let headers = HeaderMap::new();
		let tenant = resolver
			.resolve(&surface(Some("AUTH.ACME.COM:443"), "/", &headers, None))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(tenant.id.as_ref(), "acme");
	}

	#[tokio::test]
	async fn test_subdomain_label() {
		let resolver = setup(false).await;
		let headers = HeaderMap::new();
		let tenant = resolver
			.resolve(&surface(Some("globex.id.example.com"), "/", &headers, None))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(tenant.id.as_ref(), "globex");

		// Nested labels are not subdomain candidates
		let none = resolver
			.resolve(&surface(Some("a.b.id.example.com"), "/", &headers, None))
			.await
			.unwrap();
		assert!(none.is_none());
	}

	#[tokio::test]
	async fn test_path_header_query_priority() {
		let resolver = setup(false).await;
		let headers = HeaderMap::new();

		let by_path = resolver
			.resolve(&surface(None, "/tenants/acme/authorize", &headers, None))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(by_path.id.as_ref(), "acme");

		let mut with_header = HeaderMap::new();
		with_header.insert("X-Tenant-ID", "globex".parse().unwrap());
		// Path beats header
		let tenant = resolver
			.resolve(&surface(None, "/tenants/acme", &with_header, Some("tenant=globex")))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(tenant.id.as_ref(), "acme");

		let by_query = resolver
			.resolve(&surface(None, "/", &headers, Some("tenant=globex")))
			.await
			.unwrap()
			.unwrap();
		assert_eq!(by_query.id.as_ref(), "globex");
	}

	#[tokio::test]
	async fn test_suspended_never_falls_through() {
		let resolver = setup(false).await;
		resolver
			.registry
			.update(
				"acme",
				crate::tenant::registry::UpdateTenantData {
					status: Some(TenantStatus::Suspended),
					..Default::default()
				},
			)
			.await
			.unwrap();

		let headers = HeaderMap::new();
		// Query names another (healthy) tenant, but the higher-priority
		// path match fails hard
		let err = resolver
			.resolve(&surface(None, "/tenants/acme", &headers, Some("tenant=globex")))
			.await
			.unwrap_err();
		assert_eq!(err.code(), Some("tenant_suspended"));
	}

	#[tokio::test]
	async fn test_optional_and_required_modes() {
		let headers = HeaderMap::new();

		let optional = setup(false).await;
		assert!(optional.resolve(&surface(None, "/", &headers, None)).await.unwrap().is_none());

		let required = setup(true).await;
		let err = required.resolve(&surface(None, "/", &headers, None)).await.unwrap_err();
		assert_eq!(err.code(), Some("invalid_request"));
	}

	#[tokio::test]
	async fn test_unknown_candidate_fails() {
		let resolver = setup(false).await;
		let headers = HeaderMap::new();
		let err = resolver
			.resolve(&surface(None, "/tenants/nonesuch", &headers, None))
			.await
			.unwrap_err();
		assert_eq!(err.code(), Some("tenant_not_found"));
	}
}

// vim: ts=4
