//! Tenant-scoped OAuth client lifecycle.
//!
//! Every store access goes through the resilience wrapper. Read paths
//! degrade to `None` while the circuit is open, which keeps client
//! lookup available during a relational outage; write paths propagate.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::future::Future;
use std::sync::Arc;

use crate::prelude::*;
use crate::secret;
use warden_core::resilience::Resilient;
use warden_types::client::{
	ClientPage, CreateClientData, CreatedClient, ListClientsOptions, OAuthClient,
	UpdateClientData,
};
use warden_types::store_adapter::StoreAdapter;
use warden_types::worker::WorkerPool;

const MAX_PAGE: u32 = 100;
const DEFAULT_PAGE: u32 = 20;
const MAX_NAME_LEN: usize = 255;

const KNOWN_GRANT_TYPES: &[&str] =
	&["authorization_code", "refresh_token", "client_credentials"];

#[derive(Debug)]
pub struct ClientRegistry {
	store: Arc<dyn StoreAdapter>,
	resilient: Resilient,
	worker: Arc<WorkerPool>,
	clock: Arc<dyn Clock>,
}

impl ClientRegistry {
	pub fn new(
		store: Arc<dyn StoreAdapter>,
		resilient: Resilient,
		worker: Arc<WorkerPool>,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self { store, resilient, worker, clock }
	}

	/// Current breaker state of the backing store, for health reporting
	pub fn breaker_state(&self) -> warden_core::resilience::BreakerState {
		self.resilient.breaker().state()
	}

	// Lifecycle //
	//***********//

	/// Create a client. The plaintext secret is returned here and never
	/// again.
	pub async fn create_client(
		&self,
		tenant_id: &str,
		data: CreateClientData<'_>,
	) -> WdResult<CreatedClient> {
		let name = validate_name(data.name)?;
		validate_grant_types(data.grant_types)?;
		validate_scopes(data.scopes)?;
		validate_redirect_uris(data.redirect_uris)?;
		let metadata = validate_metadata(data.metadata)?;

		self.ensure_name_free(tenant_id, &name, None).await?;

		let plaintext = secret::generate_secret();
		let secret_hash = secret::hash_secret(&self.worker, plaintext.clone()).await?;

		let now = self.clock.now();
		let client = OAuthClient {
			id: uuid::Uuid::new_v4().to_string().into_boxed_str(),
			tenant_id: Box::from(tenant_id),
			name,
			client_secret_hash: secret_hash,
			previous_secret_hash: None,
			previous_secret_expires_at: None,
			rotated_at: None,
			grant_types: data.grant_types.iter().map(|s| Box::from(*s)).collect(),
			scopes: data.scopes.iter().map(|s| Box::from(*s)).collect(),
			redirect_uris: data.redirect_uris.iter().map(|s| Box::from(*s)).collect(),
			metadata,
			enabled: true,
			created_at: now,
			updated_at: now,
		};

		self.resilient.run(|| self.store.insert_client(&client)).await?;
		info!(tenant = tenant_id, client = %client.id, "OAuth client created");
		Ok(CreatedClient { client, secret: plaintext })
	}

	/// Tenant-scoped read, degrading to `None` while the circuit is open
	pub async fn get_client(
		&self,
		client_id: &str,
		tenant_id: &str,
	) -> WdResult<Option<OAuthClient>> {
		self.degraded_read(self.resilient.run(|| self.store.read_client(client_id, tenant_id)))
			.await
	}

	/// Cross-tenant read used only by token-exchange authentication
	pub async fn get_client_by_id(&self, client_id: &str) -> WdResult<Option<OAuthClient>> {
		self.degraded_read(self.resilient.run(|| self.store.read_client_by_id(client_id)))
			.await
	}

	pub async fn list_clients(
		&self,
		tenant_id: &str,
		limit: u32,
		cursor: Option<&str>,
		enabled: Option<bool>,
	) -> WdResult<ClientPage> {
		let limit = if limit == 0 { DEFAULT_PAGE } else { limit.min(MAX_PAGE) };
		let decoded_cursor = cursor.map(decode_cursor).transpose()?;

		let opts = ListClientsOptions {
			limit,
			cursor: decoded_cursor.as_deref(),
			enabled,
		};
		// The adapter fetches limit + 1 rows to answer has_more
		let mut rows =
			self.resilient.run(|| self.store.list_clients(tenant_id, &opts)).await?;

		let has_more = rows.len() as u32 > limit;
		rows.truncate(limit as usize);
		let next_cursor = if has_more {
			rows.last().map(|c| encode_cursor(c.created_at, &c.id))
		} else {
			None
		};

		Ok(ClientPage { clients: rows, has_more, next_cursor })
	}

	pub async fn update_client(
		&self,
		client_id: &str,
		tenant_id: &str,
		data: UpdateClientData<'_>,
	) -> WdResult<OAuthClient> {
		let validated_name = match data.name {
			Some(name) => {
				let name = validate_name(name)?;
				// Re-check uniqueness, excluding the client itself
				self.ensure_name_free(tenant_id, &name, Some(client_id)).await?;
				Some(name)
			}
			None => None,
		};
		if let Some(grant_types) = data.grant_types {
			validate_grant_types(grant_types)?;
		}
		if let Some(scopes) = data.scopes {
			validate_scopes(scopes)?;
		}
		if let Some(redirect_uris) = data.redirect_uris {
			validate_redirect_uris(redirect_uris)?;
		}
		let metadata = match data.metadata {
			Some(metadata) => Some(validate_metadata(Some(metadata))?),
			None => None,
		};

		let update = UpdateClientData {
			name: validated_name.as_deref(),
			grant_types: data.grant_types,
			scopes: data.scopes,
			redirect_uris: data.redirect_uris,
			metadata,
			enabled: data.enabled,
		};
		self.resilient
			.run(|| self.store.update_client(client_id, tenant_id, &update))
			.await?;

		self.resilient.run(|| self.store.read_client(client_id, tenant_id)).await
	}

	pub async fn delete_client(&self, client_id: &str, tenant_id: &str) -> WdResult<()> {
		self.resilient.run(|| self.store.delete_client(client_id, tenant_id)).await?;
		info!(tenant = tenant_id, client = client_id, "OAuth client deleted");
		Ok(())
	}

	// Secrets //
	//*********//

	/// Rotate the secret. The old secret keeps verifying until the grace
	/// period ends; the new plaintext is returned here and never again.
	pub async fn rotate_secret(
		&self,
		client_id: &str,
		tenant_id: &str,
		grace_period_seconds: i64,
	) -> WdResult<CreatedClient> {
		let current =
			self.resilient.run(|| self.store.read_client(client_id, tenant_id)).await?;

		let plaintext = secret::generate_secret();
		let new_hash = secret::hash_secret(&self.worker, plaintext.clone()).await?;

		let now = self.clock.now();
		let previous_expires_at = now.add_seconds(grace_period_seconds);
		self.resilient
			.run(|| {
				self.store.update_client_secret(
					client_id,
					tenant_id,
					&new_hash,
					Some(&current.client_secret_hash),
					Some(previous_expires_at),
					Some(now),
				)
			})
			.await?;

		let client =
			self.resilient.run(|| self.store.read_client(client_id, tenant_id)).await?;
		info!(tenant = tenant_id, client = client_id, "Client secret rotated");
		Ok(CreatedClient { client, secret: plaintext })
	}

	/// Authenticate a client by id and secret. Accepts the current
	/// secret, or the previous one while its grace window is open.
	pub async fn verify_credentials(
		&self,
		client_id: &str,
		client_secret: &str,
	) -> WdResult<Option<OAuthClient>> {
		let Some(client) = self.get_client_by_id(client_id).await? else {
			return Ok(None);
		};

		let current_ok = secret::verify_secret(
			&self.worker,
			Box::from(client_secret),
			client.client_secret_hash.clone(),
		)
		.await?;
		if current_ok {
			return Ok(Some(client));
		}

		let in_grace = client
			.previous_secret_expires_at
			.is_some_and(|expires| self.clock.now() < expires);
		if in_grace {
			if let Some(ref previous_hash) = client.previous_secret_hash {
				let previous_ok = secret::verify_secret(
					&self.worker,
					Box::from(client_secret),
					previous_hash.clone(),
				)
				.await?;
				if previous_ok {
					return Ok(Some(client));
				}
			}
		}

		Ok(None)
	}

	// Internals //
	//***********//

	async fn ensure_name_free(
		&self,
		tenant_id: &str,
		name: &str,
		exclude_client_id: Option<&str>,
	) -> WdResult<()> {
		match self
			.resilient
			.run(|| self.store.read_client_by_name(tenant_id, name))
			.await
		{
			Ok(existing) => {
				if exclude_client_id != Some(existing.id.as_ref()) {
					Err(Error::conflict(
						"client_name_conflict",
						"A client with this name already exists",
					))
				} else {
					Ok(())
				}
			}
			Err(Error::NotFound { .. }) => Ok(()),
			Err(err) => Err(err),
		}
	}

	/// Map an open circuit to a degraded `None`; not-found likewise
	async fn degraded_read(
		&self,
		fut: impl Future<Output = WdResult<OAuthClient>>,
	) -> WdResult<Option<OAuthClient>> {
		match fut.await {
			Ok(client) => Ok(Some(client)),
			Err(Error::NotFound { .. }) => Ok(None),
			Err(Error::CircuitOpen { .. }) => {
				warn!("Client lookup degraded: circuit open");
				Ok(None)
			}
			Err(err) => Err(err),
		}
	}
}

// Validation //
//************//

fn validate_name(name: &str) -> WdResult<Box<str>> {
	let name = name.trim();
	if name.is_empty() || name.len() > MAX_NAME_LEN {
		return Err(Error::validation(
			"invalid_request",
			"Client name must be 1-255 characters",
		));
	}
	Ok(Box::from(name))
}

fn validate_grant_types(grant_types: &[&str]) -> WdResult<()> {
	if grant_types.is_empty() {
		return Err(Error::validation("invalid_request", "At least one grant type is required"));
	}
	for grant in grant_types {
		if !KNOWN_GRANT_TYPES.contains(grant) {
			return Err(Error::validation(
				"invalid_request",
				format!("Unknown grant type: {grant}"),
			));
		}
	}
	Ok(())
}

fn validate_scopes(scopes: &[&str]) -> WdResult<()> {
	for scope in scopes {
		let ok = !scope.is_empty()
			&& scope
				.chars()
				.all(|c| c.is_ascii_alphanumeric() || matches!(c, ':' | '_' | '-' | '.' | '*'));
		if !ok {
			return Err(Error::validation(
				"invalid_scope_format",
				format!("Malformed scope: {scope}"),
			));
		}
	}
	Ok(())
}

fn validate_redirect_uris(redirect_uris: &[&str]) -> WdResult<()> {
	for uri in redirect_uris {
		let parsed = url::Url::parse(uri).map_err(|_| {
			Error::validation("invalid_redirect_uri", format!("Unparseable redirect URI: {uri}"))
		})?;
		if !matches!(parsed.scheme(), "http" | "https") || parsed.fragment().is_some() {
			return Err(Error::validation(
				"invalid_redirect_uri",
				format!("Redirect URI must be http(s) without fragment: {uri}"),
			));
		}
	}
	Ok(())
}

fn validate_metadata(metadata: Option<serde_json::Value>) -> WdResult<serde_json::Value> {
	match metadata {
		None => Ok(serde_json::Value::Object(serde_json::Map::new())),
		Some(value) if value.is_object() => Ok(value),
		Some(_) => Err(Error::validation("invalid_request", "Metadata must be a JSON object")),
	}
}

// Cursor codec: base64url("{created_at_ms}:{id}") //
//*************************************************//

fn encode_cursor(created_at: Timestamp, id: &str) -> Box<str> {
	URL_SAFE_NO_PAD
		.encode(format!("{}:{}", created_at.0, id))
		.into_boxed_str()
}

fn decode_cursor(cursor: &str) -> WdResult<Box<str>> {
	let raw = URL_SAFE_NO_PAD
		.decode(cursor)
		.map_err(|_| Error::validation("invalid_request", "Malformed pagination cursor"))?;
	let decoded = String::from_utf8(raw)
		.map_err(|_| Error::validation("invalid_request", "Malformed pagination cursor"))?;
	let Some((ts, _id)) = decoded.split_once(':') else {
		return Err(Error::validation("invalid_request", "Malformed pagination cursor"));
	};
	if ts.parse::<i64>().is_err() {
		return Err(Error::validation("invalid_request", "Malformed pagination cursor"));
	}
	Ok(decoded.into_boxed_str())
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use super::*;

	#[test]
	fn test_validation_rules() {
		assert!(validate_name("  app  ").is_ok());
		assert_eq!(validate_name("  ").unwrap_err().code(), Some("invalid_request"));

		assert!(validate_grant_types(&["authorization_code", "refresh_token"]).is_ok());
		assert_eq!(
			validate_grant_types(&["implicit"]).unwrap_err().code(),
			Some("invalid_request")
		);
		assert_eq!(validate_grant_types(&[]).unwrap_err().code(), Some("invalid_request"));

		assert!(validate_scopes(&["posts:read", "admin.*"]).is_ok());
		assert_eq!(
			validate_scopes(&["bad scope"]).unwrap_err().code(),
			Some("invalid_scope_format")
		);

		assert!(validate_redirect_uris(&["https://app.example.com/cb"]).is_ok());
		assert_eq!(
			validate_redirect_uris(&["ftp://x"]).unwrap_err().code(),
			Some("invalid_redirect_uri")
		);
		assert_eq!(
			validate_redirect_uris(&["https://x/cb#frag"]).unwrap_err().code(),
			Some("invalid_redirect_uri")
		);
	}

	#[test]
	fn test_cursor_round_trip() {
		let cursor = encode_cursor(Timestamp(1_700_000_000_000), "client-1");
		let decoded = decode_cursor(&cursor).unwrap();
		assert_eq!(decoded.as_ref(), "1700000000000:client-1");

		assert!(decode_cursor("!!!").is_err());
		let no_colon = URL_SAFE_NO_PAD.encode("garbage");
		assert!(decode_cursor(&no_colon).is_err());
	}
}

// vim: ts=4
