//! Browser and account session state machine.
//!
//! Storage layout (logical keys, before tenant scoping):
//! - `session/browser/{tenant}/{session}` - browser session row
//! - `session/account/{browser_session}/{user}` - account session row
//! - `session/user/{tenant}/{user}/{browser_session}` - reverse index
//!
//! The KV rows are authoritative. When a relational adapter is
//! configured every mutation is additionally mirrored there after the
//! KV write; mirror failures are logged and swallowed.

use std::sync::Arc;

use crate::prelude::*;
use warden_types::kv_adapter::{self, KvAdapter};
use warden_types::kv_key::KvKey;
use warden_types::session::{AccountSession, AddAccountData, BrowserSession, UserSessionRef};
use warden_types::store_adapter::{ListSessionsOptions, StoreAdapter};

const KEY_ROOT: &str = "session";
const KEY_BROWSER: &str = "browser";
const KEY_ACCOUNT: &str = "account";
const KEY_USER: &str = "user";

#[derive(Debug, Clone)]
pub struct SessionConfig {
	pub max_accounts_per_session: u32,
	pub session_lifetime_seconds: i64,
	pub sliding_window_seconds: i64,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			max_accounts_per_session: 3,
			session_lifetime_seconds: 7 * 86_400,
			sliding_window_seconds: 86_400,
		}
	}
}

fn key_browser(tenant_id: &str, session_id: &str) -> KvKey {
	KvKey::from([KEY_ROOT, KEY_BROWSER, tenant_id, session_id])
}

fn key_account(browser_session_id: &str, user_id: &str) -> KvKey {
	KvKey::from([KEY_ROOT, KEY_ACCOUNT, browser_session_id, user_id])
}

fn key_user_ref(tenant_id: &str, user_id: &str, browser_session_id: &str) -> KvKey {
	KvKey::from([KEY_ROOT, KEY_USER, tenant_id, user_id, browser_session_id])
}

#[derive(Debug)]
pub struct SessionStore {
	kv: Arc<dyn KvAdapter>,
	store: Option<Arc<dyn StoreAdapter>>,
	clock: Arc<dyn Clock>,
	config: SessionConfig,
}

impl SessionStore {
	pub fn new(
		kv: Arc<dyn KvAdapter>,
		store: Option<Arc<dyn StoreAdapter>>,
		clock: Arc<dyn Clock>,
		config: SessionConfig,
	) -> Self {
		Self { kv, store, clock, config }
	}

	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	// Browser sessions //
	//******************//

	pub async fn create_browser_session(
		&self,
		tenant_id: &str,
		user_agent: Option<&str>,
		ip_address: Option<&str>,
	) -> WdResult<BrowserSession> {
		let now = self.clock.now();
		let session = BrowserSession {
			id: uuid::Uuid::new_v4().to_string().into_boxed_str(),
			tenant_id: Box::from(tenant_id),
			created_at: now,
			last_activity: now,
			user_agent: user_agent.map(Box::from),
			ip_address: ip_address.map(Box::from),
			version: 1,
			active_user_id: None,
			account_user_ids: Vec::new(),
		};

		kv_adapter::set_json(
			self.kv.as_ref(),
			&key_browser(tenant_id, &session.id),
			&session,
			Some(self.config.session_lifetime_seconds as u32),
		)
		.await?;

		self.mirror_browser(&session);
		debug!(tenant = tenant_id, session = %session.id, "Browser session created");
		Ok(session)
	}

	/// Read a browser session, enforcing the hard lifetime and the
	/// sliding window.
	///
	/// Within the sliding window the read is cheap and non-mutating.
	/// Beyond it, one write refreshes `last_activity` and bumps the
	/// version, rewriting the row with the *remaining* lifetime so
	/// activity never extends the hard cap. Past the hard cap the
	/// session and everything hanging off it is cleaned up.
	pub async fn get_browser_session(
		&self,
		session_id: &str,
		tenant_id: &str,
	) -> WdResult<Option<BrowserSession>> {
		let key = key_browser(tenant_id, session_id);
		let Some(mut session) =
			kv_adapter::get_json::<BrowserSession>(self.kv.as_ref(), &key).await?
		else {
			return Ok(None);
		};

		let now = self.clock.now();
		let age_ms = now.since(session.created_at);
		if age_ms > self.config.session_lifetime_seconds * 1000 {
			debug!(session = session_id, "Browser session past hard lifetime, cleaning up");
			self.destroy_session_rows(&session).await?;
			return Ok(None);
		}

		if now.since(session.last_activity) > self.config.sliding_window_seconds * 1000 {
			session.last_activity = now;
			session.version += 1;
			self.write_browser(&session).await?;
		}

		Ok(Some(session))
	}

	/// Locate a browser session without knowing its tenant. Account
	/// operations are keyed by browser session id alone, so this falls
	/// back to a prefix scan.
	pub async fn find_browser_session(
		&self,
		session_id: &str,
	) -> WdResult<Option<BrowserSession>> {
		let entries = self.kv.scan(&KvKey::from([KEY_ROOT, KEY_BROWSER])).await?;
		for (key, value) in entries {
			if key.segment(3) == Some(session_id) {
				let session: BrowserSession = serde_json::from_value(value)?;
				// Re-read through the guarded path so expiry and the
				// sliding window apply
				return self.get_browser_session(session_id, &session.tenant_id).await;
			}
		}
		Ok(None)
	}

	// Account sessions //
	//******************//

	/// Add an account to a browser session, or refresh it if the user is
	/// already signed in. The (re)added account becomes active.
	pub async fn add_account_to_session(
		&self,
		data: AddAccountData<'_>,
	) -> WdResult<AccountSession> {
		self.add_account_with_limit(data, None).await
	}

	/// Like [`Self::add_account_to_session`] with a tenant-level account
	/// limit overriding the process default
	pub async fn add_account_with_limit(
		&self,
		data: AddAccountData<'_>,
		max_accounts: Option<u32>,
	) -> WdResult<AccountSession> {
		let mut session = self
			.find_browser_session(data.browser_session_id)
			.await?
			.ok_or(Error::not_found("session_not_found"))?;

		let now = self.clock.now();
		let expires_at = now.add_seconds(data.ttl_seconds);
		let already_member = session.account_user_ids.iter().any(|u| u.as_ref() == data.user_id);

		let limit = max_accounts.unwrap_or(self.config.max_accounts_per_session);
		if !already_member && session.account_user_ids.len() as u32 >= limit {
			return Err(Error::validation(
				"max_accounts_exceeded",
				"Maximum number of accounts per session reached",
			));
		}

		self.deactivate_other_accounts(&session.id, data.user_id).await?;

		let account = match self.read_account_raw(&session.id, data.user_id).await? {
			Some(mut account) if already_member => {
				account.authenticated_at = now;
				account.expires_at = expires_at;
				account.is_active = true;
				account.subject_type = Box::from(data.subject_type);
				account.subject_properties = data.subject_properties;
				account.refresh_token = data.refresh_token.map(Box::from);
				account.client_id = data.client_id.map(Box::from);
				account
			}
			_ => AccountSession {
				id: uuid::Uuid::new_v4().to_string().into_boxed_str(),
				browser_session_id: session.id.clone(),
				user_id: Box::from(data.user_id),
				is_active: true,
				authenticated_at: now,
				expires_at,
				subject_type: Box::from(data.subject_type),
				subject_properties: data.subject_properties,
				refresh_token: data.refresh_token.map(Box::from),
				client_id: data.client_id.map(Box::from),
			},
		};

		let ttl = data.ttl_seconds.max(1) as u32;
		kv_adapter::set_json(
			self.kv.as_ref(),
			&key_account(&session.id, data.user_id),
			&account,
			Some(ttl),
		)
		.await?;
		kv_adapter::set_json(
			self.kv.as_ref(),
			&key_user_ref(&session.tenant_id, data.user_id, &session.id),
			&UserSessionRef {
				session_id: session.id.clone(),
				tenant_id: session.tenant_id.clone(),
			},
			Some(ttl),
		)
		.await?;

		// Browser row last: a crash above leaves rows the next read
		// either repairs or expires
		if !already_member {
			session.account_user_ids.push(Box::from(data.user_id));
		}
		session.active_user_id = Some(Box::from(data.user_id));
		session.last_activity = now;
		session.version += 1;
		self.write_browser(&session).await?;

		self.mirror_account(&account);
		self.mirror_browser(&session);
		Ok(account)
	}

	/// Read an account session, lazily deleting it once expired
	pub async fn get_account_session(
		&self,
		browser_session_id: &str,
		user_id: &str,
	) -> WdResult<Option<AccountSession>> {
		let Some(account) = self.read_account_raw(browser_session_id, user_id).await? else {
			return Ok(None);
		};

		if self.clock.now() > account.expires_at {
			debug!(user = user_id, "Account session expired, cleaning up");
			self.kv.remove(&key_account(browser_session_id, user_id)).await?;
			self.mirror_account_delete(browser_session_id, user_id);
			return Ok(None);
		}

		Ok(Some(account))
	}

	/// List the (unexpired) account sessions of a browser session
	pub async fn list_account_sessions(
		&self,
		browser_session_id: &str,
	) -> WdResult<Vec<AccountSession>> {
		let entries =
			self.kv.scan(&KvKey::from([KEY_ROOT, KEY_ACCOUNT, browser_session_id])).await?;
		let now = self.clock.now();
		let mut accounts = Vec::with_capacity(entries.len());
		for (_, value) in entries {
			let account: AccountSession = serde_json::from_value(value)?;
			if now <= account.expires_at {
				accounts.push(account);
			}
		}
		Ok(accounts)
	}

	/// Switch the active account of a browser session
	pub async fn switch_active_account(
		&self,
		browser_session_id: &str,
		user_id: &str,
	) -> WdResult<BrowserSession> {
		let mut session = self
			.find_browser_session(browser_session_id)
			.await?
			.ok_or(Error::not_found("session_not_found"))?;

		let mut account = self
			.get_account_session(&session.id, user_id)
			.await?
			.ok_or(Error::not_found("account_not_found"))?;

		self.deactivate_other_accounts(&session.id, user_id).await?;

		account.is_active = true;
		self.write_account(&account).await?;

		let now = self.clock.now();
		session.active_user_id = Some(Box::from(user_id));
		session.last_activity = now;
		session.version += 1;
		self.write_browser(&session).await?;

		self.mirror_account(&account);
		self.mirror_browser(&session);
		Ok(session)
	}

	/// Remove one account from a browser session. If the removed account
	/// was active, the first remaining account becomes active.
	pub async fn remove_account(
		&self,
		browser_session_id: &str,
		user_id: &str,
	) -> WdResult<BrowserSession> {
		let mut session = self
			.find_browser_session(browser_session_id)
			.await?
			.ok_or(Error::not_found("session_not_found"))?;

		self.kv.remove(&key_account(&session.id, user_id)).await?;
		self.kv
			.remove(&key_user_ref(&session.tenant_id, user_id, &session.id))
			.await?;
		self.mirror_account_delete(&session.id, user_id);

		session.account_user_ids.retain(|u| u.as_ref() != user_id);

		if session.active_user_id.as_deref() == Some(user_id) {
			session.active_user_id = session.account_user_ids.first().cloned();
			if let Some(ref next_active) = session.active_user_id {
				if let Some(mut account) =
					self.get_account_session(&session.id, next_active).await?
				{
					account.is_active = true;
					self.write_account(&account).await?;
					self.mirror_account(&account);
				}
			}
		}

		session.last_activity = self.clock.now();
		session.version += 1;
		self.write_browser(&session).await?;
		self.mirror_browser(&session);
		Ok(session)
	}

	/// Remove every account but keep the browser session row
	pub async fn remove_all_accounts(&self, browser_session_id: &str) -> WdResult<BrowserSession> {
		let mut session = self
			.find_browser_session(browser_session_id)
			.await?
			.ok_or(Error::not_found("session_not_found"))?;

		for user_id in session.account_user_ids.clone() {
			self.kv.remove(&key_account(&session.id, &user_id)).await?;
			self.kv
				.remove(&key_user_ref(&session.tenant_id, &user_id, &session.id))
				.await?;
			self.mirror_account_delete(&session.id, &user_id);
		}

		session.account_user_ids.clear();
		session.active_user_id = None;
		session.last_activity = self.clock.now();
		session.version += 1;
		self.write_browser(&session).await?;
		self.mirror_browser(&session);
		Ok(session)
	}

	// Revocation //
	//************//

	/// Remove a user from every browser session in a tenant. Returns the
	/// number of sessions the user was removed from.
	pub async fn revoke_user_sessions(&self, tenant_id: &str, user_id: &str) -> WdResult<u32> {
		let entries =
			self.kv.scan(&KvKey::from([KEY_ROOT, KEY_USER, tenant_id, user_id])).await?;

		let mut revoked = 0;
		for (key, value) in entries {
			let Ok(entry) = serde_json::from_value::<UserSessionRef>(value) else {
				self.kv.remove(&key).await?;
				continue;
			};
			match self.remove_account(&entry.session_id, user_id).await {
				Ok(_) => revoked += 1,
				Err(Error::NotFound { .. }) => {
					// Session already gone; drop the dangling index row
					self.kv.remove(&key).await?;
				}
				Err(err) => return Err(err),
			}
		}

		info!(tenant = tenant_id, user = user_id, revoked, "User sessions revoked");
		Ok(revoked)
	}

	/// Destroy one browser session entirely. Returns whether it existed.
	pub async fn revoke_specific_session(
		&self,
		session_id: &str,
		tenant_id: &str,
	) -> WdResult<bool> {
		let Some(session) = kv_adapter::get_json::<BrowserSession>(
			self.kv.as_ref(),
			&key_browser(tenant_id, session_id),
		)
		.await?
		else {
			return Ok(false);
		};

		self.destroy_session_rows(&session).await?;
		info!(tenant = tenant_id, session = session_id, "Browser session revoked");
		Ok(true)
	}

	// Admin queries (relational mirror) //
	//***********************************//

	pub async fn admin_list_by_user(
		&self,
		tenant_id: &str,
		user_id: &str,
	) -> WdResult<Vec<BrowserSession>> {
		self.require_store()?.list_sessions_by_user(tenant_id, user_id).await
	}

	pub async fn admin_list_by_tenant(
		&self,
		tenant_id: &str,
		opts: &ListSessionsOptions,
	) -> WdResult<Vec<BrowserSession>> {
		self.require_store()?.list_sessions_by_tenant(tenant_id, opts).await
	}

	pub async fn admin_cleanup_expired(&self) -> WdResult<u32> {
		let cutoff =
			self.clock.now().add_seconds(-self.config.session_lifetime_seconds);
		self.require_store()?.cleanup_expired_sessions(cutoff).await
	}

	// Internals //
	//***********//

	fn require_store(&self) -> WdResult<&Arc<dyn StoreAdapter>> {
		self.store
			.as_ref()
			.ok_or_else(|| Error::ServiceUnavailable("relational store not configured".into()))
	}

	async fn read_account_raw(
		&self,
		browser_session_id: &str,
		user_id: &str,
	) -> WdResult<Option<AccountSession>> {
		kv_adapter::get_json(self.kv.as_ref(), &key_account(browser_session_id, user_id)).await
	}

	/// Rewrite a browser row with its *remaining* hard lifetime
	async fn write_browser(&self, session: &BrowserSession) -> WdResult<()> {
		let now = self.clock.now();
		let remaining_ms =
			session.created_at.add_seconds(self.config.session_lifetime_seconds).since(now);
		let ttl = (remaining_ms / 1000).max(1) as u32;
		kv_adapter::set_json(
			self.kv.as_ref(),
			&key_browser(&session.tenant_id, &session.id),
			session,
			Some(ttl),
		)
		.await
	}

	/// Rewrite an account row with its remaining lifetime
	async fn write_account(&self, account: &AccountSession) -> WdResult<()> {
		let remaining_ms = account.expires_at.since(self.clock.now());
		let ttl = (remaining_ms / 1000).max(1) as u32;
		kv_adapter::set_json(
			self.kv.as_ref(),
			&key_account(&account.browser_session_id, &account.user_id),
			account,
			Some(ttl),
		)
		.await
	}

	async fn deactivate_other_accounts(
		&self,
		browser_session_id: &str,
		except_user_id: &str,
	) -> WdResult<()> {
		let entries =
			self.kv.scan(&KvKey::from([KEY_ROOT, KEY_ACCOUNT, browser_session_id])).await?;
		for (_, value) in entries {
			let mut account: AccountSession = serde_json::from_value(value)?;
			if account.is_active && account.user_id.as_ref() != except_user_id {
				account.is_active = false;
				self.write_account(&account).await?;
				self.mirror_account(&account);
			}
		}
		Ok(())
	}

	/// Remove every row belonging to a browser session
	async fn destroy_session_rows(&self, session: &BrowserSession) -> WdResult<()> {
		let entries =
			self.kv.scan(&KvKey::from([KEY_ROOT, KEY_ACCOUNT, session.id.as_ref()])).await?;
		for (key, value) in entries {
			if let Ok(account) = serde_json::from_value::<AccountSession>(value) {
				self.kv
					.remove(&key_user_ref(&session.tenant_id, &account.user_id, &session.id))
					.await?;
				self.mirror_account_delete(&session.id, &account.user_id);
			}
			self.kv.remove(&key).await?;
		}
		// Reverse entries exist even for members whose account row
		// already expired
		for user_id in &session.account_user_ids {
			self.kv
				.remove(&key_user_ref(&session.tenant_id, user_id, &session.id))
				.await?;
		}
		self.kv.remove(&key_browser(&session.tenant_id, &session.id)).await?;
		self.mirror_browser_delete(&session.id);
		Ok(())
	}

	// Relational mirror, fire and forget //
	//************************************//

	fn mirror_browser(&self, session: &BrowserSession) {
		if let Some(store) = self.store.clone() {
			let session = session.clone();
			tokio::spawn(async move {
				if let Err(err) = store.upsert_browser_session(&session).await {
					warn!(session = %session.id, error = ?err, "Session mirror write failed");
				}
			});
		}
	}

	fn mirror_browser_delete(&self, session_id: &str) {
		if let Some(store) = self.store.clone() {
			let session_id = session_id.to_owned();
			tokio::spawn(async move {
				if let Err(err) = store.delete_browser_session(&session_id).await {
					warn!(session = %session_id, error = ?err, "Session mirror delete failed");
				}
			});
		}
	}

	fn mirror_account(&self, account: &AccountSession) {
		if let Some(store) = self.store.clone() {
			let account = account.clone();
			tokio::spawn(async move {
				if let Err(err) = store.upsert_account_session(&account).await {
					warn!(user = %account.user_id, error = ?err, "Account mirror write failed");
				}
			});
		}
	}

	fn mirror_account_delete(&self, browser_session_id: &str, user_id: &str) {
		if let Some(store) = self.store.clone() {
			let browser_session_id = browser_session_id.to_owned();
			let user_id = user_id.to_owned();
			tokio::spawn(async move {
				if let Err(err) =
					store.delete_account_session(&browser_session_id, &user_id).await
				{
					warn!(user = %user_id, error = ?err, "Account mirror delete failed");
				}
			});
		}
	}
}

// vim: ts=4
