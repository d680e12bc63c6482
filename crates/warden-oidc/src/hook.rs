//! Authentication-success hook.
//!
//! Composes the resolved tenant, the caller-provided user, RBAC
//! enrichment, the session core, and the signing key into the OIDC
//! token pair plus the session cookie. This is the one place where all
//! the subsystems meet.

use serde_json::Value;

use crate::claims::{Subject, TokenClaims};
use crate::prelude::*;
use crate::{OidcConfig, OidcModule};
use warden_rbac::RbacModule;
use warden_session::SessionModule;
use warden_types::client::OAuthClient;
use warden_types::session::{AddAccountData, BrowserSession, SessionCookiePayload};
use warden_types::tenant::{Tenant, TenantStatus};

/// What the provider callback hands over after a successful
/// authentication. User lookup/creation belongs to the provider layer;
/// the core only receives the result.
#[derive(Debug)]
pub struct AuthSuccess<'a> {
	pub tenant: &'a Tenant,
	pub user_id: &'a str,
	pub email: Option<&'a str>,
	pub client_id: &'a str,
	pub subject_type: &'a str,
	pub subject_properties: Value,
	pub refresh_token: Option<&'a str>,
	/// Attach to this browser session when it still exists; a fresh one
	/// is created otherwise
	pub browser_session_id: Option<&'a str>,
	pub user_agent: Option<&'a str>,
	pub ip_address: Option<&'a str>,
}

/// Everything the routing layer needs to answer a successful login
#[derive(Debug)]
pub struct TokenSet {
	pub access_token: Box<str>,
	pub id_token: Box<str>,
	pub expires_in: i64,
	pub session: BrowserSession,
	/// Encrypted session cookie value
	pub cookie_value: Box<str>,
	pub subject: Subject,
}

fn ensure_issuable(tenant: &Tenant) -> WdResult<()> {
	match tenant.status {
		TenantStatus::Suspended => {
			Err(Error::forbidden("tenant_suspended", "Tenant is suspended"))
		}
		TenantStatus::Deleted => Err(Error::forbidden("tenant_deleted", "Tenant is deleted")),
		TenantStatus::Active | TenantStatus::Pending => Ok(()),
	}
}

/// Turn a successful provider authentication into tokens and a session
pub async fn handle_auth_success(app: &App, input: AuthSuccess<'_>) -> WdResult<TokenSet> {
	ensure_issuable(input.tenant)?;

	let oidc = app.ext::<OidcModule>()?;
	let rbac = app.ext::<RbacModule>()?;
	let sessions = app.ext::<SessionModule>()?;

	// RBAC enrichment for the subject and the access token
	let rbac_claims = rbac
		.engine
		.enrich_token_claims(&input.tenant.id, input.user_id, input.client_id)
		.await?;
	let subject = Subject {
		id: Box::from(input.user_id),
		email: input.email.map(Box::from),
		tenant_id: input.tenant.id.clone(),
		roles: rbac_claims.roles.clone(),
		permissions: rbac_claims.permissions.clone(),
	};

	// Session: reuse the caller's browser session when it is still
	// alive, otherwise start a new one
	let session = match input.browser_session_id {
		Some(sid) => sessions.store.find_browser_session(sid).await?,
		None => None,
	};
	let session = match session {
		Some(session) => session,
		None => {
			sessions
				.store
				.create_browser_session(&input.tenant.id, input.user_agent, input.ip_address)
				.await?
		}
	};

	let account_ttl = sessions.store.config().session_lifetime_seconds;
	sessions
		.store
		.add_account_with_limit(
			AddAccountData {
				browser_session_id: &session.id,
				user_id: input.user_id,
				subject_type: input.subject_type,
				subject_properties: input.subject_properties,
				refresh_token: input.refresh_token,
				client_id: Some(input.client_id),
				ttl_seconds: account_ttl,
			},
			input.tenant.settings.max_accounts_per_session,
		)
		.await?;
	// Re-read for the post-mutation version
	let session = sessions
		.store
		.get_browser_session(&session.id, &input.tenant.id)
		.await?
		.ok_or(Error::not_found("session_not_found"))?;

	let cookie_value = sessions.crypto.encrypt(&SessionCookiePayload {
		sid: session.id.clone(),
		tid: session.tenant_id.clone(),
		v: session.version,
		iat: oidc.issuer.now(),
	})?;

	let (access_token, id_token) =
		issue_user_tokens(oidc, &subject, input.client_id, &rbac_claims).await?;

	info!(
		tenant = %input.tenant.id,
		user = input.user_id,
		client = input.client_id,
		"Authentication succeeded, tokens issued"
	);

	Ok(TokenSet {
		access_token,
		id_token,
		expires_in: oidc.config.access_token_ttl_seconds,
		session,
		cookie_value,
		subject,
	})
}

async fn issue_user_tokens(
	oidc: &OidcModule,
	subject: &Subject,
	client_id: &str,
	rbac_claims: &warden_types::rbac::RbacClaims,
) -> WdResult<(Box<str>, Box<str>)> {
	let now = oidc.issuer.now();
	let base = TokenClaims {
		sub: subject.id.clone(),
		iss: Box::from(oidc.issuer.issuer_url()),
		aud: Box::from(client_id),
		exp: now.add_seconds(oidc.config.access_token_ttl_seconds).as_secs(),
		iat: now.as_secs(),
		tenant_id: subject.tenant_id.clone(),
		mode: Some("user".into()),
		client_id: None,
		scope: None,
		email: None,
		roles: None,
		permissions: None,
	};

	let access_claims = TokenClaims {
		roles: Some(rbac_claims.roles.clone()),
		permissions: Some(rbac_claims.permissions.clone()),
		..base.clone()
	};
	let id_claims = TokenClaims {
		exp: now.add_seconds(oidc.config.id_token_ttl_seconds).as_secs(),
		email: subject.email.clone(),
		..base
	};

	let access_token = oidc.issuer.sign(&access_claims).await?;
	let id_token = oidc.issuer.sign(&id_claims).await?;
	Ok((access_token, id_token))
}

/// Machine-to-machine token for a verified, enabled client
pub async fn issue_client_token(
	app: &App,
	tenant: &Tenant,
	client: &OAuthClient,
	scope: Option<&str>,
	config: &OidcConfig,
) -> WdResult<Box<str>> {
	ensure_issuable(tenant)?;

	if !client.enabled {
		return Err(Error::unauthorized("client_disabled"));
	}

	let oidc = app.ext::<OidcModule>()?;
	let now = oidc.issuer.now();
	let claims = TokenClaims {
		sub: client.id.clone(),
		iss: Box::from(oidc.issuer.issuer_url()),
		aud: client.id.clone(),
		exp: now.add_seconds(config.access_token_ttl_seconds).as_secs(),
		iat: now.as_secs(),
		tenant_id: tenant.id.clone(),
		mode: Some("m2m".into()),
		client_id: Some(client.id.clone()),
		scope: scope.map(Box::from),
		email: None,
		roles: None,
		permissions: None,
	};

	oidc.issuer.sign(&claims).await
}

// vim: ts=4
