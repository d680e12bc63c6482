//! Environment configuration.
//!
//! Every subsystem ships usable defaults; the environment overrides the
//! knobs a deployment actually cares about. The only hard requirement is
//! the 32-byte session secret.

use std::env;

use warden_core::resolver::ResolverConfig;
use warden_rbac::engine::RbacConfig;
use warden_session::cookie::CookieConfig;
use warden_session::store::SessionConfig;
use warden_types::prelude::*;

#[derive(Debug)]
pub struct Config {
	pub listen: String,
	pub issuer: String,
	pub session_secret: String,
	pub db_path: Option<String>,
	pub default_theme: Option<String>,
	pub resolver: ResolverConfig,
	pub session: SessionConfig,
	pub cookie: CookieConfig,
	pub rbac: RbacConfig,
}

fn env_opt(name: &str) -> Option<String> {
	env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_i64(name: &str, default: i64) -> i64 {
	env_opt(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
	env_opt(name).and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
	pub fn from_env() -> WdResult<Self> {
		let session_secret = env_opt("WARDEN_SESSION_SECRET").ok_or_else(|| {
			Error::Config("WARDEN_SESSION_SECRET must be set (32 bytes, hex or base64)".into())
		})?;

		let listen = env_opt("WARDEN_LISTEN").unwrap_or_else(|| "0.0.0.0:8080".into());
		let issuer =
			env_opt("WARDEN_ISSUER").unwrap_or_else(|| format!("http://{listen}"));

		let session_defaults = SessionConfig::default();
		let session = SessionConfig {
			max_accounts_per_session: env_u32(
				"WARDEN_MAX_ACCOUNTS_PER_SESSION",
				session_defaults.max_accounts_per_session,
			),
			session_lifetime_seconds: env_i64(
				"WARDEN_SESSION_LIFETIME_SECONDS",
				session_defaults.session_lifetime_seconds,
			),
			sliding_window_seconds: env_i64(
				"WARDEN_SLIDING_WINDOW_SECONDS",
				session_defaults.sliding_window_seconds,
			),
		};

		let cookie_defaults = CookieConfig::default();
		let cookie = CookieConfig {
			name: env_opt("WARDEN_COOKIE_NAME")
				.map(String::into_boxed_str)
				.unwrap_or(cookie_defaults.name),
			domain: env_opt("WARDEN_COOKIE_DOMAIN").map(String::into_boxed_str),
			secure: env_opt("WARDEN_COOKIE_INSECURE").is_none(),
			max_age_seconds: session.session_lifetime_seconds,
		};

		let resolver_defaults = ResolverConfig::default();
		let resolver = ResolverConfig {
			base_domain: env_opt("WARDEN_BASE_DOMAIN").map(String::into_boxed_str),
			path_prefix: env_opt("WARDEN_TENANT_PATH_PREFIX")
				.map(String::into_boxed_str)
				.unwrap_or(resolver_defaults.path_prefix),
			header_name: env_opt("WARDEN_TENANT_HEADER")
				.map(String::into_boxed_str)
				.unwrap_or(resolver_defaults.header_name),
			query_param: env_opt("WARDEN_TENANT_QUERY_PARAM")
				.map(String::into_boxed_str)
				.unwrap_or(resolver_defaults.query_param),
			required: false,
		};

		let rbac_defaults = RbacConfig::default();
		let rbac = RbacConfig {
			permission_cache_ttl_seconds: env_u32(
				"WARDEN_RBAC_CACHE_TTL_SECONDS",
				rbac_defaults.permission_cache_ttl_seconds,
			),
			max_permissions_in_token: env_u32(
				"WARDEN_MAX_PERMISSIONS_IN_TOKEN",
				rbac_defaults.max_permissions_in_token as u32,
			) as usize,
		};

		Ok(Self {
			listen,
			issuer,
			session_secret,
			db_path: env_opt("WARDEN_DB"),
			default_theme: env_opt("WARDEN_DEFAULT_THEME"),
			resolver,
			session,
			cookie,
			rbac,
		})
	}
}

// vim: ts=4
