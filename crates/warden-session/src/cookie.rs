//! Cookie cryptography.
//!
//! The session cookie value is the AES-256-GCM sealed JSON of
//! `SessionCookiePayload`: a random 12-byte nonce prepended to the
//! ciphertext, base64url-encoded. Decryption returns `None` on every
//! failure class - parse, tag, structure - without distinguishing them,
//! so a tampered cookie is indistinguishable from an expired one.

use aes_gcm::{
	Aes256Gcm, Key, KeyInit, Nonce,
	aead::Aead,
};
use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use rand::RngExt;

use crate::prelude::*;
use warden_types::session::SessionCookiePayload;

const NONCE_LEN: usize = 12;
const SECRET_LEN: usize = 32;

/// Cookie attributes; the value itself comes from [`CookieCrypto`]
#[derive(Debug, Clone)]
pub struct CookieConfig {
	pub name: Box<str>,
	/// Set only when configured; host-only cookie otherwise
	pub domain: Option<Box<str>>,
	pub secure: bool,
	/// Mirrors the session hard lifetime
	pub max_age_seconds: i64,
}

impl Default for CookieConfig {
	fn default() -> Self {
		Self {
			name: "warden_session".into(),
			domain: None,
			secure: true,
			max_age_seconds: 7 * 86_400,
		}
	}
}

impl CookieConfig {
	/// `Set-Cookie` header value with the default attribute set
	pub fn set_cookie(&self, value: &str) -> String {
		let mut cookie = format!(
			"{}={}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
			self.name, value, self.max_age_seconds
		);
		if self.secure {
			cookie.push_str("; Secure");
		}
		if let Some(ref domain) = self.domain {
			cookie.push_str("; Domain=");
			cookie.push_str(domain);
		}
		cookie
	}

	/// Expired cookie for logout
	pub fn clear_cookie(&self) -> String {
		format!("{}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax", self.name)
	}
}

/// Find a cookie value in a Cookie header
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	let cookies = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
	for pair in cookies.split(';') {
		let pair = pair.trim();
		if let Some((k, v)) = pair.split_once('=') {
			if k == name {
				return Some(v);
			}
		}
	}
	None
}

/// Decode a 32-byte secret given as 64 hex chars or as base64
/// (standard or url-safe, padded or not).
pub fn parse_secret(raw: &str) -> WdResult<[u8; SECRET_LEN]> {
	let raw = raw.trim();

	let bytes = if raw.len() == SECRET_LEN * 2 && raw.chars().all(|c| c.is_ascii_hexdigit()) {
		decode_hex(raw)?
	} else {
		STANDARD
			.decode(raw)
			.or_else(|_| URL_SAFE_NO_PAD.decode(raw))
			.map_err(|_| Error::Config("Session secret is neither hex nor base64".into()))?
	};

	bytes
		.try_into()
		.map_err(|_| Error::Config("Session secret must decode to exactly 32 bytes".into()))
}

fn decode_hex(s: &str) -> WdResult<Vec<u8>> {
	(0..s.len())
		.step_by(2)
		.map(|i| {
			u8::from_str_radix(&s[i..i + 2], 16)
				.map_err(|_| Error::Config("Invalid hex in session secret".into()))
		})
		.collect()
}

pub struct CookieCrypto {
	cipher: Aes256Gcm,
}

impl std::fmt::Debug for CookieCrypto {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CookieCrypto").finish()
	}
}

impl CookieCrypto {
	pub fn new(secret: [u8; SECRET_LEN]) -> Self {
		let key = Key::<Aes256Gcm>::from(secret);
		Self { cipher: Aes256Gcm::new(&key) }
	}

	pub fn from_secret_str(raw: &str) -> WdResult<Self> {
		Ok(Self::new(parse_secret(raw)?))
	}

	pub fn encrypt(&self, payload: &SessionCookiePayload) -> WdResult<Box<str>> {
		let plaintext = serde_json::to_vec(payload)?;
		let nonce_bytes: [u8; NONCE_LEN] = rand::rng().random();
		let nonce = Nonce::from_slice(&nonce_bytes);

		let ciphertext = self
			.cipher
			.encrypt(nonce, plaintext.as_ref())
			.map_err(|_| Error::Crypto("Cookie encryption failed".into()))?;

		let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
		out.extend_from_slice(&nonce_bytes);
		out.extend_from_slice(&ciphertext);
		Ok(URL_SAFE_NO_PAD.encode(out).into_boxed_str())
	}

	/// `None` on any failure. Deliberately silent about which check
	/// failed.
	pub fn decrypt(&self, value: &str) -> Option<SessionCookiePayload> {
		let raw = URL_SAFE_NO_PAD.decode(value).ok()?;
		if raw.len() <= NONCE_LEN {
			return None;
		}
		let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
		let nonce = Nonce::from_slice(nonce_bytes);

		let plaintext = self.cipher.decrypt(nonce, ciphertext).ok()?;
		serde_json::from_slice(&plaintext).ok()
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use super::*;

	fn payload() -> SessionCookiePayload {
		SessionCookiePayload {
			sid: "sid-1".into(),
			tid: "acme".into(),
			v: 3,
			iat: Timestamp(1_700_000_000_000),
		}
	}

	#[test]
	fn test_round_trip() {
		let crypto = CookieCrypto::new([7u8; 32]);
		let sealed = crypto.encrypt(&payload()).unwrap();
		assert_eq!(crypto.decrypt(&sealed), Some(payload()));
	}

	#[test]
	fn test_wrong_key_yields_none() {
		let crypto = CookieCrypto::new([7u8; 32]);
		let other = CookieCrypto::new([8u8; 32]);
		let sealed = crypto.encrypt(&payload()).unwrap();
		assert_eq!(other.decrypt(&sealed), None);
	}

	#[test]
	fn test_tamper_yields_none() {
		let crypto = CookieCrypto::new([7u8; 32]);
		let sealed = crypto.encrypt(&payload()).unwrap();

		let mut raw = URL_SAFE_NO_PAD.decode(sealed.as_ref()).unwrap();
		let last = raw.len() - 1;
		raw[last] ^= 0x01;
		let tampered = URL_SAFE_NO_PAD.encode(raw);

		assert_eq!(crypto.decrypt(&tampered), None);
		assert_eq!(crypto.decrypt("not-base64!!"), None);
		assert_eq!(crypto.decrypt(""), None);
	}

	#[test]
	fn test_parse_secret_hex_and_base64() {
		let secret = [0xabu8; 32];
		let hex: String = secret.iter().map(|b| format!("{b:02x}")).collect();
		assert_eq!(parse_secret(&hex).unwrap(), secret);

		let b64 = STANDARD.encode(secret);
		assert_eq!(parse_secret(&b64).unwrap(), secret);

		let b64url = URL_SAFE_NO_PAD.encode(secret);
		assert_eq!(parse_secret(&b64url).unwrap(), secret);

		assert!(parse_secret("too-short").is_err());
	}

	#[test]
	fn test_set_cookie_attributes() {
		let config = CookieConfig::default();
		let cookie = config.set_cookie("abc");
		assert!(cookie.starts_with("warden_session=abc; "));
		assert!(cookie.contains("HttpOnly"));
		assert!(cookie.contains("SameSite=Lax"));
		assert!(cookie.contains("Secure"));
		assert!(cookie.contains("Path=/"));
		assert!(!cookie.contains("Domain="));

		let with_domain =
			CookieConfig { domain: Some("id.example.com".into()), ..Default::default() };
		assert!(with_domain.set_cookie("abc").contains("Domain=id.example.com"));
	}

	#[test]
	fn test_cookie_value_lookup() {
		let mut headers = HeaderMap::new();
		headers.insert(
			axum::http::header::COOKIE,
			"other=1; warden_session=tok; x=2".parse().unwrap(),
		);
		assert_eq!(cookie_value(&headers, "warden_session"), Some("tok"));
		assert_eq!(cookie_value(&headers, "missing"), None);
	}
}

// vim: ts=4
