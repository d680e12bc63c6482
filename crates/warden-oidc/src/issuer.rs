//! JWT signing and verification against the managed key set.
//!
//! Signing always uses the active ES256 key; verification selects by
//! `kid` across the current and legacy key families, so tokens signed by
//! a racing node's key (or before a rotation) keep verifying.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::sync::Arc;

use crate::claims::TokenClaims;
use crate::prelude::*;
use warden_keys::{KeyManager, KeyPairRecord, KeyRole};

#[derive(Debug)]
pub struct TokenIssuer {
	keys: Arc<KeyManager>,
	issuer: Box<str>,
	clock: Arc<dyn Clock>,
}

impl TokenIssuer {
	pub fn new(keys: Arc<KeyManager>, issuer: &str, clock: Arc<dyn Clock>) -> Self {
		Self { keys, issuer: Box::from(issuer), clock }
	}

	pub fn issuer_url(&self) -> &str {
		&self.issuer
	}

	pub fn now(&self) -> Timestamp {
		self.clock.now()
	}

	/// Sign claims with the active signing key; `kid` goes into the
	/// header for JWKS selection
	pub async fn sign(&self, claims: &TokenClaims) -> WdResult<Box<str>> {
		let key = self.keys.get_active_key(KeyRole::Signing).await?;

		let mut header = Header::new(Algorithm::ES256);
		header.kid = Some(key.id.to_string());

		let encoding_key = EncodingKey::from_ec_pem(key.private_pem.as_bytes())
			.map_err(|_| Error::Crypto("Signing key PEM rejected".into()))?;

		let token = jsonwebtoken::encode(&header, claims, &encoding_key)
			.map_err(|_| Error::Crypto("Token signing failed".into()))?;
		Ok(token.into_boxed_str())
	}

	/// Verify a compact JWS and return its claims. Failures of any kind
	/// surface as `invalid_token`.
	pub async fn verify(&self, token: &str) -> WdResult<TokenClaims> {
		let header = jsonwebtoken::decode_header(token)
			.map_err(|_| Error::unauthorized("invalid_token"))?;
		let kid = header.kid.ok_or(Error::unauthorized("invalid_token"))?;

		let key = self
			.find_verification_key(&kid)
			.await?
			.ok_or(Error::unauthorized("invalid_token"))?;

		let algorithm = match key.alg.as_ref() {
			"ES256" => Algorithm::ES256,
			"ES384" => Algorithm::ES384,
			_ => return Err(Error::unauthorized("invalid_token")),
		};
		let decoding_key = DecodingKey::from_ec_pem(key.public_pem.as_bytes())
			.map_err(|_| Error::unauthorized("invalid_token"))?;

		let mut validation = Validation::new(algorithm);
		// Audience varies per client; callers check it where it matters
		validation.validate_aud = false;

		let data = jsonwebtoken::decode::<TokenClaims>(token, &decoding_key, &validation)
			.map_err(|_| Error::unauthorized("invalid_token"))?;
		Ok(data.claims)
	}

	/// Look up a verification key by kid: current signing set first,
	/// then the retired legacy family
	async fn find_verification_key(&self, kid: &str) -> WdResult<Option<KeyPairRecord>> {
		let current = self.keys.get_keys(KeyRole::Signing).await?;
		if let Some(key) = current.into_iter().find(|k| k.id.as_ref() == kid) {
			return Ok(Some(key));
		}

		let legacy = self.keys.load_legacy_signing_keys().await?;
		Ok(legacy.into_iter().find(|k| k.id.as_ref() == kid))
	}
}

// vim: ts=4
