//! Public-key export as JWK / JWKS.
//!
//! Signing keys carry `use=sig` and their `kid`; verifiers select by
//! `kid` from the token header.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

use crate::manager::KeyPairRecord;
use crate::prelude::*;

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jwk {
	pub kty: Box<str>,
	pub kid: Box<str>,
	#[serde(rename = "use")]
	pub use_: Option<Box<str>>,
	pub alg: Option<Box<str>>,
	// EC
	pub crv: Option<Box<str>>,
	pub x: Option<Box<str>>,
	pub y: Option<Box<str>>,
	// RSA
	pub n: Option<Box<str>>,
	pub e: Option<Box<str>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwkSet {
	pub keys: Vec<Jwk>,
}

/// Export the public half of a stored key pair
pub fn public_jwk(record: &KeyPairRecord) -> WdResult<Jwk> {
	match record.alg.as_ref() {
		"ES256" => {
			let key = p256::PublicKey::from_public_key_pem(&record.public_pem)
				.map_err(|_| Error::Crypto("Invalid P-256 public key PEM".into()))?;
			let point = key.to_encoded_point(false);
			let (Some(x), Some(y)) = (point.x(), point.y()) else {
				return Err(Error::Crypto("P-256 point missing coordinates".into()));
			};
			Ok(Jwk {
				kty: "EC".into(),
				kid: record.id.clone(),
				use_: Some("sig".into()),
				alg: Some("ES256".into()),
				crv: Some("P-256".into()),
				x: Some(URL_SAFE_NO_PAD.encode(x).into_boxed_str()),
				y: Some(URL_SAFE_NO_PAD.encode(y).into_boxed_str()),
				n: None,
				e: None,
			})
		}
		"ES384" => {
			let key = p384::PublicKey::from_public_key_pem(&record.public_pem)
				.map_err(|_| Error::Crypto("Invalid P-384 public key PEM".into()))?;
			let point = key.to_encoded_point(false);
			let (Some(x), Some(y)) = (point.x(), point.y()) else {
				return Err(Error::Crypto("P-384 point missing coordinates".into()));
			};
			Ok(Jwk {
				kty: "EC".into(),
				kid: record.id.clone(),
				use_: Some("sig".into()),
				alg: Some("ES384".into()),
				crv: Some("P-384".into()),
				x: Some(URL_SAFE_NO_PAD.encode(x).into_boxed_str()),
				y: Some(URL_SAFE_NO_PAD.encode(y).into_boxed_str()),
				n: None,
				e: None,
			})
		}
		"RSA-OAEP-512" => {
			let key = <rsa::RsaPublicKey as rsa::pkcs8::DecodePublicKey>::from_public_key_pem(
				&record.public_pem,
			)
			.map_err(|_| Error::Crypto("Invalid RSA public key PEM".into()))?;
			Ok(Jwk {
				kty: "RSA".into(),
				kid: record.id.clone(),
				use_: Some("enc".into()),
				alg: Some("RSA-OAEP-512".into()),
				crv: None,
				x: None,
				y: None,
				n: Some(URL_SAFE_NO_PAD.encode(key.n().to_bytes_be()).into_boxed_str()),
				e: Some(URL_SAFE_NO_PAD.encode(key.e().to_bytes_be()).into_boxed_str()),
			})
		}
		other => Err(Error::Crypto(format!("Unsupported key algorithm: {other}"))),
	}
}

/// JWKS of every exportable key, skipping rows whose public half fails
/// to parse
pub fn jwk_set(records: &[KeyPairRecord]) -> JwkSet {
	let keys = records
		.iter()
		.filter_map(|record| match public_jwk(record) {
			Ok(jwk) => Some(jwk),
			Err(err) => {
				warn!(kid = %record.id, error = ?err, "Skipping key in JWKS export");
				None
			}
		})
		.collect();
	JwkSet { keys }
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use super::*;
	use crate::keygen;

	#[test]
	fn test_es256_jwk_fields() {
		let pair = keygen::generate_signing_key_sync().unwrap();
		let record = KeyPairRecord {
			id: "primary".into(),
			alg: "ES256".into(),
			public_pem: pair.public_pem,
			private_pem: pair.private_pem,
			created: Timestamp::now(),
			expired: None,
		};

		let jwk = public_jwk(&record).unwrap();
		assert_eq!(jwk.kty.as_ref(), "EC");
		assert_eq!(jwk.kid.as_ref(), "primary");
		assert_eq!(jwk.use_.as_deref(), Some("sig"));
		assert_eq!(jwk.crv.as_deref(), Some("P-256"));
		// P-256 coordinates are 32 bytes -> 43 base64url chars
		assert_eq!(jwk.x.as_deref().unwrap().len(), 43);
		assert_eq!(jwk.y.as_deref().unwrap().len(), 43);
	}

	#[test]
	fn test_jwk_set_skips_bad_rows() {
		let pair = keygen::generate_signing_key_sync().unwrap();
		let good = KeyPairRecord {
			id: "primary".into(),
			alg: "ES256".into(),
			public_pem: pair.public_pem,
			private_pem: pair.private_pem,
			created: Timestamp::now(),
			expired: None,
		};
		let bad = KeyPairRecord {
			id: "junk".into(),
			alg: "ES256".into(),
			public_pem: "not a pem".into(),
			private_pem: "".into(),
			created: Timestamp::now(),
			expired: None,
		};

		let set = jwk_set(&[good, bad]);
		assert_eq!(set.keys.len(), 1);
		assert_eq!(set.keys[0].kid.as_ref(), "primary");
	}
}

// vim: ts=4
