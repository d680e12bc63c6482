//! Client secret generation and argon2id hashing.
//!
//! Plaintext secrets exist in memory only between generation and the one
//! response that returns them; at rest there is only the PHC hash.

use argon2::Argon2;
use argon2::password_hash::{
	PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use std::sync::Arc;

use crate::prelude::*;
use warden_types::worker::WorkerPool;

const SECRET_BYTES: usize = 32;

/// Fresh 256-bit secret, base64url encoded
pub fn generate_secret() -> Box<str> {
	let bytes: [u8; SECRET_BYTES] = rand::rng().random();
	URL_SAFE_NO_PAD.encode(bytes).into_boxed_str()
}

fn hash_secret_sync(secret: Box<str>) -> WdResult<Box<str>> {
	let salt = SaltString::generate(&mut OsRng);
	let hash = Argon2::default()
		.hash_password(secret.as_bytes(), &salt)
		.map_err(|_| Error::Crypto("Secret hashing failed".into()))?;
	Ok(hash.to_string().into_boxed_str())
}

fn verify_secret_sync(secret: Box<str>, hash: Box<str>) -> bool {
	let Ok(parsed) = PasswordHash::new(&hash) else {
		return false;
	};
	Argon2::default().verify_password(secret.as_bytes(), &parsed).is_ok()
}

/// Hash a secret on the worker pool (argon2id is deliberately slow)
pub async fn hash_secret(worker: &Arc<WorkerPool>, secret: Box<str>) -> WdResult<Box<str>> {
	worker.try_run_urgent(move || hash_secret_sync(secret)).await
}

/// Verify a secret against a PHC hash on the worker pool
pub async fn verify_secret(
	worker: &Arc<WorkerPool>,
	secret: Box<str>,
	hash: Box<str>,
) -> WdResult<bool> {
	worker.run_urgent(move || verify_secret_sync(secret, hash)).await
}


// vim: ts=4
