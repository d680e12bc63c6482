//! Error handling subsystem. Implements the project-wide Error type.
//!
//! API-facing variants carry a stable machine-readable code that is
//! rendered as an OAuth 2.0 style `{error, error_description}` body.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};

use crate::prelude::*;

pub type WdResult<T> = std::result::Result<T, Error>;

/// Wire shape of every error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	pub error: String,
	pub error_description: String,
}

impl ErrorResponse {
	pub fn new(error: impl Into<String>, error_description: impl Into<String>) -> Self {
		Self { error: error.into(), error_description: error_description.into() }
	}
}

#[derive(Debug)]
pub enum Error {
	// Request-class errors, surfaced verbatim with their code
	Validation { code: &'static str, message: String }, // 400
	Conflict { code: &'static str, message: String },   // 409
	NotFound { code: &'static str },                    // 404
	Forbidden { code: &'static str, message: String },  // 403
	Unauthorized { code: &'static str },                // 401

	// Infrastructure
	CircuitOpen { state: &'static str }, // downstream store short-circuited
	DbError,
	Timeout,
	ServiceUnavailable(String),

	// System and configuration
	Config(String),
	Crypto(String),
	Internal(String),

	// Externals
	Parse,
	Io(std::io::Error),
}

impl Error {
	pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
		Self::Validation { code, message: message.into() }
	}

	pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
		Self::Conflict { code, message: message.into() }
	}

	pub fn not_found(code: &'static str) -> Self {
		Self::NotFound { code }
	}

	pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self {
		Self::Forbidden { code, message: message.into() }
	}

	pub fn unauthorized(code: &'static str) -> Self {
		Self::Unauthorized { code }
	}

	/// Stable code for the API boundary, where one exists
	pub fn code(&self) -> Option<&'static str> {
		match self {
			Error::Validation { code, .. }
			| Error::Conflict { code, .. }
			| Error::NotFound { code }
			| Error::Forbidden { code, .. }
			| Error::Unauthorized { code } => Some(code),
			_ => None,
		}
	}

	/// Transient errors that a retry policy is allowed to re-attempt.
	///
	/// Domain errors (validation, conflict, not-found, auth) pass through
	/// unchanged; so does an already-open circuit.
	pub fn is_retryable(&self) -> bool {
		matches!(
			self,
			Error::DbError | Error::Timeout | Error::ServiceUnavailable(_) | Error::Io(_)
		)
	}
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		write!(f, "{:?}", self)
	}
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		warn!("io error: {}", err);
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(_err: serde_json::Error) -> Self {
		warn!("json error: {}", _err);
		Error::Parse
	}
}

impl From<std::num::ParseIntError> for Error {
	fn from(_err: std::num::ParseIntError) -> Self {
		warn!("parse int error: {}", _err);
		Error::Parse
	}
}

impl From<std::time::SystemTimeError> for Error {
	fn from(_err: std::time::SystemTimeError) -> Self {
		warn!("system time error: {}", _err);
		Error::ServiceUnavailable("system time error".into())
	}
}

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		let (status, code, message) = match self {
			Error::Validation { code, message } => (StatusCode::BAD_REQUEST, code, message),
			Error::Conflict { code, message } => (StatusCode::CONFLICT, code, message),
			Error::NotFound { code } => (StatusCode::NOT_FOUND, code, "Resource not found".into()),
			Error::Forbidden { code, message } => (StatusCode::FORBIDDEN, code, message),
			Error::Unauthorized { code } => {
				(StatusCode::UNAUTHORIZED, code, "Authentication required or invalid".into())
			}
			Error::CircuitOpen { .. } | Error::ServiceUnavailable(_) => (
				StatusCode::SERVICE_UNAVAILABLE,
				"temporarily_unavailable",
				"Service temporarily unavailable".into(),
			),
			Error::Timeout => {
				(StatusCode::REQUEST_TIMEOUT, "request_timeout", "Request timeout".into())
			}
			// Server errors (5xx) - no message exposure
			Error::Internal(msg) => {
				warn!("internal error: {}", msg);
				(StatusCode::INTERNAL_SERVER_ERROR, "server_error", "Internal server error".into())
			}
			Error::DbError | Error::Parse | Error::Io(_) | Error::Config(_) | Error::Crypto(_) => (
				StatusCode::INTERNAL_SERVER_ERROR,
				"server_error",
				"Internal server error".into(),
			),
		};

		(status, Json(ErrorResponse::new(code, message))).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_code_surface() {
		assert_eq!(Error::not_found("tenant_not_found").code(), Some("tenant_not_found"));
		assert_eq!(Error::DbError.code(), None);
	}

	#[test]
	fn test_retryable_classes() {
		assert!(Error::DbError.is_retryable());
		assert!(Error::Timeout.is_retryable());
		assert!(!Error::not_found("client_not_found").is_retryable());
		assert!(!Error::conflict("domain_already_exists", "taken").is_retryable());
		assert!(!Error::CircuitOpen { state: "open" }.is_retryable());
	}
}

// vim: ts=4
