//! Warden server entry point.

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

use tracing::error;

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| "info,sqlx=warn".into()),
		)
		.init();

	if let Err(err) = warden_server::bootstrap::run().await {
		error!("Server failed: {}", err);
		std::process::exit(1);
	}
}

// vim: ts=4
