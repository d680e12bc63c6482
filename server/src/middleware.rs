//! Request middleware: request ids, bearer authentication, tenant
//! resolution, and theme header projection.

use axum::{
	body::Body,
	extract::State,
	http::Request,
	middleware::Next,
	response::Response,
};

use warden_core::extract::{Auth, AuthCtx, RequestId, ResolvedTenant};
use warden_core::resolver::RequestSurface;
use warden_core::theme::theme_headers;
use warden_oidc::OidcModule;

use crate::prelude::*;

/// Attach a request id for tracing; an inbound `X-Request-ID` is kept
pub async fn request_id_middleware(mut req: Request<Body>, next: Next) -> Response {
	let req_id = req
		.headers()
		.get("x-request-id")
		.and_then(|v| v.to_str().ok())
		.map(ToString::to_string)
		.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
	req.extensions_mut().insert(RequestId(req_id));
	next.run(req).await
}

/// Validate a bearer token and stash the auth context. Requests without
/// a token pass through; handlers demand auth via the extractor.
pub async fn optional_auth(
	State(app): State<App>,
	mut req: Request<Body>,
	next: Next,
) -> WdResult<Response> {
	let bearer = req
		.headers()
		.get(axum::http::header::AUTHORIZATION)
		.and_then(|v| v.to_str().ok())
		.and_then(|v| v.strip_prefix("Bearer "))
		.map(str::trim)
		.filter(|v| !v.is_empty())
		.map(ToString::to_string);

	if let Some(token) = bearer {
		let oidc = app.ext::<OidcModule>()?;
		let claims = oidc.issuer.verify(&token).await?;
		req.extensions_mut().insert(Auth(AuthCtx {
			user_id: claims.sub,
			tenant_id: claims.tenant_id,
			roles: claims.roles.map(Vec::into_boxed_slice).unwrap_or_default(),
			scope: claims.scope,
			client_id: claims.client_id,
		}));
	}

	Ok(next.run(req).await)
}

/// Resolve the tenant for this request and expose it to extractors.
/// Absence is not an error here; tenant-requiring handlers use the
/// `ResolvedTenant` extractor.
pub async fn resolve_tenant(
	State(app): State<App>,
	mut req: Request<Body>,
	next: Next,
) -> WdResult<Response> {
	let host = req
		.headers()
		.get(axum::http::header::HOST)
		.and_then(|v| v.to_str().ok())
		.map(ToString::to_string);
	let path = req.uri().path().to_string();
	let query = req.uri().query().map(ToString::to_string);

	let surface = RequestSurface {
		host: host.as_deref(),
		path: &path,
		headers: req.headers(),
		query: query.as_deref(),
	};
	let tenant = app.resolver.resolve(&surface).await?;

	let branding = tenant.as_ref().map(|t| t.branding.clone());
	if let Some(tenant) = tenant {
		req.extensions_mut().insert(ResolvedTenant(tenant));
	}

	let mut response = next.run(req).await;

	// Project the resolved branding into X-Theme-* headers
	let headers = theme_headers(
		app.opts.default_theme.as_deref(),
		branding.as_ref(),
	);
	for (name, value) in headers {
		response.headers_mut().insert(name, value);
	}

	Ok(response)
}

// vim: ts=4
