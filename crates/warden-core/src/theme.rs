//! Tenant theme resolution and response-header projection.
//!
//! Pure selection: tenant branding override, then the process default,
//! then the built-in fallback. The server's middleware projects the
//! selected fields into `X-Theme-*` response headers.

use axum::http::{HeaderName, HeaderValue};

use warden_types::tenant::TenantBranding;

pub const FALLBACK_THEME: &str = "default";

pub const HEADER_THEME: &str = "x-theme";
pub const HEADER_CUSTOM_CSS: &str = "x-theme-custom-css";
pub const HEADER_LOGO_LIGHT: &str = "x-theme-logo-light";
pub const HEADER_LOGO_DARK: &str = "x-theme-logo-dark";
pub const HEADER_FAVICON: &str = "x-theme-favicon";

/// Pick the effective theme name
pub fn resolve_theme<'a>(
	config_default: Option<&'a str>,
	branding: Option<&'a TenantBranding>,
	fallback: &'a str,
) -> &'a str {
	branding
		.and_then(|b| b.theme.as_deref())
		.or(config_default)
		.unwrap_or(fallback)
}

/// Headers carrying the resolved theme to the rendering layer. Values
/// that fail header encoding are skipped, not fatal.
pub fn theme_headers(
	config_default: Option<&str>,
	branding: Option<&TenantBranding>,
) -> Vec<(HeaderName, HeaderValue)> {
	let mut headers = Vec::with_capacity(5);

	let theme = resolve_theme(config_default, branding, FALLBACK_THEME);
	push_header(&mut headers, HEADER_THEME, Some(theme));

	if let Some(branding) = branding {
		push_header(&mut headers, HEADER_CUSTOM_CSS, branding.custom_css.as_deref());
		push_header(&mut headers, HEADER_LOGO_LIGHT, branding.logo_light.as_deref());
		push_header(&mut headers, HEADER_LOGO_DARK, branding.logo_dark.as_deref());
		push_header(&mut headers, HEADER_FAVICON, branding.favicon.as_deref());
	}

	headers
}

fn push_header(headers: &mut Vec<(HeaderName, HeaderValue)>, name: &'static str, value: Option<&str>) {
	if let Some(value) = value {
		if let Ok(value) = HeaderValue::from_str(value) {
			headers.push((HeaderName::from_static(name), value));
		}
	}
}


// vim: ts=4
