//! Cookie-presence route guard.
//!
//! A fast UX redirect, not an authorization check: it only asks whether an
//! identity-provider auth cookie is *present*. Whether the token inside is
//! valid is decided by the backend on every API call (401 → login).

use crate::config::Deployment;

/// Substring every identity-provider session cookie name contains.
pub const AUTH_COOKIE_MARKER: &str = "-auth-token";

/// Test-only cookie that skips the guard outside production.
pub const E2E_BYPASS_COOKIE: &str = "e2e-auth-bypass";

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/dashboard";

const PUBLIC_PREFIXES: &[&str] = &["/login", "/auth"];
const STATIC_PREFIXES: &[&str] = &["/_next/static", "/_next/image", "/favicon.ico"];
const STATIC_EXTENSIONS: &[&str] = &[".svg", ".png", ".jpg", ".jpeg", ".gif", ".webp"];

/// One request cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Parse a `Cookie:` header value (`a=1; b=2`).
pub fn parse_cookie_header(header: &str) -> Vec<Cookie> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| Cookie::new(name, value.trim()))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    Proceed,
    Redirect(&'static str),
}

pub fn has_session_cookie(cookies: &[Cookie]) -> bool {
    cookies.iter().any(|c| c.name.contains(AUTH_COOKIE_MARKER))
}

/// Whether the guard applies to a path at all. Static assets are never guarded.
pub fn is_guarded_path(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    !(STATIC_PREFIXES.iter().any(|p| lower.starts_with(p))
        || STATIC_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)))
}

/// Decide whether to let a navigation through or redirect it.
pub fn route_decision(path: &str, cookies: &[Cookie], deployment: Deployment) -> RouteDecision {
    if !is_guarded_path(path) {
        return RouteDecision::Proceed;
    }

    if !deployment.is_production()
        && cookies
            .iter()
            .any(|c| c.name == E2E_BYPASS_COOKIE && c.value == "true")
    {
        return RouteDecision::Proceed;
    }

    let has_session = has_session_cookie(cookies);
    let is_public = PUBLIC_PREFIXES.iter().any(|p| path.starts_with(p));

    if !has_session && !is_public {
        tracing::debug!(path, "No session cookie, redirecting to login");
        return RouteDecision::Redirect(LOGIN_PATH);
    }
    if has_session && path.starts_with(LOGIN_PATH) {
        return RouteDecision::Redirect(HOME_PATH);
    }
    RouteDecision::Proceed
}
