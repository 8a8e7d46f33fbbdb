//! Edge request interceptor: the per-request authentication gate
//!
//! Runs ahead of every page request. The check is purely cookie and claim
//! based (it never calls the backend) and exists to short-circuit
//! obviously-expired sessions before any page work happens, so an
//! absolute-expired session can never silently continue on the strength of
//! the gateway's refresh path alone.

use http::header::{HeaderValue, LOCATION, SET_COOKIE};
use http::{Response, StatusCode};

use crate::config::{GatewayOptions, SESSION_WINDOW_HOURS};
use crate::session::{self, SessionCookies};
use crate::token;

/// Query parameter carrying the originally requested path on login redirects.
pub const NEXT_PARAM: &str = "next";

/// Outcome of gating one incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// API or static/framework path; not subject to this gate.
    Passthrough,
    /// Public path rendering normally.
    PublicOk,
    /// Authenticated user hit login or signup; bounce to the dashboard.
    PublicRedirectAuthed { location: String },
    /// Private path without an access cookie.
    PrivateNoToken { location: String },
    /// Private path whose session exceeded the absolute window; redirect
    /// and tear the cookie set down.
    PrivateExpired { location: String },
    /// Private path with a live session.
    PrivateOk,
}

impl RouteDecision {
    /// Whether the request should continue to the application.
    pub fn allows_request(&self) -> bool {
        matches!(
            self,
            RouteDecision::Passthrough | RouteDecision::PublicOk | RouteDecision::PrivateOk
        )
    }

    /// Build the redirect response for this decision, if it is one.
    ///
    /// A `PrivateExpired` response carries the four expired session cookies,
    /// so the set is cleared by the same response that redirects.
    pub fn into_response(self) -> Option<Response<()>> {
        match self {
            RouteDecision::PublicRedirectAuthed { location }
            | RouteDecision::PrivateNoToken { location } => Some(redirect(&location, false)),
            RouteDecision::PrivateExpired { location } => Some(redirect(&location, true)),
            _ => None,
        }
    }
}

/// Gate one incoming request.
///
/// `path` is the request path without scheme or host; `cookies` is the
/// session set read from the request.
pub fn intercept(path: &str, cookies: &SessionCookies, options: &GatewayOptions) -> RouteDecision {
    if path.starts_with(&options.api_prefix) || is_asset_path(path, options) {
        return RouteDecision::Passthrough;
    }

    let authed = cookies.access_token.is_some();

    if is_public_path(path, options) {
        if authed && (path == options.login_path || path == options.signup_path) {
            return RouteDecision::PublicRedirectAuthed {
                location: options.dashboard_path.clone(),
            };
        }
        return RouteDecision::PublicOk;
    }

    let Some(access_token) = &cookies.access_token else {
        return RouteDecision::PrivateNoToken {
            location: login_redirect(path, options),
        };
    };

    if token::age_exceeds(access_token, SESSION_WINDOW_HOURS) {
        return RouteDecision::PrivateExpired {
            location: login_redirect(path, options),
        };
    }

    RouteDecision::PrivateOk
}

fn login_redirect(path: &str, options: &GatewayOptions) -> String {
    format!(
        "{}?{}={}",
        options.login_path,
        NEXT_PARAM,
        urlencoding::encode(path)
    )
}

fn is_public_path(path: &str, options: &GatewayOptions) -> bool {
    path == "/" || path == options.login_path || path == options.signup_path
}

fn is_asset_path(path: &str, options: &GatewayOptions) -> bool {
    if options
        .asset_prefixes
        .iter()
        .any(|prefix| path.starts_with(prefix.as_str()))
    {
        return true;
    }
    options.asset_extension_heuristic
        && path.rsplit('/').next().is_some_and(|last| last.contains('.'))
}

fn redirect(location: &str, clear_session: bool) -> Response<()> {
    let mut response = Response::new(());
    *response.status_mut() = StatusCode::TEMPORARY_REDIRECT;
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(LOCATION, value);
    }
    if clear_session {
        for removal in session::expired_set() {
            if let Ok(value) = HeaderValue::from_str(&removal.to_string()) {
                response.headers_mut().append(SET_COOKIE, value);
            }
        }
    }
    response
}
