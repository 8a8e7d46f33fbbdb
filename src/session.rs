//! The session cookie set
//!
//! Four cookies jointly carry a login: the access token, the refresh token,
//! the tenant identifier, and the refreshed-once marker. They are created by
//! the login flow, replaced by the refresh endpoint, and torn down here as a
//! set, never individually.

use cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie carrying the bearer access token.
pub const ACCESS_TOKEN: &str = "access_token";
/// Cookie carrying the refresh credential.
pub const REFRESH_TOKEN: &str = "refresh_token";
/// Cookie carrying the tenant identifier required by the refresh call.
pub const COMPANY_ID: &str = "company_id";
/// Marker present after the first refresh inside the current session window.
pub const REFRESHED_ONCE: &str = "refreshed_once";

/// The session cookie set as read from one incoming request.
///
/// Absent cookies stay `None`; what an absence means is judged by the
/// interceptor and the gateway, not here.
#[derive(Debug, Clone, Default)]
pub struct SessionCookies {
    /// Opaque bearer credential; decodes (unverified) to at least `iat`.
    pub access_token: Option<String>,
    /// Credential exchanged for a new access token.
    pub refresh_token: Option<String>,
    /// Tenant identifier required by the refresh call.
    pub company_id: Option<String>,
    /// Whether the window's single silent renewal was already spent.
    pub refreshed_once: bool,
}

impl SessionCookies {
    /// Parse the session set out of a raw `Cookie` request header.
    pub fn from_cookie_header(header: &str) -> Self {
        let mut cookies = Self::default();
        for pair in Cookie::split_parse(header).flatten() {
            match pair.name() {
                ACCESS_TOKEN => cookies.access_token = Some(pair.value().to_string()),
                REFRESH_TOKEN => cookies.refresh_token = Some(pair.value().to_string()),
                COMPANY_ID => cookies.company_id = Some(pair.value().to_string()),
                REFRESHED_ONCE => cookies.refreshed_once = true,
                _ => {}
            }
        }
        cookies
    }

    /// Whether both pieces of refresh material are present.
    pub fn has_refresh_material(&self) -> bool {
        self.refresh_token.is_some() && self.company_id.is_some()
    }
}

/// Build the four removal cookies that tear the session down.
///
/// Emitted together in one response-construction step so there is no window
/// where some cookies are cleared and others linger.
pub fn expired_set() -> [Cookie<'static>; 4] {
    [ACCESS_TOKEN, REFRESH_TOKEN, COMPANY_ID, REFRESHED_ONCE].map(removal)
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::ZERO)
        .build()
}
