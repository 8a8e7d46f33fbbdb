//! Configuration options for the interceptor and gateway

use std::time::Duration;

/// Absolute ceiling on a session's lifetime in hours, measured from the
/// access token's issued-at claim. Applied identically by the interceptor
/// and the gateway.
pub const SESSION_WINDOW_HOURS: u64 = 8;

/// Configuration shared by the interceptor and the backend call gateway
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Base URL of the backend API, without a trailing slash.
    pub base_url: String,

    /// Path of the token refresh endpoint, relative to `base_url`.
    pub refresh_path: String,

    /// Login page path; redirect target for unauthenticated or expired
    /// requests.
    pub login_path: String,

    /// Signup page path; authenticated users are bounced off it.
    pub signup_path: String,

    /// Landing page for authenticated users.
    pub dashboard_path: String,

    /// Request path prefix that bypasses the interceptor entirely.
    pub api_prefix: String,

    /// Path prefixes treated as static or framework-internal.
    pub asset_prefixes: Vec<String>,

    /// Also treat paths whose last segment contains a dot as static assets.
    /// Disable when the application serves dotted private paths.
    pub asset_extension_heuristic: bool,

    /// Timeout applied to backend calls.
    pub request_timeout: Option<Duration>,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            refresh_path: "/auth/refresh".to_string(),
            login_path: "/login".to_string(),
            signup_path: "/signup".to_string(),
            dashboard_path: "/dashboard".to_string(),
            api_prefix: "/api/".to_string(),
            asset_prefixes: vec!["/_assets/".to_string(), "/static/".to_string()],
            asset_extension_heuristic: true,
            request_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl GatewayOptions {
    /// Create options for a backend at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Set the refresh endpoint path
    pub fn with_refresh_path(mut self, value: &str) -> Self {
        self.refresh_path = value.to_string();
        self
    }

    /// Set the dashboard path
    pub fn with_dashboard_path(mut self, value: &str) -> Self {
        self.dashboard_path = value.to_string();
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set the static-asset path prefixes
    pub fn with_asset_prefixes(mut self, value: Vec<String>) -> Self {
        self.asset_prefixes = value;
        self
    }

    /// Set whether dotted final path segments count as static assets
    pub fn with_asset_extension_heuristic(mut self, value: bool) -> Self {
        self.asset_extension_heuristic = value;
        self
    }
}
