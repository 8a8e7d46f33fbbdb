//! Session lifecycle gateway
//!
//! A server-side library that gates page requests behind authentication with
//! an absolute 8-hour session window, and wraps backend calls with
//! coordinated, single-flight access-token refresh.
//!
//! Three pieces, in dependency order:
//!
//! - [`token`]: fail-closed, unverified claim inspection over bearer tokens.
//! - [`interceptor`]: the per-request authentication gate; cheap cookie-only
//!   checks producing pass-through, redirect, or redirect-with-teardown.
//! - [`gateway`]: the backend caller; attaches the bearer token and, on a
//!   401, performs at most one refresh per session window shared across all
//!   concurrent callers.

pub mod config;
pub mod error;
pub mod fetch;
pub mod gateway;
pub mod interceptor;
pub mod session;
pub mod token;

pub use config::{GatewayOptions, SESSION_WINDOW_HOURS};
pub use error::{AuthError, Error};
pub use gateway::{Gateway, TokenPair};
pub use interceptor::{intercept, RouteDecision};
pub use session::SessionCookies;

/// A convenience module for common imports
pub mod prelude {
    pub use crate::config::GatewayOptions;
    pub use crate::error::{AuthError, Error};
    pub use crate::gateway::Gateway;
    pub use crate::interceptor::{intercept, RouteDecision};
    pub use crate::session::SessionCookies;
}
