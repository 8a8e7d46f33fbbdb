//! Error handling for the session gateway

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Authentication failures that terminate the current session.
///
/// Raised as its own family so calling code can uniformly trigger
/// "redirect to login and clear the cookie set" without inspecting HTTP
/// status codes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The absolute session window has been exceeded.
    #[error("session expired")]
    SessionExpired,

    /// A 401 with no usable refresh material, or a 401 that survived a
    /// refresh attempt.
    #[error("unauthorized")]
    Unauthorized,

    /// A 401 after the window's single silent renewal was already spent.
    #[error("refresh budget exhausted")]
    RefreshBudgetExhausted,
}

/// Unified error type for the session gateway
#[derive(Error, Debug)]
pub enum Error {
    /// Authentication errors; terminal for the current session
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Non-auth backend rejection, with optional field-level validation
    /// details
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        details: Option<HashMap<String, Vec<String>>>,
    },

    /// Token refresh failures
    #[error("refresh error: {0}")]
    Refresh(String),

    /// Network or HTTP related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parsing errors
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Create a new API error
    pub fn api<T: fmt::Display>(
        status: u16,
        message: T,
        details: Option<HashMap<String, Vec<String>>>,
    ) -> Self {
        Error::Api {
            status,
            message: message.to_string(),
            details,
        }
    }

    /// Create a new refresh error
    pub fn refresh<T: fmt::Display>(msg: T) -> Self {
        Error::Refresh(msg.to_string())
    }

    /// Whether this error is in the auth family.
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}
