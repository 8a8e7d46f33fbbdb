//! Backend call gateway: authenticated calls with coordinated token refresh
//!
//! Server-side request handlers call the backend through [`Gateway`]. It
//! attaches the bearer token, enforces the absolute session window before
//! touching the network, and on a 401 performs at most one refresh per
//! session window, coordinated so that concurrent callers share a single
//! in-flight refresh request.

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, warn};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::{GatewayOptions, SESSION_WINDOW_HOURS};
use crate::error::{AuthError, Error};
use crate::fetch::Fetch;
use crate::session::SessionCookies;
use crate::token;

/// Token pair issued by the backend's refresh endpoint.
///
/// Both fields are required; a response missing either is a failed refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
struct RefreshRequest {
    refresh_token: String,
    company_id: String,
}

/// Error body shape used by the backend for non-OK responses.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Option<HashMap<String, Vec<String>>>,
}

// The outcome must be Clone so every waiter on the shared handle observes
// the same resolution.
type RefreshOutcome = Result<TokenPair, Arc<Error>>;
type RefreshHandle = Shared<BoxFuture<'static, RefreshOutcome>>;

/// Authenticated caller for the backend API.
///
/// Holds the one process-wide single-flight refresh slot. The guarantee is
/// per process: horizontally scaled instances each hold their own slot, so
/// concurrent refresh races across instances are not prevented here.
pub struct Gateway {
    options: GatewayOptions,
    client: Client,
    refresh_slot: Arc<Mutex<Option<RefreshHandle>>>,
}

impl Gateway {
    /// Create a new gateway.
    pub fn new(options: GatewayOptions) -> Self {
        Self::with_client(options, Client::new())
    }

    /// Create a new gateway reusing an existing HTTP client.
    pub fn with_client(options: GatewayOptions, client: Client) -> Self {
        Self {
            options,
            client,
            refresh_slot: Arc::new(Mutex::new(None)),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.options.base_url, path)
    }

    /// Issue an authenticated backend call.
    ///
    /// Fails with [`AuthError::SessionExpired`] before any network call when
    /// the access token has outlived the absolute window. On a 401, performs
    /// at most one coordinated refresh followed by exactly one retry; the
    /// retry's outcome is returned without a further refresh attempt.
    pub async fn call<T: Serialize>(
        &self,
        method: Method,
        path: &str,
        session: &SessionCookies,
        body: Option<&T>,
    ) -> Result<Response, Error> {
        if let Some(access_token) = &session.access_token {
            if token::age_exceeds(access_token, SESSION_WINDOW_HOURS) {
                return Err(AuthError::SessionExpired.into());
            }
        }

        let response = self
            .send(method.clone(), path, session.access_token.as_deref(), body)
            .await?;
        if response.status() != reqwest::StatusCode::UNAUTHORIZED {
            return Self::check(response).await;
        }

        // 401: decide whether a refresh is allowed before touching the
        // network again.
        let (Some(refresh_token), Some(company_id)) =
            (session.refresh_token.as_deref(), session.company_id.as_deref())
        else {
            return Err(AuthError::Unauthorized.into());
        };
        if session.refreshed_once {
            warn!("401 with refresh budget already spent; caller must re-login");
            return Err(AuthError::RefreshBudgetExhausted.into());
        }
        if let Some(access_token) = &session.access_token {
            // The absolute ceiling always wins over an opportunistic refresh.
            if token::age_exceeds(access_token, SESSION_WINDOW_HOURS) {
                return Err(AuthError::SessionExpired.into());
            }
        }

        match self.refresh(refresh_token, company_id).await {
            Ok(tokens) => {
                let retried = self
                    .send(method, path, Some(&tokens.access_token), body)
                    .await?;
                Self::check(retried).await
            }
            Err(err) => {
                // A failed refresh never cascades; the original 401 is what
                // the caller sees.
                warn!("token refresh failed: {}", err);
                Err(AuthError::Unauthorized.into())
            }
        }
    }

    /// Issue a call and deserialize the success body.
    pub async fn call_json<T: Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        session: &SessionCookies,
        body: Option<&T>,
    ) -> Result<R, Error> {
        let response = self.call(method, path, session, body).await?;
        Ok(response.json().await?)
    }

    /// `GET` without a body.
    pub async fn get(&self, path: &str, session: &SessionCookies) -> Result<Response, Error> {
        self.call::<()>(Method::GET, path, session, None).await
    }

    /// `POST` with a JSON body.
    pub async fn post<T: Serialize>(
        &self,
        path: &str,
        session: &SessionCookies,
        body: &T,
    ) -> Result<Response, Error> {
        self.call(Method::POST, path, session, Some(body)).await
    }

    /// `PUT` with a JSON body.
    pub async fn put<T: Serialize>(
        &self,
        path: &str,
        session: &SessionCookies,
        body: &T,
    ) -> Result<Response, Error> {
        self.call(Method::PUT, path, session, Some(body)).await
    }

    /// `DELETE` without a body.
    pub async fn delete(&self, path: &str, session: &SessionCookies) -> Result<Response, Error> {
        self.call::<()>(Method::DELETE, path, session, None).await
    }

    async fn send<T: Serialize>(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
        body: Option<&T>,
    ) -> Result<Response, Error> {
        let mut request = Fetch::request(&self.client, &self.api_url(path), method)
            .timeout(self.options.request_timeout);
        if let Some(bearer) = bearer {
            request = request.bearer_auth(bearer);
        }
        if let Some(body) = body {
            request = request.json(body)?;
        }
        request.execute_raw().await
    }

    /// Map a non-OK response onto the error taxonomy. A 401 here is
    /// terminal: it is only reached when no refresh is permitted, or on the
    /// post-refresh retry.
    async fn check(response: Response) -> Result<Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AuthError::Unauthorized.into());
        }

        let code = status.as_u16();
        let body: ApiErrorBody = response.json().await.unwrap_or_default();
        Err(Error::api(
            code,
            body.message.unwrap_or_else(|| "request failed".to_string()),
            body.errors,
        ))
    }

    /// Exchange the refresh token for a new pair, sharing one in-flight
    /// refresh across all concurrent callers.
    async fn refresh(&self, refresh_token: &str, company_id: &str) -> RefreshOutcome {
        self.refresh_handle(refresh_token, company_id).await
    }

    /// Get the in-flight refresh handle, starting a refresh if none is
    /// pending.
    ///
    /// Publish-before-await, clear-after-settle: handle replacement in the
    /// slot is the only synchronization point. The refresh runs on a spawned
    /// task, so a caller that disconnects mid-await leaves it running for
    /// the other waiters.
    fn refresh_handle(&self, refresh_token: &str, company_id: &str) -> RefreshHandle {
        let mut slot = self.refresh_slot.lock().unwrap();
        if let Some(handle) = slot.as_ref() {
            debug!("attaching to in-flight token refresh");
            return handle.clone();
        }

        debug!("starting token refresh");
        let client = self.client.clone();
        let url = self.api_url(&self.options.refresh_path);
        let timeout = self.options.request_timeout;
        let request = RefreshRequest {
            refresh_token: refresh_token.to_string(),
            company_id: company_id.to_string(),
        };
        let slot_handle = Arc::clone(&self.refresh_slot);

        let task = tokio::spawn(async move {
            let outcome = perform_refresh(client, url, request, timeout)
                .await
                .map_err(Arc::new);
            match &outcome {
                Ok(_) => debug!("token refresh succeeded"),
                Err(err) => warn!("token refresh request failed: {}", err),
            }
            // Settled: the next distinct refresh need starts a fresh handle.
            *slot_handle.lock().unwrap() = None;
            outcome
        });

        let handle: RefreshHandle = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(err) => Err(Arc::new(Error::refresh(format!(
                    "refresh task failed: {}",
                    err
                )))),
            }
        }
        .boxed()
        .shared();

        *slot = Some(handle.clone());
        handle
    }
}

async fn perform_refresh(
    client: Client,
    url: String,
    request: RefreshRequest,
    timeout: Option<Duration>,
) -> Result<TokenPair, Error> {
    let response = Fetch::post(&client, &url)
        .timeout(timeout)
        .json(&request)?
        .execute_raw()
        .await?;

    if !response.status().is_success() {
        return Err(Error::refresh(format!(
            "refresh endpoint returned {}",
            response.status()
        )));
    }

    // Deserializing into TokenPair rejects bodies missing either token.
    let pair: TokenPair = response.json().await?;
    Ok(pair)
}
