// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Authenticated requests with a single, coordinated login redirect.
//!
//! [RequestExecutor::execute] makes sure the request carries a usable access
//! token, refreshing the session if needed, and classifies the outcome. When
//! the session cannot be recovered (there is no token and the refresh fails,
//! or the server answers `401 Unauthorized`) the executor prompts the user
//! and resets navigation to the login route. The process-wide
//! [NavigationLatch] guarantees at most one such redirect is underway, no
//! matter how many requests fail at the same time.

use crate::config::Config;
use crate::errors::{ExecuteError, ExpiryReason};
use crate::headers_util::build_request_headers;
use crate::latch::NavigationLatch;
use crate::navigator::Navigator;
use crate::request::RequestOptions;
use crate::session_manager::SessionManager;
use crate::token::Token;
use http::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// The title of the prompt shown before the login redirect.
pub const SESSION_EXPIRED_TITLE: &str = "Session Expired";

const FAILURE_STATUS: &str = "failure";

pub type Result<T> = std::result::Result<T, ExecuteError>;

/// Executes authenticated JSON requests.
///
/// Cloning is cheap, clones share the session manager, the HTTP client and
/// the navigation latch.
#[derive(Clone, Debug)]
pub struct RequestExecutor {
    inner: Arc<ExecutorInner>,
}

#[derive(Debug)]
struct ExecutorInner {
    client: reqwest::Client,
    sessions: Arc<SessionManager>,
    navigator: Arc<dyn Navigator>,
    latch: Arc<NavigationLatch>,
    api_url: Option<Url>,
    login_route: String,
    redirect_grace: Duration,
    request_timeout: Option<Duration>,
}

/// Creates a [RequestExecutor].
///
/// # Example
/// ```no_run
/// # use orderdesk_auth::config::Config;
/// # use orderdesk_auth::executor::RequestExecutor;
/// # use orderdesk_auth::navigator::Navigator;
/// # use orderdesk_auth::session_manager::SessionManager;
/// # use std::sync::Arc;
/// # fn sample(sessions: Arc<SessionManager>, navigator: Arc<dyn Navigator>) -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let executor = RequestExecutor::builder(sessions, navigator)
///     .with_config(config)
///     .build();
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct Builder {
    sessions: Arc<SessionManager>,
    navigator: Arc<dyn Navigator>,
    latch: Option<Arc<NavigationLatch>>,
    client: Option<reqwest::Client>,
    config: Config,
}

impl Builder {
    /// Uses `config` for the API URL, login route, grace period and
    /// request timeout.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Uses a private latch instead of [NavigationLatch::global].
    pub fn with_latch(mut self, latch: Arc<NavigationLatch>) -> Self {
        self.latch = Some(latch);
        self
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> RequestExecutor {
        let inner = ExecutorInner {
            client: self.client.unwrap_or_default(),
            sessions: self.sessions,
            navigator: self.navigator,
            latch: self.latch.unwrap_or_else(NavigationLatch::global),
            api_url: self.config.api_url().cloned(),
            login_route: self.config.login_route().to_string(),
            redirect_grace: self.config.redirect_grace(),
            request_timeout: self.config.request_timeout(),
        };
        RequestExecutor {
            inner: Arc::new(inner),
        }
    }
}

impl RequestExecutor {
    pub fn builder(sessions: Arc<SessionManager>, navigator: Arc<dyn Navigator>) -> Builder {
        Builder {
            sessions,
            navigator,
            latch: None,
            client: None,
            config: Config::default(),
        }
    }

    /// Returns true while a login redirect is underway.
    pub fn redirect_in_progress(&self) -> bool {
        self.inner.latch.is_engaged()
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.inner.sessions
    }

    /// Sends an authenticated request and returns the decoded JSON body.
    ///
    /// An empty response body decodes as [Value::Null].
    ///
    /// # Errors
    ///
    /// * [ExecuteError::RedirectInProgress] if a login redirect is underway.
    ///   No request is sent.
    /// * [ExecuteError::SessionExpired] if there is no usable token and the
    ///   session cannot be refreshed. Triggers the login redirect.
    /// * [ExecuteError::Unauthorized] if the server answers with `401`.
    ///   Triggers the login redirect.
    /// * [ExecuteError::NetworkOrServer] for transport errors, other
    ///   non-success statuses, malformed JSON, and bodies reporting
    ///   `"status": "failure"`.
    pub async fn execute(&self, options: RequestOptions) -> Result<Value> {
        let inner = &self.inner;
        if inner.latch.is_engaged() {
            tracing::debug!("login redirect in progress, skipping {}", options.url());
            return Err(ExecuteError::RedirectInProgress);
        }

        let token = self.usable_token().await?;
        let url = inner.resolve(options.url())?;
        let headers = build_request_headers(&token, options.headers())?;

        let mut builder = inner
            .client
            .request(options.method().clone(), url.clone())
            .headers(headers);
        if let Some(body) = options.body() {
            builder = builder.json(body);
        }
        if let Some(timeout) = inner.request_timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!("request to {url} failed: {e}");
            ExecuteError::NetworkOrServer(e.to_string())
        })?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("{url} rejected the access token");
            return Err(self.redirect_to_login(ExecuteError::Unauthorized));
        }
        let body = response
            .text()
            .await
            .map_err(|e| ExecuteError::NetworkOrServer(e.to_string()))?;
        if !status.is_success() {
            tracing::warn!("{url} returned {status}");
            return Err(ExecuteError::NetworkOrServer(format!(
                "the server returned {status}: {body}"
            )));
        }
        let value = decode_body(&body)?;
        check_business_status(value)
    }

    async fn usable_token(&self) -> Result<Token> {
        let sessions = &self.inner.sessions;
        let reason = match sessions.stored_token().await {
            Some(token) if !token.is_expired() => return Ok(token),
            Some(_) => ExpiryReason::Expired,
            None => ExpiryReason::Missing,
        };
        if let Err(e) = sessions.refresh_session().await {
            tracing::info!("cannot refresh the session: {e}");
            return Err(self.redirect_to_login(ExecuteError::SessionExpired { reason }));
        }
        match sessions.stored_token().await {
            Some(token) if !token.is_expired() => Ok(token),
            _ => Err(self.redirect_to_login(ExecuteError::SessionExpired {
                reason: ExpiryReason::Missing,
            })),
        }
    }

    // The latch is engaged before this returns. The prompt, the reset and
    // the release run in a background task, which owns the latch guard.
    fn redirect_to_login(&self, error: ExecuteError) -> ExecuteError {
        let inner = &self.inner;
        let Some(engaged) = inner.latch.engage() else {
            tracing::debug!("login redirect already in progress");
            return error;
        };
        tracing::warn!("redirecting to {}: {error}", inner.login_route);
        let message = error.to_string();
        let inner = inner.clone();
        tokio::spawn(async move {
            inner
                .navigator
                .acknowledge(SESSION_EXPIRED_TITLE, &message)
                .await;
            inner.navigator.reset_to(&inner.login_route);
            engaged.release_after(inner.redirect_grace).await;
        });
        error
    }
}

impl ExecutorInner {
    fn resolve(&self, url: &str) -> Result<Url> {
        match Url::parse(url) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.api_url.as_ref().ok_or_else(|| {
                    ExecuteError::NetworkOrServer(format!(
                        "cannot resolve {url:?} without an API URL"
                    ))
                })?;
                base.join(url.trim_start_matches('/')).map_err(|e| {
                    ExecuteError::NetworkOrServer(format!("invalid request URL {url:?}: {e}"))
                })
            }
            Err(e) => Err(ExecuteError::NetworkOrServer(format!(
                "invalid request URL {url:?}: {e}"
            ))),
        }
    }
}

fn decode_body(body: &str) -> Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body)
        .map_err(|e| ExecuteError::NetworkOrServer(format!("malformed response: {e}")))
}

fn check_business_status(value: Value) -> Result<Value> {
    if value.get("status").and_then(Value::as_str) != Some(FAILURE_STATUS) {
        return Ok(value);
    }
    let message = ["message", "error"]
        .iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .unwrap_or("the server reported a failure");
    Err(ExecuteError::NetworkOrServer(message.to_string()))
}
