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

//! Configuration for the session manager and the request executor.
//!
//! Every setting has a default, so `Config::default()` is usable as-is. Use
//! the `with_*` methods to override settings, or [Config::from_env] to read
//! them from the environment.

use crate::errors::ConfigError;
use crate::provider::oauth::{Builder as OAuthBuilder, OAuthProvider};
use crate::store::{FileSessionStore, MemorySessionStore, SessionStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// The base URL for relative request URLs.
pub const API_URL_VAR: &str = "ORDERDESK_API_URL";
/// The OAuth 2.0 token endpoint.
pub const TOKEN_URL_VAR: &str = "ORDERDESK_TOKEN_URL";
/// The OAuth 2.0 client id.
pub const CLIENT_ID_VAR: &str = "ORDERDESK_CLIENT_ID";
/// The file backing the session store.
pub const SESSION_FILE_VAR: &str = "ORDERDESK_SESSION_FILE";
/// The navigation route of the login screen.
pub const LOGIN_ROUTE_VAR: &str = "ORDERDESK_LOGIN_ROUTE";
/// Milliseconds between the login prompt being dismissed and the next
/// prompt being allowed.
pub const REDIRECT_GRACE_VAR: &str = "ORDERDESK_REDIRECT_GRACE_MS";
/// Per-request timeout in milliseconds.
pub const REQUEST_TIMEOUT_VAR: &str = "ORDERDESK_REQUEST_TIMEOUT_MS";

const DEFAULT_LOGIN_ROUTE: &str = "Login";
const DEFAULT_REDIRECT_GRACE: Duration = Duration::from_millis(500);
const DEFAULT_CLIENT_ID: &str = "orderdesk-mobile";

/// See the [module documentation](self).
#[derive(Clone, Debug)]
pub struct Config {
    api_url: Option<Url>,
    token_url: Option<Url>,
    client_id: String,
    session_file: Option<PathBuf>,
    login_route: String,
    redirect_grace: Duration,
    request_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: None,
            token_url: None,
            client_id: DEFAULT_CLIENT_ID.to_string(),
            session_file: None,
            login_route: DEFAULT_LOGIN_ROUTE.to_string(),
            redirect_grace: DEFAULT_REDIRECT_GRACE,
            request_timeout: None,
        }
    }
}

impl Config {
    /// Reads the configuration from `ORDERDESK_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [ConfigError] if a URL or a duration fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        if let Some(url) = env_var(API_URL_VAR) {
            config = config.with_api_url(parse_url(API_URL_VAR, &url)?);
        }
        if let Some(url) = env_var(TOKEN_URL_VAR) {
            config = config.with_token_url(parse_url(TOKEN_URL_VAR, &url)?);
        }
        if let Some(id) = env_var(CLIENT_ID_VAR) {
            config = config.with_client_id(id);
        }
        if let Some(path) = env_var(SESSION_FILE_VAR) {
            config = config.with_session_file(path);
        }
        if let Some(route) = env_var(LOGIN_ROUTE_VAR) {
            config = config.with_login_route(route);
        }
        if let Some(ms) = env_var(REDIRECT_GRACE_VAR) {
            config = config.with_redirect_grace(parse_millis(REDIRECT_GRACE_VAR, &ms)?);
        }
        if let Some(ms) = env_var(REQUEST_TIMEOUT_VAR) {
            config = config.with_request_timeout(parse_millis(REQUEST_TIMEOUT_VAR, &ms)?);
        }
        Ok(config)
    }

    /// Sets the base URL used to resolve relative request URLs.
    ///
    /// A trailing `/` is added if missing, so `https://api.example.com/v1`
    /// resolves `orders` to `https://api.example.com/v1/orders`.
    pub fn with_api_url(mut self, mut url: Url) -> Self {
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        self.api_url = Some(url);
        self
    }

    pub fn with_token_url(mut self, url: Url) -> Self {
        self.token_url = Some(url);
        self
    }

    pub fn with_client_id<T: Into<String>>(mut self, client_id: T) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Persists the session in a JSON file instead of in memory.
    pub fn with_session_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.session_file = Some(path.into());
        self
    }

    /// Sets the route the navigation stack is reset to when the session is
    /// lost. Defaults to `Login`.
    pub fn with_login_route<T: Into<String>>(mut self, route: T) -> Self {
        self.login_route = route.into();
        self
    }

    /// Sets the delay between the login prompt being dismissed and the next
    /// prompt being allowed. Defaults to 500ms.
    pub fn with_redirect_grace(mut self, grace: Duration) -> Self {
        self.redirect_grace = grace;
        self
    }

    /// Sets a timeout for each request. By default there is none.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn api_url(&self) -> Option<&Url> {
        self.api_url.as_ref()
    }

    pub fn token_url(&self) -> Option<&Url> {
        self.token_url.as_ref()
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn session_file(&self) -> Option<&PathBuf> {
        self.session_file.as_ref()
    }

    pub fn login_route(&self) -> &str {
        &self.login_route
    }

    pub fn redirect_grace(&self) -> Duration {
        self.redirect_grace
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    /// Creates the configured session store.
    ///
    /// A [FileSessionStore] if a session file is configured, otherwise a
    /// [MemorySessionStore].
    pub fn session_store(&self) -> Arc<dyn SessionStore> {
        match &self.session_file {
            Some(path) => Arc::new(FileSessionStore::new(path.clone())),
            None => Arc::new(MemorySessionStore::new()),
        }
    }

    /// Creates an [OAuthProvider] for the configured token endpoint.
    ///
    /// Returns `None` if no token endpoint is configured.
    pub fn oauth_provider(&self, store: Arc<dyn SessionStore>) -> Option<OAuthProvider> {
        let token_url = self.token_url.as_ref()?;
        Some(
            OAuthBuilder::new(token_url.as_str(), self.client_id.as_str())
                .with_store(store)
                .build(),
        )
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_url(name: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl { name, source })
}

fn parse_millis(name: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::InvalidDuration {
            name,
            value: value.to_string(),
        })
}
