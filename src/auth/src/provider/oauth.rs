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

//! An [IdentityProvider] speaking the OAuth 2.0 token endpoint protocol.
//!
//! Sign-in uses the resource owner password grant, and refresh uses the
//! refresh token grant, as described in [RFC 6749 Section 4.3] and
//! [RFC 6749 Section 6]. Requests and responses are JSON.
//!
//! The provider keeps the refresh token of each user in a [SessionStore],
//! under `refreshToken.<username>`, so a session can be reconstructed from
//! nothing more than a persisted username.
//!
//! ```
//! # use orderdesk_auth::provider::oauth::Builder;
//! # use orderdesk_auth::store::MemorySessionStore;
//! # use std::sync::Arc;
//! let provider = Builder::new("https://auth.example.com/oauth/token", "orderdesk-mobile")
//!     .with_store(Arc::new(MemorySessionStore::new()))
//!     .build();
//! ```
//!
//! [RFC 6749 Section 4.3]: https://datatracker.ietf.org/doc/html/rfc6749#section-4.3
//! [RFC 6749 Section 6]: https://datatracker.ietf.org/doc/html/rfc6749#section-6

use super::{IdentityProvider, Result};
use crate::errors::{self, ProviderError, is_transient};
use crate::session::{RefreshToken, Session, UserHandle};
use crate::store::SessionStore;
use crate::token::Token;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const REFRESH_TOKEN_KEY_PREFIX: &str = "refreshToken.";

fn refresh_token_key(user: &UserHandle) -> String {
    format!("{REFRESH_TOKEN_KEY_PREFIX}{}", user.username())
}

/// A builder for [OAuthProvider].
pub struct Builder {
    token_uri: String,
    client_id: String,
    store: Option<Arc<dyn SessionStore>>,
    client: Option<reqwest::Client>,
}

impl Builder {
    /// Creates a builder for the given token endpoint and OAuth client id.
    pub fn new<U: Into<String>, C: Into<String>>(token_uri: U, client_id: C) -> Self {
        Self {
            token_uri: token_uri.into(),
            client_id: client_id.into(),
            store: None,
            client: None,
        }
    }

    /// Persists refresh tokens in `store`.
    ///
    /// Without a store, sessions cannot be reconstructed after a restart.
    pub fn with_store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> OAuthProvider {
        OAuthProvider {
            client: self.client.unwrap_or_default(),
            token_uri: self.token_uri,
            client_id: self.client_id,
            store: self.store,
            state: Mutex::new(ProviderState::default()),
        }
    }
}

#[derive(Debug, Default)]
struct ProviderState {
    current: Option<UserHandle>,
    sessions: HashMap<UserHandle, Session>,
}

/// See the [module documentation](self).
pub struct OAuthProvider {
    client: reqwest::Client,
    token_uri: String,
    client_id: String,
    store: Option<Arc<dyn SessionStore>>,
    state: Mutex<ProviderState>,
}

impl std::fmt::Debug for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthProvider")
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("store", &self.store)
            .finish()
    }
}

impl OAuthProvider {
    fn state(&self) -> MutexGuard<'_, ProviderState> {
        // The state is a plain cache, a panic while holding the lock cannot
        // leave it half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn request_token(&self, request: TokenRequest<'_>) -> Result<Session> {
        let resp = self
            .client
            .post(self.token_uri.as_str())
            .json(&request)
            .send()
            .await
            .map_err(errors::transient)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp
                .text()
                .await
                .map_err(|e| ProviderError::new(is_transient(status), e))?;
            return Err(ProviderError::from_msg(
                is_transient(status),
                format!("token endpoint returned {status}: {body}"),
            ));
        }
        let response = resp.json::<TokenResponse>().await.map_err(|e| {
            let transient = !e.is_decode();
            ProviderError::new(transient, e)
        })?;
        Ok(Session::new(
            Some(Token::new(response.access_token)),
            response.refresh_token.map(RefreshToken::new),
        ))
    }

    async fn remember(&self, user: &UserHandle, session: &Session) -> Result<()> {
        if let (Some(store), Some(refresh)) = (&self.store, session.refresh_token()) {
            store
                .set(&refresh_token_key(user), refresh.as_str())
                .await
                .map_err(errors::non_transient)?;
        }
        let mut state = self.state();
        state.current = Some(user.clone());
        state.sessions.insert(user.clone(), session.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl IdentityProvider for OAuthProvider {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Session> {
        let session = self
            .request_token(TokenRequest::Password {
                client_id: &self.client_id,
                username,
                password,
            })
            .await?;
        self.remember(&self.user(username), &session).await?;
        Ok(session)
    }

    fn current_user(&self) -> Option<UserHandle> {
        self.state().current.clone()
    }

    async fn get_session(&self, user: &UserHandle) -> Result<Session> {
        if let Some(session) = self.state().sessions.get(user) {
            return Ok(session.clone());
        }
        let Some(store) = &self.store else {
            return Err(errors::non_transient_from_str(format!(
                "no session for user {}",
                user.username()
            )));
        };
        let refresh = store
            .get(&refresh_token_key(user))
            .await
            .map_err(errors::non_transient)?;
        match refresh {
            Some(r) => Ok(Session::new(None, Some(RefreshToken::new(r)))),
            None => Err(errors::non_transient_from_str(format!(
                "no session for user {}",
                user.username()
            ))),
        }
    }

    async fn refresh_session(
        &self,
        user: &UserHandle,
        refresh_token: &RefreshToken,
    ) -> Result<Session> {
        let session = self
            .request_token(TokenRequest::RefreshToken {
                client_id: &self.client_id,
                refresh_token: refresh_token.as_str(),
            })
            .await?
            .merge_refresh(Some(refresh_token));
        self.remember(user, &session).await?;
        Ok(session)
    }

    async fn sign_out(&self, user: &UserHandle) {
        {
            let mut state = self.state();
            state.sessions.remove(user);
            if state.current.as_ref() == Some(user) {
                state.current = None;
            }
        }
        if let Some(store) = &self.store {
            if let Err(e) = store.remove(&refresh_token_key(user)).await {
                tracing::warn!("cannot forget refresh token for {}: {e}", user.username());
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "grant_type", rename_all = "snake_case")]
enum TokenRequest<'a> {
    Password {
        client_id: &'a str,
        username: &'a str,
        password: &'a str,
    },
    RefreshToken {
        client_id: &'a str,
        refresh_token: &'a str,
    },
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemorySessionStore;
    use httptest::{Expectation, Server, matchers::*, responders::*};
    use orderdesk_test_utils::tokens::jwt_expiring_in;
    use serde_json::json;

    type TestResult = anyhow::Result<()>;

    fn provider(server: &Server, store: Arc<dyn SessionStore>) -> OAuthProvider {
        Builder::new(server.url("/token").to_string(), "test-client")
            .with_store(store)
            .build()
    }

    #[test]
    fn request_serde() -> TestResult {
        let got = serde_json::to_value(TokenRequest::Password {
            client_id: "c",
            username: "alice",
            password: "p",
        })?;
        assert_eq!(
            got,
            json!({"grant_type": "password", "client_id": "c", "username": "alice", "password": "p"})
        );

        let got = serde_json::to_value(TokenRequest::RefreshToken {
            client_id: "c",
            refresh_token: "r",
        })?;
        assert_eq!(
            got,
            json!({"grant_type": "refresh_token", "client_id": "c", "refresh_token": "r"})
        );
        Ok(())
    }

    #[test]
    fn response_serde_partial() -> TestResult {
        let got = serde_json::from_value::<TokenResponse>(
            json!({"access_token": "a", "token_type": "Bearer", "expires_in": 3600}),
        )?;
        assert_eq!(got.access_token, "a");
        assert_eq!(got.refresh_token, None);
        Ok(())
    }

    #[test]
    fn debug() {
        let provider = Builder::new("https://auth.example.com/token", "test-client").build();
        let got = format!("{provider:?}");
        assert!(got.contains("https://auth.example.com/token"), "{got}");
        assert!(got.contains("test-client"), "{got}");
    }

    #[tokio::test]
    async fn authenticate_success() -> TestResult {
        let access = jwt_expiring_in(3600);
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/token"),
                request::body(json_decoded(eq(json!({
                    "grant_type": "password",
                    "client_id": "test-client",
                    "username": "alice",
                    "password": "secret",
                })))),
            ])
            .respond_with(json_encoded(json!({
                "access_token": access,
                "refresh_token": "test-refresh",
                "token_type": "Bearer",
                "expires_in": 3600,
            }))),
        );

        let store = Arc::new(MemorySessionStore::new());
        let provider = provider(&server, store.clone());
        let session = provider.authenticate("alice", "secret").await?;
        assert!(session.is_valid());
        assert_eq!(session.access_token().map(Token::as_str), Some(access.as_str()));
        assert_eq!(provider.current_user(), Some(UserHandle::new("alice")));
        assert_eq!(
            store.get("refreshToken.alice").await?.as_deref(),
            Some("test-refresh")
        );

        let cached = provider.get_session(&UserHandle::new("alice")).await?;
        assert_eq!(cached, session);
        Ok(())
    }

    #[tokio::test]
    async fn authenticate_rejected() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/token"))
                .respond_with(status_code(400).body("invalid_grant")),
        );

        let provider = provider(&server, Arc::new(MemorySessionStore::new()));
        let err = provider.authenticate("alice", "wrong").await.unwrap_err();
        assert!(!err.is_transient(), "{err:?}");
        assert!(err.to_string().contains("invalid_grant"), "{err}");
        assert_eq!(provider.current_user(), None);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_transient_failure() -> TestResult {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/token"))
                .respond_with(status_code(503)),
        );

        let provider = provider(&server, Arc::new(MemorySessionStore::new()));
        let err = provider
            .refresh_session(&UserHandle::new("alice"), &RefreshToken::new("r"))
            .await
            .unwrap_err();
        assert!(err.is_transient(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn refresh_keeps_refresh_token() -> TestResult {
        let access = jwt_expiring_in(3600);
        let server = Server::run();
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/token"),
                request::body(json_decoded(eq(json!({
                    "grant_type": "refresh_token",
                    "client_id": "test-client",
                    "refresh_token": "test-refresh",
                })))),
            ])
            .respond_with(json_encoded(json!({"access_token": access}))),
        );

        let provider = provider(&server, Arc::new(MemorySessionStore::new()));
        let user = UserHandle::new("alice");
        let session = provider
            .refresh_session(&user, &RefreshToken::new("test-refresh"))
            .await?;
        assert!(session.is_valid());
        assert_eq!(
            session.refresh_token(),
            Some(&RefreshToken::new("test-refresh"))
        );
        assert_eq!(provider.current_user(), Some(user));
        Ok(())
    }

    #[tokio::test]
    async fn get_session_from_store() -> TestResult {
        let store = Arc::new(MemorySessionStore::new());
        store.set("refreshToken.alice", "persisted").await?;
        let provider = Builder::new("http://unused.invalid/token", "test-client")
            .with_store(store)
            .build();

        let session = provider.get_session(&UserHandle::new("alice")).await?;
        assert!(!session.is_valid());
        assert_eq!(session.refresh_token(), Some(&RefreshToken::new("persisted")));

        let err = provider
            .get_session(&UserHandle::new("bob"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bob"), "{err}");
        Ok(())
    }

    #[tokio::test]
    async fn get_session_without_store() {
        let provider = Builder::new("http://unused.invalid/token", "test-client").build();
        assert!(provider.get_session(&UserHandle::new("alice")).await.is_err());
    }

    #[tokio::test]
    async fn sign_out_forgets_user() -> TestResult {
        let store = Arc::new(MemorySessionStore::new());
        store.set("refreshToken.alice", "persisted").await?;
        let provider = Builder::new("http://unused.invalid/token", "test-client")
            .with_store(store.clone())
            .build();
        let user = UserHandle::new("alice");
        provider
            .remember(&user, &Session::new(None, Some(RefreshToken::new("r"))))
            .await?;
        assert_eq!(provider.current_user(), Some(user.clone()));

        provider.sign_out(&user).await;
        assert_eq!(provider.current_user(), None);
        assert_eq!(store.get("refreshToken.alice").await?, None);
        assert!(provider.get_session(&user).await.is_err());
        Ok(())
    }
}
