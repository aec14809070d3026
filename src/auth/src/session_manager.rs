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

//! The single source of truth for "are we logged in, and with what token".
//!
//! [SessionManager] owns the in-memory [Session] and keeps the
//! [SessionStore] in sync with it. The store is always written before the
//! in-memory session changes, so memory is never ahead of the store.
//!
//! Concurrent refreshes are coalesced. A caller that arrives while a refresh
//! is in flight waits for it and shares its outcome, instead of starting a
//! second exchange with the identity provider.

use crate::errors::{self, SessionError};
use crate::provider::IdentityProvider;
use crate::session::{Session, UserHandle};
use crate::store::{AUTH_TOKEN_KEY, SessionStore, USERNAME_KEY};
use crate::token::Token;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// A `Result` alias where the `Err` case is [SessionError].
pub type Result<T> = std::result::Result<T, SessionError>;

#[derive(Debug, Default)]
struct State {
    user: Option<UserHandle>,
    session: Option<Session>,
}

/// See the [module documentation](self).
#[derive(Debug)]
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    store: Arc<dyn SessionStore>,
    state: Mutex<State>,

    // Held for the duration of a refresh, together with its last outcome.
    refresh: Mutex<Option<Result<()>>>,
    // Incremented each time a refresh completes.
    refresh_generation: AtomicU64,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            provider,
            store,
            state: Mutex::new(State::default()),
            refresh: Mutex::new(None),
            refresh_generation: AtomicU64::new(0),
        }
    }

    /// Restores the session of the last signed-in user.
    ///
    /// If a username was persisted, reconstructs its handle and refreshes the
    /// session. On any failure the manager logs out, leaving a clean
    /// unauthenticated state. Returns `true` if a session was restored.
    pub async fn initialize(&self) -> bool {
        let username = match self.store.get(USERNAME_KEY).await {
            Ok(Some(u)) => u,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!("cannot read the persisted username: {e}");
                self.logout().await;
                return false;
            }
        };
        self.state.lock().await.user = Some(self.provider.user(&username));
        match self.refresh_session().await {
            Ok(()) => {
                tracing::info!("restored session for {username}");
                true
            }
            Err(e) => {
                tracing::info!("cannot restore session for {username}: {e}");
                self.logout().await;
                false
            }
        }
    }

    /// Signs in and persists the new session.
    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let session = self
            .provider
            .authenticate(username, password)
            .await
            .map_err(SessionError::AuthenticationFailed)?;
        let token = session.access_token().cloned().ok_or_else(|| {
            SessionError::AuthenticationFailed(errors::non_transient_from_str(
                "the identity provider returned a session without an access token",
            ))
        })?;
        self.adopt(self.provider.user(username), session, &token).await?;
        // The username marks a restorable session, so it is written last.
        if let Err(e) = self.store.set(USERNAME_KEY, username).await {
            self.logout().await;
            return Err(e.into());
        }
        tracing::info!("signed in as {username}");
        Ok(())
    }

    /// Returns `true` if the persisted token is usable, refreshing it if it
    /// has expired.
    ///
    /// Never fails: refresh errors are logged and reported as `false`.
    pub async fn is_authenticated(&self) -> bool {
        match self.stored_token().await {
            None => false,
            Some(token) if !token.is_expired() => true,
            Some(_) => match self.refresh_session().await {
                Ok(()) => true,
                Err(e) => {
                    tracing::debug!("session refresh failed: {e}");
                    false
                }
            },
        }
    }

    /// Obtains a fresh session from the identity provider and persists its
    /// token.
    ///
    /// # Errors
    ///
    /// * [SessionError::NoUser] if there is no user handle.
    /// * [SessionError::NoRefreshToken] if the provider session is expired
    ///   and has no refresh token.
    /// * [SessionError::RefreshFailed] if the provider fails.
    /// * [SessionError::Storage] if the new token cannot be persisted.
    pub async fn refresh_session(&self) -> Result<()> {
        let seen = self.refresh_generation.load(Ordering::Acquire);
        let mut last = self.refresh.lock().await;
        if self.refresh_generation.load(Ordering::Acquire) != seen {
            if let Some(outcome) = last.as_ref() {
                // A refresh completed while we waited for the lock.
                return outcome.clone();
            }
        }

        let outcome = self.refresh_now().await;
        *last = Some(outcome.clone());
        self.refresh_generation.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    async fn refresh_now(&self) -> Result<()> {
        let user = self.state.lock().await.user.clone();
        let user = user
            .or_else(|| self.provider.current_user())
            .ok_or(SessionError::NoUser)?;

        let current = self
            .provider
            .get_session(&user)
            .await
            .map_err(SessionError::RefreshFailed)?;
        let session = if current.is_valid() {
            current
        } else {
            let refresh_token = current
                .refresh_token()
                .ok_or(SessionError::NoRefreshToken)?;
            tracing::debug!("refreshing session for {}", user.username());
            self.provider
                .refresh_session(&user, refresh_token)
                .await
                .map_err(SessionError::RefreshFailed)?
        };
        let token = session.access_token().cloned().ok_or_else(|| {
            SessionError::RefreshFailed(errors::non_transient_from_str(
                "the identity provider returned a session without an access token",
            ))
        })?;
        self.adopt(user, session, &token).await
    }

    // Persist first, then swap the in-memory session.
    async fn adopt(&self, user: UserHandle, session: Session, token: &Token) -> Result<()> {
        self.store.set(AUTH_TOKEN_KEY, token.as_str()).await?;
        let mut state = self.state.lock().await;
        state.user = Some(user);
        state.session = Some(session);
        Ok(())
    }

    /// Signs out and clears the in-memory and persisted session.
    ///
    /// Best effort: sign-out and storage failures are logged, not reported.
    ///
    /// Waits for an in-flight refresh to complete, so the refresh cannot
    /// restore the session afterwards.
    pub async fn logout(&self) {
        let mut last = self.refresh.lock().await;
        *last = None;
        let user = {
            let mut state = self.state.lock().await;
            state.session = None;
            state.user.take()
        };
        if let Some(user) = user.or_else(|| self.provider.current_user()) {
            self.provider.sign_out(&user).await;
            tracing::info!("signed out {}", user.username());
        }
        for key in [AUTH_TOKEN_KEY, USERNAME_KEY] {
            if let Err(e) = self.store.remove(key).await {
                tracing::warn!("cannot remove {key} from the session store: {e}");
            }
        }
    }

    /// Reads and decodes the persisted token.
    pub async fn stored_token(&self) -> Option<Token> {
        match self.store.get(AUTH_TOKEN_KEY).await {
            Ok(token) => token.map(Token::new),
            Err(e) => {
                tracing::warn!("cannot read the persisted token: {e}");
                None
            }
        }
    }

    /// The username of the signed-in user, if any.
    pub async fn username(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.user.as_ref().map(|u| u.username().to_string())
    }
}
