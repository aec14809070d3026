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

//! The identity provider seam.
//!
//! Identity provider SDKs are often callback driven. Implementations of
//! [IdentityProvider] adapt them to async functions, so the session manager
//! only deals with `Result`s.

use crate::errors::ProviderError;
use crate::session::{RefreshToken, Session, UserHandle};

pub mod oauth;

/// A `Result` alias where the `Err` case is [ProviderError].
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Issues tokens, validates credentials and exchanges refresh tokens.
#[async_trait::async_trait]
pub trait IdentityProvider: std::fmt::Debug + Send + Sync {
    /// Validates the credentials and starts a new session.
    async fn authenticate(&self, username: &str, password: &str) -> Result<Session>;

    /// The user that last signed in through this provider, if any.
    fn current_user(&self) -> Option<UserHandle>;

    /// Reconstructs a handle for a persisted username.
    fn user(&self, username: &str) -> UserHandle {
        UserHandle::new(username)
    }

    /// Returns the session the provider holds for `user`.
    ///
    /// The session may be expired, or hold only refresh materials.
    async fn get_session(&self, user: &UserHandle) -> Result<Session>;

    /// Exchanges a refresh token for a new session.
    async fn refresh_session(
        &self,
        user: &UserHandle,
        refresh_token: &RefreshToken,
    ) -> Result<Session>;

    /// Signs the user out. Best effort, failures are not reported.
    async fn sign_out(&self, user: &UserHandle);
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    mockall::mock! {
        #[derive(Debug)]
        pub IdentityProvider { }

        #[async_trait::async_trait]
        impl IdentityProvider for IdentityProvider {
            async fn authenticate(&self, username: &str, password: &str) -> Result<Session>;
            fn current_user(&self) -> Option<UserHandle>;
            fn user(&self, username: &str) -> UserHandle;
            async fn get_session(&self, user: &UserHandle) -> Result<Session>;
            async fn refresh_session(
                &self,
                user: &UserHandle,
                refresh_token: &RefreshToken,
            ) -> Result<Session>;
            async fn sign_out(&self, user: &UserHandle);
        }
    }
}
