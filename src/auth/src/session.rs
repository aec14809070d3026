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

//! The in-memory session and the identity references it is built from.

use crate::token::Token;

/// A provider-side reference to a user.
///
/// Handles are cheap to construct from a username. They carry no secrets, and
/// are what the session manager persists to reconstruct a session after a
/// restart.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserHandle {
    username: String,
}

impl UserHandle {
    pub fn new<T: Into<String>>(username: T) -> Self {
        Self {
            username: username.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// An opaque refresh token.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken(String);

impl RefreshToken {
    pub fn new<T: Into<String>>(token: T) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("RefreshToken([censored])")
    }
}

/// A session as reported by the identity provider.
///
/// A session reconstructed after a restart may hold only its refresh
/// materials, with no access token.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    access_token: Option<Token>,
    refresh_token: Option<RefreshToken>,
}

impl Session {
    pub fn new(access_token: Option<Token>, refresh_token: Option<RefreshToken>) -> Self {
        Self {
            access_token,
            refresh_token,
        }
    }

    pub fn access_token(&self) -> Option<&Token> {
        self.access_token.as_ref()
    }

    pub fn refresh_token(&self) -> Option<&RefreshToken> {
        self.refresh_token.as_ref()
    }

    /// Returns `true` if the session holds an access token that has not
    /// expired.
    pub fn is_valid(&self) -> bool {
        self.access_token.as_ref().is_some_and(|t| !t.is_expired())
    }

    /// Keeps the current refresh token if `next` did not rotate it.
    pub(crate) fn merge_refresh(mut self, previous: Option<&RefreshToken>) -> Self {
        if self.refresh_token.is_none() {
            self.refresh_token = previous.cloned();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orderdesk_test_utils::tokens::jwt_expiring_in;

    #[test]
    fn validity() {
        let valid = Session::new(Some(Token::new(jwt_expiring_in(3600))), None);
        assert!(valid.is_valid());

        let expired = Session::new(
            Some(Token::new(jwt_expiring_in(-10))),
            Some(RefreshToken::new("r")),
        );
        assert!(!expired.is_valid());

        let empty = Session::new(None, Some(RefreshToken::new("r")));
        assert!(!empty.is_valid());
    }

    #[test]
    fn merge_refresh() {
        let previous = RefreshToken::new("previous");
        let got = Session::new(None, None).merge_refresh(Some(&previous));
        assert_eq!(got.refresh_token(), Some(&previous));

        let rotated = RefreshToken::new("rotated");
        let got = Session::new(None, Some(rotated.clone())).merge_refresh(Some(&previous));
        assert_eq!(got.refresh_token(), Some(&rotated));
    }

    #[test]
    fn debug() {
        let got = format!("{:?}", RefreshToken::new("secret-refresh"));
        assert!(!got.contains("secret-refresh"), "{got}");
    }
}
