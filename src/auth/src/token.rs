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

//! Types and functions to work with bearer tokens.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use time::OffsetDateTime;

/// A bearer token as issued by the identity provider.
///
/// The token is a JWT. Its expiry is read from the `exp` claim of the
/// payload, without verifying the signature. Signature verification is the
/// backend's job, the client only needs to know when to refresh.
#[derive(Clone, PartialEq)]
pub struct Token {
    token: String,

    /// Seconds since the epoch, from the `exp` claim.
    ///
    /// If `None` the payload could not be decoded or has no `exp` claim, and
    /// the token is considered expired.
    exp: Option<i64>,
}

impl Token {
    /// Wraps a raw token string, decoding its expiry.
    pub fn new<T: Into<String>>(token: T) -> Self {
        let token = token.into();
        let exp = decode_expiry(&token);
        Self { token, exp }
    }

    /// The raw token, as sent in the `Authorization:` header.
    pub fn as_str(&self) -> &str {
        &self.token
    }

    /// The instant at which the token expires, if known.
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.exp
            .and_then(|e| OffsetDateTime::from_unix_timestamp(e).ok())
    }

    /// Returns `true` if the token is expired, or its expiry is unknown.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(OffsetDateTime::now_utc())
    }

    pub(crate) fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        match self.exp {
            Some(exp) => exp < now.unix_timestamp(),
            None => true,
        }
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("token", &"[censored]")
            .field("exp", &self.exp)
            .finish()
    }
}

#[derive(serde::Deserialize)]
struct Claims {
    exp: Option<serde_json::Number>,
}

fn decode_expiry(token: &str) -> Option<i64> {
    let mut parts = token.split('.');
    let (_header, payload) = (parts.next()?, parts.next()?);
    // Some issuers pad the segments, RFC 7515 says they should not.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims = serde_json::from_slice::<Claims>(&bytes).ok()?;
    let exp = claims.exp?;
    exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64))
}
