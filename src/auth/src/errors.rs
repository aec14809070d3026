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

//! Errors reported by the session manager and the request executor.

use http::StatusCode;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter, Result};
use std::sync::Arc;

/// Represents an error reported by an
/// [IdentityProvider](crate::provider::IdentityProvider).
///
/// The error is cheap to clone: concurrent callers waiting on the same
/// session refresh all receive a copy of the same error.
#[derive(Clone, Debug)]
pub struct ProviderError {
    /// If `true`, the operation that resulted in this error might succeed
    /// upon retry.
    is_transient: bool,

    /// The underlying source of the error.
    source: ProviderErrorImpl,
}

#[derive(Clone, Debug)]
enum ProviderErrorImpl {
    SimpleMessage(String),
    Source(Arc<dyn Error + Send + Sync>),
}

impl ProviderError {
    /// Creates a new `ProviderError`.
    ///
    /// # Arguments
    /// * `is_transient` - whether the operation may succeed if retried.
    /// * `source` - the underlying error.
    pub fn new<T: Error + Send + Sync + 'static>(is_transient: bool, source: T) -> Self {
        ProviderError {
            is_transient,
            source: ProviderErrorImpl::Source(Arc::new(source)),
        }
    }

    /// Creates a new `ProviderError` from a message.
    pub fn from_msg<T: Into<String>>(is_transient: bool, message: T) -> Self {
        ProviderError {
            is_transient,
            source: ProviderErrorImpl::SimpleMessage(message.into()),
        }
    }

    /// Returns `true` if the error is transient.
    pub fn is_transient(&self) -> bool {
        self.is_transient
    }
}

pub(crate) fn transient<T: Error + Send + Sync + 'static>(source: T) -> ProviderError {
    ProviderError::new(true, source)
}

pub(crate) fn non_transient<T: Error + Send + Sync + 'static>(source: T) -> ProviderError {
    ProviderError::new(false, source)
}

pub(crate) fn non_transient_from_str<T: Into<String>>(message: T) -> ProviderError {
    ProviderError::from_msg(false, message)
}

impl Error for ProviderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.source {
            ProviderErrorImpl::SimpleMessage(_) => None,
            ProviderErrorImpl::Source(source) => Some(source.as_ref()),
        }
    }
}

const TRANSIENT_MSG: &str = "but future attempts may succeed";
const PERMANENT_MSG: &str = "and future attempts will not succeed";

impl Display for ProviderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let msg = if self.is_transient {
            TRANSIENT_MSG
        } else {
            PERMANENT_MSG
        };
        match &self.source {
            ProviderErrorImpl::SimpleMessage(m) => {
                write!(f, "identity provider request failed, {msg}: {m}")
            }
            ProviderErrorImpl::Source(s) => {
                write!(f, "identity provider request failed, {msg}: {s}")
            }
        }
    }
}

/// Returns `true` if the HTTP status code indicates a transient failure.
pub(crate) fn is_transient(c: StatusCode) -> bool {
    matches!(
        c,
        StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
    )
}

/// Errors reading or writing the persisted session.
#[derive(Clone, Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot read the session store: {0}")]
    Read(#[source] Arc<std::io::Error>),
    #[error("cannot write the session store: {0}")]
    Write(#[source] Arc<std::io::Error>),
    #[error("the session store contents are malformed: {0}")]
    Malformed(#[source] Arc<serde_json::Error>),
}

/// Errors from [SessionManager](crate::session_manager::SessionManager)
/// operations.
#[derive(Clone, Debug, thiserror::Error)]
pub enum SessionError {
    /// There is no user handle to refresh a session for.
    #[error("no user is signed in")]
    NoUser,
    /// The provider session is expired and carries no refresh token.
    #[error("the session has no refresh token")]
    NoRefreshToken,
    /// The identity provider rejected or failed the refresh.
    #[error("cannot refresh the session: {0}")]
    RefreshFailed(#[source] ProviderError),
    /// The identity provider rejected the credentials.
    #[error("cannot sign in: {0}")]
    AuthenticationFailed(#[source] ProviderError),
    #[error("cannot persist the session: {0}")]
    Storage(#[from] StoreError),
}

/// Why a request could not obtain a usable token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpiryReason {
    /// A token was stored but it expired and could not be refreshed.
    Expired,
    /// No token was stored, or none was available after a refresh.
    Missing,
}

impl Display for ExpiryReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            ExpiryReason::Expired => f.write_str("Session expired, please log in again"),
            ExpiryReason::Missing => f.write_str("No token available, please log in"),
        }
    }
}

/// The failures surfaced by [RequestExecutor](crate::executor::RequestExecutor).
///
/// The `Display` output is the message shown to the user.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ExecuteError {
    /// The token was missing or expired and could not be refreshed.
    #[error("{reason}")]
    SessionExpired { reason: ExpiryReason },
    /// The server rejected a token that looked valid locally.
    #[error("Your session is no longer authorized, please log in again")]
    Unauthorized,
    /// Any other transport, HTTP or business-level failure.
    #[error("An error occurred while fetching data: {0}")]
    NetworkOrServer(String),
    /// Another request is already redirecting the user to the login screen.
    #[error("a login redirect is already in progress")]
    RedirectInProgress,
}

impl ExecuteError {
    /// Returns `true` if the error ends in the login redirect.
    pub fn is_session_failure(&self) -> bool {
        matches!(
            self,
            ExecuteError::SessionExpired { .. } | ExecuteError::Unauthorized
        )
    }
}

/// Invalid configuration values.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is not a valid URL: {source}")]
    InvalidUrl {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("{name} must be a number of milliseconds, got {value:?}")]
    InvalidDuration { name: &'static str, value: String },
}
