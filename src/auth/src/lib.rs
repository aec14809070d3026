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

//! Session management and authenticated requests for the order desk app.
//!
//! This crate keeps a user signed in and attaches their access token to
//! every API request. The main types are:
//!
//! * [SessionManager][session_manager::SessionManager] signs users in,
//!   restores and refreshes their session and signs them out. It talks to an
//!   [IdentityProvider][provider::IdentityProvider] and persists the access
//!   token in a [SessionStore][store::SessionStore].
//! * [RequestExecutor][executor::RequestExecutor] sends JSON requests with a
//!   bearer token. When the session cannot be recovered it shows a prompt
//!   and resets navigation to the login screen, exactly once, no matter how
//!   many requests fail together.
//! * [Fetch][fetch::Fetch] tracks the `data`, `error` and `loading` state of
//!   the requests issued by one view, and ignores completions after the view
//!   is unmounted.
//!
//! # Example
//! ```no_run
//! # use orderdesk_auth::config::Config;
//! # use orderdesk_auth::executor::RequestExecutor;
//! # use orderdesk_auth::fetch::{Fetch, ViewScope};
//! # use orderdesk_auth::navigator::Navigator;
//! # use orderdesk_auth::request::RequestOptions;
//! # use orderdesk_auth::session_manager::SessionManager;
//! # use std::sync::Arc;
//! # async fn sample(navigator: Arc<dyn Navigator>) -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let store = config.session_store();
//! let provider = config
//!     .oauth_provider(store.clone())
//!     .ok_or_else(|| anyhow::anyhow!("ORDERDESK_TOKEN_URL is not set"))?;
//! let sessions = Arc::new(SessionManager::new(Arc::new(provider), store));
//! if !sessions.initialize().await {
//!     sessions.login("alice", "secret").await?;
//! }
//!
//! let executor = RequestExecutor::builder(sessions, navigator)
//!     .with_config(config)
//!     .build();
//! let fetch = Fetch::new(executor, ViewScope::new());
//! let orders = fetch.fetch_data(RequestOptions::new("orders")).await;
//! println!("{orders:?}");
//! # Ok(()) }
//! ```

pub mod api;
pub mod config;
pub mod errors;
pub mod executor;
pub mod fetch;
pub mod latch;
pub mod navigator;
pub mod provider;
pub mod request;
pub mod session;
pub mod session_manager;
pub mod store;
pub mod token;

pub(crate) mod headers_util;

pub use errors::ExecuteError;
pub use executor::RequestExecutor;
pub use fetch::{Fetch, FetchState, ViewScope};
pub use session_manager::SessionManager;
