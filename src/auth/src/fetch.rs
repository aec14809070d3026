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

//! Per-view request state.
//!
//! A [Fetch] is created for each mounted view. It runs requests through a
//! shared [RequestExecutor] and publishes `data`, `error`, `loading` and
//! `initial_check_done` on a [watch] channel. Once the view's [ViewScope] is
//! unmounted, completions of in-flight requests are discarded.

use crate::errors::ExecuteError;
use crate::executor::RequestExecutor;
use crate::request::RequestOptions;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// The mounted lifetime of a view.
///
/// Clones share the same lifetime. Unmounting is permanent.
#[derive(Clone, Debug, Default)]
pub struct ViewScope {
    token: CancellationToken,
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unmount(&self) {
        self.token.cancel();
    }

    pub fn is_mounted(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Resolves when the view is unmounted.
    pub async fn unmounted(&self) {
        self.token.cancelled().await
    }
}

/// The observable state of a [Fetch].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FetchState {
    /// The payload of the last successful request.
    pub data: Option<Value>,
    /// The user-facing message of the last failed request.
    pub error: Option<String>,
    pub loading: bool,
    /// Set after the first request completes, successfully or not.
    pub initial_check_done: bool,
}

/// The outcome of [Fetch::auto_fetch].
#[derive(Clone, Debug, PartialEq)]
pub enum AutoFetch {
    /// This URL was already fetched for the current mount.
    Skipped,
    /// The request ran, with the same result as [Fetch::fetch_data].
    Completed(Option<Value>),
    /// A login redirect was underway and no request was sent. The URL is
    /// fetched by the next call.
    Deferred,
}

/// See the [module documentation](self).
#[derive(Clone, Debug)]
pub struct Fetch {
    inner: Arc<FetchInner>,
}

#[derive(Debug)]
struct FetchInner {
    executor: RequestExecutor,
    scope: ViewScope,
    state: watch::Sender<FetchState>,
    last_auto_url: Mutex<Option<String>>,
}

impl Fetch {
    pub fn new(executor: RequestExecutor, scope: ViewScope) -> Self {
        let (state, _) = watch::channel(FetchState::default());
        Self {
            inner: Arc::new(FetchInner {
                executor,
                scope,
                state,
                last_auto_url: Mutex::new(None),
            }),
        }
    }

    pub fn scope(&self) -> &ViewScope {
        &self.inner.scope
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> FetchState {
        self.inner.state.borrow().clone()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.inner.state.subscribe()
    }

    /// Runs a request and records its outcome.
    ///
    /// Returns the response payload, or `None` if the request failed or was
    /// skipped because a login redirect is underway. Failures are reported
    /// through [FetchState::error], never as a panic or an `Err`.
    pub async fn fetch_data(&self, options: RequestOptions) -> Option<Value> {
        self.run(options).await.flatten()
    }

    /// Fetches `options` unless the same URL was already auto-fetched by
    /// this handle.
    ///
    /// Views call this when they mount and whenever their target URL may
    /// have changed. A URL skipped because of a login redirect is not
    /// recorded, so the next call fetches it.
    pub async fn auto_fetch(&self, options: RequestOptions) -> AutoFetch {
        let url = options.url().to_string();
        let previous = {
            let mut last = self.last_auto_url();
            if last.as_deref() == Some(url.as_str()) {
                return AutoFetch::Skipped;
            }
            last.replace(url.clone())
        };
        match self.run(options).await {
            Some(data) => AutoFetch::Completed(data),
            None => {
                let mut last = self.last_auto_url();
                if last.as_deref() == Some(url.as_str()) {
                    *last = previous;
                }
                AutoFetch::Deferred
            }
        }
    }

    // Returns `None` if no request was sent because a login redirect is
    // underway.
    async fn run(&self, options: RequestOptions) -> Option<Option<Value>> {
        let inner = &self.inner;
        if inner.executor.redirect_in_progress() {
            tracing::debug!("login redirect in progress, not fetching {}", options.url());
            return None;
        }

        self.update(|s| {
            s.loading = true;
            s.error = None;
        });
        let outcome = inner.executor.execute(options).await;
        let (sent, data, error) = match outcome {
            Ok(value) => (true, Some(value), None),
            // Another request is redirecting, there is nothing to report.
            Err(ExecuteError::RedirectInProgress) => (false, None, None),
            Err(e) => (true, None, Some(e.to_string())),
        };
        self.update(|s| {
            if let Some(value) = &data {
                s.data = Some(value.clone());
            }
            s.error = error;
            s.loading = false;
            s.initial_check_done = true;
        });
        sent.then_some(data)
    }

    fn last_auto_url(&self) -> MutexGuard<'_, Option<String>> {
        self.inner
            .last_auto_url
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut FetchState),
    {
        if self.inner.scope.is_mounted() {
            self.inner.state.send_modify(f);
        }
    }
}
