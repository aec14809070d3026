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

//! A process-wide guard against overlapping login redirects.
//!
//! When several in-flight requests discover that the session is gone, only
//! the first one may prompt the user and reset navigation. The
//! [NavigationLatch] records that a redirect is underway; it is engaged
//! synchronously before the prompt is shown and released a short grace
//! period after the prompt is dismissed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

static GLOBAL: LazyLock<Arc<NavigationLatch>> = LazyLock::new(|| Arc::new(NavigationLatch::new()));

/// See the [module documentation](self).
#[derive(Debug, Default)]
pub struct NavigationLatch {
    engaged: AtomicBool,
}

impl NavigationLatch {
    /// Creates a released latch.
    ///
    /// Most applications should use [NavigationLatch::global], a separate
    /// latch is useful in tests or when running isolated navigation stacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// The latch shared by every executor in the process.
    pub fn global() -> Arc<Self> {
        GLOBAL.clone()
    }

    /// Returns true while a login redirect is underway.
    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::Acquire)
    }

    /// Engages the latch, returning false if it was already engaged.
    pub(crate) fn try_engage(&self) -> bool {
        self.engaged
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Engages the latch and returns the guard that releases it.
    ///
    /// Returns `None` if the latch was already engaged.
    pub(crate) fn engage(self: &Arc<Self>) -> Option<EngagedLatch> {
        self.try_engage().then(|| EngagedLatch {
            latch: self.clone(),
        })
    }

    fn release(&self) {
        self.engaged.store(false, Ordering::Release);
    }
}

/// Keeps a [NavigationLatch] engaged until it is dropped.
///
/// Dropping the guard early, for example because the redirect task panicked
/// or was cancelled, releases the latch without a grace period.
#[derive(Debug)]
pub(crate) struct EngagedLatch {
    latch: Arc<NavigationLatch>,
}

impl EngagedLatch {
    /// Waits for `grace` and then releases the latch.
    pub(crate) async fn release_after(self, grace: Duration) {
        tokio::time::sleep(grace).await;
        drop(self);
        tracing::debug!("navigation latch released");
    }
}

impl Drop for EngagedLatch {
    fn drop(&mut self) {
        self.latch.release();
    }
}
