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

use tracing_subscriber::EnvFilter;

/// Overrides the log filter of [enable_tracing], using the `RUST_LOG` syntax.
pub const FILTER_VAR: &str = "ORDERDESK_TEST_LOG";

/// Installs a `fmt` subscriber for the current thread.
///
/// Logs at `WARN` and above, or `INFO` and above with the
/// `log-integration-tests` feature, unless [FILTER_VAR] is set. The
/// subscriber is removed when the returned guard is dropped.
pub fn enable_tracing() -> ::tracing::subscriber::DefaultGuard {
    let default_level = if cfg!(feature = "log-integration-tests") {
        "info"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_env(FILTER_VAR).unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_level(true)
        .with_thread_ids(true)
        .with_test_writer()
        .finish();

    tracing::subscriber::set_default(subscriber)
}
