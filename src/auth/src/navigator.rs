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

//! The UI seam used to send the user back to the login screen.

/// Shows the session-expired prompt and resets the navigation stack.
///
/// Applications implement this trait over their UI toolkit. The request
/// executor calls [acknowledge][Navigator::acknowledge] and waits for it to
/// complete before calling [reset_to][Navigator::reset_to].
#[async_trait::async_trait]
pub trait Navigator: std::fmt::Debug + Send + Sync {
    /// Shows a blocking prompt and returns once the user dismisses it.
    async fn acknowledge(&self, title: &str, message: &str);

    /// Replaces the whole navigation stack with `route`.
    fn reset_to(&self, route: &str);
}
