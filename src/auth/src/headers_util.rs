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

use crate::errors::ExecuteError;
use crate::token::Token;

use http::HeaderMap;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderValue};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Builds the headers for an authenticated request.
///
/// The caller's headers are applied last and replace any header with the
/// same name, including `authorization`.
pub(crate) fn build_request_headers(
    token: &Token,
    extra: &HeaderMap,
) -> Result<HeaderMap, ExecuteError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
        .map_err(|e| ExecuteError::NetworkOrServer(format!("invalid access token: {e}")))?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    for name in extra.keys() {
        headers.remove(name);
        for v in extra.get_all(name) {
            headers.append(name.clone(), v.clone());
        }
    }
    Ok(headers)
}
