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

use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use serde_json::Value;

/// A request for the [RequestExecutor][crate::executor::RequestExecutor].
///
/// Requests default to `POST` with no body.
///
/// # Example
/// ```
/// # use orderdesk_auth::request::RequestOptions;
/// use http::Method;
/// use serde_json::json;
/// let options = RequestOptions::new("orders")
///     .with_method(Method::PUT)
///     .with_body(json!({"status": "shipped"}));
/// assert_eq!(options.method(), &Method::PUT);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct RequestOptions {
    url: String,
    method: Method,
    body: Option<Value>,
    headers: HeaderMap,
}

impl RequestOptions {
    /// `url` may be absolute, or relative to the configured API URL.
    pub fn new<T: Into<String>>(url: T) -> Self {
        Self {
            url: url.into(),
            method: Method::POST,
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Sets the JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds a header. These override the defaults set by the executor.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}
