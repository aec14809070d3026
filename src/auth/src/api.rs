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

//! CRUD helpers for the order desk collections.

use crate::fetch::Fetch;
use crate::request::RequestOptions;
use http::Method;
use serde_json::Value;

/// The characters percent-encoded in resource ids.
const ENCODED_CHARS: percent_encoding::AsciiSet = percent_encoding::CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'+')
    .add(b'/')
    .add(b'?');

/// A collection exposed by the order desk API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    Orders,
    Clients,
    Categories,
    FormFields,
}

impl Resource {
    /// The path segment of the collection.
    pub fn collection(&self) -> &'static str {
        match self {
            Resource::Orders => "orders",
            Resource::Clients => "clients",
            Resource::Categories => "categories",
            Resource::FormFields => "form-fields",
        }
    }
}

/// Lists, reads and modifies one [Resource] collection.
///
/// Requests go through a [Fetch], so results and errors are also published
/// on its state. Every method returns `None` when the request fails.
#[derive(Clone, Debug)]
pub struct ResourceClient {
    fetch: Fetch,
    resource: Resource,
}

impl ResourceClient {
    pub fn new(fetch: Fetch, resource: Resource) -> Self {
        Self { fetch, resource }
    }

    pub fn fetch(&self) -> &Fetch {
        &self.fetch
    }

    pub async fn list(&self) -> Option<Value> {
        self.send(Method::GET, self.collection_path(), None).await
    }

    pub async fn get(&self, id: &str) -> Option<Value> {
        self.send(Method::GET, self.item_path(id), None).await
    }

    pub async fn create(&self, body: Value) -> Option<Value> {
        self.send(Method::POST, self.collection_path(), Some(body))
            .await
    }

    pub async fn update(&self, id: &str, body: Value) -> Option<Value> {
        self.send(Method::PUT, self.item_path(id), Some(body)).await
    }

    pub async fn delete(&self, id: &str) -> Option<Value> {
        self.send(Method::DELETE, self.item_path(id), None).await
    }

    fn collection_path(&self) -> String {
        self.resource.collection().to_string()
    }

    fn item_path(&self, id: &str) -> String {
        format!(
            "{}/{}",
            self.resource.collection(),
            percent_encoding::utf8_percent_encode(id, &ENCODED_CHARS)
        )
    }

    async fn send(&self, method: Method, path: String, body: Option<Value>) -> Option<Value> {
        let mut options = RequestOptions::new(path).with_method(method);
        if let Some(body) = body {
            options = options.with_body(body);
        }
        self.fetch.fetch_data(options).await
    }
}
