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

//! Persisted key-value storage for the session.
//!
//! The store survives process restarts. The session manager keeps two keys in
//! it: the current bearer token ([AUTH_TOKEN_KEY]) and the username of the
//! signed-in user ([USERNAME_KEY]).

use crate::errors::StoreError;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// The key holding the current bearer token.
pub const AUTH_TOKEN_KEY: &str = "authToken";

/// The key holding the username of the signed-in user.
pub const USERNAME_KEY: &str = "username";

type Result<T> = std::result::Result<T, StoreError>;

/// Durable storage for session values.
#[async_trait::async_trait]
pub trait SessionStore: std::fmt::Debug + Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// A [SessionStore] that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// A [SessionStore] backed by a JSON file.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// store, so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, String>> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(StoreError::Read(Arc::new(e))),
        };
        if contents.is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_slice(&contents).map_err(|e| StoreError::Malformed(Arc::new(e)))
    }

    async fn save(&self, entries: &HashMap<String, String>) -> Result<()> {
        let write = |e| StoreError::Write(Arc::new(e));
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write)?;
        }
        let contents =
            serde_json::to_vec_pretty(entries).map_err(|e| StoreError::Malformed(Arc::new(e)))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, contents).await.map_err(write)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(write)
    }
}

#[async_trait::async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        entries.insert(key.to_string(), value.to_string());
        self.save(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.load().await?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.save(&entries).await
    }
}
