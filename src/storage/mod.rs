// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Object storage for scan images
//!
//! Objects live in a single bucket keyed `<userId>/<filename>`.

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

pub use local::LocalStorage;

/// One entry returned by a user listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Trait for scan image storage backends
#[async_trait]
pub trait ScanStorage: Send + Sync {
    /// Objects stored under a user's namespace
    async fn list(&self, user_id: &str) -> Result<Vec<StoredObject>>;

    /// Write a new object. Fails with `StorageConflict` if one already exists at `path`.
    async fn upload(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Remove a batch of objects by full path
    async fn remove(&self, paths: &[String]) -> Result<()>;

    /// Locator a client can use to fetch the object's bytes
    async fn image_ref(&self, path: &str) -> Result<String>;
}

/// Full storage path for a user's file
pub fn object_path(user_id: &str, filename: &str) -> String {
    format!("{}/{}", user_id, filename)
}
