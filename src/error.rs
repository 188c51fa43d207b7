// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for Oculare

use thiserror::Error;

/// Result type alias for Oculare operations
pub type Result<T> = std::result::Result<T, OculareError>;

/// Message shown to the user when a capture attempt aborts
pub const GENERIC_USER_MESSAGE: &str = "An error occurred during the process. Please try again.";

/// Oculare error types
#[derive(Error, Debug)]
pub enum OculareError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed scan filename: {0}")]
    MalformedFilename(String),

    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("Object already exists in storage: {0}")]
    StorageConflict(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Diagnosis sync failed: {0}")]
    SyncFailure(String),

    #[error("Scan listing failed: {0}")]
    ListingFailure(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Scan not found: #{0}")]
    ScanNotFound(u32),

    #[error("Specialist directory not found: {0}")]
    DirectoryNotFound(String),
}

impl OculareError {
    /// Text suitable for showing to the person who triggered the action.
    ///
    /// Pipeline failures collapse to one generic message; internal detail stays in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::ClassifierUnavailable(_)
            | Self::StorageConflict(_)
            | Self::Storage(_)
            | Self::Api(_)
            | Self::FileSystem(_) => GENERIC_USER_MESSAGE.to_string(),
            Self::ListingFailure(_) => "Your past scans could not be loaded.".to_string(),
            other => other.to_string(),
        }
    }
}
