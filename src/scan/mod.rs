// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Scan files, consolidated scan records and the operations over them

pub mod aggregate;
pub mod library;
pub mod parser;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::DiseaseReading;

pub use aggregate::aggregate;
pub use library::ScanLibrary;

/// One stored image and the readings embedded in its filename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFile {
    pub scan_number: u32,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    /// At most two readings, highest first
    pub readings: Vec<DiseaseReading>,
    pub image_ref: String,
}

impl ScanFile {
    pub fn with_image_ref(mut self, image_ref: impl Into<String>) -> Self {
        self.image_ref = image_ref.into();
        self
    }
}

/// All files sharing one scan number, consolidated for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub scan_number: u32,
    /// Most recent creation time among the member files
    pub date: DateTime<Utc>,
    /// Member filenames, oldest first
    pub files: Vec<String>,
    /// Disease names in order of discovery
    pub diseases: Vec<String>,
    /// `diseases` joined with " and "
    pub disease_display: String,
    pub diagnosis_text: String,
    pub primary: Option<DiseaseReading>,
    pub secondary: Option<DiseaseReading>,
    pub image_ref: String,
}

impl ScanRecord {
    /// Confidence label of the primary reading, e.g. `41.4%`
    pub fn confidence(&self) -> String {
        self.primary
            .as_ref()
            .map(|r| format!("{}%", r.percent))
            .unwrap_or_else(|| "N/A".to_string())
    }
}
