// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Configuration management for Oculare

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Remote classifier settings
    pub classifier: ClassifierConfig,

    /// Object storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// User record store settings
    #[serde(default)]
    pub records: RecordsConfig,

    /// Capture pipeline settings
    #[serde(default)]
    pub capture: CaptureConfig,

    /// Activity journal settings
    #[serde(default)]
    pub journal: JournalConfig,

    /// Eye specialist directory
    #[serde(default)]
    pub specialists: SpecialistsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ClassifierConfig {
    pub url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RecordsConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Number of readings embedded in a filename
    #[serde(default = "default_max_readings")]
    pub max_readings: usize,
    /// Extension used when the capture URI has none
    #[serde(default = "default_extension")]
    pub default_extension: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JournalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_journal_path")]
    pub path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SpecialistsConfig {
    /// JSONL file, or a directory of them, with one physician per line
    #[serde(default = "default_specialists_path")]
    pub path: String,
}

// Default value functions
fn default_timeout() -> u64 { 120 }
fn default_storage_root() -> String { "storage".to_string() }
fn default_bucket() -> String { "retinal-scans".to_string() }
fn default_db_path() -> String { "oculare.db".to_string() }
fn default_specialists_path() -> String { "physicians.txt".to_string() }
fn default_max_readings() -> usize { crate::codec::DEFAULT_MAX_READINGS }
fn default_extension() -> String { "jpg".to_string() }
fn default_true() -> bool { true }
fn default_journal_path() -> String { "oculare_journal.jsonl".to_string() }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            classifier: ClassifierConfig {
                url: "http://localhost:5000/upload".to_string(),
                timeout_secs: default_timeout(),
            },
            storage: StorageConfig::default(),
            records: RecordsConfig::default(),
            capture: CaptureConfig::default(),
            journal: JournalConfig::default(),
            specialists: SpecialistsConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            bucket: default_bucket(),
        }
    }
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_readings: default_max_readings(),
            default_extension: default_extension(),
        }
    }
}

impl Default for SpecialistsConfig {
    fn default() -> Self {
        Self {
            path: default_specialists_path(),
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_journal_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_json::from_str(&content)
                .map_err(|e| {
                    crate::OculareError::Config(format!("Failed to parse config: {}", e))
                })?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        if self.classifier.url.trim().is_empty() {
            return Err(crate::OculareError::Config("classifier.url must not be empty".to_string()));
        }
        if self.capture.max_readings == 0 {
            return Err(crate::OculareError::Config(
                "capture.max_readings must be at least 1".to_string(),
            ));
        }
        if self.storage.bucket.contains('/') {
            return Err(crate::OculareError::Config(
                "storage.bucket must be a single path segment".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.storage.bucket, "retinal-scans");
        assert_eq!(config.capture.max_readings, 2);
    }

    #[test]
    fn partial_file_fills_sections_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"classifier": {"url": "http://10.0.0.2:5000/upload"}}"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.classifier.url, "http://10.0.0.2:5000/upload");
        assert_eq!(config.classifier.timeout_secs, 120);
        assert_eq!(config.records.path, "oculare.db");
        assert!(config.journal.enabled);
        assert_eq!(config.specialists.path, "physicians.txt");
    }

    #[test]
    fn zero_readings_is_rejected() {
        let mut config = AppConfig::default();
        config.capture.max_readings = 0;
        assert!(config.validate().is_err());
    }
}
