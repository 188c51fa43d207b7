// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Diagnosis summary synchronization
//!
//! The record store keeps one denormalized copy of every scan record for a user
//! in a single field. It is rewritten as a whole after each add or delete, and
//! cleared to null once no scans remain. Storage stays the source of truth.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::scan::ScanRecord;
use crate::{OculareError, Result};

/// Display format of the `date` field
pub const SUMMARY_DATE_FORMAT: &str = "%-m/%-d/%Y";

/// Trait for the store that owns a user's summary field
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Overwrite the summary field; `None` clears it
    async fn write_diagnoses(&self, user_id: &str, summary: Option<&str>) -> Result<()>;

    /// Current raw value of the summary field
    async fn read_diagnoses(&self, user_id: &str) -> Result<Option<String>>;
}

/// One scan record as persisted in the summary field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisEntry {
    pub scan_number: u32,
    pub date: String,
    pub diagnosis: String,
    pub disease: String,
    pub disease1: String,
    pub percent1: String,
    pub disease2: String,
    pub percent2: String,
}

impl From<&ScanRecord> for DiagnosisEntry {
    fn from(record: &ScanRecord) -> Self {
        let (disease1, percent1) = name_and_percent(record.primary.as_ref());
        let (disease2, percent2) = name_and_percent(record.secondary.as_ref());
        Self {
            scan_number: record.scan_number,
            date: record.date.format(SUMMARY_DATE_FORMAT).to_string(),
            diagnosis: record.diagnosis_text.clone(),
            disease: record.disease_display.clone(),
            disease1,
            percent1,
            disease2,
            percent2,
        }
    }
}

fn name_and_percent(reading: Option<&crate::codec::DiseaseReading>) -> (String, String) {
    reading
        .map(|r| (r.name.clone(), r.percent.clone()))
        .unwrap_or_default()
}

/// Project records into summary entries; `None` when there are no records
pub fn summarize(records: &[ScanRecord]) -> Option<Vec<DiagnosisEntry>> {
    if records.is_empty() {
        return None;
    }
    Some(records.iter().map(DiagnosisEntry::from).collect())
}

/// Serialized summary field value
pub fn serialize_summary(records: &[ScanRecord]) -> Result<Option<String>> {
    summarize(records)
        .map(|entries| serde_json::to_string(&entries))
        .transpose()
        .map_err(Into::into)
}

/// Rewrite the user's summary from `records` in a single update.
///
/// Errors come back as `SyncFailure`; callers log them and keep the storage change.
pub async fn sync(store: &dyn RecordStore, user_id: &str, records: &[ScanRecord]) -> Result<()> {
    let summary = serialize_summary(records)
        .map_err(|e| OculareError::SyncFailure(format!("cannot serialize summary: {}", e)))?;

    store
        .write_diagnoses(user_id, summary.as_deref())
        .await
        .map_err(|e| OculareError::SyncFailure(e.to_string()))?;

    match summary {
        Some(_) => info!("Synchronized {} diagnoses for user {}", records.len(), user_id),
        None => info!("Cleared diagnoses for user {}", user_id),
    }
    Ok(())
}

/// Read and decode the user's summary field
pub async fn load_summary(
    store: &dyn RecordStore,
    user_id: &str,
) -> Result<Option<Vec<DiagnosisEntry>>> {
    let raw = store.read_diagnoses(user_id).await?;
    debug!("Loaded diagnoses field for user {} (present: {})", user_id, raw.is_some());
    raw.map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DiseaseReading;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        field: Mutex<Option<String>>,
        writes: Mutex<usize>,
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        async fn write_diagnoses(&self, _user_id: &str, summary: Option<&str>) -> Result<()> {
            *self.field.lock().unwrap() = summary.map(String::from);
            *self.writes.lock().unwrap() += 1;
            Ok(())
        }

        async fn read_diagnoses(&self, _user_id: &str) -> Result<Option<String>> {
            Ok(self.field.lock().unwrap().clone())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl RecordStore for FailingStore {
        async fn write_diagnoses(&self, user_id: &str, _summary: Option<&str>) -> Result<()> {
            Err(OculareError::UserNotFound(user_id.to_string()))
        }

        async fn read_diagnoses(&self, _user_id: &str) -> Result<Option<String>> {
            Ok(None)
        }
    }

    fn record() -> ScanRecord {
        ScanRecord {
            scan_number: 3,
            date: Utc.with_ymd_and_hms(2025, 2, 22, 14, 30, 0).unwrap(),
            files: vec!["scan_3_C:41.4.jpg".to_string()],
            diseases: vec!["Cataract".to_string()],
            disease_display: "Cataract".to_string(),
            diagnosis_text: "The system detected potential signs of Cataract (41.4%). \
                             Recommend comprehensive clinical examination to confirm diagnosis."
                .to_string(),
            primary: Some(DiseaseReading {
                abbreviation: "C".to_string(),
                name: "Cataract".to_string(),
                percent: "41.4".to_string(),
            }),
            secondary: None,
            image_ref: String::new(),
        }
    }

    #[test]
    fn summary_uses_persisted_field_names() {
        let json = serialize_summary(&[record()]).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let entry = &value[0];
        assert_eq!(entry["scanNumber"], 3);
        assert_eq!(entry["date"], "2/22/2025");
        assert_eq!(entry["disease"], "Cataract");
        assert_eq!(entry["disease1"], "Cataract");
        assert_eq!(entry["percent1"], "41.4");
        assert_eq!(entry["disease2"], "");
        assert_eq!(entry["percent2"], "");
    }

    #[test]
    fn no_records_means_null_not_empty_array() {
        assert!(summarize(&[]).is_none());
        assert!(serialize_summary(&[]).unwrap().is_none());
    }

    #[tokio::test]
    async fn sync_overwrites_then_clears() {
        let store = MemoryStore::default();

        sync(&store, "u1", &[record()]).await.unwrap();
        let loaded = load_summary(&store, "u1").await.unwrap().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].scan_number, 3);

        sync(&store, "u1", &[]).await.unwrap();
        assert!(store.field.lock().unwrap().is_none());
        assert!(load_summary(&store, "u1").await.unwrap().is_none());
        assert_eq!(*store.writes.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn store_errors_become_sync_failures() {
        let err = sync(&FailingStore, "u1", &[record()]).await.unwrap_err();
        assert!(matches!(err, OculareError::SyncFailure(_)));
    }
}
