// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Listing and deletion of a user's scans

use futures_util::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{aggregate, parser, ScanFile, ScanRecord};
use crate::journal::{deletion_entry, Journal};
use crate::storage::{object_path, ScanStorage};
use crate::sync::{self, RecordStore};
use crate::{OculareError, Result};

/// Result of deleting one scan
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub removed: ScanRecord,
    pub remaining: Vec<ScanRecord>,
    /// Whether the summary field was updated
    pub synced: bool,
}

/// Read and delete access to a user's stored scans
#[derive(Clone)]
pub struct ScanLibrary {
    storage: Arc<dyn ScanStorage>,
    records: Arc<dyn RecordStore>,
    journal: Option<Arc<Journal>>,
}

impl ScanLibrary {
    pub fn new(storage: Arc<dyn ScanStorage>, records: Arc<dyn RecordStore>) -> Self {
        Self {
            storage,
            records,
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: Arc<Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Parse every stored file of a user and resolve its image reference.
    ///
    /// Unparseable names are skipped. Any storage failure aborts the whole listing.
    pub async fn list_files(&self, user_id: &str) -> Result<Vec<ScanFile>> {
        let objects = self
            .storage
            .list(user_id)
            .await
            .map_err(|e| OculareError::ListingFailure(e.to_string()))?;

        let parsed = parser::parse_all(&objects);
        if parsed.len() < objects.len() {
            warn!(
                "Skipped {} of {} stored files for user {}",
                objects.len() - parsed.len(),
                objects.len(),
                user_id
            );
        }

        let storage = &self.storage;
        let resolved = try_join_all(parsed.into_iter().map(|file| async move {
            let image_ref = storage.image_ref(&object_path(user_id, &file.filename)).await?;
            Ok::<_, OculareError>(file.with_image_ref(image_ref))
        }))
        .await
        .map_err(|e| OculareError::ListingFailure(e.to_string()))?;

        debug!("Loaded {} scan files for user {}", resolved.len(), user_id);
        Ok(resolved)
    }

    /// Consolidated scan records, newest scan first
    pub async fn list_scans(&self, user_id: &str) -> Result<Vec<ScanRecord>> {
        Ok(aggregate(self.list_files(user_id).await?))
    }

    /// List scans and mirror them into the summary field
    pub async fn refresh(&self, user_id: &str) -> Result<Vec<ScanRecord>> {
        let records = self.list_scans(user_id).await?;
        self.sync_best_effort(user_id, &records).await;
        Ok(records)
    }

    /// Delete every file of one scan, then resynchronize the summary
    pub async fn delete_scan(&self, user_id: &str, scan_number: u32) -> Result<DeleteOutcome> {
        let records = self.list_scans(user_id).await?;
        let (removed, remaining): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|r| r.scan_number == scan_number);

        let removed = removed
            .into_iter()
            .next()
            .ok_or(OculareError::ScanNotFound(scan_number))?;

        let paths: Vec<String> = removed
            .files
            .iter()
            .map(|f| object_path(user_id, f))
            .collect();
        self.storage.remove(&paths).await?;
        info!("Deleted scan #{} ({} files) for user {}", scan_number, paths.len(), user_id);

        if let Some(ref journal) = self.journal {
            let entry = deletion_entry(user_id, scan_number, removed.files.clone());
            if let Err(e) = journal.append(&entry) {
                warn!("Failed to write journal entry: {}", e);
            }
        }

        let synced = self.sync_best_effort(user_id, &remaining).await;
        Ok(DeleteOutcome {
            removed,
            remaining,
            synced,
        })
    }

    /// Rewrite the summary field, logging instead of failing
    pub async fn sync_best_effort(&self, user_id: &str, records: &[ScanRecord]) -> bool {
        match sync::sync(self.records.as_ref(), user_id, records).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to update diagnoses for user {}: {}", user_id, e);
                false
            }
        }
    }
}
