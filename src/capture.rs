// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Capture pipeline: classify an image, number it, and commit it to storage
//!
//! One attempt walks `Idle -> Submitting -> Classified -> NumberResolving ->
//! Uploading -> Committed`, or ends in `Failed`. Progress is published on a
//! `watch` channel so a caller can render each step as it completes. A failed
//! attempt is not resumable; retrying starts from `Idle`.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::classifier::{Classifier, ClassifierReport};
use crate::codec::{self, DiseaseReading};
use crate::config::CaptureConfig;
use crate::journal::{capture_entry, Journal};
use crate::scan::{parser, ScanLibrary, ScanRecord};
use crate::storage::{object_path, ScanStorage};
use crate::sync::RecordStore;
use crate::{OculareError, Result};

/// Filename sent to the classifier with every upload
const SUBMISSION_NAME: &str = "image.jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CaptureStage {
    #[default]
    Idle,
    Submitting,
    Classified,
    NumberResolving,
    Uploading,
    Committed,
    Failed,
}

impl CaptureStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Committed | Self::Failed)
    }
}

/// Observable state of one capture attempt. Flags never revert once set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CaptureProgress {
    pub stage: CaptureStage,
    /// Image reached the classifier
    pub submitted: bool,
    /// Classifier result encoded
    pub analyzed: bool,
    /// Image committed to storage
    pub stored: bool,
    /// User-facing message when the attempt failed
    pub error: Option<String>,
}

/// Who the capture is for
#[derive(Debug, Clone)]
pub struct CaptureContext {
    pub user_id: String,
}

impl CaptureContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into() }
    }
}

/// What a committed capture produced
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub scan_number: u32,
    pub filename: String,
    pub path: String,
    pub payload: String,
    pub readings: Vec<DiseaseReading>,
    pub report: ClassifierReport,
    /// Scan list after the commit, when it could be reloaded
    pub records: Option<Vec<ScanRecord>>,
    pub synced: bool,
}

struct Tracker<'a> {
    tx: &'a watch::Sender<CaptureProgress>,
}

impl Tracker<'_> {
    fn advance(&self, stage: CaptureStage) {
        self.tx.send_modify(|p| {
            if !p.stage.is_terminal() {
                p.stage = stage;
            }
        });
        debug!("Capture stage: {:?}", stage);
    }

    fn update(&self, f: impl FnOnce(&mut CaptureProgress)) {
        self.tx.send_modify(f);
    }

    fn fail(&self, err: OculareError) -> OculareError {
        error!("Capture failed: {}", err);
        let message = err.user_message();
        self.tx.send_modify(|p| {
            p.stage = CaptureStage::Failed;
            p.error = Some(message);
        });
        err
    }
}

/// Sequential capture workflow over a classifier and a storage backend
pub struct CapturePipeline {
    classifier: Arc<dyn Classifier>,
    storage: Arc<dyn ScanStorage>,
    library: ScanLibrary,
    journal: Option<Arc<Journal>>,
    max_readings: usize,
    default_extension: String,
}

impl CapturePipeline {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        storage: Arc<dyn ScanStorage>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        let defaults = CaptureConfig::default();
        Self {
            library: ScanLibrary::new(storage.clone(), records),
            classifier,
            storage,
            journal: None,
            max_readings: defaults.max_readings,
            default_extension: defaults.default_extension,
        }
    }

    pub fn with_settings(mut self, config: &CaptureConfig) -> Self {
        self.max_readings = config.max_readings;
        self.default_extension = config.default_extension.clone();
        self
    }

    pub fn with_journal(mut self, journal: Arc<Journal>) -> Self {
        self.library = self.library.with_journal(journal.clone());
        self.journal = Some(journal);
        self
    }

    /// Run one capture attempt without observing progress
    pub async fn capture(
        &self,
        ctx: &CaptureContext,
        uri: &str,
        image: &[u8],
    ) -> Result<CaptureOutcome> {
        let (tx, _rx) = watch::channel(CaptureProgress::default());
        self.capture_with_progress(ctx, uri, image, &tx).await
    }

    /// Run one capture attempt, publishing each stage on `progress`
    pub async fn capture_with_progress(
        &self,
        ctx: &CaptureContext,
        uri: &str,
        image: &[u8],
        progress: &watch::Sender<CaptureProgress>,
    ) -> Result<CaptureOutcome> {
        progress.send_replace(CaptureProgress::default());
        let tracker = Tracker { tx: progress };
        let user_id = ctx.user_id.as_str();

        tracker.advance(CaptureStage::Submitting);
        let report = match self.classifier.classify(image, SUBMISSION_NAME).await {
            Ok(report) => report,
            Err(e) => return Err(tracker.fail(as_unavailable(e))),
        };
        tracker.update(|p| p.submitted = true);

        let readings = codec::rank_probabilities(&report.probabilities());
        let payload = codec::encode(&readings, self.max_readings);
        tracker.update(|p| p.analyzed = true);
        tracker.advance(CaptureStage::Classified);
        info!("Classified capture for user {}: {}", user_id, payload);

        tracker.advance(CaptureStage::NumberResolving);
        let existing = match self.storage.list(user_id).await {
            Ok(objects) => objects,
            Err(e) => return Err(tracker.fail(e)),
        };
        let scan_number = parser::next_scan_number(existing.iter().map(|o| o.name.as_str()));

        tracker.advance(CaptureStage::Uploading);
        let extension = extension_of(uri).unwrap_or(self.default_extension.as_str());
        let filename = format!("scan_{}_{}.{}", scan_number, payload, extension);
        let path = object_path(user_id, &filename);
        if let Err(e) = self.storage.upload(&path, image).await {
            return Err(tracker.fail(e));
        }
        tracker.update(|p| p.stored = true);
        tracker.advance(CaptureStage::Committed);
        info!("Committed scan #{} as {}", scan_number, path);

        if let Some(ref journal) = self.journal {
            let entry = capture_entry(
                user_id,
                scan_number,
                &filename,
                &payload,
                image,
                report.model_version.clone(),
            );
            if let Err(e) = journal.append(&entry) {
                warn!("Failed to write journal entry: {}", e);
            }
        }

        let (records, synced) = match self.library.list_scans(user_id).await {
            Ok(records) => {
                let synced = self.library.sync_best_effort(user_id, &records).await;
                (Some(records), synced)
            }
            Err(e) => {
                warn!("Stored scan but could not reload scans for sync: {}", e);
                (None, false)
            }
        };

        Ok(CaptureOutcome {
            scan_number,
            filename,
            path,
            payload,
            readings,
            report,
            records,
            synced,
        })
    }
}

fn as_unavailable(err: OculareError) -> OculareError {
    match err {
        OculareError::ClassifierUnavailable(_) => err,
        other => OculareError::ClassifierUnavailable(other.to_string()),
    }
}

/// Extension after the last `.` of the URI's final segment
fn extension_of(uri: &str) -> Option<&str> {
    let name = uri.rsplit(|c: char| c == '/' || c == '\\').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    let valid = !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then_some(ext)
}
