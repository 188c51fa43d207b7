// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Activity journal of stored and deleted scans

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalAction {
    Captured,
    Deleted,
}

/// A single journal line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub action: JournalAction,
    pub scan_number: u32,
    pub files: Vec<String>,
    /// Encoded filename payload of a capture
    #[serde(default)]
    pub payload: Option<String>,
    /// blake3 of the stored image bytes
    #[serde(default)]
    pub content_hash: Option<String>,
    #[serde(default)]
    pub model_version: Option<String>,
}

/// Append-only JSONL journal, one entry per line
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Write one entry as a single line
    pub fn append(&self, entry: &JournalEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?
            .write_all(&line)?;
        debug!("Journaled {:?} of scan #{} for {}", entry.action, entry.scan_number, entry.user_id);
        Ok(())
    }

    /// Entries in the order they were written. A missing journal is empty;
    /// lines that no longer decode are skipped.
    pub fn read_all(&self) -> Result<Vec<JournalEntry>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(n, line)| match serde_json::from_str(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping journal line {}: {}", n + 1, e);
                    None
                }
            })
            .collect())
    }

    /// Up to `count` entries, newest first, optionally for one user
    pub fn get_recent(&self, count: usize, user_id: Option<&str>) -> Result<Vec<JournalEntry>> {
        Ok(self
            .read_all()?
            .into_iter()
            .rev()
            .filter(|e| user_id.map_or(true, |id| e.user_id == id))
            .take(count)
            .collect())
    }

    /// Delete the journal file
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Entry for a committed capture
pub fn capture_entry(
    user_id: &str,
    scan_number: u32,
    filename: &str,
    payload: &str,
    image: &[u8],
    model_version: Option<String>,
) -> JournalEntry {
    JournalEntry {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        user_id: user_id.to_string(),
        action: JournalAction::Captured,
        scan_number,
        files: vec![filename.to_string()],
        payload: Some(payload.to_string()),
        content_hash: Some(blake3::hash(image).to_hex().to_string()),
        model_version,
    }
}

/// Entry for a deleted scan
pub fn deletion_entry(user_id: &str, scan_number: u32, files: Vec<String>) -> JournalEntry {
    JournalEntry {
        id: uuid::Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        user_id: user_id.to_string(),
        action: JournalAction::Deleted,
        scan_number,
        files,
        payload: None,
        content_hash: None,
        model_version: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_read_back_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("journal.jsonl"));

        journal
            .append(&capture_entry("u1", 1, "scan_1_C:41.4.jpg", "C:41.4", b"img", None))
            .unwrap();
        journal
            .append(&capture_entry("u2", 1, "scan_1_G:22.0.jpg", "G:22.0", b"img", None))
            .unwrap();
        journal
            .append(&deletion_entry("u1", 1, vec!["scan_1_C:41.4.jpg".to_string()]))
            .unwrap();

        let recent = journal.get_recent(10, Some("u1")).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].action, JournalAction::Deleted);
        assert_eq!(recent[1].content_hash.as_deref(), Some(blake3::hash(b"img").to_hex().as_str()));

        assert_eq!(journal.get_recent(1, None).unwrap().len(), 1);
    }

    #[test]
    fn missing_or_garbled_lines_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("journal.jsonl"));
        assert!(journal.read_all().unwrap().is_empty());

        std::fs::write(journal.path(), "not json\n\n").unwrap();
        assert!(journal.read_all().unwrap().is_empty());

        journal.clear().unwrap();
        assert!(!journal.path().exists());
    }
}
