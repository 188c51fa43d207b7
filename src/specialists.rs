// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Eye specialist directory
//!
//! Physicians are stored as JSON lines with `name`, `disease`, `state`,
//! `location`, `experience` and `biography`. Lines that do not decode are skipped.

use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::SpecialistsConfig;
use crate::{OculareError, Result};

/// Extensions read when the directory path is a folder
const LISTING_EXTENSIONS: &[&str] = &["jsonl", "txt"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Physician {
    pub name: String,
    /// Free text, may name several conditions
    pub disease: String,
    pub state: String,
    #[serde(default)]
    pub location: String,
    /// Years of practice; some listings write a number, others a phrase
    #[serde(default, deserialize_with = "text_or_number")]
    pub experience: String,
    #[serde(default)]
    pub biography: String,
}

fn text_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(text) => text,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

impl Physician {
    /// Case-insensitive substring match; an empty filter matches everything
    pub fn matches(&self, disease: &str, state: &str) -> bool {
        contains_folded(&self.disease, disease) && contains_folded(&self.state, state)
    }
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

/// Decode one listing, skipping blank and malformed lines
pub fn parse_listing(content: &str) -> Vec<Physician> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str(line.trim()) {
            Ok(physician) => Some(physician),
            Err(e) => {
                warn!("Skipping physician entry: {}", e);
                None
            }
        })
        .collect()
}

/// Physician listings on disk: a single JSONL file or a folder of them
pub struct SpecialistDirectory {
    path: PathBuf,
}

impl SpecialistDirectory {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn from_config(config: &SpecialistsConfig) -> Self {
        Self::new(&config.path)
    }

    /// Every physician in the directory, in file then line order
    pub fn load(&self) -> Result<Vec<Physician>> {
        if !self.path.exists() {
            return Err(OculareError::DirectoryNotFound(
                self.path.display().to_string(),
            ));
        }

        if self.path.is_file() {
            return Ok(parse_listing(&fs::read_to_string(&self.path)?));
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&self.path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && has_listing_extension(p))
            .collect();
        files.sort();

        let mut physicians = Vec::new();
        for file in &files {
            physicians.extend(parse_listing(&fs::read_to_string(file)?));
        }
        debug!("Loaded {} physicians from {} files", physicians.len(), files.len());
        Ok(physicians)
    }

    /// Physicians treating `disease` in `state`
    pub fn find(&self, disease: &str, state: &str) -> Result<Vec<Physician>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|p| p.matches(disease, state))
            .collect())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn has_listing_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| LISTING_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{"name": "Dr. Ana Ruiz", "disease": "Cataract, Glaucoma", "state": "California", "location": "Fresno", "experience": "12 years", "biography": "Anterior segment surgeon."}
not json at all
{"name": "Dr. Lee Park", "disease": "Diabetic Retinopathy", "state": "New York", "location": "Albany", "experience": 20, "biography": "Retina specialist."}

{"name": "Dr. Sam Odu", "disease": "glaucoma", "state": "North Carolina"}
{"name": "Missing fields"}
"#;

    #[test]
    fn malformed_lines_are_skipped() {
        let physicians = parse_listing(LISTING);
        assert_eq!(physicians.len(), 3);
        assert_eq!(physicians[1].experience, "20");
        assert_eq!(physicians[2].location, "");
    }

    #[test]
    fn filters_are_case_insensitive_substrings() {
        let physicians = parse_listing(LISTING);
        let names = |disease: &str, state: &str| -> Vec<String> {
            physicians
                .iter()
                .filter(|p| p.matches(disease, state))
                .map(|p| p.name.clone())
                .collect()
        };

        assert_eq!(names("GLAUCOMA", ""), vec!["Dr. Ana Ruiz", "Dr. Sam Odu"]);
        assert_eq!(names("glaucoma", "carolina"), vec!["Dr. Sam Odu"]);
        assert_eq!(names("retinopathy", "new york"), vec!["Dr. Lee Park"]);
        assert_eq!(names("", "").len(), 3);
        assert!(names("Cataract", "Texas").is_empty());
    }

    #[test]
    fn loads_a_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("physicians.txt");
        fs::write(&path, LISTING).unwrap();

        let found = SpecialistDirectory::new(&path).find("cataract", "california").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].location, "Fresno");
    }

    #[test]
    fn loads_every_listing_in_a_folder() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.jsonl"), LISTING).unwrap();
        fs::write(
            dir.path().join("a.txt"),
            r#"{"name": "Dr. Kim", "disease": "Glaucoma", "state": "Ohio"}"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.md"), "# not a listing").unwrap();

        let all = SpecialistDirectory::new(dir.path()).load().unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].name, "Dr. Kim");
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SpecialistDirectory::new(dir.path().join("absent.txt"))
            .load()
            .unwrap_err();
        assert!(matches!(err, OculareError::DirectoryNotFound(_)));
    }
}
