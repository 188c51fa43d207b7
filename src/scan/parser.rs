// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Stored filename parsing

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;
use tracing::warn;

use super::ScanFile;
use crate::codec;
use crate::storage::StoredObject;

/// `scan_<n>_<payload>.jpg`, payload restricted to word characters, `:`, `.` and `-`
fn filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^scan_(\d+)_([\w:.-]+)\.jpg$").expect("scan filename pattern is valid")
    })
}

fn number_prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"scan_(\d+)_").expect("scan number pattern is valid"))
}

fn parse_number(digits: &str) -> Option<u32> {
    digits.parse::<u32>().ok().filter(|n| *n > 0)
}

/// Parse one stored filename into a `ScanFile`.
///
/// Returns `None` (and logs) when the name does not follow the scan layout or its
/// payload does not decode. The returned file has an empty image reference.
pub fn parse(filename: &str, created_at: DateTime<Utc>) -> Option<ScanFile> {
    let Some(caps) = filename_pattern().captures(filename) else {
        warn!("Filename does not match expected pattern: {}", filename);
        return None;
    };

    let Some(scan_number) = parse_number(&caps[1]) else {
        warn!("Scan number out of range in {}", filename);
        return None;
    };

    let readings = match codec::decode_readings(&caps[2]) {
        Ok(readings) => readings,
        Err(e) => {
            warn!("Skipping {}: {}", filename, e);
            return None;
        }
    };

    Some(ScanFile {
        scan_number,
        filename: filename.to_string(),
        created_at,
        readings,
        image_ref: String::new(),
    })
}

/// Scan number from a `scan_<n>_` prefix, ignoring the rest of the name
pub fn extract_scan_number(filename: &str) -> Option<u32> {
    number_prefix_pattern()
        .captures(filename)
        .and_then(|caps| parse_number(&caps[1]))
}

/// Parse a listing, dropping entries that do not parse
pub fn parse_all(objects: &[StoredObject]) -> Vec<ScanFile> {
    objects
        .iter()
        .filter_map(|o| parse(&o.name, o.created_at))
        .collect()
}

/// Next free scan number: one past the highest existing, or 1
pub fn next_scan_number<'a, I>(filenames: I) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    filenames
        .into_iter()
        .filter_map(extract_scan_number)
        .max()
        .map_or(1, |n| n.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_readings() {
        let t = Utc::now();
        let file = parse("scan_7_C:41.4-DR:36.5.jpg", t).unwrap();

        assert_eq!(file.scan_number, 7);
        assert_eq!(file.created_at, t);
        assert_eq!(file.readings.len(), 2);
        assert_eq!(file.readings[0].name, "Cataract");
        assert_eq!(file.readings[0].percent, "41.4");
        assert_eq!(file.readings[1].name, "Diabetic Retinopathy");
        assert_eq!(file.readings[1].percent, "36.5");
    }

    #[test]
    fn test_parse_unknown_payload() {
        let file = parse("scan_2_Unknown.jpg", Utc::now()).unwrap();
        assert!(file.readings.is_empty());
    }

    #[test]
    fn test_parse_rejects_other_layouts() {
        let t = Utc::now();
        assert!(parse("random.jpg", t).is_none());
        assert!(parse("scan_7_C:41.4.JPG", t).is_none());
        assert!(parse("scan_7_C:41.4.png", t).is_none());
        assert!(parse("scan_x_C:41.4.jpg", t).is_none());
        assert!(parse("scan_7_C 41.4.jpg", t).is_none());
        assert!(parse("scan_7_C:oops.jpg", t).is_none());
        assert!(parse("scan_0_C:41.4.jpg", t).is_none());
    }

    #[test]
    fn test_extract_scan_number() {
        assert_eq!(extract_scan_number("scan_12_G:22.0.png"), Some(12));
        assert_eq!(extract_scan_number("scan_3_whatever"), Some(3));
        assert_eq!(extract_scan_number("notes.txt"), None);
    }

    #[test]
    fn test_next_scan_number() {
        let names = ["scan_1_C:41.4.jpg", "scan_3_G:22.0.jpg", "random.jpg"];
        assert_eq!(next_scan_number(names), 4);
        assert_eq!(next_scan_number(Vec::<&str>::new()), 1);
        assert_eq!(next_scan_number(["random.jpg"]), 1);
    }

    #[test]
    fn test_parse_all_skips_bad_entries() {
        let t = Utc::now();
        let objects = vec![
            StoredObject { name: "scan_1_C:41.4.jpg".to_string(), created_at: t },
            StoredObject { name: ".emptyFolderPlaceholder".to_string(), created_at: t },
            StoredObject { name: "scan_2_G:22.0.jpg".to_string(), created_at: t },
        ];
        let files = parse_all(&objects);
        assert_eq!(files.iter().map(|f| f.scan_number).collect::<Vec<_>>(), vec![1, 2]);
    }
}
