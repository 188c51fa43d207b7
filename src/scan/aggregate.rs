// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Consolidation of scan files into per-scan records
//!
//! Files sharing a scan number are merged into one `ScanRecord`. Members are
//! folded oldest first (ties by filename), so the record does not depend on the
//! order in which storage listed the files:
//!
//! - disease names are the union of each member's readings, in discovery order
//! - a disease's percent comes from the newest member that reports it
//! - the date is the newest creation time
//! - the image reference is the newest member's

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

use super::{ScanFile, ScanRecord};
use crate::codec::DiseaseReading;

/// Readings considered per file
const READINGS_PER_FILE: usize = 2;

const NO_DIAGNOSIS: &str = "No specific diagnosis available.";
const DIAGNOSIS_PREFIX: &str = "The system detected potential signs of ";
const DIAGNOSIS_SUFFIX: &str =
    ". Recommend comprehensive clinical examination to confirm diagnosis.";

/// Group files by scan number and merge each group. Newest scan number first.
pub fn aggregate(files: Vec<ScanFile>) -> Vec<ScanRecord> {
    let mut groups: BTreeMap<u32, Vec<ScanFile>> = BTreeMap::new();
    for file in files {
        groups.entry(file.scan_number).or_default().push(file);
    }

    groups
        .into_values()
        .rev()
        .filter_map(merge_group)
        .collect()
}

fn merge_group(mut members: Vec<ScanFile>) -> Option<ScanRecord> {
    members.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.filename.cmp(&b.filename))
    });

    let mut members = members.into_iter();
    let mut acc = Accumulator::start(members.next()?);
    for member in members {
        acc.absorb(member);
    }
    Some(acc.finish())
}

struct Accumulator {
    scan_number: u32,
    date: DateTime<Utc>,
    files: Vec<String>,
    diseases: Vec<String>,
    latest: HashMap<String, DiseaseReading>,
    image_ref: String,
}

impl Accumulator {
    fn start(first: ScanFile) -> Self {
        let mut acc = Self {
            scan_number: first.scan_number,
            date: first.created_at,
            files: Vec::new(),
            diseases: Vec::new(),
            latest: HashMap::new(),
            image_ref: String::new(),
        };
        acc.absorb(first);
        acc
    }

    fn absorb(&mut self, file: ScanFile) {
        if !self.files.contains(&file.filename) {
            self.files.push(file.filename);
        }

        let readings = &file.readings[..file.readings.len().min(READINGS_PER_FILE)];
        for reading in readings {
            if !self.diseases.contains(&reading.name) {
                self.diseases.push(reading.name.clone());
            }
        }
        // first match inside the incoming file wins over later duplicates
        for reading in readings.iter().rev() {
            self.latest.insert(reading.name.clone(), reading.clone());
        }

        if file.created_at > self.date {
            self.date = file.created_at;
        }
        if !file.image_ref.is_empty() {
            self.image_ref = file.image_ref;
        }
    }

    fn finish(self) -> ScanRecord {
        let mut ranked: Vec<&DiseaseReading> = self
            .diseases
            .iter()
            .filter_map(|name| self.latest.get(name))
            .collect();
        ranked.sort_by(|a, b| {
            b.percent_value()
                .total_cmp(&a.percent_value())
                .then_with(|| a.name.cmp(&b.name))
        });

        let items: Vec<String> = self
            .diseases
            .iter()
            .map(|name| match self.latest.get(name) {
                Some(r) if !r.percent.is_empty() => format!("{} ({}%)", name, r.percent),
                _ => name.clone(),
            })
            .collect();

        ScanRecord {
            scan_number: self.scan_number,
            date: self.date,
            disease_display: self.diseases.join(" and "),
            diagnosis_text: diagnosis_text(&items),
            primary: ranked.first().map(|r| (*r).clone()),
            secondary: ranked.get(1).map(|r| (*r).clone()),
            files: self.files,
            diseases: self.diseases,
            image_ref: self.image_ref,
        }
    }
}

/// `a`, `a and b`, `a, b and c`
fn join_list(items: &[String]) -> String {
    match items.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} and {}", rest.join(", "), last),
    }
}

fn diagnosis_text(items: &[String]) -> String {
    if items.is_empty() {
        return NO_DIAGNOSIS.to_string();
    }
    format!("{}{}{}", DIAGNOSIS_PREFIX, join_list(items), DIAGNOSIS_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::parser;
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 21, 9, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn file(name: &str, minutes: i64) -> ScanFile {
        parser::parse(name, at(minutes))
            .unwrap()
            .with_image_ref(format!("file:///bucket/u1/{}", name))
    }

    #[test]
    fn single_file_record() {
        let records = aggregate(vec![file("scan_7_C:41.4-DR:36.5.jpg", 0)]);
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.scan_number, 7);
        assert_eq!(record.disease_display, "Cataract and Diabetic Retinopathy");
        assert_eq!(
            record.diagnosis_text,
            "The system detected potential signs of Cataract (41.4%) and Diabetic Retinopathy (36.5%). \
             Recommend comprehensive clinical examination to confirm diagnosis."
        );
        assert_eq!(record.confidence(), "41.4%");
        assert_eq!(record.secondary.as_ref().unwrap().name, "Diabetic Retinopathy");
    }

    #[test]
    fn one_disease_has_no_conjunction() {
        let records = aggregate(vec![file("scan_1_G:90.0.jpg", 0)]);
        assert_eq!(
            records[0].diagnosis_text,
            "The system detected potential signs of Glaucoma (90.0%). \
             Recommend comprehensive clinical examination to confirm diagnosis."
        );
        assert!(records[0].secondary.is_none());
    }

    #[test]
    fn unknown_payload_has_no_diagnosis() {
        let records = aggregate(vec![file("scan_1_Unknown.jpg", 0)]);
        assert_eq!(records[0].diagnosis_text, "No specific diagnosis available.");
        assert_eq!(records[0].disease_display, "");
        assert_eq!(records[0].confidence(), "N/A");
    }

    #[test]
    fn merges_files_with_same_scan_number() {
        let records = aggregate(vec![
            file("scan_3_G:22.0.jpg", 5),
            file("scan_3_C:41.4.jpg", 0),
        ]);
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.disease_display, "Cataract and Glaucoma");
        assert_eq!(record.files, vec!["scan_3_C:41.4.jpg", "scan_3_G:22.0.jpg"]);
        assert!(record.diagnosis_text.contains("Cataract (41.4%)"));
        assert!(record.diagnosis_text.contains("Glaucoma (22.0%)"));
        assert_eq!(record.date, at(5));
        assert_eq!(record.image_ref, "file:///bucket/u1/scan_3_G:22.0.jpg");
        assert_eq!(record.primary.as_ref().unwrap().name, "Cataract");
    }

    #[test]
    fn three_way_merge_lists_every_disease() {
        let records = aggregate(vec![
            file("scan_2_C:41.4-DR:36.5.jpg", 0),
            file("scan_2_G:30.2-C:20.0.jpg", 1),
            file("scan_2_DR:70.1.jpg", 2),
        ]);
        let record = &records[0];

        assert_eq!(record.disease_display, "Cataract and Diabetic Retinopathy and Glaucoma");
        assert_eq!(
            record.diagnosis_text,
            "The system detected potential signs of Cataract (20.0%), Diabetic Retinopathy (70.1%) \
             and Glaucoma (30.2%). Recommend comprehensive clinical examination to confirm diagnosis."
        );
        assert_eq!(record.primary.as_ref().unwrap().name, "Diabetic Retinopathy");
        assert_eq!(record.secondary.as_ref().unwrap().name, "Glaucoma");
    }

    #[test]
    fn equal_percents_rank_by_name() {
        let records = aggregate(vec![file("scan_4_G:30.0.jpg", 0), file("scan_4_C:30.0.jpg", 1)]);
        let record = &records[0];

        assert_eq!(record.disease_display, "Glaucoma and Cataract");
        assert_eq!(record.primary.as_ref().unwrap().name, "Cataract");
        assert_eq!(record.secondary.as_ref().unwrap().name, "Glaucoma");
    }

    #[test]
    fn output_is_newest_scan_first() {
        let records = aggregate(vec![
            file("scan_2_C:41.4.jpg", 0),
            file("scan_10_G:22.0.jpg", 0),
            file("scan_1_DR:36.5.jpg", 0),
        ]);
        let numbers: Vec<_> = records.iter().map(|r| r.scan_number).collect();
        assert_eq!(numbers, vec![10, 2, 1]);
    }

    #[test]
    fn result_does_not_depend_on_input_order() {
        let files = vec![
            file("scan_4_C:41.4-DR:36.5.jpg", 3),
            file("scan_4_G:22.0.jpg", 1),
            file("scan_5_DR:50.0.jpg", 0),
            file("scan_4_DR:12.5-G:10.0.jpg", 2),
            file("scan_1_Unknown.jpg", 0),
        ];
        let expected = aggregate(files.clone());

        let mut reversed = files.clone();
        reversed.reverse();
        assert_eq!(aggregate(reversed), expected);

        let mut rotated = files;
        rotated.rotate_left(2);
        assert_eq!(aggregate(rotated), expected);
    }

    #[test]
    fn empty_input_gives_no_records() {
        assert!(aggregate(Vec::new()).is_empty());
    }

    #[test]
    fn test_join_list() {
        let items = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert_eq!(join_list(&items(&["a"])), "a");
        assert_eq!(join_list(&items(&["a", "b"])), "a and b");
        assert_eq!(join_list(&items(&["a", "b", "c"])), "a, b and c");
    }
}
