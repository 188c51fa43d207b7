// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use oculare::codec::{decode, encode_probabilities, rank_probabilities, DEFAULT_MAX_READINGS};
use oculare::scan::{aggregate, parser, ScanFile};

const PAYLOADS: &[&str] = &["C:41.4", "G:22.0-C:10.0", "DR:70.1-G:5.5", "Unknown"];

fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 21, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}

fn scan_file(number: u32, minutes: i64, payload: usize) -> ScanFile {
    let name = format!("scan_{}_{}.jpg", number, PAYLOADS[payload]);
    parser::parse(&name, at(minutes))
        .unwrap()
        .with_image_ref(format!("file:///bucket/u1/{}", name))
}

fn scan_files() -> impl Strategy<Value = Vec<ScanFile>> {
    prop::collection::vec((1u32..30, 0i64..120, 0..PAYLOADS.len()), 0..25).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(number, minutes, payload)| scan_file(number, minutes, payload))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(2_000))]

    /// Well-formed probability maps come back as the top pairs in rank order
    #[test]
    fn test_decode_inverts_encode(
        map in prop::collection::hash_map("[A-Z][a-z]{0,8}( [A-Z][a-z]{0,8}){0,2}", 0.0f64..=1.0, 0..6),
    ) {
        let payload = encode_probabilities(&map, DEFAULT_MAX_READINGS);
        let decoded = decode(&payload).unwrap();
        let ranked = rank_probabilities(&map);

        prop_assert_eq!(decoded.len(), ranked.len().min(DEFAULT_MAX_READINGS));
        for (reading, pair) in ranked.iter().zip(&decoded) {
            prop_assert_eq!(&reading.abbreviation, &pair.abbreviation);
            prop_assert_eq!(&reading.percent, &pair.percent);
        }
    }

    /// Whatever the classifier sends, the stored name is listed back
    #[test]
    fn test_every_payload_is_parseable(
        map in prop::collection::hash_map("\\PC{0,12}", any::<f64>(), 0..6),
    ) {
        let payload = encode_probabilities(&map, DEFAULT_MAX_READINGS);
        let name = format!("scan_7_{}.jpg", payload);

        prop_assert!(decode(&payload).is_ok(), "payload {} does not decode", payload);
        prop_assert!(parser::parse(&name, Utc::now()).is_some(), "{} does not parse", name);
    }

    #[test]
    fn test_aggregate_ignores_listing_order(
        (files, shuffled) in scan_files().prop_flat_map(|files| (Just(files.clone()), Just(files).prop_shuffle())),
    ) {
        let records = aggregate(files);

        for pair in records.windows(2) {
            prop_assert!(pair[0].scan_number > pair[1].scan_number);
        }
        prop_assert_eq!(records, aggregate(shuffled));
    }
}
