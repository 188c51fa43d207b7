// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use oculare::codec;
use oculare::scan::parser;

#[derive(Debug, Arbitrary)]
struct Input {
    filename: String,
    payload: String,
}

fuzz_target!(|input: Input| {
    if let Some(file) = parser::parse(&input.filename, chrono::Utc::now()) {
        assert!(file.scan_number >= 1);
        assert_eq!(file.filename, input.filename);
        assert_eq!(parser::extract_scan_number(&input.filename), Some(file.scan_number));
    }

    if let Ok(readings) = codec::decode(&input.payload) {
        for reading in readings {
            assert!(!reading.abbreviation.is_empty());
        }
    }
});
