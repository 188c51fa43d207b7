// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Filename payload codec
//!
//! A stored scan carries its top disease probabilities inside its filename as
//! `ABBR:PCT` pairs joined by `-`, e.g. `C:41.4-DR:36.5`. A classification with
//! no probabilities is written as the literal `Unknown`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{OculareError, Result};

/// Payload written when the classifier returned no probabilities
pub const UNKNOWN_PAYLOAD: &str = "Unknown";

/// Number of readings kept in a filename
pub const DEFAULT_MAX_READINGS: usize = 2;

const PAIR_SEPARATOR: char = '-';
const FIELD_SEPARATOR: char = ':';

/// Abbreviations the decoder knows how to expand
const DISEASE_NAMES: &[(&str, &str)] = &[
    ("C", "Cataract"),
    ("DR", "Diabetic Retinopathy"),
    ("G", "Glaucoma"),
];

/// One disease with its probability expressed as a percentage string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseReading {
    pub abbreviation: String,
    pub name: String,
    /// Decimal string with one fractional digit, e.g. `"41.4"`
    pub percent: String,
}

/// A decoded `ABBR:PCT` pair before name expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedReading {
    pub abbreviation: String,
    pub percent: String,
}

impl DiseaseReading {
    /// Build a reading from a classifier probability in `[0, 1]`
    pub fn from_probability(name: &str, probability: f64) -> Self {
        Self {
            abbreviation: abbreviate(name),
            name: name.to_string(),
            percent: format_percent(probability),
        }
    }

    /// Numeric value of `percent`; `0.0` if it does not parse
    pub fn percent_value(&self) -> f64 {
        self.percent.parse().unwrap_or(0.0)
    }
}

impl From<EncodedReading> for DiseaseReading {
    fn from(encoded: EncodedReading) -> Self {
        Self {
            name: expand_abbreviation(&encoded.abbreviation),
            abbreviation: encoded.abbreviation,
            percent: encoded.percent,
        }
    }
}

/// Initials of each word, uppercased: `Diabetic Retinopathy` -> `DR`.
///
/// Words that do not start with an ASCII letter contribute nothing, so the result
/// may be empty.
pub fn abbreviate(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .filter(char::is_ascii_alphabetic)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// An abbreviation the filename layout can carry: one or more of `A-Z`
fn is_encodable(abbreviation: &str) -> bool {
    !abbreviation.is_empty() && abbreviation.chars().all(|c| c.is_ascii_uppercase())
}

/// Full disease name for an abbreviation; unknown abbreviations come back unchanged
pub fn expand_abbreviation(abbreviation: &str) -> String {
    DISEASE_NAMES
        .iter()
        .find(|(abbr, _)| *abbr == abbreviation)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| abbreviation.to_string())
}

/// Percent with one decimal, clamped to `0.0..=100.0`. Negative zero prints as `0.0`.
fn format_percent(probability: f64) -> String {
    let pct = probability * 100.0;
    let pct = if pct > 0.0 { pct.min(100.0) } else { 0.0 };
    format!("{:.1}", pct)
}

/// Rank a disease -> probability map, highest first.
///
/// Equal probabilities are ordered by disease name. Non-finite values are dropped.
pub fn rank_probabilities(probabilities: &HashMap<String, f64>) -> Vec<DiseaseReading> {
    let mut ranked: Vec<(&String, f64)> = probabilities
        .iter()
        .filter(|(_, p)| p.is_finite())
        .map(|(name, p)| (name, *p))
        .collect();

    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    ranked
        .into_iter()
        .map(|(name, p)| DiseaseReading::from_probability(name, p))
        .collect()
}

/// Encode the first `max_count` encodable readings. Input must already be sorted
/// highest first.
///
/// Readings whose abbreviation is not `[A-Z]+` are skipped; if none remain the
/// payload is `Unknown`.
pub fn encode(readings: &[DiseaseReading], max_count: usize) -> String {
    let pairs: Vec<String> = readings
        .iter()
        .filter(|r| is_encodable(&r.abbreviation) && is_numeric(&r.percent))
        .take(max_count)
        .map(|r| format!("{}{}{}", r.abbreviation, FIELD_SEPARATOR, r.percent))
        .collect();

    if pairs.is_empty() {
        return UNKNOWN_PAYLOAD.to_string();
    }
    pairs.join(&PAIR_SEPARATOR.to_string())
}

/// Rank and encode a classifier probability map in one step
pub fn encode_probabilities(probabilities: &HashMap<String, f64>, max_count: usize) -> String {
    encode(&rank_probabilities(probabilities), max_count)
}

/// Decode a payload into its abbreviation/percent pairs.
///
/// `Unknown` decodes to no readings. Any pair without exactly one `:`, with an
/// empty abbreviation, or with a non-numeric percent makes the whole payload malformed.
pub fn decode(encoded: &str) -> Result<Vec<EncodedReading>> {
    if encoded == UNKNOWN_PAYLOAD {
        return Ok(Vec::new());
    }

    encoded
        .split(PAIR_SEPARATOR)
        .map(|pair| {
            let mut fields = pair.split(FIELD_SEPARATOR);
            match (fields.next(), fields.next(), fields.next()) {
                (Some(abbreviation), Some(percent), None)
                    if !abbreviation.is_empty() && is_numeric(percent) =>
                {
                    Ok(EncodedReading {
                        abbreviation: abbreviation.to_string(),
                        percent: percent.to_string(),
                    })
                }
                _ => Err(OculareError::MalformedFilename(format!(
                    "bad reading '{}' in payload '{}'",
                    pair, encoded
                ))),
            }
        })
        .collect()
}

/// Decode a payload and expand every abbreviation to a full reading
pub fn decode_readings(encoded: &str) -> Result<Vec<DiseaseReading>> {
    Ok(decode(encoded)?.into_iter().map(DiseaseReading::from).collect())
}

fn is_numeric(percent: &str) -> bool {
    percent.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}
