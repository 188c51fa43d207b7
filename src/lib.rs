// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Oculare: Retinal Scan Records
//!
//! Captures retinal images, has them classified by a remote service, stores them
//! with their top disease probabilities encoded in the filename, and rebuilds
//! consolidated per-scan records from those filenames.

pub mod capture;
pub mod classifier;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod journal;
pub mod scan;
pub mod specialists;
pub mod storage;
pub mod sync;

pub use config::AppConfig;
pub use error::{OculareError, Result};
