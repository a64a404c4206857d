// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use halo_core::Sample;
use halo_features::{extract_features, FeatureConfig};
use halo_preprocess::{preprocess, PreprocessConfig};
use libfuzzer_sys::fuzz_target;

fn build_value(mode_seed: u8, raw_seed: i16) -> Option<f64> {
    match mode_seed % 8 {
        0 => None,
        1 => Some(f64::NAN),
        2 => Some(f64::INFINITY),
        3 => Some(f64::NEG_INFINITY),
        4 => Some(f64::from(raw_seed)),
        5 => Some(200.0 + f64::from(raw_seed).abs() % 1000.0),
        6 => Some(f64::from(raw_seed) * 1.0e6),
        _ => Some(f64::from(raw_seed) / 16.0),
    }
}

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);

    let config = PreprocessConfig {
        cadence_s: i64::from(cursor.next_i16()),
        max_gap_s: i64::from(cursor.next_i16()),
        outlier_sigma: f64::from(cursor.next_i16()) / 64.0,
        min_outlier_samples: common::bounded(cursor.next_u8(), 0, 32),
        significant_gap_s: i64::from(cursor.next_i16()),
        low_completeness: f64::from(cursor.next_u8()) / 255.0,
    };

    let count = common::bounded(cursor.next_u8(), 0, 192);
    let mut samples = Vec::with_capacity(count);
    let mut epoch_s = i64::from(cursor.next_i16());
    for _ in 0..count {
        // Steps may be negative so ordering and duplicates get hit.
        epoch_s = epoch_s.saturating_add(i64::from(cursor.next_i16() % 256));
        samples.push(Sample {
            epoch_s,
            velocity: build_value(cursor.next_u8(), cursor.next_i16()),
            density: build_value(cursor.next_u8(), cursor.next_i16()),
            temperature: build_value(cursor.next_u8(), cursor.next_i16()),
            flux: build_value(cursor.next_u8(), cursor.next_i16()),
        });
    }

    let Ok(out) = preprocess(&samples, &config) else {
        return;
    };
    if out.series.n() <= 4096 {
        let _ = extract_features(&out.series, &FeatureConfig::default());
    }
});
