// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Daubechies-4 discrete wavelet decomposition.
//!
//! The extraction stage summarizes each decomposed column by the
//! variance of its coarsest detail levels; those variances respond to
//! the broad (multi-hour) disturbances a CME front drives while staying
//! flat for minute-scale noise.

/// Daubechies-4 decomposition low-pass filter taps.
const DEC_LO: [f64; 8] = [
    -0.010597401784997278,
    0.032883011666982945,
    0.030841381835986965,
    -0.187034811718881140,
    -0.027983769416983850,
    0.630880767929590400,
    0.714846570552541500,
    0.230377813308855230,
];

/// Decomposition depth used for the feature columns.
pub const DECOMPOSITION_LEVELS: usize = 6;

/// Shortest column the decomposition accepts. Below this the six-level
/// transform has too few coarse coefficients to carry a stable
/// variance.
pub const MIN_SAMPLES: usize = 1024;

fn dec_hi() -> [f64; 8] {
    let mut hi = [0.0; 8];
    for (i, tap) in hi.iter_mut().enumerate() {
        let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
        *tap = sign * DEC_LO[DEC_LO.len() - 1 - i];
    }
    hi
}

/// One filtering-and-downsampling step with symmetric boundary
/// extension (edge sample repeated).
fn dwt_step(signal: &[f64], filter: &[f64; 8]) -> Vec<f64> {
    let n = signal.len() as isize;
    let extended = |mut idx: isize| -> f64 {
        if idx < 0 {
            idx = -idx - 1;
        }
        if idx >= n {
            idx = 2 * n - idx - 1;
        }
        signal[idx as usize]
    };
    let out_len = (signal.len() + filter.len() - 1) / 2;
    (0..out_len)
        .map(|j| {
            let base = 2 * j as isize + 1;
            filter
                .iter()
                .enumerate()
                .map(|(k, &tap)| tap * extended(base - k as isize))
                .sum()
        })
        .collect()
}

/// Variances of the `levels` coarsest detail bands of a six-level
/// Daubechies-4 decomposition, coarsest first.
///
/// The input must be gap-free (the caller fills missing values first)
/// and at least [`MIN_SAMPLES`] long; shorter input returns `None` and
/// the corresponding columns are omitted from the matrix.
pub fn detail_variances(signal: &[f64], levels: usize) -> Option<Vec<f64>> {
    if signal.len() < MIN_SAMPLES || levels > DECOMPOSITION_LEVELS {
        return None;
    }
    let hi = dec_hi();
    let mut approx = signal.to_vec();
    let mut details: Vec<Vec<f64>> = Vec::with_capacity(DECOMPOSITION_LEVELS);
    for _ in 0..DECOMPOSITION_LEVELS {
        details.push(dwt_step(&approx, &hi));
        approx = dwt_step(&approx, &DEC_LO);
    }
    // details is finest-to-coarsest; report coarsest first.
    Some(
        details
            .iter()
            .rev()
            .take(levels)
            .map(|band| population_variance(band))
            .collect(),
    )
}

fn population_variance(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}
