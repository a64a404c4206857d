// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Centered rolling statistics over NaN-encoded columns.
//!
//! All windows are strict: a window truncated by the series edge, or
//! containing any missing value, yields NaN. The terminal fill pass in
//! the extraction stage resolves what remains.

/// Bounds of the centered window of `width` rows labeled at `i`, or
/// `None` when the window is truncated by either edge.
///
/// For even widths the extra row sits on the right, so the window is
/// `[i - (width - 1) / 2, i + width / 2]` inclusive.
fn centered_window(i: usize, width: usize, n: usize) -> Option<(usize, usize)> {
    let left = (width - 1) / 2;
    let right = width / 2;
    if i < left || i + right >= n {
        return None;
    }
    Some((i - left, i + right))
}

fn window_slice(values: &[f64], i: usize, width: usize) -> Option<&[f64]> {
    let (lo, hi) = centered_window(i, width, values.len())?;
    let slice = &values[lo..=hi];
    if slice.iter().any(|v| !v.is_finite()) {
        return None;
    }
    Some(slice)
}

fn mean_of(slice: &[f64]) -> f64 {
    slice.iter().sum::<f64>() / slice.len() as f64
}

/// Sample standard deviation (ddof = 1); NaN for windows of one row.
fn std_of(slice: &[f64]) -> f64 {
    if slice.len() < 2 {
        return f64::NAN;
    }
    let mean = mean_of(slice);
    let ss: f64 = slice.iter().map(|v| (v - mean).powi(2)).sum();
    (ss / (slice.len() - 1) as f64).sqrt()
}

/// Centered rolling mean of `width` rows.
pub fn rolling_mean(values: &[f64], width: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| window_slice(values, i, width).map_or(f64::NAN, mean_of))
        .collect()
}

/// Centered rolling sample standard deviation of `width` rows.
pub fn rolling_std(values: &[f64], width: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| window_slice(values, i, width).map_or(f64::NAN, std_of))
        .collect()
}

/// Rolling coefficient of variation: rolling std over rolling mean.
/// Windows with a zero mean yield NaN.
pub fn rolling_cv(values: &[f64], width: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            let Some(slice) = window_slice(values, i, width) else {
                return f64::NAN;
            };
            let cv = std_of(slice) / mean_of(slice);
            if cv.is_finite() {
                cv
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Centered rolling Pearson correlation of two equal-length columns.
/// Windows where either column is constant yield NaN.
pub fn rolling_corr(a: &[f64], b: &[f64], width: usize) -> Vec<f64> {
    debug_assert_eq!(a.len(), b.len());
    (0..a.len())
        .map(|i| {
            let (Some(wa), Some(wb)) = (window_slice(a, i, width), window_slice(b, i, width))
            else {
                return f64::NAN;
            };
            pearson(wa, wb)
        })
        .collect()
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let mean_a = mean_of(a);
    let mean_b = mean_of(b);
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }
    let r = cov / (var_a * var_b).sqrt();
    if r.is_finite() {
        r
    } else {
        f64::NAN
    }
}

/// Finite difference against the value `lag` rows earlier.
pub fn diff(values: &[f64], lag: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            if i < lag {
                return f64::NAN;
            }
            values[i] - values[i - lag]
        })
        .collect()
}

/// Relative change against the value `lag` rows earlier. A zero or
/// missing base yields NaN.
pub fn pct_change(values: &[f64], lag: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            if i < lag {
                return f64::NAN;
            }
            let change = (values[i] - values[i - lag]) / values[i - lag];
            if change.is_finite() {
                change
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Forward-fills then backward-fills NaN values in place, returning the
/// number of values filled. A column with no finite value is left
/// untouched.
pub fn ffill_bfill(column: &mut [f64]) -> usize {
    let mut filled = 0;
    let mut last = f64::NAN;
    for value in column.iter_mut() {
        if value.is_finite() {
            last = *value;
        } else if last.is_finite() {
            *value = last;
            filled += 1;
        }
    }
    let mut next = f64::NAN;
    for value in column.iter_mut().rev() {
        if value.is_finite() {
            next = *value;
        } else if next.is_finite() {
            *value = next;
            filled += 1;
        }
    }
    filled
}
