// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property tests for the extraction schema and rolling invariants.

use halo_core::{Parameter, Series};
use halo_features::{extract_features, FeatureConfig, FeatureId, MA_WINDOWS_M};
use proptest::prelude::*;

fn series_strategy() -> impl Strategy<Value = Series> {
    (16usize..400).prop_flat_map(|n| {
        (
            prop::collection::vec(250.0..1100.0f64, n),
            prop::collection::vec(0.5..90.0f64, n),
            prop::collection::vec(2.0e4..5.0e6f64, n),
        )
            .prop_map(move |(velocity, density, temperature)| {
                Series::new(0, 60, [velocity, density, temperature, vec![2.0e9; n]])
                    .expect("generated series should be valid")
            })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Short series always carry the wavelet-free schema, row-aligned
    /// with the input.
    #[test]
    fn short_series_follow_the_wavelet_free_schema(series in series_strategy()) {
        let matrix = extract_features(&series, &FeatureConfig::default())
            .expect("extraction should succeed");
        prop_assert_eq!(matrix.n(), series.n());
        let ids: Vec<FeatureId> = matrix.ids().collect();
        prop_assert_eq!(ids, FeatureId::schema(false));
        for column in matrix.columns() {
            prop_assert_eq!(column.values().len(), series.n());
        }
    }

    /// A moving average can never leave the range of the values it
    /// averages, and the terminal fill only copies existing values.
    #[test]
    fn moving_averages_stay_within_the_raw_range(series in series_strategy()) {
        let matrix = extract_features(&series, &FeatureConfig::default())
            .expect("extraction should succeed");
        for &p in &Parameter::ALL {
            let raw = series.column(p);
            let lo = raw.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            for &w in &MA_WINDOWS_M {
                let Some(ma) = matrix.column(FeatureId::MovingAverage(p, w)) else {
                    continue;
                };
                for &value in ma {
                    if value.is_finite() {
                        prop_assert!(value >= lo - 1e-9 && value <= hi + 1e-9);
                    }
                }
            }
        }
    }

    /// The anomaly score is a sum of magnitudes.
    #[test]
    fn anomaly_scores_are_never_negative(series in series_strategy()) {
        let matrix = extract_features(&series, &FeatureConfig::default())
            .expect("extraction should succeed");
        let anomaly = matrix
            .column(FeatureId::AnomalyScore)
            .expect("anomaly column should exist");
        for &value in anomaly {
            if value.is_finite() {
                prop_assert!(value >= 0.0);
            }
        }
    }

    #[test]
    fn extraction_is_deterministic(series in series_strategy()) {
        let a = extract_features(&series, &FeatureConfig::default())
            .expect("extraction should succeed");
        let b = extract_features(&series, &FeatureConfig::default())
            .expect("extraction should succeed");
        prop_assert_eq!(a, b);
    }
}
