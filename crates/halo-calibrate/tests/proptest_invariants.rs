// SPDX-License-Identifier: MIT OR Apache-2.0

//! Property tests for statistical threshold calibration.

use halo_calibrate::{calibrate, CalibrationConfig, CalibrationMethod};
use halo_core::Series;
use halo_features::{extract_features, FeatureConfig, KEY_FEATURES};
use halo_label::{label_events, LabelConfig, LabeledFeatureMatrix};
use proptest::prelude::*;

/// All-background labeled matrices over physically plausible values.
fn labeled_strategy() -> impl Strategy<Value = LabeledFeatureMatrix> {
    (64usize..256).prop_flat_map(|n| {
        (
            prop::collection::vec(250.0..1100.0f64, n),
            prop::collection::vec(0.5..90.0f64, n),
        )
            .prop_map(move |(velocity, density)| {
                let temperature: Vec<f64> = (0..n)
                    .map(|i| 1.0e5 + 100.0 * (i as f64 / 53.0).sin())
                    .collect();
                let series =
                    Series::new(0, 60, [velocity, density, temperature, vec![2.0e9; n]])
                        .expect("generated series should be valid");
                let matrix = extract_features(&series, &FeatureConfig::default())
                    .expect("extraction should succeed");
                label_events(matrix, &[], &LabelConfig::default())
                    .expect("labeling should succeed")
            })
    })
}

fn config(percentile: f64) -> CalibrationConfig {
    CalibrationConfig {
        method: CalibrationMethod::Statistical,
        percentile,
        ..CalibrationConfig::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Thresholds cover only key features and stay within the observed
    /// range of their column.
    #[test]
    fn thresholds_stay_within_the_background_range(
        labeled in labeled_strategy(),
        percentile in 0.0..=100.0f64,
    ) {
        let artifact = calibrate(&labeled, &config(percentile))
            .expect("calibration should succeed");
        for &(id, threshold) in artifact.thresholds().entries() {
            prop_assert!(KEY_FEATURES.contains(&id));
            let column = labeled
                .matrix()
                .column(id)
                .expect("key column should exist");
            let finite = column.iter().copied().filter(|v| v.is_finite());
            let lo = finite.clone().fold(f64::INFINITY, f64::min);
            let hi = finite.fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(threshold >= lo - 1e-9 && threshold <= hi + 1e-9);
        }
    }

    /// A higher percentile never lowers a threshold.
    #[test]
    fn thresholds_are_monotone_in_the_percentile(labeled in labeled_strategy()) {
        let low = calibrate(&labeled, &config(50.0)).expect("calibration should succeed");
        let high = calibrate(&labeled, &config(99.0)).expect("calibration should succeed");
        for (&(id, t_low), &(_, t_high)) in low
            .thresholds()
            .entries()
            .iter()
            .zip(high.thresholds().entries())
        {
            prop_assert!(t_high >= t_low - 1e-12, "{} not monotone", id.name());
        }
    }

    /// The statistical method never trains a model and reproduces its
    /// artifact exactly.
    #[test]
    fn statistical_calibration_is_deterministic(labeled in labeled_strategy()) {
        let a = calibrate(&labeled, &config(95.0)).expect("calibration should succeed");
        let b = calibrate(&labeled, &config(95.0)).expect("calibration should succeed");
        prop_assert!(a.ml().is_none());
        prop_assert_eq!(a, b);
    }
}
