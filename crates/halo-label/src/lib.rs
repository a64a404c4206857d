// SPDX-License-Identifier: MIT OR Apache-2.0

//! Catalog-driven labeling of feature matrices.
//!
//! Each catalog event contributes a window around its estimated L1
//! arrival; rows inside the union of all windows are labeled as CME
//! periods. The labeled matrix is what calibration trains and
//! validation scores against.

#![forbid(unsafe_code)]

use halo_core::{CmeEvent, HaloError};
use halo_features::FeatureMatrix;
use tracing::{debug, info};

/// Configuration for the labeling window around each estimated arrival.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LabelConfig {
    /// Seconds before the estimated arrival included in the window.
    pub pre_arrival_s: i64,
    /// Seconds after the estimated arrival included in the window.
    pub post_arrival_s: i64,
}

impl Default for LabelConfig {
    fn default() -> Self {
        // 6 h of sheath ahead of the arrival, 72 h of passage behind.
        Self {
            pre_arrival_s: 6 * 3600,
            post_arrival_s: 72 * 3600,
        }
    }
}

impl LabelConfig {
    fn validate(&self) -> Result<(), HaloError> {
        if self.pre_arrival_s < 0 || self.post_arrival_s < 0 {
            return Err(HaloError::invalid_config(format!(
                "label window must be non-negative, got pre={} post={}",
                self.pre_arrival_s, self.post_arrival_s
            )));
        }
        Ok(())
    }
}

/// A feature matrix with one boolean label per row: true inside the
/// union of catalog event windows.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledFeatureMatrix {
    matrix: FeatureMatrix,
    labels: Vec<bool>,
}

impl LabeledFeatureMatrix {
    pub fn matrix(&self) -> &FeatureMatrix {
        &self.matrix
    }

    pub fn labels(&self) -> &[bool] {
        &self.labels
    }

    /// Number of rows labeled as CME periods.
    pub fn positive_rows(&self) -> usize {
        self.labels.iter().filter(|&&l| l).count()
    }

    pub fn into_parts(self) -> (FeatureMatrix, Vec<bool>) {
        (self.matrix, self.labels)
    }
}

/// Labels every matrix row inside `[arrival - pre, arrival + post]` of
/// any catalog event, inclusive on both ends. Events whose window falls
/// entirely outside the matrix simply contribute no rows; an empty
/// catalog yields an all-negative labeling.
pub fn label_events(
    matrix: FeatureMatrix,
    events: &[CmeEvent],
    config: &LabelConfig,
) -> Result<LabeledFeatureMatrix, HaloError> {
    config.validate()?;
    let mut labels = vec![false; matrix.n()];

    for event in events {
        let arrival_s = event.estimated_arrival_s();
        let window_start = arrival_s - config.pre_arrival_s;
        let window_end = arrival_s + config.post_arrival_s;
        let mut rows = 0usize;
        for (i, label) in labels.iter_mut().enumerate() {
            let t = matrix.timestamp_at(i);
            if t >= window_start && t <= window_end {
                *label = true;
                rows += 1;
            }
        }
        debug!(
            onset_s = event.onset_s(),
            arrival_s,
            speed_km_s = event.speed_km_s(),
            rows,
            "labeled event window"
        );
    }

    let positives = labels.iter().filter(|&&l| l).count();
    info!(
        events = events.len(),
        rows = labels.len(),
        positives,
        "labeled feature matrix"
    );
    Ok(LabeledFeatureMatrix { matrix, labels })
}

#[cfg(test)]
mod tests {
    use super::{label_events, LabelConfig};
    use halo_core::{CmeEvent, Series};
    use halo_features::{extract_features, FeatureConfig, FeatureMatrix};

    fn matrix_of(n: usize) -> FeatureMatrix {
        let series = Series::new(
            0,
            60,
            [
                vec![400.0; n],
                vec![5.0; n],
                vec![1.0e5; n],
                vec![2.0e9; n],
            ],
        )
        .expect("series should be valid");
        extract_features(&series, &FeatureConfig::default()).expect("extraction should succeed")
    }

    /// Event whose estimated arrival lands exactly at `arrival_s`.
    fn event_arriving_at(arrival_s: i64) -> CmeEvent {
        let speed: f64 = 800.0;
        let travel_s = (1.4 * 1.496e8 / speed).round() as i64;
        CmeEvent::new(arrival_s - travel_s, speed, 360.0, "N00W00")
            .expect("event should be valid")
    }

    #[test]
    fn empty_catalog_labels_nothing() {
        let labeled = label_events(matrix_of(100), &[], &LabelConfig::default())
            .expect("labeling should succeed");
        assert_eq!(labeled.positive_rows(), 0);
        assert_eq!(labeled.labels().len(), 100);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let config = LabelConfig {
            pre_arrival_s: 120,
            post_arrival_s: 180,
        };
        let labeled = label_events(matrix_of(100), &[event_arriving_at(600)], &config)
            .expect("labeling should succeed");

        // Window [480, 780] covers rows 8..=13.
        for (i, &label) in labeled.labels().iter().enumerate() {
            assert_eq!(label, (8..=13).contains(&i), "row {i}");
        }
    }

    #[test]
    fn overlapping_windows_union() {
        let config = LabelConfig {
            pre_arrival_s: 300,
            post_arrival_s: 300,
        };
        let events = [event_arriving_at(600), event_arriving_at(900)];
        let labeled = label_events(matrix_of(100), &events, &config)
            .expect("labeling should succeed");

        // Union [300, 1200] covers rows 5..=20, each row once.
        assert_eq!(labeled.positive_rows(), 16);
        assert!(labeled.labels()[5] && labeled.labels()[20]);
        assert!(!labeled.labels()[4] && !labeled.labels()[21]);
    }

    #[test]
    fn off_matrix_events_contribute_nothing() {
        let labeled = label_events(
            matrix_of(50),
            &[event_arriving_at(10_000_000)],
            &LabelConfig::default(),
        )
        .expect("labeling should succeed");
        assert_eq!(labeled.positive_rows(), 0);
    }

    #[test]
    fn negative_window_is_rejected() {
        let config = LabelConfig {
            pre_arrival_s: -60,
            post_arrival_s: 0,
        };
        let err = label_events(matrix_of(10), &[], &config)
            .expect_err("negative window must fail");
        assert!(err.to_string().contains("non-negative"));
    }
}
