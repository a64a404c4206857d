// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{HaloError, Parameter};

/// Uniform-cadence, timestamp-indexed solar-wind series.
///
/// Row `i` is at `t0_s + i * cadence_s`; timestamps are therefore
/// strictly increasing and unique by construction. Missing values are
/// encoded as `f64::NAN` inside each column.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Series {
    t0_s: i64,
    cadence_s: i64,
    n: usize,
    velocity: Vec<f64>,
    density: Vec<f64>,
    temperature: Vec<f64>,
    flux: Vec<f64>,
}

impl Series {
    /// Constructs a validated series from columns in canonical order
    /// (velocity, density, temperature, flux).
    pub fn new(t0_s: i64, cadence_s: i64, columns: [Vec<f64>; 4]) -> Result<Self, HaloError> {
        if cadence_s <= 0 {
            return Err(HaloError::invalid_input(format!(
                "series cadence_s must be > 0, got {cadence_s}"
            )));
        }
        let [velocity, density, temperature, flux] = columns;
        let n = velocity.len();
        if n == 0 {
            return Err(HaloError::invalid_input("series must have n >= 1 rows"));
        }
        for (column, parameter) in [(&density, "density"), (&temperature, "temperature"), (&flux, "flux")]
        {
            if column.len() != n {
                return Err(HaloError::invalid_input(format!(
                    "series column length mismatch: {parameter} has {}, velocity has {n}",
                    column.len()
                )));
            }
        }

        Ok(Self {
            t0_s,
            cadence_s,
            n,
            velocity,
            density,
            temperature,
            flux,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn t0_s(&self) -> i64 {
        self.t0_s
    }

    pub fn cadence_s(&self) -> i64 {
        self.cadence_s
    }

    /// Timestamp of row `i` in Unix epoch seconds.
    pub fn timestamp_at(&self, i: usize) -> i64 {
        self.t0_s + self.cadence_s * i as i64
    }

    /// Column for `parameter`, NaN-encoded missing values included.
    pub fn column(&self, parameter: Parameter) -> &[f64] {
        match parameter {
            Parameter::Velocity => &self.velocity,
            Parameter::Density => &self.density,
            Parameter::Temperature => &self.temperature,
            Parameter::Flux => &self.flux,
        }
    }

    /// Fraction of rows with a present (finite) value for `parameter`.
    pub fn availability(&self, parameter: Parameter) -> f64 {
        let present = self
            .column(parameter)
            .iter()
            .filter(|v| v.is_finite())
            .count();
        present as f64 / self.n as f64
    }

    /// Mean per-parameter availability.
    pub fn completeness(&self) -> f64 {
        Parameter::ALL
            .iter()
            .map(|&p| self.availability(p))
            .sum::<f64>()
            / Parameter::ALL.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::Series;
    use crate::Parameter;

    fn series_with(velocity: Vec<f64>) -> Series {
        let n = velocity.len();
        Series::new(
            0,
            60,
            [velocity, vec![5.0; n], vec![1.0e5; n], vec![2.0e9; n]],
        )
        .expect("test series should be valid")
    }

    #[test]
    fn timestamps_are_strictly_increasing_at_the_cadence() {
        let series = series_with(vec![400.0; 5]);
        let timestamps: Vec<i64> = (0..series.n()).map(|i| series.timestamp_at(i)).collect();
        assert_eq!(timestamps, vec![0, 60, 120, 180, 240]);
        assert!(timestamps.windows(2).all(|w| w[1] - w[0] == 60));
    }

    #[test]
    fn rejects_zero_or_negative_cadence() {
        for cadence in [0_i64, -60] {
            let err = Series::new(0, cadence, [vec![1.0], vec![1.0], vec![1.0], vec![1.0]])
                .expect_err("non-positive cadence must fail");
            assert!(err.to_string().contains("cadence_s must be > 0"));
        }
    }

    #[test]
    fn rejects_empty_and_mismatched_columns() {
        let err = Series::new(0, 60, [vec![], vec![], vec![], vec![]])
            .expect_err("empty series must fail");
        assert!(err.to_string().contains("n >= 1"));

        let err = Series::new(0, 60, [vec![1.0, 2.0], vec![1.0], vec![1.0, 2.0], vec![1.0, 2.0]])
            .expect_err("length mismatch must fail");
        assert!(err.to_string().contains("column length mismatch"));
    }

    #[test]
    fn availability_counts_only_finite_values() {
        let series = series_with(vec![400.0, f64::NAN, 420.0, f64::NAN]);
        assert_eq!(series.availability(Parameter::Velocity), 0.5);
        assert_eq!(series.availability(Parameter::Density), 1.0);
        assert_eq!(series.completeness(), (0.5 + 3.0) / 4.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn series_serde_roundtrip() {
        let series = series_with(vec![400.0, 410.0]);
        let encoded = serde_json::to_string(&series).expect("series should serialize");
        let decoded: Series = serde_json::from_str(&encoded).expect("series should deserialize");
        assert_eq!(decoded, series);
    }
}
