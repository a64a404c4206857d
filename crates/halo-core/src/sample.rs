// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Solar-wind plasma parameters measured by the instrument.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Parameter {
    Velocity,
    Density,
    Temperature,
    Flux,
}

impl Parameter {
    /// All parameters in canonical column order.
    pub const ALL: [Parameter; 4] = [
        Parameter::Velocity,
        Parameter::Density,
        Parameter::Temperature,
        Parameter::Flux,
    ];

    /// Physical validity range as `(min, max)` in the parameter's unit.
    ///
    /// Values outside this range are instrument artifacts, not physics,
    /// and are converted to missing during preprocessing.
    pub fn bounds(self) -> (f64, f64) {
        match self {
            Parameter::Velocity => (200.0, 1200.0),
            Parameter::Density => (0.1, 100.0),
            Parameter::Temperature => (1.0e4, 1.0e7),
            Parameter::Flux => (0.0, f64::INFINITY),
        }
    }

    /// Stable lowercase label used in derived feature-column names.
    pub fn label(self) -> &'static str {
        match self {
            Parameter::Velocity => "velocity",
            Parameter::Density => "density",
            Parameter::Temperature => "temperature",
            Parameter::Flux => "flux",
        }
    }

    /// Measurement unit, for diagnostics.
    pub fn unit(self) -> &'static str {
        match self {
            Parameter::Velocity => "km/s",
            Parameter::Density => "cm^-3",
            Parameter::Temperature => "K",
            Parameter::Flux => "cm^-2 s^-1",
        }
    }

    /// Index of this parameter in [`Parameter::ALL`].
    pub fn index(self) -> usize {
        match self {
            Parameter::Velocity => 0,
            Parameter::Density => 1,
            Parameter::Temperature => 2,
            Parameter::Flux => 3,
        }
    }
}

/// One raw instrument reading.
///
/// Timestamps are Unix epoch seconds. Any parameter may be absent; an
/// absent field is `None`, never a sentinel value.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    pub epoch_s: i64,
    pub velocity: Option<f64>,
    pub density: Option<f64>,
    pub temperature: Option<f64>,
    pub flux: Option<f64>,
}

impl Sample {
    /// Creates a sample with every parameter absent.
    pub fn empty(epoch_s: i64) -> Self {
        Self {
            epoch_s,
            velocity: None,
            density: None,
            temperature: None,
            flux: None,
        }
    }

    /// Returns the value of `parameter`, if present.
    pub fn value(&self, parameter: Parameter) -> Option<f64> {
        match parameter {
            Parameter::Velocity => self.velocity,
            Parameter::Density => self.density,
            Parameter::Temperature => self.temperature,
            Parameter::Flux => self.flux,
        }
    }

    /// True when every parameter is absent or non-finite.
    pub fn is_all_missing(&self) -> bool {
        !Parameter::ALL
            .iter()
            .any(|&p| self.value(p).is_some_and(f64::is_finite))
    }
}

#[cfg(test)]
mod tests {
    use super::{Parameter, Sample};

    #[test]
    fn bounds_match_declared_physical_ranges() {
        assert_eq!(Parameter::Velocity.bounds(), (200.0, 1200.0));
        assert_eq!(Parameter::Density.bounds(), (0.1, 100.0));
        assert_eq!(Parameter::Temperature.bounds(), (1.0e4, 1.0e7));
        let (flux_lo, flux_hi) = Parameter::Flux.bounds();
        assert_eq!(flux_lo, 0.0);
        assert!(flux_hi.is_infinite());
    }

    #[test]
    fn index_is_consistent_with_canonical_order() {
        for (idx, parameter) in Parameter::ALL.iter().enumerate() {
            assert_eq!(parameter.index(), idx);
        }
    }

    #[test]
    fn empty_sample_is_all_missing() {
        assert!(Sample::empty(0).is_all_missing());
    }

    #[test]
    fn sample_with_one_finite_value_is_not_all_missing() {
        let sample = Sample {
            velocity: Some(400.0),
            ..Sample::empty(60)
        };
        assert!(!sample.is_all_missing());
        assert_eq!(sample.value(Parameter::Velocity), Some(400.0));
        assert_eq!(sample.value(Parameter::Density), None);
    }

    #[test]
    fn non_finite_values_count_as_missing() {
        let sample = Sample {
            temperature: Some(f64::NAN),
            flux: Some(f64::INFINITY),
            ..Sample::empty(0)
        };
        assert!(sample.is_all_missing());
    }
}
