// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use halo_core::Parameter;

/// Moving-average windows in minutes (1 h, 3 h, 6 h).
pub const MA_WINDOWS_M: [u32; 3] = [60, 180, 360];

/// Rolling std / coefficient-of-variation windows in minutes
/// (3 h, 6 h, 12 h).
pub const STAT_WINDOWS_M: [u32; 3] = [180, 360, 720];

/// Finite-difference and percent-change lags in minutes (1 h, 3 h).
pub const GRADIENT_LAGS_M: [u32; 2] = [60, 180];

/// Rolling-correlation windows in minutes.
pub const CORR_WINDOWS_M: [u32; 2] = [180, 360];

/// Parameters that get wavelet detail-variance columns.
pub const WAVELET_PARAMETERS: [Parameter; 2] = [Parameter::Velocity, Parameter::Density];

/// Number of coarsest detail levels summarized per wavelet parameter.
pub const WAVELET_DETAIL_LEVELS: u8 = 3;

/// Parameter pairs with rolling-correlation columns.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CorrPair {
    VelocityDensity,
    VelocityTemperature,
}

impl CorrPair {
    pub const ALL: [CorrPair; 2] = [CorrPair::VelocityDensity, CorrPair::VelocityTemperature];

    pub fn parameters(self) -> (Parameter, Parameter) {
        match self {
            CorrPair::VelocityDensity => (Parameter::Velocity, Parameter::Density),
            CorrPair::VelocityTemperature => (Parameter::Velocity, Parameter::Temperature),
        }
    }

    fn label(self) -> &'static str {
        match self {
            CorrPair::VelocityDensity => "vel_dens",
            CorrPair::VelocityTemperature => "vel_temp",
        }
    }
}

/// Identity of one feature-matrix column.
///
/// The schema is closed: every column a matrix can carry is named here,
/// so downstream stages match on identities instead of parsing strings.
/// Wavelet columns are the only structurally optional ones; they are
/// absent from matrices built on short series.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureId {
    /// The cleaned parameter itself.
    Raw(Parameter),
    /// Centered rolling mean over a window in minutes.
    MovingAverage(Parameter, u32),
    /// Finite difference against the value a lag (minutes) earlier.
    Gradient(Parameter, u32),
    /// Relative change against the value a lag (minutes) earlier.
    PctChange(Parameter, u32),
    /// Centered rolling sample standard deviation.
    MovingStd(Parameter, u32),
    /// Rolling std divided by rolling mean over the same window.
    CoefVariation(Parameter, u32),
    /// Ram pressure of the proton flow, in nPa.
    DynamicPressure,
    /// Most-probable proton thermal speed, in km/s.
    ThermalSpeed,
    /// Bulk velocity over thermal speed.
    VelocityRatio,
    /// Centered rolling Pearson correlation of a parameter pair.
    Correlation(CorrPair, u32),
    /// Variance of one coarse wavelet detail level (1 = coarsest).
    WaveletDetail(Parameter, u8),
    /// Velocity relative to its 6 h moving average, minus one.
    VelocityEnhancement,
    /// Density relative to its 6 h moving average, minus one.
    DensityEnhancement,
    /// Combined enhancement and gradient anomaly score.
    AnomalyScore,
}

/// Features the statistical policy thresholds, in report order.
pub const KEY_FEATURES: [FeatureId; 5] = [
    FeatureId::VelocityEnhancement,
    FeatureId::DensityEnhancement,
    FeatureId::AnomalyScore,
    FeatureId::Gradient(Parameter::Velocity, 180),
    FeatureId::DynamicPressure,
];

impl FeatureId {
    /// Stable column name, e.g. `velocity_ma_360m` or
    /// `vel_dens_corr_180m`.
    pub fn name(self) -> String {
        match self {
            FeatureId::Raw(p) => p.label().to_string(),
            FeatureId::MovingAverage(p, w) => format!("{}_ma_{w}m", p.label()),
            FeatureId::Gradient(p, lag) => format!("{}_gradient_{}h", p.label(), lag / 60),
            FeatureId::PctChange(p, lag) => format!("{}_pct_change_{}h", p.label(), lag / 60),
            FeatureId::MovingStd(p, w) => format!("{}_std_{w}m", p.label()),
            FeatureId::CoefVariation(p, w) => format!("{}_cv_{w}m", p.label()),
            FeatureId::DynamicPressure => "dynamic_pressure".to_string(),
            FeatureId::ThermalSpeed => "thermal_speed".to_string(),
            FeatureId::VelocityRatio => "velocity_ratio".to_string(),
            FeatureId::Correlation(pair, w) => format!("{}_corr_{w}m", pair.label()),
            FeatureId::WaveletDetail(p, level) => {
                format!("{}_wavelet_detail_{level}", p.label())
            }
            FeatureId::VelocityEnhancement => "velocity_enhancement".to_string(),
            FeatureId::DensityEnhancement => "density_enhancement".to_string(),
            FeatureId::AnomalyScore => "anomaly_score".to_string(),
        }
    }

    /// The full schema in canonical column order. Wavelet columns are
    /// included only when `with_wavelet` is set.
    pub fn schema(with_wavelet: bool) -> Vec<FeatureId> {
        let mut ids = Vec::with_capacity(72);
        for &p in &Parameter::ALL {
            ids.push(FeatureId::Raw(p));
        }
        for &w in &MA_WINDOWS_M {
            for &p in &Parameter::ALL {
                ids.push(FeatureId::MovingAverage(p, w));
            }
        }
        for &p in &Parameter::ALL {
            for &lag in &GRADIENT_LAGS_M {
                ids.push(FeatureId::Gradient(p, lag));
            }
            for &lag in &GRADIENT_LAGS_M {
                ids.push(FeatureId::PctChange(p, lag));
            }
        }
        for &w in &STAT_WINDOWS_M {
            for &p in &Parameter::ALL {
                ids.push(FeatureId::MovingStd(p, w));
                ids.push(FeatureId::CoefVariation(p, w));
            }
        }
        ids.push(FeatureId::DynamicPressure);
        ids.push(FeatureId::ThermalSpeed);
        ids.push(FeatureId::VelocityRatio);
        for &w in &CORR_WINDOWS_M {
            for &pair in &CorrPair::ALL {
                ids.push(FeatureId::Correlation(pair, w));
            }
        }
        if with_wavelet {
            for &p in &WAVELET_PARAMETERS {
                for level in 1..=WAVELET_DETAIL_LEVELS {
                    ids.push(FeatureId::WaveletDetail(p, level));
                }
            }
        }
        ids.push(FeatureId::VelocityEnhancement);
        ids.push(FeatureId::DensityEnhancement);
        ids.push(FeatureId::AnomalyScore);
        ids
    }
}
