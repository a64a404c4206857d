// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use halo_core::{HaloError, RunNotes};

use crate::ids::FeatureId;

/// One named column of the feature matrix.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureColumn {
    id: FeatureId,
    values: Vec<f64>,
}

impl FeatureColumn {
    pub fn id(&self) -> FeatureId {
        self.id
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// Immutable multi-scale feature matrix, row-aligned with the series it
/// was extracted from.
///
/// Columns follow the canonical [`FeatureId::schema`] order. Lookups go
/// through [`FeatureMatrix::column`]; an absent column (the wavelet set
/// on short series) is `None`, never a column of NaN.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureMatrix {
    t0_s: i64,
    cadence_s: i64,
    n: usize,
    columns: Vec<FeatureColumn>,
    notes: RunNotes,
}

impl FeatureMatrix {
    pub(crate) fn new(
        t0_s: i64,
        cadence_s: i64,
        columns: Vec<(FeatureId, Vec<f64>)>,
        notes: RunNotes,
    ) -> Result<Self, HaloError> {
        let Some(n) = columns.first().map(|(_, values)| values.len()) else {
            return Err(HaloError::invalid_input("feature matrix needs columns"));
        };
        for (id, values) in &columns {
            if values.len() != n {
                return Err(HaloError::invalid_input(format!(
                    "feature column {} has {} rows, expected {n}",
                    id.name(),
                    values.len()
                )));
            }
        }
        let columns = columns
            .into_iter()
            .map(|(id, values)| FeatureColumn { id, values })
            .collect();
        Ok(Self {
            t0_s,
            cadence_s,
            n,
            columns,
            notes,
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

    /// All columns in canonical order.
    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    /// Column identities in canonical order.
    pub fn ids(&self) -> impl Iterator<Item = FeatureId> + '_ {
        self.columns.iter().map(|column| column.id)
    }

    /// Values of column `id`, or `None` when the matrix does not carry
    /// it.
    pub fn column(&self, id: FeatureId) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|column| column.id == id)
            .map(|column| column.values.as_slice())
    }

    pub fn has_column(&self, id: FeatureId) -> bool {
        self.columns.iter().any(|column| column.id == id)
    }

    /// Notes accumulated during extraction (omitted columns, fill
    /// counts).
    pub fn notes(&self) -> &RunNotes {
        &self.notes
    }
}
