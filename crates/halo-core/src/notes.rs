// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Free-form notes and warnings carried alongside a pipeline artifact.
///
/// Notes record decisions that changed the output (columns omitted,
/// policies degraded); warnings record conditions an operator should
/// look at. Neither affects computation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunNotes {
    pub notes: Vec<String>,
    pub warnings: Vec<String>,
}

impl RunNotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.notes.push(message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty() && self.warnings.is_empty()
    }
}
