// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

/// Pipeline error taxonomy.
///
/// `DataUnavailable`, `InvalidConfig`, and `InvalidInput` abort a run;
/// `MissingModel` is fatal only to the model-based policy; insufficient
/// history and degenerate metrics are recovered locally by the stages
/// that encounter them and normally never surface as this type.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HaloError {
    #[error("data unavailable: {0}")]
    DataUnavailable(String),
    #[error("insufficient history: {0}")]
    InsufficientHistory(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("missing model: {0}")]
    MissingModel(String),
    #[error("numerical issue: {0}")]
    NumericalIssue(String),
}

impl HaloError {
    pub fn data_unavailable(message: impl Into<String>) -> Self {
        Self::DataUnavailable(message.into())
    }

    pub fn insufficient_history(message: impl Into<String>) -> Self {
        Self::InsufficientHistory(message.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn missing_model(message: impl Into<String>) -> Self {
        Self::MissingModel(message.into())
    }

    pub fn numerical_issue(message: impl Into<String>) -> Self {
        Self::NumericalIssue(message.into())
    }
}
