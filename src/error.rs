//! Error taxonomy for the Fator R engine.
//!
//! Every failure the engine can signal is locally recoverable.  User
//! input problems ([`EngineError::InvalidInput`] and
//! [`EngineError::MalformedIdentifier`]) are kept apart from
//! configuration defects ([`EngineError::OutOfRange`]) so callers can
//! choose their own wording and reporting channel.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid input: {}", join_issues(.0))]
    InvalidInput(Vec<InputIssue>),

    #[error("malformed CNPJ: {0}")]
    MalformedIdentifier(CnpjIssue),

    #[error("tax table configuration error: {0}")]
    OutOfRange(String),
}

impl EngineError {
    pub fn invalid(issue: InputIssue) -> Self {
        EngineError::InvalidInput(vec![issue])
    }

    /// Short machine-readable tag, used by the HTTP layer.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidInput(_) => "invalid_input",
            EngineError::MalformedIdentifier(_) => "malformed_identifier",
            EngineError::OutOfRange(_) => "out_of_range",
        }
    }

    /// True when the error stems from user-supplied values rather
    /// than from the engine's own reference data.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, EngineError::OutOfRange(_))
    }
}

/// A single revenue/payroll domain violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputIssue {
    NonPositiveRevenue,
    NegativePayroll,
    NonPositivePayroll,
    PayrollExceedsRevenue,
    RevenueAboveLimit,
    /// Simulations need a real revenue and payroll to project from.
    NonPositiveBaseline,
    NegativeAmount,
    MissingRequiredField,
}

impl fmt::Display for InputIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            InputIssue::NonPositiveRevenue => "revenue must be greater than zero",
            InputIssue::NegativePayroll => "payroll cannot be negative",
            InputIssue::NonPositivePayroll => "payroll must be greater than zero",
            InputIssue::PayrollExceedsRevenue => "payroll cannot exceed revenue",
            InputIssue::RevenueAboveLimit => "revenue above the allowed limit (R$ 1 billion)",
            InputIssue::NonPositiveBaseline => "current revenue and payroll are required",
            InputIssue::NegativeAmount => "amounts cannot be negative",
            InputIssue::MissingRequiredField => "a required field is empty",
        };
        f.write_str(msg)
    }
}

/// Why a CNPJ was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "digits", rename_all = "snake_case")]
pub enum CnpjIssue {
    WrongLength(usize),
    RepeatedDigits,
    ChecksumMismatch,
}

impl fmt::Display for CnpjIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CnpjIssue::WrongLength(n) => write!(f, "expected 14 digits, found {}", n),
            CnpjIssue::RepeatedDigits => f.write_str("all digits are the same"),
            CnpjIssue::ChecksumMismatch => f.write_str("check digits do not match"),
        }
    }
}

fn join_issues(issues: &[InputIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
