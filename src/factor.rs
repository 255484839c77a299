//! Factor R computation and classification.
//!
//! Factor R is trailing-12-month payroll divided by trailing-12-month
//! gross revenue, expressed as a percentage.  Service companies whose
//! factor reaches [`FACTOR_R_THRESHOLD`] are taxed under Anexo III
//! instead of Anexo V.

use crate::error::{EngineError, InputIssue, Result};
use crate::format::round2;
use crate::tax::Annex;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Factor R (percent) at which Anexo III becomes available.
pub const FACTOR_R_THRESHOLD: f64 = 28.0;
/// Lower bound (percent) of the "approaching eligibility" band.
pub const NEAR_THRESHOLD: f64 = 20.0;
/// Largest revenue accepted by the form flow.
pub const REVENUE_LIMIT: f64 = 1_000_000_000.0;

/// Where a Factor R value sits relative to the Anexo III threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorBand {
    /// Below 20%: Anexo V, higher rates.
    BelowThreshold,
    /// 20% up to (not including) 28%.
    NearThreshold,
    /// 28% and above: Anexo III, reduced rates.
    AtOrAboveThreshold,
}

impl FactorBand {
    /// The annex a service business lands in for this band.
    pub fn annex(self) -> Annex {
        match self {
            FactorBand::AtOrAboveThreshold => Annex::III,
            FactorBand::NearThreshold | FactorBand::BelowThreshold => Annex::V,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            FactorBand::AtOrAboveThreshold => "Anexo III - reduced rate",
            FactorBand::NearThreshold => "approaching Anexo III",
            FactorBand::BelowThreshold => "Anexo V - higher rate",
        }
    }
}

/// Compute Factor R as `payroll / revenue * 100`, rounded to two
/// decimal places.
///
/// Fails with [`EngineError::InvalidInput`] when revenue is not
/// positive, payroll is negative, or payroll exceeds revenue.
pub fn compute_factor_r(revenue: f64, payroll: f64) -> Result<f64> {
    let mut issues = Vec::new();
    if !(revenue > 0.0) {
        issues.push(InputIssue::NonPositiveRevenue);
    }
    if !(payroll >= 0.0) {
        issues.push(InputIssue::NegativePayroll);
    }
    if payroll > revenue {
        issues.push(InputIssue::PayrollExceedsRevenue);
    }
    if !issues.is_empty() {
        return Err(EngineError::InvalidInput(issues));
    }
    let factor = round2(payroll / revenue * 100.0);
    trace!(revenue, payroll, factor, "computed factor R");
    Ok(factor)
}

/// Classify a Factor R percentage.  Each band includes its lower
/// bound: 20.00 is near the threshold and 28.00 is at it.
pub fn classify(factor_percent: f64) -> FactorBand {
    if factor_percent >= FACTOR_R_THRESHOLD {
        FactorBand::AtOrAboveThreshold
    } else if factor_percent >= NEAR_THRESHOLD {
        FactorBand::NearThreshold
    } else {
        FactorBand::BelowThreshold
    }
}

/// Additional annual payroll needed to reach the threshold; zero when
/// the company is already there.
pub fn required_payroll_for_threshold(revenue: f64, current_payroll: f64) -> f64 {
    let needed = FACTOR_R_THRESHOLD / 100.0 * revenue - current_payroll;
    round2(needed.max(0.0))
}

/// How far a factor has progressed toward the threshold, as a
/// percentage capped at 100.
pub fn threshold_progress(factor_percent: f64) -> f64 {
    (factor_percent / FACTOR_R_THRESHOLD * 100.0).clamp(0.0, 100.0)
}

/// Collect every problem with a revenue/payroll pair entered on a form.
///
/// Stricter than [`compute_factor_r`]: payroll must be positive and
/// revenue must stay under [`REVENUE_LIMIT`].
pub fn validate_financial_data(revenue: f64, payroll: f64) -> Vec<InputIssue> {
    let mut issues = Vec::new();
    if !(revenue > 0.0) {
        issues.push(InputIssue::NonPositiveRevenue);
    }
    if !(payroll > 0.0) {
        issues.push(InputIssue::NonPositivePayroll);
    }
    if payroll > revenue {
        issues.push(InputIssue::PayrollExceedsRevenue);
    }
    if revenue > REVENUE_LIMIT {
        issues.push(InputIssue::RevenueAboveLimit);
    }
    issues
}
