//! Linear growth simulation.
//!
//! Projects revenue and payroll forward by percentage growth plus new
//! hires, then reclassifies the projected Factor R.  New hires carry
//! the mandatory 13th salary; [`SalaryBasis`] fixes whether the
//! per-hire salary is read as an annual or a monthly figure.

use crate::error::{EngineError, InputIssue, Result};
use crate::factor::{classify, compute_factor_r, required_payroll_for_threshold, FactorBand};
use crate::format::round2;
use crate::tax::Annex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Unit of the per-hire salary supplied to [`simulate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalaryBasis {
    /// Salary is a yearly figure; the 13th salary adds one twelfth.
    #[default]
    Annual,
    /// Salary is a monthly figure paid 13 times a year.
    Monthly,
}

impl SalaryBasis {
    /// Yearly payroll added by `hires` people at `salary` each.
    pub fn additional_payroll(self, hires: u32, salary: f64) -> f64 {
        let per_hire = match self {
            SalaryBasis::Annual => salary * 13.0 / 12.0,
            SalaryBasis::Monthly => salary * 13.0,
        };
        f64::from(hires) * per_hire
    }
}

impl FromStr for SalaryBasis {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "annual" | "anual" => Ok(SalaryBasis::Annual),
            "monthly" | "mensal" => Ok(SalaryBasis::Monthly),
            other => Err(format!("unknown salary basis '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationInput {
    /// Trailing-12-month gross revenue today.
    pub current_revenue: f64,
    /// Trailing-12-month payroll today.
    pub current_payroll: f64,
    /// Expected revenue growth, in percent.
    #[serde(default)]
    pub revenue_growth_pct: f64,
    /// Expected growth of the existing payroll, in percent.
    #[serde(default)]
    pub payroll_growth_pct: f64,
    /// People hired over the projection.
    #[serde(default)]
    pub new_hires: u32,
    /// Salary of each new hire, in the unit given by `salary_basis`.
    #[serde(default)]
    pub avg_salary_per_hire: f64,
    /// Defaults to [`SalaryBasis::Annual`].
    #[serde(default)]
    pub salary_basis: Option<SalaryBasis>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    /// Factor R of the baseline.
    pub current_factor_r: f64,
    /// Revenue after growth.
    pub projected_revenue: f64,
    /// Yearly payroll added by the new hires, 13th salary included.
    pub additional_payroll: f64,
    /// Grown payroll plus the new hires.
    pub projected_payroll: f64,
    /// Factor R of the projection.
    pub projected_factor_r: f64,
    /// Band of the projected Factor R.
    pub projected_band: FactorBand,
    /// Annex a service business would land in after the projection.
    pub projected_annex: Annex,
    /// Projected minus current Factor R, in percentage points.
    pub factor_delta: f64,
    /// Payroll still missing at the projected revenue; zero when the
    /// projection reaches the threshold.
    pub payroll_needed: f64,
    /// Unit the per-hire salary was read in.
    pub salary_basis: SalaryBasis,
}

/// Project revenue and payroll and reclassify.
///
/// Requires a positive current revenue and payroll; the baseline may
/// carry payroll above revenue.  The projected Factor R goes through
/// [`compute_factor_r`], so a projection with non-positive revenue or
/// payroll above revenue fails the same way.
pub fn simulate(input: &SimulationInput) -> Result<SimulationResult> {
    if !(input.current_revenue > 0.0) || !(input.current_payroll > 0.0) {
        return Err(EngineError::invalid(InputIssue::NonPositiveBaseline));
    }
    if !(input.avg_salary_per_hire >= 0.0) {
        return Err(EngineError::invalid(InputIssue::NegativeAmount));
    }
    let basis = input.salary_basis.unwrap_or_default();
    let current_factor_r = round2(input.current_payroll / input.current_revenue * 100.0);

    let projected_revenue = round2(input.current_revenue * (1.0 + input.revenue_growth_pct / 100.0));
    let additional_payroll = round2(basis.additional_payroll(input.new_hires, input.avg_salary_per_hire));
    let projected_payroll = round2(
        input.current_payroll * (1.0 + input.payroll_growth_pct / 100.0) + additional_payroll,
    );
    let projected_factor_r = compute_factor_r(projected_revenue, projected_payroll)?;
    let projected_band = classify(projected_factor_r);

    debug!(
        current_factor_r,
        projected_factor_r,
        ?basis,
        "simulated factor R projection"
    );

    Ok(SimulationResult {
        current_factor_r,
        projected_revenue,
        additional_payroll,
        projected_payroll,
        projected_factor_r,
        projected_band,
        projected_annex: projected_band.annex(),
        factor_delta: round2(projected_factor_r - current_factor_r),
        payroll_needed: required_payroll_for_threshold(projected_revenue, projected_payroll),
        salary_basis: basis,
    })
}
