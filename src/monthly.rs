//! Trailing-12-month breakdown.
//!
//! Factor R is defined over the last twelve months of revenue and
//! payroll.  These helpers lay out the month grid for data entry and
//! fold monthly figures into the annual totals, plus a per-month
//! series for charting.

use crate::error::{EngineError, InputIssue, Result};
use crate::factor::{classify, compute_factor_r, FactorBand};
use crate::format::round2;
use crate::models::Period;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const TRAILING_MONTHS: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyEntry {
    /// Month the figures belong to.
    pub period: Period,
    /// Gross revenue for the month.
    pub revenue: f64,
    /// Payroll cost for the month, pró-labore included.
    pub payroll: f64,
    /// Headcount at the end of the month, when known.
    #[serde(default)]
    pub employees: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPoint {
    /// Month of the point.
    pub period: Period,
    /// Payroll over revenue for that month alone, in percent.
    pub factor_r: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrailingSummary {
    /// Oldest month in the window.
    pub first: Period,
    /// Latest month in the window.
    pub last: Period,
    /// Distinct months counted, at most twelve.
    pub months: usize,
    /// Revenue summed over the window.
    pub revenue: f64,
    /// Payroll summed over the window.
    pub payroll: f64,
    /// Factor R over the window totals.
    pub factor_r: f64,
    /// Band of `factor_r`.
    pub band: FactorBand,
    /// Mean headcount over the months that reported one.
    pub average_employees: Option<f64>,
    /// Months with zero revenue are left out.
    pub series: Vec<MonthlyPoint>,
}

/// The twelve months ending at `end`, oldest first.
pub fn trailing_periods(end: Period) -> Vec<Period> {
    let mut periods = Vec::with_capacity(TRAILING_MONTHS);
    let mut current = end;
    for _ in 0..TRAILING_MONTHS {
        periods.push(current);
        current = current.previous();
    }
    periods.reverse();
    periods
}

#[derive(Default)]
struct MonthTotals {
    revenue: f64,
    payroll: f64,
    employees: Option<u32>,
}

/// Fold monthly entries into trailing-12-month totals.
///
/// Entries for the same month are added together; only the latest
/// twelve distinct months count.
pub fn summarize_months(entries: &[MonthlyEntry]) -> Result<TrailingSummary> {
    let mut by_month: BTreeMap<Period, MonthTotals> = BTreeMap::new();
    for entry in entries {
        if !(entry.revenue >= 0.0) || !(entry.payroll >= 0.0) {
            return Err(EngineError::invalid(InputIssue::NegativeAmount));
        }
        let totals = by_month.entry(entry.period).or_default();
        totals.revenue += entry.revenue;
        totals.payroll += entry.payroll;
        if let Some(n) = entry.employees {
            totals.employees = Some(totals.employees.unwrap_or(0).saturating_add(n));
        }
    }

    let window: Vec<(&Period, &MonthTotals)> = by_month.iter().rev().take(TRAILING_MONTHS).rev().collect();
    let (first, last) = match (window.first(), window.last()) {
        (Some((first, _)), Some((last, _))) => (**first, **last),
        _ => return Err(EngineError::invalid(InputIssue::NonPositiveRevenue)),
    };

    let revenue = round2(window.iter().map(|(_, t)| t.revenue).sum());
    let payroll = round2(window.iter().map(|(_, t)| t.payroll).sum());
    let factor_r = compute_factor_r(revenue, payroll)?;

    let headcounts: Vec<u32> = window.iter().filter_map(|(_, t)| t.employees).collect();
    let average_employees = if headcounts.is_empty() {
        None
    } else {
        Some(round2(
            headcounts.iter().map(|n| f64::from(*n)).sum::<f64>() / headcounts.len() as f64,
        ))
    };

    let series = window
        .iter()
        .filter(|(_, t)| t.revenue > 0.0)
        .map(|(period, t)| MonthlyPoint {
            period: **period,
            factor_r: round2(t.payroll / t.revenue * 100.0),
        })
        .collect();

    Ok(TrailingSummary {
        first,
        last,
        months: window.len(),
        revenue,
        payroll,
        factor_r,
        band: classify(factor_r),
        average_employees,
        series,
    })
}
