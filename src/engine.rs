//! Calculator form evaluation.
//!
//! The `engine` module turns a raw [`CalculationRequest`] into a
//! [`CalculationOutcome`]: currency text is parsed, the figures are
//! validated, the optional CNPJ is checked, and the resulting
//! [`Calculation`] is classified and analysed.  Batches are evaluated
//! in parallel with [`rayon`]; every request is independent.

use crate::analysis::{analyze, Analysis};
use crate::error::{CnpjIssue, EngineError, Result};
use crate::factor::{validate_financial_data, FactorBand};
use crate::format::{check_cnpj, format_cnpj, parse_currency};
use crate::models::{Calculation, CalculationRequest};
use crate::tax::RateEstimator;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationOutcome {
    pub calculation: Calculation,
    pub factor_r: f64,
    pub band: FactorBand,
    pub analysis: Analysis,
    /// Set when a CNPJ was supplied but failed validation.  This does
    /// not block the calculation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnpj_warning: Option<CnpjIssue>,
}

/// Evaluate one calculator form submission.
///
/// Fails with [`EngineError::InvalidInput`] listing every problem with
/// the revenue and payroll figures.  A bad CNPJ is only reported in
/// [`CalculationOutcome::cnpj_warning`].
pub fn evaluate(
    request: &CalculationRequest,
    now: DateTime<Utc>,
    estimator: &dyn RateEstimator,
) -> Result<CalculationOutcome> {
    let revenue = parse_currency(&request.revenue);
    let payroll = parse_currency(&request.payroll);

    let issues = validate_financial_data(revenue, payroll);
    if !issues.is_empty() {
        return Err(EngineError::InvalidInput(issues));
    }

    let mut calculation = Calculation::new(revenue, payroll, request.activity, now)?;
    let mut cnpj_warning = None;
    if let Some(raw) = request.cnpj.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        match check_cnpj(raw) {
            Ok(digits) => calculation = calculation.with_cnpj(format_cnpj(&digits)),
            Err(EngineError::MalformedIdentifier(issue)) => {
                warn!(cnpj = raw, %issue, "calculation submitted with an invalid CNPJ");
                cnpj_warning = Some(issue);
                calculation = calculation.with_cnpj(raw);
            }
            Err(other) => return Err(other),
        }
    }
    if let Some(employees) = request.employees {
        calculation = calculation.with_employees(employees);
    }
    if let Some(period) = request.period {
        calculation = calculation.with_period(period);
    }

    let factor_r = calculation.factor_r();
    let analysis = analyze(factor_r, revenue, payroll, request.activity, estimator)?;
    debug!(factor_r, band = ?analysis.band, activity = request.activity.key(), "evaluated calculation");

    Ok(CalculationOutcome {
        band: calculation.band(),
        factor_r,
        calculation,
        analysis,
        cnpj_warning,
    })
}

/// Evaluate many requests in parallel.  Results keep the order of
/// `requests`.
pub fn evaluate_batch(
    requests: &[CalculationRequest],
    now: DateTime<Utc>,
    estimator: &dyn RateEstimator,
) -> Vec<Result<CalculationOutcome>> {
    requests
        .par_iter()
        .map(|request| evaluate(request, now, estimator))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::SavingsOutlook;
    use crate::error::InputIssue;
    use crate::models::{Activity, Period};
    use crate::tax::FlatAverageEstimator;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap()
    }

    fn request(revenue: &str, payroll: &str) -> CalculationRequest {
        CalculationRequest {
            revenue: revenue.into(),
            payroll: payroll.into(),
            activity: Activity::Services,
            ..CalculationRequest::default()
        }
    }

    #[test]
    fn test_evaluate_form() {
        let req = CalculationRequest {
            cnpj: Some("11222333000181".into()),
            employees: Some(8),
            period: Some(Period::new(2024, 5).unwrap()),
            ..request("R$ 500.000,00", "150.000,00")
        };
        let outcome = evaluate(&req, now(), &FlatAverageEstimator::standard()).unwrap();
        assert_eq!(outcome.factor_r, 30.0);
        assert_eq!(outcome.band, FactorBand::AtOrAboveThreshold);
        assert_eq!(outcome.calculation.cnpj(), Some("11.222.333/0001-81"));
        assert_eq!(outcome.calculation.employees(), Some(8));
        assert_eq!(outcome.calculation.timestamp(), now());
        assert_eq!(outcome.analysis.savings, SavingsOutlook::AlreadyOptimal);
        assert_eq!(outcome.cnpj_warning, None);
    }

    #[test]
    fn test_invalid_cnpj_is_a_warning() {
        let req = CalculationRequest {
            cnpj: Some("11.222.333/0001-80".into()),
            ..request("100.000,00", "10.000,00")
        };
        let outcome = evaluate(&req, now(), &FlatAverageEstimator::standard()).unwrap();
        assert_eq!(outcome.cnpj_warning, Some(CnpjIssue::ChecksumMismatch));
        assert_eq!(outcome.calculation.cnpj(), Some("11.222.333/0001-80"));
        assert_eq!(outcome.analysis.savings, SavingsOutlook::Potential(6_000.0));
    }

    #[test]
    fn test_blank_form_lists_every_issue() {
        let err = evaluate(&request("", ""), now(), &FlatAverageEstimator::standard()).unwrap_err();
        assert_eq!(
            err,
            EngineError::InvalidInput(vec![
                InputIssue::NonPositiveRevenue,
                InputIssue::NonPositivePayroll
            ])
        );
    }

    #[test]
    fn test_payroll_above_revenue_is_rejected() {
        let err = evaluate(&request("100,00", "150,00"), now(), &FlatAverageEstimator::standard()).unwrap_err();
        assert_eq!(err, EngineError::invalid(InputIssue::PayrollExceedsRevenue));
    }

    #[test]
    fn test_evaluate_batch_keeps_order() {
        let requests = vec![
            request("500.000,00", "150.000,00"),
            request("0,00", "1,00"),
            request("400.000,00", "50.000,00"),
        ];
        let results = evaluate_batch(&requests, now(), &FlatAverageEstimator::standard());
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_ref().unwrap().factor_r, 30.0);
        assert!(results[1].is_err());
        assert_eq!(results[2].as_ref().unwrap().factor_r, 12.5);
    }

    #[test]
    fn test_evaluate_is_repeatable() {
        let req = request("1.234.567,89", "345.678,91");
        let estimator = FlatAverageEstimator::standard();
        let a = evaluate(&req, now(), &estimator).unwrap();
        let b = evaluate(&req, now(), &estimator).unwrap();
        assert_eq!(a, b);
    }
}
