//! Recommendations built on top of a Factor R result.
//!
//! Factor R only decides between Anexo III and Anexo V for service
//! businesses; commerce and industry have fixed annexes.  The analysis
//! bundles the placement, a savings outlook and a list of structured
//! recommendations that the UI turns into text.

use crate::error::Result;
use crate::factor::{classify, required_payroll_for_threshold, threshold_progress, FactorBand, FACTOR_R_THRESHOLD};
use crate::models::Activity;
use crate::tax::{estimated_annual_savings, Annex, RateEstimator};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum SavingsOutlook {
    /// Annual tax saved by reaching Anexo III.
    Potential(f64),
    AlreadyOptimal,
    /// Factor R does not drive the annex for this activity.
    NotApplicable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    RaisePayroll { amount: f64 },
    IncreaseProLabore,
    StrategicHiring,
    RecordAllBenefits,
    MonitorMonthly,
    ControlPayroll,
    PlanRaises,
    ConsiderSeasonality,
    KeepMonitoring,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub band: FactorBand,
    /// `None` when the activity has no specific annex.
    pub annex: Option<Annex>,
    /// Progress toward the threshold, 0–100.
    pub progress: f64,
    pub savings: SavingsOutlook,
    pub recommendations: Vec<Recommendation>,
}

/// The annex a company with `activity` lands in at `factor_r`.
pub fn placement(activity: Activity, factor_r: f64) -> Option<Annex> {
    match activity {
        Activity::Services => Some(classify(factor_r).annex()),
        Activity::Commerce => Some(Annex::I),
        Activity::Industry => Some(Annex::II),
        Activity::Other => None,
    }
}

pub fn analyze(
    factor_r: f64,
    revenue: f64,
    payroll: f64,
    activity: Activity,
    estimator: &dyn RateEstimator,
) -> Result<Analysis> {
    let services = activity == Activity::Services;
    let below = factor_r < FACTOR_R_THRESHOLD;

    let savings = match (services, below) {
        (true, true) => SavingsOutlook::Potential(estimated_annual_savings(
            revenue,
            Annex::V,
            Annex::III,
            estimator,
        )?),
        (true, false) => SavingsOutlook::AlreadyOptimal,
        (false, _) => SavingsOutlook::NotApplicable,
    };

    let recommendations = if services && below {
        let mut recs = Vec::with_capacity(4);
        let needed = required_payroll_for_threshold(revenue, payroll);
        if needed > 0.0 {
            recs.push(Recommendation::RaisePayroll { amount: needed });
        }
        recs.extend([
            Recommendation::IncreaseProLabore,
            Recommendation::StrategicHiring,
            Recommendation::RecordAllBenefits,
        ]);
        recs
    } else if !below {
        vec![
            Recommendation::MonitorMonthly,
            Recommendation::ControlPayroll,
            Recommendation::PlanRaises,
            Recommendation::ConsiderSeasonality,
        ]
    } else {
        vec![Recommendation::KeepMonitoring]
    };

    Ok(Analysis {
        band: classify(factor_r),
        annex: placement(activity, factor_r),
        progress: threshold_progress(factor_r),
        savings,
        recommendations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tax::FlatAverageEstimator;

    #[test]
    fn test_services_below_threshold() {
        let estimator = FlatAverageEstimator::standard();
        let analysis = analyze(20.0, 500_000.0, 100_000.0, Activity::Services, &estimator).unwrap();
        assert_eq!(analysis.band, FactorBand::NearThreshold);
        assert_eq!(analysis.annex, Some(Annex::V));
        assert_eq!(analysis.savings, SavingsOutlook::Potential(30_000.0));
        assert_eq!(
            analysis.recommendations,
            vec![
                Recommendation::RaisePayroll { amount: 40_000.0 },
                Recommendation::IncreaseProLabore,
                Recommendation::StrategicHiring,
                Recommendation::RecordAllBenefits,
            ]
        );
    }

    #[test]
    fn test_services_at_threshold() {
        let estimator = FlatAverageEstimator::standard();
        let analysis = analyze(30.0, 500_000.0, 150_000.0, Activity::Services, &estimator).unwrap();
        assert_eq!(analysis.annex, Some(Annex::III));
        assert_eq!(analysis.progress, 100.0);
        assert_eq!(analysis.savings, SavingsOutlook::AlreadyOptimal);
        assert_eq!(analysis.recommendations[0], Recommendation::MonitorMonthly);
        assert_eq!(analysis.recommendations.len(), 4);
    }

    #[test]
    fn test_commerce_is_not_driven_by_factor_r() {
        let estimator = FlatAverageEstimator::standard();
        let analysis = analyze(10.0, 500_000.0, 50_000.0, Activity::Commerce, &estimator).unwrap();
        assert_eq!(analysis.annex, Some(Annex::I));
        assert_eq!(analysis.savings, SavingsOutlook::NotApplicable);
        assert_eq!(analysis.recommendations, vec![Recommendation::KeepMonitoring]);
    }

    #[test]
    fn test_placement() {
        assert_eq!(placement(Activity::Industry, 5.0), Some(Annex::II));
        assert_eq!(placement(Activity::Other, 50.0), None);
        assert_eq!(placement(Activity::Services, 28.0), Some(Annex::III));
    }
}
