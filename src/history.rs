//! Read-only helpers over a caller-owned calculation history.

use crate::models::Calculation;
use chrono::{DateTime, Utc};

const MIN_QUERY_LEN: usize = 2;

/// Calculations whose CNPJ, activity or Factor R text contains
/// `query`, case-insensitively.  Queries shorter than two characters
/// match nothing.
pub fn search_calculations<'a>(calculations: &'a [Calculation], query: &str) -> Vec<&'a Calculation> {
    let needle = query.trim().to_lowercase();
    if needle.chars().count() < MIN_QUERY_LEN {
        return Vec::new();
    }
    calculations
        .iter()
        .filter(|calc| {
            calc.cnpj().map_or(false, |c| c.to_lowercase().contains(&needle))
                || calc.activity().key().contains(&needle)
                || calc.factor_r().to_string().contains(&needle)
        })
        .collect()
}

/// `(timestamp, factorR)` pairs in chronological order.
pub fn factor_series(calculations: &[Calculation]) -> Vec<(DateTime<Utc>, f64)> {
    let mut series: Vec<_> = calculations
        .iter()
        .map(|calc| (calc.timestamp(), calc.factor_r()))
        .collect();
    series.sort_by_key(|(at, _)| *at);
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Activity;
    use chrono::TimeZone;

    fn calc(day: u32, revenue: f64, payroll: f64, activity: Activity, cnpj: Option<&str>) -> Calculation {
        let at = Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap();
        let calc = Calculation::new(revenue, payroll, activity, at).unwrap();
        match cnpj {
            Some(c) => calc.with_cnpj(c),
            None => calc,
        }
    }

    fn history() -> Vec<Calculation> {
        vec![
            calc(3, 500_000.0, 150_000.0, Activity::Services, Some("11.222.333/0001-81")),
            calc(1, 400_000.0, 50_000.0, Activity::Commerce, None),
            calc(2, 100_000.0, 22_500.0, Activity::Industry, None),
        ]
    }

    #[test]
    fn test_search_by_cnpj_activity_and_factor() {
        let calcs = history();
        assert_eq!(search_calculations(&calcs, "11.222").len(), 1);
        assert_eq!(search_calculations(&calcs, "COMMERCE").len(), 1);
        let by_factor = search_calculations(&calcs, "22.5");
        assert_eq!(by_factor.len(), 1);
        assert_eq!(by_factor[0].activity(), Activity::Industry);
    }

    #[test]
    fn test_short_query_matches_nothing() {
        let calcs = history();
        assert!(search_calculations(&calcs, "1").is_empty());
        assert!(search_calculations(&calcs, " ").is_empty());
    }

    #[test]
    fn test_factor_series_is_chronological() {
        let series = factor_series(&history());
        let factors: Vec<f64> = series.iter().map(|(_, f)| *f).collect();
        assert_eq!(factors, vec![12.5, 22.5, 30.0]);
    }
}
