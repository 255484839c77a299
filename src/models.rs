//! Data models for the Fator R engine.
//!
//! The `models` module defines the serialisable records that cross
//! the engine boundary: completed calculations, registered companies,
//! raw form requests and calendar-month periods.  They derive
//! `Serialize` and `Deserialize` so the persistence and reporting
//! collaborators can store them as JSON; field names are camelCase on
//! the wire.

use crate::error::{EngineError, InputIssue, Result};
use crate::factor::{classify, compute_factor_r, FactorBand};
use crate::format::{check_cnpj, format_cnpj};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared business activity.  Portuguese form values are accepted
/// as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    #[serde(alias = "comercio")]
    Commerce,
    #[serde(alias = "industria")]
    Industry,
    #[default]
    #[serde(alias = "servicos")]
    Services,
    #[serde(alias = "outro", alias = "outros")]
    Other,
}

impl Activity {
    pub fn key(self) -> &'static str {
        match self {
            Activity::Commerce => "commerce",
            Activity::Industry => "industry",
            Activity::Services => "services",
            Activity::Other => "other",
        }
    }
}

/// A calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|_| Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
            .map(Self::from_date)
            .map_err(|e| format!("invalid period '{}': {}", s, e))
    }
}

impl TryFrom<String> for Period {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

/// One completed Factor R computation.
///
/// Factor R is never stored on its own: it is derived from `revenue`
/// and `payroll` on every access, and a deserialised record has it
/// recomputed from those two fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "CalculationRecord", try_from = "CalculationRecord")]
pub struct Calculation {
    revenue: f64,
    payroll: f64,
    cnpj: Option<String>,
    activity: Activity,
    employees: Option<u32>,
    period: Option<Period>,
    timestamp: DateTime<Utc>,
}

impl Calculation {
    /// Fails with [`EngineError::InvalidInput`] under the same rules
    /// as [`compute_factor_r`].
    pub fn new(revenue: f64, payroll: f64, activity: Activity, timestamp: DateTime<Utc>) -> Result<Self> {
        compute_factor_r(revenue, payroll)?;
        Ok(Self {
            revenue,
            payroll,
            cnpj: None,
            activity,
            employees: None,
            period: None,
            timestamp,
        })
    }

    pub fn with_cnpj(mut self, cnpj: impl Into<String>) -> Self {
        self.cnpj = Some(cnpj.into());
        self
    }

    pub fn with_employees(mut self, employees: u32) -> Self {
        self.employees = Some(employees);
        self
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = Some(period);
        self
    }

    pub fn revenue(&self) -> f64 {
        self.revenue
    }

    pub fn payroll(&self) -> f64 {
        self.payroll
    }

    pub fn factor_r(&self) -> f64 {
        // Inputs were validated on construction.
        compute_factor_r(self.revenue, self.payroll).unwrap_or(0.0)
    }

    pub fn band(&self) -> FactorBand {
        classify(self.factor_r())
    }

    pub fn cnpj(&self) -> Option<&str> {
        self.cnpj.as_deref()
    }

    pub fn activity(&self) -> Activity {
        self.activity
    }

    pub fn employees(&self) -> Option<u32> {
        self.employees
    }

    pub fn period(&self) -> Option<Period> {
        self.period
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Wire form of [`Calculation`].  `factorR` is written for readers of
/// the stored JSON and ignored when reading it back.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationRecord {
    revenue: f64,
    payroll: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    factor_r: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cnpj: Option<String>,
    activity: Activity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    employees: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    period: Option<Period>,
    #[serde(alias = "date")]
    timestamp: DateTime<Utc>,
}

impl From<Calculation> for CalculationRecord {
    fn from(calc: Calculation) -> Self {
        let factor_r = Some(calc.factor_r());
        Self {
            revenue: calc.revenue,
            payroll: calc.payroll,
            factor_r,
            cnpj: calc.cnpj,
            activity: calc.activity,
            employees: calc.employees,
            period: calc.period,
            timestamp: calc.timestamp,
        }
    }
}

impl TryFrom<CalculationRecord> for Calculation {
    type Error = EngineError;

    fn try_from(record: CalculationRecord) -> Result<Self> {
        let mut calc = Calculation::new(record.revenue, record.payroll, record.activity, record.timestamp)?;
        calc.cnpj = record.cnpj;
        calc.employees = record.employees;
        calc.period = record.period;
        Ok(calc)
    }
}

/// A registered company.  The engine builds and classifies these but
/// never stores or updates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    /// Masked CNPJ, unique per company.
    pub cnpj: String,
    pub name: String,
    pub activity: Activity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Last known Factor R; zero until a calculation is recorded.
    #[serde(default)]
    pub factor_r: f64,
    pub created_at: DateTime<Utc>,
}

impl Company {
    /// Register a company.  CNPJ and name are required and the CNPJ
    /// must pass the checksum.
    pub fn new(
        cnpj: &str,
        name: &str,
        activity: Activity,
        email: Option<&str>,
        phone: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> Result<Self> {
        if cnpj.trim().is_empty() || name.trim().is_empty() {
            return Err(EngineError::invalid(InputIssue::MissingRequiredField));
        }
        let digits = check_cnpj(cnpj)?;
        let non_empty = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Ok(Self {
            cnpj: format_cnpj(&digits),
            name: name.trim().to_string(),
            activity,
            email: non_empty(email),
            phone: non_empty(phone),
            factor_r: 0.0,
            created_at,
        })
    }
}

/// Raw values as typed into the calculator form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationRequest {
    /// Currency text, e.g. `"R$ 500.000,00"`.
    pub revenue: String,
    pub payroll: String,
    #[serde(default)]
    pub cnpj: Option<String>,
    #[serde(default)]
    pub activity: Activity,
    #[serde(default)]
    pub employees: Option<u32>,
    #[serde(default)]
    pub period: Option<Period>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CnpjIssue;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_period_parse_and_display() {
        let period: Period = "2024-03".parse().unwrap();
        assert_eq!(period, Period::new(2024, 3).unwrap());
        assert_eq!(period.to_string(), "2024-03");
        assert_eq!(Period::new(2024, 1).unwrap().previous(), Period::new(2023, 12).unwrap());
        assert!("2024-13".parse::<Period>().is_err());
        assert!(Period::new(2024, 0).is_none());
    }

    #[test]
    fn test_calculation_derives_factor_r() {
        let calc = Calculation::new(500_000.0, 150_000.0, Activity::Services, at())
            .unwrap()
            .with_employees(12);
        assert_eq!(calc.factor_r(), 30.0);
        assert_eq!(calc.band(), FactorBand::AtOrAboveThreshold);
        assert_eq!(calc.employees(), Some(12));
    }

    #[test]
    fn test_calculation_rejects_zero_revenue() {
        assert!(matches!(
            Calculation::new(0.0, 10.0, Activity::Services, at()),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_calculation_serializes_factor_r() {
        let calc = Calculation::new(500_000.0, 150_000.0, Activity::Services, at())
            .unwrap()
            .with_period(Period::new(2024, 2).unwrap());
        let json = serde_json::to_value(&calc).unwrap();
        assert_eq!(json["factorR"], 30.0);
        assert_eq!(json["period"], "2024-02");
        assert_eq!(json["activity"], "services");
    }

    #[test]
    fn test_stored_factor_r_is_recomputed() {
        let json = r#"{
            "revenue": 200000.0,
            "payroll": 20000.0,
            "factorR": 99.0,
            "activity": "servicos",
            "date": "2024-03-15T12:00:00Z"
        }"#;
        let calc: Calculation = serde_json::from_str(json).unwrap();
        assert_eq!(calc.factor_r(), 10.0);
        assert_eq!(calc.activity(), Activity::Services);
        assert_eq!(calc.timestamp(), at());
    }

    #[test]
    fn test_stored_record_with_bad_amounts_is_rejected() {
        let json = r#"{"revenue":0,"payroll":10,"activity":"other","timestamp":"2024-03-15T12:00:00Z"}"#;
        assert!(serde_json::from_str::<Calculation>(json).is_err());
    }

    #[test]
    fn test_company_new() {
        let company = Company::new(
            "11222333000181",
            "  Acme Serviços Ltda ",
            Activity::Services,
            Some("contato@acme.com.br"),
            Some(""),
            at(),
        )
        .unwrap();
        assert_eq!(company.cnpj, "11.222.333/0001-81");
        assert_eq!(company.name, "Acme Serviços Ltda");
        assert_eq!(company.phone, None);
        assert_eq!(company.factor_r, 0.0);
    }

    #[test]
    fn test_company_requires_valid_cnpj() {
        assert_eq!(
            Company::new("11.222.333/0001-80", "Acme", Activity::Commerce, None, None, at()),
            Err(EngineError::MalformedIdentifier(CnpjIssue::ChecksumMismatch))
        );
        assert_eq!(
            Company::new("11.222.333/0001-81", " ", Activity::Commerce, None, None, at()),
            Err(EngineError::invalid(InputIssue::MissingRequiredField))
        );
    }
}
