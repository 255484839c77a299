//! Simples Nacional tax tables and rate estimation.
//!
//! The `tax` module holds the progressive bracket tables for Anexos
//! I–V, the bracket lookup used to find a nominal rate and deduction
//! for a trailing-12-month revenue, and the [`RateEstimator`] trait.
//! Estimators turn an annex and a revenue into an effective rate; the
//! savings estimate is the revenue times the difference between two
//! such rates.  Tables can be replaced by JSON files on disk.

use crate::error::{EngineError, InputIssue, Result};
use crate::format::round2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// One of the five Simples Nacional schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Annex {
    I,
    II,
    III,
    IV,
    V,
}

impl Annex {
    pub const ALL: [Annex; 5] = [Annex::I, Annex::II, Annex::III, Annex::IV, Annex::V];

    pub fn as_str(self) -> &'static str {
        match self {
            Annex::I => "I",
            Annex::II => "II",
            Annex::III => "III",
            Annex::IV => "IV",
            Annex::V => "V",
        }
    }
}

impl fmt::Display for Annex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Anexo {}", self.as_str())
    }
}

impl FromStr for Annex {
    type Err = String;

    /// Accepts roman numerals (any case, optionally prefixed by
    /// `anexo`) or the digits 1–5.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let key = lowered
            .strip_prefix("anexo")
            .unwrap_or(&lowered)
            .trim_start_matches(|c: char| c == '-' || c == '_' || c.is_whitespace());
        match key {
            "i" | "1" => Ok(Annex::I),
            "ii" | "2" => Ok(Annex::II),
            "iii" | "3" => Ok(Annex::III),
            "iv" | "4" => Ok(Annex::IV),
            "v" | "5" => Ok(Annex::V),
            _ => Err(format!("unknown annex '{}'", s)),
        }
    }
}

/// A single row of an annex table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBracket {
    /// Upper bound of trailing-12-month revenue for this tier, inclusive.
    pub revenue_ceiling: f64,
    /// Nominal rate as a fraction (0.06 for 6%).
    pub nominal_rate: f64,
    /// Amount subtracted before dividing by revenue, in reais.
    pub deduction: f64,
}

/// The bracket selected for a revenue, with its 1-based tier number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketRate {
    /// Tier number, starting at 1.
    pub tier: usize,
    /// Nominal rate of the tier, as a fraction.
    pub nominal_rate: f64,
    /// Deduction of the tier, in reais.
    pub deduction: f64,
}

/// Ordered bracket table for one annex.  Ceilings are strictly
/// increasing; the table is immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnexTable {
    annex: Annex,
    brackets: Vec<TaxBracket>,
}

impl AnnexTable {
    pub fn new(annex: Annex, brackets: Vec<TaxBracket>) -> Result<Self> {
        for (i, b) in brackets.iter().enumerate() {
            if !(b.revenue_ceiling > 0.0) {
                return Err(EngineError::OutOfRange(format!(
                    "{}: tier {} has a non-positive ceiling",
                    annex,
                    i + 1
                )));
            }
            if !(0.0..=1.0).contains(&b.nominal_rate) || !(b.deduction >= 0.0) {
                return Err(EngineError::OutOfRange(format!(
                    "{}: tier {} has an invalid rate or deduction",
                    annex,
                    i + 1
                )));
            }
            if i > 0 && b.revenue_ceiling <= brackets[i - 1].revenue_ceiling {
                return Err(EngineError::OutOfRange(format!(
                    "{}: ceilings must be strictly increasing (tier {})",
                    annex,
                    i + 1
                )));
            }
        }
        Ok(Self { annex, brackets })
    }

    fn from_rows(annex: Annex, rows: &[(f64, f64, f64)]) -> Self {
        let brackets = rows
            .iter()
            .map(|&(revenue_ceiling, nominal_rate, deduction)| TaxBracket {
                revenue_ceiling,
                nominal_rate,
                deduction,
            })
            .collect();
        Self { annex, brackets }
    }

    pub fn annex(&self) -> Annex {
        self.annex
    }

    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }
}

// Lei Complementar 123/2006, annexes as amended by LC 155/2016.
// (revenue ceiling, nominal rate, deduction)
const ANEXO_I: [(f64, f64, f64); 6] = [
    (180_000.0, 0.04, 0.0),
    (360_000.0, 0.073, 5_940.0),
    (720_000.0, 0.095, 13_860.0),
    (1_800_000.0, 0.107, 22_500.0),
    (3_600_000.0, 0.143, 87_300.0),
    (4_800_000.0, 0.19, 378_000.0),
];
const ANEXO_II: [(f64, f64, f64); 6] = [
    (180_000.0, 0.045, 0.0),
    (360_000.0, 0.078, 5_940.0),
    (720_000.0, 0.10, 13_860.0),
    (1_800_000.0, 0.112, 22_500.0),
    (3_600_000.0, 0.147, 85_500.0),
    (4_800_000.0, 0.30, 720_000.0),
];
const ANEXO_III: [(f64, f64, f64); 6] = [
    (180_000.0, 0.06, 0.0),
    (360_000.0, 0.112, 9_360.0),
    (720_000.0, 0.135, 17_640.0),
    (1_800_000.0, 0.16, 35_640.0),
    (3_600_000.0, 0.21, 125_640.0),
    (4_800_000.0, 0.33, 648_000.0),
];
const ANEXO_IV: [(f64, f64, f64); 6] = [
    (180_000.0, 0.045, 0.0),
    (360_000.0, 0.09, 8_100.0),
    (720_000.0, 0.102, 12_420.0),
    (1_800_000.0, 0.14, 39_780.0),
    (3_600_000.0, 0.22, 183_780.0),
    (4_800_000.0, 0.33, 828_000.0),
];
const ANEXO_V: [(f64, f64, f64); 6] = [
    (180_000.0, 0.155, 0.0),
    (360_000.0, 0.18, 4_500.0),
    (720_000.0, 0.195, 9_900.0),
    (1_800_000.0, 0.205, 17_100.0),
    (3_600_000.0, 0.23, 62_100.0),
    (4_800_000.0, 0.305, 540_000.0),
];

/// The full set of annex tables, keyed by annex.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnexTables {
    tables: BTreeMap<Annex, AnnexTable>,
}

impl AnnexTables {
    /// The statutory Simples Nacional tables.
    pub fn simples_nacional() -> Self {
        let tables = [
            (Annex::I, &ANEXO_I),
            (Annex::II, &ANEXO_II),
            (Annex::III, &ANEXO_III),
            (Annex::IV, &ANEXO_IV),
            (Annex::V, &ANEXO_V),
        ]
        .into_iter()
        .map(|(annex, rows)| (annex, AnnexTable::from_rows(annex, rows)))
        .collect();
        Self { tables }
    }

    /// Replace the built-in table of each overridden annex.
    pub fn with_overrides(mut self, overrides: Vec<AnnexTable>) -> Self {
        for table in overrides {
            debug!(annex = %table.annex, tiers = table.brackets.len(), "overriding annex table");
            self.tables.insert(table.annex, table);
        }
        self
    }

    /// Built-in tables, overridden by any valid JSON table in `dir`.
    pub fn from_dir(dir: &Path) -> anyhow::Result<Self> {
        let overrides = load_annex_tables_from_dir(dir)?;
        Ok(Self::simples_nacional().with_overrides(overrides))
    }

    pub fn get(&self, annex: Annex) -> Result<&AnnexTable> {
        self.tables
            .get(&annex)
            .ok_or_else(|| EngineError::OutOfRange(format!("no table configured for {}", annex)))
    }
}

impl Default for AnnexTables {
    fn default() -> Self {
        Self::simples_nacional()
    }
}

/// Select the first bracket whose ceiling covers `revenue_annualized`.
/// Revenue above the last ceiling falls in the last bracket.
pub fn lookup_bracket(table: &AnnexTable, revenue_annualized: f64) -> Result<BracketRate> {
    let last = table.brackets.len().checked_sub(1).ok_or_else(|| {
        EngineError::OutOfRange(format!("{} has an empty bracket table", table.annex))
    })?;
    let index = table
        .brackets
        .iter()
        .position(|b| b.revenue_ceiling >= revenue_annualized)
        .unwrap_or(last);
    let bracket = &table.brackets[index];
    Ok(BracketRate {
        tier: index + 1,
        nominal_rate: bracket.nominal_rate,
        deduction: bracket.deduction,
    })
}

/// Effective rate `(rbt12 * nominal - deduction) / rbt12` as a
/// fraction.
pub fn effective_rate(table: &AnnexTable, revenue_annualized: f64) -> Result<f64> {
    if !(revenue_annualized > 0.0) {
        return Err(EngineError::invalid(InputIssue::NonPositiveRevenue));
    }
    let bracket = lookup_bracket(table, revenue_annualized)?;
    let rate = (revenue_annualized * bracket.nominal_rate - bracket.deduction) / revenue_annualized;
    Ok(rate.max(0.0))
}

/// Produces an effective tax rate for an annex at a given revenue.
///
/// Estimators must be thread-safe (`Send + Sync`) because the HTTP
/// layer shares them across requests and batch evaluation runs on the
/// rayon pool.
pub trait RateEstimator: Send + Sync {
    /// Registry key, e.g. `"flat-average"`.
    fn name(&self) -> &str;
    /// Effective rate, as a fraction, for `annex` at `revenue`.
    fn effective_rate(&self, annex: Annex, revenue: f64) -> Result<f64>;
}

/// Quick estimate using one average rate per annex, whatever the
/// revenue.  Only the annexes the preset knows about are supported.
#[derive(Debug, Clone)]
pub struct FlatAverageEstimator {
    name: String,
    rates: BTreeMap<Annex, f64>,
}

impl FlatAverageEstimator {
    pub fn new(name: impl Into<String>, rates: impl IntoIterator<Item = (Annex, f64)>) -> Self {
        Self {
            name: name.into(),
            rates: rates.into_iter().collect(),
        }
    }

    /// Anexo V at 18%, Anexo III at 12%.
    pub fn standard() -> Self {
        Self::new(SavingsMode::FlatAverage.key(), [(Annex::V, 0.18), (Annex::III, 0.12)])
    }

    /// The first-tier nominal rates: Anexo V at 15.5%, Anexo III at 6%.
    pub fn nominal_floor() -> Self {
        Self::new(SavingsMode::FlatFloor.key(), [(Annex::V, 0.155), (Annex::III, 0.06)])
    }
}

impl RateEstimator for FlatAverageEstimator {
    fn name(&self) -> &str {
        &self.name
    }

    fn effective_rate(&self, annex: Annex, _revenue: f64) -> Result<f64> {
        self.rates.get(&annex).copied().ok_or_else(|| {
            EngineError::OutOfRange(format!("estimator '{}' has no rate for {}", self.name, annex))
        })
    }
}

/// Bracket-accurate estimate from the annex tables.
#[derive(Debug, Clone)]
pub struct BracketEstimator {
    tables: Arc<AnnexTables>,
}

impl BracketEstimator {
    pub fn new(tables: Arc<AnnexTables>) -> Self {
        Self { tables }
    }
}

impl RateEstimator for BracketEstimator {
    fn name(&self) -> &str {
        SavingsMode::Bracket.key()
    }

    fn effective_rate(&self, annex: Annex, revenue: f64) -> Result<f64> {
        effective_rate(self.tables.get(annex)?, revenue)
    }
}

/// Selectable savings estimation modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SavingsMode {
    #[default]
    FlatAverage,
    FlatFloor,
    Bracket,
}

impl SavingsMode {
    pub fn key(self) -> &'static str {
        match self {
            SavingsMode::FlatAverage => "flat-average",
            SavingsMode::FlatFloor => "flat-floor",
            SavingsMode::Bracket => "bracket",
        }
    }
}

/// Annual tax saved by moving `revenue` from `from` to `to`:
/// `revenue * (rate(from) - rate(to))`, rounded to cents.
pub fn estimated_annual_savings(
    revenue: f64,
    from: Annex,
    to: Annex,
    estimator: &dyn RateEstimator,
) -> Result<f64> {
    if !(revenue >= 0.0) {
        return Err(EngineError::invalid(InputIssue::NegativeAmount));
    }
    if revenue == 0.0 {
        return Ok(0.0);
    }
    let from_rate = estimator.effective_rate(from, revenue)?;
    let to_rate = estimator.effective_rate(to, revenue)?;
    Ok(round2(revenue * (from_rate - to_rate)))
}

/// On-disk layout of an annex table.
#[derive(Debug, Deserialize)]
struct AnnexTableFile {
    annex: Annex,
    brackets: Vec<TaxBracket>,
}

/// Load annex tables from a directory.
///
/// Every `.json` file is parsed as one table.  Files that fail to
/// parse or validate are skipped with a warning; a missing directory
/// yields no tables.
pub fn load_annex_tables_from_dir(path: &Path) -> anyhow::Result<Vec<AnnexTable>> {
    let mut tables = Vec::new();
    if !path.is_dir() {
        return Ok(tables);
    }
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        let file = entry.path();
        if !entry.file_type()?.is_file() || file.extension().map_or(true, |ext| ext != "json") {
            continue;
        }
        let data = std::fs::read_to_string(&file)?;
        let parsed = serde_json::from_str::<AnnexTableFile>(&data)
            .map_err(anyhow::Error::from)
            .and_then(|raw| AnnexTable::new(raw.annex, raw.brackets).map_err(anyhow::Error::from));
        match parsed {
            Ok(table) => tables.push(table),
            Err(err) => warn!(file = %file.display(), "skipping annex table: {}", err),
        }
    }
    Ok(tables)
}
