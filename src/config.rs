//! Runtime settings, read from environment variables.
//!
//! - `FATOR_R_BIND_ADDR`: listen address (default `127.0.0.1:3000`).
//! - `FATOR_R_TABLES_DIR`: directory of JSON annex tables overriding
//!   the built-in ones.
//! - `FATOR_R_SALARY_BASIS`: `annual` or `monthly`, used when a
//!   simulation request does not say.

use crate::simulation::SalaryBasis;
use anyhow::{anyhow, Result};
use std::path::PathBuf;

pub const ENV_BIND_ADDR: &str = "FATOR_R_BIND_ADDR";
pub const ENV_TABLES_DIR: &str = "FATOR_R_TABLES_DIR";
pub const ENV_SALARY_BASIS: &str = "FATOR_R_SALARY_BASIS";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Address the HTTP server listens on.
    pub bind_addr: String,
    /// Directory of annex table overrides, if any.
    pub tables_dir: Option<PathBuf>,
    /// Salary unit for simulations that leave it unset.
    pub salary_basis: SalaryBasis,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            bind_addr: "127.0.0.1:3000".to_string(),
            tables_dir: None,
            salary_basis: SalaryBasis::Annual,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset or blank keys keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Settings::default();
        if let Some(addr) = get(ENV_BIND_ADDR) {
            settings.bind_addr = addr;
        }
        settings.tables_dir = get(ENV_TABLES_DIR).map(PathBuf::from);
        if let Some(basis) = get(ENV_SALARY_BASIS) {
            settings.salary_basis = basis
                .parse()
                .map_err(|e| anyhow!("{}: {}", ENV_SALARY_BASIS, e))?;
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_reads_overrides() {
        let settings = Settings::from_lookup(lookup(&[
            (ENV_BIND_ADDR, "0.0.0.0:8080"),
            (ENV_TABLES_DIR, "/etc/fator-r/tables"),
            (ENV_SALARY_BASIS, "monthly"),
        ]))
        .unwrap();
        assert_eq!(settings.bind_addr, "0.0.0.0:8080");
        assert_eq!(settings.tables_dir, Some(PathBuf::from("/etc/fator-r/tables")));
        assert_eq!(settings.salary_basis, SalaryBasis::Monthly);
    }

    #[test]
    fn test_rejects_unknown_salary_basis() {
        assert!(Settings::from_lookup(lookup(&[(ENV_SALARY_BASIS, "weekly")])).is_err());
    }
}
