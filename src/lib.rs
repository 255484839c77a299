//! Fator R Engine library crate.
//!
//! This crate implements the Simples Nacional "Fator R" calculation
//! engine: Brazilian currency and CNPJ handling, Factor R
//! classification, the Anexo I–V bracket tables, savings estimates
//! and growth simulation.  Everything except the `api` module is
//! synchronous, side-effect free and safe to call from any thread.
//! External applications may call into `engine::evaluate` directly
//! or embed the HTTP API via `api::build_router`.

pub mod error;
pub mod format;
pub mod factor;
pub mod tax;
pub mod models;
pub mod simulation;
pub mod analysis;
pub mod monthly;
pub mod history;
pub mod engine;
pub mod config;
pub mod api;

pub use error::{CnpjIssue, EngineError, InputIssue, Result};
pub use factor::{classify, compute_factor_r, required_payroll_for_threshold, FactorBand};
pub use format::{format_currency, parse_currency, validate_cnpj};
pub use simulation::simulate;
pub use tax::{estimated_annual_savings, lookup_bracket};
