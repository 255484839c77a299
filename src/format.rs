//! Brazilian currency and CNPJ normalization.
//!
//! Currency text follows the pt-BR convention (`.` groups thousands,
//! `,` separates cents, optional `R$` prefix).  Parsing is lenient
//! because forms must tolerate partial input: anything unparseable is
//! read as zero.  CNPJ handling covers the display mask and the
//! modulo-11 check digits.

use crate::error::{CnpjIssue, EngineError, Result};

const CNPJ_LEN: usize = 14;
const FIRST_DIGIT_WEIGHTS: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const SECOND_DIGIT_WEIGHTS: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Round a monetary amount or percentage to two decimal places.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parse pt-BR currency text such as `"R$ 1.234,56"` into `1234.56`.
///
/// Returns `0.0` for empty or unparseable input.
pub fn parse_currency(text: &str) -> f64 {
    let mut cleaned = String::with_capacity(text.len());
    for c in text.trim().chars() {
        match c {
            '0'..='9' | ',' => cleaned.push(c),
            '-' if cleaned.is_empty() => cleaned.push(c),
            _ => {}
        }
    }
    // Only the first comma is a decimal separator.
    let normalized = cleaned.replacen(',', ".", 1);
    match normalized.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// Format an amount as `R$ 1.234,56`.
///
/// Rounds half away from zero to whole cents.
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return "R$ 0,00".to_string();
    }
    let cents = (amount.abs() * 100.0).round() as u64;
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!(
        "{}R$ {},{:02}",
        sign,
        group_thousands(cents / 100),
        cents % 100
    )
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    out
}

fn digits_of(text: &str) -> Vec<u32> {
    text.chars().filter_map(|c| c.to_digit(10)).collect()
}

/// Apply the `00.000.000/0000-00` mask to whatever digits have been
/// typed so far.  Non-digits are ignored and digits past the 14th are
/// dropped.
pub fn format_cnpj(text: &str) -> String {
    let mut out = String::with_capacity(18);
    for (i, d) in digits_of(text).into_iter().take(CNPJ_LEN).enumerate() {
        match i {
            2 | 5 => out.push('.'),
            8 => out.push('/'),
            12 => out.push('-'),
            _ => {}
        }
        out.push(char::from_digit(d, 10).unwrap_or('0'));
    }
    out
}

fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let remainder = sum % 11;
    if remainder < 2 {
        0
    } else {
        11 - remainder
    }
}

/// Validate a CNPJ and return its 14 bare digits.
///
/// The error carries the specific rule that failed.
pub fn check_cnpj(text: &str) -> Result<String> {
    let digits = digits_of(text);
    if digits.len() != CNPJ_LEN {
        return Err(EngineError::MalformedIdentifier(CnpjIssue::WrongLength(
            digits.len(),
        )));
    }
    if digits.iter().all(|d| *d == digits[0]) {
        return Err(EngineError::MalformedIdentifier(CnpjIssue::RepeatedDigits));
    }
    let first = check_digit(&digits[..12], &FIRST_DIGIT_WEIGHTS);
    let second = check_digit(&digits[..13], &SECOND_DIGIT_WEIGHTS);
    if digits[12] != first || digits[13] != second {
        return Err(EngineError::MalformedIdentifier(CnpjIssue::ChecksumMismatch));
    }
    Ok(digits
        .iter()
        .filter_map(|d| char::from_digit(*d, 10))
        .collect())
}

/// Convenience form of [`check_cnpj`].
pub fn validate_cnpj(text: &str) -> bool {
    check_cnpj(text).is_ok()
}
