//! SEPA Creditor Identifier validation
//!
//! Layout: country (2) + check digits (2) + business code (3) + national id (1-28).
//! The business code is free and excluded from the Mod-97 check, which runs
//! over `national id + country + check digits` exactly like an IBAN.

use crate::{
    countries,
    iban::mod97,
    sanitizer,
    types::{ErrorCode, ValidationResult},
};
use once_cell::sync::Lazy;
use regex::Regex;

static CREDITOR_ID_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z]{2}[0-9]{2}[A-Z0-9]{3}[A-Z0-9]{1,28}$").expect("static creditor id pattern")
});

const MIN_LEN: usize = 8;
const MAX_LEN: usize = 35;

/// Creditor scheme identifier validator
#[derive(Debug, Clone, Copy, Default)]
pub struct CreditorIdValidator;

impl CreditorIdValidator {
    /// Validate a raw creditor identifier
    pub fn validate(raw: &str) -> ValidationResult {
        let id = sanitizer::normalize_creditor_id(raw);
        let len = id.chars().count();

        if !(MIN_LEN..=MAX_LEN).contains(&len) {
            return ValidationResult::failure(
                ErrorCode::InvalidLength,
                format!(
                    "Creditor identifier must have {}-{} characters, got {}",
                    MIN_LEN, MAX_LEN, len
                ),
            )
            .with_detail("actual", len.to_string());
        }

        if !CREDITOR_ID_FORMAT.is_match(&id) {
            return ValidationResult::failure(
                ErrorCode::InvalidFormat,
                "Creditor identifier must be country, check digits, business code and national id",
            );
        }

        let country = &id[..2];
        if !countries::is_country_code(country) {
            return ValidationResult::failure(
                ErrorCode::InvalidFormat,
                format!("Unknown creditor identifier country code: {}", country),
            )
            .with_detail("country", country);
        }

        let check_input = format!("{}{}", &id[7..], &id[..4]);
        match mod97(&check_input) {
            Some(1) => ValidationResult::success(),
            _ => ValidationResult::failure(
                ErrorCode::InvalidChecksum,
                "Creditor identifier checksum mismatch",
            ),
        }
    }

    /// Shorthand for `validate(raw).valid`
    pub fn is_valid(raw: &str) -> bool {
        Self::validate(raw).valid
    }
}
