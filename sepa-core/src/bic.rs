//! BIC validation (ISO 9362)
//!
//! `AAAA BB CC [DDD]`: institution, country, location, optional branch.

use crate::{
    countries,
    sanitizer,
    types::{ErrorCode, ValidationResult},
};
use once_cell::sync::Lazy;
use regex::Regex;

static BIC_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z]{4}[A-Z]{2}[A-Z0-9]{2}([A-Z0-9]{3})?$").expect("static BIC pattern")
});

/// BIC validator
#[derive(Debug, Clone, Copy, Default)]
pub struct BicValidator;

impl BicValidator {
    /// Validate a raw BIC
    pub fn validate(raw: &str) -> ValidationResult {
        let bic = sanitizer::normalize_bic(raw);
        let len = bic.chars().count();

        if len != 8 && len != 11 {
            return ValidationResult::failure(
                ErrorCode::InvalidLength,
                format!("BIC must have 8 or 11 characters, got {}", len),
            )
            .with_detail("actual", len.to_string());
        }

        if !BIC_FORMAT.is_match(&bic) {
            return ValidationResult::failure(
                ErrorCode::InvalidFormat,
                "BIC must be 4 letters institution, 2 letters country, 2 alphanumeric location and optional 3 alphanumeric branch",
            );
        }

        let country = &bic[4..6];
        if !countries::is_country_code(country) {
            return ValidationResult::failure(
                ErrorCode::InvalidFormat,
                format!("Unknown BIC country code: {}", country),
            )
            .with_detail("country", country);
        }

        ValidationResult::success()
    }

    /// Shorthand for `validate(raw).valid`
    pub fn is_valid(raw: &str) -> bool {
        Self::validate(raw).valid
    }
}
