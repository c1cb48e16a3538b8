//! IBAN validation (ISO 13616 / ISO 7064 Mod 97-10)
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. Format: 2 letters, 2 digits, 1-30 alphanumerics → `INVALID_FORMAT`
//! 2. Country known and total length matches the registry → `INVALID_FORMAT` / `INVALID_LENGTH`
//! 3. Mod-97 of the rearranged, letter-expanded string equals 1 → `INVALID_CHECKSUM`
//!
//! The checksum is computed with a streaming remainder, so IBANs up to the
//! 34 character maximum never overflow.

use crate::{
    countries,
    sanitizer,
    types::{ErrorCode, ValidationResult},
};
use once_cell::sync::Lazy;
use regex::Regex;

static IBAN_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}[0-9]{2}[A-Z0-9]{1,30}$").expect("static IBAN pattern"));

/// IBAN validator
#[derive(Debug, Clone, Copy, Default)]
pub struct IbanValidator;

impl IbanValidator {
    /// Validate a raw IBAN (spaces, hyphens and lowercase are tolerated)
    pub fn validate(raw: &str) -> ValidationResult {
        let iban = sanitizer::normalize_iban(raw);

        if !IBAN_FORMAT.is_match(&iban) {
            return ValidationResult::failure(
                ErrorCode::InvalidFormat,
                "IBAN must be 2 letters, 2 check digits and up to 30 alphanumeric characters",
            );
        }

        let country = &iban[..2];
        let expected = match countries::iban_length(country) {
            Some(len) => len,
            None => {
                return ValidationResult::failure(
                    ErrorCode::InvalidFormat,
                    format!("Unknown IBAN country code: {}", country),
                )
                .with_detail("country", country);
            }
        };

        if iban.len() != expected {
            return ValidationResult::failure(
                ErrorCode::InvalidLength,
                format!(
                    "IBAN for {} must have {} characters, got {}",
                    country,
                    expected,
                    iban.len()
                ),
            )
            .with_detail("expected", expected.to_string())
            .with_detail("actual", iban.len().to_string());
        }

        let rearranged = format!("{}{}", &iban[4..], &iban[..4]);
        match mod97(&rearranged) {
            Some(1) => ValidationResult::success(),
            _ => ValidationResult::failure(ErrorCode::InvalidChecksum, "IBAN checksum mismatch"),
        }
    }

    /// Shorthand for `validate(raw).valid`
    pub fn is_valid(raw: &str) -> bool {
        Self::validate(raw).valid
    }
}

/// Remainder modulo 97 of an alphanumeric string with letters expanded (A=10 … Z=35)
///
/// Returns `None` on any non-alphanumeric character.
pub fn mod97(input: &str) -> Option<u32> {
    input.chars().try_fold(0u32, |remainder, c| {
        let value = c.to_digit(36)?;
        let shifted = if value < 10 {
            remainder * 10 + value
        } else {
            remainder * 100 + value
        };
        Some(shifted % 97)
    })
}

/// Compute the two IBAN check digits for a country and BBAN
pub fn check_digits(country: &str, bban: &str) -> Option<String> {
    let remainder = mod97(&format!("{}{}00", bban, country))?;
    Some(format!("{:02}", 98 - remainder))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_valid_ibans() {
        for iban in [
            "DE89370400440532013000",
            "GB82WEST12345698765432",
            "NL91ABNA0417164300",
            "FR1420041010050500013M02606",
            "AT611904300234573201",
            "CH9300762011623852957",
            "BE68539007547034",
            "NO9386011117947",
            "MT84MALT011000012345MTLCAST001S",
            "LC55HEMM000100010012001200023015",
        ] {
            let result = IbanValidator::validate(iban);
            assert!(result.valid, "{} should be valid: {:?}", iban, result);
        }
    }

    #[test]
    fn test_tolerates_presentation_format() {
        assert!(IbanValidator::is_valid("DE89 3704 0044 0532 0130 00"));
        assert!(IbanValidator::is_valid("de89-3704-0044-0532-0130-00"));
    }

    #[test]
    fn test_checksum_failure() {
        let result = IbanValidator::validate("DE88370400440532013000");
        assert_eq!(result.error_code, Some(ErrorCode::InvalidChecksum));
    }

    #[test]
    fn test_length_failure() {
        let result = IbanValidator::validate("DE8937040044053201300");
        assert_eq!(result.error_code, Some(ErrorCode::InvalidLength));
        assert_eq!(result.detail("expected"), Some("22"));
        assert_eq!(result.detail("actual"), Some("21"));
    }

    #[test]
    fn test_unknown_country() {
        let result = IbanValidator::validate("XX89370400440532013000");
        assert_eq!(result.error_code, Some(ErrorCode::InvalidFormat));
        assert_eq!(result.detail("country"), Some("XX"));
    }

    #[test]
    fn test_format_failures() {
        for raw in ["", "DE", "DE8", "1E89370400440532013000", "DEX9370400440532013000", "DE89/3704"] {
            assert_eq!(
                IbanValidator::validate(raw).error_code,
                Some(ErrorCode::InvalidFormat),
                "{:?}",
                raw
            );
        }
        // 35 characters exceeds the maximum IBAN length
        let too_long = format!("DE89{}", "1".repeat(31));
        assert_eq!(
            IbanValidator::validate(&too_long).error_code,
            Some(ErrorCode::InvalidFormat)
        );
    }

    #[test]
    fn test_mod97_streaming_matches_small_values() {
        assert_eq!(mod97("0"), Some(0));
        assert_eq!(mod97("97"), Some(0));
        assert_eq!(mod97("98"), Some(1));
        assert_eq!(mod97("A"), Some(10));
        assert_eq!(mod97("Z"), Some(35));
        // Rearranged DE89370400440532013000, well beyond u64 range
        assert_eq!(mod97("370400440532013000131489"), Some(1));
        assert_eq!(mod97("12-3"), None);
    }

    #[test]
    fn test_check_digits() {
        assert_eq!(check_digits("DE", "370400440532013000").as_deref(), Some("89"));
        assert_eq!(check_digits("GB", "WEST12345698765432").as_deref(), Some("82"));
        assert_eq!(check_digits("NO", "86011117947").as_deref(), Some("93"));
    }
}
