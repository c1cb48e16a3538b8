//! Input normalization
//!
//! Produces the canonical form of raw strings before any validator sees them:
//! - Names and free text: NFKC, whitespace runs collapsed, trimmed, case kept
//! - IBAN / BIC / identifiers: NFKC, whitespace and hyphens removed, uppercased
//! - Amounts: currency symbols and whitespace removed, decimal comma converted
//!
//! Nothing here fails. Input that cannot be normalized meaningfully comes back
//! as a trimmed best-effort string and the validators decide.

use unicode_normalization::UnicodeNormalization;

/// Currency symbols stripped from amount input
const CURRENCY_SYMBOLS: &[char] = &['€', '$', '£', '¥', '¢', '₣', '₤', '₹', '₽', '₺'];

/// Normalize a person or organisation name (also used for remittance text)
pub fn normalize_name(input: &str) -> String {
    let normalized: String = input.nfkc().collect();
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize an IBAN to its electronic format
pub fn normalize_iban(input: &str) -> String {
    normalize_identifier(input)
}

/// Normalize a BIC
pub fn normalize_bic(input: &str) -> String {
    normalize_identifier(input)
}

/// Normalize a creditor scheme identifier
pub fn normalize_creditor_id(input: &str) -> String {
    normalize_identifier(input)
}

fn normalize_identifier(input: &str) -> String {
    input
        .nfkc()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .collect()
}

/// Normalize a raw amount string to `digits[.digits]` form
///
/// When both `.` and `,` occur the later one is the decimal separator and the
/// other is dropped as a grouping mark (`1.234,56` and `1,234.56` both become
/// `1234.56`).
pub fn normalize_amount(input: &str) -> String {
    let normalized: String = input.nfkc().collect();
    let trimmed = normalized.trim();
    let without_code = strip_currency_code(trimmed);

    let compact: String = without_code
        .chars()
        .filter(|c| !c.is_whitespace() && !CURRENCY_SYMBOLS.contains(c))
        .collect();

    match (compact.rfind('.'), compact.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => compact.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => compact.replace(',', ""),
        (None, Some(_)) => compact.replace(',', "."),
        _ => compact,
    }
}

fn strip_currency_code(input: &str) -> String {
    let upper = input.to_ascii_uppercase();
    match upper.find("EUR") {
        Some(pos) => {
            let mut out = String::with_capacity(input.len());
            out.push_str(&input[..pos]);
            out.push_str(&input[pos + 3..]);
            out
        }
        None => input.to_string(),
    }
}

/// Truncate to at most `max` characters (not bytes)
pub fn truncate_chars(input: &str, max: usize) -> String {
    match input.char_indices().nth(max) {
        Some((byte_pos, _)) => input[..byte_pos].to_string(),
        None => input.to_string(),
    }
}
