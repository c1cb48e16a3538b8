//! Property-based tests for SEPA message invariants
//!
//! These tests use proptest to verify:
//! - IBAN checksums: generated check digits validate, any single digit error is caught
//! - Control totals: NbOfTxs and CtrlSum always match the included transactions
//! - Exclusion: records without IBAN never reach the document
//! - Escaping: arbitrary names survive serialization unchanged
//! - Amount formatting: two fraction digits, half away from zero

use chrono::{NaiveDate, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use sepa_core::clock::{FixedClock, FixedIdSource};
use sepa_core::config::BuilderConfig;
use sepa_core::iban::check_digits;
use sepa_core::sanitizer::normalize_name;
use sepa_core::{
    format_amount, BuildError, Error, ErrorCode, IbanValidator, MessageVariant, Party,
    SepaMessageBuilder, SepaXmlValidator, TransactionRecord, XsdSchema,
};

/// Strategy for generating valid amounts (positive, within the default ceiling)
fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..=99_999_999i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy for generating German BBANs (bank code + account number)
fn bban_strategy() -> impl Strategy<Value = String> {
    "[0-9]{18}"
}

/// Strategy for generating records, some of them without IBAN
fn record_strategy() -> impl Strategy<Value = (Decimal, bool)> {
    (amount_strategy(), prop::bool::weighted(0.8))
}

/// Strategy for generating names full of XML-significant characters
fn name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z&<>\"'][A-Za-z&<>\"' ]{0,40}"
}

/// Check digits computed without the library: "DE" = 13 14, appended with "00"
fn german_check_digits(bban: &str) -> String {
    let number: u128 = format!("{}131400", bban).parse().unwrap();
    format!("{:02}", 98 - (number % 97))
}

fn club() -> Party {
    Party::new(
        "TSV Musterstadt e.V.",
        "DE89370400440532013000",
        Some("COBADEFFXXX"),
        Some("DE98ZZZ09999999999"),
    )
    .unwrap()
}

fn builder() -> SepaMessageBuilder {
    SepaMessageBuilder::new(MessageVariant::DirectDebit, BuilderConfig::default())
        .with_clock(FixedClock::new(Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap()))
        .with_id_source(FixedIdSource::new("PROP0001"))
}

fn due() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 11, 1).unwrap()
}

fn element_texts(xml: &str, name: &str) -> Vec<String> {
    let doc = roxmltree::Document::parse(xml).unwrap();
    doc.descendants()
        .filter(|n| n.has_tag_name(name))
        .filter_map(|n| n.text().map(str::to_string))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: IBANs with independently computed check digits validate
    #[test]
    fn prop_generated_ibans_validate(bban in bban_strategy()) {
        let expected = german_check_digits(&bban);
        prop_assert_eq!(check_digits("DE", &bban), Some(expected.clone()));

        let iban = format!("DE{}{}", expected, bban);
        prop_assert!(IbanValidator::is_valid(&iban), "{}", iban);
    }

    /// Property: changing any single BBAN digit breaks the checksum
    #[test]
    fn prop_single_digit_error_detected(
        bban in bban_strategy(),
        position in 0usize..18,
        delta in 1u32..10,
    ) {
        let iban = format!("DE{}{}", german_check_digits(&bban), bban);
        let mut chars: Vec<char> = iban.chars().collect();
        let digit = chars[4 + position].to_digit(10).unwrap();
        chars[4 + position] = char::from_digit((digit + delta) % 10, 10).unwrap();
        let corrupted: String = chars.into_iter().collect();

        let result = IbanValidator::validate(&corrupted);
        prop_assert_eq!(result.error_code, Some(ErrorCode::InvalidChecksum));
    }

    /// Property: grouping and case do not change the verdict
    #[test]
    fn prop_paper_format_equivalent(bban in bban_strategy()) {
        let iban = format!("de{}{}", german_check_digits(&bban), bban);
        let grouped: String = iban
            .chars()
            .collect::<Vec<_>>()
            .chunks(4)
            .map(|c| c.iter().collect::<String>())
            .collect::<Vec<_>>()
            .join(" ");
        prop_assert!(IbanValidator::is_valid(&grouped));
    }

    /// Property: control totals equal the included transactions in both places
    #[test]
    fn prop_control_totals_match(records in prop::collection::vec(record_strategy(), 1..20)) {
        let input: Vec<TransactionRecord> = records
            .iter()
            .enumerate()
            .map(|(i, (amount, has_iban))| {
                let record = TransactionRecord::new(
                    format!("Mitglied {}", i),
                    "DE89370400440532013000",
                    amount.to_string(),
                    "Beitrag",
                    due(),
                );
                if *has_iban { record } else { record.without_iban() }
            })
            .collect();

        let included: Vec<Decimal> = records
            .iter()
            .filter(|(_, has_iban)| *has_iban)
            .map(|(amount, _)| *amount)
            .collect();

        match builder().build(&club(), &input) {
            Err(Error::Validation(BuildError::EmptyBatch)) => {
                prop_assert!(included.is_empty());
            }
            Ok(message) => {
                let sum: Decimal = included.iter().sum();
                let batch = message.batch();
                prop_assert_eq!(batch.transaction_count, included.len());
                prop_assert_eq!(batch.control_sum, sum);
                prop_assert_eq!(batch.excluded.len(), records.len() - included.len());

                let count = included.len().to_string();
                prop_assert_eq!(element_texts(message.xml(), "NbOfTxs"), vec![count.clone(), count]);
                let total = format_amount(sum);
                prop_assert_eq!(element_texts(message.xml(), "CtrlSum"), vec![total.clone(), total]);
                prop_assert!(SepaXmlValidator::new().validate(message.xml()).valid);
            }
            Err(other) => prop_assert!(false, "unexpected error: {:?}", other),
        }
    }

    /// Property: excluded records keep their input position
    #[test]
    fn prop_exclusions_report_input_index(records in prop::collection::vec(record_strategy(), 1..20)) {
        prop_assume!(records.iter().any(|(_, has_iban)| *has_iban));
        let input: Vec<TransactionRecord> = records
            .iter()
            .map(|(amount, has_iban)| {
                let record = TransactionRecord::new("Mitglied", "DE89370400440532013000", amount.to_string(), "", due());
                if *has_iban { record } else { record.without_iban() }
            })
            .collect();

        let message = builder().build(&club(), &input).unwrap();
        let expected: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, (_, has_iban))| !has_iban)
            .map(|(i, _)| i)
            .collect();
        let actual: Vec<usize> = message.excluded().iter().map(|e| e.index).collect();
        prop_assert_eq!(actual, expected);
    }

    /// Property: names survive escaping and pass the message schema
    #[test]
    fn prop_names_round_trip(name in name_strategy(), remittance in name_strategy()) {
        let input = vec![TransactionRecord::new(&name, "DE89370400440532013000", "1.00", &remittance, due())];
        let message = builder().build(&club(), &input).unwrap();

        let names = element_texts(message.xml(), "Nm");
        prop_assert_eq!(names.last().cloned(), Some(normalize_name(&name)));
        prop_assert_eq!(element_texts(message.xml(), "Ustrd"), vec![normalize_name(&remittance)]);

        let schema = XsdSchema::from_file(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/pain.008.001.02.xsd"
        ))
        .unwrap();
        let result = SepaXmlValidator::new().with_schema(schema).validate(message.xml());
        prop_assert!(result.valid, "{:?}", result);
    }

    /// Property: cent amounts format exactly
    #[test]
    fn prop_format_amount_cents(cents in 0i64..10_000_000_000i64) {
        let expected = format!("{}.{:02}", cents / 100, cents % 100);
        prop_assert_eq!(format_amount(Decimal::new(cents, 2)), expected);
    }

    /// Property: a third fraction digit rounds half away from zero
    #[test]
    fn prop_format_amount_rounds(millis in 0i64..10_000_000_000i64) {
        let cents = (millis + 5) / 10;
        let expected = format!("{}.{:02}", cents / 100, cents % 100);
        prop_assert_eq!(format_amount(Decimal::new(millis, 3)), expected.clone());
        if cents > 0 {
            prop_assert_eq!(format_amount(Decimal::new(-millis, 3)), format!("-{}", expected));
        }
    }
}
