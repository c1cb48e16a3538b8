//! Configuration for the SEPA engine

use crate::types::MessageVariant;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// SEPA engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Message builder settings
    pub builder: BuilderConfig,

    /// XML validation settings
    pub validation: ValidationConfig,

    /// File output settings
    pub output: OutputConfig,
}

/// Message builder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Prefix of generated message ids (1-11 ASCII alphanumerics)
    pub message_id_prefix: String,

    /// Largest accepted transaction amount
    pub max_amount: Decimal,

    /// Request a single booking for the whole batch
    pub batch_booking: bool,

    /// Initiating party name, defaults to the own party's name
    pub initiating_party_name: Option<String>,

    /// Direct debit sequence type
    pub sequence_type: SequenceType,

    /// Direct debit scheme
    pub local_instrument: LocalInstrument,

    /// Indent generated XML
    pub pretty_print: bool,

    /// What to do with records that carry no IBAN
    pub missing_iban: MissingIbanConfig,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            message_id_prefix: "SEPA".to_string(),
            max_amount: Decimal::new(99_999_999, 2), // 999,999.99
            batch_booking: true,
            initiating_party_name: None,
            sequence_type: SequenceType::Rcur,
            local_instrument: LocalInstrument::Core,
            pretty_print: true,
            missing_iban: MissingIbanConfig::default(),
        }
    }
}

/// Handling of a record without IBAN
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingIbanPolicy {
    /// Skip the record and report it
    Exclude,
    /// Fail the whole batch
    Reject,
}

/// Missing-IBAN policy per message variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissingIbanConfig {
    /// Payouts: a payee without bank details cannot be paid, so the run stops
    pub credit_transfer: MissingIbanPolicy,

    /// Collections: members without a mandate account are skipped
    pub direct_debit: MissingIbanPolicy,
}

impl Default for MissingIbanConfig {
    fn default() -> Self {
        Self {
            credit_transfer: MissingIbanPolicy::Reject,
            direct_debit: MissingIbanPolicy::Exclude,
        }
    }
}

impl MissingIbanConfig {
    /// Policy applied to `variant`
    pub fn for_variant(&self, variant: MessageVariant) -> MissingIbanPolicy {
        match variant {
            MessageVariant::CreditTransfer => self.credit_transfer,
            MessageVariant::DirectDebit => self.direct_debit,
        }
    }
}

/// Direct debit sequence type (`SeqTp`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SequenceType {
    /// First collection of a recurring mandate
    Frst,
    /// Recurring collection
    Rcur,
    /// One-off collection
    Ooff,
    /// Final collection
    Fnal,
}

impl SequenceType {
    /// ISO code
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceType::Frst => "FRST",
            SequenceType::Rcur => "RCUR",
            SequenceType::Ooff => "OOFF",
            SequenceType::Fnal => "FNAL",
        }
    }
}

/// Direct debit scheme (`LclInstrm/Cd`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocalInstrument {
    /// SEPA Core Direct Debit
    #[serde(rename = "CORE")]
    Core,
    /// SEPA Business to Business Direct Debit
    #[serde(rename = "B2B")]
    B2b,
}

impl LocalInstrument {
    /// ISO code
    pub fn as_str(&self) -> &'static str {
        match self {
            LocalInstrument::Core => "CORE",
            LocalInstrument::B2b => "B2B",
        }
    }
}

/// XML validation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// XSD applied before the business checks
    pub schema_path: Option<PathBuf>,

    /// Run IBAN/BIC validators on identifiers found in documents
    pub strict_identifiers: bool,

    /// Validate every built message before it is written
    pub self_check: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            schema_path: None,
            strict_identifiers: false,
            self_check: true,
        }
    }
}

/// File output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving generated messages
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./data/sepa"),
        }
    }
}

/// Longest prefix that still fits a 35 character message id
const MAX_PREFIX_LEN: usize = 11;

/// Largest instructed amount the SEPA rulebooks allow (999,999,999.99)
const MAX_AMOUNT_CEILING: Decimal = Decimal::from_parts(0x4876_E7FF, 0x17, 0, false, 2);

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(prefix) = std::env::var("SEPA_MESSAGE_ID_PREFIX") {
            config.builder.message_id_prefix = prefix;
        }

        if let Ok(max) = std::env::var("SEPA_MAX_AMOUNT") {
            config.builder.max_amount = max.trim().parse().map_err(|e| {
                crate::Error::Config(format!("Invalid SEPA_MAX_AMOUNT {:?}: {}", max, e))
            })?;
        }

        if let Ok(path) = std::env::var("SEPA_SCHEMA_PATH") {
            config.validation.schema_path = Some(PathBuf::from(path));
        }

        if let Ok(dir) = std::env::var("SEPA_OUTPUT_DIR") {
            config.output.dir = PathBuf::from(dir);
        }

        if let Ok(strict) = std::env::var("SEPA_STRICT_IDENTIFIERS") {
            config.validation.strict_identifiers = matches!(
                strict.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> crate::Result<()> {
        let prefix = &self.builder.message_id_prefix;
        if prefix.is_empty()
            || prefix.len() > MAX_PREFIX_LEN
            || !prefix.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(crate::Error::Config(format!(
                "message_id_prefix must be 1-{} ASCII alphanumerics, got {:?}",
                MAX_PREFIX_LEN, prefix
            )));
        }

        let max_amount = self.builder.max_amount;
        if max_amount <= Decimal::ZERO || max_amount > MAX_AMOUNT_CEILING {
            return Err(crate::Error::Config(format!(
                "max_amount must be in (0, {}], got {}",
                MAX_AMOUNT_CEILING, max_amount
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.builder.message_id_prefix, "SEPA");
        assert_eq!(config.builder.max_amount, dec!(999999.99));
        assert_eq!(config.builder.sequence_type.as_str(), "RCUR");
        assert_eq!(config.builder.local_instrument.as_str(), "CORE");
        assert_eq!(
            config.builder.missing_iban.for_variant(MessageVariant::DirectDebit),
            MissingIbanPolicy::Exclude
        );
        assert_eq!(
            config.builder.missing_iban.for_variant(MessageVariant::CreditTransfer),
            MissingIbanPolicy::Reject
        );
        assert!(config.validation.self_check);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[builder]
message_id_prefix = "TSV"
max_amount = "5000.00"
sequence_type = "FRST"
local_instrument = "B2B"

[builder.missing_iban]
credit_transfer = "exclude"

[output]
dir = "/tmp/sepa-out"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.builder.message_id_prefix, "TSV");
        assert_eq!(config.builder.max_amount, dec!(5000.00));
        assert_eq!(config.builder.sequence_type, SequenceType::Frst);
        assert_eq!(config.builder.local_instrument, LocalInstrument::B2b);
        assert_eq!(config.builder.missing_iban.credit_transfer, MissingIbanPolicy::Exclude);
        assert_eq!(config.builder.missing_iban.direct_debit, MissingIbanPolicy::Exclude);
        assert!(config.builder.pretty_print);
        assert_eq!(config.output.dir, PathBuf::from("/tmp/sepa-out"));
    }

    #[test]
    fn test_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[builder]\nmessage_id_prefix = \"BAD-PREFIX\"").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(crate::Error::Config(_))
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[builder\n").unwrap();
        assert!(matches!(
            Config::from_file(file.path()),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.builder.message_id_prefix = "ABCDEFGHIJKL".to_string();
        assert!(config.validate().is_err());

        config.builder.message_id_prefix = String::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.builder.max_amount = Decimal::ZERO;
        assert!(config.validate().is_err());

        config.builder.max_amount = MAX_AMOUNT_CEILING;
        assert!(config.validate().is_ok());
        config.builder.max_amount = Decimal::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("999999999.99"), "{err}");
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("SEPA_MESSAGE_ID_PREFIX", "CLUB");
        std::env::set_var("SEPA_MAX_AMOUNT", "2500.00");
        std::env::set_var("SEPA_STRICT_IDENTIFIERS", "true");
        let config = Config::from_env();
        std::env::remove_var("SEPA_MESSAGE_ID_PREFIX");
        std::env::remove_var("SEPA_MAX_AMOUNT");
        std::env::remove_var("SEPA_STRICT_IDENTIFIERS");

        let config = config.unwrap();
        assert_eq!(config.builder.message_id_prefix, "CLUB");
        assert_eq!(config.builder.max_amount, dec!(2500.00));
        assert!(config.validation.strict_identifiers);
        assert_eq!(config.output.dir, PathBuf::from("./data/sepa"));
    }
}
