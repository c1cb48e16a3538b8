//! SEPA export CLI - payment file generation and validation
//!
//! Usage:
//! ```bash
//! sepa build --variant direct-debit --input fees.json --out data/sepa
//! sepa build --variant credit-transfer --input payouts.json --date 2026-11-02 --stdout
//! sepa validate data/sepa/SEPA-20261016093000-AB12CD34.xml --schema pain.008.001.02.xsd
//! sepa check-iban "DE89 3704 0044 0532 0130 00"
//! sepa check-bic COBADEFFXXX
//! sepa check-creditor-id DE98ZZZ09999999999
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sepa_core::{
    format_amount, BicValidator, Config, CreditorIdValidator, IbanValidator, MessageVariant, Party,
    SepaMessage, SepaMessageBuilder, SepaXmlValidator, TransactionRecord, ValidationResult,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// SEPA payment file generator and validator
#[derive(Parser, Debug)]
#[command(name = "sepa")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (TOML); environment variables are used otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a pain.001 or pain.008 message from a JSON batch
    Build {
        /// Message variant (credit-transfer, direct-debit)
        #[arg(long)]
        variant: MessageVariant,
        /// Batch file: {"party": {...}, "transactions": [...]}
        #[arg(long, short)]
        input: PathBuf,
        /// Requested collection or execution date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Output directory (defaults to output.dir from the configuration)
        #[arg(long, short)]
        out: Option<PathBuf>,
        /// Print the XML instead of writing a file
        #[arg(long, conflicts_with = "out")]
        stdout: bool,
    },

    /// Validate a SEPA XML file
    Validate {
        /// XML file
        file: PathBuf,
        /// XSD applied before the business checks
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Validate an IBAN
    CheckIban {
        /// IBAN, electronic or paper format
        value: String,
    },

    /// Validate a BIC
    CheckBic {
        /// BIC (8 or 11 characters)
        value: String,
    },

    /// Validate a SEPA creditor identifier
    CheckCreditorId {
        /// Creditor identifier
        value: String,
    },
}

/// Own side of the batch as found in the input file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartyInput {
    name: String,
    iban: String,
    #[serde(default)]
    bic: Option<String>,
    #[serde(default)]
    scheme_id: Option<String>,
}

/// Batch input file
#[derive(Debug, Deserialize)]
struct BatchInput {
    party: PartyInput,
    transactions: Vec<TransactionRecord>,
}

impl BatchInput {
    fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read batch file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse batch file {}", path.display()))
    }

    fn party(&self) -> Result<Party> {
        Party::new(
            &self.party.name,
            &self.party.iban,
            self.party.bic.as_deref(),
            self.party.scheme_id.as_deref(),
        )
        .context("Invalid party in batch file")
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::from_env().context("Failed to load config from environment")?,
    };

    match cli.command {
        Commands::Build {
            variant,
            input,
            date,
            out,
            stdout,
        } => {
            let batch = BatchInput::load(&input)?;
            let message = build(&config, variant, &batch, date)?;

            if config.validation.self_check {
                let result = self_check(&config, &message)?;
                if !result.valid {
                    tracing::error!(message_id = message.message_id(), "Built message failed self-check");
                    return report(&result);
                }
            }

            if stdout {
                print!("{}", message.xml());
                eprintln!("{}", serde_json::to_string_pretty(&summary(&message, None))?);
            } else {
                let dir = out.unwrap_or_else(|| config.output.dir.clone());
                let path = message
                    .write_to_dir(&dir)
                    .with_context(|| format!("Failed to write message to {}", dir.display()))?;
                print_json(&summary(&message, Some(&path)))?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Validate { file, schema } => {
            if schema.is_some() {
                config.validation.schema_path = schema;
            }
            let validator = SepaXmlValidator::from_config(&config.validation)
                .context("Failed to set up validator")?;
            let result = validator
                .validate_file(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            report(&result)
        }
        Commands::CheckIban { value } => report(&IbanValidator::validate(&value)),
        Commands::CheckBic { value } => report(&BicValidator::validate(&value)),
        Commands::CheckCreditorId { value } => report(&CreditorIdValidator::validate(&value)),
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build(
    config: &Config,
    variant: MessageVariant,
    batch: &BatchInput,
    date: Option<NaiveDate>,
) -> Result<SepaMessage> {
    let party = batch.party()?;
    let mut builder = SepaMessageBuilder::new(variant, config.builder.clone());
    if let Some(date) = date {
        builder = builder.requested_date(date);
    }
    builder
        .build(&party, &batch.transactions)
        .context("Failed to build SEPA message")
}

fn self_check(config: &Config, message: &SepaMessage) -> Result<ValidationResult> {
    let validator =
        SepaXmlValidator::from_config(&config.validation).context("Failed to set up validator")?;
    Ok(validator.validate(message.xml()))
}

fn summary(message: &SepaMessage, path: Option<&Path>) -> serde_json::Value {
    let batch = message.batch();
    serde_json::json!({
        "messageId": batch.message_id,
        "variant": message.variant(),
        "transactions": batch.transaction_count,
        "controlSum": format_amount(batch.control_sum),
        "requestedDate": batch.requested_date,
        "excluded": message.excluded(),
        "path": path,
    })
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report(result: &ValidationResult) -> Result<ExitCode> {
    println!("{}", result.to_json()?);
    Ok(if result.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const BATCH: &str = r#"{
        "party": {
            "name": "TSV Musterstadt e.V.",
            "iban": "DE89 3704 0044 0532 0130 00",
            "bic": "COBADEFFXXX",
            "schemeId": "DE98ZZZ09999999999"
        },
        "transactions": [
            {
                "counterpartyName": "Max Mustermann",
                "counterpartyIban": "GB82WEST12345698765432",
                "amount": "12,50",
                "remittanceText": "Beitrag 2026",
                "dueDate": "2026-11-02"
            },
            {
                "counterpartyName": "Erika Musterfrau",
                "amount": "12,50",
                "dueDate": "2026-11-02"
            }
        ]
    }"#;

    fn write_batch(dir: &Path) -> PathBuf {
        let path = dir.join("batch.json");
        std::fs::write(&path, BATCH).unwrap();
        path
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_build_command() {
        let cli = Cli::try_parse_from([
            "sepa", "build", "--variant", "dd", "--input", "fees.json", "--date", "2026-11-02",
        ])
        .unwrap();
        match cli.command {
            Commands::Build { variant, date, stdout, .. } => {
                assert_eq!(variant, MessageVariant::DirectDebit);
                assert_eq!(date, NaiveDate::from_ymd_opt(2026, 11, 2));
                assert!(!stdout);
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from(["sepa", "build", "--variant", "sct", "--input", "x"]).is_err());
        assert!(Cli::try_parse_from([
            "sepa", "build", "--variant", "dd", "--input", "x", "--out", "d", "--stdout"
        ])
        .is_err());
    }

    #[test]
    fn test_build_from_batch_file() {
        let dir = tempfile::tempdir().unwrap();
        let batch = BatchInput::load(&write_batch(dir.path())).unwrap();
        assert_eq!(batch.transactions.len(), 2);
        assert_eq!(batch.transactions[1].counterparty_iban, None);

        let config = Config::default();
        let message = build(&config, MessageVariant::DirectDebit, &batch, None).unwrap();
        assert_eq!(message.batch().transaction_count, 1);
        assert!(self_check(&config, &message).unwrap().valid);

        let path = message.write_to_dir(dir.path()).unwrap();
        let summary = summary(&message, Some(&path));
        assert_eq!(summary["controlSum"], "12.50");
        assert_eq!(summary["variant"], "direct-debit");
        assert_eq!(summary["excluded"][0]["index"], 1);
    }

    #[test]
    fn test_build_errors_carry_context() {
        let dir = tempfile::tempdir().unwrap();
        let batch = BatchInput::load(&write_batch(dir.path())).unwrap();

        // Credit transfers reject records without IBAN
        let err = build(&Config::default(), MessageVariant::CreditTransfer, &batch, None).unwrap_err();
        assert!(err.to_string().contains("Failed to build SEPA message"));

        let err = BatchInput::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read batch file"));
    }
}
