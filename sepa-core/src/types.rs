//! Core types for the SEPA engine

use crate::{
    bic::BicValidator,
    creditor_id::CreditorIdValidator,
    error::{BuildError, Field},
    iban::IbanValidator,
    sanitizer,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Maximum length of party and counterparty names in the message
pub const MAX_NAME_LEN: usize = 70;

/// Maximum length of unstructured remittance text
pub const MAX_REMITTANCE_LEN: usize = 140;

/// Maximum length of ISO 20022 identifiers (MsgId, EndToEndId, ...)
pub const MAX_ID_LEN: usize = 35;

/// Error codes reported by the validators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Malformed identifier or unknown country
    InvalidFormat,
    /// Identifier has the wrong length
    InvalidLength,
    /// Mod-97 check failed
    InvalidChecksum,
    /// Mandatory element absent or blank
    FieldMissing,
    /// Element present but not acceptable
    FieldInvalid,
    /// Input is not well-formed XML
    XmlInvalid,
    /// Message skeleton not recognizable as SEPA
    SepaStructureInvalid,
    /// Document does not satisfy the configured XSD
    SchemaMismatch,
}

impl ErrorCode {
    /// Wire name of the code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidFormat => "INVALID_FORMAT",
            ErrorCode::InvalidLength => "INVALID_LENGTH",
            ErrorCode::InvalidChecksum => "INVALID_CHECKSUM",
            ErrorCode::FieldMissing => "FIELD_MISSING",
            ErrorCode::FieldInvalid => "FIELD_INVALID",
            ErrorCode::XmlInvalid => "XML_INVALID",
            ErrorCode::SepaStructureInvalid => "SEPA_STRUCTURE_INVALID",
            ErrorCode::SchemaMismatch => "SCHEMA_MISMATCH",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a validator
///
/// Validators return this for every expected failure mode; callers branch on
/// `error_code`, never on `message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Whether the input passed
    pub valid: bool,
    /// Failure code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    /// Human-readable explanation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Structured details (element path, expected/actual values)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<BTreeMap<String, String>>,
}

impl ValidationResult {
    /// Passing result
    pub fn success() -> Self {
        Self {
            valid: true,
            error_code: None,
            message: None,
            details: None,
        }
    }

    /// Failing result
    pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            valid: false,
            error_code: Some(code),
            message: Some(message.into()),
            details: None,
        }
    }

    /// Attach a detail entry
    pub fn with_detail(mut self, key: &str, value: impl Into<String>) -> Self {
        self.details
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.into());
        self
    }

    /// Detail value by key
    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details
            .as_ref()
            .and_then(|d| d.get(key))
            .map(String::as_str)
    }

    /// Whether the input passed
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Pretty-printed JSON report
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// ISO 20022 message family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageVariant {
    /// pain.001 customer credit transfer initiation (club pays out)
    CreditTransfer,
    /// pain.008 customer direct debit initiation (club collects fees)
    DirectDebit,
}

impl MessageVariant {
    /// XML namespace of the message
    pub fn namespace(&self) -> &'static str {
        match self {
            MessageVariant::CreditTransfer => "urn:iso:std:iso:20022:tech:xsd:pain.001.001.03",
            MessageVariant::DirectDebit => "urn:iso:std:iso:20022:tech:xsd:pain.008.001.02",
        }
    }

    /// Message family prefix of the namespace (`pain.001` / `pain.008`)
    pub fn family(&self) -> &'static str {
        match self {
            MessageVariant::CreditTransfer => "pain.001",
            MessageVariant::DirectDebit => "pain.008",
        }
    }

    /// Payment-initiation container element
    pub fn container(&self) -> &'static str {
        match self {
            MessageVariant::CreditTransfer => "CstmrCdtTrfInitn",
            MessageVariant::DirectDebit => "CstmrDrctDbtInitn",
        }
    }

    /// `PmtMtd` code
    pub fn payment_method(&self) -> &'static str {
        match self {
            MessageVariant::CreditTransfer => "TRF",
            MessageVariant::DirectDebit => "DD",
        }
    }

    /// Per-transaction element
    pub fn transaction_element(&self) -> &'static str {
        match self {
            MessageVariant::CreditTransfer => "CdtTrfTxInf",
            MessageVariant::DirectDebit => "DrctDbtTxInf",
        }
    }

    /// Own-side party element prefix (`Dbtr` pays, `Cdtr` collects)
    pub fn own_side(&self) -> &'static str {
        match self {
            MessageVariant::CreditTransfer => "Dbtr",
            MessageVariant::DirectDebit => "Cdtr",
        }
    }

    /// Counterparty element prefix
    pub fn counterparty_side(&self) -> &'static str {
        match self {
            MessageVariant::CreditTransfer => "Cdtr",
            MessageVariant::DirectDebit => "Dbtr",
        }
    }

    /// Requested date element of the payment information block
    pub fn requested_date_element(&self) -> &'static str {
        match self {
            MessageVariant::CreditTransfer => "ReqdExctnDt",
            MessageVariant::DirectDebit => "ReqdColltnDt",
        }
    }

    /// Variant owning an initiation container
    pub fn from_container(name: &str) -> Option<Self> {
        match name {
            "CstmrCdtTrfInitn" => Some(MessageVariant::CreditTransfer),
            "CstmrDrctDbtInitn" => Some(MessageVariant::DirectDebit),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageVariant::CreditTransfer => write!(f, "credit-transfer"),
            MessageVariant::DirectDebit => write!(f, "direct-debit"),
        }
    }
}

impl FromStr for MessageVariant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "credit-transfer" | "ct" | "pain.001" => Ok(MessageVariant::CreditTransfer),
            "direct-debit" | "dd" | "pain.008" => Ok(MessageVariant::DirectDebit),
            other => Err(format!("unknown message variant: {}", other)),
        }
    }
}

/// Own side of the message: debtor for credit transfers, creditor for direct debits
///
/// Immutable and validated at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    name: String,
    iban: String,
    bic: Option<String>,
    scheme_id: Option<String>,
}

impl Party {
    /// Normalize and validate a party
    pub fn new(
        name: &str,
        iban: &str,
        bic: Option<&str>,
        scheme_id: Option<&str>,
    ) -> std::result::Result<Self, BuildError> {
        let name = sanitizer::normalize_name(name);
        if name.is_empty() {
            return Err(BuildError::MissingPartyName);
        }
        let name_len = name.chars().count();
        if name_len > MAX_NAME_LEN {
            return Err(BuildError::NameTooLong {
                max: MAX_NAME_LEN,
                actual: name_len,
            });
        }

        let iban = sanitizer::normalize_iban(iban);
        let result = IbanValidator::validate(&iban);
        if let Some(code) = result.error_code {
            return Err(BuildError::InvalidParty {
                field: Field::PartyIban,
                code,
            });
        }

        let bic = match bic.map(sanitizer::normalize_bic).filter(|b| !b.is_empty()) {
            Some(bic) => {
                let result = BicValidator::validate(&bic);
                if let Some(code) = result.error_code {
                    return Err(BuildError::InvalidParty {
                        field: Field::PartyBic,
                        code,
                    });
                }
                Some(bic)
            }
            None => None,
        };

        let scheme_id = match scheme_id
            .map(sanitizer::normalize_creditor_id)
            .filter(|s| !s.is_empty())
        {
            Some(id) => {
                let result = CreditorIdValidator::validate(&id);
                if let Some(code) = result.error_code {
                    return Err(BuildError::InvalidParty {
                        field: Field::SchemeId,
                        code,
                    });
                }
                Some(id)
            }
            None => None,
        };

        Ok(Self {
            name,
            iban,
            bic,
            scheme_id,
        })
    }

    /// Party name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Party IBAN (electronic format)
    pub fn iban(&self) -> &str {
        &self.iban
    }

    /// Party BIC
    pub fn bic(&self) -> Option<&str> {
        self.bic.as_deref()
    }

    /// Creditor scheme identifier
    pub fn scheme_id(&self) -> Option<&str> {
        self.scheme_id.as_deref()
    }
}

/// Raw transaction record as handed over by the fee collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Member or payee name
    pub counterparty_name: String,
    /// IBAN on file, if any
    #[serde(default)]
    pub counterparty_iban: Option<String>,
    /// BIC on file, if any
    #[serde(default)]
    pub counterparty_bic: Option<String>,
    /// Amount as entered (`"12,50 €"`, `"12.50"`)
    pub amount: String,
    /// Purpose of the payment
    #[serde(default)]
    pub remittance_text: String,
    /// Due (direct debit) or execution (credit transfer) date
    pub due_date: NaiveDate,
    /// Caller-assigned end-to-end reference
    #[serde(default)]
    pub end_to_end_id: Option<String>,
    /// Direct debit mandate reference
    #[serde(default)]
    pub mandate_id: Option<String>,
    /// Direct debit mandate signature date
    #[serde(default)]
    pub mandate_signed_on: Option<NaiveDate>,
}

impl TransactionRecord {
    /// Create a record with the mandatory fields
    pub fn new(
        counterparty_name: impl Into<String>,
        counterparty_iban: impl Into<String>,
        amount: impl Into<String>,
        remittance_text: impl Into<String>,
        due_date: NaiveDate,
    ) -> Self {
        Self {
            counterparty_name: counterparty_name.into(),
            counterparty_iban: Some(counterparty_iban.into()),
            counterparty_bic: None,
            amount: amount.into(),
            remittance_text: remittance_text.into(),
            due_date,
            end_to_end_id: None,
            mandate_id: None,
            mandate_signed_on: None,
        }
    }

    /// Set the counterparty BIC
    pub fn with_bic(mut self, bic: impl Into<String>) -> Self {
        self.counterparty_bic = Some(bic.into());
        self
    }

    /// Drop the counterparty IBAN ("no bank details on file")
    pub fn without_iban(mut self) -> Self {
        self.counterparty_iban = None;
        self
    }

    /// Set the end-to-end reference
    pub fn with_end_to_end_id(mut self, id: impl Into<String>) -> Self {
        self.end_to_end_id = Some(id.into());
        self
    }

    /// Set the mandate reference and signature date
    pub fn with_mandate(mut self, id: impl Into<String>, signed_on: NaiveDate) -> Self {
        self.mandate_id = Some(id.into());
        self.mandate_signed_on = Some(signed_on);
        self
    }
}

/// Direct debit mandate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mandate {
    /// Mandate reference
    pub id: String,
    /// Signature date
    pub signed_on: NaiveDate,
}

/// Validated line item of a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Position of the source record in the input list
    pub input_index: usize,
    /// Counterparty name, normalized and truncated to 70 characters
    pub counterparty_name: String,
    /// Counterparty IBAN
    pub counterparty_iban: String,
    /// Counterparty BIC
    pub counterparty_bic: Option<String>,
    /// Amount, full precision
    pub amount: Decimal,
    /// Remittance text, normalized and truncated to 140 characters
    pub remittance_text: String,
    /// Due or execution date
    pub due_date: NaiveDate,
    /// Instruction id, unique within the run
    pub instruction_id: String,
    /// End-to-end id
    pub end_to_end_id: String,
    /// Mandate (direct debit only)
    pub mandate: Option<Mandate>,
}

/// Record left out of a batch because no IBAN is on file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedRecord {
    /// Position in the input list
    pub index: usize,
    /// Counterparty name as supplied
    pub counterparty_name: String,
}

/// One generated payment batch
///
/// `control_sum` is always the exact sum of `transactions[*].amount` and
/// `transaction_count` their number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Batch {
    /// Message id, unique per generation
    pub message_id: String,
    /// Payment information id
    pub payment_information_id: String,
    /// Creation timestamp
    pub creation_timestamp: DateTime<Utc>,
    /// Requested collection or execution date
    pub requested_date: NaiveDate,
    /// Included transactions, input order
    pub transactions: Vec<Transaction>,
    /// Exact sum of included amounts
    pub control_sum: Decimal,
    /// Number of included transactions
    pub transaction_count: usize,
    /// Records skipped for missing IBAN
    pub excluded: Vec<ExcludedRecord>,
}

/// Format an amount with exactly two fraction digits, half away from zero
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}
