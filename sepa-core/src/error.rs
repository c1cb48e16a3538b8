//! Error types for the SEPA engine

use crate::types::ErrorCode;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Result type for SEPA engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// SEPA engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Batch-invalidating condition detected while building a message
    #[error("Validation error: {0}")]
    Validation(#[from] BuildError),

    /// XSD schema could not be loaded
    #[error("Schema error: {0}")]
    Schema(String),

    /// XML serialization error
    #[error("XML error: {0}")]
    Xml(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Sub-reason of a `VALIDATION_ERROR` raised by the message builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationReason {
    /// No transaction left to emit
    EmptyBatch,
    /// Own-side party has no name
    MissingPartyName,
    /// Own-side party name exceeds 70 characters
    NameTooLong,
    /// Own-side party IBAN, BIC or scheme id is malformed
    InvalidParty,
    /// DirectDebit without creditor scheme id
    MissingSchemeId,
    /// Counterparty without IBAN under the reject policy
    MissingIban,
    /// Counterparty field failed validation
    InvalidParticipant,
    /// Amount not in (0, max]
    AmountOutOfRange,
    /// Batch total beyond the decimal range
    ControlSumOverflow,
}

impl ValidationReason {
    /// Wire name of the reason
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationReason::EmptyBatch => "EMPTY_BATCH",
            ValidationReason::MissingPartyName => "MISSING_PARTY_NAME",
            ValidationReason::NameTooLong => "NAME_TOO_LONG",
            ValidationReason::InvalidParty => "INVALID_PARTY",
            ValidationReason::MissingSchemeId => "MISSING_SCHEME_ID",
            ValidationReason::MissingIban => "MISSING_IBAN",
            ValidationReason::InvalidParticipant => "INVALID_PARTICIPANT",
            ValidationReason::AmountOutOfRange => "AMOUNT_OUT_OF_RANGE",
            ValidationReason::ControlSumOverflow => "CONTROL_SUM_OVERFLOW",
        }
    }
}

impl std::fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field of a party or transaction record named in a [`BuildError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    /// Own-side party name
    PartyName,
    /// Own-side IBAN
    PartyIban,
    /// Own-side BIC
    PartyBic,
    /// Creditor scheme id
    SchemeId,
    /// Counterparty name
    CounterpartyName,
    /// Counterparty IBAN
    CounterpartyIban,
    /// Counterparty BIC
    CounterpartyBic,
    /// Transaction amount
    Amount,
    /// Mandate reference
    MandateId,
}

impl Field {
    /// Field name as used in error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::PartyName => "name",
            Field::PartyIban => "iban",
            Field::PartyBic => "bic",
            Field::SchemeId => "schemeId",
            Field::CounterpartyName => "counterpartyName",
            Field::CounterpartyIban => "counterpartyIban",
            Field::CounterpartyBic => "counterpartyBic",
            Field::Amount => "amount",
            Field::MandateId => "mandateId",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Batch-invalidating condition. No document is emitted once one is raised.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    /// Empty transaction list, or every record excluded
    #[error("batch contains no transactions")]
    EmptyBatch,

    /// Party name blank after normalization
    #[error("party name is missing")]
    MissingPartyName,

    /// Party name longer than the 70 character limit
    #[error("party name exceeds {max} characters ({actual})")]
    NameTooLong {
        /// Limit
        max: usize,
        /// Actual length in characters
        actual: usize,
    },

    /// Own-side identifier rejected by a leaf validator
    #[error("party {field} is invalid ({code})")]
    InvalidParty {
        /// Offending field
        field: Field,
        /// Leaf validator code
        code: ErrorCode,
    },

    /// DirectDebit requires a creditor scheme id
    #[error("creditor scheme id is required for direct debit")]
    MissingSchemeId,

    /// Counterparty has no IBAN and the variant rejects such records
    #[error("transaction {index}: counterparty has no IBAN")]
    MissingIban {
        /// 0-based input position
        index: usize,
    },

    /// Counterparty field rejected
    #[error("transaction {index}: {field} is invalid ({code})")]
    InvalidParticipant {
        /// 0-based input position
        index: usize,
        /// Offending field
        field: Field,
        /// Leaf validator code
        code: ErrorCode,
    },

    /// Amount not positive or above the configured maximum
    #[error("transaction {index}: amount {amount} outside (0, {max}]")]
    AmountOutOfRange {
        /// 0-based input position
        index: usize,
        /// Parsed amount
        amount: Decimal,
        /// Configured maximum
        max: Decimal,
    },

    /// Adding the transaction pushed the control sum past the decimal range
    #[error("transaction {index}: control sum exceeds the representable range")]
    ControlSumOverflow {
        /// 0-based input position
        index: usize,
    },
}

impl BuildError {
    /// Error code shared by every builder failure
    pub fn code(&self) -> &'static str {
        "VALIDATION_ERROR"
    }

    /// Sub-reason of the failure
    pub fn reason(&self) -> ValidationReason {
        match self {
            BuildError::EmptyBatch => ValidationReason::EmptyBatch,
            BuildError::MissingPartyName => ValidationReason::MissingPartyName,
            BuildError::NameTooLong { .. } => ValidationReason::NameTooLong,
            BuildError::InvalidParty { .. } => ValidationReason::InvalidParty,
            BuildError::MissingSchemeId => ValidationReason::MissingSchemeId,
            BuildError::MissingIban { .. } => ValidationReason::MissingIban,
            BuildError::InvalidParticipant { .. } => ValidationReason::InvalidParticipant,
            BuildError::AmountOutOfRange { .. } => ValidationReason::AmountOutOfRange,
            BuildError::ControlSumOverflow { .. } => ValidationReason::ControlSumOverflow,
        }
    }

    /// Input position of the offending transaction, if any
    pub fn transaction_index(&self) -> Option<usize> {
        match self {
            BuildError::MissingIban { index }
            | BuildError::InvalidParticipant { index, .. }
            | BuildError::AmountOutOfRange { index, .. }
            | BuildError::ControlSumOverflow { index } => Some(*index),
            _ => None,
        }
    }

    /// Field named by the failure, if any
    pub fn field(&self) -> Option<Field> {
        match self {
            BuildError::MissingPartyName | BuildError::NameTooLong { .. } => {
                Some(Field::PartyName)
            }
            BuildError::InvalidParty { field, .. }
            | BuildError::InvalidParticipant { field, .. } => Some(*field),
            BuildError::MissingSchemeId => Some(Field::SchemeId),
            BuildError::MissingIban { .. } => Some(Field::CounterpartyIban),
            BuildError::AmountOutOfRange { .. } | BuildError::ControlSumOverflow { .. } => {
                Some(Field::Amount)
            }
            BuildError::EmptyBatch => None,
        }
    }
}
