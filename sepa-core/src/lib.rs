//! SEPA Payment Engine
//!
//! Generates and validates ISO 20022 SEPA payment initiation messages for
//! club fee collection and payouts.
//!
//! # Architecture
//!
//! 1. **Sanitize**: Raw names, identifiers and amounts are normalized
//! 2. **Validate**: IBAN, BIC and creditor identifiers are checked (format, length, Mod-97)
//! 3. **Build**: One pain.008 (direct debit) or pain.001 (credit transfer) document per batch
//! 4. **Verify**: The XML validator re-checks any document, generated or received
//!
//! Every operation is a pure computation over its inputs. The only ambient
//! inputs of the builder, the clock and the id source, are injectable.
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use sepa_core::{
//!     config::BuilderConfig, MessageVariant, Party, SepaMessageBuilder, SepaXmlValidator,
//!     TransactionRecord,
//! };
//!
//! fn main() -> sepa_core::Result<()> {
//!     let club = Party::new(
//!         "TSV Musterstadt e.V.",
//!         "DE89 3704 0044 0532 0130 00",
//!         Some("COBADEFFXXX"),
//!         Some("DE98ZZZ09999999999"),
//!     )?;
//!     let due = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap();
//!     let fees = vec![
//!         TransactionRecord::new("Max Mustermann", "GB82WEST12345698765432", "12,50", "Beitrag 2026", due),
//!         TransactionRecord::new("Erika Musterfrau", "", "12,50", "Beitrag 2026", due).without_iban(),
//!     ];
//!
//!     let message = SepaMessageBuilder::new(MessageVariant::DirectDebit, BuilderConfig::default())
//!         .build(&club, &fees)?;
//!     assert_eq!(message.batch().transaction_count, 1);
//!     assert_eq!(message.excluded().len(), 1);
//!
//!     assert!(SepaXmlValidator::new().validate(message.xml()).valid);
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod bic;
pub mod builder;
pub mod clock;
pub mod config;
pub mod countries;
pub mod creditor_id;
pub mod document;
pub mod error;
pub mod iban;
pub mod sanitizer;
pub mod types;
pub mod validator;
pub mod xsd;

// Re-exports
pub use bic::BicValidator;
pub use builder::{SepaMessage, SepaMessageBuilder};
pub use config::Config;
pub use creditor_id::CreditorIdValidator;
pub use error::{BuildError, Error, Result};
pub use iban::IbanValidator;
pub use types::*;
pub use validator::SepaXmlValidator;
pub use xsd::{SchemaViolation, XsdSchema};
