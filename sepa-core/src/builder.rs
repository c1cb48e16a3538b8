//! ISO 20022 payment initiation builder
//!
//! Generates pain.001.001.03 (CustomerCreditTransferInitiation) and
//! pain.008.001.02 (CustomerDirectDebitInitiation) documents: one group
//! header, one payment information block and one transaction block per
//! included record.
//!
//! # Inclusion policy
//!
//! - A record without IBAN is excluded or rejects the batch, per
//!   [`MissingIbanConfig`](crate::config::MissingIbanConfig)
//! - A record with a malformed IBAN, BIC or amount always rejects the batch
//!
//! # Example Output
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <Document xmlns="urn:iso:std:iso:20022:tech:xsd:pain.008.001.02">
//!   <CstmrDrctDbtInitn>
//!     <GrpHdr>
//!       <MsgId>SEPA-20261016093000-AB12CD34</MsgId>
//!       <CreDtTm>2026-10-16T09:30:00</CreDtTm>
//!       <NbOfTxs>1</NbOfTxs>
//!       <CtrlSum>25.00</CtrlSum>
//!       <InitgPty><Nm>TSV Musterstadt e.V.</Nm></InitgPty>
//!     </GrpHdr>
//!     <PmtInf>
//!       ...
//!       <DrctDbtTxInf>...</DrctDbtTxInf>
//!     </PmtInf>
//!   </CstmrDrctDbtInitn>
//! </Document>
//! ```

use crate::{
    bic::BicValidator,
    clock::{Clock, IdSource, SystemClock, UuidIdSource},
    config::{BuilderConfig, MissingIbanPolicy},
    document::{XmlDocument, XmlNode},
    error::{BuildError, Field},
    iban::IbanValidator,
    sanitizer,
    types::*,
    Result,
};
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

static AMOUNT_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?[0-9]+(\.[0-9]+)?$").expect("static amount pattern"));

/// Agent id used when no BIC is known
const NOT_PROVIDED: &str = "NOTPROVIDED";

/// Builds one SEPA message per call
pub struct SepaMessageBuilder {
    variant: MessageVariant,
    config: BuilderConfig,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdSource>,
    requested_date: Option<NaiveDate>,
}

impl std::fmt::Debug for SepaMessageBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SepaMessageBuilder")
            .field("variant", &self.variant)
            .field("config", &self.config)
            .field("requested_date", &self.requested_date)
            .finish_non_exhaustive()
    }
}

impl SepaMessageBuilder {
    /// Create builder using the wall clock and random id suffixes
    pub fn new(variant: MessageVariant, config: BuilderConfig) -> Self {
        Self {
            variant,
            config,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidIdSource),
            requested_date: None,
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Replace the id suffix source
    pub fn with_id_source(mut self, ids: impl IdSource + 'static) -> Self {
        self.ids = Arc::new(ids);
        self
    }

    /// Fix the requested collection or execution date
    pub fn requested_date(mut self, date: NaiveDate) -> Self {
        self.requested_date = Some(date);
        self
    }

    /// Message variant
    pub fn variant(&self) -> MessageVariant {
        self.variant
    }

    /// Build a message for `party` from raw records
    ///
    /// Fails without emitting anything on the first batch-invalidating
    /// condition.
    pub fn build(&self, party: &Party, records: &[TransactionRecord]) -> Result<SepaMessage> {
        if self.variant == MessageVariant::DirectDebit && party.scheme_id().is_none() {
            return Err(BuildError::MissingSchemeId.into());
        }
        if records.is_empty() {
            return Err(BuildError::EmptyBatch.into());
        }

        let now = self.clock.now();
        let stamp = now.format("%Y%m%d%H%M%S").to_string();
        let suffix = self.suffix();
        let run_id = format!("{}{}", stamp, suffix);

        let mut transactions = Vec::with_capacity(records.len());
        let mut excluded = Vec::new();

        for (index, record) in records.iter().enumerate() {
            match self.prepare_transaction(index, record, &run_id, now)? {
                Some(transaction) => transactions.push(transaction),
                None => {
                    tracing::warn!(
                        index,
                        counterparty = %record.counterparty_name,
                        "Excluding transaction without IBAN"
                    );
                    excluded.push(ExcludedRecord {
                        index,
                        counterparty_name: record.counterparty_name.clone(),
                    });
                }
            }
        }

        if transactions.is_empty() {
            return Err(BuildError::EmptyBatch.into());
        }

        let control_sum = transactions.iter().try_fold(Decimal::ZERO, |sum, t| {
            sum.checked_add(t.amount)
                .ok_or(BuildError::ControlSumOverflow { index: t.input_index })
        })?;
        let today = now.date_naive();
        let requested_date = self
            .requested_date
            .or_else(|| transactions.iter().map(|t| t.due_date).min())
            .unwrap_or(today);
        if requested_date < today {
            tracing::warn!(
                %requested_date,
                %today,
                "Requested date lies before the creation date"
            );
        }

        let message_id = sanitizer::truncate_chars(
            &format!("{}-{}-{}", self.config.message_id_prefix, stamp, suffix),
            MAX_ID_LEN,
        );
        let batch = Batch {
            message_id,
            payment_information_id: format!("PMT-{}-{}", stamp, suffix),
            creation_timestamp: now,
            requested_date,
            transaction_count: transactions.len(),
            control_sum,
            transactions,
            excluded,
        };

        let xml = self.document(party, &batch).to_xml(self.config.pretty_print)?;

        tracing::info!(
            message_id = %batch.message_id,
            variant = %self.variant,
            transactions = batch.transaction_count,
            control_sum = %format_amount(batch.control_sum),
            excluded = batch.excluded.len(),
            "Built SEPA message"
        );

        Ok(SepaMessage {
            variant: self.variant,
            batch,
            xml,
        })
    }

    /// Id suffix restricted to uppercase alphanumerics
    fn suffix(&self) -> String {
        let suffix: String = self
            .ids
            .next_suffix()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(8)
            .map(|c| c.to_ascii_uppercase())
            .collect();
        if suffix.is_empty() {
            "0".to_string()
        } else {
            suffix
        }
    }

    /// Validate one record; `None` when it is excluded
    fn prepare_transaction(
        &self,
        index: usize,
        record: &TransactionRecord,
        run_id: &str,
        now: DateTime<Utc>,
    ) -> std::result::Result<Option<Transaction>, BuildError> {
        let invalid = |field: Field, code: ErrorCode| BuildError::InvalidParticipant {
            index,
            field,
            code,
        };

        let name = sanitizer::normalize_name(&record.counterparty_name);
        if name.is_empty() {
            return Err(invalid(Field::CounterpartyName, ErrorCode::FieldMissing));
        }

        let iban = match record
            .counterparty_iban
            .as_deref()
            .map(sanitizer::normalize_iban)
            .filter(|iban| !iban.is_empty())
        {
            Some(iban) => iban,
            None => {
                return match self.config.missing_iban.for_variant(self.variant) {
                    MissingIbanPolicy::Exclude => Ok(None),
                    MissingIbanPolicy::Reject => Err(BuildError::MissingIban { index }),
                };
            }
        };
        if let Some(code) = IbanValidator::validate(&iban).error_code {
            return Err(invalid(Field::CounterpartyIban, code));
        }

        let bic = record
            .counterparty_bic
            .as_deref()
            .map(sanitizer::normalize_bic)
            .filter(|bic| !bic.is_empty());
        if let Some(bic) = &bic {
            if let Some(code) = BicValidator::validate(bic).error_code {
                return Err(invalid(Field::CounterpartyBic, code));
            }
        }

        let out_of_range = |amount| BuildError::AmountOutOfRange {
            index,
            amount,
            max: self.config.max_amount,
        };
        let amount = match parse_amount(&record.amount) {
            Ok(amount) => amount,
            Err(AmountError::Invalid(code)) => return Err(invalid(Field::Amount, code)),
            Err(AmountError::Overflow(bound)) => return Err(out_of_range(bound)),
        };
        if amount <= Decimal::ZERO || amount > self.config.max_amount {
            return Err(out_of_range(amount));
        }

        let instruction_id = format!("{}-{:05}", run_id, index + 1);
        let end_to_end_id = record
            .end_to_end_id
            .as_deref()
            .map(sanitizer::normalize_name)
            .filter(|id| !id.is_empty())
            .map(|id| sanitizer::truncate_chars(&id, MAX_ID_LEN))
            .unwrap_or_else(|| instruction_id.clone());

        let mandate = match self.variant {
            MessageVariant::CreditTransfer => None,
            MessageVariant::DirectDebit => {
                let id = match record
                    .mandate_id
                    .as_deref()
                    .map(sanitizer::normalize_name)
                    .filter(|id| !id.is_empty())
                {
                    Some(id) if id.chars().count() > MAX_ID_LEN => {
                        return Err(invalid(Field::MandateId, ErrorCode::InvalidLength));
                    }
                    Some(id) => id,
                    None => end_to_end_id.clone(),
                };
                Some(Mandate {
                    id,
                    signed_on: record.mandate_signed_on.unwrap_or_else(|| now.date_naive()),
                })
            }
        };

        Ok(Some(Transaction {
            input_index: index,
            counterparty_name: sanitizer::truncate_chars(&name, MAX_NAME_LEN),
            counterparty_iban: iban,
            counterparty_bic: bic,
            amount,
            remittance_text: sanitizer::truncate_chars(
                &sanitizer::normalize_name(&record.remittance_text),
                MAX_REMITTANCE_LEN,
            ),
            due_date: record.due_date,
            instruction_id,
            end_to_end_id,
            mandate,
        }))
    }

    /// Assemble the document tree
    fn document(&self, party: &Party, batch: &Batch) -> XmlDocument {
        let variant = self.variant;
        let count = batch.transaction_count.to_string();
        let control_sum = format_amount(batch.control_sum);
        let initiating_party = self
            .config
            .initiating_party_name
            .as_deref()
            .map(sanitizer::normalize_name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| party.name().to_string());

        let group_header = XmlNode::new("GrpHdr")
            .child(XmlNode::leaf("MsgId", &batch.message_id))
            .child(XmlNode::leaf(
                "CreDtTm",
                batch.creation_timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            ))
            .child(XmlNode::leaf("NbOfTxs", &count))
            .child(XmlNode::leaf("CtrlSum", &control_sum))
            .child(XmlNode::new("InitgPty").child(XmlNode::leaf(
                "Nm",
                sanitizer::truncate_chars(&initiating_party, MAX_NAME_LEN),
            )));

        let mut payment_type = XmlNode::new("PmtTpInf")
            .child(XmlNode::new("SvcLvl").child(XmlNode::leaf("Cd", "SEPA")));
        if variant == MessageVariant::DirectDebit {
            payment_type = payment_type
                .child(
                    XmlNode::new("LclInstrm")
                        .child(XmlNode::leaf("Cd", self.config.local_instrument.as_str())),
                )
                .child(XmlNode::leaf("SeqTp", self.config.sequence_type.as_str()));
        }

        let own = variant.own_side();
        let payment_info = XmlNode::new("PmtInf")
            .child(XmlNode::leaf("PmtInfId", &batch.payment_information_id))
            .child(XmlNode::leaf("PmtMtd", variant.payment_method()))
            .child(XmlNode::leaf("BtchBookg", self.config.batch_booking.to_string()))
            .child(XmlNode::leaf("NbOfTxs", &count))
            .child(XmlNode::leaf("CtrlSum", &control_sum))
            .child(payment_type)
            .child(XmlNode::leaf(
                variant.requested_date_element(),
                batch.requested_date.format("%Y-%m-%d").to_string(),
            ))
            .child(XmlNode::new(own).child(XmlNode::leaf("Nm", party.name())))
            .child(account(&format!("{}Acct", own), party.iban()))
            .child(agent(&format!("{}Agt", own), party.bic()))
            .child(XmlNode::leaf("ChrgBr", "SLEV"))
            .child_opt(party.scheme_id().filter(|_| variant == MessageVariant::DirectDebit).map(scheme_id))
            .children_from(batch.transactions.iter().map(|t| self.transaction(t)));

        XmlDocument::new(
            XmlNode::new("Document")
                .attr("xmlns", variant.namespace())
                .child(
                    XmlNode::new(variant.container())
                        .child(group_header)
                        .child(payment_info),
                ),
        )
    }

    fn transaction(&self, transaction: &Transaction) -> XmlNode {
        let payment_id = XmlNode::new("PmtId")
            .child(XmlNode::leaf("InstrId", &transaction.instruction_id))
            .child(XmlNode::leaf("EndToEndId", &transaction.end_to_end_id));
        let amount = XmlNode::leaf("InstdAmt", format_amount(transaction.amount)).attr("Ccy", "EUR");
        let remittance = Some(&transaction.remittance_text)
            .filter(|text| !text.is_empty())
            .map(|text| XmlNode::new("RmtInf").child(XmlNode::leaf("Ustrd", text)));
        let counterparty = self.variant.counterparty_side();
        let counterparty_agent = format!("{}Agt", counterparty);

        let node = XmlNode::new(self.variant.transaction_element()).child(payment_id);
        let node = match self.variant {
            MessageVariant::CreditTransfer => node.child(XmlNode::new("Amt").child(amount)).child_opt(
                transaction
                    .counterparty_bic
                    .as_deref()
                    .map(|bic| agent(&counterparty_agent, Some(bic))),
            ),
            MessageVariant::DirectDebit => {
                let mandate = transaction.mandate.as_ref().map(|mandate| {
                    XmlNode::new("DrctDbtTx").child(
                        XmlNode::new("MndtRltdInf")
                            .child(XmlNode::leaf("MndtId", &mandate.id))
                            .child(XmlNode::leaf(
                                "DtOfSgntr",
                                mandate.signed_on.format("%Y-%m-%d").to_string(),
                            )),
                    )
                });
                node.child(amount)
                    .child_opt(mandate)
                    .child(agent(&counterparty_agent, transaction.counterparty_bic.as_deref()))
            }
        };

        node.child(XmlNode::new(counterparty).child(XmlNode::leaf("Nm", &transaction.counterparty_name)))
            .child(account(&format!("{}Acct", counterparty), &transaction.counterparty_iban))
            .child_opt(remittance)
    }
}

fn account(element: &str, iban: &str) -> XmlNode {
    XmlNode::new(element).child(XmlNode::new("Id").child(XmlNode::leaf("IBAN", iban)))
}

fn agent(element: &str, bic: Option<&str>) -> XmlNode {
    let institution = match bic {
        Some(bic) => XmlNode::new("FinInstnId").child(XmlNode::leaf("BIC", bic)),
        None => XmlNode::new("FinInstnId")
            .child(XmlNode::new("Othr").child(XmlNode::leaf("Id", NOT_PROVIDED))),
    };
    XmlNode::new(element).child(institution)
}

fn scheme_id(id: &str) -> XmlNode {
    XmlNode::new("CdtrSchmeId").child(
        XmlNode::new("Id").child(
            XmlNode::new("PrvtId").child(
                XmlNode::new("Othr")
                    .child(XmlNode::leaf("Id", id))
                    .child(XmlNode::new("SchmeNm").child(XmlNode::leaf("Prtry", "SEPA"))),
            ),
        ),
    )
}

/// Why a raw amount was refused
#[derive(Debug, PartialEq)]
enum AmountError {
    Invalid(ErrorCode),
    /// Well-formed but beyond the decimal range; carries the bound it passed
    Overflow(Decimal),
}

/// Parse a raw amount; more than two significant fraction digits is a format error
fn parse_amount(raw: &str) -> std::result::Result<Decimal, AmountError> {
    let normalized = sanitizer::normalize_amount(raw);
    if normalized.is_empty() {
        return Err(AmountError::Invalid(ErrorCode::FieldMissing));
    }
    if !AMOUNT_FORMAT.is_match(&normalized) {
        return Err(AmountError::Invalid(ErrorCode::InvalidFormat));
    }
    let amount = Decimal::from_str(&normalized).map_err(|_| {
        AmountError::Overflow(if normalized.starts_with('-') {
            Decimal::MIN
        } else {
            Decimal::MAX
        })
    })?;
    if amount.normalize().scale() > 2 {
        return Err(AmountError::Invalid(ErrorCode::InvalidFormat));
    }
    Ok(amount)
}

/// Generated message with the batch it was built from
#[derive(Debug, Clone)]
pub struct SepaMessage {
    variant: MessageVariant,
    batch: Batch,
    xml: String,
}

impl SepaMessage {
    /// Message variant
    pub fn variant(&self) -> MessageVariant {
        self.variant
    }

    /// Batch totals and included transactions
    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Message id
    pub fn message_id(&self) -> &str {
        &self.batch.message_id
    }

    /// Records skipped for missing IBAN
    pub fn excluded(&self) -> &[ExcludedRecord] {
        &self.batch.excluded
    }

    /// Serialized document
    pub fn xml(&self) -> &str {
        &self.xml
    }

    /// Write `<MsgId>.xml` into `dir`, creating it if needed
    pub fn write_to_dir(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        let path = dir.join(format!("{}.xml", self.batch.message_id));
        std::fs::write(&path, &self.xml)?;

        tracing::info!("Generated SEPA file: {}", path.display());
        Ok(path)
    }
}
