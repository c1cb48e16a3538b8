//! SEPA XML validation
//!
//! Validates generated and received pain.001 / pain.008 documents
//! independently of the builder. Checks run in a fixed order and the first
//! failure is reported:
//!
//! 1. Well-formed XML → `XML_INVALID`
//! 2. `Document`, initiation container, `GrpHdr` and at least one `PmtInf` → `SEPA_STRUCTURE_INVALID`
//! 3. Configured XSD → `SCHEMA_MISMATCH`
//! 4. Mandatory business fields per payment block → `FIELD_MISSING` / `FIELD_INVALID`
//! 5. `NbOfTxs` / `CtrlSum` against the transactions present → `FIELD_INVALID`
//! 6. Identifier checksums when strict → `FIELD_INVALID`
//!
//! Elements are matched by local name so documents with prefixed namespaces
//! are accepted.

use crate::{
    bic::BicValidator,
    config::ValidationConfig,
    creditor_id::CreditorIdValidator,
    iban::IbanValidator,
    types::{format_amount, ErrorCode, MessageVariant, ValidationResult},
    xsd::XsdSchema,
    Result,
};
use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::Node;
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;

static AMOUNT_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+(\.[0-9]{1,2})?$").expect("static amount pattern"));

const DOCUMENT: &str = "Document";

/// Amounts and count of one payment information block
struct PaymentTotals<'a, 'input> {
    node: Node<'a, 'input>,
    path: String,
    amounts: Vec<Decimal>,
}

/// SEPA XML validator
#[derive(Debug, Clone, Default)]
pub struct SepaXmlValidator {
    /// Schema applied before the business checks
    schema: Option<XsdSchema>,

    /// Validate IBAN/BIC/creditor id checksums in the document
    strict_identifiers: bool,
}

impl SepaXmlValidator {
    /// Validator with business checks only
    pub fn new() -> Self {
        Self::default()
    }

    /// Validator configured from `config`, loading the schema if one is set
    pub fn from_config(config: &ValidationConfig) -> Result<Self> {
        let schema = match &config.schema_path {
            Some(path) => Some(XsdSchema::from_file(path)?),
            None => None,
        };
        Ok(Self {
            schema,
            strict_identifiers: config.strict_identifiers,
        })
    }

    /// Apply `schema` before the business checks
    pub fn with_schema(mut self, schema: XsdSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Enable or disable identifier checksum validation
    pub fn strict_identifiers(mut self, strict: bool) -> Self {
        self.strict_identifiers = strict;
        self
    }

    /// Validate a file
    pub fn validate_file(&self, path: impl AsRef<Path>) -> Result<ValidationResult> {
        let xml = std::fs::read_to_string(path)?;
        Ok(self.validate(&xml))
    }

    /// Validate XML text
    pub fn validate(&self, xml: &str) -> ValidationResult {
        let result = self.run(xml).err().unwrap_or_else(ValidationResult::success);
        match result.error_code {
            None => tracing::debug!("SEPA document passed validation"),
            Some(code) => tracing::debug!(
                %code,
                path = result.detail("path").unwrap_or_default(),
                "SEPA document rejected"
            ),
        }
        result
    }

    fn run(&self, xml: &str) -> std::result::Result<(), ValidationResult> {
        let doc = roxmltree::Document::parse(xml).map_err(|e| {
            ValidationResult::failure(ErrorCode::XmlInvalid, format!("XML parsing failed: {}", e))
        })?;

        let (variant, container) = structure(&doc)?;
        tracing::debug!(%variant, "SEPA structure recognized");

        if let Some(schema) = &self.schema {
            schema.validate(&doc).map_err(|v| {
                let result = ValidationResult::failure(
                    ErrorCode::SchemaMismatch,
                    format!("Schema validation failed: {}", v),
                )
                .with_detail("path", v.path)
                .with_detail("reason", v.reason);
                match schema.target_namespace() {
                    Some(ns) => result.with_detail("schema", ns),
                    None => result,
                }
            })?;
        }

        let payments = container
            .children()
            .filter(|n| is_named(n, "PmtInf"))
            .enumerate()
            .map(|(i, node)| business_fields(variant, node, format!("PmtInf[{}]", i + 1)))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        control_totals(container, &payments)?;

        if self.strict_identifiers {
            identifiers(variant, &payments)?;
        }

        Ok(())
    }
}

fn structure<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
) -> std::result::Result<(MessageVariant, Node<'a, 'input>), ValidationResult> {
    let root = doc.root_element();
    if root.tag_name().name() != DOCUMENT {
        return Err(structure_invalid(
            format!(
                "Expected 'Document' root element, found '{}'",
                root.tag_name().name()
            ),
            DOCUMENT,
        ));
    }

    let (variant, container) = root
        .children()
        .filter(Node::is_element)
        .find_map(|n| MessageVariant::from_container(n.tag_name().name()).map(|v| (v, n)))
        .ok_or_else(|| {
            structure_invalid(
                "Missing CstmrCdtTrfInitn or CstmrDrctDbtInitn element",
                "Document/CstmrCdtTrfInitn|CstmrDrctDbtInitn",
            )
        })?;

    if let Some(ns) = root.tag_name().namespace() {
        let other = match variant {
            MessageVariant::CreditTransfer => MessageVariant::DirectDebit,
            MessageVariant::DirectDebit => MessageVariant::CreditTransfer,
        };
        if ns.contains(other.family()) {
            return Err(structure_invalid(
                format!("Namespace {} does not match {}", ns, variant.container()),
                DOCUMENT,
            ));
        }
    }

    let container_path = format!("Document/{}", variant.container());
    if child(container, "GrpHdr").is_none() {
        return Err(structure_invalid(
            "Missing GrpHdr element",
            format!("{}/GrpHdr", container_path),
        ));
    }
    if child(container, "PmtInf").is_none() {
        return Err(structure_invalid(
            "Missing PmtInf element",
            format!("{}/PmtInf", container_path),
        ));
    }

    Ok((variant, container))
}

fn business_fields<'a, 'input>(
    variant: MessageVariant,
    payment: Node<'a, 'input>,
    path: String,
) -> std::result::Result<PaymentTotals<'a, 'input>, ValidationResult> {
    let own = variant.own_side();

    if child(payment, own).is_none() {
        return Err(field_missing(format!("{}/{}", path, own)));
    }

    let own_iban = format!("{}Acct/Id/IBAN", own);
    if find(payment, &own_iban).and_then(non_blank_text).is_none() {
        return Err(field_missing(format!("{}/{}", path, own_iban)));
    }

    if let Some(institution) = find(payment, &format!("{}Agt/FinInstnId", own)) {
        for bic_name in ["BIC", "BICFI"] {
            if let Some(bic) = child(institution, bic_name) {
                if non_blank_text(bic).is_none() {
                    return Err(field_invalid(
                        format!("{}/{}Agt/FinInstnId/{}", path, own, bic_name),
                        "Agent BIC is blank",
                    ));
                }
            }
        }
    }

    let tx_name = variant.transaction_element();
    let transactions: Vec<Node<'_, '_>> = payment
        .children()
        .filter(|n| is_named(n, tx_name))
        .collect();
    if transactions.is_empty() {
        return Err(field_missing(format!("{}/{}", path, tx_name)));
    }

    let counterparty = variant.counterparty_side();
    let amount_path = match variant {
        MessageVariant::CreditTransfer => "Amt/InstdAmt",
        MessageVariant::DirectDebit => "InstdAmt",
    };

    let mut amounts = Vec::with_capacity(transactions.len());
    for (j, tx) in transactions.iter().enumerate() {
        let tx_path = format!("{}/{}[{}]", path, tx_name, j + 1);

        if child(*tx, counterparty).is_none() {
            return Err(field_missing(format!("{}/{}", tx_path, counterparty)));
        }

        let iban_path = format!("{}Acct/Id/IBAN", counterparty);
        if find(*tx, &iban_path).and_then(non_blank_text).is_none() {
            return Err(field_missing(format!("{}/{}", tx_path, iban_path)));
        }

        let amount_text = find(*tx, amount_path)
            .and_then(non_blank_text)
            .ok_or_else(|| field_missing(format!("{}/{}", tx_path, amount_path)))?;
        if !AMOUNT_FORMAT.is_match(amount_text) {
            return Err(field_invalid(
                format!("{}/{}", tx_path, amount_path),
                format!("Amount {:?} must be digits with at most 2 decimals", amount_text),
            )
            .with_detail("actual", amount_text));
        }
        let amount = Decimal::from_str(amount_text).map_err(|_| {
            field_invalid(
                format!("{}/{}", tx_path, amount_path),
                format!("Amount {:?} exceeds the representable range", amount_text),
            )
            .with_detail("actual", amount_text)
        })?;
        amounts.push(amount);
    }

    Ok(PaymentTotals {
        node: payment,
        path,
        amounts,
    })
}

fn control_totals(
    container: Node<'_, '_>,
    payments: &[PaymentTotals<'_, '_>],
) -> std::result::Result<(), ValidationResult> {
    let count: usize = payments.iter().map(|p| p.amounts.len()).sum();
    let sum = checked_total(payments.iter().flat_map(|p| p.amounts.iter()), "GrpHdr")?;

    if let Some(header) = child(container, "GrpHdr") {
        check_totals(header, "GrpHdr", count, sum)?;
    }
    for payment in payments {
        let payment_sum = checked_total(payment.amounts.iter(), &payment.path)?;
        check_totals(payment.node, &payment.path, payment.amounts.len(), payment_sum)?;
    }
    Ok(())
}

/// Sum of `amounts`, or `FIELD_INVALID` at `{path}/CtrlSum` when it leaves the decimal range
fn checked_total<'d>(
    mut amounts: impl Iterator<Item = &'d Decimal>,
    path: &str,
) -> std::result::Result<Decimal, ValidationResult> {
    amounts
        .try_fold(Decimal::ZERO, |total, amount| total.checked_add(*amount))
        .ok_or_else(|| {
            field_invalid(
                format!("{}/CtrlSum", path),
                "Transaction total exceeds the representable range",
            )
        })
}

fn check_totals(
    node: Node<'_, '_>,
    path: &str,
    count: usize,
    sum: Decimal,
) -> std::result::Result<(), ValidationResult> {
    if let Some(declared) = child(node, "NbOfTxs") {
        let text = declared.text().unwrap_or_default().trim();
        if text.parse::<usize>().ok() != Some(count) {
            return Err(field_invalid(
                format!("{}/NbOfTxs", path),
                format!("NbOfTxs {:?} does not match {} transactions", text, count),
            )
            .with_detail("expected", count.to_string())
            .with_detail("actual", text));
        }
    }

    if let Some(declared) = child(node, "CtrlSum") {
        let text = declared.text().unwrap_or_default().trim();
        if Decimal::from_str(text).ok() != Some(sum) {
            return Err(field_invalid(
                format!("{}/CtrlSum", path),
                format!("CtrlSum {:?} does not match transaction total {}", text, format_amount(sum)),
            )
            .with_detail("expected", format_amount(sum))
            .with_detail("actual", text));
        }
    }
    Ok(())
}

fn identifiers(
    variant: MessageVariant,
    payments: &[PaymentTotals<'_, '_>],
) -> std::result::Result<(), ValidationResult> {
    let own = variant.own_side();
    let counterparty = variant.counterparty_side();
    let tx_name = variant.transaction_element();

    for payment in payments {
        check_party_identifiers(payment.node, &payment.path, own)?;

        if let Some(id) = find(payment.node, "CdtrSchmeId/Id/PrvtId/Othr/Id").and_then(non_blank_text) {
            check_identifier(
                CreditorIdValidator::validate(id),
                format!("{}/CdtrSchmeId/Id/PrvtId/Othr/Id", payment.path),
                "creditor identifier",
            )?;
        }

        for (j, tx) in payment
            .node
            .children()
            .filter(|n| is_named(n, tx_name))
            .enumerate()
        {
            let tx_path = format!("{}/{}[{}]", payment.path, tx_name, j + 1);
            check_party_identifiers(tx, &tx_path, counterparty)?;
        }
    }
    Ok(())
}

fn check_party_identifiers(
    node: Node<'_, '_>,
    path: &str,
    side: &str,
) -> std::result::Result<(), ValidationResult> {
    let iban_path = format!("{}Acct/Id/IBAN", side);
    if let Some(iban) = find(node, &iban_path).and_then(non_blank_text) {
        check_identifier(
            IbanValidator::validate(iban),
            format!("{}/{}", path, iban_path),
            "IBAN",
        )?;
    }

    if let Some(institution) = find(node, &format!("{}Agt/FinInstnId", side)) {
        for bic_name in ["BIC", "BICFI"] {
            if let Some(bic) = child(institution, bic_name).and_then(non_blank_text) {
                check_identifier(
                    BicValidator::validate(bic),
                    format!("{}/{}Agt/FinInstnId/{}", path, side, bic_name),
                    "BIC",
                )?;
            }
        }
    }
    Ok(())
}

fn check_identifier(
    leaf: ValidationResult,
    path: String,
    what: &str,
) -> std::result::Result<(), ValidationResult> {
    match leaf.error_code {
        None => Ok(()),
        Some(code) => Err(field_invalid(
            path,
            format!(
                "Invalid {}: {}",
                what,
                leaf.message.unwrap_or_else(|| code.to_string())
            ),
        )
        .with_detail("code", code.as_str())),
    }
}

fn is_named(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| is_named(n, name))
}

/// Follow a `/`-separated path of first matching children
fn find<'a, 'input>(node: Node<'a, 'input>, path: &str) -> Option<Node<'a, 'input>> {
    path.split('/').try_fold(node, |current, name| child(current, name))
}

fn non_blank_text<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    node.text().map(str::trim).filter(|text| !text.is_empty())
}

fn structure_invalid(message: impl Into<String>, path: impl Into<String>) -> ValidationResult {
    ValidationResult::failure(ErrorCode::SepaStructureInvalid, message).with_detail("path", path)
}

fn field_missing(path: String) -> ValidationResult {
    ValidationResult::failure(
        ErrorCode::FieldMissing,
        format!("Mandatory element {} is missing or blank", path),
    )
    .with_detail("path", path)
}

fn field_invalid(path: String, message: impl Into<String>) -> ValidationResult {
    ValidationResult::failure(ErrorCode::FieldInvalid, message).with_detail("path", path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIRECT_DEBIT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Document xmlns="urn:iso:std:iso:20022:tech:xsd:pain.008.001.02">
  <CstmrDrctDbtInitn>
    <GrpHdr>
      <MsgId>SEPA-1</MsgId>
      <CreDtTm>2026-10-16T09:30:00</CreDtTm>
      <NbOfTxs>2</NbOfTxs>
      <CtrlSum>37.50</CtrlSum>
      <InitgPty><Nm>TSV Musterstadt e.V.</Nm></InitgPty>
    </GrpHdr>
    <PmtInf>
      <PmtInfId>PMT-1</PmtInfId>
      <PmtMtd>DD</PmtMtd>
      <NbOfTxs>2</NbOfTxs>
      <CtrlSum>37.50</CtrlSum>
      <ReqdColltnDt>2026-11-02</ReqdColltnDt>
      <Cdtr><Nm>TSV Musterstadt e.V.</Nm></Cdtr>
      <CdtrAcct><Id><IBAN>DE89370400440532013000</IBAN></Id></CdtrAcct>
      <CdtrAgt><FinInstnId><BIC>COBADEFFXXX</BIC></FinInstnId></CdtrAgt>
      <CdtrSchmeId><Id><PrvtId><Othr><Id>DE98ZZZ09999999999</Id></Othr></PrvtId></Id></CdtrSchmeId>
      <DrctDbtTxInf>
        <PmtId><EndToEndId>E2E-1</EndToEndId></PmtId>
        <InstdAmt Ccy="EUR">12.50</InstdAmt>
        <DbtrAgt><FinInstnId><Othr><Id>NOTPROVIDED</Id></Othr></FinInstnId></DbtrAgt>
        <Dbtr><Nm>Max &amp; Moritz</Nm></Dbtr>
        <DbtrAcct><Id><IBAN>GB82WEST12345698765432</IBAN></Id></DbtrAcct>
      </DrctDbtTxInf>
      <DrctDbtTxInf>
        <PmtId><EndToEndId>E2E-2</EndToEndId></PmtId>
        <InstdAmt Ccy="EUR">25</InstdAmt>
        <Dbtr><Nm>Hans Meier</Nm></Dbtr>
        <DbtrAcct><Id><IBAN>NL91ABNA0417164300</IBAN></Id></DbtrAcct>
      </DrctDbtTxInf>
    </PmtInf>
  </CstmrDrctDbtInitn>
</Document>"#;

    const CREDIT_TRANSFER: &str = r#"<Document xmlns="urn:iso:std:iso:20022:tech:xsd:pain.001.001.03">
  <CstmrCdtTrfInitn>
    <GrpHdr><MsgId>SEPA-2</MsgId><NbOfTxs>1</NbOfTxs><CtrlSum>150.00</CtrlSum></GrpHdr>
    <PmtInf>
      <PmtInfId>PMT-2</PmtInfId>
      <PmtMtd>TRF</PmtMtd>
      <Dbtr><Nm>TSV</Nm></Dbtr>
      <DbtrAcct><Id><IBAN>DE89370400440532013000</IBAN></Id></DbtrAcct>
      <DbtrAgt><FinInstnId><BICFI>COBADEFFXXX</BICFI></FinInstnId></DbtrAgt>
      <CdtTrfTxInf>
        <PmtId><EndToEndId>E2E-1</EndToEndId></PmtId>
        <Amt><InstdAmt Ccy="EUR">150.00</InstdAmt></Amt>
        <Cdtr><Nm>Trainer GmbH</Nm></Cdtr>
        <CdtrAcct><Id><IBAN>AT611904300234573201</IBAN></Id></CdtrAcct>
      </CdtTrfTxInf>
    </PmtInf>
  </CstmrCdtTrfInitn>
</Document>"#;

    fn validate(xml: &str) -> ValidationResult {
        SepaXmlValidator::new().validate(xml)
    }

    fn assert_failure(result: &ValidationResult, code: ErrorCode, path: &str) {
        assert_eq!(result.error_code, Some(code), "{:?}", result);
        assert_eq!(result.detail("path"), Some(path), "{:?}", result);
    }

    #[test]
    fn test_valid_documents() {
        assert!(validate(DIRECT_DEBIT).valid);
        assert!(validate(CREDIT_TRANSFER).valid);
        assert!(SepaXmlValidator::new().strict_identifiers(true).validate(DIRECT_DEBIT).valid);
    }

    #[test]
    fn test_prefixed_namespace_accepted() {
        let prefixed = r#"<p:Document xmlns:p="urn:iso:std:iso:20022:tech:xsd:pain.001.001.03"><p:CstmrCdtTrfInitn><p:GrpHdr/><p:PmtInf><p:Dbtr/><p:DbtrAcct><p:Id><p:IBAN>DE89370400440532013000</p:IBAN></p:Id></p:DbtrAcct><p:CdtTrfTxInf><p:Cdtr/><p:CdtrAcct><p:Id><p:IBAN>DE89370400440532013000</p:IBAN></p:Id></p:CdtrAcct><p:Amt><p:InstdAmt Ccy="EUR">1.00</p:InstdAmt></p:Amt></p:CdtTrfTxInf></p:PmtInf></p:CstmrCdtTrfInitn></p:Document>"#;
        assert!(validate(prefixed).valid);
    }

    #[test]
    fn test_xml_invalid() {
        for xml in ["", "not xml", "<Document><CstmrDrctDbtInitn></Document>"] {
            assert_eq!(validate(xml).error_code, Some(ErrorCode::XmlInvalid), "{:?}", xml);
        }
        // DTDs are refused by the parser
        let dtd = r#"<?xml version="1.0"?><!DOCTYPE Document [<!ENTITY x "y">]><Document/>"#;
        assert_eq!(validate(dtd).error_code, Some(ErrorCode::XmlInvalid));
    }

    #[test]
    fn test_structure_invalid() {
        assert_failure(&validate("<Invoice/>"), ErrorCode::SepaStructureInvalid, "Document");
        assert_eq!(
            validate("<Document><Other/></Document>").error_code,
            Some(ErrorCode::SepaStructureInvalid)
        );

        let no_header = DIRECT_DEBIT.replace("<GrpHdr>", "<Hdr>").replace("</GrpHdr>", "</Hdr>");
        assert_failure(
            &validate(&no_header),
            ErrorCode::SepaStructureInvalid,
            "Document/CstmrDrctDbtInitn/GrpHdr",
        );

        let no_payment = DIRECT_DEBIT.replace("<PmtInf>", "<Pmt>").replace("</PmtInf>", "</Pmt>");
        assert_failure(
            &validate(&no_payment),
            ErrorCode::SepaStructureInvalid,
            "Document/CstmrDrctDbtInitn/PmtInf",
        );

        let wrong_family = DIRECT_DEBIT.replace("pain.008.001.02", "pain.001.001.03");
        assert_failure(&validate(&wrong_family), ErrorCode::SepaStructureInvalid, "Document");
    }

    #[test]
    fn test_business_field_order() {
        let no_creditor = DIRECT_DEBIT.replace("<Cdtr><Nm>TSV Musterstadt e.V.</Nm></Cdtr>", "");
        assert_failure(&validate(&no_creditor), ErrorCode::FieldMissing, "PmtInf[1]/Cdtr");

        let blank_iban = DIRECT_DEBIT.replace(
            "<IBAN>DE89370400440532013000</IBAN>",
            "<IBAN>   </IBAN>",
        );
        assert_failure(
            &validate(&blank_iban),
            ErrorCode::FieldMissing,
            "PmtInf[1]/CdtrAcct/Id/IBAN",
        );

        let blank_bic = DIRECT_DEBIT.replace("<BIC>COBADEFFXXX</BIC>", "<BIC/>");
        assert_failure(
            &validate(&blank_bic),
            ErrorCode::FieldInvalid,
            "PmtInf[1]/CdtrAgt/FinInstnId/BIC",
        );

        let no_debtor = DIRECT_DEBIT.replace("<Dbtr><Nm>Hans Meier</Nm></Dbtr>", "");
        assert_failure(
            &validate(&no_debtor),
            ErrorCode::FieldMissing,
            "PmtInf[1]/DrctDbtTxInf[2]/Dbtr",
        );

        let no_debtor_iban = DIRECT_DEBIT.replace("<IBAN>GB82WEST12345698765432</IBAN>", "");
        assert_failure(
            &validate(&no_debtor_iban),
            ErrorCode::FieldMissing,
            "PmtInf[1]/DrctDbtTxInf[1]/DbtrAcct/Id/IBAN",
        );

        let no_transactions = CREDIT_TRANSFER
            .split("<CdtTrfTxInf>")
            .next()
            .map(|head| format!("{}</PmtInf></CstmrCdtTrfInitn></Document>", head))
            .unwrap();
        assert_failure(&validate(&no_transactions), ErrorCode::FieldMissing, "PmtInf[1]/CdtTrfTxInf");
    }

    #[test]
    fn test_amount_checks() {
        let missing = CREDIT_TRANSFER.replace(r#"<InstdAmt Ccy="EUR">150.00</InstdAmt>"#, "");
        assert_failure(
            &validate(&missing),
            ErrorCode::FieldMissing,
            "PmtInf[1]/CdtTrfTxInf[1]/Amt/InstdAmt",
        );

        for bad in ["150.000", "1,50", "abc", "-1.00", "1e3"] {
            let xml = CREDIT_TRANSFER.replace(">150.00</InstdAmt>", &format!(">{}</InstdAmt>", bad));
            let result = validate(&xml);
            assert_failure(&result, ErrorCode::FieldInvalid, "PmtInf[1]/CdtTrfTxInf[1]/Amt/InstdAmt");
            assert_eq!(result.detail("actual"), Some(bad));
        }

        let huge = "100000000000000000000000000000";
        let xml = CREDIT_TRANSFER.replace(">150.00</InstdAmt>", &format!(">{}</InstdAmt>", huge));
        let result = validate(&xml);
        assert_failure(&result, ErrorCode::FieldInvalid, "PmtInf[1]/CdtTrfTxInf[1]/Amt/InstdAmt");
        assert_eq!(result.detail("actual"), Some(huge));
        assert!(result.message.as_deref().unwrap_or_default().contains("representable range"));
    }

    #[test]
    fn test_control_total_overflow() {
        let max = Decimal::MAX.to_string();
        let xml = DIRECT_DEBIT
            .replace(">12.50</InstdAmt>", &format!(">{}</InstdAmt>", max))
            .replace(">25</InstdAmt>", &format!(">{}</InstdAmt>", max));

        let result = validate(&xml);
        assert_failure(&result, ErrorCode::FieldInvalid, "GrpHdr/CtrlSum");
        assert!(!result.valid);
        assert!(result.message.as_deref().unwrap_or_default().contains("representable range"));
    }

    #[test]
    fn test_control_totals() {
        let wrong_count = DIRECT_DEBIT.replacen("<NbOfTxs>2</NbOfTxs>", "<NbOfTxs>3</NbOfTxs>", 1);
        let result = validate(&wrong_count);
        assert_failure(&result, ErrorCode::FieldInvalid, "GrpHdr/NbOfTxs");
        assert_eq!(result.detail("expected"), Some("2"));
        assert_eq!(result.detail("actual"), Some("3"));

        let rescaled = DIRECT_DEBIT.replacen("<CtrlSum>37.50</CtrlSum>", "<CtrlSum>37.5</CtrlSum>", 1);
        assert!(validate(&rescaled).valid, "numeric comparison ignores scale");

        let pieces: Vec<&str> = DIRECT_DEBIT.splitn(2, "<CtrlSum>37.50</CtrlSum>").collect();
        let wrong_payment_sum = format!(
            "{}<CtrlSum>37.50</CtrlSum>{}",
            pieces[0],
            pieces[1].replacen("<CtrlSum>37.50</CtrlSum>", "<CtrlSum>40.00</CtrlSum>", 1)
        );
        let result = validate(&wrong_payment_sum);
        assert_failure(&result, ErrorCode::FieldInvalid, "PmtInf[1]/CtrlSum");
        assert_eq!(result.detail("expected"), Some("37.50"));
        assert_eq!(result.detail("actual"), Some("40.00"));
    }

    #[test]
    fn test_strict_identifiers() {
        let strict = SepaXmlValidator::new().strict_identifiers(true);

        let bad_iban = DIRECT_DEBIT.replace("NL91ABNA0417164300", "NL92ABNA0417164300");
        assert!(validate(&bad_iban).valid);
        let result = strict.validate(&bad_iban);
        assert_failure(&result, ErrorCode::FieldInvalid, "PmtInf[1]/DrctDbtTxInf[2]/DbtrAcct/Id/IBAN");
        assert_eq!(result.detail("code"), Some("INVALID_CHECKSUM"));

        let bad_bic = CREDIT_TRANSFER.replace("COBADEFFXXX", "COBA1EFFXXX");
        let result = strict.validate(&bad_bic);
        assert_failure(&result, ErrorCode::FieldInvalid, "PmtInf[1]/DbtrAgt/FinInstnId/BICFI");
        assert_eq!(result.detail("code"), Some("INVALID_FORMAT"));

        let bad_scheme = DIRECT_DEBIT.replace("DE98ZZZ09999999999", "DE97ZZZ09999999999");
        let result = strict.validate(&bad_scheme);
        assert_failure(
            &result,
            ErrorCode::FieldInvalid,
            "PmtInf[1]/CdtrSchmeId/Id/PrvtId/Othr/Id",
        );
    }

    #[test]
    fn test_schema_mismatch() {
        let schema = XsdSchema::parse(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
                          xmlns="urn:iso:std:iso:20022:tech:xsd:pain.001.001.03"
                          targetNamespace="urn:iso:std:iso:20022:tech:xsd:pain.001.001.03"
                          elementFormDefault="qualified">
                 <xs:element name="Document">
                   <xs:complexType>
                     <xs:sequence><xs:element name="Other" type="xs:string"/></xs:sequence>
                   </xs:complexType>
                 </xs:element>
               </xs:schema>"#,
        )
        .unwrap();
        let result = SepaXmlValidator::new().with_schema(schema).validate(CREDIT_TRANSFER);
        assert_failure(&result, ErrorCode::SchemaMismatch, "/Document");
        assert_eq!(result.detail("reason"), Some("unexpected element CstmrCdtTrfInitn"));
        assert_eq!(
            result.detail("schema"),
            Some("urn:iso:std:iso:20022:tech:xsd:pain.001.001.03")
        );
    }

    #[test]
    fn test_from_config_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("message.xml");
        std::fs::write(&path, DIRECT_DEBIT).unwrap();

        let validator = SepaXmlValidator::from_config(&ValidationConfig::default()).unwrap();
        assert!(validator.validate_file(&path).unwrap().valid);
        assert!(validator.validate_file(dir.path().join("missing.xml")).is_err());

        let config = ValidationConfig {
            schema_path: Some(dir.path().join("missing.xsd")),
            ..ValidationConfig::default()
        };
        assert!(SepaXmlValidator::from_config(&config).is_err());
    }
}
