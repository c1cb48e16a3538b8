//! W3C XML Schema subset
//!
//! Loads and applies the schema constructs ISO 20022 message definitions are
//! written in:
//!
//! - global `xs:element`, named and anonymous `xs:complexType` / `xs:simpleType`
//! - `xs:sequence` and `xs:choice` (nested, with `minOccurs` / `maxOccurs`)
//! - `xs:simpleContent` extensions carrying attributes
//! - restrictions with `length`, `minLength`, `maxLength`, `pattern`,
//!   `enumeration`, `minInclusive`, `maxInclusive`, `fractionDigits` and
//!   `totalDigits`
//! - builtin string, decimal, integer, boolean, date and dateTime types
//!
//! Anything else (imports, `xs:any`, element references, complex content
//! derivation, lists, unions) is rejected at load time rather than silently
//! ignored.
//!
//! Content models are matched against the child element list by tracking the
//! set of reachable positions, so optional and repeated particles never need
//! backtracking. Local element types are looked up by name, which relies on
//! the XSD rule that one content model never declares the same element name
//! with two different types.

use crate::{Error, Result};
use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use roxmltree::Node;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;

const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

static DECIMAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)$").expect("static decimal pattern")
});
static INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?[0-9]+$").expect("static integer pattern"));
static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})(Z|[+-][0-9]{2}:[0-9]{2})?$")
        .expect("static date pattern")
});
static DATE_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([0-9]{4})-([0-9]{2})-([0-9]{2})T([0-9]{2}):([0-9]{2}):([0-9]{2})(\.[0-9]+)?(Z|[+-][0-9]{2}:[0-9]{2})?$",
    )
    .expect("static dateTime pattern")
});

/// First point where a document departs from the schema
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {reason}")]
pub struct SchemaViolation {
    /// Element or attribute path (`/Document/CstmrDrctDbtInitn/GrpHdr/MsgId`)
    pub path: String,
    /// What is wrong
    pub reason: String,
}

fn violation(path: &str, reason: impl Into<String>) -> SchemaViolation {
    SchemaViolation {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Builtin datatypes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Builtin {
    String,
    Decimal,
    Integer,
    NonNegativeInteger,
    PositiveInteger,
    Boolean,
    Date,
    DateTime,
}

impl Builtin {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "string" | "normalizedString" | "token" | "NMTOKEN" | "Name" | "NCName" | "ID"
            | "anyURI" | "anySimpleType" => Builtin::String,
            "decimal" => Builtin::Decimal,
            "integer" | "int" | "long" | "short" => Builtin::Integer,
            "nonNegativeInteger" => Builtin::NonNegativeInteger,
            "positiveInteger" => Builtin::PositiveInteger,
            "boolean" => Builtin::Boolean,
            "date" => Builtin::Date,
            "dateTime" => Builtin::DateTime,
            _ => return None,
        })
    }

    fn is_numeric(self) -> bool {
        matches!(
            self,
            Builtin::Decimal | Builtin::Integer | Builtin::NonNegativeInteger | Builtin::PositiveInteger
        )
    }

    /// Whitespace-collapsed lexical value
    fn normalize(self, value: &str) -> &str {
        if self == Builtin::String {
            value
        } else {
            value.trim()
        }
    }

    fn check(self, value: &str) -> std::result::Result<(), String> {
        let value = self.normalize(value);
        let ok = match self {
            Builtin::String => true,
            Builtin::Decimal => DECIMAL.is_match(value),
            Builtin::Integer => INTEGER.is_match(value),
            Builtin::NonNegativeInteger => {
                INTEGER.is_match(value) && (!value.starts_with('-') || is_zero(value))
            }
            Builtin::PositiveInteger => {
                INTEGER.is_match(value) && !value.starts_with('-') && !is_zero(value)
            }
            Builtin::Boolean => matches!(value, "true" | "false" | "1" | "0"),
            Builtin::Date => DATE
                .captures(value)
                .map_or(false, |c| valid_date(&c[1], &c[2], &c[3])),
            Builtin::DateTime => DATE_TIME.captures(value).map_or(false, |c| {
                valid_date(&c[1], &c[2], &c[3]) && valid_time(&c[4], &c[5], &c[6])
            }),
        };
        if ok {
            Ok(())
        } else {
            Err(format!("{:?} is not a valid {:?} value", value, self))
        }
    }
}

fn is_zero(value: &str) -> bool {
    value.trim_start_matches(['+', '-']).chars().all(|c| c == '0')
}

fn valid_date(year: &str, month: &str, day: &str) -> bool {
    match (year.parse(), month.parse(), day.parse()) {
        (Ok(y), Ok(m), Ok(d)) => NaiveDate::from_ymd_opt(y, m, d).is_some(),
        _ => false,
    }
}

fn valid_time(hour: &str, minute: &str, second: &str) -> bool {
    match (hour.parse(), minute.parse(), second.parse()) {
        (Ok(h), Ok(m), Ok(s)) => NaiveTime::from_hms_opt(h, m, s).is_some(),
        _ => false,
    }
}

#[derive(Debug, Clone)]
enum TypeRef {
    Builtin(Builtin),
    Named(String),
    Inline(Box<TypeDef>),
}

#[derive(Debug, Clone)]
enum TypeDef {
    Complex(ComplexType),
    Simple(SimpleType),
}

#[derive(Debug, Clone)]
struct ElementDecl {
    name: String,
    ty: TypeRef,
}

#[derive(Debug, Clone)]
struct AttributeDecl {
    name: String,
    ty: TypeRef,
    required: bool,
}

#[derive(Debug, Clone, Copy)]
struct Occurs {
    min: u32,
    max: Option<u32>,
}

#[derive(Debug, Clone)]
enum Particle {
    Element { decl: ElementDecl, occurs: Occurs },
    Sequence { items: Vec<Particle>, occurs: Occurs },
    Choice { items: Vec<Particle>, occurs: Occurs },
}

impl Particle {
    fn occurs(&self) -> Occurs {
        match self {
            Particle::Element { occurs, .. }
            | Particle::Sequence { occurs, .. }
            | Particle::Choice { occurs, .. } => *occurs,
        }
    }

    fn collect_decls<'p>(&'p self, out: &mut HashMap<&'p str, &'p ElementDecl>) {
        match self {
            Particle::Element { decl, .. } => {
                out.entry(decl.name.as_str()).or_insert(decl);
            }
            Particle::Sequence { items, .. } | Particle::Choice { items, .. } => {
                for item in items {
                    item.collect_decls(out);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
enum Content {
    Empty,
    Elements(Particle),
    Simple(TypeRef),
}

#[derive(Debug, Clone)]
struct ComplexType {
    content: Content,
    attributes: Vec<AttributeDecl>,
}

#[derive(Debug, Clone, Default)]
struct Facets {
    length: Option<usize>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    patterns: Vec<Regex>,
    enumeration: Vec<String>,
    min_inclusive: Option<Decimal>,
    max_inclusive: Option<Decimal>,
    fraction_digits: Option<u32>,
    total_digits: Option<u32>,
}

impl Facets {
    fn check(&self, value: &str, primitive: Builtin) -> std::result::Result<(), String> {
        let value = primitive.normalize(value);
        let len = value.chars().count();

        if let Some(expected) = self.length {
            if len != expected {
                return Err(format!("length {} differs from required {}", len, expected));
            }
        }
        if let Some(min) = self.min_length {
            if len < min {
                return Err(format!("length {} below minimum {}", len, min));
            }
        }
        if let Some(max) = self.max_length {
            if len > max {
                return Err(format!("length {} above maximum {}", len, max));
            }
        }
        if !self.patterns.is_empty() && !self.patterns.iter().any(|p| p.is_match(value)) {
            return Err(format!("{:?} does not match the required pattern", value));
        }
        if !self.enumeration.is_empty() && !self.enumeration.iter().any(|e| e == value) {
            return Err(format!("{:?} is not one of {:?}", value, self.enumeration));
        }

        let bounded = self.min_inclusive.is_some()
            || self.max_inclusive.is_some()
            || self.fraction_digits.is_some()
            || self.total_digits.is_some();
        if bounded && primitive.is_numeric() {
            let number = Decimal::from_str(value.trim_start_matches('+'))
                .map_err(|_| format!("{:?} is out of decimal range", value))?
                .normalize();
            if let Some(min) = self.min_inclusive {
                if number < min {
                    return Err(format!("{} below minimum {}", number, min));
                }
            }
            if let Some(max) = self.max_inclusive {
                if number > max {
                    return Err(format!("{} above maximum {}", number, max));
                }
            }
            if let Some(digits) = self.fraction_digits {
                if number.scale() > digits {
                    return Err(format!("{} has more than {} fraction digits", value, digits));
                }
            }
            if let Some(digits) = self.total_digits {
                let total = number.mantissa().unsigned_abs().to_string().len() as u32;
                if total > digits {
                    return Err(format!("{} has more than {} digits", value, digits));
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
struct SimpleType {
    base: TypeRef,
    facets: Facets,
}

/// Loaded XML schema
#[derive(Debug, Clone)]
pub struct XsdSchema {
    target_namespace: Option<String>,
    elements: HashMap<String, ElementDecl>,
    complex_types: HashMap<String, ComplexType>,
    simple_types: HashMap<String, SimpleType>,
}

impl XsdSchema {
    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let schema = Self::parse(&text)?;
        tracing::debug!("Loaded XML schema {}", path.display());
        Ok(schema)
    }

    /// Parse schema text
    pub fn parse(text: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(text)
            .map_err(|e| Error::Schema(format!("Failed to parse schema: {}", e)))?;
        let root = doc.root_element();
        if xsd_name(root) != Some("schema") {
            return Err(Error::Schema("root element is not xs:schema".to_string()));
        }

        let target_namespace = root.attribute("targetNamespace").map(str::to_string);
        if target_namespace.is_some() && root.attribute("elementFormDefault") != Some("qualified") {
            return Err(Error::Schema(
                "only elementFormDefault=\"qualified\" is supported".to_string(),
            ));
        }

        let mut parser = SchemaParser::default();
        let mut schema = XsdSchema {
            target_namespace,
            elements: HashMap::new(),
            complex_types: HashMap::new(),
            simple_types: HashMap::new(),
        };

        for child in root.children().filter(Node::is_element) {
            match xsd_name(child) {
                Some("annotation") => {}
                Some("element") => {
                    let decl = parser.element(child)?;
                    if schema.elements.insert(decl.name.clone(), decl).is_some() {
                        return Err(duplicate("element", child));
                    }
                }
                Some("complexType") => {
                    let name = required_attribute(child, "name")?;
                    let ty = parser.complex_type(child)?;
                    if schema.complex_types.insert(name.to_string(), ty).is_some() {
                        return Err(duplicate("complexType", child));
                    }
                }
                Some("simpleType") => {
                    let name = required_attribute(child, "name")?;
                    let ty = parser.simple_type(child)?;
                    if schema.simple_types.insert(name.to_string(), ty).is_some() {
                        return Err(duplicate("simpleType", child));
                    }
                }
                _ => return Err(unsupported(child)),
            }
        }

        schema.check_references(&parser)?;
        Ok(schema)
    }

    /// Namespace the schema's elements live in
    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    /// Validate a parsed document, reporting the first violation
    pub fn validate(&self, doc: &roxmltree::Document<'_>) -> std::result::Result<(), SchemaViolation> {
        let root = doc.root_element();
        let name = root.tag_name().name();
        let path = format!("/{}", name);
        let decl = self
            .elements
            .get(name)
            .ok_or_else(|| violation(&path, format!("no global declaration for element {}", name)))?;
        self.validate_element(root, &decl.ty, &path)
    }

    fn check_references(&self, parser: &SchemaParser) -> Result<()> {
        for name in &parser.referenced {
            if !self.complex_types.contains_key(name) && !self.simple_types.contains_key(name) {
                return Err(Error::Schema(format!("unknown type {}", name)));
            }
        }
        for name in &parser.referenced_simple {
            if !self.simple_types.contains_key(name) {
                return Err(Error::Schema(format!("{} is not a simple type", name)));
            }
        }

        // Simple type derivation must terminate
        for start in self.simple_types.keys() {
            let mut seen = HashSet::new();
            let mut current = Some(start.as_str());
            while let Some(name) = current {
                if !seen.insert(name) {
                    return Err(Error::Schema(format!("circular derivation of {}", start)));
                }
                current = self
                    .simple_types
                    .get(name)
                    .and_then(|st| named_base(&st.base));
            }
        }
        Ok(())
    }

    fn validate_element(
        &self,
        node: Node<'_, '_>,
        ty: &TypeRef,
        path: &str,
    ) -> std::result::Result<(), SchemaViolation> {
        let expected_ns = self.target_namespace.as_deref();
        if node.tag_name().namespace() != expected_ns {
            return Err(violation(
                path,
                format!(
                    "element {} is not in namespace {}",
                    node.tag_name().name(),
                    expected_ns.unwrap_or("(none)")
                ),
            ));
        }

        match self.complex(ty) {
            Some(complex) => self.validate_complex(node, complex, path),
            None => {
                self.check_attributes(node, &[], path)?;
                if let Some(child) = node.children().find(Node::is_element) {
                    return Err(violation(
                        path,
                        format!("unexpected element {} in simple content", child.tag_name().name()),
                    ));
                }
                self.check_simple(&text_content(node), ty)
                    .map_err(|reason| violation(path, reason))
            }
        }
    }

    fn validate_complex(
        &self,
        node: Node<'_, '_>,
        complex: &ComplexType,
        path: &str,
    ) -> std::result::Result<(), SchemaViolation> {
        self.check_attributes(node, &complex.attributes, path)?;

        let children: Vec<Node<'_, '_>> = node.children().filter(Node::is_element).collect();
        let particle = match &complex.content {
            Content::Empty => {
                if !children.is_empty() || !text_content(node).trim().is_empty() {
                    return Err(violation(path, "element must be empty"));
                }
                return Ok(());
            }
            Content::Simple(base) => {
                if let Some(child) = children.first() {
                    return Err(violation(
                        path,
                        format!("unexpected element {} in simple content", child.tag_name().name()),
                    ));
                }
                return self
                    .check_simple(&text_content(node), base)
                    .map_err(|reason| violation(path, reason));
            }
            Content::Elements(particle) => particle,
        };

        if !text_content(node).trim().is_empty() {
            return Err(violation(path, "unexpected text content"));
        }

        let mut matcher = Matcher {
            children: &children,
            furthest: 0,
        };
        let ends = matcher.repeat(particle, &BTreeSet::from([0]));
        if !ends.contains(&children.len()) {
            return Err(match children.get(matcher.furthest) {
                Some(child) => violation(
                    path,
                    format!("unexpected element {}", child.tag_name().name()),
                ),
                None => violation(path, "incomplete content, a mandatory element is missing"),
            });
        }

        let mut decls = HashMap::new();
        particle.collect_decls(&mut decls);
        let mut ordinals: HashMap<&str, usize> = HashMap::new();

        for child in &children {
            let name = child.tag_name().name();
            let decl = decls
                .get(name)
                .ok_or_else(|| violation(path, format!("unexpected element {}", name)))?;
            let ordinal = ordinals.entry(name).or_insert(0);
            *ordinal += 1;
            let repeated = children.iter().filter(|c| c.tag_name().name() == name).count() > 1;
            let child_path = if repeated {
                format!("{}/{}[{}]", path, name, ordinal)
            } else {
                format!("{}/{}", path, name)
            };
            self.validate_element(*child, &decl.ty, &child_path)?;
        }

        Ok(())
    }

    fn check_attributes(
        &self,
        node: Node<'_, '_>,
        decls: &[AttributeDecl],
        path: &str,
    ) -> std::result::Result<(), SchemaViolation> {
        for attr in node.attributes() {
            if attr.namespace() == Some(XSI_NS) {
                continue;
            }
            let attr_path = format!("{}/@{}", path, attr.name());
            let decl = decls
                .iter()
                .find(|d| attr.namespace().is_none() && d.name == attr.name())
                .ok_or_else(|| violation(&attr_path, "attribute not allowed"))?;
            self.check_simple(attr.value(), &decl.ty)
                .map_err(|reason| violation(&attr_path, reason))?;
        }

        for decl in decls.iter().filter(|d| d.required) {
            if node.attribute(decl.name.as_str()).is_none() {
                return Err(violation(
                    path,
                    format!("missing required attribute {}", decl.name),
                ));
            }
        }
        Ok(())
    }

    fn complex<'s>(&'s self, ty: &'s TypeRef) -> Option<&'s ComplexType> {
        match ty {
            TypeRef::Builtin(_) => None,
            TypeRef::Named(name) => self.complex_types.get(name),
            TypeRef::Inline(def) => match def.as_ref() {
                TypeDef::Complex(complex) => Some(complex),
                TypeDef::Simple(_) => None,
            },
        }
    }

    fn simple<'s>(&'s self, ty: &'s TypeRef) -> Option<&'s SimpleType> {
        match ty {
            TypeRef::Builtin(_) => None,
            TypeRef::Named(name) => self.simple_types.get(name),
            TypeRef::Inline(def) => match def.as_ref() {
                TypeDef::Simple(simple) => Some(simple),
                TypeDef::Complex(_) => None,
            },
        }
    }

    fn check_simple(&self, value: &str, ty: &TypeRef) -> std::result::Result<(), String> {
        if let TypeRef::Builtin(builtin) = ty {
            return builtin.check(value);
        }
        let simple = self
            .simple(ty)
            .ok_or_else(|| "complex type used for a text value".to_string())?;
        self.check_simple(value, &simple.base)?;
        simple.facets.check(value, self.primitive(&simple.base))
    }

    fn primitive(&self, ty: &TypeRef) -> Builtin {
        match ty {
            TypeRef::Builtin(builtin) => *builtin,
            other => self
                .simple(other)
                .map_or(Builtin::String, |simple| self.primitive(&simple.base)),
        }
    }
}

fn named_base(ty: &TypeRef) -> Option<&str> {
    match ty {
        TypeRef::Named(name) => Some(name),
        TypeRef::Inline(def) => match def.as_ref() {
            TypeDef::Simple(simple) => named_base(&simple.base),
            TypeDef::Complex(_) => None,
        },
        TypeRef::Builtin(_) => None,
    }
}

fn text_content(node: Node<'_, '_>) -> String {
    node.children()
        .filter(Node::is_text)
        .filter_map(|c| c.text())
        .collect()
}

struct Matcher<'a, 'input> {
    children: &'a [Node<'a, 'input>],
    furthest: usize,
}

impl Matcher<'_, '_> {
    /// Positions reachable after matching `particle` with its occurrence bounds
    fn repeat(&mut self, particle: &Particle, from: &BTreeSet<usize>) -> BTreeSet<usize> {
        let occurs = particle.occurs();
        // Beyond this many rounds only empty matches remain, which add nothing
        let cap = occurs.min.max(self.children.len() as u32 + 1);
        let rounds = occurs.max.map_or(cap, |max| max.min(cap));

        let mut reached = BTreeSet::new();
        if occurs.min == 0 {
            reached.extend(from.iter().copied());
        }

        let mut current = from.clone();
        for round in 1..=rounds {
            let mut next = BTreeSet::new();
            for &position in &current {
                next.extend(self.once(particle, position));
            }
            if next.is_empty() {
                break;
            }
            if round >= occurs.min {
                reached.extend(next.iter().copied());
            }
            current = next;
        }
        reached
    }

    fn once(&mut self, particle: &Particle, position: usize) -> BTreeSet<usize> {
        match particle {
            Particle::Element { decl, .. } => match self.children.get(position) {
                Some(child) if child.tag_name().name() == decl.name => {
                    self.furthest = self.furthest.max(position + 1);
                    BTreeSet::from([position + 1])
                }
                _ => BTreeSet::new(),
            },
            Particle::Sequence { items, .. } => {
                let mut positions = BTreeSet::from([position]);
                for item in items {
                    positions = self.repeat(item, &positions);
                    if positions.is_empty() {
                        break;
                    }
                }
                positions
            }
            Particle::Choice { items, .. } => {
                let start = BTreeSet::from([position]);
                let mut positions = BTreeSet::new();
                for item in items {
                    positions.extend(self.repeat(item, &start));
                }
                positions
            }
        }
    }
}

#[derive(Debug, Default)]
struct SchemaParser {
    referenced: Vec<String>,
    referenced_simple: Vec<String>,
}

impl SchemaParser {
    fn type_ref(&mut self, node: Node<'_, '_>, qname: &str, simple_only: bool) -> Result<TypeRef> {
        let (prefix, local) = match qname.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, qname),
        };

        if node.lookup_namespace_uri(prefix) == Some(XSD_NS) {
            return Builtin::from_name(local)
                .map(TypeRef::Builtin)
                .ok_or_else(|| Error::Schema(format!("unsupported builtin type {}", qname)));
        }

        if simple_only {
            self.referenced_simple.push(local.to_string());
        } else {
            self.referenced.push(local.to_string());
        }
        Ok(TypeRef::Named(local.to_string()))
    }

    fn element(&mut self, node: Node<'_, '_>) -> Result<ElementDecl> {
        if node.has_attribute("ref") {
            return Err(Error::Schema("element references are not supported".to_string()));
        }
        let name = required_attribute(node, "name")?.to_string();

        let ty = match node.attribute("type") {
            Some(qname) => self.type_ref(node, qname, false)?,
            None => {
                let inline = schema_children(node)
                    .next()
                    .ok_or_else(|| Error::Schema(format!("element {} has no type", name)))?;
                match xsd_name(inline) {
                    Some("complexType") => {
                        TypeRef::Inline(Box::new(TypeDef::Complex(self.complex_type(inline)?)))
                    }
                    Some("simpleType") => {
                        TypeRef::Inline(Box::new(TypeDef::Simple(self.simple_type(inline)?)))
                    }
                    _ => return Err(unsupported(inline)),
                }
            }
        };

        Ok(ElementDecl { name, ty })
    }

    fn particle(&mut self, node: Node<'_, '_>) -> Result<Particle> {
        let occurs = occurs(node)?;
        match xsd_name(node) {
            Some("element") => Ok(Particle::Element {
                decl: self.element(node)?,
                occurs,
            }),
            Some("sequence") => Ok(Particle::Sequence {
                items: self.particles(node)?,
                occurs,
            }),
            Some("choice") => Ok(Particle::Choice {
                items: self.particles(node)?,
                occurs,
            }),
            _ => Err(unsupported(node)),
        }
    }

    fn particles(&mut self, node: Node<'_, '_>) -> Result<Vec<Particle>> {
        schema_children(node).map(|child| self.particle(child)).collect()
    }

    fn complex_type(&mut self, node: Node<'_, '_>) -> Result<ComplexType> {
        let mut complex = ComplexType {
            content: Content::Empty,
            attributes: Vec::new(),
        };

        for child in schema_children(node) {
            match xsd_name(child) {
                Some("sequence") | Some("choice") => {
                    complex.content = Content::Elements(self.particle(child)?);
                }
                Some("attribute") => complex.attributes.push(self.attribute(child)?),
                Some("simpleContent") => {
                    let extension = schema_children(child)
                        .find(|n| xsd_name(*n) == Some("extension"))
                        .ok_or_else(|| {
                            Error::Schema("simpleContent without xs:extension".to_string())
                        })?;
                    let base = required_attribute(extension, "base")?;
                    complex.content = Content::Simple(self.type_ref(extension, base, true)?);
                    for attribute in schema_children(extension) {
                        match xsd_name(attribute) {
                            Some("attribute") => {
                                complex.attributes.push(self.attribute(attribute)?)
                            }
                            _ => return Err(unsupported(attribute)),
                        }
                    }
                }
                _ => return Err(unsupported(child)),
            }
        }

        Ok(complex)
    }

    fn attribute(&mut self, node: Node<'_, '_>) -> Result<AttributeDecl> {
        let name = required_attribute(node, "name")?.to_string();
        let ty = match node.attribute("type") {
            Some(qname) => self.type_ref(node, qname, true)?,
            None => match schema_children(node).find(|n| xsd_name(*n) == Some("simpleType")) {
                Some(inline) => TypeRef::Inline(Box::new(TypeDef::Simple(self.simple_type(inline)?))),
                None => TypeRef::Builtin(Builtin::String),
            },
        };
        Ok(AttributeDecl {
            name,
            ty,
            required: node.attribute("use") == Some("required"),
        })
    }

    fn simple_type(&mut self, node: Node<'_, '_>) -> Result<SimpleType> {
        let restriction = schema_children(node)
            .next()
            .ok_or_else(|| Error::Schema("empty xs:simpleType".to_string()))?;
        if xsd_name(restriction) != Some("restriction") {
            return Err(unsupported(restriction));
        }

        let mut base = match restriction.attribute("base") {
            Some(qname) => Some(self.type_ref(restriction, qname, true)?),
            None => None,
        };
        let mut facets = Facets::default();

        for facet in schema_children(restriction) {
            let value = || required_attribute(facet, "value");
            match xsd_name(facet) {
                Some("simpleType") if base.is_none() => {
                    base = Some(TypeRef::Inline(Box::new(TypeDef::Simple(
                        self.simple_type(facet)?,
                    ))));
                }
                Some("length") => facets.length = Some(parse_facet(facet, value()?)?),
                Some("minLength") => facets.min_length = Some(parse_facet(facet, value()?)?),
                Some("maxLength") => facets.max_length = Some(parse_facet(facet, value()?)?),
                Some("fractionDigits") => {
                    facets.fraction_digits = Some(parse_facet(facet, value()?)?)
                }
                Some("totalDigits") => facets.total_digits = Some(parse_facet(facet, value()?)?),
                Some("minInclusive") => facets.min_inclusive = Some(parse_facet(facet, value()?)?),
                Some("maxInclusive") => facets.max_inclusive = Some(parse_facet(facet, value()?)?),
                Some("enumeration") => facets.enumeration.push(value()?.to_string()),
                Some("pattern") => {
                    let pattern = value()?;
                    let regex = Regex::new(&format!("^(?:{})$", pattern)).map_err(|e| {
                        Error::Schema(format!("unsupported pattern {:?}: {}", pattern, e))
                    })?;
                    facets.patterns.push(regex);
                }
                Some("whiteSpace") => {}
                _ => return Err(unsupported(facet)),
            }
        }

        let base = base.ok_or_else(|| Error::Schema("xs:restriction without base".to_string()))?;
        Ok(SimpleType { base, facets })
    }
}

fn xsd_name<'a>(node: Node<'a, '_>) -> Option<&'a str> {
    if node.tag_name().namespace() == Some(XSD_NS) {
        Some(node.tag_name().name())
    } else {
        None
    }
}

/// Element children other than annotations
fn schema_children<'a, 'input: 'a>(
    node: Node<'a, 'input>,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(|n| n.is_element() && xsd_name(*n) != Some("annotation"))
}

fn required_attribute<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str> {
    node.attribute(name).ok_or_else(|| {
        Error::Schema(format!(
            "xs:{} is missing attribute {}",
            node.tag_name().name(),
            name
        ))
    })
}

fn occurs(node: Node<'_, '_>) -> Result<Occurs> {
    let min = match node.attribute("minOccurs") {
        Some(value) => parse_facet(node, value)?,
        None => 1,
    };
    let max = match node.attribute("maxOccurs") {
        Some("unbounded") => None,
        Some(value) => Some(parse_facet(node, value)?),
        None => Some(1),
    };
    if max.map_or(false, |max| max < min) {
        return Err(Error::Schema(format!(
            "maxOccurs below minOccurs on xs:{}",
            node.tag_name().name()
        )));
    }
    Ok(Occurs { min, max })
}

fn parse_facet<T: FromStr>(node: Node<'_, '_>, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        Error::Schema(format!(
            "invalid value {:?} on xs:{}",
            value,
            node.tag_name().name()
        ))
    })
}

fn unsupported(node: Node<'_, '_>) -> Error {
    Error::Schema(format!(
        "unsupported schema construct {}",
        node.tag_name().name()
    ))
}

fn duplicate(kind: &str, node: Node<'_, '_>) -> Error {
    Error::Schema(format!(
        "duplicate {} {}",
        kind,
        node.attribute("name").unwrap_or_default()
    ))
}
