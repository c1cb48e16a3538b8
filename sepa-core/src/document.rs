//! Generic XML document tree
//!
//! Both message variants are assembled as [`XmlNode`] trees and serialized in
//! one place, so every text node and attribute value goes through the same
//! escaping.

use crate::{Error, Result};
use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Writer,
};
use std::io::Write;

/// Element with ordered attributes and children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlNode {
    name: String,
    attributes: Vec<(String, String)>,
    text: Option<String>,
    children: Vec<XmlNode>,
}

impl XmlNode {
    /// Empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Element holding only text
    pub fn leaf(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut node = Self::new(name);
        node.text = Some(text.into());
        node
    }

    /// Add an attribute
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Append a child
    pub fn child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    /// Append a child if present
    pub fn child_opt(mut self, child: Option<XmlNode>) -> Self {
        if let Some(child) = child {
            self.children.push(child);
        }
        self
    }

    /// Append several children
    pub fn children_from(mut self, children: impl IntoIterator<Item = XmlNode>) -> Self {
        self.children.extend(children);
        self
    }

    fn write<W: Write>(&self, writer: &mut Writer<W>) -> std::result::Result<(), quick_xml::Error> {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.text.is_none() && self.children.is_empty() {
            return writer.write_event(Event::Empty(start));
        }

        writer.write_event(Event::Start(start))?;
        if let Some(text) = &self.text {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        for child in &self.children {
            child.write(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))
    }
}

/// Document with a UTF-8 XML declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    root: XmlNode,
}

impl XmlDocument {
    /// Wrap a root element
    pub fn new(root: XmlNode) -> Self {
        Self { root }
    }

    /// Serialize, optionally indented by two spaces
    pub fn to_xml(&self, pretty: bool) -> Result<String> {
        let mut writer = if pretty {
            Writer::new_with_indent(Vec::new(), b' ', 2)
        } else {
            Writer::new(Vec::new())
        };

        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.root.write(&mut writer)?;

        let mut bytes = writer.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(|e| Error::Xml(format!("non UTF-8 output: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> XmlDocument {
        XmlDocument::new(
            XmlNode::new("Document")
                .attr("xmlns", "urn:example")
                .child(
                    XmlNode::new("GrpHdr")
                        .child(XmlNode::leaf("MsgId", "M-1"))
                        .child(XmlNode::leaf("Nm", "Müller & Söhne <\"GmbH\">")),
                )
                .child(XmlNode::leaf("Amt", "12.50").attr("Ccy", "EUR"))
                .child(XmlNode::new("Empty")),
        )
    }

    #[test]
    fn test_compact_serialization() {
        let xml = sample().to_xml(false).unwrap();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <Document xmlns=\"urn:example\"><GrpHdr><MsgId>M-1</MsgId>\
             <Nm>Müller &amp; Söhne &lt;&quot;GmbH&quot;&gt;</Nm></GrpHdr>\
             <Amt Ccy=\"EUR\">12.50</Amt><Empty/></Document>\n"
        );
    }

    #[test]
    fn test_pretty_serialization_keeps_text_inline() {
        let xml = sample().to_xml(true).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Document"));
        assert!(xml.contains("\n    <MsgId>M-1</MsgId>"));
        assert!(xml.contains("\n  <Amt Ccy=\"EUR\">12.50</Amt>"));
    }

    #[test]
    fn test_escaped_output_parses_back() {
        let xml = sample().to_xml(true).unwrap();
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let nm = doc
            .descendants()
            .find(|n| n.has_tag_name("Nm"))
            .and_then(|n| n.text())
            .unwrap();
        assert_eq!(nm, "Müller & Söhne <\"GmbH\">");
    }

    #[test]
    fn test_attribute_values_escaped() {
        let doc = XmlDocument::new(XmlNode::new("A").attr("v", "a\"b&c"));
        let xml = doc.to_xml(false).unwrap();
        assert!(xml.contains("v=\"a&quot;b&amp;c\""));
    }
}
