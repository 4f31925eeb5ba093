// src/xml.rs

//! Minimal XML element tree
//!
//! Package metadata, the install ledger and companion documents are all
//! small XML documents that are read whole, inspected or rewritten, and
//! written back whole. Schema migrations in particular need to rename
//! attributes and drop elements in place, which is awkward on a raw event
//! stream, so documents are materialised into [`Element`] trees using
//! quick-xml's reader and serialised back with its writer.
//!
//! Comments, processing instructions and the XML declaration are dropped on
//! read. Whitespace-only text is dropped; other text is kept verbatim.

use crate::error::{Error, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

/// A child of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with ordered attributes and children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    /// Create an empty element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder: set an attribute
    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attr(name, value);
        self
    }

    /// Builder: append a text child
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    /// Builder: append a child element
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Get an attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value in place
    pub fn set_attr(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Remove an attribute, returning its value
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == name)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Attributes in document order
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// All children, including text
    pub fn nodes(&self) -> &[Node] {
        &self.children
    }

    /// Child elements in document order
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Mutable child elements in document order
    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Child elements with the given name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.elements().filter(move |e| e.name == name)
    }

    /// First child element with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    /// First child element with the given name, mutably
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.name == name)
    }

    /// Append a child element
    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Remove every child element with the given name, returning how many went
    pub fn remove_children(&mut self, name: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|n| !matches!(n, Node::Element(e) if e.name == name));
        before - self.children.len()
    }

    /// Keep only the child elements for which `keep` returns true
    pub fn retain_elements<F>(&mut self, mut keep: F)
    where
        F: FnMut(&Element) -> bool,
    {
        self.children.retain(|n| match n {
            Node::Element(e) => keep(e),
            Node::Text(_) => true,
        });
    }

    /// Concatenated direct text content
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }
}

/// Parse a document, returning its root element
///
/// Returns `Ok(None)` when the document contains no element at all, so the
/// caller can report a missing root in its own terms.
pub fn parse(content: &str) -> Result<Option<Element>> {
    let mut reader = Reader::from_str(content);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(element_from_start(&start)?),
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| Error::format("unbalanced closing tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text.unescape()?;
                if let Some(parent) = stack.last_mut()
                    && !text.trim().is_empty()
                {
                    parent.children.push(Node::Text(text.into_owned()));
                }
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&data.into_inner()).into_owned();
                    parent.children.push(Node::Text(text));
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and doctypes
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(Error::format("unexpected end of document"));
    }

    Ok(root)
}

/// Serialise a root element to an indented document with an XML declaration
pub fn to_string(root: &Element) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    write_element(&mut writer, root)?;

    String::from_utf8(writer.into_inner())
        .map_err(|e| Error::format(format!("serialised document is not UTF-8: {}", e)))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);

    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }

    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(Error::format(format!(
            "multiple root elements (second is '{}')",
            element.name
        ))),
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(t) => writer.write_event(Event::Text(BytesText::new(t)))?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_document() {
        let doc = r#"<?xml version="1.0"?>
            <!-- leading comment -->
            <fomod>
              <Name>Better Cities</Name>
              <Version MachineVersion="1.5">1.5 beta</Version>
            </fomod>"#;

        let root = parse(doc).unwrap().unwrap();
        assert_eq!(root.name, "fomod");
        assert_eq!(root.child("Name").unwrap().text(), "Better Cities");

        let version = root.child("Version").unwrap();
        assert_eq!(version.attr("MachineVersion"), Some("1.5"));
        assert_eq!(version.text(), "1.5 beta");
    }

    #[test]
    fn test_parse_empty_document_has_no_root() {
        assert!(parse("").unwrap().is_none());
        assert!(parse("<?xml version=\"1.0\"?><!-- nothing -->").unwrap().is_none());
    }

    #[test]
    fn test_parse_rejects_multiple_roots() {
        assert!(parse("<a/><b/>").is_err());
    }

    #[test]
    fn test_parse_rejects_mismatched_tags() {
        assert!(parse("<a><b></a>").is_err());
    }

    #[test]
    fn test_escaping_survives_write_and_parse() {
        let root = Element::new("installLog").with_child(
            Element::new("file")
                .with_attr("path", "meshes/a&b.nif")
                .with_text("<quoted> & \"more\""),
        );

        let written = to_string(&root).unwrap();
        let parsed = parse(&written).unwrap().unwrap();
        let file = parsed.child("file").unwrap();
        assert_eq!(file.attr("path"), Some("meshes/a&b.nif"));
        assert_eq!(file.text(), "<quoted> & \"more\"");
    }

    #[test]
    fn test_attribute_mutation() {
        let mut el = Element::new("mod").with_attr("key", "abc").with_attr("path", "x");
        el.set_attr("key", "def");
        assert_eq!(el.attr("key"), Some("def"));
        assert_eq!(el.remove_attr("path").as_deref(), Some("x"));
        assert!(el.attr("path").is_none());
        assert_eq!(el.attributes().count(), 1);
    }

    #[test]
    fn test_remove_and_retain_children() {
        let mut el = Element::new("mod")
            .with_child(Element::new("name"))
            .with_child(Element::new("installDate"))
            .with_child(Element::new("version"));

        assert_eq!(el.remove_children("name"), 1);
        el.retain_elements(|c| c.name != "installDate");
        let names: Vec<_> = el.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["version"]);
    }
}
