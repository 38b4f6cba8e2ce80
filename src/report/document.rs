//! In-memory report document model.
//!
//! A report is a tree of XML elements rooted at a `<testsuites>` node. The
//! parser builds the tree from any well-formed XML document without schema
//! validation; consumers tolerate absent nodes and attributes through
//! default values.
//!
//! # Shape
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <testsuites tests="3" failures="1" errors="0" skipped="0">
//!   <testsuite name="integration" tests="3" failures="1" errors="0" skipped="0">
//!     <testcase name="test_add"/>
//!     <testcase name="test_sub">
//!       <failure message="AssertionError">assert 2 - 1 == 0</failure>
//!     </testcase>
//!     <testcase name="test_mul">
//!       <system-out>captured output</system-out>
//!     </testcase>
//!   </testsuite>
//!   <branch_name>main</branch_name>
//!   <gha_run_id>123</gha_run_id>
//! </testsuites>
//! ```

use std::path::Path;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

/// Errors produced while reading or writing report documents.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// The document is not well-formed XML. Fatal for the file it came from.
    #[error("malformed XML document: {0}")]
    Malformed(String),

    /// I/O error reading or writing a report file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for report operations.
pub type ReportResult<T> = Result<T, ReportError>;

/// A single XML element: name, ordered attributes, optional text, children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Tag name, e.g. `testsuite`.
    pub name: String,

    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,

    /// Character data directly inside this element, if any.
    pub text: Option<String>,

    /// Child elements in document order.
    pub children: Vec<Element>,
}

impl Element {
    /// Creates an empty element with the given tag name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Returns the value of the named attribute, if present.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, replacing an existing value for the same key.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Returns the first direct child with the given tag name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Returns the text of the first direct child with the given tag name.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.find(name).and_then(|c| c.text.as_deref())
    }

    /// Iterates over direct children with the given tag name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Collects every descendant (at any depth) with the given tag name,
    /// in document order.
    pub fn descendants_named<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &str, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                out.push(child);
            }
            child.collect_named(name, out);
        }
    }

    /// Reads the named attribute as a non-negative integer, defaulting to 0
    /// when the attribute is absent or not a number.
    pub fn counter(&self, name: &str) -> u64 {
        self.attr(name)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0)
    }
}

/// The four aggregate counters attached to a `testsuites` or `testsuite`
/// node. Missing counters read as 0; summing is field-wise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub tests: u64,
    pub failures: u64,
    pub errors: u64,
    pub skipped: u64,
}

impl Counters {
    /// Reads the counters from an element's attributes.
    pub fn from_attrs(element: &Element) -> Self {
        Self {
            tests: element.counter("tests"),
            failures: element.counter("failures"),
            errors: element.counter("errors"),
            skipped: element.counter("skipped"),
        }
    }

    /// Writes the counters onto an element as string attributes.
    pub fn apply_to(&self, element: &mut Element) {
        element.set_attr("tests", self.tests.to_string());
        element.set_attr("failures", self.failures.to_string());
        element.set_attr("errors", self.errors.to_string());
        element.set_attr("skipped", self.skipped.to_string());
    }

    /// Number of passing tests implied by the counters.
    pub fn passed(&self) -> u64 {
        self.tests
            .saturating_sub(self.failures + self.errors + self.skipped)
    }
}

impl std::ops::AddAssign for Counters {
    fn add_assign(&mut self, other: Self) {
        self.tests += other.tests;
        self.failures += other.failures;
        self.errors += other.errors;
        self.skipped += other.skipped;
    }
}

/// A parsed report document.
///
/// Wraps the root element of the XML tree. Created by [`parse`](Self::parse)
/// or [`from_str`](Self::from_str), transformed by the normalizer and
/// merger, serialized by [`to_xml_string`](Self::to_xml_string).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDocument {
    /// Root element, a `testsuites`-equivalent node.
    pub root: Element,
}

impl ReportDocument {
    /// Parses a report from a file on disk.
    ///
    /// # Errors
    ///
    /// `ReportError::Io` if the file cannot be read, `ReportError::Malformed`
    /// if the contents are not well-formed XML.
    pub fn parse(path: &Path) -> ReportResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses a report from an XML string.
    pub fn from_str(xml: &str) -> ReportResult<Self> {
        let mut reader = Reader::from_str(xml);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    stack.push(element_from_start(&e)?);
                }
                Ok(Event::Empty(e)) => {
                    let element = element_from_start(&e)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::End(_)) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| ReportError::Malformed("unmatched end tag".into()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Ok(Event::Text(t)) => {
                    let text = t
                        .unescape()
                        .map_err(|e| ReportError::Malformed(e.to_string()))?;
                    if !text.trim().is_empty()
                        && let Some(current) = stack.last_mut()
                    {
                        append_text(current, &text);
                    }
                }
                Ok(Event::CData(t)) => {
                    let text = String::from_utf8_lossy(t.as_ref()).into_owned();
                    if let Some(current) = stack.last_mut() {
                        append_text(current, &text);
                    }
                }
                Ok(Event::Eof) => break,
                // Declarations, comments, processing instructions
                Ok(_) => {}
                Err(e) => return Err(ReportError::Malformed(e.to_string())),
            }
        }

        if !stack.is_empty() {
            return Err(ReportError::Malformed("unclosed element".into()));
        }

        root.map(|root| Self { root })
            .ok_or_else(|| ReportError::Malformed("document has no root element".into()))
    }

    /// Serializes the document to an XML string with declaration and
    /// 2-space indentation.
    pub fn to_xml_string(&self) -> ReportResult<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(io_from_xml)?;
        write_element(&mut writer, &self.root)?;

        String::from_utf8(writer.into_inner())
            .map_err(|e| ReportError::Malformed(e.to_string()))
    }

    /// Serializes the document and writes it to the given path.
    pub fn write_to(&self, path: &Path) -> ReportResult<()> {
        let xml = self.to_xml_string()?;
        std::fs::write(path, xml)?;
        Ok(())
    }
}

fn element_from_start(start: &BytesStart<'_>) -> ReportResult<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);

    for attr in start.attributes() {
        let attr = attr.map_err(|e| ReportError::Malformed(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| ReportError::Malformed(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }

    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> ReportResult<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(ReportError::Malformed(
                "multiple root elements".into(),
            ));
        }
    }
    Ok(())
}

fn append_text(element: &mut Element, text: &str) {
    match &mut element.text {
        Some(existing) => existing.push_str(text),
        None => element.text = Some(text.to_string()),
    }
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, element: &Element) -> ReportResult<()> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    let has_text = element.text.as_deref().is_some_and(|t| !t.is_empty());
    if element.children.is_empty() && !has_text {
        writer.write_event(Event::Empty(start)).map_err(io_from_xml)?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(io_from_xml)?;

    if let Some(text) = &element.text
        && !text.is_empty()
    {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(io_from_xml)?;
    }

    for child in &element.children {
        write_element(writer, child)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(io_from_xml)?;

    Ok(())
}

fn io_from_xml<E: std::fmt::Display>(e: E) -> ReportError {
    ReportError::Io(std::io::Error::other(e.to_string()))
}
