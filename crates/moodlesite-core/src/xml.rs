//! Minimal element tree over `quick-xml`.
//!
//! Backup manifests are small enough to load whole, and every reader only needs
//! child lookup, attributes and text, so events are folded into a plain tree.

use std::path::Path;

use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};

use crate::error::{CoreError, Result};

/// An XML element with its attributes, direct text and children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    /// Parse a document from a string, returning its root element.
    pub fn parse_str(input: &str) -> std::result::Result<Self, String> {
        let mut reader = Reader::from_str(input);
        let mut stack: Vec<Element> = Vec::new();
        let mut root = None;

        loop {
            match reader.read_event().map_err(|e| e.to_string())? {
                Event::Start(start) => stack.push(Self::from_start(&start)?),
                Event::Empty(start) => {
                    let element = Self::from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| "closing tag without opening tag".to_string())?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let text = text.unescape().map_err(|e| e.to_string())?;
                        current.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(format!("unclosed element <{}>", open.name));
        }
        root.ok_or_else(|| "document has no root element".to_string())
    }

    /// Load and parse a document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse_str(&content).map_err(|message| CoreError::xml(path, message))
    }

    fn from_start(start: &BytesStart<'_>) -> std::result::Result<Self, String> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|e| e.to_string())?;
            attributes.push((key, value.into_owned()));
        }
        Ok(Self {
            name,
            attributes,
            ..Self::default()
        })
    }

    /// Element name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attribute value by name.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Attribute value, or a missing-field error.
    pub fn require_attr(&self, key: &str) -> Result<&str> {
        self.attr(key)
            .ok_or_else(|| CoreError::missing_field(&self.name, key))
    }

    /// Concatenated direct text, `None` when empty.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        (!self.text.is_empty()).then_some(self.text.as_str())
    }

    /// Direct children in document order.
    #[must_use]
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// First direct child with the given name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Direct children with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Follow a `/`-separated path of first-match children.
    #[must_use]
    pub fn path(&self, path: &str) -> Option<&Element> {
        path.split('/')
            .filter(|segment| !segment.is_empty())
            .try_fold(self, |element, segment| element.child(segment))
    }

    /// Text of the first child with the given name, `None` when absent or empty.
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(Element::text)
    }

    /// Text of a child that must be present and non-empty.
    pub fn require_text(&self, name: &str) -> Result<&str> {
        self.child_text(name)
            .ok_or_else(|| CoreError::missing_field(&self.name, name))
    }

    /// First descendant (depth-first, excluding self) with the given name.
    #[must_use]
    pub fn descendant(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|child| {
            if child.name == name {
                Some(child)
            } else {
                child.descendant(name)
            }
        })
    }

    /// All descendants with the given name, in document order.
    ///
    /// Matches are not searched for further nested matches.
    #[must_use]
    pub fn descendants(&self, name: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect_descendants(name, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            } else {
                child.collect_descendants(name, found);
            }
        }
    }
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> std::result::Result<(), String> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err("multiple root elements".to_string()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<activity id="7" contextid="42">
  <page id="7">
    <name>Week 1 &amp; 2</name>
    <intro>&lt;p&gt;Hello&lt;/p&gt;</intro>
    <content><![CDATA[<b>raw</b>]]></content>
    <empty/>
  </page>
</activity>"#;

    #[test]
    fn test_parse_tree() {
        let root = Element::parse_str(DOC).unwrap();
        assert_eq!(root.name(), "activity");
        assert_eq!(root.attr("contextid"), Some("42"));

        let page = root.child("page").unwrap();
        assert_eq!(page.child_text("name"), Some("Week 1 & 2"));
        assert_eq!(page.child_text("intro"), Some("<p>Hello</p>"));
        assert_eq!(page.child_text("content"), Some("<b>raw</b>"));
        assert!(page.child("empty").is_some());
        assert_eq!(page.child_text("empty"), None);
    }

    #[test]
    fn test_path_and_descendants() {
        let root = Element::parse_str(DOC).unwrap();
        assert_eq!(root.path("page/name").and_then(Element::text), Some("Week 1 & 2"));
        assert!(root.path("page/missing").is_none());
        assert_eq!(root.descendant("intro").and_then(Element::text), Some("<p>Hello</p>"));
        assert_eq!(root.descendants("name").len(), 1);
    }

    #[test]
    fn test_require_text_missing() {
        let root = Element::parse_str(DOC).unwrap();
        let page = root.child("page").unwrap();
        let err = page.require_text("externalurl").unwrap_err();
        assert!(err.to_string().contains("externalurl"));
        assert!(err.to_string().contains("<page>"));
    }

    #[test]
    fn test_malformed_document() {
        assert!(Element::parse_str("<a><b></a>").is_err());
        assert!(Element::parse_str("<a>").is_err());
        assert!(Element::parse_str("").is_err());
    }
}
