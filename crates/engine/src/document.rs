//! Owned template element tree built from roxmltree.
//!
//! Comments and processing instructions are dropped. Every element keeps the
//! tree path used in diagnostics (`/templates/t/div[2]`) and its source line.

use crate::error::QWebError;
use indexmap::IndexMap;
use qweb_traits::TemplateRef;
use quick_xml::escape::{escape, partial_escape};
use std::collections::HashMap;

pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "menuitem",
    "meta", "param", "source", "track", "wbr",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    pub children: Vec<Node>,
    pub path: String,
    pub line: u32,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn has(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn is_void(&self) -> bool {
        VOID_ELEMENTS.contains(&self.tag.as_str())
    }

    /// True when neither the element nor any descendant carries a directive.
    pub fn is_static(&self) -> bool {
        !self.has_directives()
            && self.children.iter().all(|child| match child {
                Node::Element(el) => el.is_static(),
                Node::Text(_) => true,
            })
    }

    pub fn has_directives(&self) -> bool {
        self.attributes
            .keys()
            .any(|k| k.starts_with("t-") || k == "groups")
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|c| match c {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    /// Serializes the element and its subtree back to XML.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_xml(&mut out);
        out
    }

    fn write_xml(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.tag);
        for (name, value) in &self.attributes {
            out.push_str(&format!(" {}=\"{}\"", name, escape(value.as_str())));
        }
        if self.children.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        for child in &self.children {
            match child {
                Node::Element(el) => el.write_xml(out),
                Node::Text(text) => out.push_str(&partial_escape(text.as_str())),
            }
        }
        out.push_str(&format!("</{}>", self.tag));
    }

    /// Indexes the serialized form of every directive-bearing element by path.
    pub fn index_nodes(&self, nodes: &mut HashMap<String, String>) {
        if self.has_directives() {
            nodes.insert(self.path.clone(), self.to_xml());
        }
        for child in self.elements() {
            child.index_nodes(nodes);
        }
    }
}

/// Parses a template document and selects the element to render for `template`.
///
/// A named reference picks the root or top-level child whose `t-name`
/// matches; anything else renders the document root.
pub fn parse_template(xml: &str, template: &TemplateRef) -> Result<Element, QWebError> {
    let doc = roxmltree::Document::parse(xml)?;
    let root = doc.root_element();
    let root_path = format!("/{}", root.tag_name().name());

    if let TemplateRef::Name(name) = template
        && root.attribute("t-name") != Some(name.as_str())
    {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        let counts = tag_counts(root);
        for child in root.children().filter(|n| n.is_element()) {
            let tag = child.tag_name().name();
            let index = seen.entry(tag).or_insert(0);
            *index += 1;
            if child.attribute("t-name") == Some(name.as_str()) {
                let path = child_path(&root_path, tag, *index, counts[tag]);
                return Ok(convert(&doc, child, path));
            }
        }
    }
    Ok(convert(&doc, root, root_path))
}

fn tag_counts<'a>(node: roxmltree::Node<'a, '_>) -> HashMap<&'a str, usize> {
    let mut counts = HashMap::new();
    for child in node.children().filter(|n| n.is_element()) {
        *counts.entry(child.tag_name().name()).or_insert(0) += 1;
    }
    counts
}

fn child_path(parent: &str, tag: &str, index: usize, same_tag: usize) -> String {
    if same_tag > 1 {
        format!("{}/{}[{}]", parent, tag, index)
    } else {
        format!("{}/{}", parent, tag)
    }
}

fn convert(doc: &roxmltree::Document, node: roxmltree::Node, path: String) -> Element {
    let attributes = node
        .attributes()
        .map(|a| (a.name().to_string(), a.value().to_string()))
        .collect();

    let counts = tag_counts(node);
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut children = Vec::new();
    for child in node.children() {
        if child.is_element() {
            let tag = child.tag_name().name();
            let index = seen.entry(tag).or_insert(0);
            *index += 1;
            let child_path = child_path(&path, tag, *index, counts[tag]);
            children.push(Node::Element(convert(doc, child, child_path)));
        } else if child.is_text()
            && let Some(text) = child.text()
        {
            // Adjacent text (split around a dropped comment) is merged.
            if let Some(Node::Text(prev)) = children.last_mut() {
                prev.push_str(text);
            } else {
                children.push(Node::Text(text.to_string()));
            }
        }
    }

    Element {
        tag: node.tag_name().name().to_string(),
        attributes,
        children,
        path,
        line: doc.text_pos_at(node.range().start).row,
    }
}
