//! Allow-list HTML sanitizer for the `html` converter.
//!
//! The fragment is parsed with an HTML5 parser and re-serialized from the
//! tree, so entity-encoded or split-up payloads are seen the way a browser
//! sees them. Only known-safe elements and attributes survive; text is
//! always re-escaped.

use quick_xml::escape::{escape, partial_escape};
use scraper::{ElementRef, Html, Node};

const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "address", "b", "bdi", "bdo", "blockquote", "br", "caption", "cite", "code",
    "col", "colgroup", "dd", "del", "dfn", "div", "dl", "dt", "em", "figcaption", "figure",
    "font", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img", "ins", "kbd", "li", "mark",
    "ol", "p", "pre", "q", "s", "section", "small", "span", "strike", "strong", "sub", "sup",
    "table", "tbody", "td", "tfoot", "th", "thead", "tr", "u", "ul",
];

/// Elements dropped together with their content.
const DROPPED_TAGS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "template", "noscript", "frame", "frameset",
    "applet", "svg", "math",
];

const VOID_TAGS: &[&str] = &["br", "col", "hr", "img"];

const ALLOWED_ATTRS: &[&str] = &[
    "align", "alt", "class", "color", "colspan", "dir", "headers", "height", "href", "lang",
    "name", "rowspan", "scope", "span", "src", "target", "title", "valign", "width",
];

const URL_ATTRS: &[&str] = &["href", "src"];

const SAFE_SCHEMES: &[&str] = &["http", "https", "mailto", "tel"];

pub fn sanitize_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    write_children(fragment.root_element(), &mut out);
    out
}

fn write_children(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(&partial_escape(&**text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    write_element(child, out);
                }
            }
            _ => {}
        }
    }
}

fn write_element(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name().to_ascii_lowercase();
    if DROPPED_TAGS.contains(&name.as_str()) {
        return;
    }
    if !ALLOWED_TAGS.contains(&name.as_str()) {
        write_children(element, out);
        return;
    }
    out.push('<');
    out.push_str(&name);
    let mut attrs: Vec<(String, &str)> = element
        .value()
        .attrs()
        .map(|(attr, value)| (attr.to_ascii_lowercase(), value))
        .collect();
    attrs.sort_by(|a, b| a.0.cmp(&b.0));
    for (attr, value) in attrs {
        if !ALLOWED_ATTRS.contains(&attr.as_str()) {
            continue;
        }
        if URL_ATTRS.contains(&attr.as_str()) && !is_safe_url(value) {
            continue;
        }
        out.push(' ');
        out.push_str(&attr);
        out.push_str("=\"");
        out.push_str(&escape(value));
        out.push('"');
    }
    if VOID_TAGS.contains(&name.as_str()) {
        out.push_str("/>");
        return;
    }
    out.push('>');
    write_children(element, out);
    out.push_str("</");
    out.push_str(&name);
    out.push('>');
}

/// Relative URLs and a handful of schemes. Browsers ignore whitespace and
/// control characters inside a scheme, so those are stripped first.
fn is_safe_url(value: &str) -> bool {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    match cleaned.find(|c| matches!(c, ':' | '/' | '?' | '#')) {
        Some(i) if cleaned[i..].starts_with(':') => SAFE_SCHEMES.contains(&&cleaned[..i]),
        _ => true,
    }
}
