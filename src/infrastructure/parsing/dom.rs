//! Small DOM helpers shared by the extractors

use scraper::{ElementRef, Node};
use url::Url;

/// Stand-in for `<br>` while whitespace is collapsed.
pub(crate) const BREAK_MARKER: &str = "|||";

/// All descendant text, trimmed.
pub fn cell_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// All descendant text with every `<br>` replaced by [`BREAK_MARKER`].
pub fn text_with_breaks(element: &ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if el.name() == "br" => out.push_str(BREAK_MARKER),
            _ => {}
        }
    }
    out
}

/// Value of an info-table cell.
///
/// Only text nodes directly inside the cell count; nested elements such as
/// links or tooltips are ignored. Each text node is trimmed, `<br>` becomes a
/// line break, and runs of whitespace collapse to one space.
pub fn multiline_cell_value(cell: &ElementRef<'_>) -> String {
    let mut raw = String::new();
    for child in cell.children() {
        match child.value() {
            Node::Text(text) => raw.push_str(text.trim()),
            Node::Element(el) if el.name() == "br" => raw.push_str(BREAK_MARKER),
            _ => {}
        }
    }
    collapse_whitespace(&raw).replace(BREAK_MARKER, "\n")
}

pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolve a site link against `origin`. `None` when the result is not a URL.
pub fn resolve_url(href: &str, origin: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return Url::parse(href).ok().map(String::from);
    }
    let base = Url::parse(origin).ok()?;
    base.join(href).ok().map(String::from)
}
