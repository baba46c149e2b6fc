use quick_xml::escape::escape;

use super::tree::{Document, Element, Node};

const INDENT: &str = "  ";

/// How much layout the serializer adds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// One element per line.
    Element,
    /// One element per line and one attribute per line.
    Attribute,
}

/// Serialize `doc` with an XML declaration and two-space indentation.
///
/// Elements holding non-whitespace text are written on a single line so
/// their text round-trips unchanged.
pub fn to_string(doc: &Document, granularity: Granularity) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    write_element(&mut out, &doc.root, 0, granularity);
    out
}

fn write_element(out: &mut String, element: &Element, depth: usize, granularity: Granularity) {
    let pad = INDENT.repeat(depth);
    out.push_str(&pad);

    if element.children.iter().any(Node::is_significant_text) {
        write_inline(out, element);
        out.push('\n');
        return;
    }

    write_open_tag(out, element, &pad, granularity);
    if element.children.iter().all(|c| matches!(c, Node::Text(_))) {
        out.push_str("/>\n");
        return;
    }
    out.push_str(">\n");
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(out, e, depth + 1, granularity),
            Node::Comment(c) => {
                out.push_str(&pad);
                out.push_str(INDENT);
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->\n");
            }
            Node::Text(_) => {}
        }
    }
    out.push_str(&pad);
    out.push_str("</");
    out.push_str(&element.name);
    out.push_str(">\n");
}

fn write_open_tag(out: &mut String, element: &Element, pad: &str, granularity: Granularity) {
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attributes {
        match granularity {
            Granularity::Element => out.push(' '),
            Granularity::Attribute => {
                out.push('\n');
                out.push_str(pad);
                out.push_str(INDENT);
            }
        }
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value.as_str()));
        out.push('"');
    }
}

fn write_inline(out: &mut String, element: &Element) {
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value.as_str()));
        out.push('"');
    }
    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &element.children {
        match child {
            Node::Element(e) => write_inline(out, e),
            Node::Text(t) => out.push_str(&escape(t.as_str())),
            Node::Comment(c) => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            }
        }
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}
