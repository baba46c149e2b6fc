use std::path::Path;

use roxmltree::{Document as RoDocument, Node as RoNode, ParsingOptions};

use super::tree::{Document, Element, Node};
use crate::core::PartGuardError;

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Parse `text` into an owned tree.
///
/// Whitespace-only text is dropped so the serializer can re-indent freely,
/// except inside `text` and `tspan` where it separates words.
/// Namespaced names come back with the prefix the source used, and the
/// `xmlns` declarations are restored on the element that introduced them.
pub fn parse_str(text: &str) -> Result<Document, roxmltree::Error> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = RoDocument::parse_with_options(text, options)?;
    let root = convert(&doc, doc.root_element(), None);
    Ok(Document { root })
}

pub fn parse_file(path: &Path) -> Result<Document, PartGuardError> {
    let text = std::fs::read_to_string(path)?;
    parse_str(&text).map_err(|e| PartGuardError::Parse(format!("{}: {}", path.display(), e)))
}

fn convert(doc: &RoDocument<'_>, node: RoNode<'_, '_>, parent: Option<RoNode<'_, '_>>) -> Element {
    let mut element = Element::new(qualified_name(
        node,
        node.tag_name().namespace(),
        node.tag_name().name(),
        false,
    ));
    element.line = doc.text_pos_at(node.range().start).row;

    for ns in node.namespaces() {
        if ns.uri() == XML_NS {
            continue;
        }
        let inherited = parent
            .map(|p| p.namespaces().any(|pns| pns.name() == ns.name() && pns.uri() == ns.uri()))
            .unwrap_or(false);
        if inherited {
            continue;
        }
        let key = match ns.name() {
            Some(prefix) => format!("xmlns:{}", prefix),
            None => "xmlns".to_string(),
        };
        element.attributes.push((key, ns.uri().to_string()));
    }

    for attr in node.attributes() {
        let key = qualified_name(node, attr.namespace(), attr.name(), true);
        element.set_attr(&key, attr.value());
    }

    // Blank text between tspans is a word separator.
    let keep_blank = matches!(node.tag_name().name(), "text" | "tspan");
    for child in node.children() {
        if child.is_element() {
            element
                .children
                .push(Node::Element(convert(doc, child, Some(node))));
        } else if child.is_text() {
            let text = child.text().unwrap_or_default();
            if keep_blank || !text.trim().is_empty() {
                element.children.push(Node::Text(text.to_string()));
            }
        } else if child.is_comment() {
            element
                .children
                .push(Node::Comment(child.text().unwrap_or_default().to_string()));
        }
    }

    element
}

fn qualified_name(node: RoNode<'_, '_>, namespace: Option<&str>, local: &str, attribute: bool) -> String {
    let Some(uri) = namespace else {
        return local.to_string();
    };
    if uri == XML_NS {
        return format!("xml:{}", local);
    }
    // Elements may use the default namespace; attributes never do.
    let mut prefixed = None;
    for ns in node.namespaces().filter(|ns| ns.uri() == uri) {
        match ns.name() {
            None if !attribute => return local.to_string(),
            Some(prefix) => prefixed = prefixed.or(Some(prefix)),
            None => {}
        }
    }
    match prefixed {
        Some(prefix) => format!("{}:{}", prefix, local),
        None => local.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_lines_and_drops_blank_text() {
        let doc = parse_str("<module moduleId=\"x\">\n  <title>Part</title>\n  <views/>\n</module>")
            .unwrap();
        assert_eq!(doc.root.line, 1);
        let children: Vec<&Element> = doc.root.child_elements().collect();
        assert_eq!(children.len(), 2);
        assert_eq!(doc.root.children.len(), 2);
        assert_eq!(children[0].line, 2);
        assert_eq!(children[0].text(), "Part");
        assert_eq!(children[1].line, 3);
    }

    #[test]
    fn test_parse_restores_namespaces() {
        let text = r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:sodipodi="http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd" width="1in"><sodipodi:namedview sodipodi:docname="a.svg"/><text xml:space="preserve">A</text></svg>"#;
        let doc = parse_str(text).unwrap();
        assert_eq!(doc.root.name, "svg");
        assert_eq!(doc.root.attr("xmlns"), Some("http://www.w3.org/2000/svg"));
        assert!(doc.root.attr("xmlns:sodipodi").is_some());
        assert_eq!(doc.root.attr("width"), Some("1in"));

        let children: Vec<&Element> = doc.root.child_elements().collect();
        assert_eq!(children[0].name, "sodipodi:namedview");
        assert_eq!(children[0].attr("sodipodi:docname"), Some("a.svg"));
        assert!(children[0].attr("xmlns:sodipodi").is_none());
        assert_eq!(children[1].attr("xml:space"), Some("preserve"));
    }

    #[test]
    fn test_parse_keeps_blank_text_between_tspans() {
        let doc = parse_str("<svg><text><tspan>A</tspan> <tspan>B</tspan></text></svg>").unwrap();
        let text = doc.root.child_elements().next().unwrap();
        assert_eq!(text.children.len(), 3);
        assert_eq!(text.text(), " ");
    }

    #[test]
    fn test_parse_accepts_doctype() {
        let text = "<?xml version=\"1.0\"?>\n<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \"http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd\">\n<svg/>";
        let doc = parse_str(text).unwrap();
        assert_eq!(doc.root.line, 3);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_str("<module><views></module>").is_err());
    }
}
