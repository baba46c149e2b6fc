//! Opt-in connector renumbering for graphics checked on their own.
//!
//! Drawings exported from other tools often carry connector ids that are
//! out of order or left over from deleted pins. Both modes only touch `id`
//! attributes and report every change as a repair note; a renumbered
//! drawing is left alone by a second pass.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::diagnostics::{Code, Reporter};
use crate::xml::{Element, Node};

static CONNECTOR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)connector").unwrap());
static PIN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^connector\d+pin$").unwrap());
static PIN_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)pin").unwrap());

/// Which renumbering to apply before the graphic is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Renumber {
    /// Number `connectorNpin` anchors from 0 in document order, starting at
    /// `connector0pin`. Connector ids ahead of it are renamed after their
    /// element (`connector7pin` on a `rect` becomes `rect7`).
    Pins,
    /// From the first connector id on, name alternating schematic `line` and
    /// `rect` elements `connectorNpin` and `connectorNterminal`.
    SchematicPairs,
}

/// Apply `mode` to the tree under `root`, returning the number of ids changed.
pub fn renumber_connectors(root: &mut Element, mode: Renumber, out: &mut Reporter<'_>) -> usize {
    let mut pass = Pass::default();
    match mode {
        Renumber::Pins => {
            if !any_element(root, &|e: &Element| e.id().is_some_and(|id| id.eq_ignore_ascii_case("connector0pin"))) {
                out.whole_file(Code::RenumberNoStart, "no connector0pin, pins left as they are");
                return 0;
            }
            pass.pins(root, out);
        }
        Renumber::SchematicPairs => {
            if !any_element(root, &|e: &Element| e.id().is_some_and(|id| CONNECTOR_RE.is_match(id))) {
                out.whole_file(Code::RenumberNoStart, "no connector ids, schematic pins left as they are");
                return 0;
            }
            pass.schematic_pairs(root, out);
        }
    }
    tracing::debug!(file = %out.file().display(), ?mode, changed = pass.changed, "connectors renumbered");
    pass.changed
}

fn any_element(element: &Element, pred: &dyn Fn(&Element) -> bool) -> bool {
    pred(element) || element.child_elements().any(|child| any_element(child, pred))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Expect {
    #[default]
    Line,
    Rect,
}

#[derive(Debug, Default)]
struct Pass {
    started: bool,
    next: usize,
    expect: Expect,
    changed: usize,
}

impl Pass {
    fn pins(&mut self, element: &mut Element, out: &mut Reporter<'_>) {
        if let Some(id) = element.id().map(str::to_string) {
            if CONNECTOR_RE.is_match(&id) {
                if id.eq_ignore_ascii_case("connector0pin") {
                    self.started = true;
                }
                if !self.started {
                    let retired = CONNECTOR_RE
                        .replace_all(&PIN_WORD_RE.replace_all(&id, ""), element.local_name())
                        .into_owned();
                    self.rename(element, retired, out, Code::ConnectorRetired);
                } else if PIN_RE.is_match(&id) {
                    let wanted = format!("connector{}pin", self.next);
                    self.next += 1;
                    self.rename(element, wanted, out, Code::ConnectorRenumbered);
                }
            }
        }
        for child in &mut element.children {
            if let Node::Element(child) = child {
                self.pins(child, out);
            }
        }
    }

    fn schematic_pairs(&mut self, element: &mut Element, out: &mut Reporter<'_>) {
        if !self.started && element.id().is_some_and(|id| CONNECTOR_RE.is_match(id)) {
            self.started = true;
        }
        let found = match element.local_name() {
            "line" => Some(Expect::Line),
            "rect" => Some(Expect::Rect),
            _ => None,
        };
        if let (true, Some(found)) = (self.started, found) {
            match (found, self.expect) {
                (Expect::Line, Expect::Line) => {
                    let wanted = format!("connector{}pin", self.next);
                    self.rename(element, wanted, out, Code::ConnectorRenumbered);
                    self.expect = Expect::Rect;
                }
                (Expect::Rect, Expect::Rect) => {
                    let wanted = format!("connector{}terminal", self.next);
                    self.rename(element, wanted, out, Code::ConnectorRenumbered);
                    self.next += 1;
                    self.expect = Expect::Line;
                }
                (Expect::Line, Expect::Rect) => out.at(
                    Code::RenumberOutOfSequence,
                    element.line,
                    format!("expected the <rect> of connector{}, found a <line>", self.next),
                ),
                (Expect::Rect, Expect::Line) => out.at(
                    Code::RenumberOutOfSequence,
                    element.line,
                    format!("expected the <line> of connector{}, found a <rect>", self.next),
                ),
            }
        }
        for child in &mut element.children {
            if let Node::Element(child) = child {
                self.schematic_pairs(child, out);
            }
        }
    }

    fn rename(&mut self, element: &mut Element, wanted: String, out: &mut Reporter<'_>, code: Code) {
        let current = element.id().unwrap_or_default().to_string();
        if current == wanted {
            return;
        }
        let message = match code {
            Code::ConnectorRetired => format!("connector '{}' unused, renamed to '{}'", current, wanted),
            _ if current.is_empty() => format!("<{}> named '{}'", element.name, wanted),
            _ => format!("connector '{}' changed to '{}'", current, wanted),
        };
        element.set_attr("id", wanted);
        out.at(code, element.line, message);
        self.changed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::xml::{parse_str, to_string, Granularity};
    use std::path::Path;

    fn run(source: &str, mode: Renumber) -> (Diagnostics, String, usize) {
        let mut doc = parse_str(source).unwrap();
        let mut sink = Diagnostics::new();
        let changed = renumber_connectors(&mut doc.root, mode, &mut Reporter::new(Path::new("t.svg"), &mut sink));
        (sink, to_string(&doc, Granularity::Element), changed)
    }

    #[test]
    fn test_pins_renumbered_from_connector0() {
        let source = r#"<svg><g id="breadboard">
            <rect id="connector15pin"/>
            <circle id="connector0pin"/>
            <circle id="connector4pin"/>
            <rect id="connector9terminal"/>
            <circle id="connector7pin"/>
        </g></svg>"#;
        let (sink, text, changed) = run(source, Renumber::Pins);

        assert_eq!(changed, 3);
        assert_eq!(sink.count(Code::ConnectorRetired), 1);
        assert_eq!(sink.count(Code::ConnectorRenumbered), 2);
        assert!(text.contains(r#"<rect id="rect15"/>"#), "{}", text);
        assert!(text.contains(r#"<circle id="connector1pin"/>"#));
        assert!(text.contains(r#"<circle id="connector2pin"/>"#));
        assert!(text.contains(r#"<rect id="connector9terminal"/>"#));

        let (again, _, changed) = run(&text, Renumber::Pins);
        assert_eq!(changed, 0);
        assert!(again.is_empty(), "{:?}", again);
    }

    #[test]
    fn test_pins_need_connector0() {
        let (sink, text, changed) = run(r#"<svg><circle id="connector3pin"/></svg>"#, Renumber::Pins);
        assert_eq!(changed, 0);
        assert_eq!(sink.count(Code::RenumberNoStart), 1);
        assert!(text.contains("connector3pin"));
    }

    #[test]
    fn test_schematic_pairs() {
        let source = r#"<svg><g id="schematic">
            <rect width="100" height="50"/>
            <line id="connector8pin" x2="1"/>
            <rect id="foo" width="0" height="0"/>
            <text>VCC</text>
            <line x2="1"/>
            <rect width="0" height="0"/>
        </g></svg>"#;
        let (sink, text, changed) = run(source, Renumber::SchematicPairs);

        assert_eq!(changed, 4);
        assert!(text.contains(r#"<rect width="100" height="50"/>"#));
        assert!(text.contains(r#"<line id="connector0pin" x2="1"/>"#), "{}", text);
        assert!(text.contains(r#"<rect id="connector0terminal" width="0" height="0"/>"#));
        assert!(text.contains(r#"<line x2="1" id="connector1pin"/>"#));
        assert!(text.contains(r#"<rect width="0" height="0" id="connector1terminal"/>"#));
        assert!(!sink.has(Code::RenumberOutOfSequence));

        let (_, _, changed) = run(&text, Renumber::SchematicPairs);
        assert_eq!(changed, 0);
    }

    #[test]
    fn test_schematic_pair_out_of_sequence() {
        let source = r#"<svg><line id="connector0pin"/><line/><rect/></svg>"#;
        let (sink, text, _) = run(source, Renumber::SchematicPairs);
        assert_eq!(sink.count(Code::RenumberOutOfSequence), 1);
        assert!(text.contains(r#"<rect id="connector0terminal"/>"#), "{}", text);
    }
}
