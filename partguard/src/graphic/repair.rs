//! In-place repairs. Each one is a fixed point: a repaired tree triggers
//! no further repair on the next run.

use std::sync::LazyLock;

use regex::Regex;

use super::{GraphicValidator, Once};
use crate::diagnostics::Code;
use crate::xml::{Element, Node};

static XML_NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_:][A-Za-z0-9_.:-]*$").unwrap());

const FONT_FAMILIES: &[&str] = &["DroidSans", "Droid Sans", "OCRA", "OCR-A"];

const BLACK: &[&str] = &["black", "#000000", "#000", "rgb(0,0,0)", "rgb(0, 0, 0)"];

/// Concatenated text of `element` and its descendants, in document order.
fn all_text(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Text(text) => out.push_str(text),
            Node::Element(e) => all_text(e, out),
            Node::Comment(_) => {}
        }
    }
}

/// Attributes of nested tspans, first seen wins, ids dropped.
fn tspan_attributes(element: &Element, out: &mut Vec<(String, String)>) {
    for child in element.child_elements() {
        for (key, value) in &child.attributes {
            if key != "id" && !out.iter().any(|(k, _)| k == key) {
                out.push((key.clone(), value.clone()));
            }
        }
        tspan_attributes(child, out);
    }
}

/// Split a style string on the `;` that separate declarations, skipping
/// those inside parentheses or quotes (`url(data:...;base64,...)`).
fn declarations(style: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote = None;
    let mut start = 0;
    for (at, c) in style.char_indices() {
        match (quote, c) {
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                parts.push(&style[start..at]);
                start = at + 1;
            }
            _ => {}
        }
    }
    parts.push(&style[start..]);
    parts
}

/// Default `xml:space` handling: newlines dropped, tabs become spaces,
/// runs of spaces collapse and the ends are trimmed.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' | '\r' => {}
            '\t' | ' ' => {
                if !out.is_empty() && !out.ends_with(' ') {
                    out.push(' ');
                }
            }
            _ => out.push(c),
        }
    }
    out.truncate(out.trim_end().len());
    out
}

fn any_descendant(element: &Element, pred: &dyn Fn(&Element) -> bool) -> bool {
    element
        .child_elements()
        .any(|child| pred(child) || any_descendant(child, pred))
}

impl GraphicValidator<'_> {
    pub(super) fn reference_file(&mut self, element: &mut Element) {
        if element.local_name() != "referenceFile" || self.ctx.reference_name.is_empty() {
            return;
        }
        let current = element.text();
        if current.trim() == self.ctx.reference_name {
            return;
        }
        element.set_text(self.ctx.reference_name.clone());
        self.repaired(
            Code::ReferenceFileCorrected,
            element.line,
            format!("referenceFile '{}' set to '{}'", current.trim(), self.ctx.reference_name),
        );
    }

    /// Split `style` into presentation attributes.
    pub(super) fn inline_style(&mut self, element: &mut Element) {
        let Some(style) = element.remove_attr("style") else {
            return;
        };
        let line = element.line;
        let mut inlined = Vec::new();
        let mut kept = Vec::new();
        for declaration in declarations(&style) {
            let Some((key, value)) = declaration.split_once(':') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() {
                continue;
            }
            if !XML_NAME_RE.is_match(key) {
                if self.state.once.first(Once::StyleKey(key.to_string())) {
                    self.out.at(
                        Code::InvalidStyleKey,
                        line,
                        format!("style property '{}' is not a valid attribute name, left in style", key),
                    );
                }
                kept.push(format!("{}:{}", key, value));
                continue;
            }
            element.set_attr(key, value);
            inlined.push(key.to_string());
        }
        if !kept.is_empty() {
            element.set_attr("style", kept.join(";"));
        }
        if !inlined.is_empty() {
            self.repaired(
                Code::StyleInlined,
                line,
                format!("style converted to attributes: {}", inlined.join(", ")),
            );
        }
    }

    pub(super) fn flatten_tspans(&mut self, element: &mut Element) {
        let name = element.local_name();
        if !self.options.flatten_tspans {
            if name == "tspan" && self.state.once.first(Once::TspanPresent) {
                self.out.at(
                    Code::TspanPresent,
                    element.line,
                    "<tspan> in the svg, Fritzing renders it poorly",
                );
            }
            return;
        }
        if name != "text" || !element.child_elements().any(|c| c.local_name() == "tspan") {
            return;
        }

        let line = element.line;
        let preserves = |e: &Element| e.attr("xml:space") == Some("preserve");
        if preserves(&*element) || any_descendant(element, &preserves) {
            self.out.at(
                Code::TspanPreserveSpace,
                line,
                "text with xml:space=\"preserve\" and tspans, left unchanged",
            );
            return;
        }
        if any_descendant(element, &|e: &Element| e.local_name() != "tspan") {
            self.out.at(
                Code::ForeignTextChild,
                line,
                "text contains elements other than tspan, left unchanged",
            );
            return;
        }

        let mut raw = String::new();
        all_text(element, &mut raw);
        let text = collapse_whitespace(&raw);
        let mut merged = Vec::new();
        tspan_attributes(element, &mut merged);
        for (key, value) in merged {
            // Declarations from the tspans follow the text's own so they win
            // once the style is inlined.
            let value = match (key.as_str(), element.attr("style")) {
                ("style", Some(own)) => format!("{};{}", own, value),
                _ => value,
            };
            element.set_attr(&key, value);
        }
        element.set_text(text.clone());
        self.repaired(
            Code::TspanFlattened,
            line,
            format!("tspans merged into their text element, text is now {:?}", text),
        );
        self.geometry_changed(line);
    }

    pub(super) fn fonts(&mut self, element: &mut Element) {
        if let Some(size) = element.attr("font-size") {
            if let Some(at) = size.to_ascii_lowercase().find("px") {
                let stripped = format!("{}{}", &size[..at], &size[at + 2..]).trim().to_string();
                let message = format!("font-size '{}' changed to '{}'", size, stripped);
                element.set_attr("font-size", stripped);
                self.repaired(Code::FontSizePx, element.line, message);
            }
        }

        if let Some(family) = element.attr("font-family") {
            let family = family.trim().trim_matches(|c| c == '\'' || c == '"').trim();
            if !FONT_FAMILIES.contains(&family) && self.state.once.first(Once::UnsupportedFont) {
                self.out.at(
                    Code::UnsupportedFont,
                    element.line,
                    format!("font-family '{}' is not supported, use Droid Sans or OCR-A", family),
                );
            }
        }
    }

    /// Copper circles and paths lose `stroke-width` inherited from a group
    /// when the application moves them, so copy it down.
    pub(super) fn inherit_stroke_width(&mut self, element: &mut Element, depth: usize) {
        if !matches!(self.current_layer(), Some("copper0" | "copper1")) {
            return;
        }
        if let Some(width) = element.attr("stroke-width") {
            self.state.stroke.push(width.to_string(), depth);
            return;
        }
        if !matches!(element.local_name(), "circle" | "path") {
            return;
        }
        let Some(width) = self.state.stroke.top().cloned() else {
            return;
        };
        element.set_attr("stroke-width", width.as_str());
        self.repaired(
            Code::StrokeWidthInherited,
            element.line,
            format!("inherited stroke-width {} copied onto <{}>", width, element.name),
        );
    }

    pub(super) fn silkscreen_colour(&mut self, element: &mut Element) {
        if !matches!(self.current_layer(), Some("silkscreen" | "silkscreen0")) {
            return;
        }
        for attr in ["stroke", "fill"] {
            let Some(colour) = element.attr(attr) else {
                continue;
            };
            let lower = colour.trim().to_ascii_lowercase();
            if lower == "none" || BLACK.contains(&lower.as_str()) {
                continue;
            }
            let message = format!("silkscreen {} '{}' set to black", attr, colour);
            element.set_attr(attr, "#000000");
            self.repaired(Code::SilkscreenRecolored, element.line, message);
        }
    }
}
