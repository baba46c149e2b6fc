use super::{CopperSeen, Frame, GraphicValidator, Once};
use crate::diagnostics::Code;
use crate::facts::ViewKind;
use crate::xml::Element;

/// Containers whose content is never rendered in place.
const DEFS: &[&str] = &["defs", "symbol", "clipPath"];

const DRAWING: &[&str] = &["rect", "line", "text", "polyline", "polygon", "path", "circle", "ellipse"];

impl GraphicValidator<'_> {
    pub(super) fn layer(&mut self, element: &Element, depth: usize) {
        let name = element.local_name();
        if DEFS.contains(&name) {
            self.stack.push(Frame::Defs, depth);
            return;
        }
        let Some(id) = element.id() else {
            return;
        };
        if self.ctx.is_layer_id(id) {
            self.enter_layer(element, id, depth);
        } else if self.is_subpart_group(id) {
            self.enter_subpart(element, id, depth);
        }
    }

    fn enter_layer(&mut self, element: &Element, id: &str, depth: usize) {
        let line = element.line;
        if !matches!(element.local_name(), "g" | "svg") {
            self.out.at(
                Code::LayerNotGroup,
                line,
                format!("layer '{}' is a <{}>, not a group", id, element.name),
            );
        }
        self.stack.push(Frame::Layer(id.to_string()), depth);
        let first = self.state.layers_seen.get(id).copied();

        match id {
            "silkscreen" | "copper0" | "copper1" => self.board_layer(element, id, first),
            _ => {
                if let Some(first) = first {
                    self.out.at(
                        Code::LayerIdRepeatedInGraphic,
                        line,
                        format!("layer '{}' already started at line {}", id, first),
                    );
                }
            }
        }
        self.state.layers_seen.entry(id.to_string()).or_insert(line);
    }

    /// Nesting and ordering of the silkscreen and copper layers.
    fn board_layer(&mut self, element: &Element, id: &str, first: Option<u32>) {
        let line = element.line;
        let level = self.layer_frames();
        if let Some(first) = first {
            self.out.at(
                Code::LayerRepeated,
                line,
                format!("layer '{}' already started at line {}", id, first),
            );
            return;
        }

        match id {
            "silkscreen" => {
                if !self.state.coppers.is_empty() {
                    self.out.at(
                        Code::SilkscreenBelowCopper,
                        line,
                        "silkscreen comes after a copper layer and will be drawn under it",
                    );
                }
                if level != 1 {
                    self.out.at(Code::SilkscreenNested, line, "silkscreen is nested inside another layer");
                }
            }
            "copper1" => {
                if level != 1 {
                    self.out.at(Code::Copper1Nested, line, "copper1 is nested inside another layer");
                }
            }
            _ => {
                if level > 2 {
                    self.out.at(
                        Code::CopperTooDeep,
                        line,
                        format!("copper0 is nested {} layers deep, at most 2 are allowed", level),
                    );
                }
            }
        }

        if id != "silkscreen" {
            let transform = element.attr("transform").map(str::to_string);
            if let Some(other) = self.state.coppers.first().cloned() {
                if other.level == level {
                    self.out.at(
                        Code::CopperSameLevel,
                        line,
                        format!("{} and {} are at the same level, copper0 must be inside copper1", other.layer, id),
                    );
                }
                if other.transform != transform && self.state.once.first(Once::TransformMismatch) {
                    self.out.at(
                        Code::CopperTransformMismatch,
                        line,
                        format!(
                            "{} transform {:?} differs from {} transform {:?}",
                            id, transform, other.layer, other.transform
                        ),
                    );
                }
            }
            self.state.coppers.push(CopperSeen {
                layer: id.to_string(),
                level,
                transform,
            });
        }
    }

    fn is_subpart_group(&self, id: &str) -> bool {
        self.ctx.view == Some(ViewKind::Schematic)
            && self.ctx.facts.is_some_and(|facts| facts.subpart(id).is_some())
    }

    fn enter_subpart(&mut self, element: &Element, id: &str, depth: usize) {
        let line = element.line;
        if let Some(first) = self.ledger.subpart_groups.get(id) {
            self.out.at(
                Code::SubpartGroupRepeated,
                line,
                format!("subpart group '{}' already started at line {}", id, first),
            );
        } else {
            self.ledger.subpart_groups.insert(id.to_string(), line);
        }

        let layer_depth = (0..self.stack.len())
            .rev()
            .find(|&i| matches!(self.stack.get(i), Some(Frame::Layer(_))))
            .and_then(|i| self.stack.depth_of(i));
        if layer_depth.map_or(true, |d| d + 1 != depth) {
            self.out.at(
                Code::SubpartNotTopLevel,
                line,
                format!("subpart group '{}' is not directly inside the schematic layer", id),
            );
        }
        self.stack.push(Frame::Subpart(id.to_string()), depth);
    }

    /// Drawing content outside every layer is invisible to the application.
    pub(super) fn drawing_before_layer(&mut self, element: &Element) {
        if self.ctx.view == Some(ViewKind::Icon)
            || !self.state.layers_seen.is_empty()
            || !DRAWING.contains(&element.local_name())
            || self.stack.any(|f| *f == Frame::Defs)
        {
            return;
        }
        if self.state.once.first(Once::DrawingBeforeLayer) {
            self.out.at(
                Code::DrawingBeforeLayer,
                element.line,
                format!("<{}> appears before any layer group", element.name),
            );
        }
    }
}
