use super::{DescriptorValidator, Tag};
use crate::diagnostics::Code;
use crate::facts::{ViewKind, BOARD_LAYERS};
use crate::xml::Element;

impl DescriptorValidator<'_> {
    /// `views/<name>View`
    pub(super) fn view_name(&mut self, element: &Element, tag: &Tag, depth: usize) {
        self.state.view = None;
        match tag {
            Tag::View(kind) => match self.facts.define_view(*kind, element.line) {
                Ok(_) => self.state.view = Some(*kind),
                Err(first) => {
                    self.out.at(
                        Code::ViewRepeated,
                        element.line,
                        format!("{} already declared at line {}, ignored", kind, first.line),
                    );
                    self.quarantine(depth);
                }
            },
            Tag::Layers => {
                self.out.at(Code::ViewNameMissing, element.line, "<layers> without an enclosing view name");
                self.quarantine(depth);
            }
            Tag::Unknown(name) => {
                self.out.at(
                    Code::UnknownView,
                    element.line,
                    format!("view <{}> is not a recognised view (typo?)", name),
                );
                self.quarantine(depth);
            }
            _ => self.unexpected(element, "a view name", depth),
        }
    }

    /// `views/<name>View/layers`
    pub(super) fn view_layers(&mut self, element: &Element, tag: &Tag, depth: usize) {
        if *tag != Tag::Layers {
            self.unexpected(element, "layers", depth);
            return;
        }
        let Some(view) = self.state.view else {
            return;
        };
        let Some(image) = element.attr("image") else {
            self.out.at(Code::ImageMissing, element.line, format!("{} has no image", view));
            return;
        };
        if let Some(record) = self.facts.view_mut(view) {
            match &record.image {
                Some(first) => {
                    let message = format!("{} already uses image '{}'; '{}' ignored", view, first, image);
                    self.out.at(Code::ImageRepeated, element.line, message);
                }
                None => record.image = Some(image.to_string()),
            }
        }
    }

    /// `views/<name>View/layers/layer`
    pub(super) fn view_layer(&mut self, element: &Element, tag: &Tag, depth: usize) {
        if *tag != Tag::Layer {
            self.unexpected(element, "layer", depth);
            return;
        }
        let Some(view) = self.state.view else {
            return;
        };
        let Some(layer) = element.attr("layerId") else {
            self.out.at(Code::LayerIdMissing, element.line, format!("layer in {} has no layerId", view));
            return;
        };
        let Some(record) = self.facts.view_mut(view) else {
            return;
        };

        if view != ViewKind::Pcb {
            if let Some(first) = record.layers.first() {
                let message = format!("{} already has layerId '{}'; '{}' ignored", view, first, layer);
                self.out.at(Code::LayerIdRepeated, element.line, message);
            } else {
                record.layers.push(layer.to_string());
            }
            return;
        }

        if record.layers.iter().any(|l| l == layer) {
            self.out.at(
                Code::LayerIdRepeated,
                element.line,
                format!("pcbView already has layerId '{}', ignored", layer),
            );
            return;
        }
        record.layers.push(layer.to_string());

        if !BOARD_LAYERS.contains(&layer) {
            self.out.at(
                Code::UnknownBoardLayer,
                element.line,
                format!("'{}' is not a pcb layer", layer),
            );
        }
        match layer {
            "copper0" => self.facts.copper.copper0 = Some(element.line),
            "copper1" => self.facts.copper.copper1 = Some(element.line),
            _ => {}
        }
    }
}
