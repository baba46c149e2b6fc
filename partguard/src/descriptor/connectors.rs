use super::{DescriptorValidator, Once, OpenConnector, Tag};
use crate::diagnostics::Code;
use crate::facts::{PinRecord, ViewKind};
use crate::xml::Element;

const PIN_ATTRIBUTES: &[&str] = &["layer", "svgId", "terminalId", "legId", "hybrid"];

impl DescriptorValidator<'_> {
    /// `connectors/connector`
    pub(super) fn connector(&mut self, element: &Element, tag: &Tag, depth: usize) {
        self.state.connector = None;
        self.state.pin_view = None;
        if *tag != Tag::Connector {
            self.unexpected(element, "connector", depth);
            return;
        }

        let line = element.line;
        let id = element.attr("id");
        let mut recorded = false;
        match id {
            None => self.out.at(Code::ConnectorIdMissing, line, "connector has no id"),
            Some(id) => match self.facts.define_connector(id, line) {
                Ok(record) => {
                    record.name = element.attr("name").map(str::to_string);
                    record.kind = element.attr("type").map(str::to_string);
                    recorded = true;
                }
                Err(first) => self.out.at(
                    Code::DuplicateId,
                    line,
                    format!("connector id '{}' already defined at line {}", id, first.line),
                ),
            },
        }
        let label = id.unwrap_or("(no id)");

        match element.attr("name") {
            None => self.out.at(Code::ConnectorNameMissing, line, format!("connector {} has no name", label)),
            Some(name) => {
                if let Err(first) = self.facts.define_connector_name(name, line) {
                    if self.options.name_dup_warnings {
                        self.out.at(
                            Code::DuplicateConnectorName,
                            line,
                            format!("connector name '{}' already used at line {}", name, first.line),
                        );
                    }
                }
            }
        }

        match element.attr("type") {
            None => self.out.at(Code::ConnectorTypeMissing, line, format!("connector {} has no type", label)),
            Some(kind) => {
                if kind != "male" && !self.generic_breadboard && self.state.once.first(Once::TypeNotMale) {
                    self.out.at(
                        Code::TypeNotMale,
                        line,
                        format!("connector {} type is '{}', normally male", label, kind),
                    );
                }
            }
        }

        self.state.connector = Some(OpenConnector {
            id: id.map(str::to_string),
            recorded,
            described: false,
        });
    }

    /// `connector/description` and `connector/views`
    pub(super) fn connector_child(&mut self, element: &Element, tag: &Tag, depth: usize) {
        self.state.pin_view = None;
        match tag {
            Tag::Description => {
                if let Some(open) = self.state.connector.as_mut() {
                    open.described = true;
                }
                // Descriptions may hold markup; none of it is grammar.
                self.quarantine(depth);
            }
            Tag::Views => {
                let described = self.state.connector.as_ref().map_or(true, |c| c.described);
                if !described {
                    self.out.at(
                        Code::DescriptionMissing,
                        element.line,
                        format!("connector {} has views but no description before them", self.open_label()),
                    );
                }
            }
            Tag::P => {
                self.out.at(Code::PinOutsideView, element.line, "<p> outside a view");
                self.quarantine(depth);
            }
            _ => self.unexpected(element, "description or views", depth),
        }
    }

    /// `connector/views/<name>View`
    pub(super) fn connector_view(&mut self, element: &Element, tag: &Tag, depth: usize) {
        self.state.pin_view = None;
        match tag {
            Tag::View(kind) if kind.has_connectors() => self.state.pin_view = Some(*kind),
            Tag::View(kind) => {
                self.out.at(
                    Code::PinViewInvalid,
                    element.line,
                    format!("connector {} has pins in {}", self.open_label(), kind),
                );
                self.quarantine(depth);
            }
            Tag::P => {
                self.out.at(
                    Code::PinOutsideView,
                    element.line,
                    format!("connector {} has a <p> with no view name", self.open_label()),
                );
                self.quarantine(depth);
            }
            _ => self.unexpected(element, "a view name", depth),
        }
    }

    /// `connector/views/<name>View/p`
    pub(super) fn connector_pin(&mut self, element: &Element, tag: &Tag, depth: usize) {
        if *tag != Tag::P {
            self.unexpected(element, "p", depth);
            return;
        }
        let Some(view) = self.state.pin_view else {
            return;
        };
        let line = element.line;
        let label = self.open_label();
        let connector_id = self.state.connector.as_ref().and_then(|c| c.id.clone());
        let recorded = self.state.connector.as_ref().is_some_and(|c| c.recorded);

        for (key, _) in &element.attributes {
            if !PIN_ATTRIBUTES.contains(&key.as_str()) {
                self.out.at(
                    Code::UnknownPinAttribute,
                    line,
                    format!("unexpected attribute '{}' on connector {} in {}", key, label, view),
                );
            }
        }

        let hybrid = match element.attr("hybrid") {
            None => false,
            Some("yes") => true,
            Some(other) => {
                self.out.at(
                    Code::HybridInvalid,
                    line,
                    format!("hybrid is '{}' on connector {}, only 'yes' is valid", other, label),
                );
                false
            }
        };

        let pin = PinRecord {
            layer: element.attr("layer").map(str::to_string),
            anchor: element.attr("svgId").map(str::to_string),
            terminal: element.attr("terminalId").map(str::to_string),
            leg: element.attr("legId").map(str::to_string),
            hybrid,
            line,
        };

        self.check_pin_layer(view, &pin, &label, connector_id.as_deref());

        if pin.anchor.is_none() && !hybrid {
            self.out.at(
                Code::AnchorRefMissing,
                line,
                format!("connector {} has no svgId in {}", label, view),
            );
        }
        if pin.terminal.is_some() && pin.leg.is_some() {
            self.out.at(
                Code::TerminalAndLeg,
                line,
                format!("connector {} has both terminalId and legId", label),
            );
        }
        if view == ViewKind::Schematic && pin.terminal.is_none() && !hybrid {
            self.out.at(
                Code::SchematicTerminalMissing,
                line,
                format!("connector {} has no terminalId in schematicView", label),
            );
        }

        for anchor in [&pin.anchor, &pin.terminal, &pin.leg].into_iter().flatten() {
            if let Some(id) = &connector_id {
                if !anchor_belongs_to(anchor, id) {
                    self.out.at(
                        Code::AnchorPrefixMismatch,
                        line,
                        format!("'{}' doesn't start with its connector id '{}'", anchor, id),
                    );
                }
            }
            if hybrid {
                self.facts.append_optional_anchor(view, anchor);
            } else {
                self.facts.append_anchor(view, anchor);
            }
        }

        if recorded {
            if let Some(record) = connector_id.as_deref().and_then(|id| self.facts.connector_mut(id)) {
                record.views.entry(view).or_default().push(pin);
            }
        }
    }

    fn check_pin_layer(&mut self, view: ViewKind, pin: &PinRecord, label: &str, id: Option<&str>) {
        let Some(layer) = pin.layer.as_deref() else {
            self.out.at(
                Code::PinLayerMissing,
                pin.line,
                format!("connector {} has no layer in {}", label, view),
            );
            return;
        };

        let view_layers = self.facts.view(view).map(|v| v.layers.clone()).unwrap_or_default();
        if view_layers.is_empty() {
            self.out.at(
                Code::ViewHasNoLayer,
                pin.line,
                format!("connector {} uses {} which declares no layers", label, view),
            );
        } else if !view_layers.iter().any(|l| l == layer) {
            self.out.at(
                Code::PinLayerMismatch,
                pin.line,
                format!(
                    "connector {} layer '{}' is not a layer of {} ({})",
                    label,
                    layer,
                    view,
                    view_layers.join(", ")
                ),
            );
        }

        if view == ViewKind::Pcb && matches!(layer, "copper0" | "copper1") {
            let repeated = id
                .and_then(|id| self.facts.connector(id))
                .is_some_and(|c| c.pins(ViewKind::Pcb).iter().any(|p| p.layer.as_deref() == Some(layer)));
            if repeated {
                self.out.at(
                    Code::CopperLayerRepeated,
                    pin.line,
                    format!("connector {} already has a {} pin", label, layer),
                );
            }
        }
    }

    fn open_label(&self) -> String {
        self.state
            .connector
            .as_ref()
            .and_then(|c| c.id.clone())
            .unwrap_or_else(|| "(no id)".to_string())
    }
}

/// `connector1pin` belongs to `connector1`, `connector10pin` does not.
fn anchor_belongs_to(anchor: &str, connector_id: &str) -> bool {
    match anchor.strip_prefix(connector_id) {
        Some(rest) => !rest.starts_with(|c: char| c.is_ascii_digit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::anchor_belongs_to;

    #[test]
    fn test_anchor_belongs_to() {
        assert!(anchor_belongs_to("connector1pin", "connector1"));
        assert!(anchor_belongs_to("connector1terminal", "connector1"));
        assert!(!anchor_belongs_to("connector10pin", "connector1"));
        assert!(!anchor_belongs_to("pin1", "connector1"));
    }
}
