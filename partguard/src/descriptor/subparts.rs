use super::{DescriptorValidator, Tag};
use crate::diagnostics::Code;
use crate::facts::{Grouping, ViewKind};
use crate::xml::Element;

impl DescriptorValidator<'_> {
    /// `schematic-subparts/subpart`
    pub(super) fn subpart(&mut self, element: &Element, tag: &Tag, depth: usize) {
        self.state.subpart = None;
        if *tag != Tag::Subpart {
            self.unexpected(element, "subpart", depth);
            return;
        }
        if self.grouping_taken(element, Grouping::Subparts, depth) {
            return;
        }
        let line = element.line;
        let Some(id) = element.attr("id") else {
            self.out.at(Code::SubpartIdMissing, line, "subpart has no id");
            self.quarantine(depth);
            return;
        };
        if self.facts.connector(id).is_some() {
            self.out.at(
                Code::SubpartIdCollision,
                line,
                format!("subpart id '{}' is already a connector id", id),
            );
        }
        if let Err(first) = self.facts.define_subpart(id, line) {
            self.out.at(
                Code::SubpartRedefined,
                line,
                format!("subpart '{}' already defined at line {}", id, first.line),
            );
            self.quarantine(depth);
            return;
        }
        self.facts.grouping = Some(Grouping::Subparts);

        match element.attr("label") {
            None => self.out.at(Code::SubpartLabelMissing, line, format!("subpart '{}' has no label", id)),
            Some(label) => {
                if let Some(record) = self.facts.subpart_mut(id) {
                    record.label = Some(label.to_string());
                }
                if let Err(first) = self.facts.define_subpart_label(label, line) {
                    self.out.at(
                        Code::DuplicateId,
                        line,
                        format!("subpart label '{}' already used at line {}", label, first.line),
                    );
                }
            }
        }
        self.state.subpart = Some(id.to_string());
    }

    /// `schematic-subparts/subpart/connectors`
    pub(super) fn subpart_connectors(&mut self, element: &Element, tag: &Tag, depth: usize) {
        if *tag != Tag::Connectors {
            self.unexpected(element, "connectors", depth);
        }
    }

    /// `schematic-subparts/subpart/connectors/connector`
    pub(super) fn subpart_connector(&mut self, element: &Element, tag: &Tag, depth: usize) {
        if *tag != Tag::Connector {
            self.unexpected(element, "connector", depth);
            return;
        }
        let Some(subpart) = self.state.subpart.clone() else {
            return;
        };
        let line = element.line;
        let Some(id) = element.attr("id") else {
            self.out.at(
                Code::SubpartConnectorIdMissing,
                line,
                format!("connector in subpart '{}' has no id", subpart),
            );
            return;
        };

        let Some(connector) = self.facts.connector_mut(id) else {
            self.out.at(
                Code::SubpartConnectorUnknown,
                line,
                format!("subpart '{}' connector '{}' is not a connector", subpart, id),
            );
            return;
        };
        if let Some(owner) = &connector.subpart {
            let message = format!(
                "connector '{}' already belongs to subpart '{}', not added to '{}'",
                id, owner, subpart
            );
            self.out.at(Code::SubpartConnectorConflict, line, message);
            return;
        }
        connector.subpart = Some(subpart.clone());
        let anchors: Vec<String> = connector
            .anchors(ViewKind::Schematic)
            .into_iter()
            .map(str::to_string)
            .collect();

        if anchors.is_empty() {
            self.out.at(
                Code::SubpartConnectorNoPins,
                line,
                format!("subpart '{}' connector '{}' has no schematic pins", subpart, id),
            );
        }
        if let Some(record) = self.facts.subpart_mut(&subpart) {
            record.connectors.push(id.to_string());
            for anchor in anchors {
                if !record.anchors.contains(&anchor) {
                    record.anchors.push(anchor);
                }
            }
        }
    }
}
