use super::{DescriptorValidator, Once, Tag};
use crate::diagnostics::Code;
use crate::facts::Grouping;
use crate::xml::Element;

impl DescriptorValidator<'_> {
    /// `buses/bus`
    pub(super) fn bus(&mut self, element: &Element, tag: &Tag, depth: usize) {
        self.state.bus = None;
        if *tag != Tag::Bus {
            self.unexpected(element, "bus", depth);
            return;
        }
        if self.grouping_taken(element, Grouping::Buses, depth) {
            return;
        }

        let Some(id) = element.attr("id") else {
            self.out.at(Code::EmptyBus, element.line, "bus has no id, its members are ignored");
            self.quarantine(depth);
            return;
        };
        match self.facts.define_bus(id, element.line) {
            Ok(_) => {
                self.facts.grouping = Some(Grouping::Buses);
                self.state.bus = Some(id.to_string());
            }
            Err(first) => {
                self.out.at(
                    Code::BusRedefined,
                    element.line,
                    format!("bus '{}' already defined at line {}", id, first.line),
                );
                self.quarantine(depth);
            }
        }
    }

    /// `buses/bus/nodeMember`
    pub(super) fn bus_member(&mut self, element: &Element, tag: &Tag, depth: usize) {
        if *tag != Tag::NodeMember {
            self.unexpected(element, "nodeMember", depth);
            return;
        }
        let Some(bus) = self.state.bus.clone() else {
            return;
        };
        let line = element.line;
        let Some(member) = element.attr("connectorId") else {
            self.out.at(
                Code::BusMemberUnknown,
                line,
                format!("nodeMember of bus '{}' has no connectorId", bus),
            );
            return;
        };

        let Some(connector) = self.facts.connector_mut(member) else {
            self.out.at(
                Code::BusMemberUnknown,
                line,
                format!("bus '{}' member '{}' is not a connector", bus, member),
            );
            return;
        };
        if let Some(existing) = &connector.bus {
            let message = format!(
                "connector '{}' is already a member of bus '{}', not added to '{}'",
                member, existing, bus
            );
            self.out.at(Code::BusMemberConflict, line, message);
            return;
        }
        connector.bus = Some(bus.clone());
        if let Some(record) = self.facts.bus_mut(&bus) {
            record.members += 1;
        }
    }

    /// Buses and sub-parts exclude each other; whichever was defined first
    /// wins. Returns true (after reporting once) when `wanted` lost.
    pub(super) fn grouping_taken(&mut self, element: &Element, wanted: Grouping, depth: usize) -> bool {
        match self.facts.grouping {
            Some(existing) if existing != wanted => {
                if self.state.once.first(Once::BusSubpartConflict) {
                    let (winner, loser) = match existing {
                        Grouping::Subparts => ("schematic sub-parts", "bus"),
                        Grouping::Buses => ("buses", "sub-part"),
                    };
                    self.out.at(
                        Code::BusSubpartConflict,
                        element.line,
                        format!(
                            "part already defines {}; this {} and the rest of its section are ignored",
                            winner, loser
                        ),
                    );
                }
                self.quarantine(depth);
                true
            }
            _ => false,
        }
    }
}
