use super::{Frame, GraphicValidator, Once, ANCHOR_RE, TERMINAL_RE};
use crate::diagnostics::Code;
use crate::facts::{BoardClass, CopperLayers, FactBase, ViewKind};
use crate::xml::Element;

fn is_round(element: &Element) -> bool {
    matches!(element.local_name(), "circle" | "ellipse")
}

fn has_round_descendant(element: &Element) -> bool {
    element
        .child_elements()
        .any(|child| is_round(child) || has_round_descendant(child))
}

fn is_zero(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.trim().parse::<f64>().is_ok_and(|n| n == 0.0))
}

impl GraphicValidator<'_> {
    /// Move a connector id off a group onto the group's first circle.
    pub(super) fn group_anchor(&mut self, element: &mut Element, depth: usize) {
        if let Some((anchor, group_depth)) = self.state.pending_group.take() {
            if depth > group_depth {
                if is_round(element) {
                    element.set_attr("id", anchor);
                } else {
                    self.state.pending_group = Some((anchor, group_depth));
                }
            }
        }

        if element.local_name() != "g" {
            return;
        }
        let Some(id) = element.id().map(str::to_string) else {
            return;
        };
        if TERMINAL_RE.is_match(&id) || !self.ctx.is_anchor(&id) {
            return;
        }
        if !self.options.fix_connector_groups || !has_round_descendant(element) {
            self.out.at(
                Code::GroupAnchor,
                element.line,
                format!("connector {} is on a group, it must be on a circle, rect or path", id),
            );
            return;
        }
        element.set_attr("id", format!("{}---", id));
        self.repaired(
            Code::GroupAnchorMoved,
            element.line,
            format!("connector {} moved from its group to the group's first circle", id),
        );
        self.state.pending_group = Some((id, depth));
    }

    pub(super) fn terminal(&mut self, element: &mut Element) {
        let Some(id) = element.id().map(str::to_string) else {
            return;
        };
        if !TERMINAL_RE.is_match(&id) {
            return;
        }
        let line = element.line;
        if matches!(element.local_name(), "path" | "g") {
            self.out.at(
                Code::TerminalOnPathOrGroup,
                line,
                format!("terminal {} is a <{}>, Fritzing can't position it", id, element.name),
            );
        }
        for attr in ["height", "width"] {
            if !is_zero(element.attr(attr)) {
                continue;
            }
            if self.options.fix_terminals {
                element.set_attr(attr, "10");
                self.repaired(
                    Code::TerminalResized,
                    line,
                    format!("terminal {} had a zero {}, set to 10; check its alignment", id, attr),
                );
                self.geometry_changed(line);
            } else {
                self.out.at(
                    Code::TerminalZeroSize,
                    line,
                    format!("terminal {} has a zero {} and can't be selected in an editor", id, attr),
                );
            }
        }
    }

    pub(super) fn anchor(&mut self, element: &Element) {
        let Some(view) = self.ctx.view else {
            return;
        };
        if !view.has_connectors() {
            return;
        }
        let Some(id) = element.id() else {
            return;
        };

        if !self.ctx.is_anchor(id) {
            if self.ctx.facts.is_some()
                && ANCHOR_RE.is_match(id)
                && self.state.once.first(Once::Undeclared(id.to_string()))
            {
                self.out.at(
                    Code::AnchorUndeclared,
                    element.line,
                    format!("connector {} is in the svg but not declared for {}", id, view),
                );
            }
            return;
        }

        let layer = self.current_layer().map(str::to_string);
        let key = (id.to_string(), layer.clone());
        if let Some(first) = self.ledger.placed.get(&key) {
            self.out.at(
                Code::DuplicateAnchor,
                element.line,
                format!("connector {} already appears at line {}", id, first),
            );
        } else {
            self.ledger.placed.insert(key, element.line);
        }
        self.ledger.found.insert(id.to_string());

        if let Some(facts) = self.ctx.facts {
            if view == ViewKind::Schematic && facts.has_subparts() {
                self.anchor_subpart(facts, element, id);
            }
        }
        if view == ViewKind::Pcb
            && matches!(layer.as_deref(), Some("copper0" | "copper1"))
            && element.local_name() != "g"
        {
            self.check_radius(element, id);
        }
    }

    fn anchor_subpart(&mut self, facts: &FactBase, element: &Element, id: &str) {
        let owner = facts.subpart_of_anchor(id).map(|s| s.id.as_str());
        let group = self.stack.iter().rev().find_map(|frame| match frame {
            Frame::Subpart(id) => Some(id.clone()),
            _ => None,
        });
        match (owner, group.as_deref()) {
            (Some(owner), None) => self.out.at(
                Code::AnchorOutsideSubpart,
                element.line,
                format!("connector {} isn't inside its subpart group '{}'", id, owner),
            ),
            (None, Some(group)) => self.out.at(
                Code::AnchorWithoutSubpart,
                element.line,
                format!("connector {} belongs to no subpart but is inside group '{}'", id, group),
            ),
            (Some(owner), Some(group)) if owner != group => self.out.at(
                Code::AnchorInWrongSubpart,
                element.line,
                format!("connector {} is inside subpart '{}', it belongs to '{}'", id, group, owner),
            ),
            (Some(owner), Some(_)) => {
                self.ledger
                    .subpart_found
                    .entry(owner.to_string())
                    .or_default()
                    .insert(id.to_string());
            }
            (None, None) => {}
        }
    }

    /// Through-hole pads need a circle with a radius for the drill file.
    fn check_radius(&mut self, element: &Element, id: &str) {
        let (code, message) = if element.local_name() == "ellipse" || element.attr("rx").is_some() {
            (
                Code::EllipseAnchor,
                format!("connector {} is an ellipse, not a circle; gerber generation will break", id),
            )
        } else if element.attr("r").is_none() || is_zero(element.attr("r")) {
            (
                Code::AnchorWithoutRadius,
                format!("connector {} has no radius, no hole will be drilled", id),
            )
        } else {
            return;
        };

        match self.ctx.facts {
            Some(_) if self.ctx.board == Some(BoardClass::ThroughHole) => self.out.at(code, element.line, message),
            Some(_) => {}
            None => self.ledger.pending_radius.push((code, element.line, message)),
        }
    }

    /// End-of-document cross reference against the descriptor.
    pub(super) fn reconcile_anchors(&mut self, facts: &FactBase) {
        let Some(view) = self.ctx.view.filter(|v| v.has_connectors()) else {
            return;
        };
        let declared = facts.declared_anchors(view);
        if declared.is_empty() {
            return;
        }
        let subparts = view == ViewKind::Schematic && facts.has_subparts();

        if self.ledger.found.is_empty() {
            if self.state.once.first(Once::NoAnchors) {
                self.out.whole_file(
                    Code::NoAnchorsInGraphic,
                    format!("no connectors found for {}, {} declared", view, declared.len()),
                );
            }
        } else {
            for anchor in declared {
                if self.ledger.found.contains(anchor) {
                    continue;
                }
                if subparts && facts.subpart_of_anchor(anchor).is_some() {
                    continue;
                }
                self.out.whole_file(
                    Code::AnchorMissingInGraphic,
                    format!("connector {} is declared for {} but missing from the svg", anchor, view),
                );
            }
        }

        if !subparts {
            return;
        }
        for subpart in facts.subparts() {
            if !self.ledger.subpart_groups.contains_key(&subpart.id) {
                self.out.whole_file(
                    Code::SubpartGroupMissing,
                    format!("subpart {} has no group in the schematic svg", subpart.id),
                );
                continue;
            }
            let found = self.ledger.subpart_found.get(&subpart.id);
            for anchor in &subpart.anchors {
                if !found.is_some_and(|f| f.contains(anchor)) {
                    self.out.whole_file(
                        Code::SubpartAnchorMissing,
                        format!("connector {} is missing from subpart group {}", anchor, subpart.id),
                    );
                }
            }
        }
    }

    /// Board class from the copper layers a standalone graphic declared.
    pub(super) fn classify_standalone(&mut self) -> Option<BoardClass> {
        let mut copper = CopperLayers::default();
        for seen in &self.state.coppers {
            let line = self.state.layers_seen.get(&seen.layer).copied().unwrap_or(0);
            match seen.layer.as_str() {
                "copper0" => copper.copper0 = Some(line),
                _ => copper.copper1 = Some(line),
            }
        }
        let class = copper.classify();

        match class {
            BoardClass::ThroughHole => {
                for (code, line, message) in std::mem::take(&mut self.ledger.pending_radius) {
                    self.out.at(code, line, message);
                }
            }
            BoardClass::SmdBottom => self.out.at(
                Code::BottomOnlySmdGraphic,
                copper.copper0.unwrap_or(0),
                "copper0 without copper1: an smd part must be on copper1",
            ),
            _ => {}
        }

        if self.ctx.view == Some(ViewKind::Pcb) && class == BoardClass::NoCopper {
            self.out.whole_file(Code::BoardWithoutLayers, "pcb svg has no copper layers");
        }
        if self.ctx.view == Some(ViewKind::Pcb) || !self.state.coppers.is_empty() {
            tracing::info!(file = %self.out.file().display(), board = %class, "graphic classified");
            Some(class)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::graphic::test_support::{run_standalone, run_with_facts};
    use crate::xml::{parse_str, Node};

    fn round_children(element: &Element) -> usize {
        element
            .children
            .iter()
            .filter(|n| matches!(n, Node::Element(e) if is_round(e)))
            .count()
    }

    const OPEN: &str = r#"<svg width="1in" height="1in" viewBox="0 0 1000 1000">"#;

    fn pcb_facts(anchors: &[&str]) -> FactBase {
        let mut facts = FactBase::new();
        let view = facts.define_view(ViewKind::Pcb, 1).unwrap();
        view.layers = vec!["copper0".to_string(), "copper1".to_string()];
        for anchor in anchors {
            facts.append_anchor(ViewKind::Pcb, anchor);
        }
        facts
    }

    fn pcb_svg(body: &str) -> String {
        format!(r#"{}<g id="copper1"><g id="copper0">{}</g></g></svg>"#, OPEN, body)
    }

    #[test]
    fn test_missing_anchor_reported_once() {
        let facts = pcb_facts(&["connector0pin", "connector1pin", "connector2pin"]);
        let svg = pcb_svg(
            r#"<circle id="connector0pin" r="5"/><circle id="connector2pin" r="5"/>"#,
        );
        let sink = run_with_facts(&svg, ViewKind::Pcb, &facts, Some(BoardClass::ThroughHole));
        assert_eq!(sink.count(Code::AnchorMissingInGraphic), 1);
        assert!(sink.errors()[0].message.contains("connector1pin"));
    }

    #[test]
    fn test_undeclared_anchor_reported_once() {
        let facts = pcb_facts(&["connector0pin"]);
        let svg = format!(
            r#"{}<g id="copper1"><circle id="connector0pin" r="5"/><circle id="connector7pin" r="5"/></g><g id="copper0"><circle id="connector7pin" r="5"/></g></svg>"#,
            OPEN
        );
        let sink = run_with_facts(&svg, ViewKind::Pcb, &facts, Some(BoardClass::ThroughHole));
        assert_eq!(sink.count(Code::AnchorUndeclared), 1);
        assert!(!sink.has(Code::AnchorMissingInGraphic));
    }

    #[test]
    fn test_no_anchors_at_all() {
        let facts = pcb_facts(&["connector0pin", "connector1pin"]);
        let sink = run_with_facts(&pcb_svg(""), ViewKind::Pcb, &facts, Some(BoardClass::ThroughHole));
        assert_eq!(sink.count(Code::NoAnchorsInGraphic), 1);
        assert!(!sink.has(Code::AnchorMissingInGraphic));
    }

    #[test]
    fn test_radius_checked_only_for_through_hole() {
        let facts = pcb_facts(&["connector0pin", "connector1pin"]);
        let svg = pcb_svg(r#"<ellipse id="connector0pin" rx="3" ry="4"/><circle id="connector1pin" r="0"/>"#);

        let sink = run_with_facts(&svg, ViewKind::Pcb, &facts, Some(BoardClass::ThroughHole));
        assert_eq!(sink.count(Code::EllipseAnchor), 1);
        assert_eq!(sink.count(Code::AnchorWithoutRadius), 1);

        let sink = run_with_facts(&svg, ViewKind::Pcb, &facts, Some(BoardClass::SmdTop));
        assert!(!sink.has(Code::EllipseAnchor));
        assert!(!sink.has(Code::AnchorWithoutRadius));
    }

    #[test]
    fn test_standalone_radius_promoted_when_through_hole() {
        let svg = pcb_svg(r#"<circle id="connector0pin"/>"#);
        let (sink, _) = run_standalone(&svg, Some(ViewKind::Pcb));
        assert_eq!(sink.count(Code::AnchorWithoutRadius), 1);

        let smd = format!(r#"{}<g id="copper1"><circle id="connector0pin"/></g></svg>"#, OPEN);
        let (sink, _) = run_standalone(&smd, Some(ViewKind::Pcb));
        assert!(!sink.has(Code::AnchorWithoutRadius));
    }

    #[test]
    fn test_standalone_bottom_only_and_no_layers() {
        let bottom = format!(r#"{}<g id="copper0"/></svg>"#, OPEN);
        let (sink, _) = run_standalone(&bottom, Some(ViewKind::Pcb));
        assert!(sink.has(Code::BottomOnlySmdGraphic));

        let bare = format!(r#"{}<g id="other"/></svg>"#, OPEN);
        let (sink, _) = run_standalone(&bare, Some(ViewKind::Pcb));
        assert!(sink.has(Code::BoardWithoutLayers));
    }

    #[test]
    fn test_duplicate_anchor_in_same_layer() {
        let facts = pcb_facts(&["connector0pin"]);
        let svg = pcb_svg(r#"<circle id="connector0pin" r="5"/><circle id="connector0pin" r="5"/>"#);
        let sink = run_with_facts(&svg, ViewKind::Pcb, &facts, Some(BoardClass::ThroughHole));
        assert_eq!(sink.count(Code::DuplicateAnchor), 1);
    }

    #[test]
    fn test_group_anchor_moved_to_circle() {
        let svg = format!(
            r#"{}<g id="breadboard"><g id="connector0pin"><rect width="2" height="2"/><circle r="1"/><circle r="2"/></g></g></svg>"#,
            OPEN
        );
        let mut doc = parse_str(&svg).unwrap();
        let ctx = crate::graphic::GraphicContext::standalone(Some(ViewKind::Breadboard), "");
        let mut sink = Diagnostics::new();
        let options = crate::core::CheckOptions::default();
        crate::graphic::validate_graphic(&mut doc, std::path::Path::new("t.svg"), &ctx, &options, &mut sink);

        assert_eq!(sink.count(Code::GroupAnchorMoved), 1);
        let layer = doc.root.child_elements().next().unwrap();
        let group = layer.child_elements().next().unwrap();
        assert_eq!(group.id(), Some("connector0pin---"));
        assert_eq!(round_children(group), 2);
        let ids: Vec<_> = group.child_elements().map(|e| e.id()).collect();
        assert_eq!(ids, vec![None, Some("connector0pin"), None]);
    }

    #[test]
    fn test_group_anchor_without_circle() {
        let svg = format!(
            r#"{}<g id="breadboard"><g id="connector0pin"><rect width="2" height="2"/></g></g></svg>"#,
            OPEN
        );
        let (sink, _) = run_standalone(&svg, Some(ViewKind::Breadboard));
        assert!(sink.has(Code::GroupAnchor));
        assert!(!sink.has(Code::GroupAnchorMoved));
    }

    #[test]
    fn test_zero_size_terminal_resized() {
        let svg = format!(
            r#"{}<g id="schematic"><rect id="connector0terminal" width="0" height="5"/></g></svg>"#,
            OPEN
        );
        let (sink, text) = run_standalone(&svg, Some(ViewKind::Schematic));
        assert_eq!(sink.count(Code::TerminalResized), 1);
        assert_eq!(sink.count(Code::GraphicModified), 1);
        assert!(text.contains(r#"width="10""#));
    }

    #[test]
    fn test_subpart_anchor_placement() {
        let mut facts = FactBase::new();
        facts.define_view(ViewKind::Schematic, 1).unwrap().layers = vec!["schematic".to_string()];
        for anchor in ["connector0pin", "connector1pin", "connector2pin"] {
            facts.append_anchor(ViewKind::Schematic, anchor);
        }
        let a = facts.define_subpart("A", 2).unwrap();
        a.anchors = vec!["connector0pin".to_string()];
        let b = facts.define_subpart("B", 3).unwrap();
        b.anchors = vec!["connector1pin".to_string()];

        let svg = format!(
            r#"{}<g id="schematic"><g id="A"><line id="connector1pin"/></g><g id="B"/><line id="connector0pin"/><line id="connector2pin"/></g></svg>"#,
            OPEN
        );
        let sink = run_with_facts(&svg, ViewKind::Schematic, &facts, None);
        assert_eq!(sink.count(Code::AnchorInWrongSubpart), 1);
        assert_eq!(sink.count(Code::AnchorOutsideSubpart), 1);
        assert_eq!(sink.count(Code::SubpartAnchorMissing), 2);
        assert!(!sink.has(Code::SubpartGroupMissing));
        assert!(!sink.has(Code::AnchorMissingInGraphic));
    }
}
