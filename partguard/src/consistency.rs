//! Checks that need the whole descriptor: view completeness, connector
//! numbering and the part's board category.

use std::collections::BTreeSet;

use crate::diagnostics::{Code, Reporter};
use crate::facts::{BoardClass, FactBase, ViewKind};

/// Outcome of the global pass that later graphic walks depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Consistency {
    pub board: Option<BoardClass>,
}

pub fn check(facts: &FactBase, out: &mut Reporter<'_>) -> Consistency {
    check_views(facts, out);
    check_pin_sequence(facts, out);
    let board = classify_board(facts, out);
    if let Some(board) = board {
        tracing::info!(file = %out.file().display(), %board, "board category");
    }
    Consistency { board }
}

fn check_views(facts: &FactBase, out: &mut Reporter<'_>) {
    if !facts.views_declared {
        out.whole_file(Code::NoViews, "no views found");
        return;
    }
    let declared = facts.views().count();
    if declared == 0 {
        out.whole_file(Code::NoValidViews, "no valid views found");
    } else if declared < ViewKind::ALL.len() {
        let missing: Vec<&str> = ViewKind::ALL
            .iter()
            .filter(|v| facts.view(**v).is_none())
            .map(|v| v.tag())
            .collect();
        out.whole_file(
            Code::ViewsIncomplete,
            format!("missing {} (may be intended)", missing.join(", ")),
        );
    }
}

/// Pin numbers must run 0..N-1; each missing number is reported once.
fn check_pin_sequence(facts: &FactBase, out: &mut Reporter<'_>) {
    if facts.connectors().is_empty() {
        out.whole_file(Code::NoConnectors, "no connectors found");
        return;
    }
    let pins: BTreeSet<u32> = facts.connectors().iter().filter_map(|c| c.pin_number()).collect();
    let Some(&last) = pins.iter().next_back() else {
        return;
    };
    for missing in (0..last).filter(|n| !pins.contains(n)) {
        out.whole_file(
            Code::PinSequenceGap,
            format!("connector{} is missing from the sequence 0..{}", missing, last),
        );
    }
}

fn classify_board(facts: &FactBase, out: &mut Reporter<'_>) -> Option<BoardClass> {
    facts.view(ViewKind::Pcb)?;
    if facts.board_all_hybrid() {
        return Some(BoardClass::NoBoardView);
    }
    let board = facts.copper.classify();
    if board == BoardClass::SmdBottom {
        let line = facts.copper.copper0.unwrap_or_default();
        out.at(
            Code::BottomOnlySmd,
            line,
            "only copper0 is declared, so the part sits on the bottom layer; \
             use copper1 for smd or add copper1 for through-hole",
        );
    }
    Some(board)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use std::path::Path;

    fn facts_with(ids: &[&str]) -> FactBase {
        let mut facts = FactBase::new();
        facts.views_declared = true;
        for (line, view) in ViewKind::ALL.iter().enumerate() {
            facts.define_view(*view, line as u32).unwrap();
        }
        for (line, id) in ids.iter().enumerate() {
            facts.define_connector(id, line as u32).unwrap();
        }
        facts
    }

    fn run(facts: &FactBase) -> (Consistency, Diagnostics) {
        let mut sink = Diagnostics::new();
        let result = check(facts, &mut Reporter::new(Path::new("part.t.fzp"), &mut sink));
        (result, sink)
    }

    #[test]
    fn test_contiguous_pins_have_no_gaps() {
        let (_, sink) = run(&facts_with(&["connector0", "connector1", "connector2"]));
        assert_eq!(sink.count(Code::PinSequenceGap), 0);
        assert!(sink.is_empty(), "{:?}", sink);
    }

    #[test]
    fn test_each_gap_reported_once() {
        let (_, sink) = run(&facts_with(&["connector0", "connector2", "connector5"]));
        let gaps: Vec<&str> = sink
            .warnings()
            .iter()
            .filter(|d| d.code == Code::PinSequenceGap)
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(gaps.len(), 3);
        assert!(gaps[0].starts_with("connector1 "));
        assert!(gaps[2].starts_with("connector4 "));
    }

    #[test]
    fn test_missing_first_pin_is_a_gap() {
        let (_, sink) = run(&facts_with(&["connector1", "connector2"]));
        assert_eq!(sink.count(Code::PinSequenceGap), 1);
    }

    #[test]
    fn test_board_classes() {
        let mut facts = facts_with(&["connector0"]);
        facts.copper.copper1 = Some(12);
        assert_eq!(run(&facts).0.board, Some(BoardClass::SmdTop));

        facts.copper.copper0 = Some(11);
        assert_eq!(run(&facts).0.board, Some(BoardClass::ThroughHole));

        facts.copper.copper1 = None;
        let (result, sink) = run(&facts);
        assert_eq!(result.board, Some(BoardClass::SmdBottom));
        assert!(sink.has(Code::BottomOnlySmd));
    }

    #[test]
    fn test_missing_views() {
        let mut facts = FactBase::new();
        facts.define_connector("connector0", 1).unwrap();
        let (result, sink) = run(&facts);
        assert!(sink.has(Code::NoViews));
        assert_eq!(result.board, None);

        facts.views_declared = true;
        facts.define_view(ViewKind::Breadboard, 2).unwrap();
        let (_, sink) = run(&facts);
        assert!(sink.has(Code::ViewsIncomplete));
    }
}
