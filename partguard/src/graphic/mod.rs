//! Graphic (`.svg`) validator and repairer.
//!
//! Walks one view's drawing with the same [`ContextStack`] mechanism as the
//! descriptor walk. Frames mark the significant ancestors of the current
//! element: `defs`-like containers, layer groups and schematic sub-part
//! groups. The innermost layer frame is the "current layer" most rules key on.
//!
//! Unlike the descriptor walk this one mutates the tree. Every repair goes
//! through [`GraphicValidator::repaired`] so it is paired with an Info
//! diagnostic.

mod anchors;
mod layers;
mod renumber;
mod repair;
mod root;

pub use renumber::{renumber_connectors, Renumber};

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::CheckOptions;
use crate::diagnostics::{Code, Diagnostics, Reporter};
use crate::facts::{BoardClass, FactBase, ViewKind};
use crate::walk::{tail_text, ContextStack, OneShot};
use crate::xml::{Document, Element, Node};

/// Anchor ids recognised when no descriptor is loaded.
static ANCHOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^connector\d+(pin|terminal|leg)$").unwrap());

static TERMINAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)connector.+terminal").unwrap());

/// Layer ids accepted in standalone mode.
const STANDALONE_LAYERS: &[&str] = &["breadboard", "icon", "schematic", "silkscreen", "copper0", "copper1"];

/// What the graphic is checked against.
#[derive(Debug, Clone)]
pub struct GraphicContext<'a> {
    pub view: Option<ViewKind>,
    /// `None` for a graphic checked on its own.
    pub facts: Option<&'a FactBase>,
    pub board: Option<BoardClass>,
    /// Expected text of a `referenceFile` element; empty to skip the check.
    pub reference_name: String,
}

impl<'a> GraphicContext<'a> {
    pub fn for_view(
        view: ViewKind,
        facts: &'a FactBase,
        board: Option<BoardClass>,
        reference_name: impl Into<String>,
    ) -> Self {
        Self {
            view: Some(view),
            facts: Some(facts),
            board,
            reference_name: reference_name.into(),
        }
    }

    pub fn standalone(view: Option<ViewKind>, reference_name: impl Into<String>) -> Self {
        Self {
            view,
            facts: None,
            board: None,
            reference_name: reference_name.into(),
        }
    }

    fn is_layer_id(&self, id: &str) -> bool {
        match (self.facts, self.view) {
            (Some(facts), Some(view)) => facts
                .view(view)
                .is_some_and(|record| record.layers.iter().any(|l| l == id)),
            (Some(_), None) => false,
            (None, _) => STANDALONE_LAYERS.contains(&id),
        }
    }

    /// Whether `id` binds a connector in this view.
    fn is_anchor(&self, id: &str) -> bool {
        match (self.facts, self.view) {
            (Some(facts), Some(view)) => facts.is_known_anchor(view, id),
            (Some(_), None) => false,
            (None, _) => ANCHOR_RE.is_match(id),
        }
    }
}

/// Result of one graphic walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphicOutcome {
    /// The descriptor's class, or the one inferred from the layers seen.
    pub board: Option<BoardClass>,
    /// Number of repairs applied to the tree.
    pub repairs: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Frame {
    Defs,
    Layer(String),
    Subpart(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Once {
    DrawingBeforeLayer,
    TspanPresent,
    UnsupportedFont,
    GraphicModified,
    TransformMismatch,
    NoAnchors,
    StyleKey(String),
    Undeclared(String),
}

/// First occurrence of a copper layer group.
#[derive(Debug, Clone)]
pub(crate) struct CopperSeen {
    pub layer: String,
    /// Number of layer frames open when it was entered, itself included.
    pub level: usize,
    pub transform: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct GraphicState {
    pub layers_seen: HashMap<String, u32>,
    pub coppers: Vec<CopperSeen>,
    /// Anchor id moved off a group, waiting for the group's first circle.
    pub pending_group: Option<(String, usize)>,
    /// Inherited `stroke-width` values in copper layers.
    pub stroke: ContextStack<String>,
    pub once: OneShot<Once>,
}

/// Anchors found so far, reconciled against the descriptor at the end.
#[derive(Debug, Default)]
pub(crate) struct AnchorLedger {
    pub found: HashSet<String>,
    /// `(anchor, layer)` to the line it was first seen at.
    pub placed: HashMap<(String, Option<String>), u32>,
    pub subpart_groups: HashMap<String, u32>,
    pub subpart_found: HashMap<String, HashSet<String>>,
    /// Radius problems held until the board class is known.
    pub pending_radius: Vec<(Code, u32, String)>,
}

pub struct GraphicValidator<'a> {
    pub(crate) out: Reporter<'a>,
    pub(crate) ctx: &'a GraphicContext<'a>,
    pub(crate) options: &'a CheckOptions,
    pub(crate) stack: ContextStack<Frame>,
    pub(crate) state: GraphicState,
    pub(crate) ledger: AnchorLedger,
    pub(crate) repairs: usize,
}

/// Validate `doc` against `ctx`, repairing it in place.
pub fn validate_graphic(
    doc: &mut Document,
    path: &Path,
    ctx: &GraphicContext<'_>,
    options: &CheckOptions,
    sink: &mut Diagnostics,
) -> GraphicOutcome {
    let mut validator = GraphicValidator::new(path, ctx, options, sink);
    validator.walk(&mut doc.root, 0);
    let outcome = validator.finish();
    tracing::debug!(
        file = %path.display(),
        view = ?ctx.view,
        repairs = outcome.repairs,
        "graphic walked"
    );
    outcome
}

impl<'a> GraphicValidator<'a> {
    pub fn new(
        path: &'a Path,
        ctx: &'a GraphicContext<'a>,
        options: &'a CheckOptions,
        sink: &'a mut Diagnostics,
    ) -> Self {
        Self {
            out: Reporter::new(path, sink),
            ctx,
            options,
            stack: ContextStack::new(),
            state: GraphicState::default(),
            ledger: AnchorLedger::default(),
            repairs: 0,
        }
    }

    fn walk(&mut self, element: &mut Element, depth: usize) {
        self.visit(element, depth);
        let inside_text = matches!(element.local_name(), "text" | "tspan");
        for index in 0..element.children.len() {
            let tail = if inside_text {
                None
            } else {
                tail_text(&element.children, index).map(|t| t.trim().to_string())
            };
            if let Node::Element(child) = &mut element.children[index] {
                self.walk(child, depth + 1);
                if let Some(text) = tail {
                    self.out.at(
                        Code::TailText,
                        child.line,
                        format!("text {:?} follows <{}>", text, child.name),
                    );
                }
            }
        }
    }

    fn visit(&mut self, element: &mut Element, depth: usize) {
        self.stack.reconcile(depth);
        self.state.stroke.reconcile(depth);

        self.group_anchor(element, depth);
        self.root(element, depth);
        self.reference_file(element);
        self.layer(element, depth);
        self.drawing_before_layer(element);
        self.flatten_tspans(element);
        self.inline_style(element);
        self.fonts(element);
        self.terminal(element);
        self.anchor(element);
        self.inherit_stroke_width(element, depth);
        self.silkscreen_colour(element);
    }

    /// Record a repair: one Info diagnostic plus a debug log line.
    pub(crate) fn repaired(&mut self, code: Code, line: u32, message: String) {
        tracing::debug!(file = %self.out.file().display(), line, %message, "repaired");
        self.out.at(code, line, message);
        self.repairs += 1;
    }

    /// One-shot warning that the drawing changed shape and needs a look.
    pub(crate) fn geometry_changed(&mut self, line: u32) {
        if self.state.once.first(Once::GraphicModified) {
            self.out.at(
                Code::GraphicModified,
                line,
                "the drawing was modified (see the Modified notes), check it in an svg editor",
            );
        }
    }

    /// Id of the innermost open layer group.
    pub(crate) fn current_layer(&self) -> Option<&str> {
        self.stack.iter().rev().find_map(|frame| match frame {
            Frame::Layer(id) => Some(id.as_str()),
            _ => None,
        })
    }

    pub(crate) fn layer_frames(&self) -> usize {
        self.stack.iter().filter(|f| matches!(f, Frame::Layer(_))).count()
    }

    fn finish(mut self) -> GraphicOutcome {
        let board = match self.ctx.facts {
            Some(facts) => {
                self.reconcile_anchors(facts);
                self.ctx.board
            }
            None => self.classify_standalone(),
        };
        GraphicOutcome {
            board,
            repairs: self.repairs,
        }
    }
}
