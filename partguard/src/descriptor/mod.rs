//! Descriptor (`.fzp`) validator.
//!
//! One recursive walk over the descriptor tree. Each grammar-significant
//! element is pushed on a [`ContextStack`]; the element's [`Position`] in the
//! grammar is derived from the branch at stack index 1 (`views`,
//! `connectors`, `buses` or `schematic-subparts`) and the stack length, and
//! selects the handler. Handlers check the element, record what they learn
//! in the [`FactBase`] and never touch the tree.
//!
//! A subtree that cannot be interpreted (unknown view, misplaced element,
//! foreign connector data) is quarantined: its descendants are skipped so one
//! root cause does not fan out into a page of follow-on errors.

mod buses;
mod connectors;
mod subparts;
mod views;

use std::collections::HashMap;
use std::path::Path;

use crate::core::CheckOptions;
use crate::diagnostics::{Code, Diagnostics, Reporter};
use crate::facts::{FactBase, ViewKind};
use crate::layout::descriptor_stem;
use crate::walk::{tail_text, ContextStack, OneShot};
use crate::xml::{Document, Element, Node};

/// Descriptor elements the grammar knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Tag {
    Module,
    Views,
    View(ViewKind),
    Layers,
    Layer,
    Connectors,
    Connector,
    Description,
    P,
    Buses,
    Bus,
    NodeMember,
    SchematicSubparts,
    Subpart,
    /// Part metadata such as `title` or `property`.
    Metadata(String),
    /// Unrecognised element inside the views section, kept so the view
    /// handler can name it.
    Unknown(String),
}

impl Tag {
    fn parse(name: &str) -> Option<Tag> {
        let tag = match name {
            "module" => Tag::Module,
            "views" => Tag::Views,
            "layers" => Tag::Layers,
            "layer" => Tag::Layer,
            "connectors" => Tag::Connectors,
            "connector" => Tag::Connector,
            "description" => Tag::Description,
            "p" => Tag::P,
            "buses" => Tag::Buses,
            "bus" => Tag::Bus,
            "nodeMember" => Tag::NodeMember,
            "schematic-subparts" => Tag::SchematicSubparts,
            "subpart" => Tag::Subpart,
            "version" | "author" | "title" | "label" | "date" | "tags" | "tag" | "properties"
            | "property" | "spice" | "taxonomy" | "url" | "line" | "model" => {
                Tag::Metadata(name.to_string())
            }
            other => Tag::View(ViewKind::from_tag(other)?),
        };
        Some(tag)
    }

    fn name(&self) -> &str {
        match self {
            Tag::Module => "module",
            Tag::Views => "views",
            Tag::View(kind) => kind.tag(),
            Tag::Layers => "layers",
            Tag::Layer => "layer",
            Tag::Connectors => "connectors",
            Tag::Connector => "connector",
            Tag::Description => "description",
            Tag::P => "p",
            Tag::Buses => "buses",
            Tag::Bus => "bus",
            Tag::NodeMember => "nodeMember",
            Tag::SchematicSubparts => "schematic-subparts",
            Tag::Subpart => "subpart",
            Tag::Metadata(name) | Tag::Unknown(name) => name,
        }
    }
}

/// Metadata elements that may appear once under the root.
const SINGLETONS: &[&str] = &[
    "version",
    "author",
    "title",
    "label",
    "date",
    "tags",
    "properties",
    "taxonomy",
    "url",
    "views",
    "connectors",
    "buses",
    "schematic-subparts",
];

/// Connector children that carry electrical data Fritzing ignores.
const SPICE_DATA: &[&str] = &["erc", "voltage", "current"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Branch {
    Views,
    Connectors,
    Buses,
    Subparts,
    Other,
}

/// A slot of the fixed descriptor grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Position {
    Root,
    Section,
    ViewName,
    ViewLayers,
    ViewLayer,
    Connector,
    ConnectorChild,
    ConnectorView,
    ConnectorPin,
    Bus,
    BusMember,
    Subpart,
    SubpartConnectors,
    SubpartConnector,
    Metadata,
    TooDeep(usize),
}

impl Position {
    fn of(branch: Branch, len: usize) -> Position {
        match (branch, len) {
            (_, 1) => Position::Root,
            (_, 2) => Position::Section,
            (Branch::Views, 3) => Position::ViewName,
            (Branch::Views, 4) => Position::ViewLayers,
            (Branch::Views, 5) => Position::ViewLayer,
            (Branch::Views, _) => Position::TooDeep(5),
            (Branch::Connectors, 3) => Position::Connector,
            (Branch::Connectors, 4) => Position::ConnectorChild,
            (Branch::Connectors, 5) => Position::ConnectorView,
            (Branch::Connectors, 6) => Position::ConnectorPin,
            (Branch::Connectors, _) => Position::TooDeep(6),
            (Branch::Buses, 3) => Position::Bus,
            (Branch::Buses, 4) => Position::BusMember,
            (Branch::Buses, _) => Position::TooDeep(4),
            (Branch::Subparts, 3) => Position::Subpart,
            (Branch::Subparts, 4) => Position::SubpartConnectors,
            (Branch::Subparts, 5) => Position::SubpartConnector,
            (Branch::Subparts, _) => Position::TooDeep(5),
            (Branch::Other, _) => Position::Metadata,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Once {
    TypeNotMale,
    BusSubpartConflict,
}

/// Connector currently open in the connectors branch.
#[derive(Debug, Clone)]
pub(crate) struct OpenConnector {
    pub id: Option<String>,
    /// False when the id was missing or a duplicate, so nothing is recorded.
    pub recorded: bool,
    pub described: bool,
}

/// Values bound by earlier siblings and consumed by the following handlers.
#[derive(Debug, Default)]
pub(crate) struct DescriptorState {
    pub view: Option<ViewKind>,
    pub connector: Option<OpenConnector>,
    pub pin_view: Option<ViewKind>,
    pub bus: Option<String>,
    pub subpart: Option<String>,
    pub quarantine: Option<usize>,
    pub singletons: HashMap<String, u32>,
    pub once: OneShot<Once>,
}

pub struct DescriptorValidator<'a> {
    pub(crate) out: Reporter<'a>,
    pub(crate) facts: FactBase,
    pub(crate) options: &'a CheckOptions,
    pub(crate) stack: ContextStack<Tag>,
    pub(crate) state: DescriptorState,
    /// File name with `part.`, `.fzp` and `.bak` removed.
    pub(crate) file_stem: String,
    /// `breadboard.fzp` and `breadboard2.fzp` describe generic female boards.
    pub(crate) generic_breadboard: bool,
}

/// Walk `doc` and return the facts it declares.
pub fn validate_descriptor(
    doc: &Document,
    path: &Path,
    options: &CheckOptions,
    sink: &mut Diagnostics,
) -> FactBase {
    let mut validator = DescriptorValidator::new(path, options, sink);
    validator.walk(&doc.root, 0);
    tracing::debug!(
        file = %path.display(),
        connectors = validator.facts.connectors().len(),
        "descriptor walked"
    );
    validator.facts
}

impl<'a> DescriptorValidator<'a> {
    pub fn new(path: &'a Path, options: &'a CheckOptions, sink: &'a mut Diagnostics) -> Self {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let generic_breadboard = matches!(file_name.as_str(), "breadboard.fzp" | "breadboard2.fzp");
        Self {
            out: Reporter::new(path, sink),
            facts: FactBase::new(),
            options,
            stack: ContextStack::new(),
            state: DescriptorState::default(),
            file_stem: descriptor_stem(&file_name),
            generic_breadboard,
        }
    }

    fn walk(&mut self, element: &Element, depth: usize) {
        self.visit(element, depth);
        for (index, child) in element.children.iter().enumerate() {
            if let Node::Element(child) = child {
                self.walk(child, depth + 1);
                if let Some(text) = tail_text(&element.children, index) {
                    self.out.at(
                        Code::TailText,
                        child.line,
                        format!("text {:?} follows <{}>", text.trim(), child.name),
                    );
                }
            }
        }
    }

    fn visit(&mut self, element: &Element, depth: usize) {
        self.stack.reconcile(depth);
        if let Some(limit) = self.state.quarantine {
            if depth > limit {
                return;
            }
            self.state.quarantine = None;
        }

        if depth == 0 {
            self.stack.push(Tag::Module, depth);
            self.module_root(element);
            return;
        }
        self.repeated_module_attributes(element);

        let Some(tag) = self.classify(element, depth) else {
            return;
        };
        self.stack.push(tag.clone(), depth);

        let position = Position::of(self.branch(), self.stack.len());
        tracing::trace!(tag = tag.name(), ?position, line = element.line, "descriptor dispatch");
        match position {
            Position::Root | Position::Metadata => {}
            Position::Section => self.section(element, &tag),
            Position::ViewName => self.view_name(element, &tag, depth),
            Position::ViewLayers => self.view_layers(element, &tag, depth),
            Position::ViewLayer => self.view_layer(element, &tag, depth),
            Position::Connector => self.connector(element, &tag, depth),
            Position::ConnectorChild => self.connector_child(element, &tag, depth),
            Position::ConnectorView => self.connector_view(element, &tag, depth),
            Position::ConnectorPin => self.connector_pin(element, &tag, depth),
            Position::Bus => self.bus(element, &tag, depth),
            Position::BusMember => self.bus_member(element, &tag, depth),
            Position::Subpart => self.subpart(element, &tag, depth),
            Position::SubpartConnectors => self.subpart_connectors(element, &tag, depth),
            Position::SubpartConnector => self.subpart_connector(element, &tag, depth),
            Position::TooDeep(limit) => {
                self.out.at(
                    Code::GrammarTooDeep,
                    element.line,
                    format!(
                        "<{}> is nested {} levels deep, the {} section allows {}",
                        element.name,
                        self.stack.len(),
                        self.stack.get(1).map(Tag::name).unwrap_or("?"),
                        limit
                    ),
                );
                self.quarantine(depth);
            }
        }
    }

    /// Map an element to its grammar tag, or `None` when it is not
    /// significant here.
    fn classify(&mut self, element: &Element, depth: usize) -> Option<Tag> {
        let name = element.local_name();
        let tag = Tag::parse(name);
        match (self.branch(), self.stack.len()) {
            // Anything directly under `connector` that isn't grammar is
            // foreign (usually spice) data.
            (Branch::Connectors, len) if len >= 3 => match tag {
                Some(
                    tag @ (Tag::Connector | Tag::Description | Tag::Views | Tag::View(_) | Tag::P),
                ) => Some(tag),
                _ => {
                    if !SPICE_DATA.contains(&name) {
                        self.out.at(
                            Code::ForeignConnectorData,
                            element.line,
                            format!("<{}> inside a connector, assumed to be spice data", name),
                        );
                    }
                    self.quarantine(depth);
                    None
                }
            },
            (Branch::Views, len) if len >= 2 => Some(tag.unwrap_or_else(|| Tag::Unknown(name.to_string()))),
            _ => tag,
        }
    }

    pub(crate) fn branch(&self) -> Branch {
        match self.stack.get(1) {
            Some(Tag::Views) => Branch::Views,
            Some(Tag::Connectors) => Branch::Connectors,
            Some(Tag::Buses) => Branch::Buses,
            Some(Tag::SchematicSubparts) => Branch::Subparts,
            _ => Branch::Other,
        }
    }

    /// Skip every descendant of the element at `depth`.
    pub(crate) fn quarantine(&mut self, depth: usize) {
        self.state.quarantine = Some(depth);
    }

    pub(crate) fn unexpected(&mut self, element: &Element, expected: &str, depth: usize) {
        self.out.at(
            Code::UnexpectedTag,
            element.line,
            format!("expected <{}>, found <{}>", expected, element.name),
        );
        self.quarantine(depth);
    }

    fn module_root(&mut self, element: &Element) {
        if element.local_name() != "module" {
            self.out.at(
                Code::UnexpectedTag,
                element.line,
                format!("root element is <{}>, expected <module>", element.name),
            );
        }

        match element.attr("moduleId") {
            None => self.out.at(Code::ModuleIdMissing, element.line, "no moduleId on the root element"),
            Some(id) => {
                if id != self.file_stem {
                    self.out.at(
                        Code::ModuleIdMismatch,
                        element.line,
                        format!("moduleId '{}' doesn't match file name '{}'", id, self.file_stem),
                    );
                }
                self.facts.module_id = Some(id.to_string());
            }
        }

        match element.attr("referenceFile") {
            None => self.out.at(Code::ReferenceFileMissing, element.line, "no referenceFile on the root element"),
            Some(reference) => {
                let expected = format!("{}.fzp", self.file_stem);
                if reference != expected {
                    self.out.at(
                        Code::ReferenceFileMismatch,
                        element.line,
                        format!("referenceFile '{}' doesn't match '{}'", reference, expected),
                    );
                }
                self.facts.reference_file = Some(reference.to_string());
            }
        }

        if element.attr("fritzingVersion").is_none() {
            self.out.at(Code::FritzingVersionMissing, element.line, "no fritzingVersion on the root element");
        }
    }

    fn repeated_module_attributes(&mut self, element: &Element) {
        if element.attr("moduleId").is_some() {
            self.out.at(Code::ModuleIdRepeated, element.line, "moduleId already set on the root element");
        }
        if element.attr("referenceFile").is_some() {
            self.out.at(Code::ReferenceFileRepeated, element.line, "referenceFile already set on the root element");
        }
        if element.attr("fritzingVersion").is_some() {
            self.out.at(Code::FritzingVersionRepeated, element.line, "fritzingVersion already set on the root element");
        }
    }

    /// Direct children of the root.
    fn section(&mut self, element: &Element, tag: &Tag) {
        let name = tag.name();
        if SINGLETONS.contains(&name) {
            if let Some(first) = self.state.singletons.get(name) {
                self.out.at(
                    Code::DuplicateMetadata,
                    element.line,
                    format!("<{}> already appeared at line {}", name, first),
                );
            } else {
                self.state.singletons.insert(name.to_string(), element.line);
            }
        }
        if *tag == Tag::Views {
            self.facts.views_declared = true;
        }
    }
}
