//! Typed record of everything learned about one part.
//!
//! Built while walking the descriptor, then only read by the consistency
//! pass and the graphic walks. Each entity is inserted through a `define_*`
//! method that refuses a second definition, handing back where the first
//! one came from so the caller can report the duplicate.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::Serialize;

/// The four rendering views a part can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Icon,
    Breadboard,
    Schematic,
    Pcb,
}

impl ViewKind {
    pub const ALL: [ViewKind; 4] = [
        ViewKind::Icon,
        ViewKind::Breadboard,
        ViewKind::Schematic,
        ViewKind::Pcb,
    ];

    /// Map a descriptor element name such as `pcbView`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "iconView" => Some(ViewKind::Icon),
            "breadboardView" => Some(ViewKind::Breadboard),
            "schematicView" => Some(ViewKind::Schematic),
            "pcbView" => Some(ViewKind::Pcb),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            ViewKind::Icon => "iconView",
            ViewKind::Breadboard => "breadboardView",
            ViewKind::Schematic => "schematicView",
            ViewKind::Pcb => "pcbView",
        }
    }

    /// Directory name used by the nested file layout.
    pub fn dir_name(self) -> &'static str {
        match self {
            ViewKind::Icon => "icon",
            ViewKind::Breadboard => "breadboard",
            ViewKind::Schematic => "schematic",
            ViewKind::Pcb => "pcb",
        }
    }

    /// Whether connectors may bind anchors in this view.
    pub fn has_connectors(self) -> bool {
        !matches!(self, ViewKind::Icon)
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Board layer ids a pcb view may declare.
pub const BOARD_LAYERS: &[&str] = &[
    "board",
    "ratsnest",
    "silkscreen",
    "silkscreenText",
    "silkscreen0",
    "silkscreen0Text",
    "groundplane",
    "groundplane0",
    "groundplane1",
    "copper0",
    "copper0trace",
    "copper1",
    "copper1trace",
    "partimage",
    "unrouted",
    "keepout",
    "pcbNote",
];

#[derive(Debug, Clone, Default)]
pub struct ViewRecord {
    pub image: Option<String>,
    pub layers: Vec<String>,
    pub line: u32,
}

/// One `p` element: a connector's binding in one layer of one view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PinRecord {
    pub layer: Option<String>,
    pub anchor: Option<String>,
    pub terminal: Option<String>,
    pub leg: Option<String>,
    pub hybrid: bool,
    pub line: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectorRecord {
    pub id: String,
    pub name: Option<String>,
    pub kind: Option<String>,
    pub line: u32,
    pub views: BTreeMap<ViewKind, Vec<PinRecord>>,
    pub bus: Option<String>,
    pub subpart: Option<String>,
}

impl ConnectorRecord {
    pub fn pins(&self, view: ViewKind) -> &[PinRecord] {
        self.views.get(&view).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Anchor and terminal ids bound in `view`, skipping hybrid pins.
    pub fn anchors(&self, view: ViewKind) -> Vec<&str> {
        let mut out = Vec::new();
        for pin in self.pins(view).iter().filter(|p| !p.hybrid) {
            for id in [&pin.anchor, &pin.terminal, &pin.leg].into_iter().flatten() {
                if !out.contains(&id.as_str()) {
                    out.push(id.as_str());
                }
            }
        }
        out
    }

    pub fn pin_number(&self) -> Option<u32> {
        pin_number(&self.id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BusRecord {
    pub id: String,
    pub members: usize,
    pub line: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SubpartRecord {
    pub id: String,
    pub label: Option<String>,
    pub connectors: Vec<String>,
    /// Schematic anchors the sub-part's group must contain.
    pub anchors: Vec<String>,
    pub line: u32,
}

/// Which of the two mutually exclusive groupings a part uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    Buses,
    Subparts,
}

/// Part category inferred from the copper layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoardClass {
    /// Both copper0 and copper1.
    ThroughHole,
    /// copper1 only.
    SmdTop,
    /// copper0 only, almost always a mistake.
    SmdBottom,
    /// Neither copper layer.
    NoCopper,
    /// Every pcb pin is hybrid.
    NoBoardView,
}

impl fmt::Display for BoardClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BoardClass::ThroughHole => "through-hole",
            BoardClass::SmdTop => "smd (top)",
            BoardClass::SmdBottom => "smd (bottom only)",
            BoardClass::NoCopper => "no copper",
            BoardClass::NoBoardView => "no pcb view",
        };
        f.write_str(text)
    }
}

/// A second definition was attempted; `line` is where the first one was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Defined {
    pub line: u32,
}

/// Lines of the copper layers declared in the pcb view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopperLayers {
    pub copper0: Option<u32>,
    pub copper1: Option<u32>,
}

impl CopperLayers {
    pub fn classify(&self) -> BoardClass {
        match (self.copper0.is_some(), self.copper1.is_some()) {
            (true, true) => BoardClass::ThroughHole,
            (false, true) => BoardClass::SmdTop,
            (true, false) => BoardClass::SmdBottom,
            (false, false) => BoardClass::NoCopper,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FactBase {
    pub module_id: Option<String>,
    pub reference_file: Option<String>,
    pub views_declared: bool,
    pub copper: CopperLayers,
    pub grouping: Option<Grouping>,
    views: BTreeMap<ViewKind, ViewRecord>,
    connectors: Vec<ConnectorRecord>,
    connector_index: HashMap<String, usize>,
    connector_names: HashMap<String, u32>,
    buses: Vec<BusRecord>,
    bus_index: HashMap<String, usize>,
    subparts: Vec<SubpartRecord>,
    subpart_index: HashMap<String, usize>,
    subpart_labels: HashMap<String, u32>,
    declared: BTreeMap<ViewKind, Vec<String>>,
    declared_set: HashSet<(ViewKind, String)>,
    optional_set: HashSet<(ViewKind, String)>,
}

impl FactBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_view(&mut self, view: ViewKind, line: u32) -> Result<&mut ViewRecord, Defined> {
        if let Some(existing) = self.views.get(&view) {
            return Err(Defined {
                line: existing.line,
            });
        }
        Ok(self.views.entry(view).or_insert(ViewRecord {
            line,
            ..ViewRecord::default()
        }))
    }

    pub fn view(&self, view: ViewKind) -> Option<&ViewRecord> {
        self.views.get(&view)
    }

    pub fn view_mut(&mut self, view: ViewKind) -> Option<&mut ViewRecord> {
        self.views.get_mut(&view)
    }

    pub fn views(&self) -> impl Iterator<Item = (ViewKind, &ViewRecord)> {
        self.views.iter().map(|(k, v)| (*k, v))
    }

    pub fn define_connector(&mut self, id: &str, line: u32) -> Result<&mut ConnectorRecord, Defined> {
        if let Some(&index) = self.connector_index.get(id) {
            return Err(Defined {
                line: self.connectors[index].line,
            });
        }
        self.connector_index.insert(id.to_string(), self.connectors.len());
        self.connectors.push(ConnectorRecord {
            id: id.to_string(),
            line,
            ..ConnectorRecord::default()
        });
        let last = self.connectors.len() - 1;
        Ok(&mut self.connectors[last])
    }

    /// Record a connector display name; names share one namespace.
    pub fn define_connector_name(&mut self, name: &str, line: u32) -> Result<(), Defined> {
        match self.connector_names.get(name) {
            Some(&first) => Err(Defined { line: first }),
            None => {
                self.connector_names.insert(name.to_string(), line);
                Ok(())
            }
        }
    }

    pub fn connector(&self, id: &str) -> Option<&ConnectorRecord> {
        self.connector_index.get(id).map(|&i| &self.connectors[i])
    }

    pub fn connector_mut(&mut self, id: &str) -> Option<&mut ConnectorRecord> {
        match self.connector_index.get(id) {
            Some(&i) => Some(&mut self.connectors[i]),
            None => None,
        }
    }

    pub fn connectors(&self) -> &[ConnectorRecord] {
        &self.connectors
    }

    pub fn define_bus(&mut self, id: &str, line: u32) -> Result<&mut BusRecord, Defined> {
        if let Some(&index) = self.bus_index.get(id) {
            return Err(Defined {
                line: self.buses[index].line,
            });
        }
        self.bus_index.insert(id.to_string(), self.buses.len());
        self.buses.push(BusRecord {
            id: id.to_string(),
            members: 0,
            line,
        });
        let last = self.buses.len() - 1;
        Ok(&mut self.buses[last])
    }

    pub fn bus(&self, id: &str) -> Option<&BusRecord> {
        self.bus_index.get(id).map(|&i| &self.buses[i])
    }

    pub fn bus_mut(&mut self, id: &str) -> Option<&mut BusRecord> {
        match self.bus_index.get(id) {
            Some(&i) => Some(&mut self.buses[i]),
            None => None,
        }
    }

    pub fn buses(&self) -> &[BusRecord] {
        &self.buses
    }

    pub fn define_subpart(&mut self, id: &str, line: u32) -> Result<&mut SubpartRecord, Defined> {
        if let Some(&index) = self.subpart_index.get(id) {
            return Err(Defined {
                line: self.subparts[index].line,
            });
        }
        self.subpart_index.insert(id.to_string(), self.subparts.len());
        self.subparts.push(SubpartRecord {
            id: id.to_string(),
            line,
            ..SubpartRecord::default()
        });
        let last = self.subparts.len() - 1;
        Ok(&mut self.subparts[last])
    }

    pub fn define_subpart_label(&mut self, label: &str, line: u32) -> Result<(), Defined> {
        match self.subpart_labels.get(label) {
            Some(&first) => Err(Defined { line: first }),
            None => {
                self.subpart_labels.insert(label.to_string(), line);
                Ok(())
            }
        }
    }

    pub fn subpart(&self, id: &str) -> Option<&SubpartRecord> {
        self.subpart_index.get(id).map(|&i| &self.subparts[i])
    }

    pub fn subpart_mut(&mut self, id: &str) -> Option<&mut SubpartRecord> {
        match self.subpart_index.get(id) {
            Some(&i) => Some(&mut self.subparts[i]),
            None => None,
        }
    }

    pub fn subparts(&self) -> &[SubpartRecord] {
        &self.subparts
    }

    pub fn has_subparts(&self) -> bool {
        !self.subparts.is_empty()
    }

    /// Add an anchor to the view's declared set. Returns false if it was
    /// already there.
    pub fn append_anchor(&mut self, view: ViewKind, anchor: &str) -> bool {
        if !self.declared_set.insert((view, anchor.to_string())) {
            return false;
        }
        self.declared.entry(view).or_default().push(anchor.to_string());
        true
    }

    /// Anchors the graphic of `view` must contain, in declaration order.
    pub fn declared_anchors(&self, view: ViewKind) -> &[String] {
        self.declared.get(&view).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_declared_anchor(&self, view: ViewKind, anchor: &str) -> bool {
        self.declared_set.contains(&(view, anchor.to_string()))
    }

    /// Anchors of hybrid pins: allowed in the graphic, never required.
    pub fn append_optional_anchor(&mut self, view: ViewKind, anchor: &str) {
        self.optional_set.insert((view, anchor.to_string()));
    }

    /// Declared or optional.
    pub fn is_known_anchor(&self, view: ViewKind, anchor: &str) -> bool {
        let key = (view, anchor.to_string());
        self.declared_set.contains(&key) || self.optional_set.contains(&key)
    }

    /// Sub-part whose schematic anchors include `anchor`.
    pub fn subpart_of_anchor(&self, anchor: &str) -> Option<&SubpartRecord> {
        self.subparts
            .iter()
            .find(|s| s.anchors.iter().any(|a| a == anchor))
    }

    /// True when the pcb view has pins and every one of them is hybrid.
    pub fn board_all_hybrid(&self) -> bool {
        let mut pins = self
            .connectors
            .iter()
            .flat_map(|c| c.pins(ViewKind::Pcb))
            .peekable();
        pins.peek().is_some() && pins.all(|p| p.hybrid)
    }
}

/// Pin number derived from a connector id: `connector12` gives 12.
pub fn pin_number(id: &str) -> Option<u32> {
    let rest = match id.get(..9) {
        Some(prefix) if prefix.eq_ignore_ascii_case("connector") => &id[9..],
        _ => id,
    };
    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}
