//! Diagnostic catalogue and the three-stream sink.
//!
//! Every rule the engine enforces has a [`Code`] with a stable number and a
//! fixed [`Severity`]. Findings are collected, never raised: a file with
//! errors is still walked to the end and written out.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The part does not conform.
    Error,
    /// Probably wrong, but not certainly.
    Warning,
    /// An automatic repair was applied.
    Info,
}

impl Severity {
    /// Label used when rendering a code, e.g. `Error 18` or `Modified 6`.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
            Severity::Info => "Modified",
        }
    }
}

macro_rules! catalogue {
    ($( $variant:ident => $severity:ident $number:literal $summary:literal, )*) => {
        /// Every diagnostic the engine can emit.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        pub enum Code {
            $( $variant, )*
        }

        impl Code {
            /// The whole catalogue in declaration order.
            pub const ALL: &'static [Code] = &[$( Code::$variant, )*];

            pub fn severity(self) -> Severity {
                match self {
                    $( Code::$variant => Severity::$severity, )*
                }
            }

            pub fn number(self) -> u16 {
                match self {
                    $( Code::$variant => $number, )*
                }
            }

            /// One-line description used by `partguard-cli rules`.
            pub fn summary(self) -> &'static str {
                match self {
                    $( Code::$variant => $summary, )*
                }
            }
        }
    };
}

catalogue! {
    ParseFailed => Error 1 "document is not well-formed XML",
    WriteFailed => Error 3 "repaired output could not be written",
    BackupFailed => Error 15 "input could not be renamed to its .bak backup",
    DuplicateId => Error 16 "identifier or label is already defined",
    NoAnchorsInGraphic => Error 17 "graphic contains none of the view's connectors",
    AnchorMissingInGraphic => Error 18 "connector declared for the view is missing from the graphic",
    GraphicMissing => Error 20 "graphic file referenced by a view does not exist",
    GraphicCaseMismatch => Error 21 "graphic file exists only with different letter case",
    ModuleIdMissing => Error 22 "root element has no moduleId",
    BusSubpartConflict => Error 23 "buses and schematic sub-parts are mutually exclusive",
    DuplicateMetadata => Error 24 "metadata element may appear only once",
    ModuleIdRepeated => Error 25 "more than one moduleId",
    UnexpectedTag => Error 26 "element does not continue the descriptor grammar",
    ViewNameMissing => Error 27 "layers element without an enclosing view",
    ViewRepeated => Error 28 "view declared more than once",
    UnknownView => Error 29 "view name is not icon, breadboard, schematic or pcb",
    ImageMissing => Error 30 "view has no image reference",
    ImageRepeated => Error 31 "view has more than one image reference",
    LayerIdMissing => Error 32 "layer element has no layerId",
    LayerIdRepeated => Error 33 "layer id repeated within a view",
    NoViews => Error 34 "descriptor declares no views",
    UnknownBoardLayer => Error 35 "pcb layer id is not a known board layer",
    NoValidViews => Error 36 "views section contains no valid view",
    BottomOnlySmd => Error 37 "surface mount part on the bottom copper layer only",
    GrammarTooDeep => Error 38 "significant element nested deeper than the grammar allows",
    ConnectorIdMissing => Error 39 "connector has no id",
    ConnectorNameMissing => Error 40 "connector has no name",
    ConnectorTypeMissing => Error 41 "connector has no type",
    DescriptionMissing => Error 42 "connector views appear before its description",
    PinOutsideView => Error 43 "pin element without an enclosing view name",
    PinViewInvalid => Error 44 "connectors may only have breadboard, schematic or pcb pins",
    PinLayerMissing => Error 45 "pin element has no layer",
    ViewHasNoLayer => Error 46 "pin references a view that declares no layers",
    PinLayerMismatch => Error 47 "pin layer is not a layer of its view",
    CopperLayerRepeated => Error 48 "copper layer repeated for one connector",
    HybridInvalid => Error 49 "hybrid attribute must be \"yes\"",
    AnchorRefMissing => Error 51 "pin has no svgId",
    BusRedefined => Error 52 "bus id already defined",
    BusMemberUnknown => Error 53 "bus member is not a declared connector",
    BusMemberConflict => Error 54 "connector is already a member of another bus",
    SubpartIdMissing => Error 55 "sub-part has no id",
    SubpartIdCollision => Error 56 "sub-part id collides with a connector id",
    SubpartLabelMissing => Error 57 "sub-part has no label",
    SubpartRedefined => Error 58 "sub-part id already defined",
    SubpartConnectorIdMissing => Error 59 "sub-part connector has no id",
    SubpartConnectorUnknown => Error 60 "sub-part connector is not a declared connector",
    SubpartConnectorConflict => Error 61 "connector already belongs to another sub-part",
    NoConnectors => Error 62 "descriptor declares no connectors",
    TspanPresent => Error 63 "text contains tspan elements",
    EllipseAnchor => Error 65 "through-hole anchor is an ellipse, not a circle",
    DuplicateAnchor => Error 66 "anchor appears more than once in a layer",
    RootNotSvg => Error 67 "first element of the graphic is not svg",
    DrawingBeforeLayer => Error 69 "drawing element outside any recognised layer",
    LayerRepeated => Error 70 "pcb layer group appears more than once",
    SilkscreenNested => Error 71 "silkscreen layer is not at the top level",
    CopperSameLevel => Error 72 "copper0 is at the same level as copper1",
    CopperTooDeep => Error 73 "copper0 nested deeper than copper1",
    AnchorWithoutRadius => Error 74 "through-hole anchor has no radius",
    BottomOnlySmdGraphic => Error 75 "pcb graphic has copper0 only",
    CopperTransformMismatch => Error 76 "copper0 and copper1 carry different transforms",
    TerminalOnPathOrGroup => Error 77 "terminal point is a path or group",
    SubpartGroupMissing => Error 78 "sub-part group is missing from the schematic graphic",
    SubpartAnchorMissing => Error 79 "sub-part connector missing from its group",
    TerminalAndLeg => Error 80 "pin has both terminalId and legId",
    SubpartConnectorNoPins => Error 81 "sub-part connector has no schematic pin",
    AnchorOutsideSubpart => Error 82 "schematic anchor is not inside a sub-part group",
    AnchorWithoutSubpart => Error 83 "anchor is not part of any sub-part but sits in one",
    AnchorInWrongSubpart => Error 84 "anchor sits in a different sub-part group",
    SubpartGroupRepeated => Error 85 "sub-part group appears more than once",
    SubpartNotTopLevel => Error 86 "sub-part group is not at the top of the schematic layer",
    ViewBoxMissing => Error 88 "svg root has no viewBox",
    ViewBoxMalformed => Error 89 "viewBox is not four numbers",
    ViewBoxOrigin => Error 90 "viewBox does not start at 0 0",
    TspanPreserveSpace => Error 92 "text uses xml:space=\"preserve\" around tspans",
    AnchorUndeclared => Error 95 "anchor in graphic is not declared for the view",
    GroupAnchor => Error 96 "connector anchor is a group",
    SizeMissing => Error 97 "svg root has no width or height",
    TailText => Warning 2 "non-whitespace text between elements",
    ModuleIdMismatch => Warning 3 "moduleId does not match the file name",
    ReferenceFileMissing => Warning 4 "descriptor has no referenceFile",
    ReferenceFileRepeated => Warning 5 "more than one referenceFile",
    ReferenceFileMismatch => Warning 6 "referenceFile does not match the file name",
    FritzingVersionMissing => Warning 7 "descriptor has no fritzingVersion",
    FritzingVersionRepeated => Warning 8 "more than one fritzingVersion",
    ViewsIncomplete => Warning 9 "fewer than four views declared",
    ForeignConnectorData => Warning 10 "unrecognised data inside a connector",
    TypeNotMale => Warning 11 "connector type is not male",
    UnknownPinAttribute => Warning 12 "unrecognised attribute on a pin",
    AnchorPrefixMismatch => Warning 13 "anchor id does not start with the connector id",
    SchematicTerminalMissing => Warning 14 "schematic pin has no terminalId",
    EmptyBus => Warning 15 "bus has no id",
    TerminalZeroSize => Warning 16 "terminal point has zero width or height",
    SvgRootRepeated => Warning 17 "more than one svg element",
    SizeInPixels => Warning 19 "svg size is in pixels",
    Copper1Nested => Warning 20 "copper1 is not at the top level",
    BoardWithoutLayers => Warning 21 "pcb graphic has no copper or silkscreen layer",
    LayerIdRepeatedInGraphic => Warning 22 "graphic already has a layer group",
    InvalidStyleKey => Warning 23 "style key is not a valid attribute name",
    UnsupportedFont => Warning 24 "font family is not Droid Sans or OCR-A",
    SilkscreenBelowCopper => Warning 25 "silkscreen layer follows a copper layer",
    ForeignTextChild => Warning 26 "text contains a non-tspan child",
    LayerNotGroup => Warning 27 "layer id is on an element that is not a group",
    DuplicateConnectorName => Warning 28 "connector name already used",
    GraphicShared => Warning 29 "graphic already processed for another view",
    UnknownUnits => Warning 30 "svg size units are not in, mm or cm",
    ScaleMismatch => Warning 32 "viewBox is not 1000 units per inch of size",
    PinSequenceGap => Warning 35 "connector numbering has a gap",
    GraphicModified => Warning 38 "graphic geometry was modified, review it in an editor",
    RenumberOutOfSequence => Warning 39 "schematic line/rect pair out of sequence, left unnumbered",
    RenumberNoStart => Warning 40 "no connector id to start renumbering from",
    FontSizePx => Info 1 "px removed from font-size",
    TerminalResized => Info 2 "zero-size terminal resized to 10",
    SilkscreenRecolored => Info 3 "silkscreen colour set to black",
    ReferenceFileCorrected => Info 4 "referenceFile text corrected",
    StyleInlined => Info 5 "style attribute expanded into attributes",
    StrokeWidthInherited => Info 6 "inherited stroke-width copied onto copper element",
    TspanFlattened => Info 7 "tspan elements merged into their text element",
    GroupAnchorMoved => Info 8 "connector id moved from a group onto its circle",
    ConnectorRetired => Info 9 "connector id ahead of connector0pin renamed as unused",
    ConnectorRenumbered => Info 10 "connector id renumbered",
}

impl fmt::Display for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.severity().label(), self.number())
    }
}

/// One finding against one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub code: Code,
    pub number: u16,
    pub severity: Severity,
    pub file: PathBuf,
    pub line: Option<u32>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: Code, file: &Path, line: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            code,
            number: code.number(),
            severity: code.severity(),
            file: file.to_path_buf(),
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(
                f,
                "{}: {}:{}: {}",
                self.code,
                self.file.display(),
                line,
                self.message
            ),
            None => write!(f, "{}: {}: {}", self.code, self.file.display(), self.message),
        }
    }
}

/// Errors, warnings and repair notes, each kept in emission order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    info: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Error => self.errors.push(diagnostic),
            Severity::Warning => self.warnings.push(diagnostic),
            Severity::Info => self.info.push(diagnostic),
        }
    }

    pub fn report(
        &mut self,
        code: Code,
        file: &Path,
        line: Option<u32>,
        message: impl Into<String>,
    ) {
        self.push(Diagnostic::new(code, file, line, message));
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }

    pub fn info(&self) -> &[Diagnostic] {
        &self.info
    }

    /// Errors, then warnings, then repair notes.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors
            .iter()
            .chain(self.warnings.iter())
            .chain(self.info.iter())
    }

    pub fn len(&self) -> usize {
        self.errors.len() + self.warnings.len() + self.info.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn count(&self, code: Code) -> usize {
        self.iter().filter(|d| d.code == code).count()
    }

    pub fn has(&self, code: Code) -> bool {
        self.iter().any(|d| d.code == code)
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.info.extend(other.info);
    }

    /// Drain every stream, leaving the sink empty for the next file.
    pub fn take(&mut self) -> Diagnostics {
        std::mem::take(self)
    }
}

/// A sink bound to the file currently being walked.
pub struct Reporter<'a> {
    file: &'a Path,
    sink: &'a mut Diagnostics,
}

impl<'a> Reporter<'a> {
    pub fn new(file: &'a Path, sink: &'a mut Diagnostics) -> Self {
        Self { file, sink }
    }

    pub fn file(&self) -> &Path {
        self.file
    }

    pub fn at(&mut self, code: Code, line: u32, message: impl Into<String>) {
        self.sink.report(code, self.file, Some(line), message);
    }

    pub fn whole_file(&mut self, code: Code, message: impl Into<String>) {
        self.sink.report(code, self.file, None, message);
    }
}
