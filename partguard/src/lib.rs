//! PartGuard - Fritzing part validation and repair library
//!
//! A Fritzing part is a descriptor (`.fzp`) plus one graphic (`.svg`) per
//! view. This library checks the descriptor against the part grammar, checks
//! each graphic against the descriptor, and repairs the graphics where the
//! problem has a safe mechanical fix. Findings are numbered diagnostics in
//! three streams: errors, warnings and repair notes.
//!
//! # Quick Start
//!
//! ```no_run
//! use partguard::{CheckOptions, OutputMode, PartGuardCore};
//! use std::path::Path;
//!
//! let options = CheckOptions {
//!     output: OutputMode::CheckOnly,
//!     ..CheckOptions::default()
//! };
//! let report = PartGuardCore::check_part(Path::new("core/dip_8.fzp"), &options).unwrap();
//!
//! for file in &report.files {
//!     for diagnostic in file.diagnostics.iter() {
//!         println!("{}", diagnostic);
//!     }
//! }
//! ```
//!
//! # Features
//!
//! - **Descriptor checks**: views, layers, connectors, buses and sub-parts
//! - **Graphic checks**: size and viewBox, layer structure, connector anchors
//! - **Repairs**: inline styles, tspans, fonts, terminals, silkscreen colour
//! - **Renumbering**: opt-in connector id renumbering for loose graphics
//! - **Layouts**: flat `part.*.fzp` directories and the nested parts library

pub mod consistency;
pub mod core;
pub mod descriptor;
pub mod diagnostics;
pub mod facts;
pub mod graphic;
pub mod layout;
pub mod walk;
pub mod xml;

// Re-export main types
pub use core::{
    discover_graphics, discover_parts, CheckOptions, FileReport, OutputMode, PartGuardCore,
    PartGuardError, PartReport, ReportStats,
};
pub use descriptor::validate_descriptor;
pub use diagnostics::{Code, Diagnostic, Diagnostics, Severity};
pub use facts::{BoardClass, FactBase, ViewKind};
pub use graphic::{renumber_connectors, validate_graphic, GraphicContext, GraphicOutcome, Renumber};
pub use layout::PartLayout;

/// Check a descriptor or graphic without writing anything (convenience wrapper).
pub fn check(path: &std::path::Path) -> Result<PartReport, PartGuardError> {
    let options = CheckOptions {
        output: OutputMode::CheckOnly,
        ..CheckOptions::default()
    };
    PartGuardCore::check_file(path, &options)
}

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        BoardClass, CheckOptions, Code, Diagnostic, Diagnostics, OutputMode, PartGuardCore,
        PartGuardError, PartReport, Severity, ViewKind,
    };
}
