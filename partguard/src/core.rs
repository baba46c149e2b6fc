//! Part-level orchestration shared by the CLI and library users.
//! Parses, validates, repairs and writes one part or a directory of parts.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::consistency;
use crate::descriptor::validate_descriptor;
use crate::diagnostics::{Code, Diagnostics, Reporter, Severity};
use crate::facts::{BoardClass, ViewKind};
use crate::graphic::{renumber_connectors, validate_graphic, GraphicContext, Renumber};
use crate::layout::{backup_path, case_mismatch, has_extension, infer_view, reference_name, PartLayout};
use crate::xml::{self, Granularity};

#[derive(Debug, thiserror::Error)]
pub enum PartGuardError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Layout error: {0}")]
    Layout(String),
    #[error("{0}")]
    Other(String),
}

/// Where repaired files go.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputMode {
    /// Rename each input to `<name>.bak` and write the repaired file in its place.
    #[default]
    InPlace,
    /// Mirror the part layout under this directory.
    Directory(PathBuf),
    /// Keep the repaired text in the report instead of writing it.
    Print,
    /// Validate only.
    CheckOnly,
}

/// Options for a check run (CLI or library).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckOptions {
    /// Resize zero-size terminals instead of warning about them.
    pub fix_terminals: bool,
    pub name_dup_warnings: bool,
    pub flatten_tspans: bool,
    /// Move connector ids off groups onto their first circle.
    pub fix_connector_groups: bool,
    /// Write graphics with one attribute per line.
    pub detail_pretty_print: bool,
    /// Renumber connector ids of standalone graphics before checking them.
    pub renumber: Option<Renumber>,
    pub output: OutputMode,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            fix_terminals: true,
            name_dup_warnings: false,
            flatten_tspans: true,
            fix_connector_groups: true,
            detail_pretty_print: true,
            renumber: None,
            output: OutputMode::InPlace,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportStats {
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
}

impl ReportStats {
    fn add(&mut self, diagnostics: &Diagnostics) {
        self.errors += diagnostics.errors().len();
        self.warnings += diagnostics.warnings().len();
        self.info += diagnostics.info().len();
    }

    pub fn total(&self) -> usize {
        self.errors + self.warnings + self.info
    }
}

/// One processed file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    /// Where the repaired file was written, if anywhere.
    pub output: Option<PathBuf>,
    /// Repaired text when running with [`OutputMode::Print`].
    pub rendered: Option<String>,
    pub diagnostics: Diagnostics,
}

/// Everything found while checking one part (or one standalone graphic).
#[derive(Debug, Clone, Serialize)]
pub struct PartReport {
    pub descriptor: Option<PathBuf>,
    pub board: Option<BoardClass>,
    pub files: Vec<FileReport>,
    pub stats: ReportStats,
}

impl PartReport {
    fn new(descriptor: Option<PathBuf>, board: Option<BoardClass>, files: Vec<FileReport>) -> Self {
        let mut stats = ReportStats::default();
        for file in &files {
            stats.add(&file.diagnostics);
        }
        Self {
            descriptor,
            board,
            files,
            stats,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.stats.errors > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.stats.warnings > 0
    }

    pub fn total_issues(&self) -> usize {
        self.stats.errors + self.stats.warnings
    }

    /// Whether anything at `severity` or worse was reported.
    pub fn has_at_least(&self, severity: Severity) -> bool {
        match severity {
            Severity::Error => self.has_errors(),
            Severity::Warning => self.has_errors() || self.has_warnings(),
            Severity::Info => self.stats.total() > 0,
        }
    }
}

/// Descriptors (`.fzp`) directly inside `dir`, sorted.
pub fn discover_parts(dir: &Path) -> Result<Vec<PathBuf>, PartGuardError> {
    list_files(dir, "fzp")
}

/// Graphics (`.svg`) directly inside `dir`, sorted.
pub fn discover_graphics(dir: &Path) -> Result<Vec<PathBuf>, PartGuardError> {
    list_files(dir, "svg")
}

fn list_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, PartGuardError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_extension(&path, ext) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// State for one part: graphics already handled and the per-file reports.
struct PartRun<'a> {
    options: &'a CheckOptions,
    layout: Option<PartLayout>,
    processed: HashSet<PathBuf>,
    files: Vec<FileReport>,
}

impl<'a> PartRun<'a> {
    fn new(options: &'a CheckOptions, layout: Option<PartLayout>) -> Self {
        Self {
            options,
            layout,
            processed: HashSet::new(),
            files: Vec::new(),
        }
    }

    /// Output path for `input` in directory mode.
    fn mirrored(&self, dst: &Path, input: &Path, image: Option<&str>) -> PathBuf {
        match (&self.layout, image) {
            (Some(layout), Some(image)) => layout.output_graphic(dst, image),
            (Some(layout), None) => layout.output_descriptor(dst, input),
            (None, _) => dst.join(input.file_name().unwrap_or_default()),
        }
    }

    /// Write `text` according to the output mode. Failures become diagnostics.
    fn emit(
        &self,
        input: &Path,
        image: Option<&str>,
        text: String,
        backup: bool,
        sink: &mut Diagnostics,
    ) -> (Option<PathBuf>, Option<String>) {
        match &self.options.output {
            OutputMode::CheckOnly => (None, None),
            OutputMode::Print => (None, Some(text)),
            OutputMode::InPlace => {
                if backup {
                    let bak = backup_path(input);
                    if let Err(e) = std::fs::rename(input, &bak) {
                        sink.report(
                            Code::BackupFailed,
                            input,
                            None,
                            format!("can't rename to '{}': {}", bak.display(), e),
                        );
                        return (None, None);
                    }
                }
                write_output(input, &text, sink)
            }
            OutputMode::Directory(dst) => {
                let target = self.mirrored(dst, input, image);
                write_output(&target, &text, sink)
            }
        }
    }

    fn finish_file(&mut self, path: &Path, output: (Option<PathBuf>, Option<String>), sink: &mut Diagnostics) {
        let diagnostics = sink.take();
        tracing::info!(
            file = %path.display(),
            errors = diagnostics.errors().len(),
            warnings = diagnostics.warnings().len(),
            repairs = diagnostics.info().len(),
            "checked"
        );
        self.files.push(FileReport {
            path: path.to_path_buf(),
            output: output.0,
            rendered: output.1,
            diagnostics,
        });
    }

    /// Copy the icon graphic unchanged; it carries no connectors.
    fn copy_icon(&mut self, path: &Path, image: &str, sink: &mut Diagnostics) {
        let output = match &self.options.output {
            OutputMode::Directory(dst) => {
                let target = self.mirrored(dst, path, Some(image));
                let copied = target
                    .parent()
                    .map_or(Ok(()), std::fs::create_dir_all)
                    .and_then(|_| std::fs::copy(path, &target));
                match copied {
                    Ok(_) => (Some(target), None),
                    Err(e) => {
                        sink.report(
                            Code::WriteFailed,
                            &target,
                            None,
                            format!("can't copy '{}': {}", path.display(), e),
                        );
                        (None, None)
                    }
                }
            }
            _ => (None, None),
        };
        self.finish_file(path, output, sink);
    }
}

fn write_output(target: &Path, text: &str, sink: &mut Diagnostics) -> (Option<PathBuf>, Option<String>) {
    let written = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
    .and_then(|_| std::fs::write(target, text));
    match written {
        Ok(()) => (Some(target.to_path_buf()), None),
        Err(e) => {
            sink.report(Code::WriteFailed, target, None, format!("can't write: {}", e));
            (None, None)
        }
    }
}

/// Core validation API used by the CLI.
pub struct PartGuardCore;

impl PartGuardCore {
    /// Check a descriptor and every graphic it references.
    pub fn check_part(descriptor: &Path, options: &CheckOptions) -> Result<PartReport, PartGuardError> {
        let layout = PartLayout::for_descriptor(descriptor)?;
        tracing::debug!(file = %descriptor.display(), ?layout, "part layout");
        let mut run = PartRun::new(options, Some(layout.clone()));
        let mut sink = Diagnostics::new();

        let doc = match xml::parse_file(descriptor) {
            Ok(doc) => doc,
            Err(e) => {
                sink.report(Code::ParseFailed, descriptor, None, e.to_string());
                run.finish_file(descriptor, (None, None), &mut sink);
                return Ok(PartReport::new(Some(descriptor.to_path_buf()), None, run.files));
            }
        };

        let facts = validate_descriptor(&doc, descriptor, options, &mut sink);
        let board = {
            let mut out = Reporter::new(descriptor, &mut sink);
            consistency::check(&facts, &mut out).board
        };
        let output = run.emit(descriptor, None, xml::to_string(&doc, Granularity::Element), true, &mut sink);
        run.finish_file(descriptor, output, &mut sink);

        for (view, record) in facts.views() {
            let Some(image) = record.image.as_deref() else {
                continue;
            };
            let path = layout.graphic(image);

            let mismatch = case_mismatch(&path);
            if let Some(actual) = &mismatch {
                sink.report(
                    Code::GraphicCaseMismatch,
                    &path,
                    None,
                    format!("exists as '{}' with different letter case", actual.display()),
                );
            }
            if !path.is_file() {
                if mismatch.is_none() {
                    sink.report(
                        Code::GraphicMissing,
                        &path,
                        None,
                        format!("{} image '{}' doesn't exist", view, image),
                    );
                }
                run.finish_file(&path, (None, None), &mut sink);
                continue;
            }

            if view == ViewKind::Icon {
                run.copy_icon(&path, image, &mut sink);
                continue;
            }

            let shared = !run.processed.insert(path.clone());
            if shared {
                sink.report(
                    Code::GraphicShared,
                    &path,
                    None,
                    format!("already processed for another view, checking again for {}", view),
                );
            }

            let mut graphic = match xml::parse_file(&path) {
                Ok(doc) => doc,
                Err(e) => {
                    sink.report(Code::ParseFailed, &path, None, e.to_string());
                    run.finish_file(&path, (None, None), &mut sink);
                    continue;
                }
            };
            let ctx = GraphicContext::for_view(view, &facts, board, reference_name(&path));
            validate_graphic(&mut graphic, &path, &ctx, options, &mut sink);
            let text = xml::to_string(&graphic, graphic_granularity(options));
            let output = run.emit(&path, Some(image), text, !shared, &mut sink);
            run.finish_file(&path, output, &mut sink);
        }

        Ok(PartReport::new(Some(descriptor.to_path_buf()), board, run.files))
    }

    /// Check a graphic on its own, without its descriptor.
    pub fn check_graphic(graphic: &Path, options: &CheckOptions) -> Result<PartReport, PartGuardError> {
        if !has_extension(graphic, "svg") {
            return Err(PartGuardError::Layout(format!(
                "'{}' is not an .svg file",
                graphic.display()
            )));
        }
        let mut run = PartRun::new(options, None);
        let mut sink = Diagnostics::new();

        let mut doc = match xml::parse_file(graphic) {
            Ok(doc) => doc,
            Err(e) => {
                sink.report(Code::ParseFailed, graphic, None, e.to_string());
                run.finish_file(graphic, (None, None), &mut sink);
                return Ok(PartReport::new(None, None, run.files));
            }
        };
        if let Some(mode) = options.renumber {
            renumber_connectors(&mut doc.root, mode, &mut Reporter::new(graphic, &mut sink));
        }
        let ctx = GraphicContext::standalone(infer_view(graphic), reference_name(graphic));
        let outcome = validate_graphic(&mut doc, graphic, &ctx, options, &mut sink);
        let text = xml::to_string(&doc, graphic_granularity(options));
        let output = run.emit(graphic, None, text, true, &mut sink);
        run.finish_file(graphic, output, &mut sink);

        Ok(PartReport::new(None, outcome.board, run.files))
    }

    /// Dispatch on the file extension.
    pub fn check_file(path: &Path, options: &CheckOptions) -> Result<PartReport, PartGuardError> {
        if has_extension(path, "fzp") {
            Self::check_part(path, options)
        } else if has_extension(path, "svg") {
            Self::check_graphic(path, options)
        } else {
            Err(PartGuardError::Layout(format!(
                "'{}' doesn't end in .fzp or .svg",
                path.display()
            )))
        }
    }

    /// Check every part in `src`, writing repaired files under `dst`.
    /// Graphics in `src` that no part references are checked on their own.
    pub fn check_directory(
        src: &Path,
        dst: &Path,
        options: &CheckOptions,
    ) -> Result<Vec<PartReport>, PartGuardError> {
        if !src.is_dir() {
            return Err(PartGuardError::Layout(format!("'{}' is not a directory", src.display())));
        }
        if !dst.is_dir() {
            return Err(PartGuardError::Layout(format!("'{}' is not a directory", dst.display())));
        }
        if std::fs::read_dir(dst)?.next().is_some() {
            return Err(PartGuardError::Layout(format!("'{}' must be empty", dst.display())));
        }

        let options = CheckOptions {
            output: OutputMode::Directory(dst.to_path_buf()),
            ..options.clone()
        };
        let mut reports = Vec::new();
        for descriptor in discover_parts(src)? {
            match Self::check_part(&descriptor, &options) {
                Ok(report) => reports.push(report),
                Err(e) => tracing::warn!(file = %descriptor.display(), error = %e, "skipped"),
            }
        }

        let referenced: HashSet<PathBuf> = reports
            .iter()
            .flat_map(|r| r.files.iter().map(|f| f.path.clone()))
            .collect();
        for graphic in discover_graphics(src)? {
            if referenced.contains(&graphic) {
                continue;
            }
            reports.push(Self::check_graphic(&graphic, &options)?);
        }
        Ok(reports)
    }
}

fn graphic_granularity(options: &CheckOptions) -> Granularity {
    if options.detail_pretty_print {
        Granularity::Attribute
    } else {
        Granularity::Element
    }
}
