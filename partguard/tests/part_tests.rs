//! End-to-end runs over parts on disk.

use partguard::{
    BoardClass, CheckOptions, Code, OutputMode, PartGuardCore, PartGuardError, PartReport, Renumber,
};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const VIEWS: [&str; 4] = ["icon", "breadboard", "schematic", "pcb"];

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

/// Copy of the flat fixture part in a fresh directory.
fn flat_part() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for entry in fs::read_dir(fixtures_dir()).unwrap() {
        let path = entry.unwrap().path();
        fs::copy(&path, dir.path().join(path.file_name().unwrap())).unwrap();
    }
    dir
}

/// The fixture part rearranged as `core/test_part.fzp` plus `svg/core/<view>/test_part.svg`.
fn nested_part() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let core = dir.path().join("core");
    fs::create_dir_all(&core).unwrap();
    fs::copy(fixtures_dir().join("part.test_part.fzp"), core.join("test_part.fzp")).unwrap();
    for view in VIEWS {
        let target = dir.path().join("svg").join("core").join(view);
        fs::create_dir_all(&target).unwrap();
        fs::copy(
            fixtures_dir().join(format!("svg.{}.test_part.svg", view)),
            target.join("test_part.svg"),
        )
        .unwrap();
    }
    dir
}

fn options(output: OutputMode) -> CheckOptions {
    CheckOptions {
        output,
        ..CheckOptions::default()
    }
}

fn all_codes(report: &PartReport) -> Vec<Code> {
    report
        .files
        .iter()
        .flat_map(|f| f.diagnostics.iter().map(|d| d.code))
        .collect()
}

#[test]
fn test_clean_part_in_place() {
    let dir = flat_part();
    let descriptor = dir.path().join("part.test_part.fzp");
    let report = PartGuardCore::check_part(&descriptor, &CheckOptions::default()).unwrap();

    assert_eq!(report.stats.errors, 0, "{:?}", all_codes(&report));
    assert_eq!(report.stats.warnings, 0, "{:?}", all_codes(&report));
    assert_eq!(report.board, Some(BoardClass::ThroughHole));
    assert_eq!(report.files.len(), 5);

    assert!(dir.path().join("part.test_part.fzp.bak").exists());
    for view in ["breadboard", "schematic", "pcb"] {
        let written = dir.path().join(format!("svg.{}.test_part.svg", view));
        assert!(written.exists());
        assert!(dir.path().join(format!("svg.{}.test_part.svg.bak", view)).exists());
        partguard::xml::parse_file(&written).unwrap();
    }
    assert!(!dir.path().join("svg.icon.test_part.svg.bak").exists());
}

#[test]
fn test_check_only_leaves_files_alone() {
    let dir = flat_part();
    let pcb = dir.path().join("svg.pcb.test_part.svg");
    let before = fs::read_to_string(&pcb).unwrap();

    let report = PartGuardCore::check_part(
        &dir.path().join("part.test_part.fzp"),
        &options(OutputMode::CheckOnly),
    )
    .unwrap();

    assert!(report.files.iter().all(|f| f.output.is_none() && f.rendered.is_none()));
    assert_eq!(fs::read_to_string(&pcb).unwrap(), before);
    assert!(!dir.path().join("part.test_part.fzp.bak").exists());
}

#[test]
fn test_print_mode_renders() {
    let dir = flat_part();
    let pcb = dir.path().join("svg.pcb.test_part.svg");
    let source = fs::read_to_string(&pcb).unwrap().replace(
        "<g id=\"silkscreen\">",
        "<referenceFile>old.svg</referenceFile>\n  <g id=\"silkscreen\">",
    );
    fs::write(&pcb, source).unwrap();

    let report = PartGuardCore::check_part(
        &dir.path().join("part.test_part.fzp"),
        &options(OutputMode::Print),
    )
    .unwrap();

    let pcb_report = report.files.iter().find(|f| f.path == pcb).unwrap();
    assert_eq!(pcb_report.diagnostics.count(Code::ReferenceFileCorrected), 1);
    let rendered = pcb_report.rendered.as_deref().unwrap();
    assert!(rendered.contains("<referenceFile>test_part.svg</referenceFile>"));
    assert!(!dir.path().join("svg.pcb.test_part.svg.bak").exists());
}

#[test]
fn test_missing_connector_in_pcb_graphic() {
    let dir = flat_part();
    let pcb = dir.path().join("svg.pcb.test_part.svg");
    let source: Vec<String> = fs::read_to_string(&pcb)
        .unwrap()
        .lines()
        .filter(|l| !l.contains("connector1pin"))
        .map(str::to_string)
        .collect();
    fs::write(&pcb, source.join("\n")).unwrap();

    let report = PartGuardCore::check_part(
        &dir.path().join("part.test_part.fzp"),
        &options(OutputMode::CheckOnly),
    )
    .unwrap();

    assert_eq!(report.stats.errors, 1, "{:?}", all_codes(&report));
    let errors: Vec<_> = report
        .files
        .iter()
        .flat_map(|f| f.diagnostics.errors())
        .collect();
    assert_eq!(errors[0].code, Code::AnchorMissingInGraphic);
    assert_eq!(errors[0].file, pcb);
    assert!(errors[0].message.contains("connector1"));
    assert!(!all_codes(&report).contains(&Code::PinSequenceGap));
}

#[test]
fn test_missing_and_miscased_graphics() {
    let dir = flat_part();
    fs::remove_file(dir.path().join("svg.breadboard.test_part.svg")).unwrap();
    fs::rename(
        dir.path().join("svg.schematic.test_part.svg"),
        dir.path().join("svg.Schematic.test_part.svg"),
    )
    .unwrap();

    let report = PartGuardCore::check_part(
        &dir.path().join("part.test_part.fzp"),
        &options(OutputMode::CheckOnly),
    )
    .unwrap();

    let codes = all_codes(&report);
    assert_eq!(codes.iter().filter(|c| **c == Code::GraphicMissing).count(), 1);
    assert_eq!(codes.iter().filter(|c| **c == Code::GraphicCaseMismatch).count(), 1);
}

#[test]
fn test_shared_graphic_backed_up_once() {
    let dir = flat_part();
    let descriptor = dir.path().join("part.test_part.fzp");
    let source = fs::read_to_string(&descriptor)
        .unwrap()
        .replace("breadboard/test_part.svg", "schematic/test_part.svg");
    fs::write(&descriptor, source).unwrap();

    let report = PartGuardCore::check_part(&descriptor, &CheckOptions::default()).unwrap();

    assert_eq!(all_codes(&report).iter().filter(|c| **c == Code::GraphicShared).count(), 1);
    assert!(dir.path().join("svg.schematic.test_part.svg.bak").exists());
    assert!(!dir.path().join("svg.schematic.test_part.svg.bak.bak").exists());
}

#[test]
fn test_unparsable_graphic_does_not_stop_the_part() {
    let dir = flat_part();
    let pcb = dir.path().join("svg.pcb.test_part.svg");
    fs::write(&pcb, "<svg><g></svg>").unwrap();

    let report = PartGuardCore::check_part(&dir.path().join("part.test_part.fzp"), &CheckOptions::default()).unwrap();

    let pcb_report = report.files.iter().find(|f| f.path == pcb).unwrap();
    assert!(pcb_report.diagnostics.has(Code::ParseFailed));
    assert!(pcb_report.output.is_none());
    assert!(!dir.path().join("svg.pcb.test_part.svg.bak").exists());
    assert!(dir.path().join("svg.schematic.test_part.svg.bak").exists());
}

#[test]
fn test_nested_layout() {
    let dir = nested_part();
    let report = PartGuardCore::check_part(
        &dir.path().join("core").join("test_part.fzp"),
        &options(OutputMode::CheckOnly),
    )
    .unwrap();

    assert_eq!(report.stats.errors, 0, "{:?}", all_codes(&report));
    assert_eq!(report.stats.warnings, 0, "{:?}", all_codes(&report));
    assert_eq!(report.files.len(), 5);
}

#[test]
fn test_directory_mode_flat() {
    let src = flat_part();
    fs::copy(
        fixtures_dir().join("svg.pcb.test_part.svg"),
        src.path().join("svg.pcb.stray.svg"),
    )
    .unwrap();
    let dst = tempfile::tempdir().unwrap();

    let reports = PartGuardCore::check_directory(src.path(), dst.path(), &CheckOptions::default()).unwrap();

    assert_eq!(reports.len(), 2);
    assert!(reports[0].descriptor.is_some());
    assert_eq!(reports[1].descriptor, None);
    assert_eq!(reports[1].board, Some(BoardClass::ThroughHole));
    for name in [
        "part.test_part.fzp",
        "svg.icon.test_part.svg",
        "svg.breadboard.test_part.svg",
        "svg.schematic.test_part.svg",
        "svg.pcb.test_part.svg",
        "svg.pcb.stray.svg",
    ] {
        assert!(dst.path().join(name).exists(), "{} not written", name);
    }
    assert!(!src.path().join("part.test_part.fzp.bak").exists());
}

#[test]
fn test_directory_mode_nested() {
    let root = nested_part();
    let dst = tempfile::tempdir().unwrap();

    let reports =
        PartGuardCore::check_directory(&root.path().join("core"), dst.path(), &CheckOptions::default()).unwrap();

    assert_eq!(reports.len(), 1);
    assert!(dst.path().join("core").join("test_part.fzp").exists());
    for view in VIEWS {
        let out = dst.path().join("svg").join("core").join(view).join("test_part.svg");
        assert!(out.exists(), "{} not written", out.display());
    }
}

#[test]
fn test_directory_mode_needs_empty_destination() {
    let src = flat_part();
    let err = PartGuardCore::check_directory(src.path(), src.path(), &CheckOptions::default()).unwrap_err();
    assert!(matches!(err, PartGuardError::Layout(_)));
}

#[test]
fn test_standalone_graphic() {
    let dir = flat_part();
    let report = PartGuardCore::check_graphic(
        &dir.path().join("svg.pcb.test_part.svg"),
        &options(OutputMode::CheckOnly),
    )
    .unwrap();
    assert_eq!(report.descriptor, None);
    assert_eq!(report.board, Some(BoardClass::ThroughHole));
    assert_eq!(report.total_issues(), 0);

    let err = PartGuardCore::check_graphic(Path::new("part.test_part.fzp"), &CheckOptions::default()).unwrap_err();
    assert!(matches!(err, PartGuardError::Layout(_)));
}

#[test]
fn test_second_run_makes_no_repairs() {
    let dir = flat_part();
    let breadboard = dir.path().join("svg.breadboard.test_part.svg");
    let source = fs::read_to_string(&breadboard)
        .unwrap()
        .replace(r##"fill="#404040""##, r##"style="fill:#404040""##);
    fs::write(&breadboard, source).unwrap();
    let descriptor = dir.path().join("part.test_part.fzp");

    let first = PartGuardCore::check_part(&descriptor, &CheckOptions::default()).unwrap();
    assert_eq!(first.stats.info, 1);

    let second = PartGuardCore::check_part(&descriptor, &CheckOptions::default()).unwrap();
    assert_eq!(second.stats.info, 0);
    assert_eq!(second.stats.errors, 0);
}

#[test]
fn test_standalone_graphic_renumbered() {
    let dir = tempfile::tempdir().unwrap();
    let svg = dir.path().join("svg.pcb.loose.svg");
    let source = fs::read_to_string(fixtures_dir().join("svg.pcb.test_part.svg"))
        .unwrap()
        .replace("connector2pin", "connector9pin");
    fs::write(&svg, source).unwrap();

    let options = CheckOptions {
        renumber: Some(Renumber::Pins),
        output: OutputMode::Print,
        ..CheckOptions::default()
    };
    let report = PartGuardCore::check_graphic(&svg, &options).unwrap();

    let file = &report.files[0];
    assert_eq!(file.diagnostics.count(Code::ConnectorRenumbered), 1);
    let rendered = file.rendered.as_deref().unwrap();
    assert!(rendered.contains("connector2pin"));
    assert!(!rendered.contains("connector9pin"));
}

#[test]
fn test_report_serializes_to_json() {
    let dir = flat_part();
    let report = PartGuardCore::check_part(
        &dir.path().join("part.test_part.fzp"),
        &options(OutputMode::CheckOnly),
    )
    .unwrap();

    let value = serde_json::to_value(&report).unwrap();
    assert_eq!(value["board"], "through-hole");
    assert_eq!(value["stats"]["errors"], 0);
    assert_eq!(value["files"].as_array().unwrap().len(), 5);
}

#[test]
fn test_options_from_json_fill_defaults() {
    let options: CheckOptions =
        serde_json::from_str(r#"{"renumber": "schematic-pairs", "output": "CheckOnly"}"#).unwrap();
    assert_eq!(options.renumber, Some(Renumber::SchematicPairs));
    assert_eq!(options.output, OutputMode::CheckOnly);
    assert!(options.flatten_tspans);
    assert!(!options.name_dup_warnings);
}
