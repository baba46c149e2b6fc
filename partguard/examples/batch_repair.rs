//! Repair every part in a directory into an empty output directory.
//! Run with: cargo run --example batch_repair <src> <dst>

use partguard::prelude::*;
use std::path::PathBuf;

fn main() -> Result<(), PartGuardError> {
    let mut args = std::env::args().skip(1);
    let (Some(src), Some(dst)) = (args.next(), args.next()) else {
        eprintln!("Usage: cargo run --example batch_repair <src> <dst>");
        std::process::exit(1);
    };
    let (src, dst) = (PathBuf::from(src), PathBuf::from(dst));

    let reports = PartGuardCore::check_directory(&src, &dst, &CheckOptions::default())?;

    let mut repaired = 0;
    for report in &reports {
        let name = report
            .descriptor
            .as_deref()
            .or_else(|| report.files.first().map(|f| f.path.as_path()))
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        println!(
            "{}: {} errors, {} warnings, {} repairs",
            name, report.stats.errors, report.stats.warnings, report.stats.info
        );
        repaired += report.stats.info;
    }

    println!("\n{} parts checked, {} repairs written to {}", reports.len(), repaired, dst.display());
    Ok(())
}
