//! Simple validation example: check a part without writing anything and print results.

use partguard::prelude::*;
use std::path::Path;

fn main() -> Result<(), PartGuardError> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tests/fixtures/part.test_part.fzp".to_string());
    let path = Path::new(&path);

    if !path.exists() {
        eprintln!("File not found: {}", path.display());
        eprintln!("Usage: cargo run --example simple_validation [path/to/part.fzp]");
        std::process::exit(1);
    }

    let options = CheckOptions {
        output: OutputMode::CheckOnly,
        ..CheckOptions::default()
    };

    let report = PartGuardCore::check_file(path, &options)?;

    println!("Check results for: {}", path.display());
    if let Some(board) = report.board {
        println!("Category: {}", board);
    }
    println!("Total issues: {}", report.total_issues());
    println!();

    for file in &report.files {
        for diagnostic in file.diagnostics.errors() {
            println!("  - {}", diagnostic);
        }
    }

    if report.has_errors() {
        println!("\nCheck failed ({} errors).", report.stats.errors);
        std::process::exit(1);
    }

    println!("\nCheck passed (no errors).");
    Ok(())
}
