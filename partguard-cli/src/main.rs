//! PartGuard CLI - Fritzing part validation and repair from the command line.

use clap::{Args, Parser, Subcommand, ValueEnum};
use partguard::{
    CheckOptions, Code, Diagnostic, OutputMode, PartGuardCore, PartReport, Renumber, Severity,
};
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "partguard")]
#[command(about = "Fritzing part (.fzp + .svg) validation and repair tool", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check one part (.fzp) or one standalone graphic (.svg)
    Check {
        /// Path to a .fzp or .svg file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Validate only, don't write anything
        #[arg(long, conflicts_with = "print")]
        check_only: bool,

        /// Print repaired files instead of writing them
        #[arg(long)]
        print: bool,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Check every part in SRC, writing repaired copies under DST
    Dir {
        /// Directory holding .fzp (and .svg) files
        #[arg(value_name = "SRC")]
        src: PathBuf,

        /// Existing, empty output directory
        #[arg(value_name = "DST")]
        dst: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },

    /// List the diagnostic catalogue
    Rules {
        /// Group by severity and show rule names
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "human")]
    format: OutputFormat,

    /// Exit with error code if issues found at this severity or higher
    #[arg(long, value_enum)]
    fail_on: Option<FailOnSeverity>,

    /// Warn about zero-size terminals instead of resizing them
    #[arg(long)]
    no_terminal_fix: bool,

    /// Warn about duplicate connector names
    #[arg(long)]
    name_dup_warnings: bool,

    /// Report tspan elements instead of flattening them
    #[arg(long)]
    keep_tspans: bool,

    /// Report connector ids on groups instead of moving them
    #[arg(long)]
    no_group_fix: bool,

    /// Write graphics one element per line instead of one attribute per line
    #[arg(long)]
    no_detail_pp: bool,

    /// Renumber connector ids of standalone graphics before checking
    #[arg(long, value_enum)]
    renumber: Option<RenumberMode>,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl RunArgs {
    fn options(&self, output: OutputMode) -> CheckOptions {
        CheckOptions {
            fix_terminals: !self.no_terminal_fix,
            name_dup_warnings: self.name_dup_warnings,
            flatten_tspans: !self.keep_tspans,
            fix_connector_groups: !self.no_group_fix,
            detail_pretty_print: !self.no_detail_pp,
            renumber: self.renumber.as_ref().map(RenumberMode::renumber),
            output,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for CI/CD
    Json,
    /// GitHub Actions format
    Github,
    /// GitLab CI format
    Gitlab,
}

#[derive(Clone, ValueEnum)]
enum FailOnSeverity {
    Error,
    Warning,
    Info,
}

impl FailOnSeverity {
    fn severity(&self) -> Severity {
        match self {
            FailOnSeverity::Error => Severity::Error,
            FailOnSeverity::Warning => Severity::Warning,
            FailOnSeverity::Info => Severity::Info,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum RenumberMode {
    /// connectorNpin in document order from connector0pin
    Pins,
    /// Schematic line/rect pairs as connectorNpin/connectorNterminal
    Schematic,
}

impl RenumberMode {
    fn renumber(&self) -> Renumber {
        match self {
            RenumberMode::Pins => Renumber::Pins,
            RenumberMode::Schematic => Renumber::SchematicPairs,
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Check {
            file,
            check_only,
            print,
            run,
        } => {
            init_logging(run.verbose);
            let output = if check_only {
                OutputMode::CheckOnly
            } else if print {
                OutputMode::Print
            } else {
                OutputMode::InPlace
            };
            handle_check(&file, &run, output)
        }
        Commands::Dir { src, dst, run } => {
            init_logging(run.verbose);
            handle_dir(&src, &dst, &run)
        }
        Commands::Rules { verbose } => {
            handle_rules(verbose);
            0
        }
    };

    process::exit(exit_code);
}

fn handle_check(file: &Path, run: &RunArgs, output: OutputMode) -> i32 {
    let options = run.options(output);
    match PartGuardCore::check_file(file, &options) {
        Ok(report) => finish(&[report], run),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn handle_dir(src: &Path, dst: &Path, run: &RunArgs) -> i32 {
    let options = run.options(OutputMode::Directory(dst.to_path_buf()));
    match PartGuardCore::check_directory(src, dst, &options) {
        Ok(reports) => finish(&reports, run),
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn finish(reports: &[PartReport], run: &RunArgs) -> i32 {
    output_results(reports, &run.format);
    match &run.fail_on {
        Some(threshold) if reports.iter().any(|r| r.has_at_least(threshold.severity())) => 1,
        _ => 0,
    }
}

fn output_results(reports: &[PartReport], format: &OutputFormat) {
    match format {
        OutputFormat::Human => output_human(reports),
        OutputFormat::Json => output_json(reports),
        OutputFormat::Github => output_github(reports),
        OutputFormat::Gitlab => output_gitlab(reports),
    }
}

fn location(diagnostic: &Diagnostic) -> String {
    match diagnostic.line {
        Some(line) => format!("line {}: ", line),
        None => String::new(),
    }
}

fn output_human(reports: &[PartReport]) {
    for report in reports {
        for file in &report.files {
            println!("\nFile: {}", file.path.display());
            println!("{}", "─".repeat(60));

            if file.diagnostics.is_empty() {
                println!("  No issues found");
            }

            let sections = [
                ("ERRORS", file.diagnostics.errors()),
                ("WARNINGS", file.diagnostics.warnings()),
                ("MODIFIED", file.diagnostics.info()),
            ];
            for (title, diagnostics) in sections {
                if diagnostics.is_empty() {
                    continue;
                }
                println!("\n  {}:", title);
                for d in diagnostics {
                    println!("    - {}: {}{}", d.code, location(d), d.message);
                }
            }

            if let Some(out) = &file.output {
                println!("\n  Written to {}", out.display());
            }
            if let Some(text) = &file.rendered {
                println!();
                print!("{}", text);
            }
        }

        println!("\n  Summary:");
        if let Some(board) = report.board {
            println!("    Category: {}", board);
        }
        println!("    Errors:   {}", report.stats.errors);
        println!("    Warnings: {}", report.stats.warnings);
        println!("    Modified: {}", report.stats.info);
    }
}

fn output_json(reports: &[PartReport]) {
    let output = serde_json::json!({
        "results": reports,
        "summary": {
            "total_parts": reports.len(),
            "total_files": reports.iter().map(|r| r.files.len()).sum::<usize>(),
            "total_issues": reports.iter().map(|r| r.total_issues()).sum::<usize>(),
            "errors": reports.iter().map(|r| r.stats.errors).sum::<usize>(),
            "warnings": reports.iter().map(|r| r.stats.warnings).sum::<usize>(),
            "modified": reports.iter().map(|r| r.stats.info).sum::<usize>(),
        }
    });
    println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
}

fn severity_to_github(diagnostic: &Diagnostic) -> &'static str {
    match diagnostic.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "notice",
    }
}

fn output_github(reports: &[PartReport]) {
    for diagnostic in reports.iter().flat_map(|r| &r.files).flat_map(|f| f.diagnostics.iter()) {
        let level = severity_to_github(diagnostic);
        let line = diagnostic
            .line
            .map(|l| format!(",line={}", l))
            .unwrap_or_default();
        println!(
            "::{} file={}{},title={}::{}",
            level,
            diagnostic.file.display(),
            line,
            diagnostic.code,
            diagnostic.message.replace('\n', " ")
        );
    }
}

fn severity_to_gitlab(diagnostic: &Diagnostic) -> &'static str {
    match diagnostic.severity {
        Severity::Error => "major",
        Severity::Warning => "minor",
        Severity::Info => "info",
    }
}

fn output_gitlab(reports: &[PartReport]) {
    let mut entries = Vec::new();
    for diagnostic in reports.iter().flat_map(|r| &r.files).flat_map(|f| f.diagnostics.iter()) {
        entries.push(serde_json::json!({
            "description": diagnostic.message,
            "check_name": diagnostic.code.to_string(),
            "severity": severity_to_gitlab(diagnostic),
            "location": {
                "path": diagnostic.file.display().to_string(),
                "lines": { "begin": diagnostic.line.unwrap_or(1) },
            }
        }));
    }
    println!("{}", serde_json::to_string_pretty(&entries).unwrap_or_default());
}

fn handle_rules(verbose: bool) {
    println!("Diagnostic catalogue:\n");

    if !verbose {
        for code in Code::ALL {
            println!("  {:<12} {}", code.to_string(), code.summary());
        }
        return;
    }

    for severity in [Severity::Error, Severity::Warning, Severity::Info] {
        println!("{}:", severity.label());
        for code in Code::ALL.iter().filter(|c| c.severity() == severity) {
            println!("  {:>3}  {:<28} {}", code.number(), format!("{:?}", code), code.summary());
        }
        println!();
    }
}
