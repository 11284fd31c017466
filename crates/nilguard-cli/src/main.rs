use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use nilguard_analysis::ignore::IgnoreMatcher;
use nilguard_analysis::{AnalysisOptions, Analyzer};
use nilguard_diagnostics::human;
use nilguard_ir::ir::Program;

#[derive(Parser)]
#[command(name = "nilguard")]
#[command(about = "Whole-program nil safety analyzer for bridge-produced SSA")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze an SSA program file
    Check {
        /// Path to the JSON program produced by the SSA front-end
        input: PathBuf,
        /// Output format: human, json
        #[arg(long, default_value = "human")]
        format: String,
        /// Regex over file paths; procedures defined in matching files
        /// are skipped
        #[arg(long)]
        ignore_pattern: Option<String>,
    },
}

fn main() -> ExitCode {
    // Log to stderr so stdout stays clean for machine output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Check {
            input,
            format,
            ignore_pattern,
        } => run_check(&input, &format, ignore_pattern.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run_check(input: &PathBuf, format: &str, ignore_pattern: Option<&str>) -> anyhow::Result<()> {
    let data = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let program: Program = serde_json::from_str(&data)
        .with_context(|| format!("parsing {}", input.display()))?;

    let options = match ignore_pattern {
        Some(pattern) => AnalysisOptions {
            ignore: IgnoreMatcher::new(pattern)
                .with_context(|| format!("invalid ignore pattern `{pattern}`"))?,
        },
        None => AnalysisOptions::default(),
    };

    let diagnostics = Analyzer::analyze_with_options(&program, &options);
    tracing::info!(count = diagnostics.len(), "analysis finished");

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&diagnostics)?),
        "human" => print!("{}", human::render(&diagnostics)),
        other => anyhow::bail!("unknown format `{other}` (expected human or json)"),
    }
    Ok(())
}
