mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::analyze::{AutoArgs, ExportArgs, ImportanceArgs, PriorityArgs};

/// ROI-change attribution for loan portfolios
#[derive(Parser)]
#[command(
    name = "roia",
    version,
    about = "Attribute period-over-period portfolio yield change to loan segments",
    long_about = "Analyzes the change in weighted portfolio yield (ROI) between two periods \
                  and attributes it to categorical segments such as credit tier, channel, or \
                  score band. Produces a decision tree annotated with yield and distribution \
                  impacts in basis points."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the attribution tree along a fixed factor sequence
    Priority(PriorityArgs),
    /// Build the attribution tree with greedy variance-maximizing splits
    Auto(AutoArgs),
    /// Per-factor importance scores over the full dataset
    Importance(ImportanceArgs),
    /// Flatten an analysis into one row per tree node
    Export(ExportArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Priority(args) => commands::analyze::run_priority(args),
        Commands::Auto(args) => commands::analyze::run_auto(args),
        Commands::Importance(args) => commands::analyze::run_importance(args),
        Commands::Export(args) => commands::analyze::run_export(args),
        Commands::Version => {
            println!("roia {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::render(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
