use clap::{CommandFactory, Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Remedial action optimisation", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Optimise the built-in twelve-node case
    Demo {
        /// RAO parameters (TOML); defaults apply when omitted
        #[arg(long, value_hint = ValueHint::FilePath)]
        params: Option<PathBuf>,
        /// Output format for the result
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        /// Worker threads for contingencies and candidates: a count or "auto"
        /// (one per CPU). Overrides the `multithreading` section.
        #[arg(long)]
        workers: Option<String>,
    },
    /// Print the default RAO parameters as TOML
    Params,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Perimeter and CNEC tables
    #[default]
    Table,
    /// Full result as JSON
    Json,
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}
