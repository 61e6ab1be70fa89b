use anyhow::Context;
use clap::Parser;
use rao_cli::{Cli, Commands};
use tracing_subscriber::FmtSubscriber;

mod commands;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the result, logs go to stderr
    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    match &cli.command {
        Commands::Demo {
            params,
            format,
            workers,
        } => commands::demo::handle(params.as_deref(), *format, workers.as_deref()),
        Commands::Params => commands::params::handle(),
    }
}
