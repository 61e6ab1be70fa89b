use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rao_algo::{OptimizationResult, PerimeterResult, Rao, RaoParameters};
use rao_cli::case::{twelve_node_crac, twelve_node_network};
use rao_cli::OutputFormat;
use tabwriter::TabWriter;
use tracing::info;

use super::util::{fmt_margin, parse_workers};

pub fn handle(params_path: Option<&Path>, format: OutputFormat, workers: Option<&str>) -> Result<()> {
    let mut params = match params_path {
        Some(path) => RaoParameters::from_toml_file(path)
            .with_context(|| format!("loading RAO parameters from {}", path.display()))?,
        None => RaoParameters::default(),
    };
    if let Some(spec) = workers {
        let count = parse_workers(spec)?;
        params.multithreading.contingency_workers = count;
        params.multithreading.candidate_workers = count;
    }

    let network = Arc::new(twelve_node_network().context("building the twelve-node network")?);
    let crac = twelve_node_crac(&network).context("building the twelve-node CRAC")?;
    info!(
        buses = network.buses().len(),
        branches = network.branches().count(),
        "twelve-node case ready"
    );

    let result = Rao::new(params)?.run(network, &crac)?;
    match format {
        OutputFormat::Table => print_tables(&result),
        OutputFormat::Json => print_json(&result),
    }
}

fn perimeter_status(perimeter: &PerimeterResult) -> &'static str {
    if perimeter.failed() {
        "failed"
    } else if perimeter.is_secure() {
        "secure"
    } else {
        "unsecure"
    }
}

fn perimeter_actions(perimeter: &PerimeterResult) -> String {
    let actions: Vec<String> = perimeter
        .forced_network_actions
        .iter()
        .map(|id| format!("{id} (forced)"))
        .chain(perimeter.activated_network_actions.iter().cloned())
        .chain(perimeter.pst_taps.iter().map(|(id, tap)| format!("{id}={tap}")))
        .collect();
    if actions.is_empty() {
        "-".to_string()
    } else {
        actions.join(", ")
    }
}

fn print_tables(result: &OptimizationResult) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout()).padding(2);
    writeln!(writer, "PERIMETER\tSTATUS\tINITIAL MARGIN\tFINAL MARGIN\tORACLE CALLS\tACTIONS")?;
    for perimeter in result.perimeters() {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            perimeter.label(),
            perimeter_status(perimeter),
            fmt_margin(perimeter.initial_objective.as_ref().map(|o| o.min_margin)),
            fmt_margin(perimeter.min_margin()),
            perimeter.stats.oracle_calls,
            perimeter_actions(perimeter),
        )?;
    }
    writeln!(writer)?;
    writeln!(writer, "CNEC\tPERIMETER\tFLOW\tMARGIN\tUNIT")?;
    for perimeter in result.perimeters() {
        for cnec in &perimeter.cnec_results {
            writeln!(
                writer,
                "{}\t{}\t{:.2}\t{}\t{}",
                cnec.cnec_id,
                perimeter.label(),
                cnec.flow,
                fmt_margin(Some(cnec.margin)),
                cnec.unit.symbol(),
            )?;
        }
    }
    writer.flush()?;
    println!();
    println!("{}", result.summary());
    Ok(())
}

fn print_json(result: &OptimizationResult) -> Result<()> {
    serde_json::to_writer_pretty(io::stdout(), result)
        .map_err(|err| anyhow::anyhow!("serializing RAO result to JSON: {err}"))?;
    println!();
    Ok(())
}
