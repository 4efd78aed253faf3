//! Command-line orchestrator for CFE matching runs
//!
//! Wires the pipeline together per configured run: consumer subsystem
//! construction -> brownfield solve -> capacity freeze -> annual or hourly
//! matching per target score -> persisted artifacts (trace CSV, solved
//! network documents). A failing run aborts only itself; sibling runs
//! continue.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use cfe_core::{BusId, Network};
use cfe_io::{export_network, import_network, trace_file_name, write_trace_csv};
use cfe_opt::{
    apply_annual_matching, attach_consumer_systems, freeze_to_optimal, procurement_summary,
    run_cfe_matching, DispatchModel, MatchingConfig, SolverConfig, SubsystemSpec,
};
use cfe_scenarios::{load_run_set, resolve_runs, MatchingMode, ResolvedRun};

#[derive(Parser)]
#[command(name = "cfe", about = "24/7 carbon-free energy matching runs", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a run-set file without touching any network
    Validate {
        /// Path to the run-set file (YAML or JSON)
        #[arg(long)]
        config: PathBuf,
    },
    /// Execute every run in a run-set against a network document
    Run {
        /// Path to the run-set file (YAML or JSON)
        #[arg(long)]
        config: PathBuf,
        /// Network document; defaults to the run set's `network_file`
        #[arg(long)]
        network: Option<PathBuf>,
        /// Output directory for traces and solved networks
        #[arg(long, default_value = "runs")]
        out: PathBuf,
    },
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("installing tracing subscriber")?;

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate { config } => validate(&config),
        Commands::Run {
            config,
            network,
            out,
        } => run_all(&config, network.as_deref(), &out),
    }
}

fn validate(config: &Path) -> Result<()> {
    let set = load_run_set(config)?;
    let runs = resolve_runs(&set)?;
    for run in &runs {
        info!(
            run = %run.name,
            buses = ?run.buses_with_ci_load,
            mode = ?run.mode,
            scores = ?run.cfe_scores,
            "run ok"
        );
    }
    println!("{}: {} runs valid", config.display(), runs.len());
    Ok(())
}

fn run_all(config: &Path, network_path: Option<&Path>, out: &Path) -> Result<()> {
    let set = load_run_set(config)?;
    let runs = resolve_runs(&set)?;

    let network_path = network_path
        .map(PathBuf::from)
        .or_else(|| set.network_file.as_ref().map(PathBuf::from))
        .ok_or_else(|| anyhow!("no network document given (--network or network_file)"))?;
    let template = import_network(&network_path)?;
    info!(network = %network_path.display(), "loaded template network: {}", template.stats());

    let mut failures = 0usize;
    for run in &runs {
        info!(run = %run.name, "starting run");
        if let Err(err) = execute_run(run, &template, out) {
            // one run failing must not take its siblings down
            error!(run = %run.name, error = %err, "run failed");
            failures += 1;
        }
    }
    if failures > 0 {
        bail!("{} of {} runs failed", failures, runs.len());
    }
    println!("{} runs completed under {}", runs.len(), out.display());
    Ok(())
}

fn execute_run(run: &ResolvedRun, template: &Network, out: &Path) -> Result<()> {
    let mut network = template.clone();
    let run_dir = out.join(&run.name);

    let parent_buses: Vec<BusId> = run
        .buses_with_ci_load
        .iter()
        .map(|name| {
            network
                .bus_by_name(name)
                .map(|b| b.id)
                .ok_or_else(|| anyhow!("unknown bus '{}' in run '{}'", name, run.name))
        })
        .collect::<Result<_>>()?;

    // Consumer systems enter the brownfield at zero capacity and stay
    // frozen there; the freeze after the brownfield solve is what opens
    // them for expansion (PPA additionality).
    let ci_buses = attach_consumer_systems(
        &mut network,
        &parent_buses,
        &SubsystemSpec {
            load_fraction: run.ci_load_fraction,
            palette: run.technology_palette.clone(),
            extendable: false,
        },
    )?;

    let mut model = DispatchModel::new();
    let solver = SolverConfig::default();
    let solution = model
        .solve(&mut network, &solver)
        .context("brownfield solve")?;
    info!(run = %run.name, "brownfield: {}", solution.summary());
    export_network(
        &network,
        &run_dir.join("solved_networks").join("brownfield.json"),
    )?;

    freeze_to_optimal(&mut network);

    for &score in &run.cfe_scores {
        let mut scored_network = network.clone();
        let mut scored_model = model.clone();
        match run.mode {
            MatchingMode::Hourly => {
                let mut config = MatchingConfig::new(score, run.max_excess_ratio);
                config.tolerance = run.tolerance;
                config.max_iterations = run.max_iterations;
                let outcome =
                    run_cfe_matching(&mut scored_network, &mut scored_model, &ci_buses, &config)?;
                info!(
                    run = %run.name,
                    score,
                    iterations = outcome.iterations,
                    converged = outcome.converged,
                    "hourly matching finished"
                );
                write_trace_csv(
                    &run_dir
                        .join("grid_supply_cfe_iterations")
                        .join(trace_file_name(score)),
                    &outcome.trace,
                )?;
                export_network(
                    &scored_network,
                    &run_dir
                        .join("solved_networks")
                        .join(format!("hourly_matching_{}", doc_name(score))),
                )?;
            }
            MatchingMode::Annual => {
                apply_annual_matching(
                    &scored_network,
                    &mut scored_model,
                    &ci_buses,
                    score,
                    run.max_excess_ratio,
                )?;
                let solution = scored_model
                    .solve(&mut scored_network, &solver)
                    .context("annual matching solve")?;
                info!(run = %run.name, score, "annual matching: {}", solution.summary());
                export_network(
                    &scored_network,
                    &run_dir
                        .join("solved_networks")
                        .join(format!("annual_matching_{}", doc_name(score))),
                )?;
            }
        }
        let summary = procurement_summary(&scored_network, &ci_buses);
        info!(run = %run.name, score, "{}", summary.summary());
    }
    Ok(())
}

fn doc_name(score: f64) -> String {
    format!("cfe{}.json", (score * 100.0).round() as i64)
}
