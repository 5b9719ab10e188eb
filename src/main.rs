//! Treg Simulator - Entry point
//!
//! Runs one experiment and prints the equilibrium / dynamics comparison.
//!
//! CLI Usage:
//!   cargo run                                   # Default parameters
//!   cargo run -- --config params.json           # Parameters from a JSON file
//!   cargo run -- --sampling 1D --model full     # Override regime and model
//!   cargo run -- --seed 3 --t-end 500 --export  # Write CSV + JSON to exports/

use std::time::Instant;

use anyhow::{anyhow, bail, Result};
use treg_simulator::{
    config::{ModelKind, SimulationParameters},
    experiment::{Experiment, ExperimentReport},
    export::{export_report_json, CsvTrajectoryExporter},
    SamplingMode,
};

/// Command-line overrides on top of the parameter file
#[derive(Debug, Default)]
struct CliArgs {
    config: Option<String>,
    seed: Option<u64>,
    sampling: Option<SamplingMode>,
    model: Option<ModelKind>,
    t_end: Option<f64>,
    export: bool,
}

fn next_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> Result<&'a str> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} expects a value", flag))
}

fn print_help() {
    println!("Treg Simulator");
    println!();
    println!("Usage: treg-simulator [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config PATH   Parameter file (default: params.json if present)");
    println!("  -s, --seed N        RNG seed");
    println!("  --sampling MODE     Binary | 1D | Multidimensional | Circulant | Fixed_degree");
    println!("  --model MODEL       reduced | full");
    println!("  --t-end T           End of the integration span");
    println!("  --export, -e        Write trajectory CSV and report JSON to exports/");
    println!("  --help, -h          Show this help");
}

/// Parse command line arguments
fn parse_args() -> Result<Option<CliArgs>> {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-c" | "--config" => cli.config = Some(next_value(&args, &mut i, "--config")?.to_string()),
            "-s" | "--seed" => cli.seed = Some(next_value(&args, &mut i, "--seed")?.parse()?),
            "--sampling" => cli.sampling = Some(next_value(&args, &mut i, "--sampling")?.parse()?),
            "--model" => {
                cli.model = Some(match next_value(&args, &mut i, "--model")? {
                    "reduced" | "simple" => ModelKind::Reduced,
                    "full" => ModelKind::Full,
                    other => bail!("unknown model '{}'", other),
                })
            }
            "--t-end" => cli.t_end = Some(next_value(&args, &mut i, "--t-end")?.parse()?),
            "-e" | "--export" => cli.export = true,
            "-h" | "--help" => {
                print_help();
                return Ok(None);
            }
            other => bail!("unknown argument '{}' (try --help)", other),
        }
        i += 1;
    }
    Ok(Some(cli))
}

fn load_parameters(cli: &CliArgs) -> Result<SimulationParameters> {
    let mut params = match &cli.config {
        Some(path) => SimulationParameters::load(path)?,
        None => SimulationParameters::load_or_default("params.json")?,
    };
    if let Some(seed) = cli.seed {
        params.seed = seed;
    }
    if let Some(sampling) = cli.sampling {
        params.affinity.sampling = sampling;
    }
    if let Some(model) = cli.model {
        params.dynamics.model = model;
    }
    if let Some(t_end) = cli.t_end {
        params.dynamics.t_end = t_end;
    }
    params.validate()?;
    Ok(params)
}

fn print_report(report: &ExperimentReport) {
    println!("=== Treg Simulator ===\n");
    println!("Sampling: {}   Model: {:?}   Seed: {}", report.sampling, report.model, report.seed);
    println!(
        "T-cells: {}   Tregs: {}   Sites: {}",
        report.num_tcell, report.num_treg, report.num_sites
    );

    println!("\n--- Equilibrium ---");
    println!(
        "Status: {:?} after {} iterations, objective {:.6e}",
        report.equilibrium.status, report.equilibrium.iterations, report.equilibrium.objective
    );
    println!("Tregs in support: {}/{}", report.equilibrium_treg_support, report.num_treg);

    println!("\n--- Dynamics ---");
    if let Some(t) = report.trajectory.final_time() {
        println!("Integrated to t = {} ({} samples)", t, report.trajectory.len());
    }
    println!("Surviving T-cells: {}/{}", report.surviving_tcell, report.num_tcell);
    println!("Surviving Tregs:   {}/{}", report.surviving_treg, report.num_treg);
    println!("max |Treg(t_end) - Treg*| = {:.3e}", report.treg_deviation);

    println!("\n{:>6} {:>14} {:>14}", "Treg", "Treg*", "Treg(t_end)");
    for (a, (star, end)) in report
        .equilibrium
        .treg
        .iter()
        .zip(report.final_treg.iter())
        .enumerate()
    {
        println!("{:>6} {:>14.6e} {:>14.6e}", a, star, end);
    }
}

fn export(report: &ExperimentReport) -> Result<()> {
    let mut csv = CsvTrajectoryExporter::new(report.num_tcell, report.num_treg)?;
    csv.record_trajectory(&report.trajectory)?;
    let csv_path = csv.finish()?;
    let json_path = export_report_json(report)?;
    println!("\nExported {} and {}", csv_path.display(), json_path.display());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = match parse_args()? {
        Some(cli) => cli,
        None => return Ok(()),
    };

    log::info!("Treg Simulator starting...");
    let params = load_parameters(&cli)?;

    let start = Instant::now();
    let report = Experiment::new(params).run()?;
    log::info!("Experiment completed in {:.2?}", start.elapsed());

    print_report(&report);

    if cli.export {
        export(&report)?;
    }
    Ok(())
}
