//! DER dispatch simulator entry point: CLI wiring and config-driven run
//! construction.

use std::path::Path;
use std::process;
#[cfg(feature = "realtime")]
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use der_dispatch_sim::config::ScenarioFile;
use der_dispatch_sim::io::export::{export_csv, export_snapshot};
use der_dispatch_sim::sim::Simulation;
use der_dispatch_sim::sim::kpi::KpiReport;
#[cfg(feature = "realtime")]
use der_dispatch_sim::sim::{PacedSimulation, TickLogger};

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    seed_override: Option<u64>,
    telemetry_out: Option<String>,
    snapshot_out: Option<String>,
    #[cfg(feature = "realtime")]
    realtime: bool,
    #[cfg(feature = "realtime")]
    speed: f32,
}

fn print_help() {
    eprintln!("der-dispatch-sim: DER portfolio dispatch simulator");
    eprintln!();
    eprintln!("Usage: der-dispatch-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!(
        "  --preset <name>          Use a built-in preset ({})",
        ScenarioFile::PRESETS.join(", ")
    );
    eprintln!("  --seed <u64>             Override random seed");
    eprintln!("  --telemetry-out <path>   Export per-tick results to CSV");
    eprintln!("  --snapshot-out <path>    Write the final state as JSON");
    #[cfg(feature = "realtime")]
    {
        eprintln!("  --realtime               Pace ticks on the wall clock");
        eprintln!("  --speed <f32>            Ticks per second when paced (0.5-10, default 1)");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
    eprintln!("Log verbosity follows RUST_LOG (default: info).");
}

fn next_value<'a>(args: &'a [String], i: &mut usize, flag: &str, what: &str) -> &'a str {
    *i += 1;
    match args.get(*i) {
        Some(v) => v,
        None => {
            eprintln!("error: {flag} requires a {what} argument");
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
        seed_override: None,
        telemetry_out: None,
        snapshot_out: None,
        #[cfg(feature = "realtime")]
        realtime: false,
        #[cfg(feature = "realtime")]
        speed: 1.0,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => {
                cli.scenario_path = Some(next_value(&args, &mut i, "--scenario", "path").into());
            }
            "--preset" => {
                cli.preset = Some(next_value(&args, &mut i, "--preset", "name").into());
            }
            "--seed" => {
                let v = next_value(&args, &mut i, "--seed", "u64");
                if let Ok(s) = v.parse::<u64>() {
                    cli.seed_override = Some(s);
                } else {
                    eprintln!("error: --seed value \"{v}\" is not a valid u64");
                    process::exit(1);
                }
            }
            "--telemetry-out" => {
                cli.telemetry_out =
                    Some(next_value(&args, &mut i, "--telemetry-out", "path").into());
            }
            "--snapshot-out" => {
                cli.snapshot_out = Some(next_value(&args, &mut i, "--snapshot-out", "path").into());
            }
            #[cfg(feature = "realtime")]
            "--realtime" => {
                cli.realtime = true;
            }
            #[cfg(feature = "realtime")]
            "--speed" => {
                let v = next_value(&args, &mut i, "--speed", "f32");
                match v.parse::<f32>() {
                    Ok(s) if s.is_finite() => cli.speed = s,
                    _ => {
                        eprintln!("error: --speed value \"{v}\" is not a valid number");
                        process::exit(1);
                    }
                }
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs the simulation on the wall clock until it completes.
#[cfg(feature = "realtime")]
fn run_paced(mut sim: Simulation, speed: f32) -> Simulation {
    sim.add_observer(Arc::new(TickLogger));
    sim.set_speed(speed);
    let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("error: failed to create tokio runtime: {e}");
        process::exit(1);
    });
    rt.block_on(async move {
        let mut paced = PacedSimulation::new(sim);
        if let Err(e) = paced.start().await {
            eprintln!("error: {e}");
            process::exit(1);
        }
        if let Err(e) = paced.wait().await {
            eprintln!("error: {e}");
            process::exit(1);
        }
        let shared = paced.simulation();
        drop(paced);
        match Arc::try_unwrap(shared) {
            Ok(mutex) => mutex.into_inner(),
            Err(_) => {
                eprintln!("error: simulation still shared after completion");
                process::exit(1);
            }
        }
    })
}

fn main() {
    init_tracing();
    let cli = parse_args();

    // Load config: --scenario takes priority, then --preset, then baseline default
    let mut file = if let Some(ref path) = cli.scenario_path {
        match ScenarioFile::from_toml_file(Path::new(path)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else if let Some(ref name) = cli.preset {
        match ScenarioFile::from_preset(name) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    } else {
        ScenarioFile::baseline()
    };

    if let Some(seed) = cli.seed_override {
        file.simulation.seed = seed;
    }

    let scenario = match file.build() {
        Ok(s) => s,
        Err(errors) => {
            for e in &errors {
                eprintln!("{e}");
            }
            process::exit(1);
        }
    };
    let strategy = match file.strategy_config() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    let mut sim = Simulation::new(scenario, strategy);

    #[cfg(feature = "realtime")]
    let realtime = cli.realtime;
    #[cfg(not(feature = "realtime"))]
    let realtime = false;

    if realtime {
        #[cfg(feature = "realtime")]
        {
            sim = run_paced(sim, cli.speed);
        }
    } else {
        if let Err(e) = sim.run_to_completion() {
            eprintln!("error: {e}");
            process::exit(1);
        }
        for r in &sim.state().history {
            println!("{r}");
        }
    }

    let kpi = KpiReport::from_results(&sim.state().history);
    println!("\n{kpi}");

    if let Some(ref path) = cli.telemetry_out {
        if let Err(e) = export_csv(&sim.state().history, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Telemetry written to {path}");
    }

    if let Some(ref path) = cli.snapshot_out {
        if let Err(e) = export_snapshot(&sim.snapshot(), Path::new(path)) {
            eprintln!("error: failed to write snapshot: {e}");
            process::exit(1);
        }
        eprintln!("Snapshot written to {path}");
    }
}
