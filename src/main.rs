//! evonet - CLI Entry Point
//!
//! Build, run and inspect controller networks.

use clap::{Parser, Subcommand};
use evonet::checkpoint::ParameterSnapshot;
use evonet::stats::RunHistory;
use evonet::config::LoggingConfig;
use evonet::{benchmark, Config, ExecutionMode, Network, SensorInputs};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Parser)]
#[command(name = "evonet")]
#[command(version)]
#[command(about = "Graph-wired heterogeneous neural networks for evolutionary robotics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Step a network with constant sensor values
    Run {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Number of ticks to run
        #[arg(short, long, default_value = "1000")]
        ticks: u64,

        /// Sensor values as tag=v1,v2,... (repeatable)
        #[arg(long = "sensor", value_parser = parse_sensor)]
        sensors: Vec<(String, Vec<f64>)>,

        /// Parameters to load before running
        #[arg(short, long)]
        parameters: Option<PathBuf>,

        /// Output directory for the trace and final parameters
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Random seed for reproducibility
        #[arg(long)]
        seed: Option<u64>,

        /// Evaluate the layers of a level in parallel
        #[arg(long)]
        parallel: bool,

        /// Quiet mode (minimal output)
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print the flat parameter vectors as JSON
    Params {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,

        /// Parameter file to read instead of a fresh initialisation
        #[arg(short, long)]
        parameters: Option<PathBuf>,
    },

    /// Print execution levels and stale connections
    Topology {
        /// Configuration file (YAML)
        #[arg(short, long, default_value = "config.yaml")]
        config: PathBuf,
    },

    /// Run performance benchmark
    Benchmark {
        /// Number of ticks
        #[arg(short, long, default_value = "10000")]
        ticks: u64,

        /// Evaluate the layers of a level in parallel
        #[arg(long)]
        parallel: bool,
    },

    /// Generate default configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "config.yaml")]
        output: PathBuf,
    },

    /// Analyze a parameter file
    Analyze {
        /// Parameter file
        parameters: PathBuf,
    },
}

impl Commands {
    fn config_path(&self) -> Option<&Path> {
        match self {
            Self::Run { config, .. } | Self::Params { config, .. } | Self::Topology { config } => {
                Some(config.as_path())
            }
            _ => None,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; an unreadable config is reported once the logger runs
    let log_level = cli
        .command
        .config_path()
        .filter(|path| path.exists())
        .and_then(|path| Config::from_file(path).ok())
        .map(|config| config.logging.log_level)
        .unwrap_or_else(|| LoggingConfig::default().log_level);
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match cli.command {
        Commands::Run {
            config,
            ticks,
            sensors,
            parameters,
            output,
            seed,
            parallel,
            quiet,
        } => run_network(RunOptions {
            config_path: config,
            ticks,
            sensors,
            parameters,
            output,
            seed,
            parallel,
            quiet,
        }),

        Commands::Params { config, parameters } => print_parameters(config, parameters),

        Commands::Topology { config } => print_topology(config),

        Commands::Benchmark { ticks, parallel } => run_benchmark(ticks, parallel),

        Commands::Init { output } => generate_config(output),

        Commands::Analyze { parameters } => analyze_parameters(parameters),
    }
}

/// `tag=v1,v2,...`
fn parse_sensor(arg: &str) -> Result<(String, Vec<f64>), String> {
    let (tag, values) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected tag=v1,v2,... but got {}", arg))?;
    let values = values
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("{}: {}", v, e)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((tag.to_string(), values))
}

fn load_config(config_path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if config_path.exists() {
        log::info!("loading config from {:?}", config_path);
        Ok(Config::from_file(config_path)?)
    } else {
        log::info!("{:?} not found, using default configuration", config_path);
        Ok(Config::default())
    }
}

struct RunOptions {
    config_path: PathBuf,
    ticks: u64,
    sensors: Vec<(String, Vec<f64>)>,
    parameters: Option<PathBuf>,
    output: PathBuf,
    seed: Option<u64>,
    parallel: bool,
    quiet: bool,
}

fn run_network(options: RunOptions) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(&options.config_path)?;
    if options.seed.is_some() {
        config.network.seed = options.seed;
    }
    if options.parallel {
        config.network.execution = ExecutionMode::Parallel;
    }

    std::fs::create_dir_all(&options.output)?;

    let mut network = Network::from_config(&config.network)?;
    if let Some(path) = &options.parameters {
        network.load_parameters_from_file(path)?;
    }

    let inputs: SensorInputs = options.sensors.into_iter().collect();

    println!("Starting run");
    println!("  Layers: {}", network.number_of_layers());
    println!("  Levels: {}", network.levels().len());
    println!("  Parameters: {}", network.parameter_count());
    println!("  Ticks: {}", options.ticks);
    println!();

    let mut history = RunHistory::new(config.logging.trace_interval);
    let start = Instant::now();

    for _ in 0..options.ticks {
        let outputs = network.step(&inputs)?;
        if history.record(network.tick(), &outputs) && !options.quiet {
            if let Some(record) = history.latest() {
                println!("{}", record.summary());
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("=== Run Complete ===");
    println!("Time: {:.2}s", elapsed.as_secs_f64());
    println!("Ticks: {}", network.tick());
    println!(
        "Speed: {:.1} ticks/s",
        network.tick() as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );

    let parameters_path = options.output.join("parameters_final.bin");
    network.save_parameters_to_file(&parameters_path)?;
    println!("Final parameters: {:?}", parameters_path);

    let trace_path = options.output.join("trace.json");
    history.save(&trace_path.to_string_lossy())?;
    println!("Trace: {:?}", trace_path);

    Ok(())
}

fn print_parameters(config_path: PathBuf, parameters: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&config_path)?;
    let mut network = Network::from_config(&config.network)?;
    if let Some(path) = parameters {
        network.load_parameters_from_file(path)?;
    }

    let vectors: Vec<serde_json::Value> = network
        .return_parameters_as_vector()
        .into_iter()
        .map(|(name, values)| serde_json::json!({ "layer": name, "parameters": values }))
        .collect();
    println!("{}", serde_json::to_string_pretty(&vectors)?);
    Ok(())
}

fn print_topology(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&config_path)?;
    let network = Network::from_config(&config.network)?;

    println!("=== Topology ===");
    println!("Inputs: {}", network.input_layers().join(", "));
    println!("Terminals: {}", network.terminal_layers().join(", "));
    println!();
    for (level, names) in network.levels().iter().enumerate() {
        println!("Level {}: {}", level, names.join(", "));
    }

    let stale = network.stale_connections();
    if !stale.is_empty() {
        println!();
        println!("Stale connections (read the previous tick):");
        for connection in stale {
            println!("  {}", connection);
        }
    }
    Ok(())
}

fn run_benchmark(ticks: u64, parallel: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mode = if parallel {
        ExecutionMode::Parallel
    } else {
        ExecutionMode::Sequential
    };
    println!("=== evonet Benchmark ===");
    println!("Ticks: {}", ticks);
    println!();

    let result = benchmark(ticks, mode)?;
    println!("{}", result);

    Ok(())
}

fn generate_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save(&output)?;
    println!("Configuration saved to: {:?}", output);
    Ok(())
}

fn analyze_parameters(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Parameter File Analysis ===");
    println!("File: {:?}", path);
    println!();

    let snapshot = ParameterSnapshot::load(&path)?;

    println!("Version: {}", snapshot.version);
    println!("Tick: {}", snapshot.tick);
    println!("Time interval: {}", snapshot.time_interval);
    println!("Layers: {}", snapshot.layers.len());
    println!();

    for layer in &snapshot.layers {
        let params = layer.return_parameters();
        let (min, max) = params
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let mean = params.iter().sum::<f64>() / params.len().max(1) as f64;
        println!(
            "{:<16} {:<8} {:>3} -> {:<3} params: {:<6} range: [{:.3}, {:.3}] mean: {:.3}",
            layer.name(),
            layer.kind().to_string(),
            layer.input_dim(),
            layer.output_dim(),
            params.len(),
            min,
            max,
            mean
        );
    }

    println!();
    println!(
        "Parameters: {} total, file size {:.2} KB",
        snapshot.parameter_count(),
        snapshot.size_bytes() as f64 / 1_000.0
    );

    Ok(())
}
