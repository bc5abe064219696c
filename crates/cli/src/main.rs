use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;
use tracing_subscriber::filter::EnvFilter;

use airspace_shared::*;
use airspace_sim::analyzer::analyze;
use airspace_sim::rules::{GiveWayPolicy, HeadingHoldPolicy};
use airspace_sim::{run_scenario, ControlLoop, HoldPolicy, Policy};
use airspace_validator::{calibrate_inference, check_latency, validate_model_file, ModelContract, OnnxPolicy};

mod compare;

#[derive(Parser)]
#[command(name = "airspace", about = "Conflict resolution control loop CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Preset configurations of the deployed policies.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum Variant {
    /// Single-agent SAC, 4 neighbor slots
    Single,
    /// Multi-agent feed-forward actor, 3 neighbor slots
    Multi,
    /// Multi-agent attention actor, joint call
    Attention,
    /// Waypoint path planning
    Path,
}

impl Variant {
    fn preset(self) -> ControlConfig {
        match self {
            Variant::Single => ControlConfig::single_agent(),
            Variant::Multi => ControlConfig::multi_agent(),
            Variant::Attention => ControlConfig::attention(),
            Variant::Path => ControlConfig::path_planning(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Fly a scenario with one policy in the loop
    Run {
        /// Scenario JSON file
        #[arg(long)]
        scenario: PathBuf,

        #[arg(long, value_enum, default_value_t = Variant::Multi)]
        variant: Variant,

        /// Policy (hold, heading_hold, give_way, or .onnx path)
        #[arg(long, default_value = "hold")]
        policy: String,

        /// Configuration JSON, replaces the variant preset
        #[arg(long)]
        config: Option<PathBuf>,

        /// Build observations in parallel
        #[arg(long)]
        parallel: bool,

        /// Output path for replay JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Fly a scenario once per policy and compare separation
    Compare {
        #[arg(long)]
        scenario: PathBuf,

        #[arg(long, value_enum, default_value_t = Variant::Multi)]
        variant: Variant,

        /// Comma-separated list of policies
        #[arg(long, default_value = "hold,heading_hold,give_way")]
        policies: String,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate an ONNX model against a variant and time its inference
    Validate {
        /// Path to the .onnx model file
        model_path: PathBuf,

        #[arg(long, value_enum, default_value_t = Variant::Multi)]
        variant: Variant,

        /// Agents per tick to calibrate with
        #[arg(long, default_value_t = 20)]
        agents: usize,

        /// Wall-clock budget per control tick, milliseconds
        #[arg(long, default_value_t = 1000)]
        budget_ms: u64,
    },

    /// Print a preset configuration as JSON
    Config {
        #[arg(long, value_enum, default_value_t = Variant::Multi)]
        variant: Variant,

        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Resolve a policy name to a boxed Policy trait object.
///
/// Supported names:
/// - "hold" -> HoldPolicy
/// - "heading_hold" -> HeadingHoldPolicy
/// - "give_way" -> GiveWayPolicy (fixed-slot variants only)
/// - A path ending in ".onnx" -> OnnxPolicy shaped for `config`
pub(crate) fn resolve_policy(name: &str, config: &ControlConfig) -> Result<Box<dyn Policy>, String> {
    match name {
        "hold" => Ok(Box::new(HoldPolicy)),
        "heading_hold" => Ok(Box::new(HeadingHoldPolicy::new(config.decoder.d_heading_deg))),
        "give_way" => match config.variant {
            VariantConfig::FixedSlot(slots) => Ok(Box::new(GiveWayPolicy::new(slots, config.decoder.d_heading_deg))),
            other => Err(format!("give_way needs a fixed-slot variant, not {}", other.name())),
        },
        path if path.ends_with(".onnx") => OnnxPolicy::load(Path::new(path), ModelContract::for_config(config))
            .map(|p| Box::new(p) as Box<dyn Policy>)
            .map_err(|e| format!("failed to load {path}: {e}")),
        other => Err(format!(
            "Unknown policy '{other}'. Valid options: hold, heading_hold, give_way, or a .onnx file path."
        )),
    }
}

/// Why a built-in policy cannot fly under `config`, if it cannot.
pub(crate) fn policy_unsupported(name: &str, config: &ControlConfig) -> Option<String> {
    match (name, &config.variant) {
        ("give_way", VariantConfig::FixedSlot(_)) => None,
        ("give_way", other) => Some(format!("give_way needs a fixed-slot variant, not {}", other.name())),
        _ => None,
    }
}

pub(crate) fn load_config(variant: Variant, path: Option<&Path>) -> Result<ControlConfig, String> {
    match path {
        Some(path) => ControlConfig::from_file(path).map_err(|e| format!("failed to load {}: {e}", path.display())),
        None => Ok(variant.preset()),
    }
}

pub(crate) fn load_scenario(path: &Path) -> Result<Scenario, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| format!("failed to parse {}: {e}", path.display()))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            scenario,
            variant,
            policy,
            config,
            parallel,
            output,
        } => cmd_run(&scenario, variant, &policy, config.as_deref(), parallel, output),

        Commands::Compare {
            scenario,
            variant,
            policies,
            config,
        } => compare::cmd_compare(&scenario, variant, &policies, config.as_deref()),

        Commands::Validate {
            model_path,
            variant,
            agents,
            budget_ms,
        } => cmd_validate(&model_path, variant, agents, budget_ms),

        Commands::Config { variant, output } => cmd_config(variant, output),
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

fn cmd_run(
    scenario_path: &Path,
    variant: Variant,
    policy_name: &str,
    config_path: Option<&Path>,
    parallel: bool,
    output: Option<PathBuf>,
) -> Result<(), String> {
    let mut config = load_config(variant, config_path)?;
    config.parallel_observations |= parallel;
    let scenario = load_scenario(scenario_path)?;
    let policy = resolve_policy(policy_name, &config)?;

    println!(
        "Running scenario '{}': {} aircraft, {:.0}s, {} variant, policy {}",
        scenario.name,
        scenario.aircraft.len() + scenario.spawns.len(),
        scenario.duration,
        config.variant.name(),
        policy.name()
    );

    let mut control = ControlLoop::new(config, policy).map_err(|e| e.to_string())?;
    let replay = run_scenario(&scenario, &mut control).map_err(|e| e.to_string())?;
    let metrics = analyze(&replay);

    println!();
    println!("=== Scenario Result ===");
    println!("Control ticks:    {}", replay.frames.len());
    println!("Commands issued:  {}", metrics.commands);
    match (&metrics.min_separation_m, &metrics.closest_pair) {
        (Some(d), Some((a, b))) => println!("Min separation:   {:.0} m ({a} / {b})", d),
        _ => println!("Min separation:   n/a"),
    }
    println!("Intrusion frames: {}", metrics.intrusion_frames);
    for (a, b) in &metrics.intrusion_pairs {
        println!("  {a} / {b}");
    }

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&replay).map_err(|e| format!("Failed to serialize replay: {e}"))?;
        std::fs::write(&path, json).map_err(|e| format!("Failed to write replay: {e}"))?;
        println!("\nReplay written to {}", path.display());
    }
    Ok(())
}

fn cmd_validate(model_path: &Path, variant: Variant, agents: usize, budget_ms: u64) -> Result<(), String> {
    let config = variant.preset();
    let contract = ModelContract::for_config(&config);

    let report = validate_model_file(model_path, &contract).map_err(|e| e.to_string())?;
    println!("Model:   {} ({} bytes)", model_path.display(), report.file_size_bytes);
    println!("Input:   {:?}", report.input_shape);
    println!("Output:  {:?}", report.output_shape);

    let mut policy = OnnxPolicy::load(model_path, contract).map_err(|e| e.to_string())?;
    let mean = calibrate_inference(&mut policy, &contract, agents).map_err(|e| e.to_string())?;
    let per_tick = check_latency(mean, &contract, agents, Duration::from_millis(budget_ms)).map_err(|e| e.to_string())?;
    println!("Latency: {:.3} ms per call, {:.3} ms per tick of {agents} agents", as_ms(mean), as_ms(per_tick));
    println!("OK");
    Ok(())
}

fn cmd_config(variant: Variant, output: Option<PathBuf>) -> Result<(), String> {
    let config = variant.preset();
    match output {
        Some(path) => {
            config.to_file(&path).map_err(|e| e.to_string())?;
            println!("Configuration written to {}", path.display());
        }
        None => {
            let json = serde_json::to_string_pretty(&config).map_err(|e| e.to_string())?;
            println!("{json}");
        }
    }
    Ok(())
}

fn as_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
