use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vection_blend::blend::{sample_curve, BlendRegion};
use vection_blend::output::{
    write_curve_points_csv, write_telemetry_csv, write_velocity_points_csv,
};
use vection_blend::velocity::sample_velocity;
use vection_blend::{
    create_timestamped_output_dir, run_batch, simulate_trial, AnalysisConfig, BlendMode,
    ExperimentPattern, SimConfig, TrialDescriptor, VelocityParameters,
};

/// Blend-curve and velocity-model analysis for vection trials
#[derive(Parser, Debug)]
#[command(name = "vection-analyze")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyse every trial file in a directory
    Batch {
        /// Directory holding the recorded CSV files
        #[arg(short, long)]
        input: PathBuf,

        /// Root under which a timestamped run directory is created
        #[arg(short, long, default_value = "output-vection")]
        output: PathBuf,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Sample the blend curve for one control value
    Curve {
        /// Control value k in [0, 2]
        #[arg(short, long, allow_hyphen_values = true)]
        ratio: f64,

        #[arg(short, long, default_value_t = 101)]
        samples: usize,

        /// CSV destination (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Sample the velocity model for a parameter set
    Velocity {
        /// Comma-separated V0,A1,phi1,A2,phi2
        #[arg(short, long, value_parser = parse_params, allow_hyphen_values = true)]
        params: VelocityParameters,

        #[arg(long, default_value_t = 2.0)]
        periods: f64,

        #[arg(short, long, default_value_t = 1000)]
        samples: usize,

        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Write a synthetic Phase trial converging on the given parameters
    Simulate {
        /// Destination directory
        #[arg(long)]
        out: PathBuf,

        #[arg(long)]
        participant: String,

        #[arg(long, default_value_t = 1)]
        trial: u32,

        #[arg(short, long, value_parser = parse_params, allow_hyphen_values = true)]
        params: VelocityParameters,

        #[arg(long, default_value = "Dynamic")]
        blend_mode: String,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn parse_params(raw: &str) -> Result<VelocityParameters, String> {
    let values: Vec<f64> = raw
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|err| format!("invalid number in `{raw}`: {err}"))?;

    let values: [f64; 5] = values
        .try_into()
        .map_err(|values: Vec<f64>| format!("expected 5 values, got {}", values.len()))?;
    Ok(VelocityParameters::from_array(values))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Batch {
            input,
            output,
            config,
        } => run_batch_command(&input, &output, config.as_deref()),
        Commands::Curve {
            ratio,
            samples,
            out,
        } => run_curve(ratio, samples, out.as_deref()),
        Commands::Velocity {
            params,
            periods,
            samples,
            out,
        } => run_velocity(&params, periods, samples, out.as_deref()),
        Commands::Simulate {
            out,
            participant,
            trial,
            params,
            blend_mode,
            seed,
        } => run_simulate(&out, participant, trial, &params, &blend_mode, seed),
    }
}

fn run_batch_command(input: &Path, output_root: &Path, config: Option<&Path>) -> Result<()> {
    let config = AnalysisConfig::load(config).context("failed to load configuration")?;
    config.validate()?;

    let output_dir = create_timestamped_output_dir(output_root)
        .with_context(|| format!("failed to create run directory under {}", output_root.display()))?;
    let summary = run_batch(&config, input, &output_dir)
        .with_context(|| format!("batch analysis of {} failed", input.display()))?;

    for (participant, exploration) in &summary.participants {
        println!(
            "{participant}: k = {:.3} ({})",
            exploration.function_ratio(),
            exploration.region().label()
        );
    }
    for mode in &summary.speed_equivalence {
        let deviation = mode
            .equivalence
            .deviation_percent
            .map(|percent| format!("{percent:.1}%"))
            .unwrap_or_else(|| "n/a".to_string());
        let blend_mode = mode
            .group
            .blend_mode
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        println!(
            "{} {blend_mode}: knob {:.3} vs baseline {:.3} ({deviation})",
            mode.group.participant, mode.equivalence.mode_mean, mode.equivalence.baseline_knob
        );
    }
    println!("Output directory: {}", output_dir.display());
    Ok(())
}

fn run_curve(ratio: f64, samples: usize, out: Option<&Path>) -> Result<()> {
    let points = sample_curve(ratio, samples);
    match out {
        Some(path) => {
            write_curve_points_csv(path, ratio, &points)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), region = BlendRegion::classify(ratio).label(), "curve written");
        }
        None => {
            println!("x,blend");
            for point in &points {
                println!("{:.10},{:.10}", point.x, point.y);
            }
        }
    }
    Ok(())
}

fn run_velocity(
    params: &VelocityParameters,
    periods: f64,
    samples: usize,
    out: Option<&Path>,
) -> Result<()> {
    anyhow::ensure!(
        periods.is_finite() && periods > 0.0,
        "periods must be finite and positive"
    );

    let points = sample_velocity(params, periods, samples);
    match out {
        Some(path) => {
            write_velocity_points_csv(path, &points)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), samples = points.len(), "velocity curve written");
        }
        None => {
            println!("t,velocity");
            for point in &points {
                println!("{:.10},{:.10}", point.t, point.v);
            }
        }
    }
    Ok(())
}

fn run_simulate(
    out: &Path,
    participant: String,
    trial: u32,
    params: &VelocityParameters,
    blend_mode: &str,
    seed: u64,
) -> Result<()> {
    let config = SimConfig {
        seed,
        ..SimConfig::default()
    };
    let rows = simulate_trial(params, &config)?;

    let descriptor = TrialDescriptor {
        timestamp: Some(Utc::now().format("%Y%m%d_%H%M%S").to_string()),
        fps: Some(1),
        camera_speed: Some(1),
        pattern: ExperimentPattern::Phase,
        participant,
        trial,
        blend_mode: Some(BlendMode::parse(blend_mode)),
    };

    fs::create_dir_all(out).with_context(|| format!("failed to create {}", out.display()))?;
    let path = out.join(descriptor.file_name());
    write_telemetry_csv(&path, &rows)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!("{}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params() {
        let params = parse_params("1.41, -1.0, 4.92, 0.44, 1.29").unwrap();
        assert_eq!(params, VelocityParameters::new(1.41, -1.0, 4.92, 0.44, 1.29));
        assert!(parse_params("1,2,3").is_err());
        assert!(parse_params("1,2,x,4,5").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "vection-analyze",
            "velocity",
            "--params",
            "-1,0.5,0,0.2,0",
            "--periods",
            "1",
        ])
        .unwrap();
        match cli.command {
            Commands::Velocity { params, periods, .. } => {
                assert_eq!(params.v0, -1.0);
                assert_eq!(periods, 1.0);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
