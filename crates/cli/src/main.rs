//! qscale CLI
//!
//! Inspect mantissa/shift pairs and run the rescale modes on ad-hoc values.
//!
//! # Usage
//!
//! ```bash
//! # Mantissa/shift pair for a scale factor
//! qscale normalize 0.003921568
//!
//! # Rescale with the mode from QSCALE_ROUND_MODE (or --mode)
//! qscale rescale --scale 0.5 -- 100 127 -128 0
//!
//! # All three modes side by side
//! qscale compare --scale 0.5 --json -- 3 5 7 -1
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qscale_fixed_point::{normalize_scale, scale_buffer, RoundingConfig, RoundingMode};

#[derive(Parser)]
#[command(name = "qscale")]
#[command(version)]
#[command(about = "Fixed-point rescale and rounding inspector")]
struct Cli {
    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the 15-bit mantissa / shift pair for a scale factor
    Normalize {
        /// Scale factor
        #[arg(allow_negative_numbers = true)]
        scale: f64,
    },

    /// Rescale values in one rounding mode
    Rescale {
        /// Scale factor
        #[arg(short, long, allow_negative_numbers = true)]
        scale: f64,

        /// Rounding mode (DR, SR or EV); defaults to the environment
        #[arg(short, long, value_parser = parse_mode)]
        mode: Option<RoundingMode>,

        /// Accumulator values
        #[arg(allow_negative_numbers = true, required = true)]
        values: Vec<f64>,
    },

    /// Rescale values in every rounding mode
    Compare {
        /// Scale factor
        #[arg(short, long, allow_negative_numbers = true)]
        scale: f64,

        /// Accumulator values
        #[arg(allow_negative_numbers = true, required = true)]
        values: Vec<f64>,
    },
}

#[derive(Debug, Serialize)]
struct NormalizeReport {
    scale: f64,
    mpy: u32,
    shift: u32,
    approx: f64,
    rel_error: f64,
}

#[derive(Debug, Serialize)]
struct RescaleReport {
    mode: RoundingMode,
    scale: f64,
    input: Vec<f64>,
    output: Vec<f64>,
}

fn parse_mode(s: &str) -> std::result::Result<RoundingMode, String> {
    match s.trim() {
        "DR" => Ok(RoundingMode::DoubleRound),
        token => RoundingMode::from_token(token).map_err(|e| e.to_string()),
    }
}

fn normalize(scale: f64) -> Result<NormalizeReport> {
    let pair = normalize_scale(scale)?;
    let approx = pair.to_f64();
    let rel_error = if scale == 0.0 {
        0.0
    } else {
        (approx - scale.abs()).abs() / scale.abs()
    };
    Ok(NormalizeReport {
        scale,
        mpy: pair.mpy,
        shift: pair.shift,
        approx,
        rel_error,
    })
}

fn rescale(config: &RoundingConfig, scale: f64, values: &[f64]) -> Result<RescaleReport> {
    let mut output = values.to_vec();
    scale_buffer(config, "cli", &mut output, scale)?;
    Ok(RescaleReport {
        mode: config.mode,
        scale,
        input: values.to_vec(),
        output,
    })
}

fn print_rescale(report: &RescaleReport) {
    println!("mode:   {}", report.mode);
    println!("scale:  {}", report.scale);
    println!("input:  {:?}", report.input);
    println!("output: {:?}", report.output);
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "qscale=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let env_config = RoundingConfig::from_env();

    match cli.command {
        Commands::Normalize { scale } => {
            let report = normalize(scale)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("scale:     {}", report.scale);
                println!("mpy:       {}", report.mpy);
                println!("shift:     {}", report.shift);
                println!("approx:    {}", report.approx);
                println!("rel error: {:.3e}", report.rel_error);
            }
        }

        Commands::Rescale {
            scale,
            mode,
            values,
        } => {
            let config = match mode {
                Some(mode) => RoundingConfig { mode, ..env_config },
                None => env_config,
            };
            let report = rescale(&config, scale, &values)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_rescale(&report);
            }
        }

        Commands::Compare { scale, values } => {
            let reports = [
                RoundingMode::DoubleRound,
                RoundingMode::SingleRound,
                RoundingMode::EvRound,
            ]
            .into_iter()
            .map(|mode| rescale(&RoundingConfig { mode, ..env_config }, scale, &values))
            .collect::<Result<Vec<_>>>()?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            } else {
                for (i, report) in reports.iter().enumerate() {
                    if i > 0 {
                        println!();
                    }
                    print_rescale(report);
                }
            }
        }
    }

    Ok(())
}
