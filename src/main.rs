mod cli;
mod config;
mod dsp;
mod encode;
mod error;
mod pipeline;
mod progress;
mod runlog;
mod tools;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use cli::{Cli, Command, ConvertArgs, ProbeArgs, ValidateArgs};
use config::{Config, IqGain, RunConfig};
use dsp::source::SampleEncoding;
use pipeline::Converter;
use tools::{probe, validate};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_millis()
        .init();

    let config_path = discover_config(cli.config.as_deref());

    match &cli.command {
        Command::Convert(args) => {
            let path = config_path.context(
                "No config found: pass --config or create iqforge.toml in the working directory",
            )?;
            let cfg = config::load_config(&path)?;
            log::info!("Loaded config from {}", path.display());
            convert(cfg, args, &cli.root)
        }
        Command::Probe(args) => {
            let cfg = match config_path {
                Some(path) => Some(config::load_config(&path)?),
                None => None,
            };
            run_probe(cfg.as_ref(), args)
        }
        Command::Validate(args) => run_validate(args),
    }
}

/// Explicit `--config`, else `./iqforge.toml`, else the platform config dir.
fn discover_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("iqforge.toml");
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("iqforge").join("config.toml"))
        .filter(|p| p.exists())
}

fn convert(mut cfg: Config, args: &ConvertArgs, root: &Path) -> Result<()> {
    if args.no_hilbert {
        cfg.signal.use_hilbert = false;
    }
    if let Some(gain) = &args.gain {
        cfg.signal.iq_gain = IqGain::Text(gain.clone());
    }

    let root = root
        .canonicalize()
        .with_context(|| format!("Root directory not found: {}", root.display()))?;
    let run = RunConfig::from_config(&cfg, &root).context("Invalid configuration")?;
    let converter = Converter::new(run)?;
    let report = converter.run()?;

    let scale = match report.scale {
        Some(scale) => format!("scale {:.6}", scale),
        None => "nothing to quantize".to_string(),
    };
    log::info!(
        "Done! {} -> {} ({} samples, {}, metadata {})",
        report.input_path.display(),
        converter.config().output_path.display(),
        report.stats.samples_out,
        scale,
        report.metadata_path.display()
    );
    Ok(())
}

fn run_probe(cfg: Option<&Config>, args: &ProbeArgs) -> Result<()> {
    let encoding: SampleEncoding = args.dtype.parse()?;
    let max_samples = args.samples.unwrap_or_else(|| {
        cfg.map(|c| c.runtime.histogram_samples)
            .unwrap_or_else(config::default_histogram_samples)
    });
    let opts = probe::ProbeOptions {
        encoding,
        max_samples,
        fs: args.fs,
        fft_size: (!args.no_fft).then_some(args.fft_size),
    };

    let report = probe::probe(&args.input, &opts)
        .with_context(|| format!("Failed to probe {}", args.input.display()))?;
    if let Some(path) = &args.histogram_out {
        report.stats.write_histogram_csv(path)?;
        log::info!("Wrote histogram to {}", path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }
    Ok(())
}

fn run_validate(args: &ValidateArgs) -> Result<()> {
    let limits = validate::Thresholds {
        min_prn: args.min_prn,
        require_task_finish: args.require_task_finish,
        min_subframes: args.min_subframes,
        min_ephemeris: args.min_ephemeris,
    };
    let report = validate::validate(&args.log, &limits)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }
    if !report.passed() {
        std::process::exit(1);
    }
    Ok(())
}
