use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "iqforge", about = "Convert raw real RF captures into baseband IQ")]
pub struct Cli {
    /// Config file (default: ./iqforge.toml, then the user config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory relative config paths are resolved against
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the two-pass conversion described by the config
    Convert(ConvertArgs),
    /// Print amplitude statistics and the dominant tone of a raw capture
    Probe(ProbeArgs),
    /// Check a receiver run log for acquisition and navigation evidence
    Validate(ValidateArgs),
}

#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Feed the real samples straight to the mixer
    #[arg(long)]
    pub no_hilbert: bool,

    /// Override iq_gain ("auto" or a positive number)
    #[arg(long)]
    pub gain: Option<String>,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Raw capture file
    pub input: PathBuf,

    /// Samples to read (default: runtime.histogram_samples)
    #[arg(long)]
    pub samples: Option<usize>,

    /// Sample type: uint8 or int8
    #[arg(long, default_value = "uint8")]
    pub dtype: String,

    /// Sample rate in Hz, for reporting the peak in Hz
    #[arg(long)]
    pub fs: Option<f64>,

    #[arg(long, default_value_t = crate::tools::probe::DEFAULT_FFT_SIZE)]
    pub fft_size: usize,

    /// Skip the spectrum
    #[arg(long)]
    pub no_fft: bool,

    /// Write the amplitude histogram as CSV
    #[arg(long)]
    pub histogram_out: Option<PathBuf>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Receiver run log
    #[arg(long)]
    pub log: PathBuf,

    /// Minimum distinct PRNs expected
    #[arg(long, default_value_t = 1)]
    pub min_prn: usize,

    /// Fail if the Task1/Task2 finished markers are missing
    #[arg(long)]
    pub require_task_finish: bool,

    /// Minimum navigation-frame hits expected
    #[arg(long, default_value_t = 0)]
    pub min_subframes: usize,

    /// Minimum ephemeris hits expected
    #[arg(long, default_value_t = 0)]
    pub min_ephemeris: usize,

    #[arg(long)]
    pub json: bool,
}
