use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::dsp::resample::ResampleRatio;
use crate::dsp::source::SampleEncoding;
use crate::encode::quantize::QuantizationMode;
use crate::error::{ConvertError, Result};
use crate::pipeline::gain::GainMode;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub signal: SignalConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Deserialize)]
pub struct SignalConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    #[serde(default = "default_interim_path")]
    pub interim_path: PathBuf,
    pub center_freq_hz: f64,
    pub target_center_hz: f64,
    pub fs_in: f64,
    pub fs_out: f64,
    #[serde(default = "default_dtype")]
    pub dtype: String,
    #[serde(default = "default_quantization")]
    pub quantization: String,
    #[serde(default)]
    pub iq_gain: IqGain,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_use_hilbert")]
    pub use_hilbert: bool,
}

/// `iq_gain` accepts `"auto"` or a number (bare or quoted).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IqGain {
    Number(f64),
    Text(String),
}

impl Default for IqGain {
    fn default() -> Self {
        IqGain::Text("auto".into())
    }
}

impl IqGain {
    pub fn to_mode(&self) -> Result<GainMode> {
        let value = match self {
            IqGain::Text(s) if s.eq_ignore_ascii_case("auto") => return Ok(GainMode::Auto),
            IqGain::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| {
                    ConvertError::config(format!(
                        "iq_gain must be \"auto\" or a number, got '{}'",
                        s
                    ))
                })?,
            IqGain::Number(v) => *v,
        };
        if !value.is_finite() || value <= 0.0 {
            return Err(ConvertError::config(format!(
                "fixed iq_gain must be a positive number, got {}",
                value
            )));
        }
        Ok(GainMode::Fixed(value))
    }
}

#[derive(Debug, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_plots_dir")]
    pub plots_dir: PathBuf,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
    #[serde(default = "default_histogram_samples")]
    pub histogram_samples: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            plots_dir: default_plots_dir(),
            logs_dir: default_logs_dir(),
            histogram_samples: default_histogram_samples(),
        }
    }
}

fn default_interim_path() -> PathBuf { PathBuf::from("data/interim/iq.tmp") }
fn default_dtype() -> String { "uint8".into() }
fn default_quantization() -> String { "u8".into() }
fn default_chunk_size() -> usize { 64 * 1024 * 1024 }
fn default_use_hilbert() -> bool { true }
fn default_plots_dir() -> PathBuf { PathBuf::from("plots") }
fn default_logs_dir() -> PathBuf { PathBuf::from("logs") }
pub fn default_histogram_samples() -> usize { 2_000_000 }

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("Failed to parse config: {}", path.display()))
}

/// Validated, immutable parameters for one conversion run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub interim_path: PathBuf,
    pub encoding: SampleEncoding,
    pub center_freq_hz: f64,
    pub target_center_hz: f64,
    pub fs_in: f64,
    pub fs_out: f64,
    pub ratio: ResampleRatio,
    pub quantization: QuantizationMode,
    pub gain: GainMode,
    pub chunk_size_bytes: usize,
    pub use_hilbert: bool,
    pub plots_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl RunConfig {
    /// Checks every setting up front so a run never fails on them mid-stream.
    /// Relative paths are taken from `root`.
    pub fn from_config(cfg: &Config, root: &Path) -> Result<Self> {
        let sig = &cfg.signal;
        let encoding: SampleEncoding = sig.dtype.parse()?;
        let quantization: QuantizationMode = sig.quantization.parse()?;
        let gain = sig.iq_gain.to_mode()?;
        let ratio = ResampleRatio::from_rates(sig.fs_in, sig.fs_out)?;
        if sig.chunk_size == 0 {
            return Err(ConvertError::config("chunk_size must be at least one byte"));
        }
        if !(sig.center_freq_hz.is_finite() && sig.target_center_hz.is_finite()) {
            return Err(ConvertError::config("center frequencies must be finite"));
        }

        Ok(Self {
            input_path: root.join(&sig.input_path),
            output_path: root.join(&sig.output_path),
            interim_path: root.join(&sig.interim_path),
            encoding,
            center_freq_hz: sig.center_freq_hz,
            target_center_hz: sig.target_center_hz,
            fs_in: sig.fs_in,
            fs_out: sig.fs_out,
            ratio,
            quantization,
            gain,
            chunk_size_bytes: sig.chunk_size,
            use_hilbert: sig.use_hilbert,
            plots_dir: root.join(&cfg.runtime.plots_dir),
            logs_dir: root.join(&cfg.runtime.logs_dir),
        })
    }

    /// Raw samples read per pass-1 chunk.
    pub fn chunk_samples(&self) -> usize {
        (self.chunk_size_bytes / self.encoding.bytes_per_sample()).max(1)
    }

    /// Complex samples per pass-2 block.
    pub fn block_samples(&self) -> usize {
        (self.chunk_size_bytes / 8).max(1)
    }
}
