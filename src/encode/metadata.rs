use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::RunConfig;
use crate::error::{ConvertError, IoContext, Result};
use crate::pipeline::spill::RunningStats;

/// JSON sidecar describing one finished conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub input_path: String,
    pub output_path: String,
    pub input_dtype: String,
    pub center_freq_hz: f64,
    pub target_center_hz: f64,
    pub fs_in: f64,
    pub fs_out: f64,
    pub samples_in: u64,
    pub samples_out: u64,
    pub max_complex: f64,
    pub quantization: String,
    pub chunk_size_bytes: usize,
}

impl RunMetadata {
    /// `input` and `output` are recorded as given; callers pass resolved paths.
    pub fn new(cfg: &RunConfig, input: &Path, output: &Path, stats: &RunningStats) -> Self {
        Self {
            input_path: input.display().to_string(),
            output_path: output.display().to_string(),
            input_dtype: cfg.encoding.to_string(),
            center_freq_hz: cfg.center_freq_hz,
            target_center_hz: cfg.target_center_hz,
            fs_in: cfg.fs_in,
            fs_out: cfg.fs_out,
            samples_in: stats.samples_in,
            samples_out: stats.samples_out,
            max_complex: stats.max_magnitude,
            quantization: cfg.quantization.to_string(),
            chunk_size_bytes: cfg.chunk_size_bytes,
        }
    }

    /// Writes the sidecar next to `output` and returns its path.
    pub fn write(&self, output: &Path) -> Result<PathBuf> {
        let path = sidecar_path(output);
        let json = serde_json::to_string_pretty(self).map_err(|e| ConvertError::Io {
            context: format!("serializing metadata for {}", path.display()),
            source: e.into(),
        })?;
        std::fs::write(&path, json).io_context("writing metadata", &path)?;
        Ok(path)
    }
}

/// `<output>.json`, keeping the output's own extension.
pub fn sidecar_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".json");
    PathBuf::from(name)
}
