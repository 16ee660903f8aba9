use num_complex::{Complex32, Complex64};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{IoContext, Result};

/// Bytes per interim sample: complex64 (two little-endian f32).
pub const INTERIM_SAMPLE_BYTES: usize = std::mem::size_of::<Complex32>();

/// Run-wide accumulators. Updated during pass 1 only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStats {
    pub samples_in: u64,
    pub samples_out: u64,
    pub max_magnitude: f64,
}

impl Default for RunningStats {
    fn default() -> Self {
        Self {
            samples_in: 0,
            samples_out: 0,
            max_magnitude: 1e-9,
        }
    }
}

impl RunningStats {
    pub fn record_input(&mut self, n: usize) {
        self.samples_in += n as u64;
    }

    pub fn record_output(&mut self, chunk: &[Complex64]) {
        self.samples_out += chunk.len() as u64;
        let peak = chunk.iter().map(|c| c.norm()).fold(0.0f64, f64::max);
        self.max_magnitude = self.max_magnitude.max(peak);
    }
}

/// Append-only scratch file holding the resampled stream between passes.
pub struct InterimSpill {
    path: PathBuf,
    writer: BufWriter<File>,
    scratch: Vec<Complex32>,
}

impl InterimSpill {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).io_context("creating interim file", path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::with_capacity(1 << 20, file),
            scratch: Vec::new(),
        })
    }

    /// Appends a non-empty chunk and folds it into `stats`.
    pub fn append(&mut self, chunk: &[Complex64], stats: &mut RunningStats) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.scratch.clear();
        self.scratch
            .extend(chunk.iter().map(|c| Complex32::new(c.re as f32, c.im as f32)));
        self.writer
            .write_all(bytemuck::cast_slice(&self.scratch))
            .io_context("writing interim file", &self.path)?;
        stats.record_output(chunk);
        Ok(())
    }

    /// Flushes and releases the writer. Pass 2 must not start before this.
    pub fn close(self) -> Result<PathBuf> {
        let file = self
            .writer
            .into_inner()
            .map_err(|e| e.into_error())
            .io_context("flushing interim file", &self.path)?;
        drop(file);
        Ok(self.path)
    }
}
