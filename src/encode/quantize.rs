use memmap2::Mmap;
use num_complex::Complex32;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::error::{ConvertError, IoContext, Result};
use crate::pipeline::spill::INTERIM_SAMPLE_BYTES;
use crate::progress;

/// Integer layout of the interleaved output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantizationMode {
    /// Offset binary, 0..=255 with 127.5 as zero.
    U8,
    /// Two's complement, -128..=127.
    I8,
}

impl QuantizationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuantizationMode::U8 => "u8",
            QuantizationMode::I8 => "i8",
        }
    }

    /// Maps one component already clipped to [-1, 1] to its output byte.
    #[inline]
    pub fn encode(&self, x: f32) -> u8 {
        match self {
            QuantizationMode::U8 => {
                ((x + 1.0) * 127.5).round_ties_even().clamp(0.0, 255.0) as u8
            }
            QuantizationMode::I8 => {
                (x * 127.0).round_ties_even().clamp(-128.0, 127.0) as i8 as u8
            }
        }
    }

    /// Inverse of `encode` up to one quantization step.
    #[cfg(test)]
    pub fn decode(&self, byte: u8) -> f32 {
        match self {
            QuantizationMode::U8 => byte as f32 / 127.5 - 1.0,
            QuantizationMode::I8 => (byte as i8) as f32 / 127.0,
        }
    }
}

impl FromStr for QuantizationMode {
    type Err = ConvertError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "u8" | "uint8" => Ok(QuantizationMode::U8),
            "i8" | "s8" | "int8" => Ok(QuantizationMode::I8),
            _ => Err(ConvertError::config(format!(
                "unsupported quantization '{}' (expected u8 or i8)",
                s
            ))),
        }
    }
}

impl fmt::Display for QuantizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Second pass: scales, clips and quantizes the interim spill.
pub struct Quantizer {
    mode: QuantizationMode,
    scale: f32,
    block_samples: usize,
}

impl Quantizer {
    pub fn new(mode: QuantizationMode, scale: f64, block_samples: usize) -> Self {
        Self {
            mode,
            scale: scale as f32,
            block_samples: block_samples.max(1),
        }
    }

    /// Appends the interleaved I/Q bytes for `block` to `out`.
    pub fn quantize_block(&self, block: &[Complex32], out: &mut Vec<u8>) {
        out.reserve(block.len() * 2);
        for sample in block {
            let i = (sample.re / self.scale).clamp(-1.0, 1.0);
            let q = (sample.im / self.scale).clamp(-1.0, 1.0);
            out.push(self.mode.encode(i));
            out.push(self.mode.encode(q));
        }
    }

    /// Writes `output` from the `total_samples` complex samples in `interim`.
    ///
    /// A stale file at `output` is removed first. A failure part-way through
    /// leaves a truncated output behind.
    pub fn run(&self, interim: &Path, total_samples: u64, output: &Path) -> Result<()> {
        let file = File::open(interim).io_context("opening interim file", interim)?;
        let expected = total_samples * INTERIM_SAMPLE_BYTES as u64;
        let actual = file
            .metadata()
            .io_context("reading metadata of", interim)?
            .len();
        if actual != expected {
            return Err(ConvertError::InterimLength { expected, actual });
        }
        // SAFETY: the interim file is private to this run and its writer was
        // closed before pass 2 began.
        let map = unsafe { Mmap::map(&file) }.io_context("mapping interim file", interim)?;
        let samples: &[Complex32] = bytemuck::try_cast_slice(&map[..]).map_err(|e| {
            ConvertError::Io {
                context: format!("viewing {} as complex64", interim.display()),
                source: std::io::Error::new(std::io::ErrorKind::InvalidData, format!("{:?}", e)),
            }
        })?;

        if output.exists() {
            std::fs::remove_file(output).io_context("removing stale output", output)?;
        }
        let out_file = File::create(output).io_context("creating output file", output)?;
        let mut writer = BufWriter::with_capacity(1 << 20, out_file);

        let blocks = samples.len().div_ceil(self.block_samples);
        let pb = progress::bar(blocks as u64, "blocks");

        let mut bytes = Vec::with_capacity(self.block_samples * 2);
        for block in samples.chunks(self.block_samples) {
            bytes.clear();
            self.quantize_block(block, &mut bytes);
            writer.write_all(&bytes).io_context("writing output file", output)?;
            pb.inc(1);
        }
        writer.flush().io_context("flushing output file", output)?;
        pb.finish_with_message("Quantization complete");

        log::debug!("Quantized {} samples in {} blocks", samples.len(), blocks);
        Ok(())
    }
}
