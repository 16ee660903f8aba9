//! Quick look at a raw capture before committing to a full conversion.

use rustfft::{num_complex::Complex, FftPlanner};
use serde::Serialize;
use std::f64::consts::PI;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::dsp::source::SampleEncoding;
use crate::error::{ConvertError, IoContext, Result};

pub const HISTOGRAM_BINS: usize = 256;
pub const DEFAULT_FFT_SIZE: usize = 131_072;
const MIN_FFT_SAMPLES: usize = 16;

/// Amplitude statistics over the normalized samples of a capture prefix.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeStats {
    pub samples: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    #[serde(skip)]
    pub histogram: Vec<u64>,
    #[serde(skip)]
    normalized: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpectrumPeak {
    pub fft_size: usize,
    /// Hz when a sample rate was given, cycles/sample otherwise.
    pub frequency: f64,
    pub unit: &'static str,
    pub magnitude_db: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub input: String,
    pub dtype: String,
    #[serde(flatten)]
    pub stats: ProbeStats,
    pub spectrum_peak: Option<SpectrumPeak>,
}

impl ProbeStats {
    /// Reads at most `max_samples` samples from the start of `path`.
    pub fn collect(path: &Path, encoding: SampleEncoding, max_samples: usize) -> Result<Self> {
        let file = File::open(path).io_context("opening capture", path)?;
        let limit = (max_samples * encoding.bytes_per_sample()) as u64;
        let mut raw = Vec::new();
        file.take(limit)
            .read_to_end(&mut raw)
            .io_context("reading capture", path)?;
        if raw.is_empty() {
            return Err(ConvertError::config(format!("{} holds no samples", path.display())));
        }
        Ok(Self::from_normalized(encoding.normalize(&raw)))
    }

    pub fn from_normalized(normalized: Vec<f64>) -> Self {
        let n = normalized.len().max(1) as f64;
        let mean = normalized.iter().sum::<f64>() / n;
        let var = normalized.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        let min = normalized.iter().copied().fold(f64::INFINITY, f64::min);
        let max = normalized.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let mut histogram = vec![0u64; HISTOGRAM_BINS];
        for &x in &normalized {
            if !(-1.0..=1.0).contains(&x) {
                continue;
            }
            let bin = (((x + 1.0) / 2.0) * HISTOGRAM_BINS as f64) as usize;
            histogram[bin.min(HISTOGRAM_BINS - 1)] += 1;
        }

        Self {
            samples: normalized.len(),
            min,
            max,
            mean,
            std: var.sqrt(),
            histogram,
            normalized,
        }
    }

    pub fn bin_center(bin: usize) -> f64 {
        let width = 2.0 / HISTOGRAM_BINS as f64;
        -1.0 + (bin as f64 + 0.5) * width
    }

    pub fn write_histogram_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).io_context("creating directory", parent)?;
        }
        let file = File::create(path).io_context("creating histogram", path)?;
        let mut w = BufWriter::new(file);
        writeln!(w, "bin_center,count").io_context("writing histogram", path)?;
        for (bin, count) in self.histogram.iter().enumerate() {
            writeln!(w, "{:.6},{}", Self::bin_center(bin), count)
                .io_context("writing histogram", path)?;
        }
        w.flush().io_context("writing histogram", path)
    }

    /// Strongest bin of a Hann-windowed FFT over the first `fft_size` samples.
    pub fn spectrum_peak(&self, fft_size: usize, fs: Option<f64>) -> Result<SpectrumPeak> {
        let n = fft_size.min(self.normalized.len());
        if n < MIN_FFT_SAMPLES {
            return Err(ConvertError::config(format!(
                "need at least {} samples for a spectrum, have {}",
                MIN_FFT_SAMPLES, n
            )));
        }

        let mut buf: Vec<Complex<f64>> = self.normalized[..n]
            .iter()
            .enumerate()
            .map(|(i, &x)| Complex::new(x * hann(i, n), 0.0))
            .collect();
        FftPlanner::<f64>::new().plan_fft_forward(n).process(&mut buf);

        let (bin, mag) = buf[..n / 2 + 1]
            .iter()
            .enumerate()
            .map(|(k, c)| (k, c.norm()))
            .fold((0, f64::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });

        let (frequency, unit) = match fs {
            Some(fs) => (bin as f64 * fs / n as f64, "Hz"),
            None => (bin as f64 / n as f64, "cycles/sample"),
        };
        Ok(SpectrumPeak {
            fft_size: n,
            frequency,
            unit,
            magnitude_db: 20.0 * (mag + 1e-12).log10(),
        })
    }
}

fn hann(i: usize, n: usize) -> f64 {
    if n == 1 {
        return 1.0;
    }
    0.5 - 0.5 * (2.0 * PI * i as f64 / (n - 1) as f64).cos()
}

pub struct ProbeOptions {
    pub encoding: SampleEncoding,
    pub max_samples: usize,
    pub fs: Option<f64>,
    /// `None` skips the spectrum.
    pub fft_size: Option<usize>,
}

pub fn probe(path: &Path, opts: &ProbeOptions) -> Result<ProbeReport> {
    let stats = ProbeStats::collect(path, opts.encoding, opts.max_samples)?;
    let spectrum_peak = match opts.fft_size {
        Some(size) => Some(stats.spectrum_peak(size, opts.fs)?),
        None => None,
    };
    Ok(ProbeReport {
        input: path.display().to_string(),
        dtype: opts.encoding.to_string(),
        stats,
        spectrum_peak,
    })
}

impl std::fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Input:   {} ({})", self.input, self.dtype)?;
        writeln!(f, "Samples: {}", self.stats.samples)?;
        writeln!(f, "Min:     {:.6}", self.stats.min)?;
        writeln!(f, "Max:     {:.6}", self.stats.max)?;
        writeln!(f, "Mean:    {:.6}", self.stats.mean)?;
        write!(f, "Std:     {:.6}", self.stats.std)?;
        if let Some(peak) = &self.spectrum_peak {
            write!(
                f,
                "\nPeak:    {:.3} {} at {:.1} dB (FFT {})",
                peak.frequency, peak.unit, peak.magnitude_db, peak.fft_size
            )?;
        }
        Ok(())
    }
}
