//! Two-pass conversion of a raw real capture into quantized baseband IQ.
//!
//! Pass 1 streams the capture chunk by chunk through the analytic-signal
//! builder, the mixer and the resampler into an interim complex64 spill while
//! tracking the global peak. Pass 2 needs that peak to fix the quantization
//! scale, so it only starts once the spill is closed.

pub mod gain;
pub mod input;
pub mod spill;

use num_complex::Complex64;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::config::RunConfig;
use crate::dsp::analytic::AnalyticSignalBuilder;
use crate::dsp::mixer::Oscillator;
use crate::dsp::resample::RationalResampler;
use crate::dsp::source::{SampleEncoding, SampleSource};
use crate::encode::metadata::RunMetadata;
use crate::encode::quantize::Quantizer;
use crate::error::{IoContext, Result};
use crate::progress;
use crate::runlog::RunLog;
use spill::{InterimSpill, RunningStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Streaming,
    Empty,
    Quantize,
    Metadata,
    Done,
}

/// Per-chunk signal chain. Owns the only state that crosses chunk
/// boundaries: the oscillator phase.
pub struct ChunkProcessor {
    encoding: SampleEncoding,
    analytic: AnalyticSignalBuilder,
    oscillator: Oscillator,
    resampler: RationalResampler,
}

impl ChunkProcessor {
    pub fn new(cfg: &RunConfig) -> Self {
        Self {
            encoding: cfg.encoding,
            analytic: AnalyticSignalBuilder::new(cfg.use_hilbert),
            oscillator: Oscillator::new(cfg.center_freq_hz, cfg.target_center_hz, cfg.fs_in),
            resampler: RationalResampler::new(cfg.ratio),
        }
    }

    pub fn process(&mut self, raw: &[u8]) -> Vec<Complex64> {
        let real = self.encoding.normalize(raw);
        let mut analytic = self.analytic.build(&real);
        self.oscillator.mix(&mut analytic);
        self.resampler.process(&analytic)
    }

    pub fn oscillator(&self) -> &Oscillator {
        &self.oscillator
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct ConversionReport {
    pub input_path: PathBuf,
    pub stats: RunningStats,
    /// `None` when the capture produced no output samples.
    pub scale: Option<f64>,
    pub metadata_path: PathBuf,
}

pub struct Converter {
    cfg: RunConfig,
    log: RunLog,
}

impl Converter {
    /// Creates the output, interim, plots and logs directories.
    pub fn new(cfg: RunConfig) -> Result<Self> {
        for dir in [
            cfg.output_path.parent(),
            cfg.interim_path.parent(),
            Some(cfg.plots_dir.as_path()),
            Some(cfg.logs_dir.as_path()),
        ]
        .into_iter()
        .flatten()
        {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).io_context("creating directory", dir)?;
            }
        }
        let log = RunLog::new(cfg.logs_dir.join("convert.log"));
        Ok(Self { cfg, log })
    }

    pub fn config(&self) -> &RunConfig {
        &self.cfg
    }

    #[cfg(test)]
    pub fn run_log(&self) -> &RunLog {
        &self.log
    }

    fn enter(&self, stage: Stage) {
        log::debug!("Stage: {:?}", stage);
    }

    pub fn run(&self) -> Result<ConversionReport> {
        let cfg = &self.cfg;
        self.enter(Stage::Init);
        let input = input::resolve_input(&cfg.input_path, &self.log)?;
        let input = input.canonicalize().io_context("resolving input", &input)?;
        self.log.line(&format!(
            "Starting conversion: {} -> {}",
            input.display(),
            cfg.output_path.display()
        ));
        log::info!(
            "dtype={}, fs {} -> {} Hz (ratio {}), shift {} Hz, hilbert={}, gain={}",
            cfg.encoding,
            cfg.fs_in,
            cfg.fs_out,
            cfg.ratio,
            cfg.target_center_hz - cfg.center_freq_hz,
            cfg.use_hilbert,
            cfg.gain
        );

        self.enter(Stage::Streaming);
        let stats = self.stream(&input)?;
        log::info!(
            "Pass 1 done: {} samples in, {} out, peak |x| = {:.6}",
            stats.samples_in,
            stats.samples_out,
            stats.max_magnitude
        );

        let scale = if stats.samples_out == 0 {
            self.enter(Stage::Empty);
            File::create(&cfg.output_path)
                .io_context("creating output file", &cfg.output_path)?;
            log::info!("No output samples; wrote empty {}", cfg.output_path.display());
            None
        } else {
            self.enter(Stage::Quantize);
            let scale = cfg.gain.scale(&stats);
            log::info!("Pass 2: quantizing to {} with scale {:.6}", cfg.quantization, scale);
            Quantizer::new(cfg.quantization, scale, cfg.block_samples()).run(
                &cfg.interim_path,
                stats.samples_out,
                &cfg.output_path,
            )?;
            Some(scale)
        };

        self.enter(Stage::Metadata);
        let output = cfg
            .output_path
            .canonicalize()
            .io_context("resolving output", &cfg.output_path)?;
        let metadata_path = RunMetadata::new(cfg, &input, &output, &stats).write(&output)?;
        self.log.line(&format!("Wrote metadata to {}", metadata_path.display()));
        self.log.line(&format!(
            "Completed conversion. Samples in {}, out {}",
            stats.samples_in, stats.samples_out
        ));

        if let Err(err) = std::fs::remove_file(&cfg.interim_path) {
            log::warn!(
                "Could not remove interim file {}: {}",
                cfg.interim_path.display(),
                err
            );
        }

        self.enter(Stage::Done);
        Ok(ConversionReport {
            input_path: input,
            stats,
            scale,
            metadata_path,
        })
    }

    /// Pass 1. The spill writer is closed before this returns.
    fn stream(&self, input: &Path) -> Result<RunningStats> {
        let cfg = &self.cfg;
        let file = File::open(input).io_context("opening input", input)?;
        let total_bytes = file.metadata().io_context("reading metadata of", input)?.len();

        let mut processor = ChunkProcessor::new(cfg);
        let mut spill = InterimSpill::create(&cfg.interim_path)?;
        let mut stats = RunningStats::default();

        let pb = progress::byte_bar(total_bytes);
        for batch in SampleSource::new(file, cfg.chunk_samples(), cfg.encoding) {
            let raw = batch.io_context("reading input", input)?;
            stats.record_input(raw.len() / cfg.encoding.bytes_per_sample());
            let resampled = processor.process(&raw);
            log::debug!(
                "chunk: {} raw -> {} resampled, phase {:.6}",
                raw.len(),
                resampled.len(),
                processor.oscillator().phase()
            );
            spill.append(&resampled, &mut stats)?;
            pb.inc(raw.len() as u64);
        }
        pb.finish_with_message("Mix & resample complete");

        spill.close()?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::resample::ResampleRatio;
    use crate::encode::quantize::QuantizationMode;
    use crate::error::ConvertError;
    use gain::GainMode;
    use std::f64::consts::PI;
    use tempfile::TempDir;

    fn run_config(root: &Path, input: &str) -> RunConfig {
        RunConfig {
            input_path: root.join(input),
            output_path: root.join("out/iq.bin"),
            interim_path: root.join("interim/iq.tmp"),
            encoding: SampleEncoding::Uint8,
            center_freq_hz: 1_575_420_000.0,
            target_center_hz: 1_575_420_000.0,
            fs_in: 2_048_000.0,
            fs_out: 2_048_000.0,
            ratio: ResampleRatio { up: 1, down: 1 },
            quantization: QuantizationMode::U8,
            gain: GainMode::Auto,
            chunk_size_bytes: 262_144,
            use_hilbert: true,
            plots_dir: root.join("plots"),
            logs_dir: root.join("logs"),
        }
    }

    fn read_metadata(path: &Path) -> RunMetadata {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_empty_capture_produces_empty_output() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("capture.dat"), []).unwrap();
        let cfg = run_config(dir.path(), "capture.dat");
        // stale output must not survive
        std::fs::create_dir_all(dir.path().join("out")).unwrap();
        std::fs::write(&cfg.output_path, [1u8, 2, 3]).unwrap();

        let report = Converter::new(cfg.clone()).unwrap().run().unwrap();

        assert_eq!(report.scale, None);
        assert_eq!(std::fs::metadata(&cfg.output_path).unwrap().len(), 0);
        let meta = read_metadata(&report.metadata_path);
        assert_eq!(meta.samples_in, 0);
        assert_eq!(meta.samples_out, 0);
        assert!(!cfg.interim_path.exists());
    }

    #[test]
    fn test_silent_capture_stays_at_zero() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("capture.dat"), vec![128u8; 1_000_000]).unwrap();
        let cfg = run_config(dir.path(), "capture.dat");

        let report = Converter::new(cfg.clone()).unwrap().run().unwrap();

        assert_eq!(report.stats.samples_in, 1_000_000);
        assert_eq!(report.stats.samples_out, 1_000_000);
        let meta = read_metadata(&report.metadata_path);
        assert_eq!(meta.samples_in, 1_000_000);
        assert!(meta.max_complex < 1e-6);
        assert_eq!(meta.input_dtype, "uint8");
        assert_eq!(meta.quantization, "u8");
        assert_eq!(meta.chunk_size_bytes, 262_144);

        let bytes = std::fs::read(&cfg.output_path).unwrap();
        assert_eq!(bytes.len(), 2_000_000);
        let mode = QuantizationMode::U8;
        assert!(bytes.iter().all(|&b| mode.decode(b).abs() <= 1.0 / 127.5));
        assert!(!cfg.interim_path.exists());
    }

    #[test]
    fn test_chunking_does_not_change_mixed_stream() {
        let dir = TempDir::new().unwrap();
        let mut cfg = run_config(dir.path(), "unused.dat");
        cfg.use_hilbert = false;
        cfg.target_center_hz = cfg.center_freq_hz + 123_456.0;
        let raw: Vec<u8> = (0..4096)
            .map(|i| (128.0 + 100.0 * (2.0 * PI * i as f64 / 37.0).sin()) as u8)
            .collect();

        let mut whole = ChunkProcessor::new(&cfg);
        let expected = whole.process(&raw);

        let mut chunked = ChunkProcessor::new(&cfg);
        let mut got = Vec::new();
        for piece in raw.chunks(1000) {
            got.extend(chunked.process(piece));
        }

        assert_eq!(got.len(), expected.len());
        for (a, b) in expected.iter().zip(&got) {
            assert!((a - b).norm() < 1e-9);
        }
        assert!((whole.oscillator().phase() - chunked.oscillator().phase()).abs() < 1e-6);
    }

    #[test]
    fn test_decimating_run_with_fixed_gain() {
        let dir = TempDir::new().unwrap();
        let raw: Vec<u8> = (0..2500).map(|i| (i % 256) as u8).collect();
        std::fs::write(dir.path().join("capture.dat"), &raw).unwrap();
        let mut cfg = run_config(dir.path(), "capture.dat");
        cfg.encoding = SampleEncoding::Int8;
        cfg.fs_in = 8_000_000.0;
        cfg.fs_out = 2_000_000.0;
        cfg.ratio = ResampleRatio { up: 1, down: 4 };
        cfg.quantization = QuantizationMode::I8;
        cfg.gain = GainMode::Fixed(2.0);
        cfg.chunk_size_bytes = 1000;

        let report = Converter::new(cfg.clone()).unwrap().run().unwrap();

        // chunks of 1000, 1000, 500 -> 250 + 250 + 125
        assert_eq!(report.stats.samples_in, 2500);
        assert_eq!(report.stats.samples_out, 625);
        assert_eq!(report.scale, Some(2.0));
        assert_eq!(std::fs::metadata(&cfg.output_path).unwrap().len(), 1250);
        let meta = read_metadata(&report.metadata_path);
        assert_eq!(meta.quantization, "i8");
        assert_eq!(meta.input_dtype, "int8");
        assert_eq!(meta.fs_out, 2_000_000.0);
    }

    #[test]
    fn test_fallback_input_is_used_and_logged_once() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("capture-001.bin"), vec![128u8; 64]).unwrap();
        let cfg = run_config(dir.path(), "capture.bin");

        let converter = Converter::new(cfg.clone()).unwrap();
        let report = converter.run().unwrap();

        let expected = dir.path().join("capture-001.bin").canonicalize().unwrap();
        assert_eq!(report.input_path, expected);
        let meta = read_metadata(&report.metadata_path);
        assert!(meta.input_path.ends_with("capture-001.bin"));

        let log = std::fs::read_to_string(converter.run_log().path()).unwrap();
        assert_eq!(log.matches("falling back to").count(), 1);
        assert!(log.contains("Completed conversion. Samples in 64, out 64"));
    }

    #[test]
    fn test_missing_input_fails_before_processing() {
        let dir = TempDir::new().unwrap();
        let cfg = run_config(dir.path(), "capture.bin");
        let err = Converter::new(cfg.clone()).unwrap().run().unwrap_err();
        assert!(matches!(err, ConvertError::InputNotFound(_)));
        assert!(!cfg.interim_path.exists());
        assert!(!cfg.output_path.exists());
    }

    #[test]
    fn test_convert_writes_nothing_to_plots_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("capture.dat"), vec![100u8; 1000]).unwrap();
        let cfg = run_config(dir.path(), "capture.dat");

        Converter::new(cfg.clone()).unwrap().run().unwrap();

        assert!(cfg.plots_dir.is_dir());
        assert_eq!(std::fs::read_dir(&cfg.plots_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_metadata_records_resolved_paths() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("raw")).unwrap();
        std::fs::write(dir.path().join("raw/capture.dat"), vec![128u8; 32]).unwrap();
        let mut cfg = run_config(dir.path(), "./raw/../raw/capture.dat");
        cfg.output_path = dir.path().join("./out/./iq.bin");

        let report = Converter::new(cfg.clone()).unwrap().run().unwrap();

        let root = dir.path().canonicalize().unwrap();
        let meta = read_metadata(&report.metadata_path);
        assert_eq!(meta.input_path, root.join("raw/capture.dat").display().to_string());
        assert_eq!(meta.output_path, root.join("out/iq.bin").display().to_string());
        assert_eq!(report.input_path, root.join("raw/capture.dat"));
    }
}
