//! Checks a downstream receiver's run log for evidence the converted IQ
//! was usable: acquired PRNs, finished tasks, navigation and ephemeris hits.

use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ConvertError, IoContext, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PrnDetail {
    pub corr: f64,
    pub doppler_hz: f64,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct LogSummary {
    pub prns: BTreeMap<u32, PrnDetail>,
    pub task1_finished: bool,
    pub task2_finished: bool,
    pub subframes: usize,
    pub ephemeris_hits: usize,
}

#[derive(Debug, Clone)]
pub struct Thresholds {
    pub min_prn: usize,
    pub require_task_finish: bool,
    pub min_subframes: usize,
    pub min_ephemeris: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_prn: 1,
            require_task_finish: false,
            min_subframes: 0,
            min_ephemeris: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub log: String,
    pub unique_prns: usize,
    pub min_required: usize,
    pub task1_finished: bool,
    pub task2_finished: bool,
    pub prn_details: BTreeMap<u32, PrnDetail>,
    pub subframes: usize,
    pub min_subframes: usize,
    pub ephemeris_hits: usize,
    pub min_ephemeris: usize,
    pub status: &'static str,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.status == "ok"
    }
}

struct Patterns {
    prn: Regex,
    nav: Vec<Regex>,
    ephemeris: Regex,
}

impl Patterns {
    fn new() -> Result<Self> {
        let build = |pattern: &str| {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| ConvertError::config(format!("bad pattern {}: {}", pattern, e)))
        };
        Ok(Self {
            prn: Regex::new(r"PRN\s+(\d+)\s+Corr:([0-9.]+)\s+f=([+\-0-9.]+)")
                .map_err(|e| ConvertError::config(e.to_string()))?,
            nav: vec![build("subframe")?, build("gpsframe")?, build(r"frame\s+lock")?],
            ephemeris: build("ephem")?,
        })
    }
}

pub fn summarize(text: &str) -> Result<LogSummary> {
    let patterns = Patterns::new()?;
    let mut summary = LogSummary::default();

    for line in text.lines() {
        if let Some(caps) = patterns.prn.captures(line) {
            let parsed = (
                caps[1].parse::<u32>(),
                caps[2].parse::<f64>(),
                caps[3].parse::<f64>(),
            );
            match parsed {
                (Ok(prn), Ok(corr), Ok(doppler_hz)) => {
                    summary.prns.insert(prn, PrnDetail { corr, doppler_hz });
                }
                _ => log::debug!("Ignoring malformed PRN line: {}", line),
            }
        }
        if line.contains("Task1 finished") {
            summary.task1_finished = true;
        }
        if line.contains("Task2 finished") {
            summary.task2_finished = true;
        }
        if patterns.nav.iter().any(|p| p.is_match(line)) {
            summary.subframes += 1;
        }
        if patterns.ephemeris.is_match(line) {
            summary.ephemeris_hits += 1;
        }
    }
    Ok(summary)
}

pub fn evaluate(log: &Path, summary: LogSummary, limits: &Thresholds) -> ValidationReport {
    let mut ok = summary.prns.len() >= limits.min_prn;
    if limits.require_task_finish {
        ok = ok && summary.task1_finished && summary.task2_finished;
    }
    ok = ok && summary.subframes >= limits.min_subframes;
    ok = ok && summary.ephemeris_hits >= limits.min_ephemeris;

    ValidationReport {
        log: log.display().to_string(),
        unique_prns: summary.prns.len(),
        min_required: limits.min_prn,
        task1_finished: summary.task1_finished,
        task2_finished: summary.task2_finished,
        prn_details: summary.prns,
        subframes: summary.subframes,
        min_subframes: limits.min_subframes,
        ephemeris_hits: summary.ephemeris_hits,
        min_ephemeris: limits.min_ephemeris,
        status: if ok { "ok" } else { "failed" },
    }
}

/// Undecodable bytes in the log are dropped, not fatal.
pub fn validate(log: &Path, limits: &Thresholds) -> Result<ValidationReport> {
    let bytes = std::fs::read(log).io_context("reading run log", log)?;
    let summary = summarize(&String::from_utf8_lossy(&bytes))?;
    Ok(evaluate(log, summary, limits))
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "[validate] {} - {} PRNs detected",
            self.status.to_uppercase(),
            self.unique_prns
        )?;
        if !self.prn_details.is_empty() {
            let rows: Vec<String> = self
                .prn_details
                .iter()
                .map(|(prn, d)| format!("PRN{}:corr={:.1}", prn, d.corr))
                .collect();
            writeln!(f, "[validate] {}", rows.join(", "))?;
        }
        write!(
            f,
            "[validate] subframes={} (min {}), ephemeris_hits={} (min {})",
            self.subframes, self.min_subframes, self.ephemeris_hits, self.min_ephemeris
        )
    }
}
