use std::fmt;

use super::spill::RunningStats;

/// Headroom above the global peak in auto mode.
pub const AUTO_HEADROOM: f64 = 1.05;

/// Smallest scale ever applied.
pub const SCALE_FLOOR: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GainMode {
    Auto,
    Fixed(f64),
}

impl GainMode {
    /// Derives the quantization scale once pass 1 is complete.
    pub fn scale(&self, stats: &RunningStats) -> f64 {
        let scale = match self {
            GainMode::Auto => stats.max_magnitude * AUTO_HEADROOM,
            GainMode::Fixed(value) => *value,
        };
        scale.max(SCALE_FLOOR)
    }
}

impl fmt::Display for GainMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GainMode::Auto => f.write_str("auto"),
            GainMode::Fixed(v) => write!(f, "{}", v),
        }
    }
}
