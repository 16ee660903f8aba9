use num_complex::Complex64;
use std::f64::consts::PI;

/// Phase-continuous oscillator used for digital downconversion.
///
/// Mixing by `exp(-j·phase)` moves `target_center_hz` to 0 Hz. The phase is
/// the only run state; it is advanced by exactly one `phase_step` per sample
/// consumed so chunk boundaries are invisible to the trajectory.
#[derive(Debug, Clone)]
pub struct Oscillator {
    phase: f64,
    phase_step: f64,
}

impl Oscillator {
    pub fn new(source_center_hz: f64, target_center_hz: f64, fs_in: f64) -> Self {
        Self::with_step(2.0 * PI * (target_center_hz - source_center_hz) / fs_in)
    }

    pub fn with_step(phase_step: f64) -> Self {
        Self {
            phase: 0.0,
            phase_step,
        }
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    #[cfg(test)]
    pub fn phase_step(&self) -> f64 {
        self.phase_step
    }

    /// Mixes `signal` in place and carries the phase into the next chunk.
    pub fn mix(&mut self, signal: &mut [Complex64]) {
        if signal.is_empty() {
            return;
        }
        let mut last = self.phase;
        for (k, sample) in signal.iter_mut().enumerate() {
            last = self.phase + self.phase_step * k as f64;
            *sample *= Complex64::from_polar(1.0, -last);
        }
        self.phase = last + self.phase_step;
    }
}
