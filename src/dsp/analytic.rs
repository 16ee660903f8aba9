use num_complex::Complex64;
use rustfft::FftPlanner;

/// Builds the complex signal fed to the mixer, one chunk at a time.
///
/// With the Hilbert construction enabled each chunk is transformed on its
/// own: nothing from the previous chunk leaks into the next one. Only the
/// FFT plans are cached between calls.
pub struct AnalyticSignalBuilder {
    use_hilbert: bool,
    planner: FftPlanner<f64>,
}

impl AnalyticSignalBuilder {
    pub fn new(use_hilbert: bool) -> Self {
        Self {
            use_hilbert,
            planner: FftPlanner::new(),
        }
    }

    pub fn build(&mut self, real: &[f64]) -> Vec<Complex64> {
        let mut buffer: Vec<Complex64> = real.iter().map(|&x| Complex64::new(x, 0.0)).collect();
        if self.use_hilbert && !buffer.is_empty() {
            self.analytic_inplace(&mut buffer);
        }
        buffer
    }

    fn analytic_inplace(&mut self, buffer: &mut [Complex64]) {
        let len = buffer.len();
        let fft = self.planner.plan_fft_forward(len);
        fft.process(buffer);

        // Keep DC (and Nyquist for even lengths), double positive bins, zero the rest.
        let positive_end = if len % 2 == 0 { len / 2 } else { (len + 1) / 2 };
        for bin in buffer[1..positive_end].iter_mut() {
            *bin *= 2.0;
        }
        let negative_start = if len % 2 == 0 { len / 2 + 1 } else { positive_end };
        for bin in buffer[negative_start..].iter_mut() {
            *bin = Complex64::new(0.0, 0.0);
        }

        let ifft = self.planner.plan_fft_inverse(len);
        ifft.process(buffer);

        let scale = 1.0 / len as f64;
        buffer.iter_mut().for_each(|x| *x *= scale);
    }
}
