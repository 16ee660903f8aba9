//! Rational sample-rate conversion.
//!
//! The ratio `fs_out / fs_in` is reduced to `up / down` with a bounded
//! denominator, then every chunk is upsampled by `up`, low-pass filtered
//! with a Kaiser-windowed sinc and decimated by `down`. Edges are padded by
//! straight-line extrapolation through the chunk's first and last samples and
//! the filter's group delay is removed, so output sample `j` lines up with
//! input position `j·down/up`.

use num_complex::Complex64;
use std::f64::consts::PI;
use std::fmt;

use crate::error::{ConvertError, Result};

/// Upper bound on the reduced denominator; keeps the filter length tractable.
pub const MAX_DENOMINATOR: u64 = 8192;

/// Half filter length, in zero crossings of the prototype sinc.
const HALF_ZERO_CROSSINGS: usize = 10;

const KAISER_BETA: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResampleRatio {
    pub up: usize,
    pub down: usize,
}

impl ResampleRatio {
    /// Rates are truncated to whole hertz before the ratio is reduced.
    pub fn from_rates(fs_in: f64, fs_out: f64) -> Result<Self> {
        if !(fs_in.is_finite() && fs_out.is_finite()) || fs_in < 1.0 || fs_out < 1.0 {
            return Err(ConvertError::config(format!(
                "sample rates must be at least 1 Hz (fs_in={}, fs_out={})",
                fs_in, fs_out
            )));
        }
        let (up, down) = limit_denominator(fs_out as u64, fs_in as u64, MAX_DENOMINATOR);
        if up == 0 {
            return Err(ConvertError::config(format!(
                "fs_out/fs_in = {}/{} is below the smallest representable ratio 1/{}",
                fs_out, fs_in, MAX_DENOMINATOR
            )));
        }
        Ok(Self {
            up: up as usize,
            down: down as usize,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.up == self.down
    }

    /// Output length for `n` input samples: `ceil(n·up/down)`.
    pub fn output_len(&self, n: usize) -> usize {
        (n * self.up).div_ceil(self.down)
    }
}

impl fmt::Display for ResampleRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.up, self.down)
    }
}

/// Closest fraction to `num/den` whose denominator does not exceed `max_den`.
pub fn limit_denominator(num: u64, den: u64, max_den: u64) -> (u64, u64) {
    let g = gcd(num, den);
    let (num, den) = (num / g, den / g);
    if den <= max_den {
        return (num, den);
    }

    let (mut p0, mut q0, mut p1, mut q1) = (0u64, 1u64, 1u64, 0u64);
    let (mut n, mut d) = (num, den);
    loop {
        let a = n / d;
        let q2 = q0 + a * q1;
        if q2 > max_den {
            break;
        }
        (p0, q0, p1, q1) = (p1, q1, p0 + a * p1, q2);
        (n, d) = (d, n - a * d);
    }

    let k = (max_den - q0) / q1;
    let (bp, bq) = (p0 + k * p1, q0 + k * q1);

    // |p1/q1 - x| <= |bp/bq - x|, cross-multiplied by den·q1·bq
    let err = |p: u64, q: u64| (p as i128 * den as i128 - num as i128 * q as i128).abs();
    if err(p1, q1) * bq as i128 <= err(bp, bq) * q1 as i128 {
        (p1, q1)
    } else {
        (bp, bq)
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.max(1)
}

/// Stateless polyphase resampler; each call filters its input in isolation.
pub struct RationalResampler {
    ratio: ResampleRatio,
    /// Prototype filter with the alignment zeros already prepended.
    taps: Vec<f64>,
    /// Leading outputs that only cover filter delay.
    skip: usize,
}

impl RationalResampler {
    pub fn new(ratio: ResampleRatio) -> Self {
        if ratio.is_identity() {
            return Self {
                ratio,
                taps: vec![1.0],
                skip: 0,
            };
        }
        let max_rate = ratio.up.max(ratio.down);
        let half_len = HALF_ZERO_CROSSINGS * max_rate;
        let prototype = design_lowpass(2 * half_len + 1, 1.0 / max_rate as f64, KAISER_BETA);

        let pre_pad = ratio.down - half_len % ratio.down;
        let skip = (half_len + pre_pad) / ratio.down;

        let mut taps = vec![0.0; pre_pad];
        taps.extend(prototype.iter().map(|h| h * ratio.up as f64));

        Self { ratio, taps, skip }
    }

    pub fn process(&self, input: &[Complex64]) -> Vec<Complex64> {
        if input.is_empty() {
            return Vec::new();
        }
        if self.ratio.is_identity() {
            return input.to_vec();
        }

        let up = self.ratio.up;
        let down = self.ratio.down;
        let n = input.len();
        let first = input[0];
        let last = input[n - 1];
        let slope = if n > 1 {
            (last - first) / (n - 1) as f64
        } else {
            Complex64::new(0.0, 0.0)
        };
        let at = |i: i64| -> Complex64 {
            if i < 0 {
                first + slope * i as f64
            } else if i as usize >= n {
                last + slope * (i - (n as i64 - 1)) as f64
            } else {
                input[i as usize]
            }
        };

        let out_len = self.ratio.output_len(n);
        let mut output = Vec::with_capacity(out_len);
        for j in 0..out_len {
            // Position in the zero-stuffed domain; only taps aligned with a
            // real input sample contribute.
            let t = (j + self.skip) * down;
            let newest = (t / up) as i64;
            let mut acc = Complex64::new(0.0, 0.0);
            for (r, &h) in self.taps[t % up..].iter().step_by(up).enumerate() {
                acc += at(newest - r as i64) * h;
            }
            output.push(acc);
        }
        output
    }
}

/// Windowed-sinc low-pass, cutoff relative to Nyquist, unit gain at DC.
fn design_lowpass(num_taps: usize, cutoff: f64, beta: f64) -> Vec<f64> {
    let center = (num_taps - 1) as f64 / 2.0;
    let window = kaiser_window(num_taps, beta);
    let mut taps: Vec<f64> = (0..num_taps)
        .map(|i| {
            let m = i as f64 - center;
            cutoff * sinc(cutoff * m) * window[i]
        })
        .collect();
    let sum: f64 = taps.iter().sum();
    taps.iter_mut().for_each(|h| *h /= sum);
    taps
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

fn kaiser_window(length: usize, beta: f64) -> Vec<f64> {
    if length == 1 {
        return vec![1.0];
    }
    let n_minus_1 = (length - 1) as f64;
    let i0_beta = bessel_i0(beta);
    (0..length)
        .map(|n| {
            let r = 2.0 * n as f64 / n_minus_1 - 1.0;
            bessel_i0(beta * (1.0 - r * r).max(0.0).sqrt()) / i0_beta
        })
        .collect()
}

/// Modified Bessel function of the first kind, order zero (power series).
fn bessel_i0(x: f64) -> f64 {
    let half_sq = (x / 2.0) * (x / 2.0);
    let mut term = 1.0;
    let mut sum = 1.0;
    for k in 1..64 {
        term *= half_sq / (k * k) as f64;
        sum += term;
        if term < sum * 1e-17 {
            break;
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    fn real(values: impl IntoIterator<Item = f64>) -> Vec<Complex64> {
        values.into_iter().map(|x| Complex64::new(x, 0.0)).collect()
    }

    #[test]
    fn test_equal_rates_reduce_to_identity() {
        let ratio = ResampleRatio::from_rates(2_048_000.0, 2_048_000.0).unwrap();
        assert_eq!(ratio, ResampleRatio { up: 1, down: 1 });
        assert!(ratio.is_identity());
    }

    #[test]
    fn test_quarter_rate() {
        let ratio = ResampleRatio::from_rates(8_000_000.0, 2_000_000.0).unwrap();
        assert_eq!(ratio, ResampleRatio { up: 1, down: 4 });
    }

    #[test]
    fn test_gnss_rate_ratio() {
        let ratio = ResampleRatio::from_rates(8_000_000.0, 2_048_000.0).unwrap();
        assert_eq!(ratio, ResampleRatio { up: 32, down: 125 });
    }

    #[test]
    fn test_denominator_is_bounded() {
        // 4000/10007 has a prime denominator above the bound
        let (p, q) = limit_denominator(4000, 10007, MAX_DENOMINATOR);
        assert!(q <= MAX_DENOMINATOR);
        let exact = 4000.0 / 10007.0;
        assert!((p as f64 / q as f64 - exact).abs() < 1e-7);
    }

    #[test]
    fn test_limit_denominator_picks_closest_bound() {
        assert_eq!(limit_denominator(314159, 100000, 100), (311, 99));
        assert_eq!(limit_denominator(3, 9, 8192), (1, 3));
    }

    #[test]
    fn test_ratio_rounding_to_zero_is_rejected() {
        assert!(matches!(
            ResampleRatio::from_rates(100_000_000.0, 1.0),
            Err(ConvertError::Configuration(_))
        ));
        assert!(ResampleRatio::from_rates(0.0, 1.0).is_err());
        assert!(ResampleRatio::from_rates(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_output_len_rounds_up() {
        let ratio = ResampleRatio { up: 1, down: 4 };
        assert_eq!(ratio.output_len(10), 3);
        assert_eq!(ratio.output_len(8), 2);
        assert_eq!(ResampleRatio { up: 3, down: 2 }.output_len(5), 8);
    }

    #[test]
    fn test_identity_copies() {
        let resampler = RationalResampler::new(ResampleRatio { up: 1, down: 1 });
        let input = vec![Complex64::new(0.1, 0.2), Complex64::new(-0.3, 0.4)];
        assert_eq!(resampler.process(&input), input);
        assert!(resampler.process(&[]).is_empty());
    }

    #[test]
    fn test_decimation_follows_a_ramp() {
        let resampler = RationalResampler::new(ResampleRatio { up: 1, down: 4 });
        let input = real((0..400).map(|i| i as f64 * 0.001));
        let out = resampler.process(&input);
        assert_eq!(out.len(), 100);
        for (j, y) in out.iter().enumerate() {
            assert!((y.re - 0.004 * j as f64).abs() < 1e-9, "output {j}: {}", y.re);
            assert!(y.im.abs() < 1e-12);
        }
    }

    #[test]
    fn test_filter_has_unit_dc_gain() {
        let taps = design_lowpass(81, 0.25, KAISER_BETA);
        let sum: f64 = taps.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        // symmetric
        for i in 0..40 {
            assert!((taps[i] - taps[80 - i]).abs() < 1e-15);
        }
    }

    #[test]
    fn test_interpolation_keeps_constant_level() {
        let resampler = RationalResampler::new(ResampleRatio { up: 2, down: 1 });
        let input = vec![Complex64::new(0.5, -0.25); 64];
        let out = resampler.process(&input);
        assert_eq!(out.len(), 128);
        for y in &out {
            assert!((y - Complex64::new(0.5, -0.25)).norm() < 1e-2);
        }
    }

    #[test]
    fn test_single_sample_chunk() {
        let resampler = RationalResampler::new(ResampleRatio { up: 1, down: 4 });
        let out = resampler.process(&[Complex64::new(0.2, 0.0)]);
        assert_eq!(out.len(), 1);
        assert!((out[0].re - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_kaiser_window_shape() {
        let w = kaiser_window(11, KAISER_BETA);
        assert!((w[5] - 1.0).abs() < 1e-15);
        assert!((w[0] - 1.0 / bessel_i0(KAISER_BETA)).abs() < 1e-15);
        assert!(w.windows(2).take(5).all(|p| p[0] < p[1]));
    }
}
