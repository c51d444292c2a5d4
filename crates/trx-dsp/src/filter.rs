//! Low-pass coefficient sets for the polyphase resampler.
//!
//! Coefficient design is pluggable through [`FilterDesign`]; the resampler
//! only consumes the finished taps. [`WindowedSinc`] is the stock design.

use std::f64::consts::PI;

use crate::ratio::ResampleRatio;

/// Filter taps per unit of `max(P, Q)`.
pub const TAPS_PER_PHASE: usize = 10;

/// Shape of the anti-imaging/anti-aliasing filter for one ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    /// Total number of taps at the upsampled rate.
    pub taps: usize,
    /// Cutoff as a fraction of the upsampled Nyquist frequency.
    pub cutoff: f64,
    /// Passband gain. Equal to `P` to make up for zero-stuffing.
    pub gain: f64,
}

impl FilterSpec {
    /// Length and cutoff both follow the larger of the two ratio terms.
    pub fn for_ratio(ratio: ResampleRatio) -> Self {
        let widest = ratio.p().max(ratio.q());
        FilterSpec {
            taps: TAPS_PER_PHASE * widest + 1,
            cutoff: 1.0 / widest as f64,
            gain: ratio.p() as f64,
        }
    }
}

/// Source of precomputed low-pass coefficients.
pub trait FilterDesign: Send + Sync {
    /// Produce exactly `spec.taps` coefficients.
    fn design(&self, spec: &FilterSpec) -> Vec<f32>;
}

/// Hamming-windowed sinc low-pass, normalized to the requested DC gain.
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowedSinc;

impl FilterDesign for WindowedSinc {
    fn design(&self, spec: &FilterSpec) -> Vec<f32> {
        let n = spec.taps;
        if n == 0 {
            return Vec::new();
        }
        let middle = (n - 1) as f64 / 2.0;
        let mut taps: Vec<f64> = (0..n)
            .map(|i| {
                let x = i as f64 - middle;
                let window = if n > 1 {
                    0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos()
                } else {
                    1.0
                };
                spec.cutoff * sinc(spec.cutoff * x) * window
            })
            .collect();

        let sum: f64 = taps.iter().sum();
        if sum != 0.0 {
            let scale = spec.gain / sum;
            taps.iter_mut().for_each(|t| *t *= scale);
        }
        taps.into_iter().map(|t| t as f32).collect()
    }
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Coefficients split into `P` polyphase banks.
///
/// Bank `k` holds taps `k, k + P, k + 2P, ...`, so one output sample is a
/// dot product of a single bank against the most recent input samples.
#[derive(Debug, Clone)]
pub struct PolyphaseBank {
    banks: Vec<Vec<f32>>,
}

impl PolyphaseBank {
    pub fn new(taps: &[f32], p: usize) -> Self {
        let banks = (0..p)
            .map(|phase| taps.iter().skip(phase).step_by(p).copied().collect())
            .collect();
        PolyphaseBank { banks }
    }

    pub fn phase(&self, phase: usize) -> &[f32] {
        &self.banks[phase]
    }

    pub fn phases(&self) -> usize {
        self.banks.len()
    }

    /// Longest bank, i.e. how many past input samples an output depends on.
    pub fn span(&self) -> usize {
        self.banks.iter().map(Vec::len).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_follows_widest_term() {
        let rx = FilterSpec::for_ratio(ResampleRatio::new(65, 96).unwrap());
        assert_eq!(rx.taps, 961);
        assert!((rx.cutoff - 1.0 / 96.0).abs() < 1e-12);
        assert_eq!(rx.gain, 65.0);

        let tx = FilterSpec::for_ratio(ResampleRatio::new(96, 65).unwrap());
        assert_eq!(tx.taps, 961);
        assert_eq!(tx.gain, 96.0);
    }

    #[test]
    fn windowed_sinc_gain_and_symmetry() {
        let spec = FilterSpec::for_ratio(ResampleRatio::new(3, 2).unwrap());
        let taps = WindowedSinc.design(&spec);
        assert_eq!(taps.len(), 31);

        let sum: f32 = taps.iter().sum();
        assert!((sum - 3.0).abs() < 1e-4, "sum = {sum}");

        for i in 0..taps.len() / 2 {
            assert!((taps[i] - taps[taps.len() - 1 - i]).abs() < 1e-6);
        }
        // Peak at the centre.
        let centre = taps[15];
        assert!(taps.iter().all(|&t| t <= centre));
    }

    #[test]
    fn polyphase_bank_split() {
        let taps: Vec<f32> = (0..7).map(|i| i as f32).collect();
        let bank = PolyphaseBank::new(&taps, 3);
        assert_eq!(bank.phases(), 3);
        assert_eq!(bank.phase(0), &[0.0, 3.0, 6.0]);
        assert_eq!(bank.phase(1), &[1.0, 4.0]);
        assert_eq!(bank.phase(2), &[2.0, 5.0]);
        assert_eq!(bank.span(), 3);
    }
}
