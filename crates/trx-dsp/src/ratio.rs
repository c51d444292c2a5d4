//! Rational interpolation/decimation ratios.

use std::fmt;

use trx_core::error::{Error, Result};
use trx_core::types::{SampleRate, gcd};

/// Largest interpolation or decimation factor accepted.
///
/// Filter length grows linearly with `max(P, Q)`; beyond this the
/// coefficient set and per-call work become unreasonable.
pub const MAX_RATIO_TERM: usize = 4096;

/// Interpolate by `p`, then decimate by `q`. Always in lowest terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResampleRatio {
    p: usize,
    q: usize,
}

impl ResampleRatio {
    /// A ratio of `p / q`, reduced to lowest terms.
    pub fn new(p: usize, q: usize) -> Result<Self> {
        if p == 0 || q == 0 {
            return Err(Error::InvalidParameter(format!(
                "resample ratio {p}/{q} has a zero term"
            )));
        }
        let g = gcd(p as u128, q as u128) as usize;
        Self::checked(p / g, q / g)
    }

    /// The ratio that converts a stream at `from` into one at `to`.
    pub fn between(from: SampleRate, to: SampleRate) -> Result<Self> {
        // to / from = (to.num * from.den) / (to.den * from.num)
        let p = to.numerator() as u128 * from.denominator() as u128;
        let q = to.denominator() as u128 * from.numerator() as u128;
        let g = gcd(p, q);
        let (p, q) = (p / g, q / g);
        if p > MAX_RATIO_TERM as u128 || q > MAX_RATIO_TERM as u128 {
            return Err(Error::InvalidParameter(format!(
                "ratio {from} -> {to} reduces to {p}/{q}, beyond the {MAX_RATIO_TERM} term limit"
            )));
        }
        Self::checked(p as usize, q as usize)
    }

    fn checked(p: usize, q: usize) -> Result<Self> {
        if p > MAX_RATIO_TERM || q > MAX_RATIO_TERM {
            return Err(Error::InvalidParameter(format!(
                "resample ratio {p}/{q} exceeds the {MAX_RATIO_TERM} term limit"
            )));
        }
        Ok(ResampleRatio { p, q })
    }

    /// Interpolation factor.
    pub fn p(&self) -> usize {
        self.p
    }

    /// Decimation factor.
    pub fn q(&self) -> usize {
        self.q
    }

    /// The reverse conversion.
    pub fn inverse(&self) -> Self {
        ResampleRatio {
            p: self.q,
            q: self.p,
        }
    }

    /// Number of output samples produced from `input_len` input samples.
    pub fn output_len(&self, input_len: usize) -> usize {
        input_len * self.p / self.q
    }
}

impl fmt::Display for ResampleRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.p, self.q)
    }
}
