//! Polyphase rational resampling kernel.
//!
//! Conceptually the input is zero-stuffed by `P`, low-pass filtered, and
//! every `Q`-th sample kept. The polyphase form skips the zeros: output `n`
//! sits at upsampled index `m = n * Q`, uses bank `m % P`, and reads input
//! samples backwards from `m / P`.

use num_complex::Complex32;

use crate::filter::PolyphaseBank;
use crate::ratio::ResampleRatio;

/// Resample `input` by `ratio`, appending `floor(len * P / Q)` samples to
/// `output`.
///
/// Samples before the start of `input` are treated as zero; callers that
/// need continuity prepend their own history.
pub fn resample_into(
    input: &[Complex32],
    ratio: ResampleRatio,
    bank: &PolyphaseBank,
    output: &mut Vec<Complex32>,
) {
    let (p, q) = (ratio.p(), ratio.q());
    let out_len = ratio.output_len(input.len());
    output.reserve(out_len);

    for n in 0..out_len {
        let m = n * q;
        let newest = m / p;
        let coeffs = bank.phase(m % p);

        let mut acc = Complex32::new(0.0, 0.0);
        for (j, &h) in coeffs.iter().enumerate().take(newest + 1) {
            acc += input[newest - j] * h;
        }
        output.push(acc);
    }
}
