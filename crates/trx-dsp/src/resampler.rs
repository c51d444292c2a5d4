//! Streaming single-direction resampler with carried filter history.
//!
//! Input is accumulated until at least one whole chunk is present. Every
//! whole chunk is then converted in one pass over `history + chunks`, the
//! leading output that corresponds to the history is discarded, and the
//! tail of the consumed input becomes the next history. The history always
//! covers the longest polyphase bank and is a whole number of blocks, so
//! output depends only on the concatenated input sequence, not on how
//! callers split it across calls.

use num_complex::Complex32;
use tracing::debug;

use crate::filter::{FilterDesign, FilterSpec, PolyphaseBank};
use crate::polyphase;
use crate::ratio::ResampleRatio;

/// Minimum history carried between calls, in conversion blocks of `Q` input
/// samples. Grows to cover the filter when its span is longer.
pub const HISTORY_BLOCKS: usize = 2;

/// Input consumed per chunk, in conversion blocks of `Q` input samples.
pub const CHUNK_BLOCKS: usize = 9;

/// One direction of rate conversion.
///
/// Not shareable across callers: every call for a direction must go through
/// the same instance or history continuity is lost.
#[derive(Debug)]
pub struct Resampler {
    ratio: ResampleRatio,
    bank: PolyphaseBank,
    chunk_len: usize,
    history: Vec<Complex32>,
    pending: Vec<Complex32>,
    work: Vec<Complex32>,
    converted: Vec<Complex32>,
}

impl Resampler {
    /// Build a resampler for `ratio`, computing its coefficients once.
    pub fn new(ratio: ResampleRatio, design: &dyn FilterDesign) -> Self {
        let spec = FilterSpec::for_ratio(ratio);
        let taps = design.design(&spec);
        let bank = PolyphaseBank::new(&taps, ratio.p());
        let q = ratio.q();
        let history_len = history_samples(q, bank.span());
        debug!(%ratio, taps = taps.len(), history_len, "resampler coefficients ready");

        Resampler {
            ratio,
            bank,
            chunk_len: CHUNK_BLOCKS * q,
            history: vec![Complex32::new(0.0, 0.0); history_len],
            pending: Vec::new(),
            work: Vec::new(),
            converted: Vec::new(),
        }
    }

    pub fn ratio(&self) -> ResampleRatio {
        self.ratio
    }

    /// Input samples consumed per chunk.
    pub fn input_chunk(&self) -> usize {
        self.chunk_len
    }

    /// Output samples produced per chunk.
    pub fn output_chunk(&self) -> usize {
        self.ratio.output_len(self.chunk_len)
    }

    /// Input samples of history carried between calls.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Input samples waiting for a chunk boundary.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Append `input` and convert every whole chunk now available.
    ///
    /// Converted samples are appended to `output`; the return value is how
    /// many were appended (zero while below a chunk boundary).
    pub fn process(&mut self, input: &[Complex32], output: &mut Vec<Complex32>) -> usize {
        self.pending.extend_from_slice(input);

        let chunks = self.pending.len() / self.chunk_len;
        if chunks == 0 {
            return 0;
        }
        let consumed = chunks * self.chunk_len;

        self.work.clear();
        self.work.extend_from_slice(&self.history);
        self.work.extend_from_slice(&self.pending[..consumed]);

        self.converted.clear();
        polyphase::resample_into(&self.work, self.ratio, &self.bank, &mut self.converted);

        // The history only provided filter context.
        let skip = self.ratio.output_len(self.history.len());
        let fresh = &self.converted[skip..];
        output.extend_from_slice(fresh);

        let hist_len = self.history.len();
        self.history
            .copy_from_slice(&self.pending[consumed - hist_len..consumed]);
        self.pending.drain(..consumed);

        fresh.len()
    }
}

/// Input samples of history for decimation `q` and a filter reaching back
/// `span` input samples, rounded up to whole blocks.
fn history_samples(q: usize, span: usize) -> usize {
    let blocks = HISTORY_BLOCKS.max(span.div_ceil(q));
    blocks * q
}
