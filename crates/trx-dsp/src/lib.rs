//! trx-dsp: Rate conversion between the device and baseband sample rates.
//!
//! The device runs at its native clock (e.g. 400 kHz) while the baseband
//! pipeline runs at the air-interface symbol rate (e.g. 1625/6 kHz). This
//! crate converts between them with a rational polyphase resampler that
//! carries filter history across calls, so arbitrarily split input produces
//! the same output as one contiguous block.
//!
//! # Key types
//!
//! - [`ResamplingStage`] -- receive and transmit converters plus sample
//!   format conversion
//! - [`Resampler`] -- one streaming direction
//! - [`ResampleRatio`] -- a reduced `P/Q` ratio
//! - [`FilterDesign`] -- coefficient provider, with [`WindowedSinc`] as the
//!   stock design

pub mod filter;
pub mod polyphase;
pub mod ratio;
pub mod resampler;
pub mod stage;

pub use filter::{FilterDesign, FilterSpec, PolyphaseBank, WindowedSinc};
pub use ratio::ResampleRatio;
pub use resampler::Resampler;
pub use stage::ResamplingStage;
