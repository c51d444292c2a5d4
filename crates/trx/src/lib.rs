//! # trx -- Timed sample I/O for software-defined transceivers
//!
//! `trx` moves IQ samples between a timed radio peripheral and a baseband
//! signal-processing pipeline that runs at a different, rationally related
//! rate. It is designed for burst-oriented transceivers such as a GSM base
//! station, where every transmit sample must land at an exact device time
//! and every received sample must be addressable by device time.
//!
//! ## Quick Start
//!
//! Open a session on a peripheral and run the I/O loop:
//!
//! ```no_run
//! use std::sync::Arc;
//! use trx::{AlwaysOn, RadioIoLoop, SessionBuilder, baseband_channels};
//! # use trx::RadioDevice;
//!
//! # async fn example(device: Arc<dyn RadioDevice>) -> trx::Result<()> {
//! let mut session = SessionBuilder::new()
//!     .tx_freq(935.2e6)
//!     .rx_freq(890.2e6)
//!     .build(device)?;
//! session.open().await?;
//! session.start().await?;
//!
//! let (rx_sink, mut demod_input) = baseband_channels(32);
//! let (modulator_output, tx_source) = baseband_channels(32);
//! let mut io = RadioIoLoop::new(session, Arc::new(AlwaysOn), rx_sink, tx_source)?;
//! # let _ = (&mut demod_input, &modulator_output);
//! io.run(tokio_util::sync::CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! The library is organized as a workspace of focused crates:
//!
//! | Crate               | Purpose                                              |
//! |---------------------|------------------------------------------------------|
//! | `trx-core`          | [`RadioDevice`] trait, sample types, events, errors |
//! | `trx-dsp`           | Rational polyphase resampling                        |
//! | `trx-radio`         | Sample ring, device session, I/O loop                |
//! | `trx-test-harness`  | `MockRadio` for hardware-free testing                |
//! | **`trx`**           | This facade crate -- re-exports everything           |
//!
//! ## Feature Flags
//!
//! | Feature | Enables                                   | Default |
//! |---------|-------------------------------------------|---------|
//! | `mock`  | [`mock`] module with the mock peripheral  | no      |
//!
//! ## Session Events
//!
//! Sessions publish [`SessionEvent`]s through a broadcast channel:
//!
//! ```no_run
//! use trx::{DeviceSession, SessionEvent};
//! # async fn example(session: &DeviceSession) {
//! let mut events = session.subscribe();
//! while let Ok(event) = events.recv().await {
//!     match event {
//!         SessionEvent::AlignmentLost { code } => println!("transmit failed: {code}"),
//!         SessionEvent::Realigned { dropped } => println!("realigned after {dropped} packets"),
//!         other => println!("{other:?}"),
//!     }
//! }
//! # }
//! ```

pub use trx_core::*;
pub use trx_radio::{
    AlignmentState, BasebandBuffer, BasebandReceiver, BasebandSender, BufferStatus,
    DeviceSession, RadioIoLoop, SessionBuilder, SessionConfig, TimestampedSampleBuffer,
    WriteReport, baseband_channels,
};

/// Rate conversion.
///
/// Provides [`ResamplingStage`](dsp::ResamplingStage), the per-direction
/// [`Resampler`](dsp::Resampler), and the [`FilterDesign`](dsp::FilterDesign)
/// hook for supplying coefficients.
pub mod dsp {
    pub use trx_dsp::*;
}

/// Device session internals: alignment state machine and builder defaults.
pub mod radio {
    pub use trx_radio::*;
    pub use trx_radio::builder::{
        DEFAULT_EVENT_CAPACITY, DEFAULT_FLUSH_PACKETS, DEFAULT_POLL_TIMEOUT,
        DEFAULT_REALIGN_DROP_COUNT, DEFAULT_RX_BUFFER_BYTES, DEFAULT_RX_SAMPLE_OFFSET_SECS,
    };
}

/// Mock peripheral for tests and demos.
#[cfg(feature = "mock")]
pub mod mock {
    pub use trx_test_harness::*;
}
