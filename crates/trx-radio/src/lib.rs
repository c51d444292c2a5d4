//! trx-radio: device sessions and the radio I/O loop.
//!
//! This crate sits between a [`RadioDevice`](trx_core::RadioDevice) and the
//! baseband signal-processing code:
//!
//! - [`TimestampedSampleBuffer`] holds received device samples addressed by
//!   device time.
//! - [`DeviceSession`] owns the device, performs timestamped reads and
//!   writes, and runs the transmit-completion monitor that drives
//!   [`AlignmentState`].
//! - [`RadioIoLoop`] moves data between the session and the baseband queues
//!   through the resampling stage, honoring the transmit gate.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use trx_core::AlwaysOn;
//! use trx_radio::{RadioIoLoop, SessionBuilder, baseband_channels};
//! use trx_test_harness::MockRadio;
//!
//! # async fn example() -> trx_core::Result<()> {
//! let mut session = SessionBuilder::new().build(Arc::new(MockRadio::new()))?;
//! session.open().await?;
//! session.start().await?;
//!
//! let (rx_sink, _rx_out) = baseband_channels(16);
//! let (_tx_in, tx_source) = baseband_channels(16);
//! let mut io = RadioIoLoop::new(session, Arc::new(AlwaysOn), rx_sink, tx_source)?;
//! io.run(CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod alignment;
pub mod baseband;
pub mod builder;
pub mod io_loop;
pub(crate) mod monitor;
pub mod sample_buffer;
pub mod session;

pub use alignment::{AlignmentState, TxAlignment, WriteDecision};
pub use baseband::{BasebandBuffer, BasebandReceiver, BasebandSender, baseband_channels};
pub use builder::{SessionBuilder, SessionConfig};
pub use io_loop::RadioIoLoop;
pub use sample_buffer::{BufferStatus, TimestampedSampleBuffer};
pub use session::{DeviceSession, WriteReport};
