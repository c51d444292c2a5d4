//! The `RadioDevice` trait -- vendor capability interface for a timed
//! sample peripheral.
//!
//! Each hardware backend supplies one implementation, selected when the
//! session is built. The session layer (`trx-radio`) operates on
//! `Arc<dyn RadioDevice>`, enabling both real hardware and deterministic
//! unit testing with `MockRadio` from the `trx-test-harness` crate.
//!
//! Packetization below this interface is opaque: the driver hands over whole
//! packets of samples with a device timestamp, accepts timed transmit
//! packets, and reports transmit completions on a separate event stream.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::events::{AsyncEvent, RecvPacket};
use crate::types::{BurstFlags, Direction, GainRange, IqSample, Timestamp};

/// Asynchronous timed-sample interface to a radio peripheral.
///
/// Methods take `&self` because two activities use the device at once: the
/// I/O loop sends and receives samples while the completion monitor polls
/// [`poll_async_event`](RadioDevice::poll_async_event). Implementations
/// handle their own internal synchronization.
///
/// `timed_recv` and `timed_send` block for as long as the vendor call
/// blocks; no timeout is layered on top of them.
#[async_trait]
pub trait RadioDevice: Send + Sync {
    /// Acquire the hardware handle.
    async fn open(&self) -> Result<()>;

    /// Zero the device clock and begin continuous streaming.
    async fn start(&self) -> Result<()>;

    /// Stop streaming.
    async fn stop(&self) -> Result<()>;

    /// Request a sample rate in hertz; returns the rate actually applied.
    async fn set_rate(&self, direction: Direction, rate_hz: f64) -> Result<f64>;

    /// Tune the given direction; returns the frequency actually tuned.
    async fn set_freq(&self, direction: Direction, freq_hz: f64) -> Result<f64>;

    /// Set the gain in dB; returns the gain actually applied.
    async fn set_gain(&self, direction: Direction, gain_db: f64) -> Result<f64>;

    /// Gain range of the given direction.
    ///
    /// Devices without adjustable gain report a zero-width range.
    async fn gain_range(&self, _direction: Direction) -> Result<GainRange> {
        Ok(GainRange {
            min_db: 0.0,
            max_db: 0.0,
        })
    }

    /// Largest number of samples a single receive packet can carry.
    fn max_recv_samples_per_packet(&self) -> usize;

    /// Send one packet whose first sample is due at `timestamp`.
    ///
    /// Returns the number of samples the device accepted.
    async fn timed_send(
        &self,
        samples: &[IqSample],
        timestamp: Timestamp,
        flags: BurstFlags,
    ) -> Result<usize>;

    /// Receive one packet into `buf`.
    ///
    /// A packet with `count == 0` signals a receive failure described by
    /// its error code.
    async fn timed_recv(&self, buf: &mut [IqSample]) -> Result<RecvPacket>;

    /// Wait up to `timeout` for the next asynchronous completion event.
    ///
    /// Returns `Ok(None)` when nothing arrived in time.
    async fn poll_async_event(&self, timeout: Duration) -> Result<Option<AsyncEvent>>;
}
