//! Baseband sample queues between the I/O loop and signal processing.
//!
//! Baseband data flows through [`tokio::sync::mpsc`] channels wrapped in
//! [`BasebandReceiver`] and [`BasebandSender`]:
//!
//! - **RX** (from the device): the I/O loop pushes converted
//!   [`BasebandBuffer`]s; the demodulator reads them.
//! - **TX** (to the device): the modulator pushes [`BasebandBuffer`]s; the
//!   I/O loop drains them, converts, and writes to the device.
//!
//! Channels are bounded. A full RX queue makes the I/O loop wait, which in
//! turn lets the device-side ring absorb the backlog.

use num_complex::Complex32;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

use trx_core::error::{Error, Result};
use trx_core::types::Timestamp;

// ---------------------------------------------------------------------------
// BasebandBuffer
// ---------------------------------------------------------------------------

/// A block of baseband samples.
///
/// `timestamp` is the device time of the first device sample the block was
/// converted from (RX) or is intended for (TX). Resampler latency is not
/// subtracted, and the I/O loop keeps its own transmit cursor, so TX
/// timestamps are informational.
#[derive(Debug, Clone, PartialEq)]
pub struct BasebandBuffer {
    pub samples: Vec<Complex32>,
    pub timestamp: Timestamp,
}

impl BasebandBuffer {
    pub fn new(samples: Vec<Complex32>, timestamp: Timestamp) -> Self {
        BasebandBuffer { samples, timestamp }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

// ---------------------------------------------------------------------------
// BasebandReceiver
// ---------------------------------------------------------------------------

/// Receiving end of a baseband queue.
///
/// The stream ends when every sender has been dropped, at which point
/// [`recv()`](BasebandReceiver::recv) returns `None`.
#[derive(Debug)]
pub struct BasebandReceiver {
    rx: mpsc::Receiver<BasebandBuffer>,
}

impl BasebandReceiver {
    pub fn new(rx: mpsc::Receiver<BasebandBuffer>) -> Self {
        BasebandReceiver { rx }
    }

    /// Wait for the next block. `None` once the queue is closed and empty.
    pub async fn recv(&mut self) -> Option<BasebandBuffer> {
        self.rx.recv().await
    }

    /// Take the next block if one is queued.
    ///
    /// `Ok(None)` when the queue is empty, [`Error::StreamClosed`] once it is
    /// closed and drained.
    pub fn try_recv(&mut self) -> Result<Option<BasebandBuffer>> {
        match self.rx.try_recv() {
            Ok(buffer) => Ok(Some(buffer)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::StreamClosed),
        }
    }
}

// ---------------------------------------------------------------------------
// BasebandSender
// ---------------------------------------------------------------------------

/// Sending end of a baseband queue.
///
/// When the receiver is dropped, [`send()`](BasebandSender::send) returns
/// [`Error::StreamClosed`].
#[derive(Debug, Clone)]
pub struct BasebandSender {
    tx: mpsc::Sender<BasebandBuffer>,
}

impl BasebandSender {
    pub fn new(tx: mpsc::Sender<BasebandBuffer>) -> Self {
        BasebandSender { tx }
    }

    /// Queue a block, waiting for space if the queue is full.
    pub async fn send(&self, buffer: BasebandBuffer) -> Result<()> {
        self.tx.send(buffer).await.map_err(|_| Error::StreamClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Build a bounded baseband queue holding up to `depth` blocks.
pub fn baseband_channels(depth: usize) -> (BasebandSender, BasebandReceiver) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (BasebandSender::new(tx), BasebandReceiver::new(rx))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
