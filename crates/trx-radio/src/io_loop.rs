//! RadioIoLoop -- the receive and transmit cycles between device and
//! baseband.
//!
//! One pull cycle reads a fixed chunk of device samples at the read cursor,
//! converts it to the baseband rate, and queues it for the demodulator. One
//! push cycle takes a queued transmit block, converts it to the device rate,
//! and writes it at the write cursor. Both cursors are in device time.

use std::sync::Arc;

use num_complex::Complex32;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use trx_core::error::{Error, Result};
use trx_core::gate::TxGate;
use trx_core::types::{IqSample, Timestamp};
use trx_dsp::{FilterDesign, ResamplingStage};

use crate::baseband::{BasebandBuffer, BasebandReceiver, BasebandSender};
use crate::session::DeviceSession;

/// Drives a started [`DeviceSession`] in both directions.
pub struct RadioIoLoop {
    session: DeviceSession,
    stage: ResamplingStage,
    gate: Arc<dyn TxGate>,
    rx_queue: BasebandSender,
    tx_queue: BasebandReceiver,
    tx_open: bool,
    read_cursor: Timestamp,
    write_cursor: Timestamp,
    rx_chunk: Vec<IqSample>,
    tx_converted: Vec<IqSample>,
}

impl RadioIoLoop {
    /// Build a loop using the stock resampling filter.
    ///
    /// `rx_queue` receives converted blocks; `tx_queue` supplies blocks to
    /// transmit. Both cursors start at zero.
    pub fn new(
        session: DeviceSession,
        gate: Arc<dyn TxGate>,
        rx_queue: BasebandSender,
        tx_queue: BasebandReceiver,
    ) -> Result<Self> {
        let config = session.config();
        let stage = ResamplingStage::new(config.device_rate, config.baseband_rate)?;
        Self::with_stage(session, stage, gate, rx_queue, tx_queue)
    }

    /// Build a loop whose resamplers use coefficients from `design`.
    pub fn with_design(
        session: DeviceSession,
        design: Arc<dyn FilterDesign>,
        gate: Arc<dyn TxGate>,
        rx_queue: BasebandSender,
        tx_queue: BasebandReceiver,
    ) -> Result<Self> {
        let config = session.config();
        let stage = ResamplingStage::with_design(config.device_rate, config.baseband_rate, design)?;
        Self::with_stage(session, stage, gate, rx_queue, tx_queue)
    }

    fn with_stage(
        session: DeviceSession,
        stage: ResamplingStage,
        gate: Arc<dyn TxGate>,
        rx_queue: BasebandSender,
        tx_queue: BasebandReceiver,
    ) -> Result<Self> {
        let chunk = stage.rx_input_chunk();
        let capacity = session.config().rx_buffer_samples();
        if chunk >= capacity {
            return Err(Error::InvalidParameter(format!(
                "receive chunk of {chunk} samples does not fit a {capacity}-sample buffer"
            )));
        }
        debug!(
            rx_ratio = %stage.rx_ratio(),
            tx_ratio = %stage.tx_ratio(),
            chunk,
            "radio I/O loop ready"
        );

        Ok(RadioIoLoop {
            session,
            stage,
            gate,
            rx_queue,
            tx_queue,
            tx_open: true,
            read_cursor: 0,
            write_cursor: 0,
            rx_chunk: vec![IqSample::ZERO; chunk],
            tx_converted: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Cycles
    // ------------------------------------------------------------------

    /// Read one chunk at the read cursor and queue its baseband conversion.
    ///
    /// Returns the number of device samples consumed. A read that cannot
    /// deliver the whole chunk aborts the cycle with the cursor unchanged.
    /// A cursor that has fallen behind the receive window jumps to the
    /// window start once before the cycle gives up.
    pub async fn pull_buffer(&mut self) -> Result<usize> {
        let chunk = self.rx_chunk.len();
        let received = match self
            .session
            .read_samples(&mut self.rx_chunk, self.read_cursor)
            .await
        {
            Ok(n) => n,
            Err(Error::StaleTimestamp { window_start, .. }) => {
                let resync = window_start.saturating_sub(self.session.rx_offset());
                warn!(
                    from = self.read_cursor,
                    to = resync,
                    "read cursor behind receive window, resynchronizing"
                );
                self.read_cursor = resync;
                self.session
                    .read_samples(&mut self.rx_chunk, self.read_cursor)
                    .await?
            }
            Err(e) => return Err(e),
        };
        if received != chunk {
            return Err(Error::ShortRead {
                requested: chunk,
                received,
            });
        }

        let timestamp = self.read_cursor;
        self.read_cursor += received as u64;

        let mut converted: Vec<Complex32> = Vec::new();
        let produced = self.stage.rx_convert(&self.rx_chunk, &mut converted);
        debug!(timestamp, received, produced, "pull cycle");
        if produced > 0 {
            self.rx_queue
                .send(BasebandBuffer::new(converted, timestamp))
                .await?;
        }
        Ok(received)
    }

    /// Wait for one queued transmit block and push it.
    ///
    /// Returns [`Error::StreamClosed`] once the transmit queue is closed and
    /// drained.
    pub async fn push_buffer(&mut self) -> Result<usize> {
        let block = self.tx_queue.recv().await.ok_or(Error::StreamClosed)?;
        self.push_block(block).await
    }

    /// Convert `block` and write it at the write cursor.
    ///
    /// Returns the number of device samples the write cursor advanced by.
    /// With the gate closed the write is skipped but the cursor still
    /// advances, keeping the transmit stream in step with the device clock.
    async fn push_block(&mut self, block: BasebandBuffer) -> Result<usize> {
        self.tx_converted.clear();
        let produced = self.stage.tx_convert(&block.samples, &mut self.tx_converted);
        if produced == 0 {
            debug!(
                queued = block.len(),
                pending = self.stage.tx_pending(),
                "transmit block below one chunk"
            );
            return Ok(0);
        }

        let timestamp = self.write_cursor;
        if self.gate.enabled() {
            let report = self
                .session
                .write_samples(&self.tx_converted, timestamp)
                .await?;
            debug!(
                timestamp,
                produced,
                sent = report.samples,
                underrun = report.underrun,
                "push cycle"
            );
        } else {
            debug!(timestamp, produced, "push cycle gated off");
        }
        self.write_cursor += produced as u64;
        Ok(produced)
    }

    /// Push every transmit block already queued, without waiting.
    async fn drain_tx(&mut self) -> Result<()> {
        while self.tx_open {
            match self.tx_queue.try_recv() {
                Ok(Some(block)) => {
                    self.push_block(block).await?;
                }
                Ok(None) => break,
                Err(Error::StreamClosed) => {
                    debug!("transmit queue closed");
                    self.tx_open = false;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Alternate pull cycles with draining the transmit queue until
    /// `cancel` fires or a cycle fails.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    debug!("radio I/O loop cancelled");
                    return Ok(());
                }

                pulled = self.pull_buffer() => {
                    pulled?;
                }
            }
            self.drain_tx().await?;
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Device time of the next sample to read.
    pub fn read_cursor(&self) -> Timestamp {
        self.read_cursor
    }

    /// Device time of the next sample to transmit.
    pub fn write_cursor(&self) -> Timestamp {
        self.write_cursor
    }

    pub fn set_read_cursor(&mut self, timestamp: Timestamp) {
        self.read_cursor = timestamp;
    }

    /// Place the transmit stream ahead of the receive stream.
    pub fn set_write_cursor(&mut self, timestamp: Timestamp) {
        self.write_cursor = timestamp;
    }

    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut DeviceSession {
        &mut self.session
    }

    pub fn stage(&self) -> &ResamplingStage {
        &self.stage
    }

    /// Give the session back, e.g. to stop and close it.
    pub fn into_session(self) -> DeviceSession {
        self.session
    }
}
