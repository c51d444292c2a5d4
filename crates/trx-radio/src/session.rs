//! DeviceSession -- timestamped sample I/O over one radio peripheral.
//!
//! The session owns the receive ring, the transmit alignment state, and the
//! completion-monitor task. Receive packets are pulled from the device only
//! as far as a read needs them; transmit packets go straight to the device
//! unless the transmitter is realigning.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use trx_core::device::RadioDevice;
use trx_core::error::{Error, Result};
use trx_core::events::SessionEvent;
use trx_core::types::{BurstFlags, Direction, IqSample, SampleRate, Timestamp, secs_to_timestamp};

use crate::alignment::{AlignmentState, TxAlignment, WriteDecision};
use crate::builder::SessionConfig;
use crate::monitor::{EventMonitor, spawn_event_monitor};
use crate::sample_buffer::{BufferStatus, TimestampedSampleBuffer};

/// Largest difference between requested and applied rate still accepted.
const RATE_TOLERANCE_HZ: f64 = 1e-3;

/// Outcome of one [`DeviceSession::write_samples`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    /// Samples accounted for: accepted by the device, or the full length of
    /// a dropped packet.
    pub samples: usize,
    /// The packet was dropped to realign the transmitter.
    pub underrun: bool,
    /// The packet was sent as the start of a new burst.
    pub burst_start: bool,
    /// Running drop count for a dropped packet, or the number of packets
    /// dropped before a burst start.
    pub dropped: u32,
}

/// A timed-sample session on one radio peripheral.
///
/// Lifecycle is `new` -> [`open`](Self::open) -> [`start`](Self::start) ->
/// reads and writes -> [`stop`](Self::stop) -> [`close`](Self::close).
/// Reads and writes take `&mut self`: one I/O loop drives a session, and
/// only the completion monitor runs beside it.
pub struct DeviceSession {
    device: Arc<dyn RadioDevice>,
    config: SessionConfig,
    rate_hz: f64,
    opened: bool,
    streaming: bool,
    rx_offset: Timestamp,
    rx_buffer: Option<TimestampedSampleBuffer>,
    recv_scratch: Vec<IqSample>,
    last_packet_ts: Option<Timestamp>,
    packets_received: u64,
    alignment: Arc<TxAlignment>,
    monitor: Option<EventMonitor>,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl DeviceSession {
    /// Create an unopened session. Prefer [`SessionBuilder`](crate::SessionBuilder).
    pub fn new(device: Arc<dyn RadioDevice>, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(config.event_capacity);
        Ok(DeviceSession {
            device,
            rate_hz: config.device_rate.as_hz(),
            alignment: Arc::new(TxAlignment::new(config.realign_drop_count)),
            config,
            opened: false,
            streaming: false,
            rx_offset: 0,
            rx_buffer: None,
            recv_scratch: Vec::new(),
            last_packet_ts: None,
            packets_received: 0,
            monitor: None,
            event_tx,
        })
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open the device, negotiate rates, apply tuning and gains, and
    /// allocate the receive ring.
    pub async fn open(&mut self) -> Result<()> {
        if self.opened {
            return Ok(());
        }
        self.device.open().await?;

        let requested = self.rate_hz;
        let tx = self.device.set_rate(Direction::Tx, requested).await?;
        let rx = self.device.set_rate(Direction::Rx, requested).await?;
        if (tx - requested).abs() > RATE_TOLERANCE_HZ
            || (rx - requested).abs() > RATE_TOLERANCE_HZ
            || (tx - rx).abs() > RATE_TOLERANCE_HZ
        {
            error!(requested, tx, rx, "actual sample rate differs from desired rate");
            return Err(Error::RateMismatch { requested, tx, rx });
        }

        if let Some(freq) = self.config.tx_freq_hz {
            self.set_freq(Direction::Tx, freq).await?;
        }
        if let Some(freq) = self.config.rx_freq_hz {
            self.set_freq(Direction::Rx, freq).await?;
        }
        for (direction, configured) in [
            (Direction::Tx, self.config.tx_gain_db),
            (Direction::Rx, self.config.rx_gain_db),
        ] {
            let gain = match configured {
                Some(db) => db,
                None => self.device.gain_range(direction).await?.midpoint(),
            };
            self.set_gain(direction, gain).await?;
        }

        self.rx_offset = secs_to_timestamp(self.config.rx_sample_offset_secs, self.rate_hz);
        let capacity = self.config.rx_buffer_samples();
        self.rx_buffer = Some(TimestampedSampleBuffer::new(capacity, self.rate_hz)?);
        self.recv_scratch = vec![IqSample::ZERO; self.device.max_recv_samples_per_packet()];
        self.opened = true;

        info!(
            rate = %self.config.device_rate,
            rx_offset = self.rx_offset,
            capacity,
            "device session open"
        );
        Ok(())
    }

    /// Launch the completion monitor, start streaming, and discard the
    /// first `flush_packets` packets.
    pub async fn start(&mut self) -> Result<()> {
        if !self.opened {
            return Err(Error::NotOpen);
        }
        if self.streaming {
            return Err(Error::AlreadyStarted);
        }

        self.monitor = Some(spawn_event_monitor(
            self.device.clone(),
            self.alignment.clone(),
            self.event_tx.clone(),
            self.config.poll_timeout,
        ));
        if let Err(e) = self.device.start().await {
            error!("device start failed: {e}");
            if let Some(monitor) = self.monitor.take() {
                monitor.shutdown().await;
            }
            return Err(e);
        }
        self.streaming = true;

        // The device clock restarts at zero.
        if let Some(buf) = self.rx_buffer.as_mut() {
            buf.clear();
        }
        self.last_packet_ts = None;

        if let Err(e) = self.flush().await {
            error!("initial receive flush failed: {e}");
            let _ = self.stop().await;
            return Err(e);
        }

        info!(flushed = self.config.flush_packets, "device session started");
        let _ = self.event_tx.send(SessionEvent::Started);
        Ok(())
    }

    async fn flush(&mut self) -> Result<()> {
        for _ in 0..self.config.flush_packets {
            let packet = self.device.timed_recv(&mut self.recv_scratch).await?;
            if packet.count == 0 {
                return Err(Error::DeviceComm(format!(
                    "receive flush failed: {}",
                    packet.error
                )));
            }
        }
        Ok(())
    }

    /// Cancel the completion monitor, wait for it, and stop streaming.
    ///
    /// No read or write may be in flight.
    pub async fn stop(&mut self) -> Result<()> {
        if !self.streaming {
            return Err(Error::NotStarted);
        }
        if let Some(monitor) = self.monitor.take() {
            monitor.shutdown().await;
        }
        self.streaming = false;
        self.device.stop().await?;

        info!("device session stopped");
        let _ = self.event_tx.send(SessionEvent::Stopped);
        Ok(())
    }

    /// Stop if streaming and release the receive ring.
    pub async fn close(&mut self) -> Result<()> {
        if self.streaming {
            self.stop().await?;
        }
        self.rx_buffer = None;
        self.recv_scratch = Vec::new();
        self.opened = false;
        debug!("device session closed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Sample I/O
    // ------------------------------------------------------------------

    /// Fill `dst` with the samples starting at `timestamp`.
    ///
    /// `timestamp` is in receive time; the configured receive offset is added
    /// before the ring is consulted. Packets are pulled from the device until
    /// the ring holds enough samples. Ring overflow is logged and tolerated.
    pub async fn read_samples(
        &mut self,
        dst: &mut [IqSample],
        timestamp: Timestamp,
    ) -> Result<usize> {
        if !self.opened {
            return Err(Error::NotOpen);
        }
        let Some(buffer) = self.rx_buffer.as_mut() else {
            return Err(Error::NotOpen);
        };
        if dst.len() >= buffer.capacity() {
            return Err(Error::LengthExceedsCapacity {
                len: dst.len(),
                capacity: buffer.capacity(),
            });
        }
        if !self.streaming {
            return Err(Error::NotStarted);
        }

        let len = dst.len();
        let timestamp = timestamp + self.rx_offset;

        while buffer.available(timestamp)? < len {
            let packet = self.device.timed_recv(&mut self.recv_scratch).await?;
            self.packets_received += 1;

            if packet.count == 0 {
                error!(status = %buffer.status(), "receive failed: {}", packet.error);
                return Err(Error::DeviceComm(format!("receive failed: {}", packet.error)));
            }
            let Some(packet_ts) = packet.timestamp else {
                error!(status = %buffer.status(), "received packet missing timestamp");
                return Err(Error::DeviceComm("received packet missing timestamp".into()));
            };
            if let Some(prev) = self.last_packet_ts {
                if packet_ts < prev {
                    error!(prev, packet_ts, "received non-monotonic packet timestamp");
                    return Err(Error::DeviceComm(format!(
                        "packet timestamp {packet_ts} precedes previous {prev}"
                    )));
                }
            }
            self.last_packet_ts = Some(packet_ts);

            match buffer.write(&self.recv_scratch[..packet.count], packet_ts) {
                Ok(_) => {}
                Err(Error::Overflow { lost }) => {
                    warn!(lost, status = %buffer.status(), "receive buffer overflow");
                    let _ = self.event_tx.send(SessionEvent::RxOverflow { lost });
                }
                Err(e) => {
                    error!(status = %buffer.status(), "receive buffer write failed: {e}");
                    return Err(e);
                }
            }
        }

        match buffer.read(dst, timestamp) {
            Ok(n) if n == len => Ok(n),
            Ok(n) => Err(Error::ShortRead {
                requested: len,
                received: n,
            }),
            Err(e) => {
                error!(status = %buffer.status(), "receive buffer read failed: {e}");
                Err(e)
            }
        }
    }

    /// Send `samples` due at `timestamp`, or drop them while realigning.
    pub async fn write_samples(
        &mut self,
        samples: &[IqSample],
        timestamp: Timestamp,
    ) -> Result<WriteReport> {
        if !self.opened {
            return Err(Error::NotOpen);
        }
        if !self.streaming {
            return Err(Error::NotStarted);
        }

        let (start_of_burst, dropped) = match self.alignment.next_write() {
            WriteDecision::Drop { count } => {
                return Ok(WriteReport {
                    samples: samples.len(),
                    underrun: true,
                    burst_start: false,
                    dropped: count,
                });
            }
            WriteDecision::Send {
                start_of_burst,
                dropped,
            } => (start_of_burst, dropped),
        };

        let flags = if start_of_burst {
            BurstFlags::START
        } else {
            BurstFlags::CONTINUATION
        };
        let sent = self.device.timed_send(samples, timestamp, flags).await?;
        if sent < samples.len() {
            warn!(
                requested = samples.len(),
                sent,
                timestamp,
                "device sent fewer samples than requested"
            );
        }
        if start_of_burst {
            let _ = self.event_tx.send(SessionEvent::Realigned { dropped });
        }

        Ok(WriteReport {
            samples: sent,
            underrun: false,
            burst_start: start_of_burst,
            dropped,
        })
    }

    // ------------------------------------------------------------------
    // Tuning and gain
    // ------------------------------------------------------------------

    pub async fn set_tx_freq(&self, hz: f64) -> Result<f64> {
        self.require_open()?;
        self.set_freq(Direction::Tx, hz).await
    }

    pub async fn set_rx_freq(&self, hz: f64) -> Result<f64> {
        self.require_open()?;
        self.set_freq(Direction::Rx, hz).await
    }

    pub async fn set_tx_gain(&self, db: f64) -> Result<f64> {
        self.require_open()?;
        self.set_gain(Direction::Tx, db).await
    }

    pub async fn set_rx_gain(&self, db: f64) -> Result<f64> {
        self.require_open()?;
        self.set_gain(Direction::Rx, db).await
    }

    async fn set_freq(&self, direction: Direction, hz: f64) -> Result<f64> {
        let actual = self.device.set_freq(direction, hz).await?;
        info!(%direction, requested = hz, actual, "tuned");
        Ok(actual)
    }

    async fn set_gain(&self, direction: Direction, db: f64) -> Result<f64> {
        let actual = self.device.set_gain(direction, db).await?;
        info!(%direction, requested = db, actual, "gain set");
        Ok(actual)
    }

    fn require_open(&self) -> Result<()> {
        if self.opened { Ok(()) } else { Err(Error::NotOpen) }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Subscribe to session events. Slow subscribers may miss events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn alignment_state(&self) -> AlignmentState {
        self.alignment.state()
    }

    /// Receive packets pulled from the device by reads.
    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    /// Device streaming rate.
    pub fn sample_rate(&self) -> SampleRate {
        self.config.device_rate
    }

    /// Receive timestamp offset in device samples.
    pub fn rx_offset(&self) -> Timestamp {
        self.rx_offset
    }

    pub fn buffer_status(&self) -> Option<BufferStatus> {
        self.rx_buffer.as_ref().map(TimestampedSampleBuffer::status)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn device(&self) -> &Arc<dyn RadioDevice> {
        &self.device
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        if let Some(monitor) = &self.monitor {
            monitor.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use trx_core::events::{AsyncEvent, AsyncEventCode, RecvErrorCode};
    use trx_core::types::GainRange;
    use trx_test_harness::MockRadio;

    use crate::builder::SessionBuilder;

    fn builder() -> SessionBuilder {
        SessionBuilder::new()
            .flush_packets(0)
            .rx_sample_offset(0.0)
            .poll_timeout(Duration::from_millis(5))
    }

    async fn started(mock: &Arc<MockRadio>, builder: SessionBuilder) -> DeviceSession {
        let mut session = builder.build(mock.clone()).unwrap();
        session.open().await.unwrap();
        session.start().await.unwrap();
        session
    }

    fn stamped(start: Timestamp, len: usize) -> Vec<IqSample> {
        (0..len)
            .map(|n| IqSample::new((start as usize + n) as i16, 0))
            .collect()
    }

    #[tokio::test]
    async fn open_negotiates_and_applies_settings() {
        let mock = Arc::new(MockRadio::new());
        mock.set_gain_range(GainRange {
            min_db: 0.0,
            max_db: 60.0,
        });
        let mut session = builder()
            .tx_freq(900e6)
            .rx_freq(945e6)
            .tx_gain(12.0)
            .build(mock.clone())
            .unwrap();
        session.open().await.unwrap();

        assert!(session.is_open());
        assert_eq!(mock.rate(Direction::Tx), 400_000.0);
        assert_eq!(mock.rate(Direction::Rx), 400_000.0);
        assert_eq!(mock.freq(Direction::Tx), 900e6);
        assert_eq!(mock.freq(Direction::Rx), 945e6);
        assert_eq!(mock.gain(Direction::Tx), 12.0);
        // Unconfigured gain lands mid-range.
        assert_eq!(mock.gain(Direction::Rx), 30.0);
        assert_eq!(session.buffer_status().unwrap().capacity, 262_144);
    }

    #[tokio::test]
    async fn rx_offset_from_config() {
        let mock = Arc::new(MockRadio::new());
        let mut session = SessionBuilder::new().build(mock).unwrap();
        session.open().await.unwrap();
        // 50 us at 400 kHz.
        assert_eq!(session.rx_offset(), 20);
    }

    #[tokio::test]
    async fn rate_mismatch_is_fatal() {
        let mock = Arc::new(MockRadio::new());
        mock.set_rate_override(Direction::Rx, 399_000.0);
        let mut session = builder().build(mock).unwrap();
        let err = session.open().await.unwrap_err();
        assert!(matches!(
            err,
            Error::RateMismatch {
                rx, ..
            } if rx == 399_000.0
        ));
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn start_requires_open_and_is_exclusive() {
        let mock = Arc::new(MockRadio::new());
        let mut session = builder().build(mock.clone()).unwrap();
        assert!(matches!(session.start().await, Err(Error::NotOpen)));

        session.open().await.unwrap();
        session.start().await.unwrap();
        assert!(matches!(session.start().await, Err(Error::AlreadyStarted)));
        assert_eq!(mock.start_count(), 1);
        session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn start_flushes_early_packets() {
        let mock = Arc::new(MockRadio::new());
        for n in 0..3 {
            mock.push_packet(stamped(n * 10, 10), Some(n * 10));
        }
        let session = started(&mock, builder().flush_packets(3)).await;
        assert_eq!(mock.remaining_script(), 0);
        assert_eq!(session.packets_received(), 0);
    }

    #[tokio::test]
    async fn failed_flush_stops_device() {
        let mock = Arc::new(MockRadio::new());
        mock.push_recv_error(RecvErrorCode::Timeout);
        let mut session = builder().flush_packets(2).build(mock.clone()).unwrap();
        session.open().await.unwrap();

        let err = session.start().await.unwrap_err();
        assert!(matches!(err, Error::DeviceComm(ref m) if m.contains("timed out")));
        assert!(!session.is_streaming());
        assert!(!mock.is_streaming());
    }

    #[tokio::test]
    async fn stop_and_close() {
        let mock = Arc::new(MockRadio::new());
        let mut session = started(&mock, builder()).await;
        let mut events = session.subscribe();

        session.stop().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Stopped);
        assert!(!mock.is_streaming());
        assert!(matches!(session.stop().await, Err(Error::NotStarted)));

        session.close().await.unwrap();
        assert!(session.buffer_status().is_none());
        let mut dst = [IqSample::ZERO; 4];
        assert!(matches!(
            session.read_samples(&mut dst, 0).await,
            Err(Error::NotOpen)
        ));
    }

    #[tokio::test]
    async fn read_pulls_packets_until_enough() {
        let mock = Arc::new(MockRadio::new());
        let mut session = started(&mock, builder()).await;
        mock.push_packet(stamped(0, 100), Some(0));
        mock.push_packet(stamped(100, 100), Some(100));
        mock.push_packet(stamped(200, 100), Some(200));

        let mut dst = vec![IqSample::ZERO; 150];
        assert_eq!(session.read_samples(&mut dst, 0).await.unwrap(), 150);
        assert_eq!(dst, stamped(0, 150));
        assert_eq!(session.packets_received(), 2);
        assert_eq!(mock.remaining_script(), 1);
    }

    #[tokio::test]
    async fn read_applies_rx_offset() {
        let mock = Arc::new(MockRadio::new());
        // 25 us at 400 kHz = 10 samples.
        let mut session = started(&mock, builder().rx_sample_offset(25e-6)).await;
        mock.push_packet(stamped(0, 100), Some(0));

        let mut dst = vec![IqSample::ZERO; 20];
        session.read_samples(&mut dst, 0).await.unwrap();
        assert_eq!(dst, stamped(10, 20));
    }

    #[tokio::test]
    async fn read_checks_length_and_streaming() {
        let mock = Arc::new(MockRadio::new());
        let mut session = builder().rx_buffer_bytes(64).build(mock).unwrap();
        session.open().await.unwrap();

        let mut big = vec![IqSample::ZERO; 16];
        assert!(matches!(
            session.read_samples(&mut big, 0).await,
            Err(Error::LengthExceedsCapacity { len: 16, capacity: 16 })
        ));
        let mut small = vec![IqSample::ZERO; 4];
        assert!(matches!(
            session.read_samples(&mut small, 0).await,
            Err(Error::NotStarted)
        ));
    }

    #[tokio::test]
    async fn packet_without_timestamp_is_device_error() {
        let mock = Arc::new(MockRadio::new());
        let mut session = started(&mock, builder()).await;
        mock.push_packet(stamped(0, 10), None);
        let mut dst = vec![IqSample::ZERO; 5];
        assert!(matches!(
            session.read_samples(&mut dst, 0).await,
            Err(Error::DeviceComm(_))
        ));
    }

    #[tokio::test]
    async fn non_monotonic_timestamp_is_device_error() {
        let mock = Arc::new(MockRadio::new());
        let mut session = started(&mock, builder()).await;
        mock.push_packet(stamped(100, 10), Some(100));
        mock.push_packet(stamped(50, 10), Some(50));
        let mut dst = vec![IqSample::ZERO; 15];
        let err = session.read_samples(&mut dst, 100).await.unwrap_err();
        assert!(matches!(err, Error::DeviceComm(ref m) if m.contains("precedes")));
    }

    #[tokio::test]
    async fn zero_count_packet_carries_code_text() {
        let mock = Arc::new(MockRadio::new());
        let mut session = started(&mock, builder()).await;
        mock.push_recv_error(RecvErrorCode::Overflow);
        let mut dst = vec![IqSample::ZERO; 5];
        let err = session.read_samples(&mut dst, 0).await.unwrap_err();
        assert!(matches!(err, Error::DeviceComm(ref m) if m.contains("receive buffer has filled")));
        assert_eq!(session.packets_received(), 1);
    }

    #[tokio::test]
    async fn stale_read_is_reported() {
        let mock = Arc::new(MockRadio::new());
        let mut session = started(&mock, builder()).await;
        mock.push_packet(stamped(0, 100), Some(0));
        let mut dst = vec![IqSample::ZERO; 50];
        session.read_samples(&mut dst, 0).await.unwrap();

        let err = session.read_samples(&mut dst, 10).await.unwrap_err();
        assert!(matches!(
            err,
            Error::StaleTimestamp {
                requested: 10,
                window_start: 50
            }
        ));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn receive_overflow_is_tolerated() {
        let mock = Arc::new(MockRadio::new());
        // 16-sample ring.
        let mut session = started(&mock, builder().rx_buffer_bytes(64)).await;
        let mut events = session.subscribe();
        mock.push_packet(stamped(0, 10), Some(0));
        mock.push_packet(stamped(10, 10), Some(10));

        let mut dst = vec![IqSample::ZERO; 10];
        assert_eq!(session.read_samples(&mut dst, 10).await.unwrap(), 10);
        assert_eq!(dst, stamped(10, 10));
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::RxOverflow { lost: 5 }
        );
    }

    #[tokio::test]
    async fn aligned_write_sends_continuation() {
        let mock = Arc::new(MockRadio::new());
        let mut session = started(&mock, builder()).await;
        let report = session.write_samples(&stamped(0, 64), 5000).await.unwrap();
        assert_eq!(
            report,
            WriteReport {
                samples: 64,
                underrun: false,
                burst_start: false,
                dropped: 0
            }
        );
        let sent = mock.sent_packets();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].timestamp, 5000);
        assert_eq!(sent[0].flags, BurstFlags::CONTINUATION);
    }

    #[tokio::test]
    async fn short_device_send_is_reported() {
        let mock = Arc::new(MockRadio::new());
        let mut session = started(&mock, builder()).await;
        mock.set_send_limit(Some(40));
        let report = session.write_samples(&stamped(0, 64), 0).await.unwrap();
        assert_eq!(report.samples, 40);
    }

    #[tokio::test]
    async fn write_requires_streaming() {
        let mock = Arc::new(MockRadio::new());
        let mut session = builder().build(mock).unwrap();
        assert!(matches!(
            session.write_samples(&[IqSample::ZERO], 0).await,
            Err(Error::NotOpen)
        ));
        session.open().await.unwrap();
        assert!(matches!(
            session.write_samples(&[IqSample::ZERO], 0).await,
            Err(Error::NotStarted)
        ));
    }

    #[tokio::test]
    async fn alignment_loss_drops_then_restarts_burst() {
        let mock = Arc::new(MockRadio::new());
        let mut session = started(&mock, builder()).await;
        let mut events = session.subscribe();
        assert_eq!(session.alignment_state(), AlignmentState::Aligned);

        mock.push_async_event(AsyncEvent::new(AsyncEventCode::Underflow));
        for _ in 0..200 {
            if session.alignment_state() != AlignmentState::Aligned {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(session.alignment_state(), AlignmentState::Unaligned);
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::AlignmentLost {
                code: AsyncEventCode::Underflow
            }
        );

        let block = stamped(0, 32);
        for n in 1..30u32 {
            let report = session
                .write_samples(&block, u64::from(n) * 32)
                .await
                .unwrap();
            assert!(report.underrun);
            assert_eq!(report.dropped, n);
            assert_eq!(report.samples, 32);
        }
        assert!(mock.sent_packets().is_empty());

        let report = session.write_samples(&block, 30 * 32).await.unwrap();
        assert!(report.burst_start);
        assert!(!report.underrun);
        assert_eq!(session.alignment_state(), AlignmentState::Aligned);

        let sent = mock.sent_packets();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].flags, BurstFlags::START);
        assert_eq!(sent[0].timestamp, 30 * 32);
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Realigned { dropped: 29 }
        );
    }

    #[tokio::test]
    async fn passthroughs_require_open() {
        let mock = Arc::new(MockRadio::new());
        let mut session = builder().build(mock.clone()).unwrap();
        assert!(matches!(session.set_tx_freq(1e9).await, Err(Error::NotOpen)));

        session.open().await.unwrap();
        assert_eq!(session.set_tx_freq(1e9).await.unwrap(), 1e9);
        assert_eq!(session.set_rx_freq(2e9).await.unwrap(), 2e9);
        assert_eq!(session.set_tx_gain(5.0).await.unwrap(), 5.0);
        assert_eq!(session.set_rx_gain(500.0).await.unwrap(), 76.0);
        assert_eq!(mock.freq(Direction::Rx), 2e9);
    }

    #[tokio::test]
    async fn lifecycle_events_published() {
        let mock = Arc::new(MockRadio::new());
        let mut session = builder().build(mock).unwrap();
        let mut events = session.subscribe();
        session.open().await.unwrap();
        session.start().await.unwrap();
        session.stop().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Started);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Stopped);
    }
}
