//! Mock radio peripheral for deterministic testing of sessions and I/O loops.
//!
//! [`MockRadio`] implements the [`RadioDevice`] trait entirely in memory.
//! Receive packets can be scripted one by one or generated from a synthetic
//! continuous tone, transmit packets are logged for inspection, and
//! asynchronous completion events are queued by the test.
//!
//! # Example
//!
//! ```
//! use trx_core::{AsyncEvent, AsyncEventCode, IqSample};
//! use trx_test_harness::MockRadio;
//!
//! let radio = MockRadio::new();
//! // The next receive returns four samples stamped at device time 1000.
//! radio.push_packet(vec![IqSample::new(1, -1); 4], Some(1000));
//! // The completion monitor will see one failed transmit.
//! radio.push_async_event(AsyncEvent::new(AsyncEventCode::Underflow));
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use trx_core::device::RadioDevice;
use trx_core::error::{Error, Result};
use trx_core::events::{AsyncEvent, RecvErrorCode, RecvPacket};
use trx_core::types::{BurstFlags, Direction, GainRange, IqSample, Timestamp};

/// Default largest receive packet, matching common USB peripherals.
pub const DEFAULT_MAX_PACKET: usize = 2040;

/// One transmit packet recorded by the mock.
#[derive(Debug, Clone, PartialEq)]
pub struct SentPacket {
    pub timestamp: Timestamp,
    pub flags: BurstFlags,
    pub samples: Vec<IqSample>,
}

/// A pre-loaded receive outcome.
#[derive(Debug, Clone)]
enum ScriptedRecv {
    Packet {
        samples: Vec<IqSample>,
        timestamp: Option<Timestamp>,
    },
    /// A zero-count packet carrying an error code.
    Error(RecvErrorCode),
    /// The receive call itself fails.
    Fail(String),
}

/// Continuous tone produced once the script runs dry.
#[derive(Debug, Clone)]
struct SyntheticStream {
    samples_per_packet: usize,
    next_timestamp: Timestamp,
    amplitude: f32,
    step: f32,
    phase: f32,
}

impl SyntheticStream {
    fn fill(&mut self, buf: &mut [IqSample]) -> (usize, Timestamp) {
        let count = self.samples_per_packet.min(buf.len());
        for slot in &mut buf[..count] {
            let (sin, cos) = self.phase.sin_cos();
            *slot = IqSample::new(
                (self.amplitude * cos).round() as i16,
                (self.amplitude * sin).round() as i16,
            );
            self.phase = (self.phase + self.step) % std::f32::consts::TAU;
        }
        let timestamp = self.next_timestamp;
        self.next_timestamp += count as u64;
        (count, timestamp)
    }
}

#[derive(Debug)]
struct MockState {
    opened: bool,
    streaming: bool,
    start_count: u32,
    stop_count: u32,
    max_packet: usize,
    script: VecDeque<ScriptedRecv>,
    stream: Option<SyntheticStream>,
    recv_calls: u64,
    async_events: VecDeque<AsyncEvent>,
    poll_failures: u32,
    sent_log: Vec<SentPacket>,
    send_limit: Option<usize>,
    send_failure: Option<String>,
    rate_override: [Option<f64>; 2],
    rates: [f64; 2],
    freqs: [f64; 2],
    gains: [f64; 2],
    gain_range: GainRange,
}

fn slot(direction: Direction) -> usize {
    match direction {
        Direction::Tx => 0,
        Direction::Rx => 1,
    }
}

/// A mock [`RadioDevice`] for testing without hardware.
///
/// Every configuration method takes `&self`, so a test can keep adjusting the
/// mock after handing an `Arc` of it to a session. Receives are served from
/// the script first, then from the synthetic stream if one is configured;
/// with neither, a receive returns a zero-count `Timeout` packet.
#[derive(Debug)]
pub struct MockRadio {
    state: Mutex<MockState>,
    events: Notify,
}

impl MockRadio {
    /// Create a closed mock with an empty script and a 0..76 dB gain range.
    pub fn new() -> Self {
        MockRadio {
            state: Mutex::new(MockState {
                opened: false,
                streaming: false,
                start_count: 0,
                stop_count: 0,
                max_packet: DEFAULT_MAX_PACKET,
                script: VecDeque::new(),
                stream: None,
                recv_calls: 0,
                async_events: VecDeque::new(),
                poll_failures: 0,
                sent_log: Vec::new(),
                send_limit: None,
                send_failure: None,
                rate_override: [None; 2],
                rates: [0.0; 2],
                freqs: [0.0; 2],
                gains: [0.0; 2],
                gain_range: GainRange {
                    min_db: 0.0,
                    max_db: 76.0,
                },
            }),
            events: Notify::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Receive scripting
    // ------------------------------------------------------------------

    /// Queue a receive packet. `None` simulates a packet without a timestamp.
    pub fn push_packet(&self, samples: Vec<IqSample>, timestamp: Option<Timestamp>) {
        self.state()
            .script
            .push_back(ScriptedRecv::Packet { samples, timestamp });
    }

    /// Queue a zero-count packet carrying `code`.
    pub fn push_recv_error(&self, code: RecvErrorCode) {
        self.state().script.push_back(ScriptedRecv::Error(code));
    }

    /// Queue a receive call that fails outright.
    pub fn push_recv_failure(&self, message: &str) {
        self.state()
            .script
            .push_back(ScriptedRecv::Fail(message.to_string()));
    }

    /// Serve a continuous tone once the script is exhausted.
    ///
    /// Packets carry `samples_per_packet` samples with timestamps increasing
    /// contiguously from `start`.
    pub fn set_synthetic_stream(&self, samples_per_packet: usize, start: Timestamp) {
        self.state().stream = Some(SyntheticStream {
            samples_per_packet,
            next_timestamp: start,
            amplitude: 8000.0,
            step: 0.05,
            phase: 0.0,
        });
    }

    /// Set the largest receive packet the mock advertises.
    pub fn set_max_packet(&self, max: usize) {
        self.state().max_packet = max;
    }

    /// Scripted receive outcomes not yet consumed.
    pub fn remaining_script(&self) -> usize {
        self.state().script.len()
    }

    /// Total `timed_recv` calls served.
    pub fn recv_calls(&self) -> u64 {
        self.state().recv_calls
    }

    // ------------------------------------------------------------------
    // Async events
    // ------------------------------------------------------------------

    /// Queue a completion event and wake any pending poll.
    pub fn push_async_event(&self, event: AsyncEvent) {
        self.state().async_events.push_back(event);
        self.events.notify_one();
    }

    /// Make the next `count` event polls fail.
    pub fn fail_next_polls(&self, count: u32) {
        self.state().poll_failures = count;
        self.events.notify_one();
    }

    /// Queued events not yet polled.
    pub fn pending_async_events(&self) -> usize {
        self.state().async_events.len()
    }

    // ------------------------------------------------------------------
    // Transmit inspection
    // ------------------------------------------------------------------

    /// Every packet passed to `timed_send`, in order.
    pub fn sent_packets(&self) -> Vec<SentPacket> {
        self.state().sent_log.clone()
    }

    /// Total samples the mock has accepted for transmission.
    pub fn sent_samples(&self) -> usize {
        self.state().sent_log.iter().map(|p| p.samples.len()).sum()
    }

    /// Accept at most `limit` samples per send.
    pub fn set_send_limit(&self, limit: Option<usize>) {
        self.state().send_limit = limit;
    }

    /// Make every subsequent send fail with `message`; `None` clears it.
    pub fn set_send_failure(&self, message: Option<&str>) {
        self.state().send_failure = message.map(str::to_string);
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Report `actual_hz` for every rate request in `direction`.
    pub fn set_rate_override(&self, direction: Direction, actual_hz: f64) {
        self.state().rate_override[slot(direction)] = Some(actual_hz);
    }

    pub fn set_gain_range(&self, range: GainRange) {
        self.state().gain_range = range;
    }

    /// Last rate applied in `direction`.
    pub fn rate(&self, direction: Direction) -> f64 {
        self.state().rates[slot(direction)]
    }

    /// Last frequency tuned in `direction`.
    pub fn freq(&self, direction: Direction) -> f64 {
        self.state().freqs[slot(direction)]
    }

    /// Last gain applied in `direction`.
    pub fn gain(&self, direction: Direction) -> f64 {
        self.state().gains[slot(direction)]
    }

    pub fn is_open(&self) -> bool {
        self.state().opened
    }

    pub fn is_streaming(&self) -> bool {
        self.state().streaming
    }

    pub fn start_count(&self) -> u32 {
        self.state().start_count
    }

    pub fn stop_count(&self) -> u32 {
        self.state().stop_count
    }

    fn require_open(state: &MockState) -> Result<()> {
        if state.opened {
            Ok(())
        } else {
            Err(Error::NotOpen)
        }
    }
}

impl Default for MockRadio {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RadioDevice for MockRadio {
    async fn open(&self) -> Result<()> {
        self.state().opened = true;
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        let mut state = self.state();
        Self::require_open(&state)?;
        state.streaming = true;
        state.start_count += 1;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut state = self.state();
        Self::require_open(&state)?;
        state.streaming = false;
        state.stop_count += 1;
        Ok(())
    }

    async fn set_rate(&self, direction: Direction, rate_hz: f64) -> Result<f64> {
        let mut state = self.state();
        Self::require_open(&state)?;
        let actual = state.rate_override[slot(direction)].unwrap_or(rate_hz);
        state.rates[slot(direction)] = actual;
        Ok(actual)
    }

    async fn set_freq(&self, direction: Direction, freq_hz: f64) -> Result<f64> {
        let mut state = self.state();
        Self::require_open(&state)?;
        state.freqs[slot(direction)] = freq_hz;
        Ok(freq_hz)
    }

    async fn set_gain(&self, direction: Direction, gain_db: f64) -> Result<f64> {
        let mut state = self.state();
        Self::require_open(&state)?;
        let range = state.gain_range;
        let applied = gain_db.clamp(range.min_db, range.max_db);
        state.gains[slot(direction)] = applied;
        Ok(applied)
    }

    async fn gain_range(&self, _direction: Direction) -> Result<GainRange> {
        let state = self.state();
        Self::require_open(&state)?;
        Ok(state.gain_range)
    }

    fn max_recv_samples_per_packet(&self) -> usize {
        self.state().max_packet
    }

    async fn timed_send(
        &self,
        samples: &[IqSample],
        timestamp: Timestamp,
        flags: BurstFlags,
    ) -> Result<usize> {
        let mut state = self.state();
        Self::require_open(&state)?;
        if let Some(message) = &state.send_failure {
            return Err(Error::DeviceComm(message.clone()));
        }
        let accepted = state
            .send_limit
            .map_or(samples.len(), |limit| samples.len().min(limit));
        state.sent_log.push(SentPacket {
            timestamp,
            flags,
            samples: samples[..accepted].to_vec(),
        });
        Ok(accepted)
    }

    async fn timed_recv(&self, buf: &mut [IqSample]) -> Result<RecvPacket> {
        let mut guard = self.state();
        let state = &mut *guard;
        Self::require_open(state)?;
        state.recv_calls += 1;

        match state.script.pop_front() {
            Some(ScriptedRecv::Packet { samples, timestamp }) => {
                let count = samples.len().min(buf.len());
                buf[..count].copy_from_slice(&samples[..count]);
                Ok(RecvPacket {
                    count,
                    timestamp,
                    error: RecvErrorCode::None,
                })
            }
            Some(ScriptedRecv::Error(code)) => Ok(RecvPacket {
                count: 0,
                timestamp: None,
                error: code,
            }),
            Some(ScriptedRecv::Fail(message)) => Err(Error::DeviceComm(message)),
            None => match state.stream.as_mut() {
                Some(stream) if state.streaming => {
                    let (count, timestamp) = stream.fill(buf);
                    Ok(RecvPacket {
                        count,
                        timestamp: Some(timestamp),
                        error: RecvErrorCode::None,
                    })
                }
                _ => Ok(RecvPacket {
                    count: 0,
                    timestamp: None,
                    error: RecvErrorCode::Timeout,
                }),
            },
        }
    }

    async fn poll_async_event(&self, timeout: Duration) -> Result<Option<AsyncEvent>> {
        {
            let mut state = self.state();
            if state.poll_failures > 0 {
                state.poll_failures -= 1;
                return Err(Error::DeviceComm("async event poll failed".into()));
            }
            if let Some(event) = state.async_events.pop_front() {
                return Ok(Some(event));
            }
        }

        // notify_one stores a permit, so an event pushed between the check
        // above and this wait is not missed.
        if tokio::time::timeout(timeout, self.events.notified())
            .await
            .is_err()
        {
            return Ok(None);
        }

        let mut state = self.state();
        if state.poll_failures > 0 {
            state.poll_failures -= 1;
            return Err(Error::DeviceComm("async event poll failed".into()));
        }
        Ok(state.async_events.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trx_core::events::AsyncEventCode;

    async fn opened() -> MockRadio {
        let mock = MockRadio::new();
        mock.open().await.unwrap();
        mock
    }

    #[tokio::test]
    async fn operations_before_open_fail() {
        let mock = MockRadio::new();
        let mut buf = [IqSample::ZERO; 4];
        assert!(matches!(mock.start().await, Err(Error::NotOpen)));
        assert!(matches!(mock.timed_recv(&mut buf).await, Err(Error::NotOpen)));
        assert!(matches!(
            mock.timed_send(&buf, 0, BurstFlags::CONTINUATION).await,
            Err(Error::NotOpen)
        ));
    }

    #[tokio::test]
    async fn scripted_packets_in_order() {
        let mock = opened().await;
        mock.push_packet(vec![IqSample::new(1, 2); 3], Some(10));
        mock.push_packet(vec![IqSample::new(3, 4); 2], None);
        mock.push_recv_error(RecvErrorCode::Overflow);

        let mut buf = [IqSample::ZERO; 8];
        let p = mock.timed_recv(&mut buf).await.unwrap();
        assert_eq!((p.count, p.timestamp), (3, Some(10)));
        assert_eq!(buf[2], IqSample::new(1, 2));

        let p = mock.timed_recv(&mut buf).await.unwrap();
        assert_eq!((p.count, p.timestamp), (2, None));

        let p = mock.timed_recv(&mut buf).await.unwrap();
        assert_eq!(p.count, 0);
        assert_eq!(p.error, RecvErrorCode::Overflow);
        assert_eq!(mock.remaining_script(), 0);
        assert_eq!(mock.recv_calls(), 3);
    }

    #[tokio::test]
    async fn scripted_packet_truncated_to_buffer() {
        let mock = opened().await;
        mock.push_packet(vec![IqSample::new(7, 7); 10], Some(0));
        let mut buf = [IqSample::ZERO; 4];
        assert_eq!(mock.timed_recv(&mut buf).await.unwrap().count, 4);
    }

    #[tokio::test]
    async fn empty_script_times_out() {
        let mock = opened().await;
        let mut buf = [IqSample::ZERO; 4];
        let p = mock.timed_recv(&mut buf).await.unwrap();
        assert_eq!(p.count, 0);
        assert_eq!(p.error, RecvErrorCode::Timeout);
    }

    #[tokio::test]
    async fn synthetic_stream_is_contiguous_while_streaming() {
        let mock = opened().await;
        mock.set_synthetic_stream(100, 5000);
        mock.start().await.unwrap();

        let mut buf = [IqSample::ZERO; 256];
        let a = mock.timed_recv(&mut buf).await.unwrap();
        let b = mock.timed_recv(&mut buf).await.unwrap();
        assert_eq!((a.count, a.timestamp), (100, Some(5000)));
        assert_eq!((b.count, b.timestamp), (100, Some(5100)));

        mock.stop().await.unwrap();
        let c = mock.timed_recv(&mut buf).await.unwrap();
        assert_eq!(c.count, 0);
    }

    #[tokio::test]
    async fn send_log_and_limit() {
        let mock = opened().await;
        let samples = [IqSample::new(5, 5); 10];
        assert_eq!(
            mock.timed_send(&samples, 42, BurstFlags::START).await.unwrap(),
            10
        );
        mock.set_send_limit(Some(6));
        assert_eq!(
            mock.timed_send(&samples, 52, BurstFlags::CONTINUATION)
                .await
                .unwrap(),
            6
        );

        let sent = mock.sent_packets();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].timestamp, 42);
        assert!(sent[0].flags.start_of_burst);
        assert_eq!(sent[1].samples.len(), 6);
        assert_eq!(mock.sent_samples(), 16);
    }

    #[tokio::test]
    async fn send_failure_injection() {
        let mock = opened().await;
        mock.set_send_failure(Some("usb stall"));
        let err = mock
            .timed_send(&[IqSample::ZERO], 0, BurstFlags::CONTINUATION)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DeviceComm(ref m) if m == "usb stall"));
    }

    #[tokio::test]
    async fn rate_override_and_gain_clamp() {
        let mock = opened().await;
        mock.set_rate_override(Direction::Rx, 399_999.0);
        assert_eq!(mock.set_rate(Direction::Tx, 400_000.0).await.unwrap(), 400_000.0);
        assert_eq!(mock.set_rate(Direction::Rx, 400_000.0).await.unwrap(), 399_999.0);
        assert_eq!(mock.rate(Direction::Rx), 399_999.0);

        assert_eq!(mock.set_gain(Direction::Tx, 100.0).await.unwrap(), 76.0);
        assert_eq!(mock.gain(Direction::Tx), 76.0);
    }

    #[tokio::test]
    async fn poll_returns_queued_event() {
        let mock = opened().await;
        mock.push_async_event(AsyncEvent::at(AsyncEventCode::Underflow, 99));
        let event = mock
            .poll_async_event(Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(event, Some(AsyncEvent::at(AsyncEventCode::Underflow, 99)));
        assert_eq!(mock.pending_async_events(), 0);
    }

    #[tokio::test]
    async fn poll_times_out_when_idle() {
        let mock = opened().await;
        let event = mock
            .poll_async_event(Duration::from_millis(10))
            .await
            .unwrap();
        assert_eq!(event, None);
    }

    #[tokio::test]
    async fn poll_failure_injection() {
        let mock = opened().await;
        mock.fail_next_polls(1);
        assert!(mock.poll_async_event(Duration::from_millis(10)).await.is_err());
        assert!(mock
            .poll_async_event(Duration::from_millis(10))
            .await
            .unwrap()
            .is_none());
    }
}
