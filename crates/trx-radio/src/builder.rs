//! SessionConfig and SessionBuilder -- configuration for [`DeviceSession`].
//!
//! Separates configuration from construction so that callers can set rates,
//! buffer sizing, and tuning before the device is opened.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use trx_radio::SessionBuilder;
//! use trx_test_harness::MockRadio;
//!
//! # async fn example() -> trx_core::Result<()> {
//! let mut session = SessionBuilder::new()
//!     .tx_freq(900.2e6)
//!     .rx_freq(945.2e6)
//!     .build(Arc::new(MockRadio::new()))?;
//! session.open().await?;
//! session.start().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use trx_core::device::RadioDevice;
use trx_core::error::{Error, Result};
use trx_core::types::SampleRate;
use trx_dsp::ResampleRatio;

use crate::session::DeviceSession;

/// Default receive ring size in bytes.
pub const DEFAULT_RX_BUFFER_BYTES: usize = 1 << 20;

/// Default receive timestamp offset: 50 microseconds.
pub const DEFAULT_RX_SAMPLE_OFFSET_SECS: f64 = 50e-6;

/// Default write call that carries the burst start after alignment loss.
pub const DEFAULT_REALIGN_DROP_COUNT: u32 = 30;

/// Default number of receive packets discarded after streaming starts.
pub const DEFAULT_FLUSH_PACKETS: u32 = 20;

/// Default completion-event poll timeout.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Default session event channel capacity.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Everything a [`DeviceSession`] needs besides the device itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Rate the peripheral streams at.
    pub device_rate: SampleRate,
    /// Rate baseband consumers and producers work at.
    pub baseband_rate: SampleRate,
    /// Size of the receive ring in bytes; four bytes per sample.
    pub rx_buffer_bytes: usize,
    /// Fixed latency added to every receive timestamp, in seconds.
    pub rx_sample_offset_secs: f64,
    pub realign_drop_count: u32,
    pub flush_packets: u32,
    pub poll_timeout: Duration,
    pub tx_freq_hz: Option<f64>,
    pub rx_freq_hz: Option<f64>,
    /// `None` selects the midpoint of the device's gain range.
    pub tx_gain_db: Option<f64>,
    pub rx_gain_db: Option<f64>,
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            device_rate: SampleRate::DEVICE_DEFAULT,
            baseband_rate: SampleRate::GSM_SYMBOL,
            rx_buffer_bytes: DEFAULT_RX_BUFFER_BYTES,
            rx_sample_offset_secs: DEFAULT_RX_SAMPLE_OFFSET_SECS,
            realign_drop_count: DEFAULT_REALIGN_DROP_COUNT,
            flush_packets: DEFAULT_FLUSH_PACKETS,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            tx_freq_hz: None,
            rx_freq_hz: None,
            tx_gain_db: None,
            rx_gain_db: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Receive ring capacity in samples.
    pub fn rx_buffer_samples(&self) -> usize {
        self.rx_buffer_bytes / std::mem::size_of::<trx_core::types::IqSample>()
    }

    /// Reject settings a session cannot run with.
    pub fn validate(&self) -> Result<()> {
        ResampleRatio::between(self.device_rate, self.baseband_rate)?;

        if self.rx_buffer_samples() < 2 {
            return Err(Error::InvalidParameter(format!(
                "rx buffer of {} bytes holds fewer than two samples",
                self.rx_buffer_bytes
            )));
        }
        if !self.rx_sample_offset_secs.is_finite() || self.rx_sample_offset_secs < 0.0 {
            return Err(Error::InvalidParameter(format!(
                "rx sample offset {} s must be finite and non-negative",
                self.rx_sample_offset_secs
            )));
        }
        if self.realign_drop_count == 0 {
            return Err(Error::InvalidParameter(
                "realign drop count must be at least 1".into(),
            ));
        }
        if self.poll_timeout.is_zero() {
            return Err(Error::InvalidParameter(
                "event poll timeout must be non-zero".into(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::InvalidParameter(
                "event channel capacity must be non-zero".into(),
            ));
        }
        for (name, freq) in [("tx", self.tx_freq_hz), ("rx", self.rx_freq_hz)] {
            if let Some(f) = freq {
                if !f.is_finite() || f <= 0.0 {
                    return Err(Error::InvalidParameter(format!(
                        "{name} frequency {f} Hz is not a positive number"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Fluent builder for [`DeviceSession`].
///
/// All configuration has defaults suited to a GSM transceiver on a 400 kHz
/// peripheral, so the simplest usage is:
///
/// ```ignore
/// let session = SessionBuilder::new().build(device)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct SessionBuilder {
    config: SessionConfig,
}

impl SessionBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        SessionBuilder::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: SessionConfig) -> Self {
        SessionBuilder { config }
    }

    /// Set the device streaming rate (default: 400 kHz).
    pub fn device_rate(mut self, rate: SampleRate) -> Self {
        self.config.device_rate = rate;
        self
    }

    /// Set the baseband rate (default: 1625/6 kHz).
    pub fn baseband_rate(mut self, rate: SampleRate) -> Self {
        self.config.baseband_rate = rate;
        self
    }

    /// Set the receive ring size in bytes (default: 1 MiB).
    pub fn rx_buffer_bytes(mut self, bytes: usize) -> Self {
        self.config.rx_buffer_bytes = bytes;
        self
    }

    /// Set the receive timestamp offset (default: 50 us).
    pub fn rx_sample_offset(mut self, secs: f64) -> Self {
        self.config.rx_sample_offset_secs = secs;
        self
    }

    /// Set how many writes a realignment takes (default: 30).
    pub fn realign_drop_count(mut self, count: u32) -> Self {
        self.config.realign_drop_count = count;
        self
    }

    /// Set how many packets to discard after starting (default: 20).
    pub fn flush_packets(mut self, count: u32) -> Self {
        self.config.flush_packets = count;
        self
    }

    /// Set the completion-event poll timeout (default: 100ms).
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.poll_timeout = timeout;
        self
    }

    pub fn tx_freq(mut self, hz: f64) -> Self {
        self.config.tx_freq_hz = Some(hz);
        self
    }

    pub fn rx_freq(mut self, hz: f64) -> Self {
        self.config.rx_freq_hz = Some(hz);
        self
    }

    pub fn tx_gain(mut self, db: f64) -> Self {
        self.config.tx_gain_db = Some(db);
        self
    }

    pub fn rx_gain(mut self, db: f64) -> Self {
        self.config.rx_gain_db = Some(db);
        self
    }

    /// Set the session event channel capacity (default: 64).
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Validate the configuration and create an unopened session.
    pub fn build(self, device: Arc<dyn RadioDevice>) -> Result<DeviceSession> {
        DeviceSession::new(device, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trx_test_harness::MockRadio;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.rx_buffer_samples(), 262_144);
        assert_eq!(config.realign_drop_count, 30);
        assert_eq!(config.flush_packets, 20);
        assert_eq!(config.poll_timeout, Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_sets_fields() {
        let builder = SessionBuilder::new()
            .device_rate(SampleRate::hz(1_000_000).unwrap())
            .baseband_rate(SampleRate::hz(250_000).unwrap())
            .rx_buffer_bytes(4096)
            .rx_sample_offset(0.0)
            .realign_drop_count(5)
            .flush_packets(0)
            .poll_timeout(Duration::from_millis(20))
            .tx_freq(900e6)
            .rx_freq(945e6)
            .tx_gain(10.0)
            .rx_gain(20.0)
            .event_capacity(8);
        let config = builder.config();
        assert_eq!(config.rx_buffer_samples(), 1024);
        assert_eq!(config.realign_drop_count, 5);
        assert_eq!(config.tx_freq_hz, Some(900e6));
        assert_eq!(config.rx_gain_db, Some(20.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn invalid_settings_rejected() {
        let bad = [
            SessionBuilder::new().rx_buffer_bytes(4),
            SessionBuilder::new().rx_sample_offset(-1.0),
            SessionBuilder::new().realign_drop_count(0),
            SessionBuilder::new().poll_timeout(Duration::ZERO),
            SessionBuilder::new().event_capacity(0),
            SessionBuilder::new().tx_freq(f64::NAN),
            SessionBuilder::new()
                .device_rate(SampleRate::hz(1_000_003).unwrap())
                .baseband_rate(SampleRate::hz(999_983).unwrap()),
        ];
        for builder in bad {
            assert!(
                matches!(builder.config().validate(), Err(Error::InvalidParameter(_))),
                "{:?}",
                builder.config()
            );
        }
    }

    #[test]
    fn build_validates() {
        let result = SessionBuilder::new()
            .realign_drop_count(0)
            .build(Arc::new(MockRadio::new()));
        assert!(result.is_err());
    }
}
