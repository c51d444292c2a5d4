//! Error types for trx.
//!
//! All fallible operations across the workspace return [`Result<T>`], which
//! uses [`Error`] as the error type. Sample-buffer bookkeeping errors, device
//! communication failures, and session lifecycle errors are all captured here.

use crate::types::Timestamp;

/// The error type for all trx operations.
///
/// Variants fall into three dispositions (see [`Error::is_recoverable`]):
/// recoverable timestamp/bookkeeping conditions, lossy-but-continuing
/// overflow, and errors that are fatal to the current cycle or session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested timestamp precedes the start of the buffered window.
    ///
    /// The caller should move its cursor to `window_start` and retry.
    #[error("stale timestamp {requested}: window starts at {window_start}")]
    StaleTimestamp {
        requested: Timestamp,
        window_start: Timestamp,
    },

    /// A read asked for at least as many samples as the ring can hold.
    #[error("read of {len} samples exceeds buffer capacity {capacity}")]
    LengthExceedsCapacity { len: usize, capacity: usize },

    /// A write carried no samples, or at least a full ring's worth.
    #[error("write length {len} invalid for buffer capacity {capacity}")]
    ZeroOrOversizeLength { len: usize, capacity: usize },

    /// A write did not extend the tail of the buffered window.
    #[error("write of {len} samples at {timestamp} does not extend window end {window_end}")]
    NonContiguousTimestamp {
        timestamp: Timestamp,
        len: usize,
        window_end: Timestamp,
    },

    /// A ring write discarded unread samples.
    ///
    /// The write itself has been committed; the newly written tail is
    /// authoritative and the `lost` oldest samples are gone.
    #[error("sample buffer overflow: {lost} unread samples discarded")]
    Overflow { lost: u64 },

    /// Fewer samples were delivered than requested.
    #[error("short read: requested {requested} samples, received {received}")]
    ShortRead { requested: usize, received: usize },

    /// The radio peripheral failed, or delivered a packet with a missing or
    /// non-monotonic timestamp.
    #[error("device communication error: {0}")]
    DeviceComm(String),

    /// The device could not run at the requested sample rate, or its
    /// transmit and receive rates disagree.
    #[error("sample rate mismatch: requested {requested} Hz, tx {tx} Hz, rx {rx} Hz")]
    RateMismatch { requested: f64, tx: f64, rx: f64 },

    /// `start()` was called on a session that is already streaming.
    #[error("device already started")]
    AlreadyStarted,

    /// A streaming operation was attempted before `start()`.
    #[error("device not started")]
    NotStarted,

    /// A device operation was attempted before `open()`.
    #[error("device not open")]
    NotOpen,

    /// A baseband queue was closed by its peer.
    #[error("stream closed")]
    StreamClosed,

    /// An invalid configuration value or argument.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl Error {
    /// Whether the session can continue after this error.
    ///
    /// Stale timestamps are retried at an adjusted cursor and overflow only
    /// loses old samples. Everything else aborts the cycle or the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::StaleTimestamp { .. } | Error::Overflow { .. })
    }
}

/// A convenience `Result` alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;
