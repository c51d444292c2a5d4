//! Device completion codes and session events.
//!
//! The peripheral reports transmit completions asynchronously
//! ([`AsyncEvent`]) and tags each receive packet with a [`RecvErrorCode`].
//! Sessions republish the transitions that matter to applications as
//! [`SessionEvent`]s through a `tokio::sync::broadcast` channel.

use std::fmt;

use crate::types::Timestamp;

/// Completion code carried by an asynchronous transmit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsyncEventCode {
    /// A burst was transmitted successfully.
    BurstAck,
    /// An internal send buffer emptied.
    Underflow,
    /// Packets were lost between host and device.
    SeqError,
    /// A packet arrived too late or too early for its timestamp.
    TimeError,
    /// An underflow occurred inside a packet.
    UnderflowInPacket,
    /// Packets were lost within a burst.
    SeqErrorInBurst,
    /// A vendor code this layer does not know.
    Unknown(u32),
}

impl AsyncEventCode {
    /// Whether the completion reports success.
    ///
    /// Every other code means the device's transmit timing can no longer be
    /// trusted and the stream has to be realigned.
    pub fn is_success(&self) -> bool {
        matches!(self, AsyncEventCode::BurstAck)
    }
}

impl fmt::Display for AsyncEventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AsyncEventCode::BurstAck => write!(f, "a packet was successfully transmitted"),
            AsyncEventCode::Underflow => write!(f, "an internal send buffer has emptied"),
            AsyncEventCode::SeqError => write!(f, "packet loss between host and device"),
            AsyncEventCode::TimeError => write!(f, "packet time was too late or too early"),
            AsyncEventCode::UnderflowInPacket => write!(f, "underflow occurred inside a packet"),
            AsyncEventCode::SeqErrorInBurst => write!(f, "packet loss within a burst"),
            AsyncEventCode::Unknown(code) => write!(f, "unknown async event code {code}"),
        }
    }
}

/// An asynchronous transmit completion reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncEvent {
    pub code: AsyncEventCode,
    /// Device time of the event, when the device supplies one.
    pub timestamp: Option<Timestamp>,
}

impl AsyncEvent {
    pub fn new(code: AsyncEventCode) -> Self {
        AsyncEvent {
            code,
            timestamp: None,
        }
    }

    pub fn at(code: AsyncEventCode, timestamp: Timestamp) -> Self {
        AsyncEvent {
            code,
            timestamp: Some(timestamp),
        }
    }
}

/// Error code attached to a received packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecvErrorCode {
    None,
    /// No packet arrived before the device's receive timeout.
    Timeout,
    /// A stream command was issued in the past.
    LateCommand,
    /// The device expected another stream command.
    BrokenChain,
    /// An internal receive buffer filled.
    Overflow,
    /// The packet could not be parsed.
    BadPacket,
    Unknown(u32),
}

impl fmt::Display for RecvErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecvErrorCode::None => write!(f, "no error"),
            RecvErrorCode::Timeout => write!(f, "no packet received, implementation timed out"),
            RecvErrorCode::LateCommand => write!(f, "a stream command was issued in the past"),
            RecvErrorCode::BrokenChain => write!(f, "expected another stream command"),
            RecvErrorCode::Overflow => write!(f, "an internal receive buffer has filled"),
            RecvErrorCode::BadPacket => write!(f, "the packet could not be parsed"),
            RecvErrorCode::Unknown(code) => write!(f, "unknown receive error {code}"),
        }
    }
}

/// Metadata returned by one timed receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvPacket {
    /// Number of samples written into the caller's buffer.
    pub count: usize,
    /// Device time of the first sample, if the packet carried one.
    pub timestamp: Option<Timestamp>,
    pub error: RecvErrorCode,
}

/// A state transition published by a device session.
///
/// Delivered best-effort through a bounded broadcast channel; slow
/// subscribers may miss events.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Streaming started.
    Started,
    /// Streaming stopped.
    Stopped,
    /// The completion monitor saw a failed transmit; the transmitter is
    /// unaligned until it has dropped the configured number of packets.
    AlignmentLost { code: AsyncEventCode },
    /// A burst-start packet was sent after `dropped` packets were discarded.
    Realigned { dropped: u32 },
    /// The receive ring discarded `lost` unread samples.
    RxOverflow { lost: u64 },
}
