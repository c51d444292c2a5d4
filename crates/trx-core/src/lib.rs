//! trx-core: Core traits, types, and error definitions for trx.
//!
//! This crate defines the hardware-agnostic abstractions shared by the
//! rate converter, the device session, and every peripheral backend.
//!
//! # Key types
//!
//! - [`RadioDevice`] -- the vendor capability interface for a timed sample
//!   peripheral
//! - [`IqSample`] / [`Timestamp`] / [`SampleRate`] -- samples and time
//! - [`TxGate`] / [`PaController`] -- the transmit-enable query
//! - [`SessionEvent`] -- asynchronous session notifications
//! - [`Error`] / [`Result`] -- error handling

pub mod device;
pub mod error;
pub mod events;
pub mod gate;
pub mod types;

// Re-export key types at crate root for ergonomic `use trx_core::*`.
pub use device::RadioDevice;
pub use error::{Error, Result};
pub use events::{AsyncEvent, AsyncEventCode, RecvErrorCode, RecvPacket, SessionEvent};
pub use gate::{AlwaysOn, PaController, PaState, TxGate};
pub use num_complex::Complex32;
pub use types::*;
