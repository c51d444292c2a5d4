//! trx-test-harness: Test utilities and a mock radio peripheral for trx.
//!
//! This crate provides [`MockRadio`] for deterministic unit testing of
//! device sessions and I/O loops without requiring real SDR hardware.

pub mod mock_radio;

pub use mock_radio::{DEFAULT_MAX_PACKET, MockRadio, SentPacket};
