//! Transmit alignment state shared by the writer and the completion monitor.
//!
//! After the device reports a failed transmit, its notion of "now" and the
//! host's write cursor can no longer be trusted to agree. The writer then
//! discards a fixed number of packets, letting the cursor run ahead of the
//! device clock, and restarts with a burst-start packet.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

/// Transmit alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentState {
    Aligned,
    /// A failed completion was seen; no packet has been dropped yet.
    Unaligned,
    /// This many packets have been dropped since alignment was lost.
    Realigning(u32),
}

impl fmt::Display for AlignmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignmentState::Aligned => write!(f, "aligned"),
            AlignmentState::Unaligned => write!(f, "unaligned"),
            AlignmentState::Realigning(n) => write!(f, "realigning ({n} dropped)"),
        }
    }
}

/// What the writer should do with the packet it is holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDecision {
    /// Send the packet. `dropped` packets were discarded before this one.
    Send { start_of_burst: bool, dropped: u32 },
    /// Discard the packet; `count` is the running drop count.
    Drop { count: u32 },
}

/// Alignment state machine guarded for the writer and the monitor task.
///
/// The lock is only held for the state transition itself, never across an
/// `.await`.
#[derive(Debug)]
pub struct TxAlignment {
    drop_limit: u32,
    state: Mutex<AlignmentState>,
}

impl TxAlignment {
    /// `drop_limit` is the write call that carries the burst start; the
    /// calls before it are dropped. Values below one are treated as one.
    pub fn new(drop_limit: u32) -> Self {
        TxAlignment {
            drop_limit: drop_limit.max(1),
            state: Mutex::new(AlignmentState::Aligned),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AlignmentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn drop_limit(&self) -> u32 {
        self.drop_limit
    }

    pub fn state(&self) -> AlignmentState {
        *self.lock()
    }

    /// Record a failed transmit completion, restarting the drop count.
    ///
    /// Returns `true` if the transmitter was aligned before the call.
    pub fn mark_lost(&self) -> bool {
        let mut state = self.lock();
        let was_aligned = *state == AlignmentState::Aligned;
        *state = AlignmentState::Unaligned;
        was_aligned
    }

    /// Decide the fate of the next transmit packet and advance the state.
    pub fn next_write(&self) -> WriteDecision {
        let mut state = self.lock();
        let count = match *state {
            AlignmentState::Aligned => {
                return WriteDecision::Send {
                    start_of_burst: false,
                    dropped: 0,
                };
            }
            AlignmentState::Unaligned => 1,
            AlignmentState::Realigning(n) => n + 1,
        };

        if count >= self.drop_limit {
            *state = AlignmentState::Aligned;
            debug!(dropped = count - 1, "aligning transmitter: start burst");
            WriteDecision::Send {
                start_of_burst: true,
                dropped: count - 1,
            }
        } else {
            *state = AlignmentState::Realigning(count);
            debug!(count, "aligning transmitter: packet advance");
            WriteDecision::Drop { count }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_sends_plainly() {
        let a = TxAlignment::new(30);
        assert_eq!(a.state(), AlignmentState::Aligned);
        assert_eq!(
            a.next_write(),
            WriteDecision::Send {
                start_of_burst: false,
                dropped: 0
            }
        );
    }

    #[test]
    fn loss_drops_then_bursts() {
        let a = TxAlignment::new(30);
        assert!(a.mark_lost());
        assert_eq!(a.state(), AlignmentState::Unaligned);

        for n in 1..30 {
            assert_eq!(a.next_write(), WriteDecision::Drop { count: n });
            assert_eq!(a.state(), AlignmentState::Realigning(n));
        }
        assert_eq!(
            a.next_write(),
            WriteDecision::Send {
                start_of_burst: true,
                dropped: 29
            }
        );
        assert_eq!(a.state(), AlignmentState::Aligned);
    }

    #[test]
    fn repeated_loss_restarts_count() {
        let a = TxAlignment::new(5);
        a.mark_lost();
        a.next_write();
        a.next_write();
        assert!(!a.mark_lost());
        assert_eq!(a.next_write(), WriteDecision::Drop { count: 1 });
    }

    #[test]
    fn limit_of_one_bursts_immediately() {
        let a = TxAlignment::new(0);
        assert_eq!(a.drop_limit(), 1);
        a.mark_lost();
        assert_eq!(
            a.next_write(),
            WriteDecision::Send {
                start_of_burst: true,
                dropped: 0
            }
        );
    }

    #[test]
    fn state_display() {
        assert_eq!(AlignmentState::Realigning(3).to_string(), "realigning (3 dropped)");
    }
}
