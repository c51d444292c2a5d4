//! Transmit-enable gate and the power-amplifier controller.
//!
//! The I/O loop only ever asks one question of the amplifier subsystem:
//! "may I transmit right now?". [`TxGate`] is that question. [`PaController`]
//! is the stock answer: a small `Off` / `On` / `Scheduled` state machine that
//! can be switched by an operator or armed for a fixed window.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::info;

/// Boolean transmit-enable query consumed by the push cycle.
pub trait TxGate: Send + Sync {
    /// Whether hardware writes are currently permitted.
    fn enabled(&self) -> bool;
}

/// A gate that never blocks transmission.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysOn;

impl TxGate for AlwaysOn {
    fn enabled(&self) -> bool {
        true
    }
}

/// Amplifier power state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaState {
    Off,
    On,
    /// On until the deadline, then off.
    Scheduled { until: Instant },
}

/// Power-amplifier enable policy.
///
/// Starts `Off`. A scheduled window lapses to `Off` the first time the gate
/// is queried after its deadline.
#[derive(Debug)]
pub struct PaController {
    state: Mutex<PaState>,
}

impl PaController {
    pub fn new() -> Self {
        PaController {
            state: Mutex::new(PaState::Off),
        }
    }

    pub fn on(&self) {
        self.set(PaState::On);
        info!("PA on");
    }

    pub fn off(&self) {
        self.set(PaState::Off);
        info!("PA off");
    }

    /// Enable the amplifier for `window`, after which it switches off.
    pub fn schedule_for(&self, window: Duration) {
        self.schedule_until(Instant::now() + window);
    }

    /// Enable the amplifier until `deadline`.
    pub fn schedule_until(&self, deadline: Instant) {
        self.set(PaState::Scheduled { until: deadline });
        info!(?deadline, "PA scheduled");
    }

    /// Current state, with any lapsed schedule already resolved to `Off`.
    pub fn state(&self) -> PaState {
        self.state_at(Instant::now())
    }

    /// [`state`](Self::state) evaluated at an explicit instant.
    pub fn state_at(&self, now: Instant) -> PaState {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let PaState::Scheduled { until } = *state {
            if now >= until {
                *state = PaState::Off;
                info!("PA schedule lapsed");
            }
        }
        *state
    }

    /// Whether the amplifier is enabled at `now`.
    pub fn enabled_at(&self, now: Instant) -> bool {
        !matches!(self.state_at(now), PaState::Off)
    }

    fn set(&self, next: PaState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
    }
}

impl Default for PaController {
    fn default() -> Self {
        Self::new()
    }
}

impl TxGate for PaController {
    fn enabled(&self) -> bool {
        self.enabled_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_on_is_enabled() {
        assert!(AlwaysOn.enabled());
    }

    #[test]
    fn pa_starts_off() {
        let pa = PaController::new();
        assert_eq!(pa.state(), PaState::Off);
        assert!(!pa.enabled());
    }

    #[test]
    fn pa_on_off() {
        let pa = PaController::new();
        pa.on();
        assert!(pa.enabled());
        assert_eq!(pa.state(), PaState::On);
        pa.off();
        assert!(!pa.enabled());
    }

    #[test]
    fn pa_schedule_lapses() {
        let pa = PaController::new();
        let now = Instant::now();
        let deadline = now + Duration::from_secs(60);
        pa.schedule_until(deadline);

        assert!(pa.enabled_at(now));
        assert!(pa.enabled_at(deadline - Duration::from_millis(1)));
        assert!(!pa.enabled_at(deadline));
        // Once lapsed the controller stays off.
        assert_eq!(pa.state_at(now), PaState::Off);
    }

    #[test]
    fn pa_usable_as_dyn_gate() {
        let pa = PaController::new();
        pa.on();
        let gate: &dyn TxGate = &pa;
        assert!(gate.enabled());
    }
}
