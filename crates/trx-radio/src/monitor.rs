//! Asynchronous transmit-completion monitor.
//!
//! A spawned task polls the device's completion-event stream for the whole
//! time the session streams. Any failed completion marks the transmitter
//! unaligned; the writer then realigns on its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use trx_core::device::RadioDevice;
use trx_core::events::SessionEvent;

use crate::alignment::TxAlignment;

/// Handle to the monitor task. Stored inside `DeviceSession` while streaming.
pub(crate) struct EventMonitor {
    /// Cancellation token for cooperative shutdown.
    pub cancel: CancellationToken,
    /// Join handle for the monitor task.
    pub task: JoinHandle<()>,
}

impl EventMonitor {
    /// Signal the task and wait for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!("event monitor task ended abnormally: {e}");
        }
    }
}

/// Spawn the monitor task.
pub(crate) fn spawn_event_monitor(
    device: Arc<dyn RadioDevice>,
    alignment: Arc<TxAlignment>,
    event_tx: broadcast::Sender<SessionEvent>,
    poll_timeout: Duration,
) -> EventMonitor {
    let cancel = CancellationToken::new();
    let task = tokio::spawn(monitor_loop(
        device,
        alignment,
        event_tx,
        poll_timeout,
        cancel.clone(),
    ));
    EventMonitor { cancel, task }
}

/// Uses `tokio::select! { biased; }` so cancellation wins over a poll that
/// is ready at the same moment.
async fn monitor_loop(
    device: Arc<dyn RadioDevice>,
    alignment: Arc<TxAlignment>,
    event_tx: broadcast::Sender<SessionEvent>,
    poll_timeout: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("event monitor cancelled");
                break;
            }

            polled = device.poll_async_event(poll_timeout) => {
                match polled {
                    Ok(Some(event)) if event.code.is_success() => {}
                    Ok(Some(event)) => {
                        debug!(code = %event.code, timestamp = ?event.timestamp, "transmit completion failed");
                        if alignment.mark_lost() {
                            let _ = event_tx.send(SessionEvent::AlignmentLost { code: event.code });
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!("async event poll failed: {e}");
                        // Back off so a dead device does not spin the task.
                        tokio::select! {
                            biased;
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(poll_timeout) => {}
                        }
                    }
                }
            }
        }
    }
}
