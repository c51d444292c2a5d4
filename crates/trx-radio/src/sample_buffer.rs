//! Timestamp-indexed ring of received device samples.
//!
//! The ring maps a contiguous window of device time `[time_start, time_end)`
//! onto a fixed number of slots. Receive packets are appended at the tail as
//! they arrive; reads consume from any timestamp inside the window and drop
//! everything before the read's end.

use std::fmt;

use tracing::debug;

use trx_core::error::{Error, Result};
use trx_core::types::{IqSample, Timestamp};

/// Snapshot of a buffer's bookkeeping, printed alongside errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStatus {
    pub capacity: usize,
    pub time_start: Timestamp,
    pub time_end: Timestamp,
    pub data_start: usize,
    pub data_end: usize,
}

impl fmt::Display for BufferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sample buffer: capacity = {}, time_start = {}, time_end = {}, data_start = {}, data_end = {}",
            self.capacity, self.time_start, self.time_end, self.data_start, self.data_end
        )
    }
}

/// Fixed-capacity ring of device samples addressed by timestamp.
///
/// Holds at most `capacity - 1` samples so that a full ring and an empty one
/// never share the same start and end slots. Writes must extend the tail:
/// committed samples are never overwritten, and when the ring is full the
/// oldest unread samples are the ones discarded.
#[derive(Debug)]
pub struct TimestampedSampleBuffer {
    ring: Vec<IqSample>,
    rate_hz: f64,
    time_start: Timestamp,
    time_end: Timestamp,
    data_start: usize,
}

impl TimestampedSampleBuffer {
    /// Allocate a ring of `capacity` slots for a stream at `rate_hz`.
    pub fn new(capacity: usize, rate_hz: f64) -> Result<Self> {
        if capacity < 2 {
            return Err(Error::InvalidParameter(format!(
                "sample buffer capacity {capacity} is too small"
            )));
        }
        Ok(TimestampedSampleBuffer {
            ring: vec![IqSample::ZERO; capacity],
            rate_hz,
            time_start: 0,
            time_end: 0,
            data_start: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.ring.len()
    }

    pub fn sample_rate(&self) -> f64 {
        self.rate_hz
    }

    /// Timestamp of the oldest unread sample.
    pub fn time_start(&self) -> Timestamp {
        self.time_start
    }

    /// Timestamp one past the newest sample.
    pub fn time_end(&self) -> Timestamp {
        self.time_end
    }

    /// Number of unread samples.
    pub fn len(&self) -> usize {
        (self.time_end - self.time_start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.time_end == self.time_start
    }

    pub fn status(&self) -> BufferStatus {
        BufferStatus {
            capacity: self.capacity(),
            time_start: self.time_start,
            time_end: self.time_end,
            data_start: self.data_start,
            data_end: (self.data_start + self.len()) % self.capacity(),
        }
    }

    /// Samples available from `timestamp` to the end of the window.
    ///
    /// Zero when `timestamp` is at or past the end; `StaleTimestamp` when it
    /// precedes the window.
    pub fn available(&self, timestamp: Timestamp) -> Result<usize> {
        if timestamp < self.time_start {
            return Err(self.stale(timestamp));
        }
        Ok(self.time_end.saturating_sub(timestamp) as usize)
    }

    /// Read exactly `dst.len()` samples starting at `timestamp`.
    ///
    /// On success everything before `timestamp + dst.len()` is released.
    /// Returns `Ok(0)` without consuming anything when `timestamp` is at or
    /// past the end of the window.
    pub fn read(&mut self, dst: &mut [IqSample], timestamp: Timestamp) -> Result<usize> {
        let len = dst.len();
        if timestamp < self.time_start {
            return Err(self.stale(timestamp));
        }
        if len == 0 || timestamp >= self.time_end {
            return Ok(0);
        }
        if len >= self.capacity() {
            return Err(Error::LengthExceedsCapacity {
                len,
                capacity: self.capacity(),
            });
        }
        let held = (self.time_end - timestamp) as usize;
        if held < len {
            return Err(Error::ShortRead {
                requested: len,
                received: held,
            });
        }

        let start = self.index_of(timestamp);
        let first = len.min(self.capacity() - start);
        dst[..first].copy_from_slice(&self.ring[start..start + first]);
        dst[first..].copy_from_slice(&self.ring[..len - first]);

        self.time_start = timestamp + len as u64;
        self.data_start = (start + len) % self.capacity();
        Ok(len)
    }

    /// Append `src` whose first sample is at `timestamp`.
    ///
    /// Returns how many samples were stored. Only the part beyond the
    /// current tail is stored when the write overlaps it. A gap before
    /// `timestamp` is zero-filled, or the window restarts at `timestamp` when
    /// the gap would not fit in the ring.
    ///
    /// When the ring fills, the write is still committed and the oldest
    /// samples are discarded; this is reported as [`Error::Overflow`].
    pub fn write(&mut self, src: &[IqSample], timestamp: Timestamp) -> Result<usize> {
        let len = src.len();
        let capacity = self.capacity();
        if len == 0 || len >= capacity {
            return Err(Error::ZeroOrOversizeLength { len, capacity });
        }
        let end = timestamp + len as u64;
        if end <= self.time_end {
            return Err(Error::NonContiguousTimestamp {
                timestamp,
                len,
                window_end: self.time_end,
            });
        }

        let mut lost = 0u64;
        if timestamp > self.time_end {
            let gap = timestamp - self.time_end;
            if self.is_empty() {
                self.restart_at(timestamp);
            } else if gap + len as u64 >= capacity as u64 {
                lost = self.len() as u64;
                debug!(gap, lost, "sample buffer gap exceeds ring, restarting window");
                self.restart_at(timestamp);
            } else {
                debug!(gap, at = self.time_end, "zero-filling sample buffer gap");
                let index = self.index_of(self.time_end);
                self.fill_zero(index, gap as usize);
                self.time_end = timestamp;
            }
        }

        // Overlapping head is already committed.
        let fresh = &src[(self.time_end.max(timestamp) - timestamp) as usize..];
        let index = self.index_of(self.time_end);
        self.copy_in(index, fresh);
        self.time_end = end;

        let window = self.time_end - self.time_start;
        let limit = capacity as u64 - 1;
        if window > limit {
            let trimmed = window - limit;
            self.time_start += trimmed;
            self.data_start = (self.data_start + trimmed as usize) % capacity;
            lost += trimmed;
        }

        if lost > 0 {
            return Err(Error::Overflow { lost });
        }
        Ok(fresh.len())
    }

    /// Discard everything and forget the window position.
    ///
    /// Used when the device clock restarts from zero.
    pub fn clear(&mut self) {
        self.time_start = 0;
        self.time_end = 0;
        self.data_start = 0;
    }

    fn stale(&self, requested: Timestamp) -> Error {
        Error::StaleTimestamp {
            requested,
            window_start: self.time_start,
        }
    }

    fn restart_at(&mut self, timestamp: Timestamp) {
        self.time_start = timestamp;
        self.time_end = timestamp;
    }

    /// Ring slot of `timestamp`, which may lie up to one ring past the window.
    fn index_of(&self, timestamp: Timestamp) -> usize {
        let offset = (timestamp - self.time_start) % self.capacity() as u64;
        (self.data_start + offset as usize) % self.capacity()
    }

    fn copy_in(&mut self, index: usize, src: &[IqSample]) {
        let first = src.len().min(self.capacity() - index);
        self.ring[index..index + first].copy_from_slice(&src[..first]);
        self.ring[..src.len() - first].copy_from_slice(&src[first..]);
    }

    fn fill_zero(&mut self, index: usize, count: usize) {
        let first = count.min(self.capacity() - index);
        self.ring[index..index + first].fill(IqSample::ZERO);
        self.ring[..count - first].fill(IqSample::ZERO);
    }
}
