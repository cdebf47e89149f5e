//! The most recent measurement, shared between the acquisition task (sole writer) and
//! its readers: the status server and cloud sync.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;
use embassy_time::Instant;

/// One compensated measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub heat_index_c: f64,
    pub timestamp: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadingSlot {
    /// Acquisition has not published anything yet.
    Pending,
    Ready(Reading),
    /// Acquisition failed; nothing will be published again.
    Unavailable,
}

impl ReadingSlot {
    pub fn reading(&self) -> Option<Reading> {
        match self {
            ReadingSlot::Ready(reading) => Some(*reading),
            ReadingSlot::Pending | ReadingSlot::Unavailable => None,
        }
    }
}

/// What the status page shows.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusSnapshot {
    pub slot: ReadingSlot,
    /// Unix milliseconds of the last confirmed cloud push.
    pub last_push_unix_ms: Option<u64>,
}

pub struct SharedState {
    // reading and last push, always under one lock
    status: Mutex<CriticalSectionRawMutex, Cell<StatusSnapshot>>,
    fresh: Signal<CriticalSectionRawMutex, Reading>,
}

impl SharedState {
    pub const fn new() -> Self {
        Self {
            status: Mutex::new(Cell::new(StatusSnapshot {
                slot: ReadingSlot::Pending,
                last_push_unix_ms: None,
            })),
            fresh: Signal::new(),
        }
    }

    fn update(&self, f: impl FnOnce(&mut StatusSnapshot)) {
        self.status.lock(|cell| {
            let mut status = cell.get();
            f(&mut status);
            cell.set(status);
        });
    }

    /// Replaces the current reading and wakes anyone waiting for a fresh one.
    pub fn publish(&self, reading: Reading) {
        self.update(|status| status.slot = ReadingSlot::Ready(reading));
        self.fresh.signal(reading);
    }

    /// Clears the reading for good; readers see "unavailable" from now on.
    pub fn mark_unavailable(&self) {
        self.update(|status| status.slot = ReadingSlot::Unavailable);
        self.fresh.reset();
    }

    pub fn slot(&self) -> ReadingSlot {
        self.snapshot().slot
    }

    pub fn latest(&self) -> Option<Reading> {
        self.slot().reading()
    }

    pub fn record_push(&self, unix_ms: u64) {
        self.update(|status| status.last_push_unix_ms = Some(unix_ms));
    }

    /// Reading and last push time, read together.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.status.lock(|cell| cell.get())
    }

    /// Waits for the next reading published after the previous call returned.
    pub async fn wait_fresh(&self) -> Reading {
        self.fresh.wait().await
    }

    /// Takes a reading published since the last wait, without blocking.
    pub fn try_take_fresh(&self) -> Option<Reading> {
        self.fresh.try_take()
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    fn reading(temperature_c: f64) -> Reading {
        Reading {
            temperature_c,
            humidity_pct: 40.0,
            heat_index_c: temperature_c,
            timestamp: Instant::from_secs(5),
        }
    }

    #[test]
    fn starts_pending() {
        let state = SharedState::new();
        assert_eq!(state.slot(), ReadingSlot::Pending);
        assert_eq!(state.latest(), None);
        assert_eq!(state.snapshot().last_push_unix_ms, None);
    }

    #[test]
    fn publish_replaces_whole_reading() {
        let state = SharedState::new();
        state.publish(reading(21.0));
        state.publish(reading(22.0));
        assert_eq!(state.latest(), Some(reading(22.0)));
    }

    #[test]
    fn fresh_signal_carries_latest() {
        let state = SharedState::new();
        state.publish(reading(21.0));
        state.publish(reading(23.5));
        assert_eq!(block_on(state.wait_fresh()), reading(23.5));
        assert_eq!(state.try_take_fresh(), None);
    }

    #[test]
    fn unavailable_hides_stale_data() {
        let state = SharedState::new();
        state.publish(reading(21.0));
        state.mark_unavailable();
        assert_eq!(state.slot(), ReadingSlot::Unavailable);
        assert_eq!(state.latest(), None);
        assert_eq!(state.try_take_fresh(), None);
    }

    #[test]
    fn push_time_is_reported() {
        let state = SharedState::new();
        state.record_push(1_700_000_000_000);
        assert_eq!(state.snapshot().last_push_unix_ms, Some(1_700_000_000_000));
    }

    #[test]
    fn snapshot_pairs_reading_with_push_time() {
        let state = SharedState::new();
        state.publish(reading(21.0));
        state.record_push(1_700_000_000_000);
        state.publish(reading(22.0));
        assert_eq!(
            state.snapshot(),
            StatusSnapshot {
                slot: ReadingSlot::Ready(reading(22.0)),
                last_push_unix_ms: Some(1_700_000_000_000),
            }
        );

        state.mark_unavailable();
        assert_eq!(
            state.snapshot(),
            StatusSnapshot {
                slot: ReadingSlot::Unavailable,
                last_push_unix_ms: Some(1_700_000_000_000),
            }
        );
    }
}
