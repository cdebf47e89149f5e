//! Monotonic and wall time.
//!
//! Scheduling (token expiry, push interval) runs on the monotonic embassy clock. Wall
//! time is only needed for request signatures and the status page; it becomes available
//! once SNTP has answered.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Instant;

pub trait Clock {
    fn now(&self) -> Instant;

    /// Milliseconds since the Unix epoch, if wall time is known.
    fn unix_ms(&self) -> Option<u64>;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn unix_ms(&self) -> Option<u64> {
        (**self).unix_ms()
    }
}

/// Offset between the Unix epoch and the monotonic clock, set by time sync.
pub struct WallClock {
    offset_ms: Mutex<CriticalSectionRawMutex, Cell<Option<u64>>>,
}

impl WallClock {
    pub const fn new() -> Self {
        Self {
            offset_ms: Mutex::new(Cell::new(None)),
        }
    }

    /// Records that it was `unix_ms` at monotonic time `at`.
    pub fn sync(&self, unix_ms: u64, at: Instant) {
        let offset = unix_ms.saturating_sub(at.as_millis());
        self.offset_ms.lock(|cell| cell.set(Some(offset)));
    }

    pub fn unix_ms_at(&self, at: Instant) -> Option<u64> {
        self.offset_ms
            .lock(|cell| cell.get())
            .map(|offset| offset + at.as_millis())
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

/// The firmware clock: embassy time plus a synchronised [`WallClock`].
#[derive(Clone, Copy)]
pub struct SystemClock {
    wall: &'static WallClock,
}

impl SystemClock {
    pub const fn new(wall: &'static WallClock) -> Self {
        Self { wall }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn unix_ms(&self) -> Option<u64> {
        self.wall.unix_ms_at(Instant::now())
    }
}
