//! Binary signal released from interrupt context.
//!
//! [`BinarySignal`] is the only cross-context wakeup primitive in the
//! pipeline. The interrupt handler [`give`](BinarySignal::give)s it without
//! blocking; the writer [`take`](BinarySignal::take)s it, polling with an
//! [`embedded_hal::delay::DelayNs`] time base until the signal arrives or
//! the timeout expires.
//!
//! The signal is binary: several gives before a take collapse into one.

use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;

use crate::constants::SPACE_POLL_US;

/// How long a writer is willing to wait for buffer space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    /// Wait at most this many milliseconds. `Millis(0)` checks once.
    Millis(u32),
    /// Wait until space is available.
    Forever,
}

impl Timeout {
    fn as_micros(self) -> Option<u64> {
        match self {
            Timeout::Millis(ms) => Some(u64::from(ms) * 1_000),
            Timeout::Forever => None,
        }
    }
}

/// A binary semaphore that can be given from an ISR.
pub struct BinarySignal {
    raised: AtomicBool,
}

impl BinarySignal {
    /// Create a signal in the taken (not raised) state.
    pub const fn new() -> Self {
        BinarySignal {
            raised: AtomicBool::new(false),
        }
    }

    /// Raise the signal. Never blocks; safe from interrupt context.
    pub fn give(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Consume the signal if it is raised, without waiting.
    pub fn try_take(&self) -> bool {
        self.raised.swap(false, Ordering::AcqRel)
    }

    /// Wait for the signal, polling every [`SPACE_POLL_US`] microseconds.
    ///
    /// Returns `true` if the signal was taken, `false` on timeout.
    pub fn take<D: DelayNs>(&self, timeout: Timeout, delay: &mut D) -> bool {
        let limit = timeout.as_micros();
        let mut waited: u64 = 0;

        loop {
            if self.try_take() {
                return true;
            }
            if let Some(limit) = limit {
                if waited >= limit {
                    return false;
                }
            }
            delay.delay_us(SPACE_POLL_US);
            waited += u64::from(SPACE_POLL_US);
        }
    }

    /// Whether the signal is currently raised.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}

impl Default for BinarySignal {
    fn default() -> Self {
        Self::new()
    }
}
