//! Timer-driven PWM output.
//!
//! [`PwmTickHandler`] is the real-time consumer of the pipeline. The board
//! code moves it into the sample timer's interrupt and calls
//! [`on_tick()`](PwmTickHandler::on_tick) once per sample period.
//!
//! ## Architecture
//!
//! ```text
//! write()                 RingBuffer (heap)                 PWM duty
//! ┌──────────┐         ┌──────────────────────┐  on_tick  ┌──────────┐
//! │ convert  ├────────►│ L R L R ... (1-2 B)  ├──────────►│ left ch  │
//! │          │         │                      │           │ right ch │
//! └──────────┘         └──────────────────────┘           └──────────┘
//!      ▲                          │ free > low-water
//!      └──────── BinarySignal ◄───┘
//! ```
//!
//! ## Per-tick frame handling
//!
//! One tick consumes one source frame: one duty value for mono input, two
//! (left then right) for stereo input. The frame is read all-or-nothing,
//! so an underrun never splits a left/right pair and the stream stays
//! aligned. On underrun the outputs hold their previous duty.
//!
//! | Source | Left out | Right out | Values read | Left gets | Right gets |
//! |--------|----------|-----------|-------------|-----------|------------|
//! | mono   | on       | on        | 1           | value     | value      |
//! | mono   | on / off | off / on  | 1           | value     | value      |
//! | stereo | on       | on        | 2           | first     | second     |
//! | stereo | on       | off       | 2           | first     | (dropped)  |
//! | stereo | off      | on        | 2           | (dropped) | second     |
//!
//! The handler never blocks, allocates, or logs.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU8, Ordering};

use embedded_hal::pwm::SetDutyCycle;

use super::convert::duty_width;
use super::ring_buffer::RingBuffer;
use crate::peripheral::TimerInterrupt;
use crate::session::Status;

/// State shared between the session (task context) and the tick handler.
pub(crate) struct PlaybackShared {
    pub(crate) ring: RingBuffer,
    status: AtomicU8,
    /// Channels interleaved in the source stream (1 or 2).
    source_channels: AtomicU8,
}

impl PlaybackShared {
    pub(crate) fn new(ring: RingBuffer, source_channels: u8) -> Self {
        PlaybackShared {
            ring,
            status: AtomicU8::new(Status::Uninitialized as u8),
            source_channels: AtomicU8::new(source_channels),
        }
    }

    pub(crate) fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn set_status(&self, status: Status) {
        self.status.store(status as u8, Ordering::Release);
    }

    pub(crate) fn source_channels(&self) -> u8 {
        self.source_channels.load(Ordering::Acquire)
    }

    /// Only called while the timer is stopped.
    pub(crate) fn set_source_channels(&self, channels: u8) {
        self.source_channels.store(channels, Ordering::Release);
    }
}

/// Interrupt-side consumer: drains one frame per tick into the duty registers.
///
/// `C` is the fast-path duty capability returned by
/// [`PwmPeripheral::configure_channel`](crate::peripheral::PwmPeripheral::configure_channel);
/// `I` acknowledges and re-arms the sample timer interrupt.
pub struct PwmTickHandler<C, I> {
    shared: Arc<PlaybackShared>,
    left: Option<C>,
    right: Option<C>,
    irq: I,
    /// Bytes per duty value (1 or 2), fixed by the duty resolution.
    duty_bytes: usize,
}

impl<C, I> PwmTickHandler<C, I>
where
    C: SetDutyCycle,
    I: TimerInterrupt,
{
    pub(crate) fn new(
        shared: Arc<PlaybackShared>,
        left: Option<C>,
        right: Option<C>,
        irq: I,
        duty_resolution: u8,
    ) -> Self {
        PwmTickHandler {
            shared,
            left,
            right,
            irq,
            duty_bytes: duty_width(duty_resolution),
        }
    }

    /// Handle one sample-timer interrupt.
    ///
    /// Acknowledges and re-arms the timer, then, while the session is
    /// [`Status::Busy`], moves one source frame to the duty registers and
    /// wakes the writer if enough space has been freed.
    ///
    /// Returns `true` if a frame was played, `false` on underrun or when
    /// playback is not running.
    pub fn on_tick(&mut self) -> bool {
        self.irq.acknowledge();

        if self.shared.status() != Status::Busy {
            return false;
        }

        let ring = &self.shared.ring;
        let stereo = self.shared.source_channels() == 2;
        let width = self.duty_bytes;

        let mut frame = [0u8; 4];
        let frame_len = if stereo { width * 2 } else { width };
        let played = ring.read_exact(&mut frame[..frame_len]).is_ok();

        if played {
            let first = decode(&frame[..width]);
            let second = if stereo {
                decode(&frame[width..frame_len])
            } else {
                first
            };

            // A rejected duty write keeps the previous level for this period.
            if let Some(left) = self.left.as_mut() {
                let _ = left.set_duty_cycle(first);
            }
            if let Some(right) = self.right.as_mut() {
                let _ = right.set_duty_cycle(second);
            }
        }

        ring.notify_if_space();
        played
    }

    /// Status of the session this handler belongs to.
    ///
    /// [`Status::Uninitialized`] once the session has been torn down.
    pub fn status(&self) -> Status {
        self.shared.status()
    }

    /// Whether the left output is bound.
    pub fn has_left(&self) -> bool {
        self.left.is_some()
    }

    /// Whether the right output is bound.
    pub fn has_right(&self) -> bool {
        self.right.is_some()
    }

    /// Give back the duty capabilities and interrupt token.
    pub fn release(self) -> (Option<C>, Option<C>, I) {
        (self.left, self.right, self.irq)
    }
}

/// Rebuild a duty value from 1 or 2 little-endian bytes.
#[inline]
fn decode(bytes: &[u8]) -> u16 {
    match *bytes {
        [lo] => lo as u16,
        [lo, hi] => u16::from_le_bytes([lo, hi]),
        _ => 0,
    }
}
