//! Lock-free single-producer single-consumer byte ring buffer.
//!
//! Carries converted duty bytes from the writer (task context) to the
//! sample-timer interrupt. Uses atomic indices for lock-free
//! synchronization.
//!
//! # Safety Contract
//!
//! - Only ONE context may call the producer methods
//!   ([`write_byte()`](RingBuffer::write_byte),
//!   [`write_duty()`](RingBuffer::write_duty),
//!   [`wait_for_space()`](RingBuffer::wait_for_space)).
//! - Only ONE context may call the consumer methods
//!   ([`read_byte()`](RingBuffer::read_byte),
//!   [`read_exact()`](RingBuffer::read_exact),
//!   [`notify_if_space()`](RingBuffer::notify_if_space)).
//! - [`flush()`](RingBuffer::flush) touches both indices and is only called
//!   while the consumer is stopped.
//!
//! Breaking the contract can reorder or lose audio bytes but cannot cause
//! undefined behaviour: every cell is an `AtomicU8`.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use embedded_hal::delay::DelayNs;

use super::signal::{BinarySignal, Timeout};
use crate::constants::{BUFFER_LOW_WATER, MIN_BUFFER_SIZE};
use crate::error::{Error, Result};

/// The ring buffer has no free slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("ring buffer full")]
pub struct BufferFull;

/// The ring buffer holds no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("ring buffer empty")]
pub struct BufferEmpty;

/// A bounded byte queue shared between one writer and one interrupt handler.
///
/// The usable capacity is `size - 1`: one slot is reserved to tell a full
/// buffer from an empty one.
pub struct RingBuffer {
    storage: Box<[AtomicU8]>,
    /// Write position (only modified by the producer).
    head: AtomicUsize,
    /// Read position (only modified by the consumer).
    tail: AtomicUsize,
    /// Set by the consumer when it gives `space`, cleared by the producer
    /// before it waits.
    pending: AtomicBool,
    space: BinarySignal,
}

impl RingBuffer {
    /// Allocate an empty buffer of `size` bytes.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `size` is below [`MIN_BUFFER_SIZE`].
    /// - [`Error::Allocation`] if the storage cannot be reserved.
    pub fn new(size: usize) -> Result<Self> {
        if size < MIN_BUFFER_SIZE {
            log::error!(
                "ring buffer size {} below minimum {}",
                size,
                MIN_BUFFER_SIZE
            );
            return Err(Error::InvalidArgument("ring buffer too small"));
        }

        let mut cells = Vec::new();
        cells.try_reserve_exact(size).map_err(|_| {
            log::error!("cannot allocate {} byte ring buffer", size);
            Error::Allocation
        })?;
        cells.resize_with(size, || AtomicU8::new(0));

        Ok(RingBuffer {
            storage: cells.into_boxed_slice(),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            pending: AtomicBool::new(false),
            space: BinarySignal::new(),
        })
    }

    /// Total number of slots, including the reserved one.
    pub fn size(&self) -> usize {
        self.storage.len()
    }

    /// Usable capacity (`size - 1`).
    pub fn capacity(&self) -> usize {
        self.storage.len() - 1
    }

    #[inline]
    fn next(&self, index: usize) -> usize {
        let next = index + 1;
        if next == self.storage.len() {
            0
        } else {
            next
        }
    }

    // ── Producer side ──────────────────────────────────────────────────

    /// Store one byte (producer side). Never blocks.
    pub fn write_byte(&self, value: u8) -> core::result::Result<(), BufferFull> {
        let head = self.head.load(Ordering::Relaxed);
        let next_head = self.next(head);

        if next_head == self.tail.load(Ordering::Acquire) {
            return Err(BufferFull);
        }

        self.storage[head].store(value, Ordering::Relaxed);

        // Release ordering publishes the byte before head advances.
        self.head.store(next_head, Ordering::Release);
        Ok(())
    }

    /// Store a duty value as `width` little-endian bytes (1 or 2).
    ///
    /// All-or-nothing: nothing is written unless every byte fits, so the
    /// consumer never sees half of a value.
    pub fn write_duty(&self, duty: u16, width: usize) -> core::result::Result<(), BufferFull> {
        debug_assert!(width == 1 || width == 2);
        if self.free_count() < width {
            return Err(BufferFull);
        }
        let bytes = duty.to_le_bytes();
        for &byte in &bytes[..width] {
            self.write_byte(byte)?;
        }
        Ok(())
    }

    /// Block until the consumer reports free space above the low-water mark.
    ///
    /// Clears the pending flag first so the consumer may give again, then
    /// waits on the signal. Returns `false` on timeout.
    pub fn wait_for_space<D: DelayNs>(&self, timeout: Timeout, delay: &mut D) -> bool {
        self.pending.store(false, Ordering::Release);
        self.space.take(timeout, delay)
    }

    // ── Consumer side ──────────────────────────────────────────────────

    /// Take one byte (consumer side). ISR-safe.
    pub fn read_byte(&self) -> core::result::Result<u8, BufferEmpty> {
        let tail = self.tail.load(Ordering::Relaxed);

        if tail == self.head.load(Ordering::Acquire) {
            return Err(BufferEmpty);
        }

        let value = self.storage[tail].load(Ordering::Relaxed);

        // Release ordering: the read completes before the slot is handed
        // back to the producer.
        self.tail.store(self.next(tail), Ordering::Release);
        Ok(value)
    }

    /// Fill `out` completely or consume nothing.
    ///
    /// The producer only ever adds bytes, so once `out.len()` bytes are
    /// observed they stay readable until this consumer takes them.
    pub fn read_exact(&self, out: &mut [u8]) -> core::result::Result<(), BufferEmpty> {
        if self.len() < out.len() {
            return Err(BufferEmpty);
        }
        for slot in out.iter_mut() {
            *slot = self.read_byte()?;
        }
        Ok(())
    }

    /// Wake the writer if free space exceeds [`BUFFER_LOW_WATER`] and no
    /// wakeup is outstanding. Returns `true` if the signal was given.
    #[inline]
    pub fn notify_if_space(&self) -> bool {
        if self.pending.load(Ordering::Acquire) || self.free_count() <= BUFFER_LOW_WATER {
            return false;
        }
        self.pending.store(true, Ordering::Release);
        self.space.give();
        true
    }

    // ── Either side ────────────────────────────────────────────────────

    /// Number of bytes queued.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        if head >= tail {
            head - tail
        } else {
            self.storage.len() - (tail - head)
        }
    }

    /// Number of bytes that can still be written.
    pub fn free_count(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.tail.load(Ordering::Acquire) == self.head.load(Ordering::Acquire)
    }

    /// Check if the buffer is full.
    pub fn is_full(&self) -> bool {
        self.free_count() == 0
    }

    /// Discard everything queued. Only while the consumer is stopped.
    pub fn flush(&self) {
        self.tail.store(0, Ordering::Release);
        self.head.store(0, Ordering::Release);
    }
}
