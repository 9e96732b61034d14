//! Session configuration.
//!
//! [`PwmAudioConfig`] is fixed for the lifetime of a session; it selects
//! the output pins, PWM channels, duty resolution, sample timer and ring
//! buffer size. [`PlaybackParams`] (rate, width, channel count) may change
//! between playbacks while the session is idle.

use crate::constants::{
    CHANNEL_LEFT_MASK, CHANNEL_RIGHT_MASK, DEFAULT_BITS_PER_SAMPLE, DEFAULT_CHANNELS,
    DEFAULT_SAMPLE_RATE, DUTY_RESOLUTION_MAX, DUTY_RESOLUTION_MIN, MIN_BUFFER_SIZE,
    SAMPLE_RATE_MAX, SAMPLE_RATE_MIN, TIMERS_PER_GROUP, TIMER_GROUPS,
};
use crate::error::{Error, Result};

/// Identity of the general-purpose timer that paces playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerId {
    pub group: u8,
    pub index: u8,
}

impl TimerId {
    pub const fn new(group: u8, index: u8) -> Self {
        TimerId { group, index }
    }
}

/// One PWM output: a pin routed to a hardware PWM channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelBinding {
    pub pin: u8,
    pub channel: u8,
}

/// Static configuration of a PWM audio session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmAudioConfig {
    /// Left output; `None` leaves it unused.
    pub left: Option<ChannelBinding>,
    /// Right output; `None` leaves it unused.
    pub right: Option<ChannelBinding>,
    /// PWM timer clocking both channels.
    pub pwm_timer: u8,
    /// Duty resolution in bits (8..=10).
    pub duty_resolution: u8,
    /// Sample timer.
    pub timer: TimerId,
    /// Ring buffer size in bytes (at least 1024).
    pub ringbuf_len: usize,
}

impl Default for PwmAudioConfig {
    fn default() -> Self {
        PwmAudioConfig {
            left: None,
            right: None,
            pwm_timer: 0,
            duty_resolution: 10,
            timer: TimerId::new(0, 0),
            ringbuf_len: MIN_BUFFER_SIZE,
        }
    }
}

impl PwmAudioConfig {
    pub fn with_left(mut self, pin: u8, channel: u8) -> Self {
        self.left = Some(ChannelBinding { pin, channel });
        self
    }

    pub fn with_right(mut self, pin: u8, channel: u8) -> Self {
        self.right = Some(ChannelBinding { pin, channel });
        self
    }

    pub fn with_pwm_timer(mut self, pwm_timer: u8) -> Self {
        self.pwm_timer = pwm_timer;
        self
    }

    pub fn with_duty_resolution(mut self, bits: u8) -> Self {
        self.duty_resolution = bits;
        self
    }

    pub fn with_timer(mut self, group: u8, index: u8) -> Self {
        self.timer = TimerId::new(group, index);
        self
    }

    pub fn with_ringbuf_len(mut self, len: usize) -> Self {
        self.ringbuf_len = len;
        self
    }

    /// Bit mask of bound outputs ([`CHANNEL_LEFT_MASK`] | [`CHANNEL_RIGHT_MASK`]).
    pub fn channel_mask(&self) -> u8 {
        let mut mask = 0;
        if self.left.is_some() {
            mask |= CHANNEL_LEFT_MASK;
        }
        if self.right.is_some() {
            mask |= CHANNEL_RIGHT_MASK;
        }
        mask
    }

    /// Check everything `init` needs before touching hardware.
    ///
    /// The ring buffer size is checked when the buffer is created.
    pub fn validate(&self) -> Result<()> {
        if self.timer.group >= TIMER_GROUPS {
            return Err(Error::InvalidArgument("timer group out of range"));
        }
        if self.timer.index >= TIMERS_PER_GROUP {
            return Err(Error::InvalidArgument("timer index out of range"));
        }
        if !(DUTY_RESOLUTION_MIN..=DUTY_RESOLUTION_MAX).contains(&self.duty_resolution) {
            return Err(Error::InvalidArgument("duty resolution must be 8..=10 bits"));
        }
        if self.channel_mask() == 0 {
            return Err(Error::InvalidArgument("no output channel configured"));
        }
        Ok(())
    }

    /// PWM carrier frequency for this resolution: the source clock divided
    /// by the duty range, rounded down to a whole kHz.
    pub fn pwm_frequency_hz(&self, source_clock_hz: u32) -> u32 {
        let freq = source_clock_hz >> self.duty_resolution;
        freq - freq % 1000
    }
}

/// Stream parameters that may change while the session is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlaybackParams {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bits per PCM sample (8, 16 or 32).
    pub bits_per_sample: u8,
    /// Channels interleaved in the input (1 or 2).
    pub channels: u8,
}

impl Default for PlaybackParams {
    fn default() -> Self {
        PlaybackParams {
            sample_rate: DEFAULT_SAMPLE_RATE,
            bits_per_sample: DEFAULT_BITS_PER_SAMPLE,
            channels: DEFAULT_CHANNELS,
        }
    }
}

impl PlaybackParams {
    pub fn validate(&self) -> Result<()> {
        validate_sample_rate(self.sample_rate)?;
        if !matches!(self.bits_per_sample, 8 | 16 | 32) {
            return Err(Error::InvalidArgument("bits per sample must be 8, 16 or 32"));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(Error::InvalidArgument("channel count must be 1 or 2"));
        }
        Ok(())
    }
}

pub(crate) fn validate_sample_rate(rate: u32) -> Result<()> {
    if (SAMPLE_RATE_MIN..=SAMPLE_RATE_MAX).contains(&rate) {
        Ok(())
    } else {
        Err(Error::InvalidArgument("sample rate must be 8000..=48000 Hz"))
    }
}

/// Alarm period in prescaled timer ticks for one sample.
pub fn alarm_period_ticks(base_clock_hz: u32, divider: u16, sample_rate: u32) -> u64 {
    u64::from(base_clock_hz / u32::from(divider) / sample_rate)
}
