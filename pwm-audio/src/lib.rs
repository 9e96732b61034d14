//! # pwm-audio
//!
//! A `no_std` PCM playback driver that turns one or two PWM outputs into a
//! crude DAC. A periodic timer interrupt pulls one frame per sample period
//! from a lock-free ring buffer and writes it to the PWM duty registers;
//! the application feeds the buffer with ordinary signed PCM.
//!
//! Register access stays in board code: the driver is generic over the
//! [`PwmPeripheral`] and [`SampleTimer`] traits, uses `embedded-hal`'s
//! `SetDutyCycle` for the interrupt fast path and `DelayNs` while a writer
//! waits for space.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Config | [`config`] / [`constants`] | Pins, resolution, timer, buffer size, stream params |
//! | Seams | [`peripheral`] | Collaborator traits implemented by the board |
//! | Data path | [`io`] | Conversion, ring buffer, wakeup signal, tick handler |
//! | Session | [`session`] | `init` / `set_param` / `start` / `stop` / `write` / `deinit` |
//! | Errors | [`error`] | [`Error`] and [`Result`] |
//!
//! ## Quick start
//!
//! ```ignore
//! use pwm_audio::{PwmAudio, PwmAudioConfig, Timeout};
//!
//! let config = PwmAudioConfig::default()
//!     .with_left(25, 0)
//!     .with_right(26, 1)
//!     .with_duty_resolution(10)
//!     .with_ringbuf_len(4096);
//!
//! let (mut audio, mut tick) = PwmAudio::init(config, pwm, timer, delay)?;
//!
//! // In the sample timer ISR:
//! tick.on_tick();
//!
//! // In the application:
//! audio.set_param(16_000, 16, 1)?;
//! audio.start()?;
//! audio.write(&pcm, Timeout::Millis(100))?;
//! ```
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `serde` | no | `Serialize`/`Deserialize` for the config types |
//! | `defmt` | no | `defmt::Format` for public types |
//!
//! ## Logging
//!
//! Lifecycle events go through the [`log`](https://docs.rs/log) facade.
//! The interrupt path never logs.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod config;
pub mod constants;
pub mod error;
pub mod io;
pub mod peripheral;
pub mod session;

#[cfg(test)]
mod test_support;

pub use config::{ChannelBinding, PlaybackParams, PwmAudioConfig, TimerId};
pub use error::{Error, Result, SessionError};
pub use io::{PwmTickHandler, Timeout};
pub use peripheral::{PwmPeripheral, SampleTimer, TimerInterrupt};
pub use session::{InitResult, PwmAudio, Status, TickHandler};
