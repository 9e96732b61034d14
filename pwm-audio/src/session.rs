//! PWM audio session.
//!
//! [`PwmAudio`] owns the configuration, the PWM and timer collaborators and
//! the producer side of the ring buffer. [`PwmAudio::init`] also returns the
//! [`PwmTickHandler`] that the board code installs in the sample timer's
//! interrupt.
//!
//! # State machine
//!
//! ```text
//!              init                start
//! Uninitialized ───► Idle ◄──────────────► Busy
//!       ▲              │       stop          │
//!       └──── deinit ──┴─────────────────────┘
//! ```
//!
//! At most one session is live at a time; a second `init` fails with
//! [`Error::InvalidState`] until the first session is torn down or dropped.
//!
//! # Example
//!
//! ```ignore
//! let config = PwmAudioConfig::default()
//!     .with_left(25, 0)
//!     .with_right(26, 1)
//!     .with_duty_resolution(10);
//!
//! let (mut audio, tick) = PwmAudio::init(config, ledc, timer_group, delay)?;
//! // Move `tick` into the timer ISR and call `tick.on_tick()` there.
//!
//! audio.set_param(22_050, 16, 2)?;
//! audio.start()?;
//! let written = audio.write(&pcm, Timeout::Forever)?;
//! audio.stop()?;
//! let (ledc, timer_group, delay) = audio.deinit()?;
//! ```

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal::delay::DelayNs;

use crate::config::{
    alarm_period_ticks, validate_sample_rate, ChannelBinding, PlaybackParams, PwmAudioConfig,
    TimerId,
};
use crate::constants::{INPUT_ALIGN, TIMER_DIVIDER};
use crate::error::{Error, Result, SessionError};
use crate::io::convert::{aligned_len, SampleConverter, SampleWidth};
use crate::io::output_pwm::{PlaybackShared, PwmTickHandler};
use crate::io::ring_buffer::RingBuffer;
use crate::io::signal::Timeout;
use crate::peripheral::{PwmPeripheral, SampleTimer};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Status {
    /// No live session, or the session has been torn down.
    Uninitialized = 0,
    /// Configured; the sample timer is stopped.
    Idle = 1,
    /// The sample timer is running and the tick handler plays audio.
    Busy = 2,
}

impl Status {
    pub(crate) fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Status::Idle,
            2 => Status::Busy,
            _ => Status::Uninitialized,
        }
    }
}

/// Set while a session exists.
static SESSION_LIVE: AtomicBool = AtomicBool::new(false);

/// Exclusive claim on the process-wide session slot, released on drop.
struct SessionSlot;

impl SessionSlot {
    fn claim() -> Result<Self> {
        SESSION_LIVE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| SessionSlot)
            .map_err(|_| {
                log::error!("pwm audio session already initialized");
                Error::InvalidState(Status::Idle)
            })
    }
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        SESSION_LIVE.store(false, Ordering::Release);
    }
}

/// Ties the slot to the playback state it guards.
///
/// Dropping it marks the shared state [`Status::Uninitialized`] before the
/// slot is released, so a tick handler that outlives its session stops
/// playing before another session can be created.
struct SessionGuard {
    shared: Arc<PlaybackShared>,
    _slot: SessionSlot,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.shared.status() != Status::Uninitialized {
            log::warn!("pwm audio session dropped without deinit");
            self.shared.set_status(Status::Uninitialized);
        }
    }
}

/// Log a collaborator failure and map it to [`Error::Peripheral`].
fn peripheral_err<E: core::fmt::Debug>(what: &'static str) -> impl FnOnce(E) -> Error {
    move |e| {
        log::error!("{} failed: {:?}", what, e);
        Error::Peripheral
    }
}

/// Stop each bound output and return its pin to input mode.
///
/// Every step is attempted for every binding; the first failure is
/// returned.
fn release_outputs<P: PwmPeripheral>(
    pwm: &mut P,
    bindings: impl IntoIterator<Item = ChannelBinding>,
) -> Result<()> {
    let mut result = Ok(());
    for binding in bindings {
        let stopped = pwm
            .stop_channel(binding.channel, false)
            .map_err(peripheral_err("channel stop"));
        let input = pwm
            .set_pin_input(binding.pin)
            .map_err(peripheral_err("pin release"));
        result = result.and(stopped).and(input);
    }
    result
}

/// Program the sample timer's alarm for `sample_rate`.
fn program_period<T: SampleTimer>(timer: &mut T, id: TimerId, sample_rate: u32) -> Result<()> {
    let ticks = alarm_period_ticks(timer.base_clock_hz(), TIMER_DIVIDER, sample_rate);
    log::debug!("sample timer period {} ticks at {} Hz", ticks, sample_rate);
    timer
        .set_alarm_period(id, ticks)
        .map_err(peripheral_err("sample timer period"))
}

/// Hardware handed to the tick handler by a successful bring-up.
struct Outputs<C, I> {
    ring: RingBuffer,
    left: Option<C>,
    right: Option<C>,
    irq: I,
}

/// The PWM audio session.
///
/// Generic over the PWM engine `P`, the sample timer `T` and the delay
/// provider `D` used while [`write`](Self::write) waits for buffer space.
///
/// Dropping a session without [`deinit`](Self::deinit) silences its tick
/// handler and frees the session slot, but leaves the outputs and timer
/// as the collaborators' own drop leaves them.
pub struct PwmAudio<P, T, D> {
    config: PwmAudioConfig,
    params: PlaybackParams,
    pwm: P,
    timer: T,
    delay: D,
    shared: Arc<PlaybackShared>,
    _guard: SessionGuard,
}

/// Tick handler type returned by [`PwmAudio::init`].
pub type TickHandler<P, T> =
    PwmTickHandler<<P as PwmPeripheral>::Channel, <T as SampleTimer>::Irq>;

/// Result of [`PwmAudio::init`].
pub type InitResult<P, T, D> =
    core::result::Result<(PwmAudio<P, T, D>, TickHandler<P, T>), SessionError<P, T, D>>;

impl<P, T, D> PwmAudio<P, T, D>
where
    P: PwmPeripheral,
    T: SampleTimer,
    D: DelayNs,
{
    /// Create the session: allocate the ring buffer, bind the outputs,
    /// program the default parameters (16 kHz, 8 bit, stereo) and go
    /// [`Status::Idle`].
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if another session is live.
    /// - [`Error::InvalidArgument`] for a bad timer identity, duty
    ///   resolution, buffer size, or no bound output.
    /// - [`Error::Allocation`] if the ring buffer cannot be allocated.
    /// - [`Error::Peripheral`] if a collaborator rejects its setup.
    ///
    /// On failure, outputs bound so far are released again and the
    /// collaborators come back inside the [`SessionError`].
    pub fn init(config: PwmAudioConfig, mut pwm: P, mut timer: T, delay: D) -> InitResult<P, T, D> {
        let slot = match SessionSlot::claim() {
            Ok(slot) => slot,
            Err(error) => return Err(SessionError::new(error, pwm, timer, delay)),
        };
        let outputs = match Self::bring_up(&config, &mut pwm, &mut timer) {
            Ok(outputs) => outputs,
            Err(error) => return Err(SessionError::new(error, pwm, timer, delay)),
        };

        let params = PlaybackParams::default();
        let shared = Arc::new(PlaybackShared::new(outputs.ring, params.channels));
        let tick = PwmTickHandler::new(
            shared.clone(),
            outputs.left,
            outputs.right,
            outputs.irq,
            config.duty_resolution,
        );
        shared.set_status(Status::Idle);

        log::info!(
            "pwm audio ready: mask {:#04x}, {} bit duty, {} byte buffer",
            config.channel_mask(),
            config.duty_resolution,
            config.ringbuf_len
        );
        let audio = PwmAudio {
            config,
            params,
            pwm,
            timer,
            delay,
            shared: shared.clone(),
            _guard: SessionGuard {
                shared,
                _slot: slot,
            },
        };
        Ok((audio, tick))
    }

    /// Every fallible step of `init`. Undoes the channel setup if a later
    /// step fails.
    fn bring_up(
        config: &PwmAudioConfig,
        pwm: &mut P,
        timer: &mut T,
    ) -> Result<Outputs<P::Channel, T::Irq>> {
        config.validate().map_err(|e| {
            log::error!("invalid pwm audio config: {}", e);
            e
        })?;
        let ring = RingBuffer::new(config.ringbuf_len)?;

        let freq = config.pwm_frequency_hz(pwm.source_clock_hz());
        log::debug!(
            "pwm timer {}: {} bit duty at {} Hz",
            config.pwm_timer,
            config.duty_resolution,
            freq
        );
        pwm.configure_timer(config.pwm_timer, config.duty_resolution, freq)
            .map_err(peripheral_err("pwm timer config"))?;

        let left = match config.left {
            Some(binding) => Some(
                pwm.configure_channel(binding, config.pwm_timer, 0)
                    .map_err(peripheral_err("left channel config"))?,
            ),
            None => None,
        };
        let right = match config.right {
            Some(binding) => match pwm.configure_channel(binding, config.pwm_timer, 0) {
                Ok(channel) => Some(channel),
                Err(e) => {
                    let _ = release_outputs(pwm, config.left);
                    return Err(peripheral_err("right channel config")(e));
                }
            },
            None => None,
        };

        let irq = match Self::set_up_timer(config, timer) {
            Ok(irq) => irq,
            Err(e) => {
                // Release failures are logged; the setup error is reported.
                let _ = release_outputs(pwm, config.left.into_iter().chain(config.right));
                return Err(e);
            }
        };

        Ok(Outputs {
            ring,
            left,
            right,
            irq,
        })
    }

    fn set_up_timer(config: &PwmAudioConfig, timer: &mut T) -> Result<T::Irq> {
        timer
            .configure(config.timer, TIMER_DIVIDER)
            .map_err(peripheral_err("sample timer config"))?;
        let irq = timer
            .bind_interrupt(config.timer)
            .map_err(peripheral_err("sample timer interrupt"))?;
        program_period(timer, config.timer, PlaybackParams::default().sample_rate)?;
        Ok(irq)
    }

    /// Current lifecycle state.
    pub fn status(&self) -> Status {
        self.shared.status()
    }

    /// Current stream parameters.
    pub fn params(&self) -> PlaybackParams {
        self.params
    }

    /// Static configuration this session was created with.
    pub fn config(&self) -> &PwmAudioConfig {
        &self.config
    }

    /// Bound outputs as a left/right bit mask.
    pub fn channel_mask(&self) -> u8 {
        self.config.channel_mask()
    }

    /// Bytes that can be queued without waiting.
    pub fn free_bytes(&self) -> usize {
        self.shared.ring.free_count()
    }

    /// Bytes queued and not yet played.
    pub fn queued_bytes(&self) -> usize {
        self.shared.ring.len()
    }

    fn ensure_not_busy(&self) -> Result<()> {
        match self.status() {
            Status::Busy => {
                log::error!("cannot reconfigure while playing");
                Err(Error::InvalidState(Status::Busy))
            }
            _ => Ok(()),
        }
    }

    /// Program the alarm period for `params` and adopt them.
    fn apply_params(&mut self, params: PlaybackParams) -> Result<()> {
        program_period(&mut self.timer, self.config.timer, params.sample_rate)?;
        self.params = params;
        self.shared.set_source_channels(params.channels);
        Ok(())
    }

    /// Set sample rate, bits per sample and channel count.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] while [`Status::Busy`].
    /// - [`Error::InvalidArgument`] if rate is outside 8000..=48000 Hz,
    ///   bits is not 8/16/32 or channels is not 1/2.
    ///
    /// On error the previous parameters stay in effect.
    pub fn set_param(&mut self, sample_rate: u32, bits_per_sample: u8, channels: u8) -> Result<()> {
        self.ensure_not_busy()?;
        let params = PlaybackParams {
            sample_rate,
            bits_per_sample,
            channels,
        };
        params.validate().map_err(|e| {
            log::error!("rejected playback params {:?}: {}", params, e);
            e
        })?;

        self.apply_params(params)?;
        log::info!(
            "playback params: {} Hz, {} bit, {} ch",
            sample_rate,
            bits_per_sample,
            channels
        );
        Ok(())
    }

    /// Change only the sample rate. Same rules as [`set_param`](Self::set_param).
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<()> {
        self.ensure_not_busy()?;
        validate_sample_rate(sample_rate).map_err(|e| {
            log::error!("rejected sample rate {}: {}", sample_rate, e);
            e
        })?;

        let params = PlaybackParams {
            sample_rate,
            ..self.params
        };
        self.apply_params(params)?;
        log::info!("sample rate: {} Hz", sample_rate);
        Ok(())
    }

    /// Start playback. Only from [`Status::Idle`].
    pub fn start(&mut self) -> Result<()> {
        let status = self.status();
        if status != Status::Idle {
            log::error!("start rejected in state {:?}", status);
            return Err(Error::InvalidState(status));
        }

        // Busy before the first tick can fire.
        self.shared.set_status(Status::Busy);
        let id = self.config.timer;
        let started = self
            .timer
            .enable_interrupt(id)
            .and_then(|()| self.timer.start(id))
            .map_err(peripheral_err("sample timer start"));
        if let Err(e) = started {
            let _ = self
                .timer
                .disable_interrupt(id)
                .map_err(peripheral_err("sample timer rollback"));
            self.shared.set_status(Status::Idle);
            return Err(e);
        }

        log::info!("pwm audio started");
        Ok(())
    }

    /// Stop playback and discard queued audio. Idempotent.
    ///
    /// The PWM outputs keep their last duty value, which avoids a click.
    pub fn stop(&mut self) -> Result<()> {
        let id = self.config.timer;
        let paused = self
            .timer
            .pause(id)
            .and_then(|()| self.timer.disable_interrupt(id))
            .map_err(peripheral_err("sample timer stop"));

        // Flush even if the timer complained: stale bytes must not replay.
        self.shared.set_status(Status::Idle);
        self.shared.ring.flush();
        paused?;

        log::info!("pwm audio stopped");
        Ok(())
    }

    /// Queue PCM data for playback, converting it to duty values.
    ///
    /// `data` holds interleaved little-endian signed samples in the current
    /// [`params`](Self::params) format. It is consumed in 4-byte groups; a
    /// trailing remainder of fewer than 4 bytes is dropped but counted as
    /// written. When the buffer is full the call waits (up to `timeout`)
    /// for the interrupt handler to free space.
    ///
    /// Returns the number of bytes consumed, always `data.len()` on success.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `data` is empty.
    /// - [`Error::Timeout`] with the count of bytes accepted before the
    ///   wait expired.
    pub fn write(&mut self, data: &[u8], timeout: Timeout) -> Result<usize> {
        if data.is_empty() {
            log::error!("write called with empty buffer");
            return Err(Error::InvalidArgument("empty input"));
        }

        let width = SampleWidth::try_from(self.params.bits_per_sample)?;
        let converter = SampleConverter::new(width, self.config.duty_resolution)?;
        let duty_bytes = converter.duty_bytes();
        let per_group = converter.output_per_group();
        let ring = &self.shared.ring;

        let playable = aligned_len(data.len());
        let mut accepted = 0;

        while accepted < playable {
            let groups = ((playable - accepted) / INPUT_ALIGN).min(ring.free_count() / per_group);
            if groups == 0 {
                if !ring.wait_for_space(timeout, &mut self.delay) {
                    log::warn!(
                        "write timed out: {} of {} bytes accepted",
                        accepted,
                        data.len()
                    );
                    return Err(Error::Timeout { accepted });
                }
                continue;
            }

            let chunk = &data[accepted..accepted + groups * INPUT_ALIGN];
            for duty in converter.duty_values(chunk) {
                ring.write_duty(duty, duty_bytes)
                    .map_err(|_| Error::Timeout { accepted })?;
            }
            accepted += chunk.len();
        }

        if playable < data.len() {
            log::trace!("dropped {} misaligned trailing bytes", data.len() - playable);
        }
        Ok(data.len())
    }

    /// Tear the session down: stop, disable outputs and return the pins to
    /// input mode.
    ///
    /// Gives back the collaborators, also on failure (inside the
    /// [`SessionError`]). A tick handler still holding the shared state
    /// sees [`Status::Uninitialized`] and does nothing; the ring buffer is
    /// freed once that handler is dropped too.
    pub fn deinit(mut self) -> core::result::Result<(P, T, D), SessionError<P, T, D>> {
        let stopped = self.stop();
        self.shared.set_status(Status::Uninitialized);
        let released = release_outputs(
            &mut self.pwm,
            self.config.left.into_iter().chain(self.config.right),
        );

        let PwmAudio {
            pwm, timer, delay, ..
        } = self;
        if let Err(error) = stopped.and(released) {
            return Err(SessionError::new(error, pwm, timer, delay));
        }

        log::info!("pwm audio deinitialized");
        Ok((pwm, timer, delay))
    }
}
