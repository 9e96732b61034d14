//! Hardware collaborator traits.
//!
//! The playback core never touches registers itself. Board support code
//! implements these traits for its PWM engine and general-purpose timer, in
//! the same way a codec driver is handed an `embedded-hal` bus.
//!
//! | Trait | Used by | Purpose |
//! |-------|---------|---------|
//! | [`PwmPeripheral`] | session | PWM timer and channel setup, teardown |
//! | [`SetDutyCycle`] | tick handler | Fast-path duty register write |
//! | [`SampleTimer`] | session | Sample-rate alarm, interrupt enable, run/pause |
//! | [`TimerInterrupt`] | tick handler | Clear the interrupt and re-arm the alarm |

use core::fmt::Debug;

use embedded_hal::pwm::SetDutyCycle;

use crate::config::{ChannelBinding, TimerId};

/// PWM engine setup and teardown.
pub trait PwmPeripheral {
    /// Error reported by the PWM driver.
    type Error: Debug;

    /// Duty-register capability for one configured channel.
    ///
    /// This is the only path the interrupt handler has to the PWM
    /// hardware; `set_duty_cycle` must be callable from interrupt context
    /// and must not block.
    type Channel: SetDutyCycle;

    /// Frequency of the clock feeding the PWM timer, in Hz.
    fn source_clock_hz(&self) -> u32;

    /// Program PWM timer `timer` for `duty_resolution` bits at `freq_hz`.
    fn configure_timer(
        &mut self,
        timer: u8,
        duty_resolution: u8,
        freq_hz: u32,
    ) -> Result<(), Self::Error>;

    /// Route `binding.pin` to PWM channel `binding.channel`, clocked by
    /// PWM timer `timer`, starting at `initial_duty`.
    fn configure_channel(
        &mut self,
        binding: ChannelBinding,
        timer: u8,
        initial_duty: u16,
    ) -> Result<Self::Channel, Self::Error>;

    /// Stop PWM output on `channel`, leaving the pin at `idle_level`.
    fn stop_channel(&mut self, channel: u8, idle_level: bool) -> Result<(), Self::Error>;

    /// Return `pin` to input mode.
    fn set_pin_input(&mut self, pin: u8) -> Result<(), Self::Error>;
}

/// General-purpose timer that paces playback at the sample rate.
pub trait SampleTimer {
    /// Error reported by the timer driver.
    type Error: Debug;

    /// Interrupt token handed to the tick handler.
    type Irq: TimerInterrupt;

    /// Clock feeding the timer prescaler, in Hz.
    fn base_clock_hz(&self) -> u32;

    /// Initialize the timer: count up, paused, alarm enabled, auto reload
    /// on alarm, counter at zero, prescaled by `divider`.
    fn configure(&mut self, id: TimerId, divider: u16) -> Result<(), Self::Error>;

    /// Set the alarm (reload) period in prescaled ticks.
    fn set_alarm_period(&mut self, id: TimerId, ticks: u64) -> Result<(), Self::Error>;

    /// Register the periodic interrupt for `id` and return its token.
    fn bind_interrupt(&mut self, id: TimerId) -> Result<Self::Irq, Self::Error>;

    fn enable_interrupt(&mut self, id: TimerId) -> Result<(), Self::Error>;

    fn disable_interrupt(&mut self, id: TimerId) -> Result<(), Self::Error>;

    fn start(&mut self, id: TimerId) -> Result<(), Self::Error>;

    fn pause(&mut self, id: TimerId) -> Result<(), Self::Error>;
}

/// Interrupt-side timer access.
pub trait TimerInterrupt {
    /// Clear the pending alarm interrupt and re-enable the alarm so it
    /// fires again after the next period. ISR-safe, non-blocking.
    fn acknowledge(&mut self);
}
