//! Mock collaborators shared by the unit and integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::vec::Vec;

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::{ErrorType, SetDutyCycle};

use crate::config::{ChannelBinding, TimerId};
use crate::peripheral::{PwmPeripheral, SampleTimer, TimerInterrupt};

// ── Session serialization ─────────────────────────────────────────────

/// Only one session may be live; tests that create one hold this lock.
static SESSION_LOCK: Mutex<()> = Mutex::new(());

pub(crate) fn session_lock() -> MutexGuard<'static, ()> {
    // A failed test poisons the lock; the session slot is still released
    // by drop, so carry on.
    SESSION_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

// ── Delays ────────────────────────────────────────────────────────────

/// Delay that returns immediately.
pub(crate) struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Delay that yields the thread, for tests with a real consumer thread.
pub(crate) struct YieldDelay;

impl DelayNs for YieldDelay {
    fn delay_ns(&mut self, _ns: u32) {
        std::thread::yield_now();
    }
}

// ── Duty channel ──────────────────────────────────────────────────────

/// Duty channel that records every value written. Clones share the log.
#[derive(Clone, Default)]
pub(crate) struct DutyProbe {
    log: Arc<Mutex<Vec<u16>>>,
}

impl DutyProbe {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn history(&self) -> Vec<u16> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn last(&self) -> Option<u16> {
        self.log.lock().unwrap().last().copied()
    }

    pub(crate) fn writes(&self) -> usize {
        self.log.lock().unwrap().len()
    }
}

impl ErrorType for DutyProbe {
    type Error = Infallible;
}

impl SetDutyCycle for DutyProbe {
    fn max_duty_cycle(&self) -> u16 {
        0x3FF
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.log.lock().unwrap().push(duty);
        Ok(())
    }
}

// ── Timer interrupt ───────────────────────────────────────────────────

/// Counts acknowledgements. Clones share the counter.
#[derive(Clone, Default)]
pub(crate) struct MockIrq {
    acks: Arc<AtomicUsize>,
}

impl MockIrq {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn count(&self) -> usize {
        self.acks.load(Ordering::Relaxed)
    }
}

impl TimerInterrupt for MockIrq {
    fn acknowledge(&mut self) {
        self.acks.fetch_add(1, Ordering::Relaxed);
    }
}

// ── PWM engine ────────────────────────────────────────────────────────

#[derive(Debug)]
pub(crate) struct MockError;

/// PWM engine that records its setup and hands out [`DutyProbe`]s.
#[derive(Default)]
pub(crate) struct MockPwm {
    timer_setup: Option<(u8, u8, u32)>,
    channels: Vec<(ChannelBinding, u16)>,
    stopped: Vec<u8>,
    inputs: Vec<u8>,
    probes: Arc<Mutex<Vec<DutyProbe>>>,
    /// `configure_channel` fails from this call index on.
    fail_channel_from: Option<usize>,
    fail_stop: bool,
}

impl MockPwm {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make every `configure_channel` call fail.
    pub(crate) fn fail_channel_config(&mut self) {
        self.fail_channel_from(0);
    }

    /// Let the first `ok` channel configurations succeed, fail the rest.
    pub(crate) fn fail_channel_from(&mut self, ok: usize) {
        self.fail_channel_from = Some(ok);
    }

    /// Make `stop_channel` fail.
    pub(crate) fn fail_stop_channel(&mut self) {
        self.fail_stop = true;
    }

    /// Handle to the probes created so far, in configuration order.
    /// Stays valid after the mock is moved into a session.
    pub(crate) fn probes(&self) -> Arc<Mutex<Vec<DutyProbe>>> {
        self.probes.clone()
    }

    /// `(timer, duty_resolution, freq_hz)` of the last timer setup.
    pub(crate) fn timer_setup(&self) -> Option<(u8, u8, u32)> {
        self.timer_setup
    }

    pub(crate) fn channels(&self) -> Vec<(ChannelBinding, u16)> {
        self.channels.clone()
    }

    pub(crate) fn stopped(&self) -> Vec<u8> {
        self.stopped.clone()
    }

    pub(crate) fn inputs(&self) -> Vec<u8> {
        self.inputs.clone()
    }
}

impl PwmPeripheral for MockPwm {
    type Error = MockError;
    type Channel = DutyProbe;

    fn source_clock_hz(&self) -> u32 {
        80_000_000
    }

    fn configure_timer(
        &mut self,
        timer: u8,
        duty_resolution: u8,
        freq_hz: u32,
    ) -> Result<(), MockError> {
        self.timer_setup = Some((timer, duty_resolution, freq_hz));
        Ok(())
    }

    fn configure_channel(
        &mut self,
        binding: ChannelBinding,
        _timer: u8,
        initial_duty: u16,
    ) -> Result<DutyProbe, MockError> {
        if self.fail_channel_from.is_some_and(|ok| self.channels.len() >= ok) {
            return Err(MockError);
        }
        self.channels.push((binding, initial_duty));
        let probe = DutyProbe::new();
        self.probes.lock().unwrap().push(probe.clone());
        Ok(probe)
    }

    fn stop_channel(&mut self, channel: u8, _idle_level: bool) -> Result<(), MockError> {
        if self.fail_stop {
            return Err(MockError);
        }
        self.stopped.push(channel);
        Ok(())
    }

    fn set_pin_input(&mut self, pin: u8) -> Result<(), MockError> {
        self.inputs.push(pin);
        Ok(())
    }
}

// ── Sample timer ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerCall {
    Configure(u16),
    Period(u64),
    BindIrq,
    EnableIrq,
    DisableIrq,
    Start,
    Pause,
}

/// Sample timer that logs every call. Base clock 80 MHz.
#[derive(Default)]
pub(crate) struct MockTimer {
    calls: Vec<TimerCall>,
    ids: Vec<TimerId>,
    irq: MockIrq,
    fail_start: bool,
    fail_bind: bool,
}

impl MockTimer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make `start` fail.
    pub(crate) fn fail_start(&mut self) {
        self.fail_start = true;
    }

    /// Make `bind_interrupt` fail.
    pub(crate) fn fail_bind_interrupt(&mut self) {
        self.fail_bind = true;
    }

    pub(crate) fn clear_failures(&mut self) {
        self.fail_start = false;
        self.fail_bind = false;
    }

    pub(crate) fn calls(&self) -> Vec<TimerCall> {
        self.calls.clone()
    }

    /// Every timer identity the session addressed.
    pub(crate) fn ids(&self) -> Vec<TimerId> {
        self.ids.clone()
    }

    fn record(&mut self, id: TimerId, call: TimerCall) {
        self.ids.push(id);
        self.calls.push(call);
    }
}

impl SampleTimer for MockTimer {
    type Error = MockError;
    type Irq = MockIrq;

    fn base_clock_hz(&self) -> u32 {
        80_000_000
    }

    fn configure(&mut self, id: TimerId, divider: u16) -> Result<(), MockError> {
        self.record(id, TimerCall::Configure(divider));
        Ok(())
    }

    fn set_alarm_period(&mut self, id: TimerId, ticks: u64) -> Result<(), MockError> {
        self.record(id, TimerCall::Period(ticks));
        Ok(())
    }

    fn bind_interrupt(&mut self, id: TimerId) -> Result<MockIrq, MockError> {
        if self.fail_bind {
            return Err(MockError);
        }
        self.record(id, TimerCall::BindIrq);
        Ok(self.irq.clone())
    }

    fn enable_interrupt(&mut self, id: TimerId) -> Result<(), MockError> {
        self.record(id, TimerCall::EnableIrq);
        Ok(())
    }

    fn disable_interrupt(&mut self, id: TimerId) -> Result<(), MockError> {
        self.record(id, TimerCall::DisableIrq);
        Ok(())
    }

    fn start(&mut self, id: TimerId) -> Result<(), MockError> {
        if self.fail_start {
            return Err(MockError);
        }
        self.record(id, TimerCall::Start);
        Ok(())
    }

    fn pause(&mut self, id: TimerId) -> Result<(), MockError> {
        self.record(id, TimerCall::Pause);
        Ok(())
    }
}
