//! Error type shared by every fallible operation of the crate.

use crate::session::Status;

/// Errors returned at the public API boundary.
///
/// Nothing in the interrupt path produces an `Error`; underruns there are
/// absorbed by holding the previous duty value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Out-of-range configuration, empty input or unsupported sample format.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The operation is not permitted while the session is in this state.
    #[error("operation not permitted while {0:?}")]
    InvalidState(Status),

    /// Ring buffer storage could not be allocated.
    #[error("ring buffer allocation failed")]
    Allocation,

    /// The writer did not get buffer space before its deadline.
    ///
    /// `accepted` bytes of the input were queued before the wait expired;
    /// the caller resumes from that offset.
    #[error("timed out waiting for buffer space after {accepted} bytes")]
    Timeout { accepted: usize },

    /// A PWM or timer collaborator reported a failure.
    #[error("peripheral operation failed")]
    Peripheral,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

/// A failed [`init`](crate::PwmAudio::init) or
/// [`deinit`](crate::PwmAudio::deinit) that hands the collaborators back.
///
/// PWM and timer drivers are usually singletons, so the caller gets them
/// back to retry or clean up. Converts into [`Error`] with `?`.
#[derive(thiserror::Error)]
#[error("{error}")]
pub struct SessionError<P, T, D> {
    pub error: Error,
    pub pwm: P,
    pub timer: T,
    pub delay: D,
}

impl<P, T, D> SessionError<P, T, D> {
    pub(crate) fn new(error: Error, pwm: P, timer: T, delay: D) -> Self {
        SessionError {
            error,
            pwm,
            timer,
            delay,
        }
    }

    /// The collaborators, in `(pwm, timer, delay)` order.
    pub fn into_parts(self) -> (P, T, D) {
        (self.pwm, self.timer, self.delay)
    }
}

impl<P, T, D> core::fmt::Debug for SessionError<P, T, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<P, T, D> From<SessionError<P, T, D>> for Error {
    fn from(e: SessionError<P, T, D>) -> Self {
        e.error
    }
}
