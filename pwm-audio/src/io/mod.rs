//! Playback data path.
//!
//! Everything between the writer's PCM bytes and the PWM duty registers.
//!
//! ## Components
//!
//! | Item | Context | Description |
//! |------|---------|-------------|
//! | [`SampleConverter`] | task | Signed PCM → unsigned duty values |
//! | [`RingBuffer`] | both | Lock-free SPSC byte queue of duty values |
//! | [`BinarySignal`] | both | "Space available" wakeup from the ISR |
//! | [`PwmTickHandler`] | ISR | One frame per sample tick to the duty registers |
//!
//! ## Queue layout
//!
//! Duty values are stored as one byte at 8-bit resolution and as two
//! little-endian bytes at 9 or 10 bits. Stereo values alternate left,
//! right; mono values are stored once and duplicated at output time.

pub mod convert;
pub mod output_pwm;
pub mod ring_buffer;
pub mod signal;

pub use convert::{SampleConverter, SampleWidth};
pub use output_pwm::PwmTickHandler;
pub use ring_buffer::{BufferEmpty, BufferFull, RingBuffer};
pub use signal::{BinarySignal, Timeout};
