/// Free-space threshold (bytes) above which the interrupt handler wakes a
/// blocked writer.
pub const BUFFER_LOW_WATER: usize = 256;

/// Smallest ring buffer accepted by [`RingBuffer::new`](crate::io::RingBuffer::new).
pub const MIN_BUFFER_SIZE: usize = BUFFER_LOW_WATER * 4;

/// Lowest supported sample rate in Hz.
pub const SAMPLE_RATE_MIN: u32 = 8_000;

/// Highest supported sample rate in Hz.
pub const SAMPLE_RATE_MAX: u32 = 48_000;

/// Duty resolution range of the PWM engine, in bits.
pub const DUTY_RESOLUTION_MIN: u8 = 8;
pub const DUTY_RESOLUTION_MAX: u8 = 10;

/// Prescaler programmed into the sample timer.
pub const TIMER_DIVIDER: u16 = 16;

/// Number of timer groups and timers per group the sample timer may select.
pub const TIMER_GROUPS: u8 = 2;
pub const TIMERS_PER_GROUP: u8 = 2;

/// Parameters programmed by `init` before the caller changes them.
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;
pub const DEFAULT_BITS_PER_SAMPLE: u8 = 8;
pub const DEFAULT_CHANNELS: u8 = 2;

/// Input is consumed in groups of this many bytes; a shorter tail is dropped.
pub const INPUT_ALIGN: usize = 4;

/// Bit for the left output in a channel mask.
pub const CHANNEL_LEFT_MASK: u8 = 0x01;

/// Bit for the right output in a channel mask.
pub const CHANNEL_RIGHT_MASK: u8 = 0x02;

/// Polling step used while a writer waits for buffer space, in microseconds.
pub const SPACE_POLL_US: u32 = 50;
