//! PCM to PWM duty conversion.
//!
//! Signed little-endian PCM samples (8, 16 or 32 bit) are moved to unsigned
//! by adding the format's mid-scale offset, then shifted to the PWM duty
//! resolution:
//!
//! ```text
//! shift = bits_per_sample - duty_resolution
//! duty  = (sample + offset) >> shift        (shift >= 0)
//! duty  = (sample + offset) << -shift       (8-bit input, 9/10-bit duty)
//! ```
//!
//! | Format | Offset       |
//! |--------|--------------|
//! | 8 bit  | `0x7F`       |
//! | 16 bit | `0x7FFF`     |
//! | 32 bit | `0x7FFF_FFFF`|
//!
//! The offset add wraps in the sample width. Duty values are queued as one
//! byte when the resolution is 8 bits and as two little-endian bytes above
//! that. Interleaved stereo input keeps its L R L R order; channel
//! duplication for mono input happens in the interrupt handler, not here.

use core::slice::ChunksExact;

use crate::constants::{DUTY_RESOLUTION_MAX, DUTY_RESOLUTION_MIN, INPUT_ALIGN};
use crate::error::{Error, Result};

/// Supported PCM sample widths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleWidth {
    Bits8,
    Bits16,
    Bits32,
}

impl SampleWidth {
    /// Width in bits.
    pub const fn bits(self) -> u8 {
        match self {
            SampleWidth::Bits8 => 8,
            SampleWidth::Bits16 => 16,
            SampleWidth::Bits32 => 32,
        }
    }

    /// Width in bytes.
    pub const fn bytes(self) -> usize {
        self.bits() as usize / 8
    }
}

impl TryFrom<u8> for SampleWidth {
    type Error = Error;

    fn try_from(bits: u8) -> Result<Self> {
        match bits {
            8 => Ok(SampleWidth::Bits8),
            16 => Ok(SampleWidth::Bits16),
            32 => Ok(SampleWidth::Bits32),
            _ => Err(Error::InvalidArgument("bits per sample must be 8, 16 or 32")),
        }
    }
}

/// Stateless sample converter for one `(width, duty resolution)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleConverter {
    width: SampleWidth,
    duty_resolution: u8,
}

impl SampleConverter {
    /// Create a converter.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if `duty_resolution` is outside 8..=10.
    pub fn new(width: SampleWidth, duty_resolution: u8) -> Result<Self> {
        if !(DUTY_RESOLUTION_MIN..=DUTY_RESOLUTION_MAX).contains(&duty_resolution) {
            return Err(Error::InvalidArgument("duty resolution must be 8..=10 bits"));
        }
        Ok(SampleConverter {
            width,
            duty_resolution,
        })
    }

    pub fn width(&self) -> SampleWidth {
        self.width
    }

    pub fn duty_resolution(&self) -> u8 {
        self.duty_resolution
    }

    /// `bits_per_sample - duty_resolution`; negative only for 8-bit input.
    pub fn shift(&self) -> i8 {
        self.width.bits() as i8 - self.duty_resolution as i8
    }

    /// Bytes queued per duty value: 1 at 8-bit resolution, 2 above.
    pub fn duty_bytes(&self) -> usize {
        duty_width(self.duty_resolution)
    }

    /// Queued bytes produced by one aligned input group of [`INPUT_ALIGN`] bytes.
    pub fn output_per_group(&self) -> usize {
        INPUT_ALIGN / self.width.bytes() * self.duty_bytes()
    }

    /// Queued bytes produced by `input_len` input bytes (tail truncated).
    pub fn output_len(&self, input_len: usize) -> usize {
        aligned_len(input_len) / INPUT_ALIGN * self.output_per_group()
    }

    /// Convert one little-endian sample to a duty value. `sample` holds
    /// exactly `width.bytes()` bytes.
    pub(crate) fn convert_sample(&self, sample: &[u8]) -> u16 {
        let shift = self.shift();
        match self.width {
            SampleWidth::Bits8 => {
                let unsigned = sample[0].wrapping_add(0x7F) as u16;
                if shift < 0 {
                    unsigned << (-shift) as u32
                } else {
                    unsigned >> shift as u32
                }
            }
            SampleWidth::Bits16 => {
                let raw = u16::from_le_bytes([sample[0], sample[1]]);
                raw.wrapping_add(0x7FFF) >> shift as u32
            }
            SampleWidth::Bits32 => {
                let raw = u32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]);
                (raw.wrapping_add(0x7FFF_FFFF) >> shift as u32) as u16
            }
        }
    }

    /// Iterate the duty values of `input`, truncated to a multiple of
    /// [`INPUT_ALIGN`] bytes.
    pub fn duty_values<'a>(&self, input: &'a [u8]) -> DutyValues<'a> {
        DutyValues {
            converter: *self,
            samples: input[..aligned_len(input.len())].chunks_exact(self.width.bytes()),
        }
    }

    /// Duty value produced by digital silence (sample value 0).
    pub fn silence(&self) -> u16 {
        self.convert_sample(&[0u8; 4][..self.width.bytes()])
    }
}

/// Iterator over converted duty values. See [`SampleConverter::duty_values`].
pub struct DutyValues<'a> {
    converter: SampleConverter,
    samples: ChunksExact<'a, u8>,
}

impl Iterator for DutyValues<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        self.samples
            .next()
            .map(|sample| self.converter.convert_sample(sample))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.samples.size_hint()
    }
}

impl ExactSizeIterator for DutyValues<'_> {}

/// Bytes per queued duty value for a resolution.
#[inline]
pub const fn duty_width(duty_resolution: u8) -> usize {
    if duty_resolution > 8 {
        2
    } else {
        1
    }
}

/// Round `len` down to a multiple of [`INPUT_ALIGN`].
#[inline]
pub const fn aligned_len(len: usize) -> usize {
    len & !(INPUT_ALIGN - 1)
}
