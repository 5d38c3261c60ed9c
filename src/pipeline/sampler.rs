//! Pull-based sample provider over the inference buffer.
//!
//! The model consumes one `f32` per pixel holding the 24-bit packed RGB
//! value `(r << 16) | (g << 8) | b`. This is the encoding the trained model
//! expects, not a normalized intensity, and it is exact in `f32`.

use crate::capture::frame::RGB_BYTES_PER_PIXEL;
use crate::error::SampleError;

/// Pack one RGB888 pixel into the model's scalar encoding.
#[inline]
pub fn pack_rgb(r: u8, g: u8, b: u8) -> f32 {
    (((r as u32) << 16) | ((g as u32) << 8) | b as u32) as f32
}

/// Read-only view of the inference buffer handed to the engine for one call.
#[derive(Debug, Clone, Copy)]
pub struct SampleProvider<'a> {
    pixels: &'a [u8],
}

impl<'a> SampleProvider<'a> {
    /// An empty slice stands for a buffer that was never allocated.
    pub fn new(pixels: &'a [u8]) -> Self {
        Self { pixels }
    }

    /// Number of pixels available to the engine.
    pub fn total_length(&self) -> usize {
        self.pixels.len() / RGB_BYTES_PER_PIXEL
    }

    /// Fill `out` with `out.len()` packed pixels starting at pixel `offset`.
    pub fn get_samples(&self, offset: usize, out: &mut [f32]) -> Result<(), SampleError> {
        if self.pixels.is_empty() {
            return Err(SampleError::Unallocated);
        }
        let total = self.total_length();
        let window = offset
            .checked_add(out.len())
            .filter(|&end| end <= total)
            .map(|end| &self.pixels[offset * RGB_BYTES_PER_PIXEL..end * RGB_BYTES_PER_PIXEL])
            .ok_or(SampleError::OutOfRange {
                offset,
                count: out.len(),
                total,
            })?;

        for (sample, px) in out.iter_mut().zip(window.chunks_exact(RGB_BYTES_PER_PIXEL)) {
            *sample = pack_rgb(px[0], px[1], px[2]);
        }
        Ok(())
    }
}
