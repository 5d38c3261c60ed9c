//! Pixel format conversion: JPEG frame into the fixed-size RGB888 raster.

use tracing::trace;

use super::frame::{FrameBuffer, PixelFormat, Resolution};
use crate::error::PipelineError;
use crate::pipeline::buffers::RgbBuffer;

/// Decode `frame` into `dest`, overwriting it completely.
///
/// Non-JPEG frames are rejected before `dest` is touched. On a decode error
/// the contents of `dest` are unspecified.
pub fn convert(frame: &FrameBuffer, dest: &mut RgbBuffer) -> Result<(), PipelineError> {
    if frame.meta.format != PixelFormat::Jpeg {
        return Err(PipelineError::UnsupportedFormat(frame.meta.format));
    }
    decode_jpeg(&frame.data, dest)?;
    trace!(sequence = frame.meta.sequence, "frame decoded to RGB888");
    Ok(())
}

fn check_dimensions(found: Resolution, expected: Resolution) -> Result<(), PipelineError> {
    if found != expected {
        return Err(PipelineError::DecodeFailed(format!(
            "frame is {found}, raster expects {expected}"
        )));
    }
    Ok(())
}

#[cfg(feature = "fast-jpeg")]
fn decode_jpeg(data: &[u8], dest: &mut RgbBuffer) -> Result<(), PipelineError> {
    use zune_jpeg::JpegDecoder;

    let mut decoder = JpegDecoder::new(data);
    decoder
        .decode_headers()
        .map_err(|e| PipelineError::DecodeFailed(format!("{e:?}")))?;

    let (width, height) = decoder
        .dimensions()
        .ok_or_else(|| PipelineError::DecodeFailed("missing frame header".into()))?;
    check_dimensions(
        Resolution::new(width as u32, height as u32),
        dest.resolution(),
    )?;

    let pixels = dest.pixels_mut();
    match decoder.output_buffer_size() {
        Some(len) if len == pixels.len() => {}
        other => {
            return Err(PipelineError::DecodeFailed(format!(
                "decoder output of {other:?} bytes does not fit a {} byte RGB raster",
                pixels.len()
            )))
        }
    }

    decoder
        .decode_into(pixels)
        .map_err(|e| PipelineError::DecodeFailed(format!("{e:?}")))
}

#[cfg(not(feature = "fast-jpeg"))]
fn decode_jpeg(data: &[u8], dest: &mut RgbBuffer) -> Result<(), PipelineError> {
    use jpeg_decoder::{Decoder, PixelFormat as JpegPixels};

    let mut decoder = Decoder::new(data);
    let decoded = decoder
        .decode()
        .map_err(|e| PipelineError::DecodeFailed(e.to_string()))?;
    let info = decoder
        .info()
        .ok_or_else(|| PipelineError::DecodeFailed("missing frame header".into()))?;
    check_dimensions(
        Resolution::new(info.width as u32, info.height as u32),
        dest.resolution(),
    )?;

    let pixels = dest.pixels_mut();
    match info.pixel_format {
        JpegPixels::RGB24 if decoded.len() == pixels.len() => {
            pixels.copy_from_slice(&decoded);
        }
        JpegPixels::L8 if decoded.len() * 3 == pixels.len() => {
            for (rgb, &luma) in pixels.chunks_exact_mut(3).zip(decoded.iter()) {
                rgb.fill(luma);
            }
        }
        other => {
            return Err(PipelineError::DecodeFailed(format!(
                "decoded {other:?} output does not fit a {} byte RGB raster",
                pixels.len()
            )))
        }
    }
    Ok(())
}
