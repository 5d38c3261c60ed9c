use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Bytes per pixel in every raw raster the pipeline owns (interleaved RGB888).
pub const RGB_BYTES_PER_PIXEL: usize = 3;

/// Width and height of a frame or raster in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size of an RGB888 raster at this resolution.
    pub fn rgb_len(&self) -> usize {
        self.pixels() * RGB_BYTES_PER_PIXEL
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Compressed frame handed out by the camera peripheral.
///
/// The data is refcounted, so cloning it for the HTTP snapshot does not copy
/// pixels; the peripheral slot itself is tracked by [`FrameSource`].
///
/// [`FrameSource`]: crate::capture::FrameSource
#[derive(Clone)]
pub struct FrameBuffer {
    pub data: Bytes,
    pub meta: FrameMetadata,
    /// Capture timestamp for latency tracking
    pub timestamp: Instant,
}

impl FrameBuffer {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("len", &self.data.len())
            .field("meta", &self.meta)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMetadata {
    pub sequence: u64,
    pub resolution: Resolution,
    pub format: PixelFormat,
}

/// Pixel formats a camera peripheral can hand out. Only `Jpeg` is decodable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Jpeg,
    Rgb565,
    Rgb888,
    Yuyv,
    Grayscale,
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::Jpeg => "JPEG",
            PixelFormat::Rgb565 => "RGB565",
            PixelFormat::Rgb888 => "RGB888",
            PixelFormat::Yuyv => "YUYV",
            PixelFormat::Grayscale => "GRAYSCALE",
        };
        f.write_str(name)
    }
}
