//! V4L2 camera peripheral with memory-mapped driver buffers

use std::time::Instant;

use bytes::Bytes;
use color_eyre::{eyre::eyre, Result};
use tracing::{debug, info, instrument, warn};
use v4l::buffer::Type;
use v4l::capability::Flags as CapFlags;
use v4l::io::traits::CaptureStream;
use v4l::prelude::MmapStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

use crate::capture::frame::{FrameBuffer, FrameMetadata, PixelFormat, Resolution};
use crate::capture::source::CameraPeripheral;
use crate::CameraConfig;

/// Map a V4L2 fourcc onto the formats the pipeline knows about.
pub fn pixel_format(fourcc: FourCC) -> Option<PixelFormat> {
    match &fourcc.repr {
        b"MJPG" | b"JPEG" => Some(PixelFormat::Jpeg),
        b"YUYV" => Some(PixelFormat::Yuyv),
        b"RGB3" => Some(PixelFormat::Rgb888),
        b"RGBP" => Some(PixelFormat::Rgb565),
        b"GREY" => Some(PixelFormat::Grayscale),
        _ => None,
    }
}

/// Camera peripheral backed by a V4L2 capture device.
///
/// Frames are copied out of the mmap'd driver buffer, so the driver can
/// requeue immediately; the checkout count still enforces `fb_count`.
pub struct V4l2Camera {
    _device: Device,
    stream: MmapStream<'static>,
    resolution: Resolution,
    format: PixelFormat,
    fb_count: u32,
    outstanding: u32,
    sequence: u64,
}

impl V4l2Camera {
    pub fn open(path: &str, config: &CameraConfig) -> Result<Self> {
        info!("Initializing V4L2 camera: {}", path);

        let device = Device::with_path(path)?;

        let caps = device.query_caps()?;
        info!("Device: {} ({})", caps.card, caps.driver);

        if !caps.capabilities.contains(CapFlags::VIDEO_CAPTURE) {
            return Err(eyre!("Device doesn't support video capture"));
        }

        let mut fmt = device.format()?;
        fmt.width = config.width;
        fmt.height = config.height;
        fmt.fourcc = FourCC::new(b"MJPG");
        let actual = device.set_format(&fmt)?;

        let resolution = Resolution::new(actual.width, actual.height);
        if resolution != Resolution::new(config.width, config.height) {
            return Err(eyre!(
                "Device delivers {} instead of {}x{}",
                resolution,
                config.width,
                config.height
            ));
        }
        let format = pixel_format(actual.fourcc)
            .ok_or_else(|| eyre!("Unsupported device format {}", actual.fourcc))?;
        if format != PixelFormat::Jpeg {
            warn!("Device negotiated {}, frames will be rejected", format);
        }

        // The driver wants at least two buffers to keep streaming.
        let driver_buffers = config.fb_count.max(2);
        let stream = MmapStream::with_buffers(&device, Type::VideoCapture, driver_buffers)?;
        info!(
            "Capture stream started: {} {} with {} driver buffers",
            resolution, format, driver_buffers
        );

        Ok(Self {
            _device: device,
            stream,
            resolution,
            format,
            fb_count: config.fb_count.max(1),
            outstanding: 0,
            sequence: 0,
        })
    }
}

impl CameraPeripheral for V4l2Camera {
    #[instrument(skip(self), level = "trace")]
    fn fb_get(&mut self) -> Option<FrameBuffer> {
        if self.outstanding >= self.fb_count {
            return None;
        }

        let timestamp = Instant::now();
        let (buf, meta) = match self.stream.next() {
            Ok(next) => next,
            Err(e) => {
                debug!("Dequeue failed: {}", e);
                return None;
            }
        };
        let used = match meta.bytesused as usize {
            0 => buf.len(),
            n => n.min(buf.len()),
        };
        let data = Bytes::copy_from_slice(&buf[..used]);

        self.sequence += 1;
        self.outstanding += 1;

        Some(FrameBuffer {
            data,
            meta: FrameMetadata {
                sequence: self.sequence,
                resolution: self.resolution,
                format: self.format,
            },
            timestamp,
        })
    }

    fn fb_return(&mut self, _frame: FrameBuffer) {
        self.outstanding = self.outstanding.saturating_sub(1);
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }
}
