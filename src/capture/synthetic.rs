//! Test-pattern camera for running the pipeline without hardware.

use std::time::Instant;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use tracing::warn;

use crate::capture::frame::{FrameBuffer, FrameMetadata, PixelFormat, Resolution};
use crate::capture::source::CameraPeripheral;
use crate::CameraConfig;

/// Renders a drifting gradient with a bouncing square and JPEG-encodes it,
/// honouring the same buffer-count limit as a real sensor.
pub struct SyntheticCamera {
    resolution: Resolution,
    quality: u8,
    fb_count: u32,
    outstanding: u32,
    sequence: u64,
    raw: Vec<u8>,
    encoded: Vec<u8>,
}

impl SyntheticCamera {
    pub fn new(config: &CameraConfig) -> Self {
        let resolution = Resolution::new(config.width, config.height);
        Self {
            resolution,
            quality: config.jpeg_quality.clamp(1, 100),
            fb_count: config.fb_count.max(1),
            outstanding: 0,
            sequence: 0,
            raw: vec![0; resolution.rgb_len()],
            encoded: Vec::new(),
        }
    }

    fn render(&mut self) {
        let (w, h) = (self.resolution.width as u64, self.resolution.height as u64);
        let t = self.sequence;
        let side = (w.min(h) / 4).max(1);
        let sx = (t * 3) % w.saturating_sub(side).max(1);
        let sy = (t * 2) % h.saturating_sub(side).max(1);

        for (i, px) in self.raw.chunks_exact_mut(3).enumerate() {
            let x = i as u64 % w;
            let y = i as u64 / w;
            let inside = (sx..sx + side).contains(&x) && (sy..sy + side).contains(&y);
            let color = if inside {
                [240, 240, 32]
            } else {
                [
                    ((x * 255 / w.max(1) + t) % 256) as u8,
                    (y * 255 / h.max(1)) as u8,
                    96,
                ]
            };
            px.copy_from_slice(&color);
        }
    }
}

impl CameraPeripheral for SyntheticCamera {
    fn fb_get(&mut self) -> Option<FrameBuffer> {
        if self.outstanding >= self.fb_count {
            return None;
        }
        let timestamp = Instant::now();
        self.render();

        self.encoded.clear();
        let mut encoder = JpegEncoder::new_with_quality(&mut self.encoded, self.quality);
        if let Err(e) = encoder.encode(
            &self.raw,
            self.resolution.width,
            self.resolution.height,
            ExtendedColorType::Rgb8,
        ) {
            warn!("Synthetic frame encode failed: {}", e);
            return None;
        }

        self.sequence += 1;
        self.outstanding += 1;
        Some(FrameBuffer {
            data: Bytes::copy_from_slice(&self.encoded),
            meta: FrameMetadata {
                sequence: self.sequence,
                resolution: self.resolution,
                format: PixelFormat::Jpeg,
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
