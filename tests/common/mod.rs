//! Scripted doubles for the camera, the engine and the broadcast hub.

#![allow(dead_code)]

use std::borrow::Cow;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use camdetect::capture::{CameraPeripheral, FrameBuffer, FrameMetadata, PixelFormat, Resolution};
use camdetect::inference::{DetectionRegion, InferenceEngine, Signal};
use camdetect::pipeline::Broadcaster;
use camdetect::EngineError;

pub const QVGA: Resolution = Resolution::new(320, 240);

/// Solid-color JPEG at `res`.
pub fn solid_jpeg(res: Resolution, rgb: [u8; 3]) -> Bytes {
    let raw: Vec<u8> = rgb.iter().copied().cycle().take(res.rgb_len()).collect();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, 95)
        .encode(&raw, res.width, res.height, ExtendedColorType::Rgb8)
        .unwrap();
    Bytes::from(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraEvent {
    Acquired(u64),
    Released(u64),
}

/// Camera that hands out a fixed script of frames, then reports no buffer.
pub struct ScriptedCamera {
    resolution: Resolution,
    script: VecDeque<(Bytes, PixelFormat)>,
    sequence: u64,
    pub events: Arc<Mutex<Vec<CameraEvent>>>,
}

impl ScriptedCamera {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            script: VecDeque::new(),
            sequence: 0,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push(mut self, data: Bytes, format: PixelFormat) -> Self {
        self.script.push_back((data, format));
        self
    }
}

impl CameraPeripheral for ScriptedCamera {
    fn fb_get(&mut self) -> Option<FrameBuffer> {
        let (data, format) = self.script.pop_front()?;
        self.sequence += 1;
        self.events
            .lock()
            .unwrap()
            .push(CameraEvent::Acquired(self.sequence));
        Some(FrameBuffer {
            data,
            meta: FrameMetadata {
                sequence: self.sequence,
                resolution: self.resolution,
                format,
            },
            timestamp: Instant::now(),
        })
    }

    fn fb_return(&mut self, frame: FrameBuffer) {
        self.events
            .lock()
            .unwrap()
            .push(CameraEvent::Released(frame.meta.sequence));
    }

    fn resolution(&self) -> Resolution {
        self.resolution
    }
}

/// Engine returning canned regions and keeping every sample it pulled.
pub struct ScriptedEngine {
    resolution: Resolution,
    regions: Vec<DetectionRegion>,
    fail_with: Option<i32>,
    chunk: usize,
    pub samples: Arc<Mutex<Vec<f32>>>,
    pub windows: Arc<Mutex<Vec<(usize, usize)>>>,
}

impl ScriptedEngine {
    pub fn new(resolution: Resolution) -> Self {
        Self {
            resolution,
            regions: Vec::new(),
            fail_with: None,
            chunk: 1000,
            samples: Arc::new(Mutex::new(Vec::new())),
            windows: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_region(mut self, label: &'static str, value: f32, rect: [u32; 4]) -> Self {
        self.regions.push(DetectionRegion {
            label: Cow::Borrowed(label),
            value,
            x: rect[0],
            y: rect[1],
            width: rect[2],
            height: rect[3],
        });
        self
    }

    pub fn failing(mut self, status: i32) -> Self {
        self.fail_with = Some(status);
        self
    }
}

impl InferenceEngine for ScriptedEngine {
    fn input_resolution(&self) -> Resolution {
        self.resolution
    }

    fn run(
        &mut self,
        signal: &Signal<'_>,
        results: &mut Vec<DetectionRegion>,
    ) -> Result<(), EngineError> {
        if let Some(status) = self.fail_with {
            return Err(EngineError::Status(status));
        }
        let mut samples = self.samples.lock().unwrap();
        samples.clear();
        self.windows.lock().unwrap().clear();
        let mut buf = vec![0.0f32; self.chunk];
        let mut offset = 0;
        while offset < signal.total_length() {
            let count = self.chunk.min(signal.total_length() - offset);
            signal.get_data(offset, &mut buf[..count])?;
            self.windows.lock().unwrap().push((offset, count));
            samples.extend_from_slice(&buf[..count]);
            offset += count;
        }
        results.clear();
        results.extend(self.regions.iter().cloned());
        Ok(())
    }
}

/// Broadcaster with a settable subscriber count that records payloads.
#[derive(Default)]
pub struct RecordingHub {
    pub subscribers: AtomicUsize,
    pub sent: Mutex<Vec<String>>,
}

impl RecordingHub {
    pub fn with_subscribers(count: usize) -> Arc<Self> {
        let hub = Arc::new(Self::default());
        hub.subscribers.store(count, Ordering::SeqCst);
        hub
    }

    pub fn payloads(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl Broadcaster for RecordingHub {
    fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }

    fn broadcast(&self, payload: String) {
        self.sent.lock().unwrap().push(payload);
    }
}
