//! Checkout/return discipline around the camera peripheral's buffer pool

use std::ops::Deref;

use tracing::{instrument, trace};

use crate::capture::frame::{FrameBuffer, Resolution};
use crate::error::PipelineError;

/// Camera driver seen from the pipeline: hands out filled buffers and takes
/// them back for reuse.
pub trait CameraPeripheral: Send {
    /// Next filled buffer, or `None` when the pool is empty or the sensor
    /// failed. Must not block waiting for a free slot.
    fn fb_get(&mut self) -> Option<FrameBuffer>;

    /// Return a buffer obtained from [`fb_get`](Self::fb_get) to the pool.
    fn fb_return(&mut self, frame: FrameBuffer);

    /// Resolution the sensor is configured to deliver.
    fn resolution(&self) -> Resolution;
}

/// Frame Source: owns the peripheral and lends out one frame at a time.
pub struct FrameSource {
    camera: Box<dyn CameraPeripheral>,
}

impl FrameSource {
    pub fn new(camera: Box<dyn CameraPeripheral>) -> Self {
        Self { camera }
    }

    pub fn resolution(&self) -> Resolution {
        self.camera.resolution()
    }

    /// Check out one frame. The returned guard gives the buffer back to the
    /// peripheral when released or dropped, so every exit path returns it.
    /// The guard borrows the source mutably: a second checkout cannot start
    /// while one is outstanding.
    #[instrument(skip(self), level = "trace")]
    pub fn acquire(&mut self) -> Result<FrameGuard<'_>, PipelineError> {
        let frame = self
            .camera
            .fb_get()
            .ok_or(PipelineError::PeripheralUnavailable)?;
        trace!(sequence = frame.meta.sequence, len = frame.len(), "frame checked out");
        Ok(FrameGuard {
            camera: self.camera.as_mut(),
            frame: Some(frame),
        })
    }
}

/// Scoped checkout of a peripheral frame buffer.
pub struct FrameGuard<'a> {
    camera: &'a mut dyn CameraPeripheral,
    frame: Option<FrameBuffer>,
}

impl FrameGuard<'_> {
    /// Give the buffer back now instead of at end of scope.
    pub fn release(self) {}
}

impl Deref for FrameGuard<'_> {
    type Target = FrameBuffer;

    fn deref(&self) -> &FrameBuffer {
        // Only `Drop` takes the frame out.
        self.frame.as_ref().unwrap_or_else(|| unreachable!())
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame.take() {
            trace!(sequence = frame.meta.sequence, "frame returned");
            self.camera.fb_return(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::frame::{FrameMetadata, PixelFormat};
    use bytes::Bytes;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    #[derive(Default)]
    struct Ledger {
        out: usize,
        returned: usize,
    }

    struct OneSlot {
        ledger: Arc<Mutex<Ledger>>,
    }

    impl CameraPeripheral for OneSlot {
        fn fb_get(&mut self) -> Option<FrameBuffer> {
            let mut ledger = self.ledger.lock().unwrap();
            if ledger.out > ledger.returned {
                return None;
            }
            ledger.out += 1;
            Some(FrameBuffer {
                data: Bytes::from_static(b"\xff\xd8"),
                meta: FrameMetadata {
                    sequence: ledger.out as u64,
                    resolution: Resolution::new(4, 3),
                    format: PixelFormat::Jpeg,
                },
                timestamp: Instant::now(),
            })
        }

        fn fb_return(&mut self, _frame: FrameBuffer) {
            self.ledger.lock().unwrap().returned += 1;
        }

        fn resolution(&self) -> Resolution {
            Resolution::new(4, 3)
        }
    }

    fn source() -> (FrameSource, Arc<Mutex<Ledger>>) {
        let ledger = Arc::new(Mutex::new(Ledger::default()));
        let camera = OneSlot {
            ledger: ledger.clone(),
        };
        (FrameSource::new(Box::new(camera)), ledger)
    }

    #[test]
    fn explicit_release_returns_the_slot() {
        let (mut source, ledger) = source();
        let frame = source.acquire().unwrap();
        assert_eq!(frame.meta.sequence, 1);
        frame.release();
        assert_eq!(ledger.lock().unwrap().returned, 1);
        assert!(source.acquire().is_ok());
    }

    #[test]
    fn early_return_still_releases() {
        fn failing_step(source: &mut FrameSource) -> Result<(), PipelineError> {
            let _frame = source.acquire()?;
            Err(PipelineError::DecodeFailed("truncated".into()))
        }

        let (mut source, ledger) = source();
        assert!(failing_step(&mut source).is_err());
        let ledger = ledger.lock().unwrap();
        assert_eq!((ledger.out, ledger.returned), (1, 1));
    }

    #[test]
    fn empty_pool_fails_fast() {
        struct Dry;
        impl CameraPeripheral for Dry {
            fn fb_get(&mut self) -> Option<FrameBuffer> {
                None
            }
            fn fb_return(&mut self, _frame: FrameBuffer) {
                panic!("nothing was checked out");
            }
            fn resolution(&self) -> Resolution {
                Resolution::new(320, 240)
            }
        }

        let mut source = FrameSource::new(Box::new(Dry));
        assert!(matches!(
            source.acquire(),
            Err(PipelineError::PeripheralUnavailable)
        ));
    }
}
