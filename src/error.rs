//! Failure taxonomy of the capture-to-inference cycle.

use thiserror::Error;

use crate::capture::PixelFormat;
use crate::pipeline::buffers::MemoryRegion;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("camera peripheral has no frame buffer available")]
    PeripheralUnavailable,

    #[error("unsupported pixel format {0}, only JPEG frames can be converted")]
    UnsupportedFormat(PixelFormat),

    #[error("JPEG decode failed: {0}")]
    DecodeFailed(String),

    #[error("failed to allocate {requested} bytes in {region} memory ({available} bytes available)")]
    AllocationFailed {
        region: MemoryRegion,
        requested: usize,
        available: usize,
    },

    #[error("inference failed: {0}")]
    EngineFailure(#[from] EngineError),
}

impl PipelineError {
    /// Fatal errors take the restart path; everything else only abandons the cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::AllocationFailed { .. })
    }

    /// Short label for log fields and metric tags.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::PeripheralUnavailable => "peripheral_unavailable",
            PipelineError::UnsupportedFormat(_) => "unsupported_format",
            PipelineError::DecodeFailed(_) => "decode_failed",
            PipelineError::AllocationFailed { .. } => "allocation_failed",
            PipelineError::EngineFailure(_) => "engine_failure",
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine returned status {0}")]
    Status(i32),

    #[error("sample provider failed: {0}")]
    Sample(#[from] SampleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SampleError {
    #[error("inference buffer is not allocated")]
    Unallocated,

    #[error("sample window {offset}+{count} exceeds {total} pixels")]
    OutOfRange {
        offset: usize,
        count: usize,
        total: usize,
    },
}
