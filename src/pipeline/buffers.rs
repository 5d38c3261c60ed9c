//! Long-lived pixel buffers and the startup memory budget they are carved from.
//!
//! Both rasters are allocated exactly once, before the first cycle, and are
//! mutated in place afterwards. Nothing on the per-cycle path allocates here.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::capture::frame::Resolution;
use crate::error::PipelineError;

const GUARD: [u8; 8] = [0xde, 0xad, 0xbe, 0xef, 0xfe, 0xed, 0xfa, 0xce];

/// Where a buffer lives: the small, fast internal heap or the large external pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryRegion {
    Internal,
    External,
}

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryRegion::Internal => f.write_str("internal"),
            MemoryRegion::External => f.write_str("external"),
        }
    }
}

/// Byte budget per memory region, debited as startup buffers are allocated.
#[derive(Debug, Clone)]
pub struct MemoryBudget {
    internal: usize,
    external: usize,
}

impl MemoryBudget {
    pub fn new(internal: usize, external: usize) -> Self {
        Self { internal, external }
    }

    pub fn available(&self, region: MemoryRegion) -> usize {
        match region {
            MemoryRegion::Internal => self.internal,
            MemoryRegion::External => self.external,
        }
    }

    fn reserve(&mut self, region: MemoryRegion, bytes: usize) -> Result<(), PipelineError> {
        let slot = match region {
            MemoryRegion::Internal => &mut self.internal,
            MemoryRegion::External => &mut self.external,
        };
        if bytes > *slot {
            return Err(PipelineError::AllocationFailed {
                region,
                requested: bytes,
                available: *slot,
            });
        }
        *slot -= bytes;
        Ok(())
    }

    fn refund(&mut self, region: MemoryRegion, bytes: usize) {
        match region {
            MemoryRegion::Internal => self.internal += bytes,
            MemoryRegion::External => self.external += bytes,
        }
    }
}

/// Fixed-size interleaved RGB888 raster followed by guard bytes.
pub struct RgbBuffer {
    resolution: Resolution,
    region: MemoryRegion,
    data: Box<[u8]>,
}

impl RgbBuffer {
    /// Allocate a zeroed raster for `resolution` in `region`.
    ///
    /// Fails with `AllocationFailed` when the region's budget is exhausted or
    /// the allocator refuses the reservation.
    pub fn allocate(
        budget: &mut MemoryBudget,
        region: MemoryRegion,
        resolution: Resolution,
    ) -> Result<Self, PipelineError> {
        let len = resolution.rgb_len();
        let total = len + GUARD.len();
        budget.reserve(region, total)?;

        let mut data = Vec::new();
        if data.try_reserve_exact(total).is_err() {
            budget.refund(region, total);
            return Err(PipelineError::AllocationFailed {
                region,
                requested: total,
                available: budget.available(region),
            });
        }
        data.resize(len, 0);
        data.extend_from_slice(&GUARD);

        info!(
            %resolution,
            %region,
            bytes = total,
            remaining = budget.available(region),
            "raster allocated"
        );

        Ok(Self {
            resolution,
            region,
            data: data.into_boxed_slice(),
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn region(&self) -> MemoryRegion {
        self.region
    }

    pub fn len(&self) -> usize {
        self.resolution.rgb_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data[..self.len()]
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        let len = self.len();
        &mut self.data[..len]
    }

    /// Whether the guard bytes behind the pixel data are still intact.
    pub fn check_integrity(&self) -> bool {
        self.data[self.len()..] == GUARD
    }

    #[cfg(test)]
    pub(crate) fn guard_mut(&mut self) -> &mut [u8] {
        let len = self.len();
        &mut self.data[len..]
    }
}

impl fmt::Debug for RgbBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RgbBuffer")
            .field("resolution", &self.resolution)
            .field("region", &self.region)
            .finish()
    }
}
