//! Letterbox crop-and-resize from the decoded raster to the model input.
//!
//! The crop window is the largest centered rectangle of the source with the
//! target's aspect ratio. Sampling positions are precomputed once per
//! geometry, so each cycle is a pure gather with fixed-point bilinear blending.

use crate::capture::frame::{Resolution, RGB_BYTES_PER_PIXEL};
use crate::pipeline::buffers::RgbBuffer;

const FRAC_BITS: u32 = 14;
const FRAC_ONE: u64 = 1 << FRAC_BITS;
const FRAC_MASK: u64 = FRAC_ONE - 1;

/// Centered crop rectangle in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    /// Largest centered rectangle of `source` with the aspect ratio of `target`.
    pub fn letterbox(source: Resolution, target: Resolution) -> Self {
        let (sw, sh) = (source.width as u64, source.height as u64);
        let (tw, th) = (target.width.max(1) as u64, target.height.max(1) as u64);

        let (width, height) = if sw * th > sh * tw {
            // Source is wider: keep full height, trim the sides.
            ((sh * tw / th).max(1), sh)
        } else {
            (sw, (sw * th / tw).max(1))
        };

        Self {
            x: ((sw - width) / 2) as u32,
            y: ((sh - height) / 2) as u32,
            width: width as u32,
            height: height as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tap {
    lo: u32,
    hi: u32,
    frac: u64,
}

/// Source sample positions for every destination column and row.
fn taps(start: u32, span: u32, out: u32) -> Vec<Tap> {
    let last = span.saturating_sub(1) as u64;
    (0..out as u64)
        .map(|i| {
            // Pixel-center alignment: (i + 0.5) * span / out - 0.5
            let center = ((2 * i + 1) * span as u64 * FRAC_ONE) / (2 * out as u64);
            let pos = center.saturating_sub(FRAC_ONE / 2);
            let lo = (pos >> FRAC_BITS).min(last);
            let frac = if lo == last { 0 } else { pos & FRAC_MASK };
            let hi = (lo + 1).min(last);
            Tap {
                lo: start + lo as u32,
                hi: start + hi as u32,
                frac,
            }
        })
        .collect()
}

/// Precomputed crop geometry for one fixed source/target pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CropPlan {
    source: Resolution,
    target: Resolution,
    crop: CropRect,
    columns: Vec<Tap>,
    rows: Vec<Tap>,
}

impl CropPlan {
    pub fn new(source: Resolution, target: Resolution) -> Self {
        let crop = CropRect::letterbox(source, target);
        Self {
            source,
            target,
            crop,
            columns: taps(crop.x, crop.width, target.width),
            rows: taps(crop.y, crop.height, target.height),
        }
    }

    pub fn source(&self) -> Resolution {
        self.source
    }

    pub fn target(&self) -> Resolution {
        self.target
    }

    pub fn crop(&self) -> CropRect {
        self.crop
    }

    /// Resample the crop window of `src` into all of `dst`.
    ///
    /// Both buffers must have the resolutions the plan was built for; that is
    /// fixed at startup and checked in debug builds.
    pub fn resample(&self, src: &RgbBuffer, dst: &mut RgbBuffer) {
        debug_assert_eq!(src.resolution(), self.source);
        debug_assert_eq!(dst.resolution(), self.target);

        let stride = self.source.width as usize * RGB_BYTES_PER_PIXEL;
        let src = src.pixels();
        let row_len = self.target.width as usize * RGB_BYTES_PER_PIXEL;

        for (row, out_row) in self.rows.iter().zip(dst.pixels_mut().chunks_exact_mut(row_len)) {
            let top = &src[row.lo as usize * stride..][..stride];
            let bottom = &src[row.hi as usize * stride..][..stride];
            let fy = row.frac;

            for (col, out) in self
                .columns
                .iter()
                .zip(out_row.chunks_exact_mut(RGB_BYTES_PER_PIXEL))
            {
                let l = col.lo as usize * RGB_BYTES_PER_PIXEL;
                let r = col.hi as usize * RGB_BYTES_PER_PIXEL;
                let fx = col.frac;

                for c in 0..RGB_BYTES_PER_PIXEL {
                    let upper = top[l + c] as u64 * (FRAC_ONE - fx) + top[r + c] as u64 * fx;
                    let lower = bottom[l + c] as u64 * (FRAC_ONE - fx) + bottom[r + c] as u64 * fx;
                    let blended = upper * (FRAC_ONE - fy) + lower * fy;
                    out[c] = ((blended + (1 << (2 * FRAC_BITS - 1))) >> (2 * FRAC_BITS)) as u8;
                }
            }
        }
    }
}
