//! Seam to the object-detection runtime.
//!
//! The engine is an external collaborator: it declares its input resolution
//! and, given a [`Signal`], pulls pixel samples and reports scored regions.

pub mod null;

use std::borrow::Cow;

use crate::capture::frame::Resolution;
use crate::error::{EngineError, SampleError};

pub use null::NullEngine;

/// One scored, labeled rectangle in inference-input pixel coordinates.
///
/// A `value` of exactly `0.0` is a "no detection" placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRegion {
    pub label: Cow<'static, str>,
    pub value: f32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Sampling callback plus the number of pixels it covers.
///
/// Engines are expected to call [`get_data`](Self::get_data) with
/// non-overlapping windows in increasing offset order that together cover
/// `total_length` pixels exactly once. The pipeline cannot verify this.
pub struct Signal<'a> {
    total_length: usize,
    get_data: &'a dyn Fn(usize, &mut [f32]) -> Result<(), SampleError>,
}

impl<'a> Signal<'a> {
    pub fn new(
        total_length: usize,
        get_data: &'a dyn Fn(usize, &mut [f32]) -> Result<(), SampleError>,
    ) -> Self {
        Self {
            total_length,
            get_data,
        }
    }

    pub fn total_length(&self) -> usize {
        self.total_length
    }

    /// Fill `out` with `out.len()` samples starting at pixel `offset`.
    pub fn get_data(&self, offset: usize, out: &mut [f32]) -> Result<(), SampleError> {
        (self.get_data)(offset, out)
    }
}

pub trait InferenceEngine: Send {
    /// Input resolution the model was trained for.
    fn input_resolution(&self) -> Resolution;

    /// Run the model over `signal`, replacing the contents of `results`.
    fn run(
        &mut self,
        signal: &Signal<'_>,
        results: &mut Vec<DetectionRegion>,
    ) -> Result<(), EngineError>;
}
