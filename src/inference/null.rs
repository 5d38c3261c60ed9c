use std::borrow::Cow;

use tracing::debug;

use super::{DetectionRegion, InferenceEngine, Signal};
use crate::capture::frame::Resolution;
use crate::error::EngineError;
use crate::ModelConfig;

/// Stand-in engine for builds without a compiled-in model.
///
/// It declares the configured input resolution, pulls the whole signal one
/// row at a time like a real runtime would, and reports every label as a
/// zero-confidence placeholder.
pub struct NullEngine {
    resolution: Resolution,
    labels: Vec<Cow<'static, str>>,
    row: Vec<f32>,
}

impl NullEngine {
    pub fn new(config: &ModelConfig) -> Self {
        let resolution = Resolution::new(config.width, config.height);
        Self {
            resolution,
            labels: config.labels.iter().cloned().map(Cow::Owned).collect(),
            row: vec![0.0; (resolution.width as usize).max(1)],
        }
    }
}

impl InferenceEngine for NullEngine {
    fn input_resolution(&self) -> Resolution {
        self.resolution
    }

    fn run(
        &mut self,
        signal: &Signal<'_>,
        results: &mut Vec<DetectionRegion>,
    ) -> Result<(), EngineError> {
        let total = signal.total_length();
        let mut offset = 0;
        let mut sum = 0.0f64;
        while offset < total {
            let count = self.row.len().min(total - offset);
            let window = &mut self.row[..count];
            signal.get_data(offset, window)?;
            sum += window.iter().map(|&v| v as f64).sum::<f64>();
            offset += count;
        }
        debug!(pixels = total, mean = sum / total.max(1) as f64, "null engine pass");

        results.clear();
        results.extend(self.labels.iter().map(|label| DetectionRegion {
            label: label.clone(),
            value: 0.0,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SampleError;
    use std::cell::RefCell;

    #[test]
    fn pulls_every_pixel_once_in_order() {
        let config = ModelConfig {
            width: 4,
            height: 3,
            labels: vec!["person".into()],
        };
        let mut engine = NullEngine::new(&config);
        let calls = RefCell::new(Vec::new());
        let get = |offset: usize, out: &mut [f32]| -> Result<(), SampleError> {
            calls.borrow_mut().push((offset, out.len()));
            out.fill(1.0);
            Ok(())
        };
        let signal = Signal::new(12, &get);
        let mut results = Vec::new();

        engine.run(&signal, &mut results).unwrap();

        assert_eq!(*calls.borrow(), vec![(0, 4), (4, 4), (8, 4)]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].value, 0.0);
    }

    #[test]
    fn propagates_sampling_failures() {
        let config = ModelConfig {
            width: 2,
            height: 2,
            labels: Vec::new(),
        };
        let mut engine = NullEngine::new(&config);
        let get = |_: usize, _: &mut [f32]| -> Result<(), SampleError> { Err(SampleError::Unallocated) };
        let signal = Signal::new(4, &get);
        let err = engine.run(&signal, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, EngineError::Sample(SampleError::Unallocated)));
    }
}
