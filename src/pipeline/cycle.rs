//! The capture → convert → resample → infer → publish cycle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use bytes::Bytes;
use flume::{Receiver, RecvTimeoutError, TryRecvError};
use metrics::{counter, gauge, histogram};
use tracing::{info, trace, warn};

use crate::capture::{decoder, FrameSource};
use crate::error::PipelineError;
use crate::inference::{DetectionRegion, InferenceEngine, Signal};
use crate::pipeline::buffers::{MemoryBudget, MemoryRegion, RgbBuffer};
use crate::pipeline::publisher::{PublishOutcome, ResultPublisher};
use crate::pipeline::resample::CropPlan;
use crate::pipeline::sampler::SampleProvider;
use crate::Config;

/// Most recent compressed frame, shared with the HTTP side.
pub type LatestFrame = Arc<ArcSwapOption<Bytes>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Capturing,
    Converting,
    Resampling,
    Inferring,
    Publishing,
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Pause after a failed capture or conversion.
    pub retry_delay: Duration,
    /// Verify buffer guard bytes after each writing stage.
    pub integrity_checks: bool,
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry_delay: Duration::from_millis(config.pipeline.retry_delay_ms),
            integrity_checks: config.memory.integrity_checks,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(100),
            integrity_checks: false,
        }
    }
}

/// What one completed cycle did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    pub sequence: u64,
    /// Regions with non-zero confidence.
    pub detections: usize,
    pub published: PublishOutcome,
    pub elapsed: Duration,
}

/// Owns every stage and both long-lived rasters. Runs one cycle at a time.
pub struct Pipeline {
    source: FrameSource,
    engine: Box<dyn InferenceEngine>,
    publisher: ResultPublisher,
    latest: LatestFrame,
    raster: RgbBuffer,
    inference: RgbBuffer,
    plan: CropPlan,
    results: Vec<DetectionRegion>,
    state: CycleState,
    options: PipelineOptions,
}

fn enter(state: &mut CycleState, next: CycleState) {
    trace!(from = ?*state, to = ?next, "cycle state");
    *state = next;
}

impl Pipeline {
    /// Allocate both rasters and derive the crop geometry.
    ///
    /// The model input resolution comes from the engine. Any allocation
    /// failure is returned before a single frame is requested.
    pub fn new(
        source: FrameSource,
        engine: Box<dyn InferenceEngine>,
        publisher: ResultPublisher,
        latest: LatestFrame,
        budget: &mut MemoryBudget,
        options: PipelineOptions,
    ) -> Result<Self, PipelineError> {
        let source_res = source.resolution();
        let model_res = engine.input_resolution();

        let raster = RgbBuffer::allocate(budget, MemoryRegion::External, source_res)?;
        let inference = RgbBuffer::allocate(budget, MemoryRegion::Internal, model_res)?;

        let plan = CropPlan::new(source_res, model_res);
        let crop = plan.crop();
        info!(
            source = %source_res,
            model = %model_res,
            crop_x = crop.x,
            crop_y = crop.y,
            crop_width = crop.width,
            crop_height = crop.height,
            internal_free = budget.available(MemoryRegion::Internal),
            external_free = budget.available(MemoryRegion::External),
            "pipeline ready"
        );

        Ok(Self {
            source,
            engine,
            publisher,
            latest,
            raster,
            inference,
            plan,
            results: Vec::new(),
            state: CycleState::Idle,
            options,
        })
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn crop_plan(&self) -> &CropPlan {
        &self.plan
    }

    pub fn raster(&self) -> &RgbBuffer {
        &self.raster
    }

    pub fn inference_buffer(&self) -> &RgbBuffer {
        &self.inference
    }

    /// Run one full cycle. Whatever happens, the pipeline is `Idle` afterwards.
    pub fn run_cycle(&mut self) -> Result<CycleReport, PipelineError> {
        let result = self.cycle();
        enter(&mut self.state, CycleState::Idle);
        result
    }

    fn cycle(&mut self) -> Result<CycleReport, PipelineError> {
        let started = Instant::now();

        enter(&mut self.state, CycleState::Capturing);
        let frame = self.source.acquire()?;
        let sequence = frame.meta.sequence;
        let snapshot = frame.data.clone();

        enter(&mut self.state, CycleState::Converting);
        let converted = decoder::convert(&frame, &mut self.raster);
        // Hand the buffer back before doing anything else with the result.
        frame.release();
        converted?;
        // Only frames that decoded as JPEG are served as the raw shot.
        self.latest.store(Some(Arc::new(snapshot)));
        self.check_integrity("conversion");

        enter(&mut self.state, CycleState::Resampling);
        self.plan.resample(&self.raster, &mut self.inference);
        self.check_integrity("resample");

        enter(&mut self.state, CycleState::Inferring);
        let provider = SampleProvider::new(self.inference.pixels());
        let get_data = |offset: usize, out: &mut [f32]| provider.get_samples(offset, out);
        let signal = Signal::new(provider.total_length(), &get_data);
        self.engine.run(&signal, &mut self.results)?;

        enter(&mut self.state, CycleState::Publishing);
        let published = self.publisher.publish(&self.results);

        Ok(CycleReport {
            sequence,
            detections: self.results.iter().filter(|r| r.value != 0.0).count(),
            published,
            elapsed: started.elapsed(),
        })
    }

    fn check_integrity(&self, stage: &'static str) {
        if !self.options.integrity_checks {
            return;
        }
        for buffer in [&self.raster, &self.inference] {
            if !buffer.check_integrity() {
                warn!(stage, region = %buffer.region(), "buffer guard bytes overwritten");
            }
        }
    }

    /// Repeat cycles until `shutdown` fires or its sender is dropped.
    pub fn run(mut self, shutdown: Receiver<()>) {
        info!("pipeline running");
        loop {
            match shutdown.try_recv() {
                Err(TryRecvError::Empty) => {}
                _ => break,
            }

            match self.run_cycle() {
                Ok(report) => {
                    counter!("camdetect_cycles_total").increment(1);
                    histogram!("camdetect_cycle_seconds").record(report.elapsed.as_secs_f64());
                    gauge!("camdetect_subscribers").set(self.publisher.subscriber_count() as f64);
                    if let PublishOutcome::Sent { .. } = report.published {
                        counter!("camdetect_payloads_total").increment(1);
                    }
                    trace!(
                        sequence = report.sequence,
                        detections = report.detections,
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        "cycle complete"
                    );
                }
                Err(err) => {
                    counter!("camdetect_cycle_failures_total", "kind" => err.kind()).increment(1);
                    warn!(kind = err.kind(), error = %err, "cycle abandoned");
                    if matches!(err, PipelineError::EngineFailure(_)) {
                        continue;
                    }
                    match shutdown.recv_timeout(self.options.retry_delay) {
                        Err(RecvTimeoutError::Timeout) => {}
                        _ => break,
                    }
                }
            }
        }
        info!("pipeline stopped");
    }
}
