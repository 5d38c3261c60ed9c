pub mod buffers;
pub mod cycle;
pub mod publisher;
pub mod resample;
pub mod sampler;

pub use cycle::{CycleReport, CycleState, LatestFrame, Pipeline, PipelineOptions};
pub use publisher::{Broadcaster, PublishOutcome, ResultPublisher};
