pub mod decoder;
pub mod frame;
pub mod source;
pub mod synthetic;
#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use frame::{FrameBuffer, FrameMetadata, PixelFormat, Resolution};
pub use source::{CameraPeripheral, FrameGuard, FrameSource};
pub use synthetic::SyntheticCamera;
#[cfg(feature = "v4l2")]
pub use v4l2::V4l2Camera;
