//! Glue between upstream detection producers and the `FrameTracker`.
//!
//! A producer implements `DetectionSource`, handing out one `Frame` of 3D
//! points per call; `TrackerPipeline` drains it into the tracker.

mod builder;
mod detector;
mod pipeline;

pub use builder::FrameBuilder;
pub use detector::{DetectionSource, Frame, IntoDetections};
pub use pipeline::{PipelineError, TrackerPipeline};
