//! Multi-target tracking of 3D point detections.
//!
//! Detections arrive once per frame. New candidates are held as tentative
//! tracks until they are associated often enough, then promoted to confirmed
//! tracks smoothed by an unscented Kalman filter. Association uses gated,
//! optimal Kuhn-Munkres assignment.
//!
//! ```ignore
//! use target_track::{Detection, FrameTracker, TrackerConfig};
//!
//! let mut tracker = FrameTracker::new(TrackerConfig::default())?;
//! let report = tracker.update(&[Detection::new(0.0, 0.0, 1.5)], 1.0 / 30.0)?;
//! for track in tracker.confirmed_tracks() {
//!     println!("{} at {:?}", track.id(), track.position());
//! }
//! ```

pub mod error;
pub mod extrapolation;
pub mod integration;
pub mod tracker;

pub use error::{Result, TrackError};
pub use extrapolation::{ExtrapolationModel, TimedPoint, TrajectoryHistory, extrapolate, regress};
pub use integration::{DetectionSource, Frame, FrameBuilder, IntoDetections, PipelineError, TrackerPipeline};
pub use tracker::{
    ConfirmedTrack, Detection, FrameReport, FrameTracker, TentativeTrack, TrackId, TrackState,
    TrackerConfig,
};
