//! Trait for upstream detection producers.

use crate::tracker::{Detection, Point3};

/// One frame of detections and the time elapsed since the previous frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub detections: Vec<Detection>,
    pub dt: f64,
}

impl Frame {
    pub fn new(detections: impl IntoDetections, dt: f64) -> Self {
        Self {
            detections: detections.into_detections(),
            dt,
        }
    }
}

/// Source of detection frames, e.g. a depth camera plus object detector.
///
/// # Example
///
/// ```ignore
/// use target_track::{DetectionSource, Frame};
///
/// struct Replay {
///     frames: std::vec::IntoIter<Frame>,
/// }
///
/// impl DetectionSource for Replay {
///     type Error = std::io::Error;
///
///     fn next_frame(&mut self) -> Result<Option<Frame>, Self::Error> {
///         Ok(self.frames.next())
///     }
/// }
/// ```
pub trait DetectionSource {
    /// Error type for acquisition failures.
    type Error: std::error::Error + 'static;

    /// Produce the next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>, Self::Error>;
}

/// Helper trait for converting producer-specific outputs to `Detection`s.
pub trait IntoDetections {
    fn into_detections(self) -> Vec<Detection>;
}

impl IntoDetections for Vec<Detection> {
    fn into_detections(self) -> Vec<Detection> {
        self
    }
}

impl IntoDetections for Vec<Point3> {
    fn into_detections(self) -> Vec<Detection> {
        self.into_iter().map(Detection::from_point).collect()
    }
}

impl IntoDetections for Vec<[f64; 3]> {
    fn into_detections(self) -> Vec<Detection> {
        self.into_iter()
            .map(|[x, y, z]| Detection::new(x, y, z))
            .collect()
    }
}
