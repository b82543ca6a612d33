//! Builder for assembling a `Frame` from raw coordinates.

use crate::error::{self, Result, TrackError};
use crate::tracker::{Detection, is_finite, point_from_slice};

use super::Frame;

/// Builder for creating a `Frame` from coordinate triples or slices.
///
/// The first malformed input is remembered and reported by `build`.
#[derive(Debug, Clone, Default)]
pub struct FrameBuilder {
    detections: Vec<Detection>,
    dt: f64,
    error: Option<TrackError>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the time elapsed since the previous frame.
    pub fn dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    /// Add a detection at (x, y, z).
    pub fn point(mut self, x: f64, y: f64, z: f64) -> Self {
        self.detections.push(Detection::new(x, y, z));
        self
    }

    /// Add a detection from a 3-element slice.
    pub fn slice(mut self, values: &[f64]) -> Self {
        match point_from_slice(values) {
            Ok(p) => self.detections.push(Detection::from_point(p)),
            Err(err) => {
                self.error.get_or_insert(err);
            }
        }
        self
    }

    /// Add every triple of a flat `[x0, y0, z0, x1, ...]` buffer.
    pub fn flat(mut self, values: &[f64]) -> Self {
        if values.len() % 3 != 0 {
            self.error.get_or_insert(TrackError::InvalidDimension {
                expected: 3,
                got: values.len(),
            });
            return self;
        }
        for chunk in values.chunks_exact(3) {
            self = self.point(chunk[0], chunk[1], chunk[2]);
        }
        self
    }

    /// Build the final `Frame`.
    pub fn build(self) -> Result<Frame> {
        if let Some(err) = self.error {
            return Err(err);
        }
        error::validate_dt(self.dt)?;
        if let Some(det) = self.detections.iter().find(|d| !is_finite(&d.position)) {
            return Err(TrackError::InvalidInput(format!(
                "non-finite detection {:?}",
                det.position
            )));
        }
        Ok(Frame {
            detections: self.detections,
            dt: self.dt,
        })
    }
}
