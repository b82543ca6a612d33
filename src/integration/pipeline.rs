//! TrackerPipeline for feeding a detection source into the tracker.

use thiserror::Error;
use tracing::debug;

use crate::error::TrackError;
use crate::tracker::{FrameReport, FrameTracker, TrackerConfig};

use super::DetectionSource;

/// Failure of either half of the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError<E>
where
    E: std::error::Error + 'static,
{
    #[error("detection source failed: {0}")]
    Source(#[source] E),
    #[error(transparent)]
    Tracking(#[from] TrackError),
}

/// A detection source bundled with a `FrameTracker`.
pub struct TrackerPipeline<S: DetectionSource> {
    source: S,
    tracker: FrameTracker,
}

impl<S: DetectionSource> TrackerPipeline<S> {
    /// Create a pipeline; fails if the tracker config is invalid.
    pub fn new(source: S, config: TrackerConfig) -> Result<Self, TrackError> {
        Ok(Self {
            source,
            tracker: FrameTracker::new(config)?,
        })
    }

    pub fn with_default_config(source: S) -> Result<Self, TrackError> {
        Self::new(source, TrackerConfig::default())
    }

    /// Pull one frame and run it through the tracker.
    ///
    /// Returns `Ok(None)` once the source is exhausted.
    pub fn process_next(&mut self) -> Result<Option<FrameReport>, PipelineError<S::Error>> {
        let Some(frame) = self.source.next_frame().map_err(PipelineError::Source)? else {
            return Ok(None);
        };
        let report = self.tracker.update(&frame.detections, frame.dt)?;
        Ok(Some(report))
    }

    /// Drain the source, returning one report per frame.
    pub fn run(&mut self) -> Result<Vec<FrameReport>, PipelineError<S::Error>> {
        let mut reports = Vec::new();
        while let Some(report) = self.process_next()? {
            reports.push(report);
        }
        debug!(frames = reports.len(), "detection source exhausted");
        Ok(reports)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn tracker(&self) -> &FrameTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut FrameTracker {
        &mut self.tracker
    }

    pub fn into_parts(self) -> (S, FrameTracker) {
        (self.source, self.tracker)
    }
}
