//! Frame orchestrator: owns the tentative and confirmed pools and runs the
//! association passes for each incoming frame.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::error::{self, Result, TrackError};
use crate::tracker::assignment::{self, Detection, Gates};
use crate::tracker::confirmed::ConfirmedTrack;
use crate::tracker::point::{self, Point3};
use crate::tracker::tentative::TentativeTrack;
use crate::tracker::track_state::TrackId;
use crate::tracker::ukf::{FilterConfig, UnscentedKalmanFilter};

/// Configuration for the FrameTracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Reject pairs at or beyond this distance; `None` disables the gate
    pub max_dist: Option<f64>,
    /// Reject pairs whose implied speed reaches this value; `None` disables the gate
    pub max_vel: Option<f64>,
    /// Consecutive associations before a tentative track is promoted
    pub min_frames: u32,
    /// Consecutive misses before a tentative track is dropped
    pub tentative_max_missed: u32,
    /// Consecutive misses before a confirmed track is dropped
    pub confirmed_max_missed: u32,
    pub filter: FilterConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_dist: None,
            max_vel: None,
            min_frames: 3,
            tentative_max_missed: 3,
            confirmed_max_missed: 3,
            filter: FilterConfig::default(),
        }
    }
}

impl TrackerConfig {
    pub fn gates(&self) -> Gates {
        Gates::new(self.max_dist, self.max_vel)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, gate) in [("max_dist", self.max_dist), ("max_vel", self.max_vel)] {
            if let Some(value) = gate {
                if value.is_nan() || value <= 0.0 {
                    return Err(TrackError::InvalidConfig(format!(
                        "{name} must be positive, got {value}"
                    )));
                }
            }
        }
        for (name, count) in [
            ("min_frames", self.min_frames),
            ("tentative_max_missed", self.tentative_max_missed),
            ("confirmed_max_missed", self.confirmed_max_missed),
        ] {
            if count == 0 {
                return Err(TrackError::InvalidConfig(format!("{name} must be at least 1")));
            }
        }
        self.filter.validate()
    }
}

/// Lifecycle events produced while processing one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub frame_id: u64,
    /// New tentative tracks
    pub spawned: Vec<TrackId>,
    /// Tentative tracks promoted this frame
    pub newly_confirmed: Vec<TrackId>,
    /// Confirmed tracks that absorbed a detection
    pub updated: Vec<TrackId>,
    pub dropped_tentative: Vec<TrackId>,
    pub dropped_confirmed: Vec<TrackId>,
}

/// Multi-target tracker over 3D point detections.
///
/// Each frame's detections are partitioned once: the confirmed pass claims
/// detections first, the tentative pass only sees the remainder, and new
/// tentative tracks spawn only from detections claimed by neither.
pub struct FrameTracker {
    tentative: Vec<TentativeTrack>,
    confirmed: Vec<ConfirmedTrack>,
    detections: Vec<Point3>,
    claimed: Vec<bool>,
    dt: f64,
    has_frame: bool,
    frame_id: u64,
    next_id: u64,
    report: FrameReport,
    config: TrackerConfig,
    filter: UnscentedKalmanFilter,
}

impl FrameTracker {
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;
        let filter = UnscentedKalmanFilter::new(config.filter.clone());
        Ok(Self {
            tentative: Vec::new(),
            confirmed: Vec::new(),
            detections: Vec::new(),
            claimed: Vec::new(),
            dt: 0.0,
            has_frame: false,
            frame_id: 0,
            next_id: 0,
            report: FrameReport::default(),
            config,
            filter,
        })
    }

    /// Ingest a frame and run both association passes.
    pub fn update(&mut self, detections: &[Detection], dt: f64) -> Result<FrameReport> {
        self.ingest_frame(detections, dt)?;
        self.associate_confirmed();
        self.associate_tentative();
        Ok(self.report.clone())
    }

    /// Store a frame for association.
    ///
    /// The first frame seen by an empty tracker bootstraps it: every detection
    /// becomes a tentative track and nothing is stored for association. The
    /// ids spawned that way are returned. Later frames need a finite, positive
    /// `dt`.
    pub fn ingest_frame(&mut self, detections: &[Detection], dt: f64) -> Result<Vec<TrackId>> {
        for (i, det) in detections.iter().enumerate() {
            if !point::is_finite(&det.position) {
                return Err(TrackError::InvalidInput(format!(
                    "detection {i} has a non-finite coordinate: {:?}",
                    det.position
                )));
            }
        }

        let bootstrap = self.tentative.is_empty() && self.confirmed.is_empty() && !self.has_frame;
        if !bootstrap {
            error::validate_dt(dt)?;
            if dt == 0.0 {
                return Err(TrackError::InvalidInput(
                    "dt must be positive between frames".to_string(),
                ));
            }
        }

        self.frame_id += 1;
        self.report = FrameReport {
            frame_id: self.frame_id,
            ..Default::default()
        };
        trace!(
            frame = self.frame_id,
            detections = detections.len(),
            bootstrap,
            "ingest frame"
        );

        if bootstrap {
            self.detections.clear();
            self.claimed.clear();
            for det in detections {
                self.spawn(det.position);
            }
            return Ok(self.report.spawned.clone());
        }

        self.detections = detections.iter().map(|d| d.position).collect();
        self.claimed = vec![false; self.detections.len()];
        self.dt = dt;
        self.has_frame = true;
        Ok(Vec::new())
    }

    /// Associate confirmed tracks with the unclaimed detections.
    ///
    /// Matched tracks absorb their detection and claim it; the others are
    /// marked missed and dropped once invalid. Returns the dropped ids.
    pub fn associate_confirmed(&mut self) -> Vec<TrackId> {
        if self.confirmed.is_empty() {
            return Vec::new();
        }

        let available = self.unclaimed();
        let candidates: Vec<Point3> = available.iter().map(|&j| self.detections[j]).collect();
        // Pool tracks always hold at least one sample.
        let references: Vec<Point3> = self
            .confirmed
            .iter()
            .map(|t| t.position().unwrap_or_else(Point3::zeros))
            .collect();

        let gates = self.config.gates();
        let result = assignment::associate(&references, &candidates, &gates, self.dt);
        trace!(
            frame = self.frame_id,
            tracks = references.len(),
            candidates = candidates.len(),
            matches = result.matches.len(),
            "confirmed association"
        );

        for (i, track) in self.confirmed.iter_mut().enumerate() {
            let proposed = result.detection_for(i).map(|k| available[k]);
            let accepted = match proposed {
                Some(j) if gates.admits(&references[i], &self.detections[j], self.dt) => {
                    match track.append(self.detections[j], self.dt) {
                        Ok(()) => {
                            self.claimed[j] = true;
                            self.report.updated.push(track.id());
                            true
                        }
                        Err(err) => {
                            warn!(track = %track.id(), error = %err, "filter update failed");
                            false
                        }
                    }
                }
                _ => false,
            };
            if !accepted {
                track.mark_missed();
            }
        }

        let mut dropped = Vec::new();
        self.confirmed.retain(|t| {
            if t.is_invalid() {
                debug!(track = %t.id(), "dropping confirmed track");
                dropped.push(t.id());
                false
            } else {
                true
            }
        });
        self.report.dropped_confirmed.extend(dropped.iter().copied());
        dropped
    }

    /// Associate tentative tracks with the unclaimed detections.
    ///
    /// Matched tracks gain a position; tracks reaching `min_frames` are
    /// promoted into the confirmed pool. Unmatched tracks are marked missed.
    /// Detections still unclaimed afterwards spawn new tentative tracks.
    /// Returns the ids promoted this pass.
    pub fn associate_tentative(&mut self) -> Vec<TrackId> {
        if self.detections.is_empty() {
            // Nothing to match, but the frame still counts toward each delta.
            for track in &mut self.tentative {
                track.elapse(self.dt);
            }
            return Vec::new();
        }

        let available = self.unclaimed();
        let candidates: Vec<Point3> = available.iter().map(|&j| self.detections[j]).collect();
        let references: Vec<Point3> = self.tentative.iter().map(|t| t.last_position()).collect();

        let gates = self.config.gates();
        let result = assignment::associate(&references, &candidates, &gates, self.dt);
        trace!(
            frame = self.frame_id,
            tracks = references.len(),
            candidates = candidates.len(),
            matches = result.matches.len(),
            "tentative association"
        );

        let mut newly_confirmed = Vec::new();
        let mut remaining = Vec::with_capacity(self.tentative.len());

        for (i, mut track) in std::mem::take(&mut self.tentative).into_iter().enumerate() {
            let proposed = result.detection_for(i).map(|k| available[k]);
            match proposed {
                Some(j) if gates.admits(&references[i], &self.detections[j], self.dt) => {
                    track.add_position(self.detections[j], self.dt);
                    self.claimed[j] = true;
                    if !track.is_confirmed() {
                        remaining.push(track);
                        continue;
                    }
                    match ConfirmedTrack::from_tentative(
                        &track,
                        self.filter.clone(),
                        self.config.confirmed_max_missed,
                    ) {
                        Ok(confirmed) => {
                            debug!(track = %track.id(), samples = track.len(), "track confirmed");
                            newly_confirmed.push(track.id());
                            self.confirmed.push(confirmed);
                        }
                        Err(err) => {
                            warn!(track = %track.id(), error = %err, "promoted history failed to replay");
                            self.report.dropped_tentative.push(track.id());
                        }
                    }
                }
                _ => {
                    track.elapse(self.dt);
                    track.mark_missed();
                    if track.is_invalid() {
                        debug!(track = %track.id(), "dropping tentative track");
                        self.report.dropped_tentative.push(track.id());
                    } else {
                        remaining.push(track);
                    }
                }
            }
        }
        self.tentative = remaining;

        for j in 0..self.detections.len() {
            if !self.claimed[j] {
                self.claimed[j] = true;
                self.spawn(self.detections[j]);
            }
        }

        self.report.newly_confirmed.extend(newly_confirmed.iter().copied());
        newly_confirmed
    }

    fn spawn(&mut self, position: Point3) -> TrackId {
        self.next_id += 1;
        let id = TrackId(self.next_id);
        self.tentative.push(TentativeTrack::new(
            id,
            position,
            self.config.min_frames,
            self.config.tentative_max_missed,
        ));
        debug!(track = %id, x = position.x, y = position.y, z = position.z, "spawned tentative track");
        self.report.spawned.push(id);
        id
    }

    fn unclaimed(&self) -> Vec<usize> {
        (0..self.detections.len())
            .filter(|&j| !self.claimed[j])
            .collect()
    }

    /// Drop every track and forget the stored frame. Ids keep increasing.
    pub fn reset(&mut self) {
        self.tentative.clear();
        self.confirmed.clear();
        self.detections.clear();
        self.claimed.clear();
        self.has_frame = false;
        self.report = FrameReport::default();
    }

    pub fn confirmed_tracks(&self) -> &[ConfirmedTrack] {
        &self.confirmed
    }

    pub fn tentative_tracks(&self) -> &[TentativeTrack] {
        &self.tentative
    }

    pub fn confirmed(&self, id: TrackId) -> Option<&ConfirmedTrack> {
        self.confirmed.iter().find(|t| t.id() == id)
    }

    pub fn tentative(&self, id: TrackId) -> Option<&TentativeTrack> {
        self.tentative.iter().find(|t| t.id() == id)
    }

    /// Events recorded since the last ingested frame.
    pub fn report(&self) -> &FrameReport {
        &self.report
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}
