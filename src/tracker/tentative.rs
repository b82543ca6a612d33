//! Lightweight pre-confirmation track.

use std::hash::{Hash, Hasher};

use crate::tracker::point::Point3;
use crate::tracker::track_state::{TrackId, TrackState};

/// Unconfirmed candidate target.
///
/// Carries no filter, only the accepted positions and the time elapsed since
/// the previous accepted position, so the confirmed track built on promotion
/// can replay them with the true sample spacing.
#[derive(Debug, Clone)]
pub struct TentativeTrack {
    id: TrackId,
    positions: Vec<Point3>,
    deltas: Vec<f64>,
    /// Time passed since the last accepted position, excluding the current frame
    elapsed: f64,
    tracked_frames: u32,
    missed_frames: u32,
    min_frames: u32,
    max_missed: u32,
    state: TrackState,
}

impl TentativeTrack {
    pub fn new(id: TrackId, initial_position: Point3, min_frames: u32, max_missed: u32) -> Self {
        Self {
            id,
            positions: vec![initial_position],
            deltas: vec![0.0],
            elapsed: 0.0,
            tracked_frames: 1,
            missed_frames: 0,
            min_frames,
            max_missed,
            state: TrackState::Tentative,
        }
    }

    /// Record a successful association made `dt` after the previous frame.
    ///
    /// The stored delta also covers every frame elapsed since the last
    /// accepted position.
    pub fn add_position(&mut self, position: Point3, dt: f64) {
        self.positions.push(position);
        self.deltas.push(self.elapsed + dt);
        self.elapsed = 0.0;
        self.tracked_frames += 1;
        self.missed_frames = 0;
        if self.state == TrackState::Tentative && self.tracked_frames >= self.min_frames {
            self.state = TrackState::Confirmed;
        }
    }

    /// Let a frame of `dt` pass without accepting a position.
    pub fn elapse(&mut self, dt: f64) {
        self.elapsed += dt;
    }

    /// Record an association failure.
    pub fn mark_missed(&mut self) {
        self.missed_frames += 1;
        if self.state == TrackState::Tentative && self.missed_frames >= self.max_missed {
            self.state = TrackState::Invalid;
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == TrackState::Confirmed
    }

    pub fn is_invalid(&self) -> bool {
        self.state == TrackState::Invalid
    }

    pub fn tracked_frames(&self) -> u32 {
        self.tracked_frames
    }

    pub fn missed_frames(&self) -> u32 {
        self.missed_frames
    }

    pub fn positions(&self) -> &[Point3] {
        &self.positions
    }

    /// Time since the previous position, parallel to `positions`; the seed entry is 0.
    pub fn deltas(&self) -> &[f64] {
        &self.deltas
    }

    pub fn last_position(&self) -> Point3 {
        // Never empty: the constructor seeds one position.
        self.positions[self.positions.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl PartialEq for TentativeTrack {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TentativeTrack {}

impl Hash for TentativeTrack {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
