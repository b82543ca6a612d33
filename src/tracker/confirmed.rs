//! Filter-backed confirmed track.

use std::hash::{Hash, Hasher};

use nalgebra::Vector3;
use tracing::trace;

use crate::error::{self, Result, TrackError};
use crate::tracker::point::{self, Point3};
use crate::tracker::tentative::TentativeTrack;
use crate::tracker::track_state::{TrackId, TrackState};
use crate::tracker::ukf::{StateVector, UkfState, UnscentedKalmanFilter};

/// One-step-ahead forecast alongside the current filtered state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Forecast {
    /// State advanced by the last time step
    pub predicted: StateVector,
    /// Current filtered state
    pub current: StateVector,
}

impl Forecast {
    pub fn predicted_position(&self) -> Point3 {
        self.predicted.fixed_rows::<3>(0).into_owned()
    }

    pub fn current_position(&self) -> Point3 {
        self.current.fixed_rows::<3>(0).into_owned()
    }
}

/// Stable target with an unscented Kalman filter.
///
/// The filter stays uninitialized until two samples exist. The second sample
/// seeds position and finite-difference velocity and is fused immediately;
/// every later sample runs one predict+update cycle.
#[derive(Debug, Clone)]
pub struct ConfirmedTrack {
    /// Unique track identifier
    id: TrackId,
    /// Raw accepted positions
    positions: Vec<Point3>,
    /// Cumulative time of each position
    timestamps: Vec<f64>,
    filter: UnscentedKalmanFilter,
    /// `None` until two samples have been appended
    estimate: Option<UkfState>,
    /// Step used by the last predict, reused for forecasts
    last_dt: f64,
    missed_frames: u32,
    max_missed: u32,
    state: TrackState,
}

impl ConfirmedTrack {
    pub fn new(id: TrackId, filter: UnscentedKalmanFilter, max_missed: u32) -> Self {
        Self {
            id,
            positions: Vec::new(),
            timestamps: Vec::new(),
            filter,
            estimate: None,
            last_dt: 0.0,
            missed_frames: 0,
            max_missed,
            state: TrackState::Confirmed,
        }
    }

    /// Build a confirmed track by replaying a promoted tentative track.
    ///
    /// Each historical position is appended with the delta it was accepted at,
    /// so the filter ends in the same state as if it had run all along.
    pub fn from_tentative(
        tentative: &TentativeTrack,
        filter: UnscentedKalmanFilter,
        max_missed: u32,
    ) -> Result<Self> {
        let mut track = Self::new(tentative.id(), filter, max_missed);
        for (position, &dt) in tentative.positions().iter().zip(tentative.deltas()) {
            track.append(*position, dt)?;
        }
        Ok(track)
    }

    /// Append a position observed `dt` after the previous one.
    ///
    /// Fails with `InvalidInput` if `dt` is not finite and non-negative, if it
    /// is zero for any sample after the seed, or if the position is not finite.
    /// On error the track is left unchanged.
    pub fn append(&mut self, position: Point3, dt: f64) -> Result<()> {
        error::validate_dt(dt)?;
        if !point::is_finite(&position) {
            return Err(TrackError::InvalidInput(format!(
                "position must be finite, got {position:?}"
            )));
        }
        if !self.positions.is_empty() && dt == 0.0 {
            return Err(TrackError::InvalidInput(
                "dt must be positive after the seed sample".to_string(),
            ));
        }

        match (&self.estimate, self.positions.last()) {
            (Some(estimate), _) => {
                let estimate = self.cycle(estimate, &position, dt)?;
                self.estimate = Some(estimate);
            }
            (None, Some(first)) => {
                let seeded = self.filter.initiate(first, &position, dt);
                let estimate = self.cycle(&seeded, &position, dt)?;
                trace!(track = %self.id, "filter initialized");
                self.estimate = Some(estimate);
            }
            (None, None) => {}
        }

        let time = match self.timestamps.last() {
            Some(last) => last + dt,
            None => dt,
        };
        self.positions.push(position);
        self.timestamps.push(time);
        if self.estimate.is_some() {
            self.last_dt = dt;
        }
        self.missed_frames = 0;
        Ok(())
    }

    /// Slice form of [`append`](Self::append); fails with `InvalidDimension`
    /// unless `position` holds exactly three values.
    pub fn append_slice(&mut self, position: &[f64], dt: f64) -> Result<()> {
        let position = point::point_from_slice(position)?;
        self.append(position, dt)
    }

    fn cycle(&self, state: &UkfState, measurement: &Point3, dt: f64) -> Result<UkfState> {
        let predicted = self.filter.predict(state, dt)?;
        self.filter.update(&predicted, measurement)
    }

    /// Forecast one step ahead without touching the live filter.
    ///
    /// Repeated calls without an intervening `append` return identical results.
    pub fn predict_ahead(&self) -> Result<Forecast> {
        let estimate = self.estimate.as_ref().ok_or(TrackError::FilterNotReady)?;
        let predicted = self.filter.predict(estimate, self.last_dt)?;
        Ok(Forecast {
            predicted: predicted.mean,
            current: estimate.mean,
        })
    }

    /// Record an association failure.
    pub fn mark_missed(&mut self) {
        self.missed_frames += 1;
        if self.missed_frames >= self.max_missed {
            self.state = TrackState::Invalid;
        }
    }

    pub fn get(&self, index: usize) -> Result<Point3> {
        self.positions
            .get(index)
            .copied()
            .ok_or(TrackError::IndexOutOfRange {
                index,
                len: self.positions.len(),
            })
    }

    pub fn timestamp(&self, index: usize) -> Result<f64> {
        self.timestamps
            .get(index)
            .copied()
            .ok_or(TrackError::IndexOutOfRange {
                index,
                len: self.timestamps.len(),
            })
    }

    /// Whether `position` was recorded in the history, compared exactly.
    pub fn contains(&self, position: &Point3) -> bool {
        self.positions.iter().any(|p| p == position)
    }

    /// Remove one history sample, returning its position and timestamp.
    ///
    /// Only the recorded history shrinks; the filter estimate is not rewound.
    pub fn remove_sample(&mut self, index: usize) -> Result<(Point3, f64)> {
        if index >= self.positions.len() {
            return Err(TrackError::IndexOutOfRange {
                index,
                len: self.positions.len(),
            });
        }
        let position = self.positions.remove(index);
        let time = self.timestamps.remove(index);
        Ok((position, time))
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn is_invalid(&self) -> bool {
        self.state == TrackState::Invalid
    }

    pub fn missed_frames(&self) -> u32 {
        self.missed_frames
    }

    pub fn positions(&self) -> &[Point3] {
        &self.positions
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn is_filter_ready(&self) -> bool {
        self.estimate.is_some()
    }

    pub fn estimate(&self) -> Option<&UkfState> {
        self.estimate.as_ref()
    }

    /// Filtered position, or the last raw sample while the filter is not ready.
    pub fn position(&self) -> Option<Point3> {
        match &self.estimate {
            Some(estimate) => Some(estimate.position()),
            None => self.positions.last().copied(),
        }
    }

    pub fn velocity(&self) -> Option<Vector3<f64>> {
        self.estimate.as_ref().map(UkfState::velocity)
    }
}

impl PartialEq for ConfirmedTrack {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConfirmedTrack {}

impl Hash for ConfirmedTrack {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::ukf::FilterConfig;
    use approx::assert_relative_eq;

    fn track() -> ConfirmedTrack {
        ConfirmedTrack::new(
            TrackId(1),
            UnscentedKalmanFilter::new(FilterConfig::default()),
            3,
        )
    }

    #[test]
    fn test_single_sample_has_no_estimate() {
        let mut t = track();
        t.append(Point3::new(1.0, 2.0, 3.0), 0.0).unwrap();
        assert_eq!(t.len(), 1);
        assert!(!t.is_filter_ready());
        assert!(t.velocity().is_none());
        assert_eq!(t.position(), Some(Point3::new(1.0, 2.0, 3.0)));
        assert_eq!(t.predict_ahead(), Err(TrackError::FilterNotReady));
    }

    #[test]
    fn test_second_sample_sets_finite_difference_velocity() {
        let mut t = track();
        t.append(Point3::new(0.0, 0.0, 0.0), 0.0).unwrap();
        t.append(Point3::new(0.5, -1.0, 0.25), 0.5).unwrap();
        assert!(t.is_filter_ready());
        let velocity = t.velocity().unwrap();
        assert_relative_eq!(velocity, Vector3::new(1.0, -2.0, 0.5), epsilon = 1e-9);
        assert_relative_eq!(
            t.position().unwrap(),
            Point3::new(0.5, -1.0, 0.25),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_timestamps_are_cumulative() {
        let mut t = track();
        t.append(Point3::zeros(), 0.0).unwrap();
        t.append(Point3::new(1.0, 0.0, 0.0), 0.5).unwrap();
        t.append(Point3::new(2.0, 0.0, 0.0), 0.25).unwrap();
        assert_eq!(t.timestamps(), &[0.0, 0.5, 0.75]);
    }

    #[test]
    fn test_predict_ahead_is_idempotent() {
        let mut t = track();
        for (i, dt) in [0.0, 1.0, 1.0, 1.0].into_iter().enumerate() {
            t.append(Point3::new(i as f64, 0.5 * i as f64, 0.0), dt).unwrap();
        }
        let before = t.estimate().cloned();
        let first = t.predict_ahead().unwrap();
        let second = t.predict_ahead().unwrap();
        assert_eq!(first, second);
        assert_eq!(t.estimate().cloned(), before);
        assert_relative_eq!(first.predicted_position(), Point3::new(4.0, 2.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(first.current_position(), Point3::new(3.0, 1.5, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_input() {
        let mut t = track();
        assert!(matches!(
            t.append(Point3::zeros(), -0.1),
            Err(TrackError::InvalidInput(_))
        ));
        assert!(matches!(
            t.append(Point3::zeros(), f64::NAN),
            Err(TrackError::InvalidInput(_))
        ));
        assert!(matches!(
            t.append(Point3::new(f64::INFINITY, 0.0, 0.0), 0.0),
            Err(TrackError::InvalidInput(_))
        ));
        assert!(t.is_empty());

        t.append(Point3::zeros(), 0.0).unwrap();
        assert!(matches!(
            t.append(Point3::new(1.0, 0.0, 0.0), 0.0),
            Err(TrackError::InvalidInput(_))
        ));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_append_slice_dimension() {
        let mut t = track();
        assert_eq!(
            t.append_slice(&[1.0, 2.0], 0.0),
            Err(TrackError::InvalidDimension {
                expected: 3,
                got: 2
            })
        );
        t.append_slice(&[1.0, 2.0, 3.0], 0.0).unwrap();
        assert_eq!(t.get(0).unwrap(), Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_index_out_of_range() {
        let mut t = track();
        t.append(Point3::zeros(), 0.0).unwrap();
        assert_eq!(
            t.get(1),
            Err(TrackError::IndexOutOfRange { index: 1, len: 1 })
        );
        assert!(t.timestamp(3).is_err());
        assert!(t.remove_sample(1).is_err());
    }

    #[test]
    fn test_remove_sample_keeps_filter() {
        let mut t = track();
        t.append(Point3::zeros(), 0.0).unwrap();
        t.append(Point3::new(1.0, 0.0, 0.0), 1.0).unwrap();
        t.append(Point3::new(2.0, 0.0, 0.0), 1.0).unwrap();
        let estimate = t.estimate().cloned();

        assert!(t.contains(&Point3::zeros()));
        let (position, time) = t.remove_sample(0).unwrap();
        assert!(!t.contains(&Point3::zeros()));
        assert!(t.contains(&Point3::new(1.0, 0.0, 0.0)));
        assert_eq!(position, Point3::zeros());
        assert_eq!(time, 0.0);
        assert_eq!(t.len(), 2);
        assert_eq!(t.timestamps(), &[1.0, 2.0]);
        assert_eq!(t.estimate().cloned(), estimate);

        t.append(Point3::new(3.0, 0.0, 0.0), 1.0).unwrap();
        assert_relative_eq!(t.velocity().unwrap()[0], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_after_max_missed() {
        let mut t = track();
        t.append(Point3::zeros(), 0.0).unwrap();
        t.mark_missed();
        t.mark_missed();
        assert!(!t.is_invalid());
        t.mark_missed();
        assert!(t.is_invalid());
    }

    #[test]
    fn test_from_tentative_replays_history() {
        let mut tentative = TentativeTrack::new(TrackId(9), Point3::zeros(), 3, 3);
        tentative.add_position(Point3::new(1.0, 0.0, 0.0), 1.0);
        tentative.add_position(Point3::new(2.0, 0.0, 0.0), 1.0);

        let t = ConfirmedTrack::from_tentative(
            &tentative,
            UnscentedKalmanFilter::new(FilterConfig::default()),
            3,
        )
        .unwrap();
        assert_eq!(t.id(), TrackId(9));
        assert_eq!(t.len(), 3);
        assert_eq!(t.timestamps(), &[0.0, 1.0, 2.0]);
        assert_relative_eq!(t.velocity().unwrap(), Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-9);
        let other = ConfirmedTrack::new(TrackId(9), UnscentedKalmanFilter::new(FilterConfig::default()), 1);
        assert_eq!(t, other);
    }
}
