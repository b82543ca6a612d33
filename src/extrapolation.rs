//! Polynomial trajectory extrapolation over two named axes.
//!
//! The history is fitted twice with a least-squares polynomial: once over
//! samples `[0, n-2]` (window A) and once over `[1, n-1]` (window B). The
//! one-step-ahead estimate is `2·B − A` evaluated one time unit past the last
//! sample, which removes the lag of a single trailing fit.

use nalgebra::{DMatrix, DVector};

use crate::error::{Result, TrackError};
use crate::tracker::ConfirmedTrack;

const AXIS_COUNT: usize = 2;
const DEFAULT_DEGREE: usize = 2;
const SVD_EPS: f64 = 1e-12;

/// Coordinate selector used when building a history from a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

/// Cumulative timestamps and the named coordinate series sampled at them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrajectoryHistory {
    timestamps: Vec<f64>,
    axes: Vec<(String, Vec<f64>)>,
}

impl TrajectoryHistory {
    pub fn new(timestamps: Vec<f64>) -> Self {
        Self {
            timestamps,
            axes: Vec::new(),
        }
    }

    pub fn with_axis(mut self, name: impl Into<String>, values: Vec<f64>) -> Self {
        self.push_axis(name, values);
        self
    }

    pub fn push_axis(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.axes.push((name.into(), values));
    }

    /// Two coordinates of a confirmed track's raw history.
    pub fn from_track(track: &ConfirmedTrack, axes: [Axis; 2]) -> Self {
        let mut history = Self::new(track.timestamps().to_vec());
        for axis in axes {
            let values = track.positions().iter().map(|p| p[axis.index()]).collect();
            history.push_axis(axis.name(), values);
        }
        history
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn axis(&self, name: &str) -> Option<&[f64]> {
        self.axes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn axis_names(&self) -> impl Iterator<Item = &str> {
        self.axes.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Both window fits for one axis.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisModel {
    pub name: String,
    /// Coefficients, lowest order first, in time relative to the model origin
    pub window_a: Vec<f64>,
    pub window_b: Vec<f64>,
    /// Fits sampled over the model grid
    pub curve_a: Vec<f64>,
    pub curve_b: Vec<f64>,
}

/// Fitted regression ready for extrapolation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtrapolationModel {
    pub degree: usize,
    /// Timestamp subtracted before fitting
    pub origin: f64,
    /// History timestamps followed by `last + 1`
    pub grid: Vec<f64>,
    pub axes: Vec<AxisModel>,
}

impl ExtrapolationModel {
    pub fn last_time(&self) -> f64 {
        self.grid
            .len()
            .checked_sub(2)
            .and_then(|i| self.grid.get(i))
            .copied()
            .unwrap_or(0.0)
    }
}

/// A named-axis point at a given time.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedPoint {
    pub time: f64,
    pub coords: Vec<(String, f64)>,
}

impl TimedPoint {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.coords.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }
}

/// Fit a degree-2 model.
pub fn regress(history: &TrajectoryHistory) -> Result<ExtrapolationModel> {
    regress_with_degree(history, DEFAULT_DEGREE)
}

pub fn regress_with_degree(history: &TrajectoryHistory, degree: usize) -> Result<ExtrapolationModel> {
    if history.axes.len() != AXIS_COUNT {
        return Err(TrackError::InvalidDimension {
            expected: AXIS_COUNT,
            got: history.axes.len(),
        });
    }
    if history.axes[0].0 == history.axes[1].0 {
        return Err(TrackError::InvalidInput(format!(
            "duplicate axis name {}",
            history.axes[0].0
        )));
    }
    let n = history.len();
    if let Some(t) = history.timestamps.iter().find(|t| !t.is_finite()) {
        return Err(TrackError::InvalidInput(format!("non-finite timestamp {t}")));
    }
    for (name, values) in &history.axes {
        if values.len() != n {
            return Err(TrackError::InvalidInput(format!(
                "axis {name} has {} samples, expected {n}",
                values.len()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(TrackError::InvalidInput(format!(
                "axis {name} has a non-finite value"
            )));
        }
    }
    let required = degree + 2;
    if n < required {
        return Err(TrackError::InsufficientSamples { required, got: n });
    }

    let origin = history.timestamps[0];
    let times: Vec<f64> = history.timestamps.iter().map(|t| t - origin).collect();
    let mut grid_rel = times.clone();
    grid_rel.push(times[n - 1] + 1.0);

    let mut axes = Vec::with_capacity(AXIS_COUNT);
    for (name, values) in &history.axes {
        let window_a = polyfit(&times[..n - 1], &values[..n - 1], degree)?;
        let window_b = polyfit(&times[1..], &values[1..], degree)?;
        axes.push(AxisModel {
            name: name.clone(),
            curve_a: grid_rel.iter().map(|&t| polyval(&window_a, t)).collect(),
            curve_b: grid_rel.iter().map(|&t| polyval(&window_b, t)).collect(),
            window_a,
            window_b,
        });
    }

    Ok(ExtrapolationModel {
        degree,
        origin,
        grid: grid_rel.iter().map(|t| t + origin).collect(),
        axes,
    })
}

/// One-step-ahead estimate from the end of both curves.
pub fn extrapolate(model: &ExtrapolationModel) -> TimedPoint {
    let coords = model
        .axes
        .iter()
        .map(|axis| {
            let a = axis.curve_a.last().copied().unwrap_or(0.0);
            let b = axis.curve_b.last().copied().unwrap_or(0.0);
            (axis.name.clone(), 2.0 * b - a)
        })
        .collect();
    TimedPoint {
        time: model.grid.last().copied().unwrap_or(0.0),
        coords,
    }
}

/// Least-squares polynomial fit through SVD, coefficients lowest order first.
fn polyfit(times: &[f64], values: &[f64], degree: usize) -> Result<Vec<f64>> {
    let vandermonde = DMatrix::from_fn(times.len(), degree + 1, |i, j| times[i].powi(j as i32));
    let rhs = DVector::from_column_slice(values);
    let coefficients = vandermonde
        .svd(true, true)
        .solve(&rhs, SVD_EPS)
        .map_err(|e| TrackError::InvalidInput(format!("polynomial fit failed: {e}")))?;
    Ok(coefficients.iter().copied().collect())
}

fn polyval(coefficients: &[f64], t: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * t + c)
}
