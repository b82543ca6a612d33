//! Unscented Kalman filter over a 6D constant-velocity state using nalgebra.
//!
//! The filter itself is stateless: it holds the models, noise matrices and
//! sigma-point parameters, and maps a `UkfState` to a new `UkfState`. Tracks
//! own their state, so forecasting is a pure function of a copied state.
//!
//! Sigma points follow the Van der Merwe scaled selection:
//! - χ₀ = μ
//! - χᵢ = μ + (√((n+λ)P))ᵢ, χᵢ₊ₙ = μ − (√((n+λ)P))ᵢ for i = 1..n
//!
//! with λ = α²(n+κ) − n.

use nalgebra::{Cholesky, Matrix3, Matrix6, Matrix6x3, Vector3, Vector6};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::tracker::point::Point3;

/// `[x, y, z, vx, vy, vz]`
pub type StateVector = Vector6<f64>;
pub type StateCovariance = Matrix6<f64>;

const STATE_DIM: usize = 6;

/// State transition `x_k = f(x_{k-1}, dt)`.
pub trait MotionModel {
    fn transition(&self, state: &StateVector, dt: f64) -> StateVector;
}

/// Measurement function `z = h(x)`.
pub trait ObservationModel {
    fn observe(&self, state: &StateVector) -> Vector3<f64>;
}

/// Position advances by velocity·dt, velocity is unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantVelocity;

impl MotionModel for ConstantVelocity {
    fn transition(&self, state: &StateVector, dt: f64) -> StateVector {
        let mut next = *state;
        for i in 0..3 {
            next[i] += state[i + 3] * dt;
        }
        next
    }
}

/// Observes the position sub-vector directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionSensor;

impl ObservationModel for PositionSensor {
    fn observe(&self, state: &StateVector) -> Vector3<f64> {
        state.fixed_rows::<3>(0).into_owned()
    }
}

/// Filter tuning constants, fixed at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Initial covariance is `initial_covariance_scale · I`
    pub initial_covariance_scale: f64,
    /// Process noise is `process_noise_scale · I` (6×6)
    pub process_noise_scale: f64,
    /// Diagonal of the 3×3 measurement noise
    pub measurement_noise: [f64; 3],
    /// Sigma point spread
    pub alpha: f64,
    /// Prior distribution knowledge, 2 is optimal for Gaussians
    pub beta: f64,
    pub kappa: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            initial_covariance_scale: 0.2,
            process_noise_scale: 0.1,
            measurement_noise: [0.01; 3],
            alpha: 0.1,
            beta: 2.0,
            kappa: 0.0,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("initial_covariance_scale", self.initial_covariance_scale),
            ("process_noise_scale", self.process_noise_scale),
            ("measurement_noise[0]", self.measurement_noise[0]),
            ("measurement_noise[1]", self.measurement_noise[1]),
            ("measurement_noise[2]", self.measurement_noise[2]),
            ("alpha", self.alpha),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(TrackError::InvalidConfig(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }
        if !self.beta.is_finite() || !self.kappa.is_finite() {
            return Err(TrackError::InvalidConfig(
                "beta and kappa must be finite".to_string(),
            ));
        }
        let n = STATE_DIM as f64;
        if self.alpha * self.alpha * (n + self.kappa) <= 0.0 {
            return Err(TrackError::InvalidConfig(
                "alpha²(n + kappa) must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Mean and covariance of the filtered state.
#[derive(Debug, Clone, PartialEq)]
pub struct UkfState {
    pub mean: StateVector,
    pub covariance: StateCovariance,
}

impl UkfState {
    pub fn position(&self) -> Point3 {
        self.mean.fixed_rows::<3>(0).into_owned()
    }

    pub fn velocity(&self) -> Vector3<f64> {
        self.mean.fixed_rows::<3>(3).into_owned()
    }
}

/// 2n+1 sigma points and their weights.
struct SigmaPoints {
    points: Vec<StateVector>,
    weight_mean_0: f64,
    weight_cov_0: f64,
    weight_i: f64,
}

impl SigmaPoints {
    fn generate(state: &UkfState, config: &FilterConfig) -> Result<Self> {
        let n = STATE_DIM as f64;
        let lambda = config.alpha * config.alpha * (n + config.kappa) - n;
        let spread = n + lambda;

        let sqrt_p = Cholesky::new(state.covariance.scale(spread))
            .ok_or(TrackError::DegenerateCovariance)?
            .l();

        let mut points = Vec::with_capacity(2 * STATE_DIM + 1);
        points.push(state.mean);
        for i in 0..STATE_DIM {
            let col = sqrt_p.column(i).into_owned();
            points.push(state.mean + col);
            points.push(state.mean - col);
        }

        Ok(Self {
            points,
            weight_mean_0: lambda / spread,
            weight_cov_0: lambda / spread + (1.0 - config.alpha * config.alpha + config.beta),
            weight_i: 1.0 / (2.0 * spread),
        })
    }

    #[inline]
    fn weights(&self, index: usize) -> (f64, f64) {
        if index == 0 {
            (self.weight_mean_0, self.weight_cov_0)
        } else {
            (self.weight_i, self.weight_i)
        }
    }
}

#[derive(Debug, Clone)]
pub struct UnscentedKalmanFilter<M = ConstantVelocity, O = PositionSensor> {
    motion: M,
    observation: O,
    config: FilterConfig,
    process_noise: StateCovariance,
    measurement_noise: Matrix3<f64>,
}

impl Default for UnscentedKalmanFilter {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

impl UnscentedKalmanFilter {
    pub fn new(config: FilterConfig) -> Self {
        Self::with_models(ConstantVelocity, PositionSensor, config)
    }
}

impl<M: MotionModel, O: ObservationModel> UnscentedKalmanFilter<M, O> {
    pub fn with_models(motion: M, observation: O, config: FilterConfig) -> Self {
        let process_noise = StateCovariance::identity().scale(config.process_noise_scale);
        let measurement_noise = Matrix3::from_diagonal(&Vector3::from(config.measurement_noise));
        Self {
            motion,
            observation,
            config,
            process_noise,
            measurement_noise,
        }
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Seed the state from the first two samples, `dt` apart.
    ///
    /// Position is the first sample, velocity the finite difference. `dt` must
    /// be positive.
    pub fn initiate(&self, first: &Point3, second: &Point3, dt: f64) -> UkfState {
        let velocity = (second - first) / dt;
        let mut mean = StateVector::zeros();
        mean.fixed_rows_mut::<3>(0).copy_from(first);
        mean.fixed_rows_mut::<3>(3).copy_from(&velocity);

        UkfState {
            mean,
            covariance: StateCovariance::identity().scale(self.config.initial_covariance_scale),
        }
    }

    /// Advance the state by `dt` through the motion model.
    pub fn predict(&self, state: &UkfState, dt: f64) -> Result<UkfState> {
        let sigma = SigmaPoints::generate(state, &self.config)?;
        let propagated: Vec<StateVector> = sigma
            .points
            .iter()
            .map(|x| self.motion.transition(x, dt))
            .collect();

        let mut mean = StateVector::zeros();
        for (i, x) in propagated.iter().enumerate() {
            mean += x.scale(sigma.weights(i).0);
        }

        let mut covariance = self.process_noise;
        for (i, x) in propagated.iter().enumerate() {
            let diff = x - mean;
            covariance += (diff * diff.transpose()).scale(sigma.weights(i).1);
        }

        Ok(UkfState {
            mean,
            covariance: symmetrize(covariance),
        })
    }

    /// Fuse a position measurement.
    pub fn update(&self, state: &UkfState, measurement: &Point3) -> Result<UkfState> {
        let sigma = SigmaPoints::generate(state, &self.config)?;
        let observed: Vec<Vector3<f64>> = sigma
            .points
            .iter()
            .map(|x| self.observation.observe(x))
            .collect();

        let mut z_mean = Vector3::zeros();
        for (i, z) in observed.iter().enumerate() {
            z_mean += z.scale(sigma.weights(i).0);
        }

        let mut innovation_cov = self.measurement_noise;
        let mut cross_cov = Matrix6x3::zeros();
        for (i, (x, z)) in sigma.points.iter().zip(&observed).enumerate() {
            let w = sigma.weights(i).1;
            let dz = z - z_mean;
            let dx = x - state.mean;
            innovation_cov += (dz * dz.transpose()).scale(w);
            cross_cov += (dx * dz.transpose()).scale(w);
        }

        // K = P_xz * S^-1
        let s_inv = innovation_cov
            .try_inverse()
            .ok_or(TrackError::DegenerateCovariance)?;
        let kalman_gain = cross_cov * s_inv;

        let innovation = measurement - z_mean;
        let mean = state.mean + kalman_gain * innovation;
        let covariance = state.covariance - kalman_gain * innovation_cov * kalman_gain.transpose();

        Ok(UkfState {
            mean,
            covariance: symmetrize(covariance),
        })
    }
}

fn symmetrize(m: StateCovariance) -> StateCovariance {
    (m + m.transpose()).scale(0.5)
}
