mod assignment;
mod confirmed;
mod frame_tracker;
mod point;
mod tentative;
mod track_state;
mod ukf;

pub use assignment::{
    AssignmentResult, Detection, Gates, associate, distance_cost, hungarian, linear_assignment,
};
pub use confirmed::{ConfirmedTrack, Forecast};
pub use frame_tracker::{FrameReport, FrameTracker, TrackerConfig};
pub use point::{Point3, distance, distance_batch, implied_speed, is_finite, point_from_slice};
pub use tentative::TentativeTrack;
pub use track_state::{TrackId, TrackState};
pub use ukf::{
    ConstantVelocity, FilterConfig, MotionModel, ObservationModel, PositionSensor, StateCovariance,
    StateVector, UkfState, UnscentedKalmanFilter,
};
