//! Motion hypotheses for the IMM filter bank
//!
//! All three models share the 5-D state `[px, py, v, yaw, yaw_rate]` and
//! differ only in the process function `f(x, Δt)`. Since nothing else
//! varies, a small tag enum with a `match` replaces a trait hierarchy.

use nalgebra::RealField;
use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::types::spaces::{StateVector, TrackState, TrackStateCov};

/// Number of parallel motion hypotheses.
pub const MODEL_COUNT: usize = 3;

/// Yaw rates below this magnitude make the turn integration degenerate and
/// fall back to straight-line motion.
const YAW_RATE_EPS: f64 = 1e-4;

/// Wraps an angle into (−π, π].
#[inline]
pub fn normalize_yaw<T: RealField + Copy>(mut yaw: T) -> T {
    let pi = T::pi();
    let two_pi = pi + pi;
    while yaw > pi {
        yaw -= two_pi;
    }
    while yaw <= -pi {
        yaw += two_pi;
    }
    yaw
}

/// Tag identifying one motion hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionModel {
    /// Constant velocity along the current heading.
    Cv,
    /// Constant turn rate and velocity (closed-form turn integration).
    Ctrv,
    /// Random motion: the near-stationary hypothesis.
    Rm,
}

impl MotionModel {
    /// All models in bank order.
    pub const ALL: [MotionModel; MODEL_COUNT] = [MotionModel::Cv, MotionModel::Ctrv, MotionModel::Rm];

    /// Position of this model in the bank.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            MotionModel::Cv => 0,
            MotionModel::Ctrv => 1,
            MotionModel::Rm => 2,
        }
    }

    /// Applies the process function `f(x, Δt)`.
    ///
    /// The returned yaw is normalized into (−π, π].
    pub fn propagate<T: RealField + Float + Copy>(self, state: &TrackState<T>, dt: T) -> TrackState<T> {
        let px = *state.index(0);
        let py = *state.index(1);
        let v = *state.index(2);
        let yaw = *state.index(3);
        let yaw_rate = *state.index(4);

        match self {
            MotionModel::Cv => {
                let px_new = px + v * dt * Float::cos(yaw);
                let py_new = py + v * dt * Float::sin(yaw);
                StateVector::from_array([px_new, py_new, v, normalize_yaw(yaw), yaw_rate])
            }
            MotionModel::Ctrv => {
                let eps = T::from_f64(YAW_RATE_EPS).unwrap();
                if Float::abs(yaw_rate) < eps {
                    // Degenerate turn rate, integrate as straight motion.
                    let px_new = px + v * dt * Float::cos(yaw);
                    let py_new = py + v * dt * Float::sin(yaw);
                    StateVector::from_array([px_new, py_new, v, normalize_yaw(yaw), yaw_rate])
                } else {
                    let yaw_end = yaw + yaw_rate * dt;
                    let radius = v / yaw_rate;
                    let px_new = px + radius * (Float::sin(yaw_end) - Float::sin(yaw));
                    let py_new = py + radius * (Float::cos(yaw) - Float::cos(yaw_end));
                    StateVector::from_array([px_new, py_new, v, normalize_yaw(yaw_end), yaw_rate])
                }
            }
            MotionModel::Rm => {
                // Stationary hypothesis: hold position, bleed velocity and turn.
                StateVector::from_array([px, py, T::zero(), normalize_yaw(yaw), T::zero()])
            }
        }
    }
}

/// White-noise process parameters for one motion model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProcessNoise<T> {
    /// Linear acceleration standard deviation (m/s²).
    pub std_accel: T,
    /// Yaw acceleration standard deviation (rad/s²).
    pub std_yaw_accel: T,
}

impl<T: RealField + Float + Copy> ProcessNoise<T> {
    /// Creates process noise parameters.
    ///
    /// # Panics
    /// Panics if either standard deviation is negative.
    pub fn new(std_accel: T, std_yaw_accel: T) -> Self {
        assert!(std_accel >= T::zero(), "std_accel must be non-negative");
        assert!(
            std_yaw_accel >= T::zero(),
            "std_yaw_accel must be non-negative"
        );
        Self {
            std_accel,
            std_yaw_accel,
        }
    }

    /// Additive process noise Q(Δt).
    ///
    /// Diagonal white-noise acceleration approximation:
    /// position picks up ½Δt²σ_a, velocity Δtσ_a, yaw ½Δt²σ_ydd and
    /// yaw rate Δtσ_ydd.
    pub fn covariance(&self, dt: T) -> TrackStateCov<T> {
        let half = T::from_f64(0.5).unwrap();
        let dt2 = dt * dt;

        let q_pos = half * dt2 * self.std_accel;
        let q_vel = dt * self.std_accel;
        let q_yaw = half * dt2 * self.std_yaw_accel;
        let q_yaw_rate = dt * self.std_yaw_accel;

        TrackStateCov::from_diagonal(&nalgebra::vector![
            q_pos * q_pos,
            q_pos * q_pos,
            q_vel * q_vel,
            q_yaw * q_yaw,
            q_yaw_rate * q_yaw_rate
        ])
    }
}
