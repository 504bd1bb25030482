//! Tracker configuration
//!
//! Every tunable of the pipeline in one validated struct. Defaults follow
//! the reference parameter set this tracker was tuned with; all of them can
//! be overridden before constructing the tracker. Invalid combinations are
//! rejected at construction rather than at first use.

use nalgebra::RealField;
use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::filters::imm::ModeTransition;
use crate::filters::ukf::UkfParams;
use crate::models::{PositionSensor, ProcessNoise, MODEL_COUNT};
use crate::types::spaces::STATE_DIM;
use crate::{Result, TrackerError};

/// Configuration of the IMM-UKF-PDA tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig<T> {
    /// Frames of matched gating before a stable track is trusted for
    /// bounding-box association and static classification.
    pub life_time_thres: u32,
    /// Chi-square gate on the squared Mahalanobis distance
    /// (9.22 ≈ 99% for 2 degrees of freedom).
    pub gating_thres: T,
    /// Gate probability P_G used by the PDA weights.
    pub gate_probability: T,
    /// Detection probability P_D used by the PDA weights.
    pub detection_probability: T,
    /// Maximum Euclidean distance for nearest-cluster box association.
    pub distance_thres: T,
    /// Mean-speed threshold below which a track may be classified static.
    pub static_velocity_thres: T,
    /// Largest per-frame yaw jump the box stabilizer accepts.
    pub bb_yaw_change_thres: T,
    /// Upper bound on det(S) and det(P_merge) before a track is retired.
    pub det_explode_param: T,
    /// Upper bound on the yaw-rate variance before a track is retired.
    pub cov_explode_param: T,
    /// Markov mode-transition matrix, row-stochastic, rows = source model.
    pub mode_transition: ModeTransition<T>,
    /// Scaled unscented transform parameters.
    pub ukf: UkfParams<T>,
    /// Per-model process noise, in bank order (CV, CTRV, RM).
    pub process_noise: [ProcessNoise<T>; MODEL_COUNT],
    /// Position sensor noise model.
    pub sensor: PositionSensor<T>,
    /// Diagonal of the initial state covariance at track spawn.
    pub init_cov_diag: [T; STATE_DIM],
}

impl<T: RealField + Float + Copy> Default for TrackerConfig<T> {
    fn default() -> Self {
        let f = |v: f64| T::from_f64(v).unwrap();
        Self {
            life_time_thres: 8,
            gating_thres: f(9.22),
            gate_probability: f(0.99),
            detection_probability: f(0.9),
            distance_thres: f(99.0),
            static_velocity_thres: f(0.5),
            bb_yaw_change_thres: f(0.2),
            det_explode_param: f(10.0),
            cov_explode_param: f(1000.0),
            mode_transition: [
                [f(0.9), f(0.05), f(0.05)],
                [f(0.05), f(0.9), f(0.05)],
                [f(0.05), f(0.05), f(0.9)],
            ],
            ukf: UkfParams::default(),
            process_noise: [
                ProcessNoise::new(f(2.0), f(2.0)),
                ProcessNoise::new(f(2.0), f(2.0)),
                ProcessNoise::new(f(3.0), f(3.0)),
            ],
            sensor: PositionSensor::new(f(0.15), f(0.15)),
            init_cov_diag: [f(0.5), f(0.5), f(3.0), f(10.0), f(1.0)],
        }
    }
}

impl<T: RealField + Float + Copy> TrackerConfig<T> {
    /// Validates the configuration.
    ///
    /// Rejects non-positive gates and guards, probabilities outside [0, 1],
    /// and a mode-transition matrix that is not row-stochastic.
    pub fn validate(&self) -> Result<()> {
        fn reject<U>(reason: &str) -> Result<U> {
            Err(TrackerError::InvalidConfig {
                reason: reason.to_string(),
            })
        }

        if self.life_time_thres < 2 {
            return reject("life_time_thres must be at least 2");
        }
        if self.gating_thres <= T::zero() {
            return reject("gating_thres must be positive");
        }
        for (value, name) in [
            (self.gate_probability, "gate_probability"),
            (self.detection_probability, "detection_probability"),
        ] {
            if value < T::zero() || value > T::one() {
                return Err(TrackerError::InvalidConfig {
                    reason: format!("{} must be within [0, 1]", name),
                });
            }
        }
        if self.distance_thres <= T::zero() {
            return reject("distance_thres must be positive");
        }
        if self.static_velocity_thres < T::zero() {
            return reject("static_velocity_thres must be non-negative");
        }
        if self.bb_yaw_change_thres <= T::zero() {
            return reject("bb_yaw_change_thres must be positive");
        }
        if self.det_explode_param <= T::zero() || self.cov_explode_param <= T::zero() {
            return reject("divergence guards must be positive");
        }

        let row_eps = T::from_f64(1e-6).unwrap();
        for (i, row) in self.mode_transition.iter().enumerate() {
            let mut sum = T::zero();
            for &entry in row {
                if entry < T::zero() {
                    return Err(TrackerError::InvalidConfig {
                        reason: format!("mode_transition row {} has a negative entry", i),
                    });
                }
                sum += entry;
            }
            if Float::abs(sum - T::one()) > row_eps {
                return Err(TrackerError::InvalidConfig {
                    reason: format!("mode_transition row {} does not sum to 1", i),
                });
            }
        }

        if self.ukf.alpha <= T::zero() {
            return reject("ukf.alpha must be positive");
        }
        for &d in &self.init_cov_diag {
            if d <= T::zero() {
                return reject("init_cov_diag entries must be positive");
            }
        }
        Ok(())
    }
}
