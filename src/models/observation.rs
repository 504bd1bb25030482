//! Position sensor model
//!
//! The tracker observes only the planar position of each cluster:
//! `h(x) = (px, py)` with diagonal measurement noise.

use nalgebra::RealField;
use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::types::spaces::{Measurement, PosMeasurement, PosMeasurementCov, TrackState};

/// Planar position sensor with independent noise per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSensor<T> {
    /// X position noise standard deviation (m).
    pub std_px: T,
    /// Y position noise standard deviation (m).
    pub std_py: T,
}

impl<T: RealField + Float + Copy> PositionSensor<T> {
    /// Creates a position sensor.
    ///
    /// # Panics
    /// Panics if either standard deviation is not positive.
    pub fn new(std_px: T, std_py: T) -> Self {
        assert!(std_px > T::zero(), "std_px must be positive");
        assert!(std_py > T::zero(), "std_py must be positive");
        Self { std_px, std_py }
    }

    /// The measurement function `h(x) = (px, py)`.
    #[inline]
    pub fn observe(&self, state: &TrackState<T>) -> PosMeasurement<T> {
        Measurement::from_array([*state.index(0), *state.index(1)])
    }

    /// Measurement noise covariance R.
    #[inline]
    pub fn measurement_noise(&self) -> PosMeasurementCov<T> {
        PosMeasurementCov::from_diagonal(&nalgebra::vector![
            self.std_px * self.std_px,
            self.std_py * self.std_py
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::spaces::StateVector;

    #[test]
    fn test_observe_projects_position() {
        let sensor = PositionSensor::new(0.15_f64, 0.15);
        let x = StateVector::from_array([3.0, -1.0, 5.0, 0.2, 0.0]);
        let z = sensor.observe(&x);

        assert!((z.index(0) - 3.0).abs() < 1e-12);
        assert!((z.index(1) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_measurement_noise_diagonal() {
        let sensor = PositionSensor::new(0.2_f64, 0.1);
        let r = sensor.measurement_noise();

        assert!((r.as_matrix()[(0, 0)] - 0.04).abs() < 1e-12);
        assert!((r.as_matrix()[(1, 1)] - 0.01).abs() < 1e-12);
        assert!(r.as_matrix()[(0, 1)].abs() < 1e-12);
    }
}
