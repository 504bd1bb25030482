//! Single-model Unscented Kalman Filter
//!
//! One [`ModelFilter`] estimates the 5-D state `[px, py, v, yaw, yaw_rate]`
//! under a single motion hypothesis. Sigma points are generated with the
//! scaled symmetric selection, propagated through the nonlinear process
//! function, and re-generated on the predicted distribution before being
//! mapped through the measurement function to form the predicted
//! measurement, innovation covariance and Kalman gain.
//!
//! Every Cholesky factorization can fail on a covariance that has lost
//! positive definiteness; those failures are surfaced as `None` and the
//! tracker retires the affected track instead of propagating NaNs.

use nalgebra::{RealField, SMatrix, SVector};
use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::models::{normalize_yaw, MotionModel, PositionSensor, ProcessNoise};
use crate::types::spaces::{
    ComputeInnovation, Measurement, PosInnovation, PosMeasurement, PosMeasurementCov, StateVector,
    TrackGain, TrackState, TrackStateCov, MEAS_DIM, STATE_DIM,
};

/// Number of sigma points for the 5-D state.
pub const SIGMA_COUNT: usize = 2 * STATE_DIM + 1;

// ============================================================================
// UKF Parameters
// ============================================================================

/// Scaled unscented transform parameters.
///
/// λ = α²(n + κ) − n. The defaults (α = 0.001, β = 2, κ = 0) concentrate
/// the sigma points tightly around the mean, which suits the short
/// prediction horizons of a per-frame tracker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UkfParams<T> {
    /// Primary spread parameter, must be positive.
    pub alpha: T,
    /// Distribution parameter; 2 is optimal for Gaussian priors.
    pub beta: T,
    /// Secondary scaling parameter.
    pub kappa: T,
}

impl<T: RealField + Float + Copy> Default for UkfParams<T> {
    fn default() -> Self {
        Self {
            alpha: T::from_f64(1e-3).unwrap(),
            beta: T::from_f64(2.0).unwrap(),
            kappa: T::zero(),
        }
    }
}

impl<T: RealField + Float + Copy> UkfParams<T> {
    /// Creates UKF parameters.
    ///
    /// # Panics
    /// Panics if `alpha` is not positive.
    pub fn new(alpha: T, beta: T, kappa: T) -> Self {
        assert!(alpha > T::zero(), "alpha must be positive");
        Self { alpha, beta, kappa }
    }

    #[inline]
    fn lambda(&self) -> T {
        let n = T::from_usize(STATE_DIM).unwrap();
        self.alpha * self.alpha * (n + self.kappa) - n
    }

    /// γ = √(n + λ), the sigma point scaling factor.
    #[inline]
    fn gamma(&self) -> T {
        let n = T::from_usize(STATE_DIM).unwrap();
        Float::sqrt(n + self.lambda())
    }

    /// Mean weight of the central sigma point.
    #[inline]
    pub fn weight_mean_0(&self) -> T {
        let n = T::from_usize(STATE_DIM).unwrap();
        self.lambda() / (n + self.lambda())
    }

    /// Covariance weight of the central sigma point.
    #[inline]
    pub fn weight_cov_0(&self) -> T {
        self.weight_mean_0() + (T::one() - self.alpha * self.alpha + self.beta)
    }

    /// Weight shared by the non-central sigma points.
    #[inline]
    pub fn weight_i(&self) -> T {
        let n = T::from_usize(STATE_DIM).unwrap();
        let two = T::from_f64(2.0).unwrap();
        T::one() / (two * (n + self.lambda()))
    }
}

// ============================================================================
// Sigma Points
// ============================================================================

/// The 2n+1 sigma points of a state distribution, with their weights.
#[derive(Debug, Clone)]
pub struct SigmaPoints<T: RealField> {
    pub points: [TrackState<T>; SIGMA_COUNT],
    pub weight_mean_0: T,
    pub weight_cov_0: T,
    pub weight_i: T,
}

impl<T: RealField + Float + Copy> SigmaPoints<T> {
    /// Generates sigma points via the symmetric selection
    /// χ₀ = μ, χᵢ = μ ± γ·column_i(√P).
    ///
    /// Returns `None` when the covariance is not positive definite.
    pub fn generate(
        mean: &TrackState<T>,
        cov: &TrackStateCov<T>,
        params: &UkfParams<T>,
    ) -> Option<Self> {
        let sqrt_p = cov.cholesky()?;
        let scaled = sqrt_p.scale(params.gamma());

        let mut points = [*mean; SIGMA_COUNT];
        for i in 0..STATE_DIM {
            let col: SVector<T, STATE_DIM> = scaled.column(i).into_owned();
            points[1 + 2 * i] = StateVector::from_svector(mean.as_svector() + col);
            points[2 + 2 * i] = StateVector::from_svector(mean.as_svector() - col);
        }

        Some(Self {
            points,
            weight_mean_0: params.weight_mean_0(),
            weight_cov_0: params.weight_cov_0(),
            weight_i: params.weight_i(),
        })
    }

    #[inline]
    fn cov_weight(&self, i: usize) -> T {
        if i == 0 {
            self.weight_cov_0
        } else {
            self.weight_i
        }
    }
}

// ============================================================================
// Per-Model Filter
// ============================================================================

/// One UKF of the IMM bank: state estimate plus the measurement-prediction
/// quantities the PDA step consumes.
#[derive(Debug, Clone)]
pub struct ModelFilter<T: RealField> {
    /// The motion hypothesis this filter runs.
    pub model: MotionModel,
    /// State estimate (posterior, or prediction between predict and update).
    pub x: TrackState<T>,
    /// State covariance.
    pub p: TrackStateCov<T>,
    /// Predicted measurement ẑ = E[h(x)].
    pub z_pred: PosMeasurement<T>,
    /// Innovation covariance S.
    pub s: PosMeasurementCov<T>,
    /// Kalman gain K = T·S⁻¹.
    pub k: TrackGain<T>,
}

impl<T: RealField + Float + Copy> ModelFilter<T> {
    /// Creates a filter at an initial estimate; the measurement-prediction
    /// fields stay zero until the first predict.
    pub fn new(model: MotionModel, x: TrackState<T>, p: TrackStateCov<T>) -> Self {
        Self {
            model,
            x,
            p,
            z_pred: Measurement::zeros(),
            s: PosMeasurementCov::zeros(),
            k: TrackGain::zeros(),
        }
    }

    /// UKF prediction plus measurement prediction.
    ///
    /// Propagates sigma points through the motion model with additive
    /// process noise, then re-generates sigma points on the predicted
    /// distribution and maps them through the sensor model to obtain
    /// `z_pred`, `S` and `K`. Returns `None` on a failed factorization or a
    /// singular innovation covariance.
    pub fn predict(
        &mut self,
        dt: T,
        noise: &ProcessNoise<T>,
        sensor: &PositionSensor<T>,
        params: &UkfParams<T>,
    ) -> Option<()> {
        let sigma = SigmaPoints::generate(&self.x, &self.p, params)?;

        // Propagate through the process function.
        let mut propagated = sigma.points;
        for point in propagated.iter_mut() {
            *point = self.model.propagate(point, dt);
        }

        // Predicted mean.
        let mut x_pred: SVector<T, STATE_DIM> =
            propagated[0].as_svector().scale(sigma.weight_mean_0);
        for point in propagated.iter().skip(1) {
            x_pred += point.as_svector().scale(sigma.weight_i);
        }
        x_pred[3] = normalize_yaw(x_pred[3]);

        // Predicted covariance, with angle-aware yaw residuals.
        let mut p_pred: SMatrix<T, STATE_DIM, STATE_DIM> = SMatrix::zeros();
        for (i, point) in propagated.iter().enumerate() {
            let mut diff = point.as_svector() - x_pred;
            diff[3] = normalize_yaw(diff[3]);
            p_pred += (diff * diff.transpose()).scale(sigma.cov_weight(i));
        }
        p_pred += noise.covariance(dt).as_matrix();

        let x_pred = StateVector::from_svector(x_pred);
        let p_pred = TrackStateCov::from_matrix(p_pred);

        // Measurement prediction on the predicted distribution.
        let sigma_pred = SigmaPoints::generate(&x_pred, &p_pred, params)?;

        let mut z_points: [PosMeasurement<T>; SIGMA_COUNT] = [Measurement::zeros(); SIGMA_COUNT];
        for (z, point) in z_points.iter_mut().zip(sigma_pred.points.iter()) {
            *z = sensor.observe(point);
        }

        let mut z_pred: SVector<T, MEAS_DIM> =
            z_points[0].as_svector().scale(sigma_pred.weight_mean_0);
        for z in z_points.iter().skip(1) {
            z_pred += z.as_svector().scale(sigma_pred.weight_i);
        }

        let mut s: SMatrix<T, MEAS_DIM, MEAS_DIM> = SMatrix::zeros();
        let mut cross: SMatrix<T, STATE_DIM, MEAS_DIM> = SMatrix::zeros();
        for (i, (point, z)) in sigma_pred.points.iter().zip(z_points.iter()).enumerate() {
            let z_diff = z.as_svector() - z_pred;
            let mut x_diff = point.as_svector() - x_pred.as_svector();
            x_diff[3] = normalize_yaw(x_diff[3]);

            let w = sigma_pred.cov_weight(i);
            s += (z_diff * z_diff.transpose()).scale(w);
            cross += (x_diff * z_diff.transpose()).scale(w);
        }
        s += sensor.measurement_noise().as_matrix();

        let s_inv = s.try_inverse()?;
        let k = cross * s_inv;

        self.x = x_pred;
        self.p = p_pred;
        self.z_pred = Measurement::from_svector(z_pred);
        self.s = PosMeasurementCov::from_matrix(s);
        self.k = TrackGain::from_matrix(k);
        Some(())
    }

    /// Residual of a measurement against the predicted measurement.
    #[inline]
    pub fn innovation(&self, z: &PosMeasurement<T>) -> PosInnovation<T> {
        z.innovation(self.z_pred)
    }

    /// Applies a (possibly association-combined) innovation through the
    /// Kalman gain: `x ← x + K·ν`, yaw re-normalized.
    pub fn apply_correction(&mut self, combined_innovation: &PosInnovation<T>) {
        let mut x = self.x.as_svector() + self.k.correct(combined_innovation).as_svector();
        x[3] = normalize_yaw(x[3]);
        self.x = StateVector::from_svector(x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_sensor() -> PositionSensor<f64> {
        PositionSensor::new(0.15, 0.15)
    }

    fn default_noise() -> ProcessNoise<f64> {
        ProcessNoise::new(2.0, 2.0)
    }

    #[test]
    fn test_weights_sum_to_one() {
        let params: UkfParams<f64> = UkfParams::default();
        let sum = params.weight_mean_0() + 2.0 * STATE_DIM as f64 * params.weight_i();
        assert!((sum - 1.0).abs() < 1e-6, "mean weights sum to {}", sum);
    }

    #[test]
    fn test_sigma_point_generation() {
        let mean = StateVector::from_array([1.0, 2.0, 3.0, 0.1, 0.0]);
        let cov = TrackStateCov::identity();
        let params = UkfParams::default();

        let sigma = SigmaPoints::generate(&mean, &cov, &params).unwrap();

        for i in 0..STATE_DIM {
            assert!((sigma.points[0].index(i) - mean.index(i)).abs() < 1e-12);
        }
        // Symmetric pairs around the mean.
        for i in 0..STATE_DIM {
            let plus = sigma.points[1 + 2 * i].as_svector();
            let minus = sigma.points[2 + 2 * i].as_svector();
            let mid = (plus + minus).scale(0.5);
            for j in 0..STATE_DIM {
                assert!((mid[j] - mean.index(j)).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_sigma_generation_rejects_indefinite() {
        let mean = StateVector::from_array([0.0; STATE_DIM]);
        let mut m = nalgebra::SMatrix::<f64, STATE_DIM, STATE_DIM>::identity();
        m[(0, 0)] = -1.0;
        let cov = TrackStateCov::from_matrix(m);

        assert!(SigmaPoints::generate(&mean, &cov, &UkfParams::default()).is_none());
    }

    #[test]
    fn test_predict_stationary_cv() {
        let x = StateVector::from_array([10.0, -5.0, 0.0, 0.0, 0.0]);
        let p = TrackStateCov::from_diagonal(&nalgebra::vector![0.5, 0.5, 3.0, 10.0, 1.0]);
        let mut filter = ModelFilter::new(MotionModel::Cv, x, p);

        filter
            .predict(0.1, &default_noise(), &default_sensor(), &UkfParams::default())
            .unwrap();

        // Zero velocity: position holds, predicted measurement matches it.
        assert!((filter.x.index(0) - 10.0).abs() < 1e-6);
        assert!((filter.x.index(1) + 5.0).abs() < 1e-6);
        assert!((filter.z_pred.index(0) - 10.0).abs() < 1e-6);
        assert!((filter.z_pred.index(1) + 5.0).abs() < 1e-6);

        // S inherits position uncertainty plus R, so it dominates R alone.
        assert!(filter.s.as_matrix()[(0, 0)] > 0.0225);
    }

    #[test]
    fn test_predict_moves_with_velocity() {
        let x = StateVector::from_array([0.0, 0.0, 10.0, 0.0, 0.0]);
        let p = TrackStateCov::from_diagonal(&nalgebra::vector![0.5, 0.5, 1.0, 0.1, 0.1]);
        let mut filter = ModelFilter::new(MotionModel::Cv, x, p);

        filter
            .predict(1.0, &default_noise(), &default_sensor(), &UkfParams::default())
            .unwrap();

        assert!(
            (filter.x.index(0) - 10.0).abs() < 0.5,
            "px = {}",
            filter.x.index(0)
        );
        assert!(filter.x.index(1).abs() < 0.5);
    }

    #[test]
    fn test_predict_covariance_symmetric() {
        let x = StateVector::from_array([1.0, 1.0, 2.0, 0.4, 0.1]);
        let p = TrackStateCov::from_diagonal(&nalgebra::vector![0.5, 0.5, 3.0, 10.0, 1.0]);
        let mut filter = ModelFilter::new(MotionModel::Ctrv, x, p);

        filter
            .predict(0.1, &default_noise(), &default_sensor(), &UkfParams::default())
            .unwrap();

        let m = filter.p.as_matrix();
        for i in 0..STATE_DIM {
            for j in 0..STATE_DIM {
                assert!((m[(i, j)] - m[(j, i)]).abs() < 1e-9);
            }
        }
        let s = filter.s.as_matrix();
        assert!((s[(0, 1)] - s[(1, 0)]).abs() < 1e-9);
    }

    #[test]
    fn test_correction_pulls_toward_measurement() {
        let x = StateVector::from_array([0.0, 0.0, 0.0, 0.0, 0.0]);
        let p = TrackStateCov::from_diagonal(&nalgebra::vector![2.0, 2.0, 1.0, 0.5, 0.1]);
        let mut filter = ModelFilter::new(MotionModel::Cv, x, p);

        filter
            .predict(0.1, &default_noise(), &default_sensor(), &UkfParams::default())
            .unwrap();

        let z = Measurement::from_array([1.0, 0.5]);
        let nu = filter.innovation(&z);
        filter.apply_correction(&nu);

        assert!(*filter.x.index(0) > 0.5, "px = {}", filter.x.index(0));
        assert!(*filter.x.index(1) > 0.25, "py = {}", filter.x.index(1));
    }
}
