//! Interacting Multiple Model bank
//!
//! Three [`ModelFilter`]s (CV, CTRV, RM) estimate the same object under
//! different motion hypotheses. Each frame the bank
//!
//! 1. mixes the per-model posteriors into per-model initial conditions
//!    using the Markov mode-transition matrix,
//! 2. runs every filter's UKF predict, and
//! 3. once the association step has produced per-model likelihoods,
//!    re-weights the mode probabilities and merges the filters into the
//!    combined estimate `(x_merge, P_merge)`.
//!
//! The mixing normalizations c_j are kept between phases because the mode
//! update needs them.

use nalgebra::{RealField, SMatrix, SVector};
use num_traits::Float;

use crate::filters::ukf::{ModelFilter, UkfParams};
use crate::models::{normalize_yaw, MotionModel, PositionSensor, ProcessNoise, MODEL_COUNT};
use crate::types::spaces::{PosMeasurement, StateVector, TrackState, TrackStateCov, STATE_DIM};

/// Row-stochastic Markov matrix over the motion models; entry `[i][j]` is
/// the probability of switching from model `i` to model `j`.
pub type ModeTransition<T> = [[T; MODEL_COUNT]; MODEL_COUNT];

/// The per-track IMM filter bank.
#[derive(Debug, Clone)]
pub struct ImmBank<T: RealField> {
    filters: [ModelFilter<T>; MODEL_COUNT],
    mode_prob: [T; MODEL_COUNT],
    /// Mixing normalizations c_j = Σ_i Π_ij·μ_i from the last mixing step.
    mixing_norm: [T; MODEL_COUNT],
    x_merge: TrackState<T>,
    p_merge: TrackStateCov<T>,
}

impl<T: RealField + Float + Copy> ImmBank<T> {
    /// Creates a bank at a first position measurement: zero velocity, zero
    /// heading, uniform mode probabilities.
    pub fn new(init: &PosMeasurement<T>, init_cov_diag: &[T; STATE_DIM]) -> Self {
        let x0: TrackState<T> = StateVector::from_array([
            *init.index(0),
            *init.index(1),
            T::zero(),
            T::zero(),
            T::zero(),
        ]);
        let p0 = TrackStateCov::from_diagonal(&SVector::from(*init_cov_diag));
        let uniform = T::one() / T::from_usize(MODEL_COUNT).unwrap();

        Self {
            filters: [
                ModelFilter::new(MotionModel::Cv, x0, p0.clone()),
                ModelFilter::new(MotionModel::Ctrv, x0, p0.clone()),
                ModelFilter::new(MotionModel::Rm, x0, p0),
            ],
            mode_prob: [uniform; MODEL_COUNT],
            mixing_norm: [uniform; MODEL_COUNT],
            x_merge: x0,
            p_merge: TrackStateCov::from_diagonal(&SVector::from(*init_cov_diag)),
        }
    }

    /// The filters in bank order (CV, CTRV, RM).
    #[inline]
    pub fn filters(&self) -> &[ModelFilter<T>; MODEL_COUNT] {
        &self.filters
    }

    /// Mutable access for the association update.
    #[inline]
    pub fn filters_mut(&mut self) -> &mut [ModelFilter<T>; MODEL_COUNT] {
        &mut self.filters
    }

    /// One filter by model tag.
    #[inline]
    pub fn filter(&self, model: MotionModel) -> &ModelFilter<T> {
        &self.filters[model.index()]
    }

    /// Current mode probability of one model.
    #[inline]
    pub fn mode_probability(&self, model: MotionModel) -> T {
        self.mode_prob[model.index()]
    }

    /// The full mode distribution.
    #[inline]
    pub fn mode_probabilities(&self) -> &[T; MODEL_COUNT] {
        &self.mode_prob
    }

    /// Combined state estimate.
    #[inline]
    pub fn x_merge(&self) -> &TrackState<T> {
        &self.x_merge
    }

    /// Combined covariance.
    #[inline]
    pub fn p_merge(&self) -> &TrackStateCov<T> {
        &self.p_merge
    }

    /// Merged planar position.
    #[inline]
    pub fn position(&self) -> (T, T) {
        (*self.x_merge.index(0), *self.x_merge.index(1))
    }

    /// Merged speed estimate.
    #[inline]
    pub fn speed(&self) -> T {
        *self.x_merge.index(2)
    }

    /// Merged heading estimate.
    #[inline]
    pub fn heading(&self) -> T {
        *self.x_merge.index(3)
    }

    /// Mixes the per-model posteriors into per-model initial conditions.
    ///
    /// For each destination model j:
    /// μ_i|j = Π_ij·μ_i / c_j,
    /// x0_j = Σ_i μ_i|j·x_i,
    /// P0_j = Σ_i μ_i|j·(P_i + (x_i − x0_j)(x_i − x0_j)ᵀ).
    fn mix(&mut self, pi: &ModeTransition<T>) {
        let x: [SVector<T, STATE_DIM>; MODEL_COUNT] = [
            *self.filters[0].x.as_svector(),
            *self.filters[1].x.as_svector(),
            *self.filters[2].x.as_svector(),
        ];
        let p: [SMatrix<T, STATE_DIM, STATE_DIM>; MODEL_COUNT] = [
            *self.filters[0].p.as_matrix(),
            *self.filters[1].p.as_matrix(),
            *self.filters[2].p.as_matrix(),
        ];
        let mu = self.mode_prob;

        for j in 0..MODEL_COUNT {
            let mut c_j = T::zero();
            for i in 0..MODEL_COUNT {
                c_j += pi[i][j] * mu[i];
            }
            self.mixing_norm[j] = c_j;

            let mut x0: SVector<T, STATE_DIM> = SVector::zeros();
            for i in 0..MODEL_COUNT {
                x0 += x[i].scale(pi[i][j] * mu[i] / c_j);
            }
            x0[3] = normalize_yaw(x0[3]);

            let mut p0: SMatrix<T, STATE_DIM, STATE_DIM> = SMatrix::zeros();
            for i in 0..MODEL_COUNT {
                let mut diff = x[i] - x0;
                diff[3] = normalize_yaw(diff[3]);
                p0 += (p[i] + diff * diff.transpose()).scale(pi[i][j] * mu[i] / c_j);
            }

            self.filters[j].x = StateVector::from_svector(x0);
            self.filters[j].p = TrackStateCov::from_matrix(p0);
        }
    }

    /// IMM prediction: mixing followed by every filter's UKF predict.
    ///
    /// Returns `None` when any filter's factorization fails; the caller
    /// retires the track.
    pub fn predict(
        &mut self,
        dt: T,
        pi: &ModeTransition<T>,
        noises: &[ProcessNoise<T>; MODEL_COUNT],
        sensor: &PositionSensor<T>,
        params: &UkfParams<T>,
    ) -> Option<()> {
        self.mix(pi);
        for filter in self.filters.iter_mut() {
            let noise = noises[filter.model.index()];
            filter.predict(dt, &noise, sensor, params)?;
        }
        Some(())
    }

    /// Mode-probability update: μ_j ← λ_j·c_j / Σ_k λ_k·c_k.
    ///
    /// Returns `false` when the normalization is non-finite or non-positive;
    /// the distribution is left untouched in that case and the caller
    /// retires the track.
    #[must_use]
    pub fn update_mode_probabilities(&mut self, lambdas: &[T; MODEL_COUNT]) -> bool {
        let mut weights = [T::zero(); MODEL_COUNT];
        let mut sum = T::zero();
        for j in 0..MODEL_COUNT {
            weights[j] = lambdas[j] * self.mixing_norm[j];
            sum += weights[j];
        }

        if !Float::is_finite(sum) || sum <= T::zero() {
            return false;
        }
        for j in 0..MODEL_COUNT {
            self.mode_prob[j] = weights[j] / sum;
        }
        true
    }

    /// Combines the per-model estimates into `(x_merge, P_merge)`.
    pub fn merge(&mut self) {
        let mut x: SVector<T, STATE_DIM> = SVector::zeros();
        for j in 0..MODEL_COUNT {
            x += self.filters[j].x.as_svector().scale(self.mode_prob[j]);
        }
        x[3] = normalize_yaw(x[3]);

        let mut p: SMatrix<T, STATE_DIM, STATE_DIM> = SMatrix::zeros();
        for j in 0..MODEL_COUNT {
            let mut diff = self.filters[j].x.as_svector() - x;
            diff[3] = normalize_yaw(diff[3]);
            p += (self.filters[j].p.as_matrix() + diff * diff.transpose()).scale(self.mode_prob[j]);
        }

        self.x_merge = StateVector::from_svector(x);
        self.p_merge = TrackStateCov::from_matrix(p);
    }

    /// Second-init seeding: overwrites position, speed and heading of every
    /// filter and of the merged state, leaving yaw rate untouched.
    pub fn seed_kinematics(&mut self, px: T, py: T, v: T, yaw: T) {
        let yaw = normalize_yaw(yaw);
        for filter in self.filters.iter_mut() {
            let mut x = *filter.x.as_svector();
            x[0] = px;
            x[1] = py;
            x[2] = v;
            x[3] = yaw;
            filter.x = StateVector::from_svector(x);
        }
        let mut x = *self.x_merge.as_svector();
        x[0] = px;
        x[1] = py;
        x[2] = v;
        x[3] = yaw;
        self.x_merge = StateVector::from_svector(x);
    }

    /// Overwrites the merged covariance. Only used by divergence tests and
    /// diagnostics; the bank maintains it everywhere else.
    pub fn set_p_merge(&mut self, p: TrackStateCov<T>) {
        self.p_merge = p;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::spaces::Measurement;

    const INIT_DIAG: [f64; STATE_DIM] = [0.5, 0.5, 3.0, 10.0, 1.0];

    fn self_transition() -> ModeTransition<f64> {
        [
            [0.9, 0.05, 0.05],
            [0.05, 0.9, 0.05],
            [0.05, 0.05, 0.9],
        ]
    }

    fn noises() -> [ProcessNoise<f64>; MODEL_COUNT] {
        [
            ProcessNoise::new(2.0, 2.0),
            ProcessNoise::new(2.0, 2.0),
            ProcessNoise::new(3.0, 3.0),
        ]
    }

    fn make_bank(x: f64, y: f64) -> ImmBank<f64> {
        ImmBank::new(&Measurement::from_array([x, y]), &INIT_DIAG)
    }

    #[test]
    fn test_new_bank_uniform_modes() {
        let bank = make_bank(10.0, -2.0);

        let sum: f64 = bank.mode_probabilities().iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        for &mu in bank.mode_probabilities() {
            assert!((mu - 1.0 / 3.0).abs() < 1e-12);
        }
        assert!((bank.position().0 - 10.0).abs() < 1e-12);
        assert!((bank.position().1 + 2.0).abs() < 1e-12);
        assert!(bank.speed().abs() < 1e-12);
    }

    #[test]
    fn test_mix_identical_states_is_identity() {
        let mut bank = make_bank(1.0, 2.0);
        bank.mix(&self_transition());

        // All filters start identical, so mixing must not move them.
        for filter in bank.filters() {
            assert!((filter.x.index(0) - 1.0).abs() < 1e-10);
            assert!((filter.x.index(1) - 2.0).abs() < 1e-10);
            let p = filter.p.as_matrix();
            assert!((p[(0, 0)] - 0.5).abs() < 1e-10);
            assert!((p[(2, 2)] - 3.0).abs() < 1e-10);
        }
        let c: f64 = bank.mixing_norm.iter().sum();
        assert!((c - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_predict_fills_measurement_prediction() {
        let mut bank = make_bank(5.0, 5.0);
        bank.predict(
            0.1,
            &self_transition(),
            &noises(),
            &PositionSensor::new(0.15, 0.15),
            &UkfParams::default(),
        )
        .unwrap();

        for filter in bank.filters() {
            assert!((filter.z_pred.index(0) - 5.0).abs() < 0.1);
            assert!((filter.z_pred.index(1) - 5.0).abs() < 0.1);
            assert!(filter.s.as_matrix()[(0, 0)] > 0.0);
        }
    }

    #[test]
    fn test_mode_update_normalizes() {
        let mut bank = make_bank(0.0, 0.0);
        bank.mix(&self_transition());

        assert!(bank.update_mode_probabilities(&[2.0, 1.0, 1.0]));
        let mu = bank.mode_probabilities();
        let sum: f64 = mu.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert!(mu[0] > mu[1]);
        assert!((mu[1] - mu[2]).abs() < 1e-12);
    }

    #[test]
    fn test_mode_update_rejects_degenerate() {
        let mut bank = make_bank(0.0, 0.0);
        bank.mix(&self_transition());

        let before = *bank.mode_probabilities();
        assert!(!bank.update_mode_probabilities(&[0.0, 0.0, 0.0]));
        assert!(!bank.update_mode_probabilities(&[f64::NAN, 1.0, 1.0]));
        assert_eq!(before, *bank.mode_probabilities());
    }

    #[test]
    fn test_merge_identical_states() {
        let mut bank = make_bank(3.0, 4.0);
        bank.merge();

        assert!((bank.position().0 - 3.0).abs() < 1e-10);
        assert!((bank.position().1 - 4.0).abs() < 1e-10);
        // Identical filters: merged covariance equals the per-model one.
        assert!((bank.p_merge().as_matrix()[(0, 0)] - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_seed_kinematics() {
        let mut bank = make_bank(0.0, 0.0);
        bank.seed_kinematics(1.0, 2.0, 3.0, 0.5);

        for filter in bank.filters() {
            assert!((filter.x.index(0) - 1.0).abs() < 1e-12);
            assert!((filter.x.index(2) - 3.0).abs() < 1e-12);
            assert!((filter.x.index(3) - 0.5).abs() < 1e-12);
        }
        assert!((bank.speed() - 3.0).abs() < 1e-12);
        assert!((bank.heading() - 0.5).abs() < 1e-12);
    }
}
