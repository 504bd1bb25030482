//! Gating and Probabilistic Data Association
//!
//! Per track and frame: select the widest gate among the three model
//! ellipses (max determinant of S), gate detections by squared Mahalanobis
//! distance, and fold every gated measurement into each model's update with
//! association probabilities. Measurements may fall into several tracks'
//! gates; the claimed vector only controls lifetime accounting, second-init
//! selection and new-track spawning.

use nalgebra::RealField;
use num_traits::Float;

use crate::config::TrackerConfig;
use crate::filters::imm::ImmBank;
use crate::models::MODEL_COUNT;
use crate::types::objects::Detection;
use crate::types::spaces::{PosMeasurement, PosMeasurementCov, MEAS_DIM};

/// The measurement prediction chosen for gating: the model with the largest
/// innovation-covariance determinant, i.e. the widest uncertainty ellipse.
/// Gating with the widest ellipse avoids pruning measurements a narrower
/// model would still accept.
#[derive(Debug, Clone)]
pub struct GateSelection<T: RealField> {
    pub z_pred: PosMeasurement<T>,
    pub s: PosMeasurementCov<T>,
    /// Raw determinant of S; may be NaN when the filter diverged.
    pub det_s: T,
}

/// Raw 2×2 determinant, NaN and negative values preserved so divergence
/// checks can see them.
#[inline]
fn det2<T: RealField + Copy>(m: &PosMeasurementCov<T>) -> T {
    let m = m.as_matrix();
    m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)]
}

/// Picks the widest gate over the bank's three models.
pub fn widest_gate<T: RealField + Float + Copy>(bank: &ImmBank<T>) -> GateSelection<T> {
    let mut best = 0;
    let mut best_det = det2(&bank.filters()[0].s);
    for (j, filter) in bank.filters().iter().enumerate().skip(1) {
        let det = det2(&filter.s);
        if det > best_det {
            best = j;
            best_det = det;
        }
    }

    let filter = &bank.filters()[best];
    GateSelection {
        z_pred: filter.z_pred,
        s: filter.s,
        det_s: best_det,
    }
}

/// Result of gating one track against the frame's detections.
#[derive(Debug, Clone, Default)]
pub struct Gated {
    /// Indices into the detection slice, in scan order (second-init mode
    /// yields at most the single best index).
    pub indices: Vec<usize>,
    /// Gated detections that no earlier track had claimed; each one adds a
    /// frame to the track's lifetime.
    pub fresh_hits: u32,
}

/// Gates detections against a track's widest gate.
///
/// In normal mode every detection inside the gate is collected and claimed.
/// In second-init mode (`second_init`) the still-unclaimed detection with
/// the smallest squared Mahalanobis distance is selected and claimed; it
/// will seed the track's velocity and heading, and skipping claimed
/// detections keeps a measurement from seeding two candidate tracks in the
/// same frame. Lifetime accounting is first-come in both modes: only
/// detections still unclaimed count.
///
/// Returns `None` when S is singular, which the caller treats as
/// divergence.
pub fn gate_detections<T: RealField + Float + Copy>(
    detections: &[Detection<T>],
    gate: &GateSelection<T>,
    second_init: bool,
    gating_thres: T,
    claimed: &mut [bool],
) -> Option<Gated> {
    debug_assert_eq!(detections.len(), claimed.len());

    let s_inv = gate.s.try_inverse()?;
    let mut gated = Gated::default();

    let mut best: Option<(usize, T)> = None;
    for (i, detection) in detections.iter().enumerate() {
        let nu = detection.position_measurement().as_svector() - gate.z_pred.as_svector();
        let d2 = (nu.transpose() * s_inv.as_matrix() * nu)[(0, 0)];
        // The positive comparison also rejects NaN distances.
        let inside = d2 < gating_thres;
        if !inside {
            continue;
        }

        if !claimed[i] {
            gated.fresh_hits += 1;
        }
        if second_init {
            if !claimed[i] && best.map_or(true, |(_, best_d2)| d2 < best_d2) {
                best = Some((i, d2));
            }
        } else {
            claimed[i] = true;
            gated.indices.push(i);
        }
    }

    if let Some((i, _)) = best {
        claimed[i] = true;
        gated.indices.push(i);
    }
    Some(gated)
}

/// Shared-measurement PDA update over all three models.
///
/// For each model j and gated measurement i, with ν_i = z_i − ẑ_j:
/// e_ji = exp(−½·ν_iᵀ·S_j⁻¹·ν_i), β_j0 = b/(b + Σe), β_ji = e_ji/(b + Σe),
/// combined innovation σ_x = Σ β_ji·ν_i and spread
/// σ_P = Σ (β_ji·ν_i·ν_iᵀ − σ_x·σ_xᵀ). The state moves by K·σ_x; the
/// covariance blends the no-association and updated covariances by β_j0 and
/// adds the association spread. With an empty gate the covariance contracts
/// by the standard K·S·Kᵀ term and the state is unchanged.
///
/// Returns the per-model likelihoods λ_j feeding the IMM mode update, or
/// `None` when an innovation covariance is singular.
pub fn pda_update<T: RealField + Float + Copy>(
    bank: &mut ImmBank<T>,
    measurements: &[PosMeasurement<T>],
    gate: &GateSelection<T>,
    config: &TrackerConfig<T>,
) -> Option<[T; MODEL_COUNT]> {
    let num_meas = measurements.len();
    let m_t = T::from_usize(num_meas).unwrap();
    let p_d = config.detection_probability;
    let p_g = config.gate_probability;
    let two = T::from_f64(2.0).unwrap();
    let half = T::from_f64(0.5).unwrap();

    // Non-association weight: grows with the gated count, shrinks with the
    // confidence that a real detection falls inside the gate.
    let b = two * m_t * (T::one() - p_d * p_g) / (config.gating_thres * p_d);

    // Gate volume from the widest ellipse, shared across models.
    let v_k = T::pi() * Float::sqrt(config.gating_thres * gate.det_s);

    let mut lambdas = [T::zero(); MODEL_COUNT];

    for j in 0..MODEL_COUNT {
        let (z_pred, s) = {
            let filter = &bank.filters()[j];
            (filter.z_pred, filter.s)
        };
        let s_inv = s.try_inverse()?;

        let mut diffs: Vec<nalgebra::SVector<T, MEAS_DIM>> = Vec::with_capacity(num_meas);
        let mut weights: Vec<T> = Vec::with_capacity(num_meas);
        let mut e_sum = T::zero();
        for z in measurements {
            let nu = z.as_svector() - z_pred.as_svector();
            let d2 = (nu.transpose() * s_inv.as_matrix() * nu)[(0, 0)];
            let e = Float::exp(-half * d2);
            diffs.push(nu);
            weights.push(e);
            e_sum += e;
        }

        let beta_zero = b / (b + e_sum);

        let mut sigma_x: nalgebra::SVector<T, MEAS_DIM> = nalgebra::SVector::zeros();
        for (nu, &e) in diffs.iter().zip(weights.iter()) {
            sigma_x += nu.scale(e / (b + e_sum));
        }

        let mut sigma_p: nalgebra::SMatrix<T, MEAS_DIM, MEAS_DIM> = nalgebra::SMatrix::zeros();
        for (nu, &e) in diffs.iter().zip(weights.iter()) {
            let beta = e / (b + e_sum);
            sigma_p += (nu * nu.transpose()).scale(beta) - sigma_x * sigma_x.transpose();
        }

        let filter = &mut bank.filters_mut()[j];
        let p_old = *filter.p.as_matrix();
        let k = *filter.k.as_matrix();
        let s_m = *s.as_matrix();

        filter.apply_correction(&crate::types::spaces::Innovation::from_svector(sigma_x));

        let contracted = p_old - k * s_m * k.transpose();
        let p_new = if num_meas > 0 {
            p_old.scale(beta_zero)
                + contracted.scale(T::one() - beta_zero)
                + k * sigma_p * k.transpose()
        } else {
            contracted
        };
        filter.p = crate::types::spaces::TrackStateCov::from_matrix(p_new);

        // Per-model likelihood for the IMM mode update.
        let miss_term = (T::one() - p_g * p_d) / Float::powi(v_k, num_meas as i32);
        lambdas[j] = if num_meas > 0 {
            let det_s = det2(&s);
            let norm = m_t * Float::sqrt(two * T::pi() * det_s);
            miss_term + p_d * Float::powi(v_k, 1 - num_meas as i32) * e_sum / norm
        } else {
            miss_term
        };
    }

    Some(lambdas)
}
