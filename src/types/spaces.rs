//! Typed vectors and covariances for the track state and measurement spaces
//!
//! Vectors are tagged with a phantom space marker so a 2-D position
//! measurement can never be added to a 5-D kinematic state, and an
//! innovation (measurement residual) is a distinct type from a raw
//! measurement. The Kalman gain is the only cross-space map the tracker
//! needs: it carries innovations into state corrections.

use core::marker::PhantomData;
use core::ops::{Add, Sub};

use nalgebra::{RealField, SMatrix, SVector, Scalar};

/// Dimension of the kinematic track state `[px, py, v, yaw, yaw_rate]`.
pub const STATE_DIM: usize = 5;

/// Dimension of a position measurement `[px, py]`.
pub const MEAS_DIM: usize = 2;

// ============================================================================
// Space Markers
// ============================================================================

/// Marker for the kinematic state space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSpace;

/// Marker for the sensor measurement space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementSpace;

/// Marker for innovations (measurement minus predicted measurement).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InnovationSpace;

// ============================================================================
// Typed Vector
// ============================================================================

/// A fixed-size vector bound to one mathematical space.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Vector<T: Scalar, const N: usize, Space> {
    inner: SVector<T, N>,
    _marker: PhantomData<Space>,
}

impl<T: Scalar, const N: usize, Space> Vector<T, N, Space> {
    /// Creates a vector from raw components.
    #[inline]
    pub fn from_array(data: [T; N]) -> Self {
        Self {
            inner: SVector::from(data),
            _marker: PhantomData,
        }
    }

    /// Wraps an nalgebra vector.
    #[inline]
    pub fn from_svector(inner: SVector<T, N>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Returns the underlying nalgebra vector.
    #[inline]
    pub fn as_svector(&self) -> &SVector<T, N> {
        &self.inner
    }

    /// Consumes self and returns the underlying nalgebra vector.
    #[inline]
    pub fn into_svector(self) -> SVector<T, N> {
        self.inner
    }

    /// Component access.
    ///
    /// # Panics
    /// Panics if `index >= N`.
    #[inline]
    #[allow(clippy::should_implement_trait)]
    pub fn index(&self, index: usize) -> &T {
        &self.inner[index]
    }
}

impl<T: Scalar + Copy, const N: usize, Space: Clone> Copy for Vector<T, N, Space> {}

impl<T: RealField + Copy, const N: usize, Space> Vector<T, N, Space> {
    /// The zero vector.
    #[inline]
    pub fn zeros() -> Self {
        Self::from_svector(SVector::zeros())
    }

    /// Euclidean norm.
    #[inline]
    pub fn norm(&self) -> T {
        self.inner.norm()
    }

    /// Scales every component.
    #[inline]
    pub fn scale(&self, s: T) -> Self {
        Self::from_svector(self.inner.scale(s))
    }
}

impl<T: RealField + Copy, const N: usize, Space> Add for Vector<T, N, Space> {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::from_svector(self.inner + rhs.inner)
    }
}

impl<T: RealField + Copy, const N: usize, Space> Sub for Vector<T, N, Space> {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::from_svector(self.inner - rhs.inner)
    }
}

// ============================================================================
// Type Aliases
// ============================================================================

/// A vector in the kinematic state space.
pub type StateVector<T, const N: usize> = Vector<T, N, StateSpace>;

/// A vector in the measurement space.
pub type Measurement<T, const M: usize> = Vector<T, M, MeasurementSpace>;

/// A measurement residual.
pub type Innovation<T, const M: usize> = Vector<T, M, InnovationSpace>;

/// The 5-D track state `[px, py, v, yaw, yaw_rate]`.
pub type TrackState<T> = StateVector<T, STATE_DIM>;

/// A 2-D position measurement.
pub type PosMeasurement<T> = Measurement<T, MEAS_DIM>;

/// A 2-D position innovation.
pub type PosInnovation<T> = Innovation<T, MEAS_DIM>;

// ============================================================================
// Measurement - Measurement = Innovation
// ============================================================================

/// Computes the residual between an observed and a predicted measurement.
///
/// Subtracting two measurements leaves measurement space, so the result
/// is typed as an innovation rather than another measurement.
pub trait ComputeInnovation<T: RealField, const M: usize> {
    fn innovation(self, predicted: Measurement<T, M>) -> Innovation<T, M>;
}

impl<T: RealField + Copy, const M: usize> ComputeInnovation<T, M> for Measurement<T, M> {
    #[inline]
    fn innovation(self, predicted: Measurement<T, M>) -> Innovation<T, M> {
        Innovation::from_svector(self.inner - predicted.inner)
    }
}

// ============================================================================
// Typed Covariance
// ============================================================================

/// A covariance matrix bound to one vector space.
///
/// Construction does not verify symmetry or positive semi-definiteness;
/// the filter maintains those through its update formulas and the tracker
/// retires tracks whose covariances escape them.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Covariance<T: Scalar, const N: usize, Space> {
    inner: SMatrix<T, N, N>,
    _marker: PhantomData<Space>,
}

impl<T: Scalar, const N: usize, Space> Covariance<T, N, Space> {
    /// Wraps a raw matrix.
    #[inline]
    pub fn from_matrix(inner: SMatrix<T, N, N>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Returns the underlying matrix.
    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<T, N, N> {
        &self.inner
    }

    /// Consumes self and returns the underlying matrix.
    #[inline]
    pub fn into_matrix(self) -> SMatrix<T, N, N> {
        self.inner
    }
}

impl<T: Scalar + Copy, const N: usize, Space: Clone> Copy for Covariance<T, N, Space> where
    SMatrix<T, N, N>: Copy
{
}

impl<T: RealField + Copy, const N: usize, Space> Covariance<T, N, Space> {
    /// The zero matrix.
    #[inline]
    pub fn zeros() -> Self {
        Self::from_matrix(SMatrix::zeros())
    }

    /// The identity matrix.
    #[inline]
    pub fn identity() -> Self {
        Self::from_matrix(SMatrix::identity())
    }

    /// A diagonal covariance.
    #[inline]
    pub fn from_diagonal(diag: &SVector<T, N>) -> Self {
        Self::from_matrix(SMatrix::from_diagonal(diag))
    }

    /// Determinant via Cholesky decomposition.
    ///
    /// Returns `None` when the matrix is not positive definite, which the
    /// caller should treat as numerical divergence rather than a zero
    /// determinant.
    #[inline]
    pub fn determinant(&self) -> Option<T> {
        let chol = nalgebra::Cholesky::new(self.inner)?;
        let l = chol.l();
        let mut det_l = T::one();
        for i in 0..N {
            det_l *= l[(i, i)];
        }
        Some(det_l * det_l)
    }

    /// Matrix inverse, `None` if singular.
    #[inline]
    pub fn try_inverse(&self) -> Option<Self> {
        self.inner.try_inverse().map(Self::from_matrix)
    }

    /// Lower-triangular Cholesky factor, `None` if not positive definite.
    #[inline]
    pub fn cholesky(&self) -> Option<SMatrix<T, N, N>> {
        nalgebra::Cholesky::new(self.inner).map(|c| c.l())
    }
}

/// Covariance of a state estimate.
pub type StateCovariance<T, const N: usize> = Covariance<T, N, StateSpace>;

/// Covariance in measurement space (used for the innovation covariance S).
pub type MeasurementCovariance<T, const M: usize> = Covariance<T, M, MeasurementSpace>;

/// Covariance of the 5-D track state.
pub type TrackStateCov<T> = StateCovariance<T, STATE_DIM>;

/// 2-D measurement covariance.
pub type PosMeasurementCov<T> = MeasurementCovariance<T, MEAS_DIM>;

// ============================================================================
// Kalman Gain
// ============================================================================

/// The Kalman gain: a linear map from innovation space into state space.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanGain<T: Scalar, const N: usize, const M: usize> {
    inner: SMatrix<T, N, M>,
    _marker: PhantomData<(StateSpace, InnovationSpace)>,
}

impl<T: Scalar, const N: usize, const M: usize> KalmanGain<T, N, M> {
    /// Wraps a raw gain matrix.
    #[inline]
    pub fn from_matrix(inner: SMatrix<T, N, M>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Returns the underlying matrix.
    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<T, N, M> {
        &self.inner
    }
}

impl<T: Scalar + Copy, const N: usize, const M: usize> Copy for KalmanGain<T, N, M> where
    SMatrix<T, N, M>: Copy
{
}

impl<T: RealField + Copy, const N: usize, const M: usize> KalmanGain<T, N, M> {
    /// The zero gain.
    #[inline]
    pub fn zeros() -> Self {
        Self::from_matrix(SMatrix::zeros())
    }

    /// Maps an innovation to a state correction: `K * y`.
    #[inline]
    pub fn correct(&self, innovation: &Innovation<T, M>) -> StateVector<T, N> {
        StateVector::from_svector(self.inner * innovation.as_svector())
    }
}

/// Gain for the 5-D state / 2-D measurement tracker.
pub type TrackGain<T> = KalmanGain<T, STATE_DIM, MEAS_DIM>;
