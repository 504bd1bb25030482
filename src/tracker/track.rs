//! Per-track state: lifecycle counter and bookkeeping

use std::collections::VecDeque;

use nalgebra::RealField;
use num_traits::Float;

use crate::filters::imm::ImmBank;
use crate::tracker::stabilizer::StabilizedBox;
use crate::types::objects::TrackLabel;
use crate::types::spaces::{Measurement, PosMeasurement, STATE_DIM};

// ============================================================================
// Lifecycle
// ============================================================================

/// Track lifecycle encoded as a small counter.
///
/// Named values: Die = 0, Init = 1, Stable = 4, Lost = 10. Counts in
/// between are transitions: 2..3 is a track confirming itself, 5..9 is the
/// lost countdown of a stable track coasting without measurements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    counter: u8,
}

impl Lifecycle {
    pub const DIE: u8 = 0;
    pub const INIT: u8 = 1;
    pub const STABLE: u8 = 4;
    pub const LOST: u8 = 10;

    /// A freshly spawned track starts in Init.
    #[inline]
    pub fn new() -> Self {
        Self {
            counter: Self::INIT,
        }
    }

    /// Raw counter value.
    #[inline]
    pub fn value(self) -> u8 {
        self.counter
    }

    #[inline]
    pub fn is_die(self) -> bool {
        self.counter == Self::DIE
    }

    #[inline]
    pub fn is_init(self) -> bool {
        self.counter == Self::INIT
    }

    #[inline]
    pub fn is_stable(self) -> bool {
        self.counter == Self::STABLE
    }

    #[inline]
    pub fn is_lost(self) -> bool {
        self.counter == Self::LOST
    }

    /// Retires the track immediately.
    #[inline]
    pub fn kill(&mut self) {
        self.counter = Self::DIE;
    }

    /// Unconditional single step, used by second-frame initialization.
    #[inline]
    pub fn promote(&mut self) {
        self.counter += 1;
    }

    /// Transition taken when the frame produced a gated measurement set.
    ///
    /// Confirming tracks step toward Stable, coasting tracks snap back to
    /// Stable, and a track that already reached Lost retires: its gate has
    /// grown stale enough that the measurement is better spent seeding a
    /// fresh track.
    pub fn on_match(&mut self) {
        self.counter = match self.counter {
            c if c < Self::STABLE => c + 1,
            c if c < Self::LOST => Self::STABLE,
            _ => Self::DIE,
        };
    }

    /// Transition taken when nothing was gated this frame.
    pub fn on_miss(&mut self) {
        self.counter = match self.counter {
            c if c < Self::STABLE => Self::DIE,
            c if c < Self::LOST => c + 1,
            _ => Self::DIE,
        };
    }

    /// Lifecycle part of the output label.
    pub fn label(self, is_static: bool) -> TrackLabel {
        if is_static {
            TrackLabel::Static
        } else if self.counter > Self::DIE && self.counter < Self::STABLE {
            TrackLabel::Initialized
        } else if self.counter == Self::STABLE {
            TrackLabel::Stable
        } else if self.counter > Self::STABLE && self.counter <= Self::LOST {
            TrackLabel::Lost
        } else {
            TrackLabel::None
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Track
// ============================================================================

/// One tracked object: the IMM filter bank plus lifecycle bookkeeping.
#[derive(Debug, Clone)]
pub struct Track<T: RealField> {
    id: u64,
    /// The IMM-UKF filter bank estimating this object's kinematics.
    pub bank: ImmBank<T>,
    /// Lifecycle counter.
    pub lifecycle: Lifecycle,
    /// Frames with a validly gated, previously unclaimed detection.
    pub lifetime: u32,
    /// Stabilized bounding box state.
    pub bb: StabilizedBox<T>,
    /// Static/dynamic flag, re-derived every frame.
    pub is_static: bool,
    vel_history: VecDeque<T>,
    init_meas: PosMeasurement<T>,
}

impl<T: RealField + Float + Copy> Track<T> {
    /// Spawns a track from a first position measurement.
    pub fn new(id: u64, meas: &PosMeasurement<T>, init_cov_diag: &[T; STATE_DIM]) -> Self {
        Self {
            id,
            bank: ImmBank::new(meas, init_cov_diag),
            lifecycle: Lifecycle::new(),
            lifetime: 0,
            bb: StabilizedBox::new(),
            is_static: false,
            vel_history: VecDeque::new(),
            init_meas: Measurement::zeros(),
        }
    }

    /// Stable per-track identifier.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Records the current merged position as the static-classification
    /// baseline. Called once, at second-frame initialization, before the
    /// seed overwrites the merged state.
    pub fn record_baseline(&mut self) {
        let (px, py) = self.bank.position();
        self.init_meas = Measurement::from_array([px, py]);
    }

    /// The recorded baseline position.
    #[inline]
    pub fn init_meas(&self) -> &PosMeasurement<T> {
        &self.init_meas
    }

    /// Displacement of the merged estimate from the baseline.
    pub fn distance_from_origin(&self) -> T {
        let (px, py) = self.bank.position();
        let dx = px - *self.init_meas.index(0);
        let dy = py - *self.init_meas.index(1);
        Float::sqrt(dx * dx + dy * dy)
    }

    /// Appends the merged speed to the velocity history, keeping at most
    /// `retain` samples.
    pub fn record_velocity(&mut self, retain: usize) {
        self.vel_history.push_back(self.bank.speed());
        while self.vel_history.len() > retain {
            self.vel_history.pop_front();
        }
    }

    /// Mean of the newest `samples` recorded speeds (fewer if the history
    /// is shorter). `None` when the history is empty.
    pub fn recent_mean_speed(&self, samples: usize) -> Option<T> {
        let n = samples.min(self.vel_history.len());
        if n == 0 {
            return None;
        }
        let mut sum = T::zero();
        for &v in self.vel_history.iter().rev().take(n) {
            sum += v;
        }
        Some(sum / T::from_usize(n).unwrap())
    }

    /// Output label for this frame.
    #[inline]
    pub fn label(&self) -> TrackLabel {
        self.lifecycle.label(self.is_static)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_confirmation_path() {
        let mut lc = Lifecycle::new();
        assert!(lc.is_init());

        lc.promote(); // second-init
        assert_eq!(lc.value(), 2);
        lc.on_match();
        lc.on_match();
        assert!(lc.is_stable());
        lc.on_match();
        assert!(lc.is_stable());
    }

    #[test]
    fn test_lifecycle_young_track_dies_on_miss() {
        for start in [Lifecycle::INIT, 2, 3] {
            let mut lc = Lifecycle { counter: start };
            lc.on_miss();
            assert!(lc.is_die(), "counter {} should die on miss", start);
        }
    }

    #[test]
    fn test_lifecycle_lost_countdown_and_recovery() {
        let mut lc = Lifecycle {
            counter: Lifecycle::STABLE,
        };
        lc.on_miss();
        assert_eq!(lc.value(), 5);
        lc.on_miss();
        assert_eq!(lc.value(), 6);
        lc.on_match();
        assert!(lc.is_stable());

        for _ in 0..6 {
            lc.on_miss();
        }
        assert!(lc.is_lost());
        lc.on_miss();
        assert!(lc.is_die());
    }

    #[test]
    fn test_lifecycle_lost_with_match_retires() {
        let mut lc = Lifecycle {
            counter: Lifecycle::LOST,
        };
        lc.on_match();
        assert!(lc.is_die());
    }

    #[test]
    fn test_lifecycle_labels() {
        assert_eq!(Lifecycle { counter: 2 }.label(false), TrackLabel::Initialized);
        assert_eq!(Lifecycle { counter: 4 }.label(false), TrackLabel::Stable);
        assert_eq!(Lifecycle { counter: 7 }.label(false), TrackLabel::Lost);
        assert_eq!(Lifecycle { counter: 0 }.label(false), TrackLabel::None);
        assert_eq!(Lifecycle { counter: 4 }.label(true), TrackLabel::Static);
    }

    #[test]
    fn test_velocity_history_bounded_mean() {
        let diag = [0.5, 0.5, 3.0, 10.0, 1.0];
        let mut track = Track::new(0, &Measurement::from_array([0.0_f64, 0.0]), &diag);

        for _ in 0..12 {
            track.record_velocity(8);
        }
        assert_eq!(track.vel_history.len(), 8);

        // All recorded speeds are the bank's initial zero speed.
        let mean = track.recent_mean_speed(7).unwrap();
        assert!(mean.abs() < 1e-12);
        assert!(track.recent_mean_speed(0).is_none());
    }

    #[test]
    fn test_baseline_distance() {
        let diag = [0.5, 0.5, 3.0, 10.0, 1.0];
        let mut track = Track::new(1, &Measurement::from_array([3.0_f64, 4.0]), &diag);
        track.record_baseline();
        assert!(track.distance_from_origin() < 1e-12);
        assert!((track.init_meas().index(0) - 3.0).abs() < 1e-12);
    }
}
