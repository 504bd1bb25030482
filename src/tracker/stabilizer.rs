//! Bounding-box stabilization
//!
//! LiDAR cluster boxes jitter in orientation and shrink under occlusion.
//! Once a track is stable, the box published for it is the gated cluster
//! nearest the merged position, with its yaw clamped against the best yaw
//! seen so far and its footprint only allowed to grow: cluster extent
//! tends toward the true extent as more surface is observed, while shrinks
//! are usually occlusion artifacts.

use nalgebra::RealField;
use num_traits::Float;

use crate::models::normalize_yaw;
use crate::types::objects::{BoundingBox, Detection};

/// Stabilized bounding-box state of one track.
#[derive(Debug, Clone)]
pub struct StabilizedBox<T: RealField> {
    visible: bool,
    current: Option<BoundingBox<T>>,
    best: Option<BoundingBox<T>>,
    best_yaw: T,
}

impl<T: RealField + Float + Copy> StabilizedBox<T> {
    /// Empty state: nothing associated yet.
    pub fn new() -> Self {
        Self {
            visible: false,
            current: None,
            best: None,
            best_yaw: T::zero(),
        }
    }

    /// Whether a box was associated this frame.
    #[inline]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Clears per-frame visibility; called at the start of every tick.
    #[inline]
    pub fn reset_visibility(&mut self) {
        self.visible = false;
    }

    /// The box to publish this frame, if any.
    #[inline]
    pub fn output_box(&self) -> Option<&BoundingBox<T>> {
        if self.visible {
            self.current.as_ref()
        } else {
            None
        }
    }

    /// The best yaw adopted so far.
    #[inline]
    pub fn best_yaw(&self) -> T {
        self.best_yaw
    }

    /// Associates the gated detection nearest to the merged position
    /// `(px, py)`, if it is closer than `distance_thres`.
    pub fn associate(
        &mut self,
        px: T,
        py: T,
        detections: &[Detection<T>],
        gated_indices: &[usize],
        distance_thres: T,
    ) {
        let mut nearest: Option<(usize, T)> = None;
        for &i in gated_indices {
            let dx = px - detections[i].pose.x;
            let dy = py - detections[i].pose.y;
            let dist = Float::sqrt(dx * dx + dy * dy);
            if nearest.map_or(true, |(_, best)| dist < best) {
                nearest = Some((i, dist));
            }
        }

        if let Some((i, dist)) = nearest {
            if dist < distance_thres {
                self.current = Some(detections[i].into());
                self.visible = true;
            }
        }
    }

    /// Refines the associated box against the best box seen so far.
    ///
    /// Orientation: accept the candidate yaw only when it moved less than
    /// `yaw_change_thres` since the best yaw, otherwise overwrite the
    /// candidate's orientation with the best one. Dimensions: keep the
    /// larger footprint, relocating it to the candidate pose on shrink.
    pub fn refine(&mut self, yaw_change_thres: T) {
        if !self.visible {
            return;
        }
        let Some(current) = self.current.as_mut() else {
            return;
        };

        let Some(best) = self.best.as_mut() else {
            // First association: adopt wholesale.
            self.best = Some(*current);
            self.best_yaw = current.pose.yaw;
            return;
        };

        let diff_yaw = normalize_yaw(current.pose.yaw - self.best_yaw);
        if Float::abs(diff_yaw) < yaw_change_thres {
            best.pose.yaw = current.pose.yaw;
            self.best_yaw = current.pose.yaw;
        } else {
            current.pose.yaw = best.pose.yaw;
        }

        if current.area() < best.area() {
            current.dimensions = best.dimensions;
        } else if current.area() > best.area() {
            best.dimensions = current.dimensions;
        }
    }
}

impl<T: RealField + Float + Copy> Default for StabilizedBox<T> {
    fn default() -> Self {
        Self::new()
    }
}
