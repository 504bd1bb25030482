//! Detection input and tracked-object output data model
//!
//! Plain serde-friendly structs exchanged with the ingest and publishing
//! adapters. The filter itself only consumes the planar position of a
//! detection; pose and dimensions ride along for bounding-box association.

use nalgebra::RealField;
use serde::{Deserialize, Serialize};

use super::spaces::{Measurement, PosMeasurement};

/// Position and planar orientation of a detected object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose<T> {
    pub x: T,
    pub y: T,
    pub z: T,
    /// Planar orientation in radians, (−π, π].
    pub yaw: T,
}

/// Axis-aligned box extents in the object frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

/// One candidate object detection for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection<T> {
    pub pose: Pose<T>,
    pub dimensions: Dimensions<T>,
}

impl<T: RealField + Copy> Detection<T> {
    /// A unit-box detection at a planar position, useful for tests and
    /// position-only pipelines.
    pub fn at_position(x: T, y: T) -> Self {
        Self {
            pose: Pose {
                x,
                y,
                z: T::zero(),
                yaw: T::zero(),
            },
            dimensions: Dimensions {
                x: T::one(),
                y: T::one(),
                z: T::one(),
            },
        }
    }

    /// The planar position as a measurement vector.
    #[inline]
    pub fn position_measurement(&self) -> PosMeasurement<T> {
        Measurement::from_array([self.pose.x, self.pose.y])
    }
}

/// An oriented bounding box (pose + extents).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox<T> {
    pub pose: Pose<T>,
    pub dimensions: Dimensions<T>,
}

impl<T: RealField + Copy> BoundingBox<T> {
    /// Footprint area, the stabilizer's measure of cluster extent.
    #[inline]
    pub fn area(&self) -> T {
        self.dimensions.x * self.dimensions.y
    }
}

impl<T> From<Detection<T>> for BoundingBox<T> {
    fn from(d: Detection<T>) -> Self {
        Self {
            pose: d.pose,
            dimensions: d.dimensions,
        }
    }
}

/// Lifecycle label attached to every emitted object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackLabel {
    /// Classified as non-moving this frame.
    Static,
    /// Matched at least twice but not yet stable.
    Initialized,
    /// Stable tracking.
    Stable,
    /// Coasting without a matched detection.
    Lost,
    None,
}

impl core::fmt::Display for TrackLabel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            TrackLabel::Static => "Static",
            TrackLabel::Initialized => "Initialized",
            TrackLabel::Stable => "Stable",
            TrackLabel::Lost => "Lost",
            TrackLabel::None => "None",
        };
        write!(f, "{}", s)
    }
}

/// Display color for an emitted bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoxColor {
    Default,
    /// Orange: stable dynamic track.
    Stable,
    /// White: classified static.
    Static,
}

impl BoxColor {
    /// Numeric color code used by downstream box messages.
    #[inline]
    pub fn code(self) -> u8 {
        match self {
            BoxColor::Default => 0,
            BoxColor::Stable => 2,
            BoxColor::Static => 15,
        }
    }
}

/// One tracked object emitted per frame.
///
/// `speed` and `heading` are the merged IMM estimate; `heading` is expressed
/// in the tracking frame, and publishers that pack velocity messages put
/// `speed` in `linear.x` and the sensor-relative heading in `linear.y`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject<T> {
    /// Stable per-track identifier, never reused.
    pub id: u64,
    /// Stabilized bounding-box pose.
    pub pose: Pose<T>,
    /// Stabilized bounding-box extents.
    pub dimensions: Dimensions<T>,
    /// Estimated speed in m/s.
    pub speed: T,
    /// Estimated heading in radians, (−π, π].
    pub heading: T,
    pub label: TrackLabel,
    pub color_label: BoxColor,
    pub is_static: bool,
}
