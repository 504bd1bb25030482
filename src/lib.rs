//! immtrack: IMM-UKF-PDA multi-object tracker
//!
//! Tracks long-lived objects through per-frame sets of 3-D detections
//! (pose + box dimensions) as produced by a LiDAR clustering pipeline.
//! Each track runs an Interacting Multiple Model bank of three Unscented
//! Kalman Filters (constant velocity, constant turn rate, random motion),
//! associates measurements with Probabilistic Data Association behind a
//! chi-square gate, and emits stabilized bounding boxes with velocities,
//! lifecycle labels and a static/dynamic flag.
//!
//! # Usage
//!
//! ```
//! use immtrack::prelude::*;
//!
//! let mut tracker: ImmPdaTracker<f64> =
//!     ImmPdaTracker::new(TrackerConfig::default()).unwrap();
//!
//! let detections = vec![Detection::at_position(10.0, 0.0)];
//! // First frame seeds candidate tracks, later frames associate and update.
//! let _ = tracker.tick(0.0, &detections);
//! let output = tracker.tick(0.1, &detections);
//!
//! for object in &output.objects {
//!     println!("track {} at ({}, {})", object.id, object.pose.x, object.pose.y);
//! }
//! ```
//!
//! Detections are expected already transformed into the tracking frame;
//! frame conversion, message (de)serialization and publishing are adapter
//! concerns outside this crate.

pub mod association;
pub mod config;
pub mod filters;
pub mod models;
pub mod tracker;
pub mod types;

pub mod prelude {
    pub use crate::config::TrackerConfig;
    pub use crate::models::{MotionModel, PositionSensor, ProcessNoise};
    pub use crate::tracker::{ImmPdaTracker, Track, TrackerOutput};
    pub use crate::types::objects::{
        BoundingBox, BoxColor, Detection, Dimensions, Pose, TrackLabel, TrackedObject,
    };
    pub use crate::types::spaces::{
        Measurement, StateCovariance, StateVector, MEAS_DIM, STATE_DIM,
    };
}

/// Error type for the tracker library.
///
/// Per-track numerical failures never surface here: the tracker isolates
/// the affected track and retires it within the frame. Only problems the
/// caller can act on are reported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    /// A configuration value was rejected at construction.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

pub type Result<T> = core::result::Result<T, TrackerError>;
