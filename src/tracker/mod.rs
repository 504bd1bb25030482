//! Track lifecycle and the per-frame tracking pipeline
//!
//! A [`Track`] owns one IMM bank plus its lifecycle counter, lifetime,
//! velocity history and stabilized bounding box. The [`ImmPdaTracker`]
//! drives all tracks through predict → gate → associate → update each
//! frame, spawns tracks from unclaimed detections, classifies static
//! objects and prunes dead tracks.

mod classifier;
mod core;
mod stabilizer;
mod track;

pub use classifier::*;
pub use core::*;
pub use stabilizer::*;
pub use track::*;
