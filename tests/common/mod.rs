//! Common helpers for tracker integration tests

#![allow(dead_code)]

use immtrack::prelude::*;

/// Creates a unit-box detection at a planar position.
pub fn detection(x: f64, y: f64) -> Detection<f64> {
    Detection::at_position(x, y)
}

/// Creates a tracker with the default configuration.
pub fn default_tracker() -> ImmPdaTracker<f64> {
    ImmPdaTracker::new(TrackerConfig::default()).unwrap()
}

/// Feeds one detection per frame at the given positions, `dt` seconds
/// apart, and returns the last output.
pub fn run_sequence(
    tracker: &mut ImmPdaTracker<f64>,
    positions: &[(f64, f64)],
    dt: f64,
) -> TrackerOutput<f64> {
    let mut output = TrackerOutput::default();
    for (i, &(x, y)) in positions.iter().enumerate() {
        output = tracker.tick(i as f64 * dt, &[detection(x, y)]);
    }
    output
}

/// Positions on a circle of the given radius, stepped by `step` radians.
pub fn circle_positions(radius: f64, step: f64, frames: usize) -> Vec<(f64, f64)> {
    (0..frames)
        .map(|i| {
            let theta = i as f64 * step;
            (radius * theta.cos(), radius * theta.sin())
        })
        .collect()
}
