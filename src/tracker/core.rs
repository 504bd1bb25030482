//! The per-frame tracking pipeline
//!
//! One `tick(timestamp, detections)` call runs the whole frame in strict
//! order: predict every live track, gate and associate detections, update
//! the filters, spawn tracks from unclaimed detections, classify static
//! objects, assemble the output snapshot and prune dead tracks. The
//! tracker is single-threaded and does no buffering; callers queue frames
//! between ticks.
//!
//! Numerical failures are contained per track: any divergence (covariance
//! explosion, failed factorization, degenerate likelihoods) retires the
//! affected track the same frame, with one log line per occurrence.

use log::{debug, error, warn};
use nalgebra::RealField;
use num_traits::Float;

use crate::association::{gate_detections, pda_update, widest_gate};
use crate::config::TrackerConfig;
use crate::tracker::classifier::classify_static;
use crate::tracker::track::Track;
use crate::types::objects::{BoundingBox, BoxColor, Detection, TrackedObject};
use crate::types::spaces::PosMeasurement;
use crate::{models::normalize_yaw, Result};

/// Immutable per-tick output snapshot.
///
/// `objects` and `boxes` are emitted pairwise for the same tracks; their
/// lengths always agree.
#[derive(Debug, Clone)]
pub struct TrackerOutput<T> {
    pub objects: Vec<TrackedObject<T>>,
    pub boxes: Vec<BoundingBox<T>>,
}

impl<T> Default for TrackerOutput<T> {
    fn default() -> Self {
        Self {
            objects: Vec::new(),
            boxes: Vec::new(),
        }
    }
}

/// The IMM-UKF-PDA multi-object tracker.
#[derive(Debug, Clone)]
pub struct ImmPdaTracker<T: RealField> {
    config: TrackerConfig<T>,
    tracks: Vec<Track<T>>,
    next_id: u64,
    last_timestamp: Option<T>,
}

impl<T: RealField + Float + Copy> ImmPdaTracker<T> {
    /// Creates a tracker, rejecting an invalid configuration.
    pub fn new(config: TrackerConfig<T>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            tracks: Vec::new(),
            next_id: 0,
            last_timestamp: None,
        })
    }

    /// The active configuration.
    #[inline]
    pub fn config(&self) -> &TrackerConfig<T> {
        &self.config
    }

    /// The live track set, in insertion order.
    #[inline]
    pub fn tracks(&self) -> &[Track<T>] {
        &self.tracks
    }

    /// Mutable track access for diagnostics and fault-injection tests.
    /// The tracker maintains all track invariants itself during `tick`.
    #[inline]
    pub fn tracks_mut(&mut self) -> &mut [Track<T>] {
        &mut self.tracks
    }

    /// Processes one frame.
    ///
    /// The first frame only seeds candidate tracks and returns an empty
    /// snapshot. Detections must already be expressed in the tracking
    /// frame; `timestamp` is in seconds.
    pub fn tick(&mut self, timestamp: T, detections: &[Detection<T>]) -> TrackerOutput<T> {
        let Some(last) = self.last_timestamp else {
            for detection in detections {
                self.spawn_track(detection);
            }
            self.last_timestamp = Some(timestamp);
            return TrackerOutput::default();
        };

        let dt = timestamp - last;
        self.last_timestamp = Some(timestamp);

        let mut claimed = vec![false; detections.len()];

        for track in self.tracks.iter_mut() {
            track.bb.reset_visibility();
            track.is_static = false;

            if track.lifecycle.is_die() {
                continue;
            }
            if Self::merged_covariance_diverged(track, &self.config) {
                warn!("track {}: merged covariance diverged, retiring", track.id());
                track.lifecycle.kill();
                continue;
            }

            if track
                .bank
                .predict(
                    dt,
                    &self.config.mode_transition,
                    &self.config.process_noise,
                    &self.config.sensor,
                    &self.config.ukf,
                )
                .is_none()
            {
                warn!("track {}: prediction lost positive definiteness, retiring", track.id());
                track.lifecycle.kill();
                continue;
            }

            let gate = widest_gate(&track.bank);
            if Float::is_nan(gate.det_s) || gate.det_s > self.config.det_explode_param {
                warn!("track {}: innovation covariance diverged, retiring", track.id());
                track.lifecycle.kill();
                continue;
            }

            let second_init = track.lifecycle.is_init();
            let Some(gated) = gate_detections(
                detections,
                &gate,
                second_init,
                self.config.gating_thres,
                &mut claimed,
            ) else {
                warn!("track {}: singular gate covariance, retiring", track.id());
                track.lifecycle.kill();
                continue;
            };
            track.lifetime += gated.fresh_hits;

            // Box association sees the pre-update merged position, so a
            // stabilized box lags the filter by one update on purpose.
            if !gated.indices.is_empty()
                && track.lifecycle.is_stable()
                && track.lifetime >= self.config.life_time_thres
            {
                let (px, py) = track.bank.position();
                track
                    .bb
                    .associate(px, py, detections, &gated.indices, self.config.distance_thres);
                track.bb.refine(self.config.bb_yaw_change_thres);
            }

            if second_init {
                Self::second_init(track, detections, &gated.indices, dt);
                continue;
            }

            if gated.indices.is_empty() {
                track.lifecycle.on_miss();
            } else {
                track.lifecycle.on_match();
            }
            if track.lifecycle.is_die() {
                continue;
            }

            let measurements: Vec<PosMeasurement<T>> = gated
                .indices
                .iter()
                .map(|&i| detections[i].position_measurement())
                .collect();

            let Some(lambdas) = pda_update(&mut track.bank, &measurements, &gate, &self.config)
            else {
                warn!("track {}: singular model covariance in PDA, retiring", track.id());
                track.lifecycle.kill();
                continue;
            };
            if !track.bank.update_mode_probabilities(&lambdas) {
                warn!("track {}: degenerate mode likelihoods, retiring", track.id());
                track.lifecycle.kill();
                continue;
            }
            track.bank.merge();
        }

        let mut spawned = 0usize;
        for (i, detection) in detections.iter().enumerate() {
            if !claimed[i] {
                self.spawn_track(detection);
                spawned += 1;
            }
        }
        if spawned > 0 {
            debug!("spawned {} tracks from unclaimed detections", spawned);
        }

        for track in self.tracks.iter_mut() {
            classify_static(track, &self.config);
        }

        let output = self.make_output();

        let before = self.tracks.len();
        self.tracks.retain(|t| !t.lifecycle.is_die());
        let pruned = before - self.tracks.len();
        if pruned > 0 {
            debug!("pruned {} dead tracks", pruned);
        }

        output
    }

    fn merged_covariance_diverged(track: &Track<T>, config: &TrackerConfig<T>) -> bool {
        let yaw_rate_var = track.bank.p_merge().as_matrix()[(4, 4)];
        match track.bank.p_merge().determinant() {
            None => true,
            Some(det) => det > config.det_explode_param || yaw_rate_var > config.cov_explode_param,
        }
    }

    /// Second-frame initialization: the selected measurement seeds speed
    /// and heading from the displacement since spawn. With nothing gated
    /// the candidate track retires.
    fn second_init(track: &mut Track<T>, detections: &[Detection<T>], gated: &[usize], dt: T) {
        let Some(&i) = gated.first() else {
            track.lifecycle.kill();
            return;
        };

        track.record_baseline();

        let (prev_x, prev_y) = track.bank.position();
        let dx = detections[i].pose.x - prev_x;
        let dy = detections[i].pose.y - prev_y;
        let dist = Float::sqrt(dx * dx + dy * dy);
        let speed = dist / dt;
        let yaw = Float::atan2(dy, dx);

        track
            .bank
            .seed_kinematics(detections[i].pose.x, detections[i].pose.y, speed, yaw);
        track.lifecycle.promote();
    }

    fn spawn_track(&mut self, detection: &Detection<T>) {
        let track = Track::new(
            self.next_id,
            &detection.position_measurement(),
            &self.config.init_cov_diag,
        );
        self.tracks.push(track);
        self.next_id += 1;
    }

    fn make_output(&self) -> TrackerOutput<T> {
        let mut output = TrackerOutput::default();

        for track in &self.tracks {
            let Some(bbox) = track.bb.output_box() else {
                continue;
            };

            let color_label = if track.is_static {
                BoxColor::Static
            } else if track.lifecycle.is_stable() {
                BoxColor::Stable
            } else {
                BoxColor::Default
            };

            output.objects.push(TrackedObject {
                id: track.id(),
                pose: bbox.pose,
                dimensions: bbox.dimensions,
                speed: track.bank.speed(),
                heading: normalize_yaw(track.bank.heading()),
                label: track.label(),
                color_label,
                is_static: track.is_static,
            });
            output.boxes.push(*bbox);
        }

        debug_assert_eq!(output.objects.len(), output.boxes.len());
        if output.objects.len() != output.boxes.len() {
            error!(
                "output mismatch: {} objects vs {} boxes",
                output.objects.len(),
                output.boxes.len()
            );
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrackerError;

    fn tracker() -> ImmPdaTracker<f64> {
        ImmPdaTracker::new(TrackerConfig::default()).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config: TrackerConfig<f64> = TrackerConfig::default();
        config.gate_probability = 2.0;
        assert!(matches!(
            ImmPdaTracker::new(config),
            Err(TrackerError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_first_frame_spawns_tracks() {
        let mut tracker = tracker();
        let detections = vec![
            Detection::at_position(0.0, 0.0),
            Detection::at_position(20.0, 5.0),
        ];

        let output = tracker.tick(0.0, &detections);

        assert!(output.objects.is_empty());
        assert_eq!(tracker.tracks().len(), 2);
        assert!(tracker.tracks().iter().all(|t| t.lifecycle.is_init()));
    }

    #[test]
    fn test_track_ids_unique_and_monotonic() {
        let mut tracker = tracker();
        tracker.tick(0.0, &[Detection::at_position(0.0, 0.0)]);
        // A distant detection cannot be gated by the first track.
        tracker.tick(
            0.1,
            &[
                Detection::at_position(0.0, 0.0),
                Detection::at_position(100.0, 100.0),
            ],
        );

        let mut ids: Vec<u64> = tracker.tracks().iter().map(|t| t.id()).collect();
        let len = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), len);
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn test_second_init_seeds_speed_and_heading() {
        let mut tracker = tracker();
        tracker.tick(0.0, &[Detection::at_position(0.0, 0.0)]);
        tracker.tick(1.0, &[Detection::at_position(1.0, 0.0)]);

        let track = &tracker.tracks()[0];
        assert_eq!(track.lifecycle.value(), 2);
        assert!((track.bank.speed() - 1.0).abs() < 1e-9);
        assert!(track.bank.heading().abs() < 1e-9);
        assert!((track.init_meas().index(0) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_init_track_dies_without_second_measurement() {
        let mut tracker = tracker();
        tracker.tick(0.0, &[Detection::at_position(0.0, 0.0)]);
        tracker.tick(0.1, &[]);

        assert!(tracker.tracks().is_empty());
    }

    #[test]
    fn test_divergence_guard_retires_track() {
        let mut tracker = tracker();
        tracker.tick(0.0, &[Detection::at_position(0.0, 0.0)]);

        // Inflate the yaw-rate variance beyond the guard.
        let config = tracker.config().clone();
        let mut p = *tracker.tracks()[0].bank.p_merge().as_matrix();
        p[(4, 4)] = config.cov_explode_param * 2.0;
        tracker.tracks_mut()[0]
            .bank
            .set_p_merge(crate::types::spaces::TrackStateCov::from_matrix(p));

        let output = tracker.tick(0.1, &[Detection::at_position(0.0, 0.0)]);

        assert!(output.objects.is_empty());
        // The guarded track was pruned; the detection spawned a fresh one.
        assert_eq!(tracker.tracks().len(), 1);
        assert_eq!(tracker.tracks()[0].id(), 1);
    }
}
