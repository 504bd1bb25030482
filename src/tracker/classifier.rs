//! Static/dynamic classification
//!
//! A stable, seasoned track is flagged static when its recent mean speed is
//! below the threshold and the random-motion hypothesis outweighs at least
//! one of the dynamic hypotheses. The flag is re-derived from scratch every
//! frame.

use nalgebra::RealField;
use num_traits::Float;

use crate::config::TrackerConfig;
use crate::models::MotionModel;
use crate::tracker::track::Track;

/// Records this frame's merged speed and re-derives `is_static`.
pub fn classify_static<T: RealField + Float + Copy>(track: &mut Track<T>, config: &TrackerConfig<T>) {
    let retain = config.life_time_thres as usize;
    track.record_velocity(retain);

    if !track.lifecycle.is_stable() || track.lifetime <= config.life_time_thres {
        return;
    }

    let samples = (config.life_time_thres - 1) as usize;
    let Some(mean_speed) = track.recent_mean_speed(samples) else {
        return;
    };

    let rm = track.bank.mode_probability(MotionModel::Rm);
    let cv = track.bank.mode_probability(MotionModel::Cv);
    let ctrv = track.bank.mode_probability(MotionModel::Ctrv);

    if Float::abs(mean_speed) < config.static_velocity_thres && (rm > cv || rm > ctrv) {
        track.is_static = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::track::Lifecycle;
    use crate::types::spaces::Measurement;

    fn seasoned_track(config: &TrackerConfig<f64>) -> Track<f64> {
        let mut track = Track::new(
            0,
            &Measurement::from_array([0.0, 0.0]),
            &config.init_cov_diag,
        );
        while !track.lifecycle.is_stable() {
            track.lifecycle.promote();
        }
        track.lifetime = config.life_time_thres + 1;
        for _ in 0..config.life_time_thres {
            track.record_velocity(config.life_time_thres as usize);
        }
        track
    }

    #[test]
    fn test_slow_rm_dominant_track_is_static() {
        let config: TrackerConfig<f64> = TrackerConfig::default();
        let mut track = seasoned_track(&config);

        // A fresh bank has zero speed and uniform mode probabilities; tilt
        // the modes toward RM through a mode update.
        track.bank.predict(
            0.1,
            &config.mode_transition,
            &config.process_noise,
            &config.sensor,
            &config.ukf,
        )
        .unwrap();
        assert!(track.bank.update_mode_probabilities(&[0.1, 0.1, 1.0]));
        track.bank.merge();

        classify_static(&mut track, &config);
        assert!(track.is_static);
    }

    #[test]
    fn test_rm_weak_track_stays_dynamic() {
        let config: TrackerConfig<f64> = TrackerConfig::default();
        let mut track = seasoned_track(&config);

        track.bank.predict(
            0.1,
            &config.mode_transition,
            &config.process_noise,
            &config.sensor,
            &config.ukf,
        )
        .unwrap();
        assert!(track.bank.update_mode_probabilities(&[1.0, 1.0, 0.01]));
        track.bank.merge();

        classify_static(&mut track, &config);
        assert!(!track.is_static);
    }

    #[test]
    fn test_young_track_never_static() {
        let config: TrackerConfig<f64> = TrackerConfig::default();
        let mut track = Track::new(
            0,
            &Measurement::from_array([0.0, 0.0]),
            &config.init_cov_diag,
        );
        track.lifecycle = Lifecycle::new();

        classify_static(&mut track, &config);
        assert!(!track.is_static);
    }
}
