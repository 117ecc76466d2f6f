//! Hand-motion gesture classification.
//!
//! A displacement is scored in the observer's frame (so "up" is always the
//! player's up regardless of wrist roll), mirrored for the left hand, and
//! binned into one of six directions by dominant axis.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{
    DOMINANCE_MARGIN, EPSILON, GESTURE_DISTANCE_THRESHOLD, GESTURE_TIMEOUT, MIN_GESTURE_SPEED,
};
use crate::direction::{Direction, HandSide};
use crate::quaternion::Quaternion;
use crate::vector::Vec3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Motions slower than this (m/s) are drift, not gestures.
    pub min_speed: f64,
    /// Factor by which an axis must beat the others to dominate.
    pub dominance_margin: f64,
    /// Displacement (m) needed before a tracked sample is classified.
    pub distance_threshold: f64,
    /// Seconds a tracked sample may stay below threshold before it restarts.
    pub timeout: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            min_speed: MIN_GESTURE_SPEED,
            dominance_margin: DOMINANCE_MARGIN,
            distance_threshold: GESTURE_DISTANCE_THRESHOLD,
            timeout: GESTURE_TIMEOUT,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Full outcome of scoring one displacement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureScore {
    pub direction: Direction,
    /// Axis that decided the direction; `None` when the motion was rejected.
    pub axis: Option<Axis>,
    /// True when the margin rule picked the axis, false for the
    /// greatest-magnitude fallback.
    pub dominant: bool,
    pub speed: f64,
}

impl GestureScore {
    fn rejected(speed: f64) -> Self {
        Self {
            direction: Direction::None,
            axis: None,
            dominant: false,
            speed,
        }
    }
}

/// Pure, deterministic displacement → direction classifier.
#[derive(Clone, Debug, Default)]
pub struct GestureClassifier {
    config: GestureConfig,
}

impl GestureClassifier {
    pub fn new(config: GestureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Classify a displacement already expressed in the observer frame.
    pub fn classify(&self, displacement: Vec3, elapsed: f64, hand: HandSide) -> Direction {
        self.score(displacement, elapsed, hand).direction
    }

    /// Classify a world-space displacement seen by an observer with the given orientation.
    pub fn classify_world(
        &self,
        displacement: Vec3,
        elapsed: f64,
        hand: HandSide,
        observer: Quaternion,
    ) -> Direction {
        self.classify(observer.inverse_rotate(displacement), elapsed, hand)
    }

    pub fn score(&self, displacement: Vec3, elapsed: f64, hand: HandSide) -> GestureScore {
        if elapsed <= 0.0 || displacement.magnitude() < EPSILON {
            return GestureScore::rejected(0.0);
        }

        let speed = displacement.magnitude() / elapsed;
        if speed < self.config.min_speed {
            return GestureScore::rejected(speed);
        }

        // Mirror lateral and depth axes once, before any axis scoring.
        let local = match hand {
            HandSide::Right => displacement,
            HandSide::Left => Vec3::new(-displacement.x, displacement.y, -displacement.z),
        };

        let a = local.abs();
        let m = self.config.dominance_margin;

        let (axis, dominant) = if a.y > a.x * m && a.y > a.z * m {
            (Axis::Y, true)
        } else if a.x > a.y * m && a.x > a.z * m {
            (Axis::X, true)
        } else if a.z > a.x * m && a.z > a.y * m {
            (Axis::Z, true)
        } else if a.y >= a.x && a.y >= a.z {
            (Axis::Y, false)
        } else if a.x >= a.z {
            (Axis::X, false)
        } else {
            (Axis::Z, false)
        };

        let direction = match axis {
            Axis::Y if local.y > 0.0 => Direction::Up,
            Axis::Y => Direction::Down,
            Axis::X if local.x > 0.0 => Direction::Right,
            Axis::X => Direction::Left,
            Axis::Z if local.z > 0.0 => Direction::Forward,
            Axis::Z => Direction::Backward,
        };

        debug!(
            %hand,
            %direction,
            ?axis,
            dominant,
            speed,
            "classified gesture ({:.3}, {:.3}, {:.3})",
            local.x,
            local.y,
            local.z
        );

        GestureScore {
            direction,
            axis: Some(axis),
            dominant,
            speed,
        }
    }
}

/// Motion of one tracked hand since tracking began.
///
/// Created when tracking starts, updated every sampling tick, and dropped
/// once a direction resolves, a timeout fires, or tracking is cancelled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureSample {
    start: Vec3,
    last: Vec3,
    started_at: f64,
    last_at: f64,
    path_length: f64,
}

impl GestureSample {
    pub fn begin(position: Vec3, now: f64) -> Self {
        Self {
            start: position,
            last: position,
            started_at: now,
            last_at: now,
            path_length: 0.0,
        }
    }

    pub fn update(&mut self, position: Vec3, now: f64) {
        self.path_length += self.last.distance(position);
        self.last = position;
        self.last_at = now;
    }

    /// Restart tracking from a new origin.
    pub fn reset(&mut self, position: Vec3, now: f64) {
        *self = Self::begin(position, now);
    }

    pub fn start(&self) -> Vec3 {
        self.start
    }

    pub fn last(&self) -> Vec3 {
        self.last
    }

    /// Net displacement from the start position.
    pub fn displacement(&self) -> Vec3 {
        self.last - self.start
    }

    pub fn elapsed(&self) -> f64 {
        self.last_at - self.started_at
    }

    /// Total distance travelled, including back-and-forth motion.
    pub fn path_length(&self) -> f64 {
        self.path_length
    }

    pub fn speed(&self) -> f64 {
        let elapsed = self.elapsed();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.displacement().magnitude() / elapsed
    }

    pub fn exceeds(&self, threshold: f64) -> bool {
        self.displacement().magnitude() > threshold
    }

    pub fn timed_out(&self, timeout: f64) -> bool {
        self.elapsed() > timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn classifier() -> GestureClassifier {
        GestureClassifier::default()
    }

    #[test]
    fn test_slow_motion_rejected() {
        // 0.1 m over 1 s = 0.1 m/s < 0.3 m/s
        let d = classifier().classify(Vec3::new(0.1, 0.0, 0.0), 1.0, HandSide::Right);
        assert_eq!(d, Direction::None);
    }

    #[test]
    fn test_zero_elapsed_rejected() {
        let d = classifier().classify(Vec3::new(1.0, 0.0, 0.0), 0.0, HandSide::Right);
        assert_eq!(d, Direction::None);
    }

    #[test]
    fn test_axis_mapping_right_hand() {
        let c = classifier();
        let cases = [
            (Vec3::new(0.0, 0.5, 0.0), Direction::Up),
            (Vec3::new(0.0, -0.5, 0.0), Direction::Down),
            (Vec3::new(0.5, 0.0, 0.0), Direction::Right),
            (Vec3::new(-0.5, 0.0, 0.0), Direction::Left),
            (Vec3::new(0.0, 0.0, 0.5), Direction::Forward),
            (Vec3::new(0.0, 0.0, -0.5), Direction::Backward),
        ];
        for (v, expected) in cases {
            assert_eq!(c.classify(v, 0.1, HandSide::Right), expected, "{v:?}");
        }
    }

    #[test]
    fn test_clear_dominance() {
        let s = classifier().score(Vec3::new(1.3, 0.0, 0.0), 0.1, HandSide::Right);
        assert_eq!(s.direction, Direction::Right);
        assert_eq!(s.axis, Some(Axis::X));
        assert!(s.dominant);
    }

    #[test]
    fn test_below_margin_falls_back_to_greatest() {
        // 1.1 is not 1.2x of 1.0, so no axis dominates
        let s = classifier().score(Vec3::new(1.1, 1.0, 0.0), 0.1, HandSide::Right);
        assert!(!s.dominant);
        assert_eq!(s.axis, Some(Axis::X));
        assert_eq!(s.direction, Direction::Right);
    }

    #[test]
    fn test_fallback_tie_prefers_y_then_x() {
        let c = classifier();
        let s = c.score(Vec3::new(1.0, 1.0, 1.0), 0.1, HandSide::Right);
        assert_eq!(s.axis, Some(Axis::Y));
        let s = c.score(Vec3::new(1.0, 0.0, 1.0), 0.1, HandSide::Right);
        assert_eq!(s.axis, Some(Axis::X));
    }

    #[test]
    fn test_left_hand_mirrors_lateral_and_depth() {
        let c = classifier();
        assert_eq!(c.classify(Vec3::new(0.5, 0.0, 0.0), 0.1, HandSide::Left), Direction::Left);
        assert_eq!(c.classify(Vec3::new(0.0, 0.0, 0.5), 0.1, HandSide::Left), Direction::Backward);
        // vertical is never mirrored
        assert_eq!(c.classify(Vec3::new(0.0, 0.5, 0.0), 0.1, HandSide::Left), Direction::Up);
    }

    #[test]
    fn test_observer_frame_transform() {
        // Observer turned to face world +X: pushing along world +X is "forward".
        let observer = Quaternion::from_yaw_degrees(90.0);
        let d = classifier().classify_world(Vec3::new(0.5, 0.0, 0.0), 0.1, HandSide::Right, observer);
        assert_eq!(d, Direction::Forward);
    }

    #[test]
    fn test_sample_tracks_displacement_and_path() {
        let mut s = GestureSample::begin(Vec3::ZERO, 1.0);
        s.update(Vec3::new(0.1, 0.0, 0.0), 1.1);
        s.update(Vec3::new(0.0, 0.0, 0.0), 1.2);
        assert!(s.displacement().magnitude() < 1e-12);
        assert!((s.path_length() - 0.2).abs() < 1e-12);
        assert!((s.elapsed() - 0.2).abs() < 1e-12);
        assert!(!s.exceeds(0.12));
    }

    #[test]
    fn test_sample_timeout_and_reset() {
        let mut s = GestureSample::begin(Vec3::ZERO, 0.0);
        s.update(Vec3::new(0.01, 0.0, 0.0), 3.5);
        assert!(s.timed_out(3.0));
        s.reset(Vec3::UP, 3.5);
        assert_eq!(s.elapsed(), 0.0);
        assert_eq!(s.start(), Vec3::UP);
    }

    proptest! {
        #[test]
        fn prop_classify_is_deterministic(
            x in -2.0f64..2.0, y in -2.0f64..2.0, z in -2.0f64..2.0,
            t in 0.01f64..2.0, left in any::<bool>(),
        ) {
            let hand = if left { HandSide::Left } else { HandSide::Right };
            let c = classifier();
            let v = Vec3::new(x, y, z);
            prop_assert_eq!(c.classify(v, t, hand), c.classify(v, t, hand));
        }

        #[test]
        fn prop_left_hand_mirrors_right_hand(
            x in -2.0f64..2.0, y in -2.0f64..2.0, z in -2.0f64..2.0,
            t in 0.01f64..2.0,
        ) {
            let c = classifier();
            let left = c.classify(Vec3::new(x, y, z), t, HandSide::Left);
            let right = c.classify(Vec3::new(-x, y, -z), t, HandSide::Right);
            prop_assert_eq!(left, right);
        }
    }
}
