//! Proximity checks between hands and scene objects, and the idle motion of objects.

use std::{f32::consts::TAU, time::Duration};

use itertools::Itertools;
use nalgebra::{UnitQuaternion, Vector3};

use crate::{
    landmark::{Hand, LandmarkIdx},
    scene::{InteractiveObject, ObjectId, Scene},
};

/// Parameters of the hand/object proximity check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionParams {
    /// Objects closer than this (in scene units) to the reference landmark are touched.
    pub threshold: f32,
    /// The landmark of each hand that is compared against object positions.
    pub reference: LandmarkIdx,
}

impl Default for InteractionParams {
    fn default() -> Self {
        Self {
            threshold: 1.0,
            reference: LandmarkIdx::IndexFingerTip,
        }
    }
}

/// Returns the objects touched by any of `hands`.
///
/// An object is touched when the Euclidean distance between its current position and the
/// reference landmark of a hand is strictly less than [`InteractionParams::threshold`]. Every
/// touched object is reported once, in ascending [`ObjectId`] order, even if several hands touch
/// it.
pub fn find_touches(hands: &[Hand], scene: &Scene, params: &InteractionParams) -> Vec<ObjectId> {
    hands
        .iter()
        .map(|hand| hand.landmark(params.reference))
        .cartesian_product(scene.objects().collect::<Vec<_>>())
        .filter_map(|(lm, obj)| {
            let distance = lm.distance_to(&obj.position());
            log::trace!("{:?} at distance {:.3}", obj.id(), distance);
            (distance < params.threshold).then_some(obj.id())
        })
        .sorted_unstable()
        .dedup()
        .collect()
}

/// The motion objects perform on their own: a constant spin and a vertical bob.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdleMotion {
    /// Rotation about the vertical (Y) axis applied every frame, in radians.
    pub rotation_per_frame: f32,
    /// Maximum vertical distance from the rest position.
    pub bob_amplitude: f32,
    /// Angular frequency of the bob, in radians per millisecond.
    pub bob_frequency: f32,
}

impl Default for IdleMotion {
    fn default() -> Self {
        Self {
            rotation_per_frame: 0.01,
            bob_amplitude: 0.1,
            bob_frequency: 0.002,
        }
    }
}

impl IdleMotion {
    /// Returns the vertical offset from the rest position at `elapsed` time since the start of
    /// the animation.
    pub fn bob_offset(&self, elapsed: Duration) -> f32 {
        let ms = elapsed.as_secs_f64() * 1000.0;
        let phase = (ms * f64::from(self.bob_frequency)).rem_euclid(TAU as f64);
        self.bob_amplitude * (phase as f32).sin()
    }

    /// Returns the period of the bob.
    ///
    /// Returns `None` if the bob frequency is 0.
    pub fn bob_period(&self) -> Option<Duration> {
        if self.bob_frequency == 0.0 {
            return None;
        }
        let ms = f64::from(TAU) / f64::from(self.bob_frequency).abs();
        Some(Duration::from_secs_f64(ms / 1000.0))
    }

    /// Advances the idle motion of `object` by one frame.
    ///
    /// The object is spun about the Y axis, and its height is set relative to its rest position.
    /// Only the Y coordinate of the position is changed.
    pub fn apply(&self, object: &mut InteractiveObject, elapsed: Duration) {
        let rest_y = object.rest_position().y;
        let transform = object.transform_mut();
        transform.rotation =
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), self.rotation_per_frame)
                * transform.rotation;
        transform.position.y = rest_y + self.bob_offset(elapsed);
    }
}
