//! The scale-up animation played when a hand touches an object.
//!
//! Triggering an object scales it up immediately and schedules a reversion to its normal scale.
//! Reversions are not run by a timer thread; [`ScaleAnimator::update`] applies every reversion
//! that is due, and is called once per frame by the frame loop.
//!
//! Every trigger bumps a per-object generation counter, and a scheduled reversion only applies if
//! the object has not been triggered again since it was scheduled. Triggering an object that is
//! already scaled up therefore extends the animation to last until [`TriggerParams::duration`]
//! after the *latest* trigger.

use std::{collections::HashMap, time::Duration};

use crate::scene::{ObjectId, Scene};

/// Scale and duration of the trigger animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerParams {
    /// Scale applied on every axis while the animation runs.
    pub scale: f32,
    /// Scale restored when the animation ends.
    pub rest_scale: f32,
    /// Time between the trigger and the reversion to `rest_scale`.
    pub duration: Duration,
}

impl Default for TriggerParams {
    fn default() -> Self {
        Self {
            scale: 1.2,
            rest_scale: 1.0,
            duration: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Reversion {
    object: ObjectId,
    generation: u64,
    due: Duration,
}

/// Plays the trigger animation on scene objects.
///
/// All times are given as durations since an arbitrary, fixed starting point (typically the
/// start of the frame loop).
#[derive(Debug, Default)]
pub struct ScaleAnimator {
    params: TriggerParams,
    generations: HashMap<ObjectId, u64>,
    /// Ordered by `due`, since every reversion is scheduled `params.duration` into the future.
    pending: Vec<Reversion>,
}

impl ScaleAnimator {
    pub fn new(params: TriggerParams) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    #[inline]
    pub fn params(&self) -> &TriggerParams {
        &self.params
    }

    /// Scales `object` up and schedules its reversion.
    ///
    /// Does nothing if `object` is not part of `scene`.
    pub fn trigger(&mut self, scene: &mut Scene, object: ObjectId, now: Duration) {
        let Some(obj) = scene.get_mut(object) else {
            log::warn!("ignoring trigger for unknown object {:?}", object);
            return;
        };
        obj.transform_mut().set_uniform_scale(self.params.scale);

        let generation = self.generations.entry(object).or_default();
        *generation += 1;
        let due = now + self.params.duration;
        log::debug!(
            "triggered {:?} (generation {}), reverting at {:?}",
            object,
            generation,
            due
        );
        self.pending.push(Reversion {
            object,
            generation: *generation,
            due,
        });
    }

    /// Applies every reversion that is due at `now`.
    ///
    /// Reversions superseded by a later trigger of the same object are discarded.
    pub fn update(&mut self, scene: &mut Scene, now: Duration) {
        let due = self.pending.partition_point(|rev| rev.due <= now);
        for rev in self.pending.drain(..due) {
            if self.generations.get(&rev.object) != Some(&rev.generation) {
                log::trace!("dropping stale reversion of {:?}", rev.object);
                continue;
            }
            if let Some(obj) = scene.get_mut(rev.object) {
                obj.transform_mut()
                    .set_uniform_scale(self.params.rest_scale);
                log::trace!("reverted {:?}", rev.object);
            }
        }
    }

    /// Returns whether `object` is currently scaled up.
    pub fn is_active(&self, object: ObjectId) -> bool {
        let Some(current) = self.generations.get(&object) else {
            return false;
        };
        self.pending
            .iter()
            .any(|rev| rev.object == object && rev.generation == *current)
    }

    /// Returns the number of scheduled reversions, including stale ones that have not been
    /// discarded yet.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;

    use crate::{model::Model, scene::SceneBuilder};

    use super::*;

    fn scene() -> (Scene, ObjectId) {
        let mut builder = SceneBuilder::new();
        let id = builder.add(Model::cube("cube"), Vector3::zeros());
        (builder.build(), id)
    }

    fn scale(scene: &Scene, id: ObjectId) -> Vector3<f32> {
        scene.get(id).unwrap().transform().scale
    }

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn trigger_then_revert() {
        let (mut scene, id) = scene();
        let mut anim = ScaleAnimator::default();

        anim.trigger(&mut scene, id, ms(0));
        assert_eq!(scale(&scene, id), Vector3::repeat(1.2));
        assert!(anim.is_active(id));

        anim.update(&mut scene, ms(999));
        assert_eq!(scale(&scene, id), Vector3::repeat(1.2));

        anim.update(&mut scene, ms(1000));
        assert_eq!(scale(&scene, id), Vector3::repeat(1.0));
        assert!(!anim.is_active(id));
        assert_eq!(anim.pending(), 0);
    }

    #[test]
    fn retrigger_extends_animation() {
        let (mut scene, id) = scene();
        let mut anim = ScaleAnimator::default();

        anim.trigger(&mut scene, id, ms(0));
        anim.trigger(&mut scene, id, ms(600));
        assert_eq!(anim.pending(), 2);

        // The first reversion is stale and must not shrink the object.
        anim.update(&mut scene, ms(1000));
        assert_eq!(scale(&scene, id), Vector3::repeat(1.2));
        assert_eq!(anim.pending(), 1);

        anim.update(&mut scene, ms(1600));
        assert_eq!(scale(&scene, id), Vector3::repeat(1.0));
    }

    #[test]
    fn late_update_applies_only_latest() {
        let (mut scene, id) = scene();
        let mut anim = ScaleAnimator::default();
        for t in [0, 100, 200] {
            anim.trigger(&mut scene, id, ms(t));
        }
        anim.update(&mut scene, ms(5000));
        assert_eq!(scale(&scene, id), Vector3::repeat(1.0));
        assert_eq!(anim.pending(), 0);
    }

    #[test]
    fn custom_params() {
        let (mut scene, id) = scene();
        let mut anim = ScaleAnimator::new(TriggerParams {
            scale: 2.0,
            rest_scale: 0.5,
            duration: ms(10),
        });
        anim.trigger(&mut scene, id, ms(0));
        assert_eq!(scale(&scene, id), Vector3::repeat(2.0));
        anim.update(&mut scene, ms(10));
        assert_eq!(scale(&scene, id), Vector3::repeat(0.5));
    }
}
