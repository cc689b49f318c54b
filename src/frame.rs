//! The per-frame update loop of the scene interaction flow.
//!
//! Every frame goes through two steps:
//!
//! 1. [`FrameLoop::begin_frame`] hands the current camera image to the detector.
//! 2. [`FrameLoop::finish_frame`] waits for the detection result, lets hands trigger the objects
//!    they touch, applies idle motion to every object and renders the scene.
//!
//! Calling these out of order is rejected with a [`FrameStateError`], so at most one detection
//! request is ever in flight.

use std::{error::Error as StdError, fmt, mem, sync::Arc, time::Duration};

use crate::{
    anim::ScaleAnimator,
    detector::{Detector, PendingDetection},
    image::Image,
    interaction::{find_touches, IdleMotion, InteractionParams},
    landmark::Hand,
    render::Renderer,
    scene::{ObjectId, PerspectiveCamera, Scene},
};

/// State of the [`FrameLoop`].
pub enum FrameState {
    /// The last frame has been rendered; the next one may begin.
    RenderingIdle,
    /// A frame has begun and its detection pass is pending.
    ///
    /// Holds `None` if no detector is available.
    AwaitingDetection(Option<PendingDetection>),
}

impl fmt::Debug for FrameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RenderingIdle => f.write_str("RenderingIdle"),
            Self::AwaitingDetection(pending) => f
                .debug_tuple("AwaitingDetection")
                .field(&pending.as_ref().map(|_| ".."))
                .finish(),
        }
    }
}

/// Error returned when [`FrameLoop`] transitions are invoked out of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStateError {
    /// [`FrameLoop::begin_frame`] was called while a frame was already in progress.
    FrameInProgress,
    /// [`FrameLoop::finish_frame`] was called without a preceding [`FrameLoop::begin_frame`].
    NoFrameInProgress,
}

impl fmt::Display for FrameStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FrameInProgress => "cannot begin a frame while another one is in progress",
            Self::NoFrameInProgress => "cannot finish a frame that was never begun",
        })
    }
}

impl StdError for FrameStateError {}

/// Context attached to the error returned by [`FrameLoop::finish_frame`] when hand detection
/// failed.
///
/// The frame was still animated and rendered, so callers may downcast to this type to keep
/// running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionFailed;

impl fmt::Display for DetectionFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("hand detection failed")
    }
}

/// What happened during a frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Number of hands the detector reported.
    pub hands: usize,
    /// Objects that were triggered this frame.
    pub triggered: Vec<ObjectId>,
}

/// Drives the interactive objects of a [`Scene`] from frame to frame.
#[derive(Debug)]
pub struct FrameLoop {
    state: FrameState,
    interaction: InteractionParams,
    idle: IdleMotion,
    animator: ScaleAnimator,
    frames: u64,
}

impl FrameLoop {
    pub fn new(interaction: InteractionParams, idle: IdleMotion, animator: ScaleAnimator) -> Self {
        Self {
            state: FrameState::RenderingIdle,
            interaction,
            idle,
            animator,
            frames: 0,
        }
    }

    #[inline]
    pub fn state(&self) -> &FrameState {
        &self.state
    }

    #[inline]
    pub fn animator(&self) -> &ScaleAnimator {
        &self.animator
    }

    /// Returns the number of frames finished so far.
    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Begins a frame by requesting detection on `image`.
    ///
    /// If `detector` is `None`, the frame proceeds without hands.
    pub fn begin_frame(
        &mut self,
        detector: Option<&mut Detector>,
        image: Arc<Image>,
    ) -> Result<(), FrameStateError> {
        if let FrameState::AwaitingDetection(_) = self.state {
            return Err(FrameStateError::FrameInProgress);
        }
        let pending = detector.map(|detector| detector.request(image));
        log::trace!(
            "frame {}: awaiting detection (detector: {})",
            self.frames,
            pending.is_some()
        );
        self.state = FrameState::AwaitingDetection(pending);
        Ok(())
    }

    /// Finishes the frame begun by [`FrameLoop::begin_frame`].
    ///
    /// `now` is the time elapsed since the loop started. It drives the idle bob and the scale
    /// reversions.
    ///
    /// If detection fails, the error is returned after the frame was still animated and rendered
    /// without hands, with [`DetectionFailed`] as its context. The loop is ready for the next frame
    /// in either case.
    pub fn finish_frame(
        &mut self,
        scene: &mut Scene,
        renderer: &mut dyn Renderer,
        camera: &PerspectiveCamera,
        now: Duration,
    ) -> anyhow::Result<FrameReport> {
        let pending = match mem::replace(&mut self.state, FrameState::RenderingIdle) {
            FrameState::AwaitingDetection(pending) => pending,
            FrameState::RenderingIdle => return Err(FrameStateError::NoFrameInProgress.into()),
        };

        let (hands, detect_error) = match pending.map(PendingDetection::wait) {
            None => (Vec::new(), None),
            Some(Ok(detection)) => (detection.into_hands(), None),
            Some(Err(e)) => (Vec::new(), Some(e)),
        };

        let report = self.update(scene, &hands, now);
        renderer.render(scene, camera)?;
        self.frames += 1;

        match detect_error {
            Some(e) => Err(e.context(DetectionFailed)),
            None => Ok(report),
        }
    }

    /// Runs the interaction and animation steps of a frame, without rendering.
    ///
    /// Due scale reversions are applied before new triggers, so an object touched in the same
    /// frame its animation ends stays scaled up.
    pub fn update(&mut self, scene: &mut Scene, hands: &[Hand], now: Duration) -> FrameReport {
        self.animator.update(scene, now);

        let triggered = if hands.is_empty() {
            Vec::new()
        } else {
            find_touches(hands, scene, &self.interaction)
        };
        for &id in &triggered {
            self.animator.trigger(scene, id, now);
        }

        for object in scene.objects_mut() {
            self.idle.apply(object, now);
        }

        FrameReport {
            hands: hands.len(),
            triggered,
        }
    }
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new(
            InteractionParams::default(),
            IdleMotion::default(),
            ScaleAnimator::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use anyhow::bail;
    use nalgebra::Vector3;

    use crate::{
        detector::DetectorConfig, landmark::Landmark, model::Model, resolution::Resolution,
        scene::SceneBuilder,
    };

    use super::*;

    #[derive(Default)]
    struct CountingRenderer {
        calls: usize,
    }

    impl Renderer for CountingRenderer {
        fn resolution(&self) -> Resolution {
            Resolution::new(64, 48)
        }

        fn render(&mut self, _: &Scene, _: &PerspectiveCamera) -> anyhow::Result<()> {
            self.calls += 1;
            Ok(())
        }
    }

    fn scene() -> (Scene, ObjectId) {
        let mut builder = SceneBuilder::new();
        let id = builder.add(Model::cube("cube"), Vector3::new(0.0, -0.5, -2.0));
        (builder.build(), id)
    }

    fn camera() -> PerspectiveCamera {
        PerspectiveCamera::new(75.0, Resolution::new(64, 48), 0.1, 1000.0).unwrap()
    }

    fn frame() -> Arc<Image> {
        Arc::new(Image::new(4, 4))
    }

    #[test]
    fn transitions_must_alternate() {
        let (mut scene, _) = scene();
        let mut renderer = CountingRenderer::default();
        let mut frames = FrameLoop::default();

        let err = frames
            .finish_frame(&mut scene, &mut renderer, &camera(), Duration::ZERO)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<FrameStateError>(),
            Some(&FrameStateError::NoFrameInProgress)
        );

        frames.begin_frame(None, frame()).unwrap();
        assert!(matches!(frames.state(), FrameState::AwaitingDetection(None)));
        assert_eq!(
            frames.begin_frame(None, frame()),
            Err(FrameStateError::FrameInProgress)
        );

        frames
            .finish_frame(&mut scene, &mut renderer, &camera(), Duration::ZERO)
            .unwrap();
        assert!(matches!(frames.state(), FrameState::RenderingIdle));
        assert_eq!(frames.frames(), 1);
        assert_eq!(renderer.calls, 1);
    }

    #[test]
    fn frames_without_hands_still_animate_and_render() {
        let (mut scene, id) = scene();
        let mut renderer = CountingRenderer::default();
        let mut detector = Detector::inline(
            DetectorConfig::default(),
            |_: &Image| -> anyhow::Result<Vec<Hand>> { Ok(Vec::new()) },
        )
        .unwrap();
        let mut frames = FrameLoop::default();

        let now = Duration::from_millis(500);
        frames.begin_frame(Some(&mut detector), frame()).unwrap();
        let report = frames
            .finish_frame(&mut scene, &mut renderer, &camera(), now)
            .unwrap();
        assert_eq!(report, FrameReport::default());
        assert_eq!(renderer.calls, 1);

        let obj = scene.get(id).unwrap();
        assert_ne!(obj.position().y, -0.5);
        assert_ne!(obj.transform().rotation.angle(), 0.0);
        assert_eq!(obj.transform().scale, Vector3::repeat(1.0));
    }

    #[test]
    fn touching_hand_triggers_object() {
        let (mut scene, id) = scene();
        let mut renderer = CountingRenderer::default();
        let mut detector = Detector::inline(
            DetectorConfig::default(),
            |_: &Image| -> anyhow::Result<Vec<Hand>> {
                Ok(vec![Hand::uniform(Landmark::new(0.0, -0.5, -2.0))])
            },
        )
        .unwrap();
        let mut frames = FrameLoop::default();

        frames.begin_frame(Some(&mut detector), frame()).unwrap();
        let report = frames
            .finish_frame(&mut scene, &mut renderer, &camera(), Duration::ZERO)
            .unwrap();
        assert_eq!(report.hands, 1);
        assert_eq!(report.triggered, [id]);
        assert_eq!(scene.get(id).unwrap().transform().scale, Vector3::repeat(1.2));
        assert!(frames.animator().is_active(id));
    }

    #[test]
    fn reversion_and_trigger_in_same_frame() {
        let (mut scene, id) = scene();
        let touching = [Hand::uniform(Landmark::new(0.0, -0.5, -2.0))];
        let mut frames = FrameLoop::default();

        frames.update(&mut scene, &touching, Duration::ZERO);
        frames.update(&mut scene, &touching, Duration::from_millis(1000));
        assert_eq!(scene.get(id).unwrap().transform().scale, Vector3::repeat(1.2));

        frames.update(&mut scene, &[], Duration::from_millis(1999));
        assert_eq!(scene.get(id).unwrap().transform().scale, Vector3::repeat(1.2));
        frames.update(&mut scene, &[], Duration::from_millis(2000));
        assert_eq!(scene.get(id).unwrap().transform().scale, Vector3::repeat(1.0));
    }

    #[test]
    fn detection_errors_keep_the_loop_usable() {
        let (mut scene, _) = scene();
        let mut renderer = CountingRenderer::default();
        let mut detector = Detector::inline(
            DetectorConfig::default(),
            |_: &Image| -> anyhow::Result<Vec<Hand>> { bail!("no model") },
        )
        .unwrap();
        let mut frames = FrameLoop::default();

        frames.begin_frame(Some(&mut detector), frame()).unwrap();
        let err = frames
            .finish_frame(&mut scene, &mut renderer, &camera(), Duration::ZERO)
            .unwrap_err();
        assert_eq!(format!("{err:#}"), "hand detection failed: no model");
        assert!(err.downcast_ref::<DetectionFailed>().is_some());
        assert_eq!(renderer.calls, 1);
        assert!(frames.begin_frame(Some(&mut detector), frame()).is_ok());
    }
}
