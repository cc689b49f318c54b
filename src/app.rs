//! The scene interaction controller.
//!
//! [`App`] owns everything the interaction flow needs: the scene, the camera looking at it, the
//! renderer, the optional hand detector and the [`FrameLoop`]. It is created once with
//! [`App::init`], fed one camera frame at a time, and torn down with [`App::teardown`].

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use nalgebra::Vector3;

use crate::{
    anim::{ScaleAnimator, TriggerParams},
    detector::Detector,
    frame::{DetectionFailed, FrameLoop, FrameReport},
    image::Image,
    interaction::{IdleMotion, InteractionParams},
    model::{load_model_async, Model, ModelLoad},
    render::Renderer,
    scene::{PerspectiveCamera, Scene, SceneBuilder},
    timer::FpsCounter,
    video::{
        webcam::{Webcam, WebcamOptions},
        FrameSource,
    },
};

/// Where the model of an object comes from.
#[derive(Debug, Clone)]
pub enum ModelSource {
    /// A Wavefront OBJ file, loaded in the background during [`App::init`].
    File(PathBuf),
    /// The built-in unit cube.
    Cube,
}

/// An object to place in the scene on startup.
#[derive(Debug, Clone)]
pub struct ObjectPlacement {
    pub source: ModelSource,
    pub position: Vector3<f32>,
}

impl ObjectPlacement {
    pub fn new(source: ModelSource, position: Vector3<f32>) -> Self {
        Self { source, position }
    }
}

/// Camera parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    /// Vertical field of view, in degrees.
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vector3<f32>,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            fov_y_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            position: Vector3::new(0.0, 0.0, 5.0),
        }
    }
}

/// Configuration of an [`App`].
///
/// The default places three cubes in a row at `x = -2, 0, 2` (`y = -0.5`, `z = -2`) in front of a
/// camera at `(0, 0, 5)`.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub camera: CameraParams,
    pub objects: Vec<ObjectPlacement>,
    pub interaction: InteractionParams,
    pub idle: IdleMotion,
    pub trigger: TriggerParams,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            camera: CameraParams::default(),
            objects: [-2.0, 0.0, 2.0]
                .into_iter()
                .map(|x| ObjectPlacement::new(ModelSource::Cube, Vector3::new(x, -0.5, -2.0)))
                .collect(),
            interaction: InteractionParams::default(),
            idle: IdleMotion::default(),
            trigger: TriggerParams::default(),
        }
    }
}

impl AppConfig {
    /// Replaces the default objects with models loaded from `paths`, placed at the default
    /// positions.
    ///
    /// Only as many models as there are default positions are used.
    pub fn with_models<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.objects = self
            .objects
            .iter()
            .zip(paths)
            .map(|(placement, path)| {
                ObjectPlacement::new(ModelSource::File(path.into()), placement.position)
            })
            .collect();
        self
    }
}

/// Opens the camera used as the frame source.
///
/// Failures are logged and returned; there is no retry.
pub fn open_camera(options: WebcamOptions) -> anyhow::Result<Webcam> {
    Webcam::open(options).map_err(|e| {
        log::error!("error accessing the camera: {:#}", e);
        e
    })
}

/// The scene interaction controller.
pub struct App<R: Renderer> {
    scene: Scene,
    camera: PerspectiveCamera,
    renderer: R,
    detector: Option<Detector>,
    frame_loop: FrameLoop,
    start: Instant,
}

impl<R: Renderer> App<R> {
    /// Sets up the camera and the scene, loading all models, and prepares the frame loop.
    ///
    /// Fails if the renderer's surface is empty or the camera planes are invalid. Models that fail
    /// to load are logged and left out of the scene. Without a `detector`, the objects only perform
    /// their idle motion.
    pub fn init(
        config: AppConfig,
        renderer: R,
        detector: Option<Detector>,
    ) -> anyhow::Result<Self> {
        let res = renderer.resolution();
        let camera = PerspectiveCamera::new(
            config.camera.fov_y_degrees,
            res,
            config.camera.near,
            config.camera.far,
        )?
        .with_position(config.camera.position);
        log::info!(
            "camera at {:?}, fov {}°, rendering at {}",
            camera.position().as_slice(),
            camera.fov_y_degrees(),
            res
        );

        // Start every load before waiting on any of them.
        let loads = config
            .objects
            .iter()
            .map(|placement| match &placement.source {
                ModelSource::File(path) => Pending::Loading(load_model_async(path.clone())),
                ModelSource::Cube => Pending::Ready(Model::cube("cube")),
            })
            .collect::<Vec<_>>();

        let mut builder = SceneBuilder::new();
        for (placement, load) in config.objects.iter().zip(loads) {
            let model = match load {
                Pending::Ready(model) => Ok(model),
                Pending::Loading(load) => load.and_then(ModelLoad::wait),
            };
            match model {
                Ok(model) => {
                    builder.add(model, placement.position);
                }
                Err(e) => log::error!("failed to load model: {:#}", e),
            }
        }
        let scene = builder.build();
        if scene.is_empty() {
            log::warn!("scene has no objects");
        }

        let frame_loop = FrameLoop::new(
            config.interaction,
            config.idle,
            ScaleAnimator::new(config.trigger),
        );
        if detector.is_none() {
            log::info!("no hand detector, objects will only idle");
        }

        Ok(Self {
            scene,
            camera,
            renderer,
            detector,
            frame_loop,
            start: Instant::now(),
        })
    }

    #[inline]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[inline]
    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    #[inline]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    #[inline]
    pub fn frame_loop(&self) -> &FrameLoop {
        &self.frame_loop
    }

    /// Processes one camera frame, timed by the wall clock since [`App::init`].
    pub fn frame(&mut self, image: Image) -> anyhow::Result<FrameReport> {
        let now = self.start.elapsed();
        self.frame_at(Arc::new(image), now)
    }

    /// Processes one camera frame at time `now`, measured from an arbitrary fixed start.
    pub fn frame_at(&mut self, image: Arc<Image>, now: Duration) -> anyhow::Result<FrameReport> {
        self.frame_loop.begin_frame(self.detector.as_mut(), image)?;
        let report = self.frame_loop.finish_frame(
            &mut self.scene,
            &mut self.renderer,
            &self.camera,
            now,
        )?;
        if !report.triggered.is_empty() {
            log::debug!("{} hand(s) triggered {:?}", report.hands, report.triggered);
        }
        Ok(report)
    }

    /// Processes frames from `source` until it fails or `max_frames` have been processed.
    ///
    /// Failed detections are logged and the loop continues with the next frame. Errors from the
    /// frame source or the renderer end the loop.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        max_frames: Option<u64>,
    ) -> anyhow::Result<()> {
        let mut fps = FpsCounter::new("interaction");
        let mut frames = 0;
        while max_frames.map_or(true, |max| frames < max) {
            let image = source.read()?;
            match self.frame(image) {
                Ok(_) => {}
                Err(e) if e.downcast_ref::<DetectionFailed>().is_some() => {
                    log::error!("{:#}", e);
                }
                Err(e) => return Err(e),
            }
            frames += 1;

            let detector_timers = self.detector.iter_mut().flat_map(|d| d.timers());
            fps.tick_with(
                source
                    .timers()
                    .into_iter()
                    .chain(self.renderer.timers())
                    .chain(detector_timers),
            );
        }
        Ok(())
    }

    /// Stops the controller, returning the renderer.
    ///
    /// Dropping the detector waits for its worker thread (if any) to exit.
    pub fn teardown(self) -> R {
        log::info!(
            "tearing down after {} frames ({:.1}s)",
            self.frame_loop.frames(),
            self.start.elapsed().as_secs_f32()
        );
        drop(self.detector);
        self.renderer
    }
}

enum Pending {
    Ready(Model),
    Loading(anyhow::Result<ModelLoad>),
}

#[cfg(test)]
mod tests {
    use crate::{
        detector::DetectorConfig,
        landmark::{Hand, Landmark},
        render::SoftwareRenderer,
        resolution::Resolution,
    };

    use super::*;

    fn renderer() -> SoftwareRenderer {
        SoftwareRenderer::new(Resolution::new(64, 48))
    }

    #[test]
    fn default_scene() {
        let app = App::init(AppConfig::default(), renderer(), None).unwrap();
        let xs = app.scene().objects().map(|o| o.position().x).collect::<Vec<_>>();
        assert_eq!(xs, [-2.0, 0.0, 2.0]);
        assert_eq!(app.camera().position(), Vector3::new(0.0, 0.0, 5.0));
        assert_eq!(app.camera().aspect(), 64.0 / 48.0);
    }

    #[test]
    fn failed_loads_are_skipped() {
        let config = AppConfig::default().with_models(["/nonexistent/a.obj"]);
        let app = App::init(config, renderer(), None).unwrap();
        assert!(app.scene().is_empty());
    }

    #[test]
    fn frames_without_detector() {
        let mut app = App::init(AppConfig::default(), renderer(), None).unwrap();
        let report = app
            .frame_at(Arc::new(Image::new(8, 8)), Duration::from_millis(16))
            .unwrap();
        assert_eq!(report, FrameReport::default());
        assert_eq!(app.frame_loop().frames(), 1);
        let renderer = app.teardown();
        assert!(renderer.surface().count_pixels(crate::image::Color::WHITE) > 0);
    }

    #[test]
    fn run_stops_after_max_frames() {
        let detector = Detector::spawn(
            DetectorConfig::default(),
            |_: &Image| -> anyhow::Result<Vec<Hand>> {
                Ok(vec![Hand::uniform(Landmark::new(2.0, -0.5, -2.0))])
            },
        )
        .unwrap();
        let mut app = App::init(AppConfig::default(), renderer(), Some(detector)).unwrap();
        let mut source = || -> anyhow::Result<Image> { Ok(Image::new(8, 8)) };
        app.run(&mut source, Some(3)).unwrap();
        assert_eq!(app.frame_loop().frames(), 3);
        let right = app.scene().objects().last().unwrap();
        assert_eq!(right.transform().scale, Vector3::repeat(1.2));
    }

    #[test]
    fn empty_surface_fails_init() {
        let empty = SoftwareRenderer::new(Resolution::new(0, 0));
        assert!(App::init(AppConfig::default(), empty, None).is_err());

        let mut config = AppConfig::default();
        config.camera.near = 10.0;
        config.camera.far = 1.0;
        assert!(App::init(config, renderer(), None).is_err());
    }

    #[test]
    fn run_continues_after_failed_detection() {
        let mut calls = 0;
        let detector = Detector::inline(
            DetectorConfig::default(),
            move |_: &Image| -> anyhow::Result<Vec<Hand>> {
                calls += 1;
                if calls % 2 == 0 {
                    anyhow::bail!("lost track of the hand");
                }
                Ok(vec![Hand::uniform(Landmark::new(0.0, -0.5, -2.0))])
            },
        )
        .unwrap();
        let mut app = App::init(AppConfig::default(), renderer(), Some(detector)).unwrap();
        let mut source = || -> anyhow::Result<Image> { Ok(Image::new(8, 8)) };
        app.run(&mut source, Some(4)).unwrap();
        assert_eq!(app.frame_loop().frames(), 4);

        let mut failing = || -> anyhow::Result<Image> { anyhow::bail!("camera unplugged") };
        assert!(app.run(&mut failing, Some(4)).is_err());
        assert_eq!(app.frame_loop().frames(), 4);
    }
}
