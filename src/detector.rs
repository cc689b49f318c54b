//! Hand detector configuration and invocation.
//!
//! The hand landmark model is provided by the user through the [`HandDetector`] trait. This module
//! wraps it in a [`Detector`], which validates the configuration, enforces the configured limits
//! on every result, and optionally moves the detection work to a dedicated worker thread.

use std::{
    error::Error as StdError,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::anyhow;
use pawawwewism::{promise, Promise, PromiseHandle, Worker};

use crate::{
    image::Image,
    landmark::{Hand, LandmarkSpace},
    timer::Timer,
};

/// Size/accuracy trade-off of the landmark model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelComplexity {
    Lite,
    #[default]
    Full,
}

impl ModelComplexity {
    /// File name of the landmark model for this complexity level.
    pub fn model_file(self) -> &'static str {
        match self {
            Self::Lite => "hand_landmark_lite.onnx",
            Self::Full => "hand_landmark_full.onnx",
        }
    }
}

/// Validated hand detector configuration.
///
/// Created through [`DetectorConfig::builder`]; every field has a documented default, so
/// `DetectorConfig::default()` is always valid.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    max_hands: usize,
    min_detection_confidence: f32,
    min_tracking_confidence: f32,
    model_path: PathBuf,
    static_image_mode: bool,
    model_complexity: ModelComplexity,
    self_facing: bool,
    landmark_space: LandmarkSpace,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_hands: 2,
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            model_path: PathBuf::from("models/hands"),
            static_image_mode: false,
            model_complexity: ModelComplexity::Full,
            self_facing: false,
            landmark_space: LandmarkSpace::ImageNormalized,
        }
    }
}

impl DetectorConfig {
    pub fn builder() -> DetectorConfigBuilder {
        DetectorConfigBuilder {
            config: Self::default(),
        }
    }

    /// Maximum number of hands reported per frame.
    #[inline]
    pub fn max_hands(&self) -> usize {
        self.max_hands
    }

    /// Minimum presence score for a hand to be reported at all.
    #[inline]
    pub fn min_detection_confidence(&self) -> f32 {
        self.min_detection_confidence
    }

    /// Minimum landmark score for a tracked hand to keep being tracked without re-running palm
    /// detection. Only meaningful when [`DetectorConfig::static_image_mode`] is off.
    #[inline]
    pub fn min_tracking_confidence(&self) -> f32 {
        self.min_tracking_confidence
    }

    /// Directory containing the model files.
    #[inline]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Whether every frame is treated as an unrelated image, running full palm detection each
    /// time instead of tracking hands from the previous frame.
    #[inline]
    pub fn static_image_mode(&self) -> bool {
        self.static_image_mode
    }

    #[inline]
    pub fn model_complexity(&self) -> ModelComplexity {
        self.model_complexity
    }

    /// Whether the camera faces the user, in which case landmarks are mirrored horizontally so
    /// that they line up with a mirrored preview.
    ///
    /// Mirroring follows [`DetectorConfig::landmark_space`].
    #[inline]
    pub fn self_facing(&self) -> bool {
        self.self_facing
    }

    /// Coordinate space the detector reports landmarks in.
    ///
    /// Image-normalized for the overlay flow (the default), scene units for scene interaction.
    #[inline]
    pub fn landmark_space(&self) -> LandmarkSpace {
        self.landmark_space
    }

    /// Resolves a model file name to its location inside [`DetectorConfig::model_path`].
    pub fn locate_file(&self, file: &str) -> PathBuf {
        self.model_path.join(file)
    }

    /// Returns the location of the landmark model selected by the configured complexity.
    pub fn landmark_model(&self) -> PathBuf {
        self.locate_file(self.model_complexity.model_file())
    }

    /// Drops hands below the detection confidence threshold and limits the result to the
    /// configured number of hands, keeping the most confident ones.
    ///
    /// Hands are returned in the order the detector reported them.
    pub fn filter_hands(&self, mut hands: Vec<Hand>) -> Vec<Hand> {
        hands.retain(|hand| hand.score() >= self.min_detection_confidence);
        if hands.len() > self.max_hands {
            let mut ranked = (0..hands.len()).collect::<Vec<_>>();
            ranked.sort_by(|&a, &b| hands[b].score().total_cmp(&hands[a].score()));
            ranked.truncate(self.max_hands);
            ranked.sort_unstable();

            let mut index = 0;
            hands.retain(|_| {
                let keep = ranked.binary_search(&index).is_ok();
                index += 1;
                keep
            });
        }
        if self.self_facing {
            for hand in &mut hands {
                hand.mirror_x(self.landmark_space);
            }
        }
        hands
    }
}

/// Builder for [`DetectorConfig`].
#[derive(Debug, Clone)]
pub struct DetectorConfigBuilder {
    config: DetectorConfig,
}

impl DetectorConfigBuilder {
    pub fn max_hands(mut self, max_hands: usize) -> Self {
        self.config.max_hands = max_hands;
        self
    }

    pub fn min_detection_confidence(mut self, confidence: f32) -> Self {
        self.config.min_detection_confidence = confidence;
        self
    }

    pub fn min_tracking_confidence(mut self, confidence: f32) -> Self {
        self.config.min_tracking_confidence = confidence;
        self
    }

    pub fn model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.model_path = path.into();
        self
    }

    pub fn static_image_mode(mut self, enable: bool) -> Self {
        self.config.static_image_mode = enable;
        self
    }

    pub fn model_complexity(mut self, complexity: ModelComplexity) -> Self {
        self.config.model_complexity = complexity;
        self
    }

    pub fn self_facing(mut self, enable: bool) -> Self {
        self.config.self_facing = enable;
        self
    }

    pub fn landmark_space(mut self, space: LandmarkSpace) -> Self {
        self.config.landmark_space = space;
        self
    }

    /// Validates the configuration.
    pub fn build(self) -> Result<DetectorConfig, ConfigError> {
        let config = self.config;
        if config.max_hands == 0 {
            return Err(ConfigError::NoHands);
        }
        for (name, value) in [
            ("min_detection_confidence", config.min_detection_confidence),
            ("min_tracking_confidence", config.min_tracking_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ConfidenceOutOfRange { name, value });
            }
        }
        if config.model_path.as_os_str().is_empty() {
            return Err(ConfigError::EmptyModelPath);
        }
        Ok(config)
    }
}

/// Error returned by [`DetectorConfigBuilder::build`] for invalid configurations.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    NoHands,
    ConfidenceOutOfRange { name: &'static str, value: f32 },
    EmptyModelPath,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoHands => f.write_str("`max_hands` must be at least 1"),
            ConfigError::ConfidenceOutOfRange { name, value } => {
                write!(f, "`{name}` must be between 0.0 and 1.0 (got {value})")
            }
            ConfigError::EmptyModelPath => f.write_str("`model_path` must not be empty"),
        }
    }
}

impl StdError for ConfigError {}

/// A hand landmark detection model.
///
/// Implementors report every hand they find in an image. Coordinates may be image-normalized (for
/// the overlay flow) or in scene units (for scene interaction); the detector decides.
pub trait HandDetector: Send {
    /// Applies the detector configuration. Called once when the detector is wrapped in a
    /// [`Detector`].
    ///
    /// Detectors that cannot honor a setting should return an error here instead of ignoring it.
    fn configure(&mut self, config: &DetectorConfig) -> anyhow::Result<()> {
        let _ = config;
        Ok(())
    }

    /// Runs detection on `image`.
    fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<Hand>>;
}

impl<F> HandDetector for F
where
    F: FnMut(&Image) -> anyhow::Result<Vec<Hand>> + Send,
{
    fn detect(&mut self, image: &Image) -> anyhow::Result<Vec<Hand>> {
        self(image)
    }
}

/// The output of one detection pass: the image that was analyzed and the hands found in it.
#[derive(Debug, Clone)]
pub struct Detection {
    image: Arc<Image>,
    hands: Vec<Hand>,
}

impl Detection {
    pub fn new(image: Arc<Image>, hands: Vec<Hand>) -> Self {
        Self { image, hands }
    }

    #[inline]
    pub fn image(&self) -> &Image {
        &self.image
    }

    #[inline]
    pub fn hands(&self) -> &[Hand] {
        &self.hands
    }

    pub fn into_hands(self) -> Vec<Hand> {
        self.hands
    }
}

type Request = (Arc<Image>, Promise<anyhow::Result<Vec<Hand>>>);

enum Backend {
    Inline {
        detector: Box<dyn HandDetector>,
        t_detect: Timer,
    },
    Worker(Worker<Request>),
}

/// A configured hand detector.
///
/// Detection is requested with [`Detector::request`], which returns a [`PendingDetection`] that
/// must be waited on to obtain the result. At most one request is expected to be in flight at a
/// time.
pub struct Detector {
    config: Arc<DetectorConfig>,
    backend: Backend,
}

impl Detector {
    /// Wraps `detector`, running it on the calling thread.
    pub fn inline<D: HandDetector + 'static>(
        config: DetectorConfig,
        mut detector: D,
    ) -> anyhow::Result<Self> {
        detector.configure(&config)?;
        log::debug!("created inline hand detector with {:?}", config);
        Ok(Self {
            config: Arc::new(config),
            backend: Backend::Inline {
                detector: Box::new(detector),
                t_detect: Timer::new("detect"),
            },
        })
    }

    /// Wraps `detector`, running it on a dedicated worker thread.
    ///
    /// Dropping the returned [`Detector`] waits for the worker thread to exit.
    pub fn spawn<D: HandDetector + 'static>(
        config: DetectorConfig,
        mut detector: D,
    ) -> anyhow::Result<Self> {
        detector.configure(&config)?;
        let config = Arc::new(config);
        let mut t_detect = Timer::new("detect");
        let worker = Worker::builder().name("hand detector").spawn({
            let config = config.clone();
            move |(image, promise): Request| {
                let result = t_detect.time(|| detector.detect(&image));
                promise.fulfill(result.map(|hands| config.filter_hands(hands)));
                log::trace!("{}", t_detect);
            }
        })?;
        log::debug!("spawned hand detector worker with {:?}", config);
        Ok(Self {
            config,
            backend: Backend::Worker(worker),
        })
    }

    #[inline]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Starts a detection pass over `image`.
    pub fn request(&mut self, image: Arc<Image>) -> PendingDetection {
        let state = match &mut self.backend {
            Backend::Inline { detector, t_detect } => {
                let result = t_detect.time(|| detector.detect(&image));
                Pending::Ready(result.map(|hands| self.config.filter_hands(hands)))
            }
            Backend::Worker(worker) => {
                let (promise, handle) = promise();
                worker.send((image.clone(), promise));
                Pending::Promised(handle)
            }
        };
        PendingDetection { image, state }
    }

    /// Runs a detection pass over `image` and waits for its result.
    pub fn detect(&mut self, image: Arc<Image>) -> anyhow::Result<Detection> {
        self.request(image).wait()
    }

    /// Returns the profiling timer of an inline detector.
    pub fn timers(&mut self) -> impl Iterator<Item = &mut Timer> + '_ {
        match &mut self.backend {
            Backend::Inline { t_detect, .. } => Some(t_detect),
            Backend::Worker(_) => None,
        }
        .into_iter()
    }
}

enum Pending {
    Ready(anyhow::Result<Vec<Hand>>),
    Promised(PromiseHandle<anyhow::Result<Vec<Hand>>>),
}

/// An in-flight detection pass started by [`Detector::request`].
pub struct PendingDetection {
    image: Arc<Image>,
    state: Pending,
}

impl PendingDetection {
    /// Blocks until the detection pass has finished.
    pub fn wait(self) -> anyhow::Result<Detection> {
        let hands = match self.state {
            Pending::Ready(result) => result?,
            Pending::Promised(handle) => handle
                .block()
                .map_err(|_| anyhow!("hand detector worker exited without producing a result"))??,
        };
        log::trace!("detected {} hand(s)", hands.len());
        Ok(Detection::new(self.image, hands))
    }
}
