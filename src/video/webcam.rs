//! V4L2 webcam access.
//!
//! Only V4L2 `VIDEO_CAPTURE` devices yielding JFIF JPEG or Motion JPEG frames are supported.

use std::{cmp::Reverse, env};

use anyhow::bail;
use linuxvideo::{
    format::{FrameIntervals, FrameSizes, PixFormat, Pixelformat},
    stream::ReadStream,
    BufType, CapabilityFlags, Device, Fract,
};

use crate::{image::Image, resolution::Resolution, timer::Timer, video::FrameSource};

const ENV_VAR_WEBCAM_NAME: &str = "FINGERTIP_WEBCAM_NAME";

/// Indicates whether to prefer a higher resolution or frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamPreference {
    /// Keep the requested resolution, giving up frame rate if necessary.
    #[default]
    Resolution,
    /// Keep the requested frame rate, giving up resolution if necessary.
    Framerate,
}

/// The direction a camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacingMode {
    /// The camera faces the user, like a laptop webcam or a phone's front camera.
    ///
    /// Frames from user-facing cameras are mirrored horizontally, so that they look like a mirror
    /// image to the user.
    User,
    /// The camera faces away from the user, like a phone's back camera.
    #[default]
    Environment,
}

impl FacingMode {
    #[inline]
    pub fn is_self_facing(self) -> bool {
        self == Self::User
    }
}

#[derive(Debug, Clone, Copy)]
struct FramePrefs {
    resolution: Option<Resolution>,
    fps: Option<u32>,
    pref: ParamPreference,
}

/// Options controlling which device is opened and which format is negotiated.
///
/// By default, a 1280x720 stream at any frame rate is requested from an environment-facing
/// camera.
#[derive(Debug, Clone)]
pub struct WebcamOptions {
    name: Option<String>,
    frame: FramePrefs,
    facing: FacingMode,
}

impl Default for WebcamOptions {
    fn default() -> Self {
        Self {
            name: None,
            frame: FramePrefs {
                resolution: Some(Resolution::RES_720P),
                fps: None,
                pref: ParamPreference::default(),
            },
            facing: FacingMode::default(),
        }
    }
}

impl WebcamOptions {
    /// Sets the name of the webcam device to open.
    ///
    /// If no webcam with the given name can be found, opening the webcam will result in an error.
    pub fn name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the desired image resolution.
    ///
    /// A lower resolution might be selected if the webcam cannot deliver it.
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.frame.resolution = Some(resolution);
        self
    }

    /// Sets the desired frame rate.
    pub fn fps(mut self, fps: u32) -> Self {
        self.frame.fps = Some(fps);
        self
    }

    /// Selects which parameter is kept when the desired resolution and frame rate cannot both be
    /// delivered.
    pub fn prefer(mut self, pref: ParamPreference) -> Self {
        self.frame.pref = pref;
        self
    }

    pub fn facing(self, facing: FacingMode) -> Self {
        Self { facing, ..self }
    }
}

#[derive(Clone, Copy)]
struct FrameFormat {
    resolution: Resolution,
    frame_interval: Fract,
}

impl FrameFormat {
    fn fps(&self) -> f32 {
        1.0 / self.frame_interval.as_f32()
    }

    /// Frame rate in mHz, for use as a sort key.
    fn millihertz(&self) -> u32 {
        (self.fps() * 1000.0).round() as u32
    }
}

fn negotiate_format(device: &Device, mut prefs: FramePrefs) -> anyhow::Result<(PixFormat, Fract)> {
    let pixel_format = device
        .formats(BufType::VIDEO_CAPTURE)
        .filter_map(Result::ok)
        .map(|format| format.pixelformat())
        .find(|&fmt| fmt == Pixelformat::JPEG || fmt == Pixelformat::MJPG);
    let Some(pixel_format) = pixel_format else {
        bail!("device does not support JPEG or MJPG output");
    };

    let sizes = match device.frame_sizes(pixel_format)? {
        FrameSizes::Discrete(sizes) => sizes,
        FrameSizes::Stepwise(_) | FrameSizes::Continuous(_) => {
            bail!("stepwise or continuous resolutions are not supported");
        }
    };
    let mut formats = Vec::new();
    for size in sizes {
        let intervals = match device.frame_intervals(pixel_format, size.width(), size.height())? {
            FrameIntervals::Discrete(intervals) => intervals,
            FrameIntervals::Stepwise(_) | FrameIntervals::Continuous(_) => {
                bail!("stepwise or continuous frame rates are not supported")
            }
        };
        for rate in intervals {
            formats.push(FrameFormat {
                resolution: Resolution::new(size.width(), size.height()),
                frame_interval: *rate.fract(),
            });
        }
    }

    // Relax the preference we care less about first.
    loop {
        if let Some(fmt) = negotiate_format_step(&formats, prefs) {
            let pixfmt = PixFormat::new(
                fmt.resolution.width(),
                fmt.resolution.height(),
                pixel_format,
            );
            return Ok((pixfmt, fmt.frame_interval));
        }

        log::debug!("no format matches {:?}", prefs);
        let relaxed = match prefs.pref {
            ParamPreference::Resolution => {
                prefs.fps.take().is_some() || prefs.resolution.take().is_some()
            }
            ParamPreference::Framerate => {
                prefs.resolution.take().is_some() || prefs.fps.take().is_some()
            }
        };
        if !relaxed {
            bail!("device offers no usable formats");
        }
    }
}

/// Picks the format that best matches `prefs` out of `formats`.
///
/// Among the formats meeting the requested minimums, the one closest to the requested resolution
/// is picked, breaking ties by frame rate. With [`ParamPreference::Framerate`], the highest frame
/// rate is picked, breaking ties by closeness to the requested resolution.
fn negotiate_format_step(formats: &[FrameFormat], prefs: FramePrefs) -> Option<FrameFormat> {
    let eligible = formats.iter().copied().filter(|fmt| {
        let res_ok = prefs.resolution.map_or(true, |res| {
            fmt.resolution.width() >= res.width() && fmt.resolution.height() >= res.height()
        });
        let fps_ok = prefs.fps.map_or(true, |fps| fmt.fps().round() >= fps as f32);
        res_ok && fps_ok
    });

    // Without a requested resolution, the largest one is closest.
    let excess = |fmt: &FrameFormat| match prefs.resolution {
        Some(res) => fmt.resolution.num_pixels() - res.num_pixels(),
        None => u64::MAX - fmt.resolution.num_pixels(),
    };
    match prefs.pref {
        ParamPreference::Resolution => {
            eligible.min_by_key(|fmt| (excess(fmt), Reverse(fmt.millihertz())))
        }
        ParamPreference::Framerate => {
            eligible.min_by_key(|fmt| (Reverse(fmt.millihertz()), excess(fmt)))
        }
    }
}

/// A webcam yielding a stream of [`Image`]s.
pub struct Webcam {
    stream: ReadStream,
    resolution: Resolution,
    facing: FacingMode,
    t_dequeue: Timer,
    t_decode: Timer,
}

impl Webcam {
    /// Opens the first webcam that matches `options`.
    ///
    /// This function can block for a significant amount of time while the webcam initializes (on
    /// the order of hundreds of milliseconds).
    pub fn open(options: WebcamOptions) -> anyhow::Result<Self> {
        let name = options.name.clone().or_else(|| {
            let name = env::var(ENV_VAR_WEBCAM_NAME).ok()?;
            log::debug!("webcam override: `{ENV_VAR_WEBCAM_NAME}` is set to '{name}'");
            Some(name)
        });

        for res in linuxvideo::list()? {
            let dev = match res {
                Ok(dev) => dev,
                Err(e) => {
                    log::warn!("{}", e);
                    continue;
                }
            };
            match Self::open_device(dev, name.as_deref(), &options) {
                Ok(Some(webcam)) => return Ok(webcam),
                Ok(None) => {}
                Err(e) => log::debug!("{:#}", e),
            }
        }

        match name {
            Some(name) => bail!("no supported webcam named '{name}' found"),
            None => bail!("no supported webcam device found"),
        }
    }

    fn open_device(
        dev: Device,
        name: Option<&str>,
        options: &WebcamOptions,
    ) -> anyhow::Result<Option<Self>> {
        let caps = dev.capabilities()?;
        if name.map_or(false, |name| caps.card() != name) {
            return Ok(None);
        }

        let flags = caps.device_capabilities();
        let path = dev.path()?;
        log::debug!(
            "device {} ({}) capabilities: {:?}",
            caps.card(),
            path.display(),
            flags,
        );
        if !flags.contains(CapabilityFlags::VIDEO_CAPTURE) {
            return Ok(None);
        }

        let (pixfmt, interval) = negotiate_format(&dev, options.frame)?;
        let capture = dev.video_capture(pixfmt)?;
        let format = capture.format();
        let resolution = Resolution::new(format.width(), format.height());
        let actual = capture.set_frame_interval(interval)?;

        log::info!(
            "opened {} ({}), {} @ {:.1}Hz, facing {:?}",
            caps.card(),
            path.display(),
            resolution,
            1.0 / actual.as_f32(),
            options.facing,
        );

        Ok(Some(Self {
            stream: capture.into_stream(2)?,
            resolution,
            facing: options.facing,
            t_dequeue: Timer::new("dequeue"),
            t_decode: Timer::new("decode"),
        }))
    }

    #[inline]
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    #[inline]
    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    /// Reads the next frame from the camera.
    ///
    /// If no frame is available, this method will block until one is.
    pub fn read(&mut self) -> anyhow::Result<Image> {
        let dequeue_guard = self.t_dequeue.start();
        let mut image = self.stream.dequeue(|buf| {
            drop(dequeue_guard);
            let image = match self.t_decode.time(|| Image::decode_jpeg(&buf)) {
                Ok(image) => image,
                Err(e) => {
                    // Corrupted MJPG frames happen occasionally. A blank frame keeps the frame
                    // rate steady; skipping it would not.
                    log::error!("webcam decode error: {}", e);
                    Image::new(self.resolution.width(), self.resolution.height())
                }
            };
            Ok(image)
        })?;
        if self.facing.is_self_facing() {
            image.mirror_horizontally();
        }
        Ok(image)
    }
}

impl FrameSource for Webcam {
    fn read(&mut self) -> anyhow::Result<Image> {
        Webcam::read(self)
    }

    fn timers(&mut self) -> Vec<&mut Timer> {
        vec![&mut self.t_dequeue, &mut self.t_decode]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(width: u32, height: u32, fps: u32) -> FrameFormat {
        FrameFormat {
            resolution: Resolution::new(width, height),
            frame_interval: Fract::new(1, fps),
        }
    }

    fn prefs(
        resolution: Option<Resolution>,
        fps: Option<u32>,
        pref: ParamPreference,
    ) -> FramePrefs {
        FramePrefs {
            resolution,
            fps,
            pref,
        }
    }

    const FORMATS: &[(u32, u32, u32)] = &[
        (640, 480, 30),
        (640, 480, 60),
        (1280, 720, 30),
        (1920, 1080, 30),
        (1920, 1080, 15),
    ];

    fn formats() -> Vec<FrameFormat> {
        FORMATS.iter().map(|&(w, h, fps)| format(w, h, fps)).collect()
    }

    fn pick(prefs: FramePrefs) -> Option<(u32, u32, u32)> {
        negotiate_format_step(&formats(), prefs).map(|fmt| {
            (
                fmt.resolution.width(),
                fmt.resolution.height(),
                fmt.fps().round() as u32,
            )
        })
    }

    #[test]
    fn picks_closest_resolution() {
        let fmt = pick(prefs(Some(Resolution::RES_720P), None, ParamPreference::Resolution));
        assert_eq!(fmt, Some((1280, 720, 30)));

        let fmt = pick(prefs(None, None, ParamPreference::Resolution));
        assert_eq!(fmt, Some((1920, 1080, 30)));

        let fmt = pick(prefs(None, Some(60), ParamPreference::Resolution));
        assert_eq!(fmt, Some((640, 480, 60)));
    }

    #[test]
    fn framerate_preference() {
        let fmt = pick(prefs(None, None, ParamPreference::Framerate));
        assert_eq!(fmt, Some((640, 480, 60)));

        let fmt = pick(prefs(Some(Resolution::RES_720P), None, ParamPreference::Framerate));
        assert_eq!(fmt, Some((1280, 720, 30)));

        let fmt = pick(prefs(Some(Resolution::RES_720P), Some(60), ParamPreference::Framerate));
        assert_eq!(fmt, None);
    }

    #[test]
    fn default_options_request_720p_environment_camera() {
        let options = WebcamOptions::default();
        assert_eq!(options.frame.resolution, Some(Resolution::RES_720P));
        assert_eq!(options.facing, FacingMode::Environment);
        assert!(!options.facing.is_self_facing());
        assert!(WebcamOptions::default()
            .facing(FacingMode::User)
            .facing
            .is_self_facing());
    }
}
