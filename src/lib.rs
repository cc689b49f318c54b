//! Hand landmark overlays and fingertip-driven scene interaction.
//!
//! This crate wires a camera, a hand landmark detector, and a drawing or rendering surface
//! together. It provides two flows:
//!
//! - [`overlay`]: draws the camera image and the skeletons of all detected hands onto a 2D
//!   [`Image`][image::Image].
//! - [`app`]: keeps a small [`Scene`][scene::Scene] of interactive objects that bob and spin on
//!   their own and pop up in size whenever the tip of an index finger comes close to them.
//!
//! The hand detection model itself is not part of this crate. Anything implementing
//! [`HandDetector`][detector::HandDetector] can be plugged in.
//!
//! # 3D Coordinates
//!
//! Scene coordinates use the usual right-handed convention: X points to the right, Y points up,
//! and the camera looks down the negative Z axis. Landmarks used for scene interaction are
//! expected to be in scene units already; landmarks used for 2D overlays are normalized to the
//! `0..1` range of the input image, with Y pointing *down*.
//!
//! # Environment Variables
//!
//! * `FINGERTIP_WEBCAM_NAME`: Forces the device to use for [`Webcam`]s created without an explicit
//!   device name. If unset, the first device that supports a compatible image format will be used.
//!
//! [`Webcam`]: video::webcam::Webcam

use log::LevelFilter;

pub mod anim;
pub mod app;
pub mod detector;
pub mod frame;
pub mod image;
pub mod interaction;
pub mod landmark;
pub mod model;
pub mod overlay;
pub mod render;
pub mod resolution;
pub mod scene;
pub mod timer;
pub mod video;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Trace
    } else {
        LevelFilter::Debug
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_PKG_NAME")), log_level)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and this crate will log at *trace*
/// level. Otherwise, they will log at *debug* level. `RUST_LOG` can be used to override this.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
