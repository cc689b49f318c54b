//! 2D hand skeleton overlays.
//!
//! [`draw_results`] paints a detection result onto a drawing surface: the analyzed camera frame
//! as the background, and the skeleton of every detected hand on top of it. [`Overlay`] runs
//! camera, detector and drawing in a loop.
//!
//! Landmarks are expected to be normalized to the `0..1` range of the camera frame.

use std::sync::Arc;

use crate::{
    detector::{Detection, Detector},
    image::{draw, Color, Image},
    resolution::Resolution,
    timer::{FpsCounter, Timer},
    video::FrameSource,
};

/// Colors and stroke widths of the overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayStyle {
    /// Color of the lines connecting adjacent landmarks.
    pub connector_color: Color,
    pub connector_width: u32,
    /// Color of the landmark markers.
    pub landmark_color: Color,
    pub landmark_width: u32,
    /// Diameter of the landmark markers, in pixels. Odd values center the marker on the landmark.
    pub landmark_diameter: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            connector_color: Color::GREEN,
            connector_width: 5,
            landmark_color: Color::RED,
            landmark_width: 2,
            landmark_diameter: 7,
        }
    }
}

/// Draws a detection result onto `canvas`.
///
/// The canvas is cleared, the analyzed image is drawn over all of it (scaled to fit), and then
/// every hand's connectors are drawn, followed by a marker for each of its landmarks.
pub fn draw_results(canvas: &mut Image, detection: &Detection, style: &OverlayStyle) {
    let res = canvas.resolution();
    canvas.clear(Color::NULL);
    canvas.draw_image(detection.image());

    for hand in detection.hands() {
        for (start, end) in hand.connections() {
            let (sx, sy) = start.to_pixel(res);
            let (ex, ey) = end.to_pixel(res);
            draw::line(canvas, sx as i32, sy as i32, ex as i32, ey as i32)
                .color(style.connector_color)
                .stroke_width(style.connector_width);
        }
        for landmark in hand.landmarks() {
            let (x, y) = landmark.to_pixel(res);
            draw::circle(canvas, x as i32, y as i32, style.landmark_diameter)
                .color(style.landmark_color)
                .stroke_width(style.landmark_width);
        }
    }
}

/// Reads camera frames, detects hands in them and draws the results.
pub struct Overlay<S: FrameSource> {
    source: S,
    detector: Detector,
    canvas: Image,
    style: OverlayStyle,
    fps: FpsCounter,
    t_draw: Timer,
}

impl<S: FrameSource> Overlay<S> {
    /// Creates an overlay drawing onto a canvas of resolution `res`.
    pub fn new(source: S, detector: Detector, res: Resolution) -> Self {
        Self {
            source,
            detector,
            canvas: Image::new(res.width(), res.height()),
            style: OverlayStyle::default(),
            fps: FpsCounter::new("overlay"),
            t_draw: Timer::new("draw"),
        }
    }

    pub fn with_style(self, style: OverlayStyle) -> Self {
        Self { style, ..self }
    }

    #[inline]
    pub fn canvas(&self) -> &Image {
        &self.canvas
    }

    /// Processes the next camera frame and returns the updated canvas.
    pub fn next_frame(&mut self) -> anyhow::Result<&Image> {
        let image = Arc::new(self.source.read()?);
        let detection = self.detector.request(image).wait()?;
        self.t_draw
            .time(|| draw_results(&mut self.canvas, &detection, &self.style));

        let detector_timers = self.detector.timers();
        self.fps.tick_with(
            self.source
                .timers()
                .into_iter()
                .chain(detector_timers)
                .chain([&mut self.t_draw]),
        );
        Ok(&self.canvas)
    }
}
