//! Draws hand skeletons over webcam frames and saves the result.
//!
//! No hand landmark model is bundled, so this uses a stand-in detector that reports a single
//! waving hand. Replace it with a real [`HandDetector`] to track actual hands.
//!
//! Usage: `cargo run --example overlay [frames]`
//!
//! [`HandDetector`]: fingertip::detector::HandDetector

use std::{env, f32::consts::TAU};

use fingertip::{
    app::open_camera,
    detector::{Detector, DetectorConfig},
    image::Image,
    landmark::{Hand, Landmark, NUM_LANDMARKS},
    overlay::Overlay,
    video::webcam::WebcamOptions,
};

struct WavingHand {
    frame: u32,
}

impl fingertip::detector::HandDetector for WavingHand {
    fn detect(&mut self, _: &Image) -> anyhow::Result<Vec<Hand>> {
        self.frame += 1;
        let sway = (self.frame as f32 / 60.0 * TAU).sin() * 0.1;
        let mut lms = [Landmark::default(); NUM_LANDMARKS];
        lms[0] = Landmark::new(0.5, 0.85, 0.0);
        for (i, lm) in lms.iter_mut().enumerate().skip(1) {
            let finger = (i - 1) / 4;
            let joint = (i - 1) % 4 + 1;
            let x = 0.35 + finger as f32 * 0.075 + sway * joint as f32 / 4.0;
            *lm = Landmark::new(x, 0.75 - joint as f32 * 0.08, 0.0);
        }
        Ok(vec![Hand::new(lms)])
    }
}

fn main() -> anyhow::Result<()> {
    fingertip::init_logger!();

    let frames: u32 = match env::args().nth(1) {
        Some(n) => n.parse()?,
        None => 120,
    };

    let webcam = open_camera(WebcamOptions::default())?;
    let res = webcam.resolution();
    let config = DetectorConfig::builder()
        .max_hands(2)
        .min_detection_confidence(0.5)
        .min_tracking_confidence(0.5)
        .build()?;
    let detector = Detector::spawn(config, WavingHand { frame: 0 })?;

    let mut overlay = Overlay::new(webcam, detector, res);
    for frame in 0..frames {
        let canvas = overlay.next_frame()?;
        if frame % 30 == 0 {
            canvas.save(format!("overlay-{frame:04}.png"))?;
        }
    }
    Ok(())
}
