//! Sweeps a simulated fingertip across the default scene and saves the rendered frames.
//!
//! Usage: `cargo run --example interaction [output-dir]`

use std::{
    env, fs,
    path::PathBuf,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::Duration,
};

use fingertip::{
    app::{App, AppConfig},
    detector::{Detector, DetectorConfig},
    image::Image,
    landmark::{Hand, Landmark, LandmarkSpace},
    render::SoftwareRenderer,
    resolution::Resolution,
};

const FRAMES: u32 = 360;
const FRAME_TIME: Duration = Duration::from_micros(16_667);

fn main() -> anyhow::Result<()> {
    fingertip::init_logger!();

    let out_dir = env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("interaction-frames"));
    fs::create_dir_all(&out_dir)?;

    // The fingertip moves from left to right in front of the objects, once per run.
    let frame_counter = Arc::new(AtomicU32::new(0));
    let config = DetectorConfig::builder()
        .landmark_space(LandmarkSpace::Scene)
        .build()?;
    let detector = Detector::spawn(config, {
        let frame_counter = frame_counter.clone();
        move |_: &Image| -> anyhow::Result<Vec<Hand>> {
            let frame = frame_counter.load(Ordering::Relaxed);
            let x = -3.0 + 6.0 * frame as f32 / FRAMES as f32;
            Ok(vec![Hand::uniform(Landmark::new(x, -0.5, -1.5))])
        }
    })?;

    let renderer = SoftwareRenderer::new(Resolution::new(640, 360));
    let mut app = App::init(AppConfig::default(), renderer, Some(detector))?;

    let camera_frame = Arc::new(Image::new(640, 360));
    for frame in 0..FRAMES {
        frame_counter.store(frame, Ordering::Relaxed);
        let report = app.frame_at(camera_frame.clone(), FRAME_TIME * frame)?;
        if !report.triggered.is_empty() {
            log::info!("frame {}: triggered {:?}", frame, report.triggered);
        }
        if frame % 10 == 0 {
            let path = out_dir.join(format!("frame-{frame:04}.png"));
            app.renderer().surface().save(&path)?;
        }
    }

    app.teardown();
    log::info!("saved frames to {}", out_dir.display());
    Ok(())
}
