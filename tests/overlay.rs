use std::fs;

use fingertip::{
    detector::{Detector, DetectorConfig},
    image::{Color, Image},
    landmark::{Hand, Landmark, LandmarkIdx, LandmarkSpace, NUM_LANDMARKS},
    overlay::{Overlay, OverlayStyle},
    resolution::Resolution,
};

/// An open hand in image-normalized coordinates, roughly centered in the frame.
fn open_hand() -> Hand {
    let mut lms = [Landmark::default(); NUM_LANDMARKS];
    lms[LandmarkIdx::Wrist as usize] = Landmark::new(0.5, 0.9, 0.0);
    let fingers = [
        LandmarkIdx::ThumbCmc,
        LandmarkIdx::IndexFingerMcp,
        LandmarkIdx::MiddleFingerMcp,
        LandmarkIdx::RingFingerMcp,
        LandmarkIdx::PinkyMcp,
    ];
    for (finger, base) in fingers.into_iter().enumerate() {
        let x = 0.3 + finger as f32 * 0.1;
        for joint in 0..4 {
            let y = 0.7 - joint as f32 * 0.1;
            lms[base as usize + joint] = Landmark::new(x, y, 0.0);
        }
    }
    Hand::new(lms)
}

#[test]
fn overlay_draws_two_hands_over_camera_frame() {
    let detector = Detector::spawn(
        DetectorConfig::default(),
        |_: &Image| -> anyhow::Result<Vec<Hand>> {
            let mut mirrored = open_hand();
            mirrored.mirror_x(LandmarkSpace::ImageNormalized);
            Ok(vec![open_hand(), mirrored, open_hand().with_score(0.1)])
        },
    )
    .unwrap();

    let mut frames = 0;
    let source = move || -> anyhow::Result<Image> {
        frames += 1;
        Ok(Image::filled(Resolution::new(64, 36), Color::from_rgb8(0, 0, frames)))
    };

    let style = OverlayStyle {
        connector_color: Color::YELLOW,
        ..OverlayStyle::default()
    };
    let mut overlay = Overlay::new(source, detector, Resolution::new(320, 180)).with_style(style);

    let canvas = overlay.next_frame().unwrap();
    let yellow = canvas.count_pixels(Color::YELLOW);
    let red = canvas.count_pixels(Color::RED);
    assert!(yellow > 0);
    assert!(red > 0);
    assert_eq!(canvas.count_pixels(Color::GREEN), 0);

    // The same detections on the next frame produce the same drawing.
    let canvas = overlay.next_frame().unwrap();
    assert_eq!(canvas.count_pixels(Color::YELLOW), yellow);
    assert_eq!(canvas.count_pixels(Color::RED), red);
    // Top left corner shows the (stretched) second camera frame.
    assert_eq!(canvas.get(0, 0).b(), 2);
}

#[test]
fn overlay_output_can_be_saved() {
    let detector = Detector::inline(
        DetectorConfig::default(),
        |_: &Image| -> anyhow::Result<Vec<Hand>> { Ok(vec![open_hand()]) },
    )
    .unwrap();
    let source = || -> anyhow::Result<Image> {
        Ok(Image::filled(Resolution::new(40, 30), Color::BLACK))
    };
    let mut overlay = Overlay::new(source, detector, Resolution::new(40, 30));
    let canvas = overlay.next_frame().unwrap().clone();

    let path = std::env::temp_dir().join(format!("fingertip-overlay-{}.png", std::process::id()));
    canvas.save(&path).unwrap();
    let loaded = Image::load(&path).unwrap();
    assert_eq!(loaded.resolution(), canvas.resolution());
    assert_eq!(loaded.data(), canvas.data());
    fs::remove_file(&path).ok();
}
