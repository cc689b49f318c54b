//! Hand landmarks.
//!
//! A detector reports 21 landmarks per hand, in the order given by [`LandmarkIdx`]. The same
//! layout is used by MediaPipe's hand landmark model.

use std::ops::Index;

use nalgebra::Vector3;

use crate::resolution::Resolution;

/// Number of landmarks reported for every hand.
pub const NUM_LANDMARKS: usize = 21;

/// A landmark position in 3D space.
///
/// Depending on where it comes from, the coordinates are either normalized to the input image
/// (`0..1`, Y pointing down) or given in scene units.
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub struct Landmark {
    pos: [f32; 3],
}

impl Landmark {
    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { pos: [x, y, z] }
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.pos[0]
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.pos[1]
    }

    #[inline]
    pub fn z(&self) -> f32 {
        self.pos[2]
    }

    #[inline]
    pub fn position(&self) -> Vector3<f32> {
        Vector3::from(self.pos)
    }

    /// Computes the Euclidean distance between this landmark and a point.
    pub fn distance_to(&self, point: &Vector3<f32>) -> f32 {
        (self.position() - point).norm()
    }

    /// Maps an image-normalized landmark to pixel coordinates of an image or surface.
    pub fn to_pixel(&self, res: Resolution) -> (f32, f32) {
        res.denormalize(self.x(), self.y())
    }
}

impl From<[f32; 3]> for Landmark {
    fn from(pos: [f32; 3]) -> Self {
        Self { pos }
    }
}

impl From<Vector3<f32>> for Landmark {
    fn from(v: Vector3<f32>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

/// Coordinate space of a detector's landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LandmarkSpace {
    /// Normalized to the analyzed image: `0..1` on both axes, Y pointing down.
    #[default]
    ImageNormalized,
    /// Scene units, with X pointing right from the scene origin.
    Scene,
}

/// Which hand a set of landmarks belongs to, as reported by the detector.
///
/// "Left" and "Right" are from the PoV of the depicted person, assuming a mirrored (selfie)
/// input image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// The full set of landmarks of one detected hand.
#[derive(Debug, Clone, PartialEq)]
pub struct Hand {
    landmarks: [Landmark; NUM_LANDMARKS],
    score: f32,
    handedness: Handedness,
}

impl Hand {
    /// Creates a hand from its landmarks, ordered as in [`LandmarkIdx`].
    ///
    /// The hand starts out with a presence score of 1.0 and right handedness.
    pub fn new(landmarks: [Landmark; NUM_LANDMARKS]) -> Self {
        Self {
            landmarks,
            score: 1.0,
            handedness: Handedness::Right,
        }
    }

    /// Creates a hand from a slice of landmarks.
    ///
    /// Returns `None` if `landmarks` does not contain exactly [`NUM_LANDMARKS`] entries.
    pub fn from_slice(landmarks: &[Landmark]) -> Option<Self> {
        let landmarks: [Landmark; NUM_LANDMARKS] = landmarks.try_into().ok()?;
        Some(Self::new(landmarks))
    }

    /// Creates a hand with every landmark at the same position.
    ///
    /// Mostly useful for tests and for detectors that only track a single point.
    pub fn uniform(pos: Landmark) -> Self {
        Self::new([pos; NUM_LANDMARKS])
    }

    pub fn with_score(self, score: f32) -> Self {
        Self { score, ..self }
    }

    pub fn with_handedness(self, handedness: Handedness) -> Self {
        Self { handedness, ..self }
    }

    /// Returns the detector's confidence that this is actually a hand.
    #[inline]
    pub fn score(&self) -> f32 {
        self.score
    }

    #[inline]
    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    #[inline]
    pub fn landmarks(&self) -> &[Landmark; NUM_LANDMARKS] {
        &self.landmarks
    }

    #[inline]
    pub fn landmark(&self, idx: LandmarkIdx) -> Landmark {
        self.landmarks[idx as usize]
    }

    /// Returns the reference landmark used for interaction: the tip of the index finger.
    #[inline]
    pub fn index_finger_tip(&self) -> Landmark {
        self.landmark(LandmarkIdx::IndexFingerTip)
    }

    /// Returns an iterator over the start and end landmarks of every bone of the hand skeleton.
    pub fn connections(&self) -> impl Iterator<Item = (Landmark, Landmark)> + '_ {
        CONNECTIONS
            .iter()
            .map(|&(a, b)| (self.landmark(a), self.landmark(b)))
    }

    /// Mirrors the landmarks horizontally.
    ///
    /// Image-normalized landmarks are mirrored about the image center (`x = 0.5`), scene landmarks
    /// about the scene origin (`x = 0`).
    pub fn mirror_x(&mut self, space: LandmarkSpace) {
        for lm in &mut self.landmarks {
            lm.pos[0] = match space {
                LandmarkSpace::ImageNormalized => 1.0 - lm.pos[0],
                LandmarkSpace::Scene => -lm.pos[0],
            };
        }
    }
}

impl Index<LandmarkIdx> for Hand {
    type Output = Landmark;

    fn index(&self, index: LandmarkIdx) -> &Landmark {
        &self.landmarks[index as usize]
    }
}

/// Names for the hand landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the joints forming the knuckles.
/// - **PIP**: Proximal interphalangeal joint, between the MCP and DIP.
/// - **DIP**: Distal interphalangeal joint, the highest joint of a finger.
/// - **Tip**: the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkIdx {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Pairs of anatomically adjacent landmarks that make up the hand skeleton.
pub const CONNECTIONS: &[(LandmarkIdx, LandmarkIdx)] = {
    use LandmarkIdx::*;
    &[
        // Thumb:
        (Wrist, ThumbCmc),
        (ThumbCmc, ThumbMcp),
        (ThumbMcp, ThumbIp),
        (ThumbIp, ThumbTip),
        // Index:
        (Wrist, IndexFingerMcp),
        (IndexFingerMcp, IndexFingerPip),
        (IndexFingerPip, IndexFingerDip),
        (IndexFingerDip, IndexFingerTip),
        // Middle:
        (IndexFingerMcp, MiddleFingerMcp),
        (MiddleFingerMcp, MiddleFingerPip),
        (MiddleFingerPip, MiddleFingerDip),
        (MiddleFingerDip, MiddleFingerTip),
        // Ring:
        (MiddleFingerMcp, RingFingerMcp),
        (RingFingerMcp, RingFingerPip),
        (RingFingerPip, RingFingerDip),
        (RingFingerDip, RingFingerTip),
        // Pinky:
        (RingFingerMcp, PinkyMcp),
        (Wrist, PinkyMcp),
        (PinkyMcp, PinkyPip),
        (PinkyPip, PinkyDip),
        (PinkyDip, PinkyTip),
    ]
};
