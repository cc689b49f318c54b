//! Camera input.

pub mod webcam;

use crate::{image::Image, timer::Timer};

/// A source of camera frames.
pub trait FrameSource {
    /// Reads the next frame, blocking until one is available.
    fn read(&mut self) -> anyhow::Result<Image>;

    /// Returns the profiling timers of this source, if any.
    fn timers(&mut self) -> Vec<&mut Timer> {
        Vec::new()
    }
}

impl<F> FrameSource for F
where
    F: FnMut() -> anyhow::Result<Image>,
{
    fn read(&mut self) -> anyhow::Result<Image> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_frame_sources() {
        let mut frames = 0;
        let mut source = || -> anyhow::Result<Image> {
            frames += 1;
            Ok(Image::new(frames, 1))
        };
        assert_eq!(source.read().unwrap().width(), 1);
        assert_eq!(source.read().unwrap().width(), 2);
        assert!(source.timers().is_empty());
    }
}
