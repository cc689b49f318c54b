//! Scene rendering.

use crate::{
    image::{draw, Color, Image},
    resolution::Resolution,
    scene::{PerspectiveCamera, Scene},
    timer::Timer,
};

/// Draws a [`Scene`] as seen by a [`PerspectiveCamera`].
pub trait Renderer {
    /// Returns the resolution of the surface this renderer draws into.
    fn resolution(&self) -> Resolution;

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> anyhow::Result<()>;

    /// Returns the profiling timers of this renderer, if any.
    fn timers(&mut self) -> Vec<&mut Timer> {
        Vec::new()
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn resolution(&self) -> Resolution {
        (**self).resolution()
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> anyhow::Result<()> {
        (**self).render(scene, camera)
    }

    fn timers(&mut self) -> Vec<&mut Timer> {
        (**self).timers()
    }
}

/// Renders object wireframes into an [`Image`] on the CPU.
pub struct SoftwareRenderer {
    surface: Image,
    background: Color,
    wireframe: Color,
    t_render: Timer,
}

impl SoftwareRenderer {
    /// Creates a renderer drawing into a surface of resolution `res`.
    pub fn new(res: Resolution) -> Self {
        Self {
            surface: Image::filled(res, Color::BLACK),
            background: Color::BLACK,
            wireframe: Color::WHITE,
            t_render: Timer::new("render"),
        }
    }

    pub fn with_background(self, background: Color) -> Self {
        Self { background, ..self }
    }

    pub fn with_wireframe(self, wireframe: Color) -> Self {
        Self { wireframe, ..self }
    }

    #[inline]
    pub fn surface(&self) -> &Image {
        &self.surface
    }

    pub fn into_surface(self) -> Image {
        self.surface
    }
}

impl Renderer for SoftwareRenderer {
    fn resolution(&self) -> Resolution {
        self.surface.resolution()
    }

    fn render(&mut self, scene: &Scene, camera: &PerspectiveCamera) -> anyhow::Result<()> {
        let _guard = self.t_render.start();
        let res = self.surface.resolution();
        self.surface.clear(self.background);

        // Lines ending far outside the surface are skipped instead of clipped.
        let (w, h) = (res.width() as f32, res.height() as f32);
        let on_screen = |&(x, y): &(f32, f32)| x >= -w && x <= 2.0 * w && y >= -h && y <= 2.0 * h;

        for object in scene.objects() {
            let mesh = object.model().mesh();
            let projected = mesh
                .vertices()
                .iter()
                .map(|v| {
                    camera
                        .project(&object.transform().apply(v), res)
                        .filter(on_screen)
                })
                .collect::<Vec<_>>();

            let mut drawn = 0;
            for (a, b) in mesh.edges() {
                if let (Some((sx, sy)), Some((ex, ey))) = (projected[a], projected[b]) {
                    draw::line(
                        &mut self.surface,
                        sx.round() as i32,
                        sy.round() as i32,
                        ex.round() as i32,
                        ey.round() as i32,
                    )
                    .color(self.wireframe);
                    drawn += 1;
                }
            }
            log::trace!("{:?}: drew {} edges", object.id(), drawn);
        }

        Ok(())
    }

    fn timers(&mut self) -> Vec<&mut Timer> {
        vec![&mut self.t_render]
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::Vector3;

    use crate::{model::Model, scene::SceneBuilder};

    use super::*;

    fn camera(res: Resolution) -> PerspectiveCamera {
        PerspectiveCamera::new(75.0, res, 0.1, 1000.0)
            .unwrap()
            .with_position(Vector3::new(0.0, 0.0, 5.0))
    }

    #[test]
    fn renders_wireframe_in_view() {
        let res = Resolution::new(160, 120);
        let mut builder = SceneBuilder::new();
        builder.add(Model::cube("cube"), Vector3::new(0.0, 0.0, -2.0));
        let scene = builder.build();

        let mut renderer = SoftwareRenderer::new(res).with_wireframe(Color::GREEN);
        renderer.render(&scene, &camera(res)).unwrap();
        let green = renderer.surface().count_pixels(Color::GREEN);
        assert!(green > 0);
        // The cube is centered in front of the camera, so the edges of the surface stay clear.
        assert_eq!(renderer.surface().get(0, 0), Color::BLACK);
        assert_eq!(renderer.surface().get(80, 60), Color::BLACK);
        assert_eq!(renderer.timers().len(), 1);
    }

    #[test]
    fn objects_behind_camera_are_skipped() {
        let res = Resolution::new(64, 64);
        let mut builder = SceneBuilder::new();
        builder.add(Model::cube("cube"), Vector3::new(0.0, 0.0, 10.0));
        let scene = builder.build();

        let mut renderer = SoftwareRenderer::new(res);
        renderer.render(&scene, &camera(res)).unwrap();
        assert_eq!(renderer.surface().count_pixels(Color::BLACK), 64 * 64);
    }

    #[test]
    fn clears_previous_frame() {
        let res = Resolution::new(32, 32);
        let scene = SceneBuilder::new().build();
        let mut renderer = SoftwareRenderer::new(res).with_background(Color::BLUE);
        renderer.render(&scene, &camera(res)).unwrap();
        assert_eq!(renderer.into_surface().count_pixels(Color::BLUE), 32 * 32);
    }
}
