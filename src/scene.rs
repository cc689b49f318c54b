//! The 3D scene: interactive objects and the camera looking at them.
//!
//! A [`Scene`] is assembled once with a [`SceneBuilder`]. After [`SceneBuilder::build`], the set of
//! objects is fixed; only their [`Transform`]s change.

use std::fmt;

use anyhow::bail;
use nalgebra::{Perspective3, Point3, UnitQuaternion, Vector3};

use crate::{model::Model, resolution::Resolution};

/// Identifies an [`InteractiveObject`] within its [`Scene`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position, rotation and scale of an object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

impl Transform {
    /// Creates a transform at `position`, with no rotation and a scale of 1.
    pub fn at(position: Vector3<f32>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
            scale: Vector3::repeat(1.0),
        }
    }

    /// Sets the same scale factor on every axis.
    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.scale = Vector3::repeat(scale);
    }

    /// Applies this transform to a point in model space.
    pub fn apply(&self, point: &Vector3<f32>) -> Vector3<f32> {
        self.rotation * point.component_mul(&self.scale) + self.position
    }
}

/// A persistent object in the scene that reacts to hands.
#[derive(Debug, Clone)]
pub struct InteractiveObject {
    id: ObjectId,
    model: Model,
    rest_position: Vector3<f32>,
    transform: Transform,
}

impl InteractiveObject {
    #[inline]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    #[inline]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// The position the object was placed at; idle motion oscillates around it.
    #[inline]
    pub fn rest_position(&self) -> Vector3<f32> {
        self.rest_position
    }

    #[inline]
    pub fn position(&self) -> Vector3<f32> {
        self.transform.position
    }

    #[inline]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    #[inline]
    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }
}

/// Collects the objects of a [`Scene`] while assets are being loaded.
#[derive(Debug, Default)]
pub struct SceneBuilder {
    objects: Vec<InteractiveObject>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places an instance of `model` at `position`.
    pub fn add(&mut self, model: Model, position: Vector3<f32>) -> ObjectId {
        let id = ObjectId(self.objects.len());
        log::debug!(
            "placing {} as {:?} at {:?}",
            model.name(),
            id,
            position.as_slice()
        );
        self.objects.push(InteractiveObject {
            id,
            model,
            rest_position: position,
            transform: Transform::at(position),
        });
        id
    }

    pub fn build(self) -> Scene {
        Scene {
            objects: self.objects,
        }
    }
}

/// A fixed set of [`InteractiveObject`]s.
#[derive(Debug, Clone)]
pub struct Scene {
    objects: Vec<InteractiveObject>,
}

impl Scene {
    #[inline]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects(&self) -> impl Iterator<Item = &InteractiveObject> + '_ {
        self.objects.iter()
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut InteractiveObject> + '_ {
        self.objects.iter_mut()
    }

    pub fn get(&self, id: ObjectId) -> Option<&InteractiveObject> {
        self.objects.get(id.0)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut InteractiveObject> {
        self.objects.get_mut(id.0)
    }
}

/// A perspective camera looking down the negative Z axis.
#[derive(Debug, Clone, Copy)]
pub struct PerspectiveCamera {
    fov_y_degrees: f32,
    aspect: f32,
    near: f32,
    far: f32,
    position: Vector3<f32>,
}

impl PerspectiveCamera {
    /// Creates a camera with a vertical field of view of `fov_y_degrees`, rendering into a surface
    /// of resolution `res`.
    ///
    /// Fails if `res` is empty or `near` is not smaller than `far`.
    pub fn new(fov_y_degrees: f32, res: Resolution, near: f32, far: f32) -> anyhow::Result<Self> {
        let aspect = match res.aspect_ratio() {
            Some(ratio) => ratio.as_f32(),
            None => bail!("camera surface must not be empty (got {})", res),
        };
        if near >= far {
            bail!(
                "camera near plane ({}) must be in front of far plane ({})",
                near,
                far
            );
        }
        Ok(Self {
            fov_y_degrees,
            aspect,
            near,
            far,
            position: Vector3::zeros(),
        })
    }

    /// Moves the camera to `position`.
    pub fn with_position(self, position: Vector3<f32>) -> Self {
        Self { position, ..self }
    }

    #[inline]
    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    #[inline]
    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    #[inline]
    pub fn fov_y_degrees(&self) -> f32 {
        self.fov_y_degrees
    }

    fn projection(&self) -> Perspective3<f32> {
        Perspective3::new(
            self.aspect,
            self.fov_y_degrees.to_radians(),
            self.near,
            self.far,
        )
    }

    /// Projects a point in scene coordinates onto a surface of resolution `res`.
    ///
    /// Returns pixel coordinates (Y pointing down), or `None` if the point lies outside the
    /// camera's near and far planes. Points outside the field of view are still projected and end
    /// up outside of the surface.
    pub fn project(&self, point: &Vector3<f32>, res: Resolution) -> Option<(f32, f32)> {
        let view = point - self.position;
        if -view.z < self.near || -view.z > self.far {
            return None;
        }
        let ndc = self.projection().project_point(&Point3::from(view));
        let x = (ndc.x + 1.0) * 0.5 * res.width() as f32;
        let y = (1.0 - ndc.y) * 0.5 * res.height() as f32;
        Some((x, y))
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use crate::model::Model;

    use super::*;

    #[test]
    fn builder_assigns_ids_in_order() {
        let mut builder = SceneBuilder::new();
        let a = builder.add(Model::cube("a"), Vector3::new(-2.0, 0.0, 0.0));
        let b = builder.add(Model::cube("b"), Vector3::new(2.0, 0.0, 0.0));
        let scene = builder.build();

        assert_eq!(scene.len(), 2);
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(scene.get(b).unwrap().model().name(), "b");
        assert_eq!(
            scene.get(b).unwrap().rest_position(),
            Vector3::new(2.0, 0.0, 0.0)
        );
        assert_eq!(format!("{a:?}"), "#0");
    }

    #[test]
    fn transform_applies_scale_rotation_translation() {
        let mut t = Transform::at(Vector3::new(1.0, 0.0, 0.0));
        t.set_uniform_scale(2.0);
        t.rotation =
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f32::consts::FRAC_PI_2);
        let p = t.apply(&Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p, Vector3::new(1.0, 0.0, -2.0), epsilon = 1e-6);
    }

    #[test]
    fn projection_of_center_and_behind() {
        let res = Resolution::new(640, 480);
        let camera = PerspectiveCamera::new(75.0, res, 0.1, 1000.0)
            .unwrap()
            .with_position(Vector3::new(0.0, 0.0, 5.0));

        let (x, y) = camera.project(&Vector3::new(0.0, 0.0, -2.0), res).unwrap();
        assert_relative_eq!(x, 320.0, epsilon = 1e-3);
        assert_relative_eq!(y, 240.0, epsilon = 1e-3);

        let (x_right, y_up) = camera.project(&Vector3::new(1.0, 1.0, -2.0), res).unwrap();
        assert!(x_right > 320.0);
        assert!(y_up < 240.0);

        assert_eq!(camera.project(&Vector3::new(0.0, 0.0, 6.0), res), None);
    }

    #[test]
    fn invalid_camera_is_rejected() {
        let res = Resolution::new(640, 480);
        assert!(PerspectiveCamera::new(75.0, Resolution::new(0, 0), 0.1, 1000.0).is_err());
        assert!(PerspectiveCamera::new(75.0, Resolution::new(640, 0), 0.1, 1000.0).is_err());
        assert!(PerspectiveCamera::new(75.0, res, 10.0, 10.0).is_err());
        assert!(PerspectiveCamera::new(75.0, res, 100.0, 1.0).is_err());
    }
}
