//! 3D model assets.
//!
//! Models are loaded from Wavefront OBJ files with `tobj`. Only geometry is kept; normals,
//! texture coordinates and materials are dropped.

use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};

use anyhow::{anyhow, bail, Context};
use itertools::Itertools;
use nalgebra::Vector3;
use pawawwewism::{promise, PromiseHandle};

/// Polygon mesh geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vector3<f32>>,
    /// Each face is a polygon of at least 3 vertex indices.
    faces: Vec<Vec<usize>>,
}

impl Mesh {
    #[inline]
    pub fn vertices(&self) -> &[Vector3<f32>] {
        &self.vertices
    }

    #[inline]
    pub fn faces(&self) -> &[Vec<usize>] {
        &self.faces
    }

    /// Returns every edge shared by the faces of this mesh, each one exactly once.
    ///
    /// Edges are returned as pairs of vertex indices with the smaller index first.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        self.faces
            .iter()
            .flat_map(|face| face.iter().copied().circular_tuple_windows())
            .map(|(a, b)| if a < b { (a, b) } else { (b, a) })
            .sorted_unstable()
            .dedup()
            .collect()
    }

    /// Computes the axis-aligned bounding box as `(min, max)`.
    ///
    /// Returns `None` if the mesh has no vertices.
    pub fn bounds(&self) -> Option<(Vector3<f32>, Vector3<f32>)> {
        let first = *self.vertices.first()?;
        Some(self.vertices.iter().fold((first, first), |(min, max), v| {
            (min.inf(v), max.sup(v))
        }))
    }
}

/// A loaded model.
///
/// Cloning a [`Model`] is cheap; clones share the same mesh data.
#[derive(Clone)]
pub struct Model {
    name: Arc<str>,
    mesh: Arc<Mesh>,
}

impl Model {
    /// Loads a model from a Wavefront OBJ file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let file =
            File::open(path).with_context(|| format!("failed to open '{}'", path.display()))?;
        let model = Self::from_obj(name, BufReader::new(file))
            .with_context(|| format!("failed to load model from '{}'", path.display()))?;
        log::info!(
            "loaded {} ({} vertices, {} faces)",
            path.display(),
            model.mesh.vertices.len(),
            model.mesh.faces.len()
        );
        Ok(model)
    }

    /// Parses a model from Wavefront OBJ data.
    pub fn from_obj<R: BufRead>(name: impl Into<String>, reader: R) -> anyhow::Result<Self> {
        let mesh = parse_obj(reader)?;
        Ok(Self {
            name: name.into().into(),
            mesh: Arc::new(mesh),
        })
    }

    /// Creates a cube with an edge length of 1, centered on the origin.
    pub fn cube(name: impl Into<String>) -> Self {
        let vertices = (0..8)
            .map(|i| {
                let coord = |bit: usize| if i & bit == 0 { -0.5 } else { 0.5 };
                Vector3::new(coord(1), coord(2), coord(4))
            })
            .collect();
        let faces = [
            [0, 2, 3, 1],
            [4, 5, 7, 6],
            [0, 1, 5, 4],
            [2, 6, 7, 3],
            [0, 4, 6, 2],
            [1, 3, 7, 5],
        ]
        .into_iter()
        .map(Vec::from)
        .collect();
        Self {
            name: name.into().into(),
            mesh: Arc::new(Mesh { vertices, faces }),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Model({}, {} vertices)",
            self.name,
            self.mesh.vertices.len()
        )
    }
}

/// Loads a model on a background thread.
///
/// The returned [`ModelLoad`] resolves once loading has finished or failed.
pub fn load_model_async(path: impl Into<PathBuf>) -> anyhow::Result<ModelLoad> {
    let path = path.into();
    let (promise, handle) = promise();
    let display = path.display().to_string();
    thread::Builder::new()
        .name(format!("load {display}"))
        .spawn(move || promise.fulfill(Model::load(&path)))?;
    Ok(ModelLoad {
        path: display,
        handle,
    })
}

/// A model that is being loaded by [`load_model_async`].
pub struct ModelLoad {
    path: String,
    handle: PromiseHandle<anyhow::Result<Model>>,
}

impl ModelLoad {
    /// Blocks until the model is loaded.
    pub fn wait(self) -> anyhow::Result<Model> {
        let path = self.path;
        self.handle
            .block()
            .map_err(|_| anyhow!("loader thread for '{path}' exited without a result"))?
    }
}

fn parse_obj<R: BufRead>(mut reader: R) -> anyhow::Result<Mesh> {
    let options = tobj::LoadOptions {
        single_index: true,
        triangulate: false,
        ignore_points: true,
        ignore_lines: true,
        ..Default::default()
    };
    // Materials are not used; an `mtllib` reference is skipped rather than resolved.
    let (models, _materials) = tobj::load_obj_buf(&mut reader, &options, |_| {
        Err(tobj::LoadError::OpenFileFailed)
    })?;

    let mut vertices = Vec::new();
    let mut faces = Vec::new();
    for model in models {
        let mesh = model.mesh;
        let base = vertices.len();
        vertices.extend(
            mesh.positions
                .chunks_exact(3)
                .map(|p| Vector3::new(p[0], p[1], p[2])),
        );

        let mut indices = mesh.indices.iter().map(|&i| base + i as usize);
        if mesh.face_arities.is_empty() {
            // Only triangles.
            faces.extend(indices.by_ref().tuples().map(|(a, b, c)| vec![a, b, c]));
        } else {
            for &arity in &mesh.face_arities {
                faces.push(indices.by_ref().take(arity as usize).collect::<Vec<_>>());
            }
        }
        log::trace!("read object '{}' with {} vertices", model.name, vertices.len() - base);
    }

    if let Some(face) = faces.iter().find(|face| face.len() < 3) {
        bail!("face {:?} has fewer than 3 vertices", face);
    }
    if let Some(&index) = faces.iter().flatten().find(|&&index| index >= vertices.len()) {
        bail!(
            "face references vertex {} but only {} vertices are defined",
            index + 1,
            vertices.len()
        );
    }

    Ok(Mesh { vertices, faces })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = "\
# a single triangle
o tri
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 0.0 1.0 0.0
vn 0 0 1
f 1//1 2//1 3//1
";

    #[test]
    fn parse_triangle() {
        let model = Model::from_obj("tri", TRIANGLE.as_bytes()).unwrap();
        assert_eq!(model.name(), "tri");
        assert_eq!(model.mesh().vertices().len(), 3);
        assert_eq!(model.mesh().faces(), &[vec![0, 1, 2]]);
        assert_eq!(model.mesh().edges(), [(0, 1), (0, 2), (1, 2)]);
    }

    #[test]
    fn negative_indices() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf -4 -3 -2 -1\n";
        let model = Model::from_obj("quad", obj.as_bytes()).unwrap();
        assert_eq!(model.mesh().faces(), &[vec![0, 1, 2, 3]]);
        assert_eq!(model.mesh().edges().len(), 4);
    }

    #[test]
    fn invalid_data_is_rejected() {
        assert!(Model::from_obj("bad", "v 0 0 0\nv 1 x 0\nv 0 1 0\nf 1 2 3\n".as_bytes()).is_err());
        assert!(Model::from_obj("bad", "v 0 0 0\nf 1 2 3\n".as_bytes()).is_err());
    }

    #[test]
    fn multiple_objects_are_merged() {
        let obj = "o a\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n\
                   o b\nv 0 0 1\nv 1 0 1\nv 0 1 1\nf 4 5 6\n";
        let model = Model::from_obj("two", obj.as_bytes()).unwrap();
        assert_eq!(model.mesh().vertices().len(), 6);
        assert_eq!(model.mesh().faces(), &[vec![0, 1, 2], vec![3, 4, 5]]);
        assert_eq!(model.mesh().vertices()[3], Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn cube_geometry() {
        let cube = Model::cube("cube");
        assert_eq!(cube.mesh().vertices().len(), 8);
        assert_eq!(cube.mesh().edges().len(), 12);
        let (min, max) = cube.mesh().bounds().unwrap();
        assert_eq!(min, Vector3::repeat(-0.5));
        assert_eq!(max, Vector3::repeat(0.5));

        let clone = cube.clone();
        assert!(Arc::ptr_eq(&clone.mesh, &cube.mesh));
    }

    #[test]
    fn async_load_reports_missing_file() {
        let load = load_model_async("/nonexistent/model.obj").unwrap();
        let err = load.wait().unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/model.obj"), "{err:#}");
    }
}
