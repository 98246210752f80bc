//! Scene geometry for the CPU ray-tracing backend
//!
//! A [`Scene`] is a flat list of triangle meshes, each with one diffuse and
//! one specular colour and flat per-face normals. It answers closest-hit and
//! any-hit queries and implements [`MaterialSampler`] so VPL generation can
//! shade its hits.
//!
//! Scenes are either built in code ([`Scene::cornell_box`]) or loaded from a
//! `.ron`/`.toml` [`SceneDescription`] through the [`Config`] trait.

mod bounds;
mod mesh;

pub use bounds::Aabb;
pub use mesh::{SceneMesh, Triangle};

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::foundation::math::Vec3;
use crate::render::material::MaterialSampler;
use crate::render::ray::{Intersection, Ray};

/// Errors raised while building a scene
#[derive(Error, Debug)]
pub enum SceneError {
    /// The scene file could not be read or parsed
    #[error("Scene file error: {0}")]
    Config(#[from] ConfigError),

    /// A face refers to a vertex that does not exist
    #[error("Mesh '{mesh}' face {face} references vertex {index} but only {vertex_count} exist")]
    InvalidIndex {
        /// Mesh name
        mesh: String,
        /// Face number within the mesh
        face: usize,
        /// Offending index
        index: u32,
        /// Number of vertices in the mesh
        vertex_count: usize,
    },

    /// The scene holds no triangles
    #[error("Scene contains no triangles")]
    Empty,
}

/// Serialized mesh: indexed triangles with a single material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshDescription {
    /// Name used in logs
    pub name: String,
    /// Vertex positions
    pub vertices: Vec<Vec3>,
    /// Counter-clockwise triangles
    pub indices: Vec<[u32; 3]>,
    /// Diffuse albedo
    pub diffuse: Vec3,
    /// Specular colour
    #[serde(default)]
    pub specular: Vec3,
}

/// Serialized scene file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneDescription {
    /// Meshes in the scene
    pub meshes: Vec<MeshDescription>,
}

impl Config for SceneDescription {}

/// Triangle meshes queried by the CPU backend
#[derive(Debug, Clone, Default)]
pub struct Scene {
    meshes: Vec<SceneMesh>,
}

impl Scene {
    /// Empty scene
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mesh and return its shape id
    pub fn add_mesh(&mut self, mesh: SceneMesh) -> usize {
        log::debug!("Added mesh '{}' with {} triangles", mesh.name, mesh.triangles().len());
        self.meshes.push(mesh);
        self.meshes.len() - 1
    }

    /// All meshes, indexed by shape id
    pub fn meshes(&self) -> &[SceneMesh] {
        &self.meshes
    }

    /// Total number of triangles
    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|mesh| mesh.triangles().len()).sum()
    }

    /// Load a scene file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let description = SceneDescription::load_from_file(path)?;
        let scene = Self::from_description(&description)?;
        log::info!(
            "Loaded scene {} ({} meshes, {} triangles)",
            path.display(),
            scene.meshes.len(),
            scene.triangle_count()
        );
        Ok(scene)
    }

    /// Build a scene from its serialized form
    pub fn from_description(description: &SceneDescription) -> Result<Self, SceneError> {
        let mut scene = Self::new();
        for mesh_desc in &description.meshes {
            let mut mesh = SceneMesh::new(mesh_desc.name.clone(), mesh_desc.diffuse, mesh_desc.specular);
            for (face, indices) in mesh_desc.indices.iter().enumerate() {
                let vertex = |index: u32| {
                    mesh_desc.vertices.get(index as usize).copied().ok_or_else(|| SceneError::InvalidIndex {
                        mesh: mesh_desc.name.clone(),
                        face,
                        index,
                        vertex_count: mesh_desc.vertices.len(),
                    })
                };
                mesh.push_triangle(Triangle::new(vertex(indices[0])?, vertex(indices[1])?, vertex(indices[2])?));
            }
            scene.add_mesh(mesh);
        }

        if scene.triangle_count() == 0 {
            return Err(SceneError::Empty);
        }
        Ok(scene)
    }

    /// Cornell-style box open towards +Z with a white block inside
    ///
    /// The room spans `[-scale, scale]` in X and Z and `[0, 2 * scale]` in Y.
    /// Walls face inward; the left wall is red and the right wall green.
    pub fn cornell_box(scale: f32) -> Self {
        let s = scale;
        let white = Vec3::new(0.75, 0.75, 0.75);
        let no_specular = Vec3::zeros();
        let (x, y, z) = (Vec3::x() * 2.0 * s, Vec3::y() * 2.0 * s, Vec3::z() * 2.0 * s);

        let mut scene = Self::new();

        let mut floor = SceneMesh::new("floor", white, no_specular);
        floor.push_quad(Vec3::new(-s, 0.0, -s), z, x);
        scene.add_mesh(floor);

        let mut ceiling = SceneMesh::new("ceiling", white, no_specular);
        ceiling.push_quad(Vec3::new(-s, 2.0 * s, -s), x, z);
        scene.add_mesh(ceiling);

        let mut back = SceneMesh::new("back wall", white, no_specular);
        back.push_quad(Vec3::new(-s, 0.0, -s), x, y);
        scene.add_mesh(back);

        let mut left = SceneMesh::new("left wall", Vec3::new(0.75, 0.1, 0.1), no_specular);
        left.push_quad(Vec3::new(-s, 0.0, -s), y, z);
        scene.add_mesh(left);

        let mut right = SceneMesh::new("right wall", Vec3::new(0.1, 0.75, 0.1), no_specular);
        right.push_quad(Vec3::new(s, 0.0, -s), z, y);
        scene.add_mesh(right);

        let mut block = SceneMesh::new("block", white, Vec3::repeat(0.2));
        block.push_box(Vec3::new(-0.6 * s, 0.0, -0.5 * s), Vec3::new(-0.1 * s, 0.6 * s, 0.0));
        scene.add_mesh(block);

        scene
    }

    /// Closest hit along `ray` or [`Intersection::MISS`]
    pub fn intersect(&self, ray: &Ray) -> Intersection {
        if !ray.is_active() {
            return Intersection::MISS;
        }

        let mut closest = Intersection::MISS;
        for (shape_id, mesh) in self.meshes.iter().enumerate() {
            let limit = closest.distance.min(ray.max_distance);
            if let Some((face, t, u, v)) = mesh.intersect(&ray.origin, &ray.direction, limit) {
                closest = Intersection {
                    shape_id: shape_id as i32,
                    prim_id: face as i32,
                    uv: [u, v],
                    distance: t,
                };
            }
        }
        closest
    }

    /// Whether anything lies along `ray` before its max distance
    pub fn occluded(&self, ray: &Ray) -> bool {
        ray.is_active()
            && self
                .meshes
                .iter()
                .any(|mesh| mesh.occludes(&ray.origin, &ray.direction, ray.max_distance))
    }

    fn face(&self, mesh: i32, face: i32) -> Option<(&SceneMesh, usize)> {
        let mesh = self.meshes.get(usize::try_from(mesh).ok()?)?;
        let face = usize::try_from(face).ok()?;
        (face < mesh.triangles().len()).then_some((mesh, face))
    }
}

impl MaterialSampler for Scene {
    fn diffuse(&self, mesh: i32, face: i32, _u: f32, _v: f32) -> Vec3 {
        self.face(mesh, face).map_or_else(Vec3::zeros, |(mesh, _)| mesh.diffuse)
    }

    fn specular(&self, mesh: i32, face: i32, _u: f32, _v: f32) -> Vec3 {
        self.face(mesh, face).map_or_else(Vec3::zeros, |(mesh, _)| mesh.specular)
    }

    fn normal(&self, mesh: i32, face: i32, _u: f32, _v: f32) -> Vec3 {
        self.face(mesh, face)
            .and_then(|(mesh, face)| mesh.face_normal(face))
            .unwrap_or_else(Vec3::y)
    }
}
