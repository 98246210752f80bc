//! Triangle meshes with flat per-face normals and one material each

use crate::foundation::math::Vec3;
use crate::scene::bounds::Aabb;

/// Distances below this are treated as self-intersections
const EPSILON: f32 = 0.000001;

/// A single world-space triangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex
    pub v0: Vec3,
    /// Second vertex
    pub v1: Vec3,
    /// Third vertex
    pub v2: Vec3,
}

impl Triangle {
    /// Create a triangle from three vertices
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    /// Geometric normal following counter-clockwise winding
    pub fn normal(&self) -> Vec3 {
        let n = (self.v1 - self.v0).cross(&(self.v2 - self.v0));
        let length = n.norm();
        if length > f32::EPSILON {
            n / length
        } else {
            Vec3::y()
        }
    }

    /// Möller–Trumbore ray/triangle test
    ///
    /// Returns `(t, u, v)` with barycentrics relative to `v1` and `v2`.
    pub fn intersect_ray(&self, origin: &Vec3, direction: &Vec3) -> Option<(f32, f32, f32)> {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;

        let h = direction.cross(&edge2);
        let a = edge1.dot(&h);

        // Ray parallel to triangle
        if a.abs() < EPSILON {
            return None;
        }

        let f = 1.0 / a;
        let s = origin - self.v0;
        let u = f * s.dot(&h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = f * direction.dot(&q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * edge2.dot(&q);
        (t > EPSILON).then_some((t, u, v))
    }
}

/// Mesh with a single diffuse/specular material
#[derive(Debug, Clone)]
pub struct SceneMesh {
    /// Name used in logs
    pub name: String,
    /// Diffuse albedo
    pub diffuse: Vec3,
    /// Specular colour
    pub specular: Vec3,
    triangles: Vec<Triangle>,
    normals: Vec<Vec3>,
    bounds: Aabb,
}

impl SceneMesh {
    /// Empty mesh with the given material
    pub fn new(name: impl Into<String>, diffuse: Vec3, specular: Vec3) -> Self {
        Self {
            name: name.into(),
            diffuse,
            specular,
            triangles: Vec::new(),
            normals: Vec::new(),
            bounds: Aabb::empty(),
        }
    }

    /// Append a triangle, deriving its face normal from the winding
    pub fn push_triangle(&mut self, triangle: Triangle) {
        for v in [&triangle.v0, &triangle.v1, &triangle.v2] {
            self.bounds.grow(v);
        }
        self.normals.push(triangle.normal());
        self.triangles.push(triangle);
    }

    /// Append the parallelogram `corner`, `corner + u`, `corner + u + v`, `corner + v`
    ///
    /// Its normal is `u × v`.
    pub fn push_quad(&mut self, corner: Vec3, u: Vec3, v: Vec3) {
        self.push_triangle(Triangle::new(corner, corner + u, corner + u + v));
        self.push_triangle(Triangle::new(corner, corner + u + v, corner + v));
    }

    /// Append an axis-aligned box with outward-facing normals
    pub fn push_box(&mut self, min: Vec3, max: Vec3) {
        let d = max - min;
        let (dx, dy, dz) = (Vec3::x() * d.x, Vec3::y() * d.y, Vec3::z() * d.z);

        self.push_quad(Vec3::new(min.x, max.y, min.z), dz, dx);
        self.push_quad(min, dx, dz);
        self.push_quad(Vec3::new(min.x, min.y, max.z), dx, dy);
        self.push_quad(min, dy, dx);
        self.push_quad(Vec3::new(max.x, min.y, min.z), dy, dz);
        self.push_quad(min, dz, dy);
    }

    /// Triangles in insertion order
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Face normal of triangle `face`
    pub fn face_normal(&self, face: usize) -> Option<Vec3> {
        self.normals.get(face).copied()
    }

    /// Bounds of all triangles
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Closest hit within `max_distance` as `(face, t, u, v)`
    pub fn intersect(&self, origin: &Vec3, direction: &Vec3, max_distance: f32) -> Option<(usize, f32, f32, f32)> {
        self.bounds.intersect_ray(origin, direction, max_distance)?;

        let mut closest: Option<(usize, f32, f32, f32)> = None;
        for (face, triangle) in self.triangles.iter().enumerate() {
            if let Some((t, u, v)) = triangle.intersect_ray(origin, direction) {
                let limit = closest.map_or(max_distance, |c| c.1);
                if t <= limit {
                    closest = Some((face, t, u, v));
                }
            }
        }
        closest
    }

    /// Whether any triangle is hit within `max_distance`
    pub fn occludes(&self, origin: &Vec3, direction: &Vec3, max_distance: f32) -> bool {
        if self.bounds.intersect_ray(origin, direction, max_distance).is_none() {
            return false;
        }
        self.triangles
            .iter()
            .filter_map(|triangle| triangle.intersect_ray(origin, direction))
            .any(|(t, _, _)| t <= max_distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_triangle_hit_barycentrics() {
        let triangle = Triangle::new(Vec3::zeros(), Vec3::x(), Vec3::y());
        let (t, u, v) = triangle
            .intersect_ray(&Vec3::new(0.25, 0.5, 1.0), &-Vec3::z())
            .unwrap();
        assert_relative_eq!(t, 1.0);
        assert_relative_eq!(u, 0.25);
        assert_relative_eq!(v, 0.5);
        assert_eq!(triangle.normal(), Vec3::z());
    }

    #[test]
    fn test_triangle_miss_and_behind() {
        let triangle = Triangle::new(Vec3::zeros(), Vec3::x(), Vec3::y());
        assert!(triangle.intersect_ray(&Vec3::new(0.8, 0.8, 1.0), &-Vec3::z()).is_none());
        assert!(triangle.intersect_ray(&Vec3::new(0.2, 0.2, 1.0), &Vec3::z()).is_none());
    }

    #[test]
    fn test_quad_normal_follows_edges() {
        let mut mesh = SceneMesh::new("floor", Vec3::repeat(0.5), Vec3::zeros());
        mesh.push_quad(Vec3::zeros(), Vec3::z(), Vec3::x());
        assert_eq!(mesh.triangles().len(), 2);
        assert_relative_eq!(mesh.face_normal(0).unwrap(), Vec3::y());
        assert_relative_eq!(mesh.face_normal(1).unwrap(), Vec3::y());
        assert!(mesh.face_normal(2).is_none());
    }

    #[test]
    fn test_box_normals_point_outward() {
        let mut mesh = SceneMesh::new("block", Vec3::repeat(0.5), Vec3::zeros());
        mesh.push_box(Vec3::repeat(-1.0), Vec3::repeat(1.0));
        assert_eq!(mesh.triangles().len(), 12);
        for (face, triangle) in mesh.triangles().iter().enumerate() {
            let centroid = (triangle.v0 + triangle.v1 + triangle.v2) / 3.0;
            assert!(mesh.face_normal(face).unwrap().dot(&centroid) > 0.0);
        }
    }

    #[test]
    fn test_closest_hit_wins() {
        let mut mesh = SceneMesh::new("layers", Vec3::repeat(0.5), Vec3::zeros());
        mesh.push_quad(Vec3::new(-1.0, 2.0, -1.0), Vec3::z() * 2.0, Vec3::x() * 2.0);
        mesh.push_quad(Vec3::new(-1.0, 1.0, -1.0), Vec3::z() * 2.0, Vec3::x() * 2.0);

        let origin = Vec3::new(0.3, 0.0, -0.2);
        let (face, t, _, _) = mesh.intersect(&origin, &Vec3::y(), 10.0).unwrap();
        assert!(face >= 2);
        assert_relative_eq!(t, 1.0);
        assert!(mesh.occludes(&origin, &Vec3::y(), 1.5));
        assert!(!mesh.occludes(&origin, &Vec3::y(), 0.5));
    }
}
