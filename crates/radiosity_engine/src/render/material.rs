//! Material queries used when shading new VPLs

use crate::foundation::math::Vec3;

/// Surface attributes by mesh, face and barycentric coordinates
///
/// Implementations must bounds-check `mesh` and `face`; out-of-range input
/// yields the neutral values below rather than an error.
pub trait MaterialSampler {
    /// Diffuse albedo, neutral value black
    fn diffuse(&self, mesh: i32, face: i32, u: f32, v: f32) -> Vec3;

    /// Specular colour, neutral value black
    fn specular(&self, mesh: i32, face: i32, u: f32, v: f32) -> Vec3;

    /// Unit surface normal, neutral value +Y
    fn normal(&self, mesh: i32, face: i32, u: f32, v: f32) -> Vec3;
}
