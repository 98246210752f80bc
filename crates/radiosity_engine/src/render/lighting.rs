//! Primary light sources
//!
//! Lights are created once from configuration and only move when the
//! application translates them. Each one seeds band 0 of the VPL table.

use crate::core::{LightDescriptor, LightShape};
use crate::foundation::math::{utils, Vec3};

/// Handle to the shadow map owned by the direct-lighting pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShadowMapHandle(pub u32);

/// Light kinds with their type-specific extents
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    /// Point light (like a lightbulb)
    Point,
    /// Spot light limited to a cone around the light normal
    Spot {
        /// Cone half-angle in radians
        cone_half_angle: f32,
    },
    /// Rectangular area light in the plane orthogonal to the normal
    Quad {
        /// Half extent along `tangent`
        half_width: f32,
        /// Half extent along `bitangent`
        half_height: f32,
        /// In-plane right axis
        tangent: Vec3,
        /// In-plane up axis
        bitangent: Vec3,
    },
}

/// Light source
#[derive(Debug, Clone)]
pub struct Light {
    /// Light position (centre of the quad for area lights)
    pub position: Vec3,
    /// Emission axis, normalized
    pub normal: Vec3,
    /// Diffuse colour scaled by power
    pub diffuse: Vec3,
    /// Specular colour scaled by power
    pub specular: Vec3,
    /// Kind and extents
    pub kind: LightKind,
    /// Shadow map used by the direct pass
    pub shadow_map: Option<ShadowMapHandle>,
}

impl Light {
    /// Create a point light
    pub fn point(position: Vec3, color: Vec3) -> Self {
        Self {
            position,
            normal: Vec3::new(0.0, -1.0, 0.0),
            diffuse: color,
            specular: color,
            kind: LightKind::Point,
            shadow_map: None,
        }
    }

    /// Create a spot light
    pub fn spot(position: Vec3, direction: Vec3, color: Vec3, cone_half_angle: f32) -> Self {
        Self {
            normal: direction.normalize(),
            kind: LightKind::Spot { cone_half_angle },
            ..Self::point(position, color)
        }
    }

    /// Create a quad light with a tangent frame derived from its normal
    pub fn quad(position: Vec3, normal: Vec3, color: Vec3, half_width: f32, half_height: f32) -> Self {
        let normal = normal.normalize();
        let (tangent, bitangent) = utils::orthonormal_basis(&normal);
        Self {
            normal,
            kind: LightKind::Quad { half_width, half_height, tangent, bitangent },
            ..Self::point(position, color)
        }
    }

    /// Build a light from its configuration entry
    pub fn from_descriptor(descriptor: &LightDescriptor) -> Self {
        let normal = descriptor.normal.normalize();
        let kind = match &descriptor.shape {
            LightShape::Point => LightKind::Point,
            LightShape::Spot { cone_half_angle_degrees } => LightKind::Spot {
                cone_half_angle: utils::deg_to_rad(*cone_half_angle_degrees),
            },
            LightShape::Quad { half_width, half_height, right } => {
                let (tangent, bitangent) = match right {
                    Some(right) => {
                        // Gram-Schmidt the configured axis into the light plane
                        let tangent = (right - normal * right.dot(&normal)).normalize();
                        (tangent, normal.cross(&tangent))
                    }
                    None => utils::orthonormal_basis(&normal),
                };
                LightKind::Quad {
                    half_width: *half_width,
                    half_height: *half_height,
                    tangent,
                    bitangent,
                }
            }
        };

        Self {
            position: descriptor.position,
            normal,
            diffuse: descriptor.diffuse * descriptor.power,
            specular: descriptor.specular * descriptor.power,
            kind,
            shadow_map: descriptor.shadow_map.map(ShadowMapHandle),
        }
    }

    /// Move the light; the only mutation allowed after configuration
    pub fn translate(&mut self, offset: Vec3) {
        self.position += offset;
        log::debug!("Light translated to {:?}", self.position);
    }

    /// Whether a sample direction leaves a spot light inside its cone
    ///
    /// Always true for non-spot lights.
    pub fn contains_direction(&self, direction: &Vec3) -> bool {
        match self.kind {
            LightKind::Spot { cone_half_angle } => {
                utils::angle_between(&self.normal, direction) <= cone_half_angle
            }
            _ => true,
        }
    }

    /// Whether a point on the light plane falls inside a quad light's extents
    ///
    /// Always true for non-quad lights.
    pub fn contains_plane_point(&self, point: &Vec3) -> bool {
        match self.kind {
            LightKind::Quad { half_width, half_height, tangent, bitangent } => {
                let offset = point - self.position;
                offset.dot(&tangent).abs() <= half_width && offset.dot(&bitangent).abs() <= half_height
            }
            _ => true,
        }
    }
}
