//! VPL revalidation
//!
//! Every valid VPL is re-tested each frame against the light it came from.
//! One occlusion ray per slot goes into a single batch; a blocked ray, or a
//! band 0 VPL that has drifted outside its light's emission bounds, marks the
//! slot invalid so generation can reuse it.
//!
//! Only the tested slot is invalidated. Bounce slots whose parent was just
//! invalidated keep their old radiance until their own test fails.

use crate::foundation::math::{constants, utils, Vec3};
use crate::render::backend::{BufferKind, QueryBuffer, RayTracingBackend};
use crate::render::gi::vpl::VplTable;
use crate::render::lighting::{Light, LightKind};
use crate::render::ray::{ParentRef, Ray, RayTag};
use crate::render::RenderResult;

/// Outcome of one revalidation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevalidationReport {
    /// Slots that were tested
    pub tested: usize,
    /// Slots that lost validity
    pub invalidated: usize,
}

/// Distance from `vpl` along the reversed normal of a quad light to its plane
///
/// Solved with the law of sines in the triangle formed by the VPL, the light
/// centre and the point where the travel ray meets the light plane. When the
/// light faces straight down the triangle collapses onto the vertical axis
/// and the adjacent side `cos(angle) * hyp` is used instead.
pub fn quad_travel_distance(vpl: &Vec3, light_position: &Vec3, light_normal: &Vec3) -> f32 {
    let normal = light_normal.normalize();
    let to_light = light_position - vpl;
    let hyp = to_light.norm();
    if hyp <= f32::EPSILON {
        return 0.0;
    }

    // Angle at the VPL between the light centre and the travel direction
    let angle_vpl = utils::angle_between(&to_light, &-normal);

    let down = -Vec3::y();
    if normal.dot(&down) >= 1.0 - 1e-6 {
        return angle_vpl.cos() * hyp;
    }

    // In-plane direction from the light centre towards the hit point
    let offset = vpl - light_position;
    let mut tangent = offset - normal * offset.dot(&normal);
    if tangent.norm() <= 1e-4 * hyp {
        tangent = normal.cross(&down);
    }

    let angle_light = utils::angle_between(&offset, &tangent);
    let angle_hit = constants::PI - angle_vpl - angle_light;
    let sin_hit = angle_hit.sin();
    if sin_hit.abs() <= f32::EPSILON {
        return angle_vpl.cos() * hyp;
    }
    hyp * angle_light.sin() / sin_hit
}

/// Tests existing VPLs against their parents
#[derive(Debug)]
pub struct RevalidationEngine {
    bias: f32,
    rays: Vec<Ray>,
    // Plane hit point per ray for quad parents
    plane_points: Vec<Option<Vec3>>,
    buffer: QueryBuffer,
}

impl RevalidationEngine {
    /// Allocate an occlusion buffer large enough for every slot
    pub fn new(backend: &mut dyn RayTracingBackend, slot_count: usize, bias: f32) -> RenderResult<Self> {
        Ok(Self {
            bias,
            rays: Vec::with_capacity(slot_count),
            plane_points: Vec::with_capacity(slot_count),
            buffer: QueryBuffer::create(backend, BufferKind::Occlusion, slot_count)?,
        })
    }

    /// Rays built by the last [`RevalidationEngine::build_rays`]
    pub fn rays(&self) -> &[Ray] {
        &self.rays
    }

    /// One occlusion ray per valid slot, from its parent toward it
    pub fn build_rays(&mut self, table: &VplTable, lights: &[Light]) -> &[Ray] {
        self.rays.clear();
        self.plane_points.clear();

        for slot in table.valid_slots() {
            let Some(vpl) = table.get(slot) else { continue };
            let parent = table.parent_of(slot);
            let tag = RayTag::Sample { slot, parent };

            let (ray, plane_point) = match parent {
                ParentRef::Primary(index) => match lights.get(index) {
                    Some(light) if matches!(light.kind, LightKind::Quad { .. }) => {
                        let travel = quad_travel_distance(&vpl.position, &light.position, &light.normal);
                        let ray = Ray::new(vpl.position, -light.normal, travel - self.bias, tag);
                        (ray, Some(vpl.position - light.normal * travel))
                    }
                    Some(light) => (Ray::between(light.position, vpl.position, self.bias, tag), None),
                    None => (Ray::inactive(), None),
                },
                ParentRef::Sample(parent_slot) => match table.get(parent_slot) {
                    Some(source) => (Ray::between(source.position, vpl.position, self.bias, tag), None),
                    None => (Ray::inactive(), None),
                },
            };
            self.rays.push(ray);
            self.plane_points.push(plane_point);
        }

        &self.rays
    }

    /// Test every valid slot and invalidate the failures
    pub fn run(
        &mut self,
        table: &mut VplTable,
        lights: &[Light],
        backend: &mut dyn RayTracingBackend,
    ) -> RenderResult<RevalidationReport> {
        self.build_rays(table, lights);
        let flags = self.buffer.occlusion(backend, &self.rays)?;

        let mut report = RevalidationReport { tested: self.rays.len(), invalidated: 0 };
        for ((ray, flag), plane_point) in self.rays.iter().zip(&flags).zip(&self.plane_points) {
            let RayTag::Sample { slot, parent } = ray.tag else { continue };

            let out_of_bounds = match parent {
                ParentRef::Primary(index) => lights
                    .get(index)
                    .map_or(true, |light| self.outside_light_bounds(light, table, slot, plane_point.as_ref())),
                ParentRef::Sample(_) => false,
            };

            if (flag.is_occluded() || out_of_bounds) && table.invalidate(slot) {
                report.invalidated += 1;
            }
        }

        log::trace!("Revalidated {} VPLs, {} invalidated", report.tested, report.invalidated);
        Ok(report)
    }

    /// Return the occlusion buffer to the backend
    pub fn release(self, backend: &mut dyn RayTracingBackend) {
        self.buffer.release(backend);
    }

    fn outside_light_bounds(&self, light: &Light, table: &VplTable, slot: usize, plane_point: Option<&Vec3>) -> bool {
        match light.kind {
            LightKind::Point => false,
            // Measured at the sampled point; the offset would tilt edge samples out of the cone
            LightKind::Spot { .. } => table.get(slot).map_or(true, |vpl| {
                !light.contains_direction(&(vpl.surface_point(self.bias) - light.position))
            }),
            LightKind::Quad { .. } => {
                // A VPL on or behind the emitter plane cannot be lit by it
                let in_front = table.get(slot).map_or(false, |vpl| {
                    quad_travel_distance(&vpl.position, &light.position, &light.normal) > self.bias
                });
                !in_front || plane_point.map_or(true, |point| !light.contains_plane_point(point))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quad_distance_directly_beneath() {
        let distance = quad_travel_distance(&Vec3::zeros(), &Vec3::new(0.0, 2.5, 0.0), &-Vec3::y());
        assert_relative_eq!(distance, 2.5, epsilon = 1e-5);
    }

    #[test]
    fn test_quad_distance_degenerate_branch_is_adjacent_side() {
        let vpl = Vec3::new(1.0, 0.0, 0.5);
        let light = Vec3::new(0.0, 2.0, 0.0);
        let hyp = (light - vpl).norm();
        let angle = utils::angle_between(&(light - vpl), &Vec3::y());
        assert_relative_eq!(quad_travel_distance(&vpl, &light, &-Vec3::y()), angle.cos() * hyp, epsilon = 1e-5);
        assert_relative_eq!(quad_travel_distance(&vpl, &light, &-Vec3::y()), 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_quad_distance_tilted_light() {
        let normal = Vec3::new(0.3, -1.0, 0.2).normalize();
        let light = Vec3::new(0.5, 3.0, -0.5);
        for vpl in [Vec3::zeros(), Vec3::new(1.5, 0.2, 0.7), light + normal * 2.0] {
            let expected = (vpl - light).dot(&normal);
            assert_relative_eq!(quad_travel_distance(&vpl, &light, &normal), expected, epsilon = 1e-3);
        }
    }
}
