//! VPL generation
//!
//! Each frame a bounded number of invalid slots is re-seeded. A slot's ray
//! leaves its parent (a primary light or a VPL one band below), and the
//! closest hit becomes the new VPL, shaded with the surface albedo and the
//! parent's radiance.
//!
//! A monotonic cursor walks the ring so consecutive frames keep moving
//! through the population instead of retrying the same slots.

use crate::core::VplConfig;
use crate::foundation::math::{constants, utils, Vec3};
use crate::foundation::sampling::{halton3, BounceSampler};
use crate::render::backend::{BufferKind, QueryBuffer, RayTracingBackend};
use crate::render::gi::vpl::{Vpl, VplTable};
use crate::render::lighting::{Light, LightKind};
use crate::render::material::MaterialSampler;
use crate::render::ray::{ParentRef, Ray, RayTag};
use crate::render::RenderResult;

/// First Halton index used for primary-light samples
pub const FIRST_SAMPLE_INDEX: u64 = 1000;

/// Outcome of one generation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    /// Slots looked at by the candidate scan
    pub examined: usize,
    /// Rays cast, bounded by the per-frame budget
    pub attempted: usize,
    /// Slots that became valid, in ray order
    pub regenerated: Vec<usize>,
}

/// Invalid slots that may be regenerated this frame
///
/// Starts at the cursor and wraps around the ring, looking at each slot at
/// most once. Bounce slots are skipped unless their parent was valid at the
/// start of the frame and still is.
#[derive(Debug)]
pub struct CandidateSlots<'a> {
    table: &'a VplTable,
    cursor: &'a mut usize,
    examined: usize,
}

impl<'a> CandidateSlots<'a> {
    /// Scan `table` starting at `cursor`, advancing it as slots are examined
    pub fn new(table: &'a VplTable, cursor: &'a mut usize) -> Self {
        Self { table, cursor, examined: 0 }
    }

    /// Slots examined so far, including skipped ones
    pub fn examined(&self) -> usize {
        self.examined
    }

    fn eligible(&self, slot: usize) -> bool {
        if self.table.is_valid(slot) {
            return false;
        }
        match self.table.parent_of(slot) {
            ParentRef::Primary(_) => true,
            ParentRef::Sample(parent) => {
                self.table.was_valid_at_frame_start(parent) && self.table.is_valid(parent)
            }
        }
    }
}

impl Iterator for CandidateSlots<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let len = self.table.len();
        while self.examined < len {
            let slot = *self.cursor % len;
            *self.cursor = (slot + 1) % len;
            self.examined += 1;
            if self.eligible(slot) {
                return Some(slot);
            }
        }
        None
    }
}

/// Re-seeds invalid VPL slots under a per-frame ray budget
#[derive(Debug)]
pub struct GenerationEngine {
    budget: usize,
    bias: f32,
    max_distance: f32,
    cursor: usize,
    sample_index: u64,
    sampler: BounceSampler,
    rays: Vec<Ray>,
    buffer: QueryBuffer,
}

impl GenerationEngine {
    /// Allocate an intersection buffer sized to the budget
    pub fn new(backend: &mut dyn RayTracingBackend, config: &VplConfig) -> RenderResult<Self> {
        let budget = config.max_regenerations_per_frame;
        Ok(Self {
            budget,
            bias: config.ray_bias,
            max_distance: config.max_ray_distance,
            cursor: 0,
            sample_index: FIRST_SAMPLE_INDEX,
            sampler: BounceSampler::new(config.seed),
            rays: Vec::with_capacity(budget),
            buffer: QueryBuffer::create(backend, BufferKind::Intersections, budget)?,
        })
    }

    /// Maximum rays cast per frame
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Next slot the candidate scan will look at
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Pick candidates and build one ray per candidate
    pub fn build_rays(&mut self, table: &VplTable, lights: &[Light]) -> (usize, &[Ray]) {
        self.rays.clear();

        let mut candidates = CandidateSlots::new(table, &mut self.cursor);
        let slots: Vec<usize> = candidates.by_ref().take(self.budget).collect();
        let examined = candidates.examined();

        for slot in slots {
            let parent = table.parent_of(slot);
            let tag = RayTag::Sample { slot, parent };
            let ray = match parent {
                ParentRef::Primary(index) => match lights.get(index) {
                    Some(light) => {
                        let (origin, direction) = self.sample_light(light);
                        Ray::new(origin, direction, self.max_distance, tag)
                    }
                    None => Ray::inactive(),
                },
                ParentRef::Sample(parent_slot) => match table.get(parent_slot) {
                    Some(source) => {
                        let direction = self.sampler.bounce_direction(&source.normal);
                        Ray::new(source.position, direction, self.max_distance, tag)
                    }
                    None => Ray::inactive(),
                },
            };
            self.rays.push(ray);
        }

        (examined, &self.rays)
    }

    /// Spend this frame's budget on invalid slots
    pub fn run(
        &mut self,
        table: &mut VplTable,
        lights: &[Light],
        materials: &dyn MaterialSampler,
        backend: &mut dyn RayTracingBackend,
    ) -> RenderResult<GenerationReport> {
        let (examined, _) = self.build_rays(table, lights);
        let hits = self.buffer.intersection(backend, &self.rays)?;

        let mut report = GenerationReport {
            examined,
            attempted: self.rays.len(),
            regenerated: Vec::new(),
        };

        for (ray, hit) in self.rays.iter().zip(&hits) {
            let RayTag::Sample { slot, parent } = ray.tag else { continue };
            if !hit.is_hit() {
                continue;
            }
            let Some(radiance) = parent_radiance(table, lights, parent) else { continue };

            let [u, v] = hit.uv;
            let normal = utils::face_forward(materials.normal(hit.shape_id, hit.prim_id, u, v), &-ray.direction);
            let albedo = materials.diffuse(hit.shape_id, hit.prim_id, u, v);
            let cos = normal.dot(&-ray.direction).max(0.0);

            let path = hit.distance + table.path_length(parent, lights);
            let attenuation = 1.0 / (1.0 + path * path);

            let vpl = Vpl {
                position: ray.point_at(hit.distance) + normal * self.bias,
                normal,
                diffuse: radiance.component_mul(&albedo) * (cos / constants::PI) * attenuation,
                specular: Vec3::zeros(),
            };
            table.store(slot, vpl);
            report.regenerated.push(slot);
        }

        log::trace!(
            "Generation examined {} slots, cast {} rays, regenerated {}",
            report.examined,
            report.attempted,
            report.regenerated.len()
        );
        Ok(report)
    }

    /// Return the intersection buffer to the backend
    pub fn release(self, backend: &mut dyn RayTracingBackend) {
        self.buffer.release(backend);
    }

    /// Origin and direction of the next primary-light sample
    fn sample_light(&mut self, light: &Light) -> (Vec3, Vec3) {
        let [h0, h1, h2] = halton3(self.sample_index);
        self.sample_index += 1;

        match light.kind {
            LightKind::Point => (
                light.position,
                Vec3::new(2.0 * h0 - 1.0, 2.0 * h1 - 1.0, 2.0 * h2 - 1.0),
            ),
            LightKind::Spot { cone_half_angle } => {
                let theta = h0 * cone_half_angle;
                let phi = constants::TAU * h1;
                let (tangent, bitangent) = utils::orthonormal_basis(&light.normal);
                let direction = tangent * (theta.sin() * phi.cos())
                    + bitangent * (theta.sin() * phi.sin())
                    + light.normal * theta.cos();
                (light.position, direction)
            }
            LightKind::Quad { half_width, half_height, tangent, bitangent } => {
                let origin = light.position
                    + tangent * ((2.0 * h0 - 1.0) * half_width)
                    + bitangent * ((2.0 * h1 - 1.0) * half_height);
                (origin, light.normal)
            }
        }
    }
}

fn parent_radiance(table: &VplTable, lights: &[Light], parent: ParentRef) -> Option<Vec3> {
    match parent {
        ParentRef::Primary(index) => lights.get(index).map(|light| light.diffuse),
        ParentRef::Sample(slot) => table.get(slot).map(|vpl| vpl.diffuse),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_wrap_from_cursor() {
        let mut table = VplTable::new(4, 1, 1).unwrap();
        table.store(1, Vpl::default());
        table.begin_frame();

        let mut cursor = 2;
        let mut candidates = CandidateSlots::new(&table, &mut cursor);
        let slots: Vec<usize> = candidates.by_ref().collect();
        assert_eq!(slots, vec![2, 3, 0]);
        assert_eq!(candidates.examined(), 4);
        assert_eq!(cursor, 2);
    }

    #[test]
    fn test_take_leaves_cursor_after_last_candidate() {
        let table = VplTable::new(6, 1, 1).unwrap();
        let mut cursor = 4;
        let slots: Vec<usize> = CandidateSlots::new(&table, &mut cursor).take(3).collect();
        assert_eq!(slots, vec![4, 5, 0]);
        assert_eq!(cursor, 1);
    }

    #[test]
    fn test_bounce_slot_needs_parent_valid_at_frame_start() {
        let mut table = VplTable::new(8, 2, 1).unwrap();
        for slot in [0, 2, 3] {
            table.store(slot, Vpl::default());
        }
        table.begin_frame();
        // Regenerated this frame, so not usable as a parent yet
        table.store(1, Vpl::default());
        // Invalidated this frame
        table.invalidate(3);

        let mut cursor = 0;
        let slots: Vec<usize> = CandidateSlots::new(&table, &mut cursor).collect();
        assert_eq!(slots, vec![3, 4, 6]);
    }
}
