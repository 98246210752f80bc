//! Virtual point light storage
//!
//! The table has a fixed number of slots split into equal bounce bands.
//! Band 0 slots bounce light straight from a primary light; a slot in band
//! `b > 0` bounces light from the slot one band-width below it. Parents are
//! implicit in the slot index and never stored.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Vec3;
use crate::render::lighting::Light;
use crate::render::ray::ParentRef;
use crate::render::{RenderError, RenderResult};

/// A secondary light sample on a scene surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vpl {
    /// Surface position, already offset along the normal
    pub position: Vec3,
    /// Surface normal facing the incoming light
    pub normal: Vec3,
    /// Outgoing diffuse radiance
    pub diffuse: Vec3,
    /// Outgoing specular radiance
    pub specular: Vec3,
}

impl Default for Vpl {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            normal: Vec3::y(),
            diffuse: Vec3::zeros(),
            specular: Vec3::zeros(),
        }
    }
}

impl Vpl {
    /// Surface point the VPL was sampled at, before the `bias` offset
    pub fn surface_point(&self, bias: f32) -> Vec3 {
        self.position - self.normal * bias
    }
}

/// VPL layout published to compute kernels; `position.w` is 1 for valid slots
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuVpl {
    /// Position (xyz) and validity (w)
    pub position: [f32; 4],
    /// Normal (xyz)
    pub normal: [f32; 4],
    /// Diffuse radiance (xyz)
    pub diffuse: [f32; 4],
    /// Specular radiance (xyz)
    pub specular: [f32; 4],
}

impl GpuVpl {
    /// Whether the slot held a valid VPL when published
    pub fn is_valid(&self) -> bool {
        self.position[3] > 0.0
    }

    /// Position as a vector
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.position[0], self.position[1], self.position[2])
    }

    /// Normal as a vector
    pub fn normal(&self) -> Vec3 {
        Vec3::new(self.normal[0], self.normal[1], self.normal[2])
    }

    /// Diffuse radiance as a vector
    pub fn diffuse(&self) -> Vec3 {
        Vec3::new(self.diffuse[0], self.diffuse[1], self.diffuse[2])
    }
}

fn pack(v: &Vec3, w: f32) -> [f32; 4] {
    [v.x, v.y, v.z, w]
}

/// Fixed-size VPL population with per-slot validity
#[derive(Debug, Clone)]
pub struct VplTable {
    slots: Vec<Vpl>,
    valid: Vec<bool>,
    frame_start_valid: Vec<bool>,
    valid_count: usize,
    band_size: usize,
    light_count: usize,
}

impl VplTable {
    /// Create `count` invalid slots in `bands` equal bands fed by `light_count` lights
    pub fn new(count: usize, bands: usize, light_count: usize) -> RenderResult<Self> {
        if count == 0 || bands == 0 || count % bands != 0 {
            return Err(RenderError::InitializationFailed(format!(
                "{count} VPL slots cannot be split into {bands} equal bands"
            )));
        }
        if light_count == 0 {
            return Err(RenderError::InitializationFailed(
                "VPL table needs at least one primary light".to_string(),
            ));
        }

        Ok(Self {
            slots: vec![Vpl::default(); count],
            valid: vec![false; count],
            frame_start_valid: vec![false; count],
            valid_count: 0,
            band_size: count / bands,
            light_count,
        })
    }

    /// Number of slots (N)
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the table has no slots
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots per band (N / B)
    pub fn band_size(&self) -> usize {
        self.band_size
    }

    /// Number of bands (B)
    pub fn band_count(&self) -> usize {
        self.slots.len() / self.band_size
    }

    /// Band holding `slot`
    pub fn band_of(&self, slot: usize) -> usize {
        slot / self.band_size
    }

    /// Where `slot` receives its light from
    pub fn parent_of(&self, slot: usize) -> ParentRef {
        if slot < self.band_size {
            ParentRef::Primary(slot % self.light_count)
        } else {
            ParentRef::Sample(slot - self.band_size)
        }
    }

    /// VPL data of `slot`, regardless of validity
    pub fn get(&self, slot: usize) -> Option<&Vpl> {
        self.slots.get(slot)
    }

    /// Whether `slot` currently holds a usable VPL
    pub fn is_valid(&self, slot: usize) -> bool {
        self.valid.get(slot).copied().unwrap_or(false)
    }

    /// Whether `slot` was valid when [`VplTable::begin_frame`] was last called
    pub fn was_valid_at_frame_start(&self, slot: usize) -> bool {
        self.frame_start_valid.get(slot).copied().unwrap_or(false)
    }

    /// Number of valid slots
    pub fn valid_count(&self) -> usize {
        self.valid_count
    }

    /// Number of invalid slots
    pub fn invalid_count(&self) -> usize {
        self.slots.len() - self.valid_count
    }

    /// Indices of valid slots in ascending order
    pub fn valid_slots(&self) -> impl Iterator<Item = usize> + '_ {
        self.valid.iter().enumerate().filter_map(|(slot, &valid)| valid.then_some(slot))
    }

    /// Snapshot validity so bounce slots can check their parent's state
    pub fn begin_frame(&mut self) {
        self.frame_start_valid.copy_from_slice(&self.valid);
    }

    /// Mark `slot` invalid; returns whether it was valid
    pub fn invalidate(&mut self, slot: usize) -> bool {
        match self.valid.get_mut(slot) {
            Some(valid) if *valid => {
                *valid = false;
                self.valid_count -= 1;
                true
            }
            _ => false,
        }
    }

    /// Store a freshly generated VPL in `slot` and mark it valid
    pub fn store(&mut self, slot: usize, vpl: Vpl) {
        if slot >= self.slots.len() {
            return;
        }
        self.slots[slot] = vpl;
        if !self.valid[slot] {
            self.valid[slot] = true;
            self.valid_count += 1;
        }
    }

    /// World position of a parent
    pub fn parent_position(&self, parent: ParentRef, lights: &[Light]) -> Option<Vec3> {
        match parent {
            ParentRef::Primary(light) => lights.get(light).map(|light| light.position),
            ParentRef::Sample(slot) => self.get(slot).map(|vpl| vpl.position),
        }
    }

    /// Length of the light path from the primary light down to `parent`
    ///
    /// Zero for a primary light; for a sample parent, the sum of segment
    /// lengths between it and each of its ancestors.
    pub fn path_length(&self, parent: ParentRef, lights: &[Light]) -> f32 {
        let mut length = 0.0;
        let mut current = parent;
        while let ParentRef::Sample(slot) = current {
            let above = self.parent_of(slot);
            let (Some(here), Some(there)) = (self.get(slot), self.parent_position(above, lights)) else {
                break;
            };
            length += (here.position - there).norm();
            current = above;
        }
        length
    }

    /// GPU copy of every slot
    pub fn publish(&self) -> Vec<GpuVpl> {
        self.slots
            .iter()
            .zip(&self.valid)
            .map(|(vpl, &valid)| GpuVpl {
                position: pack(&vpl.position, if valid { 1.0 } else { 0.0 }),
                normal: pack(&vpl.normal, 0.0),
                diffuse: pack(&vpl.diffuse, 0.0),
                specular: pack(&vpl.specular, 0.0),
            })
            .collect()
    }

    /// Parent→VPL segments of every valid slot, for drawing the light paths
    pub fn debug_lines(&self, lights: &[Light]) -> Vec<[Vec3; 2]> {
        self.valid_slots()
            .filter_map(|slot| {
                let from = self.parent_position(self.parent_of(slot), lights)?;
                Some([from, self.slots[slot].position])
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn vpl_at(position: Vec3) -> Vpl {
        Vpl { position, ..Vpl::default() }
    }

    #[test]
    fn test_parents_follow_bands() {
        let table = VplTable::new(8, 2, 3).unwrap();
        assert_eq!(table.band_size(), 4);
        assert_eq!(table.band_count(), 2);
        assert_eq!(table.parent_of(0), ParentRef::Primary(0));
        assert_eq!(table.parent_of(3), ParentRef::Primary(0));
        assert_eq!(table.parent_of(2), ParentRef::Primary(2));
        assert_eq!(table.parent_of(5), ParentRef::Sample(1));
        assert_eq!(table.band_of(7), 1);
    }

    #[test]
    fn test_uneven_bands_are_rejected() {
        assert!(VplTable::new(10, 3, 1).is_err());
        assert!(VplTable::new(8, 2, 0).is_err());
    }

    #[test]
    fn test_counts_stay_consistent() {
        let mut table = VplTable::new(6, 3, 1).unwrap();
        table.store(1, vpl_at(Vec3::x()));
        table.store(1, vpl_at(Vec3::y()));
        table.store(4, vpl_at(Vec3::z()));
        assert_eq!(table.valid_count(), 2);
        assert_eq!(table.valid_count() + table.invalid_count(), table.len());

        assert!(table.invalidate(1));
        assert!(!table.invalidate(1));
        assert!(!table.invalidate(99));
        assert_eq!(table.valid_count(), 1);
        assert_eq!(table.valid_slots().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn test_frame_start_snapshot() {
        let mut table = VplTable::new(4, 2, 1).unwrap();
        table.store(0, Vpl::default());
        table.begin_frame();
        table.invalidate(0);
        table.store(1, Vpl::default());
        assert!(table.was_valid_at_frame_start(0));
        assert!(!table.was_valid_at_frame_start(1));
        assert!(!table.is_valid(0));
    }

    #[test]
    fn test_path_length_walks_ancestors() {
        let light = Light::point(Vec3::new(0.0, 4.0, 0.0), Vec3::repeat(1.0));
        let mut table = VplTable::new(6, 3, 1).unwrap();
        table.store(0, vpl_at(Vec3::zeros()));
        table.store(2, vpl_at(Vec3::new(3.0, 0.0, 0.0)));

        let lights = [light];
        assert_relative_eq!(table.path_length(ParentRef::Primary(0), &lights), 0.0);
        assert_relative_eq!(table.path_length(ParentRef::Sample(0), &lights), 4.0);
        assert_relative_eq!(table.path_length(ParentRef::Sample(2), &lights), 7.0);
    }

    #[test]
    fn test_publish_and_debug_lines() {
        let lights = [Light::point(Vec3::new(0.0, 2.0, 0.0), Vec3::repeat(1.0))];
        let mut table = VplTable::new(4, 2, 1).unwrap();
        table.store(1, vpl_at(Vec3::x()));
        table.store(3, vpl_at(Vec3::z()));

        let published = table.publish();
        assert_eq!(published.len(), 4);
        assert!(!published[0].is_valid());
        assert!(published[1].is_valid());
        assert_eq!(published[3].position(), Vec3::z());
        assert_eq!(bytemuck::cast_slice::<GpuVpl, u8>(&published).len(), 4 * 64);

        let lines = table.debug_lines(&lights);
        assert_eq!(lines, vec![[Vec3::new(0.0, 2.0, 0.0), Vec3::x()], [Vec3::x(), Vec3::z()]]);
    }
}
