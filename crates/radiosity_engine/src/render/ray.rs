//! Ray batches exchanged with the ray-tracing backend

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Vec3;

/// Parent of a VPL slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentRef {
    /// A primary light, by index into the light list
    Primary(usize),
    /// Another VPL slot one bounce band down
    Sample(usize),
}

/// What a ray is for, carried through the backend untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RayTag {
    /// Seeds or revalidates VPL `slot` from `parent`
    Sample {
        /// Slot being generated or tested
        slot: usize,
        /// Where the slot's light comes from
        parent: ParentRef,
    },
    /// Visibility between a screen pixel and a VPL
    Visibility {
        /// Linear pixel index
        pixel: u32,
        /// VPL slot
        slot: u32,
    },
    /// Padding emitted by a dispatch thread with nothing to test
    Inactive,
}

/// A ray with its payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Ray origin
    pub origin: Vec3,
    /// Normalized direction
    pub direction: Vec3,
    /// Hits beyond this distance are ignored
    pub max_distance: f32,
    /// Payload
    pub tag: RayTag,
}

impl Ray {
    /// Create a ray; `direction` need not be normalized
    pub fn new(origin: Vec3, direction: Vec3, max_distance: f32, tag: RayTag) -> Self {
        let length = direction.norm();
        let direction = if length > f32::EPSILON {
            direction / length
        } else {
            Vec3::y()
        };
        Self {
            origin,
            direction,
            max_distance,
            tag,
        }
    }

    /// Ray from `from` toward `to`, stopping `bias` short of the target
    pub fn between(from: Vec3, to: Vec3, bias: f32, tag: RayTag) -> Self {
        let delta = to - from;
        Self::new(from, delta, (delta.norm() - bias).max(0.0), tag)
    }

    /// Placeholder ray that never hits anything
    pub fn inactive() -> Self {
        Self {
            origin: Vec3::zeros(),
            direction: Vec3::y(),
            max_distance: 0.0,
            tag: RayTag::Inactive,
        }
    }

    /// Whether the backend has anything to trace
    pub fn is_active(&self) -> bool {
        !matches!(self.tag, RayTag::Inactive) && self.max_distance > 0.0
    }

    /// Point at distance `t` along the ray
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// GPU layout of this ray
    pub fn to_gpu(&self) -> GpuRay {
        GpuRay {
            origin: [self.origin.x, self.origin.y, self.origin.z, self.max_distance],
            direction: [self.direction.x, self.direction.y, self.direction.z, 0.0],
        }
    }
}

/// Ray layout consumed by GPU backends: origin.w holds the max distance
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct GpuRay {
    /// Origin (xyz) and max distance (w)
    pub origin: [f32; 4],
    /// Direction (xyz), w unused
    pub direction: [f32; 4],
}

/// Closest-hit record
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    /// Mesh that was hit, −1 on a miss
    pub shape_id: i32,
    /// Triangle within the mesh
    pub prim_id: i32,
    /// Barycentric coordinates of the hit
    pub uv: [f32; 2],
    /// Distance along the ray
    pub distance: f32,
}

impl Intersection {
    /// Record for a ray that hit nothing
    pub const MISS: Self = Self {
        shape_id: -1,
        prim_id: -1,
        uv: [0.0, 0.0],
        distance: f32::INFINITY,
    };

    /// Whether the ray hit geometry
    pub fn is_hit(&self) -> bool {
        self.shape_id >= 0
    }
}

/// Visibility-only result, one per ray
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occlusion {
    /// Nothing between origin and max distance
    Clear,
    /// Something blocks the ray
    Occluded,
}

impl Occlusion {
    /// Whether the ray was blocked
    pub fn is_occluded(self) -> bool {
        matches!(self, Self::Occluded)
    }
}
