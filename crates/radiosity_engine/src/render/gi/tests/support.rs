//! Test doubles: a backend that answers from a script and a flat material

use std::collections::HashMap;

use crate::foundation::math::{Vec3, Vec4};
use crate::render::backend::{BackendResult, BufferId, BufferKind, CompletionEvent, RayTracingBackend, SignaledEvent};
use crate::render::backends::cpu::CpuBackend;
use crate::render::camera::Camera;
use crate::render::image::GBuffer;
use crate::render::material::MaterialSampler;
use crate::render::ray::{Intersection, Occlusion, Ray, RayTag};
use crate::render::RenderError;
use crate::scene::Scene;

/// How the scripted backend answers closest-hit queries
#[derive(Debug, Clone, Copy)]
pub enum HitScript {
    /// Every active ray hits at this distance
    Always(f32),
    /// Nothing is ever hit
    Never,
    /// Every `n`-th active ray misses, the rest hit at 1.0
    MissEvery(usize),
}

/// How the scripted backend answers occlusion queries
#[derive(Debug, Clone, Copy)]
pub enum OcclusionScript {
    /// Nothing is ever blocked
    Clear,
    /// Every active ray is blocked
    Blocked,
    /// Every `n`-th active ray is blocked
    BlockEvery(usize),
}

#[derive(Debug)]
enum Stored {
    Intersections(Vec<Intersection>),
    Occlusion(Vec<Occlusion>),
}

/// Backend answering from fixed scripts instead of geometry
#[derive(Debug)]
pub struct ScriptedBackend {
    pub hits: HitScript,
    pub occlusion: OcclusionScript,
    buffers: HashMap<BufferId, (usize, Stored)>,
    next_id: u64,
    counter: usize,
    pub occlusion_rays: Vec<Ray>,
}

impl ScriptedBackend {
    pub fn new(hits: HitScript, occlusion: OcclusionScript) -> Self {
        Self {
            hits,
            occlusion,
            buffers: HashMap::new(),
            next_id: 1,
            counter: 0,
            occlusion_rays: Vec::new(),
        }
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    fn stored(&mut self, id: BufferId, count: usize) -> BackendResult<&mut Stored> {
        match self.buffers.get_mut(&id) {
            Some((capacity, stored)) if count <= *capacity => Ok(stored),
            Some((capacity, _)) => Err(RenderError::Backend(format!("{count} records exceed capacity {capacity}"))),
            None => Err(RenderError::Backend(format!("unknown buffer {id:?}"))),
        }
    }

    fn next_counter(&mut self) -> usize {
        self.counter += 1;
        self.counter
    }
}

impl RayTracingBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn create_buffer(&mut self, kind: BufferKind, capacity: usize) -> BackendResult<BufferId> {
        let id = BufferId(self.next_id);
        self.next_id += 1;
        let stored = match kind {
            BufferKind::Intersections => Stored::Intersections(Vec::new()),
            BufferKind::Occlusion => Stored::Occlusion(Vec::new()),
        };
        self.buffers.insert(id, (capacity, stored));
        Ok(id)
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(&buffer);
    }

    fn query_intersection(&mut self, rays: &[Ray], results: BufferId) -> BackendResult<Box<dyn CompletionEvent>> {
        let mut records = Vec::with_capacity(rays.len());
        for ray in rays {
            let hit = ray.is_active() && {
                let n = self.next_counter();
                match self.hits {
                    HitScript::Always(_) => true,
                    HitScript::Never => false,
                    HitScript::MissEvery(every) => n % every != 0,
                }
            };
            let distance = match self.hits {
                HitScript::Always(distance) => distance,
                _ => 1.0,
            };
            records.push(if hit {
                Intersection { shape_id: 0, prim_id: 0, uv: [0.25, 0.25], distance }
            } else {
                Intersection::MISS
            });
        }
        *self.stored(results, rays.len())? = Stored::Intersections(records);
        Ok(Box::new(SignaledEvent))
    }

    fn query_occlusion(&mut self, rays: &[Ray], results: BufferId) -> BackendResult<Box<dyn CompletionEvent>> {
        let mut records = Vec::with_capacity(rays.len());
        for ray in rays {
            let blocked = ray.is_active() && {
                let n = self.next_counter();
                match self.occlusion {
                    OcclusionScript::Clear => false,
                    OcclusionScript::Blocked => true,
                    OcclusionScript::BlockEvery(every) => n % every == 0,
                }
            };
            records.push(if blocked { Occlusion::Occluded } else { Occlusion::Clear });
        }
        self.occlusion_rays = rays.to_vec();
        *self.stored(results, rays.len())? = Stored::Occlusion(records);
        Ok(Box::new(SignaledEvent))
    }

    fn map_intersections(
        &mut self,
        buffer: BufferId,
        count: usize,
        event: Box<dyn CompletionEvent>,
    ) -> BackendResult<Vec<Intersection>> {
        event.wait();
        match self.stored(buffer, count)? {
            Stored::Intersections(records) => Ok(records[..count].to_vec()),
            Stored::Occlusion(_) => Err(RenderError::Backend("not an intersection buffer".to_string())),
        }
    }

    fn map_occlusion(
        &mut self,
        buffer: BufferId,
        count: usize,
        event: Box<dyn CompletionEvent>,
    ) -> BackendResult<Vec<Occlusion>> {
        event.wait();
        match self.stored(buffer, count)? {
            Stored::Occlusion(records) => Ok(records[..count].to_vec()),
            Stored::Intersections(_) => Err(RenderError::Backend("not an occlusion buffer".to_string())),
        }
    }
}

/// CPU backend whose first `failures` visibility batches report a device error
#[derive(Debug)]
pub struct FlakyBackend {
    pub inner: CpuBackend,
    pub failures: usize,
}

impl RayTracingBackend for FlakyBackend {
    fn name(&self) -> &str {
        "flaky"
    }

    fn create_buffer(&mut self, kind: BufferKind, capacity: usize) -> BackendResult<BufferId> {
        self.inner.create_buffer(kind, capacity)
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        self.inner.release_buffer(buffer);
    }

    fn query_intersection(&mut self, rays: &[Ray], results: BufferId) -> BackendResult<Box<dyn CompletionEvent>> {
        self.inner.query_intersection(rays, results)
    }

    fn query_occlusion(&mut self, rays: &[Ray], results: BufferId) -> BackendResult<Box<dyn CompletionEvent>> {
        let visibility = !rays.iter().any(|ray| matches!(ray.tag, RayTag::Sample { .. }));
        if visibility && self.failures > 0 {
            self.failures -= 1;
            return Err(RenderError::Backend("device lost".to_string()));
        }
        self.inner.query_occlusion(rays, results)
    }

    fn map_intersections(
        &mut self,
        buffer: BufferId,
        count: usize,
        event: Box<dyn CompletionEvent>,
    ) -> BackendResult<Vec<Intersection>> {
        self.inner.map_intersections(buffer, count, event)
    }

    fn map_occlusion(
        &mut self,
        buffer: BufferId,
        count: usize,
        event: Box<dyn CompletionEvent>,
    ) -> BackendResult<Vec<Occlusion>> {
        self.inner.map_occlusion(buffer, count, event)
    }
}

/// Grey, upward-facing material everywhere
#[derive(Debug, Clone, Copy)]
pub struct FlatMaterial;

impl MaterialSampler for FlatMaterial {
    fn diffuse(&self, _mesh: i32, _face: i32, _u: f32, _v: f32) -> Vec3 {
        Vec3::repeat(0.5)
    }

    fn specular(&self, _mesh: i32, _face: i32, _u: f32, _v: f32) -> Vec3 {
        Vec3::zeros()
    }

    fn normal(&self, _mesh: i32, _face: i32, _u: f32, _v: f32) -> Vec3 {
        Vec3::y()
    }
}

/// Fully covered G-buffer of an upward-facing floor at y = 0
pub fn floor_gbuffer(width: u32, height: u32) -> GBuffer {
    let mut gbuffer = GBuffer::new(width, height);
    for y in 0..height {
        for x in 0..width {
            *gbuffer.positions.get_mut(x, y) = Vec4::new(x as f32 * 0.1, 0.0, y as f32 * 0.1, 1.0);
            *gbuffer.normals.get_mut(x, y) = Vec3::y();
            *gbuffer.albedo.get_mut(x, y) = Vec3::repeat(0.5);
        }
    }
    gbuffer
}

/// Ray-cast G-buffer of `scene` as seen by `camera`
pub fn traced_gbuffer(scene: &Scene, camera: &Camera, width: u32, height: u32) -> GBuffer {
    let mut gbuffer = GBuffer::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let direction = camera.primary_ray_direction(x, y, width, height);
            let ray = Ray::new(camera.position, direction, camera.far, RayTag::Visibility { pixel: 0, slot: 0 });
            let hit = scene.intersect(&ray);
            if !hit.is_hit() {
                continue;
            }
            let [u, v] = hit.uv;
            let p = ray.point_at(hit.distance);
            let normal = scene.normal(hit.shape_id, hit.prim_id, u, v);
            let normal = if normal.dot(&direction) > 0.0 { -normal } else { normal };
            *gbuffer.positions.get_mut(x, y) = Vec4::new(p.x, p.y, p.z, 1.0);
            *gbuffer.normals.get_mut(x, y) = normal;
            *gbuffer.albedo.get_mut(x, y) = scene.diffuse(hit.shape_id, hit.prim_id, u, v);
        }
    }
    gbuffer
}
