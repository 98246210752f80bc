//! Brute-force CPU implementation of [`RayTracingBackend`]
//!
//! Every query is answered before it returns, so the completion events are
//! already signalled and mapping never actually waits. Useful as a reference
//! for GPU backends and for tests.

use std::collections::HashMap;
use std::sync::Arc;

use crate::render::backend::{BackendResult, BufferId, BufferKind, CompletionEvent, RayTracingBackend, SignaledEvent};
use crate::render::ray::{Intersection, Occlusion, Ray};
use crate::render::RenderError;
use crate::scene::Scene;

/// Counters collected across all queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuBackendStats {
    /// Closest-hit batches submitted
    pub intersection_queries: u64,
    /// Any-hit batches submitted
    pub occlusion_queries: u64,
    /// Rays that were actually traced
    pub active_rays: u64,
    /// Padding rays skipped without traversal
    pub inactive_rays: u64,
}

#[derive(Debug)]
enum Records {
    Intersections(Vec<Intersection>),
    Occlusion(Vec<Occlusion>),
}

#[derive(Debug)]
struct StoredBuffer {
    capacity: usize,
    records: Records,
}

/// Backend tracing rays against a shared [`Scene`]
#[derive(Debug)]
pub struct CpuBackend {
    scene: Arc<Scene>,
    buffers: HashMap<BufferId, StoredBuffer>,
    next_id: u64,
    stats: CpuBackendStats,
}

impl CpuBackend {
    /// Create a backend over `scene`
    pub fn new(scene: Arc<Scene>) -> Self {
        log::info!("CPU ray-tracing backend over {} triangles", scene.triangle_count());
        Self {
            scene,
            buffers: HashMap::new(),
            next_id: 1,
            stats: CpuBackendStats::default(),
        }
    }

    /// Scene being traced
    pub fn scene(&self) -> &Arc<Scene> {
        &self.scene
    }

    /// Query counters so far
    pub fn stats(&self) -> CpuBackendStats {
        self.stats
    }

    /// Number of buffers not yet released
    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    fn buffer_mut(&mut self, id: BufferId, count: usize) -> BackendResult<&mut StoredBuffer> {
        let buffer = self
            .buffers
            .get_mut(&id)
            .ok_or_else(|| RenderError::Backend(format!("unknown buffer {id:?}")))?;
        if count > buffer.capacity {
            return Err(RenderError::Backend(format!(
                "{} records do not fit buffer {:?} of capacity {}",
                count, id, buffer.capacity
            )));
        }
        Ok(buffer)
    }

    fn count_rays(&mut self, rays: &[Ray]) {
        let active = rays.iter().filter(|ray| ray.is_active()).count() as u64;
        self.stats.active_rays += active;
        self.stats.inactive_rays += rays.len() as u64 - active;
    }
}

fn kind_mismatch(id: BufferId, expected: BufferKind) -> RenderError {
    RenderError::Backend(format!("buffer {id:?} does not hold {expected:?} records"))
}

impl RayTracingBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn create_buffer(&mut self, kind: BufferKind, capacity: usize) -> BackendResult<BufferId> {
        let id = BufferId(self.next_id);
        self.next_id += 1;
        let records = match kind {
            BufferKind::Intersections => Records::Intersections(vec![Intersection::MISS; capacity]),
            BufferKind::Occlusion => Records::Occlusion(vec![Occlusion::Clear; capacity]),
        };
        self.buffers.insert(id, StoredBuffer { capacity, records });
        Ok(id)
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        if self.buffers.remove(&buffer).is_some() {
            log::debug!("cpu: released buffer {:?}", buffer);
        }
    }

    fn query_intersection(&mut self, rays: &[Ray], results: BufferId) -> BackendResult<Box<dyn CompletionEvent>> {
        self.count_rays(rays);
        self.stats.intersection_queries += 1;
        let scene = Arc::clone(&self.scene);
        let buffer = self.buffer_mut(results, rays.len())?;
        let Records::Intersections(records) = &mut buffer.records else {
            return Err(kind_mismatch(results, BufferKind::Intersections));
        };
        for (record, ray) in records.iter_mut().zip(rays) {
            *record = scene.intersect(ray);
        }
        Ok(Box::new(SignaledEvent))
    }

    fn query_occlusion(&mut self, rays: &[Ray], results: BufferId) -> BackendResult<Box<dyn CompletionEvent>> {
        self.count_rays(rays);
        self.stats.occlusion_queries += 1;
        let scene = Arc::clone(&self.scene);
        let buffer = self.buffer_mut(results, rays.len())?;
        let Records::Occlusion(records) = &mut buffer.records else {
            return Err(kind_mismatch(results, BufferKind::Occlusion));
        };
        for (record, ray) in records.iter_mut().zip(rays) {
            *record = if scene.occluded(ray) { Occlusion::Occluded } else { Occlusion::Clear };
        }
        Ok(Box::new(SignaledEvent))
    }

    fn map_intersections(
        &mut self,
        buffer: BufferId,
        count: usize,
        event: Box<dyn CompletionEvent>,
    ) -> BackendResult<Vec<Intersection>> {
        event.wait();
        match &self.buffer_mut(buffer, count)?.records {
            Records::Intersections(records) => Ok(records[..count].to_vec()),
            Records::Occlusion(_) => Err(kind_mismatch(buffer, BufferKind::Intersections)),
        }
    }

    fn map_occlusion(
        &mut self,
        buffer: BufferId,
        count: usize,
        event: Box<dyn CompletionEvent>,
    ) -> BackendResult<Vec<Occlusion>> {
        event.wait();
        match &self.buffer_mut(buffer, count)?.records {
            Records::Occlusion(records) => Ok(records[..count].to_vec()),
            Records::Intersections(_) => Err(kind_mismatch(buffer, BufferKind::Occlusion)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::render::backend::QueryBuffer;
    use crate::render::ray::RayTag;

    fn backend() -> CpuBackend {
        CpuBackend::new(Arc::new(Scene::cornell_box(1.0)))
    }

    fn tag() -> RayTag {
        RayTag::Visibility { pixel: 0, slot: 0 }
    }

    #[test]
    fn test_occlusion_batch() {
        let mut backend = backend();
        let buffer = QueryBuffer::create(&mut backend, BufferKind::Occlusion, 4).unwrap();
        let rays = [
            Ray::between(Vec3::new(0.5, 1.0, 0.2), Vec3::new(0.5, 1.9, 0.2), 0.1, tag()),
            Ray::between(Vec3::new(0.5, 1.0, 0.2), Vec3::new(0.5, 2.5, 0.2), 0.1, tag()),
            Ray::inactive(),
        ];
        let flags = buffer.occlusion(&mut backend, &rays).unwrap();
        assert_eq!(flags, vec![Occlusion::Clear, Occlusion::Occluded, Occlusion::Clear]);

        let stats = backend.stats();
        assert_eq!(stats.occlusion_queries, 1);
        assert_eq!(stats.active_rays, 2);
        assert_eq!(stats.inactive_rays, 1);
    }

    #[test]
    fn test_intersection_batch_reports_closest_hit() {
        let mut backend = backend();
        let buffer = QueryBuffer::create(&mut backend, BufferKind::Intersections, 2).unwrap();
        let rays = [
            Ray::new(Vec3::new(0.5, 1.0, 0.2), -Vec3::y(), 100.0, tag()),
            Ray::new(Vec3::new(0.5, 1.0, 0.2), Vec3::z(), 100.0, tag()),
        ];
        let hits = buffer.intersection(&mut backend, &rays).unwrap();
        assert_eq!(hits[0].shape_id, 0);
        assert!(!hits[1].is_hit());
    }

    #[test]
    fn test_buffer_misuse_is_an_error() {
        let mut backend = backend();
        let buffer = QueryBuffer::create(&mut backend, BufferKind::Occlusion, 1).unwrap();
        let rays = [Ray::inactive(), Ray::inactive()];
        assert!(buffer.occlusion(&mut backend, &rays).is_err());
        assert!(buffer.intersection(&mut backend, &rays[..1]).is_err());
        assert!(backend.query_intersection(&rays[..1], buffer.id()).is_err());

        buffer.release(&mut backend);
        assert_eq!(backend.live_buffers(), 0);
        assert!(backend.query_occlusion(&rays[..1], BufferId(99)).is_err());
    }
}
