//! Ray-tracing backend abstraction
//!
//! The indirect-lighting pipeline never traces rays itself. It fills ray
//! batches, hands them to a [`RayTracingBackend`] and then blocks on the
//! result buffer. Backends own their result buffers; callers create them once
//! at startup and reuse them every frame.
//!
//! Mapping a result buffer is a hard synchronous wait on the completion
//! event that the query returned. There is no timeout: a stalled backend
//! stalls the frame.

use std::fmt;

use crate::render::ray::{Intersection, Occlusion, Ray};
use crate::render::{RenderError, RenderResult};

/// Result type for backend operations
pub type BackendResult<T> = RenderResult<T>;

/// Handle to a result buffer owned by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

/// Layout of records stored in a result buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// One [`Intersection`] per ray
    Intersections,
    /// One [`Occlusion`] flag per ray
    Occlusion,
}

/// Completion signal of an in-flight query
pub trait CompletionEvent: fmt::Debug {
    /// Block until the query has finished
    fn wait(&self);

    /// Whether the query has already finished
    fn is_complete(&self) -> bool;
}

/// Event returned by backends that finish work before returning
#[derive(Debug, Clone, Copy, Default)]
pub struct SignaledEvent;

impl CompletionEvent for SignaledEvent {
    fn wait(&self) {}

    fn is_complete(&self) -> bool {
        true
    }
}

/// Ray-tracing engine collaborator
pub trait RayTracingBackend {
    /// Human readable backend name for logs
    fn name(&self) -> &str;

    /// Allocate a result buffer holding `capacity` records
    fn create_buffer(&mut self, kind: BufferKind, capacity: usize) -> BackendResult<BufferId>;

    /// Free a result buffer; unknown ids are ignored
    fn release_buffer(&mut self, buffer: BufferId);

    /// Start a closest-hit query writing into `results`
    fn query_intersection(&mut self, rays: &[Ray], results: BufferId) -> BackendResult<Box<dyn CompletionEvent>>;

    /// Start an any-hit query writing into `results`
    fn query_occlusion(&mut self, rays: &[Ray], results: BufferId) -> BackendResult<Box<dyn CompletionEvent>>;

    /// Wait for `event` and read back the first `count` intersections
    fn map_intersections(
        &mut self,
        buffer: BufferId,
        count: usize,
        event: Box<dyn CompletionEvent>,
    ) -> BackendResult<Vec<Intersection>>;

    /// Wait for `event` and read back the first `count` occlusion flags
    fn map_occlusion(
        &mut self,
        buffer: BufferId,
        count: usize,
        event: Box<dyn CompletionEvent>,
    ) -> BackendResult<Vec<Occlusion>>;
}

/// A result buffer together with the capacity it was created with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryBuffer {
    id: BufferId,
    kind: BufferKind,
    capacity: usize,
}

impl QueryBuffer {
    /// Allocate a buffer on `backend`
    pub fn create(backend: &mut dyn RayTracingBackend, kind: BufferKind, capacity: usize) -> BackendResult<Self> {
        let id = backend.create_buffer(kind, capacity)?;
        log::debug!("{}: created {:?} buffer {:?} for {} records", backend.name(), kind, id, capacity);
        Ok(Self { id, kind, capacity })
    }

    /// Backend handle
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Number of records the buffer holds
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Run one occlusion batch and block until the flags are mapped
    pub fn occlusion(&self, backend: &mut dyn RayTracingBackend, rays: &[Ray]) -> BackendResult<Vec<Occlusion>> {
        self.check(BufferKind::Occlusion, rays.len())?;
        if rays.is_empty() {
            return Ok(Vec::new());
        }
        let event = backend.query_occlusion(rays, self.id)?;
        let flags = backend.map_occlusion(self.id, rays.len(), event)?;
        log::trace!("{}: occlusion batch of {} rays", backend.name(), rays.len());
        Ok(flags)
    }

    /// Run one intersection batch and block until the hits are mapped
    pub fn intersection(&self, backend: &mut dyn RayTracingBackend, rays: &[Ray]) -> BackendResult<Vec<Intersection>> {
        self.check(BufferKind::Intersections, rays.len())?;
        if rays.is_empty() {
            return Ok(Vec::new());
        }
        let event = backend.query_intersection(rays, self.id)?;
        let hits = backend.map_intersections(self.id, rays.len(), event)?;
        log::trace!("{}: intersection batch of {} rays", backend.name(), rays.len());
        Ok(hits)
    }

    /// Return the buffer to the backend
    pub fn release(self, backend: &mut dyn RayTracingBackend) {
        backend.release_buffer(self.id);
    }

    fn check(&self, kind: BufferKind, count: usize) -> BackendResult<()> {
        if self.kind != kind {
            return Err(RenderError::Backend(format!(
                "buffer {:?} holds {:?} records, not {:?}",
                self.id, self.kind, kind
            )));
        }
        if count > self.capacity {
            return Err(RenderError::Backend(format!(
                "batch of {} rays exceeds buffer {:?} capacity {}",
                count, self.id, self.capacity
            )));
        }
        Ok(())
    }
}
