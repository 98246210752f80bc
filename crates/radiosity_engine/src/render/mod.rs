//! # Rendering System
//!
//! Indirect-lighting core of the engine. The raster side (G-buffer, shadow
//! maps, direct lighting) is owned by the application; this module consumes
//! its images, keeps the virtual point light population alive and produces
//! the indirect term.
//!
//! ## Architecture
//!
//! - **Backend**: [`RayTracingBackend`] seam for the external ray-tracing engine
//! - **Camera**: Perspective camera used for reprojection
//! - **Lighting**: Primary lights that seed the VPL population
//! - **Images**: Plain CPU images and the [`GBuffer`] contract
//! - **Resources**: Raster/compute ownership transfer of shared images
//! - **GI**: Revalidation, generation, interleaved dispatch and history

pub mod backend;
pub mod backends;
pub mod camera;
pub mod gi;
pub mod image;
pub mod lighting;
pub mod material;
pub mod ray;
pub mod resources;

pub use backend::{BufferId, BufferKind, CompletionEvent, QueryBuffer, RayTracingBackend, SignaledEvent};
pub use backends::cpu::{CpuBackend, CpuBackendStats};
pub use camera::Camera;
pub use gi::{FrameOutput, FrameStats, IndirectRenderer};
pub use image::{GBuffer, Image};
pub use lighting::{Light, LightKind, ShadowMapHandle};
pub use material::MaterialSampler;
pub use ray::{Intersection, Occlusion, ParentRef, Ray, RayTag};
pub use resources::{Owner, ResourceKind, ResourceTable};

use thiserror::Error;

/// Errors that can occur while rendering
#[derive(Error, Debug)]
pub enum RenderError {
    /// Renderer initialization failed during setup
    ///
    /// Raised before the first frame, for example when the backend refuses
    /// to allocate result buffers or the light list is empty.
    #[error("Renderer initialization failed: {0}")]
    InitializationFailed(String),

    /// Backend-specific error occurred
    ///
    /// Wraps failures reported by the ray-tracing engine.
    #[error("Backend error: {0}")]
    Backend(String),

    /// A shared resource was used by the wrong side of the pipeline
    #[error("Resource {kind:?} is owned by {owner:?}, expected {expected:?}")]
    ResourceOwnership {
        /// Resource being transferred
        kind: ResourceKind,
        /// Current owner
        owner: Owner,
        /// Owner the caller assumed
        expected: Owner,
    },

    /// A shared resource was never registered
    #[error("Resource {0:?} is not registered")]
    MissingResource(ResourceKind),

    /// An input image does not match the configured viewport
    #[error("{what} is {actual_width}x{actual_height}, expected {width}x{height}")]
    DimensionMismatch {
        /// Name of the offending image
        what: &'static str,
        /// Expected width
        width: u32,
        /// Expected height
        height: u32,
        /// Actual width
        actual_width: u32,
        /// Actual height
        actual_height: u32,
    },
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;
