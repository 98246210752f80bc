//! # Radiosity Engine
//!
//! Instant-radiosity global illumination that keeps a persistent population
//! of virtual point lights (VPLs) alive across frames instead of rebuilding
//! it every frame.
//!
//! ## Features
//!
//! - **Budgeted VPL maintenance**: Invalid VPLs are re-seeded under a fixed
//!   per-frame ray budget
//! - **Revalidation**: Every VPL is re-tested against its parent each frame
//! - **Interleaved sampling**: Each pixel tests a rotating block of VPLs
//! - **Temporal accumulation**: Filtered frames are reprojected and averaged
//! - **Pluggable ray tracing**: Any [`RayTracingBackend`](render::RayTracingBackend)
//!   can answer the ray batches; a CPU reference backend is included
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use radiosity_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RadiosityConfig::default();
//!     let scene = Arc::new(Scene::cornell_box(1.0));
//!     let backend = CpuBackend::new(Arc::clone(&scene));
//!     let mut renderer = IndirectRenderer::new(config.clone(), backend)?;
//!
//!     let (width, height) = (config.viewport.width, config.viewport.height);
//!     let gbuffer = GBuffer::new(width, height);
//!     let direct = Image::new(width, height, Vec3::zeros());
//!     let camera = Camera::default();
//!     let frame = renderer.render_frame(&gbuffer, &direct, &camera, scene.as_ref())?;
//!     println!("{} VPLs valid", frame.stats.valid);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Configuration loading and the renderer's settings
pub mod config;
pub mod core;

pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        core::{LightDescriptor, LightShape, RadiosityConfig},
        foundation::math::{Mat4, Vec3, Vec4},
        render::{
            Camera, CpuBackend, FrameOutput, FrameStats, GBuffer, Image, IndirectRenderer, Light,
            MaterialSampler, RayTracingBackend, RenderError, RenderResult,
        },
        scene::{Scene, SceneError},
    };
}
