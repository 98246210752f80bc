//! Per-frame driver of the indirect-lighting pipeline

use crate::core::RadiosityConfig;
use crate::foundation::math::Vec3;
use crate::render::backend::RayTracingBackend;
use crate::render::camera::Camera;
use crate::render::gi::filter::DiscontinuityFilter;
use crate::render::gi::generation::{GenerationEngine, GenerationReport};
use crate::render::gi::history::{composite, HistoryRing};
use crate::render::gi::interleave::{reconstruct, DispatchReport, InterleavedDispatcher, VisibilityMask};
use crate::render::gi::revalidation::{RevalidationEngine, RevalidationReport};
use crate::render::gi::vpl::VplTable;
use crate::render::image::{GBuffer, Image};
use crate::render::lighting::Light;
use crate::render::material::MaterialSampler;
use crate::render::resources::{Owner, ResourceKind, ResourceTable};
use crate::render::{RenderError, RenderResult};

/// Everything one frame did, for logging and tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frame number, starting at zero
    pub frame: u64,
    /// Interleave phase used by the dispatch
    pub phase: usize,
    /// History slot the frame was written to
    pub history_slot: usize,
    /// Revalidation counters
    pub revalidation: RevalidationReport,
    /// Generation counters and regenerated slots
    pub generation: GenerationReport,
    /// Visibility dispatch counters
    pub dispatch: DispatchReport,
    /// Valid slots at the end of the frame
    pub valid: usize,
    /// Invalid slots at the end of the frame
    pub invalid: usize,
}

/// Images handed back to the compositor
#[derive(Debug, Clone)]
pub struct FrameOutput {
    /// Temporally accumulated indirect term
    pub indirect: Image<Vec3>,
    /// `direct + albedo ⊙ indirect`
    pub composite: Image<Vec3>,
    /// Frame counters
    pub stats: FrameStats,
}

/// Keeps the VPL population alive and turns G-buffers into indirect light
///
/// Owns the backend for its whole life so result buffers can be created once
/// and released in [`IndirectRenderer::shutdown`].
#[derive(Debug)]
pub struct IndirectRenderer<B: RayTracingBackend> {
    config: RadiosityConfig,
    backend: B,
    lights: Vec<Light>,
    table: VplTable,
    revalidation: RevalidationEngine,
    generation: GenerationEngine,
    dispatcher: InterleavedDispatcher,
    mask: VisibilityMask,
    resources: ResourceTable,
    filter: DiscontinuityFilter,
    history: HistoryRing,
    raw: Image<Vec3>,
    frame: u64,
}

impl<B: RayTracingBackend> IndirectRenderer<B> {
    /// Validate `config` and allocate every per-frame buffer
    pub fn new(config: RadiosityConfig, mut backend: B) -> RenderResult<Self> {
        config
            .validate()
            .map_err(|e| RenderError::InitializationFailed(e.to_string()))?;

        let (width, height) = (config.viewport.width, config.viewport.height);
        let count = config.vpl.count;
        let lights: Vec<Light> = config.lights.iter().map(Light::from_descriptor).collect();
        let table = VplTable::new(count, config.vpl.bounce_bands, lights.len())?;

        let revalidation = RevalidationEngine::new(&mut backend, count, config.vpl.ray_bias)?;
        let generation = GenerationEngine::new(&mut backend, &config.vpl)?;
        let dispatcher = InterleavedDispatcher::new(
            &mut backend,
            &config.interleave,
            count,
            width,
            height,
            config.vpl.ray_bias,
        )?;

        log::info!(
            "Indirect renderer on '{}': {}x{}, {} VPLs in {} bands, {} lights, budget {} per frame",
            backend.name(),
            width,
            height,
            count,
            config.vpl.bounce_bands,
            lights.len(),
            config.vpl.max_regenerations_per_frame
        );

        Ok(Self {
            mask: VisibilityMask::new(config.viewport.pixel_count(), count),
            resources: ResourceTable::new(),
            filter: DiscontinuityFilter::new(&config.filter, config.interleave.tile_size, width, height),
            history: HistoryRing::new(
                config.interleave.history_size,
                width,
                height,
                config.filter.reprojection_tolerance,
            ),
            raw: Image::new(width, height, Vec3::zeros()),
            frame: 0,
            config,
            backend,
            lights,
            table,
            revalidation,
            generation,
            dispatcher,
        })
    }

    /// Configuration the renderer was built with
    pub fn config(&self) -> &RadiosityConfig {
        &self.config
    }

    /// Primary lights
    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Move light `index`; returns false when there is no such light
    ///
    /// VPLs seeded by the old position are caught by the next revalidation.
    pub fn translate_light(&mut self, index: usize, offset: Vec3) -> bool {
        match self.lights.get_mut(index) {
            Some(light) => {
                light.translate(offset);
                true
            }
            None => false,
        }
    }

    /// VPL population
    pub fn table(&self) -> &VplTable {
        &self.table
    }

    /// Ray-tracing backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Ray-tracing backend, mutably
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Stored frames
    pub fn history(&self) -> &HistoryRing {
        &self.history
    }

    /// Persistent visibility results
    pub fn mask(&self) -> &VisibilityMask {
        &self.mask
    }

    /// Raster/compute ownership of the shared images
    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

    /// Frames rendered so far
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Run one frame
    ///
    /// Revalidation, generation, visibility dispatch, reconstruction,
    /// filtering and history composition, in that order.
    pub fn render_frame(
        &mut self,
        gbuffer: &GBuffer,
        direct: &Image<Vec3>,
        camera: &Camera,
        materials: &dyn MaterialSampler,
    ) -> RenderResult<FrameOutput> {
        let (width, height) = (self.config.viewport.width, self.config.viewport.height);
        gbuffer.validate(width, height)?;
        direct.expect_dimensions("direct image", width, height)?;

        self.table.begin_frame();
        let revalidation = self.revalidation.run(&mut self.table, &self.lights, &mut self.backend)?;
        let generation = self
            .generation
            .run(&mut self.table, &self.lights, materials, &mut self.backend)?;

        let vpls = self.table.publish();
        let phase = self.dispatcher.pattern().phase(self.frame);
        let dispatch = self.dispatcher.dispatch(
            gbuffer,
            &vpls,
            phase,
            &generation.regenerated,
            &mut self.mask,
            &mut self.resources,
            &mut self.backend,
        )?;

        const SHADING: [ResourceKind; 4] = [
            ResourceKind::Positions,
            ResourceKind::Normals,
            ResourceKind::VisibilityMask,
            ResourceKind::IndirectImage,
        ];
        let (mask, raw, filter, history) = (&self.mask, &mut self.raw, &mut self.filter, &mut self.history);
        let (history_slot, indirect) = self.resources.with_acquired(&SHADING, |_| {
            reconstruct(gbuffer, &vpls, mask, raw);
            let filtered = filter.apply(raw, gbuffer);

            let slot = history.current_index();
            history.push(filtered, &gbuffer.positions, camera.view_matrix());
            let mut indirect = Image::new(width, height, Vec3::zeros());
            history.compose(camera, gbuffer, &mut indirect);
            Ok((slot, indirect))
        })?;

        self.resources.require(ResourceKind::Albedo, Owner::Raster)?;
        let mut final_image = Image::new(width, height, Vec3::zeros());
        composite(direct, &gbuffer.albedo, &indirect, &mut final_image);

        let stats = FrameStats {
            frame: self.frame,
            phase,
            history_slot,
            revalidation,
            generation,
            dispatch,
            valid: self.table.valid_count(),
            invalid: self.table.invalid_count(),
        };
        log::debug!(
            "Frame {}: phase {}, {} invalidated, {} regenerated, {} visibility rays, {}/{} valid",
            stats.frame,
            stats.phase,
            stats.revalidation.invalidated,
            stats.generation.regenerated.len(),
            stats.dispatch.active_rays,
            stats.valid,
            self.table.len()
        );

        self.frame += 1;
        Ok(FrameOutput { indirect, composite: final_image, stats })
    }

    /// Release every backend buffer and hand the backend back
    pub fn shutdown(self) -> B {
        let Self { mut backend, revalidation, generation, dispatcher, frame, .. } = self;
        revalidation.release(&mut backend);
        generation.release(&mut backend);
        dispatcher.release(&mut backend);
        log::info!("Indirect renderer shut down after {} frames", frame);
        backend
    }
}
