//! Interleaved visibility sampling
//!
//! Testing every pixel against every VPL each frame is too expensive, so the
//! screen is tiled with an `S × S` pattern and the VPL population is split
//! into `S² × H` blocks. Each pixel tests one block per frame; the block
//! rotates with the frame counter so that after `S² × H` frames every pixel
//! has tested every VPL once. Results accumulate in a persistent
//! [`VisibilityMask`] that the reconstruction reads in full.
//!
//! When there are at least as many VPLs as blocks the dispatch is a 3-D grid
//! of `width × height × k` threads. With fewer VPLs than blocks most pixels
//! have nothing to test, so a 2-D grid shrunk by `√ratio` is used instead and
//! each thread picks up the next firing pixel.

use std::ops::Range;

use crate::core::InterleaveConfig;
use crate::foundation::math::{Vec3, Vec4};
use crate::render::backend::{BufferKind, QueryBuffer, RayTracingBackend};
use crate::render::gi::vpl::GpuVpl;
use crate::render::image::{GBuffer, Image};
use crate::render::ray::{Occlusion, Ray, RayTag};
use crate::render::resources::{Owner, ResourceKind, ResourceTable};
use crate::render::RenderResult;

/// Which VPLs each pixel tests in a given frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterleavePattern {
    tile_size: u32,
    history_size: usize,
    vpl_count: usize,
    per_block: usize,
}

impl InterleavePattern {
    /// Pattern for `vpl_count` VPLs
    pub fn new(config: &InterleaveConfig, vpl_count: usize) -> Self {
        let blocks = config.cycle_length().max(1);
        Self {
            tile_size: config.tile_size.max(1),
            history_size: config.history_size.max(1),
            vpl_count,
            per_block: ((vpl_count + blocks - 1) / blocks).max(1),
        }
    }

    /// Frames until the pattern repeats (S² × H)
    pub fn cycle_length(&self) -> usize {
        let tile = self.tile_size as usize;
        tile * tile * self.history_size
    }

    /// VPLs per block, `ceil(ratio)` but at least one
    pub fn per_block(&self) -> usize {
        self.per_block
    }

    /// VPLs per pixel per frame, `N / (S² × H)`
    pub fn ratio(&self) -> f32 {
        self.vpl_count as f32 / self.cycle_length() as f32
    }

    /// Phase of `frame` within the cycle
    pub fn phase(&self, frame: u64) -> usize {
        (frame % self.cycle_length() as u64) as usize
    }

    /// Position of a pixel inside its tile, `(y mod S) * S + (x mod S)`
    pub fn tile_cell(&self, x: u32, y: u32) -> usize {
        ((y % self.tile_size) * self.tile_size + x % self.tile_size) as usize
    }

    /// Block of VPLs a pixel tests at `phase`
    pub fn block(&self, x: u32, y: u32, phase: usize) -> usize {
        self.cell_block(self.tile_cell(x, y), phase)
    }

    /// Block tested by every pixel in tile cell `cell` at `phase`
    pub fn cell_block(&self, cell: usize, phase: usize) -> usize {
        (cell * self.history_size + phase) % self.cycle_length()
    }

    /// VPL indices tested by block `block`, empty when it starts past N
    pub fn block_vpls(&self, block: usize) -> Range<usize> {
        let start = block * self.per_block;
        let end = (start + self.per_block).min(self.vpl_count);
        start.min(end)..end
    }

    /// VPL indices a pixel tests at `phase`
    pub fn vpls_for_pixel(&self, x: u32, y: u32, phase: usize) -> Range<usize> {
        self.block_vpls(self.block(x, y, phase))
    }
}

/// Thread layout of the visibility dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPlan {
    /// One thread per pixel and tested VPL
    Layered {
        /// Grid width, the image width
        width: u32,
        /// Grid height, the image height
        height: u32,
        /// VPLs per pixel, `ceil(ratio)`
        layers: usize,
    },
    /// One thread per firing pixel
    Shrunk {
        /// Grid width, `ceil(width × √ratio)`
        width: u32,
        /// Grid height, `ceil(height × √ratio)`
        height: u32,
    },
}

impl DispatchPlan {
    /// Choose the layout for an image of `width × height`
    pub fn new(pattern: &InterleavePattern, width: u32, height: u32) -> Self {
        let ratio = pattern.ratio();
        if ratio >= 1.0 {
            Self::Layered { width, height, layers: pattern.per_block() }
        } else {
            let scale = ratio.sqrt();
            Self::Shrunk {
                width: (width as f32 * scale).ceil() as u32,
                height: (height as f32 * scale).ceil() as u32,
            }
        }
    }

    /// Grid dimensions; the depth is 1 for a shrunk plan
    pub fn grid(&self) -> [usize; 3] {
        match *self {
            Self::Layered { width, height, layers } => [width as usize, height as usize, layers],
            Self::Shrunk { width, height } => [width as usize, height as usize, 1],
        }
    }

    /// Threads launched by the grid
    pub fn thread_count(&self) -> usize {
        self.grid().iter().product()
    }
}

/// Persistent per-VPL visibility, one byte per pixel and VPL
#[derive(Debug, Clone)]
pub struct VisibilityMask {
    pixels: usize,
    layers: usize,
    data: Vec<u8>,
}

impl VisibilityMask {
    /// Mask with every pair marked occluded
    pub fn new(pixels: usize, layers: usize) -> Self {
        Self { pixels, layers, data: vec![0; pixels * layers] }
    }

    /// Number of layers (one per VPL)
    pub fn layers(&self) -> usize {
        self.layers
    }

    /// Whether `pixel` last saw VPL `slot`
    pub fn is_visible(&self, slot: usize, pixel: usize) -> bool {
        self.data.get(slot * self.pixels + pixel).map_or(false, |&value| value != 0)
    }

    /// Record the visibility of `slot` from `pixel`
    pub fn set(&mut self, slot: usize, pixel: usize, visible: bool) {
        if let Some(value) = self.data.get_mut(slot * self.pixels + pixel) {
            *value = u8::from(visible);
        }
    }

    /// Forget everything recorded for `slot`
    pub fn clear_layer(&mut self, slot: usize) {
        if slot < self.layers {
            self.data[slot * self.pixels..(slot + 1) * self.pixels].fill(0);
        }
    }

    /// Number of visible pairs in `slot`'s layer
    pub fn visible_in_layer(&self, slot: usize) -> usize {
        if slot >= self.layers {
            return 0;
        }
        self.data[slot * self.pixels..(slot + 1) * self.pixels]
            .iter()
            .filter(|&&value| value != 0)
            .count()
    }
}

/// Counters of one dispatch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Pattern phase used
    pub phase: usize,
    /// Threads launched
    pub threads: usize,
    /// Rays that were actually traced
    pub active_rays: usize,
    /// Active rays that reached their VPL
    pub visible: usize,
}

/// Issues the sparse visibility rays and maintains the mask
#[derive(Debug)]
pub struct InterleavedDispatcher {
    pattern: InterleavePattern,
    plan: DispatchPlan,
    width: u32,
    height: u32,
    bias: f32,
    rays: Vec<Ray>,
    buffer: QueryBuffer,
}

impl InterleavedDispatcher {
    /// Plan the dispatch and allocate its occlusion buffer
    pub fn new(
        backend: &mut dyn RayTracingBackend,
        config: &InterleaveConfig,
        vpl_count: usize,
        width: u32,
        height: u32,
        bias: f32,
    ) -> RenderResult<Self> {
        let pattern = InterleavePattern::new(config, vpl_count);
        let plan = DispatchPlan::new(&pattern, width, height);
        let capacity = plan.thread_count().max(max_firing_pixels(&pattern, width, height));
        log::info!(
            "Interleaved sampling: ratio {:.3}, plan {:?}, {} rays per frame at most",
            pattern.ratio(),
            plan,
            capacity
        );

        Ok(Self {
            pattern,
            plan,
            width,
            height,
            bias,
            rays: Vec::with_capacity(capacity),
            buffer: QueryBuffer::create(backend, BufferKind::Occlusion, capacity)?,
        })
    }

    /// Sampling pattern
    pub fn pattern(&self) -> &InterleavePattern {
        &self.pattern
    }

    /// Thread layout
    pub fn plan(&self) -> DispatchPlan {
        self.plan
    }

    /// Rays emitted by the last [`InterleavedDispatcher::pre`]
    pub fn rays(&self) -> &[Ray] {
        &self.rays
    }

    /// Pre kernel: one ray per thread from its pixel toward its VPL
    ///
    /// Threads whose pixel is background, whose VPL index is past N or whose
    /// VPL is invalid emit an inactive ray.
    pub fn pre(&mut self, positions: &Image<Vec4>, vpls: &[GpuVpl], phase: usize) -> &[Ray] {
        self.rays.clear();
        match self.plan {
            DispatchPlan::Layered { layers, .. } => {
                for layer in 0..layers {
                    for y in 0..self.height {
                        for x in 0..self.width {
                            let slot = self.pattern.block(x, y, phase) * self.pattern.per_block() + layer;
                            let ray = self.visibility_ray(positions, vpls, x, y, slot);
                            self.rays.push(ray);
                        }
                    }
                }
            }
            DispatchPlan::Shrunk { .. } => {
                let firing = firing_pixels(&self.pattern, self.width, self.height, phase);
                let threads = self.plan.thread_count().max(firing.len());
                for thread in 0..threads {
                    let ray = match firing.get(thread) {
                        Some(&(x, y)) => {
                            let slot = self.pattern.block(x, y, phase);
                            self.visibility_ray(positions, vpls, x, y, slot)
                        }
                        None => Ray::inactive(),
                    };
                    self.rays.push(ray);
                }
            }
        }
        &self.rays
    }

    /// Post kernel: write the traced results into the mask
    ///
    /// Layers of slots regenerated this frame are cleared first since their
    /// old visibility belongs to a different VPL.
    pub fn post(&self, flags: &[Occlusion], regenerated: &[usize], mask: &mut VisibilityMask) -> (usize, usize) {
        for &slot in regenerated {
            mask.clear_layer(slot);
        }

        let mut active = 0;
        let mut visible = 0;
        for (ray, flag) in self.rays.iter().zip(flags) {
            if !ray.is_active() {
                continue;
            }
            if let RayTag::Visibility { pixel, slot } = ray.tag {
                let seen = !flag.is_occluded();
                mask.set(slot as usize, pixel as usize, seen);
                active += 1;
                visible += usize::from(seen);
            }
        }
        (active, visible)
    }

    /// Run pre, trace and post for one frame
    ///
    /// Positions and the mask are held by compute for the duration and are
    /// handed back even when the trace fails.
    pub fn dispatch(
        &mut self,
        gbuffer: &GBuffer,
        vpls: &[GpuVpl],
        phase: usize,
        regenerated: &[usize],
        mask: &mut VisibilityMask,
        resources: &mut ResourceTable,
        backend: &mut dyn RayTracingBackend,
    ) -> RenderResult<DispatchReport> {
        const SHARED: [ResourceKind; 2] = [ResourceKind::Positions, ResourceKind::VisibilityMask];
        let (active_rays, visible) = resources.with_acquired(&SHARED, |held| {
            self.pre(&gbuffer.positions, vpls, phase);
            let flags = self.buffer.occlusion(backend, &self.rays)?;
            held.require(ResourceKind::VisibilityMask, Owner::Compute)?;
            Ok(self.post(&flags, regenerated, mask))
        })?;

        Ok(DispatchReport { phase, threads: self.rays.len(), active_rays, visible })
    }

    /// Return the occlusion buffer to the backend
    pub fn release(self, backend: &mut dyn RayTracingBackend) {
        self.buffer.release(backend);
    }

    fn visibility_ray(
        &self,
        positions: &Image<Vec4>,
        vpls: &[GpuVpl],
        x: u32,
        y: u32,
        slot: usize,
    ) -> Ray {
        let position = positions.get(x, y);
        match vpls.get(slot) {
            Some(vpl) if vpl.is_valid() && position.w > 0.0 => Ray::between(
                position.xyz(),
                vpl.position(),
                self.bias,
                RayTag::Visibility { pixel: positions.index(x, y) as u32, slot: slot as u32 },
            ),
            _ => Ray::inactive(),
        }
    }
}

/// Pixels whose block is below N at `phase`, tile by tile
fn firing_pixels(pattern: &InterleavePattern, width: u32, height: u32, phase: usize) -> Vec<(u32, u32)> {
    let tile = pattern.tile_size;
    let mut pixels = Vec::new();
    for tile_y in (0..height).step_by(tile as usize) {
        for tile_x in (0..width).step_by(tile as usize) {
            for y in tile_y..(tile_y + tile).min(height) {
                for x in tile_x..(tile_x + tile).min(width) {
                    if !pattern.vpls_for_pixel(x, y, phase).is_empty() {
                        pixels.push((x, y));
                    }
                }
            }
        }
    }
    pixels
}

/// Largest number of firing pixels over a whole cycle
fn max_firing_pixels(pattern: &InterleavePattern, width: u32, height: u32) -> usize {
    let tile = pattern.tile_size as usize;
    let mut cell_counts = vec![0usize; tile * tile];
    for y in 0..height {
        for x in 0..width {
            cell_counts[pattern.tile_cell(x, y)] += 1;
        }
    }

    (0..pattern.cycle_length())
        .map(|phase| {
            cell_counts
                .iter()
                .enumerate()
                .filter(|&(cell, _)| !pattern.block_vpls(pattern.cell_block(cell, phase)).is_empty())
                .map(|(_, &count)| count)
                .sum::<usize>()
        })
        .max()
        .unwrap_or(0)
}

/// Sum the contribution of every visible, valid VPL at every covered pixel
///
/// Each VPL adds `diffuse · max(n_p·l, 0) · max(n_v·(−l), 0) / (1 + d²)`
/// where `l` points from the pixel to the VPL and `d` is their distance.
pub fn reconstruct(gbuffer: &GBuffer, vpls: &[GpuVpl], mask: &VisibilityMask, output: &mut Image<Vec3>) {
    for (pixel, value) in output.pixels_mut().iter_mut().enumerate() {
        *value = Vec3::zeros();
        let Some(position) = gbuffer.position(pixel) else { continue };
        let normal = gbuffer.normals.pixels()[pixel];

        for (slot, vpl) in vpls.iter().enumerate() {
            if !vpl.is_valid() || !mask.is_visible(slot, pixel) {
                continue;
            }
            let to_vpl = vpl.position() - position;
            let distance = to_vpl.norm();
            if distance <= f32::EPSILON {
                continue;
            }
            let l = to_vpl / distance;
            let receive = normal.dot(&l).max(0.0);
            let emit = vpl.normal().dot(&-l).max(0.0);
            *value += vpl.diffuse() * (receive * emit / (1.0 + distance * distance));
        }
    }
}
