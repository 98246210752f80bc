//! Geometry-aware smoothing of the interleaved image
//!
//! Neighbouring pixels inside one interleaving tile tested different VPL
//! blocks, so the raw reconstruction shows the tile pattern. Two box-filter
//! passes over the `S × S` neighbourhood blend it away, rejecting neighbours
//! across normal or depth discontinuities.

use crate::core::FilterConfig;
use crate::foundation::math::Vec3;
use crate::render::image::{GBuffer, Image};

/// Two buffers that trade places after every pass
#[derive(Debug, Clone)]
pub struct PingPong<T> {
    buffers: [T; 2],
    front: usize,
}

impl<T> PingPong<T> {
    /// Wrap two equally sized buffers; `front` is read first
    pub fn new(front: T, back: T) -> Self {
        Self { buffers: [front, back], front: 0 }
    }

    /// Buffer holding the latest result
    pub fn front(&self) -> &T {
        &self.buffers[self.front]
    }

    /// Buffer the next pass writes into
    pub fn back_mut(&mut self) -> &mut T {
        &mut self.buffers[1 - self.front]
    }

    /// Read the front while writing the back
    pub fn split(&mut self) -> (&T, &mut T) {
        let [a, b] = &mut self.buffers;
        if self.front == 0 {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Make the back buffer the front
    pub fn swap(&mut self) {
        self.front = 1 - self.front;
    }
}

/// Two-pass discontinuity filter
#[derive(Debug, Clone)]
pub struct DiscontinuityFilter {
    tile_size: u32,
    normal_threshold: f32,
    position_threshold: f32,
    buffers: PingPong<Image<Vec3>>,
}

impl DiscontinuityFilter {
    /// Filter for `width × height` images over `tile_size` neighbourhoods
    pub fn new(config: &FilterConfig, tile_size: u32, width: u32, height: u32) -> Self {
        Self {
            tile_size: tile_size.max(1),
            normal_threshold: config.normal_threshold,
            position_threshold: config.position_threshold,
            buffers: PingPong::new(
                Image::new(width, height, Vec3::zeros()),
                Image::new(width, height, Vec3::zeros()),
            ),
        }
    }

    /// Filter `input` twice and return the result
    pub fn apply(&mut self, input: &Image<Vec3>, gbuffer: &GBuffer) -> &Image<Vec3> {
        let settings = PassSettings {
            tile_size: self.tile_size,
            normal_threshold: self.normal_threshold,
            position_threshold: self.position_threshold,
        };

        settings.run(input, gbuffer, self.buffers.back_mut());
        self.buffers.swap();

        let (first, second) = self.buffers.split();
        settings.run(first, gbuffer, second);
        self.buffers.swap();

        self.buffers.front()
    }

    /// Result of the last [`DiscontinuityFilter::apply`]
    pub fn output(&self) -> &Image<Vec3> {
        self.buffers.front()
    }
}

#[derive(Debug, Clone, Copy)]
struct PassSettings {
    tile_size: u32,
    normal_threshold: f32,
    position_threshold: f32,
}

impl PassSettings {
    fn run(&self, source: &Image<Vec3>, gbuffer: &GBuffer, target: &mut Image<Vec3>) {
        let (width, height) = (source.width(), source.height());
        let reach_back = (self.tile_size - 1) / 2;
        let reach_forward = self.tile_size - 1 - reach_back;

        for y in 0..height {
            for x in 0..width {
                let index = source.index(x, y);
                let Some(position) = gbuffer.position(index) else {
                    *target.get_mut(x, y) = Vec3::zeros();
                    continue;
                };
                let normal = gbuffer.normals.pixels()[index];

                let mut sum = Vec3::zeros();
                let mut weight = 0u32;
                for ny in y.saturating_sub(reach_back)..=(y + reach_forward).min(height - 1) {
                    for nx in x.saturating_sub(reach_back)..=(x + reach_forward).min(width - 1) {
                        let neighbour = source.index(nx, ny);
                        let Some(neighbour_position) = gbuffer.position(neighbour) else { continue };
                        let agrees = normal.dot(&gbuffer.normals.pixels()[neighbour]) >= self.normal_threshold
                            && (neighbour_position - position).norm() <= self.position_threshold;
                        if agrees {
                            sum += source.pixels()[neighbour];
                            weight += 1;
                        }
                    }
                }

                // The centre pixel always agrees with itself
                *target.get_mut(x, y) = sum / weight.max(1) as f32;
            }
        }
    }
}
