//! Temporal reuse of filtered indirect images
//!
//! The ring keeps the last `H` filtered frames together with the positions
//! and view matrix they were rendered with. Composing reprojects the current
//! surface into every stored frame and averages the samples that still land
//! on the same surface.

use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::render::camera::Camera;
use crate::render::image::{GBuffer, Image};

/// One stored frame
#[derive(Debug, Clone)]
pub struct HistoryFrame {
    /// Filtered indirect image
    pub indirect: Image<Vec3>,
    /// G-buffer positions at capture time
    pub positions: Image<Vec4>,
    /// View matrix at capture time
    pub view: Mat4,
    filled: bool,
}

impl HistoryFrame {
    fn empty(width: u32, height: u32) -> Self {
        Self {
            indirect: Image::new(width, height, Vec3::zeros()),
            positions: Image::new(width, height, Vec4::zeros()),
            view: Mat4::identity(),
            filled: false,
        }
    }

    /// Whether the slot has been written since the renderer started
    pub fn is_filled(&self) -> bool {
        self.filled
    }
}

/// Ring of the last `H` frames
#[derive(Debug, Clone)]
pub struct HistoryRing {
    frames: Vec<HistoryFrame>,
    current: usize,
    tolerance: f32,
}

impl HistoryRing {
    /// Ring of `size` empty frames of `width × height`
    pub fn new(size: usize, width: u32, height: u32, tolerance: f32) -> Self {
        Self {
            frames: (0..size.max(1)).map(|_| HistoryFrame::empty(width, height)).collect(),
            current: 0,
            tolerance,
        }
    }

    /// Number of slots (H)
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the ring has no slots
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Slot the next [`HistoryRing::push`] writes
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Slot written by the last push
    pub fn latest_index(&self) -> usize {
        (self.current + self.frames.len() - 1) % self.frames.len()
    }

    /// Stored frame `slot`
    pub fn frame(&self, slot: usize) -> Option<&HistoryFrame> {
        self.frames.get(slot)
    }

    /// View matrix stored in `slot`, if it has been written
    pub fn view(&self, slot: usize) -> Option<Mat4> {
        self.frames.get(slot).filter(|frame| frame.filled).map(|frame| frame.view)
    }

    /// Number of written slots
    pub fn filled_count(&self) -> usize {
        self.frames.iter().filter(|frame| frame.filled).count()
    }

    /// Store a frame in the current slot and advance by one
    pub fn push(&mut self, indirect: &Image<Vec3>, positions: &Image<Vec4>, view: Mat4) {
        let frame = &mut self.frames[self.current];
        frame.indirect.clone_from(indirect);
        frame.positions.clone_from(positions);
        frame.view = view;
        frame.filled = true;
        self.current = (self.current + 1) % self.frames.len();
    }

    /// Average the latest frame with every older frame that agrees with it
    ///
    /// Every pixel is projected into each older slot with that slot's view
    /// and the camera's projection. The slot's sample is accepted when the
    /// position it stored there lies within the reprojection tolerance of
    /// the current position. The latest frame always contributes.
    pub fn compose(&self, camera: &Camera, gbuffer: &GBuffer, output: &mut Image<Vec3>) {
        let latest = self.latest_index();
        let (width, height) = (output.width(), output.height());
        let current = &self.frames[latest];

        for y in 0..height {
            for x in 0..width {
                let index = output.index(x, y);
                let Some(position) = gbuffer.position(index) else {
                    *output.get_mut(x, y) = Vec3::zeros();
                    continue;
                };

                let mut sum = current.indirect.pixels()[index];
                let mut count = 1u32;
                for (slot, frame) in self.frames.iter().enumerate() {
                    if slot == latest || !frame.filled {
                        continue;
                    }
                    let Some((px, py)) = camera.project_to_pixel(&frame.view, &position, width, height) else {
                        continue;
                    };
                    let stored = frame.positions.get(px, py);
                    if stored.w > 0.0 && (stored.xyz() - position).norm() <= self.tolerance {
                        sum += frame.indirect.get(px, py);
                        count += 1;
                    }
                }
                *output.get_mut(x, y) = sum / count as f32;
            }
        }
    }
}

/// Final colour: `direct + albedo ⊙ indirect`
pub fn composite(direct: &Image<Vec3>, albedo: &Image<Vec3>, indirect: &Image<Vec3>, output: &mut Image<Vec3>) {
    for (((out, d), a), i) in output
        .pixels_mut()
        .iter_mut()
        .zip(direct.pixels())
        .zip(albedo.pixels())
        .zip(indirect.pixels())
    {
        *out = d + a.component_mul(i);
    }
}
