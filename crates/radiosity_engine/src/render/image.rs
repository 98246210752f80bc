//! CPU-side images exchanged with the raster pass

use crate::foundation::math::{Vec3, Vec4};
use crate::render::{RenderError, RenderResult};

/// Row-major image, pixel (0, 0) at the top-left
#[derive(Debug, Clone, PartialEq)]
pub struct Image<T> {
    width: u32,
    height: u32,
    pixels: Vec<T>,
}

impl<T: Clone> Image<T> {
    /// Image filled with `value`
    pub fn new(width: u32, height: u32, value: T) -> Self {
        Self {
            width,
            height,
            pixels: vec![value; width as usize * height as usize],
        }
    }

    /// Overwrite every pixel with `value`
    pub fn fill(&mut self, value: T) {
        self.pixels.fill(value);
    }
}

impl<T> Image<T> {
    /// Build an image by evaluating `f(x, y)` for every pixel
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> T) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self { width, height, pixels }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    /// Whether the image has no pixels
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Linear index of (`x`, `y`)
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Pixel at (`x`, `y`)
    pub fn get(&self, x: u32, y: u32) -> &T {
        &self.pixels[self.index(x, y)]
    }

    /// Mutable pixel at (`x`, `y`)
    pub fn get_mut(&mut self, x: u32, y: u32) -> &mut T {
        let index = self.index(x, y);
        &mut self.pixels[index]
    }

    /// All pixels in row-major order
    pub fn pixels(&self) -> &[T] {
        &self.pixels
    }

    /// Mutable access to all pixels
    pub fn pixels_mut(&mut self) -> &mut [T] {
        &mut self.pixels
    }

    /// Fail unless the image is `width` × `height`
    pub fn expect_dimensions(&self, what: &'static str, width: u32, height: u32) -> RenderResult<()> {
        if self.width == width && self.height == height {
            Ok(())
        } else {
            Err(RenderError::DimensionMismatch {
                what,
                width,
                height,
                actual_width: self.width,
                actual_height: self.height,
            })
        }
    }
}

/// Geometry buffer produced by the raster pass
///
/// `positions.w` is 1 where geometry covers the pixel and 0 for background.
#[derive(Debug, Clone)]
pub struct GBuffer {
    /// World-space positions, w = coverage
    pub positions: Image<Vec4>,
    /// World-space unit normals
    pub normals: Image<Vec3>,
    /// Diffuse albedo
    pub albedo: Image<Vec3>,
    /// Specular colour
    pub specular: Image<Vec3>,
}

impl GBuffer {
    /// Empty G-buffer with no covered pixels
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            positions: Image::new(width, height, Vec4::zeros()),
            normals: Image::new(width, height, Vec3::zeros()),
            albedo: Image::new(width, height, Vec3::zeros()),
            specular: Image::new(width, height, Vec3::zeros()),
        }
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.positions.width()
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.positions.height()
    }

    /// World position of pixel `index`, or `None` for background
    pub fn position(&self, index: usize) -> Option<Vec3> {
        let p = self.positions.pixels()[index];
        (p.w > 0.0).then(|| p.xyz())
    }

    /// Check all four images against the viewport
    pub fn validate(&self, width: u32, height: u32) -> RenderResult<()> {
        self.positions.expect_dimensions("position image", width, height)?;
        self.normals.expect_dimensions("normal image", width, height)?;
        self.albedo.expect_dimensions("albedo image", width, height)?;
        self.specular.expect_dimensions("specular image", width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fn_is_row_major() {
        let image = Image::from_fn(3, 2, |x, y| (x, y));
        assert_eq!(image.pixels()[4], (1, 1));
        assert_eq!(*image.get(2, 1), (2, 1));
        assert_eq!(image.index(2, 1), 5);
    }

    #[test]
    fn test_dimension_mismatch_is_reported() {
        let image = Image::new(4, 4, 0u8);
        assert!(image.expect_dimensions("mask", 4, 4).is_ok());
        assert!(matches!(
            image.expect_dimensions("mask", 8, 4),
            Err(RenderError::DimensionMismatch { actual_width: 4, .. })
        ));
    }

    #[test]
    fn test_background_has_no_position() {
        let mut gbuffer = GBuffer::new(2, 1);
        *gbuffer.positions.get_mut(1, 0) = Vec4::new(1.0, 2.0, 3.0, 1.0);
        assert_eq!(gbuffer.position(0), None);
        assert_eq!(gbuffer.position(1), Some(Vec3::new(1.0, 2.0, 3.0)));
    }
}
