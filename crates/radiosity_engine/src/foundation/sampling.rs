//! Low-discrepancy and random sampling helpers
//!
//! VPL seeding draws its primary-light directions from a Halton sequence so
//! that consecutive regenerations spread evenly over the emitter, while bounce
//! directions use a seeded pseudo-random generator.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::foundation::math::{constants, utils, Vec3};

/// Prime bases used for the three Halton dimensions
pub const HALTON_BASES: [u64; 3] = [2, 3, 5];

/// Radical inverse of `index` in `base`, the `index`-th Halton value
///
/// Index 0 maps to 0; every other index maps into (0, 1).
pub fn radical_inverse(mut index: u64, base: u64) -> f32 {
    debug_assert!(base > 1);
    let inv_base = 1.0 / base as f64;
    let mut factor = inv_base;
    let mut result = 0.0;
    while index > 0 {
        result += (index % base) as f64 * factor;
        index /= base;
        factor *= inv_base;
    }
    result as f32
}

/// Three-dimensional Halton point at `index`
pub fn halton3(index: u64) -> [f32; 3] {
    HALTON_BASES.map(|base| radical_inverse(index, base))
}

/// Deterministic random source for bounce directions
#[derive(Debug, Clone)]
pub struct BounceSampler {
    rng: StdRng,
}

impl BounceSampler {
    /// Create a sampler from a fixed seed so runs are reproducible
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Uniformly distributed unit vector
    pub fn unit_vector(&mut self) -> Vec3 {
        let z: f32 = self.rng.gen_range(-1.0..=1.0);
        let phi: f32 = self.rng.gen_range(0.0..constants::TAU);
        let r = (1.0 - z * z).max(0.0).sqrt();
        Vec3::new(r * phi.cos(), r * phi.sin(), z)
    }

    /// Random unit vector flipped into the hemisphere around `normal`
    pub fn bounce_direction(&mut self, normal: &Vec3) -> Vec3 {
        utils::face_forward(self.unit_vector(), normal)
    }
}
