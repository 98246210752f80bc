//! # Unified Configuration System
//!
//! All tunables of the indirect-lighting subsystem live in one serializable
//! [`RadiosityConfig`]. It is read once at startup, validated once, and then
//! treated as immutable for the life of the renderer.
//!
//! ## Configuration Categories
//!
//! - **Viewport**: Output resolution and camera projection parameters
//! - **VPL**: Population size, bounce bands, regeneration budget, ray bias
//! - **Interleave**: Screen tile size and history ring length
//! - **Filter**: Discontinuity and reprojection thresholds
//! - **Lights**: Primary emitter descriptors

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};
use crate::foundation::math::Vec3;

/// # Viewport Configuration
///
/// Output resolution and the perspective parameters used for reprojection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Near clipping distance
    pub near: f32,
    /// Far clipping distance
    pub far: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 320,
            fov_degrees: 45.0,
            near: 0.1,
            far: 10000.0,
        }
    }
}

impl ViewportConfig {
    /// Number of pixels in the output image
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Width divided by height
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// # VPL Configuration
///
/// Controls the size of the virtual point light population and how much of
/// it may be regenerated per frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VplConfig {
    /// Total number of VPL slots (N)
    pub count: usize,
    /// Number of bounce bands the slots are split into (B)
    pub bounce_bands: usize,
    /// Maximum regeneration rays cast per frame
    pub max_regenerations_per_frame: usize,
    /// Offset applied to hit points and subtracted from ray lengths
    pub ray_bias: f32,
    /// Length of rays that seed new VPLs
    pub max_ray_distance: f32,
    /// Seed for bounce direction sampling
    pub seed: u64,
}

impl Default for VplConfig {
    fn default() -> Self {
        Self {
            count: 64,
            bounce_bands: 2,
            max_regenerations_per_frame: 16,
            ray_bias: 0.1,
            max_ray_distance: 1000.0,
            seed: 0x5eed,
        }
    }
}

impl VplConfig {
    /// Number of slots in each bounce band
    pub fn band_size(&self) -> usize {
        self.count / self.bounce_bands
    }
}

/// # Interleaved Sampling Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterleaveConfig {
    /// Edge length of the repeating screen tile (S)
    pub tile_size: u32,
    /// Number of frames kept in the history ring (H)
    pub history_size: usize,
}

impl Default for InterleaveConfig {
    fn default() -> Self {
        Self {
            tile_size: 4,
            history_size: 4,
        }
    }
}

impl InterleaveConfig {
    /// Number of distinct sampling phases before the pattern repeats (S² × H)
    pub fn cycle_length(&self) -> usize {
        let tile = self.tile_size as usize;
        tile * tile * self.history_size
    }
}

/// # Filter Configuration
///
/// Thresholds for the discontinuity filter and history reprojection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Minimum normal dot product for a neighbour to be filtered in
    pub normal_threshold: f32,
    /// Maximum world distance between a pixel and an accepted neighbour
    pub position_threshold: f32,
    /// Maximum world distance between a reprojected history sample and the current surface
    pub reprojection_tolerance: f32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            normal_threshold: 0.9,
            position_threshold: 0.5,
            reprojection_tolerance: 0.1,
        }
    }
}

/// Emitter shape of a configured light
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LightShape {
    /// Omnidirectional point emitter
    Point,
    /// Cone-limited emitter around the light normal
    Spot {
        /// Half-angle of the emission cone in degrees
        cone_half_angle_degrees: f32,
    },
    /// Rectangular area emitter facing along the light normal
    Quad {
        /// Half extent along the right axis
        half_width: f32,
        /// Half extent along the up axis
        half_height: f32,
        /// Optional right axis; derived from the normal when absent
        #[serde(default)]
        right: Option<Vec3>,
    },
}

/// Descriptor for one primary light
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightDescriptor {
    /// Emitter shape and its extents
    #[serde(flatten)]
    pub shape: LightShape,
    /// World-space position
    pub position: Vec3,
    /// Emission axis
    #[serde(default = "default_light_normal")]
    pub normal: Vec3,
    /// Diffuse colour
    #[serde(default = "default_light_color")]
    pub diffuse: Vec3,
    /// Specular colour
    #[serde(default = "default_light_color")]
    pub specular: Vec3,
    /// Scalar multiplier applied to both colours
    #[serde(default = "default_light_power")]
    pub power: f32,
    /// Shadow map resource owned by the direct-lighting pass
    #[serde(default)]
    pub shadow_map: Option<u32>,
}

fn default_light_normal() -> Vec3 {
    Vec3::new(0.0, -1.0, 0.0)
}

fn default_light_color() -> Vec3 {
    Vec3::new(1.0, 1.0, 1.0)
}

fn default_light_power() -> f32 {
    1.0
}

impl LightDescriptor {
    /// Point light with white colour at `position`
    pub fn point(position: Vec3) -> Self {
        Self {
            shape: LightShape::Point,
            position,
            normal: default_light_normal(),
            diffuse: default_light_color(),
            specular: default_light_color(),
            power: default_light_power(),
            shadow_map: None,
        }
    }

    /// Spot light pointing along `normal`
    pub fn spot(position: Vec3, normal: Vec3, cone_half_angle_degrees: f32) -> Self {
        Self {
            shape: LightShape::Spot { cone_half_angle_degrees },
            normal,
            ..Self::point(position)
        }
    }

    /// Quad light facing along `normal`
    pub fn quad(position: Vec3, normal: Vec3, half_width: f32, half_height: f32) -> Self {
        Self {
            shape: LightShape::Quad { half_width, half_height, right: None },
            normal,
            ..Self::point(position)
        }
    }

    /// Set the power multiplier
    pub fn with_power(mut self, power: f32) -> Self {
        self.power = power;
        self
    }

    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let invalid = |reason: &str| Err(ConfigError::Invalid(format!("light {index}: {reason}")));

        if self.normal.norm() < f32::EPSILON {
            return invalid("normal must be non-zero");
        }
        if self.power < 0.0 {
            return invalid("power must not be negative");
        }
        match &self.shape {
            LightShape::Point => {}
            LightShape::Spot { cone_half_angle_degrees } => {
                if !(*cone_half_angle_degrees > 0.0 && *cone_half_angle_degrees <= 90.0) {
                    return invalid("cone half-angle must be in (0, 90] degrees");
                }
            }
            LightShape::Quad { half_width, half_height, right } => {
                if *half_width <= 0.0 || *half_height <= 0.0 {
                    return invalid("quad half extents must be positive");
                }
                if let Some(right) = right {
                    if right.cross(&self.normal).norm() < f32::EPSILON {
                        return invalid("quad right axis must not be parallel to the normal");
                    }
                }
            }
        }
        Ok(())
    }
}

/// # Complete Radiosity Configuration
///
/// Top-level configuration for the indirect-lighting renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RadiosityConfig {
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Output resolution and projection
    pub viewport: ViewportConfig,
    /// VPL population parameters
    pub vpl: VplConfig,
    /// Interleaved sampling parameters
    pub interleave: InterleaveConfig,
    /// Filter and reprojection thresholds
    pub filter: FilterConfig,
    /// Primary lights
    pub lights: Vec<LightDescriptor>,
}

impl Default for RadiosityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            viewport: ViewportConfig::default(),
            vpl: VplConfig::default(),
            interleave: InterleaveConfig::default(),
            filter: FilterConfig::default(),
            lights: vec![LightDescriptor::point(Vec3::new(0.0, 1.0, 0.0))],
        }
    }
}

impl RadiosityConfig {
    /// Set output resolution
    pub fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport.width = width;
        self.viewport.height = height;
        self
    }

    /// Set VPL population size and band count
    pub fn with_vpls(mut self, count: usize, bounce_bands: usize) -> Self {
        self.vpl.count = count;
        self.vpl.bounce_bands = bounce_bands;
        self
    }

    /// Set the per-frame regeneration budget
    pub fn with_regeneration_budget(mut self, budget: usize) -> Self {
        self.vpl.max_regenerations_per_frame = budget;
        self
    }

    /// Set tile size and history length
    pub fn with_interleave(mut self, tile_size: u32, history_size: usize) -> Self {
        self.interleave.tile_size = tile_size;
        self.interleave.history_size = history_size;
        self
    }

    /// Replace the light list
    pub fn with_lights(mut self, lights: Vec<LightDescriptor>) -> Self {
        self.lights = lights;
        self
    }

    /// Validate the entire configuration
    ///
    /// Called once at startup; any error is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| Err(ConfigError::Invalid(reason));

        if self.viewport.width == 0 || self.viewport.height == 0 {
            return invalid("viewport dimensions must be non-zero".to_string());
        }
        if !(self.viewport.near > 0.0 && self.viewport.far > self.viewport.near) {
            return invalid("viewport clip planes must satisfy 0 < near < far".to_string());
        }
        if self.vpl.count == 0 {
            return invalid("VPL count must be at least 1".to_string());
        }
        if self.vpl.bounce_bands == 0 || self.vpl.count % self.vpl.bounce_bands != 0 {
            return invalid(format!(
                "VPL count {} must be a non-zero multiple of the bounce band count {}",
                self.vpl.count, self.vpl.bounce_bands
            ));
        }
        if self.vpl.max_regenerations_per_frame == 0 {
            return invalid("regeneration budget must be at least 1".to_string());
        }
        if self.vpl.ray_bias <= 0.0 {
            return invalid("ray bias must be positive".to_string());
        }
        if self.vpl.max_ray_distance <= self.vpl.ray_bias {
            return invalid("max ray distance must exceed the ray bias".to_string());
        }
        if self.interleave.tile_size == 0 || self.interleave.history_size == 0 {
            return invalid("tile size and history size must be non-zero".to_string());
        }
        if self.lights.is_empty() {
            return invalid("at least one light is required".to_string());
        }
        for (index, light) in self.lights.iter().enumerate() {
            light.validate(index)?;
        }

        let cycle = self.interleave.cycle_length();
        if self.vpl.count > cycle && self.vpl.count % cycle != 0 {
            log::warn!(
                "VPL count {} is not a multiple of the interleave cycle {}; the last rays per pixel are partially idle",
                self.vpl.count,
                cycle
            );
        }

        Ok(())
    }
}

impl Config for RadiosityConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RadiosityConfig::default().validate().is_ok());
    }

    #[test]
    fn test_band_size_and_cycle_length() {
        let config = RadiosityConfig::default().with_vpls(8, 2).with_interleave(2, 3);
        assert_eq!(config.vpl.band_size(), 4);
        assert_eq!(config.interleave.cycle_length(), 12);
    }

    #[test]
    fn test_rejects_uneven_bands() {
        let config = RadiosityConfig::default().with_vpls(10, 3);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_missing_lights() {
        let config = RadiosityConfig::default().with_lights(Vec::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_wide_spot_cone() {
        let config = RadiosityConfig::default()
            .with_lights(vec![LightDescriptor::spot(Vec3::y(), -Vec3::y(), 120.0)]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parses_toml_lights() {
        let source = r#"
            [viewport]
            width = 64
            height = 48

            [vpl]
            count = 32
            bounce_bands = 2

            [[lights]]
            type = "spot"
            cone_half_angle_degrees = 30.0
            position = [0.0, 2.0, 0.0]
            normal = [0.0, -1.0, 0.0]
            power = 4.0

            [[lights]]
            type = "quad"
            half_width = 0.5
            half_height = 0.25
            position = [0.0, 1.9, 0.0]
        "#;
        let config: RadiosityConfig = toml::from_str(source).expect("config parses");

        assert_eq!(config.viewport.width, 64);
        assert_eq!(config.vpl.count, 32);
        assert_eq!(config.vpl.max_regenerations_per_frame, 16);
        assert_eq!(config.lights.len(), 2);
        assert_eq!(
            config.lights[0].shape,
            LightShape::Spot { cone_half_angle_degrees: 30.0 }
        );
        assert_eq!(config.lights[0].power, 4.0);
        assert_eq!(config.lights[1].normal, Vec3::new(0.0, -1.0, 0.0));
        assert!(config.validate().is_ok());
    }
}
