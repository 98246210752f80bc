//! Demo configuration: renderer settings plus scene and output choices

use std::path::PathBuf;

use radiosity_engine::config::Config;
use radiosity_engine::core::RadiosityConfig;
use radiosity_engine::foundation::math::Vec3;
use serde::{Deserialize, Serialize};

/// Which scene to trace and where the camera sits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    /// Scene file (`.toml` or `.ron`); the built-in Cornell box when absent
    pub path: Option<PathBuf>,
    /// Scale of the built-in Cornell box
    pub scale: f32,
    /// Overrides the height of every configured light
    pub light_y: Option<f32>,
    /// Camera position
    pub camera_position: Vec3,
    /// Point the camera looks at
    pub camera_target: Vec3,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            path: None,
            scale: 1.0,
            light_y: None,
            camera_position: Vec3::new(0.0, 1.0, 3.5),
            camera_target: Vec3::new(0.0, 1.0, 0.0),
        }
    }
}

/// How many frames to run and where the last one goes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Frames to render before writing the image
    pub frames: u64,
    /// PNG file receiving the final composite
    pub path: PathBuf,
    /// Moves the first light by this much every frame
    pub light_motion: Vec3,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            frames: 64,
            path: PathBuf::from("radiosity.png"),
            light_motion: Vec3::zeros(),
        }
    }
}

/// Everything the demo reads at startup
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Renderer settings, at the top level of the file
    #[serde(flatten)]
    pub radiosity: RadiosityConfig,
    /// Scene selection
    pub scene: SceneSettings,
    /// Output selection
    pub output: OutputSettings,
}

impl DemoConfig {
    /// Renderer settings with the light height override applied
    pub fn renderer_config(&self) -> RadiosityConfig {
        let mut config = self.radiosity.clone();
        if let Some(y) = self.scene.light_y {
            for light in &mut config.lights {
                light.position.y = y;
            }
        }
        config
    }
}

impl Config for DemoConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_settings_sit_at_top_level() {
        let source = r#"
            [vpl]
            count = 32

            [[lights]]
            type = "point"
            position = [0.0, 1.5, 0.0]

            [scene]
            light_y = 1.9

            [output]
            frames = 8
        "#;
        let config: DemoConfig = toml::from_str(source).expect("demo config parses");

        assert_eq!(config.radiosity.vpl.count, 32);
        assert_eq!(config.output.frames, 8);
        assert_eq!(config.scene.scale, 1.0);
        assert_eq!(config.renderer_config().lights[0].position.y, 1.9);
        assert_eq!(config.radiosity.lights[0].position.y, 1.5);
    }
}
