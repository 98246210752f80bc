//! Radiosity demo application
//!
//! Renders a scene with budgeted instant radiosity on the CPU backend and
//! writes the final composite to a PNG.
//!
//! Usage: `radiosity_demo [config.toml|config.ron]`

mod raster;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use radiosity_engine::config::Config;
use radiosity_engine::foundation::logging;
use radiosity_engine::foundation::math::Vec3;
use radiosity_engine::render::{Camera, CpuBackend, GBuffer, Image, IndirectRenderer, RenderError};
use radiosity_engine::scene::{Scene, SceneError};
use thiserror::Error;

use settings::DemoConfig;

/// Startup and output failures
#[derive(Error, Debug)]
enum DemoError {
    #[error(transparent)]
    Config(#[from] radiosity_engine::config::ConfigError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Failed to write {path}: {source}")]
    Output {
        path: PathBuf,
        source: image::ImageError,
    },
}

struct RadiosityDemo {
    config: DemoConfig,
    scene: Arc<Scene>,
    camera: Camera,
    gbuffer: GBuffer,
    renderer: IndirectRenderer<CpuBackend>,
}

impl RadiosityDemo {
    fn new(config: DemoConfig) -> Result<Self, DemoError> {
        let scene = match &config.scene.path {
            Some(path) => {
                log::info!("Loading scene from {}", path.display());
                Scene::load(path)?
            }
            None => {
                log::info!("Using built-in Cornell box at scale {}", config.scene.scale);
                Scene::cornell_box(config.scene.scale)
            }
        };
        let scene = Arc::new(scene);

        let viewport = &config.radiosity.viewport;
        let camera = Camera::from_viewport(viewport, config.scene.camera_position, config.scene.camera_target);
        let gbuffer = raster::trace_gbuffer(&scene, &camera, viewport.width, viewport.height);
        let covered = (0..gbuffer.positions.len()).filter(|&i| gbuffer.position(i).is_some()).count();
        log::info!("G-buffer covers {} of {} pixels", covered, gbuffer.positions.len());

        let renderer = IndirectRenderer::new(config.renderer_config(), CpuBackend::new(Arc::clone(&scene)))?;

        Ok(Self { config, scene, camera, gbuffer, renderer })
    }

    fn run(&mut self) -> Result<Image<Vec3>, DemoError> {
        let frames = self.config.output.frames.max(1);
        let motion = self.config.output.light_motion;
        let bias = self.config.radiosity.vpl.ray_bias;

        let mut composite = None;
        for _ in 0..frames {
            let direct = raster::direct_lighting(&self.scene, &self.gbuffer, self.renderer.lights(), bias);
            let output = self
                .renderer
                .render_frame(&self.gbuffer, &direct, &self.camera, self.scene.as_ref())?;
            composite = Some(output.composite);

            if motion != Vec3::zeros() {
                self.renderer.translate_light(0, motion);
            }
        }

        let lines = self.renderer.table().debug_lines(self.renderer.lights());
        let stats = self.renderer.backend().stats();
        log::info!(
            "{} frames: {}/{} VPLs valid, {} light paths, {} rays traced",
            self.renderer.frame_count(),
            self.renderer.table().valid_count(),
            self.renderer.table().len(),
            lines.len(),
            stats.active_rays
        );

        Ok(composite.unwrap_or_else(|| Image::new(self.gbuffer.width(), self.gbuffer.height(), Vec3::zeros())))
    }

    fn shutdown(self) {
        let backend = self.renderer.shutdown();
        log::debug!("{} backend buffers left after shutdown", backend.live_buffers());
    }
}

/// Gamma-encode a linear image into 8-bit RGB
fn to_rgb(image: &Image<Vec3>) -> image::RgbImage {
    image::RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let encode = |c: f32| (c.clamp(0.0, 1.0).powf(1.0 / 2.2) * 255.0).round() as u8;
        let color = image.get(x, y);
        image::Rgb([encode(color.x), encode(color.y), encode(color.z)])
    })
}

fn load_config() -> Result<DemoConfig, DemoError> {
    match std::env::args().nth(1) {
        Some(path) => Ok(DemoConfig::load_from_file(path)?),
        None => Ok(DemoConfig::default()),
    }
}

fn run() -> Result<(), DemoError> {
    let config = load_config();
    let level = config.as_ref().map_or("info", |config| config.radiosity.log_level.as_str());
    logging::init_with_level(level);
    let config = config?;

    config.radiosity.validate()?;
    log::info!("Starting radiosity demo");

    let mut demo = RadiosityDemo::new(config)?;
    let image = demo.run()?;

    let path = demo.config.output.path.clone();
    to_rgb(&image)
        .save(&path)
        .map_err(|source| DemoError::Output { path: path.clone(), source })?;
    log::info!("Wrote {}", path.display());

    demo.shutdown();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = run() {
        log::error!("Radiosity demo failed: {}", e);
        return Err(e.into());
    }
    Ok(())
}
