//! Whole frames over the CPU backend and the built-in Cornell box

use std::sync::Arc;

use super::support::{traced_gbuffer, FlakyBackend};
use crate::core::{LightDescriptor, RadiosityConfig, VplConfig};
use crate::foundation::math::Vec3;
use crate::render::backends::cpu::CpuBackend;
use crate::render::camera::Camera;
use crate::render::gi::generation::GenerationEngine;
use crate::render::gi::renderer::IndirectRenderer;
use crate::render::gi::revalidation::RevalidationEngine;
use crate::render::gi::vpl::VplTable;
use crate::render::image::Image;
use crate::render::lighting::Light;
use crate::render::resources::{Owner, ResourceKind};
use crate::render::RenderError;
use crate::scene::Scene;

const SIZE: u32 = 8;

fn setup() -> (Arc<Scene>, Camera, IndirectRenderer<CpuBackend>) {
    let scene = Arc::new(Scene::cornell_box(1.0));
    let mut camera = Camera::perspective(Vec3::new(0.0, 1.0, 3.5), 45.0, 1.0, 0.1, 100.0);
    camera.look_at(Vec3::new(0.0, 1.0, 0.0), Vec3::y());

    let config = RadiosityConfig::default()
        .with_viewport(SIZE, SIZE)
        .with_vpls(16, 2)
        .with_regeneration_budget(8)
        .with_interleave(2, 1)
        .with_lights(vec![LightDescriptor::point(Vec3::new(0.0, 1.8, 0.0))]);
    let renderer = IndirectRenderer::new(config, CpuBackend::new(Arc::clone(&scene))).unwrap();
    (scene, camera, renderer)
}

#[test]
fn test_cornell_box_frames() {
    let (scene, camera, mut renderer) = setup();
    let gbuffer = traced_gbuffer(&scene, &camera, SIZE, SIZE);
    let direct = Image::new(SIZE, SIZE, Vec3::zeros());

    let mut last = None;
    for frame in 0..6 {
        let output = renderer.render_frame(&gbuffer, &direct, &camera, scene.as_ref()).unwrap();
        let stats = &output.stats;
        assert_eq!(stats.frame, frame);
        assert_eq!(stats.phase, (frame % 4) as usize);
        assert_eq!(stats.valid + stats.invalid, 16);
        assert!(stats.generation.regenerated.len() <= 8);
        for kind in ResourceKind::ALL {
            assert_eq!(renderer.resources().owner(kind).unwrap(), Owner::Raster);
        }
        last = Some(output);
    }

    let output = last.unwrap();
    assert!(renderer.table().valid_count() > 0);
    assert!(output
        .indirect
        .pixels()
        .iter()
        .all(|p| p.iter().all(|c| c.is_finite() && *c >= 0.0)));
    assert!(output.indirect.pixels().iter().any(|p| p.x > 0.0));
    assert_eq!(renderer.frame_count(), 6);

    let stats = renderer.backend().stats();
    assert!(stats.occlusion_queries > 0);
    assert!(stats.intersection_queries > 0);
}

#[test]
fn test_history_keeps_view_of_every_frame() {
    let (scene, camera, mut renderer) = setup();
    let gbuffer = traced_gbuffer(&scene, &camera, SIZE, SIZE);
    let direct = Image::new(SIZE, SIZE, Vec3::zeros());

    let output = renderer.render_frame(&gbuffer, &direct, &camera, scene.as_ref()).unwrap();
    assert_eq!(renderer.history().view(output.stats.history_slot), Some(camera.view_matrix()));
}

#[test]
fn test_moved_light_invalidates_vpls() {
    let (scene, camera, mut renderer) = setup();
    let gbuffer = traced_gbuffer(&scene, &camera, SIZE, SIZE);
    let direct = Image::new(SIZE, SIZE, Vec3::zeros());

    for _ in 0..3 {
        renderer.render_frame(&gbuffer, &direct, &camera, scene.as_ref()).unwrap();
    }
    assert!(renderer.table().valid_count() > 0);

    // Above the ceiling every path from the light to a VPL is blocked
    assert!(renderer.translate_light(0, Vec3::new(0.0, 3.0, 0.0)));
    assert!(!renderer.translate_light(1, Vec3::zeros()));
    let output = renderer.render_frame(&gbuffer, &direct, &camera, scene.as_ref()).unwrap();
    assert!(output.stats.revalidation.invalidated > 0);
}

#[test]
fn test_composite_adds_direct_light() {
    let (scene, camera, mut renderer) = setup();
    let gbuffer = traced_gbuffer(&scene, &camera, SIZE, SIZE);
    let direct = Image::new(SIZE, SIZE, Vec3::repeat(0.25));

    let output = renderer.render_frame(&gbuffer, &direct, &camera, scene.as_ref()).unwrap();
    for ((composite, indirect), albedo) in output
        .composite
        .pixels()
        .iter()
        .zip(output.indirect.pixels())
        .zip(gbuffer.albedo.pixels())
    {
        let expected = Vec3::repeat(0.25) + albedo.component_mul(indirect);
        assert!((composite - expected).norm() < 1e-5);
    }
}

#[test]
fn test_mismatched_gbuffer_is_rejected() {
    let (scene, camera, mut renderer) = setup();
    let gbuffer = traced_gbuffer(&scene, &camera, SIZE / 2, SIZE / 2);
    let direct = Image::new(SIZE, SIZE, Vec3::zeros());

    let result = renderer.render_frame(&gbuffer, &direct, &camera, scene.as_ref());
    assert!(matches!(result, Err(RenderError::DimensionMismatch { .. })));
    assert_eq!(renderer.frame_count(), 0);
}

#[test]
fn test_shutdown_releases_backend_buffers() {
    let (_, _, renderer) = setup();
    assert_eq!(renderer.backend().live_buffers(), 3);
    let backend = renderer.shutdown();
    assert_eq!(backend.live_buffers(), 0);
}

#[test]
fn test_failed_dispatch_hands_resources_back() {
    let (scene, camera, renderer) = setup();
    let config = renderer.config().clone();
    let backend = FlakyBackend { inner: CpuBackend::new(Arc::clone(&scene)), failures: 1 };
    let mut renderer = IndirectRenderer::new(config, backend).unwrap();
    let gbuffer = traced_gbuffer(&scene, &camera, SIZE, SIZE);
    let direct = Image::new(SIZE, SIZE, Vec3::zeros());

    let result = renderer.render_frame(&gbuffer, &direct, &camera, scene.as_ref());
    assert!(matches!(result, Err(RenderError::Backend(_))));
    for kind in ResourceKind::ALL {
        assert_eq!(renderer.resources().owner(kind).unwrap(), Owner::Raster);
    }

    for _ in 0..2 {
        renderer.render_frame(&gbuffer, &direct, &camera, scene.as_ref()).unwrap();
    }
    assert_eq!(renderer.frame_count(), 2);
}

#[test]
fn test_static_spot_light_keeps_its_vpls() {
    let scene = Arc::new(Scene::cornell_box(1.0));
    let lights = [Light::spot(Vec3::new(0.0, 1.9, 0.0), -Vec3::y(), Vec3::repeat(1.0), 20f32.to_radians())];
    let config = VplConfig {
        count: 64,
        bounce_bands: 1,
        max_regenerations_per_frame: 64,
        ray_bias: 0.1,
        ..VplConfig::default()
    };
    let mut backend = CpuBackend::new(Arc::clone(&scene));
    let mut table = VplTable::new(64, 1, 1).unwrap();
    let mut generation = GenerationEngine::new(&mut backend, &config).unwrap();
    let mut revalidation = RevalidationEngine::new(&mut backend, 64, config.ray_bias).unwrap();

    table.begin_frame();
    let generated = generation.run(&mut table, &lights, scene.as_ref(), &mut backend).unwrap();
    assert!(!generated.regenerated.is_empty());

    table.begin_frame();
    let report = revalidation.run(&mut table, &lights, &mut backend).unwrap();
    assert_eq!(report.tested, generated.regenerated.len());
    assert_eq!(report.invalidated, 0);
}
