//! Stand-in for the raster pass: ray-cast G-buffer and shadowed direct light

use radiosity_engine::foundation::math::{utils, Vec3, Vec4};
use radiosity_engine::render::{Camera, GBuffer, Image, Light, MaterialSampler, Ray, RayTag};
use radiosity_engine::scene::Scene;

/// Trace one primary ray per pixel and record the first surface
pub fn trace_gbuffer(scene: &Scene, camera: &Camera, width: u32, height: u32) -> GBuffer {
    let mut gbuffer = GBuffer::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let direction = camera.primary_ray_direction(x, y, width, height);
            let pixel = gbuffer.positions.index(x, y) as u32;
            let ray = Ray::new(camera.position, direction, camera.far, RayTag::Visibility { pixel, slot: 0 });
            let hit = scene.intersect(&ray);
            if !hit.is_hit() {
                continue;
            }

            let [u, v] = hit.uv;
            let position = ray.point_at(hit.distance);
            *gbuffer.positions.get_mut(x, y) = Vec4::new(position.x, position.y, position.z, 1.0);
            *gbuffer.normals.get_mut(x, y) =
                utils::face_forward(scene.normal(hit.shape_id, hit.prim_id, u, v), &-direction);
            *gbuffer.albedo.get_mut(x, y) = scene.diffuse(hit.shape_id, hit.prim_id, u, v);
            *gbuffer.specular.get_mut(x, y) = scene.specular(hit.shape_id, hit.prim_id, u, v);
        }
    }
    gbuffer
}

/// Diffuse direct light with one shadow ray per pixel and light
pub fn direct_lighting(scene: &Scene, gbuffer: &GBuffer, lights: &[Light], bias: f32) -> Image<Vec3> {
    let mut direct = Image::new(gbuffer.width(), gbuffer.height(), Vec3::zeros());
    for (index, value) in direct.pixels_mut().iter_mut().enumerate() {
        let Some(position) = gbuffer.position(index) else { continue };
        let normal = gbuffer.normals.pixels()[index];
        let albedo = gbuffer.albedo.pixels()[index];

        for light in lights {
            let to_light = light.position - position;
            let distance = to_light.norm();
            if distance <= bias || !light.contains_direction(&-to_light) {
                continue;
            }
            let l = to_light / distance;
            let cos = normal.dot(&l);
            if cos <= 0.0 {
                continue;
            }
            let tag = RayTag::Visibility { pixel: index as u32, slot: 0 };
            let shadow = Ray::between(position + normal * bias, light.position, bias, tag);
            if scene.occluded(&shadow) {
                continue;
            }
            *value += light.diffuse.component_mul(&albedo) * (cos / (1.0 + distance * distance));
        }
    }
    direct
}
