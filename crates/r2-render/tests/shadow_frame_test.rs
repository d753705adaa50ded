//! Multi-frame shadow rendering against the headless device.

use std::rc::Rc;

use glam::{Mat4, Vec3};
use r2_core::{
    IdPool, Matrices, PoolLimits, ProjectionFov, ProjectiveLight, TransformOT, TransformT,
};
use r2_render::*;

struct Scene {
    device: HeadlessDevice,
    units: TextureUnitAllocator,
    pool: SharedDepthVarianceBufferPool,
    matrices: Matrices,
    profiling: ProfilingContext,
    instances: DepthInstances,
    lights: Vec<LightProjectiveWithShadowVariance>,
}

fn scene(limits: PoolLimits, light_sizes: &[u32]) -> Scene {
    let ids = IdPool::new();
    let mut device = HeadlessDevice::new(8);
    let units = TextureUnitAllocator::for_device(&device, 4);
    let quad = device
        .array_object_allocate(
            &[
                [-1.0, -1.0, 0.0],
                [1.0, -1.0, 0.0],
                [1.0, 1.0, 0.0],
                [-1.0, 1.0, 0.0],
            ],
            &[0, 1, 2, 0, 2, 3],
        )
        .unwrap();

    let mut instances = DepthInstances::new();
    for i in 0..3 {
        let offset = Vec3::new(i as f32 * 2.0, 0.0, 0.0);
        let transform = Box::new(TransformT::new(offset));
        instances
            .add(DepthInstance::new(ids.fresh_id().unwrap(), transform, quad))
            .unwrap();
    }

    let lights = light_sizes
        .iter()
        .map(|&size| {
            let shadow = ShadowDepthVariance::new(
                &ids,
                DepthVarianceBufferDescription::new(AreaSize::square(size)),
            )
            .unwrap();
            let mut light = LightProjectiveWithShadowVariance::new(
                &ids,
                Box::new(ProjectionFov::new(1.2, 1.0, 0.5, 30.0)),
                shadow,
            )
            .unwrap();
            light.transform =
                TransformOT::looking_at(Vec3::new(0.0, 5.0, 5.0), Vec3::ZERO, Vec3::Y);
            light
        })
        .collect();

    Scene {
        device,
        units,
        pool: DepthVarianceBufferPool::new_shared(limits),
        matrices: Matrices::new(),
        profiling: ProfilingContext::new_root("frame", false),
        instances,
        lights,
    }
}

fn render_frame(
    scene: &mut Scene,
    renderer: &mut ShadowMapRenderer,
) -> RenderResult<Vec<TextureHandle>> {
    let mut execution = renderer.shadow_begin()?;
    for light in &scene.lights {
        let mut root = scene.units.root_context();
        execution.shadow_exec_render_light(
            &mut scene.profiling,
            &mut scene.device,
            &mut root,
            &scene.matrices,
            light,
            &scene.instances,
        )?;
    }

    let context = execution.shadow_exec_complete()?;
    let mut textures = Vec::new();
    for light in &scene.lights {
        textures.push(context.shadow_map_get(light)?.depth_variance_texture());
    }
    context.shadow_map_context_finish()?;
    Ok(textures)
}

#[test]
fn test_frames_reuse_pooled_maps() {
    let mut scene = scene(PoolLimits::new(1 << 20, 1 << 22), &[64, 64, 128]);
    let mut renderer = ShadowMapRenderer::new(
        Rc::clone(&scene.pool),
        Box::new(BasicDepthVarianceRenderer::new()),
    );

    let first = render_frame(&mut scene, &mut renderer).unwrap();
    let textures_after_first = scene.device.texture_count();
    let second = render_frame(&mut scene, &mut renderer).unwrap();

    assert_eq!(first.len(), 3);
    assert_eq!(scene.device.texture_count(), textures_after_first);
    let mut a = first.clone();
    let mut b = second.clone();
    a.sort();
    b.sort();
    assert_eq!(a, b, "second frame should draw into the same buffers");

    // Three lights, three instances, two frames.
    assert_eq!(scene.device.draws().len(), 18);
    assert_eq!(scene.pool.borrow().count_in_use(), 0);
    assert_eq!(scene.pool.borrow().count_available(), 3);
    assert!(!scene.matrices.is_observer_active());
}

#[test]
fn test_draws_use_light_view() {
    let mut scene = scene(PoolLimits::new(1 << 20, 1 << 22), &[32]);
    let mut renderer = ShadowMapRenderer::new(
        Rc::clone(&scene.pool),
        Box::new(BasicDepthVarianceRenderer::new()),
    );
    render_frame(&mut scene, &mut renderer).unwrap();

    let light = &scene.lights[0];
    let view = Mat4::look_at_rh(Vec3::new(0.0, 5.0, 5.0), Vec3::ZERO, Vec3::Y);
    let draw = &scene.device.draws()[0];
    let model_view = Mat4::from_cols_array_2d(&draw.uniforms.model_view);
    assert!(model_view.abs_diff_eq(view, 1e-4));
    assert_eq!(
        Mat4::from_cols_array_2d(&draw.uniforms.projection),
        light.projection().make_matrix()
    );
    assert_eq!(draw.viewport, Some(AreaSize::square(32)));
}

#[test]
fn test_soft_limit_overshoot_without_idle_maps() {
    // Each 64x64 map takes 32 KiB; the soft limit holds one.
    let mut scene = scene(PoolLimits::new(40 * 1024, 1 << 22), &[64, 64]);
    let mut renderer = ShadowMapRenderer::new(
        Rc::clone(&scene.pool),
        Box::new(BasicDepthVarianceRenderer::new()),
    );

    render_frame(&mut scene, &mut renderer).unwrap();
    // The second allocation went over the soft limit but nothing was
    // available to evict at that point.
    assert_eq!(scene.pool.borrow().count_available(), 2);
    assert_eq!(scene.pool.borrow().size_current(), 64 * 1024);

    render_frame(&mut scene, &mut renderer).unwrap();
    assert_eq!(scene.pool.borrow().count_available(), 2);
    assert_eq!(scene.device.texture_count(), 4);
}

#[test]
fn test_hard_limit_fails_frame_and_recovers() {
    let mut scene = scene(PoolLimits::new(0, 40 * 1024), &[64, 64]);
    let mut renderer = ShadowMapRenderer::new(
        Rc::clone(&scene.pool),
        Box::new(BasicDepthVarianceRenderer::new()),
    );

    // The first map fits; the second would pass the hard limit.
    let result = render_frame(&mut scene, &mut renderer);
    assert!(matches!(result, Err(RenderError::PoolHardLimitExceeded { .. })));
    assert!(!renderer.is_executing());
    assert_eq!(scene.pool.borrow().count_in_use(), 0);
    assert_eq!(scene.pool.borrow().count_available(), 1);

    // Dropping a light brings the frame under the limit again.
    scene.lights.pop();
    let textures = render_frame(&mut scene, &mut renderer).unwrap();
    assert_eq!(textures.len(), 1);
    assert_eq!(scene.pool.borrow().count_in_use(), 0);
    assert_eq!(scene.device.texture_count(), 2);

    renderer.delete().unwrap();
    scene.pool.borrow_mut().delete(&mut scene.device).unwrap();
    assert_eq!(scene.device.texture_count(), 0);
}
