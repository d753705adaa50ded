//! A [`RenderDevice`] backed by wgpu.
//!
//! Textures are single-level `wgpu::Texture`s usable both as attachments and
//! for sampling. Framebuffers are attachment sets; every clear and draw is
//! encoded as its own render pass and submitted immediately, which keeps the
//! device's observable behavior synchronous.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::{
    AreaSize, ArrayObjectHandle, ClearSpecification, DepthInstanceUniforms, FaceCulling,
    FramebufferDescription, FramebufferHandle, RenderDevice, RenderError, RenderResult,
    Texture2DDescription, TextureFormat, TextureHandle, TextureUnit,
};

fn wgpu_format(format: TextureFormat) -> wgpu::TextureFormat {
    match format {
        TextureFormat::R8 => wgpu::TextureFormat::R8Unorm,
        TextureFormat::Rg16F => wgpu::TextureFormat::Rg16Float,
        TextureFormat::Rg32F => wgpu::TextureFormat::Rg32Float,
        TextureFormat::Rgba8 => wgpu::TextureFormat::Rgba8Unorm,
        TextureFormat::Rgba16F => wgpu::TextureFormat::Rgba16Float,
        TextureFormat::Depth16 => wgpu::TextureFormat::Depth16Unorm,
        TextureFormat::Depth24 => wgpu::TextureFormat::Depth24Plus,
        TextureFormat::Depth32F => wgpu::TextureFormat::Depth32Float,
    }
}

fn cull_mode(culling: FaceCulling) -> Option<wgpu::Face> {
    match culling {
        FaceCulling::Disabled => None,
        FaceCulling::Back => Some(wgpu::Face::Back),
        FaceCulling::Front => Some(wgpu::Face::Front),
    }
}

#[derive(Debug)]
struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    description: Texture2DDescription,
}

#[derive(Debug)]
struct GpuArrayObject {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    index_count: u32,
}

/// Attachment formats and culling a depth-variance pipeline is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    color: Option<wgpu::TextureFormat>,
    depth: Option<wgpu::TextureFormat>,
    culling: FaceCulling,
}

/// A wgpu-backed render device.
#[derive(Debug)]
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    next_id: u64,
    units: Vec<Option<TextureHandle>>,
    textures: HashMap<TextureHandle, GpuTexture>,
    framebuffers: HashMap<FramebufferHandle, FramebufferDescription>,
    array_objects: HashMap<ArrayObjectHandle, GpuArrayObject>,
    bound: Option<FramebufferHandle>,
    viewport: Option<AreaSize>,
    culling: FaceCulling,
    shader: wgpu::ShaderModule,
    uniform_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl WgpuDevice {
    /// Wraps an existing wgpu device.
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, texture_units: u32) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Depth Variance Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/depth_variance.wgsl").into()),
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Depth Instance Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Depth Variance Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });

        Self {
            device,
            queue,
            next_id: 1,
            units: vec![None; texture_units as usize],
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            array_objects: HashMap::new(),
            bound: None,
            viewport: None,
            culling: FaceCulling::default(),
            shader,
            uniform_layout,
            pipeline_layout,
            pipelines: HashMap::new(),
        }
    }

    /// Creates a device on the first available adapter, without a surface.
    pub async fn new_headless(texture_units: u32) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::AdapterCreationFailed)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("r2 device (headless)"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        log::info!("using adapter {:?}", adapter.get_info().name);
        Ok(Self::new(device, queue, texture_units))
    }

    /// Blocking form of [`WgpuDevice::new_headless`].
    pub fn new_headless_blocking(texture_units: u32) -> RenderResult<Self> {
        pollster::block_on(Self::new_headless(texture_units))
    }

    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[must_use]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Number of cached depth-variance pipelines.
    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    fn fresh(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn unit_slot(&mut self, unit: TextureUnit) -> RenderResult<&mut Option<TextureHandle>> {
        self.units
            .get_mut(unit.0 as usize)
            .ok_or_else(|| RenderError::UnknownObject(format!("texture unit {}", unit.0)))
    }

    fn texture(&self, texture: TextureHandle) -> RenderResult<&GpuTexture> {
        self.textures
            .get(&texture)
            .ok_or_else(|| RenderError::UnknownObject(format!("texture {}", texture.0)))
    }

    /// The first color attachment and the depth attachment of the bound
    /// framebuffer.
    fn bound_attachments(&self) -> RenderResult<(Option<&GpuTexture>, Option<&GpuTexture>)> {
        let framebuffer = self.bound.ok_or(RenderError::FramebufferNotBound)?;
        let description = self
            .framebuffers
            .get(&framebuffer)
            .ok_or_else(|| RenderError::UnknownObject(format!("framebuffer {}", framebuffer.0)))?;
        let color = description
            .color
            .first()
            .map(|texture| self.texture(*texture))
            .transpose()?;
        let depth = description
            .depth
            .map(|texture| self.texture(texture))
            .transpose()?;
        Ok((color, depth))
    }

    fn create_pipeline(&self, key: PipelineKey) -> wgpu::RenderPipeline {
        let attributes = wgpu::vertex_attr_array![0 => Float32x3];
        let targets = [key.color.map(|format| wgpu::ColorTargetState {
            format,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })];

        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Depth Variance Pipeline"),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: key.color.map(|_| wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some("fs_main"),
                targets: &targets,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: cull_mode(key.culling),
                ..Default::default()
            },
            depth_stencil: key.depth.map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }
}

impl RenderDevice for WgpuDevice {
    fn texture_unit_count(&self) -> u32 {
        u32::try_from(self.units.len()).unwrap_or(u32::MAX)
    }

    fn texture_2d_allocate(
        &mut self,
        unit: TextureUnit,
        description: &Texture2DDescription,
    ) -> RenderResult<TextureHandle> {
        self.unit_slot(unit)?;

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("r2 texture"),
            size: wgpu::Extent3d {
                width: description.size.width.max(1),
                height: description.size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu_format(description.format),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let handle = TextureHandle(self.fresh());
        self.textures.insert(
            handle,
            GpuTexture {
                texture,
                view,
                description: *description,
            },
        );
        *self.unit_slot(unit)? = Some(handle);
        Ok(handle)
    }

    fn texture_2d_bind(&mut self, unit: TextureUnit, texture: TextureHandle) -> RenderResult<()> {
        self.texture(texture)?;
        *self.unit_slot(unit)? = Some(texture);
        Ok(())
    }

    fn texture_unit_unbind(&mut self, unit: TextureUnit) {
        if let Some(slot) = self.units.get_mut(unit.0 as usize) {
            *slot = None;
        }
    }

    fn texture_is_live(&self, texture: TextureHandle) -> bool {
        self.textures.contains_key(&texture)
    }

    fn texture_2d_regenerate_mipmaps(&mut self, unit: TextureUnit) -> RenderResult<()> {
        let texture = (*self.unit_slot(unit)?).ok_or_else(|| {
            RenderError::UnknownObject(format!("nothing bound to unit {}", unit.0))
        })?;
        let levels = self.texture(texture)?.texture.mip_level_count();
        log::trace!("texture {} has {levels} mip level(s), nothing to regenerate", texture.0);
        Ok(())
    }

    fn texture_delete(&mut self, texture: TextureHandle) -> RenderResult<()> {
        let removed = self
            .textures
            .remove(&texture)
            .ok_or_else(|| RenderError::UnknownObject(format!("texture {}", texture.0)))?;
        removed.texture.destroy();
        for slot in &mut self.units {
            if *slot == Some(texture) {
                *slot = None;
            }
        }
        Ok(())
    }

    fn framebuffer_allocate(
        &mut self,
        description: &FramebufferDescription,
    ) -> RenderResult<FramebufferHandle> {
        for texture in description.color.iter().chain(description.depth.iter()) {
            self.texture(*texture)?;
        }
        let framebuffer = FramebufferHandle(self.fresh());
        self.framebuffers.insert(framebuffer, description.clone());
        Ok(framebuffer)
    }

    fn framebuffer_delete(&mut self, framebuffer: FramebufferHandle) -> RenderResult<()> {
        if self.framebuffers.remove(&framebuffer).is_none() {
            return Err(RenderError::UnknownObject(format!("framebuffer {}", framebuffer.0)));
        }
        if self.bound == Some(framebuffer) {
            self.bound = None;
        }
        Ok(())
    }

    fn framebuffer_draw_bind(&mut self, framebuffer: FramebufferHandle) -> RenderResult<()> {
        if !self.framebuffers.contains_key(&framebuffer) {
            return Err(RenderError::UnknownObject(format!("framebuffer {}", framebuffer.0)));
        }
        self.bound = Some(framebuffer);
        Ok(())
    }

    fn framebuffer_draw_unbind(&mut self) {
        self.bound = None;
    }

    fn framebuffer_draw_bound(&self) -> Option<FramebufferHandle> {
        self.bound
    }

    fn viewport_set(&mut self, area: AreaSize) {
        self.viewport = Some(area);
    }

    fn face_culling_set(&mut self, culling: FaceCulling) {
        self.culling = culling;
    }

    fn clear(&mut self, clear: &ClearSpecification) -> RenderResult<()> {
        let (color, depth) = self.bound_attachments()?;
        if color.is_none() && depth.is_none() {
            log::trace!("clear of a framebuffer without attachments");
            return Ok(());
        }

        let color_attachments: Vec<_> = color
            .map(|texture| {
                let load = clear.color.map_or(wgpu::LoadOp::Load, |c| {
                    wgpu::LoadOp::Clear(wgpu::Color {
                        r: f64::from(c.x),
                        g: f64::from(c.y),
                        b: f64::from(c.z),
                        a: f64::from(c.w),
                    })
                });
                Some(wgpu::RenderPassColorAttachment {
                    view: &texture.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .into_iter()
            .collect();
        let depth_attachment = depth.map(|texture| wgpu::RenderPassDepthStencilAttachment {
            view: &texture.view,
            depth_ops: Some(wgpu::Operations {
                load: clear.depth.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("r2 clear encoder"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("r2 clear"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: depth_attachment,
                ..Default::default()
            });
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn array_object_allocate(
        &mut self,
        positions: &[[f32; 3]],
        indices: &[u32],
    ) -> RenderResult<ArrayObjectHandle> {
        let vertices = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("r2 vertex buffer"),
                contents: bytemuck::cast_slice(positions),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("r2 index buffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        let handle = ArrayObjectHandle(self.fresh());
        self.array_objects.insert(
            handle,
            GpuArrayObject {
                vertices,
                indices: index_buffer,
                index_count: u32::try_from(indices.len()).unwrap_or(u32::MAX),
            },
        );
        Ok(handle)
    }

    fn array_object_delete(&mut self, array_object: ArrayObjectHandle) -> RenderResult<()> {
        let removed = self
            .array_objects
            .remove(&array_object)
            .ok_or_else(|| RenderError::UnknownObject(format!("array object {}", array_object.0)))?;
        removed.vertices.destroy();
        removed.indices.destroy();
        Ok(())
    }

    fn draw_depth_variance(
        &mut self,
        array_object: ArrayObjectHandle,
        uniforms: &DepthInstanceUniforms,
    ) -> RenderResult<()> {
        let key = {
            let (color, depth) = self.bound_attachments()?;
            PipelineKey {
                color: color.map(|t| wgpu_format(t.description.format)),
                depth: depth.map(|t| wgpu_format(t.description.format)),
                culling: self.culling,
            }
        };
        if key.color.is_none() && key.depth.is_none() {
            log::trace!("draw into a framebuffer without attachments");
            return Ok(());
        }
        if !self.pipelines.contains_key(&key) {
            log::debug!("create depth variance pipeline for {key:?}");
            let pipeline = self.create_pipeline(key);
            self.pipelines.insert(key, pipeline);
        }

        let (color, depth) = self.bound_attachments()?;
        let geometry = self
            .array_objects
            .get(&array_object)
            .ok_or_else(|| RenderError::UnknownObject(format!("array object {}", array_object.0)))?;
        let pipeline = self
            .pipelines
            .get(&key)
            .ok_or_else(|| RenderError::UnknownObject(format!("pipeline {key:?}")))?;

        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Depth Instance Uniforms"),
                contents: bytemuck::bytes_of(uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Depth Instance Bind Group"),
            layout: &self.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let color_attachments: Vec<_> = color
            .map(|texture| {
                Some(wgpu::RenderPassColorAttachment {
                    view: &texture.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .into_iter()
            .collect();
        let depth_attachment = depth.map(|texture| wgpu::RenderPassDepthStencilAttachment {
            view: &texture.view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Load,
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        });
        let target = color.or(depth).map_or(AreaSize::square(1), |t| t.description.size);
        let viewport = self.viewport.unwrap_or(target);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("r2 depth variance encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("r2 depth variance"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: depth_attachment,
                ..Default::default()
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_viewport(
                0.0,
                0.0,
                viewport.width.clamp(1, target.width.max(1)) as f32,
                viewport.height.clamp(1, target.height.max(1)) as f32,
                0.0,
                1.0,
            );
            pass.set_vertex_buffer(0, geometry.vertices.slice(..));
            pass.set_index_buffer(geometry.indices.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..geometry.index_count, 0, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}
