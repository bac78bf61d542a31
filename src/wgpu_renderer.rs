//! [Renderer] which rasterizes batches with wgpu

use crate::{
    error::Error,
    matrix::Matrix,
    pattern::{Color, Extend, Pattern, MAX_COLOR_STOPS},
    renderer::{DrawState, Renderer},
    utils::transmute_slice,
    vertex::{Vertex, VertexBatch, FLAT_UV},
};
use wgpu::{util::DeviceExt, vertex_attr_array};

const KIND_SOLID: u32 = 0;
const KIND_LINEAR: u32 = 1;
const KIND_RADIAL: u32 = 2;

/// Holds the clip depth of every pixel
const STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Stencil8;

/// Covers the whole target in clip space
const FULLSCREEN_QUAD: [Vertex; 4] = [
    Vertex { position: glam::Vec2::new(-1.0, -1.0), uv: FLAT_UV },
    Vertex { position: glam::Vec2::new(1.0, -1.0), uv: FLAT_UV },
    Vertex { position: glam::Vec2::new(-1.0, 1.0), uv: FLAT_UV },
    Vertex { position: glam::Vec2::new(1.0, 1.0), uv: FLAT_UV },
];
const FULLSCREEN_QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 1, 3];

/// Layout of the uniform block in `shader/canvas.wgsl`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Uniforms {
    pub transform: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub points: [f32; 4],
    pub radii: [f32; 4],
    pub params: [u32; 4],
    pub offsets: [f32; MAX_COLOR_STOPS],
    pub stop_colors: [[f32; 4]; MAX_COLOR_STOPS],
}

const UNIFORM_BUFFER_SIZE: usize = std::mem::size_of::<Uniforms>();

fn extend_index(extend: Extend) -> u32 {
    match extend {
        Extend::None => 0,
        Extend::Repeat => 1,
        Extend::Reflect => 2,
        Extend::Pad => 3,
    }
}

impl Uniforms {
    pub fn new(state: &DrawState) -> Self {
        let size = state.surface_size;
        let device_to_clip = Matrix::new(2.0 / size.x, 0.0, 0.0, -2.0 / size.y, -1.0, 1.0);
        let mut uniforms = Self {
            transform: Matrix::multiply(&state.matrix, &device_to_clip).to_cols_array_4x4(),
            color: [0.0; 4],
            points: [0.0; 4],
            radii: [0.0; 4],
            params: [KIND_SOLID, 0, 0, 0],
            offsets: [0.0; MAX_COLOR_STOPS],
            stop_colors: [[0.0; 4]; MAX_COLOR_STOPS],
        };
        let (kind, gradient) = match &state.source {
            Pattern::Solid(color) => {
                uniforms.color = color.to_array();
                return uniforms;
            }
            Pattern::Linear(gradient) => (KIND_LINEAR, gradient),
            Pattern::Radial(gradient) => (KIND_RADIAL, gradient),
        };
        let stops = gradient.stops();
        uniforms.points = [gradient.start.x, gradient.start.y, gradient.end.x, gradient.end.y];
        uniforms.radii = [gradient.radii.x, gradient.radii.y, 0.0, 0.0];
        uniforms.params = [kind, extend_index(gradient.extend), stops.len() as u32, 0];
        for (i, stop) in stops.iter().enumerate() {
            uniforms.offsets[i] = stop.offset;
            uniforms.stop_colors[i] = stop.color.to_array();
        }
        uniforms
    }

    /// Solid `color` for geometry which is already in clip space.
    pub fn fullscreen(color: Color) -> Self {
        Self {
            transform: glam::Mat4::IDENTITY.to_cols_array_2d(),
            color: color.to_array(),
            points: [0.0; 4],
            radii: [0.0; 4],
            params: [KIND_SOLID, 0, 0, 0],
            offsets: [0.0; MAX_COLOR_STOPS],
            stop_colors: [[0.0; 4]; MAX_COLOR_STOPS],
        }
    }
}

macro_rules! stencil_descriptor {
    ($compare:ident, $pass:ident) => {
        wgpu::StencilFaceState {
            compare: wgpu::CompareFunction::$compare,
            fail_op: wgpu::StencilOperation::Keep,
            depth_fail_op: wgpu::StencilOperation::Keep,
            pass_op: wgpu::StencilOperation::$pass,
        }
    };
}

macro_rules! render_pipeline_descriptor {
    ($label:expr, $pipeline_layout:expr, $shader_module:expr, $format:expr,
     $blend:expr, $write_mask:expr, $stencil_face:expr $(,)?) => {
        wgpu::RenderPipelineDescriptor {
            label: Some($label),
            layout: Some($pipeline_layout),
            vertex: wgpu::VertexState {
                module: $shader_module,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &vertex_attr_array![0 => Float32x2, 1 => Float32x3],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: $shader_module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: $format,
                    blend: $blend,
                    write_mask: $write_mask,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                ..wgpu::PrimitiveState::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: STENCIL_FORMAT,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState {
                    front: $stencil_face,
                    back: $stencil_face,
                    read_mask: 0xFF,
                    write_mask: 0xFF,
                },
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        }
    };
}

/// Target of a [WgpuRenderer] together with the stencil buffer holding its clip region.
struct Target {
    color: wgpu::TextureView,
    stencil: wgpu::TextureView,
}

impl Target {
    fn new(device: &wgpu::Device, texture: &wgpu::Texture) -> Self {
        let stencil = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("clip stencil"),
            size: texture.size(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: STENCIL_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        Self {
            color: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            stencil: stencil.create_view(&wgpu::TextureViewDescriptor::default()),
        }
    }
}

pub struct WgpuRenderer {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: Target,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    fullscreen_vertices: wgpu::Buffer,
    fullscreen_indices: wgpu::Buffer,
    draw_pipeline: wgpu::RenderPipeline,
    clip_pipeline: wgpu::RenderPipeline,
    unclip_pipeline: wgpu::RenderPipeline,
    clear_pipeline: wgpu::RenderPipeline,
}

impl WgpuRenderer {
    /// Creates a renderer drawing into `texture`, which needs [wgpu::TextureUsages::RENDER_ATTACHMENT].
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, texture: &wgpu::Texture) -> Self {
        let format = texture.format();
        let shader_module = device.create_shader_module(wgpu::include_wgsl!("shader/canvas.wgsl"));
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: None,
            mapped_at_creation: false,
            size: UNIFORM_BUFFER_SIZE as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: None,
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(UNIFORM_BUFFER_SIZE as u64),
                },
                count: None,
            }],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: None,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: None,
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let draw_pipeline = device.create_render_pipeline(&render_pipeline_descriptor!(
            "draw",
            &pipeline_layout,
            &shader_module,
            format,
            Some(wgpu::BlendState::ALPHA_BLENDING),
            wgpu::ColorWrites::ALL,
            stencil_descriptor!(Equal, Keep),
        ));
        let clip_pipeline = device.create_render_pipeline(&render_pipeline_descriptor!(
            "clip",
            &pipeline_layout,
            &shader_module,
            format,
            None,
            wgpu::ColorWrites::empty(),
            stencil_descriptor!(Equal, IncrementClamp),
        ));
        let unclip_pipeline = device.create_render_pipeline(&render_pipeline_descriptor!(
            "unclip",
            &pipeline_layout,
            &shader_module,
            format,
            None,
            wgpu::ColorWrites::empty(),
            stencil_descriptor!(Less, Replace),
        ));
        let clear_pipeline = device.create_render_pipeline(&render_pipeline_descriptor!(
            "clear",
            &pipeline_layout,
            &shader_module,
            format,
            Some(wgpu::BlendState::REPLACE),
            wgpu::ColorWrites::ALL,
            stencil_descriptor!(Equal, Keep),
        ));
        let fullscreen_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: None,
            contents: transmute_slice(&FULLSCREEN_QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let fullscreen_indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: None,
            contents: transmute_slice(&FULLSCREEN_QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            device: device.clone(),
            queue: queue.clone(),
            target: Target::new(device, texture),
            uniform_buffer,
            bind_group,
            fullscreen_vertices,
            fullscreen_indices,
            draw_pipeline,
            clip_pipeline,
            unclip_pipeline,
            clear_pipeline,
        }
    }

    /// Draws into `texture` from now on, its clip region starts out empty.
    pub fn set_target(&mut self, texture: &wgpu::Texture) {
        self.target = Target::new(&self.device, texture);
    }

    /// Overwrites the whole target with `color` and removes all clipping.
    pub fn clear_target(&mut self, color: wgpu::Color) -> Result<(), Error> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: None,
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.target.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.target.stencil,
                depth_ops: None,
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0),
                    store: wgpu::StoreOp::Store,
                }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.queue.submit(Some(encoder.finish()));
        self.wait()
    }

    fn wait(&self) -> Result<(), Error> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map(|_| ())
            .map_err(|error| Error::Backend(error.to_string()))
    }

    /// Runs one render pass with a single indexed draw and waits for it.
    fn draw(
        &self,
        pipeline: &wgpu::RenderPipeline,
        uniforms: &Uniforms,
        stencil_reference: u32,
        vertex_buffer: &wgpu::Buffer,
        index_buffer: &wgpu::Buffer,
        index_count: u32,
    ) -> Result<(), Error> {
        self.queue
            .write_buffer(&self.uniform_buffer, 0, transmute_slice(std::slice::from_ref(uniforms)));
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: None,
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target.color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.target.stencil,
                    depth_ops: None,
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.set_stencil_reference(stencil_reference);
            render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
            render_pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            render_pass.draw_indexed(0..index_count, 0, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
        self.wait()
    }

    fn draw_batch(&self, pipeline: &wgpu::RenderPipeline, batch: &VertexBatch, state: &DrawState) -> Result<(), Error> {
        if batch.is_empty() {
            return Ok(());
        }
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: None,
            contents: transmute_slice(&batch.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: None,
            contents: transmute_slice(&batch.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.draw(
            pipeline,
            &Uniforms::new(state),
            state.clip_depth,
            &vertex_buffer,
            &index_buffer,
            batch.indices.len() as u32,
        )
    }

    fn draw_fullscreen(&self, pipeline: &wgpu::RenderPipeline, stencil_reference: u32) -> Result<(), Error> {
        self.draw(
            pipeline,
            &Uniforms::fullscreen(Color::TRANSPARENT),
            stencil_reference,
            &self.fullscreen_vertices,
            &self.fullscreen_indices,
            FULLSCREEN_QUAD_INDICES.len() as u32,
        )
    }
}

impl Renderer for WgpuRenderer {
    fn submit(&mut self, batch: &VertexBatch, state: &DrawState) -> Result<(), Error> {
        self.draw_batch(&self.draw_pipeline, batch, state)
    }

    fn clip(&mut self, batch: &VertexBatch, state: &DrawState) -> Result<(), Error> {
        self.draw_batch(&self.clip_pipeline, batch, state)
    }

    fn reset_clip(&mut self, depth: u32) -> Result<(), Error> {
        self.draw_fullscreen(&self.unclip_pipeline, depth)
    }

    fn clear(&mut self, state: &DrawState) -> Result<(), Error> {
        self.draw_fullscreen(&self.clear_pipeline, state.clip_depth)
    }
}
