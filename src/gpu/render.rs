use wgpu::{
    BindGroupLayout, BindGroupLayoutEntry, Buffer, Device, PrimitiveTopology, RenderPipeline,
    ShaderStages, TextureFormat,
};

use crate::config::ARROW_SCALE;
use crate::error::Result;
use crate::simulation::{FrameView, Presenter};

use super::compute::{storage_entry, uniform_entry, validated};
use super::{ArrowParams, GpuExecutor, GpuField};

const DISPLAY_SOURCE: &str = concat!(
    include_str!("../shaders/grid.wgsl"),
    include_str!("../shaders/display.wgsl")
);

const ARROWS_SOURCE: &str = concat!(
    include_str!("../shaders/grid.wgsl"),
    include_str!("../shaders/arrows.wgsl")
);

/// Render pipeline reading one field through a storage binding
struct FieldPass {
    pipeline: RenderPipeline,
    layout: BindGroupLayout,
}

impl FieldPass {
    fn build(
        device: &Device,
        name: &'static str,
        source: &'static str,
        entries: &[BindGroupLayoutEntry],
        topology: PrimitiveTopology,
        grid_layout: &BindGroupLayout,
        format: TextureFormat,
    ) -> Result<Self> {
        validated(device, name, || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(name),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });

            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(name),
                entries,
            });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(name),
                bind_group_layouts: &[&layout, grid_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(name),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

            Self { pipeline, layout }
        })
    }
}

/// Paints dye to the window surface, with the optional velocity arrows on top
pub struct SurfacePresenter {
    display: Option<FieldPass>,
    arrows: Option<FieldPass>,
    arrow_params: Buffer,
}

impl SurfacePresenter {
    pub fn new(executor: &GpuExecutor) -> Self {
        let context = executor.context();
        let device = &context.device;
        let format = context.format();

        let display = FieldPass::build(
            device,
            "Display",
            DISPLAY_SOURCE,
            &[storage_entry(0, true, ShaderStages::FRAGMENT)],
            PrimitiveTopology::TriangleList,
            executor.grid_layout(),
            format,
        )
        .map_err(|e| log::error!("{}", e))
        .ok();

        let arrows = FieldPass::build(
            device,
            "Arrows",
            ARROWS_SOURCE,
            &[
                storage_entry(0, true, ShaderStages::VERTEX),
                uniform_entry(1, ShaderStages::VERTEX),
            ],
            PrimitiveTopology::LineList,
            executor.grid_layout(),
            format,
        )
        .map_err(|e| log::error!("{}", e))
        .ok();

        let arrow_params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("arrow-params-buffer"),
            size: std::mem::size_of::<ArrowParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            display,
            arrows,
            arrow_params,
        }
    }
}

impl Presenter<GpuExecutor> for SurfacePresenter {
    fn present(&mut self, executor: &mut GpuExecutor, frame: FrameView<'_, GpuField>) {
        // Compute work recorded this frame is submitted even if the surface is unavailable
        let output = match executor.context().current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                executor.context().reconfigure();
                executor.flush();
                return;
            }
            Err(e) => {
                log::error!("Surface error: {:?}", e);
                executor.flush();
                return;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let (width, height) = frame.dye.dims();
        let arrow_count = frame.arrow_resolution * frame.arrow_resolution;
        {
            let recording = executor.recording(width, height);
            let device = recording.device;

            let display_group = self.display.as_ref().map(|pass| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("display-bind-group"),
                    layout: &pass.layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: frame.dye.buffer.as_entire_binding(),
                    }],
                })
            });

            let arrows_group = match &self.arrows {
                Some(pass) if frame.show_arrows && arrow_count > 0 => {
                    let params = ArrowParams {
                        scale: ARROW_SCALE,
                        resolution: frame.arrow_resolution,
                        _padding: [0; 2],
                    };
                    recording
                        .queue
                        .write_buffer(&self.arrow_params, 0, bytemuck::bytes_of(&params));
                    Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("arrows-bind-group"),
                        layout: &pass.layout,
                        entries: &[
                            wgpu::BindGroupEntry {
                                binding: 0,
                                resource: frame.velocity.buffer.as_entire_binding(),
                            },
                            wgpu::BindGroupEntry {
                                binding: 1,
                                resource: self.arrow_params.as_entire_binding(),
                            },
                        ],
                    }))
                }
                _ => None,
            };

            let mut pass = recording
                .encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("display-pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });

            if let (Some(display), Some(group)) = (&self.display, &display_group) {
                pass.set_pipeline(&display.pipeline);
                pass.set_bind_group(0, group, &[]);
                pass.set_bind_group(1, recording.grid, &[]);
                pass.draw(0..3, 0..1); // Fullscreen triangle
            }

            if let (Some(arrows), Some(group)) = (&self.arrows, &arrows_group) {
                pass.set_pipeline(&arrows.pipeline);
                pass.set_bind_group(0, group, &[]);
                pass.set_bind_group(1, recording.grid, &[]);
                pass.draw(0..arrow_count * 2, 0..1);
            }
        }

        executor.flush();
        output.present();
    }
}
