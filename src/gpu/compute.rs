use std::collections::HashMap;

use wgpu::util::DeviceExt;
use wgpu::{
    BindGroup, BindGroupLayout, BindGroupLayoutEntry, CommandEncoder, ComputePipeline, Device,
    Queue, ShaderStages,
};

use crate::config::WORKGROUP_SIZE;
use crate::error::{FluidError, Result};
use crate::kernel::{Kernel, KernelExecutor, Uniforms};

use super::{GpuContext, GpuField, GridDims};

fn kernel_source(kernel: Kernel) -> &'static str {
    match kernel {
        Kernel::Advect => concat!(
            include_str!("../shaders/grid.wgsl"),
            include_str!("../shaders/advect.wgsl")
        ),
        Kernel::Divergence => concat!(
            include_str!("../shaders/grid.wgsl"),
            include_str!("../shaders/divergence.wgsl")
        ),
        Kernel::Pressure => concat!(
            include_str!("../shaders/grid.wgsl"),
            include_str!("../shaders/pressure.wgsl")
        ),
        Kernel::Gradient => concat!(
            include_str!("../shaders/grid.wgsl"),
            include_str!("../shaders/gradient.wgsl")
        ),
        Kernel::Splat => concat!(
            include_str!("../shaders/grid.wgsl"),
            include_str!("../shaders/splat.wgsl")
        ),
        Kernel::Boundary => concat!(
            include_str!("../shaders/grid.wgsl"),
            include_str!("../shaders/boundary.wgsl")
        ),
    }
}

/// Run `build` inside a validation error scope, turning any captured error
/// into a kernel build failure.
pub(super) fn validated<T>(
    device: &Device,
    name: &'static str,
    build: impl FnOnce() -> T,
) -> Result<T> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(FluidError::KernelBuild {
            kernel: name,
            diagnostic: error.to_string(),
        }),
        None => Ok(value),
    }
}

pub(super) fn storage_entry(
    binding: u32,
    read_only: bool,
    visibility: ShaderStages,
) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub(super) fn uniform_entry(binding: u32, visibility: ShaderStages) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Compute pipeline for one kernel plus its group 0 layout
struct KernelPipeline {
    pipeline: ComputePipeline,
    layout: BindGroupLayout,
}

impl KernelPipeline {
    fn build(device: &Device, kernel: Kernel, grid_layout: &BindGroupLayout) -> Result<Self> {
        validated(device, kernel.name(), || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(kernel.name()),
                source: wgpu::ShaderSource::Wgsl(kernel_source(kernel).into()),
            });

            // Inputs at 0..n, output at n, uniforms at n + 1
            let n = kernel.inputs().len() as u32;
            let mut entries: Vec<_> = (0..n)
                .map(|binding| storage_entry(binding, true, ShaderStages::COMPUTE))
                .collect();
            entries.push(storage_entry(n, false, ShaderStages::COMPUTE));
            entries.push(uniform_entry(n + 1, ShaderStages::COMPUTE));

            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(kernel.name()),
                entries: &entries,
            });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(kernel.name()),
                bind_group_layouts: &[&layout, grid_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(kernel.name()),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some("main"),
                compilation_options: Default::default(),
                cache: None,
            });

            Self { pipeline, layout }
        })
    }
}

/// Borrowed view of the executor used to record one batch of GPU work
pub struct Recording<'a> {
    pub device: &'a Device,
    pub queue: &'a Queue,
    pub encoder: &'a mut CommandEncoder,
    /// Grid dimensions bind group (group 1) for the requested size
    pub grid: &'a BindGroup,
}

/// Kernel executor recording compute passes into a per-frame command encoder.
///
/// Passes are submitted in order by `flush`, which the presenter calls once
/// the frame's display pass has been recorded.
pub struct GpuExecutor {
    context: GpuContext,
    grid_layout: BindGroupLayout,
    /// Kernels that failed to build are absent and run as no-ops
    kernels: HashMap<Kernel, KernelPipeline>,
    grid_bind_groups: HashMap<(u32, u32), BindGroup>,
    encoder: Option<CommandEncoder>,
}

impl GpuExecutor {
    pub fn new(context: GpuContext) -> Self {
        let device = &context.device;
        let grid_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grid-bind-group-layout"),
            entries: &[uniform_entry(
                0,
                ShaderStages::COMPUTE | ShaderStages::VERTEX | ShaderStages::FRAGMENT,
            )],
        });

        let mut kernels = HashMap::new();
        for kernel in Kernel::ALL {
            match KernelPipeline::build(device, kernel, &grid_layout) {
                Ok(pipeline) => {
                    kernels.insert(kernel, pipeline);
                }
                Err(e) => log::error!("{}", e),
            }
        }
        log::info!("Built {}/{} compute kernels", kernels.len(), Kernel::ALL.len());

        Self {
            context,
            grid_layout,
            kernels,
            grid_bind_groups: HashMap::new(),
            encoder: None,
        }
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut GpuContext {
        &mut self.context
    }

    /// Layout of the grid dimensions bind group, shared with the render passes
    pub fn grid_layout(&self) -> &BindGroupLayout {
        &self.grid_layout
    }

    fn ensure_grid_bind_group(&mut self, width: u32, height: u32) {
        let device = &self.context.device;
        let layout = &self.grid_layout;
        self.grid_bind_groups
            .entry((width, height))
            .or_insert_with(|| {
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("grid-dims-buffer"),
                    contents: bytemuck::bytes_of(&GridDims::new(width, height)),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("grid-bind-group"),
                    layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                })
            });
    }

    /// Current frame's encoder together with the grid bind group for
    /// `width x height`
    pub fn recording(&mut self, width: u32, height: u32) -> Recording<'_> {
        self.ensure_grid_bind_group(width, height);
        let device = &self.context.device;
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            })
        });
        Recording {
            device,
            queue: &self.context.queue,
            encoder,
            grid: &self.grid_bind_groups[&(width, height)],
        }
    }

    /// Submit everything recorded since the last flush
    pub fn flush(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.context.queue.submit(std::iter::once(encoder.finish()));
        }
    }
}

impl KernelExecutor for GpuExecutor {
    type Field = GpuField;

    fn create_field(&mut self, label: &str, width: u32, height: u32) -> GpuField {
        log::debug!("Allocating GPU field '{}' ({}x{})", label, width, height);
        GpuField::new(&self.context.device, label, width, height)
    }

    fn run_kernel(
        &mut self,
        kernel: Kernel,
        inputs: &[&GpuField],
        uniforms: &Uniforms,
        output: &mut GpuField,
    ) {
        let params = match kernel
            .validate(inputs.len(), uniforms)
            .and_then(|()| kernel.pack_uniforms(uniforms))
        {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("{}", e);
                return;
            }
        };
        if let Some(bad) = inputs.iter().find(|f| f.dims() != output.dims()) {
            log::warn!(
                "{}: input is {}x{} but output is {}x{}, skipping pass",
                kernel.name(),
                bad.width,
                bad.height,
                output.width,
                output.height
            );
            return;
        }
        if !self.kernels.contains_key(&kernel) {
            return;
        }

        let (width, height) = output.dims();
        self.ensure_grid_bind_group(width, height);

        let device = &self.context.device;
        let Some(pipeline) = self.kernels.get(&kernel) else {
            return;
        };

        // Fresh buffer per call: several splats may be recorded into one encoder
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("kernel-params-buffer"),
            contents: &params,
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let n = inputs.len() as u32;
        let mut entries: Vec<_> = inputs
            .iter()
            .zip(0..)
            .map(|(field, binding)| wgpu::BindGroupEntry {
                binding,
                resource: field.buffer.as_entire_binding(),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: n,
            resource: output.buffer.as_entire_binding(),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: n + 1,
            resource: params_buffer.as_entire_binding(),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel.name()),
            layout: &pipeline.layout,
            entries: &entries,
        });

        let grid = &self.grid_bind_groups[&(width, height)];
        let encoder = self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame-encoder"),
            })
        });

        let workgroups_x = width.div_ceil(WORKGROUP_SIZE);
        let workgroups_y = height.div_ceil(WORKGROUP_SIZE);

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(kernel.name()),
            timestamp_writes: None,
        });
        pass.set_pipeline(&pipeline.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.set_bind_group(1, grid, &[]);
        pass.dispatch_workgroups(workgroups_x, workgroups_y, 1);
    }
}
