use wgpu::{Buffer, BufferUsages, Device};

/// Bytes per grid cell (`vec4<f32>`)
const CELL_SIZE: u64 = std::mem::size_of::<[f32; 4]>() as u64;

/// One grid field resident on the GPU
pub struct GpuField {
    pub buffer: Buffer,
    pub width: u32,
    pub height: u32,
}

impl GpuField {
    /// Allocate a zero-initialized storage buffer for `width x height` cells
    pub fn new(device: &Device, label: &str, width: u32, height: u32) -> Self {
        let cell_count = width as u64 * height as u64;

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: (cell_count * CELL_SIZE).max(CELL_SIZE),
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        Self {
            buffer,
            width,
            height,
        }
    }

    pub fn dims(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Grid dimensions passed to every kernel (16 bytes, matches `Grid` in grid.wgsl)
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GridDims {
    pub width: u32,
    pub height: u32,
    pub _padding: [u32; 2],
}

impl GridDims {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            _padding: [0; 2],
        }
    }
}

/// Arrow overlay parameters (16 bytes, matches `ArrowParams` in arrows.wgsl)
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ArrowParams {
    pub scale: f32,
    pub resolution: u32,
    pub _padding: [u32; 2],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_structs_are_16_byte_multiples() {
        assert_eq!(std::mem::size_of::<GridDims>(), 16);
        assert_eq!(std::mem::size_of::<ArrowParams>(), 16);
    }
}
