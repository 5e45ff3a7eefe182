//! Device, queue and presentation surface for one window.

use std::sync::Arc;
use wgpu::{
    Adapter, Device, Instance, Queue, Surface, SurfaceConfiguration, SurfaceError, SurfaceTexture,
    TextureFormat,
};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::error::{FluidError, Result};

pub struct GpuContext {
    pub device: Device,
    pub queue: Queue,
    surface: Surface<'static>,
    config: SurfaceConfiguration,
}

/// Drawable extent for a window size, `None` while minimized
pub fn surface_extent(size: PhysicalSize<u32>) -> Option<(u32, u32)> {
    (size.width > 0 && size.height > 0).then_some((size.width, size.height))
}

async fn pick_adapter(instance: &Instance, surface: &Surface<'_>) -> Result<Adapter> {
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(surface),
            force_fallback_adapter: false,
        })
        .await
        .ok_or(FluidError::NoAdapter)?;

    let info = adapter.get_info();
    log::info!("Using GPU: {} ({:?})", info.name, info.backend);
    Ok(adapter)
}

async fn open_device(adapter: &Adapter) -> Result<(Device, Queue)> {
    let descriptor = wgpu::DeviceDescriptor {
        label: Some("splat-fluid-device"),
        required_features: wgpu::Features::empty(),
        required_limits: wgpu::Limits::default(),
        memory_hints: wgpu::MemoryHints::Performance,
    };
    let (device, queue) = adapter.request_device(&descriptor, None).await?;

    // Errors outside a kernel build scope would otherwise panic
    device.on_uncaptured_error(Box::new(|e| {
        log::error!("Uncaptured GPU error: {}", e);
    }));
    Ok((device, queue))
}

impl GpuContext {
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let instance = Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;
        let adapter = pick_adapter(&instance, &surface).await?;
        let (device, queue) = open_device(&adapter).await?;

        let (width, height) = surface_extent(window.inner_size()).unwrap_or((1, 1));
        let config = surface
            .get_default_config(&adapter, width, height)
            .ok_or(FluidError::UnsupportedSurface)?;
        surface.configure(&device, &config);

        Ok(Self {
            device,
            queue,
            surface,
            config,
        })
    }

    /// Follow the window size; ignored while minimized
    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        let Some((width, height)) = surface_extent(size) else {
            return;
        };
        self.config.width = width;
        self.config.height = height;
        self.reconfigure();
    }

    /// Reapply the current configuration after the surface was lost or went out of date
    pub fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }

    pub fn current_texture(&self) -> std::result::Result<SurfaceTexture, SurfaceError> {
        self.surface.get_current_texture()
    }

    pub fn format(&self) -> TextureFormat {
        self.config.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_extent_skips_minimized() {
        assert_eq!(surface_extent(PhysicalSize::new(800, 600)), Some((800, 600)));
        assert_eq!(surface_extent(PhysicalSize::new(0, 600)), None);
        assert_eq!(surface_extent(PhysicalSize::new(800, 0)), None);
    }
}
