//! Error types for the fluid solver.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FluidError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,

    #[error("Failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("Failed to create surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),

    #[error("Surface not supported by adapter")]
    UnsupportedSurface,

    #[error("Kernel '{kernel}' failed to build: {diagnostic}")]
    KernelBuild { kernel: &'static str, diagnostic: String },

    #[error("Kernel '{kernel}' called with a mismatched interface: {reason}")]
    KernelInterface { kernel: &'static str, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Window creation failed: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("Event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

pub type Result<T> = std::result::Result<T, FluidError>;
