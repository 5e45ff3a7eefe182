//! Real-time 2D stable-fluids solver with dye, splats and soft walls.
//!
//! The solver is written against the [`kernel::KernelExecutor`] trait and
//! runs either on the GPU ([`gpu::GpuExecutor`], wgpu compute passes) or on
//! the host ([`kernel::CpuExecutor`], rayon).

pub mod app;
pub mod config;
pub mod error;
pub mod gpu;
pub mod headless;
pub mod kernel;
pub mod simulation;
