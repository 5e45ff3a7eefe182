mod buffers;
mod compute;
mod context;
mod render;

pub use buffers::{ArrowParams, GpuField, GridDims};
pub use compute::{GpuExecutor, Recording};
pub use context::GpuContext;
pub use render::SurfacePresenter;
