mod boundary;
mod double_buffer;
mod input;
mod pressure;
mod scheduler;
mod solver;
mod splat;

pub use boundary::apply_boundary;
pub use double_buffer::DoubleBuffer;
pub use input::PointerHandler;
pub use pressure::solve_pressure;
pub use scheduler::{FrameCapture, FrameOutcome, FrameScheduler, FrameView, Presenter, SchedulerState};
pub use solver::{advect_dye, advect_velocity, compute_divergence, step, subtract_gradient, FluidState};
pub use splat::{apply_splat, splat_impulse, QueuedSplat, SplatKind, SplatQueue};
