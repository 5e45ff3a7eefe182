//! Per-frame solver pipeline.
//!
//! One simulated frame is an operator-split stable-fluids step:
//! advect velocity, advect dye, divergence, Jacobi pressure solve, gradient
//! subtraction, soft boundary. Every pass reads the read field of its
//! inputs, writes the write field of its target, and swaps the target
//! before the next pass starts.

use crate::config::SimulationParameters;
use crate::kernel::{Kernel, KernelExecutor, Uniforms};

use super::{apply_boundary, solve_pressure, DoubleBuffer};

/// The four simulated quantities, all at one fixed resolution
pub struct FluidState<F> {
    resolution: u32,
    pub velocity: DoubleBuffer<F>,
    pub dye: DoubleBuffer<F>,
    pub pressure: DoubleBuffer<F>,
    pub divergence: DoubleBuffer<F>,
}

impl<F> FluidState<F> {
    /// Allocate zeroed buffers at `resolution x resolution`
    pub fn new<E>(executor: &mut E, resolution: u32) -> Self
    where
        E: KernelExecutor<Field = F>,
    {
        let mut pair = |name: &str| {
            DoubleBuffer::new(
                executor.create_field(&format!("{name}-a"), resolution, resolution),
                executor.create_field(&format!("{name}-b"), resolution, resolution),
            )
        };

        Self {
            resolution,
            velocity: pair("velocity"),
            dye: pair("dye"),
            pressure: pair("pressure"),
            divergence: pair("divergence"),
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Uv size of one cell for this state's grid
    pub fn texel(&self) -> [f32; 2] {
        [1.0 / self.resolution as f32; 2]
    }
}

fn advection_uniforms(params: &SimulationParameters, texel: [f32; 2], is_velocity: bool) -> Uniforms {
    Uniforms::new()
        .float("Dt", params.dt)
        .float("Damping", params.damping)
        .float("Viscosity", params.viscosity)
        .vec2("Texel", texel)
        .float("SoftSize", params.soft_boundary_size)
        .float("BoundaryStrength", params.boundary_strength)
        .int("IsVelocity", is_velocity as i32)
}

/// Self-advect velocity
pub fn advect_velocity<E: KernelExecutor>(
    executor: &mut E,
    state: &mut FluidState<E::Field>,
    params: &SimulationParameters,
) {
    let uniforms = advection_uniforms(params, state.texel(), true);
    let (read, write) = state.velocity.split_mut();
    executor.run_kernel(Kernel::Advect, &[read, read], &uniforms, write);
    state.velocity.swap();
}

/// Carry dye along the velocity field
pub fn advect_dye<E: KernelExecutor>(
    executor: &mut E,
    state: &mut FluidState<E::Field>,
    params: &SimulationParameters,
) {
    let uniforms = advection_uniforms(params, state.texel(), false);
    let (read, write) = state.dye.split_mut();
    executor.run_kernel(Kernel::Advect, &[read, state.velocity.read()], &uniforms, write);
    state.dye.swap();
}

pub fn compute_divergence<E: KernelExecutor>(executor: &mut E, state: &mut FluidState<E::Field>) {
    let uniforms = Uniforms::new().vec2("Texel", state.texel());
    executor.run_kernel(
        Kernel::Divergence,
        &[state.velocity.read()],
        &uniforms,
        state.divergence.write_mut(),
    );
    state.divergence.swap();
}

/// Project velocity onto its (approximately) divergence-free part
pub fn subtract_gradient<E: KernelExecutor>(executor: &mut E, state: &mut FluidState<E::Field>) {
    let uniforms = Uniforms::new().vec2("Texel", state.texel());
    let (read, write) = state.velocity.split_mut();
    executor.run_kernel(
        Kernel::Gradient,
        &[read, state.pressure.read()],
        &uniforms,
        write,
    );
    state.velocity.swap();
}

/// Advance the simulation by one frame
pub fn step<E: KernelExecutor>(
    executor: &mut E,
    state: &mut FluidState<E::Field>,
    params: &SimulationParameters,
) {
    advect_velocity(executor, state, params);
    advect_dye(executor, state, params);
    compute_divergence(executor, state);
    solve_pressure(executor, state, params.pressure_iterations);
    subtract_gradient(executor, state);
    apply_boundary(executor, state, params);
}
