use crate::kernel::{Kernel, KernelExecutor, Uniforms};

use super::FluidState;

/// Fixed-count Jacobi relaxation of the pressure field.
///
/// Each iteration reads the current pressure estimate and the divergence
/// computed earlier in the frame, writes the relaxed estimate and swaps.
/// The divergence buffer is only read. Negative counts run zero iterations.
/// Returns the number of iterations performed.
pub fn solve_pressure<E: KernelExecutor>(
    executor: &mut E,
    state: &mut FluidState<E::Field>,
    iterations: i32,
) -> u32 {
    let iterations = iterations.max(0) as u32;
    let uniforms = Uniforms::new().vec2("Texel", state.texel());

    for _ in 0..iterations {
        let (read, write) = state.pressure.split_mut();
        executor.run_kernel(
            Kernel::Pressure,
            &[read, state.divergence.read()],
            &uniforms,
            write,
        );
        state.pressure.swap();
    }

    log::trace!("Pressure solve: {} iterations", iterations);
    iterations
}
