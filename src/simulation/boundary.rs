use crate::config::SimulationParameters;
use crate::kernel::{Kernel, KernelExecutor, Uniforms};

use super::FluidState;

/// Soft vessel walls.
///
/// Within `soft_boundary_size` of an edge the velocity component normal to
/// that edge is scaled down, by `boundary_strength` at the edge itself and
/// not at all at the inner border of the region. Runs after projection.
pub fn apply_boundary<E: KernelExecutor>(
    executor: &mut E,
    state: &mut FluidState<E::Field>,
    params: &SimulationParameters,
) {
    let uniforms = Uniforms::new()
        .float("SoftSize", params.soft_boundary_size)
        .float("BoundaryStrength", params.boundary_strength);
    let (read, write) = state.velocity.split_mut();
    executor.run_kernel(Kernel::Boundary, &[read], &uniforms, write);
    state.velocity.swap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::CpuExecutor;

    #[test]
    fn test_zero_strength_leaves_velocity() {
        let mut exec = CpuExecutor::new();
        let mut state = FluidState::new(&mut exec, 8);
        state.velocity.write_mut().fill([2.0, -3.0, 0.0, 0.0]);
        state.velocity.swap();
        let params = SimulationParameters {
            boundary_strength: 0.0,
            ..Default::default()
        };

        apply_boundary(&mut exec, &mut state, &params);

        assert!(state.velocity.read().cells().iter().all(|c| *c == [2.0, -3.0, 0.0, 0.0]));
    }

    #[test]
    fn test_flow_into_wall_is_damped() {
        let mut exec = CpuExecutor::new();
        let mut state = FluidState::new(&mut exec, 20);
        state.velocity.write_mut().fill([0.0, 1.0, 0.0, 0.0]);
        state.velocity.swap();
        let params = SimulationParameters::default();

        apply_boundary(&mut exec, &mut state, &params);

        let vel = state.velocity.read();
        // Top row is closest to the wall, then it ramps back to full speed
        let top = vel.get(10, 19)[1];
        let inner = vel.get(10, 17)[1];
        let middle = vel.get(10, 10)[1];
        assert!(top < inner);
        assert!(inner < middle);
        assert_eq!(middle, 1.0);
    }
}
