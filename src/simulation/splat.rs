use rand::Rng;

use crate::config::{
    SimulationParameters, BURST_DRIFT, BURST_MAX, BURST_MIN, QUEUED_SPLAT_APPLICATIONS,
};
use crate::kernel::{Kernel, KernelExecutor, Uniforms};

use super::{DoubleBuffer, FluidState};

/// What a splat's payload means
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplatKind {
    /// Payload xy is a velocity impulse in cells per unit time
    Velocity,
    /// Payload is an RGB color, scaled by the color value
    Dye,
}

/// Add a Gaussian blob of `payload` centered on `uv` to `target`.
///
/// Dye splats are multiplied by `color_value`; a zero color value adds
/// nothing and the pass is skipped.
pub fn apply_splat<E: KernelExecutor>(
    executor: &mut E,
    target: &mut DoubleBuffer<E::Field>,
    uv: [f32; 2],
    payload: [f32; 3],
    radius: f32,
    kind: SplatKind,
    color_value: i32,
) {
    let is_color = match kind {
        SplatKind::Velocity => 0,
        SplatKind::Dye if color_value == 0 => return,
        SplatKind::Dye => color_value,
    };

    let uniforms = Uniforms::new()
        .vec2("point", uv)
        .vec3("color", payload)
        .float("radius", radius)
        .int("isColor", is_color);
    let (read, write) = target.split_mut();
    executor.run_kernel(Kernel::Splat, &[read], &uniforms, write);
    target.swap();
}

/// Inject a drag-style impulse: the uv delta becomes a velocity splat and
/// `color` becomes a dye splat at the same point.
pub fn splat_impulse<E: KernelExecutor>(
    executor: &mut E,
    state: &mut FluidState<E::Field>,
    params: &SimulationParameters,
    uv: [f32; 2],
    delta: [f32; 2],
    color: [f32; 3],
) {
    let scale = state.resolution() as f32 * params.splat_force;
    let impulse = [delta[0] * scale, delta[1] * scale, 0.0];

    apply_splat(
        executor,
        &mut state.velocity,
        uv,
        impulse,
        params.splat_radius,
        SplatKind::Velocity,
        params.color_value,
    );
    apply_splat(
        executor,
        &mut state.dye,
        uv,
        color,
        params.splat_radius,
        SplatKind::Dye,
        params.color_value,
    );
}

/// Splat re-applied on consecutive simulated frames while drifting
#[derive(Clone, Debug, PartialEq)]
pub struct QueuedSplat {
    pub uv: [f32; 2],
    pub drift: [f32; 2],
    pub color: [f32; 3],
    pub applications: u32,
}

/// Pending randomized splats
#[derive(Debug, Default)]
pub struct SplatQueue {
    entries: Vec<QueuedSplat>,
}

impl SplatQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[QueuedSplat] {
        &self.entries
    }

    pub fn push(&mut self, splat: QueuedSplat) {
        self.entries.push(splat);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Queue a burst of 5 to 20 random splats. Returns how many were added.
    pub fn spawn_burst<R: Rng>(&mut self, rng: &mut R, params: &SimulationParameters) -> usize {
        let count = rng.gen_range(BURST_MIN..=BURST_MAX);
        for _ in 0..count {
            let uv = [rng.gen::<f32>(), rng.gen::<f32>()];
            let drift = [
                rng.gen_range(-BURST_DRIFT..BURST_DRIFT),
                rng.gen_range(-BURST_DRIFT..BURST_DRIFT),
            ];
            let color = if params.random_color {
                random_color(rng)
            } else {
                params.splat_color
            };
            self.entries.push(QueuedSplat {
                uv,
                drift,
                color,
                applications: 0,
            });
        }
        count
    }

    /// Apply every queued splat once, move it along its drift and drop the
    /// ones that have been applied enough times. Returns the number applied.
    pub fn drain<E: KernelExecutor>(
        &mut self,
        executor: &mut E,
        state: &mut FluidState<E::Field>,
        params: &SimulationParameters,
    ) -> usize {
        let mut applied = 0;
        self.entries.retain_mut(|splat| {
            splat_impulse(executor, state, params, splat.uv, splat.drift, splat.color);
            splat.uv[0] += splat.drift[0];
            splat.uv[1] += splat.drift[1];
            splat.applications += 1;
            applied += 1;
            splat.applications < QUEUED_SPLAT_APPLICATIONS
        });
        applied
    }
}

pub fn random_color<R: Rng>(rng: &mut R) -> [f32; 3] {
    [rng.gen(), rng.gen(), rng.gen()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{CpuExecutor, HostField};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn magnitude(field: &HostField, x: u32, y: u32) -> f32 {
        let c = field.get(x, y);
        (c[0] * c[0] + c[1] * c[1] + c[2] * c[2]).sqrt()
    }

    #[test]
    fn test_splat_is_local() {
        let mut exec = CpuExecutor::new();
        let mut state = FluidState::new(&mut exec, 64);
        let radius = 0.05;

        apply_splat(
            &mut exec,
            &mut state.dye,
            [0.5, 0.5],
            [1.0, 1.0, 1.0],
            radius,
            SplatKind::Dye,
            1,
        );

        let dye = state.dye.read();
        assert!(magnitude(dye, 32, 32) > 0.0);
        assert!(magnitude(dye, 31, 31) > 0.0);
        for y in 0..64 {
            for x in 0..64 {
                let u = (x as f32 + 0.5) / 64.0 - 0.5;
                let v = (y as f32 + 0.5) / 64.0 - 0.5;
                if (u * u + v * v).sqrt() > 3.0 * radius {
                    assert!(magnitude(dye, x, y) < 1e-3, "cell ({x}, {y}) too bright");
                }
            }
        }
    }

    #[test]
    fn test_splat_is_additive() {
        let mut exec = CpuExecutor::new();
        let mut state = FluidState::new(&mut exec, 16);
        state.velocity.write_mut().fill([1.0, 1.0, 0.0, 0.0]);
        state.velocity.swap();

        apply_splat(
            &mut exec,
            &mut state.velocity,
            [0.53125, 0.53125],
            [2.0, 0.0, 0.0],
            0.1,
            SplatKind::Velocity,
            5,
        );

        // Velocity splats ignore the color value
        let center = state.velocity.read().get(8, 8);
        assert!((center[0] - 3.0).abs() < 1e-5);
        assert_eq!(center[1], 1.0);
    }

    #[test]
    fn test_zero_color_value_skips_dye() {
        let mut exec = CpuExecutor::new();
        let mut state = FluidState::new(&mut exec, 8);
        apply_splat(
            &mut exec,
            &mut state.dye,
            [0.5, 0.5],
            [1.0, 0.0, 0.0],
            0.2,
            SplatKind::Dye,
            0,
        );
        assert_eq!(state.dye.read_index(), 0);
        assert_eq!(exec.passes(), 0);
    }

    #[test]
    fn test_impulse_scales_with_resolution_and_force() {
        let mut exec = CpuExecutor::new();
        let mut state = FluidState::new(&mut exec, 16);
        let params = SimulationParameters {
            resolution: 16,
            splat_force: 10.0,
            splat_radius: 0.1,
            ..Default::default()
        };

        splat_impulse(
            &mut exec,
            &mut state,
            &params,
            [0.53125, 0.53125],
            [0.01, -0.02],
            [0.0, 1.0, 0.0],
        );

        let vel = state.velocity.read().get(8, 8);
        assert!((vel[0] - 1.6).abs() < 1e-4);
        assert!((vel[1] + 3.2).abs() < 1e-4);
        assert!((state.dye.read().get(8, 8)[1] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_burst_size_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let params = SimulationParameters::default();
        for _ in 0..50 {
            let mut queue = SplatQueue::new();
            let count = queue.spawn_burst(&mut rng, &params);
            assert!((5..=20).contains(&count));
            assert_eq!(queue.len(), count);
            for splat in queue.entries() {
                assert_eq!(splat.applications, 0);
                assert!(splat.drift.iter().all(|d| d.abs() <= BURST_DRIFT));
            }
        }
    }

    #[test]
    fn test_burst_uses_fixed_color() {
        let mut rng = StdRng::seed_from_u64(1);
        let params = SimulationParameters {
            random_color: false,
            splat_color: [0.25, 0.5, 0.75],
            ..Default::default()
        };
        let mut queue = SplatQueue::new();
        queue.spawn_burst(&mut rng, &params);
        assert!(queue.entries().iter().all(|s| s.color == [0.25, 0.5, 0.75]));
    }

    #[test]
    fn test_queued_splat_applied_three_times() {
        let mut exec = CpuExecutor::new();
        let mut state = FluidState::new(&mut exec, 16);
        let params = SimulationParameters {
            resolution: 16,
            ..Default::default()
        };
        let mut queue = SplatQueue::new();
        queue.push(QueuedSplat {
            uv: [0.25, 0.25],
            drift: [0.125, 0.0],
            color: [1.0, 0.0, 0.0],
            applications: 0,
        });

        for frame in 0..3 {
            assert_eq!(queue.drain(&mut exec, &mut state, &params), 1, "frame {frame}");
        }
        assert!(queue.is_empty());
        assert_eq!(queue.drain(&mut exec, &mut state, &params), 0);
    }

    #[test]
    fn test_drain_moves_splats_and_removes_only_finished() {
        let mut exec = CpuExecutor::new();
        let mut state = FluidState::new(&mut exec, 8);
        let params = SimulationParameters {
            resolution: 8,
            ..Default::default()
        };
        let mut queue = SplatQueue::new();
        for applications in [2, 0, 2, 1] {
            queue.push(QueuedSplat {
                uv: [0.5, 0.5],
                drift: [0.1, -0.1],
                color: [0.0, 0.0, 1.0],
                applications,
            });
        }

        assert_eq!(queue.drain(&mut exec, &mut state, &params), 4);

        let remaining: Vec<u32> = queue.entries().iter().map(|s| s.applications).collect();
        assert_eq!(remaining, vec![1, 2]);
        assert!((queue.entries()[0].uv[0] - 0.6).abs() < 1e-6);
        assert!((queue.entries()[0].uv[1] - 0.4).abs() < 1e-6);
    }
}
