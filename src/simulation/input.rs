use rand::Rng;

use crate::config::SimulationParameters;

use super::splat::random_color;

/// Drag tracking for pointer-driven splats.
///
/// Attached when the scheduler starts and dropped when it stops, so events
/// arriving while stopped never reach the solver.
#[derive(Debug, Default)]
pub struct PointerHandler {
    drag: Option<Drag>,
}

#[derive(Clone, Copy, Debug)]
struct Drag {
    last_uv: [f32; 2],
    color: [f32; 3],
}

impl PointerHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a drag and pick the color used for its whole duration
    pub fn pointer_down<R: Rng>(&mut self, uv: [f32; 2], rng: &mut R, params: &SimulationParameters) {
        let color = if params.random_color {
            random_color(rng)
        } else {
            params.splat_color
        };
        self.drag = Some(Drag { last_uv: uv, color });
    }

    /// Returns the uv delta since the previous position and the drag color,
    /// or `None` when no drag is in progress.
    pub fn pointer_move(&mut self, uv: [f32; 2]) -> Option<([f32; 2], [f32; 3])> {
        let drag = self.drag.as_mut()?;
        let delta = [uv[0] - drag.last_uv[0], uv[1] - drag.last_uv[1]];
        drag.last_uv = uv;
        Some((delta, drag.color))
    }

    /// Pointer released or left the surface
    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_move_without_drag_is_ignored() {
        let mut handler = PointerHandler::new();
        assert!(handler.pointer_move([0.5, 0.5]).is_none());
    }

    #[test]
    fn test_drag_reports_deltas() {
        let mut rng = StdRng::seed_from_u64(3);
        let params = SimulationParameters {
            random_color: false,
            splat_color: [0.1, 0.2, 0.3],
            ..Default::default()
        };
        let mut handler = PointerHandler::new();
        handler.pointer_down([0.25, 0.5], &mut rng, &params);

        let (delta, color) = handler.pointer_move([0.5, 0.75]).unwrap();
        assert_eq!(delta, [0.25, 0.25]);
        assert_eq!(color, [0.1, 0.2, 0.3]);

        let (delta, _) = handler.pointer_move([0.5, 0.5]).unwrap();
        assert_eq!(delta, [0.0, -0.25]);

        handler.pointer_up();
        assert!(!handler.is_dragging());
        assert!(handler.pointer_move([0.0, 0.0]).is_none());
    }

    #[test]
    fn test_random_color_fixed_per_drag() {
        let mut rng = StdRng::seed_from_u64(11);
        let params = SimulationParameters::default();
        let mut handler = PointerHandler::new();
        handler.pointer_down([0.0, 0.0], &mut rng, &params);
        let (_, first) = handler.pointer_move([0.1, 0.0]).unwrap();
        let (_, second) = handler.pointer_move([0.2, 0.0]).unwrap();
        assert_eq!(first, second);
        assert!(first.iter().all(|c| (0.0..1.0).contains(c)));
    }
}
