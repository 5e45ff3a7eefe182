//! Cooperative frame loop.
//!
//! The host (winit's redraw requests, or the headless driver) calls `tick`
//! once per display refresh. A tick runs one whole frame body and leaves the
//! next frame scheduled; `stop` cancels it. There is exactly one frame body
//! active at a time and nothing is shared across threads.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::SimulationParameters;
use crate::kernel::{CpuExecutor, HostField, KernelExecutor};

use super::{splat_impulse, step, FluidState, PointerHandler, SplatQueue};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
    Paused,
}

/// What a call to `tick` did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// No frame was scheduled
    Cancelled,
    /// Displayed only, time frozen
    Paused,
    /// Queue drained, solver stepped, displayed
    Simulated,
}

/// Read-only view handed to the display pass
pub struct FrameView<'a, F> {
    pub dye: &'a F,
    pub velocity: &'a F,
    pub show_arrows: bool,
    pub arrow_resolution: u32,
}

/// Paints a finished frame
pub trait Presenter<E: KernelExecutor> {
    fn present(&mut self, executor: &mut E, frame: FrameView<'_, E::Field>);
}

pub struct FrameScheduler<E: KernelExecutor> {
    params: SimulationParameters,
    fluid: Option<FluidState<E::Field>>,
    queue: SplatQueue,
    pointer: Option<PointerHandler>,
    frame_pending: bool,
    frame_number: u64,
    rng: StdRng,
}

impl<E: KernelExecutor> FrameScheduler<E> {
    pub fn new(params: SimulationParameters) -> Self {
        Self::with_rng(params, StdRng::from_entropy())
    }

    /// Deterministic splat positions and colors
    pub fn with_seed(params: SimulationParameters, seed: u64) -> Self {
        Self::with_rng(params, StdRng::seed_from_u64(seed))
    }

    fn with_rng(params: SimulationParameters, rng: StdRng) -> Self {
        Self {
            params,
            fluid: None,
            queue: SplatQueue::new(),
            pointer: None,
            frame_pending: false,
            frame_number: 0,
            rng,
        }
    }

    /// Allocate buffers at the configured resolution, attach the pointer
    /// handler and schedule the first frame.
    pub fn start(&mut self, executor: &mut E) {
        if self.fluid.is_some() {
            return;
        }
        let resolution = self.params.resolution.max(1);
        log::info!("Simulation starting ({}x{})", resolution, resolution);

        self.fluid = Some(FluidState::new(executor, resolution));
        self.pointer = Some(PointerHandler::new());
        self.frame_pending = true;
    }

    /// Drop all buffers and pending splats, detach input, cancel the next frame
    pub fn stop(&mut self) {
        if self.fluid.is_none() {
            return;
        }
        log::info!("Simulation stopping after {} frames", self.frame_number);

        self.frame_pending = false;
        self.pointer = None;
        self.queue.clear();
        self.fluid = None;
    }

    /// Full teardown and start; picks up a changed resolution
    pub fn restart(&mut self, executor: &mut E) {
        self.stop();
        self.start(executor);
    }

    pub fn pause(&mut self) {
        self.params.paused = true;
    }

    pub fn resume(&mut self) {
        self.params.paused = false;
    }

    pub fn toggle_pause(&mut self) {
        self.params.paused = !self.params.paused;
        log::info!("Simulation {}", if self.params.paused { "paused" } else { "resumed" });
    }

    /// Ask for a random burst on the next frame
    pub fn request_spawn(&mut self) {
        self.params.spawn_splat = true;
    }

    pub fn state(&self) -> SchedulerState {
        match (&self.fluid, self.params.paused) {
            (None, _) => SchedulerState::Stopped,
            (Some(_), true) => SchedulerState::Paused,
            (Some(_), false) => SchedulerState::Running,
        }
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    /// Parameter store, for input bindings. Changes are picked up by the
    /// next frame; resolution changes need a restart.
    pub fn params_mut(&mut self) -> &mut SimulationParameters {
        &mut self.params
    }

    pub fn fluid(&self) -> Option<&FluidState<E::Field>> {
        self.fluid.as_ref()
    }

    pub fn fluid_mut(&mut self) -> Option<&mut FluidState<E::Field>> {
        self.fluid.as_mut()
    }

    pub fn queue(&self) -> &SplatQueue {
        &self.queue
    }

    pub fn frame_pending(&self) -> bool {
        self.frame_pending
    }

    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn pointer_down(&mut self, uv: [f32; 2]) {
        if let Some(pointer) = self.pointer.as_mut() {
            pointer.pointer_down(uv, &mut self.rng, &self.params);
        }
    }

    /// Drag motion splats straight into velocity and dye, paused or not.
    /// Returns whether a splat was applied.
    pub fn pointer_move(&mut self, executor: &mut E, uv: [f32; 2]) -> bool {
        let (Some(pointer), Some(fluid)) = (self.pointer.as_mut(), self.fluid.as_mut()) else {
            return false;
        };
        match pointer.pointer_move(uv) {
            Some((delta, color)) => {
                splat_impulse(executor, fluid, &self.params, uv, delta, color);
                true
            }
            None => false,
        }
    }

    pub fn pointer_up(&mut self) {
        if let Some(pointer) = self.pointer.as_mut() {
            pointer.pointer_up();
        }
    }

    /// Run one frame body and schedule the next one
    pub fn tick<P: Presenter<E>>(&mut self, executor: &mut E, presenter: &mut P) -> FrameOutcome {
        if !self.frame_pending {
            return FrameOutcome::Cancelled;
        }
        let Some(fluid) = self.fluid.as_mut() else {
            self.frame_pending = false;
            return FrameOutcome::Cancelled;
        };

        let params = self.params.clone();

        // Consumed on paused frames too; the burst then waits undrained
        if params.spawn_splat {
            self.params.spawn_splat = false;
            let count = self.queue.spawn_burst(&mut self.rng, &params);
            log::info!("Spawned {} random splats", count);
        }

        let outcome = if params.paused {
            FrameOutcome::Paused
        } else {
            let applied = self.queue.drain(executor, fluid, &params);
            log::trace!("Frame {}: {} queued splats applied", self.frame_number, applied);

            step(executor, fluid, &params);
            FrameOutcome::Simulated
        };

        presenter.present(
            executor,
            FrameView {
                dye: fluid.dye.read(),
                velocity: fluid.velocity.read(),
                show_arrows: params.show_arrows,
                arrow_resolution: params.arrow_resolution,
            },
        );

        self.frame_number = self.frame_number.wrapping_add(1);
        self.frame_pending = true;
        outcome
    }
}

/// Host-side presenter keeping a copy of the last displayed dye field
#[derive(Debug, Default)]
pub struct FrameCapture {
    frames: u64,
    last_dye: Option<HostField>,
    arrows_shown: u64,
}

impl FrameCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_dye(&self) -> Option<&HostField> {
        self.last_dye.as_ref()
    }

    /// Frames on which the arrows overlay was requested
    pub fn arrows_shown(&self) -> u64 {
        self.arrows_shown
    }
}

impl Presenter<CpuExecutor> for FrameCapture {
    fn present(&mut self, _executor: &mut CpuExecutor, frame: FrameView<'_, HostField>) {
        match self.last_dye.as_mut() {
            Some(dye) if dye.width() == frame.dye.width() => dye.clone_from(frame.dye),
            _ => self.last_dye = Some(frame.dye.clone()),
        }
        if frame.show_arrows {
            self.arrows_shown += 1;
        }
        self.frames += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params(resolution: u32) -> SimulationParameters {
        SimulationParameters {
            resolution,
            splat_radius: 0.1,
            ..Default::default()
        }
    }

    fn started(resolution: u32) -> (FrameScheduler<CpuExecutor>, CpuExecutor) {
        let mut exec = CpuExecutor::new();
        let mut scheduler = FrameScheduler::with_seed(small_params(resolution), 42);
        scheduler.start(&mut exec);
        (scheduler, exec)
    }

    fn drag(scheduler: &mut FrameScheduler<CpuExecutor>, exec: &mut CpuExecutor) {
        scheduler.pointer_down([0.4, 0.5]);
        assert!(scheduler.pointer_move(exec, [0.5, 0.5]));
        scheduler.pointer_up();
    }

    fn snapshot(scheduler: &FrameScheduler<CpuExecutor>) -> Vec<HostField> {
        let fluid = scheduler.fluid().unwrap();
        vec![
            fluid.velocity.read().clone(),
            fluid.dye.read().clone(),
            fluid.pressure.read().clone(),
            fluid.divergence.read().clone(),
        ]
    }

    #[test]
    fn test_lifecycle_states() {
        let mut exec = CpuExecutor::new();
        let mut scheduler = FrameScheduler::<CpuExecutor>::with_seed(small_params(8), 1);
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(!scheduler.frame_pending());

        scheduler.start(&mut exec);
        assert_eq!(scheduler.state(), SchedulerState::Running);
        assert!(scheduler.frame_pending());

        scheduler.pause();
        assert_eq!(scheduler.state(), SchedulerState::Paused);
        assert!(scheduler.frame_pending());

        scheduler.resume();
        assert_eq!(scheduler.state(), SchedulerState::Running);

        scheduler.stop();
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(scheduler.fluid().is_none());
    }

    #[test]
    fn test_stopped_tick_is_cancelled() {
        let (mut scheduler, mut exec) = started(8);
        let mut capture = FrameCapture::new();
        assert_eq!(scheduler.tick(&mut exec, &mut capture), FrameOutcome::Simulated);

        scheduler.stop();
        assert_eq!(scheduler.tick(&mut exec, &mut capture), FrameOutcome::Cancelled);
        assert_eq!(capture.frames(), 1);
    }

    #[test]
    fn test_pointer_ignored_while_stopped() {
        let mut exec = CpuExecutor::new();
        let mut scheduler = FrameScheduler::<CpuExecutor>::with_seed(small_params(8), 1);
        scheduler.pointer_down([0.1, 0.1]);
        assert!(!scheduler.pointer_move(&mut exec, [0.2, 0.2]));
        assert_eq!(exec.passes(), 0);
    }

    #[test]
    fn test_paused_frames_freeze_time() {
        let (mut scheduler, mut exec) = started(16);
        let mut capture = FrameCapture::new();
        drag(&mut scheduler, &mut exec);
        scheduler.request_spawn();
        scheduler.tick(&mut exec, &mut capture);
        assert!(!scheduler.queue().is_empty());

        scheduler.pause();
        let buffers = snapshot(&scheduler);
        let queued = scheduler.queue().entries().to_vec();
        let passes = exec.passes();
        scheduler.tick(&mut exec, &mut capture);
        let displayed = capture.last_dye().unwrap().clone();

        for _ in 0..5 {
            assert_eq!(scheduler.tick(&mut exec, &mut capture), FrameOutcome::Paused);
        }

        assert_eq!(snapshot(&scheduler), buffers);
        assert_eq!(scheduler.queue().entries(), queued.as_slice());
        assert_eq!(exec.passes(), passes);
        assert_eq!(capture.last_dye().unwrap(), &displayed);
        assert_eq!(capture.frames(), 7);
    }

    #[test]
    fn test_spawn_consumed_while_paused() {
        let mut exec = CpuExecutor::new();
        let params = SimulationParameters {
            paused: true,
            ..small_params(8)
        };
        let mut scheduler = FrameScheduler::with_seed(params, 3);
        let mut capture = FrameCapture::new();
        scheduler.start(&mut exec);
        scheduler.request_spawn();
        let buffers = snapshot(&scheduler);

        assert_eq!(scheduler.tick(&mut exec, &mut capture), FrameOutcome::Paused);
        assert!(!scheduler.params().spawn_splat);
        let count = scheduler.queue().len();
        assert!((5..=20).contains(&count), "burst of {count}");

        scheduler.tick(&mut exec, &mut capture);
        scheduler.tick(&mut exec, &mut capture);

        // Queued but never drained while time is frozen
        assert_eq!(scheduler.queue().len(), count);
        assert!(scheduler.queue().entries().iter().all(|s| s.applications == 0));
        assert_eq!(snapshot(&scheduler), buffers);
        assert_eq!(exec.passes(), 0);

        scheduler.resume();
        assert_eq!(scheduler.tick(&mut exec, &mut capture), FrameOutcome::Simulated);
        assert!(scheduler.queue().entries().iter().all(|s| s.applications == 1));
    }

    #[test]
    fn test_drag_applies_while_paused() {
        let (mut scheduler, mut exec) = started(16);
        scheduler.pause();
        drag(&mut scheduler, &mut exec);
        let dye = scheduler.fluid().unwrap().dye.read();
        assert!(dye.cells().iter().any(|c| c[0] > 0.0 || c[1] > 0.0 || c[2] > 0.0));
    }

    #[test]
    fn test_spawn_burst_consumed_once() {
        let (mut scheduler, mut exec) = started(8);
        let mut capture = FrameCapture::new();
        scheduler.request_spawn();

        scheduler.tick(&mut exec, &mut capture);

        let count = scheduler.queue().len();
        assert!((5..=20).contains(&count), "burst of {count}");
        assert!(!scheduler.params().spawn_splat);
        assert!(scheduler.queue().entries().iter().all(|s| s.applications == 1));

        scheduler.tick(&mut exec, &mut capture);
        assert_eq!(scheduler.queue().len(), count);
    }

    #[test]
    fn test_queued_splats_expire_after_three_frames() {
        let (mut scheduler, mut exec) = started(8);
        let mut capture = FrameCapture::new();
        scheduler.request_spawn();

        scheduler.tick(&mut exec, &mut capture);
        scheduler.tick(&mut exec, &mut capture);
        assert!(!scheduler.queue().is_empty());
        scheduler.tick(&mut exec, &mut capture);
        assert!(scheduler.queue().is_empty());

        let passes = exec.passes();
        scheduler.tick(&mut exec, &mut capture);
        // Only the solver ran: 2 advections, divergence, jacobi, gradient, boundary
        let solver_passes = 5 + scheduler.params().pressure_iterations as u64;
        assert_eq!(exec.passes() - passes, solver_passes);
    }

    #[test]
    fn test_restart_with_new_resolution() {
        let (mut scheduler, mut exec) = started(8);
        let mut capture = FrameCapture::new();
        drag(&mut scheduler, &mut exec);
        scheduler.request_spawn();
        scheduler.tick(&mut exec, &mut capture);
        assert!(!scheduler.queue().is_empty());

        scheduler.params_mut().resolution = 12;
        scheduler.restart(&mut exec);

        let fluid = scheduler.fluid().unwrap();
        assert_eq!(fluid.resolution(), 12);
        for field in snapshot(&scheduler) {
            assert_eq!(field.width(), 12);
            assert!(field.cells().iter().all(|c| *c == [0.0; 4]));
        }
        assert!(scheduler.queue().is_empty());
        assert_eq!(scheduler.state(), SchedulerState::Running);
    }

    #[test]
    fn test_arrows_follow_parameters() {
        let (mut scheduler, mut exec) = started(8);
        let mut capture = FrameCapture::new();
        scheduler.tick(&mut exec, &mut capture);
        scheduler.params_mut().show_arrows = true;
        scheduler.tick(&mut exec, &mut capture);
        assert_eq!(capture.arrows_shown(), 1);
    }
}
