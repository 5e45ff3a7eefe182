use std::sync::Arc;
use std::time::Instant;
use winit::application::ApplicationHandler;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::config::{SimulationParameters, MAX_SIM_RES, MIN_SIM_RES};
use crate::error::{FluidError, Result};
use crate::gpu::{GpuContext, GpuExecutor, SurfacePresenter};
use crate::simulation::FrameScheduler;

/// Step applied to the pressure iteration count by `[` and `]`
const PRESSURE_ITER_STEP: i32 = 5;

/// Window pixel position to grid uv (y up). `None` for a zero-sized window.
pub fn pointer_uv(position: PhysicalPosition<f64>, size: PhysicalSize<u32>) -> Option<[f32; 2]> {
    if size.width == 0 || size.height == 0 {
        return None;
    }
    Some([
        (position.x / size.width as f64) as f32,
        1.0 - (position.y / size.height as f64) as f32,
    ])
}

/// Halve or double a grid resolution within the supported range
pub fn scaled_resolution(resolution: u32, double: bool) -> u32 {
    let scaled = if double {
        resolution.saturating_mul(2)
    } else {
        resolution / 2
    };
    scaled.clamp(MIN_SIM_RES, MAX_SIM_RES)
}

/// Application state
pub struct App {
    window: Option<Arc<Window>>,
    executor: Option<GpuExecutor>,
    presenter: Option<SurfacePresenter>,
    scheduler: FrameScheduler<GpuExecutor>,
    cursor: Option<PhysicalPosition<f64>>,
    frame_rate: FrameRate,
    error: Option<FluidError>,
}

impl App {
    pub fn new(params: SimulationParameters, seed: Option<u64>) -> Self {
        let scheduler = match seed {
            Some(seed) => FrameScheduler::with_seed(params, seed),
            None => FrameScheduler::new(params),
        };
        Self {
            window: None,
            executor: None,
            presenter: None,
            scheduler,
            cursor: None,
            frame_rate: FrameRate::starting_at(Instant::now()),
            error: None,
        }
    }

    /// Start-up failure that made the event loop exit, if any
    pub fn take_error(&mut self) -> Option<FluidError> {
        self.error.take()
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        log::info!("Initializing Splat Fluid...");

        let window_attrs = Window::default_attributes()
            .with_title("Splat Fluid - Initializing...")
            .with_inner_size(winit::dpi::LogicalSize::new(1024, 1024));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        log::info!("Creating GPU context...");
        let context = pollster::block_on(GpuContext::new(window.clone()))?;

        log::info!("Building kernels...");
        let mut executor = GpuExecutor::new(context);
        let presenter = SurfacePresenter::new(&executor);

        self.scheduler.start(&mut executor);

        log::info!("Initialization complete!");
        log::info!("Controls:");
        log::info!("  Drag: Push fluid and inject dye");
        log::info!("  Space: Spawn random splats");
        log::info!("  P: Pause/resume");
        log::info!("  R: Restart");
        log::info!("  Backspace: Reset parameters and restart");
        log::info!("  A: Toggle velocity arrows");
        log::info!("  [/]: Pressure iterations -/+{}", PRESSURE_ITER_STEP);
        log::info!("  -/=: Halve/double resolution");
        log::info!("  Escape: Quit");

        window.request_redraw();
        self.window = Some(window);
        self.executor = Some(executor);
        self.presenter = Some(presenter);
        Ok(())
    }

    fn render(&mut self) {
        let (Some(executor), Some(presenter)) = (self.executor.as_mut(), self.presenter.as_mut())
        else {
            return;
        };

        let outcome = self.scheduler.tick(executor, presenter);
        log::trace!("Frame {}: {:?}", self.scheduler.frame_number(), outcome);

        let Some(rate) = self.frame_rate.record(Instant::now()) else {
            return;
        };
        if let Some(window) = &self.window {
            let resolution = self.scheduler.fluid().map_or(0, |f| f.resolution());
            window.set_title(&window_title(rate, resolution, self.scheduler.params().paused));
        }
    }

    fn cursor_uv(&self) -> Option<[f32; 2]> {
        let window = self.window.as_ref()?;
        pointer_uv(self.cursor?, window.inner_size())
    }

    fn restart(&mut self) {
        if let Some(executor) = self.executor.as_mut() {
            self.scheduler.restart(executor);
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn handle_key(&mut self, key_code: KeyCode) {
        match key_code {
            KeyCode::Space => self.scheduler.request_spawn(),

            KeyCode::KeyP => self.scheduler.toggle_pause(),

            KeyCode::KeyR => self.restart(),

            KeyCode::Backspace => {
                self.scheduler.params_mut().reset_to_defaults();
                log::info!("Parameters reset to defaults");
                self.restart();
            }

            KeyCode::KeyA => {
                let params = self.scheduler.params_mut();
                params.show_arrows = !params.show_arrows;
                log::info!("Velocity arrows: {}", if params.show_arrows { "ON" } else { "OFF" });
            }

            KeyCode::BracketLeft | KeyCode::BracketRight => {
                let params = self.scheduler.params_mut();
                let step = if key_code == KeyCode::BracketRight {
                    PRESSURE_ITER_STEP
                } else {
                    -PRESSURE_ITER_STEP
                };
                params.pressure_iterations = (params.pressure_iterations + step).max(0);
                log::info!("Pressure iterations: {}", params.pressure_iterations);
            }

            KeyCode::Minus | KeyCode::Equal => {
                let params = self.scheduler.params_mut();
                params.resolution = scaled_resolution(params.resolution, key_code == KeyCode::Equal);
                self.restart();
            }

            _ => {}
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(e) = self.init(event_loop) {
            log::error!("Initialization failed: {}", e);
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting...");
                self.scheduler.stop();
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed() && !event.repeat {
                    if let PhysicalKey::Code(key_code) = event.physical_key {
                        if key_code == KeyCode::Escape {
                            log::info!("Escape pressed, exiting...");
                            self.scheduler.stop();
                            event_loop.exit();
                        } else {
                            self.handle_key(key_code);
                        }
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Some(position);
                if let (Some(uv), Some(executor)) = (self.cursor_uv(), self.executor.as_mut()) {
                    self.scheduler.pointer_move(executor, uv);
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    if let Some(uv) = self.cursor_uv() {
                        self.scheduler.pointer_down(uv);
                    }
                }
                ElementState::Released => self.scheduler.pointer_up(),
            },
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                self.scheduler.pointer_up();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(executor) = &mut self.executor {
                    log::info!("Window resized to {}x{}", new_size.width, new_size.height);
                    executor.context_mut().resize(new_size);
                }
            }
            WindowEvent::RedrawRequested => {
                self.render();
                // Keep going only while a frame is scheduled
                if self.scheduler.frame_pending() {
                    if let Some(window) = &self.window {
                        window.request_redraw();
                    }
                }
            }
            _ => {}
        }
    }
}

/// Frames per second averaged over windows of at least one second
struct FrameRate {
    window_start: Instant,
    frames: u32,
}

impl FrameRate {
    fn starting_at(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
        }
    }

    /// Count a frame finished at `now`; yields the rate when a window closes
    fn record(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start).as_secs_f64();
        if elapsed < 1.0 {
            return None;
        }
        let rate = f64::from(self.frames) / elapsed;
        *self = Self::starting_at(now);
        Some(rate)
    }
}

fn window_title(rate: f64, resolution: u32, paused: bool) -> String {
    let state = if paused { " [Paused]" } else { "" };
    format!("Splat Fluid - {rate:.0} FPS - {resolution}x{resolution}{state}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pointer_uv_flips_y() {
        let size = PhysicalSize::new(200, 100);
        assert_eq!(pointer_uv(PhysicalPosition::new(0.0, 0.0), size), Some([0.0, 1.0]));
        assert_eq!(pointer_uv(PhysicalPosition::new(50.0, 75.0), size), Some([0.25, 0.25]));
        assert_eq!(pointer_uv(PhysicalPosition::new(1.0, 1.0), PhysicalSize::new(0, 10)), None);
    }

    #[test]
    fn test_frame_rate_reports_once_per_window() {
        let start = Instant::now();
        let mut rate = FrameRate::starting_at(start);
        for i in 1..60 {
            assert_eq!(rate.record(start + Duration::from_millis(i * 16)), None);
        }
        let reported = rate.record(start + Duration::from_secs(1)).unwrap();
        assert!((reported - 60.0).abs() < 1e-9);

        // The next window starts empty
        let later = start + Duration::from_millis(1500);
        assert_eq!(rate.record(later), None);
        let reported = rate.record(start + Duration::from_secs(2)).unwrap();
        assert!((reported - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_title_marks_pause() {
        assert_eq!(window_title(59.6, 512, false), "Splat Fluid - 60 FPS - 512x512");
        assert_eq!(window_title(30.0, 64, true), "Splat Fluid - 30 FPS - 64x64 [Paused]");
    }

    #[test]
    fn test_scaled_resolution_clamps() {
        assert_eq!(scaled_resolution(512, true), 1024);
        assert_eq!(scaled_resolution(512, false), 256);
        assert_eq!(scaled_resolution(MAX_SIM_RES, true), MAX_SIM_RES);
        assert_eq!(scaled_resolution(MIN_SIM_RES, false), MIN_SIM_RES);
        assert_eq!(scaled_resolution(u32::MAX, true), MAX_SIM_RES);
    }
}
