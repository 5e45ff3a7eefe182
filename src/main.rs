use clap::Parser;
use winit::event_loop::{ControlFlow, EventLoop};

use splat_fluid::app::App;
use splat_fluid::config::SimulationParameters;
use splat_fluid::error::{FluidError, Result};
use splat_fluid::headless;

#[derive(Parser)]
#[command(name = "splat-fluid")]
#[command(version, about = "Real-time 2D stable-fluids playground")]
struct Cli {
    /// Grid resolution (cells per side).
    #[arg(long)]
    resolution: Option<u32>,

    /// Jacobi pressure iterations per frame.
    #[arg(long)]
    pressure_iterations: Option<i32>,

    /// Time step per frame.
    #[arg(long)]
    dt: Option<f32>,

    /// Velocity diffusion coefficient.
    #[arg(long)]
    viscosity: Option<f32>,

    /// Per-frame decay of velocity and dye.
    #[arg(long)]
    damping: Option<f32>,

    /// Splat radius in uv units.
    #[arg(long)]
    splat_radius: Option<f32>,

    /// Multiplier from pointer motion to injected velocity.
    #[arg(long)]
    splat_force: Option<f32>,

    /// Fixed splat color as r,g,b in [0, 1] (disables random colors).
    #[arg(long, value_delimiter = ',')]
    color: Option<Vec<f32>>,

    /// Start paused.
    #[arg(long)]
    paused: bool,

    /// Show velocity arrows.
    #[arg(long)]
    arrows: bool,

    /// Run on the CPU without a window.
    #[arg(long)]
    headless: bool,

    /// Frames to simulate in headless mode.
    #[arg(long, default_value_t = 120)]
    frames: u64,

    /// Seed for splat positions and colors.
    #[arg(long)]
    seed: Option<u64>,
}

impl Cli {
    fn parameters(&self) -> Result<SimulationParameters> {
        let mut params = SimulationParameters::default();
        if let Some(resolution) = self.resolution {
            params.resolution = resolution;
        }
        if let Some(iterations) = self.pressure_iterations {
            params.pressure_iterations = iterations;
        }
        if let Some(dt) = self.dt {
            params.dt = dt;
        }
        if let Some(viscosity) = self.viscosity {
            params.viscosity = viscosity;
        }
        if let Some(damping) = self.damping {
            params.damping = damping;
        }
        if let Some(radius) = self.splat_radius {
            params.splat_radius = radius;
        }
        if let Some(force) = self.splat_force {
            params.splat_force = force;
        }
        if let Some(color) = &self.color {
            let &[r, g, b] = color.as_slice() else {
                return Err(FluidError::InvalidConfig(format!(
                    "--color takes three components, got {}",
                    color.len()
                )));
            };
            params.splat_color = [r, g, b];
            params.random_color = false;
        }
        params.paused = self.paused;
        params.show_arrows = self.arrows;

        params.validate()?;
        Ok(params)
    }
}

fn run_windowed(params: SimulationParameters, seed: Option<u64>) -> Result<()> {
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(params, seed);
    event_loop.run_app(&mut app)?;

    match app.take_error() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = cli.parameters().and_then(|params| {
        log::info!("Grid size: {}x{}", params.resolution, params.resolution);
        if cli.headless {
            headless::run(params, cli.frames, cli.seed).map(|_| ())
        } else {
            run_windowed(params, cli.seed)
        }
    });

    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}
