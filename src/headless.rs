//! Windowless run on the host executor.

use crate::config::SimulationParameters;
use crate::error::Result;
use crate::kernel::{CpuExecutor, HostField};
use crate::simulation::{FrameCapture, FrameOutcome, FrameScheduler};

/// Totals after a headless run
#[derive(Clone, Debug, PartialEq)]
pub struct HeadlessReport {
    pub frames: u64,
    pub simulated: u64,
    pub kernel_passes: u64,
    /// Sum of the dye RGB channels over every cell
    pub total_dye: f32,
    /// Sum of the velocity magnitude over every cell
    pub total_speed: f32,
}

fn total_dye(field: &HostField) -> f32 {
    field.cells().iter().map(|c| c[0] + c[1] + c[2]).sum()
}

fn total_speed(field: &HostField) -> f32 {
    field
        .cells()
        .iter()
        .map(|c| (c[0] * c[0] + c[1] * c[1]).sqrt())
        .sum()
}

/// Start a scheduler, request one spawn burst and run `frames` frames.
pub fn run(params: SimulationParameters, frames: u64, seed: Option<u64>) -> Result<HeadlessReport> {
    params.validate()?;

    let mut executor = CpuExecutor::new();
    let mut scheduler = match seed {
        Some(seed) => FrameScheduler::with_seed(params, seed),
        None => FrameScheduler::new(params),
    };
    let mut capture = FrameCapture::new();

    scheduler.start(&mut executor);
    scheduler.request_spawn();

    let mut simulated = 0;
    for _ in 0..frames {
        if scheduler.tick(&mut executor, &mut capture) == FrameOutcome::Simulated {
            simulated += 1;
        }
    }

    let (total_dye, total_speed) = scheduler
        .fluid()
        .map(|fluid| (total_dye(fluid.dye.read()), total_speed(fluid.velocity.read())))
        .unwrap_or_default();

    let report = HeadlessReport {
        frames: capture.frames(),
        simulated,
        kernel_passes: executor.passes(),
        total_dye,
        total_speed,
    };
    log::info!(
        "Headless run: {} frames ({} simulated), {} kernel passes, total dye {:.4}, total speed {:.4}",
        report.frames,
        report.simulated,
        report.kernel_passes,
        report.total_dye,
        report.total_speed
    );

    scheduler.stop();
    Ok(report)
}
