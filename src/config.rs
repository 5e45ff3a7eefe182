use crate::error::{FluidError, Result};

// ============================================
// Grid / Dispatch
// ============================================

/// Default grid resolution (512x512 cells)
pub const DEFAULT_SIM_RES: u32 = 512;

/// Resolution limits for the interactive halve/double bindings
pub const MIN_SIM_RES: u32 = 16;
pub const MAX_SIM_RES: u32 = 2048;

/// Compute shader workgroup size
pub const WORKGROUP_SIZE: u32 = 16;

// ============================================
// Solver Parameters
// ============================================

/// Time step per simulated frame
pub const DEFAULT_DT: f32 = 0.0015;

/// Diffusion coefficient applied while advecting velocity
pub const DEFAULT_VISCOSITY: f32 = 0.0001;

/// Multiplicative decay applied to every advected value
pub const DEFAULT_DAMPING: f32 = 0.995;

/// Jacobi relaxation iterations per frame
pub const DEFAULT_PRESSURE_ITER: i32 = 20;

/// Width of the soft boundary region in uv units
pub const DEFAULT_SOFT_BOUNDARY_SIZE: f32 = 0.15;

/// Attenuation applied at the very edge of the grid
pub const DEFAULT_BOUNDARY_STRENGTH: f32 = 0.5;

// ============================================
// Splats
// ============================================

pub const DEFAULT_SPLAT_RADIUS: f32 = 0.02;
pub const DEFAULT_SPLAT_FORCE: f32 = 120.0;

/// Multiplier applied to dye splats
pub const DEFAULT_COLOR_VALUE: i32 = 1;

pub const DEFAULT_RANDOM_COLOR: bool = true;
pub const DEFAULT_SPLAT_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

/// Number of frames a queued splat is re-applied before it is dropped
pub const QUEUED_SPLAT_APPLICATIONS: u32 = 3;

/// Inclusive bounds on the size of a random burst
pub const BURST_MIN: usize = 5;
pub const BURST_MAX: usize = 20;

/// Queued splat drift components are drawn from [-BURST_DRIFT, BURST_DRIFT)
pub const BURST_DRIFT: f32 = 0.025;

// ============================================
// Debug Arrows
// ============================================

pub const DEFAULT_SHOW_ARROWS: bool = false;
pub const DEFAULT_ARROW_RES: u32 = 20;

/// Velocity to arrow length scale (uv units per velocity unit)
pub const ARROW_SCALE: f32 = 0.0001;

/// Live simulation parameters.
///
/// The frame scheduler owns one of these as the parameter store. Input
/// handlers mutate it between frames, every frame works on a clone taken at
/// the top of the frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationParameters {
    /// Grid resolution (square). Only takes effect on restart.
    pub resolution: u32,
    pub dt: f32,
    pub viscosity: f32,
    pub damping: f32,
    /// Negative values behave as zero
    pub pressure_iterations: i32,
    pub soft_boundary_size: f32,
    pub boundary_strength: f32,
    pub splat_radius: f32,
    pub splat_force: f32,
    pub color_value: i32,
    pub show_arrows: bool,
    pub arrow_resolution: u32,
    pub paused: bool,
    pub random_color: bool,
    pub splat_color: [f32; 3],
    /// One-shot burst request, cleared by the scheduler once consumed
    pub spawn_splat: bool,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_SIM_RES,
            dt: DEFAULT_DT,
            viscosity: DEFAULT_VISCOSITY,
            damping: DEFAULT_DAMPING,
            pressure_iterations: DEFAULT_PRESSURE_ITER,
            soft_boundary_size: DEFAULT_SOFT_BOUNDARY_SIZE,
            boundary_strength: DEFAULT_BOUNDARY_STRENGTH,
            splat_radius: DEFAULT_SPLAT_RADIUS,
            splat_force: DEFAULT_SPLAT_FORCE,
            color_value: DEFAULT_COLOR_VALUE,
            show_arrows: DEFAULT_SHOW_ARROWS,
            arrow_resolution: DEFAULT_ARROW_RES,
            paused: false,
            random_color: DEFAULT_RANDOM_COLOR,
            splat_color: DEFAULT_SPLAT_COLOR,
            spawn_splat: false,
        }
    }
}

impl SimulationParameters {
    /// Restore every knob to its default. The pause flag is left alone.
    pub fn reset_to_defaults(&mut self) {
        let paused = self.paused;
        *self = Self::default();
        self.paused = paused;
    }

    /// Size of one cell in uv space
    pub fn texel(&self) -> [f32; 2] {
        let res = self.resolution.max(1) as f32;
        [1.0 / res, 1.0 / res]
    }

    /// Sanity check for values coming from the command line
    pub fn validate(&self) -> Result<()> {
        if self.resolution == 0 || self.resolution > MAX_SIM_RES {
            return Err(FluidError::InvalidConfig(format!(
                "resolution must lie in [1, {}], got {}",
                MAX_SIM_RES, self.resolution
            )));
        }
        let floats = [
            ("dt", self.dt),
            ("viscosity", self.viscosity),
            ("damping", self.damping),
            ("soft boundary size", self.soft_boundary_size),
            ("boundary strength", self.boundary_strength),
            ("splat radius", self.splat_radius),
            ("splat force", self.splat_force),
        ];
        if let Some((name, value)) = floats.iter().find(|(_, v)| !v.is_finite()) {
            return Err(FluidError::InvalidConfig(format!("{name} is not finite: {value}")));
        }
        if self.splat_color.iter().any(|c| !(0.0..=1.0).contains(c)) {
            return Err(FluidError::InvalidConfig(format!(
                "splat color components must lie in [0, 1], got {:?}",
                self.splat_color
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let params = SimulationParameters::default();
        assert_eq!(params.resolution, 512);
        assert_eq!(params.pressure_iterations, 20);
        assert!(!params.spawn_splat);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_reset_keeps_pause_flag() {
        let mut params = SimulationParameters {
            resolution: 64,
            dt: 0.5,
            paused: true,
            ..Default::default()
        };
        params.reset_to_defaults();
        assert_eq!(params.resolution, DEFAULT_SIM_RES);
        assert_eq!(params.dt, DEFAULT_DT);
        assert!(params.paused);
    }

    #[test]
    fn test_texel() {
        let params = SimulationParameters {
            resolution: 4,
            ..Default::default()
        };
        assert_eq!(params.texel(), [0.25, 0.25]);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_res = SimulationParameters {
            resolution: 0,
            ..Default::default()
        };
        assert!(zero_res.validate().is_err());

        let huge_res = SimulationParameters {
            resolution: 65536,
            ..Default::default()
        };
        assert!(huge_res.validate().is_err());
        let max_res = SimulationParameters {
            resolution: MAX_SIM_RES,
            ..Default::default()
        };
        assert!(max_res.validate().is_ok());

        let nan_dt = SimulationParameters {
            dt: f32::NAN,
            ..Default::default()
        };
        assert!(nan_dt.validate().is_err());

        let bright = SimulationParameters {
            splat_color: [1.5, 0.0, 0.0],
            ..Default::default()
        };
        assert!(bright.validate().is_err());
    }
}
