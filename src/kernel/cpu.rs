use rayon::prelude::*;

use super::{Kernel, KernelExecutor, Uniforms};

/// Host-resident grid field, one `[f32; 4]` per cell, row-major with y up.
#[derive(Clone, Debug, PartialEq)]
pub struct HostField {
    width: u32,
    height: u32,
    cells: Vec<[f32; 4]>,
}

impl HostField {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![[0.0; 4]; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cells(&self) -> &[[f32; 4]] {
        &self.cells
    }

    pub fn get(&self, x: u32, y: u32) -> [f32; 4] {
        self.cells[y as usize * self.width as usize + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: [f32; 4]) {
        let idx = y as usize * self.width as usize + x as usize;
        self.cells[idx] = value;
    }

    pub fn fill(&mut self, value: [f32; 4]) {
        self.cells.fill(value);
    }

    /// Cell lookup with clamp-to-edge addressing
    fn fetch(&self, x: i64, y: i64) -> [f32; 4] {
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        self.get(x, y)
    }

    /// Bilinear sample at a uv position, clamped to the edge cells
    fn sample(&self, u: f32, v: f32) -> [f32; 4] {
        let x = u * self.width as f32 - 0.5;
        let y = v * self.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let a = self.fetch(x0, y0);
        let b = self.fetch(x0 + 1, y0);
        let c = self.fetch(x0, y0 + 1);
        let d = self.fetch(x0 + 1, y0 + 1);
        std::array::from_fn(|k| {
            let bottom = a[k] + (b[k] - a[k]) * fx;
            let top = c[k] + (d[k] - c[k]) * fx;
            bottom + (top - bottom) * fy
        })
    }

    /// uv coordinate of a cell center
    fn cell_uv(&self, x: u32, y: u32) -> [f32; 2] {
        [
            (x as f32 + 0.5) / self.width as f32,
            (y as f32 + 0.5) / self.height as f32,
        ]
    }
}

/// Reference executor running every kernel on the host, rows in parallel.
#[derive(Debug, Default)]
pub struct CpuExecutor {
    passes: u64,
}

impl CpuExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of kernel calls that actually executed
    pub fn passes(&self) -> u64 {
        self.passes
    }
}

impl KernelExecutor for CpuExecutor {
    type Field = HostField;

    fn create_field(&mut self, label: &str, width: u32, height: u32) -> HostField {
        log::trace!("Allocating host field '{}' ({}x{})", label, width, height);
        HostField::new(width, height)
    }

    fn run_kernel(
        &mut self,
        kernel: Kernel,
        inputs: &[&HostField],
        uniforms: &Uniforms,
        output: &mut HostField,
    ) {
        if let Err(e) = kernel.validate(inputs.len(), uniforms) {
            log::warn!("{}", e);
            return;
        }
        if let Some(bad) = inputs
            .iter()
            .find(|f| f.width != output.width || f.height != output.height)
        {
            log::warn!(
                "{}: input is {}x{} but output is {}x{}, skipping pass",
                kernel.name(),
                bad.width,
                bad.height,
                output.width,
                output.height
            );
            return;
        }

        match kernel {
            Kernel::Advect => advect(inputs[0], inputs[1], uniforms, output),
            Kernel::Divergence => divergence(inputs[0], output),
            Kernel::Pressure => jacobi(inputs[0], inputs[1], output),
            Kernel::Gradient => subtract_gradient(inputs[0], inputs[1], output),
            Kernel::Splat => splat(inputs[0], uniforms, output),
            Kernel::Boundary => boundary(inputs[0], uniforms, output),
        }
        self.passes += 1;
    }
}

/// Evaluate `cell` for every (x, y) of `output`
fn dispatch<F>(output: &mut HostField, cell: F)
where
    F: Fn(u32, u32) -> [f32; 4] + Sync,
{
    let width = output.width as usize;
    output
        .cells
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, value) in row.iter_mut().enumerate() {
                *value = cell(x as u32, y as u32);
            }
        });
}

/// Attenuation from the inline advection boundary: quadratic ramp over `soft`
fn inline_edge_factor(uv: [f32; 2], soft: f32, strength: f32) -> f32 {
    if soft <= 0.0 {
        return 1.0;
    }
    let d = uv[0].min(uv[1]).min(1.0 - uv[0]).min(1.0 - uv[1]);
    let falloff = (1.0 - d / soft).clamp(0.0, 1.0);
    1.0 - strength * falloff * falloff
}

/// Attenuation of the normal component at distance `d` from one edge
fn edge_attenuation(d: f32, soft: f32, strength: f32) -> f32 {
    if soft <= 0.0 || d >= soft {
        return 1.0;
    }
    1.0 - strength * (1.0 - d.max(0.0) / soft)
}

fn advect(source: &HostField, velocity: &HostField, u: &Uniforms, output: &mut HostField) {
    let dt = u.get_float("Dt").unwrap_or_default();
    let damping = u.get_float("Damping").unwrap_or_default();
    let viscosity = u.get_float("Viscosity").unwrap_or_default();
    let texel = u.get_vec2("Texel").unwrap_or_default();
    let soft = u.get_float("SoftSize").unwrap_or_default();
    let strength = u.get_float("BoundaryStrength").unwrap_or_default();
    let is_velocity = u.get_int("IsVelocity").unwrap_or_default() != 0;

    dispatch(output, |x, y| {
        let uv = source.cell_uv(x, y);
        let vel = velocity.get(x, y);
        let back_u = uv[0] - dt * vel[0] * texel[0];
        let back_v = uv[1] - dt * vel[1] * texel[1];
        let mut value = source.sample(back_u, back_v).map(|c| c * damping);

        if is_velocity {
            let (xi, yi) = (x as i64, y as i64);
            let center = source.fetch(xi, yi);
            let l = source.fetch(xi - 1, yi);
            let r = source.fetch(xi + 1, yi);
            let b = source.fetch(xi, yi - 1);
            let t = source.fetch(xi, yi + 1);
            for k in 0..4 {
                value[k] += viscosity * (l[k] + r[k] + b[k] + t[k] - 4.0 * center[k]);
            }
        }

        // Both fields fade near the walls
        let edge = inline_edge_factor(uv, soft, strength);
        value.map(|c| c * edge)
    });
}

fn divergence(velocity: &HostField, output: &mut HostField) {
    dispatch(output, |x, y| {
        let (xi, yi) = (x as i64, y as i64);
        let l = velocity.fetch(xi - 1, yi)[0];
        let r = velocity.fetch(xi + 1, yi)[0];
        let b = velocity.fetch(xi, yi - 1)[1];
        let t = velocity.fetch(xi, yi + 1)[1];
        [0.5 * ((r - l) + (t - b)), 0.0, 0.0, 0.0]
    });
}

fn jacobi(pressure: &HostField, divergence: &HostField, output: &mut HostField) {
    dispatch(output, |x, y| {
        let (xi, yi) = (x as i64, y as i64);
        let sum = pressure.fetch(xi - 1, yi)[0]
            + pressure.fetch(xi + 1, yi)[0]
            + pressure.fetch(xi, yi - 1)[0]
            + pressure.fetch(xi, yi + 1)[0];
        [(sum - divergence.get(x, y)[0]) * 0.25, 0.0, 0.0, 0.0]
    });
}

fn subtract_gradient(velocity: &HostField, pressure: &HostField, output: &mut HostField) {
    dispatch(output, |x, y| {
        let (xi, yi) = (x as i64, y as i64);
        let l = pressure.fetch(xi - 1, yi)[0];
        let r = pressure.fetch(xi + 1, yi)[0];
        let b = pressure.fetch(xi, yi - 1)[0];
        let t = pressure.fetch(xi, yi + 1)[0];
        let mut vel = velocity.get(x, y);
        vel[0] -= 0.5 * (r - l);
        vel[1] -= 0.5 * (t - b);
        vel
    });
}

fn splat(old: &HostField, u: &Uniforms, output: &mut HostField) {
    let point = u.get_vec2("point").unwrap_or_default();
    let color = u.get_vec3("color").unwrap_or_default();
    let radius = u.get_float("radius").unwrap_or_default();
    let is_color = u.get_int("isColor").unwrap_or_default();
    let scale = if is_color != 0 { is_color as f32 } else { 1.0 };

    dispatch(output, |x, y| {
        let mut value = old.get(x, y);
        if radius > 0.0 {
            let uv = old.cell_uv(x, y);
            let dx = uv[0] - point[0];
            let dy = uv[1] - point[1];
            let weight = (-(dx * dx + dy * dy) / (radius * radius)).exp();
            for k in 0..3 {
                value[k] += color[k] * scale * weight;
            }
        }
        value
    });
}

fn boundary(velocity: &HostField, u: &Uniforms, output: &mut HostField) {
    let soft = u.get_float("SoftSize").unwrap_or_default();
    let strength = u.get_float("BoundaryStrength").unwrap_or_default();

    dispatch(output, |x, y| {
        let uv = velocity.cell_uv(x, y);
        let mut vel = velocity.get(x, y);
        vel[0] *= edge_attenuation(uv[0], soft, strength)
            * edge_attenuation(1.0 - uv[0], soft, strength);
        vel[1] *= edge_attenuation(uv[1], soft, strength)
            * edge_attenuation(1.0 - uv[1], soft, strength);
        vel
    });
}
