//! Kernel interface shared by the GPU and host executors.
//!
//! A kernel declares its named inputs (grid fields, bound in order) and its
//! named uniforms (packed in order using WGSL uniform layout rules). An
//! executor runs one kernel over every cell of the output field.

mod cpu;

pub use cpu::{CpuExecutor, HostField};

use crate::error::{FluidError, Result};

/// Compute passes the solver is built from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kernel {
    Advect,
    Divergence,
    Pressure,
    Gradient,
    Splat,
    Boundary,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Int,
    Vec2,
    Vec3,
}

impl UniformKind {
    /// (alignment, size) in bytes for the uniform address space
    fn layout(self) -> (usize, usize) {
        match self {
            UniformKind::Float | UniformKind::Int => (4, 4),
            UniformKind::Vec2 => (8, 8),
            UniformKind::Vec3 => (16, 12),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformDecl {
    pub name: &'static str,
    pub kind: UniformKind,
}

const fn decl(name: &'static str, kind: UniformKind) -> UniformDecl {
    UniformDecl { name, kind }
}

const TEXEL_ONLY: &[UniformDecl] = &[decl("Texel", UniformKind::Vec2)];

const ADVECT_UNIFORMS: &[UniformDecl] = &[
    decl("Dt", UniformKind::Float),
    decl("Damping", UniformKind::Float),
    decl("Viscosity", UniformKind::Float),
    decl("Texel", UniformKind::Vec2),
    decl("SoftSize", UniformKind::Float),
    decl("BoundaryStrength", UniformKind::Float),
    decl("IsVelocity", UniformKind::Int),
];

const SPLAT_UNIFORMS: &[UniformDecl] = &[
    decl("point", UniformKind::Vec2),
    decl("color", UniformKind::Vec3),
    decl("radius", UniformKind::Float),
    decl("isColor", UniformKind::Int),
];

const BOUNDARY_UNIFORMS: &[UniformDecl] = &[
    decl("SoftSize", UniformKind::Float),
    decl("BoundaryStrength", UniformKind::Float),
];

impl Kernel {
    pub const ALL: [Kernel; 6] = [
        Kernel::Advect,
        Kernel::Divergence,
        Kernel::Pressure,
        Kernel::Gradient,
        Kernel::Splat,
        Kernel::Boundary,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Kernel::Advect => "Advect",
            Kernel::Divergence => "Divergence",
            Kernel::Pressure => "Pressure",
            Kernel::Gradient => "Gradient",
            Kernel::Splat => "Splat",
            Kernel::Boundary => "Boundary",
        }
    }

    /// Input fields, in binding order
    pub fn inputs(self) -> &'static [&'static str] {
        match self {
            Kernel::Advect => &["Source", "Velocity"],
            Kernel::Divergence => &["Velocity"],
            Kernel::Pressure => &["Pressure", "Divergence"],
            Kernel::Gradient => &["Velocity", "Pressure"],
            Kernel::Splat => &["oldTexture"],
            Kernel::Boundary => &["Velocity"],
        }
    }

    /// Uniforms, in packing order
    pub fn uniforms(self) -> &'static [UniformDecl] {
        match self {
            Kernel::Advect => ADVECT_UNIFORMS,
            Kernel::Divergence | Kernel::Pressure | Kernel::Gradient => TEXEL_ONLY,
            Kernel::Splat => SPLAT_UNIFORMS,
            Kernel::Boundary => BOUNDARY_UNIFORMS,
        }
    }

    /// Check a call against the declared interface
    pub fn validate(self, input_count: usize, uniforms: &Uniforms) -> Result<()> {
        let mismatch = |reason: String| FluidError::KernelInterface {
            kernel: self.name(),
            reason,
        };
        if input_count != self.inputs().len() {
            return Err(mismatch(format!(
                "expected {} inputs, got {}",
                self.inputs().len(),
                input_count
            )));
        }
        for decl in self.uniforms() {
            match uniforms.get(decl.name) {
                Some(value) if value.kind() == decl.kind => {}
                Some(value) => {
                    return Err(mismatch(format!(
                        "uniform '{}' declared {:?}, got {:?}",
                        decl.name,
                        decl.kind,
                        value.kind()
                    )))
                }
                None => return Err(mismatch(format!("uniform '{}' not set", decl.name))),
            }
        }
        Ok(())
    }

    /// Pack the uniforms into a buffer matching the kernel's WGSL params struct.
    pub fn pack_uniforms(self, uniforms: &Uniforms) -> Result<Vec<u8>> {
        self.validate(self.inputs().len(), uniforms)?;

        let mut bytes = Vec::with_capacity(64);
        for decl in self.uniforms() {
            let (align, _) = decl.kind.layout();
            bytes.resize(align_up(bytes.len(), align), 0);
            match uniforms.get(decl.name) {
                Some(UniformValue::Float(v)) => bytes.extend_from_slice(bytemuck::bytes_of(&v)),
                Some(UniformValue::Int(v)) => bytes.extend_from_slice(bytemuck::bytes_of(&v)),
                Some(UniformValue::Vec2(v)) => bytes.extend_from_slice(bytemuck::cast_slice(&v)),
                Some(UniformValue::Vec3(v)) => bytes.extend_from_slice(bytemuck::cast_slice(&v)),
                None => unreachable!("validated above"),
            }
        }
        // Uniform bindings are sized in 16 byte steps
        bytes.resize(align_up(bytes.len().max(1), 16), 0);
        Ok(bytes)
    }
}

fn align_up(offset: usize, align: usize) -> usize {
    (offset + align - 1) / align * align
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
        }
    }
}

/// Named uniform values for one kernel call
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Uniforms {
    values: Vec<(&'static str, UniformValue)>,
}

impl Uniforms {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &'static str, value: UniformValue) -> Self {
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
        self
    }

    pub fn float(self, name: &'static str, value: f32) -> Self {
        self.set(name, UniformValue::Float(value))
    }

    pub fn int(self, name: &'static str, value: i32) -> Self {
        self.set(name, UniformValue::Int(value))
    }

    pub fn vec2(self, name: &'static str, value: [f32; 2]) -> Self {
        self.set(name, UniformValue::Vec2(value))
    }

    pub fn vec3(self, name: &'static str, value: [f32; 3]) -> Self {
        self.set(name, UniformValue::Vec3(value))
    }

    pub fn get(&self, name: &str) -> Option<UniformValue> {
        self.values.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    pub fn get_float(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            UniformValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_int(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            UniformValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_vec2(&self, name: &str) -> Option<[f32; 2]> {
        match self.get(name)? {
            UniformValue::Vec2(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_vec3(&self, name: &str) -> Option<[f32; 3]> {
        match self.get(name)? {
            UniformValue::Vec3(v) => Some(v),
            _ => None,
        }
    }
}

/// Runs one kernel over a whole grid field.
///
/// `run_kernel` reads `inputs`, writes every cell of `output` and nothing
/// else. A call whose inputs or uniforms don't match the kernel declaration,
/// or whose kernel failed to build, logs and leaves `output` untouched.
pub trait KernelExecutor {
    type Field;

    /// Allocate a zeroed field
    fn create_field(&mut self, label: &str, width: u32, height: u32) -> Self::Field;

    fn run_kernel(
        &mut self,
        kernel: Kernel,
        inputs: &[&Self::Field],
        uniforms: &Uniforms,
        output: &mut Self::Field,
    );
}
