//! Layered structures and the solve entry points.

use crate::config::SolverConfig;
use crate::domain::{DiffractionRegime, GeometryResult, RcwaError, SolveResult};
use crate::efficiency::{DiffractionEfficiencyTable, FieldAmplitudes};
use crate::illumination::IlluminationContext;
use crate::material::Material;
use crate::modes::ModeSummary;
use crate::numerics::{relatively_close, EigenSolver, QrEigenSolver};
use crate::propagator::Propagator;
use crate::slab::Slab;
use crate::smatrix::ScatteringMatrix;
use num_complex::Complex64;
use serde::Serialize;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

const PITCH_RELATIVE_TOLERANCE: f64 = 1.0e-9;

/// A slab extruded along the stack normal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    slab: Slab,
    thickness: f64,
}

impl Layer {
    pub fn new(slab: Slab, thickness: f64) -> GeometryResult<Self> {
        validate_thickness(thickness)?;
        Ok(Self { slab, thickness })
    }

    /// Unpatterned layer; also the usual way to build a half-space.
    pub fn homogeneous(material: &Material, pitch: f64, thickness: f64) -> GeometryResult<Self> {
        Self::new(Slab::homogeneous(material, pitch)?, thickness)
    }

    pub fn slab(&self) -> &Slab {
        &self.slab
    }

    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn is_lossless(&self) -> bool {
        self.slab.is_lossless()
    }
}

fn validate_thickness(thickness: f64) -> GeometryResult<()> {
    if !thickness.is_finite() || thickness < 0.0 {
        return Err(RcwaError::invalid_geometry(
            "GEOMETRY.LAYER_THICKNESS",
            format!("layer thickness must be finite and non-negative, got {thickness}"),
        ));
    }
    Ok(())
}

/// Ordered layers from the incident half-space down to the substrate.
///
/// The first and last layers are semi-infinite; their thickness is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Stack {
    layers: Vec<Layer>,
    incident: Complex64,
    substrate: Complex64,
}

impl Stack {
    pub fn new(layers: impl IntoIterator<Item = Layer>) -> GeometryResult<Self> {
        let layers: Vec<Layer> = layers.into_iter().collect();
        if layers.len() < 2 {
            return Err(RcwaError::empty_stack(
                "GEOMETRY.STACK_LENGTH",
                format!(
                    "a stack needs an incident half-space and a substrate, got {} layer(s)",
                    layers.len()
                ),
            ));
        }

        let incident = half_space_permittivity(&layers[0], "incident")?;
        let substrate = half_space_permittivity(&layers[layers.len() - 1], "substrate")?;
        if incident.im != 0.0 || incident.re <= 0.0 {
            return Err(RcwaError::invalid_half_space(
                "GEOMETRY.HALF_SPACE",
                format!("incident half-space must be lossless with positive permittivity, got {incident}"),
            ));
        }

        let pitch = layers[0].slab().pitch();
        for (index, layer) in layers.iter().enumerate().skip(1) {
            let other = layer.slab().pitch();
            if !relatively_close(other, pitch, PITCH_RELATIVE_TOLERANCE) {
                return Err(RcwaError::invalid_geometry(
                    "GEOMETRY.STACK_PITCH",
                    format!("layer {index} has pitch {other}, the stack pitch is {pitch}"),
                ));
            }
        }

        Ok(Self {
            layers,
            incident,
            substrate,
        })
    }

    pub fn builder() -> StackBuilder {
        StackBuilder::default()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn pitch(&self) -> f64 {
        self.layers[0].slab().pitch()
    }

    pub fn incident_permittivity(&self) -> Complex64 {
        self.incident
    }

    pub fn substrate_permittivity(&self) -> Complex64 {
        self.substrate
    }

    pub fn is_lossless(&self) -> bool {
        self.layers.iter().all(Layer::is_lossless)
    }

    /// Replaces the thickness of layer `index` in place. Solutions computed
    /// earlier keep their own copy of the geometry.
    pub fn set_thickness(&mut self, index: usize, thickness: f64) -> GeometryResult<()> {
        validate_thickness(thickness)?;
        let count = self.layers.len();
        let layer = self.layers.get_mut(index).ok_or_else(|| {
            RcwaError::invalid_geometry(
                "GEOMETRY.LAYER_INDEX",
                format!("layer index {index} is out of range for a stack of {count}"),
            )
        })?;
        layer.thickness = thickness;
        Ok(())
    }

    /// Solves with default settings and the built-in eigen backend.
    pub fn calc(&self, context: &IlluminationContext) -> SolveResult<SolvedStack> {
        Solver::default().solve(self, context)
    }

    pub fn calc_with(
        &self,
        context: &IlluminationContext,
        solver: &Solver,
    ) -> SolveResult<SolvedStack> {
        solver.solve(self, context)
    }
}

fn half_space_permittivity(layer: &Layer, which: &str) -> GeometryResult<Complex64> {
    match layer.slab().uniform_material() {
        Some(material) if material.is_isotropic() => Ok(material.permittivity().xx()),
        Some(_) => Err(RcwaError::invalid_half_space(
            "GEOMETRY.HALF_SPACE",
            format!("{which} half-space must be isotropic"),
        )),
        None => Err(RcwaError::invalid_half_space(
            "GEOMETRY.HALF_SPACE",
            format!("{which} half-space must be homogeneous"),
        )),
    }
}

#[derive(Debug, Clone, Default)]
pub struct StackBuilder {
    layers: Vec<Layer>,
}

impl StackBuilder {
    pub fn layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn layers(mut self, layers: impl IntoIterator<Item = Layer>) -> Self {
        self.layers.extend(layers);
        self
    }

    pub fn build(self) -> GeometryResult<Stack> {
        Stack::new(self.layers)
    }
}

/// Solve settings plus the eigen backend used for patterned layers.
#[derive(Clone)]
pub struct Solver {
    config: SolverConfig,
    backend: Arc<dyn EigenSolver>,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl Debug for Solver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solver")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Solver {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            config,
            backend: Arc::new(QrEigenSolver),
        }
    }

    pub fn with_backend(mut self, backend: impl EigenSolver + 'static) -> Self {
        self.backend = Arc::new(backend);
        self
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn EigenSolver {
        self.backend.as_ref()
    }

    pub fn propagator<'a>(
        &'a self,
        stack: &'a Stack,
        context: &'a IlluminationContext,
    ) -> Propagator<'a> {
        Propagator::new(stack, context, self)
    }

    pub fn solve(&self, stack: &Stack, context: &IlluminationContext) -> SolveResult<SolvedStack> {
        let span = tracing::debug_span!(
            "rcwa.calc",
            orders = context.order_count(),
            layers = stack.layer_count(),
            regime = ?context.regime(),
            backend = self.backend.name(),
        );
        let _guard = span.enter();
        self.propagator(stack, context).run()
    }
}

/// Immutable outcome of one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolvedStack {
    illumination: IlluminationContext,
    regime: DiffractionRegime,
    layer_modes: Vec<ModeSummary>,
    scattering: ScatteringMatrix,
    reflected: FieldAmplitudes,
    transmitted: FieldAmplitudes,
    efficiencies: DiffractionEfficiencyTable,
}

impl SolvedStack {
    pub(crate) fn new(
        illumination: IlluminationContext,
        regime: DiffractionRegime,
        layer_modes: Vec<ModeSummary>,
        scattering: ScatteringMatrix,
        reflected: FieldAmplitudes,
        transmitted: FieldAmplitudes,
        efficiencies: DiffractionEfficiencyTable,
    ) -> Self {
        Self {
            illumination,
            regime,
            layer_modes,
            scattering,
            reflected,
            transmitted,
            efficiencies,
        }
    }

    pub fn illumination(&self) -> &IlluminationContext {
        &self.illumination
    }

    pub fn regime(&self) -> DiffractionRegime {
        self.regime
    }

    /// One entry per stack layer, half-spaces included.
    pub fn layer_modes(&self) -> &[ModeSummary] {
        &self.layer_modes
    }

    pub fn scattering_matrix(&self) -> &ScatteringMatrix {
        &self.scattering
    }

    pub fn reflected_field(&self) -> &FieldAmplitudes {
        &self.reflected
    }

    pub fn transmitted_field(&self) -> &FieldAmplitudes {
        &self.transmitted
    }

    pub fn diffraction_efficiencies(&self) -> &DiffractionEfficiencyTable {
        &self.efficiencies
    }

    /// `1 - ΣR - ΣT`.
    pub fn absorbance(&self) -> f64 {
        1.0 - self.efficiencies.energy_sum()
    }
}
