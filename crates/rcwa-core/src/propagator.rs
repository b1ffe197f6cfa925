//! Boundary matching across a layer stack.
//!
//! A solve walks `Uninitialized -> HalfSpacesBound -> LayersPropagated ->
//! BoundaryMatched`; any error parks the propagator in `Failed`.

use crate::domain::{DiffractionRegime, RcwaError, SolveResult};
use crate::efficiency::{extract_efficiencies, FieldAmplitudes, OutgoingField};
use crate::illumination::IlluminationContext;
use crate::modes::{
    gap_modes, layer_modes, off_grazing_wavevectors, uniform_modes, LayerModes, ModeSummary,
    TransverseWavevectors,
};
use crate::numerics::dense::{matvec, ZERO};
use crate::smatrix::{CheckedInverse, ScatteringMatrix};
use crate::stack::{SolvedStack, Solver, Stack};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::mem;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PropagatorState {
    Uninitialized,
    HalfSpacesBound,
    LayersPropagated,
    BoundaryMatched,
    Failed,
}

struct BoundHalfSpaces {
    waves: TransverseWavevectors,
    regime: DiffractionRegime,
    gap: LayerModes,
    incident_kz: f64,
    kz_reflected: Vec<Complex64>,
    kz_transmitted: Vec<Complex64>,
    reflection: ScatteringMatrix,
    transmission: ScatteringMatrix,
    summaries: Vec<ModeSummary>,
    substrate_summary: ModeSummary,
}

enum Stage {
    Uninitialized,
    HalfSpacesBound(Box<BoundHalfSpaces>),
    LayersPropagated(Box<BoundHalfSpaces>, ScatteringMatrix),
    BoundaryMatched,
    Failed,
}

pub struct Propagator<'a> {
    stack: &'a Stack,
    context: &'a IlluminationContext,
    solver: &'a Solver,
    stage: Stage,
}

impl<'a> Propagator<'a> {
    pub fn new(stack: &'a Stack, context: &'a IlluminationContext, solver: &'a Solver) -> Self {
        Self {
            stack,
            context,
            solver,
            stage: Stage::Uninitialized,
        }
    }

    pub fn state(&self) -> PropagatorState {
        match self.stage {
            Stage::Uninitialized => PropagatorState::Uninitialized,
            Stage::HalfSpacesBound(_) => PropagatorState::HalfSpacesBound,
            Stage::LayersPropagated(..) => PropagatorState::LayersPropagated,
            Stage::BoundaryMatched => PropagatorState::BoundaryMatched,
            Stage::Failed => PropagatorState::Failed,
        }
    }

    /// Performs one transition. Returns the solution once boundaries are
    /// matched.
    pub fn step(&mut self) -> SolveResult<Option<SolvedStack>> {
        let from = self.state();
        let outcome = self.advance();
        match &outcome {
            Ok(_) => tracing::trace!(from = ?from, to = ?self.state(), "propagator transition"),
            Err(error) => tracing::debug!(from = ?from, error = %error, "propagator failed"),
        }
        outcome
    }

    pub fn run(mut self) -> SolveResult<SolvedStack> {
        loop {
            if let Some(solved) = self.step()? {
                return Ok(solved);
            }
        }
    }

    fn advance(&mut self) -> SolveResult<Option<SolvedStack>> {
        match mem::replace(&mut self.stage, Stage::Failed) {
            Stage::Uninitialized => {
                let bound = self.bind_half_spaces()?;
                self.stage = Stage::HalfSpacesBound(Box::new(bound));
                Ok(None)
            }
            Stage::HalfSpacesBound(mut bound) => {
                let global = self.propagate_layers(&mut bound)?;
                self.stage = Stage::LayersPropagated(bound, global);
                Ok(None)
            }
            Stage::LayersPropagated(bound, global) => {
                let solved = self.match_boundaries(*bound, global)?;
                self.stage = Stage::BoundaryMatched;
                Ok(Some(solved))
            }
            finished @ (Stage::BoundaryMatched | Stage::Failed) => {
                let state = match &finished {
                    Stage::BoundaryMatched => PropagatorState::BoundaryMatched,
                    _ => PropagatorState::Failed,
                };
                self.stage = finished;
                Err(RcwaError::ill_conditioned(
                    "SOLVE.PROPAGATOR_STATE",
                    format!("propagator cannot advance from {state:?}"),
                ))
            }
        }
    }

    fn inverse(&self, context: &'static str) -> CheckedInverse<'static> {
        CheckedInverse {
            tolerance: self.solver.config().residual_tolerance,
            context,
        }
    }

    fn bind_half_spaces(&self) -> SolveResult<BoundHalfSpaces> {
        let incident = self.stack.incident_permittivity();
        let substrate = self.stack.substrate_permittivity();
        let incident_index = incident.re.sqrt();

        let (kx, ky) = self
            .context
            .tangential_wavevectors(incident_index, self.stack.pitch());
        let waves = TransverseWavevectors::new(kx, ky);
        let regime = self.context.regime();
        let gap = gap_modes(&waves);

        let reflected_modes = uniform_modes(incident, &waves);
        let transmitted_modes = uniform_modes(substrate, &waves);
        let reflection = ScatteringMatrix::reflection_side(
            &gap,
            &reflected_modes,
            self.inverse("incident half-space"),
        )?;
        let transmission = ScatteringMatrix::transmission_side(
            &gap,
            &transmitted_modes,
            self.inverse("substrate half-space"),
        )?;

        Ok(BoundHalfSpaces {
            kz_reflected: off_grazing_wavevectors(incident, &waves),
            kz_transmitted: off_grazing_wavevectors(substrate, &waves),
            incident_kz: self.context.incident_normal_wavevector(incident_index),
            waves,
            regime,
            gap,
            reflection,
            transmission,
            summaries: vec![reflected_modes.summary()],
            substrate_summary: transmitted_modes.summary(),
        })
    }

    fn propagate_layers(&self, bound: &mut BoundHalfSpaces) -> SolveResult<ScatteringMatrix> {
        let wavenumber = self.context.free_space_wavenumber();
        let config = self.solver.config();
        let layers = self.stack.layers();
        let mut global = bound.reflection.clone();

        for (index, layer) in layers.iter().enumerate().take(layers.len() - 1).skip(1) {
            let modes = layer_modes(
                layer.slab(),
                &bound.waves,
                bound.regime,
                self.solver.backend(),
                config,
                index,
            )?;
            let scattering = ScatteringMatrix::layer(
                &modes,
                &bound.gap,
                wavenumber * layer.thickness(),
                self.inverse("layer scattering matrix"),
            )?;
            global = global.star_checked(&scattering, self.inverse("star product"))?;
            tracing::trace!(
                layer = index,
                kind = ?modes.kind(),
                modes = modes.mode_count(),
                thickness = layer.thickness(),
                "layer propagated"
            );
            bound.summaries.push(modes.summary());
        }

        Ok(global)
    }

    fn match_boundaries(
        &self,
        bound: BoundHalfSpaces,
        global: ScatteringMatrix,
    ) -> SolveResult<SolvedStack> {
        let config = self.solver.config();
        let global = global.star_checked(&bound.transmission, self.inverse("star product"))?;
        if !global.is_finite() {
            return Err(RcwaError::ill_conditioned(
                "SOLVE.SMATRIX",
                "global scattering matrix has non-finite entries",
            ));
        }

        let size = bound.waves.harmonic_count();
        let zeroth = self.context.order_count();
        let [ux, uy, _] = self.context.polarization_vector();
        let mut source = vec![ZERO; 2 * size];
        source[zeroth] = Complex64::new(ux, 0.0);
        source[size + zeroth] = Complex64::new(uy, 0.0);

        let reflected = outgoing_field(
            &matvec(global.s11(), &source),
            &bound.waves,
            &bound.kz_reflected,
            -1.0,
        );
        let transmitted = outgoing_field(
            &matvec(global.s21(), &source),
            &bound.waves,
            &bound.kz_transmitted,
            1.0,
        );
        if !reflected.is_finite() || !transmitted.is_finite() {
            return Err(RcwaError::ill_conditioned(
                "SOLVE.AMPLITUDES",
                "diffracted amplitudes are not finite",
            ));
        }

        let efficiencies = extract_efficiencies(
            self.context.order_count(),
            bound.incident_kz,
            OutgoingField {
                amplitudes: &reflected,
                kz: &bound.kz_reflected,
            },
            OutgoingField {
                amplitudes: &transmitted,
                kz: &bound.kz_transmitted,
            },
            config,
        )?;

        let total_reflected = efficiencies.total_reflected();
        let total_transmitted = efficiencies.total_transmitted();
        let energy = total_reflected + total_transmitted;
        tracing::debug!(
            reflected = total_reflected,
            transmitted = total_transmitted,
            absorbed = 1.0 - energy,
            "energy balance"
        );
        let lossless = self.stack.is_lossless();
        let violated = if lossless {
            (energy - 1.0).abs() > config.energy_tolerance
        } else {
            energy > 1.0 + config.energy_tolerance
        };
        if violated {
            return Err(RcwaError::ill_conditioned(
                "SOLVE.ENERGY_BALANCE",
                format!(
                    "ΣR + ΣT = {energy:.9} violates energy balance for a {} stack",
                    if lossless { "lossless" } else { "lossy" }
                ),
            ));
        }

        let mut layer_modes = bound.summaries;
        layer_modes.push(bound.substrate_summary);

        Ok(SolvedStack::new(
            *self.context,
            bound.regime,
            layer_modes,
            global,
            reflected,
            transmitted,
            efficiencies,
        ))
    }
}

/// Splits a `2M` mode-amplitude vector into `(Ex, Ey)` harmonics and
/// converts them to the user-facing phase convention.
fn outgoing_field(
    amplitudes: &[Complex64],
    waves: &TransverseWavevectors,
    kz: &[Complex64],
    direction: f64,
) -> FieldAmplitudes {
    let size = waves.harmonic_count();
    let ex = amplitudes[..size].iter().map(|value| value.conj()).collect();
    let ey = amplitudes[size..].iter().map(|value| value.conj()).collect();
    FieldAmplitudes::from_transverse(ex, ey, waves.kx(), waves.ky(), kz, direction)
}
