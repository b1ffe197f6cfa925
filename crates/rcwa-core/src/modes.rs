//! Eigenmodes of a single layer.
//!
//! Transverse fields are expanded as `ψ(z) = [W W; -V V] [exp(-λz) c+; exp(λz) c-]`
//! with `z` normalized by `k0`. `W` maps mode amplitudes to `(Ex, Ey)`
//! harmonics and `V` to `(Hx, Hy)`; both are `2M x 2M` for `M = 2N+1`
//! harmonics, `x` block first.

use crate::config::SolverConfig;
use crate::domain::{DiffractionRegime, RcwaError, SolveResult};
use crate::factorization::{factorize, FactorizedPermittivity};
use crate::numerics::dense::{
    block2x2, block_diagonal, diagonal_matrix, identity, matmul, scale, scale_cols, scale_rows,
    sub, J, ONE,
};
use crate::numerics::{
    causal_sqrt, decompose_with_retry, DenseComplexMatrix, EigenError, EigenOptions, EigenSolver,
};
use crate::slab::Slab;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// `|λ|` of a patterned-layer mode below this is lifted to it before being
/// divided by.
const CUTOFF_FLOOR: f64 = 1.0e-12;

/// Orders of a uniform medium with `|kz|` below this are treated as
/// marginally evanescent, `kz = i·GRAZING_FLOOR`.
pub(crate) const GRAZING_FLOOR: f64 = 1.0e-4;

/// `k0`-normalized in-plane wavevectors of the retained orders.
#[derive(Debug, Clone, PartialEq)]
pub struct TransverseWavevectors {
    kx: Vec<f64>,
    ky: f64,
}

impl TransverseWavevectors {
    pub fn new(kx: Vec<f64>, ky: f64) -> Self {
        Self { kx, ky }
    }

    pub fn kx(&self) -> &[f64] {
        &self.kx
    }

    pub fn ky(&self) -> f64 {
        self.ky
    }

    pub fn harmonic_count(&self) -> usize {
        self.kx.len()
    }

    fn kx_diagonal(&self) -> Vec<Complex64> {
        self.kx.iter().map(|&kx| Complex64::new(kx, 0.0)).collect()
    }

    fn ky_diagonal(&self) -> Vec<Complex64> {
        vec![Complex64::new(self.ky, 0.0); self.kx.len()]
    }
}

/// Normal wavevector `sqrt(ε - kx² - ky²)` of each order in a uniform
/// medium, on the branch with `Re >= 0` (and `Im >= 0` when evanescent).
pub fn normal_wavevectors(permittivity: Complex64, waves: &TransverseWavevectors) -> Vec<Complex64> {
    let ky2 = waves.ky() * waves.ky();
    waves
        .kx()
        .iter()
        .map(|&kx| causal_sqrt(permittivity - kx * kx - ky2))
        .collect()
}

/// [`normal_wavevectors`] with grazing orders moved off `kz = 0`.
///
/// A grazing order (a Rayleigh anomaly) has no forward/backward mode pair,
/// so it is given the decaying branch and carries no power.
pub(crate) fn off_grazing_wavevectors(
    permittivity: Complex64,
    waves: &TransverseWavevectors,
) -> Vec<Complex64> {
    normal_wavevectors(permittivity, waves)
        .into_iter()
        .map(|kz| {
            if kz.norm() < GRAZING_FLOOR {
                Complex64::new(0.0, GRAZING_FLOOR)
            } else {
                kz
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    /// Uniform isotropic medium, solved in closed form.
    Homogeneous,
    Planar,
    Conical,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerModes {
    kind: ModeKind,
    w: DenseComplexMatrix,
    v: DenseComplexMatrix,
    lambda: Vec<Complex64>,
}

impl LayerModes {
    pub fn kind(&self) -> ModeKind {
        self.kind
    }

    pub fn mode_count(&self) -> usize {
        self.lambda.len()
    }

    /// `λ` of each mode, `k0`-normalized; forward modes decay as `exp(-λz)`.
    pub fn propagation_constants(&self) -> &[Complex64] {
        &self.lambda
    }

    pub fn w(&self) -> &DenseComplexMatrix {
        &self.w
    }

    pub fn v(&self) -> &DenseComplexMatrix {
        &self.v
    }

    pub fn summary(&self) -> ModeSummary {
        ModeSummary {
            kind: self.kind,
            propagation_constants: self.lambda.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModeSummary {
    pub kind: ModeKind,
    pub propagation_constants: Vec<Complex64>,
}

/// `Q` maps `(Ex, Ey)` to `d(Hx, Hy)/dz`.
fn q_matrix(
    kx: &[Complex64],
    ky: &[Complex64],
    exx: &DenseComplexMatrix,
    eyy: &DenseComplexMatrix,
) -> DenseComplexMatrix {
    let kxky: Vec<Complex64> = kx.iter().zip(ky).map(|(a, b)| a * b).collect();
    let kx2: Vec<Complex64> = kx.iter().map(|a| a * a).collect();
    let ky2: Vec<Complex64> = ky.iter().map(|b| b * b).collect();
    block2x2(
        &diagonal_matrix(&kxky),
        &sub(eyy, &diagonal_matrix(&kx2)),
        &sub(&diagonal_matrix(&ky2), exx),
        &scale(&diagonal_matrix(&kxky), -ONE),
    )
}

/// `P` maps `(Hx, Hy)` to `d(Ex, Ey)/dz`.
fn p_matrix(
    kx: &[Complex64],
    ky: &[Complex64],
    ezz_inverse: &DenseComplexMatrix,
) -> DenseComplexMatrix {
    let size = kx.len();
    let kx_e = scale_rows(kx, ezz_inverse);
    let ky_e = scale_rows(ky, ezz_inverse);
    block2x2(
        &scale_cols(&kx_e, ky),
        &sub(&identity(size), &scale_cols(&kx_e, kx)),
        &sub(&scale_cols(&ky_e, ky), &identity(size)),
        &scale(&scale_cols(&ky_e, kx), -ONE),
    )
}

fn lift(value: Complex64) -> Complex64 {
    if value.norm() < CUTOFF_FLOOR {
        Complex64::new(CUTOFF_FLOOR, 0.0)
    } else {
        value
    }
}

/// `V = Q W λ^{-1}`.
fn magnetic_modes(
    q: &DenseComplexMatrix,
    w: &DenseComplexMatrix,
    lambda: &[Complex64],
) -> DenseComplexMatrix {
    let inverse: Vec<Complex64> = lambda.iter().map(|&value| lift(value).inv()).collect();
    scale_cols(&matmul(q, w), &inverse)
}

/// Modes with `W = I` and one `λ` per order shared by both polarizations.
///
/// `V` is written in terms of `λ` alone, using `ε - kx² - ky² = -λ²`, so a
/// regularized `λ` stays consistent with its `V`. Its 2x2 block per order
/// has determinant `λ² - kx² - ky² = -ε`.
fn closed_form_modes(waves: &TransverseWavevectors, per_order: Vec<Complex64>) -> LayerModes {
    let ky = Complex64::new(waves.ky(), 0.0);
    let size = per_order.len();
    let (mut xx, mut xy, mut yx, mut yy) = (
        Vec::with_capacity(size),
        Vec::with_capacity(size),
        Vec::with_capacity(size),
        Vec::with_capacity(size),
    );
    for (&kx, &lambda) in waves.kx().iter().zip(&per_order) {
        let kx = Complex64::new(kx, 0.0);
        xx.push(kx * ky / lambda);
        xy.push((ky * ky - lambda * lambda) / lambda);
        yx.push((lambda * lambda - kx * kx) / lambda);
        yy.push(-kx * ky / lambda);
    }
    let v = block2x2(
        &diagonal_matrix(&xx),
        &diagonal_matrix(&xy),
        &diagonal_matrix(&yx),
        &diagonal_matrix(&yy),
    );
    let lambda: Vec<Complex64> = per_order.iter().chain(per_order.iter()).copied().collect();

    LayerModes {
        kind: ModeKind::Homogeneous,
        w: identity(lambda.len()),
        v,
        lambda,
    }
}

/// Closed-form modes of a uniform isotropic medium of (user-convention)
/// permittivity `permittivity`.
pub(crate) fn uniform_modes(permittivity: Complex64, waves: &TransverseWavevectors) -> LayerModes {
    let per_order = off_grazing_wavevectors(permittivity, waves)
        .into_iter()
        .map(|kz| J * kz.conj())
        .collect();
    closed_form_modes(waves, per_order)
}

/// Zero-thickness gap the scattering matrices are referenced to: every
/// order has `kz = 1`, i.e. `ε = 1 + kx² + ky²` per order, so `V` is never
/// singular whatever the diffraction geometry.
pub(crate) fn gap_modes(waves: &TransverseWavevectors) -> LayerModes {
    closed_form_modes(waves, vec![J; waves.harmonic_count()])
}

fn mode_roots(eigenvalues: &[Complex64]) -> Vec<Complex64> {
    eigenvalues.iter().map(|&value| causal_sqrt(value)).collect()
}

pub(crate) fn patterned_modes(
    factorized: &FactorizedPermittivity,
    waves: &TransverseWavevectors,
    regime: DiffractionRegime,
    solver: &dyn EigenSolver,
    options: &EigenOptions,
) -> Result<LayerModes, EigenError> {
    let kx = waves.kx_diagonal();
    let ky = match regime {
        DiffractionRegime::Planar => vec![Complex64::new(0.0, 0.0); kx.len()],
        DiffractionRegime::Conical => waves.ky_diagonal(),
    };
    let q = q_matrix(&kx, &ky, &factorized.exx, &factorized.eyy);

    let (w, lambda, kind) = match regime {
        DiffractionRegime::Planar => {
            let size = kx.len();
            let kx2: Vec<Complex64> = kx.iter().map(|a| a * a).collect();
            let kx_ezz_kx = scale_cols(&scale_rows(&kx, &factorized.ezz_inverse), &kx);
            let tm_block = matmul(&sub(&kx_ezz_kx, &identity(size)), &factorized.exx);
            let te_block = sub(&diagonal_matrix(&kx2), &factorized.eyy);

            let tm = decompose_with_retry(solver, &tm_block, options)?;
            let te = decompose_with_retry(solver, &te_block, options)?;
            let mut lambda = mode_roots(tm.eigenvalues());
            lambda.extend(mode_roots(te.eigenvalues()));
            let (_, w_tm) = tm.into_parts();
            let (_, w_te) = te.into_parts();
            (block_diagonal(&w_tm, &w_te), lambda, ModeKind::Planar)
        }
        DiffractionRegime::Conical => {
            let p = p_matrix(&kx, &ky, &factorized.ezz_inverse);
            let omega2 = matmul(&p, &q);
            let decomposition = decompose_with_retry(solver, &omega2, options)?;
            let lambda = mode_roots(decomposition.eigenvalues());
            let (_, w) = decomposition.into_parts();
            (w, lambda, ModeKind::Conical)
        }
    };

    let v = magnetic_modes(&q, &w, &lambda);
    Ok(LayerModes { kind, w, v, lambda })
}

/// Modes of an interior layer; uniform isotropic layers skip the eigensolve.
pub(crate) fn layer_modes(
    slab: &Slab,
    waves: &TransverseWavevectors,
    regime: DiffractionRegime,
    solver: &dyn EigenSolver,
    config: &SolverConfig,
    layer_index: usize,
) -> SolveResult<LayerModes> {
    if let Some(material) = slab.uniform_material().filter(|material| material.is_isotropic()) {
        return Ok(uniform_modes(material.permittivity().xx(), waves));
    }

    let order_count = (waves.harmonic_count() - 1) / 2;
    let factorized = factorize(slab, order_count, config.residual_tolerance)?;
    patterned_modes(&factorized, waves, regime, solver, &config.eigen).map_err(|source| {
        RcwaError::from_eigen(
            "SOLVE.LAYER_MODES",
            &format!("layer {layer_index} ({} backend)", solver.name()),
            source,
        )
    })
}
