//! Symmetric scattering matrices referenced to a free-space gap medium and
//! their Redheffer star product.
//!
//! Port 1 faces the incident side, port 2 the substrate. `S11`/`S22` reflect
//! back into the same port, `S21` carries port 1 into port 2.

use crate::domain::{RcwaError, SolveResult};
use crate::modes::LayerModes;
use crate::numerics::dense::{add, identity, is_finite_matrix, matmul, scale, scale_rows, sub};
use crate::numerics::{invert_checked, DenseComplexMatrix};
use num_complex::Complex64;

#[derive(Debug, Clone, PartialEq)]
pub struct ScatteringMatrix {
    s11: DenseComplexMatrix,
    s12: DenseComplexMatrix,
    s21: DenseComplexMatrix,
    s22: DenseComplexMatrix,
}

/// Matrix inversion that rejects results whose residual exceeds a bound.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CheckedInverse<'a> {
    pub tolerance: f64,
    pub context: &'a str,
}

impl CheckedInverse<'_> {
    pub(crate) fn invert(&self, matrix: &DenseComplexMatrix) -> SolveResult<DenseComplexMatrix> {
        invert_checked(matrix, self.tolerance)
            .map_err(|source| RcwaError::from_lu("SOLVE.SMATRIX", self.context, source))
    }
}

struct Coupling {
    a: DenseComplexMatrix,
    b: DenseComplexMatrix,
    a_inverse: DenseComplexMatrix,
}

impl Coupling {
    /// `A = W_l^{-1} W_r + V_l^{-1} V_r`, `B = W_l^{-1} W_r - V_l^{-1} V_r`.
    fn new(left: &LayerModes, right: &LayerModes, inverse: CheckedInverse<'_>) -> SolveResult<Self> {
        let w_term = matmul(&inverse.invert(left.w())?, right.w());
        let v_term = matmul(&inverse.invert(left.v())?, right.v());
        let a = add(&w_term, &v_term);
        let b = sub(&w_term, &v_term);
        let a_inverse = inverse.invert(&a)?;
        Ok(Self { a, b, a_inverse })
    }

    /// `A - B A^{-1} B`.
    fn schur(&self) -> DenseComplexMatrix {
        sub(&self.a, &matmul(&self.b, &matmul(&self.a_inverse, &self.b)))
    }
}

impl ScatteringMatrix {
    /// Neutral element of [`star`](Self::star).
    pub fn identity(size: usize) -> Self {
        Self {
            s11: DenseComplexMatrix::zeros(size, size),
            s12: identity(size),
            s21: identity(size),
            s22: DenseComplexMatrix::zeros(size, size),
        }
    }

    pub fn dimension(&self) -> usize {
        self.s11.nrows()
    }

    pub fn s11(&self) -> &DenseComplexMatrix {
        &self.s11
    }

    pub fn s12(&self) -> &DenseComplexMatrix {
        &self.s12
    }

    pub fn s21(&self) -> &DenseComplexMatrix {
        &self.s21
    }

    pub fn s22(&self) -> &DenseComplexMatrix {
        &self.s22
    }

    pub fn is_finite(&self) -> bool {
        [&self.s11, &self.s12, &self.s21, &self.s22]
            .into_iter()
            .all(is_finite_matrix)
    }

    /// Incident half-space seen from the gap.
    pub(crate) fn reflection_side(
        gap: &LayerModes,
        region: &LayerModes,
        inverse: CheckedInverse<'_>,
    ) -> SolveResult<Self> {
        let coupling = Coupling::new(gap, region, inverse)?;
        let a_inv_b = matmul(&coupling.a_inverse, &coupling.b);
        Ok(Self {
            s11: scale(&a_inv_b, -Complex64::new(1.0, 0.0)),
            s12: scale(&coupling.a_inverse, Complex64::new(2.0, 0.0)),
            s21: scale(&coupling.schur(), Complex64::new(0.5, 0.0)),
            s22: matmul(&coupling.b, &coupling.a_inverse),
        })
    }

    /// Substrate half-space seen from the gap.
    pub(crate) fn transmission_side(
        gap: &LayerModes,
        region: &LayerModes,
        inverse: CheckedInverse<'_>,
    ) -> SolveResult<Self> {
        let coupling = Coupling::new(gap, region, inverse)?;
        let a_inv_b = matmul(&coupling.a_inverse, &coupling.b);
        Ok(Self {
            s11: matmul(&coupling.b, &coupling.a_inverse),
            s12: scale(&coupling.schur(), Complex64::new(0.5, 0.0)),
            s21: scale(&coupling.a_inverse, Complex64::new(2.0, 0.0)),
            s22: scale(&a_inv_b, -Complex64::new(1.0, 0.0)),
        })
    }

    /// Finite layer of normalized thickness `k0 L`, embedded in zero-length
    /// gaps on both sides.
    pub(crate) fn layer(
        modes: &LayerModes,
        gap: &LayerModes,
        normalized_thickness: f64,
        inverse: CheckedInverse<'_>,
    ) -> SolveResult<Self> {
        let coupling = Coupling::new(modes, gap, inverse)?;
        let propagator: Vec<Complex64> = modes
            .propagation_constants()
            .iter()
            .map(|lambda| (-lambda * normalized_thickness).exp())
            .collect();

        let xb = scale_rows(&propagator, &coupling.b);
        let xb_a_inv = matmul(&xb, &coupling.a_inverse);
        let denominator = sub(&coupling.a, &matmul(&xb_a_inv, &xb));
        let denominator_inverse = inverse.invert(&denominator)?;

        let xa = scale_rows(&propagator, &coupling.a);
        let reflection = matmul(
            &denominator_inverse,
            &sub(&matmul(&xb_a_inv, &xa), &coupling.b),
        );
        let transmission = matmul(
            &denominator_inverse,
            &scale_rows(&propagator, &coupling.schur()),
        );

        Ok(Self {
            s11: reflection.clone(),
            s12: transmission.clone(),
            s21: transmission,
            s22: reflection,
        })
    }

    /// Redheffer star product `self ⊗ next`, with `next` stacked below.
    pub fn star(&self, next: &Self, inverse_tolerance: f64) -> SolveResult<Self> {
        let inverse = CheckedInverse {
            tolerance: inverse_tolerance,
            context: "star product",
        };
        self.star_checked(next, inverse)
    }

    pub(crate) fn star_checked(&self, next: &Self, inverse: CheckedInverse<'_>) -> SolveResult<Self> {
        let size = self.dimension();
        let unit = identity(size);
        let forward = inverse.invert(&sub(&unit, &matmul(&next.s11, &self.s22)))?;
        let backward = inverse.invert(&sub(&unit, &matmul(&self.s22, &next.s11)))?;

        let d = matmul(&self.s12, &forward);
        let f = matmul(&next.s21, &backward);

        Ok(Self {
            s11: add(&self.s11, &matmul(&d, &matmul(&next.s11, &self.s21))),
            s12: matmul(&d, &next.s12),
            s21: matmul(&f, &self.s21),
            s22: add(&next.s22, &matmul(&f, &matmul(&self.s22, &next.s12))),
        })
    }

    /// Largest `|S_ij|` of the cross-coupling between the `x` and `y`
    /// halves of port-1 to port-2 transfer.
    pub fn cross_polarization_magnitude(&self) -> f64 {
        let half = self.dimension() / 2;
        let mut largest: f64 = 0.0;
        for block in [&self.s11, &self.s21] {
            for row in 0..half {
                for col in half..2 * half {
                    largest = largest.max(block[(row, col)].norm());
                    largest = largest.max(block[(col, row)].norm());
                }
            }
        }
        largest
    }
}
