//! Truncated Fourier-coefficient matrices of a slab's permittivity.
//!
//! Matrices are produced in the solver's internal `exp(+jωt)` convention, so
//! every coefficient is conjugated on the way in: the harmonic `h` of
//! `conj(ε)` is `conj(ε_{-h})`.
//!
//! The lamella walls are normal to `x`. `εxx` multiplies the field component
//! that jumps across the walls and goes through the inverse rule
//! `[[1/εxx]]^{-1}`; `εyy` and `εzz` multiply continuous components and use
//! the Laurent rule `[[ε]]`.

use crate::domain::{RcwaError, SolveResult};
use crate::numerics::{invert_checked, DenseComplexMatrix};
use crate::slab::{FourierSeries, Slab, TensorComponent};

/// Toeplitz matrix `T_{pq} = conj(f_{q-p})` of size `size`.
pub fn toeplitz(series: &FourierSeries, size: usize) -> DenseComplexMatrix {
    let mut output = DenseComplexMatrix::zeros(size, size);
    for row in 0..size {
        for col in 0..size {
            let harmonic = col as i64 - row as i64;
            output[(row, col)] = series.coefficient(harmonic).conj();
        }
    }
    output
}

/// Factorized permittivity of one patterned layer.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorizedPermittivity {
    /// `[[1/εxx]]^{-1}`.
    pub exx: DenseComplexMatrix,
    pub eyy: DenseComplexMatrix,
    pub ezz: DenseComplexMatrix,
    /// `[[εzz]]^{-1}`, needed by the `P` operator.
    pub ezz_inverse: DenseComplexMatrix,
}

impl FactorizedPermittivity {
    pub fn size(&self) -> usize {
        self.eyy.nrows()
    }
}

pub fn factorize(
    slab: &Slab,
    order_count: usize,
    residual_tolerance: f64,
) -> SolveResult<FactorizedPermittivity> {
    let size = 2 * order_count + 1;
    let harmonics = slab.fourier_harmonics(order_count);

    let inverse_xx = toeplitz(harmonics.inverse_epsilon(TensorComponent::Xx), size);
    let exx = checked_inverse(&inverse_xx, residual_tolerance, "inverse-rule [[1/εxx]]")?;
    let eyy = toeplitz(harmonics.epsilon(TensorComponent::Yy), size);
    let ezz = toeplitz(harmonics.epsilon(TensorComponent::Zz), size);
    let ezz_inverse = checked_inverse(&ezz, residual_tolerance, "Laurent [[εzz]]")?;

    Ok(FactorizedPermittivity {
        exx,
        eyy,
        ezz,
        ezz_inverse,
    })
}

fn checked_inverse(
    matrix: &DenseComplexMatrix,
    residual_tolerance: f64,
    label: &str,
) -> SolveResult<DenseComplexMatrix> {
    invert_checked(matrix, residual_tolerance)
        .map_err(|source| RcwaError::from_lu("NUMERICS.FACTORIZATION", label, source))
}
