//! Partial-pivot LU for the square complex systems met while coupling
//! layers. Rows are never moved: the pivot order is kept as a permutation
//! and every solve reads through it.

use super::dense::{identity, infinity_norm, is_finite_matrix, matmul, sub, ZERO};
use super::DenseComplexMatrix;
use num_complex::Complex64;

const SINGULAR_PIVOT: f64 = 1.0e-15;
/// Smallest accepted `|u_kk| / |A|∞` before an inverse is refused.
const WEAK_PIVOT_RATIO: f64 = 1.0e-12;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LuError {
    #[error("expected a square matrix, got {rows}x{cols}")]
    NonSquareMatrix { rows: usize, cols: usize },
    #[error("cannot factor an empty matrix")]
    EmptyMatrix,
    #[error("matrix contains non-finite entries")]
    NonFiniteInput,
    #[error("zero pivot at pivot index {pivot_index}")]
    SingularMatrix { pivot_index: usize },
    #[error("pivot index {pivot_index} is too weak for a stable inverse")]
    IllConditionedMatrix { pivot_index: usize },
    #[error("right-hand side has {actual} rows, system has {expected}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("inversion residual {residual:.3e} exceeds {tolerance:.3e}")]
    InaccurateInverse { residual: f64, tolerance: f64 },
}

/// Packed `L\U` factors of `P A`.
#[derive(Debug, Clone, PartialEq)]
pub struct LuFactors {
    packed: DenseComplexMatrix,
    order: Vec<usize>,
    scale: f64,
}

impl LuFactors {
    pub fn factor(matrix: &DenseComplexMatrix) -> Result<Self, LuError> {
        let size = square_dimension(matrix)?;
        if !is_finite_matrix(matrix) {
            return Err(LuError::NonFiniteInput);
        }

        let mut packed = matrix.clone();
        let mut order: Vec<usize> = (0..size).collect();
        for step in 0..size {
            let (offset, magnitude) = order[step..]
                .iter()
                .map(|&row| packed[(row, step)].norm())
                .enumerate()
                .fold((0, -1.0), |best, candidate| {
                    if candidate.1 > best.1 { candidate } else { best }
                });
            if magnitude <= SINGULAR_PIVOT {
                return Err(LuError::SingularMatrix { pivot_index: step });
            }
            order.swap(step, step + offset);

            let pivot_row = order[step];
            let pivot = packed[(pivot_row, step)];
            for &row in &order[step + 1..] {
                let multiplier = packed[(row, step)] / pivot;
                packed[(row, step)] = multiplier;
                if multiplier == ZERO {
                    continue;
                }
                for col in step + 1..size {
                    let update = multiplier * packed[(pivot_row, col)];
                    packed[(row, col)] -= update;
                }
            }
        }

        Ok(Self {
            packed,
            order,
            scale: infinity_norm(matrix),
        })
    }

    pub fn dimension(&self) -> usize {
        self.order.len()
    }

    /// Smallest `|u_kk| / |A|∞` over the diagonal of `U`.
    pub fn pivot_ratio(&self) -> f64 {
        (0..self.dimension())
            .map(|step| self.pivot(step).norm() / self.scale)
            .fold(f64::INFINITY, f64::min)
    }

    fn pivot(&self, step: usize) -> Complex64 {
        self.packed[(self.order[step], step)]
    }

    /// Solves `A X = B` for every column of `B` at once.
    pub fn solve(&self, rhs: &DenseComplexMatrix) -> Result<DenseComplexMatrix, LuError> {
        let size = self.dimension();
        if rhs.nrows() != size {
            return Err(LuError::ShapeMismatch {
                expected: size,
                actual: rhs.nrows(),
            });
        }
        let width = rhs.ncols();
        let mut solution = DenseComplexMatrix::zeros(size, width);

        for step in 0..size {
            let row = self.order[step];
            for col in 0..width {
                solution[(step, col)] = rhs[(row, col)];
            }
            for earlier in 0..step {
                let lower = self.packed[(row, earlier)];
                if lower == ZERO {
                    continue;
                }
                for col in 0..width {
                    let known = solution[(earlier, col)];
                    solution[(step, col)] -= lower * known;
                }
            }
        }

        for step in (0..size).rev() {
            let row = self.order[step];
            for later in step + 1..size {
                let upper = self.packed[(row, later)];
                if upper == ZERO {
                    continue;
                }
                for col in 0..width {
                    let known = solution[(later, col)];
                    solution[(step, col)] -= upper * known;
                }
            }
            let pivot = self.pivot(step);
            for col in 0..width {
                solution[(step, col)] /= pivot;
            }
        }

        Ok(solution)
    }

    pub fn inverse(&self) -> Result<DenseComplexMatrix, LuError> {
        if let Some(pivot_index) = (0..self.dimension())
            .find(|&step| self.pivot(step).norm() <= self.scale * WEAK_PIVOT_RATIO)
        {
            return Err(LuError::IllConditionedMatrix { pivot_index });
        }
        self.solve(&identity(self.dimension()))
    }
}

pub fn lu_invert(matrix: &DenseComplexMatrix) -> Result<DenseComplexMatrix, LuError> {
    LuFactors::factor(matrix)?.inverse()
}

/// Inverse whose `|A A^{-1} - I|∞` stays within `tolerance`.
pub fn invert_checked(
    matrix: &DenseComplexMatrix,
    tolerance: f64,
) -> Result<DenseComplexMatrix, LuError> {
    let inverse = lu_invert(matrix)?;
    let residual = inversion_residual(matrix, &inverse);
    if !(residual <= tolerance) {
        return Err(LuError::InaccurateInverse {
            residual,
            tolerance,
        });
    }
    Ok(inverse)
}

/// Infinity norm of `A A^{-1} - I`.
pub fn inversion_residual(matrix: &DenseComplexMatrix, inverse: &DenseComplexMatrix) -> f64 {
    let product = matmul(matrix, inverse);
    infinity_norm(&sub(&product, &identity(matrix.nrows())))
}

fn square_dimension(matrix: &DenseComplexMatrix) -> Result<usize, LuError> {
    match (matrix.nrows(), matrix.ncols()) {
        (0, _) | (_, 0) => Err(LuError::EmptyMatrix),
        (rows, cols) if rows != cols => Err(LuError::NonSquareMatrix { rows, cols }),
        (rows, _) => Ok(rows),
    }
}

#[cfg(test)]
mod tests {
    use super::{invert_checked, inversion_residual, lu_invert, LuError, LuFactors};
    use crate::numerics::dense::{dense_from_rows, identity, matmul};
    use crate::numerics::DenseComplexMatrix;
    use num_complex::Complex64;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn sample_matrix() -> DenseComplexMatrix {
        dense_from_rows(&[
            vec![c(0.0, 0.0), c(2.0, -1.0), c(1.0, 0.0)],
            vec![c(1.0, 2.0), c(-2.0, 0.5), c(-3.0, -1.0)],
            vec![c(2.0, -1.0), c(3.0, 0.0), c(1.0, 4.0)],
        ])
    }

    #[test]
    fn solve_recovers_every_column_of_a_known_solution() {
        let matrix = sample_matrix();
        let expected = dense_from_rows(&[
            vec![c(1.0, -1.0), c(0.0, 1.0)],
            vec![c(2.0, 0.5), c(-1.0, 0.0)],
            vec![c(-0.5, 2.0), c(3.0, -2.0)],
        ]);
        let rhs = matmul(&matrix, &expected);

        let actual = LuFactors::factor(&matrix)
            .and_then(|factors| factors.solve(&rhs))
            .expect("solve");
        for row in 0..3 {
            for col in 0..2 {
                let diff = (actual[(row, col)] - expected[(row, col)]).norm();
                assert!(diff < 1.0e-12, "entry ({row}, {col}) off by {diff:.3e}");
            }
        }
    }

    #[test]
    fn factor_rejects_bad_shapes_and_singular_matrices() {
        let error = LuFactors::factor(&DenseComplexMatrix::zeros(2, 3))
            .expect_err("non-square matrix should fail");
        assert_eq!(error, LuError::NonSquareMatrix { rows: 2, cols: 3 });
        assert_eq!(
            LuFactors::factor(&DenseComplexMatrix::zeros(0, 0)).expect_err("empty"),
            LuError::EmptyMatrix
        );

        let singular = dense_from_rows(&[
            vec![c(1.0, 0.0), c(2.0, 0.0)],
            vec![c(2.0, 0.0), c(4.0, 0.0)],
        ]);
        let error = lu_invert(&singular).expect_err("singular matrix should fail");
        assert_eq!(error, LuError::SingularMatrix { pivot_index: 1 });

        let mut poisoned = identity(2);
        poisoned[(0, 1)] = c(f64::NAN, 0.0);
        assert_eq!(
            LuFactors::factor(&poisoned).expect_err("nan"),
            LuError::NonFiniteInput
        );
    }

    #[test]
    fn weak_pivots_block_the_inverse_but_not_the_factorization() {
        let matrix = dense_from_rows(&[
            vec![c(1.0, 0.0), c(1.0, 0.0)],
            vec![c(1.0, 0.0), c(1.0 + 1.0e-14, 0.0)],
        ]);

        let factors = LuFactors::factor(&matrix).expect("factorization");
        assert!(factors.pivot_ratio() < 1.0e-12);
        let error = factors.inverse().expect_err("ill-conditioned matrix should fail");
        assert_eq!(error, LuError::IllConditionedMatrix { pivot_index: 1 });
    }

    #[test]
    fn checked_inverse_enforces_the_residual_bound() {
        let matrix = sample_matrix();
        let inverse = invert_checked(&matrix, 1.0e-12).expect("inverse");
        assert!(inversion_residual(&matrix, &inverse) < 1.0e-12);

        let error = invert_checked(&matrix, -1.0).expect_err("negative bound");
        assert!(matches!(error, LuError::InaccurateInverse { .. }));
    }
}
