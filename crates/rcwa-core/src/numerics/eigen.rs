//! Dense complex eigen-decomposition.
//!
//! The layer eigensolver only talks to [`EigenSolver`]; [`QrEigenSolver`] is the
//! built-in backend (Householder reduction to Hessenberg form, shifted complex
//! QR sweeps down to Schur form, then triangular back-substitution).

use super::dense::{infinity_norm, ONE, ZERO};
use super::DenseComplexMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

const EXCEPTIONAL_SHIFT_PERIOD: usize = 10;
const GROWTH_LIMIT: f64 = 1.0e100;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EigenError {
    #[error("eigen-decomposition requires a square matrix, got {rows}x{cols}")]
    NonSquareMatrix { rows: usize, cols: usize },
    #[error("eigen-decomposition requires a non-empty matrix")]
    EmptyMatrix,
    #[error("matrix contains non-finite entries")]
    NonFiniteInput,
    #[error("QR iteration did not converge for eigenvalue {index} after {iterations} sweeps")]
    NotConverged { index: usize, iterations: usize },
    #[error("eigenpair {index} residual {residual:.3e} exceeds tolerance {tolerance:.3e}")]
    ResidualTooLarge {
        index: usize,
        residual: f64,
        tolerance: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EigenOptions {
    /// Relative size below which a subdiagonal entry is treated as zero.
    pub deflation_tolerance: f64,
    pub max_iterations_per_eigenvalue: usize,
    /// Accepted `|A v - λ v| / |A|` for every returned pair.
    pub residual_tolerance: f64,
}

impl Default for EigenOptions {
    fn default() -> Self {
        Self {
            deflation_tolerance: 1.0e-14,
            max_iterations_per_eigenvalue: 60,
            residual_tolerance: 1.0e-8,
        }
    }
}

impl EigenOptions {
    /// Settings for the single retry after a failed decomposition.
    pub fn refined(&self) -> Self {
        Self {
            deflation_tolerance: (self.deflation_tolerance * 0.1).max(f64::EPSILON),
            max_iterations_per_eigenvalue: self.max_iterations_per_eigenvalue.saturating_mul(4),
            residual_tolerance: self.residual_tolerance,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EigenDecomposition {
    eigenvalues: Vec<Complex64>,
    eigenvectors: DenseComplexMatrix,
    max_residual: f64,
}

impl EigenDecomposition {
    pub fn new(eigenvalues: Vec<Complex64>, eigenvectors: DenseComplexMatrix) -> Self {
        Self {
            eigenvalues,
            eigenvectors,
            max_residual: 0.0,
        }
    }

    pub fn dimension(&self) -> usize {
        self.eigenvalues.len()
    }

    pub fn eigenvalues(&self) -> &[Complex64] {
        &self.eigenvalues
    }

    /// Column `k` is the eigenvector of `eigenvalues()[k]`, unit 2-norm.
    pub fn eigenvectors(&self) -> &DenseComplexMatrix {
        &self.eigenvectors
    }

    pub fn max_residual(&self) -> f64 {
        self.max_residual
    }

    pub fn into_parts(self) -> (Vec<Complex64>, DenseComplexMatrix) {
        (self.eigenvalues, self.eigenvectors)
    }
}

/// Backend seam for the dense complex eigenproblem `A v = λ v`.
pub trait EigenSolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn decompose(
        &self,
        matrix: &DenseComplexMatrix,
        options: &EigenOptions,
    ) -> Result<EigenDecomposition, EigenError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QrEigenSolver;

impl EigenSolver for QrEigenSolver {
    fn name(&self) -> &'static str {
        "hessenberg-qr"
    }

    fn decompose(
        &self,
        matrix: &DenseComplexMatrix,
        options: &EigenOptions,
    ) -> Result<EigenDecomposition, EigenError> {
        let dimension = validate_input(matrix)?;
        let (schur, basis) = schur_form(matrix, options)?;
        let eigenvalues: Vec<Complex64> = (0..dimension).map(|k| schur[(k, k)]).collect();
        let eigenvectors = triangular_eigenvectors(&schur, &basis);

        let mut decomposition = EigenDecomposition::new(eigenvalues, eigenvectors);
        decomposition.max_residual = check_residuals(matrix, &decomposition, options)?;
        Ok(decomposition)
    }
}

/// Runs `solver` once and, on failure, once more with [`EigenOptions::refined`].
pub fn decompose_with_retry(
    solver: &dyn EigenSolver,
    matrix: &DenseComplexMatrix,
    options: &EigenOptions,
) -> Result<EigenDecomposition, EigenError> {
    match solver.decompose(matrix, options) {
        Err(error) if is_retryable(&error) => {
            tracing::warn!(
                backend = solver.name(),
                dimension = matrix.nrows(),
                error = %error,
                "eigen-decomposition failed, retrying with refined tolerance"
            );
            solver.decompose(matrix, &options.refined())
        }
        result => result,
    }
}

fn is_retryable(error: &EigenError) -> bool {
    matches!(
        error,
        EigenError::NotConverged { .. } | EigenError::ResidualTooLarge { .. }
    )
}

fn validate_input(matrix: &DenseComplexMatrix) -> Result<usize, EigenError> {
    let rows = matrix.nrows();
    let cols = matrix.ncols();
    if rows == 0 || cols == 0 {
        return Err(EigenError::EmptyMatrix);
    }
    if rows != cols {
        return Err(EigenError::NonSquareMatrix { rows, cols });
    }
    if !super::dense::is_finite_matrix(matrix) {
        return Err(EigenError::NonFiniteInput);
    }
    Ok(rows)
}

/// Returns `(T, Z)` with `A = Z T Z^H`, `T` upper triangular and `Z` unitary.
fn schur_form(
    matrix: &DenseComplexMatrix,
    options: &EigenOptions,
) -> Result<(DenseComplexMatrix, DenseComplexMatrix), EigenError> {
    let (mut h, mut z) = hessenberg_reduction(matrix);
    let dimension = h.nrows();
    let norm = infinity_norm(&h);
    let budget = options.max_iterations_per_eigenvalue.max(1);

    let mut hi = dimension - 1;
    let mut iterations = 0_usize;
    while hi > 0 {
        let mut lo = hi;
        while lo > 0 {
            let mut scale = h[(lo - 1, lo - 1)].norm() + h[(lo, lo)].norm();
            if scale == 0.0 {
                scale = norm;
            }
            if h[(lo, lo - 1)].norm() <= options.deflation_tolerance * scale {
                h[(lo, lo - 1)] = ZERO;
                break;
            }
            lo -= 1;
        }

        if lo == hi {
            hi -= 1;
            iterations = 0;
            continue;
        }

        iterations += 1;
        if iterations > budget {
            return Err(EigenError::NotConverged {
                index: hi,
                iterations: budget,
            });
        }

        let shift = if iterations % EXCEPTIONAL_SHIFT_PERIOD == 0 {
            let sub = h[(hi, hi - 1)].norm();
            h[(hi, hi)] + Complex64::new(0.75 * sub, 0.4375 * sub)
        } else {
            wilkinson_shift(&h, hi)
        };
        qr_sweep(&mut h, &mut z, lo, hi, shift);
    }

    for row in 1..dimension {
        for col in 0..row {
            h[(row, col)] = ZERO;
        }
    }

    Ok((h, z))
}

fn hessenberg_reduction(matrix: &DenseComplexMatrix) -> (DenseComplexMatrix, DenseComplexMatrix) {
    let dimension = matrix.nrows();
    let mut h = matrix.clone();
    let mut z = super::dense::identity(dimension);

    for k in 0..dimension.saturating_sub(2) {
        let column_norm = ((k + 1)..dimension)
            .map(|row| h[(row, k)].norm_sqr())
            .sum::<f64>()
            .sqrt();
        if column_norm == 0.0 {
            continue;
        }

        let leading = h[(k + 1, k)];
        let phase = if leading.norm() == 0.0 {
            ONE
        } else {
            leading / leading.norm()
        };
        let alpha = -phase * column_norm;

        let mut reflector: Vec<Complex64> = ((k + 1)..dimension).map(|row| h[(row, k)]).collect();
        reflector[0] -= alpha;
        let reflector_norm = reflector.iter().map(Complex64::norm_sqr).sum::<f64>().sqrt();
        if reflector_norm == 0.0 {
            continue;
        }
        for value in &mut reflector {
            *value /= reflector_norm;
        }

        apply_reflector_left(&mut h, &reflector, k + 1);
        apply_reflector_right(&mut h, &reflector, k + 1);
        apply_reflector_right(&mut z, &reflector, k + 1);

        h[(k + 1, k)] = alpha;
        for row in (k + 2)..dimension {
            h[(row, k)] = ZERO;
        }
    }

    (h, z)
}

fn apply_reflector_left(matrix: &mut DenseComplexMatrix, reflector: &[Complex64], offset: usize) {
    for col in 0..matrix.ncols() {
        let dot = reflector
            .iter()
            .enumerate()
            .fold(ZERO, |sum, (i, v)| sum + v.conj() * matrix[(offset + i, col)]);
        if dot == ZERO {
            continue;
        }
        for (i, v) in reflector.iter().enumerate() {
            matrix[(offset + i, col)] -= *v * dot * 2.0;
        }
    }
}

fn apply_reflector_right(matrix: &mut DenseComplexMatrix, reflector: &[Complex64], offset: usize) {
    for row in 0..matrix.nrows() {
        let dot = reflector
            .iter()
            .enumerate()
            .fold(ZERO, |sum, (i, v)| sum + matrix[(row, offset + i)] * *v);
        if dot == ZERO {
            continue;
        }
        for (i, v) in reflector.iter().enumerate() {
            matrix[(row, offset + i)] -= dot * v.conj() * 2.0;
        }
    }
}

fn wilkinson_shift(h: &DenseComplexMatrix, hi: usize) -> Complex64 {
    let a = h[(hi - 1, hi - 1)];
    let b = h[(hi - 1, hi)];
    let c = h[(hi, hi - 1)];
    let d = h[(hi, hi)];

    let half = (a - d) * 0.5;
    let discriminant = (half * half + b * c).sqrt();
    let plus = half + discriminant;
    let minus = half - discriminant;
    if plus.norm() <= minus.norm() {
        d + plus
    } else {
        d + minus
    }
}

/// Unitary `G = [[c, s], [-conj(s), c]]` with `G [x; y] = [r; 0]`.
fn givens(x: Complex64, y: Complex64) -> (f64, Complex64) {
    if y == ZERO {
        return (1.0, ZERO);
    }
    if x == ZERO {
        return (0.0, ONE);
    }
    let x_norm = x.norm();
    let norm = x_norm.hypot(y.norm());
    let c = x_norm / norm;
    let s = (x / x_norm) * y.conj() / norm;
    (c, s)
}

fn qr_sweep(
    h: &mut DenseComplexMatrix,
    z: &mut DenseComplexMatrix,
    lo: usize,
    hi: usize,
    shift: Complex64,
) {
    let dimension = h.nrows();
    for index in lo..=hi {
        h[(index, index)] -= shift;
    }

    let mut rotations = Vec::with_capacity(hi - lo);
    for k in lo..hi {
        let (c, s) = givens(h[(k, k)], h[(k + 1, k)]);
        for col in k..dimension {
            let upper = h[(k, col)];
            let lower = h[(k + 1, col)];
            h[(k, col)] = upper * c + s * lower;
            h[(k + 1, col)] = -s.conj() * upper + lower * c;
        }
        h[(k + 1, k)] = ZERO;
        rotations.push((c, s));
    }

    for (offset, (c, s)) in rotations.into_iter().enumerate() {
        let k = lo + offset;
        let row_end = (k + 2).min(hi + 1);
        rotate_columns(h, k, c, s, row_end);
        rotate_columns(z, k, c, s, dimension);
    }

    for index in lo..=hi {
        h[(index, index)] += shift;
    }
}

fn rotate_columns(matrix: &mut DenseComplexMatrix, k: usize, c: f64, s: Complex64, row_end: usize) {
    for row in 0..row_end {
        let left = matrix[(row, k)];
        let right = matrix[(row, k + 1)];
        matrix[(row, k)] = left * c + right * s.conj();
        matrix[(row, k + 1)] = -left * s + right * c;
    }
}

fn triangular_eigenvectors(
    schur: &DenseComplexMatrix,
    basis: &DenseComplexMatrix,
) -> DenseComplexMatrix {
    let dimension = schur.nrows();
    // Near-degenerate diagonal gaps are lifted to this floor so close
    // eigenvalues still get distinct, finite vectors.
    let small_gap = (f64::EPSILON * infinity_norm(schur)).max(f64::MIN_POSITIVE);
    let mut eigenvectors = DenseComplexMatrix::zeros(dimension, dimension);
    let mut local = vec![ZERO; dimension];

    for k in 0..dimension {
        let lambda = schur[(k, k)];
        local.fill(ZERO);
        local[k] = ONE;

        for i in (0..k).rev() {
            let mut sum = ZERO;
            for j in (i + 1)..=k {
                sum += schur[(i, j)] * local[j];
            }
            let mut gap = schur[(i, i)] - lambda;
            if gap.norm() < small_gap {
                gap = Complex64::new(small_gap, 0.0);
            }
            local[i] = -sum / gap;

            let magnitude = local[i].norm();
            if magnitude > GROWTH_LIMIT {
                for value in local.iter_mut().take(k + 1) {
                    *value /= magnitude;
                }
            }
        }

        let mut norm_sq = 0.0;
        for row in 0..dimension {
            let mut value = ZERO;
            for j in 0..=k {
                value += basis[(row, j)] * local[j];
            }
            eigenvectors[(row, k)] = value;
            norm_sq += value.norm_sqr();
        }

        let norm = norm_sq.sqrt();
        if norm > 0.0 {
            for row in 0..dimension {
                eigenvectors[(row, k)] /= norm;
            }
        }
    }

    eigenvectors
}

fn check_residuals(
    matrix: &DenseComplexMatrix,
    decomposition: &EigenDecomposition,
    options: &EigenOptions,
) -> Result<f64, EigenError> {
    let dimension = decomposition.dimension();
    let scale = infinity_norm(matrix).max(f64::MIN_POSITIVE);
    let vectors = decomposition.eigenvectors();
    let mut worst = 0.0_f64;

    for (index, lambda) in decomposition.eigenvalues().iter().enumerate() {
        let mut residual_sq = 0.0;
        for row in 0..dimension {
            let mut value = -*lambda * vectors[(row, index)];
            for col in 0..dimension {
                value += matrix[(row, col)] * vectors[(col, index)];
            }
            residual_sq += value.norm_sqr();
        }

        let residual = residual_sq.sqrt() / scale;
        if !residual.is_finite() || residual > options.residual_tolerance {
            return Err(EigenError::ResidualTooLarge {
                index,
                residual,
                tolerance: options.residual_tolerance,
            });
        }
        worst = worst.max(residual);
    }

    Ok(worst)
}

#[cfg(test)]
mod tests {
    use super::{
        decompose_with_retry, EigenDecomposition, EigenError, EigenOptions, EigenSolver,
        QrEigenSolver,
    };
    use crate::numerics::dense::{dense_from_rows, diagonal_matrix, matvec};
    use crate::numerics::DenseComplexMatrix;
    use num_complex::Complex64;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn assert_pairs_satisfy_definition(matrix: &DenseComplexMatrix, decomposition: &EigenDecomposition) {
        let size = matrix.nrows();
        for (index, lambda) in decomposition.eigenvalues().iter().enumerate() {
            let vector: Vec<Complex64> = (0..size)
                .map(|row| decomposition.eigenvectors()[(row, index)])
                .collect();
            let image = matvec(matrix, &vector);
            for row in 0..size {
                let diff = (image[row] - lambda * vector[row]).norm();
                assert!(diff < 1.0e-10, "pair {index} row {row} residual {diff:.3e}");
            }
        }
    }

    fn eigen_decompose(matrix: &DenseComplexMatrix) -> Result<EigenDecomposition, EigenError> {
        decompose_with_retry(&QrEigenSolver, matrix, &EigenOptions::default())
    }

    fn sorted_by_real(mut values: Vec<Complex64>) -> Vec<Complex64> {
        values.sort_by(|lhs, rhs| lhs.re.total_cmp(&rhs.re).then(lhs.im.total_cmp(&rhs.im)));
        values
    }

    #[test]
    fn triangular_matrix_eigenvalues_are_its_diagonal() {
        let matrix = dense_from_rows(&[
            vec![c(1.0, 0.0), c(2.0, 1.0), c(0.5, 0.0)],
            vec![c(0.0, 0.0), c(-3.0, 0.5), c(1.0, -1.0)],
            vec![c(0.0, 0.0), c(0.0, 0.0), c(4.0, 2.0)],
        ]);
        let values = sorted_by_real(
            eigen_decompose(&matrix)
                .expect("decomposition")
                .eigenvalues()
                .to_vec(),
        );
        let expected = [c(-3.0, 0.5), c(1.0, 0.0), c(4.0, 2.0)];
        for (actual, expected) in values.iter().zip(expected) {
            assert!((actual - expected).norm() < 1.0e-12, "{actual} vs {expected}");
        }
    }

    #[test]
    fn rotation_generator_has_imaginary_pair() {
        let matrix = dense_from_rows(&[vec![c(0.0, 0.0), c(-1.0, 0.0)], vec![c(1.0, 0.0), c(0.0, 0.0)]]);
        let decomposition = eigen_decompose(&matrix).expect("decomposition");
        let values = sorted_by_real(decomposition.eigenvalues().to_vec());
        let mut imaginary: Vec<f64> = values.iter().map(|value| value.im).collect();
        imaginary.sort_by(f64::total_cmp);
        assert!((imaginary[0] + 1.0).abs() < 1.0e-12);
        assert!((imaginary[1] - 1.0).abs() < 1.0e-12);
        assert_pairs_satisfy_definition(&matrix, &decomposition);
    }

    #[test]
    fn general_complex_matrix_pairs_satisfy_definition() {
        let matrix = dense_from_rows(&[
            vec![c(2.0, 1.0), c(-1.0, 0.5), c(0.0, 3.0), c(1.0, 0.0)],
            vec![c(0.5, -2.0), c(1.0, 0.0), c(2.0, 2.0), c(-1.0, 1.0)],
            vec![c(3.0, 0.0), c(0.0, -1.0), c(-2.0, 0.5), c(0.25, 0.0)],
            vec![c(1.0, 1.0), c(2.0, 0.0), c(0.0, 0.0), c(4.0, -1.0)],
        ]);
        let decomposition = eigen_decompose(&matrix).expect("decomposition");
        assert_eq!(decomposition.dimension(), 4);
        assert!(decomposition.max_residual() < 1.0e-10);
        assert_pairs_satisfy_definition(&matrix, &decomposition);

        let trace = (0..4).fold(c(0.0, 0.0), |sum, index| sum + matrix[(index, index)]);
        let eigen_sum = decomposition
            .eigenvalues()
            .iter()
            .fold(c(0.0, 0.0), |sum, value| sum + value);
        assert!((trace - eigen_sum).norm() < 1.0e-10);
    }

    #[test]
    fn degenerate_diagonal_matrix_keeps_independent_vectors() {
        let matrix = diagonal_matrix(&[c(2.0, 0.0), c(2.0, 0.0), c(-1.0, 0.0)]);
        let decomposition = eigen_decompose(&matrix).expect("decomposition");
        assert_pairs_satisfy_definition(&matrix, &decomposition);
        let vectors = decomposition.eigenvectors();
        for col in 0..3 {
            let nonzero = (0..3).filter(|row| vectors[(*row, col)].norm() > 0.5).count();
            assert_eq!(nonzero, 1, "column {col} should be a unit vector");
        }
    }

    #[test]
    fn invalid_shapes_and_values_are_rejected() {
        assert_eq!(
            eigen_decompose(&DenseComplexMatrix::zeros(2, 3)).expect_err("shape"),
            EigenError::NonSquareMatrix { rows: 2, cols: 3 }
        );
        assert_eq!(
            eigen_decompose(&DenseComplexMatrix::zeros(0, 0)).expect_err("empty"),
            EigenError::EmptyMatrix
        );
        let matrix = diagonal_matrix(&[c(f64::NAN, 0.0)]);
        assert_eq!(
            eigen_decompose(&matrix).expect_err("nan"),
            EigenError::NonFiniteInput
        );
    }

    struct FlakySolver {
        calls: AtomicUsize,
    }

    impl EigenSolver for FlakySolver {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn decompose(
            &self,
            matrix: &DenseComplexMatrix,
            options: &EigenOptions,
        ) -> Result<EigenDecomposition, EigenError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(EigenError::NotConverged {
                    index: 0,
                    iterations: options.max_iterations_per_eigenvalue,
                });
            }
            assert!(options.max_iterations_per_eigenvalue > EigenOptions::default().max_iterations_per_eigenvalue);
            QrEigenSolver.decompose(matrix, options)
        }
    }

    #[test]
    fn failed_decomposition_is_retried_once_with_refined_options() {
        let solver = FlakySolver {
            calls: AtomicUsize::new(0),
        };
        let matrix = diagonal_matrix(&[c(1.0, 0.0), c(3.0, 0.0)]);
        let decomposition =
            decompose_with_retry(&solver, &matrix, &EigenOptions::default()).expect("retry");
        assert_eq!(solver.calls.load(Ordering::SeqCst), 2);
        assert_eq!(decomposition.dimension(), 2);
    }

    #[test]
    fn refined_options_tighten_deflation_and_extend_budget() {
        let options = EigenOptions::default();
        let refined = options.refined();
        assert!(refined.deflation_tolerance < options.deflation_tolerance);
        assert!(refined.deflation_tolerance >= f64::EPSILON);
        assert_eq!(
            refined.max_iterations_per_eigenvalue,
            options.max_iterations_per_eigenvalue * 4
        );
    }
}
