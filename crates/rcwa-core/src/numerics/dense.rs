use super::DenseComplexMatrix;
use num_complex::Complex64;

pub const ZERO: Complex64 = Complex64::new(0.0, 0.0);
pub const ONE: Complex64 = Complex64::new(1.0, 0.0);
pub const J: Complex64 = Complex64::new(0.0, 1.0);

pub fn identity(size: usize) -> DenseComplexMatrix {
    diagonal_matrix(&vec![ONE; size])
}

pub fn diagonal_matrix(values: &[Complex64]) -> DenseComplexMatrix {
    let mut matrix = DenseComplexMatrix::zeros(values.len(), values.len());
    for (index, value) in values.iter().enumerate() {
        matrix[(index, index)] = *value;
    }
    matrix
}

pub fn matmul(lhs: &DenseComplexMatrix, rhs: &DenseComplexMatrix) -> DenseComplexMatrix {
    let nrows = lhs.nrows();
    let inner = lhs.ncols();
    let ncols = rhs.ncols();
    assert_eq!(rhs.nrows(), inner, "inner matrix dimensions must match");

    let mut output = DenseComplexMatrix::zeros(nrows, ncols);
    for row in 0..nrows {
        for k in 0..inner {
            let factor = lhs[(row, k)];
            if factor == ZERO {
                continue;
            }
            for col in 0..ncols {
                output[(row, col)] += factor * rhs[(k, col)];
            }
        }
    }
    output
}

pub fn matvec(matrix: &DenseComplexMatrix, vector: &[Complex64]) -> Vec<Complex64> {
    assert_eq!(
        vector.len(),
        matrix.ncols(),
        "vector length must match matrix columns"
    );

    (0..matrix.nrows())
        .map(|row| {
            vector
                .iter()
                .enumerate()
                .fold(ZERO, |sum, (col, value)| sum + matrix[(row, col)] * *value)
        })
        .collect()
}

pub fn add(lhs: &DenseComplexMatrix, rhs: &DenseComplexMatrix) -> DenseComplexMatrix {
    combine(lhs, rhs, |a, b| a + b)
}

pub fn sub(lhs: &DenseComplexMatrix, rhs: &DenseComplexMatrix) -> DenseComplexMatrix {
    combine(lhs, rhs, |a, b| a - b)
}

pub fn scale(matrix: &DenseComplexMatrix, factor: Complex64) -> DenseComplexMatrix {
    let mut output = matrix.clone();
    for row in 0..output.nrows() {
        for col in 0..output.ncols() {
            output[(row, col)] *= factor;
        }
    }
    output
}

/// Left-multiplies by `diag(values)` without forming the diagonal matrix.
pub fn scale_rows(values: &[Complex64], matrix: &DenseComplexMatrix) -> DenseComplexMatrix {
    assert_eq!(values.len(), matrix.nrows(), "row scale length mismatch");
    let mut output = matrix.clone();
    for (row, value) in values.iter().enumerate() {
        for col in 0..output.ncols() {
            output[(row, col)] *= *value;
        }
    }
    output
}

/// Right-multiplies by `diag(values)` without forming the diagonal matrix.
pub fn scale_cols(matrix: &DenseComplexMatrix, values: &[Complex64]) -> DenseComplexMatrix {
    assert_eq!(values.len(), matrix.ncols(), "column scale length mismatch");
    let mut output = matrix.clone();
    for row in 0..output.nrows() {
        for (col, value) in values.iter().enumerate() {
            output[(row, col)] *= *value;
        }
    }
    output
}

pub fn block2x2(
    top_left: &DenseComplexMatrix,
    top_right: &DenseComplexMatrix,
    bottom_left: &DenseComplexMatrix,
    bottom_right: &DenseComplexMatrix,
) -> DenseComplexMatrix {
    let upper = top_left.nrows();
    let left = top_left.ncols();
    assert_eq!(top_right.nrows(), upper, "top block row mismatch");
    assert_eq!(bottom_left.ncols(), left, "left block column mismatch");
    assert_eq!(
        bottom_right.nrows(),
        bottom_left.nrows(),
        "bottom block row mismatch"
    );
    assert_eq!(
        bottom_right.ncols(),
        top_right.ncols(),
        "right block column mismatch"
    );

    let nrows = upper + bottom_left.nrows();
    let ncols = left + top_right.ncols();
    let mut output = DenseComplexMatrix::zeros(nrows, ncols);
    copy_into(&mut output, top_left, 0, 0);
    copy_into(&mut output, top_right, 0, left);
    copy_into(&mut output, bottom_left, upper, 0);
    copy_into(&mut output, bottom_right, upper, left);
    output
}

pub fn block_diagonal(first: &DenseComplexMatrix, second: &DenseComplexMatrix) -> DenseComplexMatrix {
    let top_right = DenseComplexMatrix::zeros(first.nrows(), second.ncols());
    let bottom_left = DenseComplexMatrix::zeros(second.nrows(), first.ncols());
    block2x2(first, &top_right, &bottom_left, second)
}

pub fn infinity_norm(matrix: &DenseComplexMatrix) -> f64 {
    let mut best_row_sum: f64 = 0.0;
    for row in 0..matrix.nrows() {
        let mut row_sum = 0.0;
        for col in 0..matrix.ncols() {
            row_sum += matrix[(row, col)].norm();
        }
        best_row_sum = best_row_sum.max(row_sum);
    }
    best_row_sum
}

pub fn is_finite_matrix(matrix: &DenseComplexMatrix) -> bool {
    (0..matrix.nrows())
        .all(|row| (0..matrix.ncols()).all(|col| matrix[(row, col)].is_finite()))
}

#[cfg(test)]
pub(crate) fn dense_from_rows(rows: &[Vec<Complex64>]) -> DenseComplexMatrix {
    let nrows = rows.len();
    let ncols = rows.first().map_or(0, |row| row.len());
    assert!(
        rows.iter().all(|row| row.len() == ncols),
        "all matrix rows must have the same width"
    );

    let mut matrix = DenseComplexMatrix::zeros(nrows, ncols);
    for (row_index, row) in rows.iter().enumerate() {
        for (col_index, value) in row.iter().enumerate() {
            matrix[(row_index, col_index)] = *value;
        }
    }
    matrix
}

fn combine(
    lhs: &DenseComplexMatrix,
    rhs: &DenseComplexMatrix,
    op: impl Fn(Complex64, Complex64) -> Complex64,
) -> DenseComplexMatrix {
    assert_eq!(lhs.nrows(), rhs.nrows(), "row count mismatch");
    assert_eq!(lhs.ncols(), rhs.ncols(), "column count mismatch");

    let mut output = DenseComplexMatrix::zeros(lhs.nrows(), lhs.ncols());
    for row in 0..lhs.nrows() {
        for col in 0..lhs.ncols() {
            output[(row, col)] = op(lhs[(row, col)], rhs[(row, col)]);
        }
    }
    output
}

fn copy_into(
    target: &mut DenseComplexMatrix,
    source: &DenseComplexMatrix,
    row_offset: usize,
    col_offset: usize,
) {
    for row in 0..source.nrows() {
        for col in 0..source.ncols() {
            target[(row_offset + row, col_offset + col)] = source[(row, col)];
        }
    }
}
