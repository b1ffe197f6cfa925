pub mod dense;
pub mod eigen;
pub mod linalg;

pub use eigen::{
    decompose_with_retry, EigenDecomposition, EigenError, EigenOptions, EigenSolver,
    QrEigenSolver,
};
pub use linalg::{invert_checked, inversion_residual, lu_invert, LuError, LuFactors};

use faer::Mat;
use num_complex::Complex64;

pub type DenseComplexMatrix = Mat<Complex64>;

/// Neumaier-compensated sum, so that efficiencies of very different size
/// add up without losing the small ones.
pub fn stable_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, compensation) = values.into_iter().fold((0.0_f64, 0.0_f64), |(sum, lost), value| {
        let next = sum + value;
        let dropped = if sum.abs() >= value.abs() {
            (sum - next) + value
        } else {
            (value - next) + sum
        };
        (next, lost + dropped)
    });
    sum + compensation
}

/// `|lhs - rhs| <= tolerance * max(|lhs|, |rhs|)`.
pub fn relatively_close(lhs: f64, rhs: f64, tolerance: f64) -> bool {
    (lhs - rhs).abs() <= tolerance * lhs.abs().max(rhs.abs())
}

/// Principal square root with the branch cut moved so that the result has
/// `re >= 0` and, on the imaginary axis, `im >= 0`.
pub fn causal_sqrt(value: Complex64) -> Complex64 {
    let root = value.sqrt();
    let tie = f64::EPSILON * root.norm().max(1.0);
    if root.re < -tie || (root.re.abs() <= tie && root.im < 0.0) {
        -root
    } else {
        root
    }
}
