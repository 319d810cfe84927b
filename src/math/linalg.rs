//! Inversion strategies for per-class kernel matrices.

use nalgebra::DMatrix;
use ndarray::Array2;

use crate::config::{check_strategy_pairing, InversionMethod, RegularizationMethod};
use crate::error::PerturboError;

/// Singular values at or below this threshold count as zero when forming
/// pseudo-inverses.
const PINV_EPS: f64 = 1e-10;

/// Copy an `ndarray` matrix into a `nalgebra::DMatrix`, column by column to
/// match `DMatrix` storage order.
fn to_dmatrix(m: &Array2<f64>) -> DMatrix<f64> {
    let (rows, cols) = m.dim();
    let mut out = DMatrix::<f64>::zeros(rows, cols);
    for j in 0..cols {
        for i in 0..rows {
            out[(i, j)] = m[[i, j]];
        }
    }
    out
}

fn from_dmatrix(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Invert a kernel matrix under the configured strategies.
///
/// Tikhonov regularization adds `regul` to the diagonal before inversion;
/// truncated-spectrum regularization keeps the top `regul`-fraction of
/// singular values inside the SVD branch. `sigma` and `regul` are carried
/// into any `Numerical` error so failures name the grid cell that caused
/// them.
///
/// # Arguments
/// * `kernel` - Square kernel matrix to invert.
/// * `inversion` - Decomposition used for the inverse.
/// * `regularization` - Conditioning applied before (or during) inversion.
/// * `sigma` - Kernel bandwidth the matrix was built with, for error context.
/// * `regul` - Regularization strength, or spectrum fraction for trunc.
///
/// # Returns
/// The (pseudo-)inverse, or a `Numerical` error when the decomposition
/// cannot produce one.
pub fn regularized_inverse(
    kernel: &Array2<f64>,
    inversion: InversionMethod,
    regularization: RegularizationMethod,
    sigma: f64,
    regul: f64,
) -> Result<Array2<f64>, PerturboError> {
    check_strategy_pairing(inversion, regularization)?;

    let n = kernel.nrows();
    let mut working = to_dmatrix(kernel);
    if regularization == RegularizationMethod::Tikhonov {
        for i in 0..n {
            working[(i, i)] += regul;
        }
    }

    let inverse = match inversion {
        InversionMethod::Cholesky => working
            .cholesky()
            .map(|decomposition| decomposition.inverse())
            .ok_or_else(|| {
                PerturboError::numerical(
                    inversion,
                    sigma,
                    regul,
                    "kernel matrix is not positive definite",
                )
            })?,
        InversionMethod::Solve => working.lu().try_inverse().ok_or_else(|| {
            PerturboError::numerical(inversion, sigma, regul, "kernel matrix is singular")
        })?,
        InversionMethod::MoorePenrose => working
            .pseudo_inverse(PINV_EPS)
            .map_err(|detail| PerturboError::numerical(inversion, sigma, regul, detail))?,
        InversionMethod::Svd => {
            let result = if regularization == RegularizationMethod::Trunc {
                truncated_svd_inverse(working, regul)
            } else {
                working.svd(true, true).pseudo_inverse(PINV_EPS)
            };
            result.map_err(|detail| PerturboError::numerical(inversion, sigma, regul, detail))?
        }
    };

    Ok(from_dmatrix(&inverse))
}

/// Pseudo-inverse rebuilt from the top `fraction` of the singular spectrum.
///
/// Keeps `ceil(fraction * n)` singular values (at least one), zeroing the
/// rest before reconstructing `V S^-1 U^T`.
fn truncated_svd_inverse(m: DMatrix<f64>, fraction: f64) -> Result<DMatrix<f64>, &'static str> {
    let n = m.nrows();
    let svd = m.svd(true, true);
    let u = svd.u.as_ref().ok_or("svd produced no left singular vectors")?;
    let v_t = svd
        .v_t
        .as_ref()
        .ok_or("svd produced no right singular vectors")?;
    let s = &svd.singular_values;

    // Walk the spectrum largest singular value first.
    let mut order: Vec<usize> = (0..s.len()).collect();
    order.sort_by(|&a, &b| s[b].partial_cmp(&s[a]).unwrap_or(std::cmp::Ordering::Equal));
    let keep = ((fraction * n as f64).ceil() as usize).clamp(1, s.len());

    let mut inverse = DMatrix::<f64>::zeros(n, n);
    for &k in order.iter().take(keep) {
        if s[k] <= PINV_EPS {
            continue;
        }
        let inv_s = 1.0 / s[k];
        for r in 0..n {
            let left = v_t[(k, r)] * inv_s;
            for c in 0..n {
                inverse[(r, c)] += left * u[(c, k)];
            }
        }
    }
    Ok(inverse)
}
