//! Gaussian kernel evaluation over feature rows.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

/// Gaussian (RBF) similarity between two feature rows:
/// `exp(-||a - b||^2 / (2 * sigma^2))`.
///
/// Returns 1.0 for identical rows and decays toward 0.0 with distance;
/// `sigma` controls how quickly.
pub fn gaussian(a: ArrayView1<f64>, b: ArrayView1<f64>, sigma: f64) -> f64 {
    let mut sq_dist = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let d = x - y;
        sq_dist += d * d;
    }
    (-sq_dist / (2.0 * sigma * sigma)).exp()
}

/// Pairwise kernel matrix of a row set against itself.
///
/// The result is symmetric with a unit diagonal, so only the upper triangle
/// is evaluated and mirrored.
pub fn kernel_matrix<F>(rows: ArrayView2<f64>, sigma: f64, kernel: &F) -> Array2<f64>
where
    F: Fn(ArrayView1<f64>, ArrayView1<f64>, f64) -> f64,
{
    let n = rows.nrows();
    let mut k = Array2::zeros((n, n));
    for i in 0..n {
        k[(i, i)] = kernel(rows.row(i), rows.row(i), sigma);
        for j in (i + 1)..n {
            let value = kernel(rows.row(i), rows.row(j), sigma);
            k[(i, j)] = value;
            k[(j, i)] = value;
        }
    }
    k
}

/// Kernel similarities of one query row against every row of a set.
pub fn kernel_vector<F>(
    rows: ArrayView2<f64>,
    query: ArrayView1<f64>,
    sigma: f64,
    kernel: &F,
) -> Array1<f64>
where
    F: Fn(ArrayView1<f64>, ArrayView1<f64>, f64) -> f64,
{
    let n = rows.nrows();
    let mut k = Array1::zeros(n);
    for i in 0..n {
        k[i] = kernel(rows.row(i), query, sigma);
    }
    k
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn gaussian_is_one_for_identical_rows() {
        let a = array![1.0, 2.0, 3.0];
        let value = gaussian(a.view(), a.view(), 0.5);
        assert!((value - 1.0).abs() < 1e-12);
    }

    #[test]
    fn gaussian_decays_with_distance() {
        let a = array![0.0, 0.0];
        let near = array![0.1, 0.0];
        let far = array![3.0, 0.0];
        let k_near = gaussian(a.view(), near.view(), 1.0);
        let k_far = gaussian(a.view(), far.view(), 1.0);
        assert!(k_near > k_far);
        assert!(k_far > 0.0);
        // exp(-0.01/2) and exp(-9/2) against hand-computed values
        assert!((k_near - (-0.005f64).exp()).abs() < 1e-12);
        assert!((k_far - (-4.5f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn kernel_matrix_is_symmetric_with_unit_diagonal() {
        let rows = array![[0.0, 0.0], [1.0, 0.0], [0.0, 2.0]];
        let k = kernel_matrix(rows.view(), 1.0, &gaussian);
        assert_eq!(k.dim(), (3, 3));
        for i in 0..3 {
            assert!((k[(i, i)] - 1.0).abs() < 1e-12);
            for j in 0..3 {
                assert!((k[(i, j)] - k[(j, i)]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn kernel_vector_matches_matrix_column() {
        let rows = array![[0.0, 0.0], [1.0, 1.0], [2.0, 0.0]];
        let k = kernel_matrix(rows.view(), 0.8, &gaussian);
        let v = kernel_vector(rows.view(), rows.row(1), 0.8, &gaussian);
        for i in 0..3 {
            assert!((v[i] - k[(i, 1)]).abs() < 1e-12);
        }
    }
}
