//! Kernel construction and regularized matrix inversion.
//!
//! `kernel` builds Gaussian similarity matrices and vectors over `ndarray`
//! views; `linalg` bridges them into `nalgebra` for the decomposition work
//! (Cholesky, LU, SVD and pseudo-inverse) behind each inversion strategy.
pub mod kernel;
pub mod linalg;

pub use kernel::{gaussian, kernel_matrix, kernel_vector};
pub use linalg::regularized_inverse;
