extern crate nalgebra as na;

use color_eyre::eyre::{ensure, Result};
use na::{DMatrix,Matrix,Dim,storage::Storage};
use crate::Float;

/**
 * Largest entry of |P - P^T|, relative to the largest entry of |P|.
 */
pub fn relative_asymmetry(covariance: &DMatrix<Float>) -> Float {
    let scale = covariance.abs().max();
    match scale {
        s if s > 0.0 => (covariance - covariance.transpose()).abs().max()/s,
        _ => 0.0
    }
}

pub fn min_eigenvalue(covariance: &DMatrix<Float>) -> Float {
    symmetrized(covariance).symmetric_eigen().eigenvalues.min()
}

pub fn symmetrized(covariance: &DMatrix<Float>) -> DMatrix<Float> {
    (covariance + covariance.transpose())*0.5
}

/**
 * Fails unless the matrix is symmetric PSD up to tol. Both checks are relative to the largest entry.
 */
pub fn ensure_covariance(covariance: &DMatrix<Float>, tol: Float, name: &str) -> Result<()> {
    ensure!(covariance.is_square(), "{} covariance is not square: {}x{}", name, covariance.nrows(), covariance.ncols());
    ensure!(covariance.iter().all(|v| v.is_finite()), "{} covariance contains non finite values", name);

    let asymmetry = relative_asymmetry(covariance);
    ensure!(asymmetry <= tol, "{} covariance lost symmetry: relative asymmetry {:e} > {:e}", name, asymmetry, tol);

    let scale = covariance.abs().max();
    if scale > 0.0 {
        let min_eig = min_eigenvalue(covariance);
        ensure!(min_eig >= -tol*scale, "{} covariance is not positive semi-definite: min eigenvalue {:e}", name, min_eig);
    }
    Ok(())
}

pub fn to_dynamic<R,C,S>(mat: &Matrix<Float,R,C,S>) -> DMatrix<Float> where R: Dim, C: Dim, S: Storage<Float,R,C> {
    DMatrix::<Float>::from_iterator(mat.nrows(), mat.ncols(), mat.iter().cloned())
}
