extern crate nalgebra as na;

use color_eyre::eyre::Result;
use na::{DMatrix,DVector,Matrix4,Matrix4xX};
use crate::Float;
use crate::numerics::covariance::{ensure_covariance, symmetrized};
use crate::slam::{degeneracy::Degeneracy, runtime_parameters::CovarianceUpdate};

/// Squared ratio of the smallest to the largest Cholesky pivot below which S is treated as singular.
const ILL_CONDITIONED_RATIO: Float = 1e-12;

/**
 * K = P H^T (H P H^T + V)^-1
 *
 * S is factored with Cholesky and K^T = S^-1 H P is solved for, P and S being symmetric.
 */
#[allow(non_snake_case)]
pub fn kalman_gain(covariance_prior: &DMatrix<Float>, jacobian: &DMatrix<Float>, observation_noise: &DMatrix<Float>) -> std::result::Result<DMatrix<Float>, Degeneracy> {
    let PH_t = covariance_prior*jacobian.transpose();
    let S = symmetrized(&(jacobian*&PH_t + observation_noise));
    let cholesky = S.cholesky().ok_or(Degeneracy::SingularInnovationCovariance)?;

    let pivots = cholesky.l_dirty().diagonal();
    let ratio = (pivots.min()/pivots.max()).powi(2);
    if !(ratio >= ILL_CONDITIONED_RATIO) {
        return Err(Degeneracy::IllConditionedInnovationCovariance { ratio });
    }

    let gain = cholesky.solve(&PH_t.transpose()).transpose();
    match gain.iter().all(|v| v.is_finite()) {
        true => Ok(gain),
        false => Err(Degeneracy::NonFiniteGain)
    }
}

/**
 * Covariance after a correction. Pose and landmark updates both go through here.
 */
#[allow(non_snake_case)]
pub fn corrected_covariance(covariance_prior: &DMatrix<Float>, gain: &DMatrix<Float>, jacobian: &DMatrix<Float>, observation_noise: &DMatrix<Float>, form: CovarianceUpdate, tol: Float, name: &str) -> Result<DMatrix<Float>> {
    let n = covariance_prior.nrows();
    let I_KH = DMatrix::<Float>::identity(n,n) - gain*jacobian;
    let corrected = match form {
        CovarianceUpdate::Standard => &I_KH*covariance_prior,
        CovarianceUpdate::Joseph => &I_KH*covariance_prior*I_KH.transpose() + gain*observation_noise*gain.transpose()
    };
    ensure_covariance(&corrected, tol, name)?;
    Ok(symmetrized(&corrected))
}

/**
 * Block diagonal noise for k stacked stereo observations
 */
pub fn observation_noise_block(noise: &Matrix4<Float>, k: usize) -> DMatrix<Float> {
    let mut block = DMatrix::<Float>::zeros(4*k,4*k);
    for i in 0..k {
        block.fixed_view_mut::<4,4>(4*i,4*i).copy_from(noise);
    }
    block
}

/**
 * 4xk pixel matrix flattened landmark by landmark: (uL_0,vL_0,uR_0,vR_0,uL_1,...)
 */
pub fn stack_observations(pixels: &Matrix4xX<Float>) -> DVector<Float> {
    DVector::<Float>::from_column_slice(pixels.as_slice())
}
