extern crate nalgebra as na;

use na::{Vector,Vector3,Vector6,Matrix3,Matrix4,Matrix6,U3,U1,base::storage::Storage};
use crate::{Float, float};

/// Below this rotation angle the exponential and logarithm switch to their Taylor expansions.
const SMALL_ANGLE: Float = 1e-4;
/// Within this distance of pi the rotation axis of the logarithm is taken from the symmetric part.
const NEAR_PI: Float = 1e-3;

pub fn skew_symmetric<T>(w: &Vector<Float,U3,T>) -> Matrix3<Float> where T: Storage<Float,U3,U1>  {
    Matrix3::<Float>::new(0.0, -w[2], w[1],
                          w[2], 0.0, -w[0],
                          -w[1], w[0], 0.0)
}

pub fn vector_from_skew_symmetric(w_x: &Matrix3<Float>) -> Vector3<Float> {
    Vector3::<Float>::new(w_x[(2,1)],w_x[(0,2)],w_x[(1,0)])
}

/**
 * Twist (v,w) -> se(3). Linear part first, angular part second.
 */
pub fn hat(twist: &Vector6<Float>) -> Matrix4<Float> {
    let mut res = Matrix4::<Float>::zeros();
    res.fixed_view_mut::<3,3>(0,0).copy_from(&skew_symmetric(&twist.fixed_rows::<3>(3)));
    res.fixed_view_mut::<3,1>(0,3).copy_from(&twist.fixed_rows::<3>(0));
    res
}

pub fn vee(twist_hat: &Matrix4<Float>) -> Vector6<Float> {
    let w = vector_from_skew_symmetric(&twist_hat.fixed_view::<3,3>(0,0).into_owned());
    let mut res = Vector6::<Float>::zeros();
    res.fixed_rows_mut::<3>(0).copy_from(&twist_hat.fixed_view::<3,1>(0,3));
    res.fixed_rows_mut::<3>(3).copy_from(&w);
    res
}

/**
 * The "curly hat" of a twist: ad(xi) = [[w^, v^],[0, w^]]
 */
pub fn adjoint6(twist: &Vector6<Float>) -> Matrix6<Float> {
    let v_x = skew_symmetric(&twist.fixed_rows::<3>(0));
    let w_x = skew_symmetric(&twist.fixed_rows::<3>(3));
    let mut res = Matrix6::<Float>::zeros();
    res.fixed_view_mut::<3,3>(0,0).copy_from(&w_x);
    res.fixed_view_mut::<3,3>(0,3).copy_from(&v_x);
    res.fixed_view_mut::<3,3>(3,3).copy_from(&w_x);
    res
}

/**
 * Adjoint of a rigid transform: Ad(T) = [[R, p^R],[0, R]]
 * Satisfies hat(Ad(T)*xi) = T*hat(xi)*T^-1
 */
#[allow(non_snake_case)]
pub fn pose_adjoint(pose: &Matrix4<Float>) -> Matrix6<Float> {
    let R = pose.fixed_view::<3,3>(0,0).into_owned();
    let p_x = skew_symmetric(&pose.fixed_view::<3,1>(0,3));
    let mut res = Matrix6::<Float>::zeros();
    res.fixed_view_mut::<3,3>(0,0).copy_from(&R);
    res.fixed_view_mut::<3,3>(0,3).copy_from(&(p_x*R));
    res.fixed_view_mut::<3,3>(3,3).copy_from(&R);
    res
}

/**
 * Coefficients sin(t)/t, (1-cos(t))/t^2, (t-sin(t))/t^3
 */
#[allow(non_snake_case)]
fn rodrigues_coefficients(omega: Float) -> (Float, Float, Float) {
    match omega {
        o if o < SMALL_ANGLE => {
            let omega_sqr = o*o;
            (1.0 - omega_sqr/6.0, 0.5 - omega_sqr/24.0, 1.0/6.0 - omega_sqr/120.0)
        },
        o => {
            let omega_sqr = o*o;
            let A = o.sin()/o;
            let B = (1.0 - o.cos())/omega_sqr;
            let C = (1.0 - A)/omega_sqr;
            (A,B,C)
        }
    }
}

/**
 * Closed form SE(3) exponential of a twist (v,w).
 */
#[allow(non_snake_case)]
pub fn exp(twist: &Vector6<Float>) -> Matrix4<Float> {
    let u = twist.fixed_rows::<3>(0);
    let w = twist.fixed_rows::<3>(3);
    let (A,B,C) = rodrigues_coefficients(w.norm());

    let w_x = skew_symmetric(&w);
    let w_x_sqr = w_x*w_x;
    let I = Matrix3::<Float>::identity();
    let R = I + A*w_x + B*w_x_sqr;
    let V = I + B*w_x + C*w_x_sqr;
    let t = V*u;

    let mut res = Matrix4::<Float>::identity();
    res.fixed_view_mut::<3,3>(0,0).copy_from(&R);
    res.fixed_view_mut::<3,1>(0,3).copy_from(&t);
    res
}

/**
 * Matrix exponential for matrices in hat form. The bottom row of the input is ignored.
 */
pub fn exponential(twist_hat: &Matrix4<Float>) -> Matrix4<Float> {
    exp(&vee(twist_hat))
}

/**
 * exp(adjoint6(xi)) = Ad(exp(hat(xi)))
 */
pub fn exp_adjoint(twist: &Vector6<Float>) -> Matrix6<Float> {
    pose_adjoint(&exp(twist))
}

/**
 * Right multiplicative retraction. Every pose update goes through here.
 */
pub fn compose(pose: &Matrix4<Float>, twist: &Vector6<Float>) -> Matrix4<Float> {
    pose*exponential(&hat(twist))
}

/**
 * Rotation vector of R. The angle comes from atan2 so it stays accurate near 0 and pi.
 * Close to pi the antisymmetric part vanishes, there the axis is read off the symmetric part
 * (R + R^T)/2 - cos(w) I = (1 - cos(w)) a a^T and only its sign is taken from R - R^T.
 */
#[allow(non_snake_case)]
pub fn ln_SO3(R: &Matrix3<Float>) -> Vector3<Float> {
    let antisymmetric = vector_from_skew_symmetric(&(R-R.transpose()));
    let cos_omega = (R.trace() - 1.0)/2.0;
    let sin_omega = antisymmetric.norm()/2.0;
    let omega = sin_omega.atan2(cos_omega);

    match omega {
        o if o < SMALL_ANGLE => (0.5 + o*o/12.0)*antisymmetric,
        o if float::consts::PI - o < NEAR_PI => {
            let aa_t = ((R + R.transpose())/2.0 - cos_omega*Matrix3::<Float>::identity())/(1.0 - cos_omega);
            let imax = aa_t.diagonal().imax();
            let axis = aa_t.column(imax)/aa_t[(imax,imax)].sqrt();
            match axis.dot(&antisymmetric) < 0.0 {
                true => -o*axis,
                false => o*axis
            }
        },
        o => o/(2.0*o.sin())*antisymmetric
    }
}

#[allow(non_snake_case)]
pub fn ln(se3: &Matrix4<Float>) -> Vector6<Float> {
    let w = ln_SO3(&se3.fixed_view::<3,3>(0,0).into_owned());
    let w_x = skew_symmetric(&w);
    let w_x_sqr = w_x*w_x;
    let omega = w.norm();
    let factor = match omega {
        o if o < SMALL_ANGLE => 1.0/12.0 + o*o/720.0,
        o => {
            let (A,B,_) = rodrigues_coefficients(o);
            (1.0-A/(2.0*B))/(o*o)
        }
    };

    let I = Matrix3::<Float>::identity();
    let V_inv = I-0.5*w_x +factor*w_x_sqr;
    let u = V_inv*se3.fixed_view::<3,1>(0,3);

    let mut res = Vector6::<Float>::zeros();
    res.fixed_rows_mut::<3>(0).copy_from(&u);
    res.fixed_rows_mut::<3>(3).copy_from(&w);
    res
}
