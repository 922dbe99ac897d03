extern crate nalgebra as na;

use na::{DMatrix, DVector, Matrix3};
use na::linalg::SVD;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use crate::kinematic_traits::{Configuration, FrameId, KinematicModel, Pose, ReferenceFrame};
use crate::se3::{log6, skew};

/// Damped least squares velocity that reduces the task error:
/// `Jᵗ (J Jᵗ + λI)⁻¹ error`
///
/// # Arguments
///
/// * `jacobian` - m x n task Jacobian
/// * `error` - task error with m rows
/// * `damping` - λ, regularizes near singular Jacobians
///
/// # Returns
///
/// Joint velocity with n rows. The caller negates it to move against the error.
///
/// This is computed through the singular value decomposition `J = U Σ Vᵗ`, as
/// `V diag(σ / (σ² + λ)) Uᵗ error` that is the same expression but remains finite
/// when the Jacobian loses rank. Directions with σ² + λ = 0 are not moved.
/// An empty Jacobian gives the zero velocity.
pub fn dls_velocity(jacobian: &DMatrix<f64>, error: &DVector<f64>, damping: f64) -> DVector<f64> {
    let n = jacobian.ncols();
    if n == 0 || jacobian.nrows() == 0 || jacobian.nrows() != error.len()
        || !error.iter().all(|e| e.is_finite()) {
        return DVector::zeros(n);
    }
    let svd = SVD::new(jacobian.clone(), true, true);
    let (Some(u), Some(v_t)) = (svd.u.as_ref(), svd.v_t.as_ref()) else {
        return DVector::zeros(n);
    };
    let mut projected = u.transpose() * error;
    for (i, sigma) in svd.singular_values.iter().enumerate() {
        let denominator = sigma * sigma + damping;
        projected[i] = if denominator > 0.0 {
            projected[i] * sigma / denominator
        } else {
            0.0
        };
    }
    v_t.transpose() * projected
}

/// Re-expresses a LOCAL Jacobian (linear rows first) of the frame with the given placement
/// in the requested convention.
pub fn change_reference(local: &DMatrix<f64>, placement: &Pose, reference: ReferenceFrame) -> DMatrix<f64> {
    if reference == ReferenceFrame::Local {
        return local.clone();
    }
    let rotation: Matrix3<f64> = placement.rotation.to_rotation_matrix().into_inner();
    let mut result = DMatrix::zeros(6, local.ncols());
    for c in 0..local.ncols() {
        let linear = rotation * local.fixed_view::<3, 1>(0, c);
        let angular = rotation * local.fixed_view::<3, 1>(3, c);
        let linear = match reference {
            // Velocity of the point of the moving body that is currently at the world origin.
            ReferenceFrame::World => linear - skew(&angular) * placement.translation.vector,
            _ => linear,
        };
        result.fixed_view_mut::<3, 1>(0, c).copy_from(&linear);
        result.fixed_view_mut::<3, 1>(3, c).copy_from(&angular);
    }
    result
}

/// Function to compute the Jacobian of a frame by finite differences
///
/// # Arguments
///
/// * `model` - The kinematic model
/// * `q` - The configuration
/// * `frame` - The frame, normally the end effector
/// * `reference` - Convention of the returned Jacobian
/// * `epsilon` - A small value used for numerical differentiation
///
/// # Returns
///
/// A 6 x nv matrix, linear rows first. Column i is the logarithm of the
/// relative frame motion caused by perturbing velocity component i by epsilon,
/// divided by epsilon.
pub fn numeric_frame_jacobian<M>(model: &M, q: &Configuration, frame: FrameId,
                                 reference: ReferenceFrame, epsilon: f64) -> DMatrix<f64>
where
    M: KinematicModel + ?Sized,
{
    let nv = model.nv();
    let current = model.frame_placement(q, frame);
    let current_inverse = current.inverse();

    let column = |i: usize| {
        let mut dv = DVector::zeros(nv);
        dv[i] = epsilon;
        let perturbed = model.frame_placement(&model.integrate(q, &dv), frame);
        log6(&(current_inverse * perturbed)) / epsilon
    };

    #[cfg(feature = "parallel")]
    let columns: Vec<_> = (0..nv).into_par_iter().map(column).collect();
    #[cfg(not(feature = "parallel"))]
    let columns: Vec<_> = (0..nv).map(column).collect();

    let mut local = DMatrix::zeros(6, nv);
    for (i, delta) in columns.into_iter().enumerate() {
        local.fixed_view_mut::<6, 1>(0, i).copy_from(&delta);
    }
    change_reference(&local, &current, reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dls_full_rank_matches_inverse() {
        let jacobian = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 0.0, 1.0]);
        let error = DVector::from_vec(vec![3.0, 1.0]);
        let v = dls_velocity(&jacobian, &error, 1e-12);
        // Exact solution of J v = error
        assert!((v[0] - 1.0).abs() < 1e-6, "{}", v);
        assert!((v[1] - 1.0).abs() < 1e-6, "{}", v);
    }

    #[test]
    fn test_dls_rank_deficient_is_finite() {
        // Two parallel columns, error outside of the column space.
        let jacobian = DMatrix::from_row_slice(6, 2, &[
            0.0, 0.0,
            2.0, 1.0,
            0.0, 0.0,
            0.0, 0.0,
            0.0, 0.0,
            0.0, 0.0,
        ]);
        let error = DVector::from_vec(vec![0.5, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let v = dls_velocity(&jacobian, &error, 1e-12);
        assert!(v.iter().all(|x| x.is_finite()));
        assert!(v.norm() < 1e-3, "{}", v);
    }

    #[test]
    fn test_dls_zero_jacobian_without_damping() {
        let jacobian = DMatrix::zeros(6, 3);
        let error = DVector::from_element(6, 1.0);
        let v = dls_velocity(&jacobian, &error, 0.0);
        assert_eq!(v, DVector::zeros(3));
    }

    #[test]
    fn test_dls_empty_jacobian() {
        let v = dls_velocity(&DMatrix::zeros(6, 0), &DVector::from_element(6, 1.0), 1e-12);
        assert_eq!(v.len(), 0);
        let v = dls_velocity(&DMatrix::zeros(0, 2), &DVector::zeros(0), 1e-12);
        assert_eq!(v, DVector::zeros(2));
    }

    #[test]
    fn test_dls_rejects_non_finite_error() {
        let jacobian = DMatrix::identity(3, 3);
        let error = DVector::from_vec(vec![1.0, f64::NAN, 0.0]);
        let v = dls_velocity(&jacobian, &error, 1e-12);
        assert_eq!(v, DVector::zeros(3));
    }
}
