//! The block Davidson iteration driver.
//!
//! ** NOTE: We recommend using the high-level method [`crate::solvers::davidson`] instead. This
//! module is intended for use cases where fine-grained control over the iteration is required.
//!
//! The driver in [`davidson_iterate`] runs the bounded outer loop of the
//! method: apply the operator to the search basis, project and solve the small
//! Rayleigh–Ritz problem, form Ritz vectors and the residual block, test
//! convergence, then grow or restart the basis with the preconditioned
//! residual and re-orthonormalize.
//!
//! Memory is dominated by the n×m search basis and the equally sized applied
//! block, with m bounded by the configured restart threshold. The projected
//! problem is m×m and therefore cheap; all heavy lifting is in the two
//! operator applications per iteration and the QR of the candidate basis.
//!
//! ## When to use this module directly
//!
//! - You want a per-iteration monitoring callback (convergence studies,
//!   logging, early cancellation)
//! - You want to supply a preconditioner and a callback at the same time
//!
//! For normal usage, prefer [`crate::solvers::davidson`] which provides a
//! simpler interface.

use faer::{
    traits::{ComplexField, RealField},
    Mat, MatRef,
};

use super::{orthonormal_basis, rayleigh_ritz, DavidsonCallback, DavidsonConfig, DavidsonStep, Eigenpairs};
use crate::error::{DavidsonError, DavidsonErrorKind};
use crate::operator::LinearOperator;

/// Runs the block Davidson iteration until convergence, cancellation, or
/// exhaustion of the iteration budget.
///
/// The initial basis must have orthonormal columns (validated here up to
/// `sqrt(ε)`; the solver never re-normalizes the caller's guess, only the
/// bases it builds itself). Each iteration extracts the `nev` lowest Ritz
/// pairs from the current space; once the whole-block residual norm drops
/// below the tolerance the current Ritz pairs are returned immediately.
///
/// When the space would outgrow the restart threshold, the basis history is
/// discarded and the space re-seeded from the current Ritz vectors plus the
/// newest preconditioned residual, bounding memory and projected-problem cost
/// at the expense of potentially slower convergence.
///
/// # Arguments
/// * `operator`: The symmetric/Hermitian operator to diagonalize.
/// * `preconditioner`: Maps the residual block to a correction block. Use
///   [`crate::operator::IdentityOperator`] for the unpreconditioned method.
/// * `initial_basis`: n×m0 column-orthonormal starting guess, `m0 >= nev`.
/// * `nev`: Number of lowest eigenpairs sought.
/// * `config`: Iteration budget, tolerance, and restart threshold; see
///   [`DavidsonConfig`] for the default-derivation rules.
/// * `callback`: An optional mutable reference to a callback function invoked
///   once per iteration; returning `false` cancels the solve.
///
/// # Returns
/// A [`Result`] containing the converged [`Eigenpairs`] on success. Failure is
/// never partial: an unconverged or cancelled solve reports diagnostics via
/// [`DavidsonError`], not a degraded set of eigenpairs.
pub fn davidson_iterate<T, O, M>(
    operator: &O,
    preconditioner: &M,
    initial_basis: MatRef<'_, T>,
    nev: usize,
    config: &DavidsonConfig<T::Real>,
    mut callback: Option<&mut DavidsonCallback<'_, T::Real>>,
) -> Result<Eigenpairs<T>, DavidsonError<T::Real>>
where
    T: ComplexField,
    T::Real: RealField,
    O: LinearOperator<T>,
    M: LinearOperator<T>,
{
    let n = initial_basis.nrows();
    let m0 = initial_basis.ncols();
    let resolved = config.resolve(n, m0);

    validate_inputs(
        operator,
        preconditioner,
        initial_basis,
        nev,
        resolved.max_subspace,
    )?;

    let mut basis = initial_basis.to_owned();
    let mut last_residual_norm = T::Real::infinity_impl();

    for iteration in 1..=resolved.max_iter {
        let m = basis.ncols();

        // The dominant cost: one operator application per basis column.
        let applied = operator.apply(basis.as_ref());

        let pairs = rayleigh_ritz(basis.as_ref(), applied.as_ref(), nev, iteration)?;

        // Ritz vectors X = S Y and residual block R = (A S) Y - X Λ.
        let ritz_vectors = &basis * &pairs.coefficients;
        let lambda = Mat::from_fn(nev, nev, |i, j| {
            if i == j {
                T::from_real_impl(&pairs.values[i])
            } else {
                T::zero_impl()
            }
        });
        let residual = &applied * &pairs.coefficients - &ritz_vectors * &lambda;

        let residual_norm = residual.norm_l2();
        if !T::Real::is_finite_impl(&residual_norm) {
            return Err(DavidsonErrorKind::NonFinite { iteration }.into());
        }
        last_residual_norm = T::Real::copy_impl(&residual_norm);

        log::debug!(
            "davidson iteration {iteration}: subspace dim {m}, residual norm {residual_norm:?}",
        );

        if residual_norm < resolved.tol {
            return Ok(Eigenpairs {
                eigenvalues: pairs.values,
                eigenvectors: ritz_vectors,
                iterations: iteration,
                residual_norm,
            });
        }

        // External monitoring; a `false` return is a graceful cancellation.
        if let Some(ref mut cb) = callback {
            let step = DavidsonStep {
                iteration,
                subspace_dim: m,
                ritz_values: &pairs.values,
                residual_norm: &residual_norm,
            };
            if !cb(&step) {
                log::debug!("davidson iteration {iteration}: cancelled by callback");
                return Err(DavidsonErrorKind::NotConverged {
                    iterations: iteration,
                    residual_norm,
                }
                .into());
            }
        }

        let correction = preconditioner.apply(residual.as_ref());

        // Expansion/restart decision, evaluated before orthogonalization. The
        // threshold bounds the space the *expansion* path may build; a restart
        // re-seeds from the Ritz block plus the newest correction even when
        // nev == m0 == max_subspace forces it on every iteration.
        let raw = if m + nev > resolved.max_subspace {
            log::trace!("davidson iteration {iteration}: restarting subspace (dim {m})");
            hcat(ritz_vectors.as_ref(), correction.as_ref())
        } else {
            hcat(basis.as_ref(), correction.as_ref())
        };

        basis = orthonormal_basis(raw.as_ref(), nev);
    }

    Err(DavidsonErrorKind::NotConverged {
        iterations: resolved.max_iter,
        residual_norm: last_residual_norm,
    }
    .into())
}

/// Fail-fast validation, performed before any operator application.
fn validate_inputs<T, O, M>(
    operator: &O,
    preconditioner: &M,
    initial_basis: MatRef<'_, T>,
    nev: usize,
    max_subspace: usize,
) -> Result<(), DavidsonError<T::Real>>
where
    T: ComplexField,
    T::Real: RealField,
    O: LinearOperator<T>,
    M: LinearOperator<T>,
{
    let n = initial_basis.nrows();
    let m0 = initial_basis.ncols();

    if operator.nrows() != operator.ncols() {
        return Err(DavidsonErrorKind::InvalidInput(format!(
            "The operator must be square; got {}x{}.",
            operator.nrows(),
            operator.ncols(),
        ))
        .into());
    }
    if operator.nrows() != n {
        return Err(DavidsonErrorKind::DimensionMismatch {
            context: "initial basis",
            expected: operator.nrows(),
            actual: n,
        }
        .into());
    }
    if preconditioner.nrows() != n || preconditioner.ncols() != n {
        // Report whichever dimension is wrong; with a square-but-wrong shape
        // either one carries the diagnostic.
        let actual = if preconditioner.nrows() != n {
            preconditioner.nrows()
        } else {
            preconditioner.ncols()
        };
        return Err(DavidsonErrorKind::DimensionMismatch {
            context: "preconditioner",
            expected: n,
            actual,
        }
        .into());
    }
    if nev == 0 {
        return Err(
            DavidsonErrorKind::InvalidInput("`nev` must be at least 1.".to_string()).into(),
        );
    }
    if nev > m0 {
        return Err(DavidsonErrorKind::InvalidInput(
            "`nev` must not exceed the number of columns of the initial basis.".to_string(),
        )
        .into());
    }
    if m0 > max_subspace {
        return Err(DavidsonErrorKind::InvalidInput(format!(
            "The initial basis has {m0} columns but `max_subspace` is {max_subspace}.",
        ))
        .into());
    }

    // Orthonormality check: ‖Bᴴ B - I‖ stays at O(n ε) for any basis produced
    // by a QR factorization, so sqrt(ε) separates legitimate bases from
    // unnormalized or linearly dependent input with a wide margin.
    let gram = initial_basis.adjoint() * initial_basis;
    let identity = Mat::<T>::identity(m0, m0);
    let defect = (&gram - &identity).norm_l2();
    let ortho_tol = T::Real::sqrt_impl(&T::Real::epsilon_impl());
    if !T::Real::is_finite_impl(&defect) || defect > ortho_tol {
        return Err(DavidsonErrorKind::InvalidInput(
            "The initial basis must have orthonormal columns.".to_string(),
        )
        .into());
    }

    Ok(())
}

/// Horizontal concatenation into a freshly allocated matrix.
fn hcat<T: ComplexField>(left: MatRef<'_, T>, right: MatRef<'_, T>) -> Mat<T> {
    debug_assert_eq!(left.nrows(), right.nrows());
    let n = left.nrows();
    let (l, r) = (left.ncols(), right.ncols());

    let mut out = Mat::zeros(n, l + r);
    out.as_mut().get_mut(.., 0..l).copy_from(left);
    out.as_mut().get_mut(.., l..l + r).copy_from(right);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{IdentityOperator, MatrixFreeOperator};
    use faer::mat;

    fn diag_operator(entries: &[f64]) -> Mat<f64> {
        Mat::from_fn(entries.len(), entries.len(), |i, j| {
            if i == j {
                entries[i]
            } else {
                0.0
            }
        })
    }

    #[test]
    fn test_hcat_layout() {
        let left: Mat<f64> = mat![[1.0], [2.0]];
        let right: Mat<f64> = mat![[3.0, 4.0], [5.0, 6.0]];
        let combined = hcat(left.as_ref(), right.as_ref());
        assert_eq!(combined, mat![[1.0, 3.0, 4.0], [2.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_rejects_nev_larger_than_guess() {
        let a = diag_operator(&[1.0, 2.0, 3.0, 4.0]);
        let guess = Mat::<f64>::identity(4, 1);
        let err = davidson_iterate(
            &a,
            &IdentityOperator::new(4),
            guess.as_ref(),
            2,
            &DavidsonConfig::default(),
            None,
        )
        .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_rejects_oversized_initial_basis() {
        let a = diag_operator(&[1.0, 2.0, 3.0, 4.0]);
        let guess = Mat::<f64>::identity(4, 3);
        let config = DavidsonConfig::default().with_max_subspace(2);
        let err = davidson_iterate(
            &a,
            &IdentityOperator::new(4),
            guess.as_ref(),
            1,
            &config,
            None,
        )
        .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_rejects_non_orthonormal_guess() {
        let a = diag_operator(&[1.0, 2.0, 3.0]);
        // Scaled columns: unit-norm invariant violated by a factor of 2.
        let guess = Mat::<f64>::from_fn(3, 2, |i, j| if i == j { 2.0 } else { 0.0 });
        let err = davidson_iterate(
            &a,
            &IdentityOperator::new(3),
            guess.as_ref(),
            1,
            &DavidsonConfig::default(),
            None,
        )
        .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_preconditioner_mismatch_reports_offending_dimension() {
        let a = diag_operator(&[1.0, 2.0, 3.0]);
        let guess = Mat::<f64>::identity(3, 1);
        // Correct row count, wrong column count: the diagnostic must name the
        // dimension that is actually wrong.
        let precond =
            MatrixFreeOperator::new(3, 2, |block: MatRef<'_, f64>| block.to_owned());
        let err = davidson_iterate(
            &a,
            &precond,
            guess.as_ref(),
            1,
            &DavidsonConfig::default(),
            None,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Dimension mismatch: preconditioner: expected 3 rows, got 2."
        );
    }

    #[test]
    fn test_rejects_rectangular_operator() {
        let a = Mat::<f64>::zeros(3, 2);
        let guess = Mat::<f64>::identity(3, 1);
        let err = davidson_iterate(
            &a,
            &IdentityOperator::new(3),
            guess.as_ref(),
            1,
            &DavidsonConfig::default(),
            None,
        )
        .unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_non_finite_operator_is_reported() {
        let a = diag_operator(&[f64::INFINITY, 2.0, 3.0]);
        let guess = Mat::<f64>::identity(3, 1);
        let err = davidson_iterate(
            &a,
            &IdentityOperator::new(3),
            guess.as_ref(),
            1,
            &DavidsonConfig::default(),
            None,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Non-finite values encountered at iteration 1."
        );
    }

    #[test]
    fn test_callback_cancellation() {
        let a = diag_operator(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        // An orthonormal but deliberately poor guess, so iteration 1 does not converge.
        let guess = orthonormal_basis(
            Mat::<f64>::from_fn(6, 2, |i, j| ((1 + i * 2 + j) as f64).cos()).as_ref(),
            2,
        );

        let mut seen = 0usize;
        let mut cancel = |step: &DavidsonStep<'_, f64>| {
            seen = step.iteration;
            false
        };
        let err = davidson_iterate(
            &a,
            &IdentityOperator::new(6),
            guess.as_ref(),
            2,
            &DavidsonConfig::default().with_tol(1e-12),
            Some(&mut cancel),
        )
        .unwrap_err();

        assert_eq!(seen, 1);
        assert_eq!(err.not_converged_diagnostics().map(|(it, _)| it), Some(1));
    }
}
