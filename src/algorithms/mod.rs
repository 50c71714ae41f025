//! Building blocks of the block Davidson iteration.
//!
//! This module holds the pieces shared by the iteration driver in
//! [`davidson`]: the solver configuration and its resolved defaults, the
//! output and per-iteration snapshot types, the Rayleigh–Ritz projection of
//! the operator onto the current search space, and the rank-revealing
//! re-orthonormalization that closes the loop.
//!
//! Most users should call the high-level API in [`crate::solvers`] instead of
//! using these pieces directly.

pub mod davidson;

use faer::{
    traits::{math_utils, ComplexField, RealField},
    Mat, MatRef, Scale, Side,
};

use crate::error::{DavidsonError, DavidsonErrorKind};

/// Per-call solver configuration.
///
/// Optional fields left as `None` are resolved from the problem shape once, at
/// call entry:
///
/// - `tol` defaults to `20 * n * ε`, where `n` is the operator dimension and
///   `ε` the machine epsilon of the working real type. The tolerance scales
///   with both the problem size and the precision, since lower-precision
///   arithmetic cannot resolve residuals below its own rounding floor.
/// - `max_subspace` defaults to `8 * m0`, where `m0` is the column count of
///   the initial basis.
#[derive(Debug, Clone, PartialEq)]
pub struct DavidsonConfig<R: RealField> {
    /// Maximum number of outer iterations before the solve fails with
    /// `NotConverged`.
    pub max_iter: usize,
    /// Convergence threshold for the whole-block Frobenius norm of the
    /// residual. `None` resolves to the precision-aware default.
    pub tol: Option<R>,
    /// Subspace dimension above which the basis is restarted. `None` resolves
    /// to `8 * m0`.
    pub max_subspace: Option<usize>,
}

impl<R: RealField> Default for DavidsonConfig<R> {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tol: None,
            max_subspace: None,
        }
    }
}

impl<R: RealField> DavidsonConfig<R> {
    /// Replaces the iteration budget.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Replaces the convergence tolerance.
    pub fn with_tol(mut self, tol: R) -> Self {
        self.tol = Some(tol);
        self
    }

    /// Replaces the restart threshold.
    pub fn with_max_subspace(mut self, max_subspace: usize) -> Self {
        self.max_subspace = Some(max_subspace);
        self
    }

    /// Resolves the derived defaults against the problem shape.
    pub(crate) fn resolve(&self, n: usize, m0: usize) -> ResolvedConfig<R> {
        let tol = match &self.tol {
            Some(tol) => R::copy_impl(tol),
            None => default_tolerance(n),
        };
        let max_subspace = self.max_subspace.unwrap_or(8 * m0);
        ResolvedConfig {
            max_iter: self.max_iter,
            tol,
            max_subspace,
        }
    }
}

/// Configuration with all defaults resolved, as used by the iteration driver.
pub(crate) struct ResolvedConfig<R: RealField> {
    pub max_iter: usize,
    pub tol: R,
    pub max_subspace: usize,
}

/// The default convergence tolerance, `20 * n * ε` in the working precision.
pub fn default_tolerance<R: RealField>(n: usize) -> R {
    math_utils::mul(&R::from_f64_impl(20.0 * n as f64), &R::epsilon_impl())
}

/// The converged eigenpairs returned by a successful solve.
#[derive(Debug, Clone)]
pub struct Eigenpairs<T: ComplexField> {
    /// The `nev` lowest eigenvalue approximations, in ascending order.
    pub eigenvalues: Vec<T::Real>,
    /// The corresponding Ritz vectors, one orthonormal column per eigenvalue.
    pub eigenvectors: Mat<T>,
    /// Number of iterations performed, counting the converging one.
    pub iterations: usize,
    /// Whole-block Frobenius norm of the final residual `A X - X Λ`.
    pub residual_norm: T::Real,
}

/// A read-only snapshot of the iteration state, handed to the monitoring
/// callback once per iteration, after the convergence test.
pub struct DavidsonStep<'a, R: RealField> {
    /// The 1-based index of the iteration that just completed.
    pub iteration: usize,
    /// Dimension of the search space the Ritz pairs were extracted from.
    pub subspace_dim: usize,
    /// Current Ritz values, ascending.
    pub ritz_values: &'a [R],
    /// Whole-block Frobenius norm of the current residual.
    pub residual_norm: &'a R,
}

/// Monitoring callback invoked once per iteration.
///
/// Returning `false` cancels the solve between iterations; the driver then
/// reports `NotConverged` carrying the diagnostics of the last completed
/// iteration. This doubles as the cancellation hook for callers that need to
/// abort long solves early.
pub type DavidsonCallback<'a, R> = dyn FnMut(&DavidsonStep<'_, R>) -> bool + 'a;

/// The `nev` lowest Ritz pairs of the projected problem.
#[derive(Debug)]
pub(crate) struct RitzPairs<T: ComplexField> {
    /// Ritz values, ascending.
    pub values: Vec<T::Real>,
    /// Coefficient matrix `Y` (m×nev): Ritz vectors are `S * Y`.
    pub coefficients: Mat<T>,
}

/// Rayleigh–Ritz projection: extracts the `nev` lowest Ritz pairs of the
/// operator restricted to the current search space.
///
/// Given the orthonormal basis `S` (n×m) and the applied block `AS = A * S`,
/// forms the projected matrix `P = Sᴴ AS`, symmetrizes it explicitly to
/// suppress floating-point asymmetry, and solves the small self-adjoint
/// eigenproblem. Eigenvalues are sorted ascending explicitly rather than
/// relying on the backend's ordering.
///
/// Non-finite entries in `P` (for instance from a diverging operator) are
/// reported as a failure before the decomposition is attempted, so corrupted
/// data never turns into plausible-looking eigenvalues.
pub(crate) fn rayleigh_ritz<T: ComplexField>(
    basis: MatRef<'_, T>,
    applied: MatRef<'_, T>,
    nev: usize,
    iteration: usize,
) -> Result<RitzPairs<T>, DavidsonError<T::Real>>
where
    T::Real: RealField,
{
    let m = basis.ncols();
    debug_assert!(nev <= m);

    // P = Sᴴ (A S), then symmetrize: P <- (P + Pᴴ) / 2. The projected matrix is
    // Hermitian in exact arithmetic; rounding in the two matrix products breaks
    // that by O(ε), which the explicit average removes.
    let projected = basis.adjoint() * applied;
    let projected_adj = projected.adjoint().to_owned();
    let doubled = &projected + &projected_adj;
    let projected = &doubled * Scale(T::from_f64_impl(0.5));

    for j in 0..m {
        for i in 0..m {
            if !T::is_finite_impl(&projected[(i, j)]) {
                return Err(DavidsonErrorKind::NonFinite { iteration }.into());
            }
        }
    }

    let evd = projected
        .as_ref()
        .self_adjoint_eigen(Side::Lower)
        .map_err(|e| DavidsonError::from(DavidsonErrorKind::Evd(e)))?;
    let vectors = evd.U();
    let values = evd.S();

    // Sort the small problem ascending. `m` is bounded by the subspace limit,
    // so this is negligible next to the projections above.
    let real_values: Vec<T::Real> = (0..m).map(|i| T::real_part_impl(&values[i])).collect();
    let mut order: Vec<usize> = (0..m).collect();
    order.sort_by(|&a, &b| {
        real_values[a]
            .partial_cmp(&real_values[b])
            .unwrap_or(core::cmp::Ordering::Equal)
    });

    let mut coefficients = Mat::zeros(m, nev);
    let mut lowest = Vec::with_capacity(nev);
    for (dst, &src) in order.iter().take(nev).enumerate() {
        coefficients.col_mut(dst).copy_from(vectors.col(src));
        lowest.push(T::Real::copy_impl(&real_values[src]));
    }

    Ok(RitzPairs {
        values: lowest,
        coefficients,
    })
}

/// Re-orthonormalizes a raw (generally non-orthogonal, possibly rank-deficient)
/// candidate basis via a rank-revealing column-pivoted QR factorization.
///
/// The thin Q factor becomes the new search space. Trailing columns whose
/// pivoted R diagonal has collapsed below `n * ε` relative to the leading entry
/// carry no new direction (typically a preconditioned residual that is nearly
/// parallel to the existing basis) and are truncated, but the basis never
/// shrinks below `min_keep` columns so the projected problem stays well-posed.
pub(crate) fn orthonormal_basis<T: ComplexField>(raw: MatRef<'_, T>, min_keep: usize) -> Mat<T>
where
    T::Real: RealField,
{
    let qr = raw.col_piv_qr();
    let q = qr.compute_thin_Q();
    let r = qr.thin_R();

    let limit = Ord::min(raw.nrows(), raw.ncols());
    debug_assert!(min_keep <= limit);

    // Column pivoting makes the R diagonal non-increasing in magnitude, so the
    // numerical rank is the count of leading diagonal entries above threshold.
    let leading = T::abs_impl(&r[(0, 0)]);
    let threshold = math_utils::mul(
        &T::Real::from_f64_impl(raw.nrows() as f64),
        &math_utils::mul(&T::Real::epsilon_impl(), &leading),
    );
    let mut rank = 0;
    while rank < limit && T::abs_impl(&r[(rank, rank)]) > threshold {
        rank += 1;
    }

    let keep = Ord::min(Ord::max(rank, min_keep), limit);
    if keep == q.ncols() {
        q
    } else {
        q.as_ref().get(.., 0..keep).to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::mat;

    #[test]
    fn test_config_resolution_defaults() {
        let config = DavidsonConfig::<f64>::default();
        let resolved = config.resolve(50, 3);
        assert_eq!(resolved.max_iter, 100);
        assert_eq!(resolved.max_subspace, 24);
        assert!((resolved.tol - 20.0 * 50.0 * f64::EPSILON).abs() < 1e-18);
    }

    #[test]
    fn test_config_resolution_overrides() {
        let config = DavidsonConfig::default()
            .with_max_iter(7)
            .with_tol(1e-3f32)
            .with_max_subspace(11);
        let resolved = config.resolve(1000, 2);
        assert_eq!(resolved.max_iter, 7);
        assert_eq!(resolved.max_subspace, 11);
        assert_eq!(resolved.tol, 1e-3);
    }

    #[test]
    fn test_eigenpairs_clone_and_debug() {
        // Callers inspect results with `{:?}` and `unwrap_err`, both of which
        // need the result type to be Debug; Clone lets them keep a copy.
        let pairs = Eigenpairs::<f64> {
            eigenvalues: vec![1.0, 2.0],
            eigenvectors: Mat::identity(4, 2),
            iterations: 3,
            residual_norm: 1e-10,
        };
        let copy = pairs.clone();
        assert_eq!(copy.eigenvalues, pairs.eigenvalues);
        assert_eq!(copy.iterations, 3);
        assert!(format!("{pairs:?}").contains("iterations"));
    }

    #[test]
    fn test_rayleigh_ritz_recovers_diagonal_spectrum() {
        // For S = I the projected problem is the operator itself, so the Ritz
        // pairs are the exact eigenpairs of the diagonal.
        let a: Mat<f64> = mat![[3.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 2.0]];
        let s = Mat::<f64>::identity(3, 3);
        let applied = &a * &s;

        let pairs = rayleigh_ritz(s.as_ref(), applied.as_ref(), 2, 1).unwrap();
        assert!((pairs.values[0] - 1.0).abs() < 1e-14);
        assert!((pairs.values[1] - 2.0).abs() < 1e-14);

        // The coefficient columns are the eigenvectors e_2 and e_3 (up to sign).
        assert!((pairs.coefficients[(1, 0)].abs() - 1.0).abs() < 1e-14);
        assert!((pairs.coefficients[(2, 1)].abs() - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_rayleigh_ritz_rejects_non_finite() {
        let a: Mat<f64> = mat![[f64::NAN, 0.0], [0.0, 1.0]];
        let s = Mat::<f64>::identity(2, 2);
        let applied = &a * &s;

        let err = rayleigh_ritz(s.as_ref(), applied.as_ref(), 1, 3).unwrap_err();
        assert!(!err.is_not_converged());
        assert_eq!(
            err.to_string(),
            "Non-finite values encountered at iteration 3."
        );
    }

    #[test]
    fn test_orthonormalization_is_idempotent() {
        // Re-orthonormalizing an already-orthonormal basis must return a basis
        // spanning the same space: the orthogonal projectors agree.
        // Hilbert-like entries: full rank, moderately conditioned.
        let raw = Mat::<f64>::from_fn(6, 3, |i, j| 1.0 / ((i + j + 1) as f64));
        let q1 = orthonormal_basis(raw.as_ref(), 3);
        let q2 = orthonormal_basis(q1.as_ref(), 3);

        assert_eq!(q2.ncols(), 3);
        let p1 = &q1 * q1.adjoint();
        let p2 = &q2 * q2.adjoint();
        assert!((&p1 - &p2).norm_l2() < 1e-13);

        // And the result is orthonormal.
        let gram = q2.adjoint() * &q2;
        assert!((&gram - Mat::<f64>::identity(3, 3)).norm_l2() < 1e-13);
    }

    #[test]
    fn test_orthonormalization_truncates_dependent_columns() {
        // Third column is a copy of the first: numerical rank 2.
        let mut raw = Mat::<f64>::zeros(5, 3);
        raw[(0, 0)] = 1.0;
        raw[(1, 1)] = 1.0;
        raw[(0, 2)] = 1.0;

        let q = orthonormal_basis(raw.as_ref(), 1);
        assert_eq!(q.ncols(), 2);

        let gram = q.adjoint() * &q;
        assert!((&gram - Mat::<f64>::identity(2, 2)).norm_l2() < 1e-14);
    }

    #[test]
    fn test_orthonormalization_respects_min_keep() {
        // Fully rank-deficient beyond one direction, but the caller needs two
        // columns for the projected problem to stay well-posed.
        let mut raw = Mat::<f64>::zeros(4, 2);
        raw[(0, 0)] = 1.0;
        raw[(0, 1)] = 2.0;

        let q = orthonormal_basis(raw.as_ref(), 2);
        assert_eq!(q.ncols(), 2);

        let gram = q.adjoint() * &q;
        assert!((&gram - Mat::<f64>::identity(2, 2)).norm_l2() < 1e-13);
    }
}
