//! This module provides a high-level, user-friendly API for computing the
//! lowest eigenpairs of a symmetric/Hermitian linear operator with the block
//! Davidson method.

use faer::{
    traits::{ComplexField, RealField},
    MatRef,
};

use crate::{
    algorithms::{davidson::davidson_iterate, DavidsonConfig, Eigenpairs},
    error::DavidsonError,
    operator::{IdentityOperator, LinearOperator},
};

/// Computes the `nev` lowest eigenpairs of `operator` with the unpreconditioned
/// block Davidson method.
///
/// The search space is seeded from `initial_basis` (n×m0, `m0 >= nev`, columns
/// orthonormal), grown by `nev` preconditioned-residual directions per
/// iteration, and restarted from the current Ritz vectors whenever it would
/// outgrow the configured threshold. The solve is a pure function of its
/// arguments: no state survives the call, and concurrent solves over different
/// operators do not interfere.
///
/// # Arguments
/// * `operator`: The symmetric/Hermitian operator to diagonalize. Symmetry is
///   assumed, not checked.
/// * `initial_basis`: Column-orthonormal starting guess; validated before any
///   operator application.
/// * `nev`: Number of lowest eigenpairs sought, at most `initial_basis.ncols()`.
/// * `config`: See [`DavidsonConfig`] for the defaults derived from the
///   problem shape.
///
/// # Returns
/// A `Result` containing the converged [`Eigenpairs`] (eigenvalues ascending,
/// eigenvectors orthonormal), or a [`DavidsonError`]. An unconverged solve
/// carries its final residual norm and iteration count as diagnostics instead
/// of returning a partially-converged answer.
pub fn davidson<T, O>(
    operator: &O,
    initial_basis: MatRef<'_, T>,
    nev: usize,
    config: &DavidsonConfig<T::Real>,
) -> Result<Eigenpairs<T>, DavidsonError<T::Real>>
where
    T: ComplexField,
    T::Real: RealField,
    O: LinearOperator<T>,
{
    let identity = IdentityOperator::new(initial_basis.nrows());
    davidson_iterate(operator, &identity, initial_basis, nev, config, None)
}

/// Computes the `nev` lowest eigenpairs of `operator`, accelerating the
/// subspace expansion with a preconditioner.
///
/// The preconditioner maps the residual block to an approximate correction
/// block; a good approximation of `(A - λ I)⁻¹` (for instance
/// [`crate::operator::JacobiPreconditioner`] built from the operator's
/// diagonal) can reduce the iteration count dramatically for diagonally
/// dominant operators.
///
/// See [`davidson`] for the remaining contract.
pub fn davidson_with_preconditioner<T, O, M>(
    operator: &O,
    preconditioner: &M,
    initial_basis: MatRef<'_, T>,
    nev: usize,
    config: &DavidsonConfig<T::Real>,
) -> Result<Eigenpairs<T>, DavidsonError<T::Real>>
where
    T: ComplexField,
    T::Real: RealField,
    O: LinearOperator<T>,
    M: LinearOperator<T>,
{
    davidson_iterate(operator, preconditioner, initial_basis, nev, config, None)
}
