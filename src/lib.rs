//! Generic block Davidson eigensolver for symmetric/Hermitian operators.
//!
//! This crate computes the lowest eigenpairs of a large symmetric or Hermitian
//! linear operator by iterative subspace expansion: the operator is projected
//! onto a small orthonormal search space, the projected problem is solved
//! exactly (Rayleigh–Ritz), and the space is grown with preconditioned
//! residual directions until the Ritz pairs converge. When the space would
//! outgrow a configured bound it is restarted from the current best Ritz
//! vectors, keeping memory and projected-problem cost bounded.
//!
//! Built on the [`faer`] linear algebra framework, the solver operates on
//! anything implementing the one-method [`LinearOperator`] block-apply
//! contract, so dense matrices, sparse matrices, and matrix-free maps all work
//! unchanged, in any scalar precision satisfying
//! [`faer::traits::ComplexField`].
//!
//! ## Method outline
//!
//! Each iteration applies the operator to the n×m search basis, solves the m×m
//! projected self-adjoint eigenproblem, and forms the `nev` lowest Ritz pairs
//! and their residual block `R = A X - X Λ`. Convergence is declared when the
//! whole-block Frobenius norm of `R` drops below the tolerance (by default
//! `20 n ε` in the working precision). Otherwise the preconditioned residual
//! is appended to the basis, or, at the restart threshold, the basis is
//! replaced by the Ritz vectors plus the newest correction; either way the
//! candidate block is re-orthonormalized by a rank-revealing QR before the
//! next iteration.
//!
//! ## Example Usage
//!
//! The following example computes the two lowest eigenpairs of a small
//! symmetric tridiagonal matrix and checks the residual of the returned pairs.
//!
//! ```rust
//! use block_davidson::{davidson, DavidsonConfig};
//! use faer::Mat;
//!
//! // The 1-D discrete Laplacian, a classic symmetric test operator.
//! let n = 16;
//! let a = Mat::from_fn(n, n, |i, j| {
//!     if i == j { 2.0 }
//!     else if (i as isize - j as isize).abs() == 1 { -1.0 }
//!     else { 0.0 }
//! });
//!
//! // Any column-orthonormal guess works; identity columns are the simplest.
//! let guess = Mat::<f64>::identity(n, 2);
//!
//! let config = DavidsonConfig::default().with_max_iter(200).with_tol(1e-10);
//! let result = davidson(&a, guess.as_ref(), 2, &config).unwrap();
//!
//! // The eigenvalues of this operator are 2 - 2 cos(k π / (n + 1)).
//! let exact = |k: usize| 2.0 - 2.0 * (k as f64 * std::f64::consts::PI / (n + 1) as f64).cos();
//! assert!((result.eigenvalues[0] - exact(1)).abs() < 1e-8);
//! assert!((result.eigenvalues[1] - exact(2)).abs() < 1e-8);
//!
//! // The returned eigenvectors satisfy the residual bound that was requested.
//! let x = &result.eigenvectors;
//! let lambda = Mat::from_fn(2, 2, |i, j| if i == j { result.eigenvalues[i] } else { 0.0 });
//! assert!((&a * x - x * &lambda).norm_l2() < 1e-9);
//! ```
//!
//! ## Failure behavior
//!
//! An unconverged solve returns [`DavidsonError`] carrying the final residual
//! norm and iteration count; no partially-converged eigenpairs are ever
//! returned. Invalid input (a non-orthonormal guess, `nev` larger than the
//! guess, a rectangular operator) is rejected before the operator is applied
//! even once, and non-finite values arising mid-iteration abort the solve
//! immediately instead of propagating into the eigenvalue estimates.

// Declare the modules that form the crate's API structure.
pub mod algorithms;
pub mod error;
pub mod operator;
pub mod solvers;

// Re-export the main API for convenient access.
// These are the primary items that users should use.
pub use algorithms::{default_tolerance, DavidsonCallback, DavidsonConfig, DavidsonStep, Eigenpairs};
pub use error::DavidsonError;
pub use operator::{
    IdentityOperator, JacobiPreconditioner, LinearOperator, MatrixFreeOperator,
};
pub use solvers::{davidson, davidson_with_preconditioner};
