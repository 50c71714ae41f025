//! This module defines the custom error types for the library.
//!
//! All failure conditions of the Davidson iteration are centralized in a single
//! enum behind the public [`DavidsonError`] newtype.
//!
//! Using the [`thiserror`] crate allows us to create idiomatic error types with minimal
//! boilerplate. Note that [`faer::linalg::evd::EvdError`] does not implement the standard
//! [`std::error::Error`] trait, so we wrap it manually to provide a compatible error type.
use faer::traits::RealField;
use thiserror::Error;

/// Represents all possible errors that can occur during a Davidson solve.
///
/// The type is generic over the real scalar type `R` of the working precision so
/// that diagnostics (such as the final residual norm) are reported in the same
/// precision the solve ran in.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct DavidsonError<R: RealField>(#[from] pub(crate) DavidsonErrorKind<R>);

/// Private enum containing the distinct kinds of errors.
/// This separation allows for a clean `Display` implementation via [`thiserror`]
/// while handling non-standard error types manually.
#[derive(Error, Debug, PartialEq)]
pub(crate) enum DavidsonErrorKind<R: RealField> {
    /// The residual norm did not drop below the tolerance within the configured
    /// iteration budget. Recoverable: retry with a larger budget, a looser
    /// tolerance, a better preconditioner, or a better initial guess.
    #[error(
        "Davidson iteration did not converge after {iterations} iterations: final residual norm is {residual_norm:?}."
    )]
    NotConverged { iterations: usize, residual_norm: R },

    /// An invalid parameter was provided to the solver. Raised before any
    /// operator application.
    #[error("Invalid input parameter: {0}")]
    InvalidInput(String),

    /// The dimensions of the operator, the initial basis, or the preconditioner
    /// are incompatible.
    #[error("Dimension mismatch: {context}: expected {expected} rows, got {actual}.")]
    DimensionMismatch {
        context: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The projected matrix or the residual contained NaN or infinite entries.
    /// This is fatal: continuing would silently propagate corrupted data into
    /// the eigenvalue estimates.
    #[error("Non-finite values encountered at iteration {iteration}.")]
    NonFinite { iteration: usize },

    /// Wraps an error originating from [`faer`]'s eigendecomposition module.
    #[error(
        "A numerical error occurred during the eigendecomposition of the projected matrix: {0:?}"
    )]
    Evd(faer::linalg::evd::EvdError),
}

// Manually implement PartialEq for the public error type.
// We compare the inner `DavidsonErrorKind`.
impl<R: RealField> PartialEq for DavidsonError<R> {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl<R: RealField> DavidsonError<R> {
    /// Returns `true` if this error is a non-convergence report.
    pub fn is_not_converged(&self) -> bool {
        matches!(self.0, DavidsonErrorKind::NotConverged { .. })
    }

    /// Returns `true` if this error was caused by invalid input parameters or
    /// incompatible dimensions.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self.0,
            DavidsonErrorKind::InvalidInput(_) | DavidsonErrorKind::DimensionMismatch { .. }
        )
    }

    /// For a [`Self::is_not_converged`] error, returns the number of iterations
    /// performed and the final whole-block residual norm.
    pub fn not_converged_diagnostics(&self) -> Option<(usize, &R)> {
        match &self.0 {
            DavidsonErrorKind::NotConverged {
                iterations,
                residual_norm,
            } => Some((*iterations, residual_norm)),
            _ => None,
        }
    }
}

// Unit tests to ensure error messages are formatted correctly.
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_converged_error_message() {
        let error = DavidsonError(DavidsonErrorKind::NotConverged {
            iterations: 100,
            residual_norm: 0.5f64,
        });
        let expected_message =
            "Davidson iteration did not converge after 100 iterations: final residual norm is 0.5.";
        assert_eq!(error.to_string(), expected_message);
        assert!(error.is_not_converged());
        assert_eq!(error.not_converged_diagnostics(), Some((100, &0.5)));
    }

    #[test]
    fn test_dimension_mismatch_error_message() {
        let error = DavidsonError::<f64>(DavidsonErrorKind::DimensionMismatch {
            context: "initial basis",
            expected: 100,
            actual: 99,
        });
        let expected_message = "Dimension mismatch: initial basis: expected 100 rows, got 99.";
        assert_eq!(error.to_string(), expected_message);
        assert!(error.is_invalid_input());
    }

    #[test]
    fn test_invalid_input_error_message() {
        let error = DavidsonError::<f64>(DavidsonErrorKind::InvalidInput(
            "`nev` must not exceed the number of columns of the initial basis.".to_string(),
        ));
        let expected_message = "Invalid input parameter: `nev` must not exceed the number of columns of the initial basis.";
        assert_eq!(error.to_string(), expected_message);
    }

    #[test]
    fn test_non_finite_error_message() {
        let error = DavidsonError::<f64>(DavidsonErrorKind::NonFinite { iteration: 7 });
        assert_eq!(
            error.to_string(),
            "Non-finite values encountered at iteration 7."
        );
        assert!(!error.is_not_converged());
    }

    #[test]
    fn test_evd_error_message() {
        let evd_error = faer::linalg::evd::EvdError::NoConvergence;
        let error = DavidsonError::<f64>(DavidsonErrorKind::Evd(evd_error));
        // Note: The message uses the `Debug` format for the inner error.
        let expected_message =
            "A numerical error occurred during the eigendecomposition of the projected matrix: NoConvergence";
        assert_eq!(error.to_string(), expected_message);
    }
}
