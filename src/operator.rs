//! This module defines the core abstraction for linear operators.
//!
//! The Davidson iteration never needs element access to the matrix it
//! diagonalizes. Its fundamental operation is the product of the matrix with a
//! *block* of column vectors (the current search basis, or the residual block
//! handed to a preconditioner). This observation allows for a powerful
//! abstraction: the algorithm can be written to operate on any object that can
//! perform this action, known as a "linear operator."
//!
//! This "matrix-free" approach offers significant advantages:
//! 1.  **Generality**: The solver is implemented once and used with dense
//!     matrices, sparse matrices, or functions that compute the product without
//!     explicitly storing a matrix, as is common when the operator represents a
//!     discretized PDE or lives on an accelerator.
//! 2.  **Testability**: The same algorithm can be verified on small dense
//!     matrices with known spectra and then deployed on large implicit
//!     operators without changing the core logic.
//! 3.  **Encapsulation**: Storage layout and product implementation are hidden
//!     behind one method.
//!
//! The central piece of this module is the [`LinearOperator`] trait, which
//! formalizes this contract. Preconditioners use the same contract: a
//! preconditioner is just a linear map from a residual block to a correction
//! block, with [`IdentityOperator`] as the no-op default and
//! [`JacobiPreconditioner`] as the standard diagonal variant.

use core::marker::PhantomData;

use faer::{
    prelude::Reborrow,
    sparse::{SparseColMat, SparseColMatRef},
    traits::{math_utils, ComplexField, RealField},
    Mat, MatMut, MatRef,
};

/// Represents a linear operator that can be applied to a block of column vectors.
///
/// This trait abstracts the matrix-block product `A * X`, the only operation the
/// Davidson iteration requires from the matrix being diagonalized. By depending
/// on this trait rather than a concrete matrix type, the solver is generic over
/// dense, sparse, and matrix-free representations.
///
/// Implementations must be linear in their argument and side-effect free, and
/// must accept block widths from 1 up to the solver's subspace limit. The
/// operator is assumed (not checked) to be symmetric/Hermitian; feeding a
/// non-Hermitian operator to the solver produces meaningless Ritz values.
///
/// # Type Parameters
///
/// *   `T`: The scalar type, which must implement `ComplexField`. This trait from
///     `faer` provides the necessary arithmetic for `f32`, `f64`, and their
///     complex counterparts.
pub trait LinearOperator<T: ComplexField> {
    /// Returns the number of rows of the operator.
    fn nrows(&self) -> usize;

    /// Returns the number of columns of the operator.
    fn ncols(&self) -> usize;

    /// Applies the linear operator to every column of `block`.
    ///
    /// The implementation must return an owned matrix (`Mat<T>`) containing the
    /// result of the operation `A * block`, with the same shape as `block`.
    ///
    /// # Panics
    ///
    /// This method is expected to panic if the inner dimension of the operator
    /// does not match the number of rows of `block`.
    fn apply(&self, block: MatRef<'_, T>) -> Mat<T>;
}

/// Implementation of `LinearOperator` for `faer`'s immutable dense matrix view (`MatRef`).
/// This is the primary concrete implementation that the generic algorithm is tested against.
impl<'a, T: ComplexField> LinearOperator<T> for MatRef<'a, T> {
    #[inline]
    fn nrows(&self) -> usize {
        MatRef::nrows(self)
    }

    #[inline]
    fn ncols(&self) -> usize {
        MatRef::ncols(self)
    }

    #[inline]
    fn apply(&self, block: MatRef<'_, T>) -> Mat<T> {
        // Ensure dimensional compatibility for the matrix product.
        assert_eq!(
            MatRef::ncols(self),
            block.nrows(),
            "Dimension mismatch: operator columns ({}) do not match block rows ({}).",
            MatRef::ncols(self),
            block.nrows(),
        );

        // Defer to faer's optimized matrix multiplication routine.
        self * block
    }
}

/// Implementation of `LinearOperator` for `faer`'s mutable dense matrix view (`MatMut`).
/// Delegates to the `MatRef` implementation via a reborrow.
impl<'a, T: ComplexField> LinearOperator<T> for MatMut<'a, T> {
    #[inline]
    fn nrows(&self) -> usize {
        self.rb().nrows()
    }

    #[inline]
    fn ncols(&self) -> usize {
        self.rb().ncols()
    }

    #[inline]
    fn apply(&self, block: MatRef<'_, T>) -> Mat<T> {
        LinearOperator::apply(&self.rb(), block)
    }
}

/// Implementation of `LinearOperator` for `faer`'s owned dense matrix (`Mat`).
/// Delegates to the `MatRef` implementation via a reference.
impl<T: ComplexField> LinearOperator<T> for Mat<T> {
    #[inline]
    fn nrows(&self) -> usize {
        Mat::nrows(self)
    }

    #[inline]
    fn ncols(&self) -> usize {
        Mat::ncols(self)
    }

    #[inline]
    fn apply(&self, block: MatRef<'_, T>) -> Mat<T> {
        LinearOperator::apply(&self.as_ref(), block)
    }
}

/// Implementation of `LinearOperator` for `faer`'s sparse column-major matrix view.
///
/// The sparse-dense product is what makes the solver practical for the large,
/// structured operators Davidson is typically used on.
impl<'a, T: ComplexField> LinearOperator<T> for SparseColMatRef<'a, usize, T> {
    // The dimension accessors go through the symbolic structure: naming the
    // deref-provided `nrows`/`ncols` here would resolve back to this trait
    // method and recurse.
    #[inline]
    fn nrows(&self) -> usize {
        self.symbolic().nrows()
    }

    #[inline]
    fn ncols(&self) -> usize {
        self.symbolic().ncols()
    }

    #[inline]
    fn apply(&self, block: MatRef<'_, T>) -> Mat<T> {
        assert_eq!(
            self.symbolic().ncols(),
            block.nrows(),
            "Dimension mismatch: operator columns ({}) do not match block rows ({}).",
            self.symbolic().ncols(),
            block.nrows(),
        );

        self * block
    }
}

/// Implementation of `LinearOperator` for `faer`'s owned sparse column-major matrix.
/// Delegates to the view implementation, like the dense impls.
impl<T: ComplexField> LinearOperator<T> for SparseColMat<usize, T> {
    #[inline]
    fn nrows(&self) -> usize {
        LinearOperator::nrows(&self.as_ref())
    }

    #[inline]
    fn ncols(&self) -> usize {
        LinearOperator::ncols(&self.as_ref())
    }

    #[inline]
    fn apply(&self, block: MatRef<'_, T>) -> Mat<T> {
        LinearOperator::apply(&self.as_ref(), block)
    }
}

/// A matrix-free linear operator defined by a user-supplied closure.
///
/// This is the escape hatch for operators that have no explicit storage at all:
/// the closure receives a block of column vectors and must return `A * block`.
/// The closure is responsible for its own internal parallelism; the solver
/// treats `apply` as a synchronous, blocking call.
///
/// # Example
///
/// ```
/// use block_davidson::{LinearOperator, MatrixFreeOperator};
/// use faer::Mat;
///
/// // The 4x4 diagonal operator diag(1, 2, 3, 4), never stored explicitly.
/// let op = MatrixFreeOperator::new(4, 4, |block: faer::MatRef<'_, f64>| {
///     Mat::from_fn(block.nrows(), block.ncols(), |i, j| (i + 1) as f64 * block[(i, j)])
/// });
///
/// let x = Mat::<f64>::identity(4, 4);
/// let ax = op.apply(x.as_ref());
/// assert_eq!(ax[(2, 2)], 3.0);
/// ```
pub struct MatrixFreeOperator<T, F> {
    nrows: usize,
    ncols: usize,
    apply_fn: F,
    _scalar: PhantomData<T>,
}

impl<T, F> MatrixFreeOperator<T, F>
where
    T: ComplexField,
    F: Fn(MatRef<'_, T>) -> Mat<T>,
{
    /// Wraps `apply_fn` as a linear operator of the given dimensions.
    pub fn new(nrows: usize, ncols: usize, apply_fn: F) -> Self {
        Self {
            nrows,
            ncols,
            apply_fn,
            _scalar: PhantomData,
        }
    }
}

impl<T, F> LinearOperator<T> for MatrixFreeOperator<T, F>
where
    T: ComplexField,
    F: Fn(MatRef<'_, T>) -> Mat<T>,
{
    #[inline]
    fn nrows(&self) -> usize {
        self.nrows
    }

    #[inline]
    fn ncols(&self) -> usize {
        self.ncols
    }

    fn apply(&self, block: MatRef<'_, T>) -> Mat<T> {
        assert_eq!(
            self.ncols,
            block.nrows(),
            "Dimension mismatch: operator columns ({}) do not match block rows ({}).",
            self.ncols,
            block.nrows(),
        );

        let result = (self.apply_fn)(block);
        assert_eq!(
            (result.nrows(), result.ncols()),
            (self.nrows, block.ncols()),
            "Matrix-free apply returned a block of the wrong shape.",
        );
        result
    }
}

/// The identity map, used as the default (no-op) preconditioner.
pub struct IdentityOperator {
    dim: usize,
}

impl IdentityOperator {
    /// Creates the identity operator on a space of the given dimension.
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl<T: ComplexField> LinearOperator<T> for IdentityOperator {
    #[inline]
    fn nrows(&self) -> usize {
        self.dim
    }

    #[inline]
    fn ncols(&self) -> usize {
        self.dim
    }

    #[inline]
    fn apply(&self, block: MatRef<'_, T>) -> Mat<T> {
        assert_eq!(
            self.dim,
            block.nrows(),
            "Dimension mismatch: operator columns ({}) do not match block rows ({}).",
            self.dim,
            block.nrows(),
        );

        block.to_owned()
    }
}

/// The classic Davidson preconditioner: row scaling by `1 / (d_i - shift)`,
/// where `d` approximates the diagonal of the operator being diagonalized.
///
/// For diagonally dominant operators this single scaling is usually enough to
/// turn residuals into good correction directions. Entries whose denominator is
/// numerically zero fall back to a unit scale, so the preconditioner never
/// amplifies a residual row by a near-infinite factor.
pub struct JacobiPreconditioner<T> {
    inv_diag: Mat<T>,
}

impl<T: ComplexField> JacobiPreconditioner<T> {
    /// Builds the preconditioner from the operator's diagonal (an n×1 column)
    /// and a spectral shift, typically a rough estimate of the sought eigenvalue.
    pub fn from_diagonal(diag: MatRef<'_, T>, shift: &T) -> Self {
        assert_eq!(diag.ncols(), 1, "The diagonal must be a column vector.");

        let floor = T::Real::epsilon_impl();
        let inv_diag = Mat::from_fn(diag.nrows(), 1, |i, _| {
            let denom = math_utils::sub(&diag[(i, 0)], shift);
            if T::abs_impl(&denom) <= floor {
                T::one_impl()
            } else {
                T::recip_impl(&denom)
            }
        });
        Self { inv_diag }
    }
}

impl<T: ComplexField> LinearOperator<T> for JacobiPreconditioner<T> {
    #[inline]
    fn nrows(&self) -> usize {
        self.inv_diag.nrows()
    }

    #[inline]
    fn ncols(&self) -> usize {
        self.inv_diag.nrows()
    }

    fn apply(&self, block: MatRef<'_, T>) -> Mat<T> {
        assert_eq!(
            self.inv_diag.nrows(),
            block.nrows(),
            "Dimension mismatch: operator columns ({}) do not match block rows ({}).",
            self.inv_diag.nrows(),
            block.nrows(),
        );

        Mat::from_fn(block.nrows(), block.ncols(), |i, j| {
            math_utils::mul(&self.inv_diag[(i, 0)], &block[(i, j)])
        })
    }
}
