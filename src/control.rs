//! The [`ControlVector`] trait: arithmetic on points of the control space.
//!
//! Algorithms are written against this trait only. Every temporary they need
//! (search direction, gradient, transposed gradient, Hessian-vector products)
//! is obtained by cloning the structure of the control they were handed, so
//! implementors only need to make `Clone` produce an independent vector with
//! the same layout.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::float::Float;

/// Norms selectable by name, as in a parameter file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Norm {
    /// Maximum absolute entry (`"infty"`).
    Infinity,
    /// Sum of absolute entries (`"l1"`).
    L1,
}

/// Which entries take part in a norm computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Restriction {
    /// Every entry (`"all"`).
    #[default]
    All,
    /// Only strictly positive entries (`"positive"`).
    Positive,
}

impl FromStr for Norm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "infty" => Ok(Norm::Infinity),
            "l1" => Ok(Norm::L1),
            other => Err(Error::InvalidParameter {
                name: "norm",
                reason: format!("unknown norm `{other}`, expected `infty` or `l1`"),
            }),
        }
    }
}

impl FromStr for Restriction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Restriction::All),
            "positive" => Ok(Restriction::Positive),
            other => Err(Error::InvalidParameter {
                name: "restriction",
                reason: format!("unknown restriction `{other}`, expected `all` or `positive`"),
            }),
        }
    }
}

impl fmt::Display for Norm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Norm::Infinity => write!(f, "infty"),
            Norm::L1 => write!(f, "l1"),
        }
    }
}

/// A point (or direction) in control space.
///
/// Binary operations require both operands to share the same structure; this
/// is a caller obligation checked with debug assertions by the provided
/// implementations.
pub trait ControlVector: Clone + fmt::Debug {
    /// Scalar type of the entries.
    type Real: Float;

    /// Number of degrees of freedom.
    fn len(&self) -> usize;

    /// Whether the vector has no degrees of freedom.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set every entry to `value`.
    fn fill(&mut self, value: Self::Real);

    /// `self = other`, resizing if the structures differ.
    fn assign(&mut self, other: &Self);

    /// `self += s * other`.
    fn add_scaled(&mut self, s: Self::Real, other: &Self);

    /// `self = s * other`, without resizing.
    fn equ(&mut self, s: Self::Real, other: &Self);

    /// `self *= a`.
    fn mul_scalar(&mut self, a: Self::Real);

    /// Euclidean inner product of the coefficient vectors.
    fn dot(&self, other: &Self) -> Self::Real;

    /// Norm selected by `norm`, over the entries selected by `restriction`.
    fn norm_by(&self, norm: Norm, restriction: Restriction) -> Self::Real;

    /// Re-read the structure from the discretization, e.g. after the mesh
    /// changed. Calling it again without an intervening change is a no-op.
    fn reinit(&mut self);

    /// Write a short description of the layout (number of DoFs, blocks).
    fn print_infos(&self, out: &mut dyn fmt::Write) -> fmt::Result;

    /// Componentwise maximum with `other`.
    fn max_with(&mut self, other: &Self);

    /// Componentwise minimum with `other`.
    fn min_with(&mut self, other: &Self);

    /// Componentwise product with `other`.
    fn comp_mult(&mut self, other: &Self);

    /// Replace every entry by its reciprocal.
    fn comp_invert(&mut self);

    /// Replace every entry by `smaller`, `larger` or `unclear` depending on
    /// its sign; entries with `|x| < tol` count as unclear.
    fn init_by_sign(
        &mut self,
        smaller: Self::Real,
        larger: Self::Real,
        unclear: Self::Real,
        tol: Self::Real,
    );

    /// Copy the coefficients into `out` (`out.len() == self.len()`).
    fn copy_to(&self, out: &mut [Self::Real]);

    /// Overwrite the coefficients from `src` (`src.len() == self.len()`).
    fn copy_from(&mut self, src: &[Self::Real]);

    /// A zero vector with the structure of `self`.
    fn zeros_like(&self) -> Self {
        let mut v = self.clone();
        v.fill(<Self::Real as num_traits::Zero>::zero());
        v
    }
}

/// Shared implementation of [`ControlVector::norm_by`] for slice-backed vectors.
pub fn slice_norm<F: Float>(values: &[F], norm: Norm, restriction: Restriction) -> F {
    let selected = values.iter().copied().filter(|&x| match restriction {
        Restriction::All => true,
        Restriction::Positive => x > F::zero(),
    });
    match norm {
        Norm::Infinity => selected.fold(F::zero(), |acc, x| acc.max(x.abs())),
        Norm::L1 => selected.fold(F::zero(), |acc, x| acc + x.abs()),
    }
}

/// Shared implementation of [`ControlVector::init_by_sign`] for a single entry.
#[inline]
pub fn sign_class<F: Float>(x: F, smaller: F, larger: F, unclear: F, tol: F) -> F {
    if x.abs() < tol {
        unclear
    } else if x < F::zero() {
        smaller
    } else {
        larger
    }
}
