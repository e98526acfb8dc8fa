//! [`ControlVector`] for nalgebra's `DVector`.
//!
//! A `DVector` has no discretization handle, so `reinit` is a no-op and
//! `print_infos` reports a single block. Note that `DVector` has inherent
//! methods named like some trait methods (`fill`, `dot`, `len`); call the
//! trait versions through `ControlVector::` when the receiver is concrete.

use std::fmt;

use nalgebra::DVector;

use crate::control::{sign_class, slice_norm, ControlVector, Norm, Restriction};
use crate::float::Float;

fn zip_apply<F: Float + nalgebra::Scalar>(
    lhs: &mut DVector<F>,
    rhs: &DVector<F>,
    f: impl Fn(F, F) -> F,
) {
    debug_assert_eq!(lhs.nrows(), rhs.nrows(), "vectors must share the same structure");
    for (x, &y) in lhs.as_mut_slice().iter_mut().zip(rhs.as_slice().iter()) {
        *x = f(*x, y);
    }
}

impl<F: Float + nalgebra::Scalar> ControlVector for DVector<F> {
    type Real = F;

    fn len(&self) -> usize {
        self.nrows()
    }

    fn fill(&mut self, value: F) {
        self.as_mut_slice().iter_mut().for_each(|x| *x = value);
    }

    fn assign(&mut self, other: &Self) {
        self.clone_from(other);
    }

    fn add_scaled(&mut self, s: F, other: &Self) {
        zip_apply(self, other, |x, y| x + s * y);
    }

    fn equ(&mut self, s: F, other: &Self) {
        zip_apply(self, other, |_, y| s * y);
    }

    fn mul_scalar(&mut self, a: F) {
        self.as_mut_slice().iter_mut().for_each(|x| *x = *x * a);
    }

    fn dot(&self, other: &Self) -> F {
        self.as_slice()
            .iter()
            .zip(other.as_slice().iter())
            .fold(F::zero(), |acc, (&a, &b)| acc + a * b)
    }

    fn norm_by(&self, norm: Norm, restriction: Restriction) -> F {
        slice_norm(self.as_slice(), norm, restriction)
    }

    fn reinit(&mut self) {}

    fn print_infos(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "{}", self.nrows())
    }

    fn max_with(&mut self, other: &Self) {
        zip_apply(self, other, |x, y| x.max(y));
    }

    fn min_with(&mut self, other: &Self) {
        zip_apply(self, other, |x, y| x.min(y));
    }

    fn comp_mult(&mut self, other: &Self) {
        zip_apply(self, other, |x, y| x * y);
    }

    fn comp_invert(&mut self) {
        self.as_mut_slice().iter_mut().for_each(|x| *x = x.recip());
    }

    fn init_by_sign(&mut self, smaller: F, larger: F, unclear: F, tol: F) {
        for x in self.as_mut_slice().iter_mut() {
            *x = sign_class(*x, smaller, larger, unclear, tol);
        }
    }

    fn copy_to(&self, out: &mut [F]) {
        out.copy_from_slice(self.as_slice());
    }

    fn copy_from(&mut self, src: &[F]) {
        self.as_mut_slice().copy_from_slice(src);
    }
}
