//! A dense, `Vec`-backed [`ControlVector`] tied to a shared discretization handle.
//!
//! [`ControlSpace`] stands in for the finite-element handler owning the
//! control discretization. Vectors remember the generation of the space they
//! were sized for; [`ControlVector::reinit`] only resizes (and zeroes) a vector
//! when the space changed since then.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::rc::Rc;

use crate::control::{sign_class, slice_norm, ControlVector, Norm, Restriction};
use crate::error::Error;
use crate::float::Float;

#[derive(Debug)]
struct SpaceInner {
    dofs_per_block: RefCell<Vec<usize>>,
    generation: Cell<u64>,
}

/// Shared handle describing the current control discretization.
///
/// Cloning yields another handle to the same discretization.
#[derive(Debug, Clone)]
pub struct ControlSpace {
    inner: Rc<SpaceInner>,
}

impl ControlSpace {
    /// A space with a single block of `n_dofs` degrees of freedom.
    pub fn new(n_dofs: usize) -> Self {
        Self::with_blocks(vec![n_dofs])
    }

    /// A space made of blocks with the given numbers of DoFs.
    pub fn with_blocks(dofs_per_block: Vec<usize>) -> Self {
        ControlSpace {
            inner: Rc::new(SpaceInner {
                dofs_per_block: RefCell::new(dofs_per_block),
                generation: Cell::new(0),
            }),
        }
    }

    /// Total number of DoFs.
    pub fn n_dofs(&self) -> usize {
        self.inner.dofs_per_block.borrow().iter().sum()
    }

    /// DoFs of every block.
    pub fn dofs_per_block(&self) -> Vec<usize> {
        self.inner.dofs_per_block.borrow().clone()
    }

    /// Install a new block layout, e.g. after refining the mesh.
    ///
    /// Vectors created before this call pick up the new layout on their next
    /// [`ControlVector::reinit`].
    pub fn redistribute(&self, dofs_per_block: Vec<usize>) {
        *self.inner.dofs_per_block.borrow_mut() = dofs_per_block;
        self.inner.generation.set(self.inner.generation.get() + 1);
    }

    /// Counter bumped by every [`ControlSpace::redistribute`].
    pub fn generation(&self) -> u64 {
        self.inner.generation.get()
    }

    /// Whether both handles refer to the same discretization.
    pub fn same_as(&self, other: &ControlSpace) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Dense control vector over a [`ControlSpace`].
#[derive(Debug, Clone)]
pub struct DenseControl<F> {
    values: Vec<F>,
    space: ControlSpace,
    ticket: u64,
}

impl<F: Float> DenseControl<F> {
    /// Zero vector sized for the current layout of `space`.
    pub fn new(space: &ControlSpace) -> Self {
        DenseControl {
            values: vec![F::zero(); space.n_dofs()],
            space: space.clone(),
            ticket: space.generation(),
        }
    }

    /// Vector over `space` holding `values`.
    pub fn from_vec(space: &ControlSpace, values: Vec<F>) -> Result<Self, Error> {
        if values.len() != space.n_dofs() {
            return Err(Error::InvalidParameter {
                name: "values",
                reason: format!(
                    "length {} does not match the {} DoFs of the control space",
                    values.len(),
                    space.n_dofs()
                ),
            });
        }
        Ok(DenseControl {
            values,
            space: space.clone(),
            ticket: space.generation(),
        })
    }

    /// Vector over a fresh single-block space sized to `values`.
    pub fn from_values(values: Vec<F>) -> Self {
        let space = ControlSpace::new(values.len());
        DenseControl {
            values,
            ticket: space.generation(),
            space,
        }
    }

    /// The coefficients.
    pub fn values(&self) -> &[F] {
        &self.values
    }

    /// The coefficients, mutably.
    pub fn values_mut(&mut self) -> &mut [F] {
        &mut self.values
    }

    /// The discretization handle this vector belongs to.
    pub fn space(&self) -> &ControlSpace {
        &self.space
    }

    fn check_structure(&self, other: &Self) {
        debug_assert_eq!(
            self.values.len(),
            other.values.len(),
            "control vectors must share the same structure"
        );
    }
}

impl<F> Index<usize> for DenseControl<F> {
    type Output = F;

    fn index(&self, i: usize) -> &F {
        &self.values[i]
    }
}

impl<F> IndexMut<usize> for DenseControl<F> {
    fn index_mut(&mut self, i: usize) -> &mut F {
        &mut self.values[i]
    }
}

impl<F: Float> ControlVector for DenseControl<F> {
    type Real = F;

    fn len(&self) -> usize {
        self.values.len()
    }

    fn fill(&mut self, value: F) {
        self.values.iter_mut().for_each(|x| *x = value);
    }

    fn assign(&mut self, other: &Self) {
        self.values.clone_from(&other.values);
        self.space = other.space.clone();
        self.ticket = other.ticket;
    }

    fn add_scaled(&mut self, s: F, other: &Self) {
        self.check_structure(other);
        for (x, &y) in self.values.iter_mut().zip(other.values.iter()) {
            *x = *x + s * y;
        }
    }

    fn equ(&mut self, s: F, other: &Self) {
        self.check_structure(other);
        for (x, &y) in self.values.iter_mut().zip(other.values.iter()) {
            *x = s * y;
        }
    }

    fn mul_scalar(&mut self, a: F) {
        self.values.iter_mut().for_each(|x| *x = *x * a);
    }

    fn dot(&self, other: &Self) -> F {
        self.check_structure(other);
        self.values
            .iter()
            .zip(other.values.iter())
            .fold(F::zero(), |acc, (&a, &b)| acc + a * b)
    }

    fn norm_by(&self, norm: Norm, restriction: Restriction) -> F {
        slice_norm(&self.values, norm, restriction)
    }

    fn reinit(&mut self) {
        let generation = self.space.generation();
        if self.ticket != generation {
            self.values = vec![F::zero(); self.space.n_dofs()];
            self.ticket = generation;
        }
    }

    fn print_infos(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        let blocks = self.space.dofs_per_block();
        write!(out, "{}", self.values.len())?;
        if blocks.len() > 1 {
            let parts: Vec<String> = blocks.iter().map(|b| b.to_string()).collect();
            write!(out, " ({})", parts.join("+"))?;
        }
        writeln!(out)
    }

    fn max_with(&mut self, other: &Self) {
        self.check_structure(other);
        for (x, &y) in self.values.iter_mut().zip(other.values.iter()) {
            *x = x.max(y);
        }
    }

    fn min_with(&mut self, other: &Self) {
        self.check_structure(other);
        for (x, &y) in self.values.iter_mut().zip(other.values.iter()) {
            *x = x.min(y);
        }
    }

    fn comp_mult(&mut self, other: &Self) {
        self.check_structure(other);
        for (x, &y) in self.values.iter_mut().zip(other.values.iter()) {
            *x = *x * y;
        }
    }

    fn comp_invert(&mut self) {
        self.values.iter_mut().for_each(|x| *x = x.recip());
    }

    fn init_by_sign(&mut self, smaller: F, larger: F, unclear: F, tol: F) {
        for x in self.values.iter_mut() {
            *x = sign_class(*x, smaller, larger, unclear, tol);
        }
    }

    fn copy_to(&self, out: &mut [F]) {
        out.copy_from_slice(&self.values);
    }

    fn copy_from(&mut self, src: &[F]) {
        self.values.copy_from_slice(src);
    }
}
