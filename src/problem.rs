use std::fmt;

use crate::control::ControlVector;
use crate::error::Error;

/// A PDE-constrained optimization problem in reduced form, `min_q j(q)`.
///
/// The state is eliminated by solving the PDE for every control; the
/// implementor owns the state/adjoint solvers and whatever caches they need,
/// which is why every evaluation takes `&mut self`.
///
/// Gradients and Hessian-vector products are always requested at the control
/// of the most recent successful [`compute_reduced_cost_functional`] call, so
/// implementors may reuse the state computed there.
///
/// [`compute_reduced_cost_functional`]: ReducedProblem::compute_reduced_cost_functional
pub trait ReducedProblem<V: ControlVector> {
    /// Name of the problem, used in output banners and iteration tags.
    fn name(&self) -> &str;

    /// Reinitialize after the discretization changed.
    fn reinit(&mut self) {}

    /// Solve the state equation at `q` and evaluate `j(q)`.
    fn compute_reduced_cost_functional(&mut self, q: &V) -> Result<V::Real, Error>;

    /// Compute the `l²` gradient `j'(q)` and its Riesz representative.
    ///
    /// `gradient_transposed` must satisfy
    /// `gradient · gradient_transposed = ‖j'(q)‖²_Q` in the control space's
    /// own inner product.
    fn compute_reduced_gradient(
        &mut self,
        q: &V,
        gradient: &mut V,
        gradient_transposed: &mut V,
    ) -> Result<(), Error>;

    /// Apply the reduced Hessian at `q` to `direction`, producing `H·d` and
    /// its Riesz representative.
    fn compute_reduced_hessian_vector(
        &mut self,
        q: &V,
        direction: &V,
        hessian_direction: &mut V,
        hessian_direction_transposed: &mut V,
    ) -> Result<(), Error>;

    /// Evaluate and report auxiliary functionals at `q`.
    fn compute_reduced_functionals(&mut self, q: &V) -> Result<(), Error> {
        let _ = q;
        Ok(())
    }

    /// Box constraints `lower ≤ q ≤ upper`. Unbounded unless overridden.
    fn control_box_constraints(&self, lower: &mut V, upper: &mut V) -> Result<(), Error> {
        lower.fill(<V::Real as num_traits::Float>::neg_infinity());
        upper.fill(<V::Real as num_traits::Float>::infinity());
        Ok(())
    }

    /// Write the number of state DoFs.
    fn state_size_info(&self, out: &mut dyn fmt::Write) -> fmt::Result;
}
