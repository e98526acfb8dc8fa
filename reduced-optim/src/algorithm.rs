//! Scaffolding shared by all reduced-space algorithms.
//!
//! [`ReducedAlgorithm`] ties a [`ReducedProblem`] to an output and an
//! exception handler and provides the operations that do not depend on the
//! optimization method: a plain forward solve and finite-difference checks of
//! the reduced gradient and Hessian.

use std::fmt::Write as _;

use reduced::float::{lit, to_f64};
use reduced::{
    ControlVector, Error, ExceptionHandler, Handle, LogExceptionHandler, LogOutput, OutputHandler,
    OutputParams, ReducedProblem,
};

/// A reduced-space solver: drives `q` towards a stationary point of the
/// reduced cost functional.
pub trait ReducedSolver<V: ControlVector> {
    /// Solve starting from `q`, overwriting it with the result.
    ///
    /// `global_tol`, when positive, tightens the absolute stopping tolerance
    /// and forces at least one iteration. Returns the number of outer
    /// iterations.
    fn solve(&mut self, q: &mut V, global_tol: Option<V::Real>) -> Result<usize, Error>;
}

/// One row of a difference-quotient check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferenceQuotient<F> {
    /// Step size used.
    pub eps: F,
    /// Value computed from the gradient or Hessian.
    pub exact: F,
    /// Finite-difference approximation.
    pub diff_quot: F,
    /// `(exact - diff_quot) / exact`.
    pub relative_error: F,
}

impl<F: reduced::Float> DifferenceQuotient<F> {
    fn new(eps: F, exact: F, diff_quot: F) -> Self {
        DifferenceQuotient {
            eps,
            exact,
            diff_quot,
            relative_error: (exact - diff_quot) / exact,
        }
    }
}

/// A reduced problem together with the handlers reporting on it.
///
/// Handlers not supplied by the caller are created here and dropped with the
/// algorithm.
pub struct ReducedAlgorithm<'a, V, P>
where
    V: ControlVector,
    P: ReducedProblem<V> + ?Sized,
{
    problem: &'a mut P,
    output: Handle<'a, dyn OutputHandler<V> + 'a>,
    exception: Handle<'a, dyn ExceptionHandler<V> + 'a>,
    base_priority: u32,
}

impl<'a, V, P> ReducedAlgorithm<'a, V, P>
where
    V: ControlVector + 'a,
    P: ReducedProblem<V> + ?Sized,
{
    /// Algorithm on `problem` with a default [`LogOutput`] and
    /// [`LogExceptionHandler`].
    pub fn new(problem: &'a mut P) -> Self {
        ReducedAlgorithm {
            problem,
            output: Handle::Owned(Box::new(LogOutput::default())),
            exception: Handle::Owned(Box::new(LogExceptionHandler)),
            base_priority: 0,
        }
    }

    /// Like [`ReducedAlgorithm::new`], configuring the default output handler.
    pub fn with_output_params(problem: &'a mut P, params: OutputParams) -> Result<Self, Error> {
        params.validate()?;
        let mut alg = Self::new(problem);
        alg.output = Handle::Owned(Box::new(LogOutput::new(params)));
        Ok(alg)
    }

    /// Report through `output` instead of the default handler.
    pub fn with_output(mut self, output: &'a mut (dyn OutputHandler<V> + 'a)) -> Self {
        self.output = Handle::Borrowed(output);
        self
    }

    /// Handle errors with `handler` instead of the default one.
    pub fn with_exception_handler(
        mut self,
        handler: &'a mut (dyn ExceptionHandler<V> + 'a),
    ) -> Self {
        self.exception = Handle::Borrowed(handler);
        self
    }

    /// Offset added to every output priority, for nesting algorithms.
    pub fn with_base_priority(mut self, base_priority: u32) -> Self {
        self.base_priority = base_priority;
        self
    }

    /// The reduced problem.
    pub fn problem(&self) -> &P {
        &*self.problem
    }

    /// The reduced problem, mutably.
    pub fn problem_mut(&mut self) -> &mut P {
        &mut *self.problem
    }

    /// The output handler.
    pub fn output(&mut self) -> &mut (dyn OutputHandler<V> + 'a) {
        &mut *self.output
    }

    /// Whether the output handler was created by this algorithm.
    pub fn owns_output(&self) -> bool {
        self.output.is_owned()
    }

    /// Whether the exception handler was created by this algorithm.
    pub fn owns_exception_handler(&self) -> bool {
        self.exception.is_owned()
    }

    pub fn base_priority(&self) -> u32 {
        self.base_priority
    }

    /// Reinitialize the problem and, if owned, the output handler.
    pub fn reinit(&mut self) {
        self.problem.reinit();
        if self.output.is_owned() {
            self.output.reinit();
        }
    }

    /// Write `text` with priority `priority` on top of the base priority.
    pub fn write(&mut self, text: &str, priority: u32) {
        self.output.write(text, priority + self.base_priority, 0, 0);
    }

    pub(crate) fn write_spaced(&mut self, text: &str, priority: u32) {
        self.output.write(text, priority + self.base_priority, 1, 1);
    }

    /// Hand a recoverable error to the exception handler.
    pub fn warn(&mut self, err: &Error, origin: &str) {
        self.exception.handle_exception(err, origin, &mut *self.output);
    }

    /// Hand a critical error to the exception handler, which decides whether
    /// it aborts the algorithm.
    pub fn critical(&mut self, err: Error, origin: &str) -> Result<(), Error> {
        self.exception
            .handle_critical_exception(err, origin, &mut *self.output)
    }

    /// `Some(value)` on success; otherwise route the error through
    /// [`ReducedAlgorithm::critical`] and yield `None` if the handler lets
    /// execution continue.
    pub fn critical_guard<T>(
        &mut self,
        result: Result<T, Error>,
        origin: &str,
    ) -> Result<Option<T>, Error> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                self.critical(err, origin)?;
                Ok(None)
            }
        }
    }

    /// Banner naming the problem and its sizes.
    pub(crate) fn banner(&self, title: &str, q: &V) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "**************************************************");
        let _ = writeln!(out, "*{title:^48}*");
        let _ = writeln!(out, "*   Solving : {}\t*", self.problem.name());
        let _ = write!(out, "*  CDoFs : ");
        let _ = q.print_infos(&mut out);
        let _ = write!(out, "*  SDoFs : ");
        let _ = self.problem.state_size_info(&mut out);
        out.push_str("**************************************************");
        out
    }

    /// Evaluate the cost functional and the auxiliary functionals at `q`.
    pub fn solve_forward(&mut self, q: &mut V) -> Result<(), Error> {
        const ORIGIN: &str = "ReducedAlgorithm::solve_forward";
        q.reinit();

        let banner = self.banner("Starting Forward Solver", q);
        self.write_spaced(&banner, 1);

        let cost = self.problem.compute_reduced_cost_functional(q);
        let cost = self
            .critical_guard(cost, ORIGIN)?
            .unwrap_or_else(num_traits::zero);
        let text = format!("CostFunctional: {}", self.output.format_number(to_f64(cost)));
        self.write(&text, 2);

        let functionals = self.problem.compute_reduced_functionals(q);
        self.critical_guard(functionals, ORIGIN)?;
        Ok(())
    }

    /// Compare `j'(q)·dq` with central difference quotients.
    ///
    /// `dq` is set to the constant `c`; `eps` is divided by ten after each of
    /// the `niter` rows.
    pub fn check_grads(
        &mut self,
        c: V::Real,
        q: &mut V,
        dq: &mut V,
        niter: usize,
        eps: V::Real,
    ) -> Result<Vec<DifferenceQuotient<V::Real>>, Error> {
        const ORIGIN: &str = "ReducedAlgorithm::check_grads";
        q.reinit();
        dq.reinit();
        dq.fill(c);

        let mut gradient = q.zeros_like();
        let mut gradient_transposed = q.zeros_like();
        let cost = self.problem.compute_reduced_cost_functional(q);
        self.critical_guard(cost, ORIGIN)?;
        let grad = self
            .problem
            .compute_reduced_gradient(q, &mut gradient, &mut gradient_transposed);
        self.critical_guard(grad, ORIGIN)?;
        let exact = gradient.dot(dq);

        self.write("Checking Gradients....\n Epsilon \t Exact \t Diff.Quot. \t Rel. Error ", 3);

        let mut rows = Vec::with_capacity(niter);
        let mut eps = eps;
        for _ in 0..niter {
            rows.push(self.first_difference_quotient(exact, eps, q, dq)?);
            eps = eps / lit(10.0);
        }
        Ok(rows)
    }

    /// One row of [`ReducedAlgorithm::check_grads`].
    pub fn first_difference_quotient(
        &mut self,
        exact: V::Real,
        eps: V::Real,
        q: &V,
        dq: &V,
    ) -> Result<DifferenceQuotient<V::Real>, Error> {
        const ORIGIN: &str = "ReducedAlgorithm::first_difference_quotient";
        let mut point = q.clone();
        point.add_scaled(eps, dq);
        let right = self.cost_or_nan(&point, ORIGIN)?;
        point.add_scaled(lit::<V::Real>(-2.0) * eps, dq);
        let left = self.cost_or_nan(&point, ORIGIN)?;

        let diff_quot = (right - left) / (lit::<V::Real>(2.0) * eps);
        let row = DifferenceQuotient::new(eps, exact, diff_quot);
        self.write_row(&row);
        Ok(row)
    }

    /// Compare `dq·H(q)dq` with second-order difference quotients.
    ///
    /// Same conventions as [`ReducedAlgorithm::check_grads`].
    pub fn check_hessian(
        &mut self,
        c: V::Real,
        q: &mut V,
        dq: &mut V,
        niter: usize,
        eps: V::Real,
    ) -> Result<Vec<DifferenceQuotient<V::Real>>, Error> {
        const ORIGIN: &str = "ReducedAlgorithm::check_hessian";
        q.reinit();
        dq.reinit();
        dq.fill(c);

        let mut gradient = q.zeros_like();
        let mut gradient_transposed = q.zeros_like();
        let mut hessian = q.zeros_like();
        let mut hessian_transposed = q.zeros_like();
        let cost = self.problem.compute_reduced_cost_functional(q);
        self.critical_guard(cost, ORIGIN)?;
        let grad = self
            .problem
            .compute_reduced_gradient(q, &mut gradient, &mut gradient_transposed);
        self.critical_guard(grad, ORIGIN)?;
        let hv = self.problem.compute_reduced_hessian_vector(
            q,
            dq,
            &mut hessian,
            &mut hessian_transposed,
        );
        self.critical_guard(hv, ORIGIN)?;
        let exact = hessian.dot(dq);

        self.write("Checking Hessian....\n Epsilon \t Exact \t Diff.Quot. \t Rel. Error ", 3);

        let mut rows = Vec::with_capacity(niter);
        let mut eps = eps;
        for _ in 0..niter {
            rows.push(self.second_difference_quotient(exact, eps, q, dq)?);
            eps = eps / lit(10.0);
        }
        Ok(rows)
    }

    /// One row of [`ReducedAlgorithm::check_hessian`].
    pub fn second_difference_quotient(
        &mut self,
        exact: V::Real,
        eps: V::Real,
        q: &V,
        dq: &V,
    ) -> Result<DifferenceQuotient<V::Real>, Error> {
        const ORIGIN: &str = "ReducedAlgorithm::second_difference_quotient";
        let mut point = q.clone();
        let mid = self.cost_or_nan(&point, ORIGIN)?;
        point.add_scaled(eps, dq);
        let right = self.cost_or_nan(&point, ORIGIN)?;
        point.add_scaled(lit::<V::Real>(-2.0) * eps, dq);
        let left = self.cost_or_nan(&point, ORIGIN)?;

        let diff_quot = (left - lit::<V::Real>(2.0) * mid + right) / (eps * eps);
        let row = DifferenceQuotient::new(eps, exact, diff_quot);
        self.write_row(&row);
        Ok(row)
    }

    fn cost_or_nan(&mut self, point: &V, origin: &str) -> Result<V::Real, Error> {
        let cost = self.problem.compute_reduced_cost_functional(point);
        Ok(self
            .critical_guard(cost, origin)?
            .unwrap_or_else(<V::Real as num_traits::Float>::nan))
    }

    fn write_row(&mut self, row: &DifferenceQuotient<V::Real>) {
        let text = format!(
            "{}\t{}\t{}\t{}",
            self.output.format_number(to_f64(row.eps)),
            self.output.format_number(to_f64(row.exact)),
            self.output.format_number(to_f64(row.diff_quot)),
            self.output.format_number(to_f64(row.relative_error)),
        );
        self.write(&text, 3);
    }
}
