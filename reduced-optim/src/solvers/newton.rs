use num_traits::{Float as _, One, Zero};
use reduced::float::{lit, to_f64};
use reduced::{ControlVector, Error, Float, Norm, ReducedProblem, Restriction};

use crate::algorithm::{ReducedAlgorithm, ReducedSolver};
use crate::cg::{truncated_cg, CgOutcome, CgParams, CgStatus};
use crate::convergence::{relative_residual, residual, ConvergenceParams};
use crate::line_search::{backtracking_armijo, ArmijoParams, LineSearchOutcome, LineSearchStatus};

const ORIGIN: &str = "ReducedNewtonAlgorithm::solve";
const CG_ORIGIN: &str = "ReducedNewtonAlgorithm::solve_reduced_linear_system";
const LINE_SEARCH_ORIGIN: &str = "ReducedNewtonAlgorithm::reduced_newton_line_search";

/// Configuration for the reduced Newton-CG solver.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NewtonConfig<F> {
    /// Outer iteration parameters (`nonlinear_*`).
    pub convergence: ConvergenceParams<F>,
    /// Inner CG parameters (`linear_*`).
    pub linear: CgParams<F>,
    /// Line search parameters (`line_maxiter`, `linesearch_*`).
    pub line_search: ArmijoParams<F>,
    /// Evaluate the auxiliary functionals after every step (default: false).
    pub compute_functionals_in_every_step: bool,
}

impl Default for NewtonConfig<f64> {
    fn default() -> Self {
        NewtonConfig {
            convergence: ConvergenceParams::default(),
            linear: CgParams::default(),
            line_search: ArmijoParams::default(),
            compute_functionals_in_every_step: false,
        }
    }
}

impl Default for NewtonConfig<f32> {
    fn default() -> Self {
        NewtonConfig {
            convergence: ConvergenceParams::default(),
            linear: CgParams::default(),
            line_search: ArmijoParams::default(),
            compute_functionals_in_every_step: false,
        }
    }
}

impl<F: Float> NewtonConfig<F> {
    /// Check all parameter groups.
    pub fn validate(&self) -> Result<(), Error> {
        self.convergence.validate()?;
        self.linear.validate()?;
        self.line_search.validate()
    }
}

/// Reduced-space Newton method: truncated CG for the Newton step, globalized
/// by an Armijo line search.
///
/// Only cost values, gradients and Hessian-vector products of the reduced
/// problem are used. Steps computed along negative curvature, or which fail
/// to descend, are replaced by the negative (transposed) gradient.
pub struct ReducedNewtonAlgorithm<'a, V, P>
where
    V: ControlVector,
    P: ReducedProblem<V> + ?Sized,
{
    base: ReducedAlgorithm<'a, V, P>,
    config: NewtonConfig<V::Real>,
    postindex: String,
}

impl<'a, V, P> ReducedNewtonAlgorithm<'a, V, P>
where
    V: ControlVector + 'a,
    P: ReducedProblem<V> + ?Sized,
{
    /// Solver on top of `base` with the given configuration.
    pub fn new(
        base: ReducedAlgorithm<'a, V, P>,
        config: NewtonConfig<V::Real>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let postindex = format!("_{}", base.problem().name());
        Ok(ReducedNewtonAlgorithm {
            base,
            config,
            postindex,
        })
    }

    pub fn config(&self) -> &NewtonConfig<V::Real> {
        &self.config
    }

    /// The underlying algorithm scaffolding (handlers, problem, checks).
    pub fn base(&self) -> &ReducedAlgorithm<'a, V, P> {
        &self.base
    }

    pub fn base_mut(&mut self) -> &mut ReducedAlgorithm<'a, V, P> {
        &mut self.base
    }

    /// Norm of the reduced gradient at `q`, `sqrt(g · g_T)`.
    pub fn newton_residual(&mut self, q: &V) -> Result<V::Real, Error> {
        const ORIGIN: &str = "ReducedNewtonAlgorithm::newton_residual";
        let mut gradient = q.zeros_like();
        let mut gradient_transposed = q.zeros_like();

        let cost = self.base.problem_mut().compute_reduced_cost_functional(q);
        self.base.critical_guard(cost, ORIGIN)?;
        let grad = self
            .base
            .problem_mut()
            .compute_reduced_gradient(q, &mut gradient, &mut gradient_transposed);
        self.base.critical_guard(grad, ORIGIN)?;

        checked_residual(&gradient, &gradient_transposed, ORIGIN).map(|res| res.sqrt())
    }

    /// Compute the Newton step `dq` at `q` by truncated CG.
    pub fn solve_reduced_linear_system(
        &mut self,
        q: &V,
        gradient: &V,
        gradient_transposed: &V,
        dq: &mut V,
    ) -> Result<CgOutcome, Error> {
        let tag = format!("OptNewtonCg{}", self.postindex);
        truncated_cg(
            &mut self.base,
            &self.config.linear,
            q,
            gradient,
            gradient_transposed,
            dq,
            &tag,
        )
    }

    /// Move `q` along `dq` with Armijo backtracking, updating `cost`.
    pub fn reduced_newton_line_search(
        &mut self,
        dq: &V,
        gradient: &V,
        cost: &mut V::Real,
        q: &mut V,
    ) -> Result<LineSearchOutcome, Error> {
        backtracking_armijo(&mut self.base, &self.config.line_search, dq, gradient, cost, q)
    }

    fn write_cost(&mut self, cost: V::Real, priority: u32) {
        let text = format!(
            "CostFunctional: {}",
            self.base.output().format_number(to_f64(cost))
        );
        self.base.write(&text, priority);
    }

    fn compute_functionals(&mut self, q: &V) -> Result<(), Error> {
        let functionals = self.base.problem_mut().compute_reduced_functionals(q);
        self.base.critical_guard(functionals, ORIGIN)?;
        Ok(())
    }

    fn compute_gradient(
        &mut self,
        q: &V,
        gradient: &mut V,
        gradient_transposed: &mut V,
    ) -> Result<(), Error> {
        let grad = self
            .base
            .problem_mut()
            .compute_reduced_gradient(q, gradient, gradient_transposed);
        self.base.critical_guard(grad, ORIGIN)?;
        Ok(())
    }
}

impl<'a, V, P> ReducedSolver<V> for ReducedNewtonAlgorithm<'a, V, P>
where
    V: ControlVector + 'a,
    P: ReducedProblem<V> + ?Sized,
{
    fn solve(&mut self, q: &mut V, global_tol: Option<V::Real>) -> Result<usize, Error> {
        q.reinit();
        let mut dq = q.zeros_like();
        let mut gradient = q.zeros_like();
        let mut gradient_transposed = q.zeros_like();

        let tag = format!("OptNewton{}", self.postindex);
        let control_name = format!("Control{}", self.postindex);
        let residual_name = format!("NewtonResidual{}", self.postindex);

        let mut iter = 0;
        let mut cost = V::Real::zero();
        self.base.output().init_newton_out();

        let banner = self.base.banner("Starting Reduced Newton Algorithm", q);
        self.base.write_spaced(&banner, 1);

        self.base.output().set_iteration_number(iter, &tag);
        self.base.output().write_control(q, &control_name, "control");

        let initial = self.base.problem_mut().compute_reduced_cost_functional(q);
        if let Some(value) = self.base.critical_guard(initial, ORIGIN)? {
            cost = value;
        }
        self.write_cost(cost, 2);

        if self.config.compute_functionals_in_every_step {
            self.compute_functionals(q)?;
        }

        self.compute_gradient(q, &mut gradient, &mut gradient_transposed)?;
        let mut res = checked_residual(&gradient, &gradient_transposed, ORIGIN)?;
        let firstres = res;

        self.base.output().write_control(&gradient, &residual_name, "control");
        let text = format!(
            "\t Newton step: {iter}\t Residual (abs.): {}\n\t Newton step: {iter}\t Residual (rel.): {}",
            self.base.output().format_number(to_f64(res.sqrt())),
            self.base.output().format_number(1.0),
        );
        self.base.write(&text, 3);

        let requested = global_tol.unwrap_or(V::Real::zero());
        let miniter = if requested > V::Real::zero() { 1 } else { 0 };
        let gtol = self.config.convergence.global_tol.max(requested);

        while self.config.convergence.keep_going(res, firstres, gtol) || iter < miniter {
            iter += 1;
            self.base.output().set_iteration_number(iter, &tag);

            if iter > self.config.convergence.max_iter {
                return Err(Error::IterationExceeded {
                    origin: ORIGIN,
                    limit: self.config.convergence.max_iter,
                });
            }

            let cg =
                self.solve_reduced_linear_system(q, &gradient, &gradient_transposed, &mut dq)?;
            match cg.status {
                CgStatus::Converged => {}
                CgStatus::IterationExceeded => {
                    self.base.warn(
                        &Error::IterationExceeded {
                            origin: CG_ORIGIN,
                            limit: self.config.linear.max_iter,
                        },
                        ORIGIN,
                    );
                    // Probably a nearly singular Hessian.
                    let step = dq.norm_by(Norm::Infinity, Restriction::All);
                    let scale = gradient_transposed.norm_by(Norm::Infinity, Restriction::All);
                    if step > lit::<V::Real>(10000.0) * scale {
                        self.base
                            .output()
                            .write_error("Step discarded, taking negative Gradient instead.");
                        dq.equ(-V::Real::one(), &gradient_transposed);
                    }
                }
                CgStatus::NegativeCurvature => {
                    self.base
                        .warn(&Error::NegativeCurvature { origin: CG_ORIGIN }, ORIGIN);
                }
            }

            if gradient.dot(&dq) > V::Real::zero() {
                self.base.output().write_error(
                    "Warning: computed direction doesn't seem to be a descent direction! Trying negative gradient instead.",
                );
                dq.equ(-V::Real::one(), &gradient_transposed);
            }

            let line = self.reduced_newton_line_search(&dq, &gradient, &mut cost, q)?;
            if line.status == LineSearchStatus::IterationExceeded {
                self.base.warn(
                    &Error::IterationExceeded {
                        origin: LINE_SEARCH_ORIGIN,
                        limit: self.config.line_search.max_iter,
                    },
                    ORIGIN,
                );
            }

            self.write_cost(cost, 3);

            if self.config.compute_functionals_in_every_step {
                self.compute_functionals(q)?;
            }

            self.compute_gradient(q, &mut gradient, &mut gradient_transposed)?;

            self.base.output().write_control(q, &control_name, "control");
            self.base.output().write_control(&gradient, &residual_name, "control");

            res = checked_residual(&gradient, &gradient_transposed, ORIGIN)?;

            let rel = self
                .base
                .output()
                .zero_tolerance(to_f64(relative_residual(res, firstres)), 1.0);
            let text = format!(
                "\t Newton step: {iter}\t Residual (rel.): {}\t LinearIters [{}]\t LineSearch {{{}}} ",
                self.base.output().format_number(rel),
                cg_summary(&cg),
                line_summary(&line),
            );
            self.base.write(&text, 3);
        }

        self.write_cost(cost, 2);
        self.compute_functionals(q)?;

        let rel = self
            .base
            .output()
            .zero_tolerance(to_f64(relative_residual(res, firstres)), 1.0);
        let text = format!(
            "**************************************************\n\
             *        Stopping Reduced Newton Algorithm       *\n\
             *             after {iter:>6}  Iterations           *\n\
             *             with rel. Residual {rel:>11.4e}          *\n\
             **************************************************"
        );
        self.base.write_spaced(&text, 1);

        log::debug!("{tag}: finished after {iter} iterations");
        Ok(iter)
    }
}

/// `g · g_T`, rejecting negative values.
fn checked_residual<V: ControlVector>(
    gradient: &V,
    gradient_transposed: &V,
    origin: &'static str,
) -> Result<V::Real, Error> {
    let res = residual(gradient, gradient_transposed);
    if res < V::Real::zero() {
        return Err(Error::NegativeResidual {
            origin,
            residual: to_f64(res),
        });
    }
    Ok(res)
}

fn cg_summary(cg: &CgOutcome) -> String {
    match cg.status {
        CgStatus::Converged => cg.iterations.to_string(),
        status => format!("{} ({status})", cg.iterations),
    }
}

fn line_summary(line: &LineSearchOutcome) -> String {
    match line.status {
        LineSearchStatus::Accepted => line.iterations.to_string(),
        LineSearchStatus::IterationExceeded => {
            format!("{} (iteration count exceeded)", line.iterations)
        }
    }
}
