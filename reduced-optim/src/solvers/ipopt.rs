//! Delegates the whole nonlinear solve to the Ipopt interior-point solver.
//!
//! Requires the `ipopt` cargo feature; without it [`ReducedSolver::solve`]
//! fails with [`Error::BackendUnavailable`]. Ipopt only sees cost values,
//! gradients and the control box constraints, and runs with a limited-memory
//! Hessian approximation.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "ipopt")]
use num_traits::{Float as _, Zero};
use reduced::float::to_f64;
use reduced::{ControlVector, Error, Float, ReducedProblem};

use crate::algorithm::{ReducedAlgorithm, ReducedSolver};
use crate::convergence::non_negative;

/// Sparse linear solvers Ipopt can be asked to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum LinearSolver {
    #[default]
    Ma27,
    Ma57,
    Ma77,
    Ma86,
    Pardiso,
    Wsmp,
    Mumps,
}

impl LinearSolver {
    /// Name as understood by Ipopt's `linear_solver` option.
    pub fn as_str(self) -> &'static str {
        match self {
            LinearSolver::Ma27 => "ma27",
            LinearSolver::Ma57 => "ma57",
            LinearSolver::Ma77 => "ma77",
            LinearSolver::Ma86 => "ma86",
            LinearSolver::Pardiso => "pardiso",
            LinearSolver::Wsmp => "wsmp",
            LinearSolver::Mumps => "mumps",
        }
    }
}

impl fmt::Display for LinearSolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinearSolver {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ma27" => Ok(LinearSolver::Ma27),
            "ma57" => Ok(LinearSolver::Ma57),
            "ma77" => Ok(LinearSolver::Ma77),
            "ma86" => Ok(LinearSolver::Ma86),
            "pardiso" => Ok(LinearSolver::Pardiso),
            "wsmp" => Ok(LinearSolver::Wsmp),
            "mumps" => Ok(LinearSolver::Mumps),
            other => Err(Error::InvalidParameter {
                name: "linear_solver",
                reason: format!("unknown linear solver `{other}`"),
            }),
        }
    }
}

/// Configuration for [`ReducedIpoptAlgorithm`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IpoptConfig<F> {
    /// Ipopt's `tol` (default: 1e-5).
    pub tol: F,
    /// Send Ipopt's console output to `output_file` only (default: true).
    pub capture_output: bool,
    /// Linear solver used inside Ipopt (default: ma27).
    pub linear_solver: LinearSolver,
    /// Ipopt log file (default: `ipopt.out`).
    pub output_file: String,
}

impl Default for IpoptConfig<f64> {
    fn default() -> Self {
        IpoptConfig {
            tol: 1e-5,
            capture_output: true,
            linear_solver: LinearSolver::default(),
            output_file: "ipopt.out".to_string(),
        }
    }
}

impl Default for IpoptConfig<f32> {
    fn default() -> Self {
        IpoptConfig {
            tol: 1e-5,
            capture_output: true,
            linear_solver: LinearSolver::default(),
            output_file: "ipopt.out".to_string(),
        }
    }
}

impl<F: Float> IpoptConfig<F> {
    /// Check the parameters for consistency.
    pub fn validate(&self) -> Result<(), Error> {
        non_negative("tol", self.tol)
    }
}

/// Reduced-space solve by Ipopt with box constraints on the control.
pub struct ReducedIpoptAlgorithm<'a, V, P>
where
    V: ControlVector,
    P: ReducedProblem<V> + ?Sized,
{
    base: ReducedAlgorithm<'a, V, P>,
    config: IpoptConfig<V::Real>,
    #[cfg_attr(not(feature = "ipopt"), allow(dead_code))]
    postindex: String,
}

impl<'a, V, P> ReducedIpoptAlgorithm<'a, V, P>
where
    V: ControlVector + 'a,
    P: ReducedProblem<V> + ?Sized,
{
    /// Solver on top of `base` with the given configuration.
    pub fn new(
        base: ReducedAlgorithm<'a, V, P>,
        config: IpoptConfig<V::Real>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let postindex = format!("_{}", base.problem().name());
        Ok(ReducedIpoptAlgorithm {
            base,
            config,
            postindex,
        })
    }

    pub fn config(&self) -> &IpoptConfig<V::Real> {
        &self.config
    }

    pub fn base_mut(&mut self) -> &mut ReducedAlgorithm<'a, V, P> {
        &mut self.base
    }

    #[cfg_attr(not(feature = "ipopt"), allow(dead_code))]
    fn write_cost(&mut self, cost: V::Real) {
        self.base.output().init_out();
        let text = format!(
            "CostFunctional: {}",
            self.base.output().format_number(to_f64(cost))
        );
        self.base.write(&text, 2);
        self.base.output().init_newton_out();
    }
}

impl<'a, V, P> ReducedSolver<V> for ReducedIpoptAlgorithm<'a, V, P>
where
    V: ControlVector + 'a,
    P: ReducedProblem<V> + ?Sized,
{
    #[cfg(not(feature = "ipopt"))]
    fn solve(&mut self, q: &mut V, global_tol: Option<V::Real>) -> Result<usize, Error> {
        let _ = (q, global_tol);
        Err(Error::BackendUnavailable { backend: "ipopt" })
    }

    #[cfg(feature = "ipopt")]
    fn solve(&mut self, q: &mut V, global_tol: Option<V::Real>) -> Result<usize, Error> {
        const ORIGIN: &str = "ReducedIpoptAlgorithm::solve";
        q.reinit();

        let mut lower = q.zeros_like();
        let mut upper = q.zeros_like();
        self.base
            .problem()
            .control_box_constraints(&mut lower, &mut upper)?;

        let tag = format!("Opt_Ipopt{}", self.postindex);
        let control_name = format!("Control{}", self.postindex);
        let tol = self.config.tol.max(global_tol.unwrap_or(V::Real::zero()));

        let mut iter = 0;
        let mut cost = V::Real::zero();
        self.base.output().init_newton_out();

        let banner = self.base.banner("Starting Solution using IPOPT", q);
        self.base.write_spaced(&banner, 1);

        self.base.output().set_iteration_number(iter, &tag);
        self.base.output().write_control(q, &control_name, "control");

        let start = self.base.problem_mut().compute_reduced_cost_functional(q);
        if let Some(value) = self.base.critical_guard(start, ORIGIN)? {
            cost = value;
        }
        let cost_start = cost;
        self.write_cost(cost);

        let notice = if self.config.capture_output {
            "*  output will be written to logfile only!     *"
        } else {
            "*  output will not be written to logfile!      *"
        };
        let text = format!(
            "************************************************\n\
             *               Calling IPOPT                  *\n\
             {notice}\n\
             ************************************************\n"
        );
        self.base.write(&text, 1);

        let status = {
            let config = backend::Options {
                tol: to_f64(tol),
                linear_solver: self.config.linear_solver.as_str(),
                output_file: self
                    .config
                    .capture_output
                    .then_some(self.config.output_file.as_str()),
            };
            backend::run(self.base.problem_mut(), q, &lower, &upper, &config)?
        };

        let exit = if status.success {
            " (success)       *".to_string()
        } else {
            format!(" ({}) *", status.description)
        };
        let text = format!(
            "\n************************************************\n\
             *               IPOPT Finished                 *\n\
             *          with Exit Code: {:>3}{exit}\n\
             ************************************************",
            status.code
        );
        self.base.write(&text, 1);

        iter += 1;
        self.base.output().set_iteration_number(iter, &tag);
        self.base.output().write_control(q, &control_name, "control");

        let end = self.base.problem_mut().compute_reduced_cost_functional(q);
        if let Some(value) = self.base.critical_guard(end, ORIGIN)? {
            cost = value;
        }
        self.write_cost(cost);

        let functionals = self.base.problem_mut().compute_reduced_functionals(q);
        self.base.critical_guard(functionals, ORIGIN)?;

        let half = reduced::float::lit::<V::Real>(0.5);
        let reduction = to_f64((cost - cost_start) / (half * (cost_start + cost)).abs());
        let reduction = self.base.output().zero_tolerance(reduction, 1.0);
        let text = format!(
            "**************************************************\n\
             *        Stopping Solution Using IPOPT           *\n\
             *             Relative reduction in cost functional:{reduction:>11.4e}          *\n\
             *             Final value: {:.7}                                     *\n\
             **************************************************",
            to_f64(cost)
        );
        self.base.write_spaced(&text, 1);
        Ok(iter)
    }
}

#[cfg(feature = "ipopt")]
mod backend {
    use std::cell::RefCell;

    use ipopt::{BasicProblem, Ipopt, Number, SolveStatus};
    use num_traits::Zero;
    use reduced::float::{lit, to_f64};
    use reduced::{ControlVector, Error, ReducedProblem};

    pub(super) struct Options<'s> {
        pub tol: f64,
        pub linear_solver: &'s str,
        pub output_file: Option<&'s str>,
    }

    pub(super) struct Status {
        pub success: bool,
        pub code: i32,
        pub description: String,
    }

    /// Exposes a reduced problem to Ipopt through flat coefficient slices.
    struct Adapter<'p, V, P: ?Sized> {
        problem: RefCell<&'p mut P>,
        template: V,
        start: Vec<f64>,
        lower: Vec<f64>,
        upper: Vec<f64>,
    }

    impl<'p, V, P> Adapter<'p, V, P>
    where
        V: ControlVector,
        P: ReducedProblem<V> + ?Sized,
    {
        fn control(&self, x: &[Number]) -> V {
            let mut q = self.template.clone();
            let values: Vec<V::Real> = x.iter().map(|&v| lit(v)).collect();
            q.copy_from(&values);
            q
        }
    }

    fn flatten<V: ControlVector>(v: &V) -> Vec<f64> {
        let mut values = vec![V::Real::zero(); v.len()];
        v.copy_to(&mut values);
        values.into_iter().map(to_f64).collect()
    }

    impl<'p, V, P> BasicProblem for Adapter<'p, V, P>
    where
        V: ControlVector,
        P: ReducedProblem<V> + ?Sized,
    {
        fn num_variables(&self) -> usize {
            self.start.len()
        }

        fn bounds(&self, x_l: &mut [Number], x_u: &mut [Number]) -> bool {
            x_l.copy_from_slice(&self.lower);
            x_u.copy_from_slice(&self.upper);
            true
        }

        fn initial_point(&self, x: &mut [Number]) -> bool {
            x.copy_from_slice(&self.start);
            true
        }

        fn objective(&self, x: &[Number], obj: &mut Number) -> bool {
            let q = self.control(x);
            match self.problem.borrow_mut().compute_reduced_cost_functional(&q) {
                Ok(value) => {
                    *obj = to_f64(value);
                    true
                }
                Err(err) => {
                    log::debug!("ipopt objective: {err}");
                    false
                }
            }
        }

        fn objective_grad(&self, x: &[Number], grad_f: &mut [Number]) -> bool {
            let q = self.control(x);
            let mut gradient = q.zeros_like();
            let mut gradient_transposed = q.zeros_like();
            let mut problem = self.problem.borrow_mut();
            // Gradients are taken at the point of the last cost evaluation.
            let result = problem
                .compute_reduced_cost_functional(&q)
                .and_then(|_| {
                    problem.compute_reduced_gradient(&q, &mut gradient, &mut gradient_transposed)
                });
            match result {
                Ok(()) => {
                    grad_f.copy_from_slice(&flatten(&gradient));
                    true
                }
                Err(err) => {
                    log::debug!("ipopt gradient: {err}");
                    false
                }
            }
        }
    }

    /// Run Ipopt from `q` and write the solution back into it.
    pub(super) fn run<V, P>(
        problem: &mut P,
        q: &mut V,
        lower: &V,
        upper: &V,
        options: &Options<'_>,
    ) -> Result<Status, Error>
    where
        V: ControlVector,
        P: ReducedProblem<V> + ?Sized,
    {
        let adapter = Adapter {
            problem: RefCell::new(problem),
            template: q.clone(),
            start: flatten(q),
            lower: flatten(lower),
            upper: flatten(upper),
        };
        let mut solver = Ipopt::new_unconstrained(adapter).map_err(|err| Error::Backend {
            backend: "ipopt",
            message: format!("{err:?}"),
        })?;

        set(&mut solver, "tol", options.tol)?;
        set(&mut solver, "mu_strategy", "adaptive")?;
        set(&mut solver, "hessian_approximation", "limited-memory")?;
        set(&mut solver, "linear_solver", options.linear_solver)?;
        if let Some(file) = options.output_file {
            set(&mut solver, "output_file", file)?;
            set(&mut solver, "print_level", 0)?;
        }

        let result = solver.solve();
        let status = result.status;
        let solution: Vec<V::Real> = result
            .solver_data
            .solution
            .primal_variables
            .iter()
            .map(|&v| lit(v))
            .collect();
        q.copy_from(&solution);

        Ok(Status {
            success: matches!(
                status,
                SolveStatus::SolveSucceeded | SolveStatus::SolvedToAcceptableLevel
            ),
            code: return_code(status),
            description: format!("{status:?}"),
        })
    }

    /// Ipopt's `ApplicationReturnStatus` value for `status`.
    fn return_code(status: SolveStatus) -> i32 {
        match status {
            SolveStatus::SolveSucceeded => 0,
            SolveStatus::SolvedToAcceptableLevel => 1,
            SolveStatus::InfeasibleProblemDetected => 2,
            SolveStatus::SearchDirectionBecomesTooSmall => 3,
            SolveStatus::DivergingIterates => 4,
            SolveStatus::UserRequestedStop => 5,
            SolveStatus::FeasiblePointFound => 6,
            SolveStatus::MaximumIterationsExceeded => -1,
            SolveStatus::RestorationFailed => -2,
            SolveStatus::ErrorInStepComputation => -3,
            SolveStatus::MaximumCpuTimeExceeded => -4,
            SolveStatus::NotEnoughDegreesOfFreedom => -10,
            SolveStatus::InvalidProblemDefinition => -11,
            SolveStatus::InvalidOption => -12,
            SolveStatus::InvalidNumberDetected => -13,
            SolveStatus::UnrecoverableException => -100,
            SolveStatus::NonIpoptExceptionThrown => -101,
            SolveStatus::InsufficientMemory => -102,
            SolveStatus::InternalError => -199,
            SolveStatus::UnknownError => -200,
        }
    }

    fn set<'o, Pr, O>(solver: &mut Ipopt<Pr>, name: &str, value: O) -> Result<(), Error>
    where
        Pr: BasicProblem,
        O: Into<ipopt::IpoptOption<'o>>,
    {
        solver
            .set_option(name, value)
            .map(|_| ())
            .ok_or_else(|| Error::Backend {
                backend: "ipopt",
                message: format!("rejected option `{name}`"),
            })
    }
}
