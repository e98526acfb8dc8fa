use num_traits::{Float as _, One, Zero};
use reduced::float::lit;
use reduced::{ControlVector, Error, Float, ReducedProblem};

use crate::algorithm::ReducedAlgorithm;

const ORIGIN: &str = "ReducedNewtonAlgorithm::reduced_newton_line_search";

/// Parameters for the backtracking Armijo line search.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmijoParams<F> {
    /// Maximum number of backtracking steps (default: 4). With `0` the full
    /// step is always taken.
    pub max_iter: usize,
    /// Backtracking factor (default: 0.9).
    pub rho: F,
    /// Sufficient decrease parameter (default: 0.1).
    pub c: F,
}

impl Default for ArmijoParams<f64> {
    fn default() -> Self {
        ArmijoParams {
            max_iter: 4,
            rho: 0.9,
            c: 0.1,
        }
    }
}

impl Default for ArmijoParams<f32> {
    fn default() -> Self {
        ArmijoParams {
            max_iter: 4,
            rho: 0.9,
            c: 0.1,
        }
    }
}

impl<F: Float> ArmijoParams<F> {
    /// Check the parameters for consistency.
    pub fn validate(&self) -> Result<(), Error> {
        if !(self.rho > F::zero() && self.rho < F::one()) {
            return Err(Error::InvalidParameter {
                name: "linesearch_rho",
                reason: format!("must lie in (0, 1), got {}", self.rho),
            });
        }
        if !(self.c > F::zero() && self.c < F::one()) {
            return Err(Error::InvalidParameter {
                name: "linesearch_c",
                reason: format!("must lie in (0, 1), got {}", self.c),
            });
        }
        Ok(())
    }
}

/// How the line search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearchStatus {
    /// A step satisfying the Armijo condition was found (or the test is
    /// disabled).
    Accepted,
    /// Ran out of backtracking steps; `q` holds the last trial point.
    IterationExceeded,
}

/// Result of [`backtracking_armijo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSearchOutcome {
    /// Number of backtracking steps taken.
    pub iterations: usize,
    pub status: LineSearchStatus,
}

/// Backtracking line search satisfying the Armijo (sufficient decrease)
/// condition, updating `q` and `cost` in place.
///
/// Starts from the full step `q + dq` and shrinks the step by `rho` until
/// `j(q + alpha*dq) < cost + c * alpha * g·dq`. Trial points whose cost is
/// not finite, or cannot be evaluated at all, are always rejected. Running
/// out of steps while the cost still cannot be evaluated is an error.
pub fn backtracking_armijo<'a, V, P>(
    alg: &mut ReducedAlgorithm<'a, V, P>,
    params: &ArmijoParams<V::Real>,
    dq: &V,
    gradient: &V,
    cost: &mut V::Real,
    q: &mut V,
) -> Result<LineSearchOutcome, Error>
where
    V: ControlVector + 'a,
    P: ReducedProblem<V> + ?Sized,
{
    let rho = params.rho;
    let c = params.c;

    q.add_scaled(V::Real::one(), dq);
    let (mut cost_new, mut failed) = trial_cost(alg, q);

    let mut alpha = V::Real::one();
    let mut iter = 0;

    let mut reduction = gradient.dot(dq);
    if reduction > V::Real::zero() {
        alg.output()
            .write_error("Warning: computed direction doesn't seem to be a descent direction!");
        reduction = V::Real::zero();
    }

    if params.max_iter == 0 {
        // Full step, caller's cost left as is.
        return Ok(LineSearchOutcome {
            iterations: 0,
            status: LineSearchStatus::Accepted,
        });
    }

    if reduction.abs() < lit::<V::Real>(1e-10) * *cost {
        reduction = V::Real::zero();
    }

    let cost_old = *cost;
    let rejected = |cost_new: V::Real, alpha: V::Real, failed: bool| {
        failed || !cost_new.is_finite() || cost_new >= cost_old + c * alpha * reduction
    };

    if rejected(cost_new, alpha, failed) {
        alg.write("\t linesearch ", 4);
        while rejected(cost_new, alpha, failed) {
            iter += 1;
            if iter > params.max_iter {
                if failed {
                    return Err(Error::CostEvaluationFailed {
                        origin: ORIGIN,
                        limit: params.max_iter,
                    });
                }
                *cost = cost_new;
                return Ok(LineSearchOutcome {
                    iterations: params.max_iter,
                    status: LineSearchStatus::IterationExceeded,
                });
            }
            q.add_scaled(alpha * (rho - V::Real::one()), dq);
            alpha = alpha * rho;

            let (value, evaluation_failed) = trial_cost(alg, q);
            failed = evaluation_failed;
            if !failed {
                cost_new = value;
            }
        }
    }
    *cost = cost_new;

    Ok(LineSearchOutcome {
        iterations: iter,
        status: LineSearchStatus::Accepted,
    })
}

/// Cost at a trial point; failures are written and flagged rather than
/// propagated.
fn trial_cost<'a, V, P>(alg: &mut ReducedAlgorithm<'a, V, P>, q: &V) -> (V::Real, bool)
where
    V: ControlVector + 'a,
    P: ReducedProblem<V> + ?Sized,
{
    match alg.problem_mut().compute_reduced_cost_functional(q) {
        Ok(value) => (value, false),
        Err(err) => {
            log::debug!("{ORIGIN}: {err}");
            alg.write("Computing Cost Failed", 4);
            (V::Real::zero(), true)
        }
    }
}
