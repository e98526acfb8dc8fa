//! Truncated conjugate gradients for the reduced Newton system.
//!
//! Solves `H(q)·dq = -g` with Hessian-vector products only. The iteration
//! stops once the residual dropped by the forcing factor
//! `min(0.25, sqrt(||g||²))`, falls below the absolute tolerance, hits
//! negative curvature or runs out of iterations.

use std::fmt;

use num_traits::{Float as _, One, Zero};
use reduced::float::{lit, to_f64};
use reduced::{ControlVector, Error, Float, ReducedProblem};

use crate::algorithm::ReducedAlgorithm;
use crate::convergence::{non_negative, residual};

const ORIGIN: &str = "ReducedNewtonAlgorithm::solve_reduced_linear_system";

/// Parameters for the inner CG iteration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CgParams<F> {
    /// Maximum number of CG iterations (default: 40).
    pub max_iter: usize,
    /// Relative tolerance (default: 1e-10). Kept for parameter files; the
    /// stopping rule uses the forcing factor instead.
    pub tol: F,
    /// Absolute tolerance: stop when `||r|| < global_tol` (default: 1e-12).
    pub global_tol: F,
}

impl Default for CgParams<f64> {
    fn default() -> Self {
        CgParams {
            max_iter: 40,
            tol: 1e-10,
            global_tol: 1e-12,
        }
    }
}

impl Default for CgParams<f32> {
    fn default() -> Self {
        CgParams {
            max_iter: 40,
            tol: 1e-6,
            global_tol: 1e-8,
        }
    }
}

impl<F: Float> CgParams<F> {
    /// Check the parameters for consistency.
    pub fn validate(&self) -> Result<(), Error> {
        non_negative("linear_tol", self.tol)?;
        non_negative("linear_global_tol", self.global_tol)
    }
}

/// How the CG iteration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgStatus {
    /// Residual reduced below the forcing or absolute tolerance.
    Converged,
    /// Ran out of iterations; `dq` holds the last iterate.
    IterationExceeded,
    /// `d·H·d < 0` for the current direction.
    NegativeCurvature,
}

impl fmt::Display for CgStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CgStatus::Converged => write!(f, "converged"),
            CgStatus::IterationExceeded => write!(f, "iteration count exceeded"),
            CgStatus::NegativeCurvature => write!(f, "negative curvature"),
        }
    }
}

/// Result of [`truncated_cg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CgOutcome {
    /// CG iterations performed (Hessian-vector products along search
    /// directions).
    pub iterations: usize,
    pub status: CgStatus,
}

/// Approximately solve `H(q)·dq = -g`, overwriting `dq`.
///
/// `gradient_transposed` is the Riesz representative of `gradient`; the
/// residual is measured as `r · r_T`. On negative curvature in the first
/// iteration `dq` is set to the step along that direction, which callers
/// are expected to check for descent.
///
/// A residual that turns negative is recomputed from scratch; if it stays
/// negative but within tolerance it is clamped to its absolute value and the
/// iteration stops. Anything else is reported as [`Error::NegativeResidual`].
pub fn truncated_cg<'a, V, P>(
    alg: &mut ReducedAlgorithm<'a, V, P>,
    params: &CgParams<V::Real>,
    q: &V,
    gradient: &V,
    gradient_transposed: &V,
    dq: &mut V,
    tag: &str,
) -> Result<CgOutcome, Error>
where
    V: ControlVector + 'a,
    P: ReducedProblem<V> + ?Sized,
{
    dq.assign(gradient);
    dq.fill(V::Real::zero());
    let mut r = gradient.clone();
    let mut r_t = gradient_transposed.clone();
    let mut d = gradient_transposed.zeros_like();
    d.equ(-V::Real::one(), gradient_transposed);
    let mut hd = d.zeros_like();
    let mut hd_t = d.zeros_like();

    let mut res = residual(&r, &r_t);
    if res < V::Real::zero() {
        return Err(Error::NegativeResidual {
            origin: ORIGIN,
            residual: to_f64(res),
        });
    }
    let firstres = res;
    let forcing = lit::<V::Real>(0.25).min(firstres.sqrt()) * firstres;
    let abs_tol = params.global_tol * params.global_tol;

    let text = format!(
        "Starting Reduced Linear Solver with Residual: {}",
        alg.output().format_number(to_f64(res.sqrt()))
    );
    alg.write(&text, 4);

    let mut iter = 0;
    alg.output().set_iteration_number(iter, tag);

    while res >= forcing && res >= abs_tol {
        iter += 1;
        alg.output().set_iteration_number(iter, tag);
        if iter > params.max_iter {
            return Ok(CgOutcome {
                iterations: params.max_iter,
                status: CgStatus::IterationExceeded,
            });
        }

        let hv = alg
            .problem_mut()
            .compute_reduced_hessian_vector(q, &d, &mut hd, &mut hd_t);
        alg.critical_guard(hv, ORIGIN)?;

        let alpha = res / hd.dot(&d);
        if alpha < V::Real::zero() {
            if iter == 1 {
                dq.add_scaled(alpha, &d);
            }
            log::debug!("{tag}: negative curvature in CG iteration {iter}");
            return Ok(CgOutcome {
                iterations: iter,
                status: CgStatus::NegativeCurvature,
            });
        }

        dq.add_scaled(alpha, &d);
        r.add_scaled(alpha, &hd);
        r_t.add_scaled(alpha, &hd_t);

        let oldres = res;
        res = residual(&r, &r_t);
        if res < V::Real::zero() {
            // Update formula broke down; recompute r = g + H·dq.
            let hv = alg
                .problem_mut()
                .compute_reduced_hessian_vector(q, dq, &mut hd, &mut hd_t);
            alg.critical_guard(hv, ORIGIN)?;
            r.assign(gradient);
            r_t.assign(gradient_transposed);
            r.add_scaled(V::Real::one(), &hd);
            r_t.add_scaled(V::Real::one(), &hd_t);
            res = residual(&r, &r_t);
        }
        if res < V::Real::zero() && (res > -abs_tol || res > -forcing) {
            // Below tolerance either way; flipping the sign ends the loop.
            res = res.abs();
            alg.write(
                "\t There seem to be cancellation errors accumulating in the Residual,\n\t and its norm gets negative. Since it is below the tolerance, we stop the iteration.",
                4,
            );
        }
        if res < V::Real::zero() {
            return Err(Error::NegativeResidual {
                origin: ORIGIN,
                residual: to_f64(res),
            });
        }

        let text = format!(
            "\t Cg step: {iter}\t Residual: {}",
            alg.output().format_number(to_f64(res.sqrt()))
        );
        alg.write(&text, 4);

        // Fletcher-Reeves
        let beta = res / oldres;
        d.mul_scalar(beta);
        d.add_scaled(-V::Real::one(), &r_t);
    }

    Ok(CgOutcome {
        iterations: iter,
        status: CgStatus::Converged,
    })
}
