#![allow(dead_code)]

use std::fmt;

use reduced::{ControlVector, DenseControl, Error, ExceptionHandler, OutputHandler, ReducedProblem};

pub type Control = DenseControl<f64>;

// ============================================================
// Handlers
// ============================================================

/// Keeps everything written to it, regardless of priority.
#[derive(Default)]
pub struct Recorder {
    pub messages: Vec<(u32, String)>,
    pub errors: Vec<String>,
    pub controls: Vec<String>,
    pub tags: Vec<(String, usize)>,
    pub reinits: usize,
}

impl Recorder {
    pub fn wrote(&self, needle: &str) -> bool {
        self.messages.iter().any(|(_, m)| m.contains(needle))
    }

    pub fn errored(&self, needle: &str) -> bool {
        self.errors.iter().any(|m| m.contains(needle))
    }

    pub fn last_iteration(&self, tag: &str) -> Option<usize> {
        self.tags.iter().rev().find(|(t, _)| t == tag).map(|&(_, n)| n)
    }
}

impl OutputHandler<Control> for Recorder {
    fn reinit(&mut self) {
        self.reinits += 1;
    }

    fn write(&mut self, text: &str, priority: u32, _: u32, _: u32) {
        self.messages.push((priority, text.to_string()));
    }

    fn write_error(&mut self, text: &str) {
        self.errors.push(text.to_string());
    }

    fn write_control(&mut self, _: &Control, name: &str, _: &str) {
        self.controls.push(name.to_string());
    }

    fn set_iteration_number(&mut self, n: usize, tag: &str) {
        self.tags.push((tag.to_string(), n));
    }
}

/// Records warnings; re-raises critical errors unless `swallow` is set.
#[derive(Default)]
pub struct Collect {
    pub warnings: Vec<Error>,
    pub critical: Vec<Error>,
    pub swallow: bool,
}

impl<V: ControlVector> ExceptionHandler<V> for Collect {
    fn handle_exception(&mut self, err: &Error, _: &str, _: &mut dyn OutputHandler<V>) {
        self.warnings.push(err.clone());
    }

    fn handle_critical_exception(
        &mut self,
        err: Error,
        _: &str,
        _: &mut dyn OutputHandler<V>,
    ) -> Result<(), Error> {
        self.critical.push(err.clone());
        if self.swallow {
            Ok(())
        } else {
            Err(err)
        }
    }
}

// ============================================================
// Problems
// ============================================================

/// `j(q) = sum f(q_i)` with a diagonal Hessian; the Riesz map is the
/// identity.
pub struct Separable {
    pub name: &'static str,
    pub f: fn(f64) -> f64,
    pub df: fn(f64) -> f64,
    pub d2f: fn(f64) -> f64,
    pub fail_cost: bool,
    pub cost_evals: usize,
    pub hvps: usize,
    pub functionals: usize,
    pub reinits: usize,
}

impl Separable {
    fn new(name: &'static str, f: fn(f64) -> f64, df: fn(f64) -> f64, d2f: fn(f64) -> f64) -> Self {
        Separable {
            name,
            f,
            df,
            d2f,
            fail_cost: false,
            cost_evals: 0,
            hvps: 0,
            functionals: 0,
            reinits: 0,
        }
    }

    /// `f(x) = x^2`.
    pub fn squares() -> Self {
        Separable::new("squares", |x| x * x, |x| 2.0 * x, |_| 2.0)
    }

    /// `f(x) = x^4/4 + x^2/2`.
    pub fn convex_quartic() -> Self {
        Separable::new(
            "quartic",
            |x| 0.25 * x.powi(4) + 0.5 * x * x,
            |x| x.powi(3) + x,
            |x| 3.0 * x * x + 1.0,
        )
    }

    /// `f(x) = x^4/4 - x^2/2`, minima at `x = ±1`, concave near zero.
    pub fn double_well() -> Self {
        Separable::new(
            "double_well",
            |x| 0.25 * x.powi(4) - 0.5 * x * x,
            |x| x.powi(3) - x,
            |x| 3.0 * x * x - 1.0,
        )
    }
}

impl ReducedProblem<Control> for Separable {
    fn name(&self) -> &str {
        self.name
    }

    fn reinit(&mut self) {
        self.reinits += 1;
    }

    fn compute_reduced_cost_functional(&mut self, q: &Control) -> Result<f64, Error> {
        self.cost_evals += 1;
        if self.fail_cost {
            return Err(Error::pde("state solver did not converge"));
        }
        Ok(q.values().iter().map(|&x| (self.f)(x)).sum())
    }

    fn compute_reduced_gradient(
        &mut self,
        q: &Control,
        gradient: &mut Control,
        gradient_transposed: &mut Control,
    ) -> Result<(), Error> {
        for i in 0..q.len() {
            gradient[i] = (self.df)(q[i]);
        }
        gradient_transposed.assign(gradient);
        Ok(())
    }

    fn compute_reduced_hessian_vector(
        &mut self,
        q: &Control,
        direction: &Control,
        hessian_direction: &mut Control,
        hessian_direction_transposed: &mut Control,
    ) -> Result<(), Error> {
        self.hvps += 1;
        for i in 0..q.len() {
            hessian_direction[i] = (self.d2f)(q[i]) * direction[i];
        }
        hessian_direction_transposed.assign(hessian_direction);
        Ok(())
    }

    fn compute_reduced_functionals(&mut self, _q: &Control) -> Result<(), Error> {
        self.functionals += 1;
        Ok(())
    }

    fn state_size_info(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "0")
    }
}

/// Identity Hessian, but with a Riesz map `M = diag(1, -0.01)` that is not
/// positive definite, so CG residuals turn slightly negative.
#[derive(Default)]
pub struct Skewed {
    pub hvps: usize,
}

const SKEW: [f64; 2] = [1.0, -0.01];

impl ReducedProblem<Control> for Skewed {
    fn name(&self) -> &str {
        "skewed"
    }

    fn compute_reduced_cost_functional(&mut self, q: &Control) -> Result<f64, Error> {
        Ok(0.5 * q.dot(q))
    }

    fn compute_reduced_gradient(
        &mut self,
        _q: &Control,
        gradient: &mut Control,
        gradient_transposed: &mut Control,
    ) -> Result<(), Error> {
        for i in 0..2 {
            gradient[i] = 1.0;
            gradient_transposed[i] = SKEW[i];
        }
        Ok(())
    }

    fn compute_reduced_hessian_vector(
        &mut self,
        _q: &Control,
        direction: &Control,
        hessian_direction: &mut Control,
        hessian_direction_transposed: &mut Control,
    ) -> Result<(), Error> {
        self.hvps += 1;
        for i in 0..2 {
            hessian_direction[i] = direction[i];
            hessian_direction_transposed[i] = SKEW[i] * direction[i];
        }
        Ok(())
    }

    fn state_size_info(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "0")
    }
}

/// `j(q) = q·Hq/2 + q_1 + q_2` with `H = diag(1e-8, 1e-6)`: the gradient at
/// the origin is `(1, 1)` and a single CG step overshoots by orders of
/// magnitude. Records every point the cost is evaluated at.
#[derive(Default)]
pub struct NearlySingular {
    pub trials: Vec<Vec<f64>>,
    pub hvps: usize,
}

const STIFF: [f64; 2] = [1e-8, 1e-6];

impl ReducedProblem<Control> for NearlySingular {
    fn name(&self) -> &str {
        "nearly_singular"
    }

    fn compute_reduced_cost_functional(&mut self, q: &Control) -> Result<f64, Error> {
        self.trials.push(q.values().to_vec());
        Ok((0..2).map(|i| 0.5 * STIFF[i] * q[i] * q[i] + q[i]).sum())
    }

    fn compute_reduced_gradient(
        &mut self,
        q: &Control,
        gradient: &mut Control,
        gradient_transposed: &mut Control,
    ) -> Result<(), Error> {
        for i in 0..2 {
            gradient[i] = STIFF[i] * q[i] + 1.0;
        }
        gradient_transposed.assign(gradient);
        Ok(())
    }

    fn compute_reduced_hessian_vector(
        &mut self,
        _q: &Control,
        direction: &Control,
        hessian_direction: &mut Control,
        hessian_direction_transposed: &mut Control,
    ) -> Result<(), Error> {
        self.hvps += 1;
        for i in 0..2 {
            hessian_direction[i] = STIFF[i] * direction[i];
        }
        hessian_direction_transposed.assign(hessian_direction);
        Ok(())
    }

    fn state_size_info(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "0")
    }
}

/// Distributed control of `-y'' = q` on the unit interval with homogeneous
/// Dirichlet conditions, tracking `y_d(x) = sin(pi x)` with Tikhonov weight
/// `alpha`. Finite differences, state and adjoint solved with the Thomas
/// algorithm.
pub struct Poisson1d {
    pub n: usize,
    pub alpha: f64,
    target: Vec<f64>,
    state: Vec<f64>,
    pub hvps: usize,
}

impl Poisson1d {
    pub fn new(n: usize, alpha: f64) -> Self {
        let h = 1.0 / (n + 1) as f64;
        let target = (1..=n)
            .map(|i| (std::f64::consts::PI * i as f64 * h).sin())
            .collect();
        Poisson1d {
            n,
            alpha,
            target,
            state: vec![0.0; n],
            hvps: 0,
        }
    }

    fn h(&self) -> f64 {
        1.0 / (self.n + 1) as f64
    }

    /// Solve `tridiag(-1, 2, -1) / h^2 x = rhs`.
    fn solve(&self, rhs: &[f64]) -> Vec<f64> {
        let n = self.n;
        let h2 = self.h() * self.h();
        let mut c = vec![0.0; n];
        let mut d = vec![0.0; n];
        c[0] = -0.5;
        d[0] = rhs[0] * h2 / 2.0;
        for i in 1..n {
            let m = 2.0 + c[i - 1];
            c[i] = -1.0 / m;
            d[i] = (rhs[i] * h2 + d[i - 1]) / m;
        }
        let mut x = vec![0.0; n];
        x[n - 1] = d[n - 1];
        for i in (0..n - 1).rev() {
            x[i] = d[i] - c[i] * x[i + 1];
        }
        x
    }
}

impl ReducedProblem<DenseControl<f64>> for Poisson1d {
    fn name(&self) -> &str {
        "poisson1d"
    }

    fn compute_reduced_cost_functional(&mut self, q: &DenseControl<f64>) -> Result<f64, Error> {
        self.state = self.solve(q.values());
        let h = self.h();
        let misfit: f64 = self
            .state
            .iter()
            .zip(&self.target)
            .map(|(y, yd)| (y - yd) * (y - yd))
            .sum();
        Ok(0.5 * h * misfit + 0.5 * self.alpha * h * q.dot(q))
    }

    fn compute_reduced_gradient(
        &mut self,
        q: &DenseControl<f64>,
        gradient: &mut DenseControl<f64>,
        gradient_transposed: &mut DenseControl<f64>,
    ) -> Result<(), Error> {
        let h = self.h();
        let rhs: Vec<f64> = self
            .state
            .iter()
            .zip(&self.target)
            .map(|(y, yd)| h * (y - yd))
            .collect();
        let adjoint = self.solve(&rhs);
        for i in 0..self.n {
            gradient[i] = self.alpha * h * q[i] + adjoint[i];
        }
        gradient_transposed.assign(gradient);
        Ok(())
    }

    fn compute_reduced_hessian_vector(
        &mut self,
        _q: &DenseControl<f64>,
        direction: &DenseControl<f64>,
        hessian_direction: &mut DenseControl<f64>,
        hessian_direction_transposed: &mut DenseControl<f64>,
    ) -> Result<(), Error> {
        self.hvps += 1;
        let h = self.h();
        let tangent: Vec<f64> = self.solve(direction.values()).iter().map(|t| h * t).collect();
        let second_adjoint = self.solve(&tangent);
        for i in 0..self.n {
            hessian_direction[i] = self.alpha * h * direction[i] + second_adjoint[i];
        }
        hessian_direction_transposed.assign(hessian_direction);
        Ok(())
    }

    fn state_size_info(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "{}", self.n)
    }
}
