use reduced::{ControlVector, Error, Float};

/// Parameters controlling the outer (nonlinear) iteration.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConvergenceParams<F> {
    /// Maximum number of outer iterations (default: 10).
    pub max_iter: usize,
    /// Relative tolerance: stop when `||g|| < tol * ||g_0||` (default: 1e-7).
    pub tol: F,
    /// Absolute tolerance: stop when `||g|| < global_tol` (default: 1e-11).
    pub global_tol: F,
}

impl Default for ConvergenceParams<f64> {
    fn default() -> Self {
        ConvergenceParams {
            max_iter: 10,
            tol: 1e-7,
            global_tol: 1e-11,
        }
    }
}

impl Default for ConvergenceParams<f32> {
    fn default() -> Self {
        ConvergenceParams {
            max_iter: 10,
            tol: 1e-4,
            global_tol: 1e-7,
        }
    }
}

impl<F: Float> ConvergenceParams<F> {
    /// Check the parameters for consistency.
    pub fn validate(&self) -> Result<(), Error> {
        positive("nonlinear_tol", self.tol)?;
        non_negative("nonlinear_global_tol", self.global_tol)
    }

    /// Whether the residual `res = ||g||²` still requires iterating, given the
    /// first residual and the effective absolute tolerance.
    pub fn keep_going(&self, res: F, firstres: F, global_tol: F) -> bool {
        res >= global_tol * global_tol && res >= self.tol * self.tol * firstres
    }
}

fn positive<F: Float>(name: &'static str, value: F) -> Result<(), Error> {
    if value.is_nan() || value <= F::zero() {
        return Err(Error::InvalidParameter {
            name,
            reason: format!("must be positive, got {value}"),
        });
    }
    Ok(())
}

pub(crate) fn non_negative<F: Float>(name: &'static str, value: F) -> Result<(), Error> {
    if value.is_nan() || value < F::zero() {
        return Err(Error::InvalidParameter {
            name,
            reason: format!("must be non-negative, got {value}"),
        });
    }
    Ok(())
}

/// Squared gradient norm `g · g_T` in the control space's inner product.
///
/// Non-negative for a consistent Riesz map, up to cancellation.
pub fn residual<V: ControlVector>(gradient: &V, gradient_transposed: &V) -> V::Real {
    gradient.dot(gradient_transposed)
}

/// `sqrt(res / firstres)`, or one when the first residual vanished.
pub fn relative_residual<F: Float>(res: F, firstres: F) -> F {
    if firstres > F::zero() {
        (res / firstres).sqrt()
    } else {
        F::one()
    }
}
