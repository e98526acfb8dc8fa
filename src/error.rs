use thiserror::Error;

/// Errors raised by reduced problems and by the algorithms driving them.
///
/// Reduced problems report a failed state/adjoint solve as [`Error::Pde`].
/// The remaining variants are raised by the algorithms; the recoverable ones
/// ([`Error::IterationExceeded`] from inner loops, [`Error::NegativeCurvature`])
/// are only ever handed to an exception handler as warnings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A PDE solve (state, adjoint, tangent or second adjoint) failed.
    #[error("PDE solve failed: {message}")]
    Pde {
        /// Description provided by the reduced problem.
        message: String,
    },
    /// An iteration ceiling was reached.
    #[error("{origin}: iteration count exceeded bounds ({limit})")]
    IterationExceeded {
        /// Operation that ran out of iterations.
        origin: &'static str,
        /// The configured ceiling.
        limit: usize,
    },
    /// The Hessian is not positive definite along the current CG direction.
    #[error("{origin}: negative curvature detected")]
    NegativeCurvature {
        /// Operation that detected the curvature.
        origin: &'static str,
    },
    /// The line search ran out of steps while the cost functional could not
    /// be evaluated.
    #[error(
        "{origin}: iteration count exceeded bounds ({limit}) while unable to compute the cost functional"
    )]
    CostEvaluationFailed {
        /// Operation that gave up.
        origin: &'static str,
        /// The configured ceiling.
        limit: usize,
    },
    /// `gradient · gradient_transposed` was negative beyond the cancellation
    /// tolerance, i.e. the Riesz map supplied by the problem is inconsistent.
    #[error("{origin}: residual {residual:e} is negative")]
    NegativeResidual {
        /// Operation that computed the residual.
        origin: &'static str,
        /// The offending value.
        residual: f64,
    },
    /// A configuration value is out of range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name as it appears in a parameter file.
        name: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// The selected solver backend was not compiled in.
    #[error("the {backend} backend is not available; enable the `{backend}` feature")]
    BackendUnavailable {
        /// Backend name, which is also the cargo feature name.
        backend: &'static str,
    },
    /// The external solver backend failed to set up or run.
    #[error("{backend} failed: {message}")]
    Backend {
        /// Backend name.
        backend: &'static str,
        /// Backend-provided description.
        message: String,
    },
}

impl Error {
    /// Shorthand for [`Error::Pde`].
    pub fn pde(message: impl Into<String>) -> Self {
        Error::Pde {
            message: message.into(),
        }
    }
}
