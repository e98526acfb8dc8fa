pub mod control;
pub mod dense;
pub mod error;
pub mod exception;
pub mod float;
pub mod handle;
pub mod output;
pub mod problem;

#[cfg(feature = "nalgebra")]
pub mod nalgebra_support;

pub use control::{ControlVector, Norm, Restriction};
pub use dense::{ControlSpace, DenseControl};
pub use error::Error;
pub use exception::{ExceptionHandler, LogExceptionHandler};
pub use float::Float;
pub use handle::Handle;
pub use output::{LogOutput, NumberFormat, OutputHandler, OutputParams};
pub use problem::ReducedProblem;
