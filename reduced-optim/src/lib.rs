pub mod algorithm;
pub mod cg;
pub mod convergence;
pub mod line_search;
pub mod solvers;

pub use algorithm::{DifferenceQuotient, ReducedAlgorithm, ReducedSolver};
pub use cg::{truncated_cg, CgOutcome, CgParams, CgStatus};
pub use convergence::ConvergenceParams;
pub use line_search::{backtracking_armijo, ArmijoParams, LineSearchOutcome, LineSearchStatus};
pub use solvers::ipopt::{IpoptConfig, LinearSolver, ReducedIpoptAlgorithm};
pub use solvers::newton::{NewtonConfig, ReducedNewtonAlgorithm};
