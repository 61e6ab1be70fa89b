//! Dense linear-system backends used by the DC flow oracle.

pub mod backend;
pub mod registry;

pub use backend::{FaerSolver, GaussSolver, LinearSystemBackend};
pub use registry::SolverKind;
