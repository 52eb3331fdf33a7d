pub mod error;
pub mod mdp;
pub mod output;
pub mod solvers;
pub mod timing;

pub use error::{ConfigError, Result, SolverError};
pub use mdp::{DenseMdp, MatrixAccess, MdpDescription};
pub use solvers::{
    Solution, SolveStatus, Solver, SolverConfig, SolverKind, SparseValueIteration, ValueIteration,
};
