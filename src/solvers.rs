//! Value-iteration solvers for finite, fully-observed MDPs.
//!
//! Every solver implements [`Solver`]: it takes an [`MdpDescription`] and a
//! wall-clock budget in whole seconds and returns a greedy policy, its value
//! function and a [`SolveStatus`]. Callers pick a solver by name through
//! [`SolverKind`] and get the same result shape from each.
//!
//! The solvers share one driver ([`session::Session`]) and differ only in how
//! they store the MDP and evaluate `sum over s' of P(s' | s, a) * V(s')`:
//!
//! | Name   | Solver                          | Storage                          |
//! |--------|---------------------------------|----------------------------------|
//! | `vi`   | [`ValueIteration`]              | dense `A x S x S` tensor         |
//! | `spvi` | [`SparseValueIteration`]        | compressed rows, non-zeros only  |
//!
//! Numbers default to `f32`. Solving in `f64` is supported and changes the
//! number of iterations needed to meet the stopping threshold.

pub mod backup;
pub mod session;
pub mod sparse;
pub mod sparse_value_iteration;
pub mod tables;
pub mod value_iteration;

use std::fmt::{Debug, Display};
use std::iter::Sum;
use std::str::FromStr;

use ndarray::LinalgScalar;
use num_traits::Float;

use crate::error::{ConfigError, Result};
use crate::mdp::MdpDescription;

pub use backup::{sup_norm, BellmanBackup};
pub use session::{Session, SessionState, Step};
pub use sparse::SparseTables;
pub use sparse_value_iteration::SparseValueIteration;
pub use tables::DenseTables;
pub use value_iteration::ValueIteration;

/// Floating-point types the solvers can run in.
pub trait Real: Float + LinalgScalar + Sum + Send + Sync + Debug + Display + 'static {}

impl<T> Real for T where T: Float + LinalgScalar + Sum + Send + Sync + Debug + Display + 'static {}

/// How a solve ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// The sup-norm stopping test passed before the time budget ran out.
    Completed,
    /// The time budget ran out first; the result is the last full sweep.
    TimedOut,
}

/// Output of a solve.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution<T> {
    /// `policy[s]` is the 0-based greedy action for state `s`.
    pub policy: Vec<usize>,
    /// `value[s]` is the expected discounted return from state `s`.
    pub value: Vec<T>,
    pub status: SolveStatus,
    /// Number of completed backup sweeps.
    pub iterations: u64,
    pub elapsed_secs: f32,
}

impl<T> Solution<T> {
    pub fn timed_out(&self) -> bool {
        self.status == SolveStatus::TimedOut
    }
}

/// Options shared by all solvers.
#[derive(Debug, Clone, Default)]
pub struct SolverConfig {
    /// Run the per-state loop of each sweep on rayon's global pool.
    pub parallel: bool,
}

impl SolverConfig {
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

/// A solver for finite MDPs.
pub trait Solver<T: Real> {
    /// Short name used for selection, e.g. `"vi"`.
    fn name(&self) -> &'static str;

    /// Solves `mdp`, stopping after `max_time_secs` seconds unless it is 0.
    ///
    /// # Errors
    /// Returns an error if the MDP has no states or actions, its discount is
    /// outside `(0, 1)`, or the solver tables cannot be allocated. Running out
    /// of time is reported through [`Solution::status`], not as an error.
    fn solve(&self, mdp: &dyn MdpDescription, max_time_secs: u64) -> Result<Solution<T>>;
}

/// The available solvers, selectable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    ValueIteration,
    SparseValueIteration,
}

impl SolverKind {
    pub fn name(self) -> &'static str {
        match self {
            SolverKind::ValueIteration => "vi",
            SolverKind::SparseValueIteration => "spvi",
        }
    }

    /// Builds the selected solver.
    ///
    /// ```
    /// use mdp_solvers::mdp::DenseMdp;
    /// use mdp_solvers::solvers::{SolveStatus, SolverConfig, SolverKind};
    ///
    /// let mdp = DenseMdp::from_transitions(0.9, &[vec![vec![(0, 1.0)]]], &[vec![1.0]]).unwrap();
    /// let solver = "spvi".parse::<SolverKind>().unwrap().build::<f32>(SolverConfig::default());
    /// let solution = solver.solve(&mdp, 0).unwrap();
    /// assert_eq!(solution.status, SolveStatus::Completed);
    /// assert_eq!(solution.policy, vec![0]);
    /// ```
    pub fn build<T: Real>(self, config: SolverConfig) -> Box<dyn Solver<T>> {
        match self {
            SolverKind::ValueIteration => Box::new(ValueIteration::new(config)),
            SolverKind::SparseValueIteration => Box::new(SparseValueIteration::new(config)),
        }
    }
}

impl FromStr for SolverKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "vi" => Ok(SolverKind::ValueIteration),
            "spvi" => Ok(SolverKind::SparseValueIteration),
            other => Err(ConfigError::UnknownSolver {
                name: other.to_string(),
            }),
        }
    }
}

/// Sup-norm bound below which iteration stops: `0.5 * (1 - discount) / (2 * discount)`.
///
/// Only meaningful for `discount` in `(0, 1)`; the table adapters reject
/// anything else before this is evaluated.
pub fn stopping_threshold<T: Real>(discount: T) -> T {
    let one = T::one();
    let two = one + one;
    (one / two) * (one - discount) / (two * discount)
}

/// Rejects empty MDPs and discounts outside `(0, 1)`.
pub fn validate_description(mdp: &dyn MdpDescription) -> Result<(usize, usize, f64)> {
    let num_states = mdp.num_states();
    let num_actions = mdp.num_actions();
    let discount = mdp.discount();
    if num_states == 0 {
        return Err(ConfigError::NoStates.into());
    }
    if num_actions == 0 {
        return Err(ConfigError::NoActions.into());
    }
    if !(discount > 0.0 && discount < 1.0) {
        return Err(ConfigError::InvalidDiscount { discount }.into());
    }
    Ok((num_states, num_actions, discount))
}
