//! Reference value iteration over dense tables.

use log::debug;

use super::backup::BellmanBackup;
use super::session::Session;
use super::tables::DenseTables;
use super::{Real, Solution, Solver, SolverConfig};
use crate::error::Result;
use crate::mdp::MdpDescription;

/// Dense value iteration.
///
/// Materializes the full `actions x states x states` transition tensor, then
/// applies synchronous Bellman backups from `V = 0` until the sup-norm change
/// between sweeps drops below `0.5 * (1 - discount) / (2 * discount)` or the
/// time budget runs out.
///
/// # Examples
///
/// ```
/// use mdp_solvers::mdp::DenseMdp;
/// use mdp_solvers::solvers::{Solution, SolveStatus, Solver, SolverConfig, ValueIteration};
///
/// // State 0: action 0 stays (reward 1), action 1 moves to state 1 (reward 0).
/// // State 1: action 0 moves to state 0 (reward 0), action 1 stays (reward 2).
/// let mdp = DenseMdp::from_transitions(
///     0.9,
///     &[
///         vec![vec![(0, 1.0)], vec![(1, 1.0)]],
///         vec![vec![(0, 1.0)], vec![(1, 1.0)]],
///     ],
///     &[vec![1.0, 0.0], vec![0.0, 2.0]],
/// )
/// .unwrap();
///
/// let solution: Solution<f32> = ValueIteration::new(SolverConfig::default())
///     .solve(&mdp, 0)
///     .unwrap();
/// assert_eq!(solution.status, SolveStatus::Completed);
/// assert_eq!(solution.policy, vec![1, 1]);
/// assert!((solution.value[1] - 20.0).abs() < 0.5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValueIteration {
    config: SolverConfig,
}

impl ValueIteration {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl<T: Real> Solver<T> for ValueIteration {
    fn name(&self) -> &'static str {
        "vi"
    }

    fn solve(&self, mdp: &dyn MdpDescription, max_time_secs: u64) -> Result<Solution<T>> {
        let tables = DenseTables::<T>::load(mdp)?;
        debug!(
            "vi: starting (threshold {}, budget {}s, parallel {})",
            tables.threshold(),
            max_time_secs,
            self.config.parallel
        );
        let session = Session::new(&tables, max_time_secs, self.config.parallel)?;
        Ok(session.run())
    }
}
