//! Value iteration over compressed-row transition tables.

use log::debug;

use super::backup::BellmanBackup;
use super::session::Session;
use super::sparse::SparseTables;
use super::{Real, Solution, Solver, SolverConfig};
use crate::error::Result;
use crate::mdp::MdpDescription;

/// Value iteration that stores and sums only non-zero transitions.
///
/// Same stopping rule, time budget and tie-break as
/// [`super::ValueIteration`]; results differ only by floating-point
/// summation order.
#[derive(Debug, Clone, Default)]
pub struct SparseValueIteration {
    config: SolverConfig,
}

impl SparseValueIteration {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl<T: Real> Solver<T> for SparseValueIteration {
    fn name(&self) -> &'static str {
        "spvi"
    }

    fn solve(&self, mdp: &dyn MdpDescription, max_time_secs: u64) -> Result<Solution<T>> {
        let tables = SparseTables::<T>::load(mdp)?;
        debug!(
            "spvi: starting with {} non-zeros (threshold {}, budget {}s)",
            tables.nnz(),
            tables.threshold(),
            max_time_secs
        );
        let session = Session::new(&tables, max_time_secs, self.config.parallel)?;
        Ok(session.run())
    }
}
