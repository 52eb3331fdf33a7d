//! The MDP description consumed by the solvers.
//!
//! A solver never parses a file format. It reads an MDP through the two
//! read-only capabilities below: a per-action transition matrix and an
//! action-major reward matrix, each exposing `entry(row, col)`.

pub mod cassandra;
pub mod dense;
pub mod random;

use ndarray::{ArrayBase, Data, Ix2};

use crate::error::{ConfigError, Result};

pub use cassandra::{load_cassandra, parse_cassandra};
pub use dense::DenseMdp;
pub use random::generate;

/// Read-only matrix lookup.
pub trait MatrixAccess {
    /// `(rows, cols)`.
    fn shape(&self) -> (usize, usize);

    fn entry(&self, row: usize, col: usize) -> f64;
}

impl<S> MatrixAccess for ArrayBase<S, Ix2>
where
    S: Data<Elem = f64>,
{
    fn shape(&self) -> (usize, usize) {
        self.dim()
    }

    fn entry(&self, row: usize, col: usize) -> f64 {
        self[[row, col]]
    }
}

/// A finite, fully-observed Markov Decision Process.
///
/// Implementations guarantee that `transition_matrix(a)` is
/// `num_states x num_states` with stochastic rows and that
/// `reward_transposed()` is `num_actions x num_states`.
pub trait MdpDescription {
    fn num_states(&self) -> usize;

    fn num_actions(&self) -> usize;

    fn discount(&self) -> f64;

    /// `entry(from, to)` is the probability of moving `from -> to` under `action`.
    fn transition_matrix(&self, action: usize) -> &dyn MatrixAccess;

    /// `entry(action, state)` is the immediate reward of taking `action` in `state`.
    fn reward_transposed(&self) -> &dyn MatrixAccess;
}

/// Verifies that every transition row of `mdp` sums to one within `tolerance`.
pub fn check_stochastic_rows(mdp: &dyn MdpDescription, tolerance: f64) -> Result<()> {
    let ns = mdp.num_states();
    for action in 0..mdp.num_actions() {
        let matrix = mdp.transition_matrix(action);
        for state in 0..ns {
            let sum: f64 = (0..ns).map(|next| matrix.entry(state, next)).sum();
            if (sum - 1.0).abs() > tolerance {
                return Err(ConfigError::NotStochastic { action, state, sum }.into());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_ndarray_matrix_access() {
        let m = array![[0.25, 0.75], [1.0, 0.0]];
        assert_eq!(MatrixAccess::shape(&m), (2, 2));
        assert_eq!(m.entry(0, 1), 0.75);
        assert_eq!(m.view().entry(1, 0), 1.0);
    }

    #[test]
    fn test_check_stochastic_rows_reports_first_bad_row() {
        let mdp = DenseMdp::from_parts_unchecked(
            0.9,
            vec![array![[1.0, 0.0], [0.5, 0.5]], array![[0.5, 0.4], [0.0, 1.0]]],
            array![[0.0, 0.0], [1.0, 1.0]],
        );
        let err = check_stochastic_rows(&mdp, 1e-4).unwrap_err();
        match err {
            crate::error::SolverError::Config(ConfigError::NotStochastic {
                action, state, ..
            }) => assert_eq!((action, state), (1, 0)),
            other => panic!("unexpected error: {other}"),
        }
    }
}
