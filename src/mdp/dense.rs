//! An owned, in-memory MDP backed by dense `ndarray` matrices.

use ndarray::Array2;

use super::{check_stochastic_rows, MatrixAccess, MdpDescription};
use crate::error::{ConfigError, Result};

/// Row sums may deviate from one by this much.
pub const STOCHASTIC_TOLERANCE: f64 = 1e-4;

/// A Markov Decision Process held as one `num_states x num_states` matrix per
/// action plus an action-major `num_actions x num_states` reward matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMdp {
    discount: f64,
    transitions: Vec<Array2<f64>>,
    rewards: Array2<f64>,
}

impl DenseMdp {
    /// Creates a new MDP from per-action transition matrices and an
    /// action-major reward matrix.
    ///
    /// The number of actions is `transitions.len()` and the number of states
    /// is `rewards.ncols()`. The discount factor is not checked here; solvers
    /// reject values outside `(0, 1)`.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if any matrix has the wrong shape or a
    /// transition row does not sum to one within [`STOCHASTIC_TOLERANCE`].
    pub fn new(discount: f64, transitions: Vec<Array2<f64>>, rewards: Array2<f64>) -> Result<Self> {
        let num_actions = transitions.len();
        let num_states = rewards.ncols();
        if rewards.nrows() != num_actions {
            return Err(ConfigError::ShapeMismatch {
                what: "reward matrix",
                expected: (num_actions, num_states),
                actual: rewards.dim(),
            }
            .into());
        }
        for t in &transitions {
            if t.dim() != (num_states, num_states) {
                return Err(ConfigError::ShapeMismatch {
                    what: "transition matrix",
                    expected: (num_states, num_states),
                    actual: t.dim(),
                }
                .into());
            }
        }

        let mdp = Self {
            discount,
            transitions,
            rewards,
        };
        check_stochastic_rows(&mdp, STOCHASTIC_TOLERANCE)?;
        Ok(mdp)
    }

    /// Builds an MDP from sparse successor lists.
    ///
    /// `transitions[s][a]` lists `(next_state, probability)` pairs for taking
    /// action `a` in state `s`; `rewards[s][a]` is the matching immediate
    /// reward. Repeated successors accumulate.
    ///
    /// ```
    /// use mdp_solvers::mdp::{DenseMdp, MdpDescription};
    ///
    /// let mdp = DenseMdp::from_transitions(
    ///     0.9,
    ///     &[
    ///         vec![vec![(0, 1.0)], vec![(1, 1.0)]],
    ///         vec![vec![(0, 1.0)], vec![(1, 1.0)]],
    ///     ],
    ///     &[vec![1.0, 0.0], vec![0.0, 2.0]],
    /// )
    /// .unwrap();
    /// assert_eq!(mdp.num_states(), 2);
    /// assert_eq!(mdp.num_actions(), 2);
    /// ```
    pub fn from_transitions(
        discount: f64,
        transitions: &[Vec<Vec<(usize, f64)>>],
        rewards: &[Vec<f64>],
    ) -> Result<Self> {
        let num_states = transitions.len();
        let num_actions = transitions.first().map_or(0, Vec::len);
        if rewards.len() != num_states {
            return Err(ConfigError::ShapeMismatch {
                what: "reward table",
                expected: (num_states, num_actions),
                actual: (rewards.len(), rewards.first().map_or(0, Vec::len)),
            }
            .into());
        }

        let mut matrices = vec![Array2::<f64>::zeros((num_states, num_states)); num_actions];
        let mut reward_t = Array2::<f64>::zeros((num_actions, num_states));
        for (s, (per_action, reward_row)) in transitions.iter().zip(rewards).enumerate() {
            if per_action.len() != num_actions || reward_row.len() != num_actions {
                return Err(ConfigError::ShapeMismatch {
                    what: "per-state action list",
                    expected: (num_actions, num_actions),
                    actual: (per_action.len(), reward_row.len()),
                }
                .into());
            }
            for (a, successors) in per_action.iter().enumerate() {
                for &(next, p) in successors {
                    if next >= num_states {
                        return Err(ConfigError::ShapeMismatch {
                            what: "successor state index",
                            expected: (num_states, 1),
                            actual: (next, 1),
                        }
                        .into());
                    }
                    matrices[a][[s, next]] += p;
                }
                reward_t[[a, s]] = reward_row[a];
            }
        }

        Self::new(discount, matrices, reward_t)
    }

    #[cfg(test)]
    pub(crate) fn from_parts_unchecked(
        discount: f64,
        transitions: Vec<Array2<f64>>,
        rewards: Array2<f64>,
    ) -> Self {
        Self {
            discount,
            transitions,
            rewards,
        }
    }

    pub fn with_discount(mut self, discount: f64) -> Self {
        self.discount = discount;
        self
    }

    pub fn transitions(&self) -> &[Array2<f64>] {
        &self.transitions
    }

    pub fn rewards(&self) -> &Array2<f64> {
        &self.rewards
    }
}

impl MdpDescription for DenseMdp {
    fn num_states(&self) -> usize {
        self.rewards.ncols()
    }

    fn num_actions(&self) -> usize {
        self.transitions.len()
    }

    fn discount(&self) -> f64 {
        self.discount
    }

    fn transition_matrix(&self, action: usize) -> &dyn MatrixAccess {
        &self.transitions[action]
    }

    fn reward_transposed(&self) -> &dyn MatrixAccess {
        &self.rewards
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SolverError;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_rows_sum_to_one() {
        let mdp = DenseMdp::from_transitions(
            0.95,
            &[
                vec![vec![(0, 0.7), (1, 0.3)], vec![(1, 1.0)]],
                vec![vec![(0, 0.4), (1, 0.6)], vec![(0, 0.1), (1, 0.9)]],
            ],
            &[vec![1.0, 2.0], vec![0.8, 1.5]],
        )
        .unwrap();

        for a in 0..mdp.num_actions() {
            let t = mdp.transition_matrix(a);
            for s in 0..mdp.num_states() {
                let sum: f64 = (0..mdp.num_states()).map(|n| t.entry(s, n)).sum();
                assert_abs_diff_eq!(sum, 1.0, epsilon = 1e-4);
            }
        }
        assert_eq!(mdp.reward_transposed().entry(1, 0), 2.0);
        assert_eq!(mdp.reward_transposed().entry(0, 1), 0.8);
    }

    #[test]
    fn test_rejects_non_stochastic_row() {
        let err = DenseMdp::from_transitions(0.9, &[vec![vec![(0, 0.5)]]], &[vec![10.0]]).unwrap_err();
        assert!(matches!(
            err,
            SolverError::Config(ConfigError::NotStochastic { action: 0, state: 0, .. })
        ));
    }

    #[test]
    fn test_rejects_reward_shape_mismatch() {
        let err = DenseMdp::new(0.9, vec![array![[1.0]]], array![[0.0], [0.0]]).unwrap_err();
        assert!(matches!(
            err,
            SolverError::Config(ConfigError::ShapeMismatch { what: "reward matrix", .. })
        ));
    }

    #[test]
    fn test_rejects_out_of_range_successor() {
        let err = DenseMdp::from_transitions(0.9, &[vec![vec![(3, 1.0)]]], &[vec![0.0]]).unwrap_err();
        assert!(err.is_config());
    }
}
