//! Compressed-row transition storage.
//!
//! Row `a * num_states + s` lists the successors of state `s` under action
//! `a` that have non-zero probability. Rewards use the same dense action-major
//! table as [`super::DenseTables`].

use log::debug;
use ndarray::Array2;

use super::backup::BellmanBackup;
use super::tables::{check_shape, check_value_bound, load_rewards, narrow};
use super::{stopping_threshold, validate_description, Real};
use crate::error::{Result, SolverError};
use crate::mdp::MdpDescription;

#[derive(Debug, Clone)]
pub struct SparseTables<T> {
    num_states: usize,
    /// `row_start[r]..row_start[r + 1]` indexes the successors of row `r`.
    row_start: Vec<usize>,
    next_state: Vec<usize>,
    probability: Vec<T>,
    rewards: Array2<T>,
    discount: T,
    threshold: T,
}

impl<T: Real> SparseTables<T> {
    /// Copies the non-zero transition probabilities and every reward out of `mdp`.
    pub fn load(mdp: &dyn MdpDescription) -> Result<Self> {
        let (ns, na, discount) = validate_description(mdp)?;
        let discount: T = narrow(discount, "discount", 0, 0, 0)?;

        let rows = na.checked_mul(ns).ok_or(SolverError::allocation(usize::MAX))?;
        let mut nnz = 0usize;
        for a in 0..na {
            let matrix = mdp.transition_matrix(a);
            check_shape(matrix, "transition matrix", (ns, ns))?;
            for s in 0..ns {
                nnz += (0..ns).filter(|&next| matrix.entry(s, next) != 0.0).count();
            }
        }

        let rewards = load_rewards(mdp, na, ns)?;
        check_value_bound(&rewards, discount)?;

        let mut row_start = reserve::<usize>(rows + 1)?;
        let mut next_state = reserve::<usize>(nnz)?;
        let mut probability = reserve::<T>(nnz)?;
        row_start.push(0);
        for a in 0..na {
            let matrix = mdp.transition_matrix(a);
            for s in 0..ns {
                for next in 0..ns {
                    let p = matrix.entry(s, next);
                    if p != 0.0 {
                        next_state.push(next);
                        probability.push(narrow(p, "transition", a, s, next)?);
                    }
                }
                row_start.push(next_state.len());
            }
        }

        debug!(
            "sparse tables: Ns={ns}, Na={na}, {nnz} non-zero transitions ({:.2}% dense)",
            100.0 * nnz as f64 / (rows as f64 * ns as f64)
        );
        Ok(Self {
            num_states: ns,
            row_start,
            next_state,
            probability,
            rewards,
            discount,
            threshold: stopping_threshold(discount),
        })
    }

    /// Number of stored (non-zero) transitions.
    pub fn nnz(&self) -> usize {
        self.probability.len()
    }

    /// Successors of `state` under `action` as `(next_state, probability)`.
    pub fn successors(&self, action: usize, state: usize) -> impl Iterator<Item = (usize, T)> + '_ {
        let row = action * self.num_states + state;
        let range = self.row_start[row]..self.row_start[row + 1];
        self.next_state[range.clone()]
            .iter()
            .copied()
            .zip(self.probability[range].iter().copied())
    }
}

impl<T: Real> BellmanBackup<T> for SparseTables<T> {
    fn num_states(&self) -> usize {
        self.num_states
    }

    fn num_actions(&self) -> usize {
        self.rewards.nrows()
    }

    fn discount(&self) -> T {
        self.discount
    }

    fn threshold(&self) -> T {
        self.threshold
    }

    fn reward(&self, action: usize, state: usize) -> T {
        self.rewards[[action, state]]
    }

    fn expected_value(&self, action: usize, state: usize, value: &[T]) -> T {
        self.successors(action, state)
            .map(|(next, p)| p * value[next])
            .sum()
    }
}

fn reserve<V>(len: usize) -> Result<Vec<V>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| SolverError::allocation(len))?;
    Ok(buf)
}
