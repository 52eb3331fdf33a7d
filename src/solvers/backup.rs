//! One synchronous Bellman backup over every state.
//!
//! For each state `s` the sweep picks the action maximizing
//! `R(a, s) + discount * sum over s' of P(s' | s, a) * V(s')`.
//! Ties keep the lowest-indexed action. The sweep only reads the current value
//! vector and writes each state's slot of the output vectors, so the per-state
//! loop can run in parallel without changing the result.

use rayon::prelude::*;

use super::Real;

/// Table storage that can evaluate Bellman backups.
pub trait BellmanBackup<T: Real>: Sync {
    fn num_states(&self) -> usize;

    fn num_actions(&self) -> usize;

    fn discount(&self) -> T;

    /// Sup-norm change below which iteration stops, derived from the discount.
    fn threshold(&self) -> T;

    fn reward(&self, action: usize, state: usize) -> T;

    /// `sum over s' of P(s' | state, action) * value[s']`.
    fn expected_value(&self, action: usize, state: usize, value: &[T]) -> T;

    /// The greedy action for `state` and its backed-up value.
    fn best_action(&self, state: usize, value: &[T]) -> (usize, T) {
        let mut best: Option<(usize, T)> = None;
        for action in 0..self.num_actions() {
            let candidate = self.reward(action, state)
                + self.discount() * self.expected_value(action, state, value);
            let improves = match best {
                None => true,
                Some((_, best_value)) => candidate > best_value,
            };
            if improves {
                best = Some((action, candidate));
            }
        }
        best.unwrap_or((0, T::neg_infinity()))
    }

    /// Writes the backup of `value` into `next_value` and `next_policy`.
    fn sweep(&self, value: &[T], next_value: &mut [T], next_policy: &mut [usize], parallel: bool) {
        if parallel {
            next_value
                .par_iter_mut()
                .zip(next_policy.par_iter_mut())
                .enumerate()
                .for_each(|(state, (v, a))| {
                    (*a, *v) = self.best_action(state, value);
                });
        } else {
            for (state, (v, a)) in next_value.iter_mut().zip(next_policy.iter_mut()).enumerate() {
                (*a, *v) = self.best_action(state, value);
            }
        }
    }
}

/// Largest absolute component-wise difference between `a` and `b`.
///
/// A NaN difference (from `inf - inf`) makes the result NaN, which never
/// passes a `delta < threshold` test.
pub fn sup_norm<T: Real>(a: &[T], b: &[T]) -> T {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x - y).abs())
        .fold(T::zero(), |acc, d| if d.is_nan() || d > acc { d } else { acc })
}
