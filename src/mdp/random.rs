//! Seeded random MDP generation for benchmarks and smoke runs.

use ndarray::Array2;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::DenseMdp;
use crate::error::Result;

/// Generates a random MDP.
///
/// Every `(action, state)` row gets `branching` distinct successors (clamped
/// to `1..=num_states`) with random normalized probabilities. Rewards are
/// uniform in `[-1, 1]`. The same seed always yields the same MDP.
///
/// ```
/// use mdp_solvers::mdp::{random, MdpDescription};
///
/// let mdp = random::generate(20, 3, 0.95, 4, 7).unwrap();
/// assert_eq!(mdp.num_states(), 20);
/// assert_eq!(mdp.num_actions(), 3);
/// ```
pub fn generate(
    num_states: usize,
    num_actions: usize,
    discount: f64,
    branching: usize,
    seed: u64,
) -> Result<DenseMdp> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let branching = branching.clamp(1, num_states.max(1));

    let mut transitions = Vec::with_capacity(num_actions);
    for _ in 0..num_actions {
        let mut matrix = Array2::<f64>::zeros((num_states, num_states));
        for state in 0..num_states {
            let successors = index::sample(&mut rng, num_states, branching);
            // Offset keeps every weight strictly positive.
            let weights: Vec<f64> = (0..branching)
                .map(|_| rng.gen_range(0.0..1.0) + 1e-3)
                .collect();
            let total: f64 = weights.iter().sum();
            for (next, w) in successors.iter().zip(&weights) {
                matrix[[state, next]] = w / total;
            }
        }
        transitions.push(matrix);
    }

    let rewards = Array2::from_shape_fn((num_actions, num_states), |_| rng.gen_range(-1.0..=1.0));

    DenseMdp::new(discount, transitions, rewards)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdp::MdpDescription;

    #[test]
    fn test_same_seed_same_mdp() {
        let a = generate(15, 2, 0.9, 3, 42).unwrap();
        let b = generate(15, 2, 0.9, 3, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_branching_is_respected() {
        let mdp = generate(30, 2, 0.9, 5, 1).unwrap();
        for t in mdp.transitions() {
            for row in t.rows() {
                assert_eq!(row.iter().filter(|&&p| p > 0.0).count(), 5);
            }
        }
    }

    #[test]
    fn test_branching_clamped_to_state_count() {
        let mdp = generate(3, 1, 0.9, 10, 1).unwrap();
        assert_eq!(mdp.num_states(), 3);
        assert!(mdp.transitions()[0].iter().all(|&p| p > 0.0));
    }

    #[test]
    fn test_rewards_in_range() {
        let mdp = generate(10, 4, 0.5, 2, 9).unwrap();
        assert!(mdp.rewards().iter().all(|r| (-1.0..=1.0).contains(r)));
    }
}
