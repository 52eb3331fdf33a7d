//! Dense lookup tables built from an [`MdpDescription`].
//!
//! The transition tensor is indexed `(action, state, next_state)` and the
//! reward table `(action, state)`, both row-major. They are filled once per
//! solve and never change afterwards.

use log::debug;
use ndarray::{s, Array2, Array3, ArrayView1};

use super::backup::BellmanBackup;
use super::{stopping_threshold, validate_description, Real};
use crate::error::{ConfigError, Result, SolverError};
use crate::mdp::{MatrixAccess, MdpDescription};

/// Dense transition tensor and reward table for one solve.
#[derive(Debug, Clone)]
pub struct DenseTables<T> {
    transitions: Array3<T>,
    rewards: Array2<T>,
    discount: T,
    threshold: T,
}

impl<T: Real> DenseTables<T> {
    /// Copies every transition probability and reward out of `mdp`.
    ///
    /// # Errors
    /// Fails before allocating the transition tensor if the MDP has no states
    /// or actions, its discount is outside `(0, 1)`, a matrix has the wrong
    /// shape, or its rewards are too large for `T` once discounted. Fails
    /// with [`SolverError::Allocation`] if the tables are too large to
    /// allocate.
    pub fn load(mdp: &dyn MdpDescription) -> Result<Self> {
        let (ns, na, discount) = validate_description(mdp)?;
        let discount: T = narrow(discount, "discount", 0, 0, 0)?;

        for a in 0..na {
            check_shape(mdp.transition_matrix(a), "transition matrix", (ns, ns))?;
        }
        let rewards = load_rewards(mdp, na, ns)?;
        check_value_bound(&rewards, discount)?;

        let tensor_len = na
            .checked_mul(ns)
            .and_then(|n| n.checked_mul(ns))
            .ok_or(SolverError::allocation(usize::MAX))?;
        let mut stm = zeroed::<T>(tensor_len)?;
        let mut idx = 0;
        for a in 0..na {
            let matrix = mdp.transition_matrix(a);
            for s in 0..ns {
                for next in 0..ns {
                    stm[idx] = narrow(matrix.entry(s, next), "transition", a, s, next)?;
                    idx += 1;
                }
            }
        }
        let transitions = Array3::from_shape_vec((na, ns, ns), stm)
            .map_err(|_| SolverError::allocation(tensor_len))?;

        debug!("dense tables: Ns={ns}, Na={na}, {tensor_len} transition entries");
        Ok(Self {
            transitions,
            rewards,
            discount,
            threshold: stopping_threshold(discount),
        })
    }

    pub fn transitions(&self) -> &Array3<T> {
        &self.transitions
    }

    pub fn rewards(&self) -> &Array2<T> {
        &self.rewards
    }
}

impl<T: Real> BellmanBackup<T> for DenseTables<T> {
    fn num_states(&self) -> usize {
        self.rewards.ncols()
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
        self.transitions
            .slice(s![action, state, ..])
            .dot(&ArrayView1::from(value))
    }
}

/// Action-major reward table shared by the dense and sparse adapters.
pub(crate) fn load_rewards<T: Real>(mdp: &dyn MdpDescription, na: usize, ns: usize) -> Result<Array2<T>> {
    let len = na.checked_mul(ns).ok_or(SolverError::allocation(usize::MAX))?;
    let mut table = zeroed::<T>(len)?;
    let rt = mdp.reward_transposed();
    check_shape(rt, "reward matrix", (na, ns))?;
    for a in 0..na {
        for s in 0..ns {
            table[a * ns + s] = narrow(rt.entry(a, s), "reward", a, a, s)?;
        }
    }
    Array2::from_shape_vec((na, ns), table).map_err(|_| SolverError::allocation(len))
}

/// Rejects reward scales whose discounted sum `max |R| / (1 - discount)`
/// does not fit in `T`, since the value vector would overflow to infinity.
pub(crate) fn check_value_bound<T: Real>(rewards: &Array2<T>, discount: T) -> Result<()> {
    let max_reward = rewards
        .iter()
        .fold(T::zero(), |acc, r| if r.abs() > acc { r.abs() } else { acc });
    let bound = max_reward / (T::one() - discount);
    if bound.is_finite() {
        return Ok(());
    }
    Err(ConfigError::ValueOverflow {
        max_reward: max_reward.to_f64().unwrap_or(f64::INFINITY),
        discount: discount.to_f64().unwrap_or(f64::NAN),
    }
    .into())
}

/// A zero-filled buffer of `len` elements, or an allocation error.
pub(crate) fn zeroed<T: Real>(len: usize) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| SolverError::allocation(len))?;
    buf.resize(len, T::zero());
    Ok(buf)
}

pub(crate) fn narrow<T: Real>(
    value: f64,
    what: &'static str,
    action: usize,
    row: usize,
    col: usize,
) -> Result<T> {
    T::from(value)
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            ConfigError::InvalidEntry {
                what,
                action,
                row,
                col,
                value,
            }
            .into()
        })
}

pub(crate) fn check_shape(
    matrix: &dyn MatrixAccess,
    what: &'static str,
    expected: (usize, usize),
) -> Result<()> {
    let actual = matrix.shape();
    if actual != expected {
        return Err(ConfigError::ShapeMismatch {
            what,
            expected,
            actual,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdp::DenseMdp;
    use approx::assert_relative_eq;

    fn fixture() -> DenseMdp {
        DenseMdp::from_transitions(
            0.9,
            &[
                vec![vec![(0, 0.7), (1, 0.3)], vec![(1, 1.0)]],
                vec![vec![(0, 0.4), (1, 0.6)], vec![(0, 0.1), (1, 0.9)]],
            ],
            &[vec![1.0, 2.0], vec![0.8, 1.5]],
        )
        .unwrap()
    }

    #[test]
    fn test_tensor_layout() {
        let tables = DenseTables::<f32>::load(&fixture()).unwrap();
        assert_eq!(tables.transitions().dim(), (2, 2, 2));
        assert_eq!(tables.rewards().dim(), (2, 2));

        // (action, state, next_state)
        assert_relative_eq!(tables.transitions()[[0, 0, 1]], 0.3);
        assert_relative_eq!(tables.transitions()[[1, 0, 1]], 1.0);
        assert_relative_eq!(tables.transitions()[[1, 1, 0]], 0.1);
        // (action, state)
        assert_relative_eq!(tables.rewards()[[1, 0]], 2.0);
        assert_relative_eq!(tables.rewards()[[0, 1]], 0.8);
    }

    #[test]
    fn test_rows_stay_stochastic() {
        let tables = DenseTables::<f32>::load(&fixture()).unwrap();
        for a in 0..2 {
            for s in 0..2 {
                let sum: f32 = tables.transitions().slice(s![a, s, ..]).sum();
                assert_relative_eq!(sum, 1.0, epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_threshold_from_discount() {
        let tables = DenseTables::<f64>::load(&fixture()).unwrap();
        assert_relative_eq!(tables.threshold(), 0.5 * 0.1 / 1.8, epsilon = 1e-9);
    }

    #[test]
    fn test_expected_value() {
        let tables = DenseTables::<f32>::load(&fixture()).unwrap();
        let v = [10.0, 20.0];
        assert_relative_eq!(tables.expected_value(0, 0, &v), 13.0, epsilon = 1e-5);
        assert_relative_eq!(tables.expected_value(1, 1, &v), 19.0, epsilon = 1e-5);
    }

    #[test]
    fn test_rejects_invalid_discount_before_allocating() {
        let err = DenseTables::<f32>::load(&fixture().with_discount(0.0)).unwrap_err();
        assert!(matches!(
            err,
            SolverError::Config(ConfigError::InvalidDiscount { .. })
        ));
    }

    #[test]
    fn test_rejects_unrepresentable_reward() {
        let mdp = DenseMdp::from_transitions(0.9, &[vec![vec![(0, 1.0)]]], &[vec![1e300]]).unwrap();
        assert!(DenseTables::<f64>::load(&mdp).is_ok());
        let err = DenseTables::<f32>::load(&mdp).unwrap_err();
        assert!(matches!(
            err,
            SolverError::Config(ConfigError::InvalidEntry { what: "reward", .. })
        ));
    }

    /// Every entry of a matrix reports the same value.
    struct Constant {
        shape: (usize, usize),
        value: f64,
    }

    impl MatrixAccess for Constant {
        fn shape(&self) -> (usize, usize) {
            self.shape
        }

        fn entry(&self, _row: usize, _col: usize) -> f64 {
            self.value
        }
    }

    /// Claims far more states than its transition matrix holds.
    struct Truncated {
        num_states: usize,
        transitions: Constant,
        rewards: Constant,
    }

    impl MdpDescription for Truncated {
        fn num_states(&self) -> usize {
            self.num_states
        }

        fn num_actions(&self) -> usize {
            1
        }

        fn discount(&self) -> f64 {
            0.9
        }

        fn transition_matrix(&self, _action: usize) -> &dyn MatrixAccess {
            &self.transitions
        }

        fn reward_transposed(&self) -> &dyn MatrixAccess {
            &self.rewards
        }
    }

    #[test]
    fn test_shape_checked_before_tensor_allocation() {
        // The full tensor would need 2^40 entries.
        let num_states = 1 << 20;
        let mdp = Truncated {
            num_states,
            transitions: Constant {
                shape: (1, 1),
                value: 1.0,
            },
            rewards: Constant {
                shape: (1, num_states),
                value: 0.0,
            },
        };
        let err = DenseTables::<f32>::load(&mdp).unwrap_err();
        assert!(matches!(
            err,
            SolverError::Config(ConfigError::ShapeMismatch {
                what: "transition matrix",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_rewards_that_overflow_values() {
        let mdp = DenseMdp::from_transitions(0.9, &[vec![vec![(0, 1.0)]]], &[vec![3e38]]).unwrap();
        let err = DenseTables::<f32>::load(&mdp).unwrap_err();
        assert!(matches!(
            err,
            SolverError::Config(ConfigError::ValueOverflow { .. })
        ));
        assert!(DenseTables::<f64>::load(&mdp).is_ok());
    }

    #[test]
    fn test_zeroed_reports_allocation_failure() {
        assert!(matches!(
            zeroed::<f64>(usize::MAX / 4),
            Err(SolverError::Allocation { .. })
        ));
        assert_eq!(zeroed::<f32>(3).unwrap(), vec![0.0; 3]);
    }
}
