//! Per-solve iteration state and the convergence / time-budget driver.
//!
//! A [`Session`] owns the working value and policy buffers of one solve and
//! borrows the tables. Each [`Session::step`] runs one full backup sweep, so
//! the value and policy it exposes always come from a completed sweep.

use std::mem;

use log::{debug, info};

use super::backup::{sup_norm, BellmanBackup};
use super::tables::zeroed;
use super::{Real, Solution, SolveStatus};
use crate::error::{Result, SolverError};
use crate::timing::Stopwatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Converged,
    TimedOut,
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step<T> {
    pub iteration: u64,
    /// Sup-norm distance between the value vectors before and after the sweep.
    pub delta: T,
    pub state: SessionState,
}

pub struct Session<'t, T, B: ?Sized> {
    tables: &'t B,
    threshold: T,
    max_time_secs: u64,
    parallel: bool,
    value: Vec<T>,
    next_value: Vec<T>,
    next_policy: Vec<usize>,
    iteration: u64,
    last_delta: T,
    state: SessionState,
    stopwatch: Stopwatch,
}

impl<'t, T, B> Session<'t, T, B>
where
    T: Real,
    B: BellmanBackup<T> + ?Sized,
{
    /// Starts a session with an all-zero value vector, stopping at the
    /// tables' threshold. The time budget is measured from here;
    /// `max_time_secs == 0` means unbounded.
    pub fn new(tables: &'t B, max_time_secs: u64, parallel: bool) -> Result<Self> {
        let ns = tables.num_states();
        Ok(Self {
            tables,
            threshold: tables.threshold(),
            max_time_secs,
            parallel,
            value: zeroed(ns)?,
            next_value: zeroed(ns)?,
            next_policy: vec_of_zeros(ns)?,
            iteration: 0,
            last_delta: T::infinity(),
            state: SessionState::Running,
            stopwatch: Stopwatch::start(),
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Value vector produced by the latest sweep (all zeros before the first).
    pub fn value(&self) -> &[T] {
        &self.value
    }

    /// Greedy policy produced by the latest sweep.
    pub fn policy(&self) -> &[usize] {
        &self.next_policy
    }

    /// Runs one backup sweep and applies the stopping tests.
    ///
    /// Once the session has converged or timed out this does nothing and
    /// reports the final step again.
    pub fn step(&mut self) -> Step<T> {
        if self.state != SessionState::Running {
            return Step {
                iteration: self.iteration,
                delta: self.last_delta,
                state: self.state,
            };
        }

        self.iteration += 1;
        self.tables.sweep(
            &self.value,
            &mut self.next_value,
            &mut self.next_policy,
            self.parallel,
        );
        let delta = sup_norm(&self.value, &self.next_value);

        if delta < self.threshold {
            info!(
                "iteration {}: {} < {} (STOP)",
                self.iteration, delta, self.threshold
            );
            self.state = SessionState::Converged;
        } else if self.max_time_secs != 0 {
            let elapsed = self.stopwatch.elapsed_secs();
            if elapsed as u64 >= self.max_time_secs {
                info!(
                    "iteration {}: halted after {elapsed:.3}s (budget {}s), delta {}",
                    self.iteration, self.max_time_secs, delta
                );
                self.state = SessionState::TimedOut;
            }
        }
        debug!(
            "iteration {}: delta {} (threshold {})",
            self.iteration, delta, self.threshold
        );

        // The freshly computed values become the current estimate.
        mem::swap(&mut self.value, &mut self.next_value);
        self.last_delta = delta;

        Step {
            iteration: self.iteration,
            delta,
            state: self.state,
        }
    }

    /// Iterates until convergence or the time budget runs out.
    pub fn run(mut self) -> Solution<T> {
        loop {
            match self.step().state {
                SessionState::Running => {}
                SessionState::Converged => return self.into_solution(SolveStatus::Completed),
                SessionState::TimedOut => return self.into_solution(SolveStatus::TimedOut),
            }
        }
    }

    /// Hands back the latest policy and value once the session has stopped,
    /// or `None` while it is still running.
    pub fn finish(self) -> Option<Solution<T>> {
        let status = match self.state {
            SessionState::Running => return None,
            SessionState::Converged => SolveStatus::Completed,
            SessionState::TimedOut => SolveStatus::TimedOut,
        };
        Some(self.into_solution(status))
    }

    fn into_solution(self, status: SolveStatus) -> Solution<T> {
        Solution {
            policy: self.next_policy,
            value: self.value,
            status,
            iterations: self.iteration,
            elapsed_secs: self.stopwatch.elapsed_secs(),
        }
    }
}

fn vec_of_zeros(len: usize) -> Result<Vec<usize>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| SolverError::allocation(len))?;
    buf.resize(len, 0);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdp::{random, DenseMdp};
    use crate::solvers::DenseTables;
    use approx::assert_relative_eq;

    fn two_state() -> DenseMdp {
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
    fn test_deltas_are_non_increasing() {
        let tables = DenseTables::<f64>::load(&two_state()).unwrap();
        let mut session = Session::new(&tables, 0, false).unwrap();

        let mut previous = session.step().delta;
        while session.state() == SessionState::Running {
            let step = session.step();
            assert!(
                step.delta <= previous + 1e-12,
                "delta grew at iteration {}: {} > {}",
                step.iteration,
                step.delta,
                previous
            );
            previous = step.delta;
        }
        assert_eq!(session.state(), SessionState::Converged);
        // The stopping test uses the threshold the tables derived from the discount.
        assert!(previous < tables.threshold());
    }

    #[test]
    fn test_first_step_from_zero_values() {
        let tables = DenseTables::<f32>::load(&two_state()).unwrap();
        let mut session = Session::new(&tables, 0, false).unwrap();
        assert_eq!(session.value(), &[0.0, 0.0]);

        let step = session.step();
        assert_eq!(step.iteration, 1);
        // With V = 0 the backup is the best immediate reward.
        assert_eq!(session.policy(), &[1, 1]);
        assert_relative_eq!(session.value()[0], 2.0);
        assert_relative_eq!(session.value()[1], 1.5);
        assert_relative_eq!(step.delta, 2.0);
    }

    #[test]
    fn test_finished_session_does_not_advance() {
        let mdp = DenseMdp::from_transitions(0.5, &[vec![vec![(0, 1.0)]]], &[vec![0.0]]).unwrap();
        let tables = DenseTables::<f32>::load(&mdp).unwrap();
        let mut session = Session::new(&tables, 0, false).unwrap();
        assert_eq!(session.step().state, SessionState::Converged);
        let again = session.step();
        assert_eq!(again.iteration, 1);
        assert_eq!(again.state, SessionState::Converged);
    }

    #[test]
    fn test_finish_requires_a_stopped_session() {
        // One state, two self-loops: the best action earns 3 per step.
        let mdp = DenseMdp::from_transitions(
            0.9,
            &[vec![vec![(0, 1.0)], vec![(0, 1.0)]]],
            &[vec![-5.0, 3.0]],
        )
        .unwrap();
        let tables = DenseTables::<f32>::load(&mdp).unwrap();
        assert!(Session::new(&tables, 0, false).unwrap().finish().is_none());

        let mut session = Session::new(&tables, 0, false).unwrap();
        session.step();
        assert_eq!(session.state(), SessionState::Running);
        assert!(session.finish().is_none());

        let mut session = Session::new(&tables, 0, false).unwrap();
        while session.step().state == SessionState::Running {}
        let solution = session.finish().unwrap();
        assert_eq!(solution.status, SolveStatus::Completed);
        assert!(solution.iterations > 1);
        assert_eq!(solution.policy, vec![1]);
        assert_relative_eq!(solution.value[0], 30.0, epsilon = 1.0);
    }

    #[test]
    fn test_time_budget_stops_iteration() {
        // Converging would take millions of sweeps at this discount.
        let mdp = random::generate(50, 2, 0.999_999, 50, 5).unwrap();
        let tables = DenseTables::<f32>::load(&mdp).unwrap();
        let solution = Session::new(&tables, 1, false)
            .unwrap()
            .run();
        assert_eq!(solution.status, SolveStatus::TimedOut);
        assert!(solution.elapsed_secs >= 1.0);
        assert_eq!(solution.value.len(), 50);
        assert_eq!(solution.policy.len(), 50);
        assert!(solution.value.iter().all(|v| v.is_finite()));
        assert!(solution.policy.iter().all(|&a| a < 2));
    }
}
