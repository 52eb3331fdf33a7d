//! Writes solver results as `state action value` lines.

use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::solvers::Solution;

pub const HEADER: &str = "State, Optimal Control and Value";

/// Writes the header line followed by `state action value` for every state,
/// with the value printed to six decimal places.
///
/// ```
/// use mdp_solvers::output::write_solution;
/// use mdp_solvers::solvers::{Solution, SolveStatus};
///
/// let solution = Solution {
///     policy: vec![1, 0],
///     value: vec![2.5_f32, -0.125],
///     status: SolveStatus::Completed,
///     iterations: 3,
///     elapsed_secs: 0.0,
/// };
/// let mut out = Vec::new();
/// write_solution(&mut out, &solution).unwrap();
/// assert_eq!(
///     String::from_utf8(out).unwrap(),
///     "State, Optimal Control and Value\n0 1 2.500000 \n1 0 -0.125000 \n"
/// );
/// ```
pub fn write_solution<W: Write, T: Display>(out: &mut W, solution: &Solution<T>) -> io::Result<()> {
    writeln!(out, "{HEADER}")?;
    for (state, (action, value)) in solution.policy.iter().zip(&solution.value).enumerate() {
        writeln!(out, "{state} {action} {value:.6} ")?;
    }
    Ok(())
}

/// Writes `solution` to a file at `path`, replacing any existing file.
pub fn save_solution<T: Display>(path: impl AsRef<Path>, solution: &Solution<T>) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_solution(&mut out, solution)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solvers::SolveStatus;

    #[test]
    fn test_one_line_per_state() {
        let solution = Solution {
            policy: vec![0, 2, 1],
            value: vec![1.0_f64, 1.0 / 3.0, -7.0],
            status: SolveStatus::TimedOut,
            iterations: 10,
            elapsed_secs: 1.0,
        };
        let mut out = Vec::new();
        write_solution(&mut out, &solution).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], HEADER);
        assert_eq!(lines[2], "1 2 0.333333 ");
        assert_eq!(lines[3], "2 1 -7.000000 ");
    }

    #[test]
    fn test_save_solution_round_trips_through_file() {
        let path = std::env::temp_dir().join(format!("mdp-solvers-output-{}.txt", std::process::id()));
        let solution = Solution {
            policy: vec![0],
            value: vec![0.5_f32],
            status: SolveStatus::Completed,
            iterations: 1,
            elapsed_secs: 0.0,
        };
        save_solution(&path, &solution).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(text, format!("{HEADER}\n0 0 0.500000 \n"));
    }
}
