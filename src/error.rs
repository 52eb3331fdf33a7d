//! Error types shared by the MDP loaders and the solvers.
//!
//! Configuration problems are detected before any table is allocated, so a
//! failed solve never hands back zeroed or half-written output. A solve that
//! runs out of time is not an error; see [`crate::solvers::SolveStatus`].

use thiserror::Error;

/// Invalid MDP dimensions, discount factor or table contents.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("MDP must have at least one state")]
    NoStates,

    #[error("MDP must have at least one action")]
    NoActions,

    #[error("discount factor {discount} is outside the open interval (0, 1)")]
    InvalidDiscount { discount: f64 },

    #[error("{what} has shape {actual:?}, expected {expected:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("transition row for action {action}, state {state} sums to {sum}, expected 1")]
    NotStochastic { action: usize, state: usize, sum: f64 },

    #[error("{what} entry ({row}, {col}) of action {action} is not representable: {value}")]
    InvalidEntry {
        what: &'static str,
        action: usize,
        row: usize,
        col: usize,
        value: f64,
    },

    #[error("rewards up to {max_reward} with discount {discount} overflow the value type")]
    ValueOverflow { max_reward: f64, discount: f64 },

    #[error("unknown solver '{name}' (expected one of: vi, spvi)")]
    UnknownSolver { name: String },
}

/// Top-level error returned by loaders and solvers.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("invalid MDP: {0}")]
    Config(#[from] ConfigError),

    #[error("unable to allocate solver tables of {elements} elements")]
    Allocation { elements: usize },

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SolverError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        SolverError::Parse {
            line,
            message: message.into(),
        }
    }

    pub fn allocation(elements: usize) -> Self {
        SolverError::Allocation { elements }
    }

    /// True for failures caused by the MDP description itself.
    pub fn is_config(&self) -> bool {
        matches!(self, SolverError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, SolverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_converts() {
        let err: SolverError = ConfigError::NoStates.into();
        assert!(err.is_config());
        assert_eq!(err.to_string(), "invalid MDP: MDP must have at least one state");
    }

    #[test]
    fn test_parse_error_message() {
        let err = SolverError::parse(12, "expected ':'");
        assert!(!err.is_config());
        assert_eq!(err.to_string(), "parse error on line 12: expected ':'");
    }
}
