use std::fmt;

use thiserror::Error;

/// Which kind of node the tree generator failed to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Terminal,
    Primitive,
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateKind::Terminal => write!(f, "terminal"),
            CandidateKind::Primitive => write!(f, "primitive"),
        }
    }
}

#[derive(Error, Debug)]
pub enum EvopipeError {
    #[error("no {kind} of type {type_name} available at depth {depth}")]
    NoCandidate {
        kind: CandidateKind,
        type_name: String,
        depth: usize,
    },

    #[error("generation error: {0}")]
    Generation(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("compile error: {0}")]
    Compile(String),

    #[error("scoring error: {0}")]
    Score(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("optimizer internal error: {0}")]
    Internal(String),

    #[error("{elapsed_mins:.2} minutes have elapsed, wall-clock budget reached")]
    BudgetExceeded { elapsed_mins: f64 },

    #[error("pareto front unchanged after {0} more generations, stopping early")]
    EarlyStop(usize),

    #[error("cancellation requested, finalizing with individuals evaluated so far")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl EvopipeError {
    /// Loop-control conditions terminate a run gracefully instead of
    /// surfacing to the caller as failures.
    pub fn is_interrupt(&self) -> bool {
        matches!(
            self,
            EvopipeError::BudgetExceeded { .. }
                | EvopipeError::EarlyStop(_)
                | EvopipeError::Cancelled
        )
    }
}

pub type Result<T> = std::result::Result<T, EvopipeError>;
