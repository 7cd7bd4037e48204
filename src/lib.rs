//! Multi-objective evolutionary search over typed expression trees, each
//! tree encoding a candidate machine-learning pipeline.
//!
//! The crate implements the generic search engine: a typed primitive
//! registry, tree generation, genetic operators, a pretest validation
//! harness, a deduplicating evaluation cache, a Pareto archive, and the
//! (mu+lambda) generational loop with wall-clock budgeting, periodic
//! checkpointing, and early stopping. Candidate pipelines are scored on two
//! independent datasets, with a third objective favoring pipelines that
//! retain fewer features.
//!
//! The concrete operator catalog — how trees compile into runnable
//! pipelines and how those are fitted and scored — is supplied by the
//! caller through [`engines::evaluation::PipelineBackend`].

pub mod config;
pub mod engines;
pub mod error;
pub mod types;

pub use error::{EvopipeError, Result};
