use std::fmt;

use serde::{Deserialize, Serialize};

/// Payload carried by a terminal (leaf) node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Str(v) => write!(f, "{}", v),
        }
    }
}

/// Feature matrix (row-major) plus prediction target.
///
/// The search engine never inspects the numbers; it hands the dataset to the
/// pipeline backend for fitting and scoring. Loading, imputation, and
/// train/test splitting happen upstream.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub target: Vec<f64>,
}

impl Dataset {
    pub fn new(features: Vec<Vec<f64>>, target: Vec<f64>) -> Self {
        Self { features, target }
    }

    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    pub fn n_features(&self) -> usize {
        self.features.first().map_or(0, |row| row.len())
    }
}
