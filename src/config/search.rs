use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::traits::ConfigSection;
use crate::error::{EvopipeError, Result};

/// Stand-in generation count when only a wall-clock budget is configured:
/// the loop then runs until the clock interrupts it.
pub const UNBOUNDED_GENERATIONS: usize = 1_000_000;

/// Settings for one optimization run. Validated up front; a validation
/// failure is the only error class that surfaces before any evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of individuals retained in the population every generation.
    pub population_size: usize,
    /// Offspring produced per generation; defaults to the population size.
    pub offspring_size: Option<usize>,
    /// Number of generations; `None` requires `max_time_mins` to be set.
    pub generations: Option<usize>,
    /// Wall-clock budget for the whole run, in minutes.
    pub max_time_mins: Option<f64>,
    pub mutation_rate: f64,
    pub crossover_rate: f64,
    /// Budget for a single pipeline evaluation, in minutes (floor of one
    /// second when converted).
    pub max_eval_time_mins: f64,
    /// Stop after this many consecutive generations without Pareto-front
    /// movement.
    pub early_stop: Option<usize>,
    /// Training subsample ratio in (0, 1]; applied by the dataset
    /// collaborator, validated here.
    pub subsample: f64,
    pub random_seed: Option<u64>,
    /// Optional `"Step-Step-..."` pipeline template constraining the tree
    /// shape; `None` uses the free default heights [1, 3].
    pub template: Option<String>,
    pub checkpoint_folder: Option<PathBuf>,
    pub scoring_function: String,
    /// Keep population, cache, and archive from the previous run.
    pub warm_start: bool,
    /// Stage names that may appear at most once per compiled pipeline.
    pub single_use_stages: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            offspring_size: None,
            generations: Some(100),
            max_time_mins: None,
            mutation_rate: 0.9,
            crossover_rate: 0.1,
            max_eval_time_mins: 5.0,
            early_stop: None,
            subsample: 1.0,
            random_seed: None,
            template: None,
            checkpoint_folder: None,
            scoring_function: "r2".to_string(),
            warm_start: false,
            single_use_stages: vec!["PolynomialFeatures".to_string()],
        }
    }
}

/// Tree-shape bounds derived from the pipeline template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateShape {
    pub min_height: usize,
    pub max_height: usize,
    /// False when every tree has the exact same linear shape, in which case
    /// only node-replacement mutation applies.
    pub tree_structure: bool,
}

impl SearchConfig {
    /// Resolve offspring size (`lambda`).
    pub fn lambda(&self) -> usize {
        self.offspring_size.unwrap_or(self.population_size)
    }

    pub fn resolved_generations(&self) -> usize {
        self.generations.unwrap_or(UNBOUNDED_GENERATIONS)
    }

    /// Tree height bounds: the default [1, 3], or derived from the
    /// template — each plain step adds one to both bounds, each combining
    /// step (a `Combine*` stage) adds one to the minimum and two to the
    /// maximum.
    pub fn template_shape(&self) -> Result<TemplateShape> {
        let (min_height, max_height) = match &self.template {
            None => (1, 3),
            Some(template) => {
                let mut min = 0;
                let mut max = 1;
                for step in template.split('-') {
                    if step.is_empty() {
                        return Err(EvopipeError::Configuration(format!(
                            "malformed pipeline template: {}",
                            template
                        )));
                    }
                    if step.starts_with("Combine") {
                        min += 1;
                        max += 2;
                    } else {
                        min += 1;
                        max += 1;
                    }
                }
                (min, max)
            }
        };
        Ok(TemplateShape {
            min_height,
            max_height,
            tree_structure: max_height - min_height != 1,
        })
    }
}

impl ConfigSection for SearchConfig {
    fn section_name() -> &'static str {
        "search"
    }

    fn validate(&self) -> Result<()> {
        if self.generations.is_none() && self.max_time_mins.is_none() {
            return Err(EvopipeError::Configuration(
                "either generations or max_time_mins must provide a stopping rule".to_string(),
            ));
        }
        if self.population_size < 2 {
            return Err(EvopipeError::Configuration(
                "population size must be at least 2".to_string(),
            ));
        }
        if let Some(offspring) = self.offspring_size {
            if offspring == 0 {
                return Err(EvopipeError::Configuration(
                    "offspring size must be positive".to_string(),
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return Err(EvopipeError::Configuration(
                "mutation rate must be between 0 and 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.crossover_rate) {
            return Err(EvopipeError::Configuration(
                "crossover rate must be between 0 and 1".to_string(),
            ));
        }
        if self.mutation_rate + self.crossover_rate > 1.0 {
            return Err(EvopipeError::Configuration(
                "the sum of the crossover and mutation rates must be <= 1.0".to_string(),
            ));
        }
        if self.max_eval_time_mins <= 0.0 {
            return Err(EvopipeError::Configuration(
                "per-pipeline evaluation time must be positive".to_string(),
            ));
        }
        if self.subsample <= 0.0 || self.subsample > 1.0 {
            return Err(EvopipeError::Configuration(
                "the subsample ratio must be in the range (0.0, 1.0]".to_string(),
            ));
        }
        if let Some(max_time) = self.max_time_mins {
            if max_time <= 0.0 {
                return Err(EvopipeError::Configuration(
                    "max_time_mins must be positive".to_string(),
                ));
            }
        }
        self.template_shape()?;
        Ok(())
    }
}
