use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;

use crate::engines::evaluation::backend::PipelineBackend;
use crate::engines::evaluation::cache::EvaluatedCache;
use crate::engines::evaluation::timeout::call_with_deadline;
use crate::engines::generation::generator::gen_grow_safe;
use crate::engines::generation::operators;
use crate::engines::generation::primitive_set::PrimitiveSet;
use crate::engines::generation::tree::{Individual, Tree};
use crate::types::Dataset;

/// Retry budget for producing a pipeline that survives the pretest.
pub const NUM_TESTS: usize = 10;
/// Hard deadline for one pretest fit, in seconds.
pub const MAX_EVAL_SECS: u64 = 10;

/// Wraps generation, crossover, and mutation with retry-until-valid
/// pretesting against a small data sample.
///
/// Each outer attempt (up to [`NUM_TESTS`]) re-clones its inputs, runs the
/// wrapped operation with up to `NUM_TESTS / 2` structural retries, then
/// compiles the result and fits it against the pretest sample under a hard
/// deadline. Any failure is logged and retried. When every attempt fails
/// the last-produced result is returned as-is: the harness is best-effort,
/// not a correctness guarantee, and downstream evaluation assigns sentinel
/// fitness to anything that slipped through.
pub struct PretestHarness<B: PipelineBackend> {
    backend: Arc<B>,
    pset: Arc<PrimitiveSet>,
    sample: Arc<Dataset>,
    max_eval_time: Duration,
}

impl<B: PipelineBackend> PretestHarness<B> {
    pub fn new(
        backend: Arc<B>,
        pset: Arc<PrimitiveSet>,
        sample: Arc<Dataset>,
    ) -> Self {
        Self {
            backend,
            pset,
            sample,
            max_eval_time: Duration::from_secs(MAX_EVAL_SECS),
        }
    }

    pub fn with_max_eval_time(mut self, max_eval_time: Duration) -> Self {
        self.max_eval_time = max_eval_time;
        self
    }

    /// Generate a tree verified to compile and fit on the pretest sample.
    /// Falls back to the last generated tree (possibly empty) after
    /// exhausting all attempts.
    pub fn generate(
        &self,
        min_height: usize,
        max_height: usize,
        rng: &mut StdRng,
    ) -> Tree {
        let mut result = Tree::default();
        for attempt in 0..NUM_TESTS {
            let mut produced = None;
            for _ in 0..NUM_TESTS / 2 {
                match gen_grow_safe(&self.pset, min_height, max_height, rng) {
                    Ok(tree) => {
                        produced = Some(tree);
                        break;
                    }
                    Err(e) => {
                        log::debug!("pretest generate, attempt {}: {}", attempt, e);
                    }
                }
            }
            let tree = match produced {
                Some(tree) => tree,
                None => continue,
            };
            let fits = self.fits_pretest_sample(&tree);
            result = tree;
            if fits {
                return result;
            }
        }
        result
    }

    /// Mutate `individual` (novelty-checked against the cache) and verify
    /// the offspring on the pretest sample.
    pub fn mutate(
        &self,
        individual: &Individual,
        cache: &EvaluatedCache,
        tree_structure: bool,
        rng: &mut StdRng,
    ) -> Individual {
        let mut result = individual.clone();
        for attempt in 0..NUM_TESTS {
            let mut produced = None;
            for _ in 0..NUM_TESTS / 2 {
                match operators::random_mutation(
                    individual,
                    &self.pset,
                    cache,
                    tree_structure,
                    true,
                    rng,
                ) {
                    Ok(offspring) => {
                        produced = Some(offspring);
                        break;
                    }
                    Err(e) => {
                        log::debug!("pretest mutate, attempt {}: {}", attempt, e);
                    }
                }
            }
            // With no structurally valid offspring the parent clone stands
            // in, exactly as a failed operation would leave it.
            let candidate = produced.unwrap_or_else(|| individual.clone());
            let fits = self.fits_pretest_sample(&candidate.tree);
            result = candidate;
            if fits {
                return result;
            }
        }
        result
    }

    /// Cross two individuals and verify both offspring on the pretest
    /// sample. Crossover cannot fail structurally, so there is no inner
    /// retry loop.
    pub fn mate(
        &self,
        ind1: &Individual,
        ind2: &Individual,
        cache: &EvaluatedCache,
        rng: &mut StdRng,
    ) -> (Individual, Individual) {
        let mut result = (ind1.clone(), ind2.clone());
        for _ in 0..NUM_TESTS {
            let (child1, child2) = operators::mate(ind1, ind2, &self.pset, cache, rng);
            let fits =
                self.fits_pretest_sample(&child1.tree) && self.fits_pretest_sample(&child2.tree);
            result = (child1, child2);
            if fits {
                return result;
            }
        }
        result
    }

    fn fits_pretest_sample(&self, tree: &Tree) -> bool {
        if tree.is_empty() {
            return false;
        }
        let pipeline = match self.backend.compile(tree, &self.pset) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                log::debug!("pretest compile failed: {:#}", e);
                return false;
            }
        };

        let backend = Arc::clone(&self.backend);
        let sample = Arc::clone(&self.sample);
        let mut pipeline = pipeline;
        match call_with_deadline(self.max_eval_time, move || {
            backend.fit(&mut pipeline, &sample)
        }) {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                log::debug!("pretest fit failed: {:#}", e);
                false
            }
            None => {
                log::debug!("pretest fit timed out after {:?}", self.max_eval_time);
                false
            }
        }
    }
}
