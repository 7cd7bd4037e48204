use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::engines::control::BudgetGuard;
use crate::engines::evaluation::backend::PipelineBackend;
use crate::engines::evaluation::cache::{CacheRecord, EvaluatedCache};
use crate::engines::evaluation::timeout::call_with_deadline;
use crate::engines::generation::primitive_set::PrimitiveSet;
use crate::engines::generation::tree::{Individual, Lineage};
use crate::error::Result;
use crate::types::Dataset;

/// Evaluation settings resolved from the search configuration.
#[derive(Debug, Clone)]
pub struct EvalOptions {
    pub scoring_function: String,
    /// Hard deadline per scoring call; never below one second.
    pub max_eval_time: Duration,
    /// Stage names that may appear at most once in a compiled pipeline
    /// (repeated feature expansion blows up memory and runtime).
    pub single_use_stages: Vec<String>,
}

/// A unique, compiled tree waiting for its two scoring passes.
pub struct PendingEvaluation<P> {
    pub canonical: String,
    pub pipeline: P,
    pub operator_count: usize,
    pub stats: Lineage,
}

/// Outcome of the deduplication pass over one evaluation batch.
pub struct PreprocessReport<P> {
    pub pending: Vec<PendingEvaluation<P>>,
    pub duplicates_in_batch: usize,
}

enum ScoreOutcome {
    Value(f64),
    TimedOut,
}

/// Scores batches of individuals against the two datasets, memoizing every
/// result in the evaluation cache.
pub struct PipelineEvaluator<B: PipelineBackend> {
    backend: Arc<B>,
    pset: Arc<PrimitiveSet>,
    options: EvalOptions,
    sample_weight: Option<Arc<Vec<f64>>>,
}

impl<B: PipelineBackend> PipelineEvaluator<B> {
    pub fn new(
        backend: Arc<B>,
        pset: Arc<PrimitiveSet>,
        options: EvalOptions,
        sample_weight: Option<Arc<Vec<f64>>>,
    ) -> Self {
        Self {
            backend,
            pset,
            options,
            sample_weight,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Evaluate every individual in the batch that lacks fitness, then
    /// assign fitness to the whole batch from the cache.
    ///
    /// Fitness assignment runs even when a budget or cancellation interrupt
    /// lands mid-batch, so the evaluated prefix keeps its scores and the
    /// interrupt propagates afterwards. Returns the number of individuals
    /// that required evaluation.
    pub fn evaluate(
        &self,
        cache: &mut EvaluatedCache,
        individuals: &mut [Individual],
        dataset1: &Arc<Dataset>,
        dataset2: &Arc<Dataset>,
        budget: &BudgetGuard,
    ) -> Result<usize> {
        let (report, invalid_count) = {
            let invalid: Vec<&Individual> =
                individuals.iter().filter(|i| !i.has_fitness()).collect();
            (self.preprocess_refs(cache, &invalid), invalid.len())
        };
        if report.duplicates_in_batch > 0 {
            log::debug!(
                "{} duplicate pipelines skipped in this batch",
                report.duplicates_in_batch
            );
        }

        let outcome = self.evaluate_pending(cache, report.pending, dataset1, dataset2, budget);
        self.assign_fitness(cache, individuals);
        outcome?;
        Ok(invalid_count)
    }

    /// Deduplicate a batch by canonical string (first occurrence wins) and
    /// sort its members into sentinel records, cache hits, and compiled
    /// pipelines pending evaluation.
    pub fn preprocess(
        &self,
        cache: &mut EvaluatedCache,
        batch: &[Individual],
    ) -> PreprocessReport<B::Pipeline> {
        let refs: Vec<&Individual> = batch.iter().collect();
        self.preprocess_refs(cache, &refs)
    }

    fn preprocess_refs(
        &self,
        cache: &mut EvaluatedCache,
        batch: &[&Individual],
    ) -> PreprocessReport<B::Pipeline> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut duplicates_in_batch = 0;
        let mut pending = Vec::new();

        for individual in batch {
            let canonical = individual.tree.canonical_string(&self.pset);
            if !seen.insert(canonical.clone()) {
                duplicates_in_batch += 1;
                continue;
            }

            if individual.tree.is_empty() {
                log::debug!("invalid pipeline encountered, skipping its evaluation");
                cache.insert(canonical, CacheRecord::disqualified(1, &individual.stats));
                continue;
            }

            let pipeline_str = self.backend.pipeline_string(&individual.tree, &self.pset);
            let operator_count = individual.tree.operator_count(&self.pset);
            if self.repeats_single_use_stage(&pipeline_str) {
                log::debug!("invalid pipeline encountered, skipping its evaluation");
                cache.insert(
                    canonical,
                    CacheRecord::disqualified(operator_count, &individual.stats),
                );
                continue;
            }

            if cache.contains(&canonical) {
                // Previously evaluated: the cached record is reused when
                // fitness is assigned.
                continue;
            }

            match self.backend.compile(&individual.tree, &self.pset) {
                Ok(pipeline) => pending.push(PendingEvaluation {
                    canonical,
                    pipeline,
                    operator_count,
                    stats: individual.stats.clone(),
                }),
                Err(e) => {
                    log::debug!("pipeline failed to compile: {:#}", e);
                    cache.insert(
                        canonical,
                        CacheRecord::disqualified(operator_count, &individual.stats),
                    );
                }
            }
        }

        PreprocessReport {
            pending,
            duplicates_in_batch,
        }
    }

    fn evaluate_pending(
        &self,
        cache: &mut EvaluatedCache,
        pending: Vec<PendingEvaluation<B::Pipeline>>,
        dataset1: &Arc<Dataset>,
        dataset2: &Arc<Dataset>,
        budget: &BudgetGuard,
    ) -> Result<()> {
        for item in pending {
            budget.check()?;

            let score1 = self.wrapped_score(&item.pipeline, dataset1);
            let features1 = self.backend.feature_count(&item.pipeline, dataset1);
            let score2 = self.wrapped_score(&item.pipeline, dataset2);
            let features2 = self.backend.feature_count(&item.pipeline, dataset2);

            let (d1, d2, feature_score) = match (score1, score2) {
                (ScoreOutcome::TimedOut, _) | (_, ScoreOutcome::TimedOut) => {
                    log::warn!(
                        "skipped pipeline due to time out, continuing with the next one"
                    );
                    (f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY)
                }
                (ScoreOutcome::Value(a), ScoreOutcome::Value(b)) => {
                    let feature_score = match (features1, features2) {
                        (Ok(n1), Ok(n2)) => 1.0 / ((n1 + n2) as f64),
                        (e1, e2) => {
                            if let Err(e) = e1.and(e2) {
                                log::debug!("feature count failed: {:#}", e);
                            }
                            f64::NEG_INFINITY
                        }
                    };
                    (a, b, feature_score)
                }
            };

            cache.insert(
                item.canonical,
                CacheRecord::from_scores(item.operator_count, d1, d2, feature_score, &item.stats),
            );
        }
        Ok(())
    }

    /// Copy cached fitness onto every batch member whose record exists.
    pub fn assign_fitness(&self, cache: &EvaluatedCache, individuals: &mut [Individual]) {
        for individual in individuals.iter_mut() {
            if individual.has_fitness() {
                continue;
            }
            let canonical = individual.tree.canonical_string(&self.pset);
            if let Some(record) = cache.get(&canonical) {
                individual.fitness = Some(record.fitness());
            }
        }
    }

    fn repeats_single_use_stage(&self, pipeline_str: &str) -> bool {
        self.options
            .single_use_stages
            .iter()
            .any(|stage| pipeline_str.matches(stage.as_str()).count() > 1)
    }

    fn wrapped_score(&self, pipeline: &B::Pipeline, data: &Arc<Dataset>) -> ScoreOutcome {
        let backend = Arc::clone(&self.backend);
        let mut pipeline = pipeline.clone();
        let data = Arc::clone(data);
        let scoring = self.options.scoring_function.clone();
        let weight = self.sample_weight.clone();

        let result = call_with_deadline(self.options.max_eval_time, move || {
            backend.score(
                &mut pipeline,
                &data,
                &scoring,
                weight.as_deref().map(|w| w.as_slice()),
            )
        });

        match result {
            None => ScoreOutcome::TimedOut,
            Some(Ok(score)) => ScoreOutcome::Value(score),
            Some(Err(e)) => {
                log::debug!("scoring failed: {:#}", e);
                ScoreOutcome::Value(f64::NEG_INFINITY)
            }
        }
    }
}
