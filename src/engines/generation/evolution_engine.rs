use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::search::SearchConfig;
use crate::config::search::TemplateShape;
use crate::config::traits::ConfigSection;
use crate::engines::checkpoint::export::render_pipeline_export;
use crate::engines::checkpoint::writer::CheckpointWriter;
use crate::engines::control::{BudgetGuard, CancelToken, Termination};
use crate::engines::evaluation::backend::PipelineBackend;
use crate::engines::evaluation::cache::EvaluatedCache;
use crate::engines::evaluation::evaluator::{EvalOptions, PipelineEvaluator};
use crate::engines::generation::archive::ParetoArchive;
use crate::engines::generation::logbook::{LogRecord, Logbook};
use crate::engines::generation::operators::pick_eligible_pair;
use crate::engines::generation::pareto::{sel_nsga2, Objectives};
use crate::engines::generation::pretest::PretestHarness;
use crate::engines::generation::primitive_set::PrimitiveSet;
use crate::engines::generation::progress::ProgressCallback;
use crate::engines::generation::tree::{Generation, Individual, Lineage};
use crate::error::{EvopipeError, Result};
use crate::types::Dataset;

/// The two scored datasets, the pretest sample for the validation harness,
/// and optional per-sample weights.
pub struct SearchData {
    pub dataset1: Arc<Dataset>,
    pub dataset2: Arc<Dataset>,
    pub pretest_sample: Arc<Dataset>,
    pub sample_weight: Option<Arc<Vec<f64>>>,
}

/// Result of one finished (or gracefully interrupted) run.
pub struct SearchOutcome {
    pub population: Vec<Individual>,
    pub pareto_front: Vec<Individual>,
    /// The archive member that beats every other on both dataset scores.
    pub best: Individual,
    pub termination: Termination,
    pub logbook: Logbook,
}

/// The (mu+lambda) generational scheduler.
///
/// Each generation produces `lambda` offspring by crossover, mutation, or
/// reproduction, evaluates them through the deduplicating cache, folds the
/// batch into the Pareto archive, and selects the next `mu` parents from
/// parents plus offspring by NSGA-II non-dominated sorting. Wall-clock
/// budget and cancellation are observed before each generation and before
/// each individual evaluation; both finalize the run gracefully with
/// whatever was evaluated.
pub struct EvolutionEngine<B: PipelineBackend> {
    config: SearchConfig,
    shape: TemplateShape,
    lambda: usize,
    pset: Arc<PrimitiveSet>,
    harness: PretestHarness<B>,
    evaluator: PipelineEvaluator<B>,
    cache: EvaluatedCache,
    archive: ParetoArchive,
    logbook: Logbook,
    rng: StdRng,
    cancel: CancelToken,
    checkpoint: Option<CheckpointWriter>,
    data: SearchData,
    population: Vec<Individual>,
    best: Option<Individual>,
    last_front_pairs: Option<Vec<(f64, f64)>>,
    stagnant_generations: usize,
}

impl<B: PipelineBackend> EvolutionEngine<B> {
    /// Validates the configuration before anything else; a configuration
    /// error is the only hard failure that can precede evaluation.
    pub fn new(
        config: SearchConfig,
        pset: PrimitiveSet,
        backend: B,
        data: SearchData,
    ) -> Result<Self> {
        config.validate()?;
        let shape = config.template_shape()?;
        let lambda = config.lambda();

        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let backend = Arc::new(backend);
        let pset = Arc::new(pset);
        let harness = PretestHarness::new(
            Arc::clone(&backend),
            Arc::clone(&pset),
            Arc::clone(&data.pretest_sample),
        );
        let max_eval_secs = ((config.max_eval_time_mins * 60.0) as u64).max(1);
        let evaluator = PipelineEvaluator::new(
            backend,
            Arc::clone(&pset),
            EvalOptions {
                scoring_function: config.scoring_function.clone(),
                max_eval_time: Duration::from_secs(max_eval_secs),
                single_use_stages: config.single_use_stages.clone(),
            },
            data.sample_weight.clone(),
        );
        let checkpoint = config
            .checkpoint_folder
            .clone()
            .map(|folder| CheckpointWriter::new(folder, config.random_seed));

        Ok(Self {
            config,
            shape,
            lambda,
            pset,
            harness,
            evaluator,
            cache: EvaluatedCache::new(),
            archive: ParetoArchive::new(),
            logbook: Logbook::new(),
            rng,
            cancel: CancelToken::new(),
            checkpoint,
            data,
            population: Vec::new(),
            best: None,
            last_front_pairs: None,
            stagnant_generations: 0,
        })
    }

    /// Handle for requesting a cooperative stop from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn archive(&self) -> &ParetoArchive {
        &self.archive
    }

    pub fn cache(&self) -> &EvaluatedCache {
        &self.cache
    }

    pub fn logbook(&self) -> &Logbook {
        &self.logbook
    }

    /// Run the optimization to a terminal state. Always yields a best
    /// individual on success; an archive with no member feasible on both
    /// dataset scores is an internal-inconsistency error.
    pub fn run<C: ProgressCallback>(&mut self, callback: &mut C) -> Result<SearchOutcome> {
        if !self.config.warm_start || self.population.is_empty() {
            self.population.clear();
            self.cache.reset();
            self.archive.reset();
            self.last_front_pairs = None;
            self.stagnant_generations = 0;
        }
        self.best = None;
        self.logbook = Logbook::new();

        let budget = BudgetGuard::new(
            Instant::now(),
            self.config.max_time_mins,
            self.cancel.clone(),
        );
        if let Some(writer) = &mut self.checkpoint {
            writer.mark_run_start();
        }

        let termination = match self.run_loop(&budget, callback) {
            Ok(()) => Termination::Completed,
            Err(EvopipeError::BudgetExceeded { elapsed_mins }) => {
                log::warn!(
                    "{:.2} minutes elapsed, closing prematurely with the current best pipeline",
                    elapsed_mins
                );
                Termination::BudgetExceeded
            }
            Err(EvopipeError::EarlyStop(window)) => {
                log::info!(
                    "pareto front did not improve over {} more generations, ending the run",
                    window
                );
                Termination::EarlyStopped
            }
            Err(EvopipeError::Cancelled) => {
                log::warn!(
                    "stop requested, closing prematurely with the current best pipeline"
                );
                Termination::Cancelled
            }
            Err(e) => return Err(e),
        };

        self.update_top_pipeline()?;
        let best = match &self.best {
            Some(best) => best.clone(),
            None => {
                return Err(EvopipeError::Internal(
                    "no best pipeline after a completed run".to_string(),
                ))
            }
        };

        Ok(SearchOutcome {
            population: self.population.clone(),
            pareto_front: self.archive.members().to_vec(),
            best,
            termination,
            logbook: self.logbook.clone(),
        })
    }

    fn run_loop<C: ProgressCallback>(
        &mut self,
        budget: &BudgetGuard,
        callback: &mut C,
    ) -> Result<()> {
        let ngen = self.config.resolved_generations();
        let mu = self.config.population_size;

        // Seed generation.
        if self.population.is_empty() {
            self.population = (0..mu)
                .map(|_| {
                    let tree = self.harness.generate(
                        self.shape.min_height,
                        self.shape.max_height,
                        &mut self.rng,
                    );
                    let mut individual = Individual::new(tree);
                    individual.stats = Lineage::seed();
                    individual
                })
                .collect();
        }

        callback.on_generation_start(0);
        let mut seed_population = std::mem::take(&mut self.population);
        let evaluated = self.evaluate_batch(&mut seed_population, budget);
        self.population = seed_population;
        let nevals = evaluated?;
        callback.on_batch_evaluated(nevals, self.population.len());
        let record = self.log_record(0, nevals);
        self.logbook.record(record.clone());
        callback.on_generation_complete(0, &record);

        // Generational process.
        for gen in 1..=ngen {
            budget.check()?;
            callback.on_generation_start(gen);

            let mut offspring = self.var_or();

            // Resolve the generation stamp of everything altered by
            // variation.
            for individual in &mut offspring {
                if individual.stats.generation == Generation::Pending {
                    individual.stats.generation = Generation::At(gen);
                }
            }

            let evaluated = self.evaluate_batch(&mut offspring, budget);
            // Even when the budget interrupts mid-batch, the evaluated
            // prefix has been folded into cache and archive already.
            let nevals = evaluated?;
            callback.on_batch_evaluated(nevals, offspring.len());

            // (mu + lambda): select the next parents from the union.
            let mut pool = std::mem::take(&mut self.population);
            pool.append(&mut offspring);
            let objectives: Vec<Objectives> = pool
                .iter()
                .map(|ind| ind.fitness.unwrap_or([f64::NEG_INFINITY; 3]))
                .collect();
            let selected = sel_nsga2(&objectives, mu);
            self.population = selected.into_iter().map(|i| pool[i].clone()).collect();

            self.per_generation_hook(gen)?;

            let record = self.log_record(gen, nevals);
            self.logbook.record(record.clone());
            callback.on_generation_complete(gen, &record);
        }

        Ok(())
    }

    /// Produce `lambda` offspring, each from exactly one of crossover,
    /// mutation, or reproduction.
    fn var_or(&mut self) -> Vec<Individual> {
        let mut offspring = Vec::with_capacity(self.lambda);
        for _ in 0..self.lambda {
            let op_choice: f64 = self.rng.gen();
            if op_choice < self.config.crossover_rate {
                match pick_eligible_pair(&self.population, &self.pset, &mut self.rng) {
                    Some((first, second)) => {
                        let (mut child, _) = self.harness.mate(
                            &self.population[first],
                            &self.population[second],
                            &self.cache,
                            &mut self.rng,
                        );
                        child.fitness = None;
                        offspring.push(child);
                    }
                    // No eligible pair: keep creating diversity through
                    // mutation instead.
                    None => offspring.push(self.mutate_random_individual()),
                }
            } else if op_choice < self.config.crossover_rate + self.config.mutation_rate {
                offspring.push(self.mutate_random_individual());
            } else {
                let idx = self.rng.gen_range(0..self.population.len());
                offspring.push(self.population[idx].clone());
            }
        }
        offspring
    }

    fn mutate_random_individual(&mut self) -> Individual {
        let idx = self.rng.gen_range(0..self.population.len());
        let mut child = self.harness.mutate(
            &self.population[idx],
            &self.cache,
            self.shape.tree_structure,
            &mut self.rng,
        );
        child.fitness = None;
        child
    }

    /// Evaluate a batch and fold it into the archive. Archive and cache are
    /// updated before any interrupt propagates, so selection never sees a
    /// partially applied generation.
    fn evaluate_batch(
        &mut self,
        individuals: &mut [Individual],
        budget: &BudgetGuard,
    ) -> Result<usize> {
        let outcome = self.evaluator.evaluate(
            &mut self.cache,
            individuals,
            &self.data.dataset1,
            &self.data.dataset2,
            budget,
        );
        self.archive.update(individuals);
        outcome
    }

    /// Per-generation duties: refresh the best pipeline, write a periodic
    /// checkpoint, and check the early-stop window.
    fn per_generation_hook(&mut self, gen: usize) -> Result<()> {
        self.update_top_pipeline()?;

        if let Some(writer) = &mut self.checkpoint {
            writer.maybe_save(
                gen,
                self.archive.members(),
                self.evaluator.backend().as_ref(),
                &self.pset,
            );
        }

        if let Some(early_stop) = self.config.early_stop {
            if self.stagnant_generations >= early_stop {
                return Err(EvopipeError::EarlyStop(early_stop));
            }
        }
        Ok(())
    }

    /// Scan the archive for the member strictly better on both dataset
    /// scores than anything seen in this scan, then update the stagnation
    /// counter from the archive's objective-pair snapshot.
    fn update_top_pipeline(&mut self) -> Result<()> {
        if self.archive.is_empty() {
            return Err(EvopipeError::Internal(
                "a pipeline has not yet been optimized; run at least one generation".to_string(),
            ));
        }

        let mut best_scores = [f64::NEG_INFINITY; 2];
        for member in self.archive.members() {
            if let Some(fitness) = member.fitness {
                if fitness[0] > best_scores[0] && fitness[1] > best_scores[1] {
                    best_scores = [fitness[0], fitness[1]];
                    self.best = Some(member.clone());
                }
            }
        }
        if self.best.is_none() {
            return Err(EvopipeError::Internal(
                "no archive member scores on both datasets; check that the datasets were passed \
                 correctly"
                    .to_string(),
            ));
        }

        let pairs = self.archive.objective_pairs();
        match &self.last_front_pairs {
            Some(last) if *last == pairs => self.stagnant_generations += 1,
            Some(_) => {
                self.last_front_pairs = Some(pairs);
                self.stagnant_generations = 0;
            }
            None => self.last_front_pairs = Some(pairs),
        }
        Ok(())
    }

    fn log_record(&self, gen: usize, nevals: usize) -> LogRecord {
        let values = self.archive.fitness_values();
        let best = |idx: usize| {
            values
                .iter()
                .map(|f| f[idx])
                .fold(f64::NEG_INFINITY, f64::max)
        };
        LogRecord {
            gen,
            nevals,
            best_score_d1: best(0),
            best_score_d2: best(1),
            front_size: self.archive.len(),
        }
    }

    /// Render the best pipeline for re-execution; optionally write it to a
    /// file. Only valid after a run.
    pub fn export_best(&self, output_file: Option<&Path>) -> Result<String> {
        let best = self.best.as_ref().ok_or_else(|| {
            EvopipeError::Internal(
                "a pipeline has not yet been optimized; call run() first".to_string(),
            )
        })?;
        let text = render_pipeline_export(
            best,
            self.evaluator.backend().as_ref(),
            &self.pset,
            self.config.random_seed,
        );
        if let Some(path) = output_file {
            std::fs::write(path, &text)?;
        }
        Ok(text)
    }
}
