mod common;

use std::time::Duration;

use common::{regression_pset, search_data, MockBackend};
use evopipe::config::SearchConfig;
use evopipe::engines::control::Termination;
use evopipe::engines::generation::pareto::dominates;
use evopipe::engines::generation::{EvolutionEngine, Generation};
use evopipe::EvopipeError;

fn small_config() -> SearchConfig {
    SearchConfig {
        population_size: 8,
        generations: Some(3),
        mutation_rate: 0.7,
        crossover_rate: 0.2,
        random_seed: Some(42),
        single_use_stages: vec!["ExpandFeatures".to_string()],
        ..Default::default()
    }
}

#[test]
fn full_run_completes_and_yields_a_best_pipeline() {
    common::init_logging();
    let mut engine = EvolutionEngine::new(
        small_config(),
        regression_pset(),
        MockBackend::new(),
        search_data(),
    )
    .unwrap();

    let outcome = engine.run(&mut ()).unwrap();

    assert_eq!(outcome.termination, Termination::Completed);
    assert_eq!(outcome.population.len(), 8);
    // Seed generation plus three generational steps.
    assert_eq!(outcome.logbook.len(), 4);

    // Everything selected into the final population has been scored.
    assert!(outcome.population.iter().all(|ind| ind.has_fitness()));

    // The archive is mutually non-dominated.
    let front: Vec<[f64; 3]> = outcome
        .pareto_front
        .iter()
        .map(|m| m.fitness.unwrap())
        .collect();
    for (i, a) in front.iter().enumerate() {
        for (j, b) in front.iter().enumerate() {
            if i != j {
                assert!(!dominates(a, b), "archive members {} and {} overlap", i, j);
            }
        }
    }

    // The best individual carries scores on both datasets.
    let best_fitness = outcome.best.fitness.unwrap();
    assert!(best_fitness[0].is_finite());
    assert!(best_fitness[1].is_finite());

    // Nothing keeps a pending generation stamp past evaluation.
    assert!(outcome
        .population
        .iter()
        .all(|ind| ind.stats.generation != Generation::Pending));
}

#[test]
fn seeded_runs_are_reproducible() {
    let run = || {
        let mut engine = EvolutionEngine::new(
            small_config(),
            regression_pset(),
            MockBackend::new(),
            search_data(),
        )
        .unwrap();
        let outcome = engine.run(&mut ()).unwrap();
        let pset = regression_pset();
        (
            outcome.best.fitness.unwrap(),
            outcome.best.tree.canonical_string(&pset),
        )
    };

    let (fitness_a, best_a) = run();
    let (fitness_b, best_b) = run();
    assert_eq!(fitness_a, fitness_b);
    assert_eq!(best_a, best_b);
}

#[test]
fn unchanged_pareto_front_triggers_early_stop() {
    let config = SearchConfig {
        generations: Some(50),
        early_stop: Some(2),
        ..small_config()
    };
    // Every pipeline scores the same on both datasets, so the archive's
    // objective pairs freeze after the seed generation.
    let mut engine = EvolutionEngine::new(
        config,
        regression_pset(),
        MockBackend::new().with_constant_score(0.5),
        search_data(),
    )
    .unwrap();

    let outcome = engine.run(&mut ()).unwrap();
    assert_eq!(outcome.termination, Termination::EarlyStopped);
    // Halted during generation 3: seed plus two recorded generations.
    assert_eq!(outcome.logbook.len(), 3);
}

#[test]
fn wall_clock_budget_interrupts_gracefully() {
    let config = SearchConfig {
        population_size: 4,
        generations: Some(1000),
        max_time_mins: Some(0.001),
        ..small_config()
    };
    let mut engine = EvolutionEngine::new(
        config,
        regression_pset(),
        MockBackend::new().with_score_delay(Duration::from_millis(15)),
        search_data(),
    )
    .unwrap();

    let outcome = engine.run(&mut ()).unwrap();
    assert_eq!(outcome.termination, Termination::BudgetExceeded);
    // Far fewer generations than configured, but a best pipeline survives.
    assert!(outcome.logbook.len() < 1000);
    assert!(outcome.best.has_fitness());
}

#[test]
fn warm_start_reuses_population_and_cache() {
    let config = SearchConfig {
        warm_start: true,
        ..small_config()
    };
    let mut engine = EvolutionEngine::new(
        config,
        regression_pset(),
        MockBackend::new(),
        search_data(),
    )
    .unwrap();

    engine.run(&mut ()).unwrap();
    let cached_after_first = engine.cache().len();
    assert!(cached_after_first > 0);

    let outcome = engine.run(&mut ()).unwrap();
    // The carried-over parents arrive already scored.
    assert_eq!(outcome.logbook.records()[0].nevals, 0);
    assert!(engine.cache().len() >= cached_after_first);
}

#[test]
fn missing_stopping_rule_fails_before_any_evaluation() {
    let config = SearchConfig {
        generations: None,
        max_time_mins: None,
        ..small_config()
    };
    let backend = MockBackend::new();
    let counters = backend.counters();
    let result = EvolutionEngine::new(config, regression_pset(), backend, search_data());
    assert!(matches!(result, Err(EvopipeError::Configuration(_))));
    assert_eq!(
        counters.compile.load(std::sync::atomic::Ordering::SeqCst),
        0
    );
}

#[test]
fn cancellation_finalizes_with_evaluated_individuals() {
    let mut engine = EvolutionEngine::new(
        SearchConfig {
            generations: Some(1000),
            ..small_config()
        },
        regression_pset(),
        MockBackend::new().with_score_delay(Duration::from_millis(10)),
        search_data(),
    )
    .unwrap();

    // Request a stop from another thread shortly after launch; the loop
    // observes it at the next suspension point.
    let token = engine.cancel_token();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(120));
        token.cancel();
    });

    let outcome = engine.run(&mut ()).unwrap();
    canceller.join().unwrap();
    assert_eq!(outcome.termination, Termination::Cancelled);
    assert!(outcome.best.has_fitness());
}
