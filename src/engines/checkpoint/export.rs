use serde::Serialize;

use crate::engines::evaluation::backend::PipelineBackend;
use crate::engines::generation::primitive_set::PrimitiveSet;
use crate::engines::generation::tree::Individual;

#[derive(Serialize)]
struct Provenance<'a> {
    generation: Option<usize>,
    mutation_count: usize,
    crossover_count: usize,
    predecessor: &'a [String],
    random_seed: Option<u64>,
}

/// Human-readable reconstruction of one individual: the runnable pipeline,
/// its three objective values, the expression tree in canonical text form
/// (suitable for later re-execution by the operator catalog), and a JSON
/// provenance block.
pub fn render_pipeline_export<B: PipelineBackend>(
    individual: &Individual,
    backend: &B,
    pset: &PrimitiveSet,
    random_seed: Option<u64>,
) -> String {
    let [d1, d2, feature_score] = individual.fitness.unwrap_or([f64::NEG_INFINITY; 3]);
    let provenance = Provenance {
        generation: individual.stats.generation.number(),
        mutation_count: individual.stats.mutation_count,
        crossover_count: individual.stats.crossover_count,
        predecessor: &individual.stats.predecessor,
        random_seed,
    };
    let provenance_json = serde_json::to_string_pretty(&provenance)
        .unwrap_or_else(|_| "{}".to_string());

    format!(
        "# Candidate pipeline exported by evopipe\n\
         # Score on dataset 1: {d1}\n\
         # Score on dataset 2: {d2}\n\
         # Feature score: {feature_score}\n\
         \n\
         Pipeline:\n{pipeline}\n\
         \n\
         Expression:\n{expression}\n\
         \n\
         Provenance:\n{provenance_json}\n",
        pipeline = backend.pipeline_string(&individual.tree, pset),
        expression = individual.tree.canonical_string(pset),
    )
}
