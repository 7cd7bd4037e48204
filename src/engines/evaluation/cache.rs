use std::collections::HashMap;

use serde::Serialize;

use crate::engines::generation::tree::Lineage;

/// Sentinel score for pipelines disqualified without scoring (empty trees,
/// repeated single-use stages, compile failures). The first dimension is a
/// fixed large positive penalty while the other two are negative infinity:
/// the finite value keeps Pareto comparisons able to discriminate among
/// invalid pipelines where an all-`-inf` tuple could not.
pub const DISQUALIFIED_SCORE: f64 = 5000.0;

/// Everything remembered about an evaluated pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct CacheRecord {
    pub operator_count: usize,
    pub score_on_dataset1: f64,
    pub score_on_dataset2: f64,
    pub feature_score: f64,
    pub generation: usize,
    pub mutation_count: usize,
    pub crossover_count: usize,
    pub predecessor: Vec<String>,
}

impl CacheRecord {
    pub fn from_scores(
        operator_count: usize,
        score_on_dataset1: f64,
        score_on_dataset2: f64,
        feature_score: f64,
        stats: &Lineage,
    ) -> Self {
        CacheRecord {
            operator_count,
            score_on_dataset1,
            score_on_dataset2,
            feature_score,
            generation: stats.generation.number().unwrap_or(0),
            mutation_count: stats.mutation_count,
            crossover_count: stats.crossover_count,
            predecessor: stats.predecessor.clone(),
        }
    }

    /// Record for a pipeline disqualified before scoring.
    pub fn disqualified(operator_count: usize, stats: &Lineage) -> Self {
        Self::from_scores(
            operator_count,
            DISQUALIFIED_SCORE,
            f64::NEG_INFINITY,
            f64::NEG_INFINITY,
            stats,
        )
    }

    pub fn fitness(&self) -> [f64; 3] {
        [
            self.score_on_dataset1,
            self.score_on_dataset2,
            self.feature_score,
        ]
    }
}

/// Memo of every individual ever evaluated, keyed by canonical string.
///
/// Entries are append-only and never evicted within a run; on very long
/// runs the map grows without bound. That mirrors the reference behavior
/// and is deliberately left without an eviction policy.
#[derive(Default)]
pub struct EvaluatedCache {
    records: HashMap<String, CacheRecord>,
}

impl EvaluatedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, canonical: &str) -> bool {
        self.records.contains_key(canonical)
    }

    pub fn get(&self, canonical: &str) -> Option<&CacheRecord> {
        self.records.get(canonical)
    }

    pub fn insert(&mut self, canonical: String, record: CacheRecord) {
        self.records.insert(canonical, record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn reset(&mut self) {
        self.records.clear();
    }
}
