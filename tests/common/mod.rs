//! Shared fixtures: a toy regression catalog and a deterministic mock
//! pipeline backend with call counters.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use evopipe::engines::evaluation::PipelineBackend;
use evopipe::engines::generation::{Node, NodeKind, PrimitiveSet, SearchData, Tree};
use evopipe::types::{Dataset, Value};

/// Initialize test logging once; safe to call from every test.
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A small catalog in the shape of a regression AutoML search: selectors
/// and transformers over the feature matrix, regressors at the root.
pub fn regression_pset() -> PrimitiveSet {
    let mut pset = PrimitiveSet::new("matrix", "output");
    let matrix = pset.input_type();
    let output = pset.output_type();
    let pct = pset.type_tag("percentile");
    let degree = pset.type_tag("degree");
    let alpha = pset.type_tag("alpha");

    pset.add_primitive("SelectPercentile", vec![matrix, pct], matrix, false);
    pset.add_primitive("ScaleUnit", vec![matrix], matrix, false);
    pset.add_primitive("ExpandFeatures", vec![matrix, degree], matrix, false);
    pset.add_primitive("RidgeModel", vec![matrix, alpha], output, true);
    pset.add_primitive("LinearModel", vec![matrix], output, true);

    pset.add_terminal(matrix, Value::Str("input_matrix".into()), "input_matrix")
        .unwrap();
    for v in [10i64, 25, 50, 75] {
        pset.add_terminal(pct, Value::Int(v), &format!("percentile={}", v))
            .unwrap();
    }
    pset.add_terminal(degree, Value::Int(2), "degree=2").unwrap();
    for v in ["0.25", "0.5", "1.0"] {
        pset.add_terminal(alpha, Value::Float(v.parse().unwrap()), &format!("alpha={}", v))
            .unwrap();
    }
    pset
}

/// Build a linear pipeline tree from outermost stage to innermost; stage
/// parameter slots take the first registered terminal of their type.
pub fn linear_tree(pset: &PrimitiveSet, stages: &[&str]) -> Tree {
    fn build(pset: &PrimitiveSet, stages: &[&str], nodes: &mut Vec<Node>) {
        if stages.is_empty() {
            let input = pset.find_terminal("input_matrix").unwrap();
            nodes.push(Node::terminal(input, pset));
            return;
        }
        let id = pset
            .find_primitive(stages[0])
            .unwrap_or_else(|| panic!("unknown stage {}", stages[0]));
        nodes.push(Node::primitive(id, pset));
        let args = pset.primitive(id).args.clone();
        for arg in args {
            if pset.is_stage_type(arg) {
                build(pset, &stages[1..], nodes);
            } else {
                let term = pset.terminals_of(arg)[0];
                nodes.push(Node::terminal(term, pset));
            }
        }
    }
    let mut nodes = Vec::new();
    build(pset, stages, &mut nodes);
    Tree::from_nodes(nodes)
}

pub fn toy_dataset(n_samples: usize, n_features: usize) -> Arc<Dataset> {
    let features = (0..n_samples)
        .map(|i| (0..n_features).map(|j| (i * n_features + j) as f64 * 0.1).collect())
        .collect();
    let target = (0..n_samples).map(|i| i as f64).collect();
    Arc::new(Dataset::new(features, target))
}

pub fn search_data() -> SearchData {
    SearchData {
        dataset1: toy_dataset(40, 6),
        dataset2: toy_dataset(30, 6),
        pretest_sample: toy_dataset(10, 6),
        sample_weight: None,
    }
}

#[derive(Clone)]
pub struct MockPipeline {
    pub stages: Vec<String>,
    pub description: String,
}

#[derive(Clone, Copy)]
pub enum ScoreMode {
    /// Deterministic pseudo-score derived from the pipeline and dataset.
    Hash,
    /// The same score for every pipeline (freezes the Pareto front).
    Constant(f64),
}

/// Shared call counters observable from outside the engine.
#[derive(Clone, Default)]
pub struct Counters {
    pub compile: Arc<AtomicUsize>,
    pub score: Arc<AtomicUsize>,
    pub fit: Arc<AtomicUsize>,
}

pub struct MockBackend {
    counters: Counters,
    score_mode: ScoreMode,
    /// Sleep this long inside every scoring call.
    score_delay: Option<Duration>,
    /// Pipelines containing this stage sleep this long when scored.
    slow_stage: Option<(String, Duration)>,
    /// Pipelines containing this stage fail to compile.
    fail_stage: Option<String>,
    /// Scoring errors out on the dataset with this many samples.
    fail_score_on_samples: Option<usize>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            counters: Counters::default(),
            score_mode: ScoreMode::Hash,
            score_delay: None,
            slow_stage: None,
            fail_stage: None,
            fail_score_on_samples: None,
        }
    }

    pub fn with_constant_score(mut self, score: f64) -> Self {
        self.score_mode = ScoreMode::Constant(score);
        self
    }

    pub fn with_score_delay(mut self, delay: Duration) -> Self {
        self.score_delay = Some(delay);
        self
    }

    pub fn with_slow_stage(mut self, stage: &str, delay: Duration) -> Self {
        self.slow_stage = Some((stage.to_string(), delay));
        self
    }

    pub fn with_fail_stage(mut self, stage: &str) -> Self {
        self.fail_stage = Some(stage.to_string());
        self
    }

    pub fn with_score_error_on_samples(mut self, n_samples: usize) -> Self {
        self.fail_score_on_samples = Some(n_samples);
        self
    }

    pub fn counters(&self) -> Counters {
        self.counters.clone()
    }
}

impl PipelineBackend for MockBackend {
    type Pipeline = MockPipeline;

    fn compile(&self, tree: &Tree, pset: &PrimitiveSet) -> anyhow::Result<Self::Pipeline> {
        self.counters.compile.fetch_add(1, Ordering::SeqCst);
        let stages: Vec<String> = tree
            .nodes()
            .iter()
            .filter_map(|node| match node.kind {
                NodeKind::Primitive(id) => Some(pset.primitive(id).name.clone()),
                NodeKind::Terminal(_) => None,
            })
            .collect();
        if let Some(fail) = &self.fail_stage {
            if stages.iter().any(|s| s == fail) {
                anyhow::bail!("stage {} refused to compile", fail);
            }
        }
        Ok(MockPipeline {
            description: self.pipeline_string(tree, pset),
            stages,
        })
    }

    fn pipeline_string(&self, tree: &Tree, pset: &PrimitiveSet) -> String {
        let stages: Vec<&str> = tree
            .nodes()
            .iter()
            .filter_map(|node| match node.kind {
                NodeKind::Primitive(id) => Some(pset.primitive(id).name.as_str()),
                NodeKind::Terminal(_) => None,
            })
            .collect();
        format!("make_pipeline({})", stages.join(", "))
    }

    fn fit(&self, _pipeline: &mut Self::Pipeline, _data: &Dataset) -> anyhow::Result<()> {
        self.counters.fit.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn score(
        &self,
        pipeline: &mut Self::Pipeline,
        data: &Dataset,
        _scoring_function: &str,
        _sample_weight: Option<&[f64]>,
    ) -> anyhow::Result<f64> {
        self.counters.score.fetch_add(1, Ordering::SeqCst);
        if let Some((stage, delay)) = &self.slow_stage {
            if pipeline.stages.iter().any(|s| s == stage) {
                std::thread::sleep(*delay);
            }
        }
        if let Some(delay) = self.score_delay {
            std::thread::sleep(delay);
        }
        if self.fail_score_on_samples == Some(data.n_samples()) {
            anyhow::bail!("singular matrix on {} samples", data.n_samples());
        }
        match self.score_mode {
            ScoreMode::Constant(score) => Ok(score),
            ScoreMode::Hash => {
                let mut hasher = DefaultHasher::new();
                pipeline.description.hash(&mut hasher);
                data.n_samples().hash(&mut hasher);
                Ok((hasher.finish() % 1000) as f64 / 1000.0)
            }
        }
    }

    fn feature_count(&self, pipeline: &Self::Pipeline, data: &Dataset) -> anyhow::Result<usize> {
        // Selectors keep fewer features; everything else passes through.
        let selectors = pipeline
            .stages
            .iter()
            .filter(|s| s.as_str() == "SelectPercentile")
            .count();
        Ok(data.n_features().saturating_sub(selectors).max(1))
    }
}
