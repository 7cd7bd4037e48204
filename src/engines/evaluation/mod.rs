pub mod backend;
pub mod cache;
pub mod evaluator;
pub mod timeout;

pub use backend::PipelineBackend;
pub use cache::{CacheRecord, EvaluatedCache, DISQUALIFIED_SCORE};
pub use evaluator::{EvalOptions, PendingEvaluation, PipelineEvaluator, PreprocessReport};
pub use timeout::call_with_deadline;
