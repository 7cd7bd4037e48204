use crate::engines::generation::primitive_set::PrimitiveSet;
use crate::engines::generation::tree::Tree;
use crate::types::Dataset;

/// The operator-catalog collaborator: turns expression trees into runnable
/// pipelines and scores them.
///
/// Implementations live outside this crate; the engine only needs these
/// five operations. Errors are deliberately `anyhow` — foreign fitting and
/// scoring code fails in arbitrary ways, and the engine converts every
/// failure into sentinel fitness rather than inspecting it.
///
/// `Pipeline` must be `Clone + Send` because scoring runs on a worker
/// thread that is abandoned on timeout: the engine keeps its own copy and
/// moves a clone onto the worker.
pub trait PipelineBackend: Send + Sync + 'static {
    type Pipeline: Clone + Send + 'static;

    /// Build an executable pipeline from a tree.
    fn compile(&self, tree: &Tree, pset: &PrimitiveSet) -> anyhow::Result<Self::Pipeline>;

    /// Flat textual form of the compiled pipeline, used to detect
    /// disallowed repeated stages and to label exports.
    fn pipeline_string(&self, tree: &Tree, pset: &PrimitiveSet) -> String;

    /// Fit the pipeline against a dataset (used by the pretest harness).
    fn fit(&self, pipeline: &mut Self::Pipeline, data: &Dataset) -> anyhow::Result<()>;

    /// Fit and score the pipeline on a dataset with the named scoring
    /// function; higher is better.
    fn score(
        &self,
        pipeline: &mut Self::Pipeline,
        data: &Dataset,
        scoring_function: &str,
        sample_weight: Option<&[f64]>,
    ) -> anyhow::Result<f64>;

    /// Number of features surviving the pipeline's selection stages on the
    /// given dataset.
    fn feature_count(&self, pipeline: &Self::Pipeline, data: &Dataset) -> anyhow::Result<usize>;
}
