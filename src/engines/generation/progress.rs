use crate::engines::generation::logbook::LogRecord;

/// Hooks for observing the generational loop.
pub trait ProgressCallback {
    fn on_generation_start(&mut self, _generation: usize) {}
    fn on_generation_complete(&mut self, _generation: usize, _record: &LogRecord) {}
    /// Called after each evaluation batch with the number of pipelines that
    /// actually ran against the datasets.
    fn on_batch_evaluated(&mut self, _evaluated: usize, _batch_size: usize) {}
}

/// No-op callback for headless runs.
impl ProgressCallback for () {}

/// Logs progress through the `log` facade.
pub struct ConsoleProgressCallback;

impl ProgressCallback for ConsoleProgressCallback {
    fn on_generation_start(&mut self, generation: usize) {
        log::info!("generation {} starting", generation);
    }

    fn on_generation_complete(&mut self, generation: usize, record: &LogRecord) {
        log::info!(
            "generation {} complete: best d1 {:.4}, best d2 {:.4}, pareto front size {}",
            generation,
            record.best_score_d1,
            record.best_score_d2,
            record.front_size
        );
    }

    fn on_batch_evaluated(&mut self, evaluated: usize, batch_size: usize) {
        log::info!("evaluated {}/{} pipelines", evaluated, batch_size);
    }
}
