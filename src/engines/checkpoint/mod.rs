pub mod export;
pub mod writer;

pub use export::render_pipeline_export;
pub use writer::{CheckpointWriter, OUTPUT_BEST_PIPELINE_PERIOD_SECS};
