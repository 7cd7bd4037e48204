use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::engines::checkpoint::export::render_pipeline_export;
use crate::engines::evaluation::backend::PipelineBackend;
use crate::engines::generation::primitive_set::PrimitiveSet;
use crate::engines::generation::tree::Individual;

/// Don't save periodic pipelines more often than this.
pub const OUTPUT_BEST_PIPELINE_PERIOD_SECS: u64 = 30;

/// Writes one file per Pareto-archive member once per generation, rate
/// limited by wall-clock time. Filenames encode generation index, archive
/// position, and a timestamp; pipelines already written in this run are
/// skipped. Failures are logged and never abort the optimization.
pub struct CheckpointWriter {
    folder: PathBuf,
    min_interval: Duration,
    last_write: Instant,
    exported: Vec<String>,
    random_seed: Option<u64>,
}

impl CheckpointWriter {
    pub fn new(folder: PathBuf, random_seed: Option<u64>) -> Self {
        Self {
            folder,
            min_interval: Duration::from_secs(OUTPUT_BEST_PIPELINE_PERIOD_SECS),
            last_write: Instant::now(),
            exported: Vec::new(),
            random_seed,
        }
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    /// Reset the rate limiter at the start of a run so the first save lands
    /// a full interval in.
    pub fn mark_run_start(&mut self) {
        self.last_write = Instant::now();
        self.exported.clear();
    }

    /// Save the archive if the rate limit allows it.
    pub fn maybe_save<B: PipelineBackend>(
        &mut self,
        gen: usize,
        members: &[Individual],
        backend: &B,
        pset: &PrimitiveSet,
    ) {
        if self.last_write.elapsed() < self.min_interval {
            return;
        }
        self.last_write = Instant::now();
        if let Err(e) = self.save(gen, members, backend, pset) {
            log::warn!("failed saving periodic pipeline: {}", e);
        }
    }

    fn save<B: PipelineBackend>(
        &mut self,
        gen: usize,
        members: &[Individual],
        backend: &B,
        pset: &PrimitiveSet,
    ) -> std::io::Result<()> {
        fs::create_dir_all(&self.folder)?;

        for (idx, member) in members.iter().enumerate() {
            let pipeline_str = backend.pipeline_string(&member.tree, pset);
            if self.exported.iter().any(|p| p == &pipeline_str) {
                log::debug!("periodic pipeline not saved, already exported");
                continue;
            }

            let filename = format!(
                "pipeline_gen_{}_idx_{}_{}.txt",
                gen,
                idx,
                chrono::Local::now().format("%Y.%m.%d_%H-%M-%S")
            );
            let path = self.folder.join(filename);
            log::debug!("saving periodic pipeline to {}", path.display());

            let contents = render_pipeline_export(member, backend, pset, self.random_seed);
            fs::write(&path, contents)?;
            self.exported.push(pipeline_str);
        }
        Ok(())
    }
}
