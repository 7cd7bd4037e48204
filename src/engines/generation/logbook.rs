use serde::Serialize;

/// One per-generation summary row.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub gen: usize,
    /// Number of individuals that required evaluation this generation
    /// (cache hits and reproduced clones excluded).
    pub nevals: usize,
    pub best_score_d1: f64,
    pub best_score_d2: f64,
    pub front_size: usize,
}

/// Chronological record of the run, one row per generation including the
/// seed generation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Logbook {
    records: Vec<LogRecord>,
}

impl Logbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: LogRecord) {
        log::info!(
            "generation {}: {} evaluations, best d1 {:.4}, best d2 {:.4}, front size {}",
            record.gen,
            record.nevals,
            record.best_score_d1,
            record.best_score_d2,
            record.front_size
        );
        self.records.push(record);
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn last(&self) -> Option<&LogRecord> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
