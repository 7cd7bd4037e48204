use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::error::{EvopipeError, Result};

/// Cooperative cancellation handle. Cloning shares the flag, so a caller
/// can keep one half and hand the other to the engine; the request is only
/// observed at the loop's defined suspension points.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Wall-clock budget plus cancellation, checked before each generation and
/// before each individual pipeline evaluation.
#[derive(Clone)]
pub struct BudgetGuard {
    start: Instant,
    max_time_mins: Option<f64>,
    cancel: CancelToken,
}

impl BudgetGuard {
    pub fn new(start: Instant, max_time_mins: Option<f64>, cancel: CancelToken) -> Self {
        Self {
            start,
            max_time_mins,
            cancel,
        }
    }

    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(EvopipeError::Cancelled);
        }
        if let Some(limit) = self.max_time_mins {
            let elapsed_mins = self.start.elapsed().as_secs_f64() / 60.0;
            if elapsed_mins >= limit {
                return Err(EvopipeError::BudgetExceeded { elapsed_mins });
            }
        }
        Ok(())
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    Completed,
    BudgetExceeded,
    EarlyStopped,
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn budget_guard_flags_elapsed_time() {
        let guard = BudgetGuard::new(Instant::now(), Some(0.0), CancelToken::new());
        assert!(matches!(
            guard.check(),
            Err(EvopipeError::BudgetExceeded { .. })
        ));

        let open = BudgetGuard::new(Instant::now(), None, CancelToken::new());
        assert!(open.check().is_ok());
    }
}
