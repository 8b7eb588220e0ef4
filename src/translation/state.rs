/*!
 * Observable translation state.
 *
 * `TranslationState` is the progress contract exposed to the outside: one
 * snapshot per query, and a single writable bit (`should_stop`) through
 * which a caller requests cooperative cancellation.
 */

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;

use crate::errors::TranslationError;

/// Segment-level progress of the current run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    /// Rounded `current / total * 100`, 0 when `total` is 0
    pub percentage: u32,
}

impl Progress {
    pub fn new(current: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((current as f64 / total as f64) * 100.0).round() as u32
        };
        Self {
            current,
            total,
            percentage,
        }
    }
}

/// Snapshot of the orchestrator's run state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranslationState {
    pub is_translating: bool,
    pub should_stop: bool,
    pub progress: Progress,
    pub current_message: String,
}

/// Shared handle to the run state
///
/// Clones observe and control the same run.
#[derive(Debug, Clone, Default)]
pub struct StateHandle {
    inner: Arc<RwLock<TranslationState>>,
}

impl StateHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> TranslationState {
        self.inner.read().clone()
    }

    pub fn is_translating(&self) -> bool {
        self.inner.read().is_translating
    }

    pub fn should_stop(&self) -> bool {
        self.inner.read().should_stop
    }

    /// Ask the running job to stop at the next batch boundary
    pub fn request_stop(&self) {
        let mut state = self.inner.write();
        state.should_stop = true;
        if state.is_translating {
            state.current_message = "Stopping after the current batch...".to_string();
        }
    }

    /// Enter the running state with fresh progress
    pub(crate) fn begin(&self, total: usize) -> Result<RunGuard, TranslationError> {
        let mut state = self.inner.write();
        if state.is_translating {
            return Err(TranslationError::AlreadyRunning);
        }
        *state = TranslationState {
            is_translating: true,
            should_stop: false,
            progress: Progress::new(0, total),
            current_message: format!("Preparing to translate {} segments", total),
        };
        Ok(RunGuard { handle: self.clone() })
    }

    pub(crate) fn set_message(&self, message: impl Into<String>) {
        self.inner.write().current_message = message.into();
    }

    /// Advance progress by `count` segments and return the new snapshot
    pub(crate) fn advance(&self, count: usize) -> TranslationState {
        let mut state = self.inner.write();
        let total = state.progress.total;
        let current = (state.progress.current + count).min(total);
        state.progress = Progress::new(current, total);
        state.current_message = format!(
            "processed {} / {} ({}%)",
            current, total, state.progress.percentage
        );
        state.clone()
    }
}

/// Clears `is_translating` when dropped, however the run ends
pub(crate) struct RunGuard {
    handle: StateHandle,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.handle.inner.write().is_translating = false;
    }
}
