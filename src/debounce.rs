use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Duration;

type Commit = Arc<dyn Fn(String) + Send + Sync>;

/// Coalesces live search input. At most one delayed commit is pending; a new
/// keystroke restarts the quiet period and `confirm` commits at once.
pub struct SearchDebouncer {
    quiet: Duration,
    commit: Commit,
    generation: Arc<AtomicU64>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl SearchDebouncer {
    pub fn new(quiet: Duration, commit: Commit) -> Self {
        Self {
            quiet,
            commit,
            generation: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
        }
    }

    pub fn input(&self, value: impl Into<String>) {
        let value = value.into();
        let generation = self.supersede();
        let latest = self.generation.clone();
        let commit = self.commit.clone();
        let quiet = self.quiet;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            if latest.load(Ordering::SeqCst) == generation {
                commit(value);
            }
        });
        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(handle);
        }
    }

    pub fn confirm(&self, value: impl Into<String>) {
        self.supersede();
        (self.commit)(value.into());
    }

    /// Drops any pending commit, e.g. when the input box closes.
    pub fn cancel(&self) {
        self.supersede();
    }

    #[cfg(test)]
    pub(crate) fn has_pending(&self) -> bool {
        self.pending
            .lock()
            .map(|pending| pending.as_ref().is_some_and(|handle| !handle.is_finished()))
            .unwrap_or(false)
    }

    fn supersede(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
        generation
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
