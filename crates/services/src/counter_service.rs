use std::sync::{Arc, Mutex, MutexGuard};

use quiz_core::model::{PersistedCounter, QuestionCounter};
use storage::local::LocalStore;

/// Local storage key holding the counter snapshot.
pub const COUNTER_KEY: &str = "question-counter";

/// Process-wide free question counter, written through to local storage.
///
/// Persistence failures are logged and never surfaced; the in-memory value
/// stays authoritative for the rest of the run.
#[derive(Clone)]
pub struct QuestionCounterStore {
    local: Arc<dyn LocalStore>,
    state: Arc<Mutex<QuestionCounter>>,
}

impl QuestionCounterStore {
    /// Rehydrate from local storage, falling back to the default state.
    #[must_use]
    pub fn load(local: Arc<dyn LocalStore>) -> Self {
        let state = match local.get_item(COUNTER_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<PersistedCounter>(&raw) {
                Ok(persisted) => persisted.state,
                Err(e) => {
                    tracing::warn!(error = %e, "discarding corrupt question counter");
                    QuestionCounter::default()
                }
            },
            Ok(None) => QuestionCounter::default(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read question counter");
                QuestionCounter::default()
            }
        };
        Self {
            local,
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn guard(&self) -> MutexGuard<'_, QuestionCounter> {
        // Counter updates cannot panic mid-write, so a poisoned value is still consistent.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn mutate(&self, f: impl FnOnce(&mut QuestionCounter)) -> QuestionCounter {
        let snapshot = {
            let mut state = self.guard();
            f(&mut state);
            *state
        };
        self.persist(snapshot);
        snapshot
    }

    fn persist(&self, counter: QuestionCounter) {
        let raw = match serde_json::to_string(&PersistedCounter::from(counter)) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode question counter");
                return;
            }
        };
        if let Err(e) = self.local.set_item(COUNTER_KEY, &raw) {
            tracing::warn!(error = %e, "failed to persist question counter");
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> QuestionCounter {
        *self.guard()
    }

    /// Count one answered question. Never blocked by the limit.
    pub fn increment(&self) -> QuestionCounter {
        self.mutate(QuestionCounter::increment)
    }

    pub fn reset(&self) -> QuestionCounter {
        tracing::info!("question counter reset");
        self.mutate(QuestionCounter::reset)
    }

    pub fn set_limit(&self, limit: u32) -> QuestionCounter {
        self.mutate(|c| c.set_limit(limit))
    }

    #[must_use]
    pub fn has_reached_limit(&self) -> bool {
        self.guard().has_reached_limit()
    }
}
