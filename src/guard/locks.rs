use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-case advisory locks serialising status recording, result attachment
/// and closure computation on one case.
#[derive(Default)]
pub struct CaseLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one case mutation.
pub struct CaseLock {
    _guard: OwnedMutexGuard<()>,
}

impl CaseLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, case_id: &str) -> CaseLock {
        let slot = {
            let mut slots = match self.slots.lock() {
                Ok(slots) => slots,
                Err(poisoned) => poisoned.into_inner(),
            };
            // Drop slots nobody holds or waits for.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots
                .entry(case_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        debug!("Acquire lock for case {case_id}");
        CaseLock {
            _guard: slot.lock_owned().await,
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}
