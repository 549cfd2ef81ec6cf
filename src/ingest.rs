use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::error::{IngestError, StoreError};
use crate::model::EpochRecord;
use crate::store::EpochStore;

/// Process-level store lifecycle: one-way Empty -> Populated.
#[derive(Debug, Clone, Copy, PartialEq)]
enum IngestState {
    Empty,
    Populated,
}

/// Loads one validated batch into the store, exactly once per process.
///
/// The state flag is the at-most-once gate: checked and flipped under a
/// Mutex so two concurrent ingest calls can never both see an empty store
/// and double-insert. Queries read the store directly and never touch this
/// lock.
pub struct IngestPipeline {
    store: Arc<dyn EpochStore>,
    state: Mutex<IngestState>,
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn EpochStore>) -> Self {
        Self {
            store,
            state: Mutex::new(IngestState::Empty),
        }
    }

    /// Insert the batch if the store is still unpopulated.
    ///
    /// Returns the number of records inserted; 0 with a log line when the
    /// pipeline (or a pre-populated backend) says the data is already there.
    /// An empty batch aborts with `EmptyBatch` and leaves the store Empty.
    pub fn ingest(&self, batch: Vec<EpochRecord>) -> Result<usize, IngestError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| StoreError::Unavailable("ingest gate poisoned".to_string()))
            .map_err(IngestError::Store)?;

        if *state == IngestState::Populated {
            info!("store already populated, skipping re-ingest");
            return Ok(0);
        }

        // A backend that outlives the process (external KV profile) may hold
        // data from a previous run; treat that as populated too.
        if !self.store.is_empty()? {
            info!("store holds prior data, skipping re-ingest");
            *state = IngestState::Populated;
            return Ok(0);
        }

        if batch.is_empty() {
            warn!("upstream batch was empty, store stays unpopulated");
            return Err(IngestError::EmptyBatch);
        }

        let inserted = self.store.put_if_absent(batch)?;
        *state = IngestState::Populated;
        info!(inserted, "ingest complete");
        Ok(inserted)
    }
}
