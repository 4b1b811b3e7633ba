use std::{collections::HashSet, sync::Arc};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::{error::GoalError, record::GoalRecord, slot::BlobSlot};

/// Sole owner and writer of the persisted goals. Loads and saves the whole collection at once
/// and republishes every saved copy to subscribers.
pub struct GoalStore {
    slot: Box<dyn BlobSlot>,
    published: watch::Sender<Arc<[GoalRecord]>>,
}

impl GoalStore {
    pub fn new(slot: impl BlobSlot + 'static) -> Self {
        let (published, _) = watch::channel(Arc::from(Vec::<GoalRecord>::new()));
        Self {
            slot: Box::new(slot),
            published,
        }
    }

    /// Reads the persisted goals. Missing or unreadable data yields an empty collection.
    pub async fn load(&self) -> Vec<GoalRecord> {
        let records = match self.slot.read().await {
            Ok(Some(blob)) => match serde_json::from_slice::<Vec<GoalRecord>>(&blob) {
                Ok(records) => drop_duplicate_ids(records),
                Err(e) => {
                    error!("{}", GoalError::Decode(e));
                    vec![]
                }
            },
            Ok(None) => {
                info!("No goals were persisted yet");
                vec![]
            }
            Err(e) => {
                error!("Failed to read persisted goals {e}");
                vec![]
            }
        };
        debug!("Loaded {} goals", records.len());
        self.published.send_replace(Arc::from(records.clone()));
        records
    }

    /// Overwrites the persisted goals. Nothing is written if the records can't be encoded.
    pub async fn save(&self, records: &[GoalRecord]) -> Result<(), GoalError> {
        let result = self.save_inner(records).await;
        match &result {
            Ok(()) => {
                debug!("Saved {} goals", records.len());
                self.published.send_replace(Arc::from(records.to_vec()));
            }
            Err(e) => error!("Failed to save goals {e}"),
        }
        result
    }

    async fn save_inner(&self, records: &[GoalRecord]) -> Result<(), GoalError> {
        let mut ids = HashSet::with_capacity(records.len());
        if let Some(duplicate) = records.iter().find(|v| !ids.insert(v.id)) {
            warn!("Refusing to save {} twice", duplicate.id);
            return Err(GoalError::DuplicateId(duplicate.id));
        }

        let blob = serde_json::to_vec_pretty(records).map_err(GoalError::Encode)?;
        self.slot.write(blob).await
    }

    /// Snapshot of the last saved (or loaded) goals. The receiver is notified on every save.
    pub fn subscribe(&self) -> watch::Receiver<Arc<[GoalRecord]>> {
        self.published.subscribe()
    }
}

/// Keeps the first record of every id. A blob with duplicates could never be saved again.
fn drop_duplicate_ids(records: Vec<GoalRecord>) -> Vec<GoalRecord> {
    let mut ids = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|v| {
            let unique = ids.insert(v.id);
            if !unique {
                warn!("Dropping a second persisted goal with id {}", v.id);
            }
            unique
        })
        .collect()
}
