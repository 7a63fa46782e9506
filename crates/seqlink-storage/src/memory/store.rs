use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jiff::Timestamp;
use seqlink_core::store::{Insertion, Record, RecordStore, Result};
use seqlink_core::{ShortCode, StorageError};

/// In-memory storage entry for a URL mapping.
#[derive(Debug, Clone)]
struct Slot {
    long_url: String,
    hits: u64,
    created_at: Timestamp,
}

impl Slot {
    fn to_record(&self, code: &str) -> Record {
        Record {
            code: ShortCode::new_unchecked(code),
            long_url: self.long_url.clone(),
            hits: self.hits,
            created_at: self.created_at,
        }
    }
}

/// In-memory implementation of the [`RecordStore`] trait using DashMap.
///
/// Two maps hold the forward (code -> record) and reverse (url -> code)
/// entries. Writers lock the reverse shard before the forward shard and
/// publish both entries before releasing either, so readers of one map can
/// always find the matching entry in the other.
#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    forward: DashMap<String, Slot>,
    reverse: DashMap<String, String>,
}

impl InMemoryRecordStore {
    /// Creates a new in-memory record store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Inserts both entries, or reports the code already mapped to the URL.
    fn insert_pair(
        &self,
        code: &ShortCode,
        long_url: &str,
    ) -> Result<std::result::Result<Record, String>> {
        let reverse_slot = match self.reverse.entry(long_url.to_owned()) {
            Entry::Occupied(existing) => return Ok(Err(existing.get().clone())),
            Entry::Vacant(slot) => slot,
        };

        let forward_slot = match self.forward.entry(code.as_str().to_owned()) {
            Entry::Occupied(_) => return Err(StorageError::DuplicateCode(code.to_string())),
            Entry::Vacant(slot) => slot,
        };

        let slot = Slot {
            long_url: long_url.to_owned(),
            hits: 0,
            created_at: Timestamp::now(),
        };
        let record = slot.to_record(code.as_str());

        // Both shards stay locked until the guards drop at the end of scope.
        let _reverse = reverse_slot.insert(code.as_str().to_owned());
        forward_slot.insert(slot);

        Ok(Ok(record))
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find_by_long_url(&self, long_url: &str) -> Result<Option<ShortCode>> {
        Ok(self
            .reverse
            .get(long_url)
            .map(|code| ShortCode::new_unchecked(code.value().as_str())))
    }

    async fn find_by_short_code(&self, code: &ShortCode) -> Result<Option<Record>> {
        Ok(self
            .forward
            .get(code.as_str())
            .map(|slot| slot.to_record(code.as_str())))
    }

    async fn create(&self, code: &ShortCode, long_url: &str) -> Result<Insertion> {
        let winner = match self.insert_pair(code, long_url)? {
            Ok(record) => return Ok(Insertion::Created(record)),
            Err(winner) => winner,
        };

        self.forward
            .get(winner.as_str())
            .map(|slot| Insertion::Existing(slot.to_record(&winner)))
            .ok_or_else(|| {
                StorageError::InvalidData(format!(
                    "url is indexed under '{winner}' but no record exists"
                ))
            })
    }

    async fn increment_hit(&self, code: &ShortCode) -> Result<()> {
        if let Some(mut slot) = self.forward.get_mut(code.as_str()) {
            slot.hits = slot.hits.saturating_add(1);
        }
        Ok(())
    }
}
