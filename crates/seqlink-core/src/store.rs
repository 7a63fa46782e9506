use crate::error::StorageError;
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Result type for record store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored mapping from a short code to its target URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub code: ShortCode,
    /// The URL that was shortened, as normalized by the caller.
    pub long_url: String,
    /// Number of successful resolutions.
    pub hits: u64,
    pub created_at: Timestamp,
}

/// Outcome of [`RecordStore::create`].
#[derive(Debug, Clone, PartialEq)]
pub enum Insertion {
    /// The record was stored under the requested code.
    Created(Record),
    /// The URL was already mapped, typically by a concurrent writer.
    /// Nothing was stored; this is the record that won.
    Existing(Record),
}

impl Insertion {
    pub fn record(&self) -> &Record {
        match self {
            Insertion::Created(record) | Insertion::Existing(record) => record,
        }
    }
}

/// Durable code <-> URL mapping with per-code hit counters.
///
/// The forward entry (code -> record) and the reverse entry (url -> code)
/// are written as one unit: no reader may observe one without the other.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    /// Looks up the code already assigned to a URL.
    async fn find_by_long_url(&self, long_url: &str) -> Result<Option<ShortCode>>;

    /// Looks up the record stored under a code.
    async fn find_by_short_code(&self, code: &ShortCode) -> Result<Option<Record>>;

    /// Stores a new mapping.
    ///
    /// Returns `Err(DuplicateCode)` if the code is taken, and
    /// [`Insertion::Existing`] if the URL is already mapped to another code.
    /// Backends with a narrower URL column than the in-memory store (the
    /// MySQL store keeps up to 2048 ASCII bytes) return
    /// `Err(Unsupported)` for URLs they cannot hold; callers should
    /// percent-encode URLs before shortening them.
    async fn create(&self, code: &ShortCode, long_url: &str) -> Result<Insertion>;

    /// Adds one hit to a code. Unknown codes are ignored.
    async fn increment_hit(&self, code: &ShortCode) -> Result<()>;
}

#[async_trait]
impl<T: RecordStore + ?Sized> RecordStore for Box<T> {
    async fn find_by_long_url(&self, long_url: &str) -> Result<Option<ShortCode>> {
        (**self).find_by_long_url(long_url).await
    }

    async fn find_by_short_code(&self, code: &ShortCode) -> Result<Option<Record>> {
        (**self).find_by_short_code(code).await
    }

    async fn create(&self, code: &ShortCode, long_url: &str) -> Result<Insertion> {
        (**self).create(code, long_url).await
    }

    async fn increment_hit(&self, code: &ShortCode) -> Result<()> {
        (**self).increment_hit(code).await
    }
}
