use async_trait::async_trait;
use dashmap::DashMap;
use seqlink_core::{
    CodeAlphabet, Insertion, Record, RecordStore, SequenceCounter, ShortCode, Shortener,
    ShortenerError, StorageError,
};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};
use typed_builder::TypedBuilder;

type Result<T> = std::result::Result<T, ShortenerError>;

/// How a successful resolution records its hit.
///
/// In both modes an increment the store rejects is logged at `warn` and
/// kept in memory. Kept hits are replayed after the next increment that
/// succeeds, or by [`ShortenerService::retry_pending_hits`]. They do not
/// survive a restart of the process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HitRecording {
    /// Await the increment before returning the URL. Failures are logged and
    /// do not affect the resolution.
    #[default]
    Inline,
    /// Spawn the increment on the current tokio runtime and return at once.
    Detached,
}

/// Configures a [`ShortenerService`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct ShortenerSettings {
    /// Symbols codes are built from.
    #[builder(default)]
    pub alphabet: CodeAlphabet,
    /// Codes that must never be handed out, e.g. paths used by the HTTP
    /// layer. Sequence numbers that encode to one of these are skipped.
    #[builder(default, setter(into))]
    pub reserved_codes: Vec<String>,
    #[builder(default)]
    pub hit_recording: HitRecording,
}

impl Default for ShortenerSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A concrete implementation of the [`Shortener`] trait.
///
/// Shortening checks the reverse index first and only draws a sequence
/// number on a miss, so re-shortening a URL is free. Two requests racing to
/// shorten the same new URL both draw a number; the store keeps the first
/// insert and the loser's number is discarded, leaving a gap in the
/// sequence but never a second code for the URL.
#[derive(Debug)]
pub struct ShortenerService<S, C> {
    store: Arc<S>,
    counter: Arc<C>,
    alphabet: CodeAlphabet,
    reserved: HashSet<String>,
    hit_recording: HitRecording,
    pending_hits: Arc<DashMap<ShortCode, u64>>,
}

impl<S: RecordStore, C: SequenceCounter> ShortenerService<S, C> {
    /// Creates a service with the default alphabet and no reserved codes.
    pub fn new(store: S, counter: C) -> Self {
        Self {
            store: Arc::new(store),
            counter: Arc::new(counter),
            alphabet: CodeAlphabet::default(),
            reserved: HashSet::new(),
            hit_recording: HitRecording::default(),
            pending_hits: Arc::default(),
        }
    }

    /// Creates a service with custom settings.
    ///
    /// Fails if a reserved code could never be produced by the alphabet,
    /// which usually means the reserved list was written for another one.
    pub fn with_settings(store: S, counter: C, settings: ShortenerSettings) -> Result<Self> {
        let mut reserved = HashSet::with_capacity(settings.reserved_codes.len());
        for code in settings.reserved_codes {
            settings.alphabet.parse(&code).map_err(|e| {
                ShortenerError::Configuration(format!("reserved code '{code}' is unusable: {e}"))
            })?;
            reserved.insert(code);
        }

        Ok(Self {
            store: Arc::new(store),
            counter: Arc::new(counter),
            alphabet: settings.alphabet,
            reserved,
            hit_recording: settings.hit_recording,
            pending_hits: Arc::default(),
        })
    }

    pub fn alphabet(&self) -> &CodeAlphabet {
        &self.alphabet
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn counter(&self) -> &C {
        &self.counter
    }

    /// Hits the store has not accepted yet.
    pub fn pending_hits(&self) -> u64 {
        self.pending_hits.iter().map(|entry| *entry.value()).sum()
    }

    /// Replays kept hits against the store. Returns how many are still
    /// pending, which is non-zero while the store keeps failing.
    pub async fn retry_pending_hits(&self) -> u64 {
        replay_pending_hits(self.store.as_ref(), &self.pending_hits).await
    }

    /// Draws sequence numbers until one encodes to an unreserved code.
    async fn allocate(&self) -> Result<ShortCode> {
        loop {
            let n = self.counter.next().await?;
            let code = self.alphabet.encode(n);
            if self.reserved.contains(code.as_str()) {
                debug!(code = %code, sequence = n, "skipping reserved code");
                continue;
            }
            return Ok(code);
        }
    }

    async fn record_hit(&self, code: ShortCode) {
        match self.hit_recording {
            HitRecording::Inline => {
                increment_hit(self.store.as_ref(), &self.pending_hits, code).await
            }
            HitRecording::Detached => {
                let store = Arc::clone(&self.store);
                let pending = Arc::clone(&self.pending_hits);
                tokio::spawn(async move { increment_hit(store.as_ref(), &pending, code).await });
            }
        }
    }

    async fn find(&self, code: &str) -> Result<Record> {
        let code = self.alphabet.parse(code)?;

        self.store
            .find_by_short_code(&code)
            .await?
            .ok_or_else(|| ShortenerError::NotFound(code.to_string()))
    }
}

async fn increment_hit<S: RecordStore>(
    store: &S,
    pending: &DashMap<ShortCode, u64>,
    code: ShortCode,
) {
    match store.increment_hit(&code).await {
        Ok(()) if pending.is_empty() => {}
        Ok(()) => {
            replay_pending_hits(store, pending).await;
        }
        Err(e) => {
            warn!(code = %code, error = %e, "failed to record hit; keeping it for retry");
            *pending.entry(code).or_insert(0) += 1;
        }
    }
}

/// Drains `pending` into the store, stopping at the first failure.
async fn replay_pending_hits<S: RecordStore>(
    store: &S,
    pending: &DashMap<ShortCode, u64>,
) -> u64 {
    let codes: Vec<ShortCode> = pending.iter().map(|entry| entry.key().clone()).collect();

    for code in codes {
        let Some((code, mut count)) = pending.remove(&code) else {
            continue;
        };

        while count > 0 {
            if let Err(e) = store.increment_hit(&code).await {
                debug!(code = %code, error = %e, remaining = count, "hit replay failed");
                break;
            }
            count -= 1;
        }

        if count > 0 {
            *pending.entry(code).or_insert(0) += count;
            break;
        }
    }

    pending.iter().map(|entry| *entry.value()).sum()
}

#[async_trait]
impl<S: RecordStore, C: SequenceCounter> Shortener for ShortenerService<S, C> {
    async fn shorten(&self, long_url: &str) -> Result<ShortCode> {
        if let Some(code) = self.store.find_by_long_url(long_url).await? {
            debug!(code = %code, url = long_url, "url already shortened");
            return Ok(code);
        }

        let code = self.allocate().await?;

        match self.store.create(&code, long_url).await {
            Ok(Insertion::Created(record)) => {
                info!(code = %record.code, url = long_url, "shortened url");
                Ok(record.code)
            }
            Ok(Insertion::Existing(winner)) => {
                debug!(
                    code = %winner.code,
                    discarded = %code,
                    url = long_url,
                    "url was shortened concurrently; discarding allocated code"
                );
                Ok(winner.code)
            }
            Err(StorageError::DuplicateCode(taken)) => {
                error!(
                    code = %taken,
                    url = long_url,
                    "allocated code is already in use; the sequence counter is behind the record store"
                );
                Err(ShortenerError::DuplicateCode(taken))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn resolve(&self, code: &str) -> Result<String> {
        trace!(code, "resolving short code");

        let record = self.find(code).await?;
        self.record_hit(record.code).await;

        Ok(record.long_url)
    }

    async fn inspect(&self, code: &str) -> Result<Record> {
        self.find(code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqlink_core::counter::SequenceNumber;
    use seqlink_core::CounterError;
    use seqlink_storage::{InMemoryCounter, InMemoryRecordStore};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn test_service() -> ShortenerService<InMemoryRecordStore, InMemoryCounter> {
        ShortenerService::new(InMemoryRecordStore::new(), InMemoryCounter::new())
    }

    /// A counter whose backend is down.
    struct UnavailableCounter;

    #[async_trait]
    impl SequenceCounter for UnavailableCounter {
        async fn next(&self) -> std::result::Result<SequenceNumber, CounterError> {
            Err(CounterError::Unavailable("connection refused".to_string()))
        }

        async fn peek(&self) -> std::result::Result<SequenceNumber, CounterError> {
            Err(CounterError::Unavailable("connection refused".to_string()))
        }
    }

    /// Wraps a store so the reverse lookup always misses, the way it does
    /// for a request that checked just before a concurrent writer inserted.
    /// Hit increments can also be made to fail.
    #[derive(Default)]
    struct RacingStore {
        inner: InMemoryRecordStore,
        fail_hits: AtomicBool,
    }

    #[async_trait]
    impl RecordStore for RacingStore {
        async fn find_by_long_url(
            &self,
            _long_url: &str,
        ) -> std::result::Result<Option<ShortCode>, StorageError> {
            Ok(None)
        }

        async fn find_by_short_code(
            &self,
            code: &ShortCode,
        ) -> std::result::Result<Option<Record>, StorageError> {
            self.inner.find_by_short_code(code).await
        }

        async fn create(
            &self,
            code: &ShortCode,
            long_url: &str,
        ) -> std::result::Result<Insertion, StorageError> {
            self.inner.create(code, long_url).await
        }

        async fn increment_hit(&self, code: &ShortCode) -> std::result::Result<(), StorageError> {
            if self.fail_hits.load(Ordering::SeqCst) {
                return Err(StorageError::Unavailable("connection reset".to_string()));
            }
            self.inner.increment_hit(code).await
        }
    }

    #[tokio::test]
    async fn sequential_urls_get_sequential_codes() {
        let service = test_service();
        let alphabet = CodeAlphabet::default();

        for n in 0..100u64 {
            let code = service
                .shorten(&format!("https://example.com/{n}"))
                .await
                .unwrap();
            assert_eq!(code, alphabet.encode(n));
        }

        assert_eq!(service.counter().peek().await.unwrap(), 100);
    }

    #[tokio::test]
    async fn first_codes_follow_the_alphabet() {
        let service = test_service();

        let a = service.shorten("https://one.example").await.unwrap();
        let b = service.shorten("https://two.example").await.unwrap();
        assert_eq!(a.as_str(), "a");
        assert_eq!(b.as_str(), "b");
    }

    #[tokio::test]
    async fn shortening_twice_returns_the_same_code() {
        let service = test_service();

        let first = service.shorten("https://example.com").await.unwrap();
        let second = service.shorten("https://example.com").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(service.counter().peek().await.unwrap(), 1);
        assert_eq!(service.store().len(), 1);
    }

    #[tokio::test]
    async fn resolve_returns_url_and_counts_hits() {
        let service = test_service();
        let code = service.shorten("https://example.com").await.unwrap();

        for _ in 0..5 {
            let url = service.resolve(code.as_str()).await.unwrap();
            assert_eq!(url, "https://example.com");
        }

        let record = service.inspect(code.as_str()).await.unwrap();
        assert_eq!(record.hits, 5);
    }

    #[tokio::test]
    async fn inspect_does_not_count_a_hit() {
        let service = test_service();
        let code = service.shorten("https://example.com").await.unwrap();

        service.inspect(code.as_str()).await.unwrap();
        let record = service.inspect(code.as_str()).await.unwrap();

        assert_eq!(record.hits, 0);
        assert_eq!(record.long_url, "https://example.com");
        assert_eq!(record.code, code);
    }

    #[tokio::test]
    async fn resolve_unknown_code_is_not_found() {
        let service = test_service();

        let err = service.resolve("doesnotexist").await.unwrap_err();
        assert!(matches!(err, ShortenerError::NotFound(ref c) if c == "doesnotexist"));
        assert!(err.is_not_found());

        let long = "9".repeat(40);
        for code in ["b", "Zz9", long.as_str()] {
            let err = service.inspect(code).await.unwrap_err();
            assert!(matches!(err, ShortenerError::NotFound(_)), "{code:?}");
        }
    }

    #[tokio::test]
    async fn resolve_malformed_code_is_invalid() {
        let service = test_service();
        service.shorten("https://example.com").await.unwrap();

        for code in ["", "a/b", "a.b", "reverse?x=1"] {
            let err = service.resolve(code).await.unwrap_err();
            assert!(matches!(err, ShortenerError::InvalidCode(_)), "{code:?}");
            assert!(err.is_not_found());
        }
    }

    #[tokio::test]
    async fn reserved_codes_are_skipped() {
        let settings = ShortenerSettings::builder()
            .reserved_codes(vec!["b".to_string(), "c".to_string()])
            .build();
        let service = ShortenerService::with_settings(
            InMemoryRecordStore::new(),
            InMemoryCounter::new(),
            settings,
        )
        .unwrap();

        let mut codes = vec![];
        for n in 0..3 {
            let code = service
                .shorten(&format!("https://example.com/{n}"))
                .await
                .unwrap();
            codes.push(code.into_string());
        }

        assert_eq!(codes, ["a", "d", "e"]);
        assert_eq!(service.counter().peek().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn reserved_code_outside_alphabet_is_rejected() {
        let settings = ShortenerSettings::builder()
            .reserved_codes(vec!["admin/panel".to_string()])
            .build();

        let err = ShortenerService::with_settings(
            InMemoryRecordStore::new(),
            InMemoryCounter::new(),
            settings,
        )
        .unwrap_err();

        assert!(matches!(err, ShortenerError::Configuration(_)));
    }

    #[tokio::test]
    async fn custom_alphabet_drives_code_shape() {
        let settings = ShortenerSettings::builder()
            .alphabet(CodeAlphabet::new("xy").unwrap())
            .build();
        let service = ShortenerService::with_settings(
            InMemoryRecordStore::new(),
            InMemoryCounter::new(),
            settings,
        )
        .unwrap();

        let mut codes = vec![];
        for n in 0..4 {
            let code = service
                .shorten(&format!("https://example.com/{n}"))
                .await
                .unwrap();
            codes.push(code.into_string());
        }
        assert_eq!(codes, ["x", "y", "xx", "xy"]);

        // symbols of the default alphabet are not codes here
        let err = service.resolve("a").await.unwrap_err();
        assert!(matches!(err, ShortenerError::InvalidCode(_)));
    }

    #[tokio::test]
    async fn counter_outage_fails_without_storing() {
        let service = ShortenerService::new(InMemoryRecordStore::new(), UnavailableCounter);

        let err = service.shorten("https://example.com").await.unwrap_err();

        assert!(matches!(err, ShortenerError::CounterUnavailable(_)));
        assert!(err.is_retryable());
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn known_url_needs_no_counter() {
        let store = InMemoryRecordStore::new();
        store
            .create(&ShortCode::new_unchecked("a"), "https://example.com")
            .await
            .unwrap();
        let service = ShortenerService::new(store, UnavailableCounter);

        let code = service.shorten("https://example.com").await.unwrap();
        assert_eq!(code.as_str(), "a");
    }

    #[tokio::test]
    async fn lost_race_returns_winner_and_burns_the_number() {
        let store = RacingStore::default();
        store
            .inner
            .create(&ShortCode::new_unchecked("winner"), "https://example.com")
            .await
            .unwrap();
        let service = ShortenerService::new(store, InMemoryCounter::new());

        let code = service.shorten("https://example.com").await.unwrap();

        assert_eq!(code.as_str(), "winner");
        assert_eq!(service.counter().peek().await.unwrap(), 1);
        let burned = service
            .store()
            .inner
            .find_by_short_code(&ShortCode::new_unchecked("a"))
            .await
            .unwrap();
        assert!(burned.is_none());
    }

    #[tokio::test]
    async fn taken_code_is_an_integrity_error() {
        let store = InMemoryRecordStore::new();
        store
            .create(&ShortCode::new_unchecked("a"), "https://old.example")
            .await
            .unwrap();
        // a counter that was reset while the records survived
        let service = ShortenerService::new(store, InMemoryCounter::new());

        let err = service.shorten("https://new.example").await.unwrap_err();

        assert!(matches!(err, ShortenerError::DuplicateCode(ref c) if c == "a"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn failed_hit_does_not_fail_resolution() {
        let store = RacingStore {
            fail_hits: AtomicBool::new(true),
            ..Default::default()
        };
        let service = ShortenerService::new(store, InMemoryCounter::new());
        let code = service.shorten("https://example.com").await.unwrap();

        let url = service.resolve(code.as_str()).await.unwrap();

        assert_eq!(url, "https://example.com");
        assert_eq!(service.inspect(code.as_str()).await.unwrap().hits, 0);
        assert_eq!(service.pending_hits(), 1);
    }

    #[tokio::test]
    async fn kept_hits_are_replayed_once_the_store_recovers() {
        let store = RacingStore {
            fail_hits: AtomicBool::new(true),
            ..Default::default()
        };
        let service = ShortenerService::new(store, InMemoryCounter::new());
        let a = service.shorten("https://one.example").await.unwrap();
        let b = service.shorten("https://two.example").await.unwrap();

        for _ in 0..3 {
            service.resolve(a.as_str()).await.unwrap();
        }
        service.resolve(b.as_str()).await.unwrap();
        assert_eq!(service.pending_hits(), 4);
        assert_eq!(service.retry_pending_hits().await, 4);

        service.store().fail_hits.store(false, Ordering::SeqCst);
        service.resolve(a.as_str()).await.unwrap();

        assert_eq!(service.pending_hits(), 0);
        assert_eq!(service.inspect(a.as_str()).await.unwrap().hits, 4);
        assert_eq!(service.inspect(b.as_str()).await.unwrap().hits, 1);
    }

    #[tokio::test]
    async fn retry_pending_hits_drains_after_an_outage() {
        let store = RacingStore {
            fail_hits: AtomicBool::new(true),
            ..Default::default()
        };
        let service = ShortenerService::new(store, InMemoryCounter::new());
        let code = service.shorten("https://example.com").await.unwrap();

        service.resolve(code.as_str()).await.unwrap();
        service.resolve(code.as_str()).await.unwrap();

        service.store().fail_hits.store(false, Ordering::SeqCst);
        assert_eq!(service.retry_pending_hits().await, 0);
        assert_eq!(service.inspect(code.as_str()).await.unwrap().hits, 2);
    }

    #[tokio::test]
    async fn detached_hits_are_eventually_counted() {
        let settings = ShortenerSettings::builder()
            .hit_recording(HitRecording::Detached)
            .build();
        let service = ShortenerService::with_settings(
            InMemoryRecordStore::new(),
            InMemoryCounter::new(),
            settings,
        )
        .unwrap();
        let code = service.shorten("https://example.com").await.unwrap();

        for _ in 0..3 {
            service.resolve(code.as_str()).await.unwrap();
        }

        let mut hits = 0;
        for _ in 0..100 {
            hits = service.inspect(code.as_str()).await.unwrap().hits;
            if hits == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(hits, 3);
    }
}
