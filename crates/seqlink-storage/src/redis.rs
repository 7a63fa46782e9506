use async_trait::async_trait;
use redis::AsyncCommands;
use seqlink_core::counter::{Result, SequenceCounter, SequenceNumber};
use seqlink_core::CounterError;
use tracing::trace;

fn map_redis_error(operation: &str, err: redis::RedisError) -> CounterError {
    CounterError::Unavailable(format!("{operation}: {err}"))
}

/// A sequence counter stored in a single Redis key.
///
/// The key holds the number of values issued so far. `INCR` is atomic on the
/// server, so every caller gets a distinct value. Durability across Redis
/// restarts depends on the server's persistence settings (AOF with
/// `appendfsync always` for no loss).
#[derive(Debug, Clone)]
pub struct RedisCounter {
    conn: redis::aio::MultiplexedConnection,
    key: String,
}

impl RedisCounter {
    /// Creates a counter on `key` (e.g. "seqlink:links").
    pub fn with_key(conn: redis::aio::MultiplexedConnection, key: impl Into<String>) -> Self {
        Self {
            conn,
            key: key.into(),
        }
    }

    /// Opens a multiplexed connection and creates a counter on `key`.
    pub async fn connect(redis_url: &str, key: impl Into<String>) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| map_redis_error("invalid redis url", e))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| map_redis_error("failed to connect to redis", e))?;
        Ok(Self::with_key(conn, key))
    }
}

#[async_trait]
impl SequenceCounter for RedisCounter {
    async fn next(&self) -> Result<SequenceNumber> {
        let mut conn = self.conn.clone();
        let issued_so_far: u64 = conn
            .incr(&self.key, 1_u64)
            .await
            .map_err(|e| map_redis_error("failed to increment counter", e))?;

        let issued = issued_so_far.checked_sub(1).ok_or_else(|| {
            CounterError::Unavailable(format!("counter '{}' returned zero", self.key))
        })?;
        trace!(key = %self.key, issued, "issued sequence number");
        Ok(issued)
    }

    async fn peek(&self) -> Result<SequenceNumber> {
        let mut conn = self.conn.clone();
        let issued_so_far: Option<u64> = conn
            .get(&self.key)
            .await
            .map_err(|e| map_redis_error("failed to read counter", e))?;

        Ok(issued_so_far.unwrap_or(0))
    }
}

