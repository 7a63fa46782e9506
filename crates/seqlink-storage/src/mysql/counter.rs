use async_trait::async_trait;
use seqlink_core::counter::{Result, SequenceCounter, SequenceNumber};
use seqlink_core::CounterError;
use sqlx::MySqlPool;
use tracing::trace;

/// A named counter row in the `sequence_counters` table.
///
/// `next` is one `UPDATE ... SET next_value = LAST_INSERT_ID(next_value + 1)`.
/// The row lock serializes concurrent callers across every process sharing
/// the database, and the incremented value comes back in the statement's
/// OK packet, so no second query (and no pinned connection) is needed.
#[derive(Debug, Clone)]
pub struct MySqlCounter {
    pool: MySqlPool,
    name: String,
}

fn unavailable(err: sqlx::Error) -> CounterError {
    CounterError::Unavailable(err.to_string())
}

impl MySqlCounter {
    /// Opens the named counter, creating its row at zero if it is missing.
    ///
    /// An existing row is left untouched, so reopening resumes where the
    /// previous process stopped.
    pub async fn open(pool: MySqlPool, name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        sqlx::query(
            r#"
            INSERT IGNORE INTO sequence_counters (name, next_value)
            VALUES (?, 0)
            "#,
        )
        .bind(&name)
        .execute(&pool)
        .await
        .map_err(unavailable)?;

        Ok(Self { pool, name })
    }
}

#[async_trait]
impl SequenceCounter for MySqlCounter {
    async fn next(&self) -> Result<SequenceNumber> {
        let result = sqlx::query(
            r#"
            UPDATE sequence_counters
            SET next_value = LAST_INSERT_ID(next_value + 1)
            WHERE name = ?
            "#,
        )
        .bind(&self.name)
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() != 1 {
            return Err(CounterError::Unavailable(format!(
                "counter '{}' does not exist",
                self.name
            )));
        }

        // LAST_INSERT_ID now holds the incremented value; the issued one is
        // just below it.
        let issued = result.last_insert_id().checked_sub(1).ok_or_else(|| {
            CounterError::Unavailable(format!("counter '{}' reported no increment", self.name))
        })?;
        trace!(counter = %self.name, issued, "issued sequence number");
        Ok(issued)
    }

    async fn peek(&self) -> Result<SequenceNumber> {
        let next: Option<u64> = sqlx::query_scalar(
            r#"
            SELECT next_value
            FROM sequence_counters
            WHERE name = ?
            "#,
        )
        .bind(&self.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        next.ok_or_else(|| {
            CounterError::Unavailable(format!("counter '{}' does not exist", self.name))
        })
    }
}
