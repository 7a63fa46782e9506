use super::{is_unique_violation, map_sqlx_error};
use async_trait::async_trait;
use jiff::Timestamp;
use seqlink_core::store::{Insertion, Record, RecordStore, Result};
use seqlink_core::{ShortCode, StorageError};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use tracing::debug;

/// Width of the `short_urls.long_url` column.
const MAX_URL_LEN: usize = 2048;

/// Whether `long_url` fits the ASCII `long_url` column.
fn fits_url_column(long_url: &str) -> bool {
    long_url.is_ascii() && long_url.len() <= MAX_URL_LEN
}

/// MySQL implementation of the record store contract.
///
/// `short_urls` carries a unique key on both `short_code` and `long_url`, so
/// a single `INSERT` writes the forward and reverse entries atomically and a
/// racing writer for the same URL is rejected by the database rather than
/// by an application lock. Both columns use a binary ASCII collation; URLs
/// must be percent-encoded before they reach the store.
#[derive(Debug, Clone)]
pub struct MySqlRecordStore {
    pool: MySqlPool,
}

impl MySqlRecordStore {
    /// Creates a store from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a store by opening a new MySQL connection pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = MySqlPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool))
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    async fn find_record_by_long_url(&self, long_url: &str) -> Result<Option<Record>> {
        let row = sqlx::query(
            r#"
            SELECT short_code, long_url, hits, created_at
            FROM short_urls
            WHERE long_url = ?
            LIMIT 1
            "#,
        )
        .bind(long_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(record_from_row).transpose()
    }
}

fn parse_created_at(seconds: i64) -> Result<Timestamp> {
    Timestamp::from_second(seconds).map_err(|e| {
        StorageError::InvalidData(format!("invalid created_at timestamp '{}': {e}", seconds))
    })
}

fn record_from_row(row: &MySqlRow) -> Result<Record> {
    let code: String = row.try_get("short_code").map_err(map_sqlx_error)?;
    let long_url: String = row.try_get("long_url").map_err(map_sqlx_error)?;
    let hits: u64 = row.try_get("hits").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;

    Ok(Record {
        code: ShortCode::new_unchecked(code),
        long_url,
        hits,
        created_at: parse_created_at(created_at)?,
    })
}

#[async_trait]
impl RecordStore for MySqlRecordStore {
    async fn find_by_long_url(&self, long_url: &str) -> Result<Option<ShortCode>> {
        if !fits_url_column(long_url) {
            return Ok(None);
        }

        let code: Option<String> = sqlx::query_scalar(
            r#"
            SELECT short_code
            FROM short_urls
            WHERE long_url = ?
            LIMIT 1
            "#,
        )
        .bind(long_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(code.map(ShortCode::new_unchecked))
    }

    async fn find_by_short_code(&self, code: &ShortCode) -> Result<Option<Record>> {
        let row = sqlx::query(
            r#"
            SELECT short_code, long_url, hits, created_at
            FROM short_urls
            WHERE short_code = ?
            LIMIT 1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn create(&self, code: &ShortCode, long_url: &str) -> Result<Insertion> {
        if !fits_url_column(long_url) {
            return Err(StorageError::Unsupported(format!(
                "url must be ASCII and at most {MAX_URL_LEN} bytes; percent-encode it first"
            )));
        }

        let created_at = parse_created_at(Timestamp::now().as_second())?;

        let result = sqlx::query(
            r#"
            INSERT INTO short_urls (short_code, long_url, hits, created_at)
            VALUES (?, ?, 0, ?)
            "#,
        )
        .bind(code.as_str())
        .bind(long_url)
        .bind(created_at.as_second())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(Insertion::Created(Record {
                code: code.clone(),
                long_url: long_url.to_owned(),
                hits: 0,
                created_at,
            })),
            Err(err) if is_unique_violation(&err) => {
                // Either key may have collided; the URL key is the expected one.
                if let Some(winner) = self.find_record_by_long_url(long_url).await? {
                    debug!(code = %code, winner = %winner.code, "url already mapped");
                    return Ok(Insertion::Existing(winner));
                }
                Err(StorageError::DuplicateCode(code.to_string()))
            }
            Err(err) => Err(map_sqlx_error(err)),
        }
    }

    async fn increment_hit(&self, code: &ShortCode) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE short_urls
            SET hits = hits + 1
            WHERE short_code = ?
            "#,
        )
        .bind(code.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
