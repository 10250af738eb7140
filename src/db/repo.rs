//! Repository layer for database operations.

use crate::domain::{Address, Claim, TimeMs, Username};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::warn;

/// Repository for claims and rate-limit bookkeeping.
#[derive(Debug)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    // =========================================================================
    // Claim operations
    // =========================================================================

    /// Insert a claim. Returns false when the username is already taken;
    /// uniqueness is enforced by the primary key, not a read-then-write.
    pub async fn insert_claim(&self, claim: &Claim) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO claims (username, wallet_address, claimed_at, thankyou_message)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(username) DO NOTHING",
        )
        .bind(claim.username.as_str())
        .bind(claim.wallet_address.as_str())
        .bind(claim.claimed_at.to_rfc3339())
        .bind(claim.thankyou_message.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_claim(&self, username: &Username) -> Result<Option<Claim>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT username, wallet_address, claimed_at, thankyou_message
             FROM claims WHERE username = ?",
        )
        .bind(username.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let username_raw: String = row.get("username");
        let wallet_raw: String = row.get("wallet_address");
        let claimed_at_raw: String = row.get("claimed_at");
        let thankyou_message: Option<String> = row.get("thankyou_message");

        // Stored rows passed validation on the way in; a row that no longer
        // parses is corruption worth flagging, not a silent None.
        let username = match Username::parse(&username_raw) {
            Ok(u) => u,
            Err(e) => {
                warn!(username = %username_raw, error = %e, "corrupt claim row");
                return Ok(None);
            }
        };
        let wallet_address = match Address::parse(&wallet_raw) {
            Ok(a) => a,
            Err(e) => {
                warn!(address = %wallet_raw, error = %e, "corrupt claim row");
                return Ok(None);
            }
        };
        let claimed_at = DateTime::parse_from_rfc3339(&claimed_at_raw)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Some(Claim {
            username,
            wallet_address,
            claimed_at,
            thankyou_message,
        }))
    }

    // =========================================================================
    // Rate-limit operations
    // =========================================================================

    /// Record one event for `key_hash` and return how many events the key
    /// has inside the window, pruning everything older.
    pub async fn record_rate_event(
        &self,
        key_hash: &str,
        now: TimeMs,
        window_start: TimeMs,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query("DELETE FROM rate_events WHERE key_hash = ? AND at_ms < ?")
            .bind(key_hash)
            .bind(window_start.as_ms())
            .execute(&self.pool)
            .await?;

        sqlx::query("INSERT INTO rate_events (key_hash, at_ms) VALUES (?, ?)")
            .bind(key_hash)
            .bind(now.as_ms())
            .execute(&self.pool)
            .await?;

        let row = sqlx::query("SELECT COUNT(*) AS n FROM rate_events WHERE key_hash = ?")
            .bind(key_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("n"))
    }
}
