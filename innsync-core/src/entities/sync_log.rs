use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Append-only record of one attempted cross-channel propagation.
///
/// Outbound entries double as the durable job outbox: the stay transaction
/// inserts them as `pending` and the sync worker transitions them to
/// `success` or `error`. Nothing else is ever mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct SyncLogEntry {
    pub id: Uuid,
    pub property_id: Uuid,
    pub channel_id: Uuid,
    pub stay_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub direction: SyncDirection,
    pub event_type: String,
    pub status: SyncStatus,
    pub payload: serde_json::Value,
    pub error_message: Option<String>,
    pub attempts: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "sync_direction")]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    Outbound,
    Inbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "sync_status")]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Success,
    Error,
}

const LOG_COLUMNS: &str = "id, property_id, channel_id, stay_id, room_id, direction, \
     event_type, status, payload, error_message, attempts, created_at, updated_at";

impl SyncLogEntry {
    /// Insert a pending outbound job (the outbox row).
    pub async fn insert_outbound_pending(
        exec: impl sqlx::PgExecutor<'_>,
        property_id: Uuid,
        channel_id: Uuid,
        stay_id: Uuid,
        room_id: Uuid,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<SyncLogEntry, sqlx::Error> {
        sqlx::query_as::<_, SyncLogEntry>(&format!(
            "INSERT INTO sync_log (property_id, channel_id, stay_id, room_id, direction, \
                 event_type, payload) \
             VALUES ($1, $2, $3, $4, 'outbound', $5, $6) \
             RETURNING {LOG_COLUMNS}"
        ))
        .bind(property_id)
        .bind(channel_id)
        .bind(stay_id)
        .bind(room_id)
        .bind(event_type)
        .bind(payload)
        .fetch_one(exec)
        .await
    }

    /// Record a processed inbound event (already final).
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_inbound(
        exec: impl sqlx::PgExecutor<'_>,
        property_id: Uuid,
        channel_id: Uuid,
        stay_id: Option<Uuid>,
        room_id: Option<Uuid>,
        event_type: &str,
        status: SyncStatus,
        payload: serde_json::Value,
        error_message: Option<&str>,
    ) -> Result<SyncLogEntry, sqlx::Error> {
        sqlx::query_as::<_, SyncLogEntry>(&format!(
            "INSERT INTO sync_log (property_id, channel_id, stay_id, room_id, direction, \
                 event_type, status, payload, error_message, attempts) \
             VALUES ($1, $2, $3, $4, 'inbound', $5, $6, $7, $8, 1) \
             RETURNING {LOG_COLUMNS}"
        ))
        .bind(property_id)
        .bind(channel_id)
        .bind(stay_id)
        .bind(room_id)
        .bind(event_type)
        .bind(status)
        .bind(payload)
        .bind(error_message)
        .fetch_one(exec)
        .await
    }

    /// Claim outbound jobs due for (re-)delivery.
    ///
    /// One atomic statement: the inner `FOR UPDATE SKIP LOCKED` select keeps
    /// concurrent sweeps off the same rows, and the update stamps the attempt
    /// counter and `updated_at` before the statement's implicit transaction
    /// commits. No row lock survives the claim, so the caller is free to make
    /// network calls with the returned entries. A worker crash between claim
    /// and outcome leaves the row `pending` with its backoff already
    /// advanced; an entry is due when it has never been tried or its
    /// exponential backoff has elapsed.
    pub async fn claim_due_outbound(
        exec: impl sqlx::PgExecutor<'_>,
        max_attempts: i32,
        limit: i64,
    ) -> Result<Vec<SyncLogEntry>, sqlx::Error> {
        sqlx::query_as::<_, SyncLogEntry>(&claim_due_sql())
            .bind(max_attempts)
            .bind(limit)
            .fetch_all(exec)
            .await
    }

    pub async fn mark_success(
        exec: impl sqlx::PgExecutor<'_>,
        id: Uuid,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE sync_log SET status = 'success', updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(exec)
            .await?;
        Ok(())
    }

    /// Record a failed delivery attempt. The attempt itself was counted at
    /// claim time; this only stores the error and finalizes the entry to
    /// `error` once the attempt cap is reached.
    pub async fn mark_attempt_failed(
        exec: impl sqlx::PgExecutor<'_>,
        id: Uuid,
        max_attempts: i32,
        error_message: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE sync_log SET \
                 error_message = $3, \
                 status = CASE WHEN attempts >= $2 THEN 'error'::sync_status \
                               ELSE 'pending'::sync_status END, \
                 updated_at = now() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(max_attempts)
        .bind(error_message)
        .execute(exec)
        .await?;
        Ok(())
    }
}

fn claim_due_sql() -> String {
    format!(
        "UPDATE sync_log SET attempts = attempts + 1, updated_at = now() \
         WHERE id IN ( \
             SELECT id FROM sync_log \
             WHERE direction = 'outbound' AND status = 'pending' AND attempts < $1 \
               AND (attempts = 0 OR \
                    updated_at + make_interval(secs => least(2 ^ attempts, 300)) <= now()) \
             ORDER BY created_at \
             LIMIT $2 \
             FOR UPDATE SKIP LOCKED \
         ) \
         RETURNING {LOG_COLUMNS}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mirror of the backoff the claim statement computes in SQL
    /// (`least(2 ^ attempts, 300)`); exists only to pin that SQL.
    fn retry_delay(attempts: i32) -> std::time::Duration {
        let exp = u32::try_from(attempts).unwrap_or(u32::MAX).min(63);
        let seconds = 2u64.saturating_pow(exp).min(300);
        std::time::Duration::from_secs(seconds)
    }

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(retry_delay(0), std::time::Duration::from_secs(1));
        assert_eq!(retry_delay(1), std::time::Duration::from_secs(2));
        assert_eq!(retry_delay(3), std::time::Duration::from_secs(8));
        assert_eq!(retry_delay(8), std::time::Duration::from_secs(256));
        // 2^9 = 512 exceeds the cap.
        assert_eq!(retry_delay(9), std::time::Duration::from_secs(300));
        assert_eq!(retry_delay(100), std::time::Duration::from_secs(300));
        assert!(claim_due_sql().contains("least(2 ^ attempts, 300)"));
    }

    #[test]
    fn claim_counts_the_attempt_and_releases_its_locks() {
        let sql = claim_due_sql();
        // The bump lives in the claim itself, so delivery runs lock-free and
        // a crash before the outcome still advances the backoff.
        assert!(sql.trim_start().starts_with("UPDATE sync_log SET attempts = attempts + 1"));
        assert!(sql.contains("FOR UPDATE SKIP LOCKED"));
        assert!(sql.contains("RETURNING"));
    }
}
