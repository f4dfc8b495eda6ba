use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Append-only audit trail: exactly one row per lifecycle transition,
/// written in the same transaction as the stay mutation.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct StayHistory {
    pub id: Uuid,
    pub stay_id: Uuid,
    pub action: HistoryAction,
    /// Old/new pairs for every changed field, `{"field": {"old": .., "new": ..}}`.
    pub changes: serde_json::Value,
    pub actor: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, sqlx::Type)]
#[sqlx(rename_all = "snake_case", type_name = "history_action")]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    Modified,
    Cancelled,
    CheckedIn,
    CheckedOut,
}

impl StayHistory {
    pub async fn append(
        exec: impl sqlx::PgExecutor<'_>,
        stay_id: Uuid,
        action: HistoryAction,
        changes: serde_json::Value,
        actor: &str,
    ) -> Result<StayHistory, sqlx::Error> {
        sqlx::query_as::<_, StayHistory>(
            "INSERT INTO stay_history (stay_id, action, changes, actor) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, stay_id, action, changes, actor, created_at",
        )
        .bind(stay_id)
        .bind(action)
        .bind(changes)
        .bind(actor)
        .fetch_one(exec)
        .await
    }

    pub async fn for_stay(
        exec: impl sqlx::PgExecutor<'_>,
        stay_id: Uuid,
    ) -> Result<Vec<StayHistory>, sqlx::Error> {
        sqlx::query_as::<_, StayHistory>(
            "SELECT id, stay_id, action, changes, actor, created_at \
             FROM stay_history WHERE stay_id = $1 ORDER BY created_at",
        )
        .bind(stay_id)
        .fetch_all(exec)
        .await
    }
}
