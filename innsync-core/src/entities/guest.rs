use serde::Serialize;
use uuid::Uuid;

/// A guest record, deduplicated by phone number within a property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Guest {
    pub id: Uuid,
    pub property_id: Uuid,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl Guest {
    pub async fn get_by_id(
        exec: impl sqlx::PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Guest>, sqlx::Error> {
        sqlx::query_as::<_, Guest>(
            "SELECT id, property_id, full_name, phone, email FROM guests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(exec)
        .await
    }

    pub async fn find_by_phone(
        exec: impl sqlx::PgExecutor<'_>,
        property_id: Uuid,
        phone: &str,
    ) -> Result<Option<Guest>, sqlx::Error> {
        sqlx::query_as::<_, Guest>(
            "SELECT id, property_id, full_name, phone, email \
             FROM guests WHERE property_id = $1 AND phone = $2 \
             ORDER BY created_at LIMIT 1",
        )
        .bind(property_id)
        .bind(phone)
        .fetch_optional(exec)
        .await
    }

    pub async fn insert(
        exec: impl sqlx::PgExecutor<'_>,
        property_id: Uuid,
        full_name: &str,
        phone: Option<&str>,
        email: Option<&str>,
    ) -> Result<Guest, sqlx::Error> {
        sqlx::query_as::<_, Guest>(
            "INSERT INTO guests (property_id, full_name, phone, email) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, property_id, full_name, phone, email",
        )
        .bind(property_id)
        .bind(full_name)
        .bind(phone)
        .bind(email)
        .fetch_one(exec)
        .await
    }
}
