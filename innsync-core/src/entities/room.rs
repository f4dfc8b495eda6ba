use serde::Serialize;
use uuid::Uuid;

/// A physical room. Referenced, never mutated, by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Room {
    pub id: Uuid,
    pub property_id: Uuid,
    pub name: String,
    pub capacity: i32,
    /// Base nightly price in minor currency units.
    pub base_price_minor: i64,
    pub status: RoomStatus,
}

/// Operational status; only `active` rooms are bookable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "room_status")]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Active,
    Maintenance,
    Inactive,
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoomStatus::Active => write!(f, "active"),
            RoomStatus::Maintenance => write!(f, "maintenance"),
            RoomStatus::Inactive => write!(f, "inactive"),
        }
    }
}

impl Room {
    pub fn is_bookable(&self) -> bool {
        self.status == RoomStatus::Active
    }

    pub async fn get_by_id(
        exec: impl sqlx::PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Room>, sqlx::Error> {
        sqlx::query_as::<_, Room>(
            "SELECT id, property_id, name, capacity, base_price_minor, status \
             FROM rooms WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(exec)
        .await
    }
}
