use serde::Serialize;
use uuid::Uuid;

/// An external sales platform (OTA) with its own inventory view of the
/// property's rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Channel {
    pub id: Uuid,
    pub property_id: Uuid,
    pub name: String,
    /// Shared HMAC secret for webhook verification and outbound job signing.
    #[serde(skip_serializing)]
    pub secret: Option<String>,
    /// Endpoint receiving outbound close/open-dates jobs.
    pub push_url: Option<String>,
    /// Polled calendar feed, when the channel only speaks iCal.
    pub ical_url: Option<String>,
    pub active: bool,
}

/// The link between an internal room and its listing on one channel.
///
/// Used outbound (room -> external listing id to target) and inbound
/// (external listing id -> room).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct ChannelMapping {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub room_id: Uuid,
    pub external_listing_id: String,
}

impl Channel {
    pub async fn get_by_id(
        exec: impl sqlx::PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<Channel>, sqlx::Error> {
        sqlx::query_as::<_, Channel>(
            "SELECT id, property_id, name, secret, push_url, ical_url, active \
             FROM channels WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(exec)
        .await
    }

    /// Active channels with a polled calendar feed.
    pub async fn active_with_feed(
        exec: impl sqlx::PgExecutor<'_>,
    ) -> Result<Vec<Channel>, sqlx::Error> {
        sqlx::query_as::<_, Channel>(
            "SELECT id, property_id, name, secret, push_url, ical_url, active \
             FROM channels WHERE active AND ical_url IS NOT NULL",
        )
        .fetch_all(exec)
        .await
    }

    pub async fn insert(
        exec: impl sqlx::PgExecutor<'_>,
        property_id: Uuid,
        name: &str,
        secret: Option<&str>,
        push_url: Option<&str>,
        ical_url: Option<&str>,
    ) -> Result<Channel, sqlx::Error> {
        sqlx::query_as::<_, Channel>(
            "INSERT INTO channels (property_id, name, secret, push_url, ical_url) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, property_id, name, secret, push_url, ical_url, active",
        )
        .bind(property_id)
        .bind(name)
        .bind(secret)
        .bind(push_url)
        .bind(ical_url)
        .fetch_one(exec)
        .await
    }
}

impl ChannelMapping {
    /// Resolve an inbound external listing id to its mapping.
    pub async fn find_by_listing(
        exec: impl sqlx::PgExecutor<'_>,
        channel_id: Uuid,
        external_listing_id: &str,
    ) -> Result<Option<ChannelMapping>, sqlx::Error> {
        sqlx::query_as::<_, ChannelMapping>(
            "SELECT id, channel_id, room_id, external_listing_id \
             FROM channel_mappings WHERE channel_id = $1 AND external_listing_id = $2",
        )
        .bind(channel_id)
        .bind(external_listing_id)
        .fetch_optional(exec)
        .await
    }

    pub async fn insert(
        exec: impl sqlx::PgExecutor<'_>,
        channel_id: Uuid,
        room_id: Uuid,
        external_listing_id: &str,
    ) -> Result<ChannelMapping, sqlx::Error> {
        sqlx::query_as::<_, ChannelMapping>(
            "INSERT INTO channel_mappings (channel_id, room_id, external_listing_id) \
             VALUES ($1, $2, $3) \
             RETURNING id, channel_id, room_id, external_listing_id",
        )
        .bind(channel_id)
        .bind(room_id)
        .bind(external_listing_id)
        .fetch_one(exec)
        .await
    }

    /// All listings mapped on one channel.
    pub async fn for_channel(
        exec: impl sqlx::PgExecutor<'_>,
        channel_id: Uuid,
    ) -> Result<Vec<ChannelMapping>, sqlx::Error> {
        sqlx::query_as::<_, ChannelMapping>(
            "SELECT id, channel_id, room_id, external_listing_id \
             FROM channel_mappings WHERE channel_id = $1",
        )
        .bind(channel_id)
        .fetch_all(exec)
        .await
    }

    /// Outbound fan-out targets: every active channel of the property mapped
    /// to this room, excluding the channel the triggering event came from.
    pub async fn fanout_targets(
        exec: impl sqlx::PgExecutor<'_>,
        property_id: Uuid,
        room_id: Uuid,
        exclude_channel_id: Option<Uuid>,
    ) -> Result<Vec<(ChannelMapping, Channel)>, sqlx::Error> {
        let rows: Vec<FanoutRow> = sqlx::query_as::<_, FanoutRow>(
            "SELECT m.id AS mapping_id, m.channel_id, m.room_id, m.external_listing_id, \
                 c.property_id, c.name, c.secret, c.push_url, c.ical_url, c.active \
             FROM channel_mappings m \
             JOIN channels c ON c.id = m.channel_id \
             WHERE c.property_id = $1 AND m.room_id = $2 AND c.active \
               AND ($3::uuid IS NULL OR m.channel_id <> $3)",
        )
        .bind(property_id)
        .bind(room_id)
        .bind(exclude_channel_id)
        .fetch_all(exec)
        .await?;
        Ok(rows.into_iter().map(FanoutRow::split).collect())
    }
}

#[derive(sqlx::FromRow)]
struct FanoutRow {
    mapping_id: Uuid,
    channel_id: Uuid,
    room_id: Uuid,
    external_listing_id: String,
    property_id: Uuid,
    name: String,
    secret: Option<String>,
    push_url: Option<String>,
    ical_url: Option<String>,
    active: bool,
}

impl FanoutRow {
    fn split(self) -> (ChannelMapping, Channel) {
        (
            ChannelMapping {
                id: self.mapping_id,
                channel_id: self.channel_id,
                room_id: self.room_id,
                external_listing_id: self.external_listing_id,
            },
            Channel {
                id: self.channel_id,
                property_id: self.property_id,
                name: self.name,
                secret: self.secret,
                push_url: self.push_url,
                ical_url: self.ical_url,
                active: self.active,
            },
        )
    }
}
