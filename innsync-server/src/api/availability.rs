use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use time::Date;
use uuid::Uuid;

use super::ApiError;
use crate::state::AppState;
use innsync_core::availability;
use innsync_core::calendar::DateRange;

#[derive(Debug, Deserialize)]
pub(super) struct AvailabilityQuery {
    check_in: Date,
    check_out: Date,
    /// Excluded from the overlap check, so a modify preview does not report
    /// the stay as conflicting with itself.
    exclude_stay: Option<Uuid>,
}

/// `GET /rooms/{room_id}/availability` — is the room free over the range?
pub(super) async fn room_availability(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let range = DateRange::new(query.check_in, query.check_out)?;

    let mut conn = state.db.acquire().await?;
    let availability =
        availability::check_room(&mut conn, room_id, range, query.exclude_stay).await?;

    Ok(Json(availability))
}
