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
use innsync_core::calendar::DateRange;
use innsync_core::rates;

#[derive(Debug, Deserialize)]
pub(super) struct RateQuery {
    check_in: Date,
    check_out: Date,
    /// Pin a specific rule, bypassing priority selection.
    rule_id: Option<Uuid>,
}

/// `GET /rooms/{room_id}/rates` — per-night price breakdown for the range.
pub(super) async fn room_rates(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<RateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let range = DateRange::new(query.check_in, query.check_out)?;

    let mut conn = state.db.acquire().await?;
    let quote = rates::quote_room(&mut conn, room_id, range, query.rule_id).await?;

    Ok(Json(quote))
}
