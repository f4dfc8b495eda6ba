use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use super::ApiError;
use crate::state::AppState;
use innsync_core::entities::{Channel, ChannelMapping};
use innsync_sdk::signature::SIGNATURE_HEADER;

#[derive(Debug, Deserialize)]
pub(super) struct CreateChannelRequest {
    name: String,
    #[serde(default)]
    secret: Option<String>,
    #[serde(default)]
    push_url: Option<String>,
    #[serde(default)]
    ical_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateMappingRequest {
    room_id: Uuid,
    external_listing_id: String,
}

/// `POST /channels` — register an external sales channel.
pub(super) async fn create_channel(
    State(state): State<AppState>,
    Json(body): Json<CreateChannelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let channel = Channel::insert(
        &state.db,
        state.property_id(),
        &body.name,
        body.secret.as_deref(),
        body.push_url.as_deref(),
        body.ical_url.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(channel)))
}

/// `POST /channels/{channel_id}/mappings` — link a room to a listing.
pub(super) async fn create_mapping(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    Json(body): Json<CreateMappingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    Channel::get_by_id(&state.db, channel_id)
        .await?
        .ok_or_else(|| {
            ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", "channel not found")
        })?;

    let mapping =
        ChannelMapping::insert(&state.db, channel_id, body.room_id, &body.external_listing_id)
            .await?;
    Ok((StatusCode::CREATED, Json(mapping)))
}

/// `POST /channels/{channel_id}/webhook` — inbound OTA event.
///
/// Takes the body as raw bytes: the HMAC covers the bytes exactly as the
/// channel sent them, so the body must not pass through a JSON extractor
/// before verification.
pub(super) async fn inbound_webhook(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state
        .inbound
        .handle_webhook(channel_id, signature, &body)
        .await?;

    Ok(Json(outcome))
}
