use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use time::Date;
use uuid::Uuid;

use super::ApiError;
use crate::state::AppState;
use innsync_core::entities::StaySource;
use innsync_core::lifecycle::{CreateStay, GuestRef, ModifyStay};

#[derive(Debug, Deserialize)]
pub(super) struct CreateStayRequest {
    room_id: Uuid,
    /// Either an existing guest id or contact details for find-or-create.
    guest_id: Option<Uuid>,
    guest_name: Option<String>,
    guest_phone: Option<String>,
    guest_email: Option<String>,
    check_in: Date,
    check_out: Date,
    #[serde(default = "default_adults")]
    adults: i32,
    #[serde(default)]
    children: i32,
    rate_rule_id: Option<Uuid>,
    /// Explicit total in minor units, overriding rate resolution.
    total_minor: Option<i64>,
    #[serde(default)]
    actor: Option<String>,
}

fn default_adults() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub(super) struct ModifyStayRequest {
    room_id: Option<Uuid>,
    check_in: Option<Date>,
    check_out: Option<Date>,
    adults: Option<i32>,
    children: Option<i32>,
    total_minor: Option<i64>,
    #[serde(default)]
    actor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CancelRequest {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    actor: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct TransitionRequest {
    #[serde(default)]
    actor: Option<String>,
}

/// `POST /stays` — create a direct stay.
pub(super) async fn create_stay(
    State(state): State<AppState>,
    Json(body): Json<CreateStayRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let guest = match (body.guest_id, body.guest_name) {
        (Some(id), _) => GuestRef::Id(id),
        (None, Some(full_name)) => GuestRef::Contact {
            full_name,
            phone: body.guest_phone,
            email: body.guest_email,
        },
        (None, None) => {
            return Err(ApiError::bad_request(
                "GUEST_REQUIRED",
                "either guest_id or guest_name must be provided",
            ));
        }
    };

    let details = state
        .service
        .create(CreateStay {
            property_id: state.property_id(),
            room_id: body.room_id,
            guest,
            check_in: body.check_in,
            check_out: body.check_out,
            adults: body.adults,
            children: body.children,
            rate_rule_id: body.rate_rule_id,
            total_override_minor: body.total_minor,
            source: StaySource::Direct,
            channel_id: None,
            external_ref: None,
            actor: actor_or_default(body.actor),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(details)))
}

/// `GET /stays/{stay_id}` — full stay record with sub-objects.
pub(super) async fn get_stay(
    State(state): State<AppState>,
    Path(stay_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let details = state.service.details(stay_id).await?;
    Ok(Json(details))
}

/// `PATCH /stays/{stay_id}` — modify room, dates, occupants, or price.
pub(super) async fn modify_stay(
    State(state): State<AppState>,
    Path(stay_id): Path<Uuid>,
    Json(body): Json<ModifyStayRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let details = state
        .service
        .modify(
            stay_id,
            ModifyStay {
                room_id: body.room_id,
                check_in: body.check_in,
                check_out: body.check_out,
                adults: body.adults,
                children: body.children,
                total_override_minor: body.total_minor,
                actor: actor_or_default(body.actor),
            },
        )
        .await?;
    Ok(Json(details))
}

/// `POST /stays/{stay_id}/cancel`
pub(super) async fn cancel_stay(
    State(state): State<AppState>,
    Path(stay_id): Path<Uuid>,
    Json(body): Json<CancelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let details = state
        .service
        .cancel(stay_id, body.reason, actor_or_default(body.actor))
        .await?;
    Ok(Json(details))
}

/// `POST /stays/{stay_id}/check-in`
pub(super) async fn check_in_stay(
    State(state): State<AppState>,
    Path(stay_id): Path<Uuid>,
    Json(body): Json<TransitionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let details = state
        .service
        .check_in(stay_id, actor_or_default(body.actor))
        .await?;
    Ok(Json(details))
}

/// `POST /stays/{stay_id}/check-out`
pub(super) async fn check_out_stay(
    State(state): State<AppState>,
    Path(stay_id): Path<Uuid>,
    Json(body): Json<TransitionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let details = state
        .service
        .check_out(stay_id, actor_or_default(body.actor))
        .await?;
    Ok(Json(details))
}

fn actor_or_default(actor: Option<String>) -> String {
    actor.unwrap_or_else(|| "api".to_string())
}
