//! HTTP API handlers.
//!
//! # Endpoints
//!
//! - `GET   /rooms/{room_id}/availability` – availability over a date range
//! - `GET   /rooms/{room_id}/rates`        – rate quote for a date range
//! - `POST  /stays`                        – create a stay
//! - `GET   /stays/{stay_id}`              – full stay record
//! - `PATCH /stays/{stay_id}`              – modify room/dates/occupants/price
//! - `POST  /stays/{stay_id}/cancel`       – cancel
//! - `POST  /stays/{stay_id}/check-in`     – check in
//! - `POST  /stays/{stay_id}/check-out`    – check out
//! - `POST  /channels`                     – register a channel
//! - `POST  /channels/{channel_id}/mappings` – map a room to a listing
//! - `POST  /channels/{channel_id}/webhook`  – inbound OTA webhook
//! - `POST  /pricing-rules`                – create a pricing rule
//!
//! Authentication is expected to sit in front of this service; handlers
//! take the acting identity from the request body's `actor` field.

use axum::{
    Json, Router,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;

use crate::state::AppState;
use innsync_core::availability::AvailabilityError;
use innsync_core::calendar::InvalidDateRange;
use innsync_core::lifecycle::StayError;
use innsync_core::processors::SyncError;
use innsync_core::rates::RateError;

mod availability;
mod channels;
mod pricing_rules;
mod rates;
mod stays;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/rooms/{room_id}/availability",
            get(availability::room_availability),
        )
        .route("/rooms/{room_id}/rates", get(rates::room_rates))
        .route("/stays", post(stays::create_stay))
        .route(
            "/stays/{stay_id}",
            get(stays::get_stay).patch(stays::modify_stay),
        )
        .route("/stays/{stay_id}/cancel", post(stays::cancel_stay))
        .route("/stays/{stay_id}/check-in", post(stays::check_in_stay))
        .route("/stays/{stay_id}/check-out", post(stays::check_out_stay))
        .route("/channels", post(channels::create_channel))
        .route(
            "/channels/{channel_id}/mappings",
            post(channels::create_mapping),
        )
        .route(
            "/channels/{channel_id}/webhook",
            post(channels::inbound_webhook),
        )
        .route("/pricing-rules", post(pricing_rules::create_rule))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// API error response: HTTP status plus a stable machine-readable code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, code, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, message = %self.message, "API error");
        }
        (
            self.status,
            Json(ErrorBody {
                code: self.code,
                message: &self.message,
                details: self.details.as_ref(),
            }),
        )
            .into_response()
    }
}

/// HTTP status for each stable error code.
fn status_for(code: &str) -> StatusCode {
    match code {
        "NOT_FOUND" | "RATE_NOT_FOUND" => StatusCode::NOT_FOUND,
        "OVERBOOKING_DETECTED"
        | "RATE_CONFLICT"
        | "ALREADY_EXISTS"
        | "STAY_IMMUTABLE"
        | "INVALID_STATUS_TRANSITION"
        | "ROOM_NOT_BOOKABLE"
        | "CHANNEL_INACTIVE" => StatusCode::CONFLICT,
        "WEBHOOK_SIGNATURE_INVALID" => StatusCode::UNAUTHORIZED,
        "WEBHOOK_PAYLOAD_INVALID" => StatusCode::BAD_REQUEST,
        "DATABASE_ERROR" => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

impl From<StayError> for ApiError {
    fn from(err: StayError) -> Self {
        let code = err.code();
        let details = match &err {
            StayError::Overbooking { blocked_dates, .. } => Some(serde_json::json!({
                "blocked_dates": blocked_dates
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>(),
            })),
            _ => None,
        };
        Self {
            status: status_for(code),
            code,
            message: err.to_string(),
            details,
        }
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Stay(stay_err) => stay_err.into(),
            other => Self::new(status_for(other.code()), other.code(), other.to_string()),
        }
    }
}

impl From<RateError> for ApiError {
    fn from(err: RateError) -> Self {
        Self::new(status_for(err.code()), err.code(), err.to_string())
    }
}

impl From<AvailabilityError> for ApiError {
    fn from(err: AvailabilityError) -> Self {
        match err {
            AvailabilityError::InvalidRange(e) => e.into(),
            AvailabilityError::Database(e) => e.into(),
        }
    }
}

impl From<InvalidDateRange> for ApiError {
    fn from(err: InvalidDateRange) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "INVALID_DATE_RANGE",
            err.to_string(),
        )
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.code().as_deref() == Some("23505") {
                return Self::new(
                    StatusCode::CONFLICT,
                    "ALREADY_EXISTS",
                    "a record with these unique fields already exists",
                );
            }
        }
        tracing::error!(error = %err, "database error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "DATABASE_ERROR",
            "internal server error",
        )
    }
}
