use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use time::Date;
use uuid::Uuid;

use super::ApiError;
use crate::state::AppState;
use innsync_core::entities::pricing_rule::RuleKindName;
use innsync_core::entities::PricingRule;

#[derive(Debug, Deserialize)]
pub(super) struct CreateRuleRequest {
    name: String,
    kind: RuleKindName,
    #[serde(default)]
    room_id: Option<Uuid>,
    #[serde(default)]
    price_minor: Option<i64>,
    #[serde(default)]
    discount_percent: Option<Decimal>,
    #[serde(default)]
    date_from: Option<Date>,
    #[serde(default)]
    date_to: Option<Date>,
    #[serde(default)]
    weekend_days: Option<Vec<i16>>,
    #[serde(default)]
    min_nights: Option<i32>,
}

/// `POST /pricing-rules` — create a rule, rejecting date-range overlaps
/// with an active rule of the same kind and room scope.
pub(super) async fn create_rule(
    State(state): State<AppState>,
    Json(body): Json<CreateRuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if body.price_minor.is_none() && body.discount_percent.is_none() {
        return Err(ApiError::bad_request(
            "RULE_PRICE_REQUIRED",
            "a rule needs either price_minor or discount_percent",
        ));
    }

    if matches!(body.kind, RuleKindName::Seasonal | RuleKindName::Special) {
        let (Some(date_from), Some(date_to)) = (body.date_from, body.date_to) else {
            return Err(ApiError::bad_request(
                "RULE_DATES_REQUIRED",
                "seasonal and special rules need date_from and date_to",
            ));
        };
        if date_to < date_from {
            return Err(ApiError::bad_request(
                "INVALID_DATE_RANGE",
                "date_to must not precede date_from",
            ));
        }

        let conflicts = PricingRule::conflicting(
            &state.db,
            state.property_id(),
            body.kind,
            body.room_id,
            date_from,
            date_to,
        )
        .await?;
        if let Some(existing) = conflicts.first() {
            return Err(ApiError::new(
                StatusCode::CONFLICT,
                "RATE_CONFLICT",
                format!(
                    "rule {:?} overlaps active rule {:?} of the same kind",
                    body.name, existing.name
                ),
            ));
        }
    }

    let rule = PricingRule::insert(
        &state.db,
        state.property_id(),
        &body.name,
        body.kind,
        body.room_id,
        body.price_minor,
        body.discount_percent,
        body.date_from,
        body.date_to,
        body.weekend_days,
        body.min_nights,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(rule)))
}
