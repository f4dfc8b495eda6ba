//! Night-by-night rate resolution.
//!
//! Each night of a stay independently selects the best-matching active rule
//! (lowest priority number among rules covering the room and applicable on
//! that date); a stay can legitimately be priced by different rules on
//! different nights. Explicit-rule mode bypasses selection and gating
//! entirely: a human operator pinned the rule.

use serde::Serialize;
use time::Date;
use uuid::Uuid;

use crate::calendar::{DateRange, InvalidDateRange};
use crate::entities::{PricingRule, Room};

/// Full resolution result: total, per-night breakdown, and a human label of
/// which rule(s) applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateQuote {
    /// Sum of all night prices in minor units.
    pub total_minor: i64,
    /// Integer average per night.
    pub avg_per_night_minor: i64,
    /// Single rule name, or `Mixed: A, B` when nights resolved differently.
    pub label: String,
    pub nights: Vec<NightPrice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NightPrice {
    pub date: Date,
    pub price_minor: i64,
    pub rule_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RateError {
    #[error(transparent)]
    InvalidRange(#[from] InvalidDateRange),
    #[error("room {0} not found")]
    RoomNotFound(Uuid),
    #[error("pricing rule {0} not found or inactive")]
    RuleNotFound(Uuid),
    /// No rule priced the given night; the caller must not silently fall
    /// back to the base price.
    #[error("no pricing rule applicable on {date}")]
    NotApplicable { date: Date },
    /// An overlapping rule definition of the same kind and scope exists.
    #[error("rule {name:?} conflicts with existing rule {existing:?}")]
    Conflict { name: String, existing: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl RateError {
    /// Stable machine-readable code for API surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            RateError::InvalidRange(_) => "INVALID_DATE_RANGE",
            RateError::RoomNotFound(_) => "NOT_FOUND",
            RateError::RuleNotFound(_) => "RATE_NOT_FOUND",
            RateError::NotApplicable { .. } => "RATE_NOT_APPLICABLE",
            RateError::Conflict { .. } => "RATE_CONFLICT",
            RateError::Database(_) => "DATABASE_ERROR",
        }
    }
}

/// Resolve the price of every night of `range` for `room`.
///
/// `rules` must be the active rule set in stable load order; ties on
/// priority number keep the earlier rule. With `explicit_rule_id`, that one
/// rule prices every night regardless of its own date or stay-length gating.
pub fn resolve(
    room: &Room,
    rules: &[PricingRule],
    range: DateRange,
    explicit_rule_id: Option<Uuid>,
) -> Result<RateQuote, RateError> {
    let total_nights = range.nights();

    if let Some(rule_id) = explicit_rule_id {
        let rule = rules
            .iter()
            .find(|r| r.id == rule_id && r.active)
            .ok_or(RateError::RuleNotFound(rule_id))?;
        let nights = range
            .iter_nights()
            .map(|date| price_night(rule, room, date))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(build_quote(nights));
    }

    let mut nights = Vec::with_capacity(total_nights as usize);
    for date in range.iter_nights() {
        let winner = select_rule(rules, room.id, date, total_nights)
            .ok_or(RateError::NotApplicable { date })?;
        nights.push(price_night(winner, room, date)?);
    }
    Ok(build_quote(nights))
}

/// Pick the applicable rule with the lowest priority number for one night.
fn select_rule<'r>(
    rules: &'r [PricingRule],
    room_id: Uuid,
    date: Date,
    total_nights: u32,
) -> Option<&'r PricingRule> {
    let mut winner: Option<(&PricingRule, u8)> = None;
    for rule in rules {
        if !rule.active || !rule.covers_room(room_id) {
            continue;
        }
        let Some(kind) = rule.kind_spec() else {
            tracing::warn!(rule_id = %rule.id, name = %rule.name, "skipping malformed pricing rule");
            continue;
        };
        if !kind.applies_on(date, total_nights) {
            continue;
        }
        let priority = kind.priority();
        // Strictly-lower keeps the first-loaded rule on ties.
        if winner.is_none_or(|(_, best)| priority < best) {
            winner = Some((rule, priority));
        }
    }
    winner.map(|(rule, _)| rule)
}

fn price_night(rule: &PricingRule, room: &Room, date: Date) -> Result<NightPrice, RateError> {
    let price_minor = rule
        .night_price(room.base_price_minor)
        .ok_or(RateError::NotApplicable { date })?;
    Ok(NightPrice {
        date,
        price_minor,
        rule_name: rule.name.clone(),
    })
}

fn build_quote(nights: Vec<NightPrice>) -> RateQuote {
    let total_minor: i64 = nights.iter().map(|n| n.price_minor).sum();
    let avg_per_night_minor = total_minor / nights.len().max(1) as i64;

    let mut names: Vec<&str> = Vec::new();
    for night in &nights {
        if !names.contains(&night.rule_name.as_str()) {
            names.push(&night.rule_name);
        }
    }
    let label = match names.as_slice() {
        [single] => (*single).to_owned(),
        many => format!("Mixed: {}", many.join(", ")),
    };

    RateQuote {
        total_minor,
        avg_per_night_minor,
        label,
        nights,
    }
}

/// Load the room and active rules, then resolve.
pub async fn quote_room(
    conn: &mut sqlx::PgConnection,
    room_id: Uuid,
    range: DateRange,
    explicit_rule_id: Option<Uuid>,
) -> Result<RateQuote, RateError> {
    let room = Room::get_by_id(&mut *conn, room_id)
        .await?
        .ok_or(RateError::RoomNotFound(room_id))?;
    let rules = match explicit_rule_id {
        // Explicit mode only needs the pinned rule.
        Some(rule_id) => Vec::from_iter(PricingRule::get_by_id(&mut *conn, rule_id).await?),
        None => PricingRule::active_for_property(&mut *conn, room.property_id).await?,
    };
    resolve(&room, &rules, range, explicit_rule_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::pricing_rule::RuleKindName;
    use crate::entities::RoomStatus;
    use rust_decimal::Decimal;
    use time::macros::date;

    fn room(base: i64) -> Room {
        Room {
            id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            name: "101".into(),
            capacity: 2,
            base_price_minor: base,
            status: RoomStatus::Active,
        }
    }

    fn base_rule(price: i64) -> PricingRule {
        PricingRule {
            id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            name: "base".into(),
            kind: RuleKindName::Base,
            room_id: None,
            price_minor: Some(price),
            discount_percent: None,
            date_from: None,
            date_to: None,
            weekend_days: None,
            min_nights: None,
            active: true,
        }
    }

    fn range(check_in: Date, check_out: Date) -> DateRange {
        DateRange::new(check_in, check_out).unwrap()
    }

    #[test]
    fn single_base_rule_prices_every_night() {
        let room = room(500_000);
        let rules = vec![base_rule(500_000)];
        let quote = resolve(
            &room,
            &rules,
            range(date!(2026 - 09 - 01), date!(2026 - 09 - 04)),
            None,
        )
        .unwrap();
        assert_eq!(quote.total_minor, 1_500_000);
        assert_eq!(quote.avg_per_night_minor, 500_000);
        assert_eq!(quote.label, "base");
        assert!(quote.nights.iter().all(|n| n.rule_name == "base"));
    }

    #[test]
    fn special_rule_on_middle_night_yields_mixed_label() {
        let room = room(500_000);
        let mut special = base_rule(300_000);
        special.name = "promo".into();
        special.kind = RuleKindName::Special;
        special.date_from = Some(date!(2026 - 09 - 02));
        special.date_to = Some(date!(2026 - 09 - 02));
        let rules = vec![base_rule(500_000), special];

        let quote = resolve(
            &room,
            &rules,
            range(date!(2026 - 09 - 01), date!(2026 - 09 - 04)),
            None,
        )
        .unwrap();
        let prices: Vec<i64> = quote.nights.iter().map(|n| n.price_minor).collect();
        assert_eq!(prices, vec![500_000, 300_000, 500_000]);
        assert_eq!(quote.total_minor, 1_300_000);
        assert_eq!(quote.label, "Mixed: base, promo");
    }

    #[test]
    fn longstay_applies_at_threshold_and_not_below() {
        let room = room(500_000);
        let mut longstay = base_rule(0);
        longstay.name = "weekly".into();
        longstay.kind = RuleKindName::Longstay;
        longstay.min_nights = Some(7);
        longstay.price_minor = None;
        longstay.discount_percent = Some(Decimal::from(20));
        let rules = vec![base_rule(500_000), longstay];

        let week = resolve(
            &room,
            &rules,
            range(date!(2026 - 09 - 01), date!(2026 - 09 - 08)),
            None,
        )
        .unwrap();
        assert_eq!(week.total_minor, 2_800_000);
        assert!(week.nights.iter().all(|n| n.price_minor == 400_000));
        assert_eq!(week.label, "weekly");

        let six = resolve(
            &room,
            &rules,
            range(date!(2026 - 09 - 01), date!(2026 - 09 - 07)),
            None,
        )
        .unwrap();
        assert_eq!(six.label, "base");
        assert_eq!(six.total_minor, 3_000_000);
    }

    #[test]
    fn no_matching_rule_is_an_error_not_a_fallback() {
        let room = room(500_000);
        let mut seasonal = base_rule(450_000);
        seasonal.kind = RuleKindName::Seasonal;
        seasonal.date_from = Some(date!(2026 - 06 - 01));
        seasonal.date_to = Some(date!(2026 - 06 - 30));
        let rules = vec![seasonal];

        let err = resolve(
            &room,
            &rules,
            range(date!(2026 - 09 - 01), date!(2026 - 09 - 03)),
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RateError::NotApplicable {
                date
            } if date == date!(2026 - 09 - 01)
        ));
        assert_eq!(err.code(), "RATE_NOT_APPLICABLE");
    }

    #[test]
    fn explicit_rule_ignores_date_and_min_stay_gating() {
        let room = room(500_000);
        let mut longstay = base_rule(350_000);
        longstay.name = "weekly".into();
        longstay.kind = RuleKindName::Longstay;
        longstay.min_nights = Some(7);
        let rule_id = longstay.id;
        let rules = vec![base_rule(500_000), longstay];

        // 2 nights, far below min_nights, still priced by the pinned rule.
        let quote = resolve(
            &room,
            &rules,
            range(date!(2026 - 09 - 01), date!(2026 - 09 - 03)),
            Some(rule_id),
        )
        .unwrap();
        assert_eq!(quote.total_minor, 700_000);
        assert_eq!(quote.label, "weekly");
    }

    #[test]
    fn explicit_unknown_rule_is_rate_not_found() {
        let room = room(500_000);
        let rules = vec![base_rule(500_000)];
        let missing = Uuid::new_v4();
        let err = resolve(
            &room,
            &rules,
            range(date!(2026 - 09 - 01), date!(2026 - 09 - 03)),
            Some(missing),
        )
        .unwrap_err();
        assert!(matches!(err, RateError::RuleNotFound(id) if id == missing));
        assert_eq!(err.code(), "RATE_NOT_FOUND");
    }

    #[test]
    fn room_scoped_rule_beats_nothing_on_other_rooms() {
        let room_a = room(500_000);
        let room_b = room(500_000);
        let mut scoped = base_rule(200_000);
        scoped.name = "room-a-deal".into();
        scoped.kind = RuleKindName::Special;
        scoped.date_from = Some(date!(2026 - 09 - 01));
        scoped.date_to = Some(date!(2026 - 09 - 30));
        scoped.room_id = Some(room_a.id);
        let rules = vec![base_rule(500_000), scoped];

        let span = range(date!(2026 - 09 - 01), date!(2026 - 09 - 02));
        let a = resolve(&room_a, &rules, span, None).unwrap();
        let b = resolve(&room_b, &rules, span, None).unwrap();
        assert_eq!(a.total_minor, 200_000);
        assert_eq!(b.total_minor, 500_000);
    }

    #[test]
    fn priority_tie_keeps_first_loaded_rule() {
        let room = room(500_000);
        let mut first = base_rule(410_000);
        first.name = "first".into();
        let mut second = base_rule(420_000);
        second.name = "second".into();
        let rules = vec![first, second];

        let quote = resolve(
            &room,
            &rules,
            range(date!(2026 - 09 - 01), date!(2026 - 09 - 02)),
            None,
        )
        .unwrap();
        assert_eq!(quote.label, "first");
        assert_eq!(quote.total_minor, 410_000);
    }

    #[test]
    fn resolution_is_deterministic() {
        let room = room(500_000);
        let mut weekend = base_rule(550_000);
        weekend.name = "weekend".into();
        weekend.kind = RuleKindName::Weekend;
        weekend.weekend_days = Some(vec![5, 6]);
        let rules = vec![base_rule(500_000), weekend];
        let span = range(date!(2026 - 09 - 03), date!(2026 - 09 - 08));

        let a = resolve(&room, &rules, span, None).unwrap();
        let b = resolve(&room, &rules, span, None).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn inactive_rules_never_match() {
        let room = room(500_000);
        let mut inactive = base_rule(100_000);
        inactive.active = false;
        let rules = vec![inactive];
        let err = resolve(
            &room,
            &rules,
            range(date!(2026 - 09 - 01), date!(2026 - 09 - 02)),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, RateError::NotApplicable { .. }));
    }
}
