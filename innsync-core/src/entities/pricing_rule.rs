use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

/// A named, prioritized condition-to-price mapping.
///
/// Stored flat (kind discriminator plus optional per-kind columns) and
/// projected into [`RuleKind`] before matching. Rules are read, never
/// written, during a resolution pass.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct PricingRule {
    pub id: Uuid,
    pub property_id: Uuid,
    pub name: String,
    pub kind: RuleKindName,
    /// `None` scopes the rule to every room of the property.
    pub room_id: Option<Uuid>,
    /// Absolute per-night price in minor units.
    pub price_minor: Option<i64>,
    /// Discount applied to the room's base price. When both this and
    /// `price_minor` are set, the discount wins (documented in DESIGN.md).
    pub discount_percent: Option<Decimal>,
    pub date_from: Option<Date>,
    pub date_to: Option<Date>,
    /// ISO weekday numbers (Monday = 1) for `weekend` rules.
    pub weekend_days: Option<Vec<i16>>,
    pub min_nights: Option<i32>,
    pub active: bool,
}

/// Flat kind discriminator as stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "rule_kind")]
#[serde(rename_all = "lowercase")]
pub enum RuleKindName {
    Base,
    Seasonal,
    Weekend,
    Longstay,
    Special,
}

/// The per-kind matching condition, carrying only the fields relevant to
/// that kind. Lower priority number wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    /// Active inside a fixed inclusive date range; highest precedence.
    Special { from: Date, to: Date },
    /// Active inside a fixed inclusive date range.
    Seasonal { from: Date, to: Date },
    /// Active on a configured subset of weekdays (ISO numbers, Monday = 1).
    Weekend { days: Vec<i16> },
    /// Active only when the whole stay is at least `min_nights` long.
    LongStay { min_nights: i32 },
    /// Always applies; the fallback.
    Base,
}

impl RuleKind {
    pub fn priority(&self) -> u8 {
        match self {
            RuleKind::Special { .. } => 1,
            RuleKind::Seasonal { .. } => 2,
            RuleKind::Weekend { .. } => 3,
            RuleKind::LongStay { .. } => 4,
            RuleKind::Base => 5,
        }
    }

    /// Whether the rule is applicable on one specific night.
    ///
    /// `total_nights` is the whole stay length: long-stay eligibility is
    /// evaluated once against it, not per night.
    pub fn applies_on(&self, date: Date, total_nights: u32) -> bool {
        match self {
            RuleKind::Special { from, to } | RuleKind::Seasonal { from, to } => {
                date >= *from && date <= *to
            }
            RuleKind::Weekend { days } => {
                let iso = date.weekday().number_from_monday() as i16;
                days.contains(&iso)
            }
            RuleKind::LongStay { min_nights } => total_nights >= *min_nights as u32,
            RuleKind::Base => true,
        }
    }
}

impl PricingRule {
    /// Project the flat columns into the per-kind condition.
    ///
    /// Returns `None` when the stored row is missing the columns its kind
    /// requires; such rules never match and are skipped with a warning.
    pub fn kind_spec(&self) -> Option<RuleKind> {
        match self.kind {
            RuleKindName::Base => Some(RuleKind::Base),
            RuleKindName::Seasonal => Some(RuleKind::Seasonal {
                from: self.date_from?,
                to: self.date_to?,
            }),
            RuleKindName::Special => Some(RuleKind::Special {
                from: self.date_from?,
                to: self.date_to?,
            }),
            RuleKindName::Weekend => Some(RuleKind::Weekend {
                days: self.weekend_days.clone()?,
            }),
            RuleKindName::Longstay => Some(RuleKind::LongStay {
                min_nights: self.min_nights?,
            }),
        }
    }

    /// Whether the rule covers the given room (`room_id = None` covers all).
    pub fn covers_room(&self, room_id: Uuid) -> bool {
        self.room_id.is_none() || self.room_id == Some(room_id)
    }

    /// Resolve one night's price in minor units against the room base price.
    ///
    /// Discount percentage wins over an absolute price when both are set;
    /// the result is rounded half-away-from-zero to whole minor units.
    pub fn night_price(&self, base_price_minor: i64) -> Option<i64> {
        if let Some(discount) = self.discount_percent {
            let factor = (Decimal::ONE_HUNDRED - discount) / Decimal::ONE_HUNDRED;
            let price = (Decimal::from(base_price_minor) * factor)
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
            return price.to_i64();
        }
        self.price_minor
    }

    /// All active rules for a property, in creation order (stable priority
    /// tie-break).
    pub async fn active_for_property(
        exec: impl sqlx::PgExecutor<'_>,
        property_id: Uuid,
    ) -> Result<Vec<PricingRule>, sqlx::Error> {
        sqlx::query_as::<_, PricingRule>(
            "SELECT id, property_id, name, kind, room_id, price_minor, discount_percent, \
                 date_from, date_to, weekend_days, min_nights, active \
             FROM pricing_rules WHERE property_id = $1 AND active \
             ORDER BY created_at",
        )
        .bind(property_id)
        .fetch_all(exec)
        .await
    }

    pub async fn get_by_id(
        exec: impl sqlx::PgExecutor<'_>,
        id: Uuid,
    ) -> Result<Option<PricingRule>, sqlx::Error> {
        sqlx::query_as::<_, PricingRule>(
            "SELECT id, property_id, name, kind, room_id, price_minor, discount_percent, \
                 date_from, date_to, weekend_days, min_nights, active \
             FROM pricing_rules WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(exec)
        .await
    }

    /// Active rules of the same kind and room scope overlapping the given
    /// inclusive date range. Used to reject conflicting rule definitions.
    pub async fn conflicting(
        exec: impl sqlx::PgExecutor<'_>,
        property_id: Uuid,
        kind: RuleKindName,
        room_id: Option<Uuid>,
        date_from: Date,
        date_to: Date,
    ) -> Result<Vec<PricingRule>, sqlx::Error> {
        sqlx::query_as::<_, PricingRule>(
            "SELECT id, property_id, name, kind, room_id, price_minor, discount_percent, \
                 date_from, date_to, weekend_days, min_nights, active \
             FROM pricing_rules \
             WHERE property_id = $1 AND kind = $2 AND active \
               AND (room_id IS NOT DISTINCT FROM $3 OR room_id IS NULL OR $3::uuid IS NULL) \
               AND date_from IS NOT NULL AND date_to IS NOT NULL \
               AND date_from <= $5 AND date_to >= $4",
        )
        .bind(property_id)
        .bind(kind)
        .bind(room_id)
        .bind(date_from)
        .bind(date_to)
        .fetch_all(exec)
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        exec: impl sqlx::PgExecutor<'_>,
        property_id: Uuid,
        name: &str,
        kind: RuleKindName,
        room_id: Option<Uuid>,
        price_minor: Option<i64>,
        discount_percent: Option<Decimal>,
        date_from: Option<Date>,
        date_to: Option<Date>,
        weekend_days: Option<Vec<i16>>,
        min_nights: Option<i32>,
    ) -> Result<PricingRule, sqlx::Error> {
        sqlx::query_as::<_, PricingRule>(
            "INSERT INTO pricing_rules (property_id, name, kind, room_id, price_minor, \
                 discount_percent, date_from, date_to, weekend_days, min_nights) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING id, property_id, name, kind, room_id, price_minor, discount_percent, \
                 date_from, date_to, weekend_days, min_nights, active",
        )
        .bind(property_id)
        .bind(name)
        .bind(kind)
        .bind(room_id)
        .bind(price_minor)
        .bind(discount_percent)
        .bind(date_from)
        .bind(date_to)
        .bind(weekend_days)
        .bind(min_nights)
        .fetch_one(exec)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use time::macros::date;

    fn rule(kind: RuleKindName) -> PricingRule {
        PricingRule {
            id: Uuid::new_v4(),
            property_id: Uuid::new_v4(),
            name: "test".into(),
            kind,
            room_id: None,
            price_minor: None,
            discount_percent: None,
            date_from: None,
            date_to: None,
            weekend_days: None,
            min_nights: None,
            active: true,
        }
    }

    #[test]
    fn priorities_are_ordered_special_first() {
        let special = RuleKind::Special {
            from: date!(2026 - 01 - 01),
            to: date!(2026 - 01 - 02),
        };
        let seasonal = RuleKind::Seasonal {
            from: date!(2026 - 01 - 01),
            to: date!(2026 - 01 - 02),
        };
        let weekend = RuleKind::Weekend { days: vec![5, 6] };
        let longstay = RuleKind::LongStay { min_nights: 7 };
        assert!(special.priority() < seasonal.priority());
        assert!(seasonal.priority() < weekend.priority());
        assert!(weekend.priority() < longstay.priority());
        assert!(longstay.priority() < RuleKind::Base.priority());
    }

    #[test]
    fn seasonal_range_is_inclusive_on_both_ends() {
        let kind = RuleKind::Seasonal {
            from: date!(2026 - 06 - 01),
            to: date!(2026 - 06 - 30),
        };
        assert!(kind.applies_on(date!(2026 - 06 - 01), 1));
        assert!(kind.applies_on(date!(2026 - 06 - 30), 1));
        assert!(!kind.applies_on(date!(2026 - 05 - 31), 1));
        assert!(!kind.applies_on(date!(2026 - 07 - 01), 1));
    }

    #[test]
    fn weekend_matches_configured_iso_days() {
        // Friday and Saturday nights.
        let kind = RuleKind::Weekend { days: vec![5, 6] };
        assert!(kind.applies_on(date!(2026 - 09 - 04), 2)); // Friday
        assert!(kind.applies_on(date!(2026 - 09 - 05), 2)); // Saturday
        assert!(!kind.applies_on(date!(2026 - 09 - 06), 2)); // Sunday
        assert!(!kind.applies_on(date!(2026 - 09 - 07), 2)); // Monday
    }

    #[test]
    fn longstay_gates_on_total_nights_not_the_date() {
        let kind = RuleKind::LongStay { min_nights: 7 };
        let any_date = date!(2026 - 09 - 01);
        assert!(kind.applies_on(any_date, 7));
        assert!(kind.applies_on(any_date, 10));
        assert!(!kind.applies_on(any_date, 6));
    }

    #[test]
    fn discount_wins_over_absolute_price() {
        let mut r = rule(RuleKindName::Longstay);
        r.price_minor = Some(999_999);
        r.discount_percent = Some(Decimal::from(20));
        assert_eq!(r.night_price(500_000), Some(400_000));
    }

    #[test]
    fn discount_rounds_half_away_from_zero() {
        let mut r = rule(RuleKindName::Longstay);
        r.discount_percent = Some(Decimal::from(15));
        // 333 * 0.85 = 283.05 -> 283; 335 * 0.85 = 284.75 -> 285
        assert_eq!(r.night_price(333), Some(283));
        assert_eq!(r.night_price(335), Some(285));
        // Exactly .5 rounds away from zero: 330 * 0.85 = 280.5 -> 281
        assert_eq!(r.night_price(330), Some(281));
    }

    #[test]
    fn rule_with_neither_price_nor_discount_has_no_night_price() {
        let r = rule(RuleKindName::Base);
        assert_eq!(r.night_price(500_000), None);
    }

    #[test]
    fn kind_spec_is_none_when_required_columns_are_missing() {
        assert_eq!(rule(RuleKindName::Seasonal).kind_spec(), None);
        assert_eq!(rule(RuleKindName::Weekend).kind_spec(), None);
        assert_eq!(rule(RuleKindName::Longstay).kind_spec(), None);
        assert_eq!(rule(RuleKindName::Base).kind_spec(), Some(RuleKind::Base));

        let mut seasonal = rule(RuleKindName::Seasonal);
        seasonal.date_from = Some(date!(2026 - 06 - 01));
        seasonal.date_to = Some(date!(2026 - 06 - 30));
        assert!(matches!(
            seasonal.kind_spec(),
            Some(RuleKind::Seasonal { .. })
        ));
    }

    #[test]
    fn room_scope_empty_covers_all_rooms() {
        let mut r = rule(RuleKindName::Base);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(r.covers_room(a));
        r.room_id = Some(a);
        assert!(r.covers_room(a));
        assert!(!r.covers_room(b));
    }
}
