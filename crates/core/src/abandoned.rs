//! Abandoned-cart CRM: prioritization, filters and recovery statistics.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cart::CartLine;
use crate::types::{AbandonedCartId, ProductId};

/// Recovery emails after which a cart is escalated regardless of age.
pub const MAX_RECOVERY_ATTEMPTS: i32 = 3;

const HIGH_PRIORITY_AFTER: Duration = Duration::hours(24);
const URGENT_AFTER: Duration = Duration::hours(72);

/// A cart left behind by an identified shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbandonedCart {
    pub id: AbandonedCartId,
    /// Account or session the cart came from.
    pub client_id: Option<String>,
    pub client_name: String,
    pub client_email: String,
    pub items: Vec<CartLine>,
    pub total_value: Decimal,
    pub abandoned_at: DateTime<Utc>,
    pub recovery_attempts: i32,
    pub last_recovery_email: Option<DateTime<Utc>>,
    pub recovered: bool,
    pub recovery_date: Option<DateTime<Utc>>,
    /// Percentage offered in the last recovery email.
    pub discount_offered: Option<i32>,
}

impl AbandonedCart {
    /// Record that a recovery email went out.
    pub fn record_recovery_email(&mut self, now: DateTime<Utc>, discount: Option<i32>) {
        self.recovery_attempts = self.recovery_attempts.saturating_add(1);
        self.last_recovery_email = Some(now);
        if discount.is_some() {
            self.discount_offered = discount;
        }
    }

    /// Mark the cart as converted into an order.
    pub const fn mark_recovered(&mut self, now: DateTime<Utc>) {
        self.recovered = true;
        self.recovery_date = Some(now);
    }

    /// Time elapsed since the cart was abandoned (never negative).
    #[must_use]
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.abandoned_at).max(Duration::zero())
    }

    /// Whole hours elapsed since the cart was abandoned, for display.
    #[must_use]
    pub fn hours_since_abandoned(&self, now: DateTime<Utc>) -> i64 {
        self.idle_for(now).num_hours()
    }

    #[must_use]
    pub fn priority(&self, now: DateTime<Utc>) -> RecoveryPriority {
        RecoveryPriority::of(self, now)
    }
}

/// How urgently a cart needs a follow-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryPriority {
    Urgent,
    High,
    Normal,
    Recovered,
}

impl RecoveryPriority {
    /// Score a cart.
    ///
    /// - recovered carts are done
    /// - older than 72 hours, or three emails without success, is urgent
    /// - older than 24 hours is high
    /// - anything else is normal
    #[must_use]
    pub fn of(cart: &AbandonedCart, now: DateTime<Utc>) -> Self {
        if cart.recovered {
            return Self::Recovered;
        }
        let idle = cart.idle_for(now);
        if idle > URGENT_AFTER || cart.recovery_attempts >= MAX_RECOVERY_ATTEMPTS {
            Self::Urgent
        } else if idle > HIGH_PRIORITY_AFTER {
            Self::High
        } else {
            Self::Normal
        }
    }

    /// Label shown in the back-office.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Urgent => "Urgent",
            Self::High => "Prioritaire",
            Self::Normal => "Normal",
            Self::Recovered => "Récupéré",
        }
    }
}

/// Back-office list filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartFilter {
    #[default]
    All,
    Pending,
    Recovered,
    Urgent,
}

impl CartFilter {
    #[must_use]
    pub fn matches(self, cart: &AbandonedCart, now: DateTime<Utc>) -> bool {
        match self {
            Self::All => true,
            Self::Pending => !cart.recovered,
            Self::Recovered => cart.recovered,
            Self::Urgent => cart.priority(now) == RecoveryPriority::Urgent,
        }
    }
}

/// Apply a filter and sort the most pressing carts first, newest first
/// within a priority.
#[must_use]
pub fn filter_carts(
    carts: &[AbandonedCart],
    filter: CartFilter,
    now: DateTime<Utc>,
) -> Vec<&AbandonedCart> {
    let mut selected: Vec<&AbandonedCart> =
        carts.iter().filter(|c| filter.matches(c, now)).collect();
    selected.sort_by(|a, b| {
        a.priority(now)
            .cmp(&b.priority(now))
            .then_with(|| b.abandoned_at.cmp(&a.abandoned_at))
    });
    selected
}

/// Headline numbers of the recovery dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmStats {
    pub total: usize,
    pub recovered: usize,
    pub abandoned: usize,
    /// Value still sitting in carts that were not recovered.
    pub total_value: Decimal,
    /// Mean recovery emails per cart, one decimal.
    pub average_attempts: Decimal,
    /// Share of recovered carts in percent, one decimal.
    pub recovery_rate: Decimal,
}

#[must_use]
pub fn statistics(carts: &[AbandonedCart]) -> CrmStats {
    let total = carts.len();
    let recovered = carts.iter().filter(|c| c.recovered).count();
    let total_value = carts
        .iter()
        .filter(|c| !c.recovered)
        .map(|c| c.total_value)
        .sum();

    let (average_attempts, recovery_rate) = if total == 0 {
        (Decimal::ZERO, Decimal::ZERO)
    } else {
        let count = Decimal::from(total);
        let attempts: Decimal = carts.iter().map(|c| Decimal::from(c.recovery_attempts)).sum();
        (
            (attempts / count).round_dp(1),
            (Decimal::from(recovered) * Decimal::ONE_HUNDRED / count).round_dp(1),
        )
    };

    CrmStats {
        total,
        recovered,
        abandoned: total - recovered,
        total_value,
        average_attempts,
        recovery_rate,
    }
}

/// Priority of a product-level insight, driven by the product's price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightPriority {
    Urgent,
    High,
    Medium,
}

impl InsightPriority {
    /// Expensive products left in carts deserve the most attention.
    #[must_use]
    pub fn from_price(price: Decimal) -> Self {
        if price > Decimal::from(150) {
            Self::Urgent
        } else if price > Decimal::ONE_HUNDRED {
            Self::High
        } else {
            Self::Medium
        }
    }
}

/// How often a product gets left behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInsight {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Decimal,
    pub carts: usize,
    pub quantity: u32,
    pub lost_value: Decimal,
    pub priority: InsightPriority,
}

/// Aggregate unrecovered carts per product, biggest lost value first.
#[must_use]
pub fn product_insights(carts: &[AbandonedCart]) -> Vec<ProductInsight> {
    let mut by_product: HashMap<ProductId, ProductInsight> = HashMap::new();
    for cart in carts.iter().filter(|c| !c.recovered) {
        for line in &cart.items {
            let entry = by_product
                .entry(line.product_id)
                .or_insert_with(|| ProductInsight {
                    product_id: line.product_id,
                    name: line.name.clone(),
                    unit_price: line.unit_price,
                    carts: 0,
                    quantity: 0,
                    lost_value: Decimal::ZERO,
                    priority: InsightPriority::from_price(line.unit_price),
                });
            entry.carts += 1;
            entry.quantity = entry.quantity.saturating_add(line.quantity);
            entry.lost_value += line.line_total();
        }
    }

    let mut insights: Vec<ProductInsight> = by_product.into_values().collect();
    insights.sort_by(|a, b| {
        b.lost_value
            .cmp(&a.lost_value)
            .then_with(|| a.product_id.as_i32().cmp(&b.product_id.as_i32()))
    });
    insights
}

/// Whether a cart idle since `last_activity` should be snapshotted as abandoned.
#[must_use]
pub fn is_idle(last_activity: DateTime<Utc>, now: DateTime<Utc>, idle_after: Duration) -> bool {
    now - last_activity >= idle_after
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::tests::line;

    fn fixed_now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_780_000_000, 0).unwrap_or_default()
    }

    fn cart(id: i32, hours_ago: i64, attempts: i32, recovered: bool) -> AbandonedCart {
        let now = fixed_now();
        AbandonedCart {
            id: AbandonedCartId::new(id),
            client_id: Some(format!("user-{id}")),
            client_name: "Léa".to_owned(),
            client_email: "lea@mail.fr".to_owned(),
            items: vec![line(1, 12_000, 1)],
            total_value: Decimal::from(120),
            abandoned_at: now - Duration::hours(hours_ago),
            recovery_attempts: attempts,
            last_recovery_email: None,
            recovered,
            recovery_date: None,
            discount_offered: None,
        }
    }

    #[test]
    fn test_priority_boundaries() {
        let now = fixed_now();
        assert_eq!(cart(1, 2, 0, false).priority(now), RecoveryPriority::Normal);
        assert_eq!(cart(1, 24, 0, false).priority(now), RecoveryPriority::Normal);
        assert_eq!(cart(1, 25, 0, false).priority(now), RecoveryPriority::High);
        assert_eq!(cart(1, 72, 0, false).priority(now), RecoveryPriority::High);
        assert_eq!(cart(1, 73, 0, false).priority(now), RecoveryPriority::Urgent);
        assert_eq!(cart(1, 1, 3, false).priority(now), RecoveryPriority::Urgent);
        assert_eq!(cart(1, 100, 5, true).priority(now), RecoveryPriority::Recovered);
    }

    #[test]
    fn test_priority_counts_partial_hours() {
        let now = fixed_now();
        let idle = |elapsed: Duration| AbandonedCart {
            abandoned_at: now - elapsed,
            ..cart(1, 0, 0, false)
        };

        let just_past_day = idle(Duration::hours(24) + Duration::minutes(1));
        assert_eq!(just_past_day.priority(now), RecoveryPriority::High);
        assert_eq!(just_past_day.hours_since_abandoned(now), 24);

        let almost_73 = idle(Duration::hours(72) + Duration::minutes(59));
        assert_eq!(almost_73.priority(now), RecoveryPriority::Urgent);
        assert!(CartFilter::Urgent.matches(&almost_73, now));

        assert_eq!(
            idle(Duration::hours(72)).priority(now),
            RecoveryPriority::High
        );
    }

    #[test]
    fn test_priority_labels() {
        assert_eq!(RecoveryPriority::High.label(), "Prioritaire");
    }

    #[test]
    fn test_filters() {
        let now = fixed_now();
        let carts = vec![
            cart(1, 2, 0, false),
            cart(2, 80, 0, false),
            cart(3, 10, 1, true),
        ];

        let ids = |filter| -> Vec<i32> {
            filter_carts(&carts, filter, now)
                .iter()
                .map(|c| c.id.as_i32())
                .collect()
        };

        assert_eq!(ids(CartFilter::All), vec![2, 1, 3]);
        assert_eq!(ids(CartFilter::Pending), vec![2, 1]);
        assert_eq!(ids(CartFilter::Recovered), vec![3]);
        assert_eq!(ids(CartFilter::Urgent), vec![2]);
    }

    #[test]
    fn test_statistics() {
        let carts = vec![
            cart(1, 2, 1, false),
            cart(2, 80, 2, false),
            cart(3, 10, 1, true),
        ];
        let stats = statistics(&carts);

        assert_eq!(stats.total, 3);
        assert_eq!(stats.recovered, 1);
        assert_eq!(stats.abandoned, 2);
        assert_eq!(stats.total_value, Decimal::from(240));
        assert_eq!(stats.average_attempts, Decimal::new(13, 1));
        assert_eq!(stats.recovery_rate, Decimal::new(333, 1));
    }

    #[test]
    fn test_statistics_empty() {
        let stats = statistics(&[]);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.recovery_rate, Decimal::ZERO);
    }

    #[test]
    fn test_recovery_email_and_recovered() {
        let now = fixed_now();
        let mut c = cart(1, 30, 0, false);

        c.record_recovery_email(now, Some(10));
        c.record_recovery_email(now, None);
        assert_eq!(c.recovery_attempts, 2);
        assert_eq!(c.discount_offered, Some(10));
        assert_eq!(c.last_recovery_email, Some(now));

        c.mark_recovered(now);
        assert!(c.recovered);
        assert_eq!(c.priority(now), RecoveryPriority::Recovered);
    }

    #[test]
    fn test_insight_priority_from_price() {
        assert_eq!(InsightPriority::from_price(Decimal::from(151)), InsightPriority::Urgent);
        assert_eq!(InsightPriority::from_price(Decimal::from(150)), InsightPriority::High);
        assert_eq!(InsightPriority::from_price(Decimal::from(100)), InsightPriority::Medium);
    }

    #[test]
    fn test_product_insights_skip_recovered() {
        let carts = vec![cart(1, 2, 0, false), cart(2, 5, 0, false), cart(3, 5, 0, true)];
        let insights = product_insights(&carts);

        assert_eq!(insights.len(), 1);
        let first = insights.first();
        assert_eq!(first.map(|i| i.carts), Some(2));
        assert_eq!(first.map(|i| i.lost_value), Some(Decimal::from(240)));
        assert_eq!(first.map(|i| i.priority), Some(InsightPriority::High));
    }

    #[test]
    fn test_is_idle() {
        let now = fixed_now();
        assert!(is_idle(now - Duration::minutes(61), now, Duration::minutes(60)));
        assert!(!is_idle(now - Duration::minutes(5), now, Duration::minutes(60)));
    }
}
