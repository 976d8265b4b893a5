//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use rayha_core::cart::CartLine;
use rayha_core::checkout::OrderQuote;
use rayha_core::promo::PriorOrder;
use rayha_core::{OrderId, OrderStatus, UserId};

/// A placed order.
///
/// `items` is a snapshot of the priced lines, gift line included, so later
/// catalog edits never change what the shopper bought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub reference: String,
    pub user_id: Option<UserId>,
    pub user_name: String,
    pub user_email: String,
    pub items: Vec<CartLine>,
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub total_amount: Decimal,
    pub shipping_address: serde_json::Value,
    pub status: OrderStatus,
    pub pending_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub promo_code: Option<String>,
    pub promo_discount: Option<i32>,
    pub payment_intent_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for PriorOrder {
    fn from(order: &Order) -> Self {
        Self {
            promo_code: order.promo_code.clone(),
            status: order.status,
        }
    }
}

/// Who is buying, as entered at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
}

/// Everything needed to insert an order.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub reference: String,
    pub user_id: Option<UserId>,
    pub customer: &'a CustomerDetails,
    pub quote: &'a OrderQuote,
    pub shipping_address: &'a serde_json::Value,
    pub notes: Option<&'a str>,
    pub payment_intent_id: Option<&'a str>,
}
