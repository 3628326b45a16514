//! Order domain model.
//!
//! # Responsibility
//! - Define the order input shape and its field rules.
//! - Define the stored order row and the joined order read model.
//!
//! # Invariants
//! - An order is derived from exactly one quote (`quote_id`).
//! - `total` is strictly positive; adjustment fields follow quote rules.

use crate::model::quote::{Adjustment, Quote, QuoteId};
use crate::model::receipt::Receipt;
use crate::model::validation::{
    check_positive, EnumField, ObjectReader, Schema, ValidationError, ViolationSink, NOT_POSITIVE,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type OrderId = Uuid;

/// Order fulfilment state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl EnumField for OrderStatus {
    const VARIANTS: &'static [(&'static str, Self)] = &[
        ("pending", Self::Pending),
        ("in_progress", Self::InProgress),
        ("completed", Self::Completed),
        ("cancelled", Self::Cancelled),
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Validated order payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub quote_id: QuoteId,
    #[serde(default)]
    pub status: OrderStatus,
    pub total: f64,
    #[serde(flatten)]
    pub adjustment: Adjustment,
}

impl NewOrder {
    /// Builds a pending order for `quote_id` without adjustments.
    pub fn for_quote(quote_id: QuoteId, total: f64) -> Self {
        Self {
            quote_id,
            status: OrderStatus::Pending,
            total,
            adjustment: Adjustment::default(),
        }
    }
}

impl Schema for NewOrder {
    fn parse_at(value: &Value, path: &str) -> Result<Self, ValidationError> {
        let mut reader = ObjectReader::new(value, path);
        let order = Self {
            quote_id: reader.uuid("quote_id"),
            status: reader.enum_or("status", OrderStatus::Pending),
            total: reader.positive_number("total", NOT_POSITIVE),
            adjustment: Adjustment::read(&mut reader),
        };
        reader.finish()?;
        Ok(order)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut sink = ViolationSink::default();
        sink.check("total", check_positive(self.total, NOT_POSITIVE));
        self.adjustment.check(&mut sink);
        sink.finish()
    }
}

/// Stored order row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub quote_id: QuoteId,
    pub status: OrderStatus,
    pub total: f64,
    #[serde(flatten)]
    pub adjustment: Adjustment,
    pub created_at: String,
    pub updated_at: String,
}

/// Order joined with its source quote and its receipts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    /// `None` only if the quote row vanished underneath the order.
    pub quote: Option<Quote>,
    pub receipts: Vec<Receipt>,
}
