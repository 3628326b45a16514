//! Receipt domain model.
//!
//! # Invariants
//! - `payment_percentage` stays within `[0, 100]`; `amount` is positive.
//! - `sent_at` is set only while `status == Sent`.

use crate::model::order::OrderId;
use crate::model::validation::{
    check_percentage, check_positive, EnumField, ObjectReader, Schema, ValidationError,
    ViolationSink, NOT_POSITIVE,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type ReceiptId = Uuid;

/// Receipt delivery state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    #[default]
    Draft,
    Sent,
}

impl EnumField for ReceiptStatus {
    const VARIANTS: &'static [(&'static str, Self)] = &[("draft", Self::Draft), ("sent", Self::Sent)];

    fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
        }
    }
}

/// Validated receipt payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReceipt {
    pub order_id: OrderId,
    pub payment_percentage: f64,
    pub amount: f64,
    #[serde(default)]
    pub status: ReceiptStatus,
}

impl Schema for NewReceipt {
    fn parse_at(value: &Value, path: &str) -> Result<Self, ValidationError> {
        let mut reader = ObjectReader::new(value, path);
        let receipt = Self {
            order_id: reader.uuid("order_id"),
            payment_percentage: reader.percentage("payment_percentage"),
            amount: reader.positive_number("amount", NOT_POSITIVE),
            status: reader.enum_or("status", ReceiptStatus::Draft),
        };
        reader.finish()?;
        Ok(receipt)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut sink = ViolationSink::default();
        sink.check(
            "payment_percentage",
            check_percentage(self.payment_percentage),
        );
        sink.check("amount", check_positive(self.amount, NOT_POSITIVE));
        sink.finish()
    }
}

/// Stored receipt row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub id: ReceiptId,
    pub order_id: OrderId,
    pub payment_percentage: f64,
    pub amount: f64,
    pub status: ReceiptStatus,
    /// Store clock reading taken when the receipt moved to `Sent`.
    pub sent_at: Option<String>,
    pub created_at: String,
}
