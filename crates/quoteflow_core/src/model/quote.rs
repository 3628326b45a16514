//! Quote, space and item domain model.
//!
//! # Responsibility
//! - Define quote input shapes and their field rules.
//! - Define the stored row shapes returned by the quote repository.
//!
//! # Invariants
//! - `total` and `adjusted_total` are strictly positive.
//! - `adjustment_percentage` stays within `[0, 100]`.
//! - Spaces belong to exactly one quote; items to exactly one space.

use crate::model::validation::{
    check_email, check_non_empty, check_percentage, check_positive, EnumField, ObjectReader,
    Schema, ValidationError, ViolationSink, NOT_POSITIVE,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type QuoteId = Uuid;
pub type SpaceId = Uuid;
pub type ItemId = Uuid;

const CLIENT_NAME_REQUIRED: &str = "Client name is required";
const PHONE_REQUIRED: &str = "Phone number is required";
const PROJECT_NAME_REQUIRED: &str = "Project name is required";
const ADDRESS_REQUIRED: &str = "Installation address is required";
const TOTAL_NOT_POSITIVE: &str = "Total must be greater than 0";
const SPACE_NAME_REQUIRED: &str = "Space name is required";
const PRODUCT_REQUIRED: &str = "Product is required";
const MATERIAL_REQUIRED: &str = "Material is required";
const PRICE_NOT_POSITIVE: &str = "Price must be greater than 0";

/// Quote lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    #[default]
    Draft,
    Pending,
    Approved,
    Rejected,
}

impl EnumField for QuoteStatus {
    const VARIANTS: &'static [(&'static str, Self)] = &[
        ("draft", Self::Draft),
        ("pending", Self::Pending),
        ("approved", Self::Approved),
        ("rejected", Self::Rejected),
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// Direction of a manual price adjustment. Shared by quotes and orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    Discount,
    Surcharge,
}

impl EnumField for AdjustmentType {
    const VARIANTS: &'static [(&'static str, Self)] =
        &[("discount", Self::Discount), ("surcharge", Self::Surcharge)];

    fn as_str(self) -> &'static str {
        match self {
            Self::Discount => "discount",
            Self::Surcharge => "surcharge",
        }
    }
}

/// Optional adjustment block mirrored by quotes and orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment_type: Option<AdjustmentType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjusted_total: Option<f64>,
}

impl Adjustment {
    pub(crate) fn read(reader: &mut ObjectReader<'_>) -> Self {
        Self {
            adjustment_type: reader.optional_enum("adjustment_type"),
            adjustment_percentage: reader.optional_percentage("adjustment_percentage"),
            adjusted_total: reader.optional_positive_number("adjusted_total"),
        }
    }

    pub(crate) fn check(&self, sink: &mut ViolationSink) {
        if let Some(percentage) = self.adjustment_percentage {
            sink.check("adjustment_percentage", check_percentage(percentage));
        }
        if let Some(adjusted_total) = self.adjusted_total {
            sink.check(
                "adjusted_total",
                check_positive(adjusted_total, NOT_POSITIVE),
            );
        }
    }
}

/// Validated quote payload, ready for insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuote {
    pub client_name: String,
    pub email: String,
    pub phone: String,
    pub project_name: String,
    pub installation_address: String,
    #[serde(default)]
    pub status: QuoteStatus,
    pub total: f64,
    #[serde(flatten)]
    pub adjustment: Adjustment,
}

impl Schema for NewQuote {
    fn parse_at(value: &Value, path: &str) -> Result<Self, ValidationError> {
        let mut reader = ObjectReader::new(value, path);
        let quote = Self {
            client_name: reader.non_empty_string("client_name", CLIENT_NAME_REQUIRED),
            email: reader.email("email"),
            phone: reader.non_empty_string("phone", PHONE_REQUIRED),
            project_name: reader.non_empty_string("project_name", PROJECT_NAME_REQUIRED),
            installation_address: reader
                .non_empty_string("installation_address", ADDRESS_REQUIRED),
            status: reader.enum_or("status", QuoteStatus::Draft),
            total: reader.positive_number("total", TOTAL_NOT_POSITIVE),
            adjustment: Adjustment::read(&mut reader),
        };
        reader.finish()?;
        Ok(quote)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut sink = ViolationSink::default();
        sink.check(
            "client_name",
            check_non_empty(&self.client_name, CLIENT_NAME_REQUIRED),
        );
        sink.check("email", check_email(&self.email));
        sink.check("phone", check_non_empty(&self.phone, PHONE_REQUIRED));
        sink.check(
            "project_name",
            check_non_empty(&self.project_name, PROJECT_NAME_REQUIRED),
        );
        sink.check(
            "installation_address",
            check_non_empty(&self.installation_address, ADDRESS_REQUIRED),
        );
        sink.check("total", check_positive(self.total, TOTAL_NOT_POSITIVE));
        self.adjustment.check(&mut sink);
        sink.finish()
    }
}

/// One item line inside a space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub product_id: String,
    pub material: String,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub price: f64,
}

impl Schema for NewItem {
    fn parse_at(value: &Value, path: &str) -> Result<Self, ValidationError> {
        let mut reader = ObjectReader::new(value, path);
        let item = Self {
            product_id: reader.non_empty_string("product_id", PRODUCT_REQUIRED),
            material: reader.non_empty_string("material", MATERIAL_REQUIRED),
            width: reader.positive_number("width", NOT_POSITIVE),
            height: reader.positive_number("height", NOT_POSITIVE),
            depth: reader.positive_number("depth", NOT_POSITIVE),
            price: reader.positive_number("price", PRICE_NOT_POSITIVE),
        };
        reader.finish()?;
        Ok(item)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut sink = ViolationSink::default();
        sink.check(
            "product_id",
            check_non_empty(&self.product_id, PRODUCT_REQUIRED),
        );
        sink.check(
            "material",
            check_non_empty(&self.material, MATERIAL_REQUIRED),
        );
        sink.check("width", check_positive(self.width, NOT_POSITIVE));
        sink.check("height", check_positive(self.height, NOT_POSITIVE));
        sink.check("depth", check_positive(self.depth, NOT_POSITIVE));
        sink.check("price", check_positive(self.price, PRICE_NOT_POSITIVE));
        sink.finish()
    }
}

/// One named space with its ordered items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSpace {
    pub name: String,
    #[serde(default)]
    pub items: Vec<NewItem>,
}

impl NewSpace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn with_item(mut self, item: NewItem) -> Self {
        self.items.push(item);
        self
    }
}

impl Schema for NewSpace {
    fn parse_at(value: &Value, path: &str) -> Result<Self, ValidationError> {
        let mut reader = ObjectReader::new(value, path);
        let name = reader.non_empty_string("name", SPACE_NAME_REQUIRED);

        let mut items = Vec::new();
        for (index, raw_item) in reader.optional_array("items").iter().enumerate() {
            let item_path = reader.path(&format!("items.{index}"));
            match NewItem::parse_at(raw_item, &item_path) {
                Ok(item) => items.push(item),
                Err(err) => reader.absorb(err),
            }
        }

        reader.finish()?;
        Ok(Self { name, items })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let mut sink = ViolationSink::default();
        sink.check("name", check_non_empty(&self.name, SPACE_NAME_REQUIRED));
        for (index, item) in self.items.iter().enumerate() {
            if let Err(err) = item.validate() {
                sink.absorb(&format!("items.{index}"), err);
            }
        }
        sink.finish()
    }
}

/// Stored quote row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    /// Authenticated caller that created the quote.
    pub user_id: Uuid,
    pub client_name: String,
    pub email: String,
    pub phone: String,
    pub project_name: String,
    pub installation_address: String,
    pub status: QuoteStatus,
    pub total: f64,
    #[serde(flatten)]
    pub adjustment: Adjustment,
    pub created_at: String,
    pub updated_at: String,
}

/// Stored space row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Space {
    pub id: SpaceId,
    pub quote_id: QuoteId,
    pub name: String,
    /// Zero-based order within the quote.
    pub position: i64,
    pub created_at: String,
}

/// Stored item row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub space_id: SpaceId,
    pub product_id: String,
    pub material: String,
    pub width: f64,
    pub height: f64,
    pub depth: f64,
    pub price: f64,
    /// Zero-based order within the space.
    pub position: i64,
    pub created_at: String,
}
