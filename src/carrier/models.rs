use crate::carrier::extract::{
    as_f64, as_text, first_present, COURIER_ID_PATHS, ORDER_PHONE_PATHS, SERVICE_MODE_PATHS,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lowercase and drop every non-word character (anything but alphanumerics and `_`).
pub fn normalize_key(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// A registered origin address on the carrier account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupLocation {
    pub name: String,
    pub normalized_key: String,
    pub postal_code: String,
    pub raw: Value,
}

impl PickupLocation {
    /// Build from a `shipping_address` entry. Entries without a usable name are skipped.
    pub fn from_record(record: &Value) -> Option<Self> {
        let name = record.get("pickup_location").and_then(as_text)?;
        let normalized_key = normalize_key(&name);
        if normalized_key.is_empty() {
            return None;
        }
        let postal_code = first_present(record, &[&["pin_code"], &["pincode"]])
            .and_then(as_text)
            .unwrap_or_default();
        Some(Self {
            name,
            normalized_key,
            postal_code,
            raw: record.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    Surface,
    Air,
    Other,
}

impl ServiceMode {
    pub fn from_label(label: &str) -> Self {
        let lower = label.to_lowercase();
        if lower.contains("surface") {
            ServiceMode::Surface
        } else if lower.contains("air") {
            ServiceMode::Air
        } else {
            ServiceMode::Other
        }
    }

    /// Surface sorts before air, which sorts before anything else.
    pub fn preference(self) -> u8 {
        match self {
            ServiceMode::Surface => 0,
            ServiceMode::Air => 1,
            ServiceMode::Other => 2,
        }
    }
}

/// One entry of a serviceability quote. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourierCandidate {
    pub carrier_id: Option<String>,
    pub carrier_name: String,
    pub service_mode: ServiceMode,
    /// Mode text exactly as the carrier sent it.
    pub mode_label: String,
    pub quoted_rate: Option<f64>,
}

impl CourierCandidate {
    pub fn from_record(record: &Value) -> Option<Self> {
        if !record.is_object() {
            return None;
        }
        let carrier_name = record
            .get("courier_name")
            .and_then(as_text)
            .unwrap_or_default();
        let mode_label = first_present(record, SERVICE_MODE_PATHS)
            .and_then(as_text)
            .unwrap_or_default();
        Some(Self {
            carrier_id: first_present(record, COURIER_ID_PATHS).and_then(as_text),
            carrier_name,
            service_mode: ServiceMode::from_label(&mode_label),
            mode_label,
            quoted_rate: record.get("rate").and_then(as_f64),
        })
    }
}

/// What the carrier hands back from order creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentStub {
    pub order_id: Option<String>,
    pub shipment_id: String,
    pub status: Option<String>,
}

impl ShipmentStub {
    pub fn from_body(body: &Value) -> Option<Self> {
        Some(Self {
            shipment_id: body.get("shipment_id").and_then(as_text)?,
            order_id: body.get("order_id").and_then(as_text),
            status: body.get("status").and_then(as_text),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupStatus {
    Scheduled,
    AlreadyScheduled,
    AlreadyGenerated,
    Failed,
}

impl PickupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PickupStatus::Scheduled => "scheduled",
            PickupStatus::AlreadyScheduled => "already_scheduled",
            PickupStatus::AlreadyGenerated => "already_generated",
            PickupStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PickupOutcome {
    pub scheduled: bool,
    pub status: PickupStatus,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelOutcome {
    pub cancelled: bool,
    pub message: String,
}

/// A carrier order returned by the phone search used for duplicate detection.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentOrder {
    pub phone: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

const ORDER_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d %b %Y, %I:%M %p",
];

impl RecentOrder {
    pub fn from_record(record: &Value) -> Self {
        Self {
            phone: first_present(record, ORDER_PHONE_PATHS).and_then(as_text),
            created_at: record
                .get("created_at")
                .and_then(Value::as_str)
                .and_then(parse_order_date),
        }
    }
}

fn parse_order_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }
    ORDER_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub sku: String,
    pub units: u32,
    pub selling_price: f64,
    pub discount: String,
    pub tax: String,
    pub hsn: String,
}

/// The `orders/create/adhoc` document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierOrder {
    pub order_id: String,
    pub order_date: String,
    pub pickup_location: String,
    pub billing_customer_name: String,
    pub billing_last_name: String,
    pub billing_address: String,
    pub billing_address_2: String,
    pub billing_city: String,
    pub billing_state: String,
    pub billing_country: String,
    pub billing_pincode: String,
    pub billing_email: String,
    pub billing_isd_code: String,
    pub billing_phone: String,
    pub billing_alternate_phone: String,
    pub shipping_is_billing: bool,
    pub order_items: Vec<OrderItem>,
    pub payment_method: String,
    pub shipping_charges: f64,
    pub giftwrap_charges: f64,
    pub transaction_charges: f64,
    pub total_discount: f64,
    pub sub_total: f64,
    pub cod_amount: f64,
    pub length: f64,
    pub breadth: f64,
    pub height: f64,
    pub weight: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
}
