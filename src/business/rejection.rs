use serde::Serialize;

/// Why the carrier declined an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    InsufficientBalance,
    DuplicateOrderId,
    InvalidPickupLocation,
    Unserviceable,
    Other,
}

/// Checked top to bottom against the lowercased carrier text; first hit wins.
const REJECTION_PATTERNS: &[(&str, RejectionKind)] = &[
    ("insufficient balance", RejectionKind::InsufficientBalance),
    ("wallet balance", RejectionKind::InsufficientBalance),
    ("recharge", RejectionKind::InsufficientBalance),
    ("already exists", RejectionKind::DuplicateOrderId),
    ("invalid pickup", RejectionKind::InvalidPickupLocation),
    ("pickup location", RejectionKind::InvalidPickupLocation),
    ("not serviceable", RejectionKind::Unserviceable),
    ("unserviceable", RejectionKind::Unserviceable),
];

impl RejectionKind {
    pub fn classify(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        REJECTION_PATTERNS
            .iter()
            .find(|(pattern, _)| lower.contains(pattern))
            .map(|(_, kind)| *kind)
            .unwrap_or(RejectionKind::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionKind::InsufficientBalance => "insufficient_balance",
            RejectionKind::DuplicateOrderId => "duplicate_order_id",
            RejectionKind::InvalidPickupLocation => "invalid_pickup_location",
            RejectionKind::Unserviceable => "unserviceable",
            RejectionKind::Other => "other",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            RejectionKind::InsufficientBalance => {
                "Insufficient balance in the carrier wallet. Please recharge and try again."
            }
            RejectionKind::DuplicateOrderId => "An order with this id already exists.",
            RejectionKind::InvalidPickupLocation => {
                "The pickup location was not accepted by the carrier."
            }
            RejectionKind::Unserviceable => "The delivery pincode is not serviceable.",
            RejectionKind::Other => "The carrier rejected the order.",
        }
    }
}

/// A categorized carrier rejection. The carrier's own text is always kept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub raw: String,
}

impl Rejection {
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            kind: RejectionKind::classify(&raw),
            raw,
        }
    }
}
