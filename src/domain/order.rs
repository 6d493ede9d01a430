use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Enum)]
pub enum PaymentMode {
    #[oai(rename = "Prepaid")]
    Prepaid,
    #[oai(rename = "COD")]
    COD,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMode::Prepaid => "Prepaid",
            PaymentMode::COD => "COD",
        }
    }

    pub fn is_cod(&self) -> bool {
        matches!(self, PaymentMode::COD)
    }
}

/// A customer order as the operator submits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Object)]
pub struct OrderRequest {
    pub customer_name: String,
    pub phone: String,
    pub alternate_phone: Option<String>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    /// Product name, looked up in the product catalog for dimensions.
    pub product: String,
    #[oai(default = "default_quantity")]
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    pub payment_mode: PaymentMode,
    /// Order value. Collected on delivery for COD orders.
    pub amount: f64,
    /// Free-text pickup label matched against the account's pickup addresses.
    pub pickup_label: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OrderParseError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
}

impl OrderRequest {
    /// Parse the `Key: value` block produced by the address formatter.
    ///
    /// Keys are case-insensitive. City falls back to District. Name defaults to
    /// "Customer" and Quantity to 1.
    pub fn from_labeled_text(text: &str) -> Result<Self, OrderParseError> {
        let fields: HashMap<String, String> = text
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(key, value)| (key.trim().to_lowercase(), value.trim().to_string()))
            .filter(|(_, value)| !value.is_empty())
            .collect();

        let field = |key: &str| fields.get(key).cloned();
        let required = |key: &'static str| field(key).ok_or(OrderParseError::MissingField(key));

        let quantity = match field("quantity") {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| OrderParseError::InvalidQuantity(raw.clone()))?,
            None => default_quantity(),
        };

        let (payment_mode, amount) = parse_payment(field("prepaid/cod").as_deref().unwrap_or(""));

        Ok(Self {
            customer_name: field("name").unwrap_or_else(|| "Customer".to_string()),
            phone: required("phone")?,
            alternate_phone: field("alternate phone"),
            address: required("address")?,
            city: field("city").or_else(|| field("district")).unwrap_or_default(),
            state: field("state").unwrap_or_default(),
            pincode: required("pincode")?,
            product: field("product").unwrap_or_default(),
            quantity,
            payment_mode,
            amount,
            pickup_label: field("pickup"),
        })
    }
}

/// Read `<prepaid|cod> <amount>`, case-insensitive. Anything else is Prepaid 0.
pub fn parse_payment(raw: &str) -> (PaymentMode, f64) {
    let lower = raw.trim().to_lowercase();
    let (mode, rest) = if let Some(rest) = lower.strip_prefix("prepaid") {
        (PaymentMode::Prepaid, rest)
    } else if let Some(rest) = lower.strip_prefix("cod") {
        (PaymentMode::COD, rest)
    } else {
        return (PaymentMode::Prepaid, 0.0);
    };

    if !rest.starts_with(char::is_whitespace) {
        return (PaymentMode::Prepaid, 0.0);
    }

    let number: String = rest
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    match number.parse::<f64>() {
        Ok(amount) if number.starts_with(|c: char| c.is_ascii_digit()) => (mode, amount),
        _ => (PaymentMode::Prepaid, 0.0),
    }
}

/// Digits only; exactly ten of them, starting with 6-9.
pub fn strict_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let valid = digits.len() == 10 && digits.starts_with(['6', '7', '8', '9']);
    valid.then_some(digits)
}
