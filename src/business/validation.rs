use crate::domain::{strict_phone, OrderRequest};
use crate::error::AppError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Customer name cannot be empty")]
    EmptyName,
    #[error("Customer name exceeds maximum length of {0} characters")]
    NameTooLong(usize),
    #[error("Address cannot be empty")]
    EmptyAddress,
    #[error("Address exceeds maximum length of {0} characters")]
    AddressTooLong(usize),
    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),
    #[error("Invalid pincode: {0}")]
    InvalidPincode(String),
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Amount cannot be negative")]
    NegativeAmount,
    #[error("Invalid shipment id: {0}")]
    InvalidShipmentId(String),
}

/// Business rules for order validation
pub struct OrderValidator {
    max_name_length: usize,
    max_address_length: usize,
}

impl Default for OrderValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderValidator {
    pub fn new() -> Self {
        Self {
            max_name_length: 100,
            max_address_length: 200,
        }
    }

    /// Validate an order and return a copy with phone numbers normalized.
    ///
    /// An unusable alternate phone is dropped rather than rejected.
    pub fn validate_order(&self, order: &OrderRequest) -> Result<OrderRequest, ValidationError> {
        self.validate_name(&order.customer_name)?;
        self.validate_address(&order.address)?;
        self.validate_pincode(&order.pincode)?;

        let phone = strict_phone(&order.phone)
            .ok_or_else(|| ValidationError::InvalidPhone(order.phone.clone()))?;

        if order.quantity < 1 {
            return Err(ValidationError::InvalidQuantity);
        }
        if order.amount < 0.0 || order.amount.is_nan() {
            return Err(ValidationError::NegativeAmount);
        }

        Ok(OrderRequest {
            customer_name: order.customer_name.trim().to_string(),
            phone,
            alternate_phone: order.alternate_phone.as_deref().and_then(strict_phone),
            pincode: order.pincode.trim().to_string(),
            ..order.clone()
        })
    }

    pub fn validate_name(&self, name: &str) -> Result<(), ValidationError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if trimmed.chars().count() > self.max_name_length {
            return Err(ValidationError::NameTooLong(self.max_name_length));
        }
        Ok(())
    }

    pub fn validate_address(&self, address: &str) -> Result<(), ValidationError> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyAddress);
        }
        if trimmed.chars().count() > self.max_address_length {
            return Err(ValidationError::AddressTooLong(self.max_address_length));
        }
        Ok(())
    }

    /// Indian postal codes: six digits, no leading zero.
    pub fn validate_pincode(&self, pincode: &str) -> Result<(), ValidationError> {
        let trimmed = pincode.trim();
        let valid = trimmed.len() == 6
            && trimmed.chars().all(|c| c.is_ascii_digit())
            && !trimmed.starts_with('0');
        if valid {
            Ok(())
        } else {
            Err(ValidationError::InvalidPincode(pincode.to_string()))
        }
    }
}

/// Carrier shipment ids are numeric. Anything else never reaches a carrier URL.
pub fn validate_shipment_id(shipment_id: &str) -> Result<(), ValidationError> {
    if !shipment_id.is_empty() && shipment_id.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidShipmentId(shipment_id.to_string()))
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}
