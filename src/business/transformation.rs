use crate::carrier::models::{CarrierOrder, OrderItem, PickupLocation};
use crate::domain::{OrderRequest, ProductDimensions};
use chrono::{DateTime, Local};

const BILLING_COUNTRY: &str = "India";
const BILLING_ISD_CODE: &str = "91";
/// The carrier requires an email; customers rarely give one.
const PLACEHOLDER_EMAIL: &str = "na@example.com";

/// Compose the carrier order document from a validated order.
pub struct OrderTransformer {
    channel_id: Option<String>,
}

impl Default for OrderTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderTransformer {
    pub fn new() -> Self {
        Self { channel_id: None }
    }

    /// Orders are tagged with this sales channel on the carrier side.
    pub fn with_channel_id(channel_id: Option<String>) -> Self {
        Self { channel_id }
    }

    pub fn transform_order(
        &self,
        order: &OrderRequest,
        pickup: &PickupLocation,
        dimensions: ProductDimensions,
        shipping_charges: f64,
    ) -> CarrierOrder {
        self.transform_order_at(order, pickup, dimensions, shipping_charges, Local::now())
    }

    pub fn transform_order_at(
        &self,
        order: &OrderRequest,
        pickup: &PickupLocation,
        dimensions: ProductDimensions,
        shipping_charges: f64,
        now: DateTime<Local>,
    ) -> CarrierOrder {
        let cod_amount = if order.payment_mode.is_cod() {
            order.amount
        } else {
            0.0
        };

        CarrierOrder {
            order_id: generate_order_id(now.timestamp()),
            order_date: now.format("%Y-%m-%dT%H:%M:%S").to_string(),
            pickup_location: pickup.name.clone(),
            billing_customer_name: order.customer_name.clone(),
            billing_last_name: ".".to_string(),
            billing_address: order.address.clone(),
            billing_address_2: String::new(),
            billing_city: order.city.clone(),
            billing_state: order.state.clone(),
            billing_country: BILLING_COUNTRY.to_string(),
            billing_pincode: order.pincode.clone(),
            billing_email: PLACEHOLDER_EMAIL.to_string(),
            billing_isd_code: BILLING_ISD_CODE.to_string(),
            billing_phone: order.phone.clone(),
            billing_alternate_phone: order.alternate_phone.clone().unwrap_or_default(),
            shipping_is_billing: true,
            order_items: vec![OrderItem {
                name: order.product.clone(),
                sku: order.product.clone(),
                units: order.quantity,
                selling_price: order.amount,
                discount: "0".to_string(),
                tax: "0".to_string(),
                hsn: String::new(),
            }],
            payment_method: order.payment_mode.as_str().to_string(),
            shipping_charges,
            giftwrap_charges: 0.0,
            transaction_charges: 0.0,
            total_discount: 0.0,
            sub_total: order.amount,
            cod_amount,
            length: dimensions.length,
            breadth: dimensions.breadth,
            height: dimensions.height,
            weight: dimensions.weight,
            channel_id: self.channel_id.clone(),
        }
    }
}

/// `ORDER{unix seconds}_{6 hex}`.
fn generate_order_id(unix_seconds: i64) -> String {
    format!("ORDER{}_{:06x}", unix_seconds, fastrand::u32(..0x0100_0000))
}
