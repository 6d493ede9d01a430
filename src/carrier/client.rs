use crate::carrier::error::CarrierError;
use crate::carrier::extract::{
    as_f64, as_i64, as_text, at_path, first_present, is_truthy, AWB_CODE_PATH, PICKUP_ID_PATHS,
    PICKUP_STATUS_PATHS,
};
use crate::carrier::metrics::GatewayMetrics;
use crate::carrier::models::*;
use crate::carrier::token::TokenManager;
use crate::config::Config;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Status sentinels in the pickup response.
const PICKUP_STATUS_SCHEDULED: i64 = 1;
const PICKUP_STATUS_ALREADY_SCHEDULED: i64 = 3;

/// Everything the workflow needs from the carrier platform.
#[async_trait]
pub trait CarrierGateway: Send + Sync {
    async fn list_pickup_locations(&self) -> Result<Vec<PickupLocation>, CarrierError>;

    /// Serviceable couriers for a lane. Empty on any failure.
    async fn quote_couriers(
        &self,
        pickup_pin: &str,
        delivery_pin: &str,
        weight: f64,
        cod: bool,
    ) -> Vec<CourierCandidate>;

    /// Shipping charge estimate. `None` on any failure.
    async fn get_shipping_quote(
        &self,
        pickup_pin: &str,
        delivery_pin: &str,
        weight: f64,
        cod: bool,
    ) -> Option<f64>;

    async fn create_order(&self, order: &CarrierOrder) -> Result<ShipmentStub, CarrierError>;

    /// `Ok(None)` when the courier declined; errors only for transport or authentication.
    async fn assign_awb(
        &self,
        shipment_id: &str,
        courier_id: &str,
    ) -> Result<Option<String>, CarrierError>;

    async fn generate_label(&self, shipment_id: &str) -> Result<Option<String>, CarrierError>;

    async fn schedule_pickup(
        &self,
        shipment_ids: &[String],
        pickup_date: Option<&str>,
        time_slot_id: Option<&str>,
    ) -> Result<PickupOutcome, CarrierError>;

    async fn cancel_shipment(&self, shipment_id: &str) -> Result<CancelOutcome, CarrierError>;

    /// Carrier orders matching a phone number, newest first as the carrier returns them.
    async fn recent_orders(&self, phone: &str) -> Result<Vec<RecentOrder>, CarrierError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    PickupLocations,
    Serviceability,
    ShippingQuote,
    CreateOrder,
    AssignAwb,
    GenerateLabel,
    GeneratePickup,
    CancelShipment,
    RecentOrders,
}

impl Endpoint {
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::PickupLocations => "pickup_locations",
            Endpoint::Serviceability => "courier_serviceability",
            Endpoint::ShippingQuote => "shipping_quote",
            Endpoint::CreateOrder => "create_order",
            Endpoint::AssignAwb => "assign_awb",
            Endpoint::GenerateLabel => "generate_label",
            Endpoint::GeneratePickup => "generate_pickup",
            Endpoint::CancelShipment => "cancel_shipment",
            Endpoint::RecentOrders => "recent_orders",
        }
    }

    fn path(self) -> &'static str {
        match self {
            Endpoint::PickupLocations => "/settings/company/pickup",
            Endpoint::Serviceability => "/courier/serviceability/",
            Endpoint::ShippingQuote => "/courier/charge/calculate",
            Endpoint::CreateOrder => "/orders/create/adhoc",
            Endpoint::AssignAwb => "/courier/assign/awb",
            Endpoint::GenerateLabel => "/courier/generate/label",
            Endpoint::GeneratePickup => "/courier/generate/pickup",
            Endpoint::CancelShipment => "/orders/cancel/shipment/",
            Endpoint::RecentOrders => "/orders",
        }
    }

    fn method(self) -> Method {
        match self {
            Endpoint::PickupLocations
            | Endpoint::Serviceability
            | Endpoint::ShippingQuote
            | Endpoint::RecentOrders => Method::GET,
            _ => Method::POST,
        }
    }

    /// Lookups are quick; anything that books or renders needs more headroom.
    fn timeout(self) -> Duration {
        match self {
            Endpoint::PickupLocations
            | Endpoint::Serviceability
            | Endpoint::ShippingQuote
            | Endpoint::RecentOrders => Duration::from_secs(15),
            _ => Duration::from_secs(40),
        }
    }
}

/// Status and text of a carrier response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Option<Value> {
        serde_json::from_str(&self.body).ok()
    }
}

/// HTTP client for the carrier's external API.
pub struct CarrierClient {
    base_url: String,
    client: reqwest::Client,
    tokens: TokenManager,
    metrics: GatewayMetrics,
}

impl CarrierClient {
    pub fn new(config: &Config) -> Result<Self, CarrierError> {
        if config.carrier_email.trim().is_empty() {
            return Err(CarrierError::AuthenticationError(
                "carrier email is required".to_string(),
            ));
        }
        if !config.carrier_base_url.starts_with("http") {
            return Err(CarrierError::InvalidUrl(config.carrier_base_url.clone()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| CarrierError::transport("client_builder", e))?;

        let base_url = config.carrier_base_url.trim_end_matches('/').to_string();
        let tokens = TokenManager::new(
            client.clone(),
            &base_url,
            config.carrier_email.clone(),
            config.carrier_password.clone(),
            config.token_ttl(),
        );

        Ok(Self {
            base_url,
            client,
            tokens,
            metrics: GatewayMetrics::new(),
        })
    }

    /// Force a fresh login exchange.
    pub async fn login(&self) -> Result<SecretString, CarrierError> {
        self.tokens.get_token(true).await
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn metrics(&self) -> &GatewayMetrics {
        &self.metrics
    }

    fn build_url(&self, endpoint: Endpoint, suffix: &str) -> String {
        format!("{}{}{}", self.base_url, endpoint.path(), suffix)
    }

    /// Send one logical request. A 401 triggers one forced token refresh and one replay;
    /// a second 401 is an authentication failure.
    async fn dispatch<F>(
        &self,
        endpoint: Endpoint,
        suffix: &str,
        build: F,
    ) -> Result<RawResponse, CarrierError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let url = self.build_url(endpoint, suffix);
        let token = self.tokens.ensure_valid().await?;
        let response = self.send_once(endpoint, &url, &token, &build).await?;
        if response.status != 401 {
            return Ok(response);
        }

        warn!(endpoint = endpoint.name(), "Carrier rejected token, refreshing and replaying");
        self.metrics.record_auth_refresh();
        let token = self.tokens.get_token(true).await?;
        let replay = self.send_once(endpoint, &url, &token, &build).await?;
        if replay.status == 401 {
            error!(endpoint = endpoint.name(), "Carrier rejected a freshly issued token");
            self.tokens.invalidate();
            return Err(CarrierError::AuthenticationError(format!(
                "{} rejected a refreshed token: {}",
                endpoint.name(),
                replay.body
            )));
        }
        Ok(replay)
    }

    async fn send_once<F>(
        &self,
        endpoint: Endpoint,
        url: &str,
        token: &SecretString,
        build: &F,
    ) -> Result<RawResponse, CarrierError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        debug!(endpoint = endpoint.name(), "Calling carrier: {}", url);
        let start: Instant = self.metrics.record_request_start();

        let request = self
            .client
            .request(endpoint.method(), url)
            .timeout(endpoint.timeout())
            .bearer_auth(token.expose_secret());

        let response = match build(request).send().await {
            Ok(response) => response,
            Err(e) => {
                self.metrics.record_transport_error(start);
                error!(endpoint = endpoint.name(), error = %e, "Carrier request failed");
                return Err(CarrierError::transport(endpoint.name(), e));
            }
        };

        let status = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                self.metrics.record_transport_error(start);
                return Err(CarrierError::transport(endpoint.name(), e));
            }
        };

        let raw = RawResponse { status, body };
        if raw.is_success() {
            self.metrics.record_success(start);
        } else {
            self.metrics.record_failure(start);
        }
        Ok(raw)
    }

    fn rejected(endpoint: Endpoint, raw: RawResponse) -> CarrierError {
        error!(endpoint = endpoint.name(), status = raw.status, "Carrier API error: {}", raw.body);
        CarrierError::Rejected {
            endpoint: endpoint.name(),
            status: raw.status,
            body: raw.body,
        }
    }

    fn malformed(endpoint: Endpoint, raw: RawResponse) -> CarrierError {
        error!(endpoint = endpoint.name(), "Malformed carrier response: {}", raw.body);
        CarrierError::MalformedResponse {
            endpoint: endpoint.name(),
            body: raw.body,
        }
    }

    async fn lane_lookup(
        &self,
        endpoint: Endpoint,
        pickup_pin: &str,
        delivery_pin: &str,
        weight: f64,
        cod: bool,
    ) -> Result<Value, CarrierError> {
        let query = [
            ("pickup_postcode", pickup_pin.to_string()),
            ("delivery_postcode", delivery_pin.to_string()),
            ("cod", u8::from(cod).to_string()),
            ("weight", weight.to_string()),
        ];
        let raw = self
            .dispatch(endpoint, "", |req| req.query(&query))
            .await?;
        if !raw.is_success() {
            return Err(Self::rejected(endpoint, raw));
        }
        match raw.json() {
            Some(body) => Ok(body),
            None => Err(Self::malformed(endpoint, raw)),
        }
    }
}

/// Carrier ids are numeric in practice; send them as numbers when they parse.
fn id_value(id: &str) -> Value {
    id.parse::<i64>()
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(id))
}

#[async_trait]
impl CarrierGateway for CarrierClient {
    async fn list_pickup_locations(&self) -> Result<Vec<PickupLocation>, CarrierError> {
        let endpoint = Endpoint::PickupLocations;
        let raw = self.dispatch(endpoint, "", |req| req).await?;
        if !raw.is_success() {
            return Err(Self::rejected(endpoint, raw));
        }
        let body = match raw.json() {
            Some(body) => body,
            None => return Err(Self::malformed(endpoint, raw)),
        };

        let records = at_path(&body, &["data", "shipping_address"])
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let locations: Vec<PickupLocation> = records
            .iter()
            .filter_map(PickupLocation::from_record)
            .collect();

        if locations.len() < records.len() {
            warn!(
                skipped = records.len() - locations.len(),
                "Skipped malformed pickup location records"
            );
        }
        Ok(locations)
    }

    async fn quote_couriers(
        &self,
        pickup_pin: &str,
        delivery_pin: &str,
        weight: f64,
        cod: bool,
    ) -> Vec<CourierCandidate> {
        let body = match self
            .lane_lookup(Endpoint::Serviceability, pickup_pin, delivery_pin, weight, cod)
            .await
        {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Courier serviceability unavailable, treating as no couriers");
                return Vec::new();
            }
        };

        at_path(&body, &["data", "available_courier_companies"])
            .and_then(Value::as_array)
            .map(|records| {
                records
                    .iter()
                    .filter_map(CourierCandidate::from_record)
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn get_shipping_quote(
        &self,
        pickup_pin: &str,
        delivery_pin: &str,
        weight: f64,
        cod: bool,
    ) -> Option<f64> {
        match self
            .lane_lookup(Endpoint::ShippingQuote, pickup_pin, delivery_pin, weight, cod)
            .await
        {
            Ok(body) => at_path(&body, &["data", "rate"]).and_then(as_f64),
            Err(e) => {
                warn!(error = %e, "Shipping quote unavailable");
                None
            }
        }
    }

    async fn create_order(&self, order: &CarrierOrder) -> Result<ShipmentStub, CarrierError> {
        let endpoint = Endpoint::CreateOrder;
        info!(order_id = %order.order_id, "Creating carrier order");
        let raw = self.dispatch(endpoint, "", |req| req.json(order)).await?;
        if !raw.is_success() {
            return Err(Self::rejected(endpoint, raw));
        }
        let body = match raw.json() {
            Some(body) => body,
            None => return Err(Self::malformed(endpoint, raw)),
        };

        if let Some(code) = body.get("status_code").and_then(as_i64) {
            if code != 1 && code != 200 {
                return Err(Self::rejected(endpoint, raw));
            }
        }

        match ShipmentStub::from_body(&body) {
            Some(stub) => {
                info!(shipment_id = %stub.shipment_id, "Carrier order created");
                Ok(stub)
            }
            None => Err(Self::malformed(endpoint, raw)),
        }
    }

    async fn assign_awb(
        &self,
        shipment_id: &str,
        courier_id: &str,
    ) -> Result<Option<String>, CarrierError> {
        let endpoint = Endpoint::AssignAwb;
        let payload = json!({
            "shipment_id": id_value(shipment_id),
            "courier_id": id_value(courier_id),
        });
        let raw = self.dispatch(endpoint, "", |req| req.json(&payload)).await?;
        if !raw.is_success() {
            warn!(shipment_id, courier_id, status = raw.status, "AWB assignment declined: {}", raw.body);
            return Ok(None);
        }

        let awb = raw.json().and_then(|body| {
            let assigned = body.get("awb_assign_status").and_then(as_i64) == Some(1);
            if assigned {
                at_path(&body, AWB_CODE_PATH).and_then(as_text)
            } else {
                None
            }
        });
        if awb.is_none() {
            debug!(shipment_id, courier_id, "No AWB in assignment response: {}", raw.body);
        }
        Ok(awb)
    }

    async fn generate_label(&self, shipment_id: &str) -> Result<Option<String>, CarrierError> {
        let endpoint = Endpoint::GenerateLabel;
        let payload = json!({ "shipment_id": [id_value(shipment_id)] });
        let raw = self.dispatch(endpoint, "", |req| req.json(&payload)).await?;
        if !raw.is_success() {
            warn!(shipment_id, status = raw.status, "Label generation declined: {}", raw.body);
            return Ok(None);
        }

        Ok(raw.json().and_then(|body| {
            if body.get("label_created").and_then(as_i64) == Some(1) {
                body.get("label_url").and_then(as_text)
            } else {
                None
            }
        }))
    }

    async fn schedule_pickup(
        &self,
        shipment_ids: &[String],
        pickup_date: Option<&str>,
        time_slot_id: Option<&str>,
    ) -> Result<PickupOutcome, CarrierError> {
        let endpoint = Endpoint::GeneratePickup;
        let mut payload = json!({
            "shipment_id": shipment_ids.iter().map(|id| id_value(id)).collect::<Vec<_>>(),
        });
        if let Some(date) = pickup_date {
            payload["pickup_date"] = Value::from(date);
        }
        if let Some(slot) = time_slot_id {
            payload["time_slot_id"] = id_value(slot);
        }

        let raw = self.dispatch(endpoint, "", |req| req.json(&payload)).await?;
        let body = match raw.json() {
            Some(body) => body,
            None => {
                return Ok(PickupOutcome {
                    scheduled: false,
                    status: PickupStatus::Failed,
                    message: format!("Invalid response: {}", raw.body),
                })
            }
        };
        if raw.status != 200 {
            return Ok(PickupOutcome {
                scheduled: false,
                status: PickupStatus::Failed,
                message: format!("API error {}: {}", raw.status, body),
            });
        }
        Ok(interpret_pickup_response(&body))
    }

    async fn cancel_shipment(&self, shipment_id: &str) -> Result<CancelOutcome, CarrierError> {
        let endpoint = Endpoint::CancelShipment;
        // The id becomes a path segment.
        if shipment_id.is_empty() || !shipment_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(CarrierError::InvalidUrl(format!(
                "{}{}",
                endpoint.path(),
                shipment_id
            )));
        }
        let raw = self.dispatch(endpoint, shipment_id, |req| req).await?;
        if raw.status == 200 {
            info!(shipment_id, "Cancelled shipment");
            Ok(CancelOutcome {
                cancelled: true,
                message: "Shipment cancelled successfully".to_string(),
            })
        } else {
            error!(shipment_id, status = raw.status, "Cancel failed: {}", raw.body);
            Ok(CancelOutcome {
                cancelled: false,
                message: raw.body,
            })
        }
    }

    async fn recent_orders(&self, phone: &str) -> Result<Vec<RecentOrder>, CarrierError> {
        let endpoint = Endpoint::RecentOrders;
        let raw = self
            .dispatch(endpoint, "", |req| req.query(&[("search", phone)]))
            .await?;
        if !raw.is_success() {
            return Err(Self::rejected(endpoint, raw));
        }
        let body = match raw.json() {
            Some(body) => body,
            None => return Err(Self::malformed(endpoint, raw)),
        };
        Ok(body
            .get("data")
            .and_then(Value::as_array)
            .map(|records| records.iter().map(RecentOrder::from_record).collect())
            .unwrap_or_default())
    }
}

/// Read the pickup response, whose status may sit at the top level or under `response`.
pub fn interpret_pickup_response(body: &Value) -> PickupOutcome {
    let status = first_present(body, PICKUP_STATUS_PATHS).and_then(as_i64);
    let pickup_id = first_present(body, PICKUP_ID_PATHS).and_then(as_text);
    let scheduled_date = at_path(body, &["response", "pickup_scheduled_date"]).and_then(as_text);
    let details = at_path(body, &["response", "data"])
        .map(|v| as_text(v).unwrap_or_else(|| v.to_string()))
        .unwrap_or_default();

    let flagged = body.get("pickup_scheduled").map(is_truthy).unwrap_or(false);
    if flagged || status == Some(PICKUP_STATUS_SCHEDULED) {
        return PickupOutcome {
            scheduled: true,
            status: PickupStatus::Scheduled,
            message: format!(
                "Pickup scheduled successfully. Pickup ID: {}",
                pickup_id.as_deref().unwrap_or("N/A")
            ),
        };
    }

    if status == Some(PICKUP_STATUS_ALREADY_SCHEDULED) {
        return PickupOutcome {
            scheduled: true,
            status: PickupStatus::AlreadyScheduled,
            message: format!(
                "Pickup already scheduled for {}. {}",
                scheduled_date.as_deref().unwrap_or("an earlier date"),
                details
            )
            .trim_end()
            .to_string(),
        };
    }

    if body.to_string().to_lowercase().contains("already generated") {
        return PickupOutcome {
            scheduled: false,
            status: PickupStatus::AlreadyGenerated,
            message: format!("Pickup already generated. {}", details)
                .trim_end()
                .to_string(),
        };
    }

    PickupOutcome {
        scheduled: false,
        status: PickupStatus::Failed,
        message: format!("Pickup not scheduled: {}", body),
    }
}
