//! In-process gateway double for engine and orchestrator tests.

use crate::carrier::models::*;
use crate::carrier::{CarrierError, CarrierGateway};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub enum AwbReply {
    Accept(String),
    Decline,
    Transport,
    Unauthorized,
}

#[derive(Debug, Clone)]
pub enum CreateReply {
    Created(ShipmentStub),
    Rejected(String),
}

pub fn transport_error(endpoint: &'static str) -> CarrierError {
    let source = reqwest::Client::new()
        .get("not a url")
        .build()
        .unwrap_err();
    CarrierError::transport(endpoint, source)
}

pub struct FakeGateway {
    pickups: Vec<PickupLocation>,
    fail_pickups: AtomicBool,
    candidates: Vec<CourierCandidate>,
    awb_replies: HashMap<String, AwbReply>,
    awb_calls: Mutex<Vec<String>>,
    quote: Option<f64>,
    create_reply: Mutex<CreateReply>,
    create_calls: Mutex<Vec<CarrierOrder>>,
    label_url: Option<String>,
    label_calls: Mutex<Vec<String>>,
    recent: Mutex<Result<Vec<RecentOrder>, String>>,
    pickup_outcome: PickupOutcome,
    pickup_calls: Mutex<Vec<Vec<String>>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            pickups: Vec::new(),
            fail_pickups: AtomicBool::new(false),
            candidates: Vec::new(),
            awb_replies: HashMap::new(),
            awb_calls: Mutex::new(Vec::new()),
            quote: None,
            create_reply: Mutex::new(CreateReply::Created(ShipmentStub {
                order_id: Some("1001".to_string()),
                shipment_id: "5678".to_string(),
                status: Some("NEW".to_string()),
            })),
            create_calls: Mutex::new(Vec::new()),
            label_url: None,
            label_calls: Mutex::new(Vec::new()),
            recent: Mutex::new(Ok(Vec::new())),
            pickup_outcome: PickupOutcome {
                scheduled: true,
                status: PickupStatus::Scheduled,
                message: "Pickup scheduled successfully. Pickup ID: 77".to_string(),
            },
            pickup_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_pickups(mut self, pickups: Vec<PickupLocation>) -> Self {
        self.pickups = pickups;
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<CourierCandidate>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_awb(mut self, courier_id: &str, reply: AwbReply) -> Self {
        self.awb_replies.insert(courier_id.to_string(), reply);
        self
    }

    pub fn with_quote(mut self, rate: f64) -> Self {
        self.quote = Some(rate);
        self
    }

    pub fn with_label(mut self, url: &str) -> Self {
        self.label_url = Some(url.to_string());
        self
    }

    pub fn with_pickup_outcome(mut self, outcome: PickupOutcome) -> Self {
        self.pickup_outcome = outcome;
        self
    }

    pub fn reject_orders(&self, body: &str) {
        *self.create_reply.lock().unwrap() = CreateReply::Rejected(body.to_string());
    }

    pub fn set_recent_orders(&self, orders: Vec<RecentOrder>) {
        *self.recent.lock().unwrap() = Ok(orders);
    }

    pub fn fail_recent_orders(&self) {
        *self.recent.lock().unwrap() = Err("search unavailable".to_string());
    }

    pub fn fail_pickup_listing(&self) {
        self.fail_pickups.store(true, Ordering::SeqCst);
    }

    pub fn awb_calls(&self) -> Vec<String> {
        self.awb_calls.lock().unwrap().clone()
    }

    pub fn created_orders(&self) -> Vec<CarrierOrder> {
        self.create_calls.lock().unwrap().clone()
    }

    pub fn label_calls(&self) -> Vec<String> {
        self.label_calls.lock().unwrap().clone()
    }

    pub fn pickup_calls(&self) -> Vec<Vec<String>> {
        self.pickup_calls.lock().unwrap().clone()
    }
}

pub fn candidate(id: Option<&str>, name: &str, mode: &str, rate: Option<f64>) -> CourierCandidate {
    CourierCandidate {
        carrier_id: id.map(str::to_string),
        carrier_name: name.to_string(),
        service_mode: ServiceMode::from_label(mode),
        mode_label: mode.to_string(),
        quoted_rate: rate,
    }
}

#[async_trait]
impl CarrierGateway for FakeGateway {
    async fn list_pickup_locations(&self) -> Result<Vec<PickupLocation>, CarrierError> {
        if self.fail_pickups.load(Ordering::SeqCst) {
            return Err(transport_error("pickup_locations"));
        }
        Ok(self.pickups.clone())
    }

    async fn quote_couriers(&self, _: &str, _: &str, _: f64, _: bool) -> Vec<CourierCandidate> {
        self.candidates.clone()
    }

    async fn get_shipping_quote(&self, _: &str, _: &str, _: f64, _: bool) -> Option<f64> {
        self.quote
    }

    async fn create_order(&self, order: &CarrierOrder) -> Result<ShipmentStub, CarrierError> {
        self.create_calls.lock().unwrap().push(order.clone());
        match self.create_reply.lock().unwrap().clone() {
            CreateReply::Created(stub) => Ok(stub),
            CreateReply::Rejected(body) => Err(CarrierError::Rejected {
                endpoint: "create_order",
                status: 422,
                body,
            }),
        }
    }

    async fn assign_awb(
        &self,
        _shipment_id: &str,
        courier_id: &str,
    ) -> Result<Option<String>, CarrierError> {
        self.awb_calls.lock().unwrap().push(courier_id.to_string());
        match self.awb_replies.get(courier_id) {
            Some(AwbReply::Accept(awb)) => Ok(Some(awb.clone())),
            Some(AwbReply::Transport) => Err(transport_error("assign_awb")),
            Some(AwbReply::Unauthorized) => Err(CarrierError::AuthenticationError(
                "assign_awb rejected a refreshed token".to_string(),
            )),
            Some(AwbReply::Decline) | None => Ok(None),
        }
    }

    async fn generate_label(&self, shipment_id: &str) -> Result<Option<String>, CarrierError> {
        self.label_calls.lock().unwrap().push(shipment_id.to_string());
        Ok(self.label_url.clone())
    }

    async fn schedule_pickup(
        &self,
        shipment_ids: &[String],
        _pickup_date: Option<&str>,
        _time_slot_id: Option<&str>,
    ) -> Result<PickupOutcome, CarrierError> {
        self.pickup_calls.lock().unwrap().push(shipment_ids.to_vec());
        Ok(self.pickup_outcome.clone())
    }

    async fn cancel_shipment(&self, _shipment_id: &str) -> Result<CancelOutcome, CarrierError> {
        Ok(CancelOutcome {
            cancelled: true,
            message: "Shipment cancelled successfully".to_string(),
        })
    }

    async fn recent_orders(&self, _phone: &str) -> Result<Vec<RecentOrder>, CarrierError> {
        self.recent
            .lock()
            .unwrap()
            .clone()
            .map_err(|_| transport_error("recent_orders"))
    }
}
