use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

/// Shipment state in the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentState {
    /// Carrier order created, no courier yet
    Created,
    /// A courier accepted the AWB assignment
    Assigned,
    /// Shipping label generated
    Labelled,
    /// Pickup requested from the courier
    PickupScheduled,
    /// No courier accepted the shipment
    Failed,
    Cancelled,
}

impl ShipmentState {
    pub fn can_transition_to(&self, new_state: ShipmentState) -> bool {
        match (self, new_state) {
            (ShipmentState::Created, ShipmentState::Assigned) => true,
            (ShipmentState::Created, ShipmentState::Failed) => true,
            (ShipmentState::Assigned, ShipmentState::Labelled) => true,
            (ShipmentState::Labelled, ShipmentState::PickupScheduled) => true,

            (from, ShipmentState::Cancelled) => !from.is_terminal(),

            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentState::Created => "created",
            ShipmentState::Assigned => "assigned",
            ShipmentState::Labelled => "labelled",
            ShipmentState::PickupScheduled => "pickup_scheduled",
            ShipmentState::Failed => "failed",
            ShipmentState::Cancelled => "cancelled",
        }
    }

    /// Failed shipments are never retried automatically.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ShipmentState::Failed | ShipmentState::Cancelled)
    }
}

/// Everything known locally about one carrier shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shipment {
    pub shipment_id: String,
    /// Our order reference, as sent in the order payload.
    pub order_id: String,
    pub carrier_order_id: Option<String>,
    pub tracking_number: Option<String>,
    pub courier: Option<String>,
    pub quoted_rate: Option<f64>,
    pub label_url: Option<String>,
    pub pickup_scheduled: bool,
    pub state: ShipmentState,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shipment {
    pub fn new(shipment_id: String, order_id: String, carrier_order_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            shipment_id,
            order_id,
            carrier_order_id,
            tracking_number: None,
            courier: None,
            quoted_rate: None,
            label_url: None,
            pickup_scheduled: false,
            state: ShipmentState::Created,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition_to(&mut self, new_state: ShipmentState) -> Result<(), WorkflowError> {
        if !self.state.can_transition_to(new_state) {
            return Err(WorkflowError::InvalidTransition {
                from: self.state,
                to: new_state,
            });
        }

        self.state = new_state;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_assigned(
        &mut self,
        courier: String,
        tracking_number: String,
        quoted_rate: Option<f64>,
    ) -> Result<(), WorkflowError> {
        self.transition_to(ShipmentState::Assigned)?;
        self.courier = Some(courier);
        self.tracking_number = Some(tracking_number);
        self.quoted_rate = quoted_rate;
        Ok(())
    }

    /// Labels only exist for shipments that already carry a tracking number.
    pub fn mark_labelled(&mut self, label_url: String) -> Result<(), WorkflowError> {
        if self.tracking_number.is_none() {
            return Err(WorkflowError::MissingTrackingNumber(self.shipment_id.clone()));
        }
        self.transition_to(ShipmentState::Labelled)?;
        self.label_url = Some(label_url);
        Ok(())
    }

    pub fn mark_pickup_scheduled(&mut self) -> Result<(), WorkflowError> {
        self.transition_to(ShipmentState::PickupScheduled)?;
        self.pickup_scheduled = true;
        Ok(())
    }

    pub fn mark_failed(&mut self, error: String) -> Result<(), WorkflowError> {
        self.transition_to(ShipmentState::Failed)?;
        self.error_message = Some(error);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WorkflowError {
    #[error("Cannot transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: ShipmentState,
        to: ShipmentState,
    },
    #[error("Shipment not found: {0}")]
    ShipmentNotFound(String),
    #[error("Shipment {0} has no tracking number")]
    MissingTrackingNumber(String),
}

/// In-process record of shipments created through this service, including the
/// tracking number each one was assigned.
pub struct ShipmentRegistry {
    shipments: RwLock<HashMap<String, Shipment>>,
}

impl Default for ShipmentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ShipmentRegistry {
    pub fn new() -> Self {
        Self {
            shipments: RwLock::new(HashMap::new()),
        }
    }

    pub fn record_created(
        &self,
        shipment_id: &str,
        order_id: &str,
        carrier_order_id: Option<String>,
    ) -> Shipment {
        let shipment = Shipment::new(shipment_id.to_string(), order_id.to_string(), carrier_order_id);
        self.shipments
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(shipment_id.to_string(), shipment.clone());
        shipment
    }

    pub fn get(&self, shipment_id: &str) -> Option<Shipment> {
        self.shipments
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(shipment_id)
            .cloned()
    }

    /// Apply a change to a stored shipment and return the updated copy.
    pub fn update<F>(&self, shipment_id: &str, change: F) -> Result<Shipment, WorkflowError>
    where
        F: FnOnce(&mut Shipment) -> Result<(), WorkflowError>,
    {
        let mut shipments = self
            .shipments
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let shipment = shipments
            .get_mut(shipment_id)
            .ok_or_else(|| WorkflowError::ShipmentNotFound(shipment_id.to_string()))?;
        change(shipment)?;
        Ok(shipment.clone())
    }

    pub fn by_state(&self, state: ShipmentState) -> Vec<Shipment> {
        self.shipments
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .filter(|s| s.state == state)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.shipments
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
