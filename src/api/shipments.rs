use poem::Request;
use poem_openapi::{
    param::Path,
    payload::{Json, PlainText},
    ApiResponse, Object, OpenApi,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::business::{OrchestrationResult, Shipment, ShipmentOrchestrator};
use crate::carrier::models::{CancelOutcome, PickupOutcome};
use crate::domain::OrderRequest;
use crate::error::AppError;
use crate::security::extract_operator_id;

pub struct ShipmentsApi {
    orchestrator: Arc<ShipmentOrchestrator>,
}

impl ShipmentsApi {
    pub fn new(orchestrator: Arc<ShipmentOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct ShipmentView {
    pub shipment_id: String,
    pub order_id: String,
    pub carrier_order_id: Option<String>,
    pub tracking_number: Option<String>,
    pub courier: Option<String>,
    pub quoted_rate: Option<f64>,
    pub label_url: Option<String>,
    pub pickup_scheduled: bool,
    pub state: String,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Shipment> for ShipmentView {
    fn from(shipment: Shipment) -> Self {
        Self {
            state: shipment.state.as_str().to_string(),
            created_at: shipment.created_at.to_rfc3339(),
            updated_at: shipment.updated_at.to_rfc3339(),
            shipment_id: shipment.shipment_id,
            order_id: shipment.order_id,
            carrier_order_id: shipment.carrier_order_id,
            tracking_number: shipment.tracking_number,
            courier: shipment.courier,
            quoted_rate: shipment.quoted_rate,
            label_url: shipment.label_url,
            pickup_scheduled: shipment.pickup_scheduled,
            error_message: shipment.error_message,
        }
    }
}

/// What happened to a submitted order.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, Object)]
pub struct ShipmentOutcome {
    /// One of `created`, `no_pickup_match`, `carrier_rejected`, `no_courier_available`,
    /// `duplicate_pending`.
    pub outcome: String,
    pub message: String,
    pub shipment: Option<ShipmentView>,
    pub courier: Option<String>,
    pub tracking_number: Option<String>,
    pub rate: Option<f64>,
    pub label_url: Option<String>,
    pub tracking_url: Option<String>,
    pub rejection_kind: Option<String>,
    pub carrier_message: Option<String>,
    pub draft_id: Option<String>,
    pub order_id: Option<String>,
}

#[derive(ApiResponse)]
pub enum CreateShipmentResponse {
    #[oai(status = 201)]
    Created(Json<ShipmentOutcome>),

    /// A recent order exists for this phone; confirm or discard the draft.
    #[oai(status = 202)]
    PendingConfirmation(Json<ShipmentOutcome>),

    #[oai(status = 422)]
    NotCreated(Json<ShipmentOutcome>),
}

impl From<OrchestrationResult> for CreateShipmentResponse {
    fn from(result: OrchestrationResult) -> Self {
        match result {
            OrchestrationResult::Success {
                shipment,
                courier,
                tracking_number,
                rate,
                label_url,
                tracking_url,
            } => {
                let message = match &label_url {
                    Some(_) => format!("Shipment created with {}", courier),
                    None => format!("Shipment created with {}; label not generated yet", courier),
                };
                CreateShipmentResponse::Created(Json(ShipmentOutcome {
                    outcome: "created".to_string(),
                    message,
                    order_id: Some(shipment.order_id.clone()),
                    shipment: Some(shipment.into()),
                    courier: Some(courier),
                    tracking_number: Some(tracking_number),
                    rate,
                    label_url,
                    tracking_url: Some(tracking_url),
                    ..Default::default()
                }))
            }
            OrchestrationResult::NoPickupMatch => {
                CreateShipmentResponse::NotCreated(Json(ShipmentOutcome {
                    outcome: "no_pickup_match".to_string(),
                    message: "No pickup location is registered on the carrier account".to_string(),
                    ..Default::default()
                }))
            }
            OrchestrationResult::CarrierRejected { reason } => {
                CreateShipmentResponse::NotCreated(Json(ShipmentOutcome {
                    outcome: "carrier_rejected".to_string(),
                    message: reason.kind.user_message().to_string(),
                    rejection_kind: Some(reason.kind.as_str().to_string()),
                    carrier_message: Some(reason.raw),
                    ..Default::default()
                }))
            }
            OrchestrationResult::NoCourierAvailable { shipment_id } => {
                CreateShipmentResponse::NotCreated(Json(ShipmentOutcome {
                    outcome: "no_courier_available".to_string(),
                    message: format!("No courier accepted shipment {}", shipment_id),
                    ..Default::default()
                }))
            }
            OrchestrationResult::DuplicateOrderPending { draft_id, draft } => {
                CreateShipmentResponse::PendingConfirmation(Json(ShipmentOutcome {
                    outcome: "duplicate_pending".to_string(),
                    message: "An order for this phone was placed recently. Confirm to create anyway."
                        .to_string(),
                    draft_id: Some(draft_id.to_string()),
                    order_id: Some(draft.payload.order_id),
                    ..Default::default()
                }))
            }
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, Object)]
pub struct PickupRequest {
    /// `YYYY-MM-DD`; the carrier picks the next slot when absent.
    pub pickup_date: Option<String>,
    pub time_slot_id: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct PickupOutcomeView {
    pub scheduled: bool,
    pub status: String,
    pub message: String,
}

impl From<PickupOutcome> for PickupOutcomeView {
    fn from(outcome: PickupOutcome) -> Self {
        Self {
            scheduled: outcome.scheduled,
            status: outcome.status.as_str().to_string(),
            message: outcome.message,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct CancelOutcomeView {
    pub cancelled: bool,
    pub message: String,
}

impl From<CancelOutcome> for CancelOutcomeView {
    fn from(outcome: CancelOutcome) -> Self {
        Self {
            cancelled: outcome.cancelled,
            message: outcome.message,
        }
    }
}

#[derive(ApiResponse)]
pub enum DiscardDraftResponse {
    #[oai(status = 204)]
    Discarded,
}

fn parse_draft_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::ValidationError(format!("Invalid draft id: {}", raw)))
}

#[OpenApi]
impl ShipmentsApi {
    /// Create a shipment from a structured order
    #[oai(path = "/shipments", method = "post")]
    async fn create_shipment(
        &self,
        req: &Request,
        body: Json<OrderRequest>,
    ) -> Result<CreateShipmentResponse, poem::Error> {
        let operator_id = extract_operator_id(req)?;
        info!(%operator_id, "Shipment requested");

        let result = self
            .orchestrator
            .create_shipment(&body.0)
            .await
            .map_err(AppError::from)?;
        Ok(result.into())
    }

    /// Create a shipment from a `Key: value` order block
    #[oai(path = "/shipments/labeled", method = "post")]
    async fn create_labeled_shipment(
        &self,
        req: &Request,
        body: PlainText<String>,
    ) -> Result<CreateShipmentResponse, poem::Error> {
        let operator_id = extract_operator_id(req)?;
        info!(%operator_id, "Labeled shipment requested");

        let order = OrderRequest::from_labeled_text(&body.0)
            .map_err(|e| AppError::ValidationError(e.to_string()))?;
        let result = self
            .orchestrator
            .create_shipment(&order)
            .await
            .map_err(AppError::from)?;
        Ok(result.into())
    }

    /// Submit a draft held by the duplicate check
    #[oai(path = "/shipments/drafts/:draft_id/confirm", method = "post")]
    async fn confirm_draft(
        &self,
        req: &Request,
        draft_id: Path<String>,
    ) -> Result<CreateShipmentResponse, poem::Error> {
        let operator_id = extract_operator_id(req)?;
        let draft_id = parse_draft_id(&draft_id.0)?;
        info!(%operator_id, %draft_id, "Draft confirmed");

        let result = self
            .orchestrator
            .confirm_draft(draft_id)
            .await
            .map_err(AppError::from)?;
        Ok(result.into())
    }

    #[oai(path = "/shipments/drafts/:draft_id", method = "delete")]
    async fn discard_draft(
        &self,
        req: &Request,
        draft_id: Path<String>,
    ) -> Result<DiscardDraftResponse, poem::Error> {
        extract_operator_id(req)?;
        let draft_id = parse_draft_id(&draft_id.0)?;
        self.orchestrator
            .discard_draft(draft_id)
            .map_err(AppError::from)?;
        Ok(DiscardDraftResponse::Discarded)
    }

    #[oai(path = "/shipments/:shipment_id", method = "get")]
    async fn get_shipment(
        &self,
        req: &Request,
        shipment_id: Path<String>,
    ) -> Result<Json<ShipmentView>, poem::Error> {
        extract_operator_id(req)?;
        let shipment = self
            .orchestrator
            .registry()
            .get(&shipment_id.0)
            .ok_or_else(|| AppError::NotFound(format!("Shipment {} not found", shipment_id.0)))?;
        Ok(Json(shipment.into()))
    }

    /// Request a courier pickup for a labelled shipment
    #[oai(path = "/shipments/:shipment_id/pickup", method = "post")]
    async fn schedule_pickup(
        &self,
        req: &Request,
        shipment_id: Path<String>,
        body: Json<PickupRequest>,
    ) -> Result<Json<PickupOutcomeView>, poem::Error> {
        let operator_id = extract_operator_id(req)?;
        info!(%operator_id, shipment_id = %shipment_id.0, "Pickup requested");

        let outcome = self
            .orchestrator
            .schedule_pickup(
                &shipment_id.0,
                body.0.pickup_date.as_deref(),
                body.0.time_slot_id.as_deref(),
            )
            .await
            .map_err(AppError::from)?;
        Ok(Json(outcome.into()))
    }

    #[oai(path = "/shipments/:shipment_id/cancel", method = "post")]
    async fn cancel_shipment(
        &self,
        req: &Request,
        shipment_id: Path<String>,
    ) -> Result<Json<CancelOutcomeView>, poem::Error> {
        let operator_id = extract_operator_id(req)?;
        info!(%operator_id, shipment_id = %shipment_id.0, "Cancellation requested");

        let outcome = self
            .orchestrator
            .cancel_shipment(&shipment_id.0)
            .await
            .map_err(AppError::from)?;
        Ok(Json(outcome.into()))
    }
}
