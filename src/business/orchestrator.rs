use crate::business::courier::{CourierPolicy, CourierSelector};
use crate::business::pickup::PickupResolver;
use crate::business::rejection::Rejection;
use crate::business::transformation::OrderTransformer;
use crate::business::validation::{validate_shipment_id, OrderValidator, ValidationError};
use crate::business::workflow::{Shipment, ShipmentRegistry, ShipmentState, WorkflowError};
use crate::carrier::models::{CancelOutcome, CarrierOrder, PickupOutcome};
use crate::carrier::{CarrierError, CarrierGateway};
use crate::config::Config;
use crate::domain::{strict_phone, OrderRequest, ProductCatalog};
use crate::error::AppError;
use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A composed order held back pending operator confirmation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DraftShipment {
    pub payload: CarrierOrder,
    pub pickup_pin: String,
    pub delivery_pin: String,
    pub weight: f64,
    pub cod: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrchestrationResult {
    Success {
        shipment: Shipment,
        courier: String,
        tracking_number: String,
        rate: Option<f64>,
        label_url: Option<String>,
        tracking_url: String,
    },
    NoPickupMatch,
    CarrierRejected {
        reason: Rejection,
    },
    NoCourierAvailable {
        shipment_id: String,
    },
    DuplicateOrderPending {
        draft_id: Uuid,
        draft: DraftShipment,
    },
}

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Carrier(#[from] CarrierError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("Draft not found: {0}")]
    DraftNotFound(Uuid),

    #[error("Shipment {shipment_id} is {state:?}")]
    ShipmentNotReady {
        shipment_id: String,
        state: ShipmentState,
    },
}

impl OrchestrationError {
    /// Text safe to show an operator.
    pub fn user_message(&self) -> String {
        match self {
            OrchestrationError::Carrier(e) if e.is_transport() => {
                "The carrier could not be reached. Please try again.".to_string()
            }
            OrchestrationError::Carrier(CarrierError::AuthenticationError(_)) => {
                "Carrier login failed. Check the account credentials.".to_string()
            }
            OrchestrationError::Carrier(e) => match e.raw_body() {
                Some(body) => format!("Carrier error: {}", body),
                None => format!("Carrier error: {}", e),
            },
            OrchestrationError::ShipmentNotReady { shipment_id, state } => match state {
                ShipmentState::Created | ShipmentState::Assigned => format!(
                    "Shipment {} has no label yet; pickup can only be scheduled after labelling",
                    shipment_id
                ),
                _ => format!("Shipment {} is {:?}", shipment_id, state),
            },
            other => other.to_string(),
        }
    }
}

impl From<OrchestrationError> for AppError {
    fn from(err: OrchestrationError) -> Self {
        match err {
            OrchestrationError::Validation(e) => e.into(),
            OrchestrationError::DraftNotFound(_)
            | OrchestrationError::Workflow(WorkflowError::ShipmentNotFound(_)) => {
                AppError::NotFound(err.to_string())
            }
            OrchestrationError::ShipmentNotReady { .. } | OrchestrationError::Workflow(_) => {
                AppError::Conflict(err.user_message())
            }
            OrchestrationError::Carrier(_) => AppError::BadGateway(err.user_message()),
        }
    }
}

/// Runs order to label for one shipment, plus the pickup and cancel follow-ups.
pub struct ShipmentOrchestrator {
    gateway: Arc<dyn CarrierGateway>,
    pickups: Arc<PickupResolver>,
    selector: CourierSelector,
    catalog: Arc<dyn ProductCatalog>,
    validator: OrderValidator,
    transformer: OrderTransformer,
    registry: Arc<ShipmentRegistry>,
    drafts: RwLock<HashMap<Uuid, DraftShipment>>,
    duplicate_window: chrono::Duration,
    draft_ttl: chrono::Duration,
    tracking_url_base: String,
}

impl ShipmentOrchestrator {
    pub fn new(
        gateway: Arc<dyn CarrierGateway>,
        pickups: Arc<PickupResolver>,
        catalog: Arc<dyn ProductCatalog>,
        registry: Arc<ShipmentRegistry>,
        policy: CourierPolicy,
        config: &Config,
    ) -> Self {
        Self {
            selector: CourierSelector::new(gateway.clone(), policy),
            gateway,
            pickups,
            catalog,
            validator: OrderValidator::new(),
            transformer: OrderTransformer::with_channel_id(config.channel_id.clone()),
            registry,
            drafts: RwLock::new(HashMap::new()),
            duplicate_window: config.duplicate_window(),
            draft_ttl: config.draft_ttl(),
            tracking_url_base: config.tracking_url_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn registry(&self) -> &ShipmentRegistry {
        &self.registry
    }

    pub fn pickups(&self) -> &PickupResolver {
        &self.pickups
    }

    pub fn pending_drafts(&self) -> usize {
        self.drafts
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Validate, compose and submit an order. Stops at the duplicate gate when the same
    /// phone ordered recently; the draft then waits for [`Self::confirm_draft`].
    pub async fn create_shipment(
        &self,
        order: &OrderRequest,
    ) -> Result<OrchestrationResult, OrchestrationError> {
        let order = self.validator.validate_order(order)?;

        if let Err(e) = self.pickups.ensure_loaded().await {
            warn!(error = %e, "Pickup listing unavailable");
        }
        let pickup = match self.pickups.resolve(order.pickup_label.as_deref()) {
            Some(pickup) => pickup,
            None => {
                warn!("No pickup locations registered on the carrier account");
                return Ok(OrchestrationResult::NoPickupMatch);
            }
        };

        let dimensions = self.catalog.dimensions(&order.product);
        let cod = order.payment_mode.is_cod();
        let shipping_charges = self
            .gateway
            .get_shipping_quote(&pickup.postal_code, &order.pincode, dimensions.weight, cod)
            .await
            .unwrap_or(0.0);

        let payload =
            self.transformer
                .transform_order(&order, &pickup, dimensions, shipping_charges);
        debug!(order_id = %payload.order_id, pickup = %pickup.name, "Composed carrier order");

        let draft = DraftShipment {
            payload,
            pickup_pin: pickup.postal_code.clone(),
            delivery_pin: order.pincode.clone(),
            weight: dimensions.weight,
            cod,
            created_at: Utc::now(),
        };

        if self.has_recent_order(&order.phone).await {
            let draft_id = Uuid::new_v4();
            info!(%draft_id, order_id = %draft.payload.order_id, "Recent order for this phone, holding draft");
            let mut drafts = self
                .drafts
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let before = drafts.len();
            drafts.retain(|_, held| !self.is_expired(held));
            if drafts.len() < before {
                debug!(expired = before - drafts.len(), "Dropped unanswered drafts");
            }
            drafts.insert(draft_id, draft.clone());
            drop(drafts);
            return Ok(OrchestrationResult::DuplicateOrderPending { draft_id, draft });
        }

        self.submit(draft).await
    }

    /// Submit a held draft as-is.
    pub async fn confirm_draft(
        &self,
        draft_id: Uuid,
    ) -> Result<OrchestrationResult, OrchestrationError> {
        let draft = self.take_draft(draft_id)?;
        info!(%draft_id, "Operator confirmed duplicate draft");
        self.submit(draft).await
    }

    pub fn discard_draft(&self, draft_id: Uuid) -> Result<DraftShipment, OrchestrationError> {
        let draft = self.take_draft(draft_id)?;
        info!(%draft_id, "Discarded duplicate draft");
        Ok(draft)
    }

    /// Expired drafts count as gone.
    fn take_draft(&self, draft_id: Uuid) -> Result<DraftShipment, OrchestrationError> {
        self.drafts
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&draft_id)
            .filter(|draft| !self.is_expired(draft))
            .ok_or(OrchestrationError::DraftNotFound(draft_id))
    }

    fn is_expired(&self, draft: &DraftShipment) -> bool {
        Utc::now().signed_duration_since(draft.created_at) >= self.draft_ttl
    }

    /// Create the order, walk the couriers, then try for a label.
    async fn submit(&self, draft: DraftShipment) -> Result<OrchestrationResult, OrchestrationError> {
        let stub = match self.gateway.create_order(&draft.payload).await {
            Ok(stub) => stub,
            Err(CarrierError::Rejected { body, .. }) => {
                let reason = Rejection::from_raw(body);
                error!(kind = ?reason.kind, order_id = %draft.payload.order_id, "Carrier rejected order");
                return Ok(OrchestrationResult::CarrierRejected { reason });
            }
            Err(e) => return Err(e.into()),
        };

        let shipment_id = stub.shipment_id.clone();
        self.registry
            .record_created(&shipment_id, &draft.payload.order_id, stub.order_id.clone());

        let assignment = self
            .selector
            .create_shipment_with_courier(
                &shipment_id,
                &draft.pickup_pin,
                &draft.delivery_pin,
                draft.weight,
                draft.cod,
            )
            .await;

        let assignment = match assignment {
            Ok(Some(assignment)) => assignment,
            Err(e) => {
                self.registry
                    .update(&shipment_id, |s| s.mark_failed(e.to_string()))?;
                return Err(e.into());
            }
            Ok(None) => {
                self.registry.update(&shipment_id, |s| {
                    s.mark_failed("No courier accepted the shipment".to_string())
                })?;
                return Ok(OrchestrationResult::NoCourierAvailable { shipment_id });
            }
        };

        let mut shipment = self.registry.update(&shipment_id, |s| {
            s.mark_assigned(
                assignment.courier.clone(),
                assignment.tracking_number.clone(),
                assignment.rate,
            )
        })?;

        let label_url = match self.gateway.generate_label(&shipment_id).await {
            Ok(Some(url)) => {
                shipment = self
                    .registry
                    .update(&shipment_id, |s| s.mark_labelled(url.clone()))?;
                Some(url)
            }
            Ok(None) => {
                warn!(%shipment_id, "Label not generated");
                None
            }
            Err(e) => {
                warn!(%shipment_id, error = %e, "Label generation failed");
                None
            }
        };

        info!(%shipment_id, courier = %assignment.courier, "Shipment created");
        Ok(OrchestrationResult::Success {
            tracking_url: format!("{}/{}", self.tracking_url_base, assignment.tracking_number),
            shipment,
            courier: assignment.courier,
            tracking_number: assignment.tracking_number,
            rate: assignment.rate,
            label_url,
        })
    }

    /// A failed lookup does not block the order.
    async fn has_recent_order(&self, phone: &str) -> bool {
        let orders = match self.gateway.recent_orders(phone).await {
            Ok(orders) => orders,
            Err(e) => {
                warn!(error = %e, "Duplicate check failed, continuing");
                return false;
            }
        };

        let now = Local::now().naive_local();
        orders.iter().any(|order| {
            let same_phone = order.phone.as_deref().and_then(strict_phone).as_deref() == Some(phone);
            let recent = order
                .created_at
                .map(|created| now.signed_duration_since(created) < self.duplicate_window)
                .unwrap_or(false);
            same_phone && recent
        })
    }

    /// Only labelled shipments are offered for pickup. Shipments this process has not
    /// seen are passed through to the carrier.
    pub async fn schedule_pickup(
        &self,
        shipment_id: &str,
        pickup_date: Option<&str>,
        time_slot_id: Option<&str>,
    ) -> Result<PickupOutcome, OrchestrationError> {
        validate_shipment_id(shipment_id)?;
        let known = self.registry.get(shipment_id);
        match &known {
            Some(shipment)
                if !matches!(
                    shipment.state,
                    ShipmentState::Labelled | ShipmentState::PickupScheduled
                ) =>
            {
                return Err(OrchestrationError::ShipmentNotReady {
                    shipment_id: shipment_id.to_string(),
                    state: shipment.state,
                });
            }
            Some(_) => {}
            None => warn!(shipment_id, "Scheduling pickup for a shipment not created here"),
        }

        let outcome = self
            .gateway
            .schedule_pickup(&[shipment_id.to_string()], pickup_date, time_slot_id)
            .await?;

        if outcome.scheduled
            && known.map(|s| s.state == ShipmentState::Labelled).unwrap_or(false)
        {
            self.registry
                .update(shipment_id, |s| s.mark_pickup_scheduled())?;
        }
        info!(shipment_id, status = ?outcome.status, "Pickup request answered");
        Ok(outcome)
    }

    pub async fn cancel_shipment(
        &self,
        shipment_id: &str,
    ) -> Result<CancelOutcome, OrchestrationError> {
        validate_shipment_id(shipment_id)?;
        let known = self.registry.get(shipment_id);
        if let Some(shipment) = &known {
            if shipment.state.is_terminal() {
                return Err(OrchestrationError::ShipmentNotReady {
                    shipment_id: shipment_id.to_string(),
                    state: shipment.state,
                });
            }
        }

        let outcome = self.gateway.cancel_shipment(shipment_id).await?;
        if outcome.cancelled && known.is_some() {
            self.registry
                .update(shipment_id, |s| s.transition_to(ShipmentState::Cancelled))?;
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business::testing::{candidate, AwbReply, FakeGateway};
    use crate::carrier::models::{PickupLocation, PickupStatus, RecentOrder};
    use crate::domain::{InMemoryProductCatalog, PaymentMode, ProductDimensions};
    use serde_json::json;

    fn create_test_order() -> OrderRequest {
        OrderRequest {
            customer_name: "Asha Rao".to_string(),
            phone: "98765 43210".to_string(),
            alternate_phone: None,
            address: "12 MG Road".to_string(),
            city: "Mumbai".to_string(),
            state: "Maharashtra".to_string(),
            pincode: "400050".to_string(),
            product: "Desk Lamp".to_string(),
            quantity: 1,
            payment_mode: PaymentMode::COD,
            amount: 499.0,
            pickup_label: Some("warehouse".to_string()),
        }
    }

    fn warehouse() -> PickupLocation {
        PickupLocation::from_record(&json!({"pickup_location": "Main Warehouse", "pin_code": "110001"}))
            .unwrap()
    }

    fn ready_gateway() -> FakeGateway {
        FakeGateway::new()
            .with_pickups(vec![warehouse()])
            .with_candidates(vec![
                candidate(Some("77"), "XYZ Express", "Surface", Some(120.0)),
                candidate(Some("12"), "Delhivery Surface", "Surface", Some(150.0)),
            ])
            .with_awb("12", AwbReply::Accept("AWB-DEL".to_string()))
            .with_quote(87.5)
            .with_label("https://labels.example.com/5678.pdf")
    }

    fn orchestrator(gateway: Arc<FakeGateway>) -> ShipmentOrchestrator {
        let catalog = InMemoryProductCatalog::new().with_product(
            "Desk Lamp",
            ProductDimensions {
                length: 30.0,
                breadth: 20.0,
                height: 15.0,
                weight: 1.2,
            },
        );
        let config = Config::default();
        ShipmentOrchestrator::new(
            gateway.clone(),
            Arc::new(PickupResolver::new(gateway)),
            Arc::new(catalog),
            Arc::new(ShipmentRegistry::new()),
            CourierPolicy::new(config.courier_allow_list.clone()),
            &config,
        )
    }

    fn recent(phone: &str, days_ago: i64) -> RecentOrder {
        RecentOrder {
            phone: Some(phone.to_string()),
            created_at: Some(Local::now().naive_local() - chrono::Duration::days(days_ago)),
        }
    }

    #[tokio::test]
    async fn test_successful_shipment() {
        let gateway = Arc::new(ready_gateway());
        let orchestrator = orchestrator(gateway.clone());

        let result = orchestrator.create_shipment(&create_test_order()).await.unwrap();
        match result {
            OrchestrationResult::Success {
                shipment,
                courier,
                tracking_number,
                rate,
                label_url,
                tracking_url,
            } => {
                assert_eq!(courier, "Delhivery Surface");
                assert_eq!(tracking_number, "AWB-DEL");
                assert_eq!(rate, Some(150.0));
                assert_eq!(label_url.as_deref(), Some("https://labels.example.com/5678.pdf"));
                assert_eq!(tracking_url, "https://shiprocket.co/tracking/AWB-DEL");
                assert_eq!(shipment.state, ShipmentState::Labelled);
            }
            other => panic!("Expected Success, got {:?}", other),
        }

        let created = gateway.created_orders();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].pickup_location, "Main Warehouse");
        assert_eq!(created[0].billing_phone, "9876543210");
        assert_eq!(created[0].shipping_charges, 87.5);
        assert_eq!(created[0].weight, 1.2);
        assert_eq!(gateway.label_calls(), vec!["5678"]);
        assert!(gateway.pickup_calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_pickup_locations() {
        let gateway = Arc::new(FakeGateway::new());
        let orchestrator = orchestrator(gateway.clone());

        let result = orchestrator.create_shipment(&create_test_order()).await.unwrap();
        assert_eq!(result, OrchestrationResult::NoPickupMatch);
        assert!(gateway.created_orders().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_balance_is_categorized() {
        let gateway = Arc::new(ready_gateway());
        gateway.reject_orders(r#"{"message":"Insufficient balance, please recharge your wallet"}"#);
        let orchestrator = orchestrator(gateway.clone());

        match orchestrator.create_shipment(&create_test_order()).await.unwrap() {
            OrchestrationResult::CarrierRejected { reason } => {
                assert_eq!(reason.kind, crate::business::RejectionKind::InsufficientBalance);
                assert!(reason.raw.contains("Insufficient balance"));
            }
            other => panic!("Expected CarrierRejected, got {:?}", other),
        }
        assert!(gateway.awb_calls().is_empty());
    }

    #[tokio::test]
    async fn test_no_courier_marks_shipment_failed() {
        let gateway = Arc::new(
            FakeGateway::new()
                .with_pickups(vec![warehouse()])
                .with_label("https://labels.example.com/5678.pdf"),
        );
        let orchestrator = orchestrator(gateway.clone());

        let result = orchestrator.create_shipment(&create_test_order()).await.unwrap();
        assert_eq!(
            result,
            OrchestrationResult::NoCourierAvailable {
                shipment_id: "5678".to_string()
            }
        );
        let shipment = orchestrator.registry().get("5678").unwrap();
        assert_eq!(shipment.state, ShipmentState::Failed);
        assert!(shipment.tracking_number.is_none());
        assert!(gateway.label_calls().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_gate_holds_then_confirms() {
        let gateway = Arc::new(ready_gateway());
        gateway.set_recent_orders(vec![recent("9876543210", 2)]);
        let orchestrator = orchestrator(gateway.clone());

        let draft_id = match orchestrator.create_shipment(&create_test_order()).await.unwrap() {
            OrchestrationResult::DuplicateOrderPending { draft_id, draft } => {
                assert_eq!(draft.pickup_pin, "110001");
                assert_eq!(draft.delivery_pin, "400050");
                assert!(draft.cod);
                draft_id
            }
            other => panic!("Expected DuplicateOrderPending, got {:?}", other),
        };
        assert!(gateway.created_orders().is_empty());
        assert_eq!(orchestrator.pending_drafts(), 1);

        let confirmed = orchestrator.confirm_draft(draft_id).await.unwrap();
        assert!(matches!(confirmed, OrchestrationResult::Success { .. }));
        assert_eq!(gateway.created_orders().len(), 1);
        assert_eq!(orchestrator.pending_drafts(), 0);

        assert!(matches!(
            orchestrator.confirm_draft(draft_id).await,
            Err(OrchestrationError::DraftNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_discard_draft() {
        let gateway = Arc::new(ready_gateway());
        gateway.set_recent_orders(vec![recent("9876543210", 0)]);
        let orchestrator = orchestrator(gateway.clone());

        let draft_id = match orchestrator.create_shipment(&create_test_order()).await.unwrap() {
            OrchestrationResult::DuplicateOrderPending { draft_id, .. } => draft_id,
            other => panic!("Expected DuplicateOrderPending, got {:?}", other),
        };
        orchestrator.discard_draft(draft_id).unwrap();
        assert!(orchestrator.discard_draft(draft_id).is_err());
        assert!(gateway.created_orders().is_empty());
    }

    #[tokio::test]
    async fn test_old_or_other_phone_orders_do_not_gate() {
        let gateway = Arc::new(ready_gateway());
        gateway.set_recent_orders(vec![recent("9876543210", 10), recent("9123456789", 1)]);
        let orchestrator = orchestrator(gateway.clone());

        let result = orchestrator.create_shipment(&create_test_order()).await.unwrap();
        assert!(matches!(result, OrchestrationResult::Success { .. }));
    }

    #[tokio::test]
    async fn test_failed_duplicate_check_does_not_block() {
        let gateway = Arc::new(ready_gateway());
        gateway.fail_recent_orders();
        let orchestrator = orchestrator(gateway.clone());

        let result = orchestrator.create_shipment(&create_test_order()).await.unwrap();
        assert!(matches!(result, OrchestrationResult::Success { .. }));
    }

    #[tokio::test]
    async fn test_invalid_order_is_rejected_before_any_call() {
        let gateway = Arc::new(ready_gateway());
        let orchestrator = orchestrator(gateway.clone());

        let mut order = create_test_order();
        order.phone = "12345".to_string();
        assert!(matches!(
            orchestrator.create_shipment(&order).await,
            Err(OrchestrationError::Validation(ValidationError::InvalidPhone(_)))
        ));
        assert!(gateway.created_orders().is_empty());
    }

    #[tokio::test]
    async fn test_pickup_requires_label() {
        let gateway = Arc::new(
            FakeGateway::new()
                .with_pickups(vec![warehouse()])
                .with_candidates(vec![candidate(Some("12"), "Delhivery", "Surface", Some(150.0))])
                .with_awb("12", AwbReply::Accept("AWB-DEL".to_string())),
        );
        let orchestrator = orchestrator(gateway.clone());

        match orchestrator.create_shipment(&create_test_order()).await.unwrap() {
            OrchestrationResult::Success { label_url, shipment, .. } => {
                assert!(label_url.is_none());
                assert_eq!(shipment.state, ShipmentState::Assigned);
            }
            other => panic!("Expected Success, got {:?}", other),
        }

        let result = orchestrator.schedule_pickup("5678", None, None).await;
        assert!(matches!(
            result,
            Err(OrchestrationError::ShipmentNotReady {
                state: ShipmentState::Assigned,
                ..
            })
        ));
        assert!(gateway.pickup_calls().is_empty());
    }

    #[tokio::test]
    async fn test_schedule_pickup_after_label() {
        let gateway = Arc::new(ready_gateway());
        let orchestrator = orchestrator(gateway.clone());
        orchestrator.create_shipment(&create_test_order()).await.unwrap();

        let outcome = orchestrator
            .schedule_pickup("5678", Some("2026-10-18"), None)
            .await
            .unwrap();
        assert!(outcome.scheduled);
        assert_eq!(gateway.pickup_calls(), vec![vec!["5678".to_string()]]);

        let shipment = orchestrator.registry().get("5678").unwrap();
        assert_eq!(shipment.state, ShipmentState::PickupScheduled);
        assert!(shipment.pickup_scheduled);
    }

    #[tokio::test]
    async fn test_already_scheduled_pickup_is_success() {
        let gateway = Arc::new(ready_gateway().with_pickup_outcome(PickupOutcome {
            scheduled: true,
            status: PickupStatus::AlreadyScheduled,
            message: "Pickup already scheduled".to_string(),
        }));
        let orchestrator = orchestrator(gateway.clone());

        let outcome = orchestrator.schedule_pickup("4242", None, None).await.unwrap();
        assert_eq!(outcome.status, PickupStatus::AlreadyScheduled);
        assert!(orchestrator.registry().get("4242").is_none());
    }

    #[tokio::test]
    async fn test_cancel_shipment() {
        let gateway = Arc::new(ready_gateway());
        let orchestrator = orchestrator(gateway.clone());
        orchestrator.create_shipment(&create_test_order()).await.unwrap();

        assert!(orchestrator.cancel_shipment("5678").await.unwrap().cancelled);
        assert_eq!(
            orchestrator.registry().get("5678").unwrap().state,
            ShipmentState::Cancelled
        );
        assert!(matches!(
            orchestrator.cancel_shipment("5678").await,
            Err(OrchestrationError::ShipmentNotReady { .. })
        ));
    }

    fn age_drafts(orchestrator: &ShipmentOrchestrator, by: chrono::Duration) {
        for draft in orchestrator.drafts.write().unwrap().values_mut() {
            draft.created_at = draft.created_at - by;
        }
    }

    #[tokio::test]
    async fn test_expired_draft_cannot_be_confirmed() {
        let gateway = Arc::new(ready_gateway());
        gateway.set_recent_orders(vec![recent("9876543210", 1)]);
        let orchestrator = orchestrator(gateway.clone());

        let draft_id = match orchestrator.create_shipment(&create_test_order()).await.unwrap() {
            OrchestrationResult::DuplicateOrderPending { draft_id, .. } => draft_id,
            other => panic!("Expected DuplicateOrderPending, got {:?}", other),
        };
        age_drafts(&orchestrator, chrono::Duration::hours(25));

        assert!(matches!(
            orchestrator.confirm_draft(draft_id).await,
            Err(OrchestrationError::DraftNotFound(id)) if id == draft_id
        ));
        assert!(gateway.created_orders().is_empty());
    }

    #[tokio::test]
    async fn test_new_draft_prunes_unanswered_ones() {
        let gateway = Arc::new(ready_gateway());
        gateway.set_recent_orders(vec![recent("9876543210", 1)]);
        let orchestrator = orchestrator(gateway.clone());

        orchestrator.create_shipment(&create_test_order()).await.unwrap();
        orchestrator.create_shipment(&create_test_order()).await.unwrap();
        assert_eq!(orchestrator.pending_drafts(), 2);

        age_drafts(&orchestrator, chrono::Duration::hours(25));
        orchestrator.create_shipment(&create_test_order()).await.unwrap();
        assert_eq!(orchestrator.pending_drafts(), 1);
    }

    #[tokio::test]
    async fn test_pickup_listing_failure_is_no_pickup_match() {
        let gateway = Arc::new(ready_gateway());
        gateway.fail_pickup_listing();
        let orchestrator = orchestrator(gateway.clone());

        let result = orchestrator.create_shipment(&create_test_order()).await.unwrap();
        assert_eq!(result, OrchestrationResult::NoPickupMatch);
        assert!(gateway.created_orders().is_empty());
    }

    #[tokio::test]
    async fn test_auth_failure_during_courier_walk_marks_failed() {
        let gateway = Arc::new(
            FakeGateway::new()
                .with_pickups(vec![warehouse()])
                .with_candidates(vec![candidate(Some("12"), "Delhivery", "Surface", Some(150.0))])
                .with_awb("12", AwbReply::Unauthorized),
        );
        let orchestrator = orchestrator(gateway.clone());

        let result = orchestrator.create_shipment(&create_test_order()).await;
        assert!(matches!(
            result,
            Err(OrchestrationError::Carrier(CarrierError::AuthenticationError(_)))
        ));

        let shipment = orchestrator.registry().get("5678").unwrap();
        assert_eq!(shipment.state, ShipmentState::Failed);
        assert!(shipment
            .error_message
            .unwrap()
            .contains("rejected a refreshed token"));
        assert!(gateway.label_calls().is_empty());
    }

    #[tokio::test]
    async fn test_non_numeric_shipment_ids_are_rejected() {
        let gateway = Arc::new(ready_gateway());
        let orchestrator = orchestrator(gateway.clone());

        for bad in ["../..", "x?y=", ""] {
            assert!(matches!(
                orchestrator.cancel_shipment(bad).await,
                Err(OrchestrationError::Validation(ValidationError::InvalidShipmentId(_)))
            ));
            assert!(matches!(
                orchestrator.schedule_pickup(bad, None, None).await,
                Err(OrchestrationError::Validation(ValidationError::InvalidShipmentId(_)))
            ));
        }
        assert!(gateway.pickup_calls().is_empty());

        let app: AppError = orchestrator.cancel_shipment("../..").await.unwrap_err().into();
        assert!(matches!(app, AppError::ValidationError(_)));
    }

    #[test]
    fn test_user_messages() {
        let err = OrchestrationError::Carrier(crate::business::testing::transport_error("create_order"));
        assert!(err.user_message().contains("try again"));

        let err = OrchestrationError::Carrier(CarrierError::MalformedResponse {
            endpoint: "create_order",
            body: "{}".to_string(),
        });
        assert_eq!(err.user_message(), "Carrier error: {}");

        let app: AppError = OrchestrationError::DraftNotFound(Uuid::nil()).into();
        assert!(matches!(app, AppError::NotFound(_)));
    }
}
