use poem::Request;
use poem_openapi::{payload::Json, ApiResponse, Object, OpenApi};
use std::sync::Arc;

use crate::business::{ShipmentRegistry, ShipmentState};
use crate::carrier::CarrierClient;
use crate::security::extract_operator_id;

pub struct MetricsApi {
    carrier: Arc<CarrierClient>,
    registry: Arc<ShipmentRegistry>,
}

impl MetricsApi {
    pub fn new(carrier: Arc<CarrierClient>, registry: Arc<ShipmentRegistry>) -> Self {
        Self { carrier, registry }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct MetricsResponse {
    pub carrier: CarrierMetrics,
    pub shipments: ShipmentCounts,
    pub timestamp: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct CarrierMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub transport_errors: u64,
    pub auth_refreshes: u64,
    pub logins: u64,
    pub success_rate: f64,
    pub average_response_time_ms: f64,
}

/// Shipments created by this process, by workflow state.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct ShipmentCounts {
    pub total: u64,
    pub created: u64,
    pub assigned: u64,
    pub labelled: u64,
    pub pickup_scheduled: u64,
    pub failed: u64,
    pub cancelled: u64,
}

#[derive(ApiResponse)]
pub enum GetMetricsResponse {
    #[oai(status = 200)]
    Ok(Json<MetricsResponse>),
}

#[OpenApi]
impl MetricsApi {
    /// Carrier call counters and shipment totals
    #[oai(path = "/metrics", method = "get")]
    async fn get_metrics(&self, req: &Request) -> Result<GetMetricsResponse, poem::Error> {
        extract_operator_id(req)?;

        let snapshot = self.carrier.metrics().snapshot();
        let count = |state| self.registry.by_state(state).len() as u64;

        Ok(GetMetricsResponse::Ok(Json(MetricsResponse {
            carrier: CarrierMetrics {
                total_requests: snapshot.total_requests,
                successful_requests: snapshot.successful_requests,
                failed_requests: snapshot.failed_requests,
                transport_errors: snapshot.transport_errors,
                auth_refreshes: snapshot.auth_refreshes,
                logins: self.carrier.tokens().login_count(),
                success_rate: snapshot.success_rate,
                average_response_time_ms: snapshot.average_response_time_ms,
            },
            shipments: ShipmentCounts {
                total: self.registry.len() as u64,
                created: count(ShipmentState::Created),
                assigned: count(ShipmentState::Assigned),
                labelled: count(ShipmentState::Labelled),
                pickup_scheduled: count(ShipmentState::PickupScheduled),
                failed: count(ShipmentState::Failed),
                cancelled: count(ShipmentState::Cancelled),
            },
            timestamp: chrono::Utc::now().to_rfc3339(),
        })))
    }
}
