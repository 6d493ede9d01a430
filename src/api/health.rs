use poem_openapi::{payload::Json, ApiResponse, Object, OpenApi};
use std::sync::Arc;

use crate::business::PickupResolver;
use crate::carrier::CarrierClient;

pub struct HealthApi {
    carrier: Arc<CarrierClient>,
    pickups: Arc<PickupResolver>,
}

impl HealthApi {
    pub fn new(carrier: Arc<CarrierClient>, pickups: Arc<PickupResolver>) -> Self {
        Self { carrier, pickups }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
    pub pickup_locations: u32,
    pub carrier: CarrierHealth,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct CarrierHealth {
    pub token_valid: bool,
    pub token_expires_at: Option<String>,
    pub logins: u64,
    pub total_requests: u64,
    pub success_rate: f64,
}

#[derive(ApiResponse)]
pub enum HealthResponse {
    #[oai(status = 200)]
    Ok(Json<HealthStatus>),

    #[oai(status = 503)]
    ServiceUnavailable(Json<HealthStatus>),
}

#[OpenApi]
impl HealthApi {
    /// Service health
    ///
    /// Degraded while no pickup location is loaded, since no order can be placed.
    #[oai(path = "/health", method = "get")]
    async fn health(&self) -> HealthResponse {
        let pickup_locations = self.pickups.len() as u32;
        let tokens = self.carrier.tokens();
        let snapshot = self.carrier.metrics().snapshot();
        let carrier = CarrierHealth {
            token_valid: tokens.has_valid_token(),
            token_expires_at: tokens.expires_at().map(|t| t.to_rfc3339()),
            logins: tokens.login_count(),
            total_requests: snapshot.total_requests,
            success_rate: snapshot.success_rate,
        };

        let health = HealthStatus {
            status: if pickup_locations > 0 { "healthy" } else { "degraded" }.to_string(),
            service: "Shipgate".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            pickup_locations,
            carrier,
        };

        if pickup_locations > 0 {
            HealthResponse::Ok(Json(health))
        } else {
            HealthResponse::ServiceUnavailable(Json(health))
        }
    }
}
