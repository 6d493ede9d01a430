use poem::Request;
use poem_openapi::{payload::Json, Object, OpenApi};
use std::sync::Arc;
use tracing::info;

use crate::business::{OrchestrationError, PickupResolver};
use crate::carrier::models::PickupLocation;
use crate::error::AppError;
use crate::security::extract_operator_id;

pub struct PickupsApi {
    resolver: Arc<PickupResolver>,
}

impl PickupsApi {
    pub fn new(resolver: Arc<PickupResolver>) -> Self {
        Self { resolver }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct PickupLocationView {
    pub name: String,
    pub normalized_key: String,
    pub postal_code: String,
}

impl From<PickupLocation> for PickupLocationView {
    fn from(location: PickupLocation) -> Self {
        Self {
            name: location.name,
            normalized_key: location.normalized_key,
            postal_code: location.postal_code,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, Object)]
pub struct PickupLocationList {
    pub count: u32,
    pub locations: Vec<PickupLocationView>,
}

impl PickupsApi {
    fn snapshot(&self) -> PickupLocationList {
        let locations: Vec<PickupLocationView> = self
            .resolver
            .locations()
            .into_iter()
            .map(PickupLocationView::from)
            .collect();
        PickupLocationList {
            count: locations.len() as u32,
            locations,
        }
    }
}

#[OpenApi]
impl PickupsApi {
    /// Pickup locations currently known to the resolver
    #[oai(path = "/pickups", method = "get")]
    async fn list_pickups(&self, req: &Request) -> Result<Json<PickupLocationList>, poem::Error> {
        extract_operator_id(req)?;
        Ok(Json(self.snapshot()))
    }

    /// Re-read pickup locations from the carrier account
    #[oai(path = "/pickups/refresh", method = "post")]
    async fn refresh_pickups(
        &self,
        req: &Request,
    ) -> Result<Json<PickupLocationList>, poem::Error> {
        let operator_id = extract_operator_id(req)?;
        let count = self
            .resolver
            .refresh()
            .await
            .map_err(|e| AppError::from(OrchestrationError::from(e)))?;
        info!(%operator_id, count, "Pickup locations refreshed on request");
        Ok(Json(self.snapshot()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::business::testing::FakeGateway;
    use crate::security::OPERATOR_HEADER;
    use poem::http::StatusCode;
    use serde_json::json;

    fn location(name: &str, pin: &str) -> PickupLocation {
        PickupLocation::from_record(&json!({"pickup_location": name, "pin_code": pin})).unwrap()
    }

    fn operator_request() -> Request {
        Request::builder().header(OPERATOR_HEADER, "ops-1").finish()
    }

    #[tokio::test]
    async fn test_refresh_then_list() {
        let gateway = Arc::new(FakeGateway::new().with_pickups(vec![
            location("Main Warehouse", "110001"),
            location("main-warehouse", "110001"),
            location("Home", "560034"),
        ]));
        let api = PickupsApi::new(Arc::new(PickupResolver::new(gateway)));

        let empty = api.list_pickups(&operator_request()).await.unwrap();
        assert_eq!(empty.0.count, 0);

        let refreshed = api.refresh_pickups(&operator_request()).await.unwrap();
        assert_eq!(refreshed.0.count, 2);
        assert_eq!(refreshed.0.locations[0].name, "Main Warehouse");
        assert_eq!(refreshed.0.locations[1].postal_code, "560034");
    }

    #[tokio::test]
    async fn test_failed_refresh_is_bad_gateway() {
        let gateway = Arc::new(FakeGateway::new().with_pickups(vec![location("Home", "560034")]));
        let resolver = Arc::new(PickupResolver::new(gateway.clone()));
        resolver.refresh().await.unwrap();
        gateway.fail_pickup_listing();
        let api = PickupsApi::new(resolver);

        match api.refresh_pickups(&operator_request()).await {
            Err(err) => assert_eq!(err.status(), StatusCode::BAD_GATEWAY),
            Ok(_) => panic!("Expected BadGateway"),
        }
        let kept = api.list_pickups(&operator_request()).await.unwrap();
        assert_eq!(kept.0.count, 1);
    }

    #[tokio::test]
    async fn test_requires_operator_header() {
        let api = PickupsApi::new(Arc::new(PickupResolver::new(Arc::new(FakeGateway::new()))));
        match api.list_pickups(&Request::builder().finish()).await {
            Err(err) => assert_eq!(err.status(), StatusCode::UNAUTHORIZED),
            Ok(_) => panic!("Expected Unauthorized"),
        }
    }
}
