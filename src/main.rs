use std::sync::Arc;

use anyhow::Context;
use poem::listener::TcpListener;
use poem::{EndpointExt, Route};
use poem_openapi::OpenApiService;
use tracing::{info, warn};

use shipgate::api::{HealthApi, MetricsApi, PickupsApi, ShipmentsApi};
use shipgate::business::{CourierPolicy, PickupResolver, ShipmentOrchestrator, ShipmentRegistry};
use shipgate::carrier::{CarrierClient, CarrierGateway};
use shipgate::config::Config;
use shipgate::domain::JsonProductCatalog;
use shipgate::logging::init;
use shipgate::observability::RequestTracingMiddleware;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let config = Config::from_env();

    let carrier = Arc::new(
        CarrierClient::new(&config).context("Failed to create carrier client")?,
    );
    let gateway: Arc<dyn CarrierGateway> = carrier.clone();

    // Orders can still be taken later; the resolver retries on first use.
    let pickups = Arc::new(PickupResolver::new(gateway.clone()));
    match pickups.refresh().await {
        Ok(count) => info!(count, "Loaded pickup locations"),
        Err(e) => warn!(error = %e, "Could not load pickup locations at startup"),
    }

    let catalog = Arc::new(JsonProductCatalog::new(config.products_file.clone()));
    let policy = CourierPolicy::load(
        config.courier_allow_list.clone(),
        &config.courier_priority_file,
    );
    let registry = Arc::new(ShipmentRegistry::new());

    let orchestrator = Arc::new(ShipmentOrchestrator::new(
        gateway,
        pickups.clone(),
        catalog,
        registry.clone(),
        policy,
        &config,
    ));

    let health_api = HealthApi::new(carrier.clone(), pickups.clone());
    let metrics_api = MetricsApi::new(carrier, registry);
    let pickups_api = PickupsApi::new(pickups);
    let shipments_api = ShipmentsApi::new(orchestrator);

    let api_service = OpenApiService::new(
        (health_api, metrics_api, pickups_api, shipments_api),
        "Shipgate API",
        env!("CARGO_PKG_VERSION"),
    )
    .server(format!("http://localhost:{}", config.port));

    let ui = api_service.swagger_ui();
    let spec = api_service.spec_endpoint();

    let app = Route::new()
        .nest("/", api_service)
        .nest("/docs", ui)
        .nest("/spec", spec)
        .with(RequestTracingMiddleware);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("Starting Shipgate server on {}", addr);

    poem::Server::new(TcpListener::bind(&addr))
        .run(app)
        .await
        .context("Server stopped with an error")?;

    Ok(())
}
