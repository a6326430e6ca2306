//! API Router with Swagger UI

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::application::events::SharedEventBus;
use crate::application::gateway::SharedDeviceRegistry;
use crate::application::services::{
    FleetService, LoyaltyService, ParkingService, RiderService, RideService, TelemetryService,
};
use crate::interfaces::http::common::ApiResponse;
use crate::interfaces::http::modules::{
    health, metrics, parking, request_id::request_id_middleware, riders, rides, telemetry,
    vehicles,
};
use crate::interfaces::ws::{create_notification_state, ws_notifications_handler, NotificationState};

/// Unified state for all API routes.
/// Axum extracts the specific handler state via `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub rides: Arc<RideService>,
    pub fleet: Arc<FleetService>,
    pub parking: Arc<ParkingService>,
    pub riders: Arc<RiderService>,
    pub loyalty: Arc<LoyaltyService>,
    pub telemetry: Arc<TelemetryService>,
    pub registry: SharedDeviceRegistry,
    pub event_bus: SharedEventBus,
    pub started_at: Arc<Instant>,
    pub prometheus: PrometheusHandle,
}

// -- FromRef implementations so each handler keeps its own State<T> extractor --

impl FromRef<AppState> for rides::RideAppState {
    fn from_ref(s: &AppState) -> Self {
        rides::RideAppState {
            rides: Arc::clone(&s.rides),
        }
    }
}

impl FromRef<AppState> for vehicles::VehicleAppState {
    fn from_ref(s: &AppState) -> Self {
        vehicles::VehicleAppState {
            fleet: Arc::clone(&s.fleet),
        }
    }
}

impl FromRef<AppState> for parking::ParkingAppState {
    fn from_ref(s: &AppState) -> Self {
        parking::ParkingAppState {
            parking: Arc::clone(&s.parking),
        }
    }
}

impl FromRef<AppState> for riders::RiderAppState {
    fn from_ref(s: &AppState) -> Self {
        riders::RiderAppState {
            riders: Arc::clone(&s.riders),
            loyalty: Arc::clone(&s.loyalty),
        }
    }
}

impl FromRef<AppState> for telemetry::TelemetryAppState {
    fn from_ref(s: &AppState) -> Self {
        telemetry::TelemetryAppState {
            telemetry: Arc::clone(&s.telemetry),
        }
    }
}

impl FromRef<AppState> for health::HealthState {
    fn from_ref(s: &AppState) -> Self {
        health::HealthState {
            registry: s.registry.clone(),
            started_at: Arc::clone(&s.started_at),
        }
    }
}

impl FromRef<AppState> for metrics::MetricsState {
    fn from_ref(s: &AppState) -> Self {
        metrics::MetricsState {
            prometheus: s.prometheus.clone(),
        }
    }
}

impl FromRef<AppState> for NotificationState {
    fn from_ref(s: &AppState) -> Self {
        create_notification_state(s.event_bus.clone())
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health_check,
        // Rides
        rides::start_ride,
        rides::end_ride,
        rides::cancel_ride,
        rides::get_ride,
        rides::list_rider_rides,
        rides::get_active_ride,
        // Vehicles
        vehicles::list_vehicles,
        vehicles::create_vehicle,
        vehicles::nearby_vehicles,
        vehicles::get_vehicle,
        vehicles::delete_vehicle,
        vehicles::set_maintenance,
        vehicles::dock_vehicle,
        // Parking
        parking::list_lots,
        parking::create_lot,
        parking::nearby_lots,
        parking::get_lot,
        parking::lot_availability,
        parking::set_slot_maintenance,
        // Riders
        riders::get_rider,
        riders::top_up,
        riders::convert_points,
        riders::list_vouchers,
        riders::rider_stats,
        // Telemetry
        telemetry::report_battery,
        telemetry::report_position,
        telemetry::report_occupancy,
    ),
    components(
        schemas(
            // Common
            ApiResponse<String>,
            // Rides
            rides::StartRideRequest,
            rides::EndRideRequest,
            rides::CancelRideRequest,
            rides::RideDto,
            // Vehicles
            vehicles::CreateVehicleRequest,
            vehicles::SetMaintenanceRequest,
            vehicles::DockVehicleRequest,
            vehicles::VehicleDto,
            vehicles::NearbyVehicleDto,
            // Parking
            parking::CreateLotRequest,
            parking::SlotMaintenanceRequest,
            parking::LotDto,
            parking::SlotDto,
            parking::LotDetailDto,
            parking::AvailabilityDto,
            parking::NearbyLotDto,
            // Riders
            riders::TopUpRequest,
            riders::ConvertPointsRequest,
            riders::RiderDto,
            riders::VoucherDto,
            riders::RiderStatsDto,
            // Telemetry
            telemetry::BatteryReportRequest,
            telemetry::PositionReportRequest,
            telemetry::OccupancyReportRequest,
            // Health
            health::HealthResponse,
        )
    ),
    tags(
        (name = "Health", description = "Server health check endpoints"),
        (name = "Rides", description = "Ride lifecycle: start, end, cancel, history"),
        (name = "Vehicles", description = "Fleet management: vehicle CRUD, maintenance, docking, nearby search"),
        (name = "Parking", description = "Parking lots, slots and availability"),
        (name = "Riders", description = "Rider accounts: balance, loyalty points, vouchers, statistics"),
        (name = "Telemetry", description = "HTTP mirror of the device telemetry channel"),
        (name = "WebSocket Notifications", description = "Real-time event notifications via WebSocket"),
    ),
    info(
        title = "Texnouz Mobility API",
        version = "1.0.0",
        description = "REST API for the shared vehicle ride coordination service",
        license(name = "MIT"),
        contact(name = "Texnouz", email = "support@texnouz.com")
    )
)]
pub struct ApiDoc;

/// Create the API router with all routes
pub fn create_api_router(
    ride_service: Arc<RideService>,
    fleet_service: Arc<FleetService>,
    parking_service: Arc<ParkingService>,
    rider_service: Arc<RiderService>,
    loyalty_service: Arc<LoyaltyService>,
    telemetry_service: Arc<TelemetryService>,
    registry: SharedDeviceRegistry,
    event_bus: SharedEventBus,
    prometheus_handle: PrometheusHandle,
) -> Router {
    let state = AppState {
        rides: ride_service,
        fleet: fleet_service,
        parking: parking_service,
        riders: rider_service,
        loyalty: loyalty_service,
        telemetry: telemetry_service,
        registry,
        event_bus,
        started_at: Arc::new(Instant::now()),
        prometheus: prometheus_handle,
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Ride lifecycle
    let ride_routes = Router::new()
        .route("/", post(rides::start_ride))
        .route("/{id}", get(rides::get_ride))
        .route("/{id}/end", put(rides::end_ride))
        .route("/{id}/cancel", put(rides::cancel_ride))
        .with_state(state.clone());

    // Rider accounts, loyalty and per-rider ride history
    let rider_routes = Router::new()
        .route("/{id}", get(riders::get_rider))
        .route("/{id}/credit", post(riders::top_up))
        .route("/{id}/points/convert", post(riders::convert_points))
        .route("/{id}/vouchers", get(riders::list_vouchers))
        .route("/{id}/stats", get(riders::rider_stats))
        .route("/{id}/rides", get(rides::list_rider_rides))
        .route("/{id}/rides/active", get(rides::get_active_ride))
        .with_state(state.clone());

    // Fleet management
    let vehicle_routes = Router::new()
        .route(
            "/",
            get(vehicles::list_vehicles).post(vehicles::create_vehicle),
        )
        .route("/nearby", get(vehicles::nearby_vehicles))
        .route(
            "/{id}",
            get(vehicles::get_vehicle).delete(vehicles::delete_vehicle),
        )
        .route("/{id}/maintenance", put(vehicles::set_maintenance))
        .route("/{id}/dock", put(vehicles::dock_vehicle))
        .with_state(state.clone());

    // Parking lots
    let lot_routes = Router::new()
        .route("/", get(parking::list_lots).post(parking::create_lot))
        .route("/nearby", get(parking::nearby_lots))
        .route("/{id}", get(parking::get_lot))
        .route("/{id}/availability", get(parking::lot_availability))
        .with_state(state.clone());

    // Slots (flat namespace, slot IDs are globally unique)
    let slot_routes = Router::new()
        .route("/{id}/maintenance", put(parking::set_slot_maintenance))
        .with_state(state.clone());

    // Telemetry over HTTP
    let telemetry_routes = Router::new()
        .route("/vehicles/{id}/battery", post(telemetry::report_battery))
        .route("/vehicles/{id}/position", post(telemetry::report_position))
        .route("/slots/{id}/occupancy", post(telemetry::report_occupancy))
        .with_state(state.clone());

    // Health + metrics
    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::prometheus_metrics))
        .with_state(state.clone());

    // Notification WebSocket (no auth for WebSocket upgrade)
    let notification_routes = Router::new()
        .route("/ws/notifications", get(ws_notifications_handler))
        .with_state(state);

    let swagger_routes = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    // Build router
    Router::new()
        // Swagger UI
        .merge(swagger_routes)
        // Health + metrics
        .merge(health_routes)
        // Notifications WebSocket
        .merge(notification_routes)
        // REST resources
        .nest("/api/v1/rides", ride_routes)
        .nest("/api/v1/riders", rider_routes)
        .nest("/api/v1/vehicles", vehicle_routes)
        .nest("/api/v1/lots", lot_routes)
        .nest("/api/v1/slots", slot_routes)
        .nest("/api/v1/telemetry", telemetry_routes)
        // Middleware
        .layer(middleware::from_fn(crate::interfaces::http::modules::metrics::http_metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use rust_decimal::Decimal;
    use tower::Service;

    use super::*;
    use crate::application::events::create_event_bus;
    use crate::application::gateway::testing::RecordingGateway;
    use crate::application::gateway::{create_device_registry, SharedDeviceGateway};
    use crate::domain::{GeoPosition, Rider, Vehicle, VehicleClass};
    use crate::infrastructure::{EntityStore, InMemoryStore, SharedEntityStore};

    async fn seeded_router() -> Router {
        let store = Arc::new(InMemoryStore::new());

        store
            .create_rider(Rider::new(
                "RD-1",
                "Aziz Karimov",
                "aziz@example.com",
                Decimal::new(1000, 2),
            ))
            .await
            .unwrap();
        store
            .create_rider(Rider::new(
                "RD-2",
                "Malika Usmanova",
                "malika@example.com",
                Decimal::new(50, 2),
            ))
            .await
            .unwrap();
        store
            .create_vehicle(Vehicle::new(
                "VH-1",
                VehicleClass::Scooter,
                "Samokat S1",
                Decimal::new(15, 2),
                GeoPosition::new(41.3111, 69.2797),
            ))
            .await
            .unwrap();

        let store: SharedEntityStore = store;
        let gateway: SharedDeviceGateway = Arc::new(RecordingGateway::default());
        let events = create_event_bus();

        create_api_router(
            Arc::new(RideService::new(
                store.clone(),
                gateway.clone(),
                events.clone(),
            )),
            Arc::new(FleetService::new(store.clone(), gateway.clone())),
            Arc::new(ParkingService::new(store.clone(), gateway.clone())),
            Arc::new(RiderService::new(store.clone())),
            Arc::new(LoyaltyService::new(store.clone())),
            Arc::new(TelemetryService::new(store, gateway, events.clone())),
            create_device_registry(),
            events,
            PrometheusBuilder::new().build_recorder().handle(),
        )
    }

    async fn send(router: Router, req: Request<Body>) -> axum::http::Response<Body> {
        let mut svc = router.into_service();
        svc.call(req).await.unwrap()
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(resp: axum::http::Response<Body>) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn start_ride_returns_success_envelope() {
        let router = seeded_router().await;
        let req = json_request(
            "POST",
            "/api/v1/rides",
            serde_json::json!({"rider_id": "RD-1", "vehicle_id": "VH-1"}),
        );

        let resp = send(router, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["rider_id"], "RD-1");
        assert_eq!(body["data"]["vehicle_id"], "VH-1");
        assert_eq!(body["data"]["status"], "InProgress");
    }

    #[tokio::test]
    async fn thin_balance_maps_to_payment_required() {
        let router = seeded_router().await;
        let req = json_request(
            "POST",
            "/api/v1/rides",
            serde_json::json!({"rider_id": "RD-2", "vehicle_id": "VH-1"}),
        );

        let resp = send(router, req).await;
        assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);

        let body = body_json(resp).await;
        assert_eq!(body["success"], false);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("Insufficient balance"));
    }

    #[tokio::test]
    async fn unknown_rider_maps_to_not_found() {
        let router = seeded_router().await;
        let resp = send(router, get_request("/api/v1/riders/RD-404")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn active_ride_lookup_is_404_when_idle() {
        let router = seeded_router().await;
        let resp = send(router, get_request("/api/v1/riders/RD-1/rides/active")).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_vehicle_status_filter_is_rejected() {
        let router = seeded_router().await;
        let resp = send(router, get_request("/api/v1/vehicles?status=Flying")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn lot_validation_failure_returns_422() {
        let router = seeded_router().await;
        let req = json_request(
            "POST",
            "/api/v1/lots",
            serde_json::json!({
                "name": "",
                "address": "Amir Temur 1",
                "latitude": 41.31,
                "longitude": 69.28,
                "capacity": 10
            }),
        );

        let resp = send(router, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn health_reports_ok_with_zero_devices() {
        let router = seeded_router().await;
        let resp = send(router, get_request("/health")).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connected_devices"], 0);
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let router = seeded_router().await;
        let resp = send(router, get_request("/api-doc/openapi.json")).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["info"]["title"], "Texnouz Mobility API");
        assert!(body["paths"]["/api/v1/rides"].is_object());
    }

    #[tokio::test]
    async fn request_id_header_is_echoed() {
        let router = seeded_router().await;
        let req = Request::builder()
            .method("GET")
            .uri("/health")
            .header("x-request-id", "test-trace-7")
            .body(Body::empty())
            .unwrap();

        let resp = send(router, req).await;
        assert_eq!(
            resp.headers().get("x-request-id").unwrap(),
            "test-trace-7"
        );
    }
}
