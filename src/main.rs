//!
//! Ride coordination service for the Texnouz shared fleet.
//! Reads configuration from TOML file (~/.config/texnouz-mobility/config.toml).

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info};

use texnouz_mobility::application::events::create_event_bus;
use texnouz_mobility::application::gateway::{
    create_device_registry, CommandSender, SharedDeviceGateway,
};
use texnouz_mobility::application::services::{
    FleetService, LoyaltyService, ParkingService, RiderService, RideService, TelemetryService,
};
use texnouz_mobility::config::{AppConfig, LoggingConfig};
use texnouz_mobility::domain::pricing::default_rate;
use texnouz_mobility::domain::{GeoPosition, ParkingLot, Rider, Slot, Vehicle, VehicleClass};
use texnouz_mobility::infrastructure::{InMemoryStore, SharedEntityStore};
use texnouz_mobility::interfaces::ws::DeviceServer;
use texnouz_mobility::shared::{listen_for_shutdown_signals, ShutdownSignal};
use texnouz_mobility::{create_api_router, default_config_path};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Load configuration ─────────────────────────────────────
    let config_path = std::env::var("MOBILITY_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| default_config_path());
    let app_cfg = match AppConfig::load(&config_path) {
        Ok(cfg) => {
            init_tracing(&cfg.logging);
            info!("Configuration loaded from {}", config_path.display());
            cfg
        }
        Err(e) => {
            let cfg = AppConfig::default();
            init_tracing(&cfg.logging);
            error!("Failed to load config: {}. Using defaults.", e);
            cfg
        }
    };

    info!("Starting Texnouz Mobility Service...");

    // ── Prometheus metrics recorder (must be installed before any metrics calls) ──
    let prometheus_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    info!("📊 Prometheus metrics recorder installed");

    // ── Storage ────────────────────────────────────────────────
    let store: SharedEntityStore = Arc::new(InMemoryStore::new());

    if app_cfg.demo.seed {
        if let Err(e) = seed_demo_fleet(&store).await {
            error!("Failed to seed demo data: {}", e);
        }
    }

    // ── Event bus for real-time notifications ──────────────────
    let event_bus = create_event_bus();
    info!("🔔 Event bus initialized for real-time notifications");

    // ── Device session & command infrastructure (shared across WS + API) ──
    let registry = create_device_registry();
    let command_sender = Arc::new(CommandSender::new(
        registry.clone(),
        app_cfg.gateway.command_settings(),
    ));
    let gateway: SharedDeviceGateway = command_sender.clone();

    // ── Services ───────────────────────────────────────────────
    let ride_service = Arc::new(RideService::new(
        store.clone(),
        gateway.clone(),
        event_bus.clone(),
    ));
    let fleet_service = Arc::new(FleetService::new(store.clone(), gateway.clone()));
    let parking_service = Arc::new(ParkingService::new(store.clone(), gateway.clone()));
    let rider_service = Arc::new(RiderService::new(store.clone()));
    let loyalty_service = Arc::new(LoyaltyService::new(store.clone()));
    let telemetry_service = Arc::new(TelemetryService::new(
        store.clone(),
        gateway.clone(),
        event_bus.clone(),
    ));

    // ── Shutdown coordination ──────────────────────────────────
    let shutdown = ShutdownSignal::new();
    tokio::spawn(listen_for_shutdown_signals(shutdown.clone()));

    // ── Device WebSocket server ────────────────────────────────
    let device_server = DeviceServer::new(
        app_cfg.server.ws_address(),
        registry.clone(),
        command_sender.clone(),
        telemetry_service.clone(),
        event_bus.clone(),
    )
    .with_shutdown(shutdown.clone());

    // ── REST API server ────────────────────────────────────────
    let api_router = create_api_router(
        ride_service,
        fleet_service,
        parking_service,
        rider_service,
        loyalty_service,
        telemetry_service,
        registry,
        event_bus,
        prometheus_handle,
    );

    let api_addr = app_cfg.server.api_address();
    let listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("REST API server listening on http://{}", api_addr);
    info!("Swagger UI available at http://{}/docs/", api_addr);

    let api_shutdown = shutdown.clone();
    let api_server = axum::serve(
        listener,
        api_router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        api_shutdown.wait().await;
        info!("🛑 REST API server received shutdown signal");
    });

    // Run both servers concurrently
    info!("🚀 All servers started. Press Ctrl+C to shutdown gracefully.");

    let ws_result = tokio::spawn(async move { device_server.run().await });

    let api_result = tokio::spawn(async move { api_server.await });

    // Wait for shutdown signal or server error
    tokio::select! {
        result = ws_result => {
            match result {
                Ok(Ok(())) => info!("Device gateway stopped"),
                Ok(Err(e)) => error!("Device gateway error: {}", e),
                Err(e) => error!("Device gateway task panicked: {}", e),
            }
        }
        result = api_result => {
            match result {
                Ok(Ok(())) => info!("REST API server stopped"),
                Ok(Err(e)) => error!("REST API server error: {}", e),
                Err(e) => error!("REST API server task panicked: {}", e),
            }
        }
    }

    info!("👋 Texnouz Mobility Service shutdown complete");
    Ok(())
}

/// Initialize tracing (logging) from the application config.
fn init_tracing(config: &LoggingConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.level));

    match config.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

/// Seed two lots, a small docked fleet and two riders when the store
/// is empty, so the API and the device simulator have something to
/// work with out of the box.
async fn seed_demo_fleet(
    store: &SharedEntityStore,
) -> texnouz_mobility::domain::DomainResult<()> {
    if !store.list_lots().await?.is_empty() {
        return Ok(());
    }

    info!("Seeding demo fleet...");

    let lots = [
        ParkingLot::new(
            "LOT-1",
            "Amir Temur Square",
            "Amir Temur ko'chasi 1, Tashkent",
            GeoPosition::new(41.3111, 69.2797),
            10,
        ),
        ParkingLot::new(
            "LOT-2",
            "Chorsu Bazaar",
            "Tahtapul ko'chasi 14, Tashkent",
            GeoPosition::new(41.3264, 69.2345),
            8,
        ),
    ];

    for lot in lots {
        let (lot_id, capacity) = (lot.id.clone(), lot.capacity);
        store.create_lot(lot).await?;
        for number in 1..=capacity {
            store
                .create_slot(Slot::new(format!("{lot_id}-S{number}"), &lot_id, number))
                .await?;
        }
    }

    // Mixed fleet, two of each class, split across the lots.
    let fleet: [(&str, VehicleClass, &str, &str); 6] = [
        ("VH-1", VehicleClass::Muscle, "Velo V2", "LOT-1"),
        ("VH-2", VehicleClass::Muscle, "Velo V2", "LOT-2"),
        ("VH-3", VehicleClass::Electric, "Volta E1", "LOT-1"),
        ("VH-4", VehicleClass::Electric, "Volta E1", "LOT-2"),
        ("VH-5", VehicleClass::Scooter, "Samokat S1", "LOT-1"),
        ("VH-6", VehicleClass::Scooter, "Samokat S1", "LOT-2"),
    ];

    let mut next_slot = std::collections::HashMap::new();
    for (vehicle_id, class, model, lot_id) in fleet {
        let lot = store
            .get_lot(lot_id)
            .await?
            .ok_or_else(|| texnouz_mobility::domain::DomainError::not_found("ParkingLot", lot_id))?;

        store
            .create_vehicle(Vehicle::new(
                vehicle_id,
                class,
                model,
                default_rate(class),
                lot.position,
            ))
            .await?;

        let number = next_slot.entry(lot.id.clone()).or_insert(0u32);
        *number += 1;
        let slot_id = format!("{}-S{}", lot.id, number);
        store.claim_slot(&slot_id, vehicle_id).await?;
        store
            .dock_vehicle(vehicle_id, &slot_id, &lot.id, lot.position)
            .await?;
    }

    let riders = [
        Rider::new("RD-1", "Aziz Karimov", "aziz@example.com", Decimal::new(2000, 2)),
        Rider::new(
            "RD-2",
            "Malika Usmanova",
            "malika@example.com",
            Decimal::new(1500, 2),
        ),
    ];
    for rider in riders {
        store.create_rider(rider).await?;
    }

    info!("Demo fleet seeded: 2 lots, 6 vehicles, 2 riders");
    Ok(())
}
