use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;

use reservations_rs::{
    config::AuthConfig,
    handlers::{
        admin, api, auth, chat, cors_middleware, health_check, metrics_handler,
        request_validation_middleware, security_headers_middleware,
    },
    init_observability,
    models::HubConfig,
    observability::{observability_middleware, Metrics},
    repositories::{DynamoDbReservationRepository, DynamoDbTableRepository, StoreManager},
    services::{ChatHub, ReservationEvents, ReservationService, TableService},
    shutdown_observability, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration first (basic logging only)
    let config = Config::from_environment().await?;
    println!("Configuration loaded successfully");

    init_observability(
        &config.observability.service_name,
        &config.observability.service_version,
        config.observability.otlp_endpoint.as_deref().unwrap_or(""),
        config.observability.enable_json_logging,
    )?;

    info!("Starting reservations-rs service");
    info!(
        "Service: {} v{}",
        config.observability.service_name, config.observability.service_version
    );
    info!("Region: {}", config.aws.region);
    info!(
        "DynamoDB tables: tables={}, reservations={}",
        config.database.tables_table_name, config.database.reservations_table_name
    );

    let metrics = Arc::new(Metrics::new()?);
    info!("Metrics initialized successfully");

    // AWS client from config (already configured with region and credentials)
    let dynamodb_client = Arc::new(config.aws.dynamodb_client.clone());

    let store_manager = Arc::new(StoreManager::new(dynamodb_client.clone()));

    let table_repository = Arc::new(DynamoDbTableRepository::new(
        dynamodb_client.clone(),
        config.database.tables_table_name.clone(),
        config.database.region.clone(),
    ));
    let reservation_repository = Arc::new(DynamoDbReservationRepository::new(
        dynamodb_client.clone(),
        config.database.reservations_table_name.clone(),
        config.database.region.clone(),
    ));
    info!("Repositories initialized successfully");

    let hub = Arc::new(ChatHub::new(config.chat.channel_capacity));
    info!(
        "Chat hub initialized with capacity {}",
        config.chat.channel_capacity
    );

    let reservation_service = if config.chat.events_enabled {
        let hub_config = HubConfig {
            channel_capacity: config.chat.channel_capacity,
            enabled: true,
        };
        let events = Arc::new(ReservationEvents::new(hub.clone(), &hub_config));
        info!("Reservation event publishing enabled");
        Arc::new(ReservationService::new_with_events(
            table_repository.clone(),
            reservation_repository.clone(),
            events,
        ))
    } else {
        info!("Reservation event publishing disabled");
        Arc::new(ReservationService::new(
            table_repository.clone(),
            reservation_repository.clone(),
        ))
    };
    let table_service = Arc::new(TableService::new(table_repository));
    info!("Services initialized successfully");

    let app = create_app(
        metrics,
        reservation_service,
        table_service,
        store_manager,
        hub,
        config.auth.clone(),
        config.database.tables_table_name.clone(),
        config.database.reservations_table_name.clone(),
    );

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("Shutdown signal received");
        shutdown_observability().await;
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn create_app(
    metrics: Arc<Metrics>,
    reservation_service: Arc<ReservationService>,
    table_service: Arc<TableService>,
    store_manager: Arc<StoreManager>,
    hub: Arc<ChatHub>,
    auth_config: AuthConfig,
    tables_table_name: String,
    reservations_table_name: String,
) -> Router {
    let metrics_for_middleware = metrics.clone();

    let api_state = api::ApiState {
        reservation_service: reservation_service.clone(),
    };

    let admin_state = admin::AdminState {
        reservation_service,
        table_service,
        store_manager,
        tables_table_name,
        reservations_table_name,
    };

    let auth_state = auth::AuthState { auth: auth_config };

    let chat_state = chat::ChatState {
        hub,
        metrics: metrics.clone(),
    };

    Router::new()
        // Health and metrics endpoints (with metrics state)
        .route("/health/status", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
        // Login stub
        .route("/login", post(auth::login))
        .with_state(auth_state)
        // Chat channel
        .route("/ws", get(chat::chat_ws))
        .with_state(chat_state)
        // Client endpoints (with API state)
        .route(
            "/api/client/reservations",
            get(api::list_reservations).post(api::create_reservation),
        )
        .route("/api/client/reservations/:id", get(api::get_reservation))
        .route(
            "/api/client/reservations/:id/cancel",
            post(api::cancel_reservation),
        )
        .with_state(api_state)
        // Admin endpoints (with admin state)
        .route(
            "/api/admin/reservations",
            get(admin::list_reservations).post(admin::create_reservation),
        )
        .route(
            "/api/admin/reservations/:id/cancel",
            post(admin::cancel_reservation),
        )
        .route("/api/admin/occupancy", get(admin::occupancy_report))
        .route(
            "/api/admin/tables",
            get(admin::list_tables).post(admin::create_table),
        )
        .route("/api/admin/tables/:id", delete(admin::delete_table))
        .route(
            "/api/admin/tables/:id/availability",
            put(admin::set_table_availability),
        )
        .route("/api/admin/setup-tables", post(admin::setup_tables))
        .with_state(admin_state)
        // Add middleware layers (order matters - outer to inner)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(cors_middleware))
        .layer(middleware::from_fn(request_validation_middleware))
        .layer(middleware::from_fn(move |req, next| {
            observability_middleware(metrics_for_middleware.clone(), req, next)
        }))
}
