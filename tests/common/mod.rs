#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use reservations_rs::handlers::{
    admin, api, auth, chat, cors_middleware, health_check, metrics_handler,
    request_validation_middleware, security_headers_middleware,
};
use reservations_rs::config::AuthConfig;
use reservations_rs::models::{
    HubConfig, RepositoryError, RepositoryResult, Reservation, ReservationStatus, Table,
};
use reservations_rs::observability::{observability_middleware, Metrics};
use reservations_rs::repositories::{ReservationRepository, StoreManager, TableRepository};
use reservations_rs::services::{ChatHub, ReservationEvents, ReservationService, TableService};

/// In-memory TableRepository with the same conditional-update semantics as
/// the DynamoDB implementation
#[derive(Default)]
pub struct InMemoryTableRepository {
    tables: Mutex<Vec<Table>>,
    sequence: Mutex<u32>,
}

impl InMemoryTableRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a table directly, bypassing the service layer
    pub fn insert(&self, table: Table) {
        self.tables.lock().unwrap().push(table);
    }

    pub fn snapshot(&self) -> Vec<Table> {
        self.tables.lock().unwrap().clone()
    }
}

#[async_trait]
impl TableRepository for InMemoryTableRepository {
    async fn find_all(&self) -> RepositoryResult<Vec<Table>> {
        Ok(self.tables.lock().unwrap().clone())
    }

    async fn find_available(&self) -> RepositoryResult<Vec<Table>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.available)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: u32) -> RepositoryResult<Option<Table>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned())
    }

    async fn create(&self, table: Table) -> RepositoryResult<Table> {
        let mut tables = self.tables.lock().unwrap();
        if tables.iter().any(|t| t.id == table.id) {
            return Err(RepositoryError::ConstraintViolation {
                message: "Conditional check failed".to_string(),
            });
        }
        tables.push(table.clone());
        Ok(table)
    }

    async fn set_available(&self, id: u32, available: bool) -> RepositoryResult<Option<Table>> {
        let mut tables = self.tables.lock().unwrap();
        match tables.iter_mut().find(|t| t.id == id) {
            Some(table) => {
                table.available = available;
                Ok(Some(table.clone()))
            }
            None => Ok(None),
        }
    }

    async fn claim(&self, id: u32) -> RepositoryResult<bool> {
        let mut tables = self.tables.lock().unwrap();
        match tables.iter_mut().find(|t| t.id == id && t.available) {
            Some(table) => {
                table.available = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: u32) -> RepositoryResult<Option<Table>> {
        let mut tables = self.tables.lock().unwrap();
        match tables.iter().position(|t| t.id == id) {
            Some(index) => Ok(Some(tables.remove(index))),
            None => Ok(None),
        }
    }

    async fn count(&self) -> RepositoryResult<usize> {
        Ok(self.tables.lock().unwrap().len())
    }

    async fn next_id(&self) -> RepositoryResult<u32> {
        let mut sequence = self.sequence.lock().unwrap();
        *sequence += 1;
        Ok(*sequence)
    }
}

/// In-memory ReservationRepository
#[derive(Default)]
pub struct InMemoryReservationRepository {
    reservations: Mutex<Vec<Reservation>>,
    sequence: Mutex<u32>,
}

impl InMemoryReservationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Reservation> {
        self.reservations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReservationRepository for InMemoryReservationRepository {
    async fn find_all(&self) -> RepositoryResult<Vec<Reservation>> {
        Ok(self.reservations.lock().unwrap().clone())
    }

    async fn find_by_date(&self, date: &str) -> RepositoryResult<Vec<Reservation>> {
        Ok(self
            .reservations
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.date == date)
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: u32) -> RepositoryResult<Option<Reservation>> {
        Ok(self
            .reservations
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn find_active_conflict(
        &self,
        table_id: u32,
        date: &str,
    ) -> RepositoryResult<Option<Reservation>> {
        Ok(self
            .reservations
            .lock()
            .unwrap()
            .iter()
            .find(|r| {
                r.table_id == table_id && r.date == date && r.status == ReservationStatus::Active
            })
            .cloned())
    }

    async fn create(&self, reservation: Reservation) -> RepositoryResult<Reservation> {
        let mut reservations = self.reservations.lock().unwrap();
        if reservations.iter().any(|r| r.id == reservation.id) {
            return Err(RepositoryError::ConstraintViolation {
                message: "Conditional check failed".to_string(),
            });
        }
        reservations.push(reservation.clone());
        Ok(reservation)
    }

    async fn set_status(
        &self,
        id: u32,
        status: ReservationStatus,
    ) -> RepositoryResult<Option<Reservation>> {
        let mut reservations = self.reservations.lock().unwrap();
        match reservations.iter_mut().find(|r| r.id == id) {
            Some(reservation) => {
                reservation.status = status;
                reservation.updated_at = chrono::Utc::now();
                Ok(Some(reservation.clone()))
            }
            None => Ok(None),
        }
    }

    async fn count_active_on_date(&self, date: &str) -> RepositoryResult<usize> {
        Ok(self
            .reservations
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.date == date && r.status == ReservationStatus::Active)
            .count())
    }

    async fn count(&self) -> RepositoryResult<usize> {
        Ok(self.reservations.lock().unwrap().len())
    }

    async fn next_id(&self) -> RepositoryResult<u32> {
        let mut sequence = self.sequence.lock().unwrap();
        *sequence += 1;
        Ok(*sequence)
    }
}

/// Full application wired over the in-memory repositories
pub struct TestEnvironment {
    pub app: Router,
    pub tables: Arc<InMemoryTableRepository>,
    pub reservations: Arc<InMemoryReservationRepository>,
    pub hub: Arc<ChatHub>,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let tables = Arc::new(InMemoryTableRepository::new());
        let reservations = Arc::new(InMemoryReservationRepository::new());
        let hub = Arc::new(ChatHub::new(16));

        let hub_config = HubConfig::default();
        let events = Arc::new(ReservationEvents::new(hub.clone(), &hub_config));

        // Seeded RNG keeps table selection reproducible across runs
        let reservation_service = Arc::new(
            ReservationService::new_with_events(tables.clone(), reservations.clone(), events)
                .with_rng_seed(7),
        );
        let table_service = Arc::new(TableService::new(tables.clone()));

        // The store manager is only exercised by the setup endpoint, which
        // these tests never call; an offline client is enough to wire it.
        let dynamodb_config = aws_sdk_dynamodb::Config::builder()
            .region(aws_sdk_dynamodb::config::Region::new("us-east-1"))
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .build();
        let store_manager = Arc::new(StoreManager::new(Arc::new(
            aws_sdk_dynamodb::Client::from_conf(dynamodb_config),
        )));

        let metrics = Arc::new(Metrics::new().unwrap());
        let metrics_for_middleware = metrics.clone();

        let api_state = api::ApiState {
            reservation_service: reservation_service.clone(),
        };
        let admin_state = admin::AdminState {
            reservation_service,
            table_service,
            store_manager,
            tables_table_name: "TestTables".to_string(),
            reservations_table_name: "TestReservations".to_string(),
        };
        let auth_state = auth::AuthState {
            auth: AuthConfig {
                admin_username: "admin".to_string(),
                admin_password: "adminpass".to_string(),
            },
        };
        let chat_state = chat::ChatState {
            hub: hub.clone(),
            metrics: metrics.clone(),
        };

        let app = Router::new()
            .route("/health/status", get(health_check))
            .route("/metrics", get(metrics_handler))
            .with_state(metrics)
            .route("/login", post(auth::login))
            .with_state(auth_state)
            .route("/ws", get(chat::chat_ws))
            .with_state(chat_state)
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
            .layer(middleware::from_fn(security_headers_middleware))
            .layer(middleware::from_fn(cors_middleware))
            .layer(middleware::from_fn(request_validation_middleware))
            .layer(middleware::from_fn(move |req, next| {
                observability_middleware(metrics_for_middleware.clone(), req, next)
            }));

        Self {
            app,
            tables,
            reservations,
            hub,
        }
    }

    /// Seed tables with explicit ids directly into the store
    pub fn seed_table(&self, id: u32, capacity: u32) {
        self.tables.insert(Table::new(id, capacity));
    }

    /// Issue a request and return status plus parsed JSON body
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        let request = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                builder.body(Body::from(json.to_string())).unwrap()
            }
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}
