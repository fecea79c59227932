use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

use crate::handlers::api::service_error_to_response;
use crate::models::{
    CreateReservationRequest, CreateTableRequest, OccupancyReport, Originator, Reservation,
    ReservationListResponse, SetAvailabilityRequest, Table, TableListResponse,
};
use crate::repositories::StoreManager;
use crate::services::{ReservationService, TableService};

/// Admin state containing services and store management
#[derive(Clone)]
pub struct AdminState {
    pub reservation_service: Arc<ReservationService>,
    pub table_service: Arc<TableService>,
    pub store_manager: Arc<StoreManager>,
    pub tables_table_name: String,
    pub reservations_table_name: String,
}

/// Query parameters for listing reservations
#[derive(Debug, Deserialize)]
pub struct ReservationsQuery {
    pub date: Option<String>,
}

/// Query parameters for the occupancy report
#[derive(Debug, Deserialize)]
pub struct OccupancyQuery {
    pub date: Option<String>,
}

/// Response for store setup operations
#[derive(Debug, Serialize)]
pub struct SetupTablesResponse {
    pub message: String,
    pub tables_created: Vec<String>,
    pub timestamp: String,
}

// =============================================================================
// ADMIN RESERVATION ENDPOINTS
// =============================================================================

/// Create a reservation on behalf of the administrator
#[instrument(name = "admin_create_reservation", skip(state, request), fields(
    customer = %request.customer,
    date = %request.date,
))]
pub async fn create_reservation(
    State(state): State<AdminState>,
    Json(request): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), (StatusCode, Json<Value>)> {
    crate::info_with_trace!("Creating admin reservation");

    match state
        .reservation_service
        .create_reservation(request, Originator::Admin)
        .await
    {
        Ok(reservation) => Ok((StatusCode::CREATED, Json(reservation))),
        Err(err) => {
            crate::error_with_trace!("Failed to create reservation: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// List reservations, optionally filtered by date
#[instrument(name = "admin_list_reservations", skip(state), fields(date = ?query.date))]
pub async fn list_reservations(
    State(state): State<AdminState>,
    Query(query): Query<ReservationsQuery>,
) -> Result<Json<ReservationListResponse>, (StatusCode, Json<Value>)> {
    crate::info_with_trace!("Listing reservations for admin panel");

    let result = match query.date {
        Some(date) => state.reservation_service.reservations_for_date(&date).await,
        None => state.reservation_service.list_reservations().await,
    };

    match result {
        Ok(response) => Ok(Json(response)),
        Err(err) => {
            crate::error_with_trace!("Failed to list reservations: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// Cancel a reservation and free its table
#[instrument(name = "admin_cancel_reservation", skip(state), fields(id = %id))]
pub async fn cancel_reservation(
    State(state): State<AdminState>,
    Path(id): Path<u32>,
) -> Result<Json<Reservation>, (StatusCode, Json<Value>)> {
    crate::info_with_trace!("Cancelling reservation {}", id);

    match state.reservation_service.cancel_reservation(id).await {
        Ok(reservation) => Ok(Json(reservation)),
        Err(err) => {
            crate::error_with_trace!("Failed to cancel reservation {}: {}", id, err);
            Err(service_error_to_response(err))
        }
    }
}

/// Occupancy report for a date, defaulting to today
#[instrument(name = "occupancy_report", skip(state), fields(date = ?query.date))]
pub async fn occupancy_report(
    State(state): State<AdminState>,
    Query(query): Query<OccupancyQuery>,
) -> Result<Json<OccupancyReport>, (StatusCode, Json<Value>)> {
    crate::info_with_trace!("Building occupancy report");

    match state.reservation_service.occupancy_report(query.date).await {
        Ok(report) => Ok(Json(report)),
        Err(err) => {
            crate::error_with_trace!("Failed to build occupancy report: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

// =============================================================================
// TABLE INVENTORY ENDPOINTS
// =============================================================================

/// List all tables
#[instrument(name = "list_tables", skip(state))]
pub async fn list_tables(
    State(state): State<AdminState>,
) -> Result<Json<TableListResponse>, (StatusCode, Json<Value>)> {
    crate::info_with_trace!("Listing tables");

    match state.table_service.list_tables().await {
        Ok(response) => Ok(Json(response)),
        Err(err) => {
            crate::error_with_trace!("Failed to list tables: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// Add a table to the inventory
#[instrument(name = "create_table", skip(state, request), fields(capacity = %request.capacity))]
pub async fn create_table(
    State(state): State<AdminState>,
    Json(request): Json<CreateTableRequest>,
) -> Result<(StatusCode, Json<Table>), (StatusCode, Json<Value>)> {
    crate::info_with_trace!("Adding table");

    match state.table_service.add_table(request).await {
        Ok(table) => {
            crate::info_with_trace!("Table {} added", table.id);
            Ok((StatusCode::CREATED, Json(table)))
        }
        Err(err) => {
            crate::error_with_trace!("Failed to add table: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// Remove a table from the inventory
#[instrument(name = "delete_table", skip(state), fields(id = %id))]
pub async fn delete_table(
    State(state): State<AdminState>,
    Path(id): Path<u32>,
) -> Result<StatusCode, (StatusCode, Json<Value>)> {
    crate::info_with_trace!("Removing table {}", id);

    match state.table_service.remove_table(id).await {
        Ok(_) => Ok(StatusCode::NO_CONTENT),
        Err(err) => {
            crate::error_with_trace!("Failed to remove table {}: {}", id, err);
            Err(service_error_to_response(err))
        }
    }
}

/// Explicitly override a table's availability flag
#[instrument(name = "set_table_availability", skip(state, request), fields(id = %id, available = %request.available))]
pub async fn set_table_availability(
    State(state): State<AdminState>,
    Path(id): Path<u32>,
    Json(request): Json<SetAvailabilityRequest>,
) -> Result<Json<Table>, (StatusCode, Json<Value>)> {
    crate::info_with_trace!("Overriding availability for table {}", id);

    match state
        .table_service
        .set_availability(id, request.available)
        .await
    {
        Ok(table) => Ok(Json(table)),
        Err(err) => {
            crate::error_with_trace!("Failed to update table {}: {}", id, err);
            Err(service_error_to_response(err))
        }
    }
}

// =============================================================================
// STORE SETUP ENDPOINT
// =============================================================================

/// Provision the backing DynamoDB tables
#[instrument(name = "setup_tables", skip(state), fields(
    tables_table = %state.tables_table_name,
    reservations_table = %state.reservations_table_name,
))]
pub async fn setup_tables(
    State(state): State<AdminState>,
) -> Result<Json<SetupTablesResponse>, (StatusCode, Json<Value>)> {
    let timestamp = chrono::Utc::now().to_rfc3339();

    crate::info_with_trace!("Provisioning backing tables");

    match state
        .store_manager
        .create_all_tables(&state.tables_table_name, &state.reservations_table_name)
        .await
    {
        Ok(()) => {
            let tables_created = vec![
                state.tables_table_name.clone(),
                state.reservations_table_name.clone(),
            ];

            crate::info_with_trace!("Successfully created tables: {:?}", tables_created);

            Ok(Json(SetupTablesResponse {
                message: format!("Successfully created {} tables", tables_created.len()),
                tables_created,
                timestamp,
            }))
        }
        Err(err) => {
            crate::error_with_trace!("Failed to create tables: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Failed to create tables",
                    "message": err.to_string(),
                    "timestamp": timestamp,
                })),
            ))
        }
    }
}
