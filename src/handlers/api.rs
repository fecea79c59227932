use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::instrument;

use crate::models::{
    CreateReservationRequest, Originator, Reservation, ReservationListResponse, ServiceError,
};
use crate::services::ReservationService;

/// Shared state for the client-facing API
#[derive(Clone)]
pub struct ApiState {
    pub reservation_service: Arc<ReservationService>,
}

// =============================================================================
// CLIENT RESERVATION ENDPOINTS
// =============================================================================

/// Create a reservation on behalf of a client
#[instrument(name = "create_reservation", skip(state, request), fields(
    customer = %request.customer,
    date = %request.date,
))]
pub async fn create_reservation(
    State(state): State<ApiState>,
    Json(request): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<Reservation>), (StatusCode, Json<Value>)> {
    crate::info_with_trace!("Creating client reservation");

    match state
        .reservation_service
        .create_reservation(request, Originator::Client)
        .await
    {
        Ok(reservation) => {
            crate::info_with_trace!("Reservation {} created", reservation.id);
            Ok((StatusCode::CREATED, Json(reservation)))
        }
        Err(err) => {
            crate::error_with_trace!("Failed to create reservation: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// List all reservations
#[instrument(name = "list_reservations", skip(state))]
pub async fn list_reservations(
    State(state): State<ApiState>,
) -> Result<Json<ReservationListResponse>, (StatusCode, Json<Value>)> {
    crate::info_with_trace!("Listing reservations");

    match state.reservation_service.list_reservations().await {
        Ok(response) => Ok(Json(response)),
        Err(err) => {
            crate::error_with_trace!("Failed to list reservations: {}", err);
            Err(service_error_to_response(err))
        }
    }
}

/// Get a reservation by id
#[instrument(name = "get_reservation", skip(state), fields(id = %id))]
pub async fn get_reservation(
    State(state): State<ApiState>,
    Path(id): Path<u32>,
) -> Result<Json<Reservation>, (StatusCode, Json<Value>)> {
    crate::info_with_trace!("Getting reservation {}", id);

    match state.reservation_service.get_reservation(id).await {
        Ok(reservation) => Ok(Json(reservation)),
        Err(err) => {
            crate::error_with_trace!("Failed to get reservation {}: {}", id, err);
            Err(service_error_to_response(err))
        }
    }
}

/// Cancel a reservation and free its table
#[instrument(name = "cancel_reservation", skip(state), fields(id = %id))]
pub async fn cancel_reservation(
    State(state): State<ApiState>,
    Path(id): Path<u32>,
) -> Result<Json<Reservation>, (StatusCode, Json<Value>)> {
    crate::info_with_trace!("Cancelling reservation {}", id);

    match state.reservation_service.cancel_reservation(id).await {
        Ok(reservation) => {
            crate::info_with_trace!("Reservation {} cancelled", id);
            Ok(Json(reservation))
        }
        Err(err) => {
            crate::error_with_trace!("Failed to cancel reservation {}: {}", id, err);
            Err(service_error_to_response(err))
        }
    }
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Convert ServiceError to HTTP response
pub(crate) fn service_error_to_response(err: ServiceError) -> (StatusCode, Json<Value>) {
    let (status, message) = match err {
        ServiceError::ReservationNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        ServiceError::TableNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        ServiceError::NoTablesAvailable => (StatusCode::CONFLICT, err.to_string()),
        ServiceError::TableAlreadyReserved { .. } => (StatusCode::CONFLICT, err.to_string()),
        ServiceError::DuplicateTableId { .. } => (StatusCode::CONFLICT, err.to_string()),
        ServiceError::ValidationError { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        ServiceError::Repository { source } => match source {
            crate::models::RepositoryError::NotFound => {
                (StatusCode::NOT_FOUND, "Resource not found".to_string())
            }
            crate::models::RepositoryError::ConnectionFailed => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Database connection failed".to_string(),
            ),
            crate::models::RepositoryError::Timeout => {
                (StatusCode::REQUEST_TIMEOUT, "Request timeout".to_string())
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        },
        ServiceError::Configuration { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Configuration error".to_string(),
        ),
    };

    (
        status,
        Json(json!({
            "error": message,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepositoryError;

    #[test]
    fn test_not_found_maps_to_404() {
        let (status, _) = service_error_to_response(ServiceError::ReservationNotFound { id: 9 });
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_no_tables_maps_to_conflict() {
        let (status, body) = service_error_to_response(ServiceError::NoTablesAvailable);
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("No tables available"));
    }

    #[test]
    fn test_validation_maps_to_bad_request() {
        let (status, _) = service_error_to_response(ServiceError::ValidationError {
            message: "bad".to_string(),
        });
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_repository_failure_maps_to_5xx() {
        let (status, _) = service_error_to_response(ServiceError::Repository {
            source: RepositoryError::ConnectionFailed,
        });
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
