use chrono::{NaiveDate, NaiveTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{instrument, warn};

use crate::models::{
    CreateReservationRequest, OccupancyReport, Originator, Reservation, ReservationEvent,
    ReservationListResponse, ReservationStatus, ServiceError, ServiceResult, ValidationError,
};
use crate::repositories::{ReservationRepository, TableRepository};
use crate::services::ReservationEvents;

/// Service implementing the reservation assignment and consistency rules
pub struct ReservationService {
    tables: Arc<dyn TableRepository>,
    reservations: Arc<dyn ReservationRepository>,
    events: Option<Arc<ReservationEvents>>,
    rng: Mutex<StdRng>,
}

impl ReservationService {
    /// Create a new ReservationService
    pub fn new(
        tables: Arc<dyn TableRepository>,
        reservations: Arc<dyn ReservationRepository>,
    ) -> Self {
        Self {
            tables,
            reservations,
            events: None,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Create a new ReservationService that publishes lifecycle events
    pub fn new_with_events(
        tables: Arc<dyn TableRepository>,
        reservations: Arc<dyn ReservationRepository>,
        events: Arc<ReservationEvents>,
    ) -> Self {
        Self {
            tables,
            reservations,
            events: Some(events),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the table-selection RNG with a seeded one for reproducible runs
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Create a reservation by assigning a random available table.
    ///
    /// The chosen table is claimed with a conditional availability flip; a
    /// lost claim removes the candidate and selection retries on the rest.
    /// Table capacity is intentionally not matched against the party size.
    #[instrument(skip(self, request), fields(customer = %request.customer, date = %request.date, origin = %origin))]
    pub async fn create_reservation(
        &self,
        request: CreateReservationRequest,
        origin: Originator,
    ) -> ServiceResult<Reservation> {
        crate::info_with_trace!("Creating reservation");

        self.validate_create_request(&request)?;

        let mut candidates = self.tables.find_available().await?;
        if candidates.is_empty() {
            crate::warn_with_trace!("No tables available to reserve");
            return Err(ServiceError::NoTablesAvailable);
        }

        let selected = loop {
            if candidates.is_empty() {
                crate::warn_with_trace!("All candidate tables were claimed concurrently");
                return Err(ServiceError::NoTablesAvailable);
            }

            let index = self.rng.lock().await.gen_range(0..candidates.len());
            let candidate = candidates.swap_remove(index);

            if let Some(conflict) = self
                .reservations
                .find_active_conflict(candidate.id, &request.date)
                .await?
            {
                crate::warn_with_trace!(
                    "Table {} already reserved for {} by reservation {}",
                    candidate.id,
                    request.date,
                    conflict.id
                );
                return Err(ServiceError::TableAlreadyReserved {
                    table_id: candidate.id,
                    date: request.date.clone(),
                });
            }

            if self.tables.claim(candidate.id).await? {
                break candidate;
            }
            // Lost the claim race; retry with the remaining candidates
        };

        let id = self.reservations.next_id().await?;
        let reservation = Reservation::new(id, request, selected.id, origin);

        let created = match self.reservations.create(reservation).await {
            Ok(created) => created,
            Err(e) => {
                // Release the claimed table so it is not stranded unavailable
                if let Err(release_err) = self.tables.set_available(selected.id, true).await {
                    warn!(
                        table_id = %selected.id,
                        error = %release_err,
                        "Failed to release table after reservation create failure"
                    );
                }
                return Err(e.into());
            }
        };

        if let Some(ref events) = self.events {
            if let Err(e) = events.emit(ReservationEvent::reservation_created(&created)) {
                warn!(
                    reservation_id = %created.id,
                    error = %e,
                    "Failed to publish ReservationCreated event"
                );
            }
        }

        crate::info_with_trace!(
            "Reservation {} created for table {} on {}",
            created.id,
            created.table_id,
            created.date
        );
        Ok(created)
    }

    /// Cancel a reservation and free its table.
    ///
    /// Cancelling an already-cancelled reservation succeeds again and simply
    /// re-frees the table.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn cancel_reservation(&self, id: u32) -> ServiceResult<Reservation> {
        crate::info_with_trace!("Cancelling reservation");

        let cancelled = match self
            .reservations
            .set_status(id, ReservationStatus::Cancelled)
            .await?
        {
            Some(reservation) => reservation,
            None => {
                crate::warn_with_trace!("Reservation {} not found", id);
                return Err(ServiceError::ReservationNotFound { id });
            }
        };

        match self.tables.set_available(cancelled.table_id, true).await? {
            Some(_) => {}
            None => {
                // The table may have been removed since; tolerated
                warn!(
                    table_id = %cancelled.table_id,
                    "Table missing while releasing cancelled reservation"
                );
            }
        }

        if let Some(ref events) = self.events {
            if let Err(e) = events.emit(ReservationEvent::reservation_cancelled(&cancelled)) {
                warn!(
                    reservation_id = %cancelled.id,
                    error = %e,
                    "Failed to publish ReservationCancelled event"
                );
            }
        }

        crate::info_with_trace!("Reservation {} cancelled", cancelled.id);
        Ok(cancelled)
    }

    /// Get a reservation by its id
    #[instrument(skip(self), fields(id = %id))]
    pub async fn get_reservation(&self, id: u32) -> ServiceResult<Reservation> {
        crate::info_with_trace!("Retrieving reservation");

        match self.reservations.find_by_id(id).await? {
            Some(reservation) => Ok(reservation),
            None => {
                crate::warn_with_trace!("Reservation {} not found", id);
                Err(ServiceError::ReservationNotFound { id })
            }
        }
    }

    /// List all reservations, any status
    #[instrument(skip(self))]
    pub async fn list_reservations(&self) -> ServiceResult<ReservationListResponse> {
        crate::info_with_trace!("Listing reservations");

        let reservations = self.reservations.find_all().await?;
        let total_count = reservations.len();

        Ok(ReservationListResponse {
            reservations,
            total_count,
        })
    }

    /// All reservations for a calendar date, any status
    #[instrument(skip(self), fields(date = %date))]
    pub async fn reservations_for_date(&self, date: &str) -> ServiceResult<ReservationListResponse> {
        crate::info_with_trace!("Filtering reservations by date");

        self.validate_date(date)?;

        let reservations = self.reservations.find_by_date(date).await?;
        let total_count = reservations.len();

        Ok(ReservationListResponse {
            reservations,
            total_count,
        })
    }

    /// Occupancy figures for a date; defaults to today (UTC)
    #[instrument(skip(self), fields(date = ?date))]
    pub async fn occupancy_report(&self, date: Option<String>) -> ServiceResult<OccupancyReport> {
        let date = match date {
            Some(date) => {
                self.validate_date(&date)?;
                date
            }
            None => Utc::now().format("%Y-%m-%d").to_string(),
        };

        crate::info_with_trace!("Building occupancy report for {}", date);

        let total_tables = self.tables.count().await?;
        let occupied_count = self.reservations.count_active_on_date(&date).await?;

        Ok(OccupancyReport::from_counts(date, total_tables, occupied_count))
    }

    /// Validate a create request
    fn validate_create_request(&self, request: &CreateReservationRequest) -> ServiceResult<()> {
        if request.customer.trim().is_empty() {
            return Err(ValidationError::RequiredField {
                field: "customer".to_string(),
            }
            .into());
        }

        if request.email.trim().is_empty() {
            return Err(ValidationError::RequiredField {
                field: "email".to_string(),
            }
            .into());
        }

        if !request.email.contains('@') {
            return Err(ValidationError::InvalidFormat {
                field: "email".to_string(),
                expected: "address containing '@'".to_string(),
            }
            .into());
        }

        self.validate_date(&request.date)?;

        if NaiveTime::parse_from_str(&request.time, "%H:%M").is_err() {
            return Err(ValidationError::InvalidFormat {
                field: "time".to_string(),
                expected: "HH:MM".to_string(),
            }
            .into());
        }

        if request.party_size == 0 {
            return Err(ValidationError::InvalidValue {
                field: "party_size".to_string(),
                value: request.party_size.to_string(),
                reason: "Party size must be at least 1".to_string(),
            }
            .into());
        }

        Ok(())
    }

    fn validate_date(&self, date: &str) -> ServiceResult<()> {
        if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_err() {
            return Err(ValidationError::InvalidFormat {
                field: "date".to_string(),
                expected: "YYYY-MM-DD".to_string(),
            }
            .into());
        }
        Ok(())
    }
}
