use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Originator, ReservationStatus};

/// A booking of one table for one date/time by one customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: u32,
    pub customer: String,
    pub email: String,
    pub date: String,
    pub time: String,
    pub party_size: u32,
    pub table_id: u32,
    pub status: ReservationStatus,
    pub origin: Originator,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request model for creating a new reservation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReservationRequest {
    pub customer: String,
    pub email: String,
    pub date: String,
    pub time: String,
    pub party_size: u32,
}

/// Response model for reservation listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationListResponse {
    pub reservations: Vec<Reservation>,
    pub total_count: usize,
}

/// Occupancy figures for one calendar date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyReport {
    pub date: String,
    pub total_tables: usize,
    pub occupied_count: usize,
    pub free_count: usize,
    pub occupancy_percentage: Decimal,
}

impl Reservation {
    /// Create a new active reservation from a validated request
    pub fn new(id: u32, request: CreateReservationRequest, table_id: u32, origin: Originator) -> Self {
        let now = Utc::now();
        Self {
            id,
            customer: request.customer,
            email: request.email,
            date: request.date,
            time: request.time,
            party_size: request.party_size,
            table_id,
            status: ReservationStatus::Active,
            origin,
            created_at: now,
            updated_at: now,
        }
    }

    /// Flip the reservation to cancelled; repeat cancellation is allowed
    pub fn cancel(&mut self) {
        self.status = ReservationStatus::Cancelled;
        self.updated_at = Utc::now();
    }

    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }
}

impl OccupancyReport {
    /// Build a report from raw counts. The percentage carries exactly two
    /// fraction digits and is 0.00 when there are no tables.
    pub fn from_counts(date: String, total_tables: usize, occupied_count: usize) -> Self {
        let free_count = total_tables.saturating_sub(occupied_count);
        let mut occupancy_percentage = if total_tables == 0 {
            Decimal::ZERO
        } else {
            Decimal::from(occupied_count as u64) * Decimal::from(100u32)
                / Decimal::from(total_tables as u64)
        };
        occupancy_percentage = occupancy_percentage.round_dp(2);
        occupancy_percentage.rescale(2);

        Self {
            date,
            total_tables,
            occupied_count,
            free_count,
            occupancy_percentage,
        }
    }
}
