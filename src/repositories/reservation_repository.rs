use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue, Select};
use aws_sdk_dynamodb::{Client as DynamoDbClient, Error as DynamoDbError};
use chrono::DateTime;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument, warn, Instrument};

use crate::models::{
    Originator, RepositoryError, RepositoryResult, Reservation, ReservationStatus,
};

/// Reserved id for the reservation id sequence item; excluded from every read
const SEQUENCE_ITEM_ID: u32 = 0;

/// Trait defining the interface for reservation data access
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Find all reservations, any status
    async fn find_all(&self) -> RepositoryResult<Vec<Reservation>>;

    /// Find all reservations for a calendar date, any status
    async fn find_by_date(&self, date: &str) -> RepositoryResult<Vec<Reservation>>;

    /// Find a reservation by its id
    async fn find_by_id(&self, id: u32) -> RepositoryResult<Option<Reservation>>;

    /// Find an active reservation holding the given table on the given date
    async fn find_active_conflict(
        &self,
        table_id: u32,
        date: &str,
    ) -> RepositoryResult<Option<Reservation>>;

    /// Create a new reservation; fails with ConstraintViolation when the id exists
    async fn create(&self, reservation: Reservation) -> RepositoryResult<Reservation>;

    /// Set a reservation's status, returning the updated record or None when
    /// no reservation with that id exists
    async fn set_status(
        &self,
        id: u32,
        status: ReservationStatus,
    ) -> RepositoryResult<Option<Reservation>>;

    /// Count active reservations for a calendar date
    async fn count_active_on_date(&self, date: &str) -> RepositoryResult<usize>;

    /// Count reservations
    async fn count(&self) -> RepositoryResult<usize>;

    /// Allocate the next reservation id from the atomic sequence
    async fn next_id(&self) -> RepositoryResult<u32>;
}

/// DynamoDB implementation of the ReservationRepository trait
pub struct DynamoDbReservationRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
}

impl DynamoDbReservationRepository {
    /// Create a new DynamoDB reservation repository
    pub fn new(client: Arc<DynamoDbClient>, table_name: String, region: String) -> Self {
        Self {
            client,
            table_name,
            region,
        }
    }

    /// Create a DynamoDB client span with the attributes X-Ray cares about
    fn create_dynamodb_span(&self, operation: &str) -> tracing::Span {
        tracing::info_span!(
            "DynamoDB",
            "aws.service" = "DynamoDB",
            "aws.operation" = operation,
            "aws.region" = %self.region,
            "aws.dynamodb.table_name" = %self.table_name,
            "otel.kind" = "client",
            "otel.name" = format!("DynamoDB.{}", operation),
            "rpc.system" = "aws-api",
            "rpc.service" = "AmazonDynamoDBv2",
            "rpc.method" = operation,
            "db.system" = "dynamodb",
            "db.name" = %self.table_name,
            "db.operation" = operation,
        )
    }

    /// Get the table name (for testing)
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Convert a Reservation struct to DynamoDB attribute values
    pub fn reservation_to_item(&self, reservation: &Reservation) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();

        item.insert(
            "id".to_string(),
            AttributeValue::N(reservation.id.to_string()),
        );
        item.insert(
            "customer".to_string(),
            AttributeValue::S(reservation.customer.clone()),
        );
        item.insert(
            "email".to_string(),
            AttributeValue::S(reservation.email.clone()),
        );
        item.insert(
            "reservation_date".to_string(),
            AttributeValue::S(reservation.date.clone()),
        );
        item.insert(
            "reservation_time".to_string(),
            AttributeValue::S(reservation.time.clone()),
        );
        item.insert(
            "party_size".to_string(),
            AttributeValue::N(reservation.party_size.to_string()),
        );
        item.insert(
            "table_id".to_string(),
            AttributeValue::N(reservation.table_id.to_string()),
        );
        item.insert(
            "reservation_status".to_string(),
            AttributeValue::S(reservation.status.to_string()),
        );
        item.insert(
            "origin".to_string(),
            AttributeValue::S(reservation.origin.to_string()),
        );
        item.insert(
            "created_at".to_string(),
            AttributeValue::S(reservation.created_at.to_rfc3339()),
        );
        item.insert(
            "updated_at".to_string(),
            AttributeValue::S(reservation.updated_at.to_rfc3339()),
        );

        item
    }

    /// Convert a DynamoDB item to a Reservation struct
    pub fn item_to_reservation(
        &self,
        item: HashMap<String, AttributeValue>,
    ) -> RepositoryResult<Reservation> {
        let id = item
            .get("id")
            .and_then(|v| v.as_n().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| RepositoryError::InvalidQuery {
                message: "Missing id".to_string(),
            })?;

        let customer = item
            .get("customer")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidQuery {
                message: "Missing customer".to_string(),
            })?
            .clone();

        let email = item
            .get("email")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidQuery {
                message: "Missing email".to_string(),
            })?
            .clone();

        let date = item
            .get("reservation_date")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidQuery {
                message: "Missing reservation_date".to_string(),
            })?
            .clone();

        let time = item
            .get("reservation_time")
            .and_then(|v| v.as_s().ok())
            .ok_or_else(|| RepositoryError::InvalidQuery {
                message: "Missing reservation_time".to_string(),
            })?
            .clone();

        let party_size = item
            .get("party_size")
            .and_then(|v| v.as_n().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| RepositoryError::InvalidQuery {
                message: "Invalid party_size".to_string(),
            })?;

        let table_id = item
            .get("table_id")
            .and_then(|v| v.as_n().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| RepositoryError::InvalidQuery {
                message: "Invalid table_id".to_string(),
            })?;

        let status = item
            .get("reservation_status")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| ReservationStatus::from_str(s).ok())
            .ok_or_else(|| RepositoryError::InvalidQuery {
                message: "Invalid reservation_status".to_string(),
            })?;

        let origin = item
            .get("origin")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| Originator::from_str(s).ok())
            .ok_or_else(|| RepositoryError::InvalidQuery {
                message: "Invalid origin".to_string(),
            })?;

        let created_at = item
            .get("created_at")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .ok_or_else(|| RepositoryError::InvalidQuery {
                message: "Invalid created_at".to_string(),
            })?;

        let updated_at = item
            .get("updated_at")
            .and_then(|v| v.as_s().ok())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or(created_at);

        Ok(Reservation {
            id,
            customer,
            email,
            date,
            time,
            party_size,
            table_id,
            status,
            origin,
            created_at,
            updated_at,
        })
    }

    /// Convert DynamoDB error to RepositoryError
    fn map_dynamodb_error(&self, error: DynamoDbError) -> RepositoryError {
        error!("DynamoDB error: {:?}", error);

        match error {
            DynamoDbError::ResourceNotFoundException(_) => RepositoryError::StoreTableNotFound {
                table_name: self.table_name.clone(),
            },
            DynamoDbError::ConditionalCheckFailedException(_) => {
                RepositoryError::ConstraintViolation {
                    message: "Conditional check failed".to_string(),
                }
            }
            other => RepositoryError::AwsSdk {
                message: other.to_string(),
            },
        }
    }

    async fn scan_reservations(
        &self,
        filter_expression: &str,
        values: HashMap<String, AttributeValue>,
    ) -> RepositoryResult<Vec<Reservation>> {
        let scan_span = self.create_dynamodb_span("Scan");

        let response = async {
            self.client
                .scan()
                .table_name(&self.table_name)
                .select(Select::AllAttributes)
                .filter_expression(filter_expression)
                .set_expression_attribute_values(Some(values))
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))
        }
        .instrument(scan_span)
        .await?;

        let mut reservations = Vec::new();
        if let Some(items) = response.items {
            for item in items {
                match self.item_to_reservation(item) {
                    Ok(reservation) => reservations.push(reservation),
                    Err(e) => {
                        warn!("Failed to parse reservation item: {}", e);
                        continue;
                    }
                }
            }
        }

        Ok(reservations)
    }
}

#[async_trait]
impl ReservationRepository for DynamoDbReservationRepository {
    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn find_all(&self) -> RepositoryResult<Vec<Reservation>> {
        info!("Finding all reservations");

        let mut values = HashMap::new();
        values.insert(
            ":seq_id".to_string(),
            AttributeValue::N(SEQUENCE_ITEM_ID.to_string()),
        );

        let reservations = self.scan_reservations("id <> :seq_id", values).await?;

        info!("Found {} reservations", reservations.len());
        Ok(reservations)
    }

    #[instrument(skip(self), fields(table = %self.table_name, date = %date))]
    async fn find_by_date(&self, date: &str) -> RepositoryResult<Vec<Reservation>> {
        info!("Finding reservations by date");

        let mut values = HashMap::new();
        values.insert(":date".to_string(), AttributeValue::S(date.to_string()));

        let reservations = self
            .scan_reservations("reservation_date = :date", values)
            .await?;

        info!("Found {} reservations for {}", reservations.len(), date);
        Ok(reservations)
    }

    #[instrument(skip(self), fields(table = %self.table_name, id = %id))]
    async fn find_by_id(&self, id: u32) -> RepositoryResult<Option<Reservation>> {
        info!("Finding reservation by id");

        if id == SEQUENCE_ITEM_ID {
            return Ok(None);
        }

        let get_span = self.create_dynamodb_span("GetItem");

        let response = async {
            self.client
                .get_item()
                .table_name(&self.table_name)
                .key("id", AttributeValue::N(id.to_string()))
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))
        }
        .instrument(get_span)
        .await?;

        match response.item {
            Some(item) => Ok(Some(self.item_to_reservation(item)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(table = %self.table_name, table_id = %table_id, date = %date))]
    async fn find_active_conflict(
        &self,
        table_id: u32,
        date: &str,
    ) -> RepositoryResult<Option<Reservation>> {
        info!("Checking for an active reservation on this table and date");

        let mut values = HashMap::new();
        values.insert(
            ":table_id".to_string(),
            AttributeValue::N(table_id.to_string()),
        );
        values.insert(":date".to_string(), AttributeValue::S(date.to_string()));
        values.insert(
            ":status".to_string(),
            AttributeValue::S(ReservationStatus::Active.to_string()),
        );

        let mut conflicts = self
            .scan_reservations(
                "table_id = :table_id AND reservation_date = :date AND reservation_status = :status",
                values,
            )
            .await?;

        Ok(conflicts.pop())
    }

    #[instrument(skip(self, reservation), fields(table = %self.table_name, id = %reservation.id))]
    async fn create(&self, reservation: Reservation) -> RepositoryResult<Reservation> {
        info!("Creating new reservation");

        let item = self.reservation_to_item(&reservation);
        let put_span = self.create_dynamodb_span("PutItem");

        async {
            self.client
                .put_item()
                .table_name(&self.table_name)
                .set_item(Some(item))
                .condition_expression("attribute_not_exists(id)")
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))
        }
        .instrument(put_span)
        .await?;

        info!("Reservation created successfully");
        Ok(reservation)
    }

    #[instrument(skip(self), fields(table = %self.table_name, id = %id, status = %status))]
    async fn set_status(
        &self,
        id: u32,
        status: ReservationStatus,
    ) -> RepositoryResult<Option<Reservation>> {
        info!("Updating reservation status");

        let update_span = self.create_dynamodb_span("UpdateItem");

        let result = async {
            self.client
                .update_item()
                .table_name(&self.table_name)
                .key("id", AttributeValue::N(id.to_string()))
                .update_expression("SET reservation_status = :status, updated_at = :now")
                .condition_expression("attribute_exists(id)")
                .expression_attribute_values(":status", AttributeValue::S(status.to_string()))
                .expression_attribute_values(
                    ":now",
                    AttributeValue::S(chrono::Utc::now().to_rfc3339()),
                )
                .return_values(ReturnValue::AllNew)
                .send()
                .await
        }
        .instrument(update_span)
        .await;

        match result {
            Ok(response) => match response.attributes {
                Some(item) => Ok(Some(self.item_to_reservation(item)?)),
                None => Ok(None),
            },
            Err(e) => {
                let e: DynamoDbError = e.into();
                if matches!(e, DynamoDbError::ConditionalCheckFailedException(_)) {
                    info!("Reservation not found for status update");
                    Ok(None)
                } else {
                    Err(self.map_dynamodb_error(e))
                }
            }
        }
    }

    #[instrument(skip(self), fields(table = %self.table_name, date = %date))]
    async fn count_active_on_date(&self, date: &str) -> RepositoryResult<usize> {
        info!("Counting active reservations for date");

        let scan_span = self.create_dynamodb_span("Scan");

        let response = async {
            self.client
                .scan()
                .table_name(&self.table_name)
                .select(Select::Count)
                .filter_expression("reservation_date = :date AND reservation_status = :status")
                .expression_attribute_values(":date", AttributeValue::S(date.to_string()))
                .expression_attribute_values(
                    ":status",
                    AttributeValue::S(ReservationStatus::Active.to_string()),
                )
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))
        }
        .instrument(scan_span)
        .await?;

        let count = response.count() as usize;
        info!("Active reservation count for {}: {}", date, count);
        Ok(count)
    }

    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn count(&self) -> RepositoryResult<usize> {
        info!("Counting reservations");

        let scan_span = self.create_dynamodb_span("Scan");

        let response = async {
            self.client
                .scan()
                .table_name(&self.table_name)
                .select(Select::Count)
                .filter_expression("id <> :seq_id")
                .expression_attribute_values(
                    ":seq_id",
                    AttributeValue::N(SEQUENCE_ITEM_ID.to_string()),
                )
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))
        }
        .instrument(scan_span)
        .await?;

        let count = response.count() as usize;
        info!("Reservation count: {}", count);
        Ok(count)
    }

    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn next_id(&self) -> RepositoryResult<u32> {
        let update_span = self.create_dynamodb_span("UpdateItem");

        let response = async {
            self.client
                .update_item()
                .table_name(&self.table_name)
                .key("id", AttributeValue::N(SEQUENCE_ITEM_ID.to_string()))
                .update_expression("ADD #seq :one")
                .expression_attribute_names("#seq", "seq")
                .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
                .return_values(ReturnValue::UpdatedNew)
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))
        }
        .instrument(update_span)
        .await?;

        let next = response
            .attributes
            .as_ref()
            .and_then(|item| item.get("seq"))
            .and_then(|v| v.as_n().ok())
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(|| RepositoryError::InvalidQuery {
                message: "Sequence update returned no counter value".to_string(),
            })?;

        info!("Allocated reservation id {}", next);
        Ok(next)
    }
}
