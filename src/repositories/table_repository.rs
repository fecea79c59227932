use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue, Select};
use aws_sdk_dynamodb::{Client as DynamoDbClient, Error as DynamoDbError};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn, Instrument};

use crate::models::{RepositoryError, RepositoryResult, Table};

/// Reserved id for the per-table id sequence item; excluded from every read
const SEQUENCE_ITEM_ID: u32 = 0;

/// Trait defining the interface for table inventory data access
#[async_trait]
pub trait TableRepository: Send + Sync {
    /// Find all tables
    async fn find_all(&self) -> RepositoryResult<Vec<Table>>;

    /// Find tables currently marked available
    async fn find_available(&self) -> RepositoryResult<Vec<Table>>;

    /// Find a table by its id
    async fn find_by_id(&self, id: u32) -> RepositoryResult<Option<Table>>;

    /// Create a new table; fails with ConstraintViolation when the id exists
    async fn create(&self, table: Table) -> RepositoryResult<Table>;

    /// Set a table's availability flag, returning the updated table or None
    /// when no table with that id exists
    async fn set_available(&self, id: u32, available: bool) -> RepositoryResult<Option<Table>>;

    /// Atomically flip availability from true to false. Returns false when
    /// the table is missing or another caller claimed it first.
    async fn claim(&self, id: u32) -> RepositoryResult<bool>;

    /// Delete a table, returning the removed record or None when absent
    async fn delete(&self, id: u32) -> RepositoryResult<Option<Table>>;

    /// Count tables
    async fn count(&self) -> RepositoryResult<usize>;

    /// Allocate the next table id from the atomic sequence
    async fn next_id(&self) -> RepositoryResult<u32>;
}

/// DynamoDB implementation of the TableRepository trait
pub struct DynamoDbTableRepository {
    client: Arc<DynamoDbClient>,
    table_name: String,
    region: String,
}

impl DynamoDbTableRepository {
    /// Create a new DynamoDB table repository
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

    /// Convert a Table struct to DynamoDB attribute values
    pub fn table_to_item(&self, table: &Table) -> HashMap<String, AttributeValue> {
        let mut item = HashMap::new();

        item.insert("id".to_string(), AttributeValue::N(table.id.to_string()));
        item.insert(
            "capacity".to_string(),
            AttributeValue::N(table.capacity.to_string()),
        );
        item.insert(
            "available".to_string(),
            AttributeValue::Bool(table.available),
        );

        item
    }

    /// Convert a DynamoDB item to a Table struct
    pub fn item_to_table(&self, item: HashMap<String, AttributeValue>) -> RepositoryResult<Table> {
        let id = item
            .get("id")
            .and_then(|v| v.as_n().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| RepositoryError::InvalidQuery {
                message: "Missing id".to_string(),
            })?;

        let capacity = item
            .get("capacity")
            .and_then(|v| v.as_n().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| RepositoryError::InvalidQuery {
                message: "Invalid capacity".to_string(),
            })?;

        let available = item
            .get("available")
            .and_then(|v| v.as_bool().ok())
            .copied()
            .unwrap_or(true);

        Ok(Table {
            id,
            capacity,
            available,
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

    async fn scan_tables(
        &self,
        filter_expression: &str,
        values: HashMap<String, AttributeValue>,
    ) -> RepositoryResult<Vec<Table>> {
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

        let mut tables = Vec::new();
        if let Some(items) = response.items {
            for item in items {
                match self.item_to_table(item) {
                    Ok(table) => tables.push(table),
                    Err(e) => {
                        warn!("Failed to parse table item: {}", e);
                        continue;
                    }
                }
            }
        }

        Ok(tables)
    }
}

#[async_trait]
impl TableRepository for DynamoDbTableRepository {
    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn find_all(&self) -> RepositoryResult<Vec<Table>> {
        info!("Finding all tables");

        let mut values = HashMap::new();
        values.insert(
            ":seq_id".to_string(),
            AttributeValue::N(SEQUENCE_ITEM_ID.to_string()),
        );

        let tables = self.scan_tables("id <> :seq_id", values).await?;

        info!("Found {} tables", tables.len());
        Ok(tables)
    }

    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn find_available(&self) -> RepositoryResult<Vec<Table>> {
        info!("Finding available tables");

        let mut values = HashMap::new();
        values.insert(
            ":seq_id".to_string(),
            AttributeValue::N(SEQUENCE_ITEM_ID.to_string()),
        );
        values.insert(":available".to_string(), AttributeValue::Bool(true));

        let tables = self
            .scan_tables("id <> :seq_id AND available = :available", values)
            .await?;

        info!("Found {} available tables", tables.len());
        Ok(tables)
    }

    #[instrument(skip(self), fields(table = %self.table_name, id = %id))]
    async fn find_by_id(&self, id: u32) -> RepositoryResult<Option<Table>> {
        info!("Finding table by id");

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
            Some(item) => Ok(Some(self.item_to_table(item)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, table), fields(table = %self.table_name, id = %table.id))]
    async fn create(&self, table: Table) -> RepositoryResult<Table> {
        info!("Creating new table");

        let item = self.table_to_item(&table);
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

        info!("Table created successfully");
        Ok(table)
    }

    #[instrument(skip(self), fields(table = %self.table_name, id = %id, available = %available))]
    async fn set_available(&self, id: u32, available: bool) -> RepositoryResult<Option<Table>> {
        info!("Updating table availability");

        let update_span = self.create_dynamodb_span("UpdateItem");

        let result = async {
            self.client
                .update_item()
                .table_name(&self.table_name)
                .key("id", AttributeValue::N(id.to_string()))
                .update_expression("SET available = :available")
                .condition_expression("attribute_exists(id)")
                .expression_attribute_values(":available", AttributeValue::Bool(available))
                .return_values(ReturnValue::AllNew)
                .send()
                .await
        }
        .instrument(update_span)
        .await;

        match result {
            Ok(response) => match response.attributes {
                Some(item) => Ok(Some(self.item_to_table(item)?)),
                None => Ok(None),
            },
            Err(e) => {
                let e: DynamoDbError = e.into();
                if matches!(e, DynamoDbError::ConditionalCheckFailedException(_)) {
                    info!("Table not found for availability update");
                    Ok(None)
                } else {
                    Err(self.map_dynamodb_error(e))
                }
            }
        }
    }

    #[instrument(skip(self), fields(table = %self.table_name, id = %id))]
    async fn claim(&self, id: u32) -> RepositoryResult<bool> {
        info!("Claiming table");

        let update_span = self.create_dynamodb_span("UpdateItem");

        let result = async {
            self.client
                .update_item()
                .table_name(&self.table_name)
                .key("id", AttributeValue::N(id.to_string()))
                .update_expression("SET available = :false")
                .condition_expression("attribute_exists(id) AND available = :true")
                .expression_attribute_values(":false", AttributeValue::Bool(false))
                .expression_attribute_values(":true", AttributeValue::Bool(true))
                .send()
                .await
        }
        .instrument(update_span)
        .await;

        match result {
            Ok(_) => {
                info!("Table claimed");
                Ok(true)
            }
            Err(e) => {
                let e: DynamoDbError = e.into();
                if matches!(e, DynamoDbError::ConditionalCheckFailedException(_)) {
                    // Lost the race or the table vanished; caller retries
                    info!("Table claim lost");
                    Ok(false)
                } else {
                    Err(self.map_dynamodb_error(e))
                }
            }
        }
    }

    #[instrument(skip(self), fields(table = %self.table_name, id = %id))]
    async fn delete(&self, id: u32) -> RepositoryResult<Option<Table>> {
        info!("Deleting table");

        let delete_span = self.create_dynamodb_span("DeleteItem");

        let response = async {
            self.client
                .delete_item()
                .table_name(&self.table_name)
                .key("id", AttributeValue::N(id.to_string()))
                .return_values(ReturnValue::AllOld)
                .send()
                .await
                .map_err(|e| self.map_dynamodb_error(e.into()))
        }
        .instrument(delete_span)
        .await?;

        match response.attributes {
            Some(item) => {
                info!("Table deleted successfully");
                Ok(Some(self.item_to_table(item)?))
            }
            None => {
                info!("Table not found for deletion");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self), fields(table = %self.table_name))]
    async fn count(&self) -> RepositoryResult<usize> {
        info!("Counting tables");

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
        info!("Table count: {}", count);
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

        info!("Allocated table id {}", next);
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_repository() -> DynamoDbTableRepository {
        let config = aws_sdk_dynamodb::Config::builder()
            .region(aws_sdk_dynamodb::config::Region::new("us-east-1"))
            .behavior_version(aws_sdk_dynamodb::config::BehaviorVersion::latest())
            .build();
        let client = Arc::new(aws_sdk_dynamodb::Client::from_conf(config));
        DynamoDbTableRepository::new(client, "test-tables".to_string(), "us-east-1".to_string())
    }

    #[test]
    fn test_table_to_item_conversion() {
        let repo = test_repository();
        let table = Table::new(5, 4);

        let item = repo.table_to_item(&table);

        assert_eq!(item.get("id"), Some(&AttributeValue::N("5".to_string())));
        assert_eq!(
            item.get("capacity"),
            Some(&AttributeValue::N("4".to_string()))
        );
        assert_eq!(item.get("available"), Some(&AttributeValue::Bool(true)));
    }

    #[test]
    fn test_item_to_table_conversion() {
        let repo = test_repository();
        let table = Table {
            id: 2,
            capacity: 6,
            available: false,
        };

        let item = repo.table_to_item(&table);
        let converted = repo.item_to_table(item).unwrap();

        assert_eq!(converted, table);
    }

    #[test]
    fn test_item_to_table_missing_available_defaults_true() {
        let repo = test_repository();
        let table = Table::new(2, 6);

        let mut item = repo.table_to_item(&table);
        item.remove("available");

        let converted = repo.item_to_table(item).unwrap();
        assert!(converted.available);
    }

    #[test]
    fn test_item_to_table_missing_capacity_fails() {
        let repo = test_repository();
        let table = Table::new(2, 6);

        let mut item = repo.table_to_item(&table);
        item.remove("capacity");

        assert!(repo.item_to_table(item).is_err());
    }

    #[test]
    fn test_repository_creation() {
        let repo = test_repository();
        assert_eq!(repo.table_name(), "test-tables");
    }
}
