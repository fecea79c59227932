use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType, TableStatus,
};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::models::{RepositoryError, RepositoryResult};

/// Manages creation of the DynamoDB tables backing the service
pub struct StoreManager {
    client: Arc<DynamoDbClient>,
}

impl StoreManager {
    /// Create a new store manager
    pub fn new(client: Arc<DynamoDbClient>) -> Self {
        Self { client }
    }

    /// Create both backing tables, tolerating tables that already exist
    #[instrument(skip(self), fields(tables_table = %tables_table, reservations_table = %reservations_table))]
    pub async fn create_all_tables(
        &self,
        tables_table: &str,
        reservations_table: &str,
    ) -> RepositoryResult<()> {
        self.create_table(tables_table).await?;
        self.create_table(reservations_table).await?;
        Ok(())
    }

    /// Create a single table keyed by numeric id
    #[instrument(skip(self), fields(table_name = %table_name))]
    pub async fn create_table(&self, table_name: &str) -> RepositoryResult<()> {
        if self.table_exists(table_name).await? {
            info!("Table {} already exists", table_name);
            return Ok(());
        }

        info!("Creating table {}", table_name);

        let id_attribute = AttributeDefinition::builder()
            .attribute_name("id")
            .attribute_type(ScalarAttributeType::N)
            .build()
            .map_err(|e| RepositoryError::AwsSdk {
                message: format!("Failed to build attribute definition: {}", e),
            })?;

        let key_schema = KeySchemaElement::builder()
            .attribute_name("id")
            .key_type(KeyType::Hash)
            .build()
            .map_err(|e| RepositoryError::AwsSdk {
                message: format!("Failed to build key schema: {}", e),
            })?;

        self.client
            .create_table()
            .table_name(table_name)
            .attribute_definitions(id_attribute)
            .key_schema(key_schema)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| RepositoryError::AwsSdk {
                message: format!("Failed to create table {}: {}", table_name, e),
            })?;

        self.wait_for_active(table_name).await?;

        info!("Table {} created successfully", table_name);
        Ok(())
    }

    /// Check if a table exists
    async fn table_exists(&self, table_name: &str) -> RepositoryResult<bool> {
        match self
            .client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let e: aws_sdk_dynamodb::Error = e.into();
                if matches!(e, aws_sdk_dynamodb::Error::ResourceNotFoundException(_)) {
                    Ok(false)
                } else {
                    Err(RepositoryError::AwsSdk {
                        message: format!("Failed to describe table {}: {}", table_name, e),
                    })
                }
            }
        }
    }

    /// Poll until the table reaches ACTIVE status
    async fn wait_for_active(&self, table_name: &str) -> RepositoryResult<()> {
        const MAX_ATTEMPTS: u32 = 30;

        for attempt in 1..=MAX_ATTEMPTS {
            let response = self
                .client
                .describe_table()
                .table_name(table_name)
                .send()
                .await
                .map_err(|e| RepositoryError::AwsSdk {
                    message: format!("Failed to describe table {}: {}", table_name, e),
                })?;

            if let Some(status) = response.table().and_then(|t| t.table_status()) {
                if *status == TableStatus::Active {
                    return Ok(());
                }
                info!(
                    "Table {} status {:?}, waiting (attempt {}/{})",
                    table_name, status, attempt, MAX_ATTEMPTS
                );
            }

            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        warn!("Table {} did not become active in time", table_name);
        Err(RepositoryError::Timeout)
    }
}
