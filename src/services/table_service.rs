use std::sync::Arc;
use tracing::instrument;

use crate::models::{
    CreateTableRequest, RepositoryError, ServiceError, ServiceResult, Table, TableListResponse,
    ValidationError,
};
use crate::repositories::TableRepository;

/// Service for managing the table inventory
pub struct TableService {
    repository: Arc<dyn TableRepository>,
}

impl TableService {
    /// Create a new TableService
    pub fn new(repository: Arc<dyn TableRepository>) -> Self {
        Self { repository }
    }

    /// Add a table to the inventory
    #[instrument(skip(self, request), fields(capacity = %request.capacity))]
    pub async fn add_table(&self, request: CreateTableRequest) -> ServiceResult<Table> {
        crate::info_with_trace!("Adding table to inventory");

        if request.capacity == 0 {
            return Err(ValidationError::InvalidValue {
                field: "capacity".to_string(),
                value: request.capacity.to_string(),
                reason: "Capacity must be at least 1".to_string(),
            }
            .into());
        }

        let id = self.repository.next_id().await?;
        let table = Table::new(id, request.capacity);

        match self.repository.create(table).await {
            Ok(created) => {
                crate::info_with_trace!("Table created with id {}", created.id);
                Ok(created)
            }
            Err(RepositoryError::ConstraintViolation { .. }) => {
                crate::warn_with_trace!("Duplicate table id {}", id);
                Err(ServiceError::DuplicateTableId { id })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a table from the inventory
    #[instrument(skip(self), fields(id = %id))]
    pub async fn remove_table(&self, id: u32) -> ServiceResult<Table> {
        crate::info_with_trace!("Removing table");

        match self.repository.delete(id).await? {
            Some(table) => {
                crate::info_with_trace!("Table {} removed", id);
                Ok(table)
            }
            None => {
                crate::warn_with_trace!("Table {} not found", id);
                Err(ServiceError::TableNotFound { id })
            }
        }
    }

    /// Explicitly override a table's availability flag
    #[instrument(skip(self), fields(id = %id, available = %available))]
    pub async fn set_availability(&self, id: u32, available: bool) -> ServiceResult<Table> {
        crate::info_with_trace!("Overriding table availability");

        match self.repository.set_available(id, available).await? {
            Some(table) => Ok(table),
            None => Err(ServiceError::TableNotFound { id }),
        }
    }

    /// List all tables
    #[instrument(skip(self))]
    pub async fn list_tables(&self) -> ServiceResult<TableListResponse> {
        crate::info_with_trace!("Listing tables");

        let tables = self.repository.find_all().await?;
        let total_count = tables.len();

        Ok(TableListResponse {
            tables,
            total_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RepositoryResult;
    use async_trait::async_trait;
    use mockall::mock;

    mock! {
        TestTableRepository {}

        #[async_trait]
        impl TableRepository for TestTableRepository {
            async fn find_all(&self) -> RepositoryResult<Vec<Table>>;
            async fn find_available(&self) -> RepositoryResult<Vec<Table>>;
            async fn find_by_id(&self, id: u32) -> RepositoryResult<Option<Table>>;
            async fn create(&self, table: Table) -> RepositoryResult<Table>;
            async fn set_available(&self, id: u32, available: bool) -> RepositoryResult<Option<Table>>;
            async fn claim(&self, id: u32) -> RepositoryResult<bool>;
            async fn delete(&self, id: u32) -> RepositoryResult<Option<Table>>;
            async fn count(&self) -> RepositoryResult<usize>;
            async fn next_id(&self) -> RepositoryResult<u32>;
        }
    }

    #[tokio::test]
    async fn test_add_table_success() {
        let mut mock_repo = MockTestTableRepository::new();

        mock_repo.expect_next_id().times(1).returning(|| Ok(3));
        mock_repo.expect_create().times(1).returning(Ok);

        let service = TableService::new(Arc::new(mock_repo));

        let result = service.add_table(CreateTableRequest { capacity: 4 }).await;

        assert!(result.is_ok());
        let table = result.unwrap();
        assert_eq!(table.id, 3);
        assert_eq!(table.capacity, 4);
        assert!(table.available);
    }

    #[tokio::test]
    async fn test_add_table_zero_capacity() {
        let mock_repo = MockTestTableRepository::new();
        let service = TableService::new(Arc::new(mock_repo));

        let result = service.add_table(CreateTableRequest { capacity: 0 }).await;

        assert!(result.is_err());
        match result.unwrap_err() {
            ServiceError::ValidationError { message } => {
                assert!(message.contains("capacity"));
            }
            _ => panic!("Expected ValidationError"),
        }
    }

    #[tokio::test]
    async fn test_add_table_duplicate_id() {
        let mut mock_repo = MockTestTableRepository::new();

        mock_repo.expect_next_id().times(1).returning(|| Ok(2));
        mock_repo.expect_create().times(1).returning(|_| {
            Err(RepositoryError::ConstraintViolation {
                message: "Conditional check failed".to_string(),
            })
        });

        let service = TableService::new(Arc::new(mock_repo));

        let result = service.add_table(CreateTableRequest { capacity: 2 }).await;

        assert!(result.is_err());
        match result.unwrap_err() {
            ServiceError::DuplicateTableId { id } => assert_eq!(id, 2),
            _ => panic!("Expected DuplicateTableId"),
        }
    }

    #[tokio::test]
    async fn test_remove_table_success() {
        let mut mock_repo = MockTestTableRepository::new();

        mock_repo
            .expect_delete()
            .with(mockall::predicate::eq(5))
            .times(1)
            .returning(|id| Ok(Some(Table::new(id, 4))));

        let service = TableService::new(Arc::new(mock_repo));

        let result = service.remove_table(5).await;

        assert!(result.is_ok());
        assert_eq!(result.unwrap().id, 5);
    }

    #[tokio::test]
    async fn test_remove_table_not_found() {
        let mut mock_repo = MockTestTableRepository::new();

        mock_repo.expect_delete().times(1).returning(|_| Ok(None));

        let service = TableService::new(Arc::new(mock_repo));

        let result = service.remove_table(99).await;

        assert!(result.is_err());
        match result.unwrap_err() {
            ServiceError::TableNotFound { id } => assert_eq!(id, 99),
            _ => panic!("Expected TableNotFound"),
        }
    }

    #[tokio::test]
    async fn test_set_availability() {
        let mut mock_repo = MockTestTableRepository::new();

        mock_repo
            .expect_set_available()
            .with(mockall::predicate::eq(1), mockall::predicate::eq(false))
            .times(1)
            .returning(|id, available| {
                Ok(Some(Table {
                    id,
                    capacity: 4,
                    available,
                }))
            });

        let service = TableService::new(Arc::new(mock_repo));

        let result = service.set_availability(1, false).await;

        assert!(result.is_ok());
        assert!(!result.unwrap().available);
    }

    #[tokio::test]
    async fn test_list_tables() {
        let mut mock_repo = MockTestTableRepository::new();

        mock_repo
            .expect_find_all()
            .times(1)
            .returning(|| Ok(vec![Table::new(1, 2), Table::new(2, 4)]));

        let service = TableService::new(Arc::new(mock_repo));

        let result = service.list_tables().await;

        assert!(result.is_ok());
        let response = result.unwrap();
        assert_eq!(response.total_count, 2);
        assert_eq!(response.tables.len(), 2);
    }
}
