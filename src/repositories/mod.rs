// Repositories module - data access layer

pub mod reservation_repository;
pub mod store_manager;
pub mod table_repository;

pub use reservation_repository::{DynamoDbReservationRepository, ReservationRepository};
pub use store_manager::StoreManager;
pub use table_repository::{DynamoDbTableRepository, TableRepository};
