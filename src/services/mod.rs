// Services module - business logic layer

pub mod chat_hub;
pub mod reservation_service;
pub mod table_service;

pub use chat_hub::{ChatHub, Envelope, EventPublishError, ReservationEvents};
pub use reservation_service::ReservationService;
pub use table_service::TableService;
