pub mod admin;
pub mod api;
pub mod auth;
pub mod chat;
pub mod health;
pub mod metrics;
pub mod middleware;

pub use auth::*;
pub use chat::*;
pub use health::*;
pub use metrics::*;
pub use middleware::*;
