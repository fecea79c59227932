// Re-export all model types
pub use self::enums::*;
pub use self::errors::*;
pub use self::events::*;
pub use self::reservation::*;
pub use self::table::*;

mod enums;
mod errors;
mod events;
mod reservation;
mod table;
