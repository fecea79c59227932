use serde::{Deserialize, Serialize};

/// A seating unit in the restaurant's inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub id: u32,
    pub capacity: u32,
    pub available: bool,
}

/// Request model for adding a table to the inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTableRequest {
    pub capacity: u32,
}

/// Request model for an explicit availability override
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetAvailabilityRequest {
    pub available: bool,
}

/// Response model for table listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableListResponse {
    pub tables: Vec<Table>,
    pub total_count: usize,
}

impl Table {
    /// Create a new table with the given id; new tables start available
    pub fn new(id: u32, capacity: u32) -> Self {
        Self {
            id,
            capacity,
            available: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_starts_available() {
        let table = Table::new(3, 4);

        assert_eq!(table.id, 3);
        assert_eq!(table.capacity, 4);
        assert!(table.available);
    }

    #[test]
    fn test_serde_round_trip() {
        let table = Table::new(1, 6);

        let json = serde_json::to_string(&table).unwrap();
        let deserialized: Table = serde_json::from_str(&json).unwrap();

        assert_eq!(table, deserialized);
    }
}
