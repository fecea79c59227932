use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Originator, Reservation};

/// Event types published when reservation state changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ReservationEventType {
    ReservationCreated,
    ReservationCancelled,
}

impl std::fmt::Display for ReservationEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReservationEventType::ReservationCreated => write!(f, "ReservationCreated"),
            ReservationEventType::ReservationCancelled => write!(f, "ReservationCancelled"),
        }
    }
}

/// Notification emitted to the chat hub when a reservation changes state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationEvent {
    pub event_type: ReservationEventType,
    pub reservation_id: u32,
    pub table_id: u32,
    pub date: String,
    pub origin: Originator,
    pub timestamp: DateTime<Utc>,
}

impl ReservationEvent {
    /// Create a new ReservationCreated event
    pub fn reservation_created(reservation: &Reservation) -> Self {
        Self {
            event_type: ReservationEventType::ReservationCreated,
            reservation_id: reservation.id,
            table_id: reservation.table_id,
            date: reservation.date.clone(),
            origin: reservation.origin.clone(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new ReservationCancelled event
    pub fn reservation_cancelled(reservation: &Reservation) -> Self {
        Self {
            event_type: ReservationEventType::ReservationCancelled,
            reservation_id: reservation.id,
            table_id: reservation.table_id,
            date: reservation.date.clone(),
            origin: reservation.origin.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// Frames exchanged over the chat WebSocket. Chat and feedback payloads are
/// relayed opaquely; the hub never inspects them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ChatFrame {
    ClientsTotal { count: usize },
    ChatMessage { data: Value },
    Feedback { data: Value },
    Reservation { event: ReservationEvent },
}

/// Configuration for the broadcast hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Per-subscriber buffered frame capacity; lagging subscribers drop
    /// frames beyond this (at-most-once delivery)
    pub channel_capacity: usize,
    pub enabled: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
            enabled: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CreateReservationRequest;

    fn sample_reservation() -> Reservation {
        Reservation::new(
            1,
            CreateReservationRequest {
                customer: "Ana".to_string(),
                email: "a@x.com".to_string(),
                date: "2024-06-01".to_string(),
                time: "19:00".to_string(),
                party_size: 2,
            },
            5,
            Originator::Client,
        )
    }

    #[test]
    fn test_created_event_fields() {
        let reservation = sample_reservation();
        let event = ReservationEvent::reservation_created(&reservation);

        assert_eq!(event.event_type, ReservationEventType::ReservationCreated);
        assert_eq!(event.reservation_id, 1);
        assert_eq!(event.table_id, 5);
        assert_eq!(event.date, "2024-06-01");
    }

    #[test]
    fn test_frame_wire_format() {
        let frame = ChatFrame::ClientsTotal { count: 3 };
        let json = serde_json::to_string(&frame).unwrap();

        assert!(json.contains("\"type\":\"clients-total\""));
        assert!(json.contains("\"count\":3"));

        let parsed: ChatFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_chat_frame_payload_is_opaque() {
        let json = r#"{"type":"chat-message","data":{"name":"Ana","message":"hola"}}"#;
        let frame: ChatFrame = serde_json::from_str(json).unwrap();

        match frame {
            ChatFrame::ChatMessage { data } => {
                assert_eq!(data["name"], "Ana");
            }
            _ => panic!("Expected chat-message frame"),
        }
    }

    #[test]
    fn test_event_serialization() {
        let reservation = sample_reservation();
        let event = ReservationEvent::reservation_cancelled(&reservation);

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: ReservationEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(event.event_type, deserialized.event_type);
        assert_eq!(event.reservation_id, deserialized.reservation_id);
    }
}
