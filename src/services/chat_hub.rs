use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::models::{ChatFrame, HubConfig, ReservationEvent};

/// Errors that can occur when publishing reservation events
#[derive(Debug, Error)]
pub enum EventPublishError {
    #[error("Event publishing is disabled")]
    Disabled,
}

/// A frame together with the connection that produced it. Frames with no
/// origin are system frames and go to every subscriber; subscribers skip
/// frames whose origin matches their own connection id.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub origin: Option<Uuid>,
    pub frame: ChatFrame,
}

/// Publish/subscribe hub for the chat channel.
///
/// Delivery is at-most-once: subscribers that fall behind the channel
/// capacity lose the oldest frames, and nothing is retained for
/// disconnected parties.
pub struct ChatHub {
    tx: broadcast::Sender<Envelope>,
    connected: AtomicUsize,
}

impl ChatHub {
    /// Create a new hub with the given per-subscriber buffer capacity
    pub fn new(channel_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(channel_capacity);
        Self {
            tx,
            connected: AtomicUsize::new(0),
        }
    }

    /// Subscribe to all frames published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }

    /// Number of currently connected chat parties
    pub fn client_count(&self) -> usize {
        self.connected.load(Ordering::SeqCst)
    }

    /// Record a new connection and announce the updated count to everyone
    #[instrument(skip(self))]
    pub fn client_joined(&self) -> usize {
        let count = self.connected.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Chat client connected, {} total", count);
        self.publish(ChatFrame::ClientsTotal { count });
        count
    }

    /// Record a dropped connection and announce the updated count
    #[instrument(skip(self))]
    pub fn client_left(&self) -> usize {
        let count = self
            .connected
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| {
                Some(c.saturating_sub(1))
            })
            .map(|c| c.saturating_sub(1))
            .unwrap_or(0);
        info!("Chat client disconnected, {} total", count);
        self.publish(ChatFrame::ClientsTotal { count });
        count
    }

    /// Relay a frame from a specific connection to all other parties
    pub fn relay_from(&self, origin: Uuid, frame: ChatFrame) {
        self.send(Envelope {
            origin: Some(origin),
            frame,
        });
    }

    /// Publish a system frame to every connected party
    pub fn publish(&self, frame: ChatFrame) {
        self.send(Envelope {
            origin: None,
            frame,
        });
    }

    fn send(&self, envelope: Envelope) {
        // A send with no subscribers is not an error for a fire-and-forget
        // channel; the frame is simply dropped.
        match self.tx.send(envelope) {
            Ok(receivers) => debug!("Frame delivered to {} subscribers", receivers),
            Err(_) => debug!("Frame dropped, no subscribers"),
        }
    }
}

/// Service-facing publisher for reservation lifecycle events
pub struct ReservationEvents {
    hub: Arc<ChatHub>,
    enabled: bool,
}

impl ReservationEvents {
    /// Create a new publisher over the given hub
    pub fn new(hub: Arc<ChatHub>, config: &HubConfig) -> Self {
        Self {
            hub,
            enabled: config.enabled,
        }
    }

    /// Fan a reservation event out to all connected chat parties
    #[instrument(skip(self, event), fields(event_type = %event.event_type, reservation_id = %event.reservation_id))]
    pub fn emit(&self, event: ReservationEvent) -> Result<(), EventPublishError> {
        if !self.enabled {
            return Err(EventPublishError::Disabled);
        }

        self.hub.publish(ChatFrame::Reservation { event });
        Ok(())
    }

    /// Whether event publication is switched on
    pub fn enabled(&self) -> bool {
        self.enabled
    }
}
