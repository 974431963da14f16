//! Bridge from the monitor's event stream to the hub

use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};

use thaiid_common::Event;
use tracing::{info, warn};

use crate::hub::{Hub, HubError};

/// Forward monitor events to the hub on a dedicated thread
pub fn spawn_relay(events: Receiver<Event>, hub: Hub) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("event-relay".to_string())
        .spawn(move || forward_events(events, &hub))
}

/// Broadcast every event until the monitor closes the stream or the hub stops
pub fn forward_events(events: Receiver<Event>, hub: &Hub) {
    for event in events {
        match &event {
            Event::CardInserted(record) => {
                info!(citizen_id = %record.citizen_id, "Card inserted");
            }
            Event::CardRemoved => info!("Card removed"),
            Event::Error(code) => {
                warn!(code = code.code(), message = code.message(), "Card error");
            }
        }

        match hub.broadcast(&event) {
            Ok(()) => {}
            Err(HubError::Stopped) => {
                warn!("Hub stopped, dropping card events");
                break;
            }
            Err(err) => warn!(error = %err, kind = event.kind(), "Failed to broadcast event"),
        }
    }
}
