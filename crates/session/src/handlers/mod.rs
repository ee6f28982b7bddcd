//! Handler-Module fuer den Session-Koordinator
//!
//! Jeder Handler verarbeitet eine Gruppe zusammengehoeriger
//! Signaling-Nachrichten und gibt die Antwort-SignalMessage zurueck.

pub mod consumer_handler;
pub mod producer_handler;
pub mod room_handler;
pub mod transport_handler;

use huddle_protocol::signal::SignalMessage;

use crate::error::SessionError;

/// Baut die Error-Response fuer einen Koordinator-Fehler
pub(crate) fn fehler_antwort(request_id: u32, fehler: &SessionError) -> SignalMessage {
    SignalMessage::error(request_id, fehler.fehler_code(), fehler.to_string())
}
