//! huddle-core – Gemeinsame Identifikationstypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Huddle-Crates gemeinsam genutzt werden.

pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use types::{ConsumerId, CorrelationTag, ParticipantId, ProducerId, RoomId, TransportId};
