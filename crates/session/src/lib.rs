//! huddle-session – Session-Koordinator
//!
//! Das Herzstueck des Servers: verwaltet den Raum, die Transporte,
//! Produzenten und Konsumenten aller Teilnehmer und verteilt
//! Benachrichtigungen ueber den persistenten Signaling-Kanal.
//!
//! ## Architektur
//! - `registry`: Raum-Registry (lazy, ein Gewinner bei Gleichzeitigkeit)
//! - `transport`: Transport-Koordinator (ein Transport pro Richtung)
//! - `producer`: Produzenten-Koordinator (Veroeffentlichen, Auflisten)
//! - `consumer`: Konsumenten-Koordinator (Abonnieren, Fortsetzen)
//! - `broadcast`: Event-Broadcaster (Fan-out an alle ausser den Ausloeser)
//! - `disconnect`: Abbau-Kaskade und Engine-Ereignis-Schleife
//! - `dispatcher` + `handlers`: Routing eingehender Signaling-Nachrichten
//! - `connection` + `tcp`: Frame-Schleife und TCP-Listener

pub mod broadcast;
pub mod connection;
pub mod consumer;
pub mod disconnect;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod producer;
pub mod registry;
pub mod server_state;
pub mod tcp;
pub mod transport;

pub use broadcast::EventBroadcaster;
pub use connection::ClientConnection;
pub use consumer::ConsumerCoordinator;
pub use dispatcher::{DispatcherContext, MessageDispatcher};
pub use error::{SessionError, SessionResult};
pub use producer::ProducerCoordinator;
pub use registry::RoomRegistry;
pub use server_state::{SessionConfig, SignalingState};
pub use tcp::SignalingServer;
pub use transport::TransportCoordinator;
