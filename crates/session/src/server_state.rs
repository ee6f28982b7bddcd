//! Gemeinsamer Server-Zustand fuer den Session-Koordinator
//!
//! Haelt die Engine und alle Koordinatoren als geteilte Referenzen,
//! die sicher zwischen tokio-Tasks geteilt werden koennen.

use std::sync::Arc;
use std::time::Instant;

use huddle_media::MediaEngine;

use crate::broadcast::EventBroadcaster;
use crate::consumer::ConsumerCoordinator;
use crate::producer::ProducerCoordinator;
use crate::registry::RoomRegistry;
use crate::transport::TransportCoordinator;

/// Konfiguration fuer den Session-Koordinator
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Anzeigename des Servers
    pub server_name: String,
    /// Maximale gleichzeitige Teilnehmer
    pub max_teilnehmer: u32,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            server_name: "Huddle Server".to_string(),
            max_teilnehmer: 64,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    /// Server-Konfiguration
    pub config: Arc<SessionConfig>,
    /// Media-Engine (Transport-/Produzenten-/Konsumenten-Primitiven)
    pub engine: Arc<dyn MediaEngine>,
    /// Raum-Registry (lazy Raum-Erstellung)
    pub registry: RoomRegistry,
    /// Transport-Koordinator (ein Transport pro Richtung)
    pub transporte: TransportCoordinator,
    /// Produzenten-Koordinator (Veroeffentlichen, Auflisten)
    pub produzenten: ProducerCoordinator,
    /// Konsumenten-Koordinator (Abonnieren, Fortsetzen)
    pub konsumenten: ConsumerCoordinator,
    /// Event-Broadcaster (Benachrichtigungen an Teilnehmer)
    pub broadcaster: EventBroadcaster,
    /// Startzeitpunkt des Servers (fuer Uptime-Berechnung)
    pub start_zeit: Instant,
}

impl SignalingState {
    /// Erstellt einen neuen SignalingState und verdrahtet die Koordinatoren
    pub fn neu(config: SessionConfig, engine: Arc<dyn MediaEngine>) -> Arc<Self> {
        let registry = RoomRegistry::neu(Arc::clone(&engine));
        let transporte = TransportCoordinator::neu(Arc::clone(&engine), registry.clone());
        let produzenten = ProducerCoordinator::neu(Arc::clone(&engine), transporte.clone());
        let konsumenten = ConsumerCoordinator::neu(
            Arc::clone(&engine),
            transporte.clone(),
            produzenten.clone(),
        );

        Arc::new(Self {
            config: Arc::new(config),
            engine,
            registry,
            transporte,
            produzenten,
            konsumenten,
            broadcaster: EventBroadcaster::neu(),
            start_zeit: Instant::now(),
        })
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_zeit.elapsed().as_secs()
    }
}
