//! Gemeinsame Identifikationstypen fuer Huddle
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige Teilnehmer-ID (eine pro Signaling-Verbindung)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub Uuid);

impl ParticipantId {
    /// Erstellt eine neue zufaellige ParticipantId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "participant:{}", self.0)
    }
}

/// Eindeutige Raum-ID
///
/// In v1 existiert genau ein Standard-Raum; die Registry ist trotzdem
/// nach RoomId indiziert damit Multi-Raum-Betrieb additiv bleibt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub Uuid);

impl RoomId {
    /// Erstellt eine neue zufaellige RoomId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "room:{}", self.0)
    }
}

/// Eindeutige Transport-ID (von der Media-Engine vergeben)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransportId(pub Uuid);

impl TransportId {
    /// Erstellt eine neue zufaellige TransportId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for TransportId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "transport:{}", self.0)
    }
}

/// Eindeutige Produzenten-ID (ein veroeffentlichter Medien-Flow)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProducerId(pub Uuid);

impl ProducerId {
    /// Erstellt eine neue zufaellige ProducerId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ProducerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProducerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "producer:{}", self.0)
    }
}

/// Eindeutige Konsumenten-ID (ein abonnierter Medien-Flow)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConsumerId(pub Uuid);

impl ConsumerId {
    /// Erstellt eine neue zufaellige ConsumerId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConsumerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "consumer:{}", self.0)
    }
}

/// Korrelations-Tag: gruppiert gleichzeitige Audio- und Video-Flows
/// eines Teilnehmers als eine logische Quelle
///
/// Der Tag wird vom Client geliefert und nur relativ zum besitzenden
/// Teilnehmer interpretiert; gleiche Tags verschiedener Teilnehmer
/// kollidieren daher nicht.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationTag(pub String);

impl CorrelationTag {
    /// Erstellt einen Tag aus einem beliebigen String
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Gibt den inneren String zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tag:{}", self.0)
    }
}

impl From<&str> for CorrelationTag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}
