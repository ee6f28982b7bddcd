//! MediaEngine-Schnittstelle
//!
//! Definiert den Vertrag zwischen Session-Koordinator und Media-Engine.
//! Die Engine fuehrt die eigentliche Codec-/ICE-/DTLS-Negotiation und
//! das Paket-Routing aus; der Koordinator ruft nur ihre Primitiven auf
//! und verwaltet die zurueckgegebenen Handles.
//!
//! Schliessungen die von der Engine ausgehen (Transport- oder
//! Produzenten-Ende) werden als `EngineEreignis` ueber einen tokio
//! broadcast-Kanal gemeldet.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use huddle_core::types::{ConsumerId, ProducerId, TransportId};
use huddle_protocol::rtp::{
    CodecProfile, DtlsParams, IceCandidate, IceParams, MediaKind, RtpCapabilities, RtpParams,
    TransportRichtung,
};

use crate::error::EngineResult;

// ---------------------------------------------------------------------------
// Handles und Beschreibungen
// ---------------------------------------------------------------------------

/// Eindeutige Kennung eines Routing-Kontexts innerhalb der Engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KontextId(pub Uuid);

impl KontextId {
    /// Erstellt eine neue zufaellige KontextId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for KontextId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for KontextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "context:{}", self.0)
    }
}

/// Ein von der Engine erstellter Routing-Kontext
#[derive(Debug, Clone)]
pub struct RoutingKontext {
    pub kontext_id: KontextId,
    /// Der mit der Engine ausgehandelte Faehigkeiten-Satz
    pub faehigkeiten: RtpCapabilities,
}

/// Verbindungsparameter eines von der Engine erstellten Transports
#[derive(Debug, Clone)]
pub struct TransportBeschreibung {
    pub transport_id: TransportId,
    pub richtung: TransportRichtung,
    pub ice_params: IceParams,
    pub ice_candidates: Vec<IceCandidate>,
    pub dtls_params: DtlsParams,
}

/// Beschreibung eines von der Engine erstellten Konsumenten
///
/// Konsumenten starten immer pausiert und werden erst nach explizitem
/// `fortsetzen` aktiv.
#[derive(Debug, Clone)]
pub struct KonsumentBeschreibung {
    pub consumer_id: ConsumerId,
    pub producer_id: ProducerId,
    pub kind: MediaKind,
    pub rtp_params: RtpParams,
}

// ---------------------------------------------------------------------------
// Engine-Ereignisse
// ---------------------------------------------------------------------------

/// Von der Engine gemeldete Zustandsaenderungen
#[derive(Debug, Clone)]
pub enum EngineEreignis {
    /// Ein Transport wurde engine-seitig geschlossen
    TransportGeschlossen { transport_id: TransportId },
    /// Ein Produzent wurde geschlossen (z.B. weil sein Transport endete)
    ProduzentGeschlossen { producer_id: ProducerId },
    /// Ein Konsument wurde geschlossen (Quelle weg oder Transport zu)
    KonsumentGeschlossen { consumer_id: ConsumerId },
    /// Die Engine ist unbrauchbar geworden, der Prozess muss neu starten
    Ausfall { grund: String },
}

// ---------------------------------------------------------------------------
// MediaEngine-Trait
// ---------------------------------------------------------------------------

/// Schnittstelle zur externen Media-Engine
///
/// Alle Methoden sind nebenlaeufig aufrufbar; die Engine serialisiert
/// intern wo noetig. Der Koordinator vertraut darauf dass jeder Aufruf
/// antwortet; Timeouts werden nicht verhaengt, ein haengender
/// Engine-Prozess fuehrt zum Neustart.
#[async_trait]
pub trait MediaEngine: Send + Sync + 'static {
    /// Erstellt einen Routing-Kontext mit dem gegebenen Codec-Satz
    async fn routing_kontext_erstellen(
        &self,
        codecs: &[CodecProfile],
    ) -> EngineResult<RoutingKontext>;

    /// Erstellt einen direktionalen Transport im gegebenen Kontext
    async fn transport_erstellen(
        &self,
        kontext_id: KontextId,
        richtung: TransportRichtung,
    ) -> EngineResult<TransportBeschreibung>;

    /// Verbindet einen Transport mit den DTLS-Parametern der Gegenseite
    async fn transport_verbinden(
        &self,
        transport_id: TransportId,
        dtls_params: DtlsParams,
    ) -> EngineResult<()>;

    /// Schliesst einen Transport
    ///
    /// Die Engine kaskadiert die Schliessung auf alle Produzenten und
    /// Konsumenten dieses Transports und meldet sie als Ereignisse.
    async fn transport_schliessen(&self, transport_id: TransportId) -> EngineResult<()>;

    /// Erstellt einen Produzenten auf einem Sende-Transport
    async fn produzieren(
        &self,
        transport_id: TransportId,
        kind: MediaKind,
        rtp_params: RtpParams,
    ) -> EngineResult<ProducerId>;

    /// Prueft ob ein Produzent mit den gegebenen Faehigkeiten
    /// konsumiert werden kann
    async fn kann_konsumieren(
        &self,
        producer_id: ProducerId,
        faehigkeiten: &RtpCapabilities,
    ) -> bool;

    /// Erstellt einen pausierten Konsumenten auf einem Empfangs-Transport
    async fn konsumieren(
        &self,
        transport_id: TransportId,
        producer_id: ProducerId,
        faehigkeiten: &RtpCapabilities,
    ) -> EngineResult<KonsumentBeschreibung>;

    /// Setzt einen pausierten Konsumenten fort
    async fn fortsetzen(&self, consumer_id: ConsumerId) -> EngineResult<()>;

    /// Abonniert den Ereignis-Strom der Engine
    fn ereignisse(&self) -> broadcast::Receiver<EngineEreignis>;
}
