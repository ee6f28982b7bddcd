//! Produzenten-Koordinator – Veroeffentlichen und Auflisten von Flows
//!
//! Veroeffentlichen setzt einen verbundenen Sende-Transport voraus.
//! Jeder Produzent traegt ein Korrelations-Tag das Audio- und Video-Flow
//! derselben Quelle gruppiert; beim Abbau wird pro Tag genau eine
//! Entfernungs-Benachrichtigung verteilt. Tags werden pro Teilnehmer
//! gefuehrt, ein Teilnehmer kann mit seinem Tag also keine fremden
//! Quellen referenzieren.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

use huddle_core::types::{CorrelationTag, ParticipantId, ProducerId};
use huddle_media::MediaEngine;
use huddle_protocol::rtp::{MediaKind, RtpParams, TransportRichtung};
use huddle_protocol::signal::ProducerInfo;

use crate::error::{SessionError, SessionResult};
use crate::transport::TransportCoordinator;

/// Ein live Produzent
#[derive(Debug, Clone)]
pub struct ProduzentEintrag {
    pub producer_id: ProducerId,
    pub teilnehmer: ParticipantId,
    pub kind: MediaKind,
    pub correlation_tag: CorrelationTag,
}

struct ProducerCoordinatorInner {
    engine: Arc<dyn MediaEngine>,
    transporte: TransportCoordinator,
    eintraege: DashMap<ProducerId, ProduzentEintrag>,
}

/// Produzenten-Koordinator
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct ProducerCoordinator {
    inner: Arc<ProducerCoordinatorInner>,
}

impl ProducerCoordinator {
    /// Erstellt einen neuen ProducerCoordinator
    pub fn neu(engine: Arc<dyn MediaEngine>, transporte: TransportCoordinator) -> Self {
        Self {
            inner: Arc::new(ProducerCoordinatorInner {
                engine,
                transporte,
                eintraege: DashMap::new(),
            }),
        }
    }

    /// Veroeffentlicht einen Medien-Flow des Teilnehmers
    ///
    /// Erfordert einen verbundenen Sende-Transport: ohne Transport
    /// `TransportNichtGefunden`, mit unverbundenem Transport
    /// `TransportNichtBereit`.
    pub async fn veroeffentlichen(
        &self,
        teilnehmer: ParticipantId,
        kind: MediaKind,
        rtp_params: RtpParams,
        correlation_tag: CorrelationTag,
    ) -> SessionResult<ProducerId> {
        let richtung = TransportRichtung::Senden;
        let transport_id = self
            .inner
            .transporte
            .transport_id(teilnehmer, richtung)
            .ok_or(SessionError::TransportNichtGefunden(richtung))?;
        if !self.inner.transporte.ist_verbunden(teilnehmer, richtung) {
            return Err(SessionError::TransportNichtBereit(richtung));
        }

        let producer_id = self
            .inner
            .engine
            .produzieren(transport_id, kind, rtp_params)
            .await?;

        self.inner.eintraege.insert(
            producer_id,
            ProduzentEintrag {
                producer_id,
                teilnehmer,
                kind,
                correlation_tag: correlation_tag.clone(),
            },
        );

        info!(
            teilnehmer = %teilnehmer,
            producer_id = %producer_id,
            %kind,
            tag = %correlation_tag,
            "Flow veroeffentlicht"
        );
        Ok(producer_id)
    }

    /// Listet alle live Produzenten
    ///
    /// Discovery fuer spaet beitretende Teilnehmer. Die eigenen Flows
    /// sind enthalten; der Client kennt deren IDs aus den
    /// Publish-Antworten und kann sie selbst ausblenden.
    pub fn auflisten(&self) -> Vec<ProducerInfo> {
        self.inner
            .eintraege
            .iter()
            .map(|e| ProducerInfo {
                producer_id: e.value().producer_id,
                kind: e.value().kind,
            })
            .collect()
    }

    /// Gibt den Eintrag eines Produzenten zurueck
    pub fn eintrag(&self, producer_id: ProducerId) -> Option<ProduzentEintrag> {
        self.inner.eintraege.get(&producer_id).map(|e| e.clone())
    }

    /// Prueft ob ueberhaupt Produzenten live sind
    pub fn hat_produzenten(&self) -> bool {
        !self.inner.eintraege.is_empty()
    }

    /// Entfernt einen einzelnen Produzenten (nach Engine-Schliessung)
    pub fn entfernen(&self, producer_id: ProducerId) -> Option<ProduzentEintrag> {
        let eintrag = self.inner.eintraege.remove(&producer_id).map(|(_, e)| e);
        if let Some(ref e) = eintrag {
            debug!(producer_id = %producer_id, teilnehmer = %e.teilnehmer, "Produzent entfernt");
        }
        eintrag
    }

    /// Entfernt alle Produzenten eines Teilnehmers und gibt sie zurueck
    ///
    /// Die Engine-Handles werden ueber die Transport-Schliessung des
    /// Teilnehmers abgeraeumt, hier wird nur der Index bereinigt.
    pub fn von_teilnehmer_entfernen(&self, teilnehmer: ParticipantId) -> Vec<ProduzentEintrag> {
        let ids: Vec<ProducerId> = self
            .inner
            .eintraege
            .iter()
            .filter(|e| e.value().teilnehmer == teilnehmer)
            .map(|e| *e.key())
            .collect();

        ids.into_iter()
            .filter_map(|id| self.inner.eintraege.remove(&id).map(|(_, e)| e))
            .collect()
    }

    /// Anzahl aktuell live Produzenten
    pub fn anzahl(&self) -> usize {
        self.inner.eintraege.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
