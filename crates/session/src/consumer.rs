//! Konsumenten-Koordinator – Abonnieren und Fortsetzen fremder Flows
//!
//! Ein Abonnement ist pro (Teilnehmer, Produzent) eindeutig: doppelte
//! Subscribe-Anfragen liefern denselben Konsumenten zurueck statt einen
//! zweiten zu erstellen. Der Empfangs-Transport wird bei Bedarf
//! mit angelegt, alle Abonnements eines Teilnehmers teilen ihn sich.
//!
//! Konsumenten starten pausiert; erst das explizite Fortsetzen (nachdem
//! der Client seine Empfangsseite aufgebaut hat) startet den Medienfluss.
//! Fortsetzen ohne bekanntes Abonnement ist ein gutartiger No-op.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use huddle_core::types::{ConsumerId, ParticipantId, ProducerId};
use huddle_media::{EngineError, KonsumentBeschreibung, MediaEngine};
use huddle_protocol::rtp::{RtpCapabilities, TransportRichtung};

use crate::error::{SessionError, SessionResult};
use crate::producer::ProducerCoordinator;
use crate::transport::TransportCoordinator;

struct ConsumerCoordinatorInner {
    engine: Arc<dyn MediaEngine>,
    transporte: TransportCoordinator,
    produzenten: ProducerCoordinator,
    /// Ein Abonnement pro (Teilnehmer, Produzent)
    eintraege: DashMap<(ParticipantId, ProducerId), Arc<OnceCell<KonsumentBeschreibung>>>,
    /// Rueckwaerts-Index fuer Engine-Ereignisse
    nach_konsument: DashMap<ConsumerId, (ParticipantId, ProducerId)>,
}

/// Konsumenten-Koordinator
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct ConsumerCoordinator {
    inner: Arc<ConsumerCoordinatorInner>,
}

impl ConsumerCoordinator {
    /// Erstellt einen neuen ConsumerCoordinator
    pub fn neu(
        engine: Arc<dyn MediaEngine>,
        transporte: TransportCoordinator,
        produzenten: ProducerCoordinator,
    ) -> Self {
        Self {
            inner: Arc::new(ConsumerCoordinatorInner {
                engine,
                transporte,
                produzenten,
                eintraege: DashMap::new(),
                nach_konsument: DashMap::new(),
            }),
        }
    }

    /// Abonniert einen fremden Produzenten
    ///
    /// Prueft erst die Existenz des Produzenten, dann die Konsumierbarkeit
    /// mit den Faehigkeiten des Anfragenden. Der Konsument wird pausiert
    /// erstellt. Doppelte Anfragen liefern das bestehende Abonnement.
    pub async fn abonnieren(
        &self,
        teilnehmer: ParticipantId,
        producer_id: ProducerId,
        faehigkeiten: &RtpCapabilities,
    ) -> SessionResult<KonsumentBeschreibung> {
        if self.inner.produzenten.eintrag(producer_id).is_none() {
            return Err(SessionError::ProduzentNichtGefunden(producer_id));
        }
        if !self
            .inner
            .engine
            .kann_konsumieren(producer_id, faehigkeiten)
            .await
        {
            return Err(SessionError::NichtKonsumierbar(producer_id));
        }

        // Empfangs-Transport bei Bedarf anlegen, alle Abonnements
        // teilen ihn sich
        let transport = self
            .inner
            .transporte
            .holen_oder_erstellen(teilnehmer, TransportRichtung::Empfangen)
            .await?;

        let zelle = self
            .inner
            .eintraege
            .entry((teilnehmer, producer_id))
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let beschreibung = zelle
            .get_or_try_init(|| async {
                let beschreibung = self
                    .inner
                    .engine
                    .konsumieren(transport.transport_id, producer_id, faehigkeiten)
                    .await?;
                self.inner
                    .nach_konsument
                    .insert(beschreibung.consumer_id, (teilnehmer, producer_id));
                info!(
                    teilnehmer = %teilnehmer,
                    producer_id = %producer_id,
                    consumer_id = %beschreibung.consumer_id,
                    "Abonnement erstellt (pausiert)"
                );
                Ok::<_, SessionError>(beschreibung)
            })
            .await?;

        Ok(beschreibung.clone())
    }

    /// Setzt das Abonnement des Teilnehmers fuer diesen Produzenten fort
    ///
    /// Gibt `true` zurueck wenn die Engine tatsaechlich fortgesetzt hat.
    /// Ohne bekanntes Abonnement (Produzent schon weg, Tippfehler des
    /// Clients) ist das ein gutartiger No-op mit `false`.
    pub async fn fortsetzen(
        &self,
        teilnehmer: ParticipantId,
        producer_id: ProducerId,
    ) -> SessionResult<bool> {
        let consumer_id = match self
            .inner
            .eintraege
            .get(&(teilnehmer, producer_id))
            .and_then(|z| z.get().map(|b| b.consumer_id))
        {
            Some(id) => id,
            None => {
                debug!(
                    teilnehmer = %teilnehmer,
                    producer_id = %producer_id,
                    "Fortsetzen ohne Abonnement, No-op"
                );
                return Ok(false);
            }
        };

        match self.inner.engine.fortsetzen(consumer_id).await {
            Ok(()) => {
                info!(teilnehmer = %teilnehmer, consumer_id = %consumer_id, "Abonnement fortgesetzt");
                Ok(true)
            }
            // Die Engine hat den Konsumenten schon abgeraeumt (z.B. Transport
            // engine-seitig geschlossen) und das Ereignis ist noch nicht
            // verarbeitet. Index nachziehen, fuer den Client ein No-op.
            Err(EngineError::KonsumentNichtGefunden(_)) => {
                self.nach_engine_schliessung_entfernen(consumer_id);
                debug!(
                    teilnehmer = %teilnehmer,
                    consumer_id = %consumer_id,
                    "Fortsetzen nach Engine-Abbau, No-op"
                );
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Gibt die ConsumerId eines Abonnements zurueck
    pub fn consumer_id(
        &self,
        teilnehmer: ParticipantId,
        producer_id: ProducerId,
    ) -> Option<ConsumerId> {
        self.inner
            .eintraege
            .get(&(teilnehmer, producer_id))
            .and_then(|z| z.get().map(|b| b.consumer_id))
    }

    /// Entfernt einen einzelnen Konsumenten (nach Engine-Schliessung)
    pub fn nach_engine_schliessung_entfernen(&self, consumer_id: ConsumerId) {
        if let Some((_, schluessel)) = self.inner.nach_konsument.remove(&consumer_id) {
            self.inner.eintraege.remove(&schluessel);
            debug!(consumer_id = %consumer_id, "Konsument nach Engine-Schliessung entfernt");
        }
    }

    /// Entfernt alle Abonnements eines verschwundenen Produzenten
    pub fn von_produzent_entfernen(&self, producer_id: ProducerId) -> usize {
        let schluessel: Vec<(ParticipantId, ProducerId)> = self
            .inner
            .eintraege
            .iter()
            .filter(|e| e.key().1 == producer_id)
            .map(|e| *e.key())
            .collect();

        let mut entfernt = 0;
        for s in schluessel {
            if let Some((_, zelle)) = self.inner.eintraege.remove(&s) {
                if let Some(b) = zelle.get() {
                    self.inner.nach_konsument.remove(&b.consumer_id);
                }
                entfernt += 1;
            }
        }
        entfernt
    }

    /// Entfernt alle Abonnements eines Teilnehmers
    ///
    /// Die Engine-Handles werden ueber die Transport-Schliessung
    /// abgeraeumt, hier wird nur der Index bereinigt.
    pub fn von_teilnehmer_entfernen(&self, teilnehmer: ParticipantId) -> usize {
        let schluessel: Vec<(ParticipantId, ProducerId)> = self
            .inner
            .eintraege
            .iter()
            .filter(|e| e.key().0 == teilnehmer)
            .map(|e| *e.key())
            .collect();

        let mut entfernt = 0;
        for s in schluessel {
            if let Some((_, zelle)) = self.inner.eintraege.remove(&s) {
                if let Some(b) = zelle.get() {
                    self.inner.nach_konsument.remove(&b.consumer_id);
                }
                entfernt += 1;
            }
        }
        entfernt
    }

    /// Anzahl aktuell verwalteter Abonnements
    pub fn anzahl(&self) -> usize {
        self.inner.nach_konsument.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
